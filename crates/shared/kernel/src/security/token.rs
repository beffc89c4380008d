//! JWT issuing and verification with a revocation list.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shortly_domain::config::JwtConfig;
use shortly_domain::constants::ROLE_ADMIN;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const EXPIRED: &str = "Your session has expired. Please log in again.";
const REVOKED: &str = "Token has been revoked";

#[shortly_derive::shortly_error]
pub enum TokenError {
    /// Unsupported algorithm or empty secret.
    #[error("Token configuration error{}: {message}", format_context(.context))]
    Config { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Token encoding failed{}: {message}", format_context(.context))]
    Encode { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Malformed, tampered or foreign token.
    #[error("Invalid token{}: {message}", format_context(.context))]
    Invalid { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Token expired{}: {message}", format_context(.context))]
    Expired { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Token revoked{}: {message}", format_context(.context))]
    Revoked { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal token error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl TokenError {
    /// Client facing reason, without the variant prefix.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::Config { message, .. }
            | Self::Encode { message, .. }
            | Self::Invalid { message, .. }
            | Self::Expired { message, .. }
            | Self::Revoked { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }
}

/// Who the token speaks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub email: String,
    pub role: String,
    pub is_active: bool,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub principal: Principal,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

struct TokenServiceInner {
    algorithm: Algorithm,
    issuer: String,
    ttl: ChronoDuration,
    encoding: EncodingKey,
    decoding: DecodingKey,
    revoked: Cache<String, ()>,
}

/// Issues and verifies HMAC-signed access tokens.
#[derive(Clone)]
pub struct TokenService {
    inner: Arc<TokenServiceInner>,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.inner.algorithm)
            .field("issuer", &self.inner.issuer)
            .field("ttl", &self.inner.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// # Errors
    /// [`TokenError::Config`] for an empty secret, a zero TTL or a non-HMAC algorithm.
    pub fn new(config: &JwtConfig) -> Result<Self, TokenError> {
        if config.secret.is_empty() {
            return Err(TokenError::Config { message: "JWT secret is empty".into(), context: None });
        }
        let algorithm = Algorithm::from_str(&config.algorithm).map_err(|e| TokenError::Config {
            message: e.to_string().into(),
            context: Some(config.algorithm.clone().into()),
        })?;
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(TokenError::Config {
                message: format!("{algorithm:?} is not an HMAC algorithm").into(),
                context: None,
            });
        }
        let minutes = i64::try_from(config.ttl_minutes).unwrap_or(i64::MAX).min(i64::from(u32::MAX));
        if minutes == 0 {
            return Err(TokenError::Config { message: "JWT ttl must be positive".into(), context: None });
        }
        let ttl = ChronoDuration::minutes(minutes);

        let revoked = Cache::builder()
            .max_capacity(config.revocation_capacity)
            .time_to_live(Duration::from_secs(config.ttl_minutes.saturating_mul(60)))
            .build();

        Ok(Self {
            inner: Arc::new(TokenServiceInner {
                algorithm,
                issuer: config.issuer.clone(),
                ttl,
                encoding: EncodingKey::from_secret(config.secret.as_bytes()),
                decoding: DecodingKey::from_secret(config.secret.as_bytes()),
                revoked,
            }),
        })
    }

    /// Signs a token valid for the configured TTL from now.
    ///
    /// # Errors
    /// [`TokenError::Encode`] if signing fails.
    pub fn issue(&self, principal: Principal) -> Result<String, TokenError> {
        self.issue_at(principal, Utc::now())
    }

    /// Signs a token as if issued at `issued_at`.
    ///
    /// # Errors
    /// [`TokenError::Encode`] if signing fails.
    pub fn issue_at(&self, principal: Principal, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            principal,
            iss: self.inner.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.inner.ttl).timestamp(),
        };
        encode(&Header::new(self.inner.algorithm), &claims, &self.inner.encoding)
            .map_err(|e| TokenError::Encode { message: e.to_string().into(), context: None })
    }

    /// Checks signature, issuer, expiry and the revocation list.
    ///
    /// # Errors
    /// [`TokenError::Expired`], [`TokenError::Revoked`] or [`TokenError::Invalid`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        if self.is_revoked(token) {
            return Err(TokenError::Revoked { message: REVOKED.into(), context: None });
        }

        let mut validation = Validation::new(self.inner.algorithm);
        validation.leeway = 0;
        validation.set_issuer(&[&self.inner.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        decode::<Claims>(token, &self.inner.decoding, &validation).map(|data| data.claims).map_err(
            |e| {
                debug!(error = %e, "Token validation failed");
                match e.kind() {
                    ErrorKind::ExpiredSignature => {
                        TokenError::Expired { message: EXPIRED.into(), context: None }
                    },
                    _ => TokenError::Invalid { message: "Invalid token".into(), context: None },
                }
            },
        )
    }

    /// Rejects `token` from now until it would have expired anyway.
    pub fn revoke(&self, token: &str) {
        self.inner.revoked.insert(fingerprint(token), ());
    }

    #[must_use]
    pub fn is_revoked(&self, token: &str) -> bool {
        self.inner.revoked.contains_key(&fingerprint(token))
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.inner.ttl.num_seconds()
    }
}

fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
