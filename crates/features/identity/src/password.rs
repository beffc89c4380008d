//! Argon2id password hashing on the blocking pool.

use crate::error::IdentityError;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use password_hash::rand_core::OsRng;
use tracing::error;

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// OWASP minimum: 19 MiB, 2 passes, 1 lane.
    const MEMORY_COST: u32 = 19_456;
    const TIME_COST: u32 = 2;
    const PARALLELISM: u32 = 1;
    const OUTPUT_LEN: usize = 32;

    /// # Errors
    /// [`IdentityError::Password`] for parameters Argon2 rejects.
    pub fn new() -> Result<Self, IdentityError> {
        Self::with_params(Self::MEMORY_COST, Self::TIME_COST, Self::PARALLELISM)
    }

    /// # Errors
    /// [`IdentityError::Password`] for parameters Argon2 rejects.
    pub fn with_params(memory_cost: u32, time_cost: u32, parallelism: u32) -> Result<Self, IdentityError> {
        let params = Params::new(memory_cost, time_cost, parallelism, Some(Self::OUTPUT_LEN))
            .map_err(|e| IdentityError::Password { message: e.to_string().into(), context: None })?;
        Ok(Self { params })
    }

    /// PHC string of `password` with a fresh salt.
    ///
    /// # Errors
    /// [`IdentityError::Password`] if hashing fails.
    pub async fn hash(&self, password: String) -> Result<String, IdentityError> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Password hash task panicked");
            IdentityError::Password { message: "Password hashing failed".into(), context: None }
        })?
        .map_err(|e| IdentityError::Password { message: e.to_string().into(), context: None })
    }

    /// `false` for a wrong password or an unparsable stored hash.
    ///
    /// # Errors
    /// [`IdentityError::Password`] if the blocking task dies.
    pub async fn verify(&self, password: String, hash: String) -> Result<bool, IdentityError> {
        tokio::task::spawn_blocking(move || {
            PasswordHash::new(&hash)
                .is_ok_and(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Password verify task panicked");
            IdentityError::Password { message: "Password verification failed".into(), context: None }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> PasswordHasher {
        PasswordHasher::with_params(1024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn hashes_verify_and_differ() {
        let hasher = fast();
        let first = hasher.hash("s3cret".into()).await.unwrap();
        let second = hasher.hash("s3cret".into()).await.unwrap();

        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(hasher.verify("s3cret".into(), first.clone()).await.unwrap());
        assert!(!hasher.verify("wrong".into(), first).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_hash_never_verifies() {
        assert!(!fast().verify("s3cret".into(), "plain-text".into()).await.unwrap());
    }
}
