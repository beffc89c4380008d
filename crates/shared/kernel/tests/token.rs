use chrono::{Duration, Utc};
use shortly_kernel::domain::config::JwtConfig;
use shortly_kernel::security::{Principal, TokenError, TokenService};

fn service() -> TokenService {
    TokenService::new(&JwtConfig { secret: "test-secret".into(), ..JwtConfig::default() }).unwrap()
}

fn alice() -> Principal {
    Principal { email: "alice@example.com".into(), role: "user".into(), is_active: true }
}

#[test]
fn round_trips_claims() {
    let tokens = service();
    let token = tokens.issue(alice()).unwrap();
    let claims = tokens.verify(&token).unwrap();

    assert_eq!(claims.principal, alice());
    assert_eq!(claims.iss, "shortly");
    assert_eq!(claims.exp - claims.iat, 30 * 60);
}

#[test]
fn expired_token_is_rejected() {
    let tokens = service();
    let token = tokens.issue_at(alice(), Utc::now() - Duration::minutes(31)).unwrap();
    let err = tokens.verify(&token).unwrap_err();
    assert!(matches!(err, TokenError::Expired { .. }));
    assert_eq!(err.reason(), "Your session has expired. Please log in again.");
}

#[test]
fn tampered_and_foreign_tokens_are_rejected() {
    let tokens = service();
    let mut token = tokens.issue(alice()).unwrap();
    token.push('x');
    assert!(matches!(tokens.verify(&token), Err(TokenError::Invalid { .. })));

    let other = TokenService::new(&JwtConfig { secret: "other".into(), ..JwtConfig::default() })
        .unwrap()
        .issue(alice())
        .unwrap();
    assert!(matches!(tokens.verify(&other), Err(TokenError::Invalid { .. })));
    assert!(matches!(tokens.verify("not-a-jwt"), Err(TokenError::Invalid { .. })));
}

#[test]
fn revoked_token_is_rejected() {
    let tokens = service();
    let token = tokens.issue(alice()).unwrap();
    tokens.revoke(&token);
    assert!(tokens.is_revoked(&token));
    assert!(matches!(tokens.verify(&token), Err(TokenError::Revoked { .. })));

    let fresh = tokens.issue_at(alice(), Utc::now() - Duration::seconds(1)).unwrap();
    assert!(tokens.verify(&fresh).is_ok());
}

#[test]
fn rejects_bad_configuration() {
    let asymmetric = JwtConfig { secret: "test-secret".into(), algorithm: "RS256".into(), ..JwtConfig::default() };
    assert!(matches!(TokenService::new(&asymmetric), Err(TokenError::Config { .. })));

    let empty = JwtConfig { secret: String::new(), ..JwtConfig::default() };
    assert!(matches!(TokenService::new(&empty), Err(TokenError::Config { .. })));

    let unknown = JwtConfig { secret: "test-secret".into(), algorithm: "HS999".into(), ..JwtConfig::default() };
    assert!(TokenService::new(&unknown).is_err());
}

#[test]
fn default_configuration_needs_a_secret() {
    let err = TokenService::new(&JwtConfig::default()).unwrap_err();
    assert!(matches!(err, TokenError::Config { .. }));
    assert!(err.to_string().contains("JWT secret is empty"));
}
