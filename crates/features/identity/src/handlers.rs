use crate::Identity;
use crate::error::IdentityError;
use crate::models::{
    LoginRequest, LoginResponse, LoginResult, MeResponse, MessageBody, ProviderTokenRequest,
    RegisterRequest, RegisterResponse, StatusBody, UserSummary, UserView,
};
use crate::repository::UserRecord;
use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use shortly_derive::api_handler;
use shortly_domain::constants::{AUTH_TAG, GMAIL, OUTLOOK, ROLE_ADMIN, ROLE_USER, USERS_TAG};
use shortly_kernel::server::{ApiError, ApiState, AuthUser};
use shortly_kernel::slug;
use tracing::{info, warn};

const USER_ID_PREFIX: &str = "user_";
const USER_ID_LENGTH: usize = 10;

#[api_handler(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = OK, body = RegisterResponse),
        (status = BAD_REQUEST, description = "Invalid email, empty password or mismatch"),
        (status = CONFLICT, description = "Email already registered"),
    ),
    tag = AUTH_TAG,
)]
pub(crate) async fn register(
    State(state): State<ApiState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let identity = state.try_get_slice::<Identity>()?;

    let email = payload.email.trim().to_lowercase();
    validate_registration(&email, &payload)?;
    let role = payload.role.unwrap_or_else(|| ROLE_USER.to_owned());

    if identity.users().find_by_email(&email).await?.is_some() {
        return Err(IdentityError::Conflict { message: "Email already registered".into(), context: None }.into());
    }

    let password_hash = identity.hasher().hash(payload.password).await?;
    identity
        .users()
        .create(UserRecord {
            user_id: format!("{USER_ID_PREFIX}{}", slug!(USER_ID_LENGTH)),
            email: email.clone(),
            password_hash,
            role,
            org_name: payload.org_name.filter(|org| !org.trim().is_empty()),
            is_active: true,
            gmail_token: None,
            outlook_token: None,
            created_at: Utc::now().timestamp_millis(),
        })
        .await?;

    info!(%email, "User registered");
    Ok(Json(RegisterResponse {
        result: MessageBody { message: "User created successfully".to_owned() },
    }))
}

#[api_handler(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = OK, body = LoginResponse),
        (status = UNAUTHORIZED, description = "Wrong password"),
        (status = FORBIDDEN, description = "Inactive account"),
        (status = NOT_FOUND, description = "User not found"),
    ),
    tag = AUTH_TAG,
)]
pub(crate) async fn login(
    State(state): State<ApiState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let identity = state.try_get_slice::<Identity>()?;
    let email = payload.email.trim().to_lowercase();

    let user = identity.users().find_by_email(&email).await?.ok_or_else(|| ApiError::not_found("User not found"))?;

    if !identity.hasher().verify(payload.password, user.password_hash.clone()).await? {
        warn!(%email, "Login with wrong password");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }
    if !user.is_active {
        return Err(ApiError::forbidden("User account is inactive"));
    }

    let principal = user.principal();
    let token = state.tokens.issue(principal.clone()).map_err(|e| ApiError::internal(e.to_string()))?;

    info!(%email, "User logged in");
    Ok(Json(LoginResponse {
        result: LoginResult {
            user: principal.into(),
            token,
            message: "User logged in successfully".to_owned(),
        },
    }))
}

#[api_handler(
    get,
    path = "/api/auth/me",
    responses((status = OK, body = MeResponse), (status = FORBIDDEN, description = "Missing or invalid token")),
    tag = AUTH_TAG,
)]
pub(crate) async fn me(user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse { result: user.claims.principal.into() })
}

#[api_handler(
    post,
    path = "/api/auth/logout",
    responses((status = OK, body = MessageBody), (status = FORBIDDEN, description = "Missing or invalid token")),
    tag = AUTH_TAG,
)]
pub(crate) async fn logout(State(state): State<ApiState>, user: AuthUser) -> Json<MessageBody> {
    state.tokens.revoke(&user.token);
    info!(email = %user.email, "User logged out");
    Json(MessageBody { message: "Logout successful".to_owned() })
}

#[api_handler(
    get,
    path = "/api/users/list",
    responses(
        (status = OK, body = Vec<UserSummary>),
        (status = NOT_FOUND, description = "Current user not found"),
    ),
    tag = USERS_TAG,
)]
pub(crate) async fn list_users(
    State(state): State<ApiState>,
    user: AuthUser,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let identity = state.try_get_slice::<Identity>()?;
    let users = identity.users().visible_to(&user).await?;

    Ok(Json(
        users
            .into_iter()
            .map(|u| UserSummary { user_id: u.user_id, email: u.email, role: u.role })
            .collect(),
    ))
}

#[api_handler(
    post,
    path = "/api/auth/gmail/{user_id}",
    params(("user_id" = String, Path)),
    request_body = ProviderTokenRequest,
    responses(
        (status = OK, body = StatusBody),
        (status = FORBIDDEN, description = "Not authorized to authenticate this user"),
        (status = NOT_FOUND, description = "User not found"),
    ),
    tag = AUTH_TAG,
)]
pub(crate) async fn store_gmail_token(
    State(state): State<ApiState>,
    user: AuthUser,
    Path(user_id): Path<String>,
    Json(payload): Json<ProviderTokenRequest>,
) -> Result<Json<StatusBody>, ApiError> {
    store_provider_token(&state, &user, &user_id, GMAIL, payload.token_json).await
}

#[api_handler(
    post,
    path = "/api/auth/outlook/{user_id}",
    params(("user_id" = String, Path)),
    request_body = ProviderTokenRequest,
    responses(
        (status = OK, body = StatusBody),
        (status = FORBIDDEN, description = "Not authorized to authenticate this user"),
        (status = NOT_FOUND, description = "User not found"),
    ),
    tag = AUTH_TAG,
)]
pub(crate) async fn store_outlook_token(
    State(state): State<ApiState>,
    user: AuthUser,
    Path(user_id): Path<String>,
    Json(payload): Json<ProviderTokenRequest>,
) -> Result<Json<StatusBody>, ApiError> {
    store_provider_token(&state, &user, &user_id, OUTLOOK, payload.token_json).await
}

async fn store_provider_token(
    state: &ApiState,
    caller: &AuthUser,
    user_id: &str,
    provider: &'static str,
    token_json: String,
) -> Result<Json<StatusBody>, ApiError> {
    let identity = state.try_get_slice::<Identity>()?;
    let target = identity.users().find_by_id(user_id).await?.ok_or_else(|| ApiError::not_found("User not found"))?;

    if !caller.is_admin() && caller.email != target.email {
        warn!(caller = %caller.email, %user_id, provider, "Provider token rejected");
        return Err(ApiError::forbidden("Not authorized to authenticate this user"));
    }
    if serde_json::from_str::<serde_json::Value>(&token_json).map_or(true, |v| !v.is_object()) {
        return Err(ApiError::bad_request("token_json must be a JSON object"));
    }

    identity.users().set_provider_token(user_id, provider, token_json).await?;

    let label = if provider == GMAIL { "Gmail" } else { "Outlook" };
    info!(%user_id, provider, "Provider token stored");
    Ok(Json(StatusBody { status: format!("Authenticated {label} for {}", target.email) }))
}

fn validate_registration(email: &str, payload: &RegisterRequest) -> Result<(), IdentityError> {
    let invalid = |message: &'static str| IdentityError::Validation { message: message.into(), context: None };

    if !is_valid_email(email) {
        return Err(invalid("Invalid email address"));
    }
    if payload.password.is_empty() {
        return Err(invalid("Password cannot be empty"));
    }
    if payload.password != payload.confirm_password {
        return Err(invalid("Passwords do not match"));
    }
    if let Some(role) = payload.role.as_deref()
        && role != ROLE_USER
        && role != ROLE_ADMIN
    {
        return Err(invalid("Role must be 'user' or 'admin'"));
    }
    Ok(())
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
        && !email.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(password: &str, confirm: &str, role: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            email: "a@b.io".into(),
            password: password.into(),
            confirm_password: confirm.into(),
            role: role.map(Into::into),
            org_name: None,
        }
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("alice@localhost"));
        assert!(!is_valid_email("alice@exa mple.com"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("alice@example..com"));
    }

    #[test]
    fn registration_rules() {
        assert!(validate_registration("a@b.io", &request("x", "x", None)).is_ok());
        assert!(validate_registration("a@b.io", &request("x", "x", Some("admin"))).is_ok());
        assert!(validate_registration("a@b.io", &request("", "", None)).is_err());
        assert!(validate_registration("a@b.io", &request("x", "y", None)).is_err());
        assert!(validate_registration("a@b.io", &request("x", "x", Some("root"))).is_err());
        assert!(validate_registration("nope", &request("x", "x", None)).is_err());
    }
}
