use shortly_derive::api_model;
use shortly_kernel::security::Principal;

#[api_model]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    /// `user` (default) or `admin`.
    pub role: Option<String>,
    pub org_name: Option<String>,
}

#[api_model]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[api_model]
pub struct ProviderTokenRequest {
    /// Provider credential as a JSON document.
    pub token_json: String,
}

#[api_model]
pub struct MessageBody {
    pub message: String,
}

#[api_model]
pub struct StatusBody {
    pub status: String,
}

#[api_model]
pub struct RegisterResponse {
    pub result: MessageBody,
}

/// Public view of the token claims.
#[api_model]
#[derive(Clone, PartialEq, Eq)]
pub struct UserView {
    pub email: String,
    pub role: String,
    pub is_active: bool,
}

impl From<Principal> for UserView {
    fn from(principal: Principal) -> Self {
        Self { email: principal.email, role: principal.role, is_active: principal.is_active }
    }
}

#[api_model]
pub struct LoginResult {
    pub user: UserView,
    pub token: String,
    pub message: String,
}

#[api_model]
pub struct LoginResponse {
    pub result: LoginResult,
}

#[api_model]
pub struct MeResponse {
    pub result: UserView,
}

#[api_model]
pub struct UserSummary {
    pub user_id: String,
    pub email: String,
    pub role: String,
}
