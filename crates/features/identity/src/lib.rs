//! Identity feature slice: registration, login, token lifecycle, user listing and
//! mail provider credentials.

mod error;
mod handlers;
pub mod models;
mod password;
mod repository;

pub use crate::error::{IdentityError, IdentityErrorExt};
pub use crate::password::PasswordHasher;
pub use crate::repository::{UserRecord, Users};

use shortly_database::{Database, Migration};
use shortly_kernel::server::ApiState;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub const SLICE: &str = "identity";

/// Identity feature state
#[shortly_derive::shortly_slice]
pub struct Identity {
    users: Users,
    hasher: PasswordHasher,
}

impl Identity {
    #[must_use]
    pub fn users(&self) -> &Users {
        &self.inner.users
    }

    #[must_use]
    pub fn hasher(&self) -> &PasswordHasher {
        &self.inner.hasher
    }
}

/// Initialize the identity feature.
///
/// # Errors
/// [`IdentityError::Password`] if the password hasher cannot be configured.
pub fn init(database: &Database) -> Result<Identity, IdentityError> {
    init_with_hasher(database, PasswordHasher::new()?)
}

/// Same as [`init`] with explicit hashing cost.
///
/// # Errors
/// Currently infallible; kept fallible for parity with [`init`].
pub fn init_with_hasher(database: &Database, hasher: PasswordHasher) -> Result<Identity, IdentityError> {
    tracing::info!("Identity slice initialized");
    Ok(Identity::new(IdentityInner { users: Users::new(database.clone()), hasher }))
}

#[must_use]
pub fn migrations() -> Vec<Migration> {
    vec![Migration::new(SLICE, "001_users", include_str!("../migrations/001_users.surql"))]
}

pub fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::register))
        .routes(routes!(handlers::login))
        .routes(routes!(handlers::me))
        .routes(routes!(handlers::logout))
        .routes(routes!(handlers::list_users))
        .routes(routes!(handlers::store_gmail_token))
        .routes(routes!(handlers::store_outlook_token))
}
