use shortly_database::DatabaseError;
use shortly_kernel::server::ApiError;
use std::borrow::Cow;

/// A specialized [`IdentityError`] enum of this crate.
#[shortly_derive::shortly_error]
pub enum IdentityError {
    /// Malformed registration or credential input.
    #[error("Identity validation error{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    /// An account with the same unique key exists.
    #[error("Identity conflict{}: {message}", format_context(.context))]
    Conflict { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Identity not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    /// Wrong password.
    #[error("Identity auth error{}: {message}", format_context(.context))]
    Unauthorized { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    /// Authenticated but not allowed.
    #[error("Identity access denied{}: {message}", format_context(.context))]
    Forbidden { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Password hashing error{}: {message}", format_context(.context))]
    Password { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Identity storage error{}: {source}", format_context(.context))]
    Surreal {
        #[source]
        source: surrealdb::Error,
        context: Option<Cow<'static, str>>,
    },
    #[error("Identity storage error{}: {source}", format_context(.context))]
    Database {
        #[source]
        source: DatabaseError,
        context: Option<Cow<'static, str>>,
    },
    /// Internal fallback for unexpected issues or logic errors.
    #[error("Internal identity error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Validation { message, .. } => Self::bad_request(message),
            IdentityError::Conflict { message, .. } => Self::conflict(message),
            IdentityError::NotFound { message, .. } => Self::not_found(message),
            IdentityError::Unauthorized { message, .. } => Self::unauthorized(message),
            IdentityError::Forbidden { message, .. } => Self::forbidden(message),
            other => Self::internal(other.to_string()),
        }
    }
}
