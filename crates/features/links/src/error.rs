use shortly_kernel::server::ApiError;
use shortly_tasks::TaskError;
use std::borrow::Cow;

/// A specialized [`LinksError`] enum of this crate.
#[shortly_derive::shortly_error]
pub enum LinksError {
    /// Not an absolute http(s) URL, or bad task input.
    #[error("Links validation error{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Links not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    /// The long URL is already owned by a different slug.
    #[error("Links conflict{}: {message}", format_context(.context))]
    Conflict { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Links storage error{}: {source}", format_context(.context))]
    Surreal {
        #[source]
        source: surrealdb::Error,
        context: Option<Cow<'static, str>>,
    },
    #[error("Internal links error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<LinksError> for ApiError {
    fn from(err: LinksError) -> Self {
        match err {
            LinksError::Validation { message, .. } => Self::bad_request(message),
            LinksError::NotFound { message, .. } => Self::not_found(message),
            LinksError::Conflict { message, .. } => Self::conflict(message),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<LinksError> for TaskError {
    fn from(err: LinksError) -> Self {
        match err {
            LinksError::Validation { message, .. } => Self::Payload { message, context: None },
            other => Self::failed(other),
        }
    }
}
