use shortly_identity::IdentityError;
use shortly_kernel::server::ApiError;
use shortly_tasks::TaskError;
use std::borrow::Cow;

/// A specialized [`MailError`] enum of this crate.
#[shortly_derive::shortly_error]
pub enum MailError {
    #[error("Mail validation error{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Mail not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Mail access denied{}: {message}", format_context(.context))]
    Forbidden { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    /// The mail provider answered, but not with what we need.
    #[error("Mail provider error{}: {message}", format_context(.context))]
    Provider { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Mail provider request failed{}: {source}", format_context(.context))]
    Http {
        #[source]
        source: reqwest::Error,
        context: Option<Cow<'static, str>>,
    },
    #[error("Mail storage error{}: {source}", format_context(.context))]
    Surreal {
        #[source]
        source: surrealdb::Error,
        context: Option<Cow<'static, str>>,
    },
    #[error("Mail identity error{}: {source}", format_context(.context))]
    Identity {
        #[source]
        source: IdentityError,
        context: Option<Cow<'static, str>>,
    },
    #[error("Internal mail error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        match err {
            MailError::Validation { message, .. } => Self::bad_request(message),
            MailError::NotFound { message, .. } => Self::not_found(message),
            MailError::Forbidden { message, .. } => Self::forbidden(message),
            MailError::Identity { source, .. } => source.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<MailError> for TaskError {
    fn from(err: MailError) -> Self {
        Self::failed(err)
    }
}
