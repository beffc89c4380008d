use shortly_identity::IdentityError;
use std::borrow::Cow;

/// A specialized [`ChatError`] enum of this crate.
///
/// Every variant reaches the client as an `error` frame; see [`ChatError::error_type`].
#[shortly_derive::shortly_error]
pub enum ChatError {
    /// Frame without a usable `source`.
    #[error("Invalid chat request{}: {message}", format_context(.context))]
    InvalidRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Chat validation error{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Chat permission denied{}: {message}", format_context(.context))]
    PermissionDenied { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Chat not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    /// Attachment that is not valid base64 or is too large.
    #[error("Chat attachment error{}: {message}", format_context(.context))]
    File { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Chat storage error{}: {source}", format_context(.context))]
    Surreal {
        #[source]
        source: surrealdb::Error,
        context: Option<Cow<'static, str>>,
    },
    #[error("Chat identity error{}: {source}", format_context(.context))]
    Identity {
        #[source]
        source: IdentityError,
        context: Option<Cow<'static, str>>,
    },
    #[error("Internal chat error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl ChatError {
    pub(crate) fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Validation { message: message.into(), context: None }
    }

    pub(crate) fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound { message: message.into(), context: None }
    }

    pub(crate) fn denied(message: impl Into<Cow<'static, str>>) -> Self {
        Self::PermissionDenied { message: message.into(), context: None }
    }

    /// The `error.type` sent to the client.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Validation { .. } => "validation_error",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::NotFound { .. } => "not_found",
            Self::File { .. } => "file_error",
            Self::Surreal { .. } | Self::Identity { .. } | Self::Internal { .. } => "server_error",
        }
    }

    /// The `error.message` sent to the client. Storage details stay in the logs.
    #[must_use]
    pub fn client_message(&self) -> Cow<'static, str> {
        match self {
            Self::InvalidRequest { message, .. }
            | Self::Validation { message, .. }
            | Self::PermissionDenied { message, .. }
            | Self::NotFound { message, .. }
            | Self::File { message, .. }
            | Self::Internal { message, .. } => message.clone(),
            Self::Surreal { .. } | Self::Identity { .. } => Cow::Borrowed("Internal server error"),
        }
    }
}
