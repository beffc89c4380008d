use shortly_kernel::server::ApiError;
use std::borrow::Cow;

pub const UNAVAILABLE: &str = "LLM service unavailable – please try again later.";

/// A specialized [`AssistantError`] enum of this crate.
#[shortly_derive::shortly_error]
pub enum AssistantError {
    #[error("Assistant validation error{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    /// Non-success status or an unusable completion.
    #[error("LLM provider error{}: {message}", format_context(.context))]
    Upstream { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("LLM request failed{}: {source}", format_context(.context))]
    Http {
        #[source]
        source: reqwest::Error,
        context: Option<Cow<'static, str>>,
    },
    #[error("Internal assistant error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<AssistantError> for ApiError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::Validation { message, .. } => Self::bad_request(message),
            other => {
                tracing::error!(kind = other.kind(), error = %other, "LLM call failed");
                Self::unavailable(UNAVAILABLE)
            },
        }
    }
}
