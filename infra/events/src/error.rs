use std::borrow::Cow;

/// Errors raised by [`crate::EventBus`].
#[shortly_derive::shortly_error]
pub enum EventBusError {
    /// The registry held a sender of another type under this event's `TypeId`.
    #[error("Type mismatch{}: {message}", format_context(.context))]
    TypeMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Broadcast buffers need room for at least one event.
    #[error("Invalid capacity{}: {message}", format_context(.context))]
    InvalidCapacity { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
