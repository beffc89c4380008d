use std::borrow::Cow;

#[shortly_derive::shortly_error]
pub enum TaskError {
    /// No handler is registered under the requested name.
    #[error("Unknown task{}: {message}", format_context(.context))]
    UnknownTask { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The bounded queue has no free slot.
    #[error("Task queue is full{}: {message}", format_context(.context))]
    QueueFull { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Workers have stopped; nothing will drain the queue.
    #[error("Task queue is closed{}: {message}", format_context(.context))]
    QueueClosed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid schedule{}: {message}", format_context(.context))]
    InvalidSchedule { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Payload did not match what the handler expects.
    #[error("Invalid payload{}: {message}", format_context(.context))]
    Payload { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The handler ran and reported a failure.
    #[error("Task failed{}: {message}", format_context(.context))]
    Execution { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal task error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl TaskError {
    /// Wraps any displayable handler failure.
    pub fn failed(err: impl std::fmt::Display) -> Self {
        Self::Execution { message: err.to_string().into(), context: None }
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(err: serde_json::Error) -> Self {
        Self::Payload { message: err.to_string().into(), context: None }
    }
}
