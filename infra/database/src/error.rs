use std::borrow::Cow;

/// A specialized [`DatabaseError`] enum of this crate.
#[shortly_derive::shortly_error]
pub enum DatabaseError {
    /// Validation errors.
    #[error("Validation error{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Occurs when connectivity or health checks fail.
    #[error("Database connection failed{}: {message}", format_context(.context))]
    Connection { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Occurs when root sign-in fails.
    #[error("Authentication failed{}: {message}", format_context(.context))]
    Auth { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A wrapper for underlying `SurrealDB` engine errors.
    #[error("SurrealDB error{}: {source}", format_context(.context))]
    Surreal {
        #[source]
        source: surrealdb::Error,
        context: Option<Cow<'static, str>>,
    },

    /// Migration failures, including checksum drift.
    #[error("Migration error{}: {message}", format_context(.context))]
    Migration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal database error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Name of the unique index a write collided with, if that is what `err` reports.
///
/// `SurrealDB` 3.x reports index collisions with the `Internal` kind and no
/// structured details, so the name is read from the message, which looks like
/// ``Database index `link_code` already contains 'abc', with record `link:x` ``.
/// Every repository goes through here; `tests/integration.rs` pins the format.
#[must_use]
pub fn unique_index_violation(err: &surrealdb::Error) -> Option<String> {
    let text = err.to_string();
    let (_, rest) = text.split_once("index `")?;
    let (index, rest) = rest.split_once('`')?;
    rest.trim_start().starts_with("already contains").then(|| index.to_owned())
}
