use crate::error::MailError;
use shortly_database::{Database, unique_index_violation};
use surrealdb::types::SurrealValue;
use tracing::debug;

const FIELDS: &str = "message_id, subject, sender, body, user_id, provider, created_at";

/// An ingested message. `created_at` is Unix epoch milliseconds.
#[derive(Debug, Clone, SurrealValue)]
pub struct EmailRecord {
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub body: String,
    pub user_id: String,
    pub provider: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct EmailStore {
    db: Database,
}

impl EmailStore {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Stores the records whose `message_id` is not yet known and returns how many were new.
    ///
    /// # Errors
    /// Storage failures other than duplicates.
    pub async fn insert_new(&self, records: Vec<EmailRecord>) -> Result<usize, MailError> {
        let mut stored = 0;
        for record in records {
            let message_id = record.message_id.clone();
            let result = self
                .db
                .query("CREATE email CONTENT $email RETURN NONE;")
                .bind(("email", record))
                .await?
                .check()
                .map_err(surrealdb::Error::from);

            match result {
                Ok(_) => stored += 1,
                Err(err) if unique_index_violation(&err).is_some() => {
                    debug!(%message_id, "Email already stored");
                },
                Err(err) => return Err(err.into()),
            }
        }
        Ok(stored)
    }

    /// Newest first, optionally for one user.
    ///
    /// # Errors
    /// Storage failures only.
    pub async fn list(&self, user_id: Option<&str>, limit: u32) -> Result<Vec<EmailRecord>, MailError> {
        let filter = if user_id.is_some() { "WHERE user_id = $user_id " } else { "" };
        let query = format!("SELECT {FIELDS} FROM email {filter}ORDER BY created_at DESC, message_id DESC LIMIT $limit;");
        let rows = self
            .db
            .query(query)
            .bind(("user_id", user_id.map(str::to_owned)))
            .bind(("limit", i64::from(limit)))
            .await?
            .take(0)?;
        Ok(rows)
    }
}
