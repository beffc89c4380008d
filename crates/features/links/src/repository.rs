use crate::error::LinksError;
use shortly_database::{Database, unique_index_violation};
use surrealdb::types::SurrealValue;
use tracing::instrument;

const FIELDS: &str = "code, long_url, short_url, click_count, last_clicked_at, created_at, updated_at";

/// A stored short link. Timestamps are Unix epoch milliseconds.
#[derive(Debug, Clone, SurrealValue)]
pub struct LinkRecord {
    pub code: String,
    pub long_url: String,
    pub short_url: String,
    pub click_count: i64,
    pub last_clicked_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

/// Which unique index rejected an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taken {
    Code,
    LongUrl,
}

#[derive(Debug, Clone)]
pub struct LinkStore {
    db: Database,
}

impl LinkStore {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a new link. `Ok(Err(_))` reports which unique key already exists.
    ///
    /// # Errors
    /// Storage failures other than unique violations.
    #[instrument(skip_all, fields(code = %link.code))]
    pub async fn insert(&self, link: LinkRecord) -> Result<Result<(), Taken>, LinksError> {
        let result = self
            .db
            .query("CREATE link CONTENT $link RETURN NONE;")
            .bind(("link", link))
            .await?
            .check()
            .map_err(surrealdb::Error::from);

        match result {
            Ok(_) => Ok(Ok(())),
            Err(err) => match unique_violation(&err) {
                Some(taken) => Ok(Err(taken)),
                None => Err(err.into()),
            },
        }
    }

    /// # Errors
    /// Storage failures only.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<LinkRecord>, LinksError> {
        self.find_one("code", code).await
    }

    /// # Errors
    /// Storage failures only.
    pub async fn find_by_long_url(&self, long_url: &str) -> Result<Option<LinkRecord>, LinksError> {
        self.find_one("long_url", long_url).await
    }

    async fn find_one(&self, field: &'static str, value: &str) -> Result<Option<LinkRecord>, LinksError> {
        let query = format!("SELECT {FIELDS} FROM link WHERE {field} = $value LIMIT 1;");
        let rows: Vec<LinkRecord> = self.db.query(query).bind(("value", value.to_owned())).await?.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Points `code` at a different long URL.
    ///
    /// # Errors
    /// [`LinksError::Conflict`] when the URL belongs to another link.
    pub async fn set_long_url(&self, code: &str, long_url: &str, now: i64) -> Result<(), LinksError> {
        let result = self
            .db
            .query("UPDATE link SET long_url = $long_url, updated_at = $now WHERE code = $code RETURN NONE;")
            .bind(("long_url", long_url.to_owned()))
            .bind(("now", now))
            .bind(("code", code.to_owned()))
            .await?
            .check()
            .map_err(surrealdb::Error::from);

        match result {
            Ok(_) => Ok(()),
            Err(err) if unique_violation(&err).is_some() => Err(LinksError::Conflict {
                message: "Long URL already has a short URL".into(),
                context: None,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// # Errors
    /// Storage failures only.
    pub async fn delete(&self, code: &str) -> Result<(), LinksError> {
        self.db
            .query("DELETE link WHERE code = $code RETURN NONE;")
            .bind(("code", code.to_owned()))
            .await?
            .check()
            .map_err(surrealdb::Error::from)?;
        Ok(())
    }

    /// Counts one click in a single statement and returns the target URL,
    /// or `None` for an unknown code.
    ///
    /// # Errors
    /// Storage failures only.
    pub async fn record_click(&self, code: &str, now: i64) -> Result<Option<String>, LinksError> {
        let urls: Vec<String> = self
            .db
            .query(
                "UPDATE link SET click_count += 1, last_clicked_at = $now WHERE code = $code \
                 RETURN VALUE long_url;",
            )
            .bind(("now", now))
            .bind(("code", code.to_owned()))
            .await?
            .take(0)?;
        Ok(urls.into_iter().next())
    }

    /// Deletes up to `limit` links created before `cutoff` and returns their codes.
    ///
    /// # Errors
    /// Storage failures only.
    #[instrument(skip(self))]
    pub async fn delete_created_before(&self, cutoff: i64, limit: i64) -> Result<Vec<String>, LinksError> {
        let codes: Vec<String> = self
            .db
            .query("SELECT VALUE code FROM link WHERE created_at < $cutoff LIMIT $limit;")
            .bind(("cutoff", cutoff))
            .bind(("limit", limit))
            .await?
            .take(0)?;
        if codes.is_empty() {
            return Ok(codes);
        }

        self.db
            .query("DELETE link WHERE code IN $codes RETURN NONE;")
            .bind(("codes", codes.clone()))
            .await?
            .check()
            .map_err(surrealdb::Error::from)?;
        Ok(codes)
    }
}

fn unique_violation(err: &surrealdb::Error) -> Option<Taken> {
    match unique_index_violation(err)?.as_str() {
        "link_code" | "link_short_url" => Some(Taken::Code),
        "link_long_url" => Some(Taken::LongUrl),
        _ => None,
    }
}
