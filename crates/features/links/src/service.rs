//! Link operations shared by the HTTP handlers and the expiry task.

use crate::error::LinksError;
use crate::models::LinkStats;
use crate::repository::{LinkRecord, Taken};
use crate::Links;
use chrono::{DateTime, Duration, Utc};
use shortly_domain::constants::LINKS_TOPIC;
use shortly_domain::events::Notification;
use shortly_kernel::slug;
use tracing::{debug, info, warn};
use url::Url;

const MAX_SLUG_ATTEMPTS: usize = 8;

/// Result of [`Links::shorten`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortened {
    Created(String),
    Existing(String),
}

impl Shortened {
    #[must_use]
    pub fn short_url(&self) -> &str {
        match self {
            Self::Created(url) | Self::Existing(url) => url,
        }
    }
}

impl Links {
    /// Returns the short URL for `long_url`, creating one on first use.
    ///
    /// # Errors
    /// [`LinksError::Validation`] for a non-http(s) URL, [`LinksError::Internal`]
    /// when no free slug is found.
    pub async fn shorten(&self, long_url: &str) -> Result<Shortened, LinksError> {
        let long_url = validate_url(long_url)?;

        if let Some(existing) = self.inner.store.find_by_long_url(&long_url).await? {
            self.notify("Short URL already created");
            return Ok(Shortened::Existing(existing.short_url));
        }

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let code = slug!(self.inner.config.slug_length);
            let short_url = self.short_url_for(&code);
            let record = LinkRecord {
                code: code.clone(),
                long_url: long_url.clone(),
                short_url: short_url.clone(),
                click_count: 0,
                last_clicked_at: None,
                created_at: Utc::now().timestamp_millis(),
                updated_at: None,
            };

            match self.inner.store.insert(record).await? {
                Ok(()) => {
                    info!(%code, %long_url, "Short URL created");
                    self.notify("New short URL created");
                    return Ok(Shortened::Created(short_url));
                },
                Err(Taken::Code) => debug!(%code, attempt, "Slug collision, drawing again"),
                Err(Taken::LongUrl) => {
                    // Lost a race against a concurrent shorten of the same URL.
                    if let Some(existing) = self.inner.store.find_by_long_url(&long_url).await? {
                        self.notify("Short URL already created");
                        return Ok(Shortened::Existing(existing.short_url));
                    }
                },
            }
        }

        Err(LinksError::Internal {
            message: "Could not allocate a unique slug".into(),
            context: Some(format!("{MAX_SLUG_ATTEMPTS} attempts").into()),
        })
    }

    /// Long URL behind `code`, served from the cache when possible.
    ///
    /// # Errors
    /// [`LinksError::NotFound`] for an unknown slug.
    pub async fn resolve(&self, code: &str) -> Result<String, LinksError> {
        if let Some(long_url) = self.inner.cache.get(code) {
            return Ok(long_url);
        }
        let link = self.inner.store.find_by_code(code).await?.ok_or_else(slug_not_found)?;
        self.inner.cache.insert(link.code, link.long_url.clone());
        Ok(link.long_url)
    }

    /// # Errors
    /// [`LinksError::NotFound`], [`LinksError::Validation`] or
    /// [`LinksError::Conflict`] if another slug owns the new URL.
    pub async fn update(&self, code: &str, new_long_url: &str) -> Result<LinkRecord, LinksError> {
        let new_long_url = validate_url(new_long_url)?;
        let mut link = self.inner.store.find_by_code(code).await?.ok_or_else(slug_not_found)?;

        if let Some(owner) = self.inner.store.find_by_long_url(&new_long_url).await?
            && owner.code != link.code
        {
            return Err(LinksError::Conflict {
                message: "Long URL already has a short URL".into(),
                context: None,
            });
        }

        let now = Utc::now().timestamp_millis();
        self.inner.store.set_long_url(code, &new_long_url, now).await?;
        self.inner.cache.invalidate(code);

        info!(%code, %new_long_url, "Short URL retargeted");
        link.long_url = new_long_url;
        link.updated_at = Some(now);
        Ok(link)
    }

    /// # Errors
    /// [`LinksError::NotFound`] for an unknown slug.
    pub async fn delete(&self, code: &str) -> Result<(), LinksError> {
        self.inner.store.find_by_code(code).await?.ok_or_else(slug_not_found)?;
        self.inner.store.delete(code).await?;
        self.inner.cache.invalidate(code);
        info!(%code, "Short URL deleted");
        Ok(())
    }

    /// Counts a click and returns the redirect target.
    ///
    /// # Errors
    /// [`LinksError::NotFound`] for an unknown code.
    pub async fn click(&self, code: &str) -> Result<String, LinksError> {
        let long_url = self
            .inner
            .store
            .record_click(code, Utc::now().timestamp_millis())
            .await?
            .ok_or_else(short_url_not_found)?;
        self.inner.cache.insert(code.to_owned(), long_url.clone());
        Ok(long_url)
    }

    /// # Errors
    /// [`LinksError::NotFound`] for an unknown code.
    pub async fn stats(&self, code: &str) -> Result<LinkStats, LinksError> {
        let link = self.inner.store.find_by_code(code).await?.ok_or_else(short_url_not_found)?;
        Ok(LinkStats {
            click_count: link.click_count,
            last_clicked_at: link.last_clicked_at.and_then(DateTime::from_timestamp_millis).map(|t| t.to_rfc3339()),
        })
    }

    /// Deletes links older than the retention window, `batch_size` at a time,
    /// until none remain. Returns the number deleted.
    ///
    /// # Errors
    /// [`LinksError::Validation`] for a zero batch size; storage failures.
    pub async fn expire(&self, batch_size: u32, now: DateTime<Utc>) -> Result<usize, LinksError> {
        if batch_size == 0 {
            return Err(LinksError::Validation { message: "batch_size must be positive".into(), context: None });
        }
        let cutoff = (now - Duration::days(i64::from(self.inner.config.retention_days))).timestamp_millis();

        let mut deleted = 0_usize;
        loop {
            let codes = self.inner.store.delete_created_before(cutoff, i64::from(batch_size)).await?;
            if codes.is_empty() {
                break;
            }
            for code in &codes {
                self.inner.cache.invalidate(code);
            }
            deleted += codes.len();
            debug!(batch = codes.len(), "Expired link batch deleted");
        }

        info!(deleted, retention_days = self.inner.config.retention_days, "Link expiry finished");
        Ok(deleted)
    }

    /// `{base_url}/short.ly/{code}`
    #[must_use]
    pub fn short_url_for(&self, code: &str) -> String {
        format!("{}/short.ly/{code}", self.inner.config.base_url.trim_end_matches('/'))
    }

    fn notify(&self, message: &str) {
        if let Err(e) = self.inner.events.publish(Notification::new(LINKS_TOPIC, message)) {
            warn!(error = %e, "Failed to publish link notification");
        }
    }
}

/// Accepts absolute http(s) URLs with a host; returns the input trimmed.
fn validate_url(raw: &str) -> Result<String, LinksError> {
    let raw = raw.trim();
    let valid = Url::parse(raw)
        .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty()));
    if valid {
        Ok(raw.to_owned())
    } else {
        Err(LinksError::Validation { message: format!("Invalid URL: {raw}").into(), context: None })
    }
}

fn slug_not_found() -> LinksError {
    LinksError::NotFound { message: "Slug not found".into(), context: None }
}

fn short_url_not_found() -> LinksError {
    LinksError::NotFound { message: "Short URL not found".into(), context: None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_absolute_http_urls_pass() {
        assert_eq!(validate_url(" https://example.com/a?b=c ").unwrap(), "https://example.com/a?b=c");
        assert!(validate_url("http://localhost:3000").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("example.com").is_err());
        assert!(validate_url("/relative/path").is_err());
        assert!(validate_url("").is_err());
        assert!(validate_url("mailto:someone@example.com").is_err());
    }

    #[test]
    fn shortened_exposes_url_either_way() {
        assert_eq!(Shortened::Created("a".into()).short_url(), "a");
        assert_eq!(Shortened::Existing("b".into()).short_url(), "b");
    }
}
