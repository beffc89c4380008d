use crate::error::IdentityError;
use shortly_database::{Database, unique_index_violation};
use shortly_domain::constants::{GMAIL, OUTLOOK};
use shortly_kernel::security::Principal;
use surrealdb::types::SurrealValue;
use tracing::instrument;

const FIELDS: &str =
    "user_id, email, password_hash, role, org_name, is_active, gmail_token, outlook_token, created_at";

/// A stored account.
#[derive(Debug, Clone, SurrealValue)]
pub struct UserRecord {
    pub user_id: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub org_name: Option<String>,
    pub is_active: bool,
    pub gmail_token: Option<String>,
    pub outlook_token: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

#[derive(Debug, SurrealValue)]
struct Total {
    total: i64,
}

impl UserRecord {
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal { email: self.email.clone(), role: self.role.clone(), is_active: self.is_active }
    }

    /// Stored credential JSON for a mail provider.
    #[must_use]
    pub fn provider_token(&self, provider: &str) -> Option<&str> {
        match provider {
            GMAIL => self.gmail_token.as_deref(),
            OUTLOOK => self.outlook_token.as_deref(),
            _ => None,
        }
    }
}

/// Account storage.
#[derive(Debug, Clone)]
pub struct Users {
    db: Database,
}

impl Users {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// # Errors
    /// [`IdentityError::Conflict`] when the email or id is taken.
    #[instrument(skip_all, fields(email = %user.email))]
    pub async fn create(&self, user: UserRecord) -> Result<(), IdentityError> {
        let result = self
            .db
            .query("CREATE user CONTENT $user RETURN NONE;")
            .bind(("user", user))
            .await?
            .check()
            .map_err(surrealdb::Error::from);

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(IdentityError::Conflict {
                message: "Email already registered".into(),
                context: None,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// # Errors
    /// Storage failures only.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, IdentityError> {
        let query = format!("SELECT {FIELDS} FROM user WHERE email = $email LIMIT 1;");
        let rows: Vec<UserRecord> =
            self.db.query(query).bind(("email", email.to_owned())).await?.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// # Errors
    /// Storage failures only.
    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, IdentityError> {
        let query = format!("SELECT {FIELDS} FROM user WHERE user_id = $user_id LIMIT 1;");
        let rows: Vec<UserRecord> =
            self.db.query(query).bind(("user_id", user_id.to_owned())).await?.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Active accounts the caller may see: every one for admins, otherwise those
    /// sharing the caller's organisation.
    ///
    /// # Errors
    /// [`IdentityError::NotFound`] if a non-admin caller has no account.
    #[instrument(skip_all, fields(caller = %caller.email))]
    pub async fn visible_to(&self, caller: &Principal) -> Result<Vec<UserRecord>, IdentityError> {
        if caller.is_admin() {
            let query = format!("SELECT {FIELDS} FROM user WHERE is_active = true ORDER BY created_at, email;");
            return Ok(self.db.query(query).await?.take(0)?);
        }

        let me = self.find_by_email(&caller.email).await?.ok_or_else(|| IdentityError::NotFound {
            message: "Current user not found".into(),
            context: None,
        })?;
        let query = format!(
            "SELECT {FIELDS} FROM user WHERE is_active = true AND org_name = $org ORDER BY created_at, email;"
        );
        Ok(self.db.query(query).bind(("org", me.org_name)).await?.take(0)?)
    }

    /// Accounts other than `exclude` whose email contains `search` (case-insensitive),
    /// ordered by email. `window` is `(offset, limit)`; the total ignores it.
    ///
    /// # Errors
    /// Storage failures only.
    #[instrument(skip(self))]
    pub async fn directory(
        &self,
        exclude: &str,
        search: &str,
        window: Option<(u64, u64)>,
    ) -> Result<(u64, Vec<UserRecord>), IdentityError> {
        const FILTER: &str = "email != $exclude AND string::contains(string::lowercase(email), $search)";
        let page = window.map_or_else(String::new, |(offset, limit)| format!(" LIMIT {limit} START {offset}"));
        let query = format!(
            "SELECT count() AS total FROM user WHERE {FILTER} GROUP ALL;\
             SELECT {FIELDS} FROM user WHERE {FILTER} ORDER BY email{page};"
        );

        let mut response = self
            .db
            .query(query)
            .bind(("exclude", exclude.to_owned()))
            .bind(("search", search.to_lowercase()))
            .await?;
        let totals: Vec<Total> = response.take(0)?;
        let users: Vec<UserRecord> = response.take(1)?;
        let total = totals.first().map_or(0, |t| u64::try_from(t.total).unwrap_or_default());
        Ok((total, users))
    }

    /// Stores (or replaces) a mail provider credential.
    ///
    /// # Errors
    /// [`IdentityError::Validation`] for an unknown provider.
    pub async fn set_provider_token(
        &self,
        user_id: &str,
        provider: &str,
        token_json: String,
    ) -> Result<(), IdentityError> {
        let query = match provider {
            GMAIL => "UPDATE user SET gmail_token = $token WHERE user_id = $user_id RETURN NONE;",
            OUTLOOK => "UPDATE user SET outlook_token = $token WHERE user_id = $user_id RETURN NONE;",
            other => {
                return Err(IdentityError::Validation {
                    message: format!("Unknown mail provider {other}").into(),
                    context: None,
                });
            },
        };
        self.db
            .query(query)
            .bind(("token", token_json))
            .bind(("user_id", user_id.to_owned()))
            .await?
            .check()
            .map_err(surrealdb::Error::from)?;
        Ok(())
    }
}

fn is_unique_violation(err: &surrealdb::Error) -> bool {
    unique_index_violation(err).is_some()
}
