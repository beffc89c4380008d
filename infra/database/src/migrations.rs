use crate::error::{DatabaseError, DatabaseErrorExt};
use fxhash::FxHashMap;
use sha2::{Digest, Sha256};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::types::SurrealValue;

/// A versioned SurrealQL script owned by a feature slice.
///
/// The checksum is the SHA-256 of the script; an applied migration whose script
/// changes afterwards aborts the run.
#[derive(Debug, Clone)]
pub struct Migration {
    slice: &'static str,
    version: &'static str,
    script: &'static str,
    checksum: String,
}

impl Migration {
    #[must_use]
    pub fn new(slice: &'static str, version: &'static str, script: &'static str) -> Self {
        let checksum = hex::encode(Sha256::digest(script.as_bytes()));
        Self { slice, version, script, checksum }
    }

    #[must_use]
    pub const fn slice(&self) -> &'static str {
        self.slice
    }

    #[must_use]
    pub const fn version(&self) -> &'static str {
        self.version
    }

    #[must_use]
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    fn key(&self) -> String {
        format!("{}:{}", self.slice, self.version)
    }
}

/// Outcome of a migration run, as `slice:version` keys.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, SurrealValue)]
struct AppliedMigration {
    slice: String,
    version: String,
    checksum: String,
}

#[derive(Debug)]
pub(crate) struct MigrationRunner<'a> {
    db: &'a Surreal<Any>,
}

impl<'a> MigrationRunner<'a> {
    pub(crate) const fn new(db: &'a Surreal<Any>) -> Self {
        Self { db }
    }

    /// Applies pending migrations in the given order.
    pub(crate) async fn run(&self, migrations: &[Migration]) -> Result<MigrationReport, DatabaseError> {
        ensure_unique(migrations)?;

        let mut report = MigrationReport::default();
        let applied = self.applied().await?;

        for migration in migrations {
            let key = migration.key();
            if let Some(existing) = applied.get(&key) {
                ensure_checksum_match(migration, &existing.checksum)?;
                report.skipped.push(key);
                continue;
            }

            self.apply(migration).await?;
            report.applied.push(key);
        }

        Ok(report)
    }

    async fn apply(&self, migration: &Migration) -> Result<(), DatabaseError> {
        let query = format!(
            "BEGIN TRANSACTION;
            {}
            CREATE migration SET slice = $slice, version = $version, checksum = $checksum, applied_at = time::now();
            COMMIT TRANSACTION;",
            migration.script,
        );

        self.db
            .query(&query)
            .bind(("slice", migration.slice))
            .bind(("version", migration.version))
            .bind(("checksum", migration.checksum.clone()))
            .await
            .context(format!("SQL execution failed at {}", migration.key()))?
            .check()
            .map_err(surrealdb::Error::from)
            .context(format!("Migration {} was rejected", migration.key()))?;

        Ok(())
    }

    async fn applied(&self) -> Result<FxHashMap<String, AppliedMigration>, DatabaseError> {
        let entries = self
            .db
            .query("DEFINE TABLE IF NOT EXISTS migration SCHEMALESS;")
            .query("SELECT slice, version, checksum FROM migration;")
            .await
            .context("Loading applied migrations")?
            .take::<Vec<AppliedMigration>>(1)
            .context("Parsing applied migrations")?;

        Ok(entries
            .into_iter()
            .map(|entry| (format!("{}:{}", entry.slice, entry.version), entry))
            .collect())
    }
}

fn ensure_unique(migrations: &[Migration]) -> Result<(), DatabaseError> {
    let mut seen = fxhash::FxHashSet::default();
    for migration in migrations {
        if !seen.insert(migration.key()) {
            return Err(DatabaseError::Migration {
                message: format!("Duplicate migration {}", migration.key()).into(),
                context: None,
            });
        }
    }
    Ok(())
}

fn ensure_checksum_match(migration: &Migration, existing: &str) -> Result<(), DatabaseError> {
    if existing != migration.checksum {
        return Err(DatabaseError::Migration {
            message: format!(
                "Checksum mismatch for {} (recorded {}, found {})",
                migration.key(),
                existing,
                migration.checksum
            )
            .into(),
            context: Some("Migration already applied with different script".into()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_sha256_of_script() {
        let migration = Migration::new("links", "001", "");
        assert_eq!(
            migration.checksum(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn duplicates_are_rejected() {
        let migrations = [Migration::new("links", "001", "a"), Migration::new("links", "001", "b")];
        assert!(matches!(ensure_unique(&migrations), Err(DatabaseError::Migration { .. })));
    }

    #[test]
    fn changed_script_is_detected() {
        let migration = Migration::new("links", "001", "DEFINE TABLE link;");
        assert!(ensure_checksum_match(&migration, "deadbeef").is_err());
        assert!(ensure_checksum_match(&migration, &migration.checksum.clone()).is_ok());
    }
}
