//! Schema Migration Module
//!
//! Applies ordered `<version>_<title>.up.sql` scripts from a directory and
//! records the applied version in `schema_migrations`.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio_postgres::Client;
use tracing::{debug, info};

use crate::error::{AdapterError, Result};

const UP_SUFFIX: &str = ".up.sql";

/// A single forward migration script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    pub sql: String,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Number of migrations applied
    Applied(usize),
    /// Schema was already at the latest version
    NoChange,
}

// == File Names ==
/// Parses `<version>_<title>.up.sql`. Other names yield `None`.
pub fn parse_file_name(file_name: &str) -> Option<(i64, String)> {
    let stem = file_name.strip_suffix(UP_SUFFIX)?;
    let (version, title) = stem.split_once('_')?;

    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some((version.parse().ok()?, title.to_string()))
}

// == Loading ==
/// Reads every up-migration in `dir`, sorted by version.
pub async fn load_migrations(dir: &Path) -> Result<Vec<Migration>> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        AdapterError::Migration(format!("cannot read {}: {}", dir.display(), e))
    })?;

    let mut migrations: Vec<Migration> = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AdapterError::Migration(format!("cannot read {}: {}", dir.display(), e)))?
    {
        let file_name = entry.file_name();
        let Some((version, name)) = file_name.to_str().and_then(parse_file_name) else {
            continue;
        };

        let path = entry.path();
        let sql = tokio::fs::read_to_string(&path).await.map_err(|e| {
            AdapterError::Migration(format!("cannot read {}: {}", path.display(), e))
        })?;

        migrations.push(Migration { version, name, sql });
    }

    migrations.sort_by_key(|m| m.version);

    if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(AdapterError::Migration(format!(
            "duplicate migration version {}",
            pair[0].version
        )));
    }

    Ok(migrations)
}

/// Migrations newer than `current`, in order.
pub fn pending(migrations: &[Migration], current: Option<i64>) -> &[Migration] {
    let start = match current {
        Some(version) => migrations.partition_point(|m| m.version <= version),
        None => 0,
    };
    &migrations[start..]
}

/// Advisory lock id for a database, stable across processes.
pub fn lock_id(database: &str) -> i64 {
    let digest = Sha256::digest(format!("schema_migrations:{}", database).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

// == Runner ==
/// Applies pending migrations over a dedicated connection.
pub struct Migrator<'a> {
    client: &'a mut Client,
    database: String,
}

impl<'a> Migrator<'a> {
    /// Binds the runner to `database`; the name scopes the advisory lock.
    pub fn new(client: &'a mut Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }

    /// Applies every migration newer than the recorded version.
    ///
    /// Holds a session advisory lock for the duration so concurrent runners
    /// against the same database serialise.
    pub async fn up(&mut self, migrations: &[Migration]) -> Result<MigrationStatus> {
        let lock = lock_id(&self.database);
        self.client
            .execute("SELECT pg_advisory_lock($1)", &[&lock])
            .await?;

        let outcome = self.apply(migrations).await;

        let unlock = self
            .client
            .execute("SELECT pg_advisory_unlock($1)", &[&lock])
            .await;

        let status = outcome?;
        unlock?;
        Ok(status)
    }

    async fn apply(&mut self, migrations: &[Migration]) -> Result<MigrationStatus> {
        self.client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS schema_migrations (\
                     version bigint NOT NULL PRIMARY KEY, \
                     dirty boolean NOT NULL)",
            )
            .await?;

        let current = self.current_version().await?;
        let pending = pending(migrations, current);

        if pending.is_empty() {
            debug!(database = %self.database, "No pending migrations");
            return Ok(MigrationStatus::NoChange);
        }

        for migration in pending {
            info!(
                database = %self.database,
                version = migration.version,
                "Applying migration {}",
                migration.name
            );

            let tx = self.client.transaction().await?;
            tx.batch_execute(&migration.sql).await.map_err(|e| {
                AdapterError::Migration(format!(
                    "{}_{} failed: {}",
                    migration.version, migration.name, e
                ))
            })?;
            tx.execute("DELETE FROM schema_migrations", &[]).await?;
            tx.execute(
                "INSERT INTO schema_migrations (version, dirty) VALUES ($1, false)",
                &[&migration.version],
            )
            .await?;
            tx.commit().await?;
        }

        Ok(MigrationStatus::Applied(pending.len()))
    }

    async fn current_version(&mut self) -> Result<Option<i64>> {
        let row = self
            .client
            .query_opt("SELECT version, dirty FROM schema_migrations LIMIT 1", &[])
            .await?;

        match row {
            Some(row) => {
                let version: i64 = row.get(0);
                let dirty: bool = row.get(1);
                if dirty {
                    return Err(AdapterError::DirtyMigration(version));
                }
                Ok(Some(version))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration(version: i64) -> Migration {
        Migration {
            version,
            name: format!("step{}", version),
            sql: String::new(),
        }
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(
            parse_file_name("1_create_authors.up.sql"),
            Some((1, "create_authors".to_string()))
        );
        assert_eq!(
            parse_file_name("20240101120000_add_bio.up.sql"),
            Some((20240101120000, "add_bio".to_string()))
        );
    }

    #[test]
    fn test_parse_file_name_ignores_other_files() {
        assert_eq!(parse_file_name("1_create_authors.down.sql"), None);
        assert_eq!(parse_file_name("README.md"), None);
        assert_eq!(parse_file_name("abc_create.up.sql"), None);
        assert_eq!(parse_file_name("_create.up.sql"), None);
        assert_eq!(parse_file_name("-1_create.up.sql"), None);
    }

    #[test]
    fn test_pending_from_scratch() {
        let all = vec![migration(1), migration(2), migration(5)];
        assert_eq!(pending(&all, None).len(), 3);
    }

    #[test]
    fn test_pending_after_current_version() {
        let all = vec![migration(1), migration(2), migration(5)];
        let rest = pending(&all, Some(2));
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].version, 5);
        assert!(pending(&all, Some(5)).is_empty());
    }

    #[test]
    fn test_lock_id_is_stable_per_database() {
        assert_eq!(lock_id("postgres"), lock_id("postgres"));
        assert_ne!(lock_id("postgres"), lock_id("orders"));
    }

    #[tokio::test]
    async fn test_load_migrations_sorted_and_filtered() {
        let dir = std::env::temp_dir().join(format!("cached_database_mig_{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("2_add_bio.up.sql"), "ALTER TABLE authors ADD bio text;")
            .await
            .unwrap();
        tokio::fs::write(dir.join("1_create_authors.up.sql"), "CREATE TABLE authors (id int);")
            .await
            .unwrap();
        tokio::fs::write(dir.join("1_create_authors.down.sql"), "DROP TABLE authors;")
            .await
            .unwrap();

        let migrations = load_migrations(&dir).await.unwrap();
        tokio::fs::remove_dir_all(&dir).await.unwrap();

        let versions: Vec<i64> = migrations.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(migrations[0].sql, "CREATE TABLE authors (id int);");
    }

    #[tokio::test]
    async fn test_load_migrations_rejects_duplicates() {
        let dir = std::env::temp_dir().join(format!("cached_database_dup_{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("1_a.up.sql"), "SELECT 1;").await.unwrap();
        tokio::fs::write(dir.join("01_b.up.sql"), "SELECT 1;").await.unwrap();

        let result = load_migrations(&dir).await;
        tokio::fs::remove_dir_all(&dir).await.unwrap();

        assert!(matches!(result, Err(AdapterError::Migration(msg)) if msg.contains("duplicate")));
    }

    #[tokio::test]
    async fn test_load_migrations_missing_dir() {
        let result = load_migrations(Path::new("/nonexistent/cached_database/migrations")).await;
        assert!(matches!(result, Err(AdapterError::Migration(_))));
    }
}
