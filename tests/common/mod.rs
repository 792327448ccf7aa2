//! Shared fixtures for tests that run against live Redis and PostgreSQL.
//!
//! Endpoints come from the same environment variables the binary reads
//! (`REDIS_ENDPOINT`, `POSTGRES_ENDPOINT`, ...), defaulting to localhost.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use cached_database::{Adapter, Config, MigrationConfig, PgExecutor};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

/// Row of the `authors` test table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub bio: Option<String>,
}

impl From<Row> for Author {
    fn from(row: Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            bio: row.get("bio"),
        }
    }
}

/// Hand-written query layer bound to any executor.
pub struct Queries<E> {
    db: E,
}

impl<E: PgExecutor> Queries<E> {
    pub fn new(db: E) -> Self {
        Self { db }
    }

    pub async fn create_author(
        &self,
        name: &str,
        bio: Option<&str>,
    ) -> cached_database::Result<Author> {
        let row = self
            .db
            .query_row(
                "INSERT INTO authors (name, bio) VALUES ($1, $2) RETURNING id, name, bio",
                &[&name, &bio],
            )
            .await?;
        Ok(Author::from(row))
    }

    pub async fn get_author(&self, id: i64) -> cached_database::Result<Author> {
        let row = self
            .db
            .query_row("SELECT id, name, bio FROM authors WHERE id = $1", &[&id])
            .await?;
        Ok(Author::from(row))
    }

    pub async fn list_authors(&self) -> cached_database::Result<Vec<Author>> {
        let rows = self
            .db
            .query("SELECT id, name, bio FROM authors ORDER BY id", &[])
            .await?;
        Ok(rows.into_iter().map(Author::from).collect())
    }

    pub async fn delete_author(&self, id: i64) -> cached_database::Result<u64> {
        self.db
            .exec("DELETE FROM authors WHERE id = $1", &[&id])
            .await
    }
}

pub type TestAdapter = Adapter<Queries<deadpool_postgres::Pool>>;

pub fn live_config() -> Config {
    Config {
        connection_timeout: Duration::from_secs(5),
        ..Config::from_env()
    }
}

pub fn migrations() -> MigrationConfig {
    MigrationConfig::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/migrations"))
}

pub async fn connect() -> TestAdapter {
    Adapter::new(&live_config(), Queries::new)
        .await
        .expect("live Redis and PostgreSQL must be reachable for db-tests")
}
