//! Error types for the cached database adapter
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Adapter Error Enum ==
/// Unified error type for the adapter, the cache clients and the migration runner.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Cache transport or protocol failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Key absent from the cache
    #[error("Key not found: {0}")]
    CacheMiss(String),

    /// Cache client used after close
    #[error("Cache client is closed")]
    CacheClosed,

    /// Pool or query failure against PostgreSQL
    #[error("Database error: {0}")]
    Database(String),

    /// Both backing resources failed the health check
    #[error("redis connection error: {cache}. postgres connection error: {database}")]
    Unhealthy { cache: String, database: String },

    /// Operation did not complete within its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Migration script could not be loaded or applied
    #[error("Migration error: {0}")]
    Migration(String),

    /// A previous migration run left the schema half-applied
    #[error("Dirty database version {0}. Fix and force version.")]
    DirtyMigration(i64),
}

// == Conversions ==
impl From<redis::RedisError> for AdapterError {
    fn from(err: redis::RedisError) -> Self {
        AdapterError::Cache(err.to_string())
    }
}

impl From<tokio_postgres::Error> for AdapterError {
    fn from(err: tokio_postgres::Error) -> Self {
        AdapterError::Database(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AdapterError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        AdapterError::Database(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for AdapterError {
    fn into_response(self) -> Response {
        let status = match &self {
            AdapterError::CacheMiss(_) => StatusCode::NOT_FOUND,
            AdapterError::Cache(_)
            | AdapterError::CacheClosed
            | AdapterError::Database(_)
            | AdapterError::Unhealthy { .. }
            | AdapterError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AdapterError::Config(_)
            | AdapterError::Migration(_)
            | AdapterError::DirtyMigration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the adapter.
pub type Result<T> = std::result::Result<T, AdapterError>;
