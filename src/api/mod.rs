//! API Module
//!
//! HTTP handlers and routing for the adapter's operational endpoints.
//!
//! # Endpoints
//! - `GET /health` - Combined health check
//! - `GET /stats` - Accessor statistics

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
