#![deny(clippy::wildcard_imports)]
#![cfg_attr(test, allow(clippy::wildcard_imports))]

//! Request-scoped helpers for actix-web applications: a database guard that
//! brackets each request with open / rollback / close, environment lookups,
//! and a request/response façade for parameters, JSON, views and downloads.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod trace_ctx;
pub mod web;

// Re-exports for public API
pub use config::env::{Environment, ProcessEnvironment, StaticEnvironment};
pub use db::{
    Connection, ConnectionPool, DbError, ExecutionContext, PoolProvider, SeaOrmConnection,
    SeaOrmPool,
};
pub use error::WebError;
pub use extractors::db::Db;
pub use middleware::db_guard::DbGuard;
pub use middleware::request_span::{RequestId, RequestSpan};
pub use web::request_utils::{RemoteUser, RequestUtils, RequestUtilsConfig};
pub use web::views::{views_data, MiniJinjaViews, ViewEngine};
