//! Request-scoped database connections.
//!
//! A request owns one [`ExecutionContext`]. The guard (see [`guard`] and
//! [`crate::middleware::DbGuard`]) attaches a connection from a
//! [`ConnectionPool`] before the handler runs, rolls it back when the handler
//! fails, and always closes and detaches it afterwards.

pub mod connection;
pub mod context;
pub mod guard;
pub mod pool_provider;
pub mod sea;

pub use connection::{Connection, ConnectionPool, DbError};
pub use context::ExecutionContext;
pub use pool_provider::{PoolProvider, DEFAULT_POOL_NAME};
pub use sea::{SeaOrmConnection, SeaOrmPool};
