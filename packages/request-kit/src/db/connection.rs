use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("connection is closed")]
    Closed,
    #[error("no connection attached to the execution context")]
    NotAttached,
    #[error("a connection is already attached to the execution context")]
    AlreadyAttached,
    #[error("no transaction in progress")]
    NoTransaction,
    #[error("environment value '{name}' is not configured")]
    Configuration { name: String },
    #[error("database unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Sea(#[from] sea_orm::DbErr),
}

/// An open database session.
///
/// A connection is either in auto-commit mode (every statement commits on
/// its own) or in manual mode (statements accumulate in a transaction until
/// commit or rollback).
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    fn is_closed(&self) -> bool;

    fn is_auto_commit(&self) -> bool;

    /// Discard the pending transaction.
    async fn rollback(&mut self) -> Result<(), DbError>;

    /// Release the session. The connection reports closed afterwards even
    /// when this returns an error.
    async fn close(&mut self) -> Result<(), DbError>;
}

/// Source of connections for the request guard.
#[async_trait]
pub trait ConnectionPool: Send + Sync + 'static {
    type Conn: Connection;

    async fn acquire(&self) -> Result<Self::Conn, DbError>;
}
