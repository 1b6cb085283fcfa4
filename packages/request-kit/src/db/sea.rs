//! sea-orm backed pool and connection.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbBackend,
    ExecResult, QueryResult, Statement, TransactionTrait,
};
use tracing::debug;

use super::connection::{Connection, ConnectionPool, DbError};

/// Shared sea-orm pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SeaOrmPool {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmPool {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db: Arc::new(db) }
    }

    pub async fn connect(url: &str) -> Result<Self, DbError> {
        Self::connect_with(ConnectOptions::new(url)).await
    }

    pub async fn connect_with(options: ConnectOptions) -> Result<Self, DbError> {
        let db = Database::connect(options).await?;
        Ok(Self::new(db))
    }

    pub fn database(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Whether both handles point at the same underlying pool.
    pub fn ptr_eq(&self, other: &SeaOrmPool) -> bool {
        Arc::ptr_eq(&self.db, &other.db)
    }

    pub(crate) fn shared_count(&self) -> usize {
        Arc::strong_count(&self.db)
    }
}

#[async_trait]
impl ConnectionPool for SeaOrmPool {
    type Conn = SeaOrmConnection;

    async fn acquire(&self) -> Result<SeaOrmConnection, DbError> {
        self.db
            .ping()
            .await
            .map_err(|e| DbError::Unavailable(e.to_string()))?;
        Ok(SeaOrmConnection::new(Arc::clone(&self.db)))
    }
}

/// A session on a [`SeaOrmPool`].
///
/// Starts in auto-commit mode. [`begin`](Self::begin) switches to manual
/// mode; [`commit`](Self::commit) and [`Connection::rollback`] end it.
/// Closing with a transaction still pending rolls it back.
pub struct SeaOrmConnection {
    db: Arc<DatabaseConnection>,
    txn: Option<DatabaseTransaction>,
    closed: bool,
}

impl SeaOrmConnection {
    fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            txn: None,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), DbError> {
        if self.closed {
            Err(DbError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn backend(&self) -> DbBackend {
        self.db.get_database_backend()
    }

    /// Enter manual-commit mode. No-op when a transaction is already open.
    pub async fn begin(&mut self) -> Result<(), DbError> {
        self.ensure_open()?;
        if self.txn.is_none() {
            self.txn = Some(self.db.begin().await?);
        }
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<(), DbError> {
        self.ensure_open()?;
        let txn = self.txn.take().ok_or(DbError::NoTransaction)?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbError> {
        self.ensure_open()?;
        let res = match &self.txn {
            Some(txn) => txn.execute(stmt).await,
            None => self.db.execute(stmt).await,
        };
        Ok(res?)
    }

    pub async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbError> {
        self.ensure_open()?;
        let res = match &self.txn {
            Some(txn) => txn.execute_unprepared(sql).await,
            None => self.db.execute_unprepared(sql).await,
        };
        Ok(res?)
    }

    pub async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbError> {
        self.ensure_open()?;
        let res = match &self.txn {
            Some(txn) => txn.query_one(stmt).await,
            None => self.db.query_one(stmt).await,
        };
        Ok(res?)
    }

    pub async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbError> {
        self.ensure_open()?;
        let res = match &self.txn {
            Some(txn) => txn.query_all(stmt).await,
            None => self.db.query_all(stmt).await,
        };
        Ok(res?)
    }
}

#[async_trait]
impl Connection for SeaOrmConnection {
    fn is_closed(&self) -> bool {
        self.closed
    }

    fn is_auto_commit(&self) -> bool {
        self.txn.is_none()
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.ensure_open()?;
        let txn = self.txn.take().ok_or(DbError::NoTransaction)?;
        txn.rollback().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DbError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(txn) = self.txn.take() {
            debug!("Rolling back transaction left open at close");
            txn.rollback().await?;
        }
        Ok(())
    }
}
