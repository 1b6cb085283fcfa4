use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use super::connection::{Connection, DbError};

/// Request-scoped slot holding at most one connection.
///
/// Shared as `Arc<ExecutionContext<C>>` through the request extensions; the
/// slot is locked across `.await` points, hence the async mutex.
pub struct ExecutionContext<C> {
    slot: Mutex<Option<C>>,
}

impl<C: Connection> ExecutionContext<C> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Context that already carries `conn`, e.g. one handed over by an
    /// outer layer.
    pub fn with_connection(conn: C) -> Self {
        Self {
            slot: Mutex::new(Some(conn)),
        }
    }

    pub async fn has_connection(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Attach `conn`. Fails if the slot is occupied.
    pub async fn attach(&self, conn: C) -> Result<(), DbError> {
        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            return Err(DbError::AlreadyAttached);
        }
        *slot = Some(conn);
        Ok(())
    }

    /// Clear the slot without touching the connection.
    pub async fn detach(&self) -> Option<C> {
        self.slot.lock().await.take()
    }

    /// Borrow the attached connection for the duration of the guard.
    pub async fn connection(&self) -> Result<MappedMutexGuard<'_, C>, DbError> {
        MutexGuard::try_map(self.slot.lock().await, Option::as_mut)
            .map_err(|_| DbError::NotAttached)
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Option<C>> {
        self.slot.lock().await
    }
}

impl<C: Connection> Default for ExecutionContext<C> {
    fn default() -> Self {
        Self::new()
    }
}
