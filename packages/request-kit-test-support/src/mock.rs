//! Scripted connections for guard tests.
//!
//! Every connection handed out by a [`MockPool`] gets a sequential id and
//! writes to the pool's [`Journal`], so a test can assert the exact
//! acquire / rollback / close sequence of a request.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use request_kit::{Connection, ConnectionPool, DbError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Acquire(u32),
    Rollback(u32),
    Close(u32),
}

/// Shared, ordered record of connection calls.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().clone()
    }

    fn record(&self, call: Call) {
        self.0.lock().push(call);
    }
}

#[derive(Debug)]
pub struct MockConnection {
    id: u32,
    journal: Journal,
    closed: bool,
    auto_commit: bool,
    fail_rollback: bool,
    fail_close: bool,
}

impl MockConnection {
    /// Open auto-commit connection writing to `journal`.
    pub fn new(id: u32, journal: Journal) -> Self {
        Self {
            id,
            journal,
            closed: false,
            auto_commit: true,
            fail_rollback: false,
            fail_close: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn manual_commit(mut self) -> Self {
        self.auto_commit = false;
        self
    }

    /// Already closed, as if a lower layer closed it behind the context.
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn failing_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn set_auto_commit(&mut self, auto_commit: bool) {
        self.auto_commit = auto_commit;
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn is_closed(&self) -> bool {
        self.closed
    }

    fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.journal.record(Call::Rollback(self.id));
        if self.fail_rollback {
            return Err(DbError::Unavailable("rollback refused".to_string()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DbError> {
        self.journal.record(Call::Close(self.id));
        self.closed = true;
        if self.fail_close {
            return Err(DbError::Unavailable("close refused".to_string()));
        }
        Ok(())
    }
}

/// Pool of [`MockConnection`]s; ids start at 1.
#[derive(Debug, Default)]
pub struct MockPool {
    journal: Journal,
    next_id: AtomicU32,
    manual_commit: bool,
    fail_rollback: bool,
    fail_close: bool,
    fail_acquire: bool,
}

impl MockPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub fn manual_commit(mut self) -> Self {
        self.manual_commit = true;
        self
    }

    pub fn failing_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn failing_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

#[async_trait]
impl ConnectionPool for MockPool {
    type Conn = MockConnection;

    async fn acquire(&self) -> Result<MockConnection, DbError> {
        if self.fail_acquire {
            return Err(DbError::Unavailable("pool exhausted".to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.record(Call::Acquire(id));

        let mut conn = MockConnection::new(id, self.journal.clone());
        if self.manual_commit {
            conn = conn.manual_commit();
        }
        if self.fail_rollback {
            conn = conn.failing_rollback();
        }
        if self.fail_close {
            conn = conn.failing_close();
        }
        Ok(conn)
    }
}
