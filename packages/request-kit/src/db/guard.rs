//! Open / rollback / close bracket around one request.
//!
//! Error policy:
//!
//! | failure                 | phase    | outcome                                      |
//! |-------------------------|----------|----------------------------------------------|
//! | pool cannot hand out    | enter    | `WebError::ConnectionAcquisition`, or        |
//! | a connection            |          | `WebError::Configuration`; handler skipped   |
//! | handler error           | invoke   | returned unchanged                           |
//! | rollback error          | teardown | logged at `error`, swallowed                 |
//! | close error             | teardown | logged at `error`, swallowed                 |
//!
//! After [`run`] returns, or after [`close`] on any path, the context holds
//! no connection.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error};

use super::connection::{Connection, ConnectionPool, DbError};
use super::context::ExecutionContext;
use crate::error::WebError;

/// What [`rollback_if_manual`] did.
#[derive(Debug)]
pub enum RollbackOutcome {
    /// No open manual-commit connection was attached.
    Skipped,
    RolledBack,
    /// Rollback failed; the error has been logged.
    Failed(DbError),
}

/// What [`close`] did.
#[derive(Debug)]
pub enum CloseOutcome {
    /// Nothing attached, or the attached connection was already closed.
    Skipped,
    Closed,
    /// Close failed; the error has been logged. The slot is empty anyway.
    Failed(DbError),
}

/// Make sure an open connection is attached to `ctx`.
///
/// A closed connection left in the slot is detached first. If the slot is
/// empty a connection is acquired from `pool`.
pub async fn open<P>(ctx: &ExecutionContext<P::Conn>, pool: &P) -> Result<(), WebError>
where
    P: ConnectionPool,
{
    let mut slot = ctx.lock().await;

    if slot.as_ref().is_some_and(|conn| conn.is_closed()) {
        debug!("Detaching closed connection left in execution context");
        *slot = None;
    }

    if slot.is_none() {
        let conn = pool.acquire().await.map_err(|e| {
            error!(error = %e, "Could not acquire database connection");
            match e {
                DbError::Configuration { name } => WebError::configuration(name),
                other => WebError::connection_acquisition(other.to_string()),
            }
        })?;
        *slot = Some(conn);
    }

    Ok(())
}

/// Roll back the attached connection if it is open and in manual-commit mode.
///
/// The rollback is issued even when no statement ran; only the commit mode
/// decides.
pub async fn rollback_if_manual<C: Connection>(ctx: &ExecutionContext<C>) -> RollbackOutcome {
    let mut slot = ctx.lock().await;

    let Some(conn) = slot.as_mut() else {
        return RollbackOutcome::Skipped;
    };
    if conn.is_closed() || conn.is_auto_commit() {
        return RollbackOutcome::Skipped;
    }

    match conn.rollback().await {
        Ok(()) => RollbackOutcome::RolledBack,
        Err(e) => {
            error!(error = %e, "Could not roll back the database transaction");
            RollbackOutcome::Failed(e)
        }
    }
}

/// Close the attached connection if it is open, and empty the slot.
pub async fn close<C: Connection>(ctx: &ExecutionContext<C>) -> CloseOutcome {
    let mut slot = ctx.lock().await;

    let Some(mut conn) = slot.take() else {
        return CloseOutcome::Skipped;
    };
    if conn.is_closed() {
        return CloseOutcome::Skipped;
    }

    match conn.close().await {
        Ok(()) => CloseOutcome::Closed,
        Err(e) => {
            error!(error = %e, "Could not close the database connection");
            CloseOutcome::Failed(e)
        }
    }
}

/// Run `f` inside the guard.
///
/// 1) attach a connection (handler skipped on failure)
/// 2) run `f` with the populated context
/// 3) on `Err`, roll back a manual-commit connection
/// 4) always close and detach
///
/// The error returned by `f` is the error returned here.
pub async fn run<P, F, Fut, R, E>(
    ctx: &Arc<ExecutionContext<P::Conn>>,
    pool: &P,
    f: F,
) -> Result<R, E>
where
    P: ConnectionPool,
    F: FnOnce(Arc<ExecutionContext<P::Conn>>) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: From<WebError>,
{
    let out = match open(ctx, pool).await {
        Ok(()) => f(Arc::clone(ctx)).await,
        Err(e) => Err(E::from(e)),
    };

    if out.is_err() {
        rollback_if_manual(ctx).await;
    }
    close(ctx).await;

    out
}
