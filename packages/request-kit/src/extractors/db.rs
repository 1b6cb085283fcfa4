use std::future::{ready, Ready};
use std::ops::Deref;
use std::sync::Arc;

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest};

use crate::db::{Connection, ExecutionContext};
use crate::error::WebError;

/// The request's execution context, as installed by
/// [`crate::middleware::DbGuard`].
///
/// ```ignore
/// async fn show(db: Db<SeaOrmConnection>) -> Result<HttpResponse, WebError> {
///     let conn = db.connection().await?;
///     conn.execute_unprepared("SELECT 1").await?;
///     ...
/// }
/// ```
pub struct Db<C>(pub Arc<ExecutionContext<C>>);

impl<C> Db<C> {
    pub fn into_inner(self) -> Arc<ExecutionContext<C>> {
        self.0
    }
}

impl<C> Deref for Db<C> {
    type Target = ExecutionContext<C>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<C: Connection> FromRequest for Db<C> {
    type Error = WebError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let ctx = req.extensions().get::<Arc<ExecutionContext<C>>>().cloned();

        ready(ctx.map(Db).ok_or_else(|| {
            WebError::internal("No database context on request; is DbGuard installed?")
        }))
    }
}
