//! Request-scoped database guard middleware.
//!
//! Wrap the app (or a scope) in `DbGuard::new(pool)` and every request gets
//! an `Arc<ExecutionContext<P::Conn>>` in its extensions with a connection
//! attached. Handlers reach it through the [`crate::extractors::Db`]
//! extractor.
//!
//! A request fails when the inner service returns `Err` or when the
//! response carries an error (a handler returned `Err`). In both cases a
//! manual-commit connection is rolled back before it is closed; the response
//! itself is passed on untouched.

use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage, HttpResponse};
use futures_util::future::LocalBoxFuture;
use tracing::debug;

use crate::db::context::ExecutionContext;
use crate::db::guard;
use crate::db::ConnectionPool;

pub struct DbGuard<P> {
    pool: Arc<P>,
}

impl<P> DbGuard<P> {
    pub fn new(pool: P) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn from_arc(pool: Arc<P>) -> Self {
        Self { pool }
    }
}

impl<P> Clone for DbGuard<P> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<S, B, P> Transform<S, ServiceRequest> for DbGuard<P>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    P: ConnectionPool,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = DbGuardMiddleware<S, P>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(DbGuardMiddleware {
            service: Rc::new(service),
            pool: Arc::clone(&self.pool),
        }))
    }
}

pub struct DbGuardMiddleware<S, P> {
    service: Rc<S>,
    pool: Arc<P>,
}

impl<S, B, P> Service<ServiceRequest> for DbGuardMiddleware<S, P>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    P: ConnectionPool,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let pool = Arc::clone(&self.pool);

        // Reuse a context installed by an outer layer, otherwise start empty.
        let existing = req
            .extensions()
            .get::<Arc<ExecutionContext<P::Conn>>>()
            .cloned();
        let ctx = existing.unwrap_or_else(|| {
            let ctx = Arc::new(ExecutionContext::new());
            req.extensions_mut().insert(Arc::clone(&ctx));
            ctx
        });

        Box::pin(async move {
            if let Err(e) = guard::open(&ctx, pool.as_ref()).await {
                guard::close(&ctx).await;
                let (http_req, _payload) = req.into_parts();
                let res = HttpResponse::from_error(e).map_into_right_body();
                return Ok(ServiceResponse::new(http_req, res));
            }

            let result = service.call(req).await;

            let failed = match &result {
                Err(_) => true,
                Ok(res) => res.response().error().is_some(),
            };
            if failed {
                let outcome = guard::rollback_if_manual(&ctx).await;
                debug!(rollback = ?outcome, "Request failed, connection rollback checked");
            }
            guard::close(&ctx).await;

            result.map(ServiceResponse::map_into_left_body)
        })
    }
}
