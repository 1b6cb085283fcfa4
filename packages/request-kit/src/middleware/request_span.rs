//! Per-request id, tracing span and completion log.
//!
//! Generates a request id, stores it in the request extensions as
//! [`RequestId`], makes it available through [`crate::trace_ctx`], runs the
//! rest of the chain inside an `info_span!("request", ...)`, echoes the id in
//! `x-request-id` and logs `request_completed` with the final status.
//!
//! Wire it outermost so the guard's log records carry the span:
//!
//! App::new()
//!     .wrap(DbGuard::new(pool))
//!     .wrap(RequestSpan)

use std::future::{ready, Ready};
use std::time::Instant;

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, HttpMessage};
use futures_util::future::LocalBoxFuture;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::trace_ctx;

/// Id assigned to the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

#[derive(Clone, Default)]
pub struct RequestSpan;

impl<S, B> Transform<S, ServiceRequest> for RequestSpan
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestSpanMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestSpanMiddleware { service }))
    }
}

pub struct RequestSpanMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestSpanMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        let method = req.method().to_string();
        let path = req.path().to_string();

        req.extensions_mut().insert(RequestId(request_id.clone()));

        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            path = %path
        );

        let fut = self.service.call(req);
        let header_value = HeaderValue::from_str(&request_id)
            .unwrap_or_else(|_| HeaderValue::from_static("invalid-request-id"));

        let completed = async move {
            let mut result = fut.await;

            let status = match &result {
                Ok(res) => res.status(),
                Err(err) => err.as_response_error().status_code(),
            };
            let duration_us = start.elapsed().as_micros() as u64;
            let status_code = status.as_u16();

            if status.is_server_error() {
                error!(http.status_code = status_code, duration_us, "request_completed");
            } else if status.is_client_error() {
                warn!(http.status_code = status_code, duration_us, "request_completed");
            } else {
                info!(http.status_code = status_code, duration_us, "request_completed");
            }

            if let Ok(res) = result.as_mut() {
                res.headers_mut()
                    .insert(HeaderName::from_static("x-request-id"), header_value);
            }

            result
        }
        .instrument(span);

        Box::pin(trace_ctx::scope(request_id, completed))
    }
}
