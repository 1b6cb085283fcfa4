//! Task-local request id.
//!
//! `RequestSpan` scopes every request future with its generated id so that
//! error responses and log records deep inside handlers can name the request
//! without threading the id through every call.

use std::future::Future;

use tokio::task_local;

task_local! {
    static REQUEST_ID: String;
}

const UNKNOWN: &str = "unknown";

/// Id of the request being served by the current task, or `"unknown"`
/// outside of a request scope.
pub fn request_id() -> String {
    REQUEST_ID
        .try_with(Clone::clone)
        .unwrap_or_else(|_| UNKNOWN.to_string())
}

/// Run `future` with `request_id` as the current request id.
pub async fn scope<F, R>(request_id: String, future: F) -> R
where
    F: Future<Output = R>,
{
    REQUEST_ID.scope(request_id, future).await
}
