pub mod db_guard;
pub mod request_span;

pub use db_guard::DbGuard;
pub use request_span::{RequestId, RequestSpan};
