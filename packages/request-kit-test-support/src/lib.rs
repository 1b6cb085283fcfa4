//! Test support for request-kit
//!
//! Unified test logging initialization and a scripted connection pool that
//! records every acquire / rollback / close in a shared journal.

pub mod logging;
pub mod mock;

pub use mock::{Call, Journal, MockConnection, MockPool};
