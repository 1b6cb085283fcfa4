pub mod env;

pub use env::{Environment, ProcessEnvironment, StaticEnvironment};
