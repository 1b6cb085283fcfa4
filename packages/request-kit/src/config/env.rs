//! Named configuration values supplied by the hosting environment.
//!
//! Keys are logical names such as `entorno` or `jdbc/db_pool`. The
//! [`Environment`] trait only answers "what is the value of this name";
//! typed getters on top of it turn a missing value into
//! [`WebError::Configuration`].

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use tracing::warn;

use crate::error::WebError;

/// Key holding the deployment environment name.
pub const ENVIRONMENT_KEY: &str = "entorno";

/// Environment name that [`Environment::is_production`] matches, ignoring case.
pub const PRODUCTION: &str = "production";

/// Key-value registry of configuration values.
pub trait Environment: Send + Sync {
    /// Raw lookup. `None` means the name is not configured.
    fn lookup(&self, name: &str) -> Option<String>;

    /// Value of `name`, or a configuration error carrying the name.
    fn variable(&self, name: &str) -> Result<String, WebError> {
        self.lookup(name).ok_or_else(|| {
            warn!(name = %name, "Environment value is not configured");
            WebError::configuration(name)
        })
    }

    /// Deployment environment name (`entorno`).
    fn environment_name(&self) -> Result<String, WebError> {
        self.variable(ENVIRONMENT_KEY)
    }

    /// Whether the deployment environment is production.
    ///
    /// An unknown environment is an error, not `false`: callers cannot make
    /// environment-dependent decisions safely without it.
    fn is_production(&self) -> Result<bool, WebError> {
        Ok(self.environment_name()?.eq_ignore_ascii_case(PRODUCTION))
    }
}

impl<E: Environment + ?Sized> Environment for Arc<E> {
    fn lookup(&self, name: &str) -> Option<String> {
        (**self).lookup(name)
    }
}

/// Reads values from process environment variables.
///
/// A logical name maps to a variable by uppercasing it and replacing every
/// non-alphanumeric character with `_`, after the optional prefix:
/// `jdbc/db_pool` with prefix `APP_` reads `APP_JDBC_DB_POOL`.
#[derive(Debug, Clone, Default)]
pub struct ProcessEnvironment {
    prefix: String,
}

impl ProcessEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Process variable consulted for the logical `name`.
    pub fn var_name(&self, name: &str) -> String {
        let mapped: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{}", self.prefix, mapped)
    }
}

impl Environment for ProcessEnvironment {
    fn lookup(&self, name: &str) -> Option<String> {
        env::var(self.var_name(name)).ok()
    }
}

/// In-memory registry, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    values: HashMap<String, String>,
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }
}

impl Environment for StaticEnvironment {
    fn lookup(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}
