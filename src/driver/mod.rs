//! Statement Execution Boundary
//!
//! A `Driver` is one live link to a backend: it can execute parameterized or
//! raw statement text, answer a liveness probe, and release its handle.
//! Everything above this boundary (registry, adapter, temporal rewriter,
//! search engine) is backend-agnostic.

pub mod sqlite;

pub use sqlite::SqliteDriver;

use crate::config::ConnectParams;
use crate::value::{TabularResult, Value};
use crate::{Error, Result};

/// One live connection handle to a backend
///
/// Not safe for concurrent statements from multiple threads; callers
/// serialize access (the registry hands drivers out behind a mutex).
pub trait Driver: Send {
    /// Execute one statement with bound parameters and fetch any result set
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<TabularResult>;

    /// Execute raw statement text (possibly multiple statements) with no
    /// parameters; never produces a result set
    fn execute_raw(&mut self, sql: &str) -> Result<TabularResult>;

    /// Liveness probe
    fn ping(&mut self) -> Result<()>;

    /// Release the underlying handle; further calls fail
    fn close(&mut self) -> Result<()>;
}

/// Open a driver for the backend named in `params`
pub fn open(params: &ConnectParams) -> Result<Box<dyn Driver>> {
    match params.backend.as_str() {
        "sqlite" => Ok(Box::new(SqliteDriver::open(params)?)),
        other => Err(Error::Config(format!("unknown backend '{}'", other))),
    }
}
