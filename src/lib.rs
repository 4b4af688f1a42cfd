//! # Asof - Analytical SQL client
//!
//! Ad-hoc queries, vector similarity search, and point-in-time ("temporal")
//! queries against a relational backend that may or may not expose native
//! vector-distance functions and system-versioned tables.
//!
//! Asof provides:
//! - A thread-safe registry of named connections with transparent reconnect
//! - A uniform tabular result shape for any executed statement
//! - A temporal clause rewriter turning a current query into an AS OF query
//! - A local embedding provider (fastembed) loaded lazily, exactly once
//! - A tiered vector search engine: server-side distance first, client-side
//!   cosine similarity as the fallback

pub mod config;
pub mod value;
pub mod vectors;
pub mod driver;
pub mod registry;
pub mod exec;
pub mod temporal;
pub mod embedding;
pub mod search;
pub mod ui;

// Re-exports for convenient access
pub use config::ConnectParams;
pub use value::{TabularResult, Value};
pub use registry::{NamedConnection, Registry};
pub use embedding::EmbeddingProvider;
pub use search::{RankedMatch, SearchOptions, SearchOutcome};

/// Result type alias for Asof operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Asof operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("No connection named '{0}' - call connect first")]
    NotConnected(String),

    #[error("Cannot detect FROM table to inject temporal clause: {0}")]
    Rewrite(String),

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("Both server and fallback vector search failed (server: {server}; client: {client})")]
    VectorSearch { server: String, client: String },

    #[error("Driver error: {0}")]
    Driver(#[from] rusqlite::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
