//! Shared error type for the Credo gateway services
//!
//! Covers the infrastructure failures the store, config loader, and worker
//! layers produce. Request-level errors (validation, auth, missing resources)
//! live in the service's own API error type, which maps this one through.

use thiserror::Error;

/// Result alias for fallible gateway operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Store access failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Reading a config file or creating the database directory failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed or is unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invariant violation with no more specific category (corrupt stored
    /// state, serialization failure, exhausted retries)
    #[error("Internal error: {0}")]
    Internal(String),
}
