//! Error types and result handling for sink-producers.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! # Example
//!
//! ```rust
//! use sink_producers::{Error, Result};
//!
//! fn open_session() -> Result<()> {
//!     // Simulating a transport failure
//!     Err(Error::Connection("broker unreachable".to_string()))
//! }
//!
//! match open_session() {
//!     Ok(()) => println!("Connected"),
//!     Err(Error::Connection(msg)) => eprintln!("Connection error: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for sink-producers operations.
///
/// This enum covers pool usage errors, failures reported by handle
/// factories and handles, and configuration problems.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration could not be loaded or deserialized.
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Kafka client or producer error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// Generic transport error not covered by specific types.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Factory failure observed by a caller that waited on another caller's
    /// creation attempt. Only the message survives.
    #[error("{0}")]
    Shared(String),

    /// The handle factory could not produce a producer for a key.
    ///
    /// The pool is left as if the key had never been requested.
    #[error("Failed to create producer '{producer}': {source}")]
    CreationFailure {
        /// Derived name of the producer that failed to open
        producer: String,
        /// Error reported by the factory
        source: Box<Error>,
    },

    /// The pool was used before `initialize()` was called.
    #[error("Producer pool is not initialized")]
    NotInitialized,

    /// The pool has been shut down and no longer creates producers.
    #[error("Producer pool for sink topic '{sink_topic}' is closed")]
    PoolClosed {
        /// Sink topic of the closed pool
        sink_topic: String,
    },

    /// A producer failed while tearing itself down.
    ///
    /// The producer has already been removed from the pool.
    #[error("Failed to close producer '{producer}': {source}")]
    Teardown {
        /// Derived name of the producer being closed
        producer: String,
        /// Error reported by the handle
        source: Box<Error>,
    },

    /// One or more producers failed during pool shutdown.
    #[error("{} producer(s) failed to close during shutdown", .failures.len())]
    CloseAll {
        /// Individual teardown failures
        failures: Vec<Error>,
    },
}

/// A convenient Result type alias for sink-producers operations.
///
/// This is equivalent to `std::result::Result<T, sink_producers::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
