//! Seams between the pool and the messaging client.
//!
//! The pool never talks to a broker itself. It asks a [`HandleFactory`] for a
//! [`PublishHandle`] bound to the sink topic and later asks that handle to
//! tear itself down.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration handed to a [`HandleFactory`] for each new producer.
///
/// The pool keeps one template and fills in [`producer_name`](Self::producer_name)
/// with the name derived from the source key before every creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProducerOptions {
    /// Name of the producer session. Set by the pool.
    #[serde(default)]
    pub producer_name: Option<String>,
    /// Compression codec override.
    #[serde(default)]
    pub compression: Option<String>,
    /// Acknowledgment level override.
    #[serde(default)]
    pub acks: Option<String>,
    #[serde(default)]
    pub linger_ms: Option<u32>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub message_timeout_ms: Option<u64>,
    /// Wait for queue space instead of failing when the send queue is full.
    #[serde(default)]
    pub block_if_queue_full: bool,
    /// Raw client properties applied last.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl ProducerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of these options carrying the given producer name.
    #[must_use]
    pub fn with_producer_name(&self, name: impl Into<String>) -> Self {
        Self {
            producer_name: Some(name.into()),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// An open publishing session to the sink topic.
///
/// Handles are shared with callers for publishing, but only the pool calls
/// [`close`](Self::close), and it does so at most once per handle.
#[async_trait]
pub trait PublishHandle: Send + Sync + 'static {
    /// Release the session's resources.
    ///
    /// Completion means the handle is fully torn down.
    async fn close(&self) -> Result<()>;
}

/// Builds publish handles for a topic.
#[async_trait]
pub trait HandleFactory: Send + Sync + 'static {
    type Handle: PublishHandle;

    /// Open a handle publishing to `topic`.
    ///
    /// `options.producer_name` is always set when called by the pool.
    async fn create(&self, topic: &str, options: &ProducerOptions) -> Result<Self::Handle>;
}
