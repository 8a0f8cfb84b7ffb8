//! Producer pool that multiplexes many source topic partitions onto one
//! sink topic.
//!
//! Each `(source topic, partition)` pair gets its own producer, created lazily
//! on first use and never duplicated under concurrent access. See
//! [`SinkTopicProducers`] for the entry point and [`kafka`] for the rdkafka
//! backed handle factory.

pub mod config;
pub mod error;
pub mod logging;

pub mod kafka;
pub mod pool;

pub use crate::config::Config;
pub use error::{Error, Result};
pub use pool::{SinkTopic, SinkTopicProducers};
