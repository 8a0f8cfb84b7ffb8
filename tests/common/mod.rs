#![allow(dead_code)]

use async_trait::async_trait;
use sink_producers::config::{Config, KafkaConfig, PoolConfig};
use sink_producers::pool::{HandleFactory, ProducerOptions, PublishHandle};
use sink_producers::{Error, Result};
use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Get test configuration from environment variables
pub fn get_test_config() -> Config {
    let kafka = KafkaConfig {
        brokers: env::var("TEST_KAFKA_BROKERS")
            .unwrap_or_else(|_| "localhost:9092".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect(),
        compression: "none".to_string(), // No compression for tests
        acks: "all".to_string(),
        linger_ms: 0,             // Immediate sending for tests
        batch_size: 1,            // Small batches for tests
        buffer_memory: 1_048_576, // 1MB for tests
        message_timeout_ms: 10_000,
        flush_timeout_ms: 5_000,
    };

    let pool = PoolConfig {
        sink_topic: format!("test_sink_{}", std::process::id()),
        producer_options: ProducerOptions::default(),
    };

    Config { pool, kafka }
}

/// Publish handle recording how often it was torn down.
#[derive(Debug)]
pub struct RecordingHandle {
    pub topic: String,
    pub name: String,
    closes: AtomicUsize,
}

impl RecordingHandle {
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublishHandle for RecordingHandle {
    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory that counts creation calls per sink topic and producer name.
#[derive(Clone, Default)]
pub struct RecordingFactory {
    calls: Arc<Mutex<Vec<(String, String)>>>,
    delay: Option<Duration>,
    failures_left: Arc<AtomicUsize>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Make the next `count` creations fail.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for_topic(&self, topic: &str) -> usize {
        self.calls().iter().filter(|(t, _)| t == topic).count()
    }

    pub fn calls_by_name(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for (_, name) in self.calls() {
            *counts.entry(name).or_insert(0) += 1;
        }
        counts
    }
}

#[async_trait]
impl HandleFactory for RecordingFactory {
    type Handle = RecordingHandle;

    async fn create(&self, topic: &str, options: &ProducerOptions) -> Result<RecordingHandle> {
        let name = options.producer_name.clone().unwrap_or_default();
        self.calls
            .lock()
            .unwrap()
            .push((topic.to_string(), name.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(Error::Connection("simulated broker outage".to_string()));
        }

        Ok(RecordingHandle {
            topic: topic.to_string(),
            name,
            closes: AtomicUsize::new(0),
        })
    }
}
