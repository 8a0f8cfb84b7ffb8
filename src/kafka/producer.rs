use crate::config::KafkaConfig;
use crate::pool::{HandleFactory, ProducerOptions, PublishHandle};
use crate::{Error, Result};
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, instrument};

/// Opens rdkafka producers for a producer pool.
#[derive(Debug, Clone)]
pub struct KafkaProducerFactory {
    config: KafkaConfig,
}

impl KafkaProducerFactory {
    pub fn new(config: &KafkaConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Client settings for one producer: broker defaults first, then the
    /// pool's option overrides, then raw properties.
    pub fn client_config(&self, options: &ProducerOptions) -> ClientConfig {
        let mut client = ClientConfig::new();
        client
            .set("bootstrap.servers", self.config.brokers.join(","))
            .set(
                "compression.type",
                options.compression.as_deref().unwrap_or(self.config.compression.as_str()),
            )
            .set("acks", options.acks.as_deref().unwrap_or(self.config.acks.as_str()))
            .set(
                "linger.ms",
                options.linger_ms.unwrap_or(self.config.linger_ms).to_string(),
            )
            .set(
                "batch.size",
                options.batch_size.unwrap_or(self.config.batch_size).to_string(),
            )
            .set(
                "queue.buffering.max.kbytes",
                (self.config.buffer_memory / 1024).max(1).to_string(),
            )
            .set(
                "message.timeout.ms",
                options
                    .message_timeout_ms
                    .unwrap_or(self.config.message_timeout_ms)
                    .to_string(),
            );

        if let Some(name) = &options.producer_name {
            client.set("client.id", name);
        }
        for (key, value) in &options.properties {
            client.set(key, value);
        }
        client
    }
}

#[async_trait]
impl HandleFactory for KafkaProducerFactory {
    type Handle = KafkaProducer;

    #[instrument(skip(self, options), fields(producer = ?options.producer_name))]
    async fn create(&self, topic: &str, options: &ProducerOptions) -> Result<KafkaProducer> {
        let producer: FutureProducer = self.client_config(options).create()?;
        debug!("Opened Kafka producer");

        let queue_timeout = if options.block_if_queue_full {
            Timeout::Never
        } else {
            Timeout::After(Duration::ZERO)
        };

        Ok(KafkaProducer {
            producer,
            topic: topic.to_string(),
            name: options.producer_name.clone().unwrap_or_default(),
            queue_timeout,
            flush_timeout: Duration::from_millis(self.config.flush_timeout_ms),
            closed: AtomicBool::new(false),
        })
    }
}

/// A Kafka producer bound to the pool's sink topic.
pub struct KafkaProducer {
    producer: FutureProducer,
    topic: String,
    name: String,
    queue_timeout: Timeout,
    flush_timeout: Duration,
    closed: AtomicBool,
}

impl KafkaProducer {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Publish one record to the sink topic.
    ///
    /// Returns the partition and offset the broker assigned.
    pub async fn send(&self, key: Option<&str>, payload: &[u8]) -> Result<(i32, i64)> {
        if self.is_closed() {
            return Err(Error::Connection(format!("producer '{}' is closed", self.name)));
        }

        let mut record: FutureRecord<'_, str, [u8]> = FutureRecord::to(&self.topic).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }

        self.producer
            .send(record, self.queue_timeout)
            .await
            .map_err(|(e, _)| Error::Kafka(e))
    }
}

#[async_trait]
impl PublishHandle for KafkaProducer {
    /// Stop accepting sends and flush whatever is still queued.
    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let producer = self.producer.clone();
        let timeout = self.flush_timeout;
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| Error::Connection(format!("flush task for '{}' failed: {}", self.name, e)))??;

        debug!(producer = %self.name, "Flushed Kafka producer");
        Ok(())
    }
}
