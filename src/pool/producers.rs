use super::handle::{HandleFactory, ProducerOptions};
use super::registry::{ProducerRegistry, ProducerView};
use super::topic::SinkTopic;
use crate::{Error, Result};
use std::sync::{Arc, OnceLock};
use tracing::info;

/// Producers for many source topic partitions writing to one sink topic.
///
/// Each `(source topic, partition)` pair gets its own producer, named after
/// the pair, so the sink can tell upstream partitions apart. The pool must be
/// [`initialize`](Self::initialize)d before use and [`close`](Self::close)d
/// on shutdown.
///
/// # Example
///
/// ```rust,no_run
/// use sink_producers::kafka::KafkaProducerFactory;
/// use sink_producers::{Config, SinkTopicProducers};
///
/// # async fn example() -> sink_producers::Result<()> {
/// let config = Config::from_file("sink-producers.toml")?;
/// let factory = KafkaProducerFactory::new(&config.kafka);
/// let producers = SinkTopicProducers::from_config(&config, factory)?;
/// producers.initialize()?;
///
/// let producer = producers.get_producer("clicks", 3).await?;
/// producer.send(None, b"payload").await?;
///
/// producers.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct SinkTopicProducers<F: HandleFactory> {
    sink_topic: SinkTopic,
    factory: Arc<F>,
    options: ProducerOptions,
    registry: OnceLock<ProducerRegistry<F>>,
}

impl<F: HandleFactory> SinkTopicProducers<F> {
    pub fn new(factory: F, sink_topic: SinkTopic) -> Self {
        Self::with_options(factory, sink_topic, ProducerOptions::default())
    }

    /// Create a pool whose producers all start from `options`.
    pub fn with_options(factory: F, sink_topic: SinkTopic, options: ProducerOptions) -> Self {
        Self {
            sink_topic,
            factory: Arc::new(factory),
            options,
            registry: OnceLock::new(),
        }
    }

    pub fn from_config(config: &crate::Config, factory: F) -> Result<Self> {
        let sink_topic = SinkTopic::new(config.pool.sink_topic.as_str())?;
        Ok(Self::with_options(factory, sink_topic, config.producer_options()))
    }

    #[must_use]
    pub fn sink_topic(&self) -> &SinkTopic {
        &self.sink_topic
    }

    /// Prepare the pool for use. Performs no I/O.
    ///
    /// Calling this again has no effect.
    pub fn initialize(&self) -> Result<()> {
        self.registry.get_or_init(|| {
            info!(sink_topic = %self.sink_topic, "Initializing producer pool");
            ProducerRegistry::new(
                self.sink_topic.clone(),
                Arc::clone(&self.factory),
                self.options.clone(),
            )
        });
        Ok(())
    }

    /// Producer for a source topic partition, created on first request.
    pub async fn get_producer(&self, source_topic: &str, partition: u32) -> Result<Arc<F::Handle>> {
        self.registry()?.get_or_create(source_topic, partition).await
    }

    /// Close the producer for a source topic partition, if one exists.
    pub async fn close_producer(&self, source_topic: &str, partition: u32) -> Result<()> {
        self.registry()?.close(source_topic, partition).await
    }

    /// Close every producer. The pool refuses new producers afterwards.
    pub async fn close(&self) -> Result<()> {
        self.registry()?.close_all().await
    }

    /// Live producers, keyed by source topic then partition.
    pub fn producers(&self) -> Result<ProducerView<F::Handle>> {
        Ok(self.registry()?.snapshot())
    }

    fn registry(&self) -> Result<&ProducerRegistry<F>> {
        self.registry.get().ok_or(Error::NotInitialized)
    }
}
