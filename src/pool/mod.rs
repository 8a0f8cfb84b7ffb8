pub mod handle;
pub mod naming;
pub mod producers;
pub mod registry;
pub mod topic;

#[cfg(test)]
pub(crate) mod test_utils;

pub use handle::{HandleFactory, ProducerOptions, PublishHandle};
pub use naming::make_producer_name;
pub use producers::SinkTopicProducers;
pub use registry::{ProducerRegistry, ProducerView};
pub use topic::SinkTopic;
