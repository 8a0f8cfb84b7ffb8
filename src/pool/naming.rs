//! Producer naming.
//!
//! Every producer in a pool publishes to the same sink topic, so the broker can
//! only tell them apart by name. Names are derived from the source key as
//! `{len}-{topic}-{partition}` where `len` is the byte length of the source
//! topic. The length prefix makes the encoding decodable, so two different
//! keys can never share a name even when topic names contain `-` or digits.

/// Derive the producer name for a source topic partition.
///
/// ```rust
/// use sink_producers::pool::make_producer_name;
///
/// assert_eq!(make_producer_name("orders", 3), "6-orders-3");
/// ```
pub fn make_producer_name(source_topic: &str, partition: u32) -> String {
    format!("{}-{}-{}", source_topic.len(), source_topic, partition)
}
