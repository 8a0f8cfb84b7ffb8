use crate::{Error, Result};
use std::fmt;

/// Name of the topic every producer in a pool publishes to.
///
/// Fixed for the lifetime of the pool and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SinkTopic(String);

impl SinkTopic {
    /// Validate and wrap a topic name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the name is empty or only whitespace.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::Config("sink topic must not be empty".to_string()));
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SinkTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for SinkTopic {
    type Error = Error;

    fn try_from(name: &str) -> Result<Self> {
        Self::new(name)
    }
}
