//! Topic Mapping for Republishing
//!
//! An inbound topic maps to `prefix/<last level of the inbound topic>`.

use crate::topic::{last_level, TOPIC_SEPARATOR};

/// Compute the output topic for an inbound topic.
///
/// The prefix is used as given; callers keep it free of trailing separators.
pub fn map_topic(inbound: &str, prefix: &str) -> String {
    let last = last_level(inbound);
    let mut topic = String::with_capacity(prefix.len() + 1 + last.len());
    topic.push_str(prefix);
    topic.push(TOPIC_SEPARATOR);
    topic.push_str(last);
    topic
}

/// Maps inbound topics onto a fixed target prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMapper {
    prefix: String,
}

impl TopicMapper {
    /// Create a mapper, stripping any trailing separators from `prefix`
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        let trimmed = prefix.trim_end_matches(TOPIC_SEPARATOR).len();
        prefix.truncate(trimmed);
        Self { prefix }
    }

    /// Target prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Output topic for `inbound`
    #[inline]
    pub fn map(&self, inbound: &str) -> String {
        map_topic(inbound, &self.prefix)
    }
}
