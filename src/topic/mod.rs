//! Topic helpers
//!
//! Topic name/filter validation and level splitting shared by the
//! configuration layer and the topic mapper.

pub mod validation;

pub use validation::{validate_topic_filter, validate_topic_name};

/// Reserved topic level separator
pub const TOPIC_SEPARATOR: char = '/';

/// Return the last level of a topic, or the whole topic when it has no
/// separator.
#[inline]
pub fn last_level(topic: &str) -> &str {
    match topic.rfind(TOPIC_SEPARATOR) {
        Some(pos) => &topic[pos + TOPIC_SEPARATOR.len_utf8()..],
        None => topic,
    }
}
