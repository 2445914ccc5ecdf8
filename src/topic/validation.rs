//! Topic name and filter validation
//!
//! Key rules (MQTT v3.1.1 section 4.7):
//! - Topic names MUST NOT contain wildcards (+ or #)
//! - Topic filters MAY contain wildcards
//! - Multi-level wildcard (#) must occupy the last level
//! - Single-level wildcard (+) must occupy an entire level

use super::TOPIC_SEPARATOR;

/// Longest string a two-byte length prefix can carry
const MAX_TOPIC_LEN: usize = 65535;

fn validate_common(topic: &str, kind: &'static str) -> Result<(), String> {
    if topic.is_empty() {
        return Err(format!("{} cannot be empty", kind));
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(format!("{} exceeds maximum length", kind));
    }
    if topic.contains('\0') {
        return Err(format!("{} cannot contain null character", kind));
    }
    Ok(())
}

/// Validate a topic name (used in PUBLISH)
pub fn validate_topic_name(topic: &str) -> Result<(), String> {
    validate_common(topic, "topic name")?;

    if topic.contains(['+', '#']) {
        return Err("topic name cannot contain wildcards".to_string());
    }

    Ok(())
}

/// Validate a topic filter (used in SUBSCRIBE)
///
/// Shared subscriptions (`$share/{group}/{filter}`) are accepted; the group
/// must be non-empty and wildcard free and the remainder is validated as a
/// regular filter.
pub fn validate_topic_filter(filter: &str) -> Result<(), String> {
    validate_common(filter, "topic filter")?;

    let actual_filter = match filter.strip_prefix("$share/") {
        Some(rest) => {
            let (group, actual) = rest
                .split_once(TOPIC_SEPARATOR)
                .ok_or_else(|| "invalid shared subscription format".to_string())?;
            if group.is_empty() || group.contains(['+', '#']) {
                return Err("invalid shared subscription group name".to_string());
            }
            if actual.is_empty() {
                return Err("shared subscription filter cannot be empty".to_string());
            }
            actual
        }
        None => filter,
    };

    let mut levels = actual_filter.split(TOPIC_SEPARATOR).peekable();
    while let Some(level) = levels.next() {
        if level.contains('#') && (level != "#" || levels.peek().is_some()) {
            return Err("multi-level wildcard must occupy the last level".to_string());
        }
        if level.contains('+') && level != "+" {
            return Err("single-level wildcard must occupy an entire level".to_string());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_topic_name() {
        assert!(validate_topic_name("test").is_ok());
        assert!(validate_topic_name("timestamp-enriched").is_ok());
        assert!(validate_topic_name("/test/topic").is_ok());
        assert!(validate_topic_name("test/topic/").is_ok());

        assert!(validate_topic_name("").is_err());
        assert!(validate_topic_name("test+topic").is_err());
        assert!(validate_topic_name("test/+/topic").is_err());
        assert!(validate_topic_name("test/#").is_err());
        assert!(validate_topic_name("nul\0byte").is_err());
    }

    #[test]
    fn test_validate_topic_filter() {
        assert!(validate_topic_filter("test").is_ok());
        assert!(validate_topic_filter("+").is_ok());
        assert!(validate_topic_filter("#").is_ok());
        assert!(validate_topic_filter("sensors/+/temp").is_ok());
        assert!(validate_topic_filter("sensors/#").is_ok());
        assert!(validate_topic_filter("+/+/+").is_ok());

        assert!(validate_topic_filter("").is_err());
        assert!(validate_topic_filter("test+").is_err());
        assert!(validate_topic_filter("test#").is_err());
        assert!(validate_topic_filter("test/#/more").is_err());
        assert!(validate_topic_filter("+test").is_err());
    }

    #[test]
    fn test_validate_shared_filter() {
        assert!(validate_topic_filter("$share/group/sensors/#").is_ok());

        assert!(validate_topic_filter("$share/group").is_err());
        assert!(validate_topic_filter("$share//sensors").is_err());
        assert!(validate_topic_filter("$share/gr+up/sensors").is_err());
        assert!(validate_topic_filter("$share/group/").is_err());
    }
}
