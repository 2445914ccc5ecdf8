//! Pending subscription tracking
//!
//! Correlates SUBSCRIBE packet identifiers with the filters they requested
//! so SUBACKs can be logged by topic.

use std::collections::HashMap;

/// Packet id to topic filter map for unacknowledged subscriptions
#[derive(Debug, Default)]
pub struct SubscriptionTracker {
    pending: HashMap<u16, String>,
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the filter requested under `packet_id`. A reused id
    /// replaces the earlier entry.
    pub fn record(&mut self, packet_id: u16, filter: impl Into<String>) {
        self.pending.insert(packet_id, filter.into());
    }

    /// Take the filter requested under `packet_id`
    pub fn resolve(&mut self, packet_id: u16) -> Option<String> {
        self.pending.remove(&packet_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Forget all pending entries (the connection they belong to is gone)
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_resolve() {
        let mut tracker = SubscriptionTracker::new();
        tracker.record(1, "sensors/#");
        tracker.record(2, "devices/+/status");
        assert_eq!(tracker.len(), 2);

        assert_eq!(tracker.resolve(2).as_deref(), Some("devices/+/status"));
        assert_eq!(tracker.resolve(2), None);
        assert_eq!(tracker.resolve(1).as_deref(), Some("sensors/#"));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_unknown_id() {
        let mut tracker = SubscriptionTracker::new();
        assert_eq!(tracker.resolve(42), None);
    }

    #[test]
    fn test_reused_id_replaces() {
        let mut tracker = SubscriptionTracker::new();
        tracker.record(7, "a");
        tracker.record(7, "b");
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.resolve(7).as_deref(), Some("b"));
    }

    #[test]
    fn test_clear() {
        let mut tracker = SubscriptionTracker::new();
        tracker.record(1, "a");
        tracker.record(2, "b");
        tracker.clear();
        assert!(tracker.is_empty());
        assert_eq!(tracker.resolve(1), None);
    }
}
