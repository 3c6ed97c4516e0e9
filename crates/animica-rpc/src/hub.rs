//! Per-topic broadcast hub for WS subscriptions.
//!
//! Every topic owns one bounded `tokio::sync::broadcast` channel; each
//! subscriber is a receiver. Ordering is per-topic FIFO until a receiver
//! lags, at which point it observes `Lagged(n)` and the server emits an
//! `overflow` notice instead of silently skipping.

use std::collections::HashMap;
use tokio::sync::broadcast;

/// WS subscription topics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    NewHeads,
    PendingTxs,
    DaCommitted,
    CapJobCompleted,
    AicfJobAssigned,
    AicfJobCompleted,
    RandBeaconFinalized,
}

impl Topic {
    pub const ALL: [Topic; 7] = [
        Topic::NewHeads,
        Topic::PendingTxs,
        Topic::DaCommitted,
        Topic::CapJobCompleted,
        Topic::AicfJobAssigned,
        Topic::AicfJobCompleted,
        Topic::RandBeaconFinalized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::NewHeads => "newHeads",
            Topic::PendingTxs => "pendingTxs",
            Topic::DaCommitted => "da.committed",
            Topic::CapJobCompleted => "cap.jobCompleted",
            Topic::AicfJobAssigned => "aicf.jobAssigned",
            Topic::AicfJobCompleted => "aicf.jobCompleted",
            Topic::RandBeaconFinalized => "rand.beaconFinalized",
        }
    }

    pub fn parse(s: &str) -> Option<Topic> {
        Topic::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

/// Queue depth per subscriber before overflow.
const QUEUE_DEPTH: usize = 256;

#[derive(Clone)]
pub struct SubscriptionHub {
    senders: HashMap<Topic, broadcast::Sender<serde_json::Value>>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        let senders = Topic::ALL
            .iter()
            .map(|t| (*t, broadcast::channel(QUEUE_DEPTH).0))
            .collect();
        Self { senders }
    }

    /// Publish to a topic. A topic with no subscribers drops silently.
    pub fn publish(&self, topic: Topic, data: serde_json::Value) {
        let _ = self.senders[&topic].send(data);
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<serde_json::Value> {
        self.senders[&topic].subscribe()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.senders[&topic].receiver_count()
    }
}

impl Default for SubscriptionHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names_roundtrip() {
        for topic in Topic::ALL {
            assert_eq!(Topic::parse(topic.as_str()), Some(topic));
        }
        assert_eq!(Topic::parse("nope"), None);
    }

    #[tokio::test]
    async fn publish_reaches_subscriber_in_order() {
        let hub = SubscriptionHub::new();
        let mut rx = hub.subscribe(Topic::NewHeads);
        hub.publish(Topic::NewHeads, serde_json::json!({"height": 1}));
        hub.publish(Topic::NewHeads, serde_json::json!({"height": 2}));
        assert_eq!(rx.recv().await.unwrap()["height"], 1);
        assert_eq!(rx.recv().await.unwrap()["height"], 2);
    }

    #[tokio::test]
    async fn lagged_subscriber_sees_dropped_count() {
        let hub = SubscriptionHub::new();
        let mut rx = hub.subscribe(Topic::PendingTxs);
        for i in 0..(QUEUE_DEPTH + 10) {
            hub.publish(Topic::PendingTxs, serde_json::json!(i));
        }
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(n)) => assert!(n >= 10),
            other => panic!("expected lag, got {other:?}"),
        }
    }
}
