//! Fire-and-forget research progress notifications.
//!
//! The orchestrator and aggregator emit [`ProgressEvent`]s through an
//! injected [`ProgressSink`]. Emission is synchronous and never blocks the
//! emitting stage: the hub implementation fans out over bounded
//! `tokio::sync::broadcast` channels, so a lagging subscriber loses old
//! events instead of slowing research down.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Well-known step ids emitted by the pipeline.
pub mod steps {
    /// Initial search probe
    pub const PROBE: &str = "probe";
    /// Strategy planning passes
    pub const PLAN: &str = "plan";
    /// Concurrent source gathering
    pub const GATHER: &str = "gather";
    /// Record synthesis
    pub const SYNTHESIZE: &str = "synthesize";
    /// Confidence scoring
    pub const SCORE: &str = "score";
}

/// Lifecycle state of a research step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
    /// Completed with a notable find (e.g. candidate site located)
    Found,
}

/// One progress notification. Purely informational; no ownership semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A step changed state
    Step {
        id: String,
        status: StepStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },

    /// Running count of collected sources
    Sources { count: usize },

    /// Confidence score became known
    Confidence { score: u8 },

    /// Coarse stage label for UI headers
    Stage { label: String },
}

/// Observer interface consumed by UI collaborators.
///
/// All methods are fire-and-forget and must not block; implementations that
/// need to do slow work should hand the event off to their own channel.
pub trait ProgressSink: Send + Sync {
    /// Deliver one event.
    fn emit(&self, event: ProgressEvent);

    /// Report a step transition.
    fn update_step(&self, id: &str, status: StepStatus, detail: Option<&str>) {
        self.emit(ProgressEvent::Step {
            id: id.to_string(),
            status,
            detail: detail.map(|d| d.to_string()),
        });
    }

    /// Report the running source count.
    fn update_sources(&self, count: usize) {
        self.emit(ProgressEvent::Sources { count });
    }

    /// Report the confidence score.
    fn update_confidence(&self, score: u8) {
        self.emit(ProgressEvent::Confidence { score });
    }

    /// Report the coarse stage label.
    fn update_stage(&self, label: &str) {
        self.emit(ProgressEvent::Stage {
            label: label.to_string(),
        });
    }
}

/// Sink that drops every event. Used when the caller passes no observer.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Topic-keyed broadcast hub for streaming progress to consumers.
///
/// Topics are opaque strings (one per research request, e.g.
/// `research:<uuid>`). Thread-safe and cloneable; publishing to a topic with
/// no subscribers is a no-op.
#[derive(Clone)]
pub struct ProgressHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<ProgressEvent>>>>,
    capacity: usize,
}

impl ProgressHub {
    /// Create a hub with default per-topic capacity (256 events).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a hub with the given per-topic channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Publish an event to a topic. Never blocks; send errors (no active
    /// receivers) are ignored.
    pub fn publish(&self, topic: &str, event: ProgressEvent) {
        let channels = self.channels.read().unwrap();
        if let Some(tx) = channels.get(topic) {
            let _ = tx.send(event);
        }
    }

    /// Subscribe to a topic, creating its channel if needed.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<ProgressEvent> {
        let mut channels = self.channels.write().unwrap();
        let tx = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        tx.subscribe()
    }

    /// Remove channels with zero subscribers (housekeeping).
    pub fn cleanup(&self) {
        let mut channels = self.channels.write().unwrap();
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }

    /// A sink that publishes into this hub under `topic`.
    pub fn sink_for(&self, topic: impl Into<String>) -> HubSink {
        HubSink {
            hub: self.clone(),
            topic: topic.into(),
        }
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new()
    }
}

/// [`ProgressSink`] bound to one hub topic.
pub struct HubSink {
    hub: ProgressHub,
    topic: String,
}

impl ProgressSink for HubSink {
    fn emit(&self, event: ProgressEvent) {
        self.hub.publish(&self.topic, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_subscribe_roundtrip() {
        let hub = ProgressHub::new();
        let mut rx = hub.subscribe("research:abc");

        let event = ProgressEvent::Sources { count: 3 };
        hub.publish("research:abc", event.clone());

        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let hub = ProgressHub::new();
        hub.publish("nobody:listening", ProgressEvent::Sources { count: 1 });
    }

    #[tokio::test]
    async fn sink_methods_map_to_events() {
        let hub = ProgressHub::new();
        let mut rx = hub.subscribe("research:xyz");
        let sink = hub.sink_for("research:xyz");

        sink.update_step(steps::PROBE, StepStatus::Active, None);
        sink.update_sources(2);
        sink.update_confidence(90);
        sink.update_stage("Gathering sources");

        assert!(matches!(
            rx.recv().await.unwrap(),
            ProgressEvent::Step { status: StepStatus::Active, .. }
        ));
        assert_eq!(rx.recv().await.unwrap(), ProgressEvent::Sources { count: 2 });
        assert_eq!(
            rx.recv().await.unwrap(),
            ProgressEvent::Confidence { score: 90 }
        );
        assert!(matches!(rx.recv().await.unwrap(), ProgressEvent::Stage { .. }));
    }

    #[test]
    fn cleanup_removes_empty_channels() {
        let hub = ProgressHub::new();
        let rx = hub.subscribe("ephemeral");
        assert_eq!(hub.channels.read().unwrap().len(), 1);

        drop(rx);
        hub.cleanup();
        assert_eq!(hub.channels.read().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive() {
        let hub = ProgressHub::new();
        let mut rx1 = hub.subscribe("multi");
        let mut rx2 = hub.subscribe("multi");

        hub.publish("multi", ProgressEvent::Confidence { score: 85 });

        assert_eq!(
            rx1.recv().await.unwrap(),
            ProgressEvent::Confidence { score: 85 }
        );
        assert_eq!(
            rx2.recv().await.unwrap(),
            ProgressEvent::Confidence { score: 85 }
        );
    }
}
