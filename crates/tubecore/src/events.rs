//! In-process event bus feeding the browser push channel.
//!
//! Producers (enrichment, discovery, downloads) publish [`Event`]s; every
//! connected WebSocket holds its own receiver. Events published while
//! nobody listens are dropped.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use strum::{AsRefStr, Display};
use tokio::sync::broadcast;

use crate::core::config;

/// Event families, used by the client to route updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    SubscriptionEnrichment,
    VideoDiscovery,
    Download,
    System,
}

/// One pushed update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub namespace: Namespace,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    /// RFC 3339, UTC
    pub timestamp: String,
}

impl Event {
    pub fn new(namespace: Namespace, kind: impl Into<String>, data: Value) -> Self {
        Self {
            namespace,
            kind: kind.into(),
            data,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Cloneable handle to the broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(config::events::CHANNEL_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn emit(&self, event: Event) {
        log::debug!("Event {}.{}", event.namespace, event.kind);
        // Err only means no receivers
        let _ = self.sender.send(event);
    }

    /// Emits a `subscription_enrichment` event about `url`.
    pub fn enrichment(&self, kind: &str, url: &str, message: impl Into<String>) {
        self.emit(Event::new(
            Namespace::SubscriptionEnrichment,
            kind,
            json!({ "url": url, "message": message.into() }),
        ));
    }

    /// Emits a `progress` event with a rounded percentage.
    pub fn progress(&self, namespace: Namespace, current: usize, total: usize, message: impl Into<String>, extra: Value) {
        let percent = if total > 0 {
            (current as f64 / total as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        let mut data = json!({
            "current": current,
            "total": total,
            "percent": percent,
            "message": message.into(),
        });
        if let (Value::Object(target), Value::Object(extra)) = (&mut data, extra) {
            target.extend(extra);
        }
        self.emit(Event::new(namespace, "progress", data));
    }

    /// Emits a `download` event about `url`.
    pub fn download(&self, kind: &str, url: &str, data: Value) {
        let mut payload = json!({ "url": url });
        if let (Value::Object(target), Value::Object(extra)) = (&mut payload, data) {
            target.extend(extra);
        }
        self.emit(Event::new(Namespace::Download, kind, payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_key() {
        let event = Event::new(Namespace::VideoDiscovery, "progress", json!({"current": 1}));
        let value: Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value["namespace"], "video_discovery");
        assert_eq!(value["type"], "progress");
        assert_eq!(value["data"]["current"], 1);
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_emit_without_listeners_is_fine() {
        let bus = EventBus::new(4);
        bus.enrichment("started", "https://youtu.be/x", "hello");
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        bus.progress(Namespace::VideoDiscovery, 1, 3, "working", json!({"channel_id": "UC1"}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, "progress");
        assert_eq!(event.data["percent"], 33.3);
        assert_eq!(event.data["channel_id"], "UC1");
    }

    #[tokio::test]
    async fn test_download_event_carries_url() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.download("finished", "https://youtu.be/x", json!({"success": true}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.namespace, Namespace::Download);
        assert_eq!(event.data["url"], "https://youtu.be/x");
        assert_eq!(event.data["success"], true);
    }
}
