//! Event types for the Credo gateway
//!
//! Events are broadcast via EventBus and serialized for SSE transmission.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Gateway event types
///
/// Published after durable state changes so connected UIs can follow a
/// report through the external processing lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GatewayEvent {
    /// External processing initiated for a report
    ReportInitiated {
        report_id: String,
        processing_channel: String,
        jurisdiction: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A report's persisted status changed (callback applied or handoff
    /// failure recorded)
    ReportStatusChanged {
        report_id: String,
        status: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A dispute letter's status changed
    DisputeStatusChanged {
        letter_id: String,
        report_id: String,
        status: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl GatewayEvent {
    /// Event type name used as the SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            GatewayEvent::ReportInitiated { .. } => "ReportInitiated",
            GatewayEvent::ReportStatusChanged { .. } => "ReportStatusChanged",
            GatewayEvent::DisputeStatusChanged { .. } => "DisputeStatusChanged",
        }
    }
}

/// Broadcast bus for gateway events
///
/// Cheap to clone; subscribers that fall behind the channel capacity drop
/// the oldest events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GatewayEvent>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers. Returns the number of
    /// subscribers that received it (zero subscribers is not an error).
    pub fn publish(&self, event: GatewayEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let delivered = bus.publish(GatewayEvent::ReportStatusChanged {
            report_id: "r-1".to_string(),
            status: "SUCCESS_EXTERNAL_ANALYSIS_COMPLETE".to_string(),
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(delivered, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "ReportStatusChanged");
    }

    #[test]
    fn publish_without_subscribers_is_ok() {
        let bus = EventBus::new(4);
        let delivered = bus.publish(GatewayEvent::ReportInitiated {
            report_id: "r-1".to_string(),
            processing_channel: "external".to_string(),
            jurisdiction: "US".to_string(),
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(delivered, 0);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = GatewayEvent::DisputeStatusChanged {
            letter_id: "l-1".to_string(),
            report_id: "r-1".to_string(),
            status: "Sent".to_string(),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "DisputeStatusChanged");
        assert_eq!(json["letter_id"], "l-1");
    }
}
