//! Typed client events.
//!
//! The stream reader and the client publish to an [`EventBus`]; consumers pick
//! the kinds they care about with [`EventBus::subscribe_to`].

use tokio::sync::broadcast;

use crate::protocol::JsonRpcMessage;

/// Events buffered per subscriber by [`EventBus::default`].
pub const DEFAULT_CAPACITY: usize = 256;

/// An event published by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Connect finished: session negotiated, stream open, tools listed.
    Ready {
        /// Session token.
        session_id: String,
        /// Number of tools in the registry.
        tools_count: usize,
    },
    /// A frame from the subscription that is not an artifact notification.
    Message(JsonRpcMessage),
    /// A frame whose result content carries a URL-bearing text item.
    ArtifactReady {
        /// Id of the request the frame answers, if any.
        id: Option<String>,
        /// The artifact URL.
        url: String,
    },
    /// The server closed the subscription stream.
    Disconnected,
}

impl ClientEvent {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ready { .. } => EventKind::Ready,
            Self::Message(_) => EventKind::Message,
            Self::ArtifactReady { .. } => EventKind::ArtifactReady,
            Self::Disconnected => EventKind::Disconnected,
        }
    }

    /// Classify a subscription frame.
    pub fn from_message(message: JsonRpcMessage) -> Self {
        match message.artifact_url() {
            Some(url) => Self::ArtifactReady {
                id: message.id_string(),
                url: url.to_string(),
            },
            None => Self::Message(message),
        }
    }
}

/// Event kinds a subscriber can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`ClientEvent::Ready`].
    Ready,
    /// [`ClientEvent::Message`].
    Message,
    /// [`ClientEvent::ArtifactReady`].
    ArtifactReady,
    /// [`ClientEvent::Disconnected`].
    Disconnected,
}

/// Broadcast fan-out of [`ClientEvent`]s.
///
/// Each subscriber has its own bounded queue of `capacity` events
/// ([`DEFAULT_CAPACITY`] by default). A subscriber that falls further behind
/// loses the oldest queued events, `ArtifactReady` included; the loss is only
/// logged at `warn`. Consumers that may stall should drain promptly or size
/// the bus with [`EventBus::new`] (see [`crate::McpChartClient::with_event_capacity`]).
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus that buffers up to `capacity` events per slow subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to every event kind.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            rx: self.tx.subscribe(),
            kinds: None,
        }
    }

    /// Subscribe to the listed kinds only.
    pub fn subscribe_to(&self, kinds: &[EventKind]) -> EventSubscriber {
        EventSubscriber {
            rx: self.tx.subscribe(),
            kinds: Some(kinds.to_vec()),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving half of an [`EventBus`] subscription.
#[derive(Debug)]
pub struct EventSubscriber {
    rx: broadcast::Receiver<ClientEvent>,
    kinds: Option<Vec<EventKind>>,
}

impl EventSubscriber {
    /// Wait for the next matching event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next matching event without waiting.
    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    fn accepts(&self, event: &ClientEvent) -> bool {
        match &self.kinds {
            Some(kinds) => kinds.contains(&event.kind()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(value: serde_json::Value) -> JsonRpcMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_classify_artifact() {
        let event = ClientEvent::from_message(message(json!({
            "jsonrpc": "2.0",
            "id": "req-4",
            "result": {"content": [{"type": "text", "text": "http://example/img.png"}]}
        })));
        assert_eq!(
            event,
            ClientEvent::ArtifactReady {
                id: Some("req-4".to_string()),
                url: "http://example/img.png".to_string()
            }
        );
    }

    #[test]
    fn test_classify_generic_message() {
        let raw = message(json!({"jsonrpc": "2.0", "method": "notifications/progress"}));
        let event = ClientEvent::from_message(raw.clone());
        assert_eq!(event, ClientEvent::Message(raw));
        assert_eq!(event.kind(), EventKind::Message);
    }

    #[tokio::test]
    async fn test_filtered_subscription() {
        let bus = EventBus::default();
        let mut all = bus.subscribe();
        let mut closes = bus.subscribe_to(&[EventKind::Disconnected]);

        bus.publish(ClientEvent::Message(message(json!({"jsonrpc": "2.0"}))));
        bus.publish(ClientEvent::Disconnected);

        assert_eq!(all.recv().await.unwrap().kind(), EventKind::Message);
        assert_eq!(all.recv().await.unwrap().kind(), EventKind::Disconnected);
        assert_eq!(closes.recv().await, Some(ClientEvent::Disconnected));
        assert!(closes.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_recv_ends_when_bus_dropped() {
        let bus = EventBus::new(4);
        let mut sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(bus);
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn test_lagging_subscriber_loses_oldest_events() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for n in 0..4 {
            bus.publish(ClientEvent::ArtifactReady {
                id: Some(n.to_string()),
                url: format!("http://example/{}.png", n),
            });
        }

        match sub.try_recv() {
            Some(ClientEvent::ArtifactReady { id, .. }) => assert_eq!(id.as_deref(), Some("2")),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(sub.try_recv(), Some(ClientEvent::ArtifactReady { .. })));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(ClientEvent::Disconnected);
    }
}
