//! Notification stream reader.
//!
//! Opens the long-lived `GET` subscription for a session and republishes each
//! decoded frame on the [`EventBus`] in wire order. The returned
//! [`Subscription`] is the only owner of the connection.

use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::ACCEPT;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec::FrameDecoder;
use crate::error::{McpError, Result};
use crate::events::{ClientEvent, EventBus};
use crate::protocol::{ACCEPT_STREAM, SESSION_HEADER};
use crate::session::Session;

/// Handle to an open subscription.
///
/// Dropping the handle tears the connection down as well.
#[derive(Debug)]
pub struct Subscription {
    session_id: String,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    /// Session this subscription belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether the reader is still attached to the connection.
    pub fn is_active(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Terminate the connection.
    ///
    /// Returns `true` if this call tore it down; later calls are no-ops that
    /// return `false`. A local teardown does not publish `Disconnected`.
    pub fn unsubscribe(&self) -> bool {
        let Some(task) = self.task.lock().take() else {
            return false;
        };
        self.cancel.cancel();
        task.abort();
        tracing::debug!(session = %self.session_id, "unsubscribed from MCP stream");
        true
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Open the subscription stream for `session`.
///
/// Fails with [`McpError::Connection`] unless the server answers with a
/// success status.
pub async fn subscribe(
    http: &reqwest::Client,
    session: &Session,
    events: EventBus,
) -> Result<Subscription> {
    let response = http
        .get(session.endpoint().clone())
        .header(ACCEPT, ACCEPT_STREAM)
        .header(SESSION_HEADER, session.token())
        .send()
        .await
        .map_err(|e| McpError::connection(format!("failed to open stream: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(McpError::connection(format!(
            "stream rejected with HTTP {}",
            status
        )));
    }

    tracing::info!(session = %session.token(), "MCP notification stream open");

    let cancel = CancellationToken::new();
    let task = tokio::spawn(read_stream(
        response,
        events,
        cancel.clone(),
        session.token().to_string(),
    ));

    Ok(Subscription {
        session_id: session.token().to_string(),
        cancel,
        task: Mutex::new(Some(task)),
    })
}

async fn read_stream(
    response: reqwest::Response,
    events: EventBus,
    cancel: CancellationToken,
    session_id: String,
) {
    let mut body = response.bytes_stream();
    let mut decoder = FrameDecoder::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                decoder.push(&bytes);
                publish_frames(&mut decoder, &events, &session_id);
            }
            Some(Err(e)) => {
                tracing::warn!(session = %session_id, error = %e, "MCP stream read failed");
                break;
            }
            None => break,
        }
    }

    match decoder.finish() {
        Ok(Some(frame)) => events.publish(ClientEvent::from_message(frame.message)),
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(session = %session_id, error = %e, "dropping malformed trailing frame")
        }
    }

    tracing::info!(session = %session_id, "MCP notification stream closed by server");
    events.publish(ClientEvent::Disconnected);
}

fn publish_frames(decoder: &mut FrameDecoder, events: &EventBus, session_id: &str) {
    loop {
        match decoder.decode() {
            Ok(Some(frame)) => {
                let event = ClientEvent::from_message(frame.message);
                if let ClientEvent::ArtifactReady { id, url } = &event {
                    tracing::debug!(session = %session_id, id = ?id, url = %url, "artifact ready");
                }
                events.publish(event);
            }
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "dropping malformed frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_frames_in_wire_order() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        let mut decoder = FrameDecoder::new();

        decoder.push(b"data: {\"jsonrpc\":\"2.0\",\"method\":\"first\"}\n\n");
        decoder.push(b"data: {broken\n\n");
        decoder.push(b"data: {\"jsonrpc\":\"2.0\",\"id\":\"c-1\",\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"http://example/img.png\"}]}}\n\n");
        decoder.push(b"data: {\"jsonrpc\":\"2.0\",\"method\":\"last\"}");
        publish_frames(&mut decoder, &bus, "s-1");

        match sub.try_recv() {
            Some(ClientEvent::Message(msg)) => assert_eq!(msg.method.as_deref(), Some("first")),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(
            sub.try_recv(),
            Some(ClientEvent::ArtifactReady {
                id: Some("c-1".to_string()),
                url: "http://example/img.png".to_string(),
            })
        );
        // Last block is still waiting for its terminator.
        assert!(sub.try_recv().is_none());
        assert!(decoder.buffered() > 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let subscription = Subscription {
            session_id: "s-1".to_string(),
            cancel: CancellationToken::new(),
            task: Mutex::new(Some(tokio::spawn(std::future::pending::<()>()))),
        };

        assert!(subscription.is_active());
        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        assert!(!subscription.is_active());
    }
}
