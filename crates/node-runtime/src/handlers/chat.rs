//! # Chat Handler
//!
//! JSON chat payloads and the per-peer history they end up in.
//!
//! Remote lines are attributed to the sender's short unique name. Local
//! sends are echoed as [`LOCAL_SENDER`] before they go out, whether or not
//! anyone is listening.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use session_protocol::SignalHandler;
use shared_types::ipc::InboundSignal;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Sender label of locally echoed lines.
pub const LOCAL_SENDER: &str = "Me";

const HISTORY_CHANNEL_CAPACITY: usize = 256;

/// Wire form of a chat message: `{"text": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The message text.
    pub text: String,
}

impl ChatMessage {
    /// Create a message.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Encode as JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode JSON bytes.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

/// One line of chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatLine {
    /// `Me` or the sender's short unique name.
    pub from: String,
    /// The message text.
    pub text: String,
}

/// Shared, append-only chat history of one peer.
///
/// Clones share the same lines. New lines are also broadcast to
/// subscribers.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    lines: Arc<Mutex<Vec<ChatLine>>>,
    updates: broadcast::Sender<ChatLine>,
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(HISTORY_CHANNEL_CAPACITY);
        Self {
            lines: Arc::new(Mutex::new(Vec::new())),
            updates,
        }
    }

    /// Append a line.
    pub fn push(&self, line: ChatLine) {
        self.lines.lock().push(line.clone());
        let _ = self.updates.send(line);
    }

    /// Append a locally sent line.
    pub fn echo_local(&self, text: impl Into<String>) {
        self.push(ChatLine {
            from: LOCAL_SENDER.to_string(),
            text: text.into(),
        });
    }

    /// Snapshot of every line so far.
    pub fn lines(&self) -> Vec<ChatLine> {
        self.lines.lock().clone()
    }

    /// Receive lines as they are appended.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatLine> {
        self.updates.subscribe()
    }

    /// Signal handler appending decoded remote messages to this history.
    pub fn handler(&self) -> impl SignalHandler + 'static {
        let history = self.clone();
        move |signal: &InboundSignal| match ChatMessage::decode(&signal.payload) {
            Ok(message) => {
                debug!(from = %signal.sender, session_id = %signal.session_id, "Chat message received");
                history.push(ChatLine {
                    from: signal.sender.short().to_string(),
                    text: message.text,
                });
            }
            Err(error) => {
                warn!(from = %signal.sender, %error, "Dropping malformed chat payload");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::entities::{BusId, SessionId};

    fn signal(payload: &[u8]) -> InboundSignal {
        InboundSignal {
            sender: BusId::new("0123abcd", 7),
            session_id: SessionId(1),
            interface: "org.peerlink.chat".to_string(),
            member: "Chat".to_string(),
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_chat_message_wire_format() {
        let encoded = ChatMessage::new("hello").encode().unwrap();

        assert_eq!(encoded, br#"{"text":"hello"}"#.to_vec());
        assert_eq!(ChatMessage::decode(&encoded).unwrap(), ChatMessage::new("hello"));
    }

    #[test]
    fn test_handler_attributes_remote_lines_to_short_name() {
        let history = ChatHistory::new();
        let mut handler = history.handler();

        handler.on_signal(&signal(br#"{"text":"hi"}"#));

        assert_eq!(
            history.lines(),
            vec![ChatLine {
                from: "0123abcd.7".to_string(),
                text: "hi".to_string(),
            }]
        );
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        let history = ChatHistory::new();
        let mut handler = history.handler();

        handler.on_signal(&signal(b"not json"));

        assert!(history.lines().is_empty());
    }

    #[test]
    fn test_local_echo_is_labelled_me() {
        let history = ChatHistory::new();
        let mut updates = history.subscribe();

        history.echo_local("out");

        let line = updates.try_recv().unwrap();
        assert_eq!(line.from, LOCAL_SENDER);
        assert_eq!(history.lines(), vec![line]);
    }
}
