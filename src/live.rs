//! Live update channel: STOMP over WebSocket
//!
//! The server pushes new chat messages out-of-band on STOMP topics
//! (`/topic/chat.{chatId}`, `/topic/user.{userId}`). Delivery is
//! at-least-once with no ordering guarantee across reconnects; the message
//! store's dedup-by-id invariant is the sole correctness mechanism, the
//! bridge itself performs no ordering logic.
//!
//! [`ConnectionManager`] owns the socket explicitly (no shared singleton):
//! `connect`, `disconnect`, `subscribe`, `unsubscribe`. Subscriptions are
//! idempotent (repeated identical subscribes are wire no-ops) and the
//! registry survives a reconnect, so re-establishing the socket re-issues
//! every SUBSCRIBE exactly once. Registering a handler for a topic that
//! already has one atomically replaces it; no two chat windows can be
//! registered for the same topic at once.

use crate::model::Message;
use crate::window::ChatWindow;
use crate::{Error, Result};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Callback invoked with each pushed message on a subscribed topic
pub type PushHandler = Arc<dyn Fn(Message) + Send + Sync>;

type Registry = Arc<Mutex<HashMap<String, PushHandler>>>;

/// Minimal STOMP frame support, just the subset the bridge speaks
pub mod stomp {
    use crate::{Error, Result};

    /// STOMP frame commands used by the client
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Command {
        /// Client connection request
        Connect,
        /// Server connection acknowledgement
        Connected,
        /// Topic subscription
        Subscribe,
        /// Topic unsubscription
        Unsubscribe,
        /// Server-pushed message
        Message,
        /// Graceful disconnect
        Disconnect,
        /// Broker error report
        Error,
    }

    impl Command {
        fn as_str(&self) -> &'static str {
            match self {
                Self::Connect => "CONNECT",
                Self::Connected => "CONNECTED",
                Self::Subscribe => "SUBSCRIBE",
                Self::Unsubscribe => "UNSUBSCRIBE",
                Self::Message => "MESSAGE",
                Self::Disconnect => "DISCONNECT",
                Self::Error => "ERROR",
            }
        }

        fn parse(s: &str) -> Option<Self> {
            match s {
                "CONNECT" => Some(Self::Connect),
                "CONNECTED" => Some(Self::Connected),
                "SUBSCRIBE" => Some(Self::Subscribe),
                "UNSUBSCRIBE" => Some(Self::Unsubscribe),
                "MESSAGE" => Some(Self::Message),
                "DISCONNECT" => Some(Self::Disconnect),
                "ERROR" => Some(Self::Error),
                _ => None,
            }
        }
    }

    /// A parsed STOMP frame
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Frame {
        /// Frame command
        pub command: Command,
        /// Header key/value pairs, in wire order
        pub headers: Vec<(String, String)>,
        /// Frame body (empty for control frames)
        pub body: String,
    }

    impl Frame {
        /// Client CONNECT frame
        pub fn connect(host: &str) -> Self {
            Self {
                command: Command::Connect,
                headers: vec![
                    ("accept-version".to_string(), "1.2".to_string()),
                    ("host".to_string(), host.to_string()),
                ],
                body: String::new(),
            }
        }

        /// SUBSCRIBE frame; the destination doubles as the subscription id
        pub fn subscribe(destination: &str) -> Self {
            Self {
                command: Command::Subscribe,
                headers: vec![
                    ("id".to_string(), destination.to_string()),
                    ("destination".to_string(), destination.to_string()),
                ],
                body: String::new(),
            }
        }

        /// UNSUBSCRIBE frame for a previously subscribed destination
        pub fn unsubscribe(destination: &str) -> Self {
            Self {
                command: Command::Unsubscribe,
                headers: vec![("id".to_string(), destination.to_string())],
                body: String::new(),
            }
        }

        /// Client DISCONNECT frame
        pub fn disconnect() -> Self {
            Self {
                command: Command::Disconnect,
                headers: Vec::new(),
                body: String::new(),
            }
        }

        /// First value of a header, if present
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        }

        /// Serialize to the wire format (NUL-terminated)
        pub fn serialize(&self) -> String {
            let mut out = String::new();
            out.push_str(self.command.as_str());
            out.push('\n');
            for (key, value) in &self.headers {
                out.push_str(key);
                out.push(':');
                out.push_str(value);
                out.push('\n');
            }
            out.push('\n');
            out.push_str(&self.body);
            out.push('\0');
            out
        }

        /// Parse a frame from the wire format
        pub fn parse(input: &str) -> Result<Self> {
            let input = input.trim_end_matches('\0');
            let (head, body) = match input.split_once("\n\n") {
                Some((head, body)) => (head, body),
                None => (input, ""),
            };

            let mut lines = head.lines();
            let command_line = lines
                .next()
                .ok_or_else(|| Error::Transport("Empty STOMP frame".to_string()))?;
            let command = Command::parse(command_line.trim_end_matches('\r'))
                .ok_or_else(|| Error::Transport(format!("Unknown STOMP command: {}", command_line)))?;

            let mut headers = Vec::new();
            for line in lines {
                let line = line.trim_end_matches('\r');
                if line.is_empty() {
                    continue;
                }
                let (key, value) = line.split_once(':').ok_or_else(|| {
                    Error::Transport(format!("Malformed STOMP header: {}", line))
                })?;
                headers.push((key.to_string(), value.to_string()));
            }

            Ok(Self {
                command,
                headers,
                body: body.to_string(),
            })
        }
    }
}

/// Scoped handle for one topic registration
///
/// The chat pane holds one of these while its chat is active and releases it
/// on teardown via [`ConnectionManager::release`]; the handler is never
/// invoked again afterwards.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
}

impl Subscription {
    /// The subscribed topic
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Explicitly owned live connection
///
/// Reconnection policy is a caller concern: after the transport drops, a
/// fresh `connect` call re-establishes the socket and re-issues every
/// registered subscription, with no duplicates.
pub struct ConnectionManager {
    ws_url: String,
    registry: Registry,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<WsMessage>>>>,
    reader_task: Option<tokio::task::JoinHandle<()>>,
    writer_task: Option<tokio::task::JoinHandle<()>>,
}

impl ConnectionManager {
    /// Create a manager for the given WebSocket URL; no socket is opened yet
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            registry: Arc::new(Mutex::new(HashMap::new())),
            outbound: Arc::new(Mutex::new(None)),
            reader_task: None,
            writer_task: None,
        }
    }

    /// Open the socket, perform the STOMP handshake, and resubscribe
    ///
    /// Safe to call again after a disconnect: every topic in the registry is
    /// re-issued exactly once on the new socket.
    pub async fn connect(&mut self) -> Result<()> {
        let (ws, _response) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| Error::Transport(format!("WebSocket connect failed: {}", e)))?;
        tracing::info!(url = %self.ws_url, "Live channel connected");

        let (mut sink, mut source) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

        // Writer: drains the outbound queue into the socket.
        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = sink.send(frame).await {
                    tracing::warn!("Live channel write failed: {}", e);
                    break;
                }
            }
        });

        // Reader: dispatches MESSAGE frames to the registered handlers.
        // Clearing the outbound slot on exit marks the channel disconnected
        // so the owner knows to reconnect.
        let registry = self.registry.clone();
        let outbound_slot = self.outbound.clone();
        let reader = tokio::spawn(async move {
            while let Some(incoming) = source.next().await {
                match incoming {
                    Ok(WsMessage::Text(text)) => match stomp::Frame::parse(&text) {
                        Ok(frame) => dispatch_frame(&registry, frame),
                        Err(e) => tracing::warn!("Dropping unparseable frame: {}", e),
                    },
                    Ok(WsMessage::Close(_)) => {
                        tracing::info!("Live channel closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Live channel read failed: {}", e);
                        break;
                    }
                }
            }
            *outbound_slot.lock() = None;
        });

        *self.outbound.lock() = Some(tx);
        self.reader_task = Some(reader);
        self.writer_task = Some(writer);

        self.send_frame(stomp::Frame::connect(&self.ws_url));
        let topics: Vec<String> = self.registry.lock().keys().cloned().collect();
        for topic in topics {
            self.send_frame(stomp::Frame::subscribe(&topic));
        }
        Ok(())
    }

    /// Close the socket and stop the pump tasks
    ///
    /// The subscription registry is kept so a later `connect` restores it.
    pub fn disconnect(&mut self) {
        self.send_frame(stomp::Frame::disconnect());
        *self.outbound.lock() = None;
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.writer_task.take() {
            task.abort();
        }
        tracing::info!("Live channel disconnected");
    }

    /// Register a handler for a topic
    ///
    /// Idempotent on the wire: subscribing to an already-registered topic
    /// sends nothing and atomically swaps the handler in place, so a new
    /// chat window replaces the previous registration rather than doubling
    /// it up.
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> Subscription
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        let newly_registered = {
            let mut registry = self.registry.lock();
            registry
                .insert(topic.to_string(), Arc::new(handler))
                .is_none()
        };
        if newly_registered {
            self.send_frame(stomp::Frame::subscribe(topic));
        } else {
            tracing::debug!(topic, "Replacing handler for already-subscribed topic");
        }
        Subscription {
            topic: topic.to_string(),
        }
    }

    /// Release a scoped subscription
    pub fn release(&self, subscription: Subscription) {
        self.unsubscribe(&subscription.topic);
    }

    /// Drop a topic registration and notify the broker
    pub fn unsubscribe(&self, topic: &str) {
        let was_registered = self.registry.lock().remove(topic).is_some();
        if was_registered {
            self.send_frame(stomp::Frame::unsubscribe(topic));
        }
    }

    /// Topics currently registered, in no particular order
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.registry.lock().keys().cloned().collect()
    }

    /// Whether the socket is currently open
    pub fn is_connected(&self) -> bool {
        self.outbound.lock().is_some()
    }

    fn send_frame(&self, frame: stomp::Frame) {
        if let Some(tx) = self.outbound.lock().as_ref() {
            let _ = tx.send(WsMessage::Text(frame.serialize()));
        }
    }
}

/// Route one MESSAGE frame to its topic handler
fn dispatch_frame(registry: &Registry, frame: stomp::Frame) {
    if frame.command != stomp::Command::Message {
        if frame.command == stomp::Command::Error {
            tracing::warn!(body = %frame.body, "Broker error frame");
        }
        return;
    }
    let Some(destination) = frame.header("destination") else {
        tracing::warn!("MESSAGE frame without destination header");
        return;
    };

    let handler = registry.lock().get(destination).cloned();
    let Some(handler) = handler else {
        tracing::debug!(destination, "No handler for topic, dropping push");
        return;
    };

    match serde_json::from_str::<Message>(&frame.body) {
        Ok(message) => handler(message),
        Err(e) => tracing::warn!(destination, "Dropping malformed push body: {}", e),
    }
}

/// Chat topic name for a chat id
pub fn chat_topic(chat_id: i64) -> String {
    format!("/topic/chat.{}", chat_id)
}

/// User topic name carrying pushes for all of the user's chats
pub fn user_topic(user_id: i64) -> String {
    format!("/topic/user.{}", user_id)
}

/// Where a push ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushRouting {
    /// The push targeted the active chat window
    ActiveChat {
        /// Whether the buffer actually grew (false for duplicates)
        inserted: bool,
    },
    /// The push targeted another chat the user owns; it was marked unread
    InactiveChat,
    /// The push targeted a chat the user is not a member of
    Ignored,
}

/// Fold a pushed message into the right place
///
/// Pushes for the active chat go through the window's deduplicating insert;
/// pushes for any other owned chat only mark that chat unread, the side
/// channel the chat list consumes. An inactive chat's buffer is never
/// touched. Duplicate and out-of-order delivery need no handling here; the
/// store invariant absorbs both.
pub fn route_push(
    message: Message,
    active: Option<&mut ChatWindow>,
    owned_chats: &HashSet<i64>,
    unread: &mut HashSet<i64>,
) -> PushRouting {
    if let Some(window) = active {
        if window.chat_id() == message.chat_id {
            let inserted = window.insert_live(message);
            return PushRouting::ActiveChat { inserted };
        }
    }

    if owned_chats.contains(&message.chat_id) {
        unread.insert(message.chat_id);
        PushRouting::InactiveChat
    } else {
        tracing::warn!(chat_id = message.chat_id, "Push for a chat the user does not own");
        PushRouting::Ignored
    }
}

#[cfg(test)]
mod tests {
    use super::stomp::{Command, Frame};
    use super::*;
    use crate::window::ChatWindow;
    use chrono::{TimeZone, Utc};

    fn msg(chat_id: i64, id: i64) -> Message {
        Message {
            message_id: id,
            sender_id: 2,
            chat_id,
            text: format!("push {}", id),
            send_dttm: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
            is_read: false,
            reply_to_message_id: None,
            updated_dttm: None,
        }
    }

    #[test]
    fn test_frame_serialize_parse_round_trip() {
        let frame = Frame::subscribe("/topic/chat.7");
        let parsed = Frame::parse(&frame.serialize()).expect("Failed to parse frame");
        assert_eq!(parsed, frame);
        assert_eq!(parsed.header("destination"), Some("/topic/chat.7"));
    }

    #[test]
    fn test_frame_parse_message_with_body() {
        let wire = "MESSAGE\ndestination:/topic/chat.1\nmessage-id:42\n\n{\"messageId\":1}\0";
        let frame = Frame::parse(wire).expect("Failed to parse frame");
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.header("destination"), Some("/topic/chat.1"));
        assert_eq!(frame.body, "{\"messageId\":1}");
    }

    #[test]
    fn test_frame_parse_rejects_unknown_command() {
        assert!(Frame::parse("NONSENSE\n\n\0").is_err());
        assert!(Frame::parse("MESSAGE\nbad header line\n\n\0").is_err());
    }

    #[test]
    fn test_subscribe_is_idempotent_and_swaps_handler() {
        let manager = ConnectionManager::new("ws://localhost/api/ws");

        let first = manager.subscribe("/topic/chat.1", |_msg| {});
        let second = manager.subscribe("/topic/chat.1", |_msg| {});
        assert_eq!(manager.subscribed_topics(), vec!["/topic/chat.1".to_string()]);

        manager.release(first);
        // Releasing the superseded handle already removed the topic; the
        // second release is a no-op.
        manager.release(second);
        assert!(manager.subscribed_topics().is_empty());
    }

    #[test]
    fn test_registry_survives_disconnect() {
        let mut manager = ConnectionManager::new("ws://localhost/api/ws");
        let _sub = manager.subscribe("/topic/user.1", |_msg| {});
        manager.disconnect();

        // A later reconnect re-issues this registration; it is never lost.
        assert_eq!(manager.subscribed_topics(), vec!["/topic/user.1".to_string()]);
        assert!(!manager.is_connected());
    }

    #[test]
    fn test_dispatch_invokes_registered_handler() {
        let manager = ConnectionManager::new("ws://localhost/api/ws");
        let received: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        let _sub = manager.subscribe(&chat_topic(1), move |m| sink.lock().push(m));

        let push = msg(1, 101);
        let frame = Frame {
            command: Command::Message,
            headers: vec![("destination".to_string(), chat_topic(1))],
            body: serde_json::to_string(&push).expect("Failed to serialize push"),
        };
        dispatch_frame(&manager.registry, frame);

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], push);
    }

    #[test]
    fn test_dispatch_drops_unsubscribed_topic_and_bad_body() {
        let manager = ConnectionManager::new("ws://localhost/api/ws");
        let received: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        let _sub = manager.subscribe(&chat_topic(1), move |m| sink.lock().push(m));

        // Wrong topic.
        let frame = Frame {
            command: Command::Message,
            headers: vec![("destination".to_string(), chat_topic(2))],
            body: serde_json::to_string(&msg(2, 1)).expect("Failed to serialize push"),
        };
        dispatch_frame(&manager.registry, frame);

        // Malformed body.
        let frame = Frame {
            command: Command::Message,
            headers: vec![("destination".to_string(), chat_topic(1))],
            body: "not json".to_string(),
        };
        dispatch_frame(&manager.registry, frame);

        assert!(received.lock().is_empty());
    }

    #[test]
    fn test_route_push_active_chat_dedups() {
        let (mut window, request) = ChatWindow::open(1, 0, 40);
        window.apply_fetch(&request, Ok(vec![msg(1, 10)]));

        let owned: HashSet<i64> = [1, 2].into_iter().collect();
        let mut unread = HashSet::new();

        let routing = route_push(msg(1, 11), Some(&mut window), &owned, &mut unread);
        assert_eq!(routing, PushRouting::ActiveChat { inserted: true });

        let routing = route_push(msg(1, 11), Some(&mut window), &owned, &mut unread);
        assert_eq!(routing, PushRouting::ActiveChat { inserted: false });

        assert_eq!(window.store().len(), 2);
        assert!(unread.is_empty());
    }

    #[test]
    fn test_route_push_inactive_chat_marks_unread() {
        let (mut window, request) = ChatWindow::open(1, 0, 40);
        window.apply_fetch(&request, Ok(vec![msg(1, 10)]));

        let owned: HashSet<i64> = [1, 2].into_iter().collect();
        let mut unread = HashSet::new();

        let routing = route_push(msg(2, 50), Some(&mut window), &owned, &mut unread);
        assert_eq!(routing, PushRouting::InactiveChat);
        assert!(unread.contains(&2));
        // The inactive chat's buffer is never touched.
        assert_eq!(window.store().len(), 1);
    }

    #[test]
    fn test_route_push_unowned_chat_is_ignored() {
        let owned: HashSet<i64> = [1].into_iter().collect();
        let mut unread = HashSet::new();

        let routing = route_push(msg(99, 1), None, &owned, &mut unread);
        assert_eq!(routing, PushRouting::Ignored);
        assert!(unread.is_empty());
    }

    #[test]
    fn test_route_push_without_active_window() {
        let owned: HashSet<i64> = [3].into_iter().collect();
        let mut unread = HashSet::new();

        let routing = route_push(msg(3, 1), None, &owned, &mut unread);
        assert_eq!(routing, PushRouting::InactiveChat);
        assert!(unread.contains(&3));
    }
}
