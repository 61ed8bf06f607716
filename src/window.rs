//! Chat window state: one open conversation
//!
//! A [`ChatWindow`] is created fresh whenever the active chat changes and
//! dropped on switch; nothing survives across chats. It owns the message
//! buffer, the paginator, and the pending scroll adjustment, and is mutated
//! only by the owning pane. Peers (the chat list, the live bridge) reach it
//! through applied fetch outcomes and routed pushes, never through shared
//! mutable references.

use crate::model::{Message, User};
use crate::pagination::{AppliedPage, FetchRequest, Paginator};
use crate::scroll::ScrollAdjustment;
use crate::store::MessageStore;
use chrono::Utc;

/// Terminal, non-retryable pane errors
///
/// These are configuration/navigation faults, not transient ones: the pane
/// renders a fixed error message and never attempts a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// No chat id was supplied
    MissingChat,
    /// The companion is the viewing user; one cannot chat with oneself
    SelfChat,
    /// The current user or companion profile failed to resolve
    ProfileUnresolved,
}

impl ContextError {
    /// Fixed message shown in the pane
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingChat => "Chat not found",
            Self::SelfChat => "You cannot message yourself",
            Self::ProfileUnresolved => "Failed to load chat participants",
        }
    }
}

/// Validate the chat context before any window is created
///
/// Must be checked before `ChatWindow::open`; a window for an invalid
/// context would issue fetches the server can only reject.
pub fn validate_context(
    chat_id: i64,
    current_user: Option<&User>,
    companion: Option<&User>,
) -> std::result::Result<(), ContextError> {
    if chat_id == 0 {
        return Err(ContextError::MissingChat);
    }
    let (current, companion) = match (current_user, companion) {
        (Some(c), Some(p)) => (c, p),
        _ => return Err(ContextError::ProfileUnresolved),
    };
    if current.user_id == companion.user_id {
        return Err(ContextError::SelfChat);
    }
    Ok(())
}

/// Result of completing a send
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The server confirmed the message; the placeholder was replaced
    Confirmed(Message),
    /// The send failed; the placeholder was rolled back and the composed
    /// text is returned so the input can be restored for retry
    Failed {
        /// The text the user composed
        text: String,
    },
    /// The outcome arrived for a window that is no longer active
    Stale,
}

/// State of one open chat conversation
#[derive(Debug)]
pub struct ChatWindow {
    chat_id: i64,
    store: MessageStore,
    paginator: Paginator,
    pending_scroll: ScrollAdjustment,
    /// Next optimistic placeholder id; counts down from -1 so a
    /// server-assigned (positive) id can never collide with one
    next_optimistic_id: i64,
}

impl ChatWindow {
    /// Open a chat: fresh state plus the initial page fetch
    ///
    /// `epoch` is the app-wide window generation, bumped on every chat
    /// switch; it tags every fetch so late responses for a previous window
    /// are discarded even when the same chat is reopened.
    pub fn open(chat_id: i64, epoch: u64, page_size: usize) -> (Self, FetchRequest) {
        let mut paginator = Paginator::new(chat_id, epoch, page_size);
        let request = paginator.begin_initial();

        tracing::debug!(chat_id, epoch, "Opening chat window");

        let window = Self {
            chat_id,
            store: MessageStore::new(),
            paginator,
            pending_scroll: ScrollAdjustment::Idle,
            next_optimistic_id: -1,
        };
        (window, request)
    }

    /// The chat this window shows
    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    /// The window generation this window was opened under
    pub fn epoch(&self) -> u64 {
        self.paginator.epoch()
    }

    /// The message buffer, chronological
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Whether more history is assumed to exist
    pub fn has_more(&self) -> bool {
        self.paginator.has_more()
    }

    /// Whether a history fetch is in flight
    pub fn is_loading(&self) -> bool {
        self.paginator.is_loading()
    }

    /// Whether the last history fetch failed
    pub fn load_failed(&self) -> bool {
        self.paginator.load_failed()
    }

    /// Start a backward load, capturing the viewport first
    ///
    /// `old_extent` and `old_offset` describe the scrollable content as
    /// currently rendered; they must be captured before the fetch is issued,
    /// while the viewport still shows pre-mutation content. Returns `None`
    /// when the backward-load guards reject the request, in which case no
    /// adjustment is armed.
    pub fn begin_older(&mut self, old_extent: usize, old_offset: usize) -> Option<FetchRequest> {
        let request = self.paginator.begin_older(&self.store)?;
        self.pending_scroll = ScrollAdjustment::capture_preserve(old_extent, old_offset);
        Some(request)
    }

    /// Apply a completed history fetch
    ///
    /// Stale outcomes (other chat, other epoch) are discarded. On success the
    /// matching scroll adjustment is armed: pin-to-bottom (instant) for the
    /// initial page, preserve-anchor for an older page. Returns whether the
    /// outcome belonged to this window.
    pub fn apply_fetch(
        &mut self,
        request: &FetchRequest,
        outcome: std::result::Result<Vec<Message>, String>,
    ) -> bool {
        match outcome {
            Ok(page) => match self.paginator.apply_page(&mut self.store, request, page) {
                Some(AppliedPage::Initial) => {
                    self.pending_scroll = ScrollAdjustment::pin_to_bottom(false);
                    true
                }
                Some(AppliedPage::Older) => {
                    // The preserve adjustment was armed by begin_older.
                    true
                }
                None => false,
            },
            Err(reason) => {
                let applied = self.paginator.apply_error(request);
                if applied {
                    tracing::warn!(chat_id = request.chat_id, %reason, "History fetch failed");
                    // A failed backward load leaves the buffer untouched; the
                    // captured viewport no longer has a mutation to correct.
                    self.pending_scroll = ScrollAdjustment::Idle;
                }
                applied
            }
        }
    }

    /// Fold a live-pushed message into the buffer
    ///
    /// Dedup by id absorbs duplicate deliveries and the optimistic/echo race.
    /// Returns whether the buffer grew; only genuine novelty arms the
    /// smooth pin-to-bottom.
    pub fn insert_live(&mut self, message: Message) -> bool {
        if message.chat_id != self.chat_id {
            tracing::warn!(
                message_chat = message.chat_id,
                window_chat = self.chat_id,
                "Dropping push routed to the wrong window"
            );
            return false;
        }
        let inserted = self.store.insert(message);
        if inserted {
            self.pending_scroll = ScrollAdjustment::pin_to_bottom(true);
        }
        inserted
    }

    /// Insert an optimistic placeholder for a message being sent
    ///
    /// The placeholder carries a negative id and the current timestamp; the
    /// view pins to the bottom immediately, before the server responds.
    pub fn begin_send(&mut self, sender_id: i64, text: &str) -> Message {
        let placeholder = Message {
            message_id: self.next_optimistic_id,
            sender_id,
            chat_id: self.chat_id,
            text: text.to_string(),
            send_dttm: Utc::now(),
            is_read: false,
            reply_to_message_id: None,
            updated_dttm: None,
        };
        self.next_optimistic_id -= 1;

        self.store.insert(placeholder.clone());
        self.pending_scroll = ScrollAdjustment::pin_to_bottom(true);
        placeholder
    }

    /// Complete a send: replace the placeholder or roll it back
    ///
    /// On success the server message is inserted in the placeholder's stead;
    /// if its push already arrived, dedup leaves the buffer unchanged. On
    /// failure the placeholder is removed and the composed text returned so
    /// the input can be restored. Outcomes for a placeholder this window does
    /// not hold (after a chat switch) are reported as `Stale`.
    pub fn complete_send(
        &mut self,
        placeholder_id: i64,
        outcome: std::result::Result<Message, String>,
    ) -> SendOutcome {
        if !self.store.contains(placeholder_id) {
            return SendOutcome::Stale;
        }

        match outcome {
            Ok(confirmed) => {
                self.store.remove(placeholder_id);
                self.store.insert(confirmed.clone());
                self.pending_scroll = ScrollAdjustment::pin_to_bottom(true);
                SendOutcome::Confirmed(confirmed)
            }
            Err(reason) => {
                tracing::warn!(chat_id = self.chat_id, %reason, "Send failed, rolling back");
                let text = self
                    .store
                    .messages()
                    .iter()
                    .find(|m| m.message_id == placeholder_id)
                    .map(|m| m.text.clone())
                    .unwrap_or_default();
                self.store.remove(placeholder_id);
                SendOutcome::Failed { text }
            }
        }
    }

    /// Take the pending scroll adjustment, leaving `Idle` behind
    ///
    /// The view calls this once per render after the buffer mutated, resolves
    /// it against the new content extent, and applies the target.
    pub fn take_scroll_adjustment(&mut self) -> ScrollAdjustment {
        std::mem::take(&mut self.pending_scroll)
    }

    /// Peek at the pending scroll adjustment without consuming it
    pub fn pending_scroll(&self) -> ScrollAdjustment {
        self.pending_scroll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::PageKind;
    use chrono::TimeZone;

    fn user(id: i64) -> User {
        User {
            user_id: id,
            nickname: format!("user{}", id),
            firstname: None,
            secondname: None,
            profile_picture_link: None,
        }
    }

    fn msg(chat_id: i64, id: i64) -> Message {
        Message {
            message_id: id,
            sender_id: 2,
            chat_id,
            text: format!("message {}", id),
            send_dttm: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
            is_read: false,
            reply_to_message_id: None,
            updated_dttm: None,
        }
    }

    fn page_desc(chat_id: i64, from: i64, to: i64) -> Vec<Message> {
        (to..=from).rev().map(|id| msg(chat_id, id)).collect()
    }

    fn ids(window: &ChatWindow) -> Vec<i64> {
        window.store().messages().iter().map(|m| m.message_id).collect()
    }

    #[test]
    fn test_validate_context() {
        let me = user(1);
        let other = user(2);

        assert_eq!(
            validate_context(0, Some(&me), Some(&other)),
            Err(ContextError::MissingChat)
        );
        assert_eq!(
            validate_context(5, Some(&me), None),
            Err(ContextError::ProfileUnresolved)
        );
        assert_eq!(
            validate_context(5, None, Some(&other)),
            Err(ContextError::ProfileUnresolved)
        );
        assert_eq!(
            validate_context(5, Some(&me), Some(&me)),
            Err(ContextError::SelfChat)
        );
        assert_eq!(validate_context(5, Some(&me), Some(&other)), Ok(()));
    }

    #[test]
    fn test_open_requests_initial_page_and_pins_bottom() {
        let (mut window, request) = ChatWindow::open(1, 0, 40);
        assert_eq!(request.kind, PageKind::Initial);
        assert!(window.is_loading());

        assert!(window.apply_fetch(&request, Ok(page_desc(1, 100, 61))));
        assert_eq!(window.store().len(), 40);
        assert!(window.has_more());
        assert_eq!(
            window.take_scroll_adjustment(),
            ScrollAdjustment::pin_to_bottom(false)
        );
        // Consumed: the next render sees Idle.
        assert_eq!(window.take_scroll_adjustment(), ScrollAdjustment::Idle);
    }

    #[test]
    fn test_older_page_preserves_viewport() {
        let (mut window, request) = ChatWindow::open(1, 0, 40);
        window.apply_fetch(&request, Ok(page_desc(1, 100, 61)));
        window.take_scroll_adjustment();

        let older = window.begin_older(40, 0).expect("older fetch expected");
        assert_eq!(
            window.pending_scroll(),
            ScrollAdjustment::capture_preserve(40, 0)
        );

        window.apply_fetch(&older, Ok(page_desc(1, 60, 36)));
        assert_eq!(window.store().len(), 65);
        assert!(!window.has_more());

        let target = window
            .take_scroll_adjustment()
            .resolve(65, 20)
            .expect("target expected");
        assert_eq!(target.offset, 25);
    }

    #[test]
    fn test_stale_fetch_never_reaches_new_window() {
        let (_window5, stale) = ChatWindow::open(5, 0, 40);

        // Switch to chat 7: new window, new epoch.
        let (mut window7, request) = ChatWindow::open(7, 1, 40);
        window7.apply_fetch(&request, Ok(page_desc(7, 10, 1)));

        assert!(!window7.apply_fetch(&stale, Ok(page_desc(5, 200, 161))));
        assert_eq!(window7.store().len(), 10);
        assert!(window7.store().messages().iter().all(|m| m.chat_id == 7));
    }

    #[test]
    fn test_push_appends_and_pins_bottom() {
        let (mut window, request) = ChatWindow::open(1, 0, 40);
        window.apply_fetch(&request, Ok(page_desc(1, 100, 61)));
        window.take_scroll_adjustment();

        assert!(window.insert_live(msg(1, 101)));
        assert_eq!(window.store().len(), 41);
        assert_eq!(window.store().last().map(|m| m.message_id), Some(101));
        assert_eq!(
            window.take_scroll_adjustment(),
            ScrollAdjustment::pin_to_bottom(true)
        );
    }

    #[test]
    fn test_duplicate_push_leaves_buffer_unchanged() {
        let (mut window, request) = ChatWindow::open(1, 0, 40);
        window.apply_fetch(&request, Ok(page_desc(1, 100, 61)));
        window.take_scroll_adjustment();

        assert!(window.insert_live(msg(1, 101)));
        window.take_scroll_adjustment();

        assert!(!window.insert_live(msg(1, 101)));
        assert_eq!(window.store().len(), 41);
        // No novelty: nothing is armed.
        assert_eq!(window.take_scroll_adjustment(), ScrollAdjustment::Idle);
    }

    #[test]
    fn test_push_for_wrong_chat_is_dropped() {
        let (mut window, request) = ChatWindow::open(1, 0, 40);
        window.apply_fetch(&request, Ok(page_desc(1, 10, 1)));

        assert!(!window.insert_live(msg(2, 999)));
        assert_eq!(window.store().len(), 10);
    }

    #[test]
    fn test_send_confirmation_replaces_placeholder() {
        let (mut window, request) = ChatWindow::open(1, 0, 40);
        window.apply_fetch(&request, Ok(page_desc(1, 10, 1)));

        let placeholder = window.begin_send(7, "hello");
        assert!(placeholder.message_id < 0);
        assert_eq!(window.store().len(), 11);

        let confirmed = msg(1, 11);
        let outcome = window.complete_send(placeholder.message_id, Ok(confirmed.clone()));
        assert_eq!(outcome, SendOutcome::Confirmed(confirmed));
        assert_eq!(window.store().len(), 11);
        assert!(!window.store().contains(placeholder.message_id));
        assert!(window.store().contains(11));
    }

    #[test]
    fn test_send_echo_race_is_harmless() {
        let (mut window, request) = ChatWindow::open(1, 0, 40);
        window.apply_fetch(&request, Ok(page_desc(1, 10, 1)));

        let placeholder = window.begin_send(7, "hello");
        // The push for the sent message beats the HTTP response.
        assert!(window.insert_live(msg(1, 11)));
        assert_eq!(window.store().len(), 12);

        let outcome = window.complete_send(placeholder.message_id, Ok(msg(1, 11)));
        assert!(matches!(outcome, SendOutcome::Confirmed(_)));
        assert_eq!(window.store().len(), 11);
        assert!(window.store().contains(11));
        assert!(!window.store().contains(placeholder.message_id));
    }

    #[test]
    fn test_send_failure_rolls_back_and_returns_text() {
        let (mut window, request) = ChatWindow::open(1, 0, 40);
        window.apply_fetch(&request, Ok(page_desc(1, 10, 1)));

        let placeholder = window.begin_send(7, "will fail");
        let outcome = window.complete_send(placeholder.message_id, Err("boom".to_string()));
        assert_eq!(
            outcome,
            SendOutcome::Failed {
                text: "will fail".to_string()
            }
        );
        assert_eq!(window.store().len(), 10);
        assert_eq!(ids(&window), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_send_outcome_after_switch_is_stale() {
        let (mut window, request) = ChatWindow::open(1, 0, 40);
        window.apply_fetch(&request, Ok(page_desc(1, 10, 1)));
        let placeholder = window.begin_send(7, "late");

        // Chat switch: fresh window for another chat.
        let (mut window2, request2) = ChatWindow::open(2, 1, 40);
        window2.apply_fetch(&request2, Ok(page_desc(2, 5, 1)));

        let outcome = window2.complete_send(placeholder.message_id, Ok(msg(1, 11)));
        assert_eq!(outcome, SendOutcome::Stale);
        assert_eq!(window2.store().len(), 5);
    }

    #[test]
    fn test_full_history_and_push_sequence() {
        let (mut window, request) = ChatWindow::open(1, 0, 40);

        // Initial page: ids 100..61 newest-first.
        window.apply_fetch(&request, Ok(page_desc(1, 100, 61)));
        assert_eq!(window.store().len(), 40);
        assert_eq!(ids(&window), (61..=100).collect::<Vec<_>>());
        assert!(window.has_more());
        window.take_scroll_adjustment();

        // Older page: ids 60..36, a short page.
        let older = window.begin_older(40, 0).expect("older fetch expected");
        window.apply_fetch(&older, Ok(page_desc(1, 60, 36)));
        assert_eq!(window.store().len(), 65);
        assert_eq!(ids(&window), (36..=100).collect::<Vec<_>>());
        assert!(!window.has_more());
        window.take_scroll_adjustment();

        // Live push grows the buffer to 66 with 101 at the tail.
        assert!(window.insert_live(msg(1, 101)));
        assert_eq!(window.store().len(), 66);
        assert_eq!(window.store().last().map(|m| m.message_id), Some(101));
        assert_eq!(
            window.take_scroll_adjustment(),
            ScrollAdjustment::pin_to_bottom(true)
        );

        // The same push delivered again changes nothing.
        assert!(!window.insert_live(msg(1, 101)));
        assert_eq!(window.store().len(), 66);
    }

    #[test]
    fn test_failed_older_load_clears_pending_preserve() {
        let (mut window, request) = ChatWindow::open(1, 0, 40);
        window.apply_fetch(&request, Ok(page_desc(1, 100, 61)));
        window.take_scroll_adjustment();

        let older = window.begin_older(40, 3).expect("older fetch expected");
        assert!(window.pending_scroll().is_pending());

        assert!(window.apply_fetch(&older, Err("network".to_string())));
        assert!(window.load_failed());
        assert_eq!(window.pending_scroll(), ScrollAdjustment::Idle);

        // Retry is user-initiated and allowed again.
        assert!(window.begin_older(40, 3).is_some());
    }
}
