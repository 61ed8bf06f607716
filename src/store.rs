//! Ordered, deduplicated message buffer for the open chat
//!
//! The store holds the canonical message sequence for the active chat window
//! and is mutated only through the small operation set the pane needs:
//! `replace_all` for the initial page, `prepend_older` for backward
//! pagination, and `insert` for live pushes and sends. Pages arrive from the
//! API newest-first and are reversed into chronological order here.
//!
//! Invariant: messages are strictly ascending by `(send_dttm, message_id)`
//! with at most one entry per `message_id`. That single invariant is what
//! makes duplicate pushes, optimistic-send echo races, and out-of-order
//! delivery harmless everywhere else in the client.

use crate::model::Message;

/// Ordered, deduplicated buffer of messages for one chat
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Replace the full message set with the initial page
    ///
    /// `page` is newest-first as returned by the API; it is reversed into
    /// chronological order. Used only on initial load.
    pub fn replace_all(&mut self, page: Vec<Message>) {
        self.messages = Self::into_chronological(page);
    }

    /// Merge an older page in front of the existing sequence
    ///
    /// `page` is newest-first as returned by the API. Entries whose id is
    /// already present are dropped so an overlapping page cannot violate the
    /// dedup invariant.
    pub fn prepend_older(&mut self, page: Vec<Message>) {
        let mut older = Self::into_chronological(page);
        older.retain(|m| !self.contains(m.message_id));
        self.messages.splice(0..0, older);
    }

    /// Insert a single message, keeping the buffer sorted
    ///
    /// Idempotent by `message_id`: returns `false` without mutating when an
    /// entry with the same id already exists. New messages normally land at
    /// the tail, but an out-of-order arrival is sort-inserted into its
    /// correct position rather than blindly appended.
    pub fn insert(&mut self, message: Message) -> bool {
        if self.contains(message.message_id) {
            return false;
        }

        let mut idx = self.messages.len();
        while idx > 0 && self.messages[idx - 1].sort_key() > message.sort_key() {
            idx -= 1;
        }
        self.messages.insert(idx, message);
        true
    }

    /// Remove a message by id, returning whether it was present
    ///
    /// Used to roll back an optimistic placeholder after a failed send.
    pub fn remove(&mut self, message_id: i64) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.message_id != message_id);
        self.messages.len() < before
    }

    /// Whether a message with the given id is present
    pub fn contains(&self, message_id: i64) -> bool {
        self.messages.iter().any(|m| m.message_id == message_id)
    }

    /// ID of the oldest loaded message, if any
    ///
    /// This is the `before` cursor for backward pagination.
    pub fn oldest_message_id(&self) -> Option<i64> {
        self.messages.first().map(|m| m.message_id)
    }

    /// The newest loaded message, if any
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages in the buffer
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The messages in chronological order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Reverse a newest-first page into chronological order
    ///
    /// Also sorts and drops in-page duplicates, so a misbehaving server
    /// response cannot break the store invariant.
    fn into_chronological(page: Vec<Message>) -> Vec<Message> {
        let mut messages = page;
        messages.reverse();
        messages.sort_by_key(Message::sort_key);
        messages.dedup_by_key(|m| m.message_id);
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn msg(id: i64) -> Message {
        Message {
            message_id: id,
            sender_id: 1,
            chat_id: 1,
            text: format!("message {}", id),
            // One second per id keeps timestamps aligned with id order.
            send_dttm: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
            is_read: false,
            reply_to_message_id: None,
            updated_dttm: None,
        }
    }

    /// A newest-first page of ids `from..=to` counting down
    fn page_desc(from: i64, to: i64) -> Vec<Message> {
        (to..=from).rev().map(msg).collect()
    }

    fn ids(store: &MessageStore) -> Vec<i64> {
        store.messages().iter().map(|m| m.message_id).collect()
    }

    #[test]
    fn test_replace_all_reverses_to_chronological() {
        let mut store = MessageStore::new();
        store.replace_all(page_desc(100, 61));

        assert_eq!(store.len(), 40);
        assert_eq!(store.oldest_message_id(), Some(61));
        assert_eq!(store.last().map(|m| m.message_id), Some(100));
        assert_eq!(ids(&store), (61..=100).collect::<Vec<_>>());
    }

    #[test]
    fn test_prepend_older_merges_in_front() {
        let mut store = MessageStore::new();
        store.replace_all(page_desc(100, 61));
        store.prepend_older(page_desc(60, 36));

        assert_eq!(store.len(), 65);
        assert_eq!(ids(&store), (36..=100).collect::<Vec<_>>());
    }

    #[test]
    fn test_prepend_older_drops_overlap() {
        let mut store = MessageStore::new();
        store.replace_all(page_desc(100, 61));
        // Overlapping page: 65..=50 shares 65..=61 with the loaded range.
        store.prepend_older(page_desc(65, 50));

        assert_eq!(ids(&store), (50..=100).collect::<Vec<_>>());
    }

    #[test]
    fn test_insert_appends_new_tail() {
        let mut store = MessageStore::new();
        store.replace_all(page_desc(100, 61));

        assert!(store.insert(msg(101)));
        assert_eq!(store.len(), 41);
        assert_eq!(store.last().map(|m| m.message_id), Some(101));
    }

    #[test]
    fn test_insert_is_idempotent_by_id() {
        let mut store = MessageStore::new();
        store.replace_all(page_desc(100, 61));

        assert!(store.insert(msg(101)));
        assert!(!store.insert(msg(101)));
        assert!(!store.insert(msg(80)));
        assert_eq!(store.len(), 41);
    }

    #[test]
    fn test_insert_places_out_of_order_arrival() {
        let mut store = MessageStore::new();
        store.insert(msg(10));
        store.insert(msg(30));
        // Late delivery of an older message must land between, not at the tail.
        store.insert(msg(20));

        assert_eq!(ids(&store), vec![10, 20, 30]);
    }

    #[test]
    fn test_sorted_after_any_interleaving() {
        let mut store = MessageStore::new();
        store.replace_all(page_desc(50, 41));
        store.insert(msg(51));
        store.prepend_older(page_desc(40, 31));
        store.insert(msg(52));
        store.insert(msg(35)); // duplicate from the prepended page
        store.prepend_older(page_desc(30, 26));

        let keys: Vec<_> = store.messages().iter().map(Message::sort_key).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        let mut unique = ids(&store);
        unique.dedup();
        assert_eq!(unique.len(), store.len());
    }

    #[test]
    fn test_remove_rolls_back_placeholder() {
        let mut store = MessageStore::new();
        store.insert(msg(10));
        store.insert(msg(-1)); // optimistic placeholder

        assert!(store.remove(-1));
        assert!(!store.remove(-1));
        assert_eq!(ids(&store), vec![10]);
    }

    #[test]
    fn test_empty_page_is_valid() {
        let mut store = MessageStore::new();
        store.replace_all(Vec::new());
        assert!(store.is_empty());
        assert_eq!(store.oldest_message_id(), None);
    }
}
