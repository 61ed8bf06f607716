//! History pagination for the open chat
//!
//! The pane runs on a single UI event loop; network work happens elsewhere.
//! The paginator therefore never performs a fetch itself: `begin_*` hands out
//! a [`FetchRequest`] describing the page to load, and the driver later feeds
//! the outcome back through `apply_page`/`apply_error`. Each request carries
//! the chat id and a window epoch, and outcomes that no longer match the live
//! window are discarded, so a response that resolves after a chat switch can
//! never leak into the wrong buffer.
//!
//! Guards: at most one fetch in flight per window, no backward fetch when
//! history is exhausted or the store is empty. Fetch failures surface as a
//! boolean flag; retries are user-initiated.

use crate::model::Message;
use crate::store::MessageStore;

/// Which page a fetch request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// The most recent `limit` messages of the chat
    Initial,
    /// Up to `limit` messages strictly preceding a known message
    Older {
        /// The current oldest loaded message id (exclusive cursor)
        before_message_id: i64,
    },
}

/// A history fetch for the async driver to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    /// Chat the page belongs to
    pub chat_id: i64,
    /// Window generation; bumped on every chat switch
    pub epoch: u64,
    /// Initial page or backward page
    pub kind: PageKind,
    /// Maximum number of messages to fetch
    pub limit: usize,
}

/// What a successfully applied page did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedPage {
    /// The store was replaced with the initial page
    Initial,
    /// An older page was merged in front
    Older,
}

/// Orchestrates initial and backward page loads for one chat window
#[derive(Debug)]
pub struct Paginator {
    chat_id: i64,
    epoch: u64,
    page_size: usize,
    is_loading: bool,
    has_more_history: bool,
    load_failed: bool,
}

impl Paginator {
    /// Create a paginator for a freshly opened chat window
    ///
    /// `epoch` is the app-wide window generation; it must change whenever the
    /// active chat does, so late responses from a previous window (even one
    /// for the same chat id) are discarded.
    pub fn new(chat_id: i64, epoch: u64, page_size: usize) -> Self {
        Self {
            chat_id,
            epoch,
            page_size,
            is_loading: false,
            // Unknown until the first page arrives; no backward fetch can be
            // issued before then because the store is still empty.
            has_more_history: false,
            load_failed: false,
        }
    }

    /// Start the initial page load
    pub fn begin_initial(&mut self) -> FetchRequest {
        self.is_loading = true;
        self.load_failed = false;
        FetchRequest {
            chat_id: self.chat_id,
            epoch: self.epoch,
            kind: PageKind::Initial,
            limit: self.page_size,
        }
    }

    /// Start a backward ("load older") fetch, if one may be issued
    ///
    /// No-op when history is exhausted, a fetch is already in flight, or the
    /// store is empty (nothing to page before).
    pub fn begin_older(&mut self, store: &MessageStore) -> Option<FetchRequest> {
        if !self.has_more_history || self.is_loading {
            return None;
        }
        let before_message_id = store.oldest_message_id()?;

        self.is_loading = true;
        self.load_failed = false;
        Some(FetchRequest {
            chat_id: self.chat_id,
            epoch: self.epoch,
            kind: PageKind::Older { before_message_id },
            limit: self.page_size,
        })
    }

    /// Whether an outcome belongs to this window
    pub fn matches(&self, request: &FetchRequest) -> bool {
        request.chat_id == self.chat_id && request.epoch == self.epoch
    }

    /// Apply a fetched page to the store
    ///
    /// Returns `None` when the outcome is stale (different chat or epoch), in
    /// which case nothing is mutated. A page exactly `page_size` long means
    /// more history may exist; a short page means it is exhausted. The
    /// boundary case (history length an exact multiple of the page size)
    /// costs one extra no-op "load older" press.
    pub fn apply_page(
        &mut self,
        store: &mut MessageStore,
        request: &FetchRequest,
        page: Vec<Message>,
    ) -> Option<AppliedPage> {
        if !self.matches(request) {
            tracing::debug!(
                chat_id = request.chat_id,
                epoch = request.epoch,
                "Discarding stale page response"
            );
            return None;
        }

        self.is_loading = false;
        self.has_more_history = page.len() == self.page_size;

        match request.kind {
            PageKind::Initial => {
                store.replace_all(page);
                Some(AppliedPage::Initial)
            }
            PageKind::Older { .. } => {
                store.prepend_older(page);
                Some(AppliedPage::Older)
            }
        }
    }

    /// Record a fetch failure
    ///
    /// Stale failures are ignored like stale pages. Otherwise the loading
    /// guard is released and the error flag raised; the user retries by
    /// triggering the load again.
    pub fn apply_error(&mut self, request: &FetchRequest) -> bool {
        if !self.matches(request) {
            return false;
        }
        self.is_loading = false;
        self.load_failed = true;
        true
    }

    /// Whether more history is assumed to exist
    pub fn has_more(&self) -> bool {
        self.has_more_history
    }

    /// Whether a fetch is currently in flight
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Whether the last fetch for this window failed
    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    /// The configured page size
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// The window generation this paginator belongs to
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}
