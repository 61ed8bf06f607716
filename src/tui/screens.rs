//! Screen state structures for TUI

use crate::model::{ChatWithCompanion, User};
use crate::pagination::FetchRequest;
use crate::session::Settings;
use crate::window::{ChatWindow, ContextError};
use arboard::Clipboard;
use std::collections::HashSet;

/// Chat list screen state
#[derive(Debug)]
pub struct ChatListScreen {
    /// Selected chat index (into the ordered list)
    pub selected_index: usize,
    /// Status message
    pub status_message: Option<String>,
}

impl ChatListScreen {
    /// Create new chat list screen
    pub fn new() -> Self {
        Self {
            selected_index: 0,
            status_message: None,
        }
    }

    /// Move to next chat
    pub fn next(&mut self, chat_count: usize) {
        if chat_count > 0 {
            self.selected_index = (self.selected_index + 1) % chat_count;
        }
    }

    /// Move to previous chat
    pub fn previous(&mut self, chat_count: usize) {
        if chat_count > 0 {
            if self.selected_index > 0 {
                self.selected_index -= 1;
            } else {
                self.selected_index = chat_count - 1;
            }
        }
    }

    /// Set status message
    pub fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
    }

    /// Clear status message
    pub fn clear_status(&mut self) {
        self.status_message = None;
    }
}

impl Default for ChatListScreen {
    fn default() -> Self {
        Self::new()
    }
}

/// Order chats for display
///
/// The viewer's self-chat (saved messages) comes first, then chats with
/// unread activity, then the rest in their incoming order.
pub fn ordered_chats(
    chats: &[ChatWithCompanion],
    unread: &HashSet<i64>,
    current_user: &User,
) -> Vec<ChatWithCompanion> {
    let mut ordered = chats.to_vec();
    ordered.sort_by_key(|chat| {
        let is_self = chat.companion.user_id == current_user.user_id;
        let is_unread = unread.contains(&chat.chat_id);
        (!is_self, !is_unread)
    });
    ordered
}

/// Chat pane screen state
///
/// Holds the compose input and the chat window. A pane opened with an
/// invalid context carries no window at all: it renders the terminal error
/// and never fetches.
#[derive(Debug)]
pub struct ChatPaneScreen {
    /// The chat being shown
    pub chat_id: i64,
    /// The other member of the chat, when resolved
    pub companion: Option<User>,
    /// The open conversation state; absent for an invalid context
    pub window: Option<ChatWindow>,
    /// Terminal, non-retryable context error
    pub context_error: Option<ContextError>,
    /// Compose input buffer
    pub input: String,
    /// First visible content line
    pub scroll_offset: usize,
    /// Total content lines at the last render
    pub content_extent: usize,
    /// Visible height at the last render
    pub viewport_height: usize,
    /// Status message
    pub status_message: Option<String>,
}

impl ChatPaneScreen {
    /// Open a pane for a valid chat context
    ///
    /// Returns the screen together with the initial page fetch to dispatch.
    pub fn open(
        chat_id: i64,
        epoch: u64,
        page_size: usize,
        companion: User,
    ) -> (Self, FetchRequest) {
        let (window, request) = ChatWindow::open(chat_id, epoch, page_size);
        let screen = Self {
            chat_id,
            companion: Some(companion),
            window: Some(window),
            context_error: None,
            input: String::new(),
            scroll_offset: 0,
            content_extent: 0,
            viewport_height: 0,
            status_message: None,
        };
        (screen, request)
    }

    /// Create a pane that only renders a terminal context error
    pub fn invalid(chat_id: i64, error: ContextError) -> Self {
        Self {
            chat_id,
            companion: None,
            window: None,
            context_error: Some(error),
            input: String::new(),
            scroll_offset: 0,
            content_extent: 0,
            viewport_height: 0,
            status_message: None,
        }
    }

    /// Add character to input
    pub fn add_char(&mut self, c: char) {
        self.input.push(c);
    }

    /// Remove last character from input
    pub fn backspace(&mut self) {
        self.input.pop();
    }

    /// Clear input buffer
    pub fn clear_input(&mut self) {
        self.input.clear();
    }

    /// Paste from clipboard into the compose input
    pub fn paste_from_clipboard(&mut self) {
        match Clipboard::new() {
            Ok(mut clipboard) => match clipboard.get_text() {
                Ok(text) => {
                    self.input.push_str(text.trim_end_matches('\n'));
                }
                Err(e) => {
                    self.status_message = Some(format!("Failed to paste: {}", e));
                }
            },
            Err(e) => {
                self.status_message = Some(format!("Clipboard error: {}", e));
            }
        }
    }

    /// Scroll message history up by `step` lines
    pub fn scroll_up(&mut self, step: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(step);
    }

    /// Scroll message history down by `step` lines
    ///
    /// Clamped to the maximum offset seen at the last render.
    pub fn scroll_down(&mut self, step: usize) {
        let max_offset = self.content_extent.saturating_sub(self.viewport_height);
        self.scroll_offset = (self.scroll_offset + step).min(max_offset);
    }

    /// Whether the viewport sits at the very top of the loaded history
    pub fn at_top(&self) -> bool {
        self.scroll_offset == 0
    }

    /// Set status message
    pub fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
    }
}

/// Settings screen state
#[derive(Debug)]
pub struct SettingsScreen {
    /// Input buffer for the page size
    pub page_size_input: String,
    /// Status/confirmation message
    pub status_message: Option<String>,
    /// Whether status is an error
    pub is_error: bool,
    /// Settings path for saving
    pub settings_path: String,
}

impl SettingsScreen {
    /// Create new settings screen
    pub fn new(settings_path: String) -> Self {
        let settings = Settings::load(&settings_path).unwrap_or_default();

        Self {
            page_size_input: settings.page_size.to_string(),
            status_message: Some("Edit page size and press Enter to save".to_string()),
            is_error: false,
            settings_path,
        }
    }

    /// Add character to input (only digits)
    pub fn add_char(&mut self, c: char) {
        if c.is_ascii_digit() {
            self.page_size_input.push(c);
        }
    }

    /// Remove last character from input
    pub fn backspace(&mut self) {
        self.page_size_input.pop();
    }

    /// Validate and save settings
    ///
    /// Returns the new page size when the input was valid and saved.
    pub fn validate_and_save(&mut self) -> Option<usize> {
        if self.page_size_input.is_empty() {
            self.status_message = Some("Error: Page size cannot be empty".to_string());
            self.is_error = true;
            return None;
        }

        match self.page_size_input.parse::<usize>() {
            Ok(size) if (1..=200).contains(&size) => match self.save_page_size(size) {
                Ok(()) => {
                    self.status_message = Some(format!("✓ Saved! Page size set to {}", size));
                    self.is_error = false;
                    Some(size)
                }
                Err(e) => {
                    self.status_message = Some(format!("Error saving: {}", e));
                    self.is_error = true;
                    None
                }
            },
            Ok(0) => {
                self.status_message = Some("Error: Page size must be at least 1".to_string());
                self.is_error = true;
                None
            }
            Ok(_) => {
                self.status_message = Some("Error: Page size cannot exceed 200".to_string());
                self.is_error = true;
                None
            }
            Err(_) => {
                self.status_message = Some("Error: Invalid number".to_string());
                self.is_error = true;
                None
            }
        }
    }

    fn save_page_size(&mut self, page_size: usize) -> crate::Result<()> {
        let mut settings = Settings::load(&self.settings_path)?;
        settings.page_size = page_size;
        settings.save(&self.settings_path)
    }
}
