//! Core types for TUI screens and navigation

/// Application screens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// List of all chats
    ChatList,
    /// The open conversation
    ChatPane,
    /// Settings configuration
    Settings,
}
