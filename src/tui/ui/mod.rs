//! UI rendering module - screen-specific rendering functions
//!
//! This module contains the UI rendering logic organized by screen type.
//! Each screen has its own file for better maintainability.

mod chat_list;
mod chat_pane;
mod helpers;
mod settings;

use crate::tui::app::App;
use crate::tui::types::Screen;
use ratatui::Frame;

// Re-export render functions
pub use chat_list::render_chat_list;
pub use chat_pane::render_chat_pane;
pub use settings::render_settings;

// Re-export helper functions
pub use helpers::{format_day, format_time};

/// Main UI rendering function - dispatches to screen-specific render functions
pub fn ui(f: &mut Frame, app: &mut App) {
    match app.current_screen {
        Screen::ChatList => render_chat_list(f, app),
        Screen::ChatPane => render_chat_pane(f, app),
        Screen::Settings => render_settings(f, app),
    }
}
