//! Settings screen rendering

use crate::tui::app::App;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Renders the screen

pub fn render_settings(f: &mut Frame, app: &App) {
    let size = f.size();

    if let Some(screen) = &app.settings_screen {
        // Create layout
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(2)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Length(3), // Page size input
                Constraint::Length(3), // Status message
                Constraint::Min(3),    // Help text
            ])
            .split(size);

        // Title
        let title = Paragraph::new("Settings")
            .style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, chunks[0]);

        // Page size input
        let input = Paragraph::new(screen.page_size_input.as_str())
            .style(Style::default().fg(Color::Yellow))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Messages per history page (1-200)"),
            );
        f.render_widget(input, chunks[1]);

        // Status message
        let status_color = if screen.is_error {
            Color::Red
        } else {
            Color::Green
        };
        let status = Paragraph::new(screen.status_message.clone().unwrap_or_default())
            .style(Style::default().fg(status_color))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(status, chunks[2]);

        // Help text
        let help = Paragraph::new("Enter: Save | Esc/b: Back to Chat List")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(help, chunks[3]);
    }
}
