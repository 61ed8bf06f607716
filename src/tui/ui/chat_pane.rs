//! Chat pane rendering
//!
//! Builds the visible message lines, resolves the window's pending scroll
//! adjustment against the freshly computed content extent, and records the
//! extent/viewport pair the key handlers need for the next backward load.

use crate::model::Message;
use crate::tui::app::App;
use crate::tui::ui::helpers::{format_day, format_time, same_day};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Renders the screen

pub fn render_chat_pane(f: &mut Frame, app: &mut App) {
    let size = f.size();
    let current_user_id = app.settings.user_id;
    let current_nickname = app
        .session
        .current_user
        .as_ref()
        .map(|u| u.nickname.clone())
        .unwrap_or_else(|| "You".to_string());

    let Some(screen) = &mut app.chat_pane_screen else {
        return;
    };

    // Terminal context error: a fixed message, nothing else.
    if let Some(error) = screen.context_error {
        let message = Paragraph::new(error.message())
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Error"));
        f.render_widget(message, size);
        return;
    }

    let companion_nickname = screen
        .companion
        .as_ref()
        .map(|u| u.nickname.clone())
        .unwrap_or_default();

    // Create layout
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(5),    // Message history
            Constraint::Length(3), // Input box
            Constraint::Length(3), // Status/Help
        ])
        .split(size);

    // Title - companion name
    let title = Paragraph::new(format!("Chat with {}", companion_nickname))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    // Message history
    let Some(window) = &mut screen.window else {
        return;
    };

    if window.is_loading() && window.store().is_empty() {
        let loading = Paragraph::new("Loading messages...")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Messages"));
        f.render_widget(loading, chunks[1]);
    } else if window.store().is_empty() {
        let text = if window.load_failed() {
            "Failed to load messages. Press Esc and reopen the chat to retry."
        } else {
            "No messages yet. Type a message below and press Enter to send."
        };
        let empty_msg = Paragraph::new(text)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Messages"));
        f.render_widget(empty_msg, chunks[1]);
    } else {
        let lines = message_lines(
            window.store().messages(),
            current_user_id,
            &current_nickname,
            &companion_nickname,
            window.has_more(),
            window.is_loading(),
        );
        let extent = lines.len();
        let viewport = chunks[1].height.saturating_sub(2) as usize;

        // Resolve the pending adjustment now that the post-mutation extent
        // is known. A terminal has no smooth scrolling; both modes position
        // directly.
        if let Some(target) = window.take_scroll_adjustment().resolve(extent, viewport) {
            screen.scroll_offset = target.offset;
        }
        let max_offset = extent.saturating_sub(viewport);
        screen.scroll_offset = screen.scroll_offset.min(max_offset);
        screen.content_extent = extent;
        screen.viewport_height = viewport;

        let start = screen.scroll_offset.min(extent);
        let end = (start + viewport).min(extent);
        let visible: Vec<Line> = lines[start..end].to_vec();

        let messages_widget = Paragraph::new(visible).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Messages ({}/{})", end, extent)),
        );
        f.render_widget(messages_widget, chunks[1]);
    }

    // Input box
    let input_widget = Paragraph::new(screen.input.as_str())
        .style(Style::default().fg(Color::Yellow))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Type your message"),
        );
    f.render_widget(input_widget, chunks[2]);

    // Status/Help
    let help_text = if let Some(status) = &screen.status_message {
        status.clone()
    } else {
        "Enter: Send | PgUp: Older/Scroll | PgDn: Scroll | End: Bottom | Esc: Back".to_string()
    };
    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[3]);
}

/// Build the full message content as one line per entry
///
/// Day separators group same-day messages; the first line indicates whether
/// more history exists above the loaded range.
fn message_lines(
    messages: &[Message],
    current_user_id: i64,
    current_nickname: &str,
    companion_nickname: &str,
    has_more: bool,
    is_loading: bool,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::with_capacity(messages.len() + 8);

    let top_hint = if is_loading {
        "··· loading older messages ···"
    } else if has_more {
        "··· press PgUp at the top for older messages ···"
    } else {
        "··· start of conversation ···"
    };
    lines.push(Line::from(Span::styled(
        top_hint.to_string(),
        Style::default().fg(Color::DarkGray),
    )));

    let mut previous: Option<&Message> = None;
    for msg in messages {
        let new_day = match previous {
            Some(prev) => !same_day(prev.send_dttm, msg.send_dttm),
            None => true,
        };
        if new_day {
            lines.push(Line::from(Span::styled(
                format!("— {} —", format_day(msg.send_dttm)),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )));
        }

        let is_from_me = msg.sender_id == current_user_id;
        let sender_label = if is_from_me {
            current_nickname
        } else {
            companion_nickname
        };
        let sender_color = if is_from_me { Color::Green } else { Color::Blue };
        // Negative id: optimistic placeholder awaiting server confirmation.
        let pending_marker = if msg.message_id < 0 { " ⌛" } else { "" };
        let reply_marker = if msg.reply_to_message_id.is_some() {
            "↪ "
        } else {
            ""
        };

        lines.push(Line::from(vec![
            Span::styled(
                format!("[{}] ", format_time(msg.send_dttm)),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(
                format!("{}: ", sender_label),
                Style::default()
                    .fg(sender_color)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("{}{}{}", reply_marker, msg.text, pending_marker),
                Style::default().fg(Color::White),
            ),
        ]));
        previous = Some(msg);
    }

    lines
}
