//! Chat list screen rendering

use crate::tui::app::App;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

/// Renders the screen

pub fn render_chat_list(f: &mut Frame, app: &App) {
    let size = f.size();
    let chats = app.ordered_chat_list();

    // Create layout
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(5),    // Chat list
            Constraint::Length(3), // Status message
            Constraint::Length(3), // Help text
        ])
        .split(size);

    // Title
    let nickname = app
        .session
        .current_user
        .as_ref()
        .map(|u| u.nickname.clone())
        .unwrap_or_else(|| "offline".to_string());
    let title = Paragraph::new(format!("Chats ({}) — {}", chats.len(), nickname))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    // Chat list
    if chats.is_empty() {
        let empty_msg = Paragraph::new("No chats yet.")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Chats"));
        f.render_widget(empty_msg, chunks[1]);
    } else {
        let chat_items: Vec<ListItem> = chats
            .iter()
            .enumerate()
            .map(|(i, chat)| {
                let is_selected = i == app.chat_list_screen.selected_index;
                let is_unread = app.unread_chats.contains(&chat.chat_id);

                let marker = if is_selected { "> " } else { "  " };
                let mut spans = vec![
                    Span::styled(
                        marker,
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::styled(
                        chat.companion.nickname.clone(),
                        if is_selected {
                            Style::default()
                                .fg(Color::Cyan)
                                .add_modifier(Modifier::BOLD)
                        } else {
                            Style::default().fg(Color::White)
                        },
                    ),
                    Span::styled(
                        format!("  {}", chat.companion.display_name()),
                        Style::default().fg(Color::DarkGray),
                    ),
                ];
                if is_unread {
                    spans.push(Span::styled(
                        "  ● new",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let list = List::new(chat_items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Chats ({})", chats.len())),
        );
        f.render_widget(list, chunks[1]);
    }

    // Status message
    let status_text = app
        .chat_list_screen
        .status_message
        .clone()
        .unwrap_or_default();
    let status = Paragraph::new(status_text)
        .style(Style::default().fg(Color::Yellow))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(status, chunks[2]);

    // Help text
    let help = Paragraph::new("Enter: Open | ↑/↓: Navigate | r: Refresh | s: Settings | q: Quit")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[3]);
}
