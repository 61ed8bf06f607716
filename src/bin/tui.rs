//! Dialogue TUI (Terminal User Interface)
//!
//! A terminal-based user interface for the Dialogue messaging client.

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dialogue::tui::{App, Screen, ui::ui};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app state
    let mut app = App::new()?;

    // Run main loop
    let res = run_app(&mut terminal, &mut app);

    // Save session cache and release the live channel before exit
    if let Err(e) = app.save_state() {
        eprintln!("Warning: Failed to save session cache: {}", e);
    }
    app.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        // Fold in completed fetches, send results, and live pushes
        app.poll_events();
        app.maintain_live_channel();

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                match app.current_screen {
                    Screen::ChatList => match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => {
                            app.should_quit = true;
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            let count = app.ordered_chat_list().len();
                            app.chat_list_screen.next(count);
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            let count = app.ordered_chat_list().len();
                            app.chat_list_screen.previous(count);
                        }
                        KeyCode::Enter => {
                            app.open_selected_chat();
                        }
                        KeyCode::Char('r') => {
                            app.chat_list_screen.set_status("Refreshing...".to_string());
                            app.refresh_session();
                        }
                        KeyCode::Char('s') => {
                            app.show_settings_screen();
                        }
                        _ => {}
                    },
                    Screen::ChatPane => match key.code {
                        KeyCode::Esc => {
                            app.close_chat();
                        }
                        KeyCode::Enter => {
                            app.send_message();
                        }
                        KeyCode::PageUp => {
                            // At the very top a further page-up asks for
                            // older history; otherwise it scrolls.
                            let at_top = app
                                .chat_pane_screen
                                .as_ref()
                                .map(|s| s.at_top())
                                .unwrap_or(false);
                            if at_top {
                                app.load_older();
                            } else if let Some(screen) = &mut app.chat_pane_screen {
                                let step = screen.viewport_height.max(1) / 2;
                                screen.scroll_up(step.max(1));
                            }
                        }
                        KeyCode::PageDown => {
                            if let Some(screen) = &mut app.chat_pane_screen {
                                let step = screen.viewport_height.max(1) / 2;
                                screen.scroll_down(step.max(1));
                            }
                        }
                        KeyCode::End => {
                            if let Some(screen) = &mut app.chat_pane_screen {
                                let max = screen
                                    .content_extent
                                    .saturating_sub(screen.viewport_height);
                                screen.scroll_offset = max;
                            }
                        }
                        KeyCode::Char('v') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            if let Some(screen) = &mut app.chat_pane_screen {
                                screen.paste_from_clipboard();
                            }
                        }
                        KeyCode::Backspace => {
                            if let Some(screen) = &mut app.chat_pane_screen {
                                screen.backspace();
                            }
                        }
                        KeyCode::Char(c) if !c.is_control() => {
                            if let Some(screen) = &mut app.chat_pane_screen {
                                screen.add_char(c);
                            }
                        }
                        _ => {}
                    },
                    Screen::Settings => match key.code {
                        KeyCode::Esc | KeyCode::Char('b') => {
                            app.close_settings();
                        }
                        KeyCode::Enter => {
                            let saved = app
                                .settings_screen
                                .as_mut()
                                .and_then(|screen| screen.validate_and_save());
                            if let Some(page_size) = saved {
                                app.apply_page_size(page_size);
                            }
                        }
                        KeyCode::Backspace => {
                            if let Some(screen) = &mut app.settings_screen {
                                screen.backspace();
                            }
                        }
                        KeyCode::Char(c) => {
                            if let Some(screen) = &mut app.settings_screen {
                                screen.add_char(c);
                            }
                        }
                        _ => {}
                    },
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
