//! Main TUI application state and logic
//!
//! The app is the single owner of all mutable state and runs on the UI event
//! loop. Network work (history fetches, sends, session refresh) is spawned
//! onto a tokio runtime; each task reports back through an [`AppEvent`]
//! tagged with the chat id and window epoch it was issued for, and
//! `poll_events` folds the results into the active screen. Results that
//! outlived their window are discarded there, never applied.

use crate::api::{ApiClient, MessageGateway};
use crate::live::{self, ConnectionManager, Subscription};
use crate::model::{ChatWithCompanion, Message};
use crate::pagination::{FetchRequest, PageKind};
use crate::session::{SessionData, Settings};
use crate::tui::screens::{ChatListScreen, ChatPaneScreen, SettingsScreen, ordered_chats};
use crate::tui::types::Screen;
use crate::window::{ContextError, SendOutcome, validate_context};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Events delivered from background tasks to the UI loop
#[derive(Debug)]
pub enum AppEvent {
    /// A history page fetch completed
    PageLoaded {
        /// The request this outcome answers
        request: FetchRequest,
        /// The newest-first page, or the failure reason
        result: std::result::Result<Vec<Message>, String>,
    },
    /// A send completed
    SendCompleted {
        /// Chat the send targeted
        chat_id: i64,
        /// Window generation the send was issued under
        epoch: u64,
        /// Optimistic placeholder to replace or roll back
        placeholder_id: i64,
        /// The confirmed message, or the failure reason
        result: std::result::Result<Message, String>,
    },
    /// A live push arrived on a subscribed topic
    Push(Message),
    /// A session refresh completed
    SessionRefreshed {
        /// The fresh session blob, or the failure reason
        result: std::result::Result<SessionData, String>,
    },
}

/// Application state
pub struct App {
    /// Application settings
    pub settings: Settings,
    /// Cached session data (current user, memberships, companions)
    pub session: SessionData,
    /// Chat list projection, recomputed when the session changes
    pub chat_list: Vec<ChatWithCompanion>,
    /// Chats with unread activity
    pub unread_chats: HashSet<i64>,
    /// Current screen
    pub current_screen: Screen,
    /// Chat list screen state
    pub chat_list_screen: ChatListScreen,
    /// Chat pane screen (when a chat is open)
    pub chat_pane_screen: Option<ChatPaneScreen>,
    /// Settings screen (when active)
    pub settings_screen: Option<SettingsScreen>,
    /// Should quit
    pub should_quit: bool,

    gateway: Arc<dyn MessageGateway>,
    api: ApiClient,
    manager: ConnectionManager,
    runtime: tokio::runtime::Runtime,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    /// Bumped on every chat switch; tags all in-flight work
    window_epoch: u64,
    /// Scoped registration for the active chat's topic
    chat_subscription: Option<Subscription>,
    /// App-lifetime registration for the user topic
    user_subscription: Option<Subscription>,
    /// Last live-channel reconnect attempt
    last_reconnect: std::time::Instant,
    settings_path: String,
}

impl App {
    /// Create new application
    ///
    /// Loads settings, fetches a fresh session (falling back to the disk
    /// cache when the server is unreachable), and connects the live channel.
    pub fn new_with_settings<P: AsRef<std::path::Path>>(
        settings_path: Option<P>,
    ) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let settings_path = settings_path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string())
            .unwrap_or_else(|| "settings.json".to_string());
        let settings = Settings::load(&settings_path)?;

        let runtime = tokio::runtime::Runtime::new()?;
        let api = ApiClient::new(&settings.base_url);
        let gateway: Arc<dyn MessageGateway> = Arc::new(api.clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        // Fresh session if the server answers, cached blob otherwise.
        let session = match runtime.block_on(SessionData::fetch(&api, settings.user_id)) {
            Ok(session) => {
                if let Err(e) = session.save(&settings.session_cache_path) {
                    tracing::warn!("Failed to cache session: {}", e);
                }
                session
            }
            Err(e) => {
                tracing::warn!("Session fetch failed, using cache: {}", e);
                SessionData::load(&settings.session_cache_path)?
            }
        };
        let chat_list = session.chats_with_companions();

        let mut manager = ConnectionManager::new(&settings.ws_url);
        if let Err(e) = runtime.block_on(manager.connect()) {
            // History and sending still work over REST; pushes resume after
            // a reconnect.
            tracing::warn!("Live channel unavailable: {}", e);
        }
        let tx = events_tx.clone();
        let user_subscription = Some(manager.subscribe(
            &live::user_topic(settings.user_id),
            move |message| {
                let _ = tx.send(AppEvent::Push(message));
            },
        ));

        Ok(Self {
            settings,
            session,
            chat_list,
            unread_chats: HashSet::new(),
            current_screen: Screen::ChatList,
            chat_list_screen: ChatListScreen::new(),
            chat_pane_screen: None,
            settings_screen: None,
            should_quit: false,
            gateway,
            api,
            manager,
            runtime,
            events_tx,
            events_rx,
            window_epoch: 0,
            chat_subscription: None,
            user_subscription,
            last_reconnect: std::time::Instant::now(),
            settings_path,
        })
    }

    /// Create new application with default settings path
    pub fn new() -> std::result::Result<Self, Box<dyn std::error::Error>> {
        Self::new_with_settings(None::<&str>)
    }

    /// The chat list in display order (self-chat first, unread next)
    pub fn ordered_chat_list(&self) -> Vec<ChatWithCompanion> {
        match &self.session.current_user {
            Some(current_user) => ordered_chats(&self.chat_list, &self.unread_chats, current_user),
            None => self.chat_list.clone(),
        }
    }

    /// Open the chat currently selected in the chat list
    pub fn open_selected_chat(&mut self) {
        let ordered = self.ordered_chat_list();
        if let Some(chat) = ordered.get(self.chat_list_screen.selected_index) {
            self.open_chat(chat.chat_id, chat.companion.user_id);
        }
    }

    /// Open a chat pane
    ///
    /// Switching chats invalidates all in-flight work for the previous
    /// window (epoch bump), swaps the live-topic registration, and starts
    /// the initial page load. An invalid context yields a terminal error
    /// pane and no fetch at all.
    pub fn open_chat(&mut self, chat_id: i64, companion_id: i64) {
        self.window_epoch += 1;
        if let Some(subscription) = self.chat_subscription.take() {
            self.manager.release(subscription);
        }

        let companion = self.session.companion(companion_id).cloned();
        let context = validate_context(
            chat_id,
            self.session.current_user.as_ref(),
            companion.as_ref(),
        );
        if let (Ok(()), Some(companion)) = (context, companion) {
            let (screen, request) = ChatPaneScreen::open(
                chat_id,
                self.window_epoch,
                self.settings.page_size,
                companion,
            );
            self.dispatch_fetch(request);

            let tx = self.events_tx.clone();
            self.chat_subscription =
                Some(self.manager.subscribe(&live::chat_topic(chat_id), move |message| {
                    let _ = tx.send(AppEvent::Push(message));
                }));

            self.unread_chats.remove(&chat_id);
            self.chat_pane_screen = Some(screen);
        } else {
            let error = context.err().unwrap_or(ContextError::ProfileUnresolved);
            tracing::warn!(chat_id, ?error, "Refusing to open chat");
            self.chat_pane_screen = Some(ChatPaneScreen::invalid(chat_id, error));
        }
        self.current_screen = Screen::ChatPane;
    }

    /// Close the pane and return to the chat list
    pub fn close_chat(&mut self) {
        self.window_epoch += 1;
        if let Some(subscription) = self.chat_subscription.take() {
            self.manager.release(subscription);
        }
        self.chat_pane_screen = None;
        self.current_screen = Screen::ChatList;
    }

    /// Send the composed message in the open pane
    pub fn send_message(&mut self) {
        let user_id = self.settings.user_id;
        let Some(screen) = &mut self.chat_pane_screen else {
            return;
        };
        let Some(window) = &mut screen.window else {
            return;
        };
        let text = screen.input.trim().to_string();
        if text.is_empty() {
            return;
        }

        let placeholder = window.begin_send(user_id, &text);
        screen.input.clear();

        let chat_id = window.chat_id();
        let epoch = window.epoch();
        let placeholder_id = placeholder.message_id;
        let gateway = self.gateway.clone();
        let tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let result = gateway
                .send_message(chat_id, user_id, &text)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::SendCompleted {
                chat_id,
                epoch,
                placeholder_id,
                result,
            });
        });
    }

    /// Load the next older history page for the open pane
    ///
    /// Captures the viewport as last rendered before issuing the fetch; the
    /// backward-load guards make this a no-op when nothing may be fetched.
    pub fn load_older(&mut self) {
        let Some(screen) = &mut self.chat_pane_screen else {
            return;
        };
        let Some(window) = &mut screen.window else {
            return;
        };
        let request = window.begin_older(screen.content_extent, screen.scroll_offset);
        if let Some(request) = request {
            self.dispatch_fetch(request);
        }
    }

    /// Re-fetch the session blob in the background
    pub fn refresh_session(&mut self) {
        let api = self.api.clone();
        let user_id = self.settings.user_id;
        let tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let result = SessionData::fetch(&api, user_id)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::SessionRefreshed { result });
        });
    }

    /// Re-establish the live channel after a transport drop
    ///
    /// Called from the UI loop; attempts are spaced by the configured
    /// reconnect delay and bounded so a dead server cannot stall input for
    /// long. A successful connect re-issues every registered subscription
    /// exactly once, so no duplicates accumulate across reconnects.
    pub fn maintain_live_channel(&mut self) {
        if self.manager.is_connected() {
            return;
        }
        let delay = std::time::Duration::from_millis(self.settings.reconnect_delay_ms);
        if self.last_reconnect.elapsed() < delay {
            return;
        }
        self.last_reconnect = std::time::Instant::now();

        let attempt = self.runtime.block_on(async {
            tokio::time::timeout(
                std::time::Duration::from_millis(750),
                self.manager.connect(),
            )
            .await
        });
        match attempt {
            Ok(Ok(())) => tracing::info!("Live channel reconnected"),
            Ok(Err(e)) => tracing::warn!("Live channel reconnect failed: {}", e),
            Err(_) => tracing::warn!("Live channel reconnect timed out"),
        }
    }

    /// Drain and apply all pending background events
    pub fn poll_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
    }

    /// Apply one background event to the UI state
    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::PageLoaded { request, result } => {
                if let Some(screen) = &mut self.chat_pane_screen {
                    if let Some(window) = &mut screen.window {
                        let applied = window.apply_fetch(&request, result);
                        if applied && window.load_failed() {
                            screen.set_status(
                                "Failed to load messages. Scroll up to retry.".to_string(),
                            );
                        }
                    }
                }
            }
            AppEvent::SendCompleted {
                chat_id,
                epoch,
                placeholder_id,
                result,
            } => {
                if let Some(screen) = &mut self.chat_pane_screen {
                    if let Some(window) = &mut screen.window {
                        if window.chat_id() == chat_id && window.epoch() == epoch {
                            match window.complete_send(placeholder_id, result) {
                                SendOutcome::Failed { text } => {
                                    // Preserve the user's words for retry, but
                                    // never clobber text typed since.
                                    if screen.input.is_empty() {
                                        screen.input = text;
                                    }
                                    screen.set_status(
                                        "Send failed. Press Enter to retry.".to_string(),
                                    );
                                }
                                SendOutcome::Confirmed(_) | SendOutcome::Stale => {}
                            }
                        }
                    }
                }
            }
            AppEvent::Push(message) => {
                let owned = self.session.owned_chat_ids();
                let active = self
                    .chat_pane_screen
                    .as_mut()
                    .and_then(|screen| screen.window.as_mut());
                live::route_push(message, active, &owned, &mut self.unread_chats);
            }
            AppEvent::SessionRefreshed { result } => match result {
                Ok(session) => {
                    if let Err(e) = session.save(&self.settings.session_cache_path) {
                        tracing::warn!("Failed to cache session: {}", e);
                    }
                    self.chat_list = session.chats_with_companions();
                    self.session = session;
                }
                Err(reason) => {
                    self.chat_list_screen
                        .set_status(format!("Refresh failed: {}", reason));
                }
            },
        }
    }

    /// Show the settings screen
    pub fn show_settings_screen(&mut self) {
        self.settings_screen = Some(SettingsScreen::new(self.settings_path.clone()));
        self.current_screen = Screen::Settings;
    }

    /// Apply a saved page size and return to the chat list
    pub fn apply_page_size(&mut self, page_size: usize) {
        self.settings.page_size = page_size;
    }

    /// Leave the settings screen
    pub fn close_settings(&mut self) {
        self.settings_screen = None;
        self.current_screen = Screen::ChatList;
    }

    /// Persist the session cache
    pub fn save_state(&self) -> crate::Result<()> {
        self.session.save(&self.settings.session_cache_path)
    }

    /// Tear down the live channel
    pub fn shutdown(&mut self) {
        if let Some(subscription) = self.chat_subscription.take() {
            self.manager.release(subscription);
        }
        if let Some(subscription) = self.user_subscription.take() {
            self.manager.release(subscription);
        }
        self.manager.disconnect();
    }

    fn dispatch_fetch(&self, request: FetchRequest) {
        let gateway = self.gateway.clone();
        let tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let result = match request.kind {
                PageKind::Initial => {
                    gateway
                        .fetch_last_messages(request.chat_id, request.limit)
                        .await
                }
                PageKind::Older { before_message_id } => {
                    gateway
                        .fetch_messages_before(request.chat_id, before_message_id, request.limit)
                        .await
                }
            };
            let _ = tx.send(AppEvent::PageLoaded {
                request,
                result: result.map_err(|e| e.to_string()),
            });
        });
    }

    /// Block until the next background event arrives, then apply it
    ///
    /// Test helper; the interactive loop uses `poll_events`.
    #[cfg(test)]
    fn apply_next_event(&mut self) {
        if let Some(event) = self.events_rx.blocking_recv() {
            self.handle_event(event);
        }
    }

    /// Build an app around a fake gateway, bypassing network and terminal
    #[cfg(test)]
    fn new_for_test(gateway: Arc<dyn MessageGateway>, session: SessionData) -> Self {
        let cache_path = std::env::temp_dir()
            .join(format!("dialogue-test-session-{}.json", std::process::id()));
        let settings = Settings {
            user_id: session
                .current_user
                .as_ref()
                .map(|u| u.user_id)
                .unwrap_or_default(),
            session_cache_path: cache_path.to_string_lossy().to_string(),
            ..Settings::default()
        };
        let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let chat_list = session.chats_with_companions();

        Self {
            api: ApiClient::new(&settings.base_url),
            manager: ConnectionManager::new(&settings.ws_url),
            settings,
            session,
            chat_list,
            unread_chats: HashSet::new(),
            current_screen: Screen::ChatList,
            chat_list_screen: ChatListScreen::new(),
            chat_pane_screen: None,
            settings_screen: None,
            should_quit: false,
            gateway,
            runtime,
            events_tx,
            events_rx,
            window_epoch: 0,
            chat_subscription: None,
            user_subscription: None,
            last_reconnect: std::time::Instant::now(),
            settings_path: "settings.json".to_string(),
        }
    }
}
