//! Settings and cached session data
//!
//! Settings are the client's persistent configuration (server URLs, the
//! provisioned user id, page size). The session blob caches everything the
//! chat list needs between runs: the current user's profile, memberships,
//! and companion profiles. Both are JSON on disk; loading a missing or empty
//! file yields defaults rather than an error.

use crate::api::ApiClient;
use crate::model::{ChatMember, ChatWithCompanion, Contact, User, map_chats_with_companions};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application settings
///
/// # Example
/// ```rust,no_run
/// use dialogue::session::Settings;
///
/// let settings = Settings::load("settings.json").expect("Failed to load");
/// println!("Server: {}", settings.base_url);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// REST API base URL
    pub base_url: String,
    /// WebSocket URL for the live channel
    pub ws_url: String,
    /// The provisioned user id this client acts as
    pub user_id: i64,
    /// Messages per history page
    pub page_size: usize,
    /// Delay before the live channel is reconnected, in milliseconds
    pub reconnect_delay_ms: u64,
    /// Path of the session cache file
    pub session_cache_path: String,
}

impl Settings {
    /// Load settings from a JSON file
    ///
    /// Returns defaults if the file doesn't exist or is empty.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Session(format!("Failed to read settings: {}", e)))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&data)
            .map_err(|e| Error::Session(format!("Failed to parse settings: {}", e)))
    }

    /// Save settings to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Session(format!("Failed to create settings directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| Error::Session(format!("Failed to write settings: {}", e)))?;
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            ws_url: "ws://localhost:8080/api/ws".to_string(),
            user_id: 0,
            page_size: 40,
            reconnect_delay_ms: 5_000,
            session_cache_path: "./data/session.json".to_string(),
        }
    }
}

/// Cached session data
///
/// The raw inputs of the chat-list projection, fetched once per refresh and
/// cached to disk so the client can render a chat list before the first
/// round-trip completes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// The viewing user's profile
    pub current_user: Option<User>,
    /// The viewer's chat memberships
    pub my_chats: Vec<ChatMember>,
    /// Membership records of all visible chats
    pub all_chat_members: Vec<ChatMember>,
    /// Profiles of everyone sharing a chat with the viewer
    pub companions: Vec<User>,
    /// The viewer's contact entries
    pub contacts: Vec<Contact>,
}

impl SessionData {
    /// Load cached session data from a file
    ///
    /// Returns an empty session if the file doesn't exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Session(format!("Failed to read session cache: {}", e)))?;
        let session: SessionData = serde_json::from_str(&json)?;
        Ok(session)
    }

    /// Save session data to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Session(format!("Failed to create cache directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| Error::Session(format!("Failed to write session cache: {}", e)))?;
        Ok(())
    }

    /// Fetch a fresh session from the server
    pub async fn fetch(api: &ApiClient, user_id: i64) -> Result<Self> {
        let current_user = api.get_current_user().await?;
        let my_chats = api.get_my_chats(user_id).await?;
        let all_chat_members = api.get_all_chat_members().await?;
        let companions = api.get_companions(user_id).await?;

        tracing::info!(
            user_id,
            chats = my_chats.len(),
            companions = companions.len(),
            "Session refreshed"
        );

        Ok(Self {
            current_user: Some(current_user),
            my_chats,
            all_chat_members,
            companions,
            contacts: Vec::new(),
        })
    }

    /// The chat list: each of the viewer's chats paired with its companion
    ///
    /// A projection of the cached inputs; recompute after a refresh, not per
    /// render.
    pub fn chats_with_companions(&self) -> Vec<ChatWithCompanion> {
        let Some(current_user) = &self.current_user else {
            return Vec::new();
        };
        map_chats_with_companions(
            &self.my_chats,
            &self.all_chat_members,
            &self.companions,
            current_user,
        )
    }

    /// Ids of every chat the viewer belongs to
    pub fn owned_chat_ids(&self) -> std::collections::HashSet<i64> {
        self.my_chats.iter().map(|m| m.chat_id).collect()
    }

    /// Look up a companion profile by user id
    pub fn companion(&self, user_id: i64) -> Option<&User> {
        self.companions.iter().find(|u| u.user_id == user_id)
    }
}
