//! REST API client
//!
//! All request/response shapes are the server's camelCase JSON (see
//! `model`). History endpoints return pages newest-first; reversing them
//! into chronological order is the message store's job, not the client's.
//!
//! Network and HTTP-status failures surface as `Error` values here and are
//! converted to local UI state at the pane boundary; they never propagate
//! into rendering.

use crate::model::{ChatMember, Message, User};
use crate::{Error, Result};
use serde::Serialize;

/// Message operations the chat pane driver needs
///
/// Split from [`ApiClient`] so the pane can be driven against an in-memory
/// fake in tests.
#[async_trait::async_trait]
pub trait MessageGateway: Send + Sync {
    /// Fetch the most recent `n` messages of a chat, newest-first
    async fn fetch_last_messages(&self, chat_id: i64, n: usize) -> Result<Vec<Message>>;

    /// Fetch up to `n` messages strictly older than `before_message_id`,
    /// newest-first
    async fn fetch_messages_before(
        &self,
        chat_id: i64,
        before_message_id: i64,
        n: usize,
    ) -> Result<Vec<Message>>;

    /// Persist a new message; returns it with server-assigned id and
    /// timestamp
    async fn send_message(&self, chat_id: i64, sender_id: i64, text: &str) -> Result<Message>;
}

/// Send-message request body
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Target chat
    pub chat_id: i64,
    /// Sending user
    pub sender_id: i64,
    /// Message text
    pub text: String,
}

/// HTTP client for the messaging server's REST API
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a client for the given base URL (e.g. `http://localhost:8080`)
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// The configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the authenticated user's profile
    pub async fn get_current_user(&self) -> Result<User> {
        self.get_json("/api/user/current".to_string()).await
    }

    /// Fetch a user profile by id
    pub async fn get_user_by_id(&self, user_id: i64) -> Result<User> {
        self.get_json(format!("/api/user?id={}", user_id)).await
    }

    /// Fetch the viewer's chat memberships
    pub async fn get_my_chats(&self, user_id: i64) -> Result<Vec<ChatMember>> {
        self.get_json(format!("/api/chat/my?userId={}", user_id)).await
    }

    /// Fetch the membership records of every chat the viewer can see
    pub async fn get_all_chat_members(&self) -> Result<Vec<ChatMember>> {
        self.get_json("/api/chat/members".to_string()).await
    }

    /// Fetch the profiles of everyone sharing a chat with the viewer
    pub async fn get_companions(&self, user_id: i64) -> Result<Vec<User>> {
        self.get_json(format!("/api/user/companions?userId={}", user_id))
            .await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: String) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api(format!("GET {} returned {}", path, status)));
        }
        Ok(response.json().await?)
    }
}

/// Query path for the last-N-messages endpoint
pub(crate) fn last_messages_path(chat_id: i64, n: usize) -> String {
    format!("/api/message/with-text/last?chatId={}&n={}", chat_id, n)
}

/// Query path for the messages-before endpoint
pub(crate) fn messages_before_path(chat_id: i64, before_message_id: i64, n: usize) -> String {
    format!(
        "/api/message/with-text/before?chatId={}&messageId={}&n={}",
        chat_id, before_message_id, n
    )
}

#[async_trait::async_trait]
impl MessageGateway for ApiClient {
    async fn fetch_last_messages(&self, chat_id: i64, n: usize) -> Result<Vec<Message>> {
        self.get_json(last_messages_path(chat_id, n)).await
    }

    async fn fetch_messages_before(
        &self,
        chat_id: i64,
        before_message_id: i64,
        n: usize,
    ) -> Result<Vec<Message>> {
        self.get_json(messages_before_path(chat_id, before_message_id, n))
            .await
    }

    async fn send_message(&self, chat_id: i64, sender_id: i64, text: &str) -> Result<Message> {
        let body = SendMessageRequest {
            chat_id,
            sender_id,
            text: text.to_string(),
        };
        let path = format!("/api/message?chatId={}", chat_id);
        let url = format!("{}{}", self.base_url, path);

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api(format!("POST {} returned {}", path, status)));
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_request_wire_shape() {
        let body = SendMessageRequest {
            chat_id: 3,
            sender_id: 7,
            text: "hello".to_string(),
        };
        let json = serde_json::to_string(&body).expect("Failed to serialize request");
        assert_eq!(json, r#"{"chatId":3,"senderId":7,"text":"hello"}"#);
    }

    #[test]
    fn test_history_paths() {
        assert_eq!(
            last_messages_path(1, 40),
            "/api/message/with-text/last?chatId=1&n=40"
        );
        assert_eq!(
            messages_before_path(1, 61, 40),
            "/api/message/with-text/before?chatId=1&messageId=61&n=40"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_is_normalized() {
        let client = ApiClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}
