//! Dialogue - a terminal messaging client
//!
//! This library provides the core functionality for Dialogue, a chat client
//! that talks to a messaging server over REST (paginated history, sending)
//! and a STOMP-over-WebSocket channel (live message pushes).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod live;
pub mod model;
pub mod pagination;
pub mod scroll;
pub mod session;
pub mod store;
pub mod tui;
pub mod window;

/// Result type alias for Dialogue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Dialogue operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// REST API error
    #[error("API error: {0}")]
    Api(String),

    /// Live channel / WebSocket error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Session or settings error
    #[error("Session error: {0}")]
    Session(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Initialize the Dialogue library with logging
///
/// Intended for headless use and integration tests. The TUI binary owns the
/// terminal and must not write log output to stdout.
pub fn init() {
    tracing_subscriber::fmt::init();
}
