//! Chat Relay
//!
//! A server-side chat relay: accepts user messages over HTTP, forwards the
//! conversation history to a generative AI backend, and returns the reply,
//! while keeping several named conversations per client session.
//!
//! # Architecture
//!
//! - **Server**: Axum JSON API with cookie-identified sessions
//! - **Conversations**: in-memory, per-session bookkeeping with derived titles
//! - **Providers**: one trait, one adapter per AI backend (`OpenAI`, Gemini)
//!
//! # Modules
//!
//! - [`chat`]: Send-message pipeline
//! - [`config`]: Layered configuration
//! - [`conversation`]: Conversation records and the per-session store
//! - [`llm`]: Provider trait and backend adapters
//! - [`session`]: Session registry and expiry

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::unused_async)]

pub mod chat;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod server;
pub mod session;

use std::sync::Arc;

use chat::ChatService;
use session::SessionStore;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Send-message pipeline bound to the configured provider.
    pub chat: Arc<ChatService>,
    /// Live sessions, each owning its conversations.
    pub sessions: SessionStore,
    /// Name of the cookie carrying the session ID.
    pub cookie_name: String,
}

impl AppState {
    /// Bundle the shared handler state.
    #[must_use]
    pub fn new(chat: Arc<ChatService>, sessions: SessionStore, cookie_name: impl Into<String>) -> Self {
        Self {
            chat,
            sessions,
            cookie_name: cookie_name.into(),
        }
    }
}
