//! Per-client session management.
//!
//! A session is the unit of ownership for conversation state: each one holds
//! exactly one [`ConversationStore`](crate::conversation::ConversationStore),
//! and the registry discards sessions once they sit idle past a timeout.
//!
//! # Architecture
//!
//! - [`Session`]: handle to one client's conversations
//! - [`SessionStore`]: thread-safe registry of live sessions
//!
//! # Example
//!
//! ```rust
//! use chat_relay::session::SessionStore;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let store = SessionStore::default();
//! let session = store.create();
//! let conversations = session.conversations().await;
//! assert_eq!(conversations.len(), 1);
//! # });
//! ```

mod registry;

pub use registry::{DEFAULT_SESSION_TIMEOUT, Session, SessionStore};
