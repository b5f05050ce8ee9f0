//! Conversation threads and their per-session store.
//!
//! # Architecture
//!
//! - [`Conversation`]: one titled, append-only thread of messages
//! - [`ConversationStore`]: every conversation of a session plus the active pointer
//! - [`derive_title`]: truncation of the first user message into a title
//!
//! # Example
//!
//! ```rust
//! use chat_relay::conversation::{ConversationStore, DEFAULT_TITLE};
//!
//! let mut store = ConversationStore::new();
//! let id = store.create_conversation().id.clone();
//! assert_eq!(store.get(&id).unwrap().title, DEFAULT_TITLE);
//!
//! let conversation = store.append_user_message(&id, "Hello there, how are you").unwrap();
//! assert_eq!(conversation.title, "Hello there, how are you");
//! ```

mod store;
mod title;

pub use store::{Conversation, ConversationList, ConversationStore};
pub use title::{DEFAULT_TITLE, TITLE_MAX_CHARS, TRUNCATION_MARKER, derive_title};
