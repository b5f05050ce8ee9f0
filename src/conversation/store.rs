//! Per-session conversation bookkeeping.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use super::title::{DEFAULT_TITLE, derive_title};
use crate::error::{ChatError, Result};
use crate::llm::Message;

/// A named, ordered thread of messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    /// Opaque unique identifier.
    pub id: String,
    /// Default placeholder or a prefix of the first user message.
    pub title: String,
    /// Messages, oldest first.
    pub messages: Vec<Message>,
}

impl Conversation {
    fn new(id: String) -> Self {
        Self {
            id,
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
        }
    }

    /// Whether the title is still the placeholder.
    #[must_use]
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }
}

/// Snapshot of every conversation plus the active pointer.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationList {
    /// Identifier of the active conversation.
    pub active_conversation: Option<String>,
    /// Conversations in creation order.
    pub conversations: Vec<Conversation>,
}

/// All conversations belonging to one session.
///
/// Starts empty. Every mutating operation first calls
/// [`ensure_initialized`](Self::ensure_initialized), so once touched the store
/// always holds at least one conversation and the active pointer names one of
/// them.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: HashMap<String, Conversation>,
    /// Creation order; used to pick a replacement active conversation.
    order: Vec<String>,
    active: Option<String>,
}

impl ConversationStore {
    /// Create an empty, uninitialized store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Guarantee a conversation exists and one is active. Idempotent.
    pub fn ensure_initialized(&mut self) {
        if self.order.is_empty() {
            self.insert_fresh();
            return;
        }
        let active_valid = self
            .active
            .as_ref()
            .is_some_and(|id| self.conversations.contains_key(id));
        if !active_valid {
            self.active = self.order.first().cloned();
        }
    }

    /// Whether the store has been touched yet.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        !self.order.is_empty()
    }

    /// Create an empty conversation and make it active.
    pub fn create_conversation(&mut self) -> &Conversation {
        self.ensure_initialized();
        let id = self.insert_fresh();
        tracing::debug!(conversation_id = %id, "Created conversation");
        &self.conversations[&id]
    }

    /// Make `id` the active conversation.
    pub fn switch_active(&mut self, id: &str) -> Result<&Conversation> {
        self.ensure_initialized();
        let conversation = self
            .conversations
            .get(id)
            .ok_or_else(|| ChatError::NotFound(id.to_string()))?;
        self.active = Some(id.to_string());
        Ok(conversation)
    }

    /// Append a user message, deriving the title if it is the first one.
    ///
    /// Blank text is rejected before the identifier is looked up.
    pub fn append_user_message(&mut self, id: &str, text: &str) -> Result<&Conversation> {
        if text.trim().is_empty() {
            return Err(ChatError::InvalidInput(
                "Message cannot be empty".to_string(),
            ));
        }
        self.ensure_initialized();
        let conversation = self.get_mut(id)?;
        conversation.messages.push(Message::user(text));
        if conversation.messages.len() == 1 {
            conversation.title = derive_title(text);
        }
        Ok(&*conversation)
    }

    /// Append an assistant message. The title is left alone.
    pub fn append_assistant_message(&mut self, id: &str, text: &str) -> Result<&Conversation> {
        self.ensure_initialized();
        let conversation = self.get_mut(id)?;
        conversation.messages.push(Message::assistant(text));
        Ok(&*conversation)
    }

    /// Remove a conversation.
    ///
    /// If it was active, the oldest remaining conversation becomes active; if
    /// none remain a fresh one is created.
    pub fn delete_conversation(&mut self, id: &str) -> Result<ConversationList> {
        self.ensure_initialized();
        if self.conversations.remove(id).is_none() {
            return Err(ChatError::NotFound(id.to_string()));
        }
        self.order.retain(|existing| existing != id);

        if self.active.as_deref() == Some(id) {
            self.active = self.order.first().cloned();
            if self.active.is_none() {
                self.insert_fresh();
            }
            tracing::debug!(
                deleted = %id,
                active = ?self.active,
                "Deleted active conversation, reselected"
            );
        }

        Ok(self.list_all())
    }

    /// Drop every message and restore the default title.
    pub fn clear_conversation(&mut self, id: &str) -> Result<&Conversation> {
        self.ensure_initialized();
        let conversation = self.get_mut(id)?;
        conversation.messages.clear();
        conversation.title = DEFAULT_TITLE.to_string();
        Ok(&*conversation)
    }

    /// Look up a conversation.
    pub fn get(&self, id: &str) -> Result<&Conversation> {
        self.conversations
            .get(id)
            .ok_or_else(|| ChatError::NotFound(id.to_string()))
    }

    /// Identifier of the active conversation.
    #[must_use]
    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Snapshot of all conversations in creation order.
    #[must_use]
    pub fn list_all(&self) -> ConversationList {
        ConversationList {
            active_conversation: self.active.clone(),
            conversations: self
                .order
                .iter()
                .filter_map(|id| self.conversations.get(id).cloned())
                .collect(),
        }
    }

    /// Number of conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether there are no conversations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Conversation> {
        self.conversations
            .get_mut(id)
            .ok_or_else(|| ChatError::NotFound(id.to_string()))
    }

    /// Insert an empty conversation under a new identifier and activate it.
    fn insert_fresh(&mut self) -> String {
        let mut id = Uuid::new_v4().to_string();
        while self.conversations.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }
        self.conversations
            .insert(id.clone(), Conversation::new(id.clone()));
        self.order.push(id.clone());
        self.active = Some(id.clone());
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    fn initialized() -> (ConversationStore, String) {
        let mut store = ConversationStore::new();
        store.ensure_initialized();
        let id = store.active_id().unwrap().to_string();
        (store, id)
    }

    #[test]
    fn test_new_store_is_empty_until_touched() {
        let mut store = ConversationStore::new();
        assert!(!store.is_initialized());
        assert!(store.active_id().is_none());

        store.ensure_initialized();
        assert_eq!(store.len(), 1);
        let first = store.active_id().unwrap().to_string();

        store.ensure_initialized();
        assert_eq!(store.len(), 1);
        assert_eq!(store.active_id(), Some(first.as_str()));
    }

    #[test]
    fn test_create_conversation_becomes_active() {
        let (mut store, first) = initialized();
        let created = store.create_conversation().clone();

        assert_ne!(created.id, first);
        assert_eq!(created.title, DEFAULT_TITLE);
        assert!(created.messages.is_empty());
        assert_eq!(store.active_id(), Some(created.id.as_str()));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_create_on_untouched_store_lazily_initializes() {
        let mut store = ConversationStore::new();
        let id = store.create_conversation().id.clone();
        assert_eq!(store.len(), 2);
        assert_eq!(store.active_id(), Some(id.as_str()));
    }

    #[test]
    fn test_append_user_message_is_last() {
        let (mut store, id) = initialized();
        store.append_user_message(&id, "first").unwrap();
        store.append_assistant_message(&id, "reply").unwrap();
        store.append_user_message(&id, "  second  ").unwrap();

        let last = store.get(&id).unwrap().messages.last().unwrap().clone();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "  second  ");
    }

    #[test]
    fn test_blank_message_rejected_without_change() {
        let (mut store, id) = initialized();
        store.append_user_message(&id, "keep").unwrap();
        let before = store.get(&id).unwrap().clone();

        for blank in ["", "   ", "\n\t"] {
            let err = store.append_user_message(&id, blank).unwrap_err();
            assert!(matches!(err, ChatError::InvalidInput(_)));
        }
        assert_eq!(store.get(&id).unwrap(), &before);
    }

    #[test]
    fn test_blank_message_checked_before_id() {
        let (mut store, _) = initialized();
        let err = store.append_user_message("missing", " ").unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput(_)));
    }

    #[test]
    fn test_append_to_unknown_conversation() {
        let (mut store, _) = initialized();
        assert!(matches!(
            store.append_user_message("missing", "hi"),
            Err(ChatError::NotFound(_))
        ));
        assert!(matches!(
            store.append_assistant_message("missing", "hi"),
            Err(ChatError::NotFound(_))
        ));
    }

    #[test]
    fn test_title_set_once() {
        let (mut store, id) = initialized();
        let title = store
            .append_user_message(&id, "What is the capital of Australia, and why not Sydney?")
            .unwrap()
            .title
            .clone();
        assert_eq!(title, "What is the capital of Austral...");

        store.append_assistant_message(&id, "Canberra.").unwrap();
        store.append_user_message(&id, "Thanks").unwrap();
        assert_eq!(store.get(&id).unwrap().title, title);
    }

    #[test]
    fn test_assistant_message_does_not_set_title() {
        let (mut store, id) = initialized();
        store.append_assistant_message(&id, "Welcome!").unwrap();
        assert!(store.get(&id).unwrap().has_default_title());
    }

    #[test]
    fn test_switch_active() {
        let (mut store, first) = initialized();
        store.create_conversation();

        store.switch_active(&first).unwrap();
        assert_eq!(store.active_id(), Some(first.as_str()));
    }

    #[test]
    fn test_switch_to_unknown_leaves_state() {
        let (mut store, first) = initialized();
        let before = store.list_all();

        assert!(matches!(
            store.switch_active("does-not-exist"),
            Err(ChatError::NotFound(_))
        ));
        assert_eq!(store.active_id(), Some(first.as_str()));
        assert_eq!(store.list_all().conversations, before.conversations);
    }

    #[test]
    fn test_delete_sole_conversation_synthesizes_new() {
        let (mut store, only) = initialized();
        store.append_user_message(&only, "hello").unwrap();

        let list = store.delete_conversation(&only).unwrap();
        assert_eq!(list.conversations.len(), 1);
        let fresh = &list.conversations[0];
        assert_ne!(fresh.id, only);
        assert!(fresh.messages.is_empty());
        assert_eq!(list.active_conversation.as_deref(), Some(fresh.id.as_str()));
    }

    #[test]
    fn test_delete_non_active_keeps_active() {
        let (mut store, first) = initialized();
        let second = store.create_conversation().id.clone();

        let list = store.delete_conversation(&first).unwrap();
        assert_eq!(list.active_conversation.as_deref(), Some(second.as_str()));
        assert_eq!(list.conversations.len(), 1);
    }

    #[test]
    fn test_delete_active_selects_oldest_remaining() {
        let (mut store, first) = initialized();
        let second = store.create_conversation().id.clone();
        let third = store.create_conversation().id.clone();

        let list = store.delete_conversation(&third).unwrap();
        assert_eq!(list.active_conversation.as_deref(), Some(first.as_str()));
        let ids: Vec<_> = list.conversations.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![first.as_str(), second.as_str()]);
    }

    #[test]
    fn test_delete_unknown() {
        let (mut store, _) = initialized();
        assert!(matches!(
            store.delete_conversation("nope"),
            Err(ChatError::NotFound(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_deleted_id_not_reused() {
        let (mut store, first) = initialized();
        store.delete_conversation(&first).unwrap();
        for _ in 0..20 {
            assert_ne!(store.create_conversation().id, first);
        }
    }

    #[test]
    fn test_clear_resets_messages_and_title() {
        let (mut store, id) = initialized();
        let other = store.create_conversation().id.clone();
        store.append_user_message(&id, "A long first message that sets a title").unwrap();
        store.append_assistant_message(&id, "ok").unwrap();

        let cleared = store.clear_conversation(&id).unwrap();
        assert!(cleared.messages.is_empty());
        assert_eq!(cleared.title, DEFAULT_TITLE);
        assert_eq!(store.active_id(), Some(other.as_str()));

        store.append_user_message(&id, "fresh start").unwrap();
        assert_eq!(store.get(&id).unwrap().title, "fresh start");
    }

    #[test]
    fn test_clear_unknown() {
        let (mut store, _) = initialized();
        assert!(matches!(
            store.clear_conversation("nope"),
            Err(ChatError::NotFound(_))
        ));
    }

    #[test]
    fn test_get_unknown() {
        let store = ConversationStore::new();
        assert!(matches!(store.get("nope"), Err(ChatError::NotFound(_))));
    }
}
