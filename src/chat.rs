//! The send-message pipeline.
//!
//! One call runs a whole exchange against a session's store:
//! 1. Append the user message (deriving the title on the first one)
//! 2. Hand the full history to the [`ResponseProvider`]
//! 3. Append the reply and return it with the updated conversation
//!
//! A provider failure leaves the user message in place and adds no reply.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::conversation::{Conversation, ConversationStore};
use crate::error::{ChatError, Result};
use crate::llm::ResponseProvider;

/// Outcome of a successful exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    /// Text produced by the provider.
    pub response: String,
    /// Conversation after both messages were appended.
    pub conversation: Conversation,
}

/// Runs exchanges against a configured provider.
#[derive(Clone)]
pub struct ChatService {
    provider: Arc<dyn ResponseProvider>,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl ChatService {
    /// Create a service backed by `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn ResponseProvider>) -> Self {
        Self { provider }
    }

    /// Name of the backing provider.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Send `text` to `conversation_id`, or to the active conversation if none is named.
    ///
    /// The text is trimmed before it is stored.
    ///
    /// # Errors
    ///
    /// - [`ChatError::InvalidInput`] if the text is blank
    /// - [`ChatError::NotFound`] if the conversation does not exist
    /// - [`ChatError::Provider`] if the backend call fails; the user message
    ///   stays recorded
    pub async fn send_message(
        &self,
        store: &mut ConversationStore,
        conversation_id: Option<&str>,
        text: &str,
    ) -> Result<ChatReply> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::InvalidInput(
                "Message cannot be empty".to_string(),
            ));
        }

        store.ensure_initialized();
        let id = match conversation_id {
            Some(id) => id.to_string(),
            None => store
                .active_id()
                .map(ToString::to_string)
                .ok_or_else(|| ChatError::NotFound("no active conversation".to_string()))?,
        };

        let request_id = Uuid::new_v4().to_string();
        let history = store.append_user_message(&id, text)?.messages.clone();

        tracing::info!(
            request_id = %request_id,
            conversation_id = %id,
            message_count = history.len(),
            provider = self.provider.name(),
            "Requesting assistant reply"
        );

        let response = match self.provider.generate(&history).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    conversation_id = %id,
                    error = %e,
                    "Provider failed; user message kept"
                );
                return Err(e.into());
            }
        };

        let conversation = store.append_assistant_message(&id, &response)?.clone();

        tracing::info!(
            request_id = %request_id,
            conversation_id = %id,
            reply_length = response.len(),
            message_count = conversation.messages.len(),
            "Assistant reply recorded"
        );

        Ok(ChatReply {
            response,
            conversation,
        })
    }
}
