//! LLM backend abstraction and adapters.
//!
//! A [`ResponseProvider`] turns the ordered history of one conversation into
//! the next assistant reply. Each supported backend gets an adapter that owns
//! the system instruction and the translation to and from its wire format.
//!
//! # Adapters
//!
//! - [`OpenAiProvider`]: `OpenAI` Chat Completions API and compatible vendors
//! - [`GeminiProvider`]: Google Gemini `generateContent` API
//!
//! # Example
//!
//! ```rust,ignore
//! use chat_relay::llm::{build_provider, Backend, LlmSettings};
//!
//! let settings = LlmSettings::for_backend(Backend::Gemini, Some("key".into()));
//! let provider = build_provider(settings)?;
//! let reply = provider.generate(&history).await?;
//! ```

pub mod chat_completions;
pub mod gemini;
pub mod vendor;

pub use chat_completions::OpenAiProvider;
pub use gemini::GeminiProvider;
pub use vendor::Vendor;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Instruction injected ahead of every conversation history.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, creative, and knowledgeable assistant. \
Provide detailed, accurate responses. When you include code snippets, make sure they are \
functional and properly formatted. Format your responses using markdown for better readability.";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default cap on generated tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message typed by the user.
    User,
    /// Reply produced by the backend.
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: Role,
    /// Plain text content.
    pub content: String,
}

impl Message {
    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Failure talking to an AI backend.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },

    /// The backend answered 2xx but the body had no usable text.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The adapter could not be constructed.
    #[error("provider configuration error: {0}")]
    Config(String),
}

/// Capability: produce the next assistant message for a conversation.
///
/// `history` is the full conversation, oldest first, already containing the
/// newest user message. Implementations make exactly one round trip per call.
#[async_trait::async_trait]
pub trait ResponseProvider: Send + Sync {
    /// Generate the assistant reply text.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the backend is unreachable, rejects the
    /// request, or replies with no text.
    async fn generate(&self, history: &[Message]) -> Result<String, ProviderError>;

    /// Short backend name used in logs and health output.
    fn name(&self) -> &'static str;
}

/// Supported AI backends.
///
/// Names are case-insensitive wherever they are read (file, env or CLI).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Backend {
    /// `OpenAI` Chat Completions (and compatible vendors).
    #[default]
    OpenAi,
    /// Google Gemini.
    Gemini,
}

impl Backend {
    /// Base URL used when none is configured.
    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    /// Model used when none is configured.
    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Gemini => "gemini-1.5-pro",
        }
    }

    /// Backend-specific environment variable holding the API key.
    #[must_use]
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => f.write_str("openai"),
            Self::Gemini => f.write_str("gemini"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(format!("unknown LLM backend: {other}")),
        }
    }
}

impl TryFrom<String> for Backend {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// LLM connection and model settings.
#[derive(Clone)]
pub struct LlmSettings {
    /// Which adapter to build.
    pub backend: Backend,
    /// Base URL for the backend API.
    pub base_url: String,
    /// API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens in the reply.
    pub max_tokens: u32,
    /// System instruction prepended to every request.
    pub system_prompt: String,
    /// OpenAI-compatible vendor (ignored by Gemini).
    pub vendor: Vendor,
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("vendor", &self.vendor)
            .finish_non_exhaustive()
    }
}

impl LlmSettings {
    /// Settings with every field at the backend's default.
    #[must_use]
    pub fn for_backend(backend: Backend, api_key: Option<String>) -> Self {
        let base_url = backend.default_base_url().to_string();
        Self {
            backend,
            vendor: Vendor::detect_from_url(&base_url),
            base_url,
            api_key,
            model: backend.default_model().to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Build the adapter selected by `settings.backend`.
///
/// # Errors
///
/// Returns [`ProviderError::Config`] if the adapter requires an API key and
/// none was supplied.
pub fn build_provider(settings: LlmSettings) -> Result<Arc<dyn ResponseProvider>, ProviderError> {
    tracing::info!(
        backend = %settings.backend,
        model = %settings.model,
        base_url = %settings.base_url,
        "Building response provider"
    );

    match settings.backend {
        Backend::OpenAi => {
            // Local OpenAI-compatible servers often run without a key.
            if settings.api_key.is_none() {
                tracing::warn!(
                    base_url = %settings.base_url,
                    "No API key configured; requests will be sent unauthenticated"
                );
            }
            Ok(Arc::new(OpenAiProvider::new(settings)))
        }
        Backend::Gemini => Ok(Arc::new(GeminiProvider::new(settings)?)),
    }
}

/// Pull a human-readable message out of a backend error body.
///
/// Both `OpenAI` and Gemini wrap failures as `{"error": {"message": ...}}`.
pub(crate) fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(ToString::to_string))
        .unwrap_or_else(|| body.chars().take(500).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!("openai".parse::<Backend>().unwrap(), Backend::OpenAi);
        assert_eq!(" Gemini ".parse::<Backend>().unwrap(), Backend::Gemini);
        assert!("claude".parse::<Backend>().is_err());
    }

    #[test]
    fn test_backend_deserializes_any_case() {
        let backend: Backend = serde_json::from_value(serde_json::json!("GEMINI")).unwrap();
        assert_eq!(backend, Backend::Gemini);
        assert_eq!(serde_json::to_value(Backend::OpenAi).unwrap(), "openai");
        assert!(serde_json::from_value::<Backend>(serde_json::json!("claude")).is_err());
    }

    #[test]
    fn test_build_provider_key_requirements() {
        let openai = build_provider(LlmSettings::for_backend(Backend::OpenAi, None)).unwrap();
        assert_eq!(openai.name(), "openai");

        let gemini = build_provider(LlmSettings::for_backend(Backend::Gemini, None));
        assert!(matches!(gemini, Err(ProviderError::Config(_))));
    }

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hi"}));
    }

    #[test]
    fn test_extract_error_message() {
        let body = r#"{"error": {"message": "Invalid API key", "code": 401}}"#;
        assert_eq!(extract_error_message(body), "Invalid API key");
        assert_eq!(extract_error_message("bad gateway"), "bad gateway");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let settings = LlmSettings::for_backend(Backend::OpenAi, Some("sk-secret".into()));
        let printed = format!("{settings:?}");
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
