//! OpenAI Chat Completions adapter.
//!
//! Implements [`ResponseProvider`] against `/v1/chat/completions` (or the
//! vendor-specific equivalent) with a single non-streaming request per reply.

use serde_json::{Value, json};

use super::vendor::AuthStyle;
use super::{LlmSettings, Message, ProviderError, ResponseProvider, extract_error_message};

/// Adapter for the `OpenAI` Chat Completions API and compatible hosts.
#[derive(Clone)]
pub struct OpenAiProvider {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("settings", &self.settings)
            .finish()
    }
}

impl OpenAiProvider {
    /// Create a new adapter with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    /// Build the request body: system instruction first, then the history.
    ///
    /// `Role` already serializes to the `user`/`assistant` labels this API uses.
    pub(crate) fn build_request_body(&self, history: &[Message]) -> Value {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(json!({
            "role": "system",
            "content": self.settings.system_prompt,
        }));
        messages.extend(history.iter().map(|m| {
            json!({
                "role": m.role,
                "content": m.content,
            })
        }));

        let mut body = json!({
            "messages": messages,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        });
        if self.settings.vendor.sends_model() {
            body["model"] = json!(self.settings.model);
        }
        body
    }

    /// Extract the reply text from a completion body.
    pub(crate) fn parse_response(body: &Value) -> Result<String, ProviderError> {
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| {
                ProviderError::MalformedResponse(
                    "completion has no choices[0].message.content".to_string(),
                )
            })
    }
}

#[async_trait::async_trait]
impl ResponseProvider for OpenAiProvider {
    async fn generate(&self, history: &[Message]) -> Result<String, ProviderError> {
        let url = self.settings.vendor.chat_url(&self.settings.base_url);
        let body = self.build_request_body(history);

        tracing::debug!(
            model = %self.settings.model,
            url = %url,
            message_count = history.len(),
            "Chat completions request"
        );

        let mut rb = self.http.post(&url).json(&body);
        if let Some(key) = &self.settings.api_key {
            rb = match self.settings.vendor.auth_style() {
                AuthStyle::Bearer => rb.bearer_auth(key),
                AuthStyle::ApiKeyHeader => rb.header("api-key", key),
            };
        }

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: extract_error_message(&text),
            });
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let text = Self::parse_response(&json)?;
        tracing::debug!(reply_length = text.len(), "Chat completions reply received");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Backend, Vendor};

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new(LlmSettings::for_backend(Backend::OpenAi, Some("sk-test".into())))
    }

    #[test]
    fn test_body_prepends_system_prompt() {
        let history = vec![Message::user("Hi"), Message::assistant("Hello!"), Message::user("Bye")];
        let body = provider().build_request_body(&history);

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert!(messages[0]["content"].as_str().unwrap().contains("markdown"));
        assert_eq!(messages[1], json!({"role": "user", "content": "Hi"}));
        assert_eq!(messages[2], json!({"role": "assistant", "content": "Hello!"}));
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 2048);
    }

    #[test]
    fn test_body_omits_model_for_azure() {
        let mut settings = LlmSettings::for_backend(Backend::OpenAi, None);
        settings.vendor = Vendor::detect_from_url("https://x.openai.azure.com")
            .with_azure_deployment(Some("prod".into()), None);
        let body = OpenAiProvider::new(settings).build_request_body(&[Message::user("Hi")]);
        assert!(body.get("model").is_none());
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "**Hi**"}}]
        });
        assert_eq!(OpenAiProvider::parse_response(&body).unwrap(), "**Hi**");
    }

    #[test]
    fn test_parse_response_without_content() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": null}}]});
        assert!(matches!(
            OpenAiProvider::parse_response(&body),
            Err(ProviderError::MalformedResponse(_))
        ));
        assert!(OpenAiProvider::parse_response(&json!({})).is_err());
    }
}
