//! Google Gemini adapter.
//!
//! Gemini names the assistant role `model`, wraps text in `parts`, and takes
//! the system instruction as a separate top-level field.

use serde_json::{Value, json};

use super::{LlmSettings, Message, ProviderError, ResponseProvider, Role, extract_error_message};

/// Adapter for the Gemini `generateContent` API.
pub struct GeminiProvider {
    http: reqwest::Client,
    settings: LlmSettings,
    api_key: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    /// Create a new adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] when no API key is configured.
    pub fn new(settings: LlmSettings) -> Result<Self, ProviderError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::Config("Gemini requires an API key".to_string()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            settings,
            api_key,
        })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }

    /// Build the JSON request body for the Gemini API.
    pub(crate) fn build_request_body(&self, history: &[Message]) -> Value {
        let contents: Vec<Value> = history
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                json!({
                    "role": role,
                    "parts": [{ "text": msg.content }]
                })
            })
            .collect();

        json!({
            "systemInstruction": {
                "parts": [{ "text": self.settings.system_prompt }]
            },
            "contents": contents,
            "generationConfig": {
                "temperature": self.settings.temperature,
                "maxOutputTokens": self.settings.max_tokens,
            }
        })
    }

    /// Concatenate the text parts of the first candidate.
    pub(crate) fn parse_response(body: &Value) -> Result<String, ProviderError> {
        let parts = body["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| {
                let reason = body["promptFeedback"]["blockReason"]
                    .as_str()
                    .map_or_else(
                        || "response has no candidates".to_string(),
                        |r| format!("prompt blocked: {r}"),
                    );
                ProviderError::MalformedResponse(reason)
            })?;

        let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        if text.is_empty() {
            return Err(ProviderError::MalformedResponse(
                "candidate has no text parts".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl ResponseProvider for GeminiProvider {
    async fn generate(&self, history: &[Message]) -> Result<String, ProviderError> {
        let url = self.api_url();
        let body = self.build_request_body(history);

        tracing::debug!(
            model = %self.settings.model,
            message_count = history.len(),
            "Gemini API request"
        );

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

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

        Self::parse_response(&json)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
