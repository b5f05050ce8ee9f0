//! OpenAI-compatible vendor detection.
//!
//! Several hosts speak the Chat Completions wire format but differ in URL
//! layout and authentication. This module hides those differences from
//! [`super::OpenAiProvider`].

/// Azure API version used when none is configured.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-08-01-preview";

/// Hosts that speak the Chat Completions format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vendor {
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Azure `OpenAI` Service
    AzureOpenAI {
        /// Deployment name (replaces the model in the URL)
        deployment_name: String,
        /// API version query parameter
        api_version: String,
    },
    /// `OpenRouter` (openrouter.ai)
    OpenRouter,
    /// Together AI (together.ai, together.xyz)
    TogetherAI,
    /// Groq (groq.com)
    Groq,
    /// Anything else exposing `/v1/chat/completions`
    Generic,
    /// Not an OpenAI-compatible host (e.g. Gemini).
    NotApplicable,
}

/// How the API key is attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `api-key: <key>` (Azure)
    ApiKeyHeader,
}

impl Vendor {
    /// Detect the vendor from a base URL.
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("openai.azure.com") {
            Self::AzureOpenAI {
                deployment_name: String::new(),
                api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            }
        } else if lower.contains("openrouter.ai") {
            Self::OpenRouter
        } else if lower.contains("together.ai") || lower.contains("together.xyz") {
            Self::TogetherAI
        } else if lower.contains("groq.com") {
            Self::Groq
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else if lower.contains("googleapis.com") {
            Self::NotApplicable
        } else {
            Self::Generic
        }
    }

    /// Fill in Azure deployment details; other vendors are returned unchanged.
    #[must_use]
    pub fn with_azure_deployment(
        self,
        deployment_name: Option<String>,
        api_version: Option<String>,
    ) -> Self {
        match self {
            Self::AzureOpenAI {
                deployment_name: current_deployment,
                api_version: current_version,
            } => Self::AzureOpenAI {
                deployment_name: deployment_name.unwrap_or(current_deployment),
                api_version: api_version.unwrap_or(current_version),
            },
            other => other,
        }
    }

    /// Build the chat completions URL.
    ///
    /// `base_url` may carry a trailing slash.
    #[must_use]
    pub fn chat_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::AzureOpenAI {
                deployment_name,
                api_version,
            } => format!(
                "{base}/openai/deployments/{deployment_name}/chat/completions?api-version={api_version}"
            ),
            _ if base.ends_with("/v1") => format!("{base}/chat/completions"),
            _ => format!("{base}/v1/chat/completions"),
        }
    }

    /// Authentication scheme for this vendor.
    #[must_use]
    pub fn auth_style(&self) -> AuthStyle {
        match self {
            Self::AzureOpenAI { .. } => AuthStyle::ApiKeyHeader,
            _ => AuthStyle::Bearer,
        }
    }

    /// Whether the request body carries the `model` field.
    ///
    /// Azure routes by deployment name instead.
    #[must_use]
    pub fn sends_model(&self) -> bool {
        !matches!(self, Self::AzureOpenAI { .. })
    }
}
