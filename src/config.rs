//! Application configuration.
//!
//! Precedence, lowest to highest: built-in defaults, config file
//! (`--config`/`CONFIG_FILE`, else `./config.yaml` if present),
//! `CHAT_RELAY_SECTION__KEY` environment variables, CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::llm::{Backend, DEFAULT_SYSTEM_PROMPT, LlmSettings, Vendor};

/// Prefix for environment overrides, e.g. `CHAT_RELAY_SERVER__PORT=8080`.
pub const ENV_PREFIX: &str = "CHAT_RELAY";

/// Config file picked up from the working directory when none is named.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// AI backend: openai or gemini
    #[arg(long, env = "LLM_BACKEND")]
    pub backend: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub session: SessionConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: Backend,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
    /// Azure deployment name (Azure `OpenAI` only).
    pub deployment_name: Option<String>,
    /// Azure API version (Azure `OpenAI` only).
    pub api_version: Option<String>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub cookie_name: String,
}

impl SessionConfig {
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args).map_err(|e| ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("llm.backend", "openai")?
            .set_default("llm.temperature", f64::from(crate::llm::DEFAULT_TEMPERATURE))?
            .set_default("llm.max_tokens", i64::from(crate::llm::DEFAULT_MAX_TOKENS))?
            .set_default("session.idle_timeout_secs", 30 * 60)?
            .set_default("session.sweep_interval_secs", 60)?
            .set_default("session.cookie_name", "chat_relay_session")?
            .set_default("log.format", "pretty")?;

        // Explicit file must exist; the working-directory fallback is optional.
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
            builder = builder.add_source(File::from(Path::new(DEFAULT_CONFIG_FILE)));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(backend) = cli.backend {
            let backend: Backend = backend.parse().map_err(ConfigError::Message)?;
            builder = builder.set_override("llm.backend", backend.to_string())?;
        }

        builder.build()?.try_deserialize()
    }

    /// Address string for the listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Assemble provider settings, filling gaps from backend defaults and
    /// well-known environment variables.
    ///
    /// The API key falls back to `LLM_API_KEY`, then to the backend's own
    /// variable (`OPENAI_API_KEY` or `GEMINI_API_KEY`).
    pub fn llm_settings(&self) -> Result<LlmSettings, ConfigError> {
        let llm = &self.llm;
        let backend = llm.backend;

        let base_url = llm
            .base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| backend.default_base_url().to_string());
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::Message(format!("invalid llm.base_url {base_url}: {e}")))?;

        let model = llm
            .model
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| backend.default_model().to_string());

        let api_key = llm
            .api_key
            .clone()
            .or_else(|| std::env::var("LLM_API_KEY").ok())
            .or_else(|| std::env::var(backend.api_key_env()).ok())
            .filter(|s| !s.trim().is_empty());

        let vendor = match backend {
            Backend::OpenAi => Vendor::detect_from_url(&base_url)
                .with_azure_deployment(llm.deployment_name.clone(), llm.api_version.clone()),
            Backend::Gemini => Vendor::NotApplicable,
        };
        if let Vendor::AzureOpenAI {
            deployment_name, ..
        } = &vendor
            && deployment_name.is_empty()
        {
            return Err(ConfigError::Message(
                "Azure OpenAI requires llm.deployment_name".to_string(),
            ));
        }

        Ok(LlmSettings {
            backend,
            base_url,
            api_key,
            model,
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            system_prompt: llm
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            vendor,
        })
    }
}
