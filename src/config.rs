//! Runtime configuration for chat-relay.
//!
//! Configuration is loaded from a JSON file with per-section defaults.
//! The provider credential never lives in the file; it comes from the
//! `OPENAI_API_KEY` environment variable (or `--api-key`).

use std::path::PathBuf;

use anyhow::{bail, Context};
use axum::http::HeaderValue;
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-relay", about = "Streaming chat relay for LLM completion APIs")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides the config file).
    #[arg(long)]
    pub listen: Option<String>,

    /// Provider API key.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Upstream provider configuration.
    pub provider: ProviderConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8000").
    pub listen: String,

    /// The single origin allowed to make cross-origin requests.
    pub cors_origin: String,

    /// Interval for SSE keep-alive comments. `None` disables them.
    pub keep_alive_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            keep_alive_secs: None,
        }
    }
}

/// Upstream completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API base URL, without the `/v1/...` path.
    pub base_url: String,

    /// Model identifier sent with every completion request.
    pub model: String,

    /// Optional organization ID for multi-org accounts.
    pub organization: Option<String>,

    /// API key. Populated from the CLI/environment, never serialized.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            organization: None,
            api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when the file is absent.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            let config: Config = serde_json::from_str(&data)
                .with_context(|| format!("parsing config file {}", path.display()))?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Load the file named by the CLI and apply command-line overrides.
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = Self::load(&cli.config)?;
        if let Some(listen) = &cli.listen {
            config.server.listen = listen.clone();
        }
        config.provider.api_key = cli.api_key.clone().filter(|k| !k.is_empty());
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, at router build or first request.
    pub fn validate(&self) -> anyhow::Result<()> {
        if HeaderValue::from_str(&self.server.cors_origin).is_err() {
            bail!("invalid CORS origin: {:?}", self.server.cors_origin);
        }
        if self.provider.base_url.trim().is_empty() {
            bail!("provider.base_url must not be empty");
        }
        if self.provider.model.trim().is_empty() {
            bail!("provider.model must not be empty");
        }
        Ok(())
    }
}
