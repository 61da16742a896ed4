//! TOML configuration.
//!
//! Every section except `[db]` is optional and falls back to defaults.
//! `SLACK_WEBHOOK` and `CHATBOT_URL` in the environment (or a `.env` file)
//! override `[notify]` values; `OPENAI_API_KEY` is read by the hosted
//! providers when they are constructed.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Separate database file for `error_logs`. Defaults to the data path with
    /// an `.errors.sqlite` extension.
    #[serde(default)]
    pub error_log_path: Option<PathBuf>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a write waits for a competing lock before failing.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

impl DbConfig {
    /// A lock held on the data tables never blocks error logging, since the
    /// log lives in its own file.
    pub fn error_log_path(&self) -> PathBuf {
        self.error_log_path
            .clone()
            .unwrap_or_else(|| self.path.with_extension("errors.sqlite"))
    }
}

fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    /// Rewrite the index file after this many appends. `1` persists every
    /// record before it returns.
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            flush_every: default_flush_every(),
            top_k: default_top_k(),
            hybrid_alpha: default_hybrid_alpha(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/error_index.json")
}
fn default_flush_every() -> usize {
    1
}
fn default_top_k() -> usize {
    4
}
fn default_hybrid_alpha() -> f64 {
    0.6
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (OpenAI-compatible API root, or the Ollama host).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: default_llm_model(),
            temperature: default_temperature(),
            url: None,
            max_retries: default_llm_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_llm_retries() -> u32 {
    2
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotifyConfig {
    /// Chat webhook URL. Notifications are dropped when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Link appended to every alert.
    #[serde(default)]
    pub chatbot_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

impl Config {
    /// All-defaults config for commands that can run without a config file.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/self_healing.sqlite"),
                error_log_path: None,
                max_connections: default_max_connections(),
                busy_timeout_secs: default_busy_timeout_secs(),
            },
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            notify: NotifyConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Apply `SLACK_WEBHOOK` and `CHATBOT_URL` from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SLACK_WEBHOOK") {
            if !url.trim().is_empty() {
                self.notify.webhook_url = Some(url);
            }
        }
        if let Ok(url) = std::env::var("CHATBOT_URL") {
            if !url.trim().is_empty() {
                self.notify.chatbot_url = Some(url);
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    config.apply_env_overrides();
    Ok(config)
}

/// Parse and validate config text. Environment overrides are not applied.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be > 0");
    }

    if config.index.flush_every == 0 {
        anyhow::bail!("index.flush_every must be >= 1");
    }

    if config.index.top_k == 0 {
        anyhow::bail!("index.top_k must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.index.hybrid_alpha) {
        anyhow::bail!("index.hybrid_alpha must be in [0.0, 1.0]");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let cfg = parse_config("[db]\npath = \"./data/x.sqlite\"\n").unwrap();
        assert_eq!(cfg.db.busy_timeout_secs, 5);
        assert_eq!(
            cfg.db.error_log_path(),
            PathBuf::from("./data/x.errors.sqlite")
        );
        assert_eq!(cfg.index.flush_every, 1);
        assert_eq!(cfg.index.top_k, 4);
        assert!(!cfg.embedding.is_enabled());
        assert!(!cfg.llm.is_enabled());
        assert_eq!(cfg.llm.model, "gpt-3.5-turbo");
        assert_eq!(cfg.server.bind, "127.0.0.1:5000");
        assert!(cfg.notify.webhook_url.is_none());
    }

    #[test]
    fn test_full_file() {
        let cfg = parse_config(
            r#"
[db]
path = "./data/app.sqlite"
error_log_path = "./data/log.sqlite"
busy_timeout_secs = 2

[index]
path = "./data/idx.json"
flush_every = 10
top_k = 2
hybrid_alpha = 0.3

[embedding]
provider = "openai"
model = "text-embedding-3-small"
dims = 1536

[llm]
provider = "openai"
temperature = 0.3

[notify]
webhook_url = "https://hooks.example.com/T/B/X"
chatbot_url = "http://localhost:8502"

[server]
bind = "0.0.0.0:8080"
"#,
        )
        .unwrap();
        assert_eq!(cfg.db.error_log_path(), PathBuf::from("./data/log.sqlite"));
        assert_eq!(cfg.index.flush_every, 10);
        assert!(cfg.embedding.is_enabled());
        assert_eq!(cfg.embedding.dims, Some(1536));
        assert!(cfg.llm.is_enabled());
        assert_eq!(
            cfg.notify.chatbot_url.as_deref(),
            Some("http://localhost:8502")
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        let base = "[db]\npath = \"x.sqlite\"\n";
        assert!(parse_config(&format!("{}[index]\nflush_every = 0\n", base)).is_err());
        assert!(parse_config(&format!("{}[index]\nhybrid_alpha = 1.5\n", base)).is_err());
        assert!(parse_config(&format!("{}[embedding]\nprovider = \"magic\"\n", base)).is_err());
        assert!(parse_config(&format!("{}[embedding]\nprovider = \"openai\"\n", base)).is_err());
        assert!(parse_config(&format!("{}[llm]\nprovider = \"local\"\n", base)).is_err());
        assert!(parse_config("[index]\ntop_k = 3\n").is_err());
    }
}
