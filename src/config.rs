use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FamulusConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub persona: PersonaConfig,
    pub providers: ProvidersConfig,
    pub index: IndexConfig,
    pub domain: DomainConfig,
    pub session: SessionConfig,
    pub indexer: IndexerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PersonaConfig {
    /// Name the assistant answers to. Also matched as a self-query pattern.
    pub name: String,
    /// System prompt prepended to every completion. Empty string selects the
    /// built-in default persona.
    pub system_prompt: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    pub local: LocalProviderConfig,
    pub cloud: CloudProviderConfig,
}

/// Locally hosted model served over an Ollama-style HTTP API.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LocalProviderConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Cloud model (Gemini-style generateContent API). The key is read from the
/// environment variable named in `api_key_env`, never from the config file.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CloudProviderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    pub base_url: String,
    pub collection: String,
    pub timeout_secs: u64,
    /// Results requested from the index before per-section truncation.
    pub top_k: usize,
    /// "Good enough" ceiling on the best match's distance when probing the
    /// conversation-history category. A tunable, not a hard contract.
    pub distance_threshold: f64,
    /// Category tag carried by auto-indexed live exchanges.
    pub conversation_category: String,
    /// Categories tried together when no narrower filter applies.
    pub broad_categories: Vec<String>,
}

/// The tracked subject-matter domain. Queries mentioning one of the keywords
/// get the domain reference block and a domain-filtered retrieval pass.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DomainConfig {
    pub name: String,
    pub keywords: Vec<String>,
    pub category: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
    pub history_cap: usize,
    /// Exchanges formatted into the recent-conversation section.
    pub recent_exchanges: usize,
    /// Live-session count above which a sweep runs opportunistically.
    pub sweep_threshold: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexerConfig {
    pub queue_capacity: usize,
}

impl Default for FamulusConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            persona: PersonaConfig::default(),
            providers: ProvidersConfig::default(),
            index: IndexConfig::default(),
            domain: DomainConfig::default(),
            session: SessionConfig::default(),
            indexer: IndexerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5557,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = default_famulus_dir().to_string_lossy().into_owned();
        Self { data_dir }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "Famulus".into(),
            system_prompt: String::new(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            local: LocalProviderConfig::default(),
            cloud: CloudProviderConfig::default(),
        }
    }
}

impl Default for LocalProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.1:8b".into(),
            timeout_secs: 60,
        }
    }
}

impl Default for CloudProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-2.0-flash".into(),
            api_key_env: "FAMULUS_GEMINI_API_KEY".into(),
            timeout_secs: 60,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            collection: "documents".into(),
            timeout_secs: 5,
            top_k: 5,
            distance_threshold: 0.7,
            conversation_category: "conversation_chunk".into(),
            broad_categories: vec![
                "conversation_chunk".into(),
                "conversation".into(),
                "documentation".into(),
                "code".into(),
            ],
        }
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            keywords: Vec::new(),
            category: "domain_reference".into(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 3600,
            history_cap: 10,
            recent_exchanges: 5,
            sweep_threshold: 50,
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self { queue_capacity: 64 }
    }
}

/// Returns `~/.famulus/`
pub fn default_famulus_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".famulus")
}

/// Returns the default config file path: `~/.famulus/config.toml`
pub fn default_config_path() -> PathBuf {
    default_famulus_dir().join("config.toml")
}

impl FamulusConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            FamulusConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (FAMULUS_DATA_DIR,
    /// FAMULUS_LOG_LEVEL, FAMULUS_OLLAMA_URL, FAMULUS_INDEX_URL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("FAMULUS_DATA_DIR") {
            self.storage.data_dir = val;
        }
        if let Ok(val) = std::env::var("FAMULUS_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("FAMULUS_OLLAMA_URL") {
            self.providers.local.base_url = val;
        }
        if let Ok(val) = std::env::var("FAMULUS_INDEX_URL") {
            self.index.base_url = val;
        }
    }

    /// Resolve the data directory, expanding `~` if needed.
    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
