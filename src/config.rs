use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SweepError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub traversal: TraversalConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Bot token; falls back to the CHANNEL_SWEEP_TOKEN environment
    /// variable when empty
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Optional webhook used as a fire-and-forget notification sink
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: default_api_base(),
            webhook_url: None,
        }
    }
}

impl PlatformConfig {
    /// Token from config, or from the environment when the file leaves
    /// it empty
    pub fn resolve_token(&self) -> Result<String> {
        if !self.token.is_empty() {
            return Ok(self.token.clone());
        }
        std::env::var("CHANNEL_SWEEP_TOKEN").map_err(|_| {
            SweepError::Config(
                "no bot token: set platform.token or CHANNEL_SWEEP_TOKEN".to_string(),
            )
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Upper bound on messages per history fetch; the platform may
    /// return fewer
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Politeness delay between history fetches
    #[serde(default = "default_request_interval_ms")]
    pub fetch_interval_ms: u64,
    /// Politeness delay between deletions, a separate rate-limited
    /// operation class
    #[serde(default = "default_request_interval_ms")]
    pub delete_interval_ms: u64,
    /// Politeness delay before each queued job
    #[serde(default = "default_request_interval_ms")]
    pub job_interval_ms: u64,
    /// How long the confirmation gate waits for a decision
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            fetch_interval_ms: default_request_interval_ms(),
            delete_interval_ms: default_request_interval_ms(),
            job_interval_ms: default_request_interval_ms(),
            confirm_timeout_secs: default_confirm_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Master switch for the Collect effect; collecting runs and jobs
    /// are refused or skipped while this is off
    #[serde(default)]
    pub save_emojis: bool,
    /// Persist new emoji records as they are sighted instead of once at
    /// run end
    #[serde(default = "default_write_through")]
    pub write_through: bool,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            save_emojis: false,
            write_through: default_write_through(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_analytics_file")]
    pub analytics_file: String,
    #[serde(default = "default_emojis_file")]
    pub emojis_file: String,
    #[serde(default = "default_jobs_file")]
    pub jobs_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            analytics_file: default_analytics_file(),
            emojis_file: default_emojis_file(),
            jobs_file: default_jobs_file(),
        }
    }
}

impl StorageConfig {
    pub fn analytics_path(&self) -> PathBuf {
        self.data_dir.join(&self.analytics_file)
    }

    pub fn emojis_path(&self) -> PathBuf {
        self.data_dir.join(&self.emojis_file)
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.data_dir.join(&self.jobs_file)
    }
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_request_interval_ms() -> u64 {
    1000
}

fn default_confirm_timeout_secs() -> u64 {
    60
}

fn default_write_through() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_analytics_file() -> String {
    "analytics.json".to_string()
}

fn default_emojis_file() -> String {
    "emojis.json".to_string()
}

fn default_jobs_file() -> String {
    "jobs.json".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            SweepError::Config(format!("could not read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| SweepError::Config(format!("could not parse {}: {}", path.display(), e)))
    }

    /// Serialized default configuration, used by `init-config`
    pub fn example_toml() -> String {
        toml::to_string_pretty(&Config::default()).expect("default config serializes")
    }
}
