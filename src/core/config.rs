//! Configuration management for X5 OS.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ai::Tier;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Generation API settings
    pub gateway: GatewayConfig,

    /// Guided workflow settings
    pub workflow: WorkflowConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Subscription tier used when the CLI does not override it
    pub tier: Tier,

    /// Directory where downloaded videos are written
    pub output_dir: PathBuf,
}

/// Generation API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the Generative Language REST API
    pub base_url: String,

    /// Name of the environment variable holding the API key
    pub api_key_env: String,

    /// Model used for plain and structured text
    pub text_model: String,

    /// Image model for the free tier
    pub image_model: String,

    /// Image model for the pro tier
    pub image_model_pro: String,

    /// Video model
    pub video_model: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Seconds between video job polls
    pub poll_interval_secs: u64,

    /// Polls before a video job is reported as timed out
    pub max_poll_attempts: u32,
}

/// Guided workflow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Clarification rounds allowed before the draft is forced
    pub max_rounds: usize,

    /// Answer recorded for a question the user left blank
    pub not_specified: String,

    /// Text shown when a plain text request fails
    pub fallback_message: String,

    /// Report gateway failures as a finished document instead of a failed step
    pub failure_as_result: bool,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.x5os.toml` in current directory
    /// 2. `~/.config/x5os/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(".x5os.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the global config file.
    pub fn save(&self) -> anyhow::Result<()> {
        let dir = Self::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        std::fs::create_dir_all(&dir)?;

        let content = toml::to_string_pretty(self)?;
        std::fs::write(dir.join("config.toml"), content)?;

        Ok(())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("x5os"))
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.gateway.api_key_env).ok().filter(|key| !key.trim().is_empty())
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Image model for the given tier.
    pub fn image_model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Free => &self.image_model,
            Tier::Pro => &self.image_model_pro,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            tier: Tier::Free,
            output_dir: dirs::download_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("x5os"),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            image_model_pro: "gemini-3-pro-image-preview".to_string(),
            video_model: "veo-3.1-fast-generate-preview".to_string(),
            request_timeout_secs: 120,
            poll_interval_secs: 5,
            max_poll_attempts: 120,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            not_specified: "Не указано".to_string(),
            fallback_message: "Не удалось получить ответ. Попробуйте ещё раз.".to_string(),
            failure_as_result: false,
        }
    }
}
