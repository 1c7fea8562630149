//! Configuration file support for Work-Out.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/work-out/config.toml`.

use crate::auth::StaticAuth;
use crate::{Error, Result, UserId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub account: AccountConfig,

    #[serde(default)]
    pub templates: TemplateConfig,

    #[serde(default)]
    pub planner: PlannerConfig,
}

/// Where the document store lives
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Identity used when no other sign-in is available.
///
/// An empty `user_id` means nobody is signed in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Write missing built-in templates into the store on start
    #[serde(default = "default_seed_defaults")]
    pub seed_defaults: bool,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            seed_defaults: default_seed_defaults(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            scan_timeout_ms: default_scan_timeout_ms(),
        }
    }
}

// Default value functions
fn default_store_path() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("work-out").join("store.json")
}

fn default_user_id() -> String {
    "local".into()
}

fn default_seed_defaults() -> bool {
    true
}

fn default_scan_timeout_ms() -> u64 {
    500
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("work-out").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.account.user_id.is_empty() {
            UserId::new(self.account.user_id.as_str())
                .map_err(|e| Error::Config(format!("account.user_id: {}", e)))?;
        }
        if self.planner.scan_timeout_ms == 0 {
            return Err(Error::Config(
                "planner.scan_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Sign-in for the configured account
    pub fn auth(&self) -> Result<StaticAuth> {
        if self.account.user_id.is_empty() {
            return Ok(StaticAuth::signed_out());
        }
        Ok(StaticAuth::signed_in(UserId::new(self.account.user_id.as_str())?))
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.planner.scan_timeout_ms)
    }
}
