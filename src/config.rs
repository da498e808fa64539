use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub downloads: DownloadsConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_theme")]
    pub theme: String,

    /// Override for the library document location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Override for where media files land
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Pause between items during the background sweep
    #[serde(default = "default_sweep_delay")]
    pub sweep_item_delay_secs: u64,

    /// Run the reconciliation sweep on startup
    #[serde(default = "default_true")]
    pub sweep_on_startup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub request_timeout: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            debug!("Loading config from {:?}", config_path);
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            info!("Config loaded successfully");
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, contents).context("Failed to write config file")?;

        debug!("Config saved to {:?}", config_path);
        Ok(())
    }

    /// Resolved library document path.
    pub fn library_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.general.library_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir().context("Failed to get data directory")?;
        Ok(data_dir.join("spool").join("library.json"))
    }

    /// Resolved download directory.
    pub fn download_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.downloads.directory {
            return Ok(dir.clone());
        }
        let base = dirs::video_dir()
            .or_else(dirs::data_dir)
            .context("Failed to get a downloads directory")?;
        Ok(base.join("spool"))
    }

    pub fn sweep_item_delay(&self) -> Duration {
        Duration::from_secs(self.downloads.sweep_item_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.request_timeout)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("spool").join("config.toml"))
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            library_path: None,
        }
    }
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            sweep_item_delay_secs: default_sweep_delay(),
            sweep_on_startup: default_true(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_timeout(),
        }
    }
}

// Default value functions
fn default_theme() -> String {
    "auto".to_string()
}
fn default_true() -> bool {
    true
}
fn default_sweep_delay() -> u64 {
    1
}
fn default_timeout() -> u64 {
    30
}
