//! Configuration settings for catalog-sync.
//!
//! Settings are loaded from `~/.catalog-sync/config.yaml`.

use serde::{Deserialize, Serialize};

use crate::cli::args::OutputFormat;
use crate::error::CatalogError;
use crate::features::image::AspectRatio;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Remote API settings.
    pub api: ApiConfig,
    /// Connectivity detection settings.
    pub connectivity: ConnectivityConfig,
    /// Image normalization settings.
    pub image: ImageConfig,
    /// Response cache settings.
    pub cache: CacheConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default output format.
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    /// Color output setting.
    #[serde(default = "default_color")]
    pub color: ColorSetting,
}

/// Color output setting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorSetting {
    /// Auto-detect based on terminal.
    #[default]
    Auto,
    /// Always use colors.
    Always,
    /// Never use colors.
    Never,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint is resolved against. Must end with `/`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// How the connectivity oracle decides whether the device is online.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityMode {
    /// Probe the API host with a TCP connect.
    #[default]
    Auto,
    /// Always report online.
    Online,
    /// Always report offline.
    Offline,
}

/// Connectivity detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    #[serde(default)]
    pub mode: ConnectivityMode,
    /// TCP probe timeout in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

/// Image normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Largest accepted source file in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    /// JPEG quality of the normalized output (1-100).
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Aspect ratio used when none is given.
    #[serde(default)]
    pub default_aspect: AspectRatio,
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Partitions whose name starts with this prefix hold API responses.
    #[serde(default = "default_partition_prefix")]
    pub partition_prefix: String,
    /// Partition the read-through reader stores responses in.
    #[serde(default = "default_partition")]
    pub partition: String,
}

// Default value functions for serde
const fn default_output_format() -> OutputFormat {
    OutputFormat::Pretty
}

const fn default_color() -> ColorSetting {
    ColorSetting::Auto
}

fn default_base_url() -> String {
    "http://localhost:8000/api/".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_probe_timeout_ms() -> u64 {
    1500
}

const fn default_max_bytes() -> usize {
    5 * 1024 * 1024
}

const fn default_jpeg_quality() -> u8 {
    92
}

fn default_partition_prefix() -> String {
    "api-cache".to_string()
}

fn default_partition() -> String {
    "api-cache-v1".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: default_output_format(),
            color: default_color(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            mode: ConnectivityMode::default(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            jpeg_quality: default_jpeg_quality(),
            default_aspect: AspectRatio::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            partition_prefix: default_partition_prefix(),
            partition: default_partition(),
        }
    }
}

impl Config {
    /// Load configuration from a specific path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            CatalogError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), CatalogError> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| CatalogError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, contents).map_err(|e| {
            CatalogError::Config(format!(
                "Failed to write config file {}: {e}",
                path.display()
            ))
        })
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if !(1..=100).contains(&self.image.jpeg_quality) {
            return Err(CatalogError::Config(format!(
                "image.jpeg_quality must be between 1 and 100, got {}",
                self.image.jpeg_quality
            )));
        }
        // The invalidator only sweeps partitions under the prefix.
        if !self.cache.partition.starts_with(&self.cache.partition_prefix) {
            return Err(CatalogError::Config(format!(
                "cache.partition '{}' must start with cache.partition_prefix '{}'",
                self.cache.partition, self.cache.partition_prefix
            )));
        }
        url::Url::parse(&self.api.base_url)?;
        Ok(())
    }
}
