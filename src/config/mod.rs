//! Configuration management for catalog-sync.
//!
//! This module handles loading configuration from `~/.catalog-sync/`.

mod paths;
mod settings;

pub use paths::Paths;
pub use settings::{
    ApiConfig, CacheConfig, ColorSetting, Config, ConnectivityConfig, ConnectivityMode,
    GeneralConfig, ImageConfig,
};
