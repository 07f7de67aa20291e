//! Configuration system for Palimpsest
//!
//! This module provides the ORM configuration:
//! - Type-safe config structs via serde
//! - TOML file format
//! - Auto-generation of a default config
//! - Manual reload capability
//!
//! # Example
//!
//! ```ignore
//! use palimpsest_core::OrmConfig;
//!
//! let config = OrmConfig::load().unwrap_or_default();
//! if config.audit.global_with_modified_flag {
//!     println!("Tracking modified flags with suffix {}", config.audit.modified_flag_suffix);
//! }
//! ```

mod loader;

use std::path::Path;

use palimpsest_bytecode::EnhancementSettings;
use serde::{Deserialize, Serialize};

pub use loader::{config_path, CONFIG_ENV, DEFAULT_CONFIG_FILE};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Audit behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// A change between null and the empty string is not a change
    pub treat_empty_string_as_null: bool,

    /// Track a modified flag for every audited property
    pub global_with_modified_flag: bool,

    /// Suffix appended to a property name to form its modified flag
    pub modified_flag_suffix: String,

    /// Keep the full state in deletion rows instead of nulls
    pub store_data_at_delete: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            treat_empty_string_as_null: false,
            global_with_modified_flag: false,
            modified_flag_suffix: "_MOD".to_string(),
            store_data_at_delete: false,
        }
    }
}

/// Lazy loading and enhancement switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    pub enable_lazy_initialization: bool,
    pub allow_enhancement_as_proxy: bool,
    pub allow_load_outside_transaction: bool,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        let settings = EnhancementSettings::default();
        Self {
            enable_lazy_initialization: settings.enable_lazy_initialization,
            allow_enhancement_as_proxy: settings.allow_enhancement_as_proxy,
            allow_load_outside_transaction: settings.allow_load_outside_transaction,
        }
    }
}

impl EnhancementConfig {
    pub fn settings(&self) -> EnhancementSettings {
        EnhancementSettings {
            enable_lazy_initialization: self.enable_lazy_initialization,
            allow_enhancement_as_proxy: self.allow_enhancement_as_proxy,
            allow_load_outside_transaction: self.allow_load_outside_transaction,
        }
    }
}

/// ORM configuration.
///
/// Loaded from `$PALIMPSEST_CONFIG`, or `palimpsest.toml` in the working
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrmConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    pub audit: AuditConfig,

    pub enhancement: EnhancementConfig,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            audit: AuditConfig::default(),
            enhancement: EnhancementConfig::default(),
        }
    }
}

impl OrmConfig {
    /// Load config from the resolved path, creating default if missing.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&config_path())
    }

    /// Load config from a file, creating default if missing.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::debug!("Loaded config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save_to(path)?;
            tracing::info!("Created default config at {:?}", path);
            Ok(default)
        }
    }

    /// Save config to the resolved path.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&config_path())
    }

    /// Save config to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved config to {:?}", path);
        Ok(())
    }

    /// Reload config from the resolved path.
    pub fn reload(&mut self) -> ConfigResult<()> {
        self.reload_from(&config_path())
    }

    /// Reload config from a file.
    pub fn reload_from(&mut self, path: &Path) -> ConfigResult<()> {
        let content = std::fs::read_to_string(path)?;
        *self = toml::from_str(&content)?;
        tracing::debug!("Reloaded config from {:?}", path);
        Ok(())
    }
}
