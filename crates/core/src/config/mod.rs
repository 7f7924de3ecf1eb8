//! Configuration system for posecam
//!
//! A single TOML file controls logging, which gamedata file to load, which
//! hooks to install and how the free camera handles input. A default file is
//! written on first load.
//!
//! # Example
//!
//! ```toml
//! version = 1
//! debug = false
//! gamedata = "posecam.json"
//!
//! [hooks]
//! update = true
//! collision = true
//! projection = true
//! scene_update = true
//!
//! [free_camera]
//! move_speed = 4.0
//! boost_multiplier = 4.0
//! look_sensitivity = 0.0025
//! default_fov = 0.78
//! ```

mod loader;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use loader::{configs_dir, core_config_path, gamedata_path, posecam_base_dir, BASE_DIR_ENV};

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

    /// Could not determine config directory
    #[error("Config directory not available - could not resolve base path")]
    NoConfigDirectory,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Per-hook install switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookToggles {
    pub update: bool,
    pub collision: bool,
    pub projection: bool,
    pub scene_update: bool,
}

impl Default for HookToggles {
    fn default() -> Self {
        Self {
            update: true,
            collision: true,
            projection: true,
            scene_update: true,
        }
    }
}

/// Free camera input handling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreeCameraConfig {
    /// Movement speed in world units per second
    pub move_speed: f32,

    /// Speed multiplier while boosting
    pub boost_multiplier: f32,

    /// Radians of rotation per unit of look input
    pub look_sensitivity: f32,

    /// Field of view given to new cameras, in radians
    pub default_fov: f32,
}

impl Default for FreeCameraConfig {
    fn default() -> Self {
        Self {
            move_speed: 4.0,
            boost_multiplier: 4.0,
            look_sensitivity: 0.0025,
            default_fov: 0.78,
        }
    }
}

/// Core configuration.
///
/// Loaded from `<base>/configs/core.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    /// Gamedata file name under `<base>/gamedata/`
    pub gamedata: String,

    /// Which hooks to install
    pub hooks: HookToggles,

    /// Free camera tuning
    pub free_camera: FreeCameraConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            gamedata: "posecam.json".to_string(),
            hooks: HookToggles::default(),
            free_camera: FreeCameraConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Load core config from `<base>/configs/core.toml`, creating default if missing.
    pub fn load(base: &Path) -> ConfigResult<Self> {
        let path = core_config_path(base);

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::debug!("Loaded core config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save(base)?;
            tracing::info!("Created default core config at {:?}", path);
            Ok(default)
        }
    }

    /// Save core config to file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save(&self, base: &Path) -> ConfigResult<()> {
        let path = core_config_path(base);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        tracing::debug!("Saved core config to {:?}", path);
        Ok(())
    }

    /// Reload core config from file.
    pub fn reload(&mut self, base: &Path) -> ConfigResult<()> {
        let path = core_config_path(base);
        let content = std::fs::read_to_string(&path)?;
        *self = toml::from_str(&content)?;
        tracing::debug!("Reloaded core config from {:?}", path);
        Ok(())
    }
}
