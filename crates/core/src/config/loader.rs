//! Config path resolution
//!
//! Handles resolving paths for configuration and gamedata files. Every path
//! is derived from an explicit base directory resolved once at load.

use std::path::{Path, PathBuf};

use super::{ConfigError, ConfigResult};

/// Environment variable that overrides the default base directory
pub const BASE_DIR_ENV: &str = "POSECAM_DIR";

/// Returns the posecam base directory.
///
/// An explicit `base_dir` from the loader wins, then `POSECAM_DIR`.
/// Otherwise the extension lives next to the host executable:
/// `<host dir>/posecam/`
pub fn posecam_base_dir(base_dir: Option<&Path>) -> ConfigResult<PathBuf> {
    if let Some(dir) = base_dir.filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = std::env::var_os(BASE_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let exe = std::env::current_exe().map_err(ConfigError::IoError)?;
    exe.parent()
        .map(|p| p.join("posecam"))
        .ok_or(ConfigError::NoConfigDirectory)
}

/// Returns the base configs directory.
///
/// Path: `<base>/configs/`
pub fn configs_dir(base: &Path) -> PathBuf {
    base.join("configs")
}

/// Returns the core config path.
///
/// Path: `<base>/configs/core.toml`
pub fn core_config_path(base: &Path) -> PathBuf {
    configs_dir(base).join("core.toml")
}

/// Returns the path of a gamedata file.
///
/// Path: `<base>/gamedata/{file_name}`
pub fn gamedata_path(base: &Path, file_name: &str) -> PathBuf {
    base.join("gamedata").join(file_name)
}
