//! posecam - Core Logic
//!
//! Camera interception for the host's pose mode: locating the host camera
//! routines from gamedata, detouring them, and composing virtual cameras
//! onto the host camera every frame.
//!
//! # Re-exports
//!
//! This crate re-exports the SDK and engine crates for convenience:
//! - [`sdk`] - Host record types and native routine signatures
//! - [`engine`] - Host module discovery and globals

use std::path::Path;

use tracing::info;

pub use posecam_engine as engine;
pub use posecam_sdk as sdk;

pub mod camera;
pub mod config;
pub mod gamedata;
pub mod hooks;

pub use camera::{
    CameraError, CameraId, CameraLayout, CameraPath, CameraService, FreeCamInput, HookTarget,
    InstalledHooks, VirtualCamera,
};
pub use config::{ConfigError, ConfigResult, CoreConfig, FreeCameraConfig, HookToggles};
pub use gamedata::{Gamedata, GamedataError, ModuleScanner, SignatureResolver};
pub use hooks::{hook, FunctionHook, HookError, HookInstaller, HookManager, InlineHookKey};

/// Errors that abort loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Host error: {0}")]
    Host(#[from] engine::HostError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gamedata error: {0}")]
    Gamedata(#[from] GamedataError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
}

/// Locate the host, load gamedata and install the camera hooks
///
/// Gamedata is read from `<base>/gamedata/`. Returns the hooks that made it
/// in; routines that could not be found are logged and skipped.
pub fn load(config: &CoreConfig, base: &Path) -> Result<InstalledHooks, LoadError> {
    camera::configure(config.free_camera);

    if !engine::is_host_initialized() {
        engine::init_host(engine::load_host()?)?;
    }
    let host = engine::host();

    let path = config::gamedata_path(base, &config.gamedata);
    let gamedata = Gamedata::load_from_file(&path)?;
    info!("Loaded gamedata from {:?}", path);

    // SAFETY: The main module stays mapped for the life of the process
    let scanner = unsafe { ModuleScanner::new(&gamedata, host.module) };
    let layout = CameraLayout::from_resolver(&scanner)?;

    Ok(camera::install_service(
        &scanner,
        &HookManager,
        layout,
        &config.hooks,
    )?)
}

/// Restore the host camera routines and drop all camera state
///
/// Called from the FFI layer when the extension unloads.
pub fn shutdown() {
    info!("posecam shutting down...");
    camera::uninstall_service();
    camera::set_gposing(false);
}
