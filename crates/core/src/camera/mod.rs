//! Camera interception
//!
//! Pose mode lets an external tool take over the host camera. Four host
//! routines are detoured (update, collision, projection, scene update); on
//! every call the detour asks [`select`] which virtual camera, if any, is
//! authoritative and then either passes straight through or composes that
//! camera onto the host's own state.
//!
//! # Layout
//!
//! - [`virtual_camera`] - the controllable camera model
//! - [`registry`] - camera container and selection
//! - [`cutscene`] - scripted camera paths
//! - [`context`] - per-frame authority and [`FrameContext`]
//! - [`handlers`] - detour bodies, pure over the record traits
//! - [`host`] - record traits and the raw host memory adapters
//! - [`state`] - process-wide state and UI-facing API
//! - [`service`] - hook lifecycle and the `extern "C"` detours
//!
//! # Example
//!
//! ```ignore
//! use posecam_core::camera;
//!
//! camera::set_gposing(true);
//! let id = camera::spawn_camera(false)?;
//! camera::select_camera(id)?;
//! camera::update_camera(id, |cam| cam.position_offset = glam::Vec3::Y)?;
//! ```

pub mod context;
pub mod cutscene;
pub mod handlers;
pub mod host;
pub mod registry;
pub mod service;
pub mod state;
pub mod virtual_camera;

use crate::gamedata::GamedataError;
use crate::hooks::HookError;

pub use context::{select, Authority, FrameContext, ManualCamera, SceneOverride};
pub use cutscene::{
    CameraPath, CameraSettings, CutsceneManager, CutscenePlayback, CutsceneSource, Keyframe,
};
pub use host::{CameraLayout, CameraRecord, RenderMatrixSink, SceneCameraRecord};
pub use registry::{CameraContainer, CameraId, CameraRegistry};
pub use service::{
    install_service, installed_hooks, set_hook_enabled, uninstall_service, CameraService,
    HookTarget, InstalledHooks,
};
pub use state::{
    configure, destroy_camera, is_gposing, load_cutscene, move_free_camera, play_cutscene,
    select_camera, set_allowed, set_cutscene_fov_enabled, set_free_camera, set_gposing,
    spawn_camera, stop_cutscene, update_camera, CameraState, FrameSnapshot,
};
pub use virtual_camera::{CameraPose, FreeCamInput, FreeTransform, VirtualCamera};

/// Camera system errors
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("No camera container (not in pose mode)")]
    NoContainer,

    #[error("Unknown camera: {0:?}")]
    UnknownCamera(CameraId),

    #[error("Invalid camera path: {0}")]
    InvalidPath(String),

    #[error("No camera path loaded")]
    NoPath,

    #[error("Host layout unavailable: {0}")]
    Gamedata(#[from] GamedataError),

    #[error("Invalid host offset {name}: {value}")]
    InvalidOffset { name: String, value: i64 },

    #[error("Hook operation failed: {0}")]
    Hook(#[from] HookError),

    #[error("Hook not installed: {0:?}")]
    HookNotInstalled(HookTarget),

    #[error("Camera service already installed")]
    AlreadyInstalled,

    #[error("Camera service not installed")]
    ServiceNotInstalled,
}

/// Serializes tests that touch the process-wide camera state and hooks
#[cfg(test)]
pub(crate) static TEST_STATE_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());
