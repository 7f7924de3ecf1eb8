//! Process-wide camera state
//!
//! [`CameraState`] owns the pose-mode flag, the camera registry and the
//! cutscene session. UI-facing functions below lock it, and every change
//! republishes a [`FrameSnapshot`] before the lock is released. Detours read
//! that snapshot and never take the state lock, so a tool thread editing
//! cameras does not cost the host a frame of override.

use std::sync::LazyLock;

use parking_lot::{Mutex, RwLock};

use super::context::{select, Authority, FrameContext};
use super::cutscene::{CameraPath, CutsceneManager, CutscenePlayback};
use super::registry::{CameraId, CameraRegistry};
use super::virtual_camera::{CameraPose, FreeCamInput, VirtualCamera};
use super::CameraError;
use crate::config::FreeCameraConfig;

/// Everything a frame callback needs, captured after the last state change
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub gposing: bool,
    pub authority: Authority,
    /// Running cutscene, sampled on the wall clock at callback time
    pub cutscene: Option<CutscenePlayback>,
}

impl FrameSnapshot {
    /// Outside pose mode, nothing overrides
    pub const fn idle() -> Self {
        Self {
            gposing: false,
            authority: Authority::none(),
            cutscene: None,
        }
    }

    /// Context for one callback
    ///
    /// An enabled cutscene FOV is resampled for this instant.
    pub fn frame(&mut self) -> FrameContext<'_> {
        let mut authority = self.authority;
        if let (Some(fov), Some(playback)) = (authority.fov.as_mut(), &self.cutscene) {
            if let Some((_, sampled)) = playback.frame_at(playback.elapsed()) {
                *fov = sampled;
            }
        }
        FrameContext::new(self.gposing, authority, &mut self.cutscene)
    }
}

impl Default for FrameSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

/// Pose session state
#[derive(Debug)]
pub struct CameraState {
    gposing: bool,
    pub cameras: CameraRegistry,
    pub cutscene: CutsceneManager,
    free_camera: FreeCameraConfig,
    last_pose: Option<CameraPose>,
}

impl CameraState {
    pub fn new(config: FreeCameraConfig) -> Self {
        Self {
            gposing: false,
            cameras: CameraRegistry::new(config.default_fov),
            cutscene: CutsceneManager::new(),
            free_camera: config,
            last_pose: None,
        }
    }

    /// Apply new free camera settings
    pub fn configure(&mut self, config: FreeCameraConfig) {
        self.free_camera = config;
        self.cameras.set_default_fov(config.default_fov);
    }

    pub fn gposing(&self) -> bool {
        self.gposing
    }

    /// Enter or leave pose mode
    ///
    /// Entering creates the camera container. Leaving destroys it and ends
    /// the cutscene session. Returns whether the mode changed.
    pub fn set_gposing(&mut self, gposing: bool) -> bool {
        if self.gposing == gposing {
            return false;
        }
        self.gposing = gposing;

        if gposing {
            self.cameras.create_container();
            tracing::info!("Entered pose mode");
        } else {
            self.cameras.destroy_container();
            self.cutscene.stop();
            self.last_pose = None;
            tracing::info!("Left pose mode");
        }
        true
    }

    pub fn authority(&self) -> Authority {
        select(self.gposing, &self.cameras, &self.cutscene)
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            gposing: self.gposing,
            authority: self.authority(),
            cutscene: self.cutscene.playback(),
        }
    }

    /// Remember where the host camera was, to seed free-fly
    pub fn observe_host_pose(&mut self, pose: CameraPose) {
        self.last_pose = Some(pose);
    }

    pub fn last_pose(&self) -> Option<CameraPose> {
        self.last_pose
    }

    /// Switch a camera in or out of free-fly
    pub fn set_free_camera(&mut self, id: CameraId, enabled: bool) -> Result<(), CameraError> {
        let seed = self.last_pose;
        let camera = self
            .cameras
            .camera_mut(id)
            .ok_or(CameraError::UnknownCamera(id))?;

        if enabled {
            camera.enter_free_camera(seed);
        } else {
            camera.exit_free_camera();
        }
        Ok(())
    }

    /// Feed one frame of input to a free-flying camera
    pub fn move_free_camera(
        &mut self,
        id: CameraId,
        input: &FreeCamInput,
        dt: f32,
    ) -> Result<bool, CameraError> {
        let config = self.free_camera;
        let camera = self
            .cameras
            .camera_mut(id)
            .ok_or(CameraError::UnknownCamera(id))?;
        Ok(camera.apply_free_input(input, dt, &config))
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new(FreeCameraConfig::default())
    }
}

static STATE: LazyLock<Mutex<CameraState>> = LazyLock::new(|| Mutex::new(CameraState::default()));

/// Latest snapshot of [`STATE`], written only while it is locked
static PUBLISHED: RwLock<FrameSnapshot> = RwLock::new(FrameSnapshot::idle());

fn publish(state: &CameraState) {
    *PUBLISHED.write() = state.snapshot();
}

/// Run `f` with the camera state locked, then publish the result
pub fn with_state<R>(f: impl FnOnce(&mut CameraState) -> R) -> R {
    let mut state = STATE.lock();
    let result = f(&mut state);
    publish(&state);
    result
}

/// Run `f` only if the camera state is free right now
pub fn try_with_state<R>(f: impl FnOnce(&mut CameraState) -> R) -> Option<R> {
    let mut state = STATE.try_lock()?;
    let result = f(&mut state);
    publish(&state);
    Some(result)
}

/// Latest published snapshot
///
/// Never waits on the state lock. Writers hold the snapshot lock only for
/// the copy.
pub fn published_snapshot() -> FrameSnapshot {
    PUBLISHED.read().clone()
}

// ============================================================================
// Pose mode
// ============================================================================

/// Apply free camera settings to the live state
pub fn configure(config: FreeCameraConfig) {
    with_state(|state| state.configure(config));
}

/// Enter or leave pose mode
pub fn set_gposing(gposing: bool) -> bool {
    with_state(|state| state.set_gposing(gposing))
}

/// Check if the host is in pose mode
pub fn is_gposing() -> bool {
    with_state(|state| state.gposing())
}

// ============================================================================
// Cameras
// ============================================================================

/// Add a camera to the pose container, optionally free-flying
pub fn spawn_camera(free: bool) -> Result<CameraId, CameraError> {
    with_state(|state| {
        let id = state.cameras.spawn_camera()?;
        if free {
            state.set_free_camera(id, true)?;
        }
        Ok(id)
    })
}

pub fn destroy_camera(id: CameraId) -> Result<(), CameraError> {
    with_state(|state| state.cameras.destroy_camera(id).map(|_| ()))
}

/// Make a camera the authoritative one
pub fn select_camera(id: CameraId) -> Result<(), CameraError> {
    with_state(|state| state.cameras.select_camera(id))
}

/// Gate container overrides. Returns false outside pose mode.
pub fn set_allowed(allowed: bool) -> bool {
    with_state(|state| state.cameras.set_allowed(allowed))
}

/// Edit a camera in place
pub fn update_camera<R>(
    id: CameraId,
    f: impl FnOnce(&mut VirtualCamera) -> R,
) -> Result<R, CameraError> {
    with_state(|state| {
        state
            .cameras
            .camera_mut(id)
            .map(f)
            .ok_or(CameraError::UnknownCamera(id))
    })
}

pub fn set_free_camera(id: CameraId, enabled: bool) -> Result<(), CameraError> {
    with_state(|state| state.set_free_camera(id, enabled))
}

pub fn move_free_camera(id: CameraId, input: &FreeCamInput, dt: f32) -> Result<bool, CameraError> {
    with_state(|state| state.move_free_camera(id, input, dt))
}

// ============================================================================
// Cutscene
// ============================================================================

pub fn load_cutscene(path: CameraPath) {
    with_state(|state| state.cutscene.load_path(path));
}

pub fn play_cutscene() -> Result<(), CameraError> {
    with_state(|state| state.cutscene.play())
}

pub fn stop_cutscene() {
    with_state(|state| state.cutscene.stop());
}

pub fn set_cutscene_fov_enabled(enabled: bool) {
    with_state(|state| state.cutscene.settings.enable_fov = enabled);
}
