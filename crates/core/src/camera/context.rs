//! Per-frame camera authority
//!
//! [`select`] is the single place that decides which virtual camera, if any,
//! overrides the host for a callback. Every detour works from the resulting
//! [`Authority`], carried in a [`FrameContext`].

use glam::{Mat4, Vec3};

use super::cutscene::{CutsceneManager, CutsceneSource};
use super::registry::CameraRegistry;

/// Container-scoped camera composed onto the host camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualCamera {
    /// Added to host position and look-at by the update path
    pub position_offset: Vec3,

    /// Collision is overridden to maximum distance
    pub suppress_collision: bool,
}

/// What the scene-update path writes this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneOverride {
    None,
    /// Free-fly camera view matrix
    FreeFly(Mat4),
    /// Matrix comes from the cutscene source
    Cutscene,
}

/// Camera authority for one callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Authority {
    pub manual: Option<ManualCamera>,
    pub scene: SceneOverride,
    /// Replacement projection FOV
    pub fov: Option<f32>,
}

impl Authority {
    /// No override anywhere
    pub const fn none() -> Self {
        Self {
            manual: None,
            scene: SceneOverride::None,
            fov: None,
        }
    }

    pub fn is_none(&self) -> bool {
        *self == Self::none()
    }
}

impl Default for Authority {
    fn default() -> Self {
        Self::none()
    }
}

/// Resolve the authoritative camera for this instant
///
/// Nothing overrides outside pose mode. A free-fly camera takes the scene
/// path over a playing cutscene, so at most one scene write happens.
pub fn select(gposing: bool, cameras: &CameraRegistry, cutscene: &CutsceneManager) -> Authority {
    if !gposing {
        return Authority::none();
    }

    let manual = cameras.container().and_then(|container| {
        let camera = container.current_camera()?;
        Some(ManualCamera {
            position_offset: camera.position_offset,
            suppress_collision: container.is_allowed()
                && !camera.is_free_camera
                && camera.disable_collision
                && camera.is_active_camera,
        })
    });

    let cutscene_active = cutscene.virtual_camera.is_active_camera;

    let scene = match cameras.free_camera() {
        Some(camera) if camera.is_free_camera => SceneOverride::FreeFly(camera.view_matrix()),
        _ if cutscene_active => SceneOverride::Cutscene,
        _ => SceneOverride::None,
    };

    let fov = (cutscene_active && cutscene.settings.enable_fov)
        .then_some(cutscene.virtual_camera.fov);

    Authority { manual, scene, fov }
}

/// State a detour works with for one callback
pub struct FrameContext<'a> {
    gposing: bool,
    authority: Authority,
    cutscene: &'a mut dyn CutsceneSource,
}

impl<'a> FrameContext<'a> {
    pub fn new(gposing: bool, authority: Authority, cutscene: &'a mut dyn CutsceneSource) -> Self {
        Self {
            gposing,
            authority,
            cutscene,
        }
    }

    pub fn gposing(&self) -> bool {
        self.gposing
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Ask the cutscene for this instant's view matrix
    pub fn cutscene_matrix(&mut self) -> Option<Mat4> {
        self.cutscene.next_matrix()
    }
}
