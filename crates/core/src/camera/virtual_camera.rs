//! Virtual camera data model
//!
//! A [`VirtualCamera`] is either composed onto the host camera (a position
//! offset, collision suppression, FOV override) or, in free-fly mode, fully
//! independent with its own [`FreeTransform`].

use std::f32::consts::FRAC_PI_2;

use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};

use crate::config::FreeCameraConfig;

/// Keeps free-fly pitch just short of straight up/down
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;

/// Host camera placement observed during an update call
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraPose {
    pub position: Vec3,
    pub look_at: Vec3,
}

/// Independent camera transform used while free-flying
///
/// `rotation` holds pitch (x), yaw (y) and roll (z) in radians. Forward is
/// -Z, up is +Y.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FreeTransform {
    pub position: Vec3,
    pub rotation: Vec3,
}

impl FreeTransform {
    /// Transform at `position` looking towards `target`
    pub fn look_from(position: Vec3, target: Vec3) -> Self {
        let direction = (target - position).normalize_or_zero();
        if direction == Vec3::ZERO {
            return Self {
                position,
                rotation: Vec3::ZERO,
            };
        }

        let pitch = direction.y.clamp(-1.0, 1.0).asin().clamp(-PITCH_LIMIT, PITCH_LIMIT);
        let yaw = (-direction.x).atan2(-direction.z);
        Self {
            position,
            rotation: Vec3::new(pitch, yaw, 0.0),
        }
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            self.rotation.y,
            self.rotation.x,
            self.rotation.z,
        )
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation() * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.orientation() * Vec3::X
    }

    /// World-to-view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation(), self.position).inverse()
    }
}

/// One frame of free-fly input
///
/// `movement` is local: x right, y world up, z forward, each in [-1, 1].
/// `look` is the raw look delta (x yaw, y pitch) scaled by the configured
/// sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FreeCamInput {
    pub movement: Vec3,
    pub look: Vec2,
    pub roll: f32,
    pub boost: bool,
}

/// An independently controllable camera
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualCamera {
    /// Added to the host camera position and look-at while authoritative
    pub position_offset: Vec3,

    /// Fully independent of host camera logic
    pub is_free_camera: bool,

    /// Field of view override in radians
    pub fov: f32,

    /// Suppress host camera collision while active
    pub disable_collision: bool,

    /// Currently composited into the render pipeline
    pub is_active_camera: bool,

    /// Free-fly transform, used only while `is_free_camera` is set
    pub transform: FreeTransform,
}

impl Default for VirtualCamera {
    fn default() -> Self {
        Self::new(FreeCameraConfig::default().default_fov)
    }
}

impl VirtualCamera {
    pub fn new(fov: f32) -> Self {
        Self {
            position_offset: Vec3::ZERO,
            is_free_camera: false,
            fov,
            disable_collision: false,
            is_active_camera: false,
            transform: FreeTransform::default(),
        }
    }

    /// View matrix of the free-fly transform
    pub fn view_matrix(&self) -> Mat4 {
        self.transform.view_matrix()
    }

    /// Switch to free-fly, starting from the host camera when a pose is known
    pub fn enter_free_camera(&mut self, seed: Option<CameraPose>) {
        if self.is_free_camera {
            return;
        }
        if let Some(pose) = seed {
            self.transform = FreeTransform::look_from(pose.position, pose.look_at);
        }
        self.is_free_camera = true;
    }

    pub fn exit_free_camera(&mut self) {
        self.is_free_camera = false;
    }

    /// Integrate one frame of input. Ignored unless free-flying.
    ///
    /// Returns whether the transform changed.
    pub fn apply_free_input(
        &mut self,
        input: &FreeCamInput,
        dt: f32,
        config: &FreeCameraConfig,
    ) -> bool {
        if !self.is_free_camera || !dt.is_finite() || dt < 0.0 {
            return false;
        }

        let before = self.transform;

        let rotation = &mut self.transform.rotation;
        rotation.y -= input.look.x * config.look_sensitivity;
        rotation.x = (rotation.x - input.look.y * config.look_sensitivity)
            .clamp(-PITCH_LIMIT, PITCH_LIMIT);
        rotation.z += input.roll * config.look_sensitivity;

        let mut direction = self.transform.right() * input.movement.x
            + Vec3::Y * input.movement.y
            + self.transform.forward() * input.movement.z;
        if direction.length_squared() > 1.0 {
            direction = direction.normalize();
        }

        let mut speed = config.move_speed;
        if input.boost {
            speed *= config.boost_multiplier;
        }
        self.transform.position += direction * speed * dt;

        self.transform != before
    }
}
