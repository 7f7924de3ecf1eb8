//! Scripted camera playback
//!
//! A [`CameraPath`] is a list of timed keyframes. While a cutscene plays the
//! [`CutsceneManager`] samples it on the wall clock and hands out view
//! matrices to the scene-update path. [`CutscenePlayback`] is the detached
//! copy of a running session that frame callbacks sample without touching
//! the manager.

use std::sync::Arc;
use std::time::Instant;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::virtual_camera::VirtualCamera;
use super::CameraError;

/// Source of cutscene view matrices for the scene-update path
pub trait CutsceneSource {
    /// View matrix for this instant, or `None` outside the camera track
    fn next_matrix(&mut self) -> Option<Mat4>;
}

/// Cutscene session settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Apply the keyframe FOV to the projection
    pub enable_fov: bool,

    /// World-space origin of the path
    pub offset: Vec3,

    /// Scale applied to keyframe positions
    pub scale: f32,

    /// Restart from the beginning after the last keyframe
    pub looping: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            enable_fov: false,
            offset: Vec3::ZERO,
            scale: 1.0,
            looping: false,
        }
    }
}

fn identity_rotation() -> Quat {
    Quat::IDENTITY
}

/// Camera placement at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Seconds from the start of the path
    pub time: f32,
    pub position: Vec3,
    #[serde(default = "identity_rotation")]
    pub rotation: Quat,
    pub fov: f32,
}

#[derive(Deserialize)]
struct PathFile {
    keyframes: Vec<Keyframe>,
}

/// Validated keyframe track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraPath {
    keyframes: Vec<Keyframe>,
}

impl CameraPath {
    /// Build a path. Keyframes must be non-empty with non-decreasing times.
    pub fn new(keyframes: Vec<Keyframe>) -> Result<Self, CameraError> {
        if keyframes.is_empty() {
            return Err(CameraError::InvalidPath("no keyframes".into()));
        }
        if let Some(bad) = keyframes.iter().find(|k| !k.time.is_finite() || k.time < 0.0) {
            return Err(CameraError::InvalidPath(format!(
                "bad keyframe time {}",
                bad.time
            )));
        }
        if keyframes.windows(2).any(|pair| pair[1].time < pair[0].time) {
            return Err(CameraError::InvalidPath(
                "keyframe times must not decrease".into(),
            ));
        }

        let keyframes = keyframes
            .into_iter()
            .map(|k| Keyframe {
                rotation: k.rotation.normalize(),
                ..k
            })
            .collect();
        Ok(Self { keyframes })
    }

    /// Parse `{"keyframes": [{"time", "position", "rotation", "fov"}, ...]}`
    pub fn from_json(json: &str) -> Result<Self, CameraError> {
        let file: PathFile =
            serde_json::from_str(json).map_err(|e| CameraError::InvalidPath(e.to_string()))?;
        Self::new(file.keyframes)
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Time of the last keyframe
    pub fn duration(&self) -> f32 {
        self.keyframes.last().map(|k| k.time).unwrap_or(0.0)
    }

    /// Interpolated keyframe at `time`, or `None` outside the track
    pub fn sample(&self, time: f32, looping: bool) -> Option<Keyframe> {
        let first = self.keyframes.first()?;
        let last = self.keyframes.last()?;

        // Looping repeats the keyframed span once the first keyframe is reached
        let time = if looping && time >= first.time {
            let span = last.time - first.time;
            if span > 0.0 {
                first.time + (time - first.time).rem_euclid(span)
            } else {
                first.time
            }
        } else {
            time
        };

        if !time.is_finite() || time < first.time || time > last.time {
            return None;
        }

        let next = self
            .keyframes
            .iter()
            .position(|k| k.time >= time)
            .unwrap_or(self.keyframes.len() - 1);
        if next == 0 {
            return Some(*first);
        }

        let a = &self.keyframes[next - 1];
        let b = &self.keyframes[next];
        let span = b.time - a.time;
        let t = if span > 0.0 { (time - a.time) / span } else { 1.0 };

        Some(Keyframe {
            time,
            position: a.position.lerp(b.position, t),
            rotation: a.rotation.slerp(b.rotation, t),
            fov: a.fov + (b.fov - a.fov) * t,
        })
    }
}

/// View matrix and FOV of `path` at `elapsed` under `settings`
fn path_frame(path: &CameraPath, settings: &CameraSettings, elapsed: f32) -> Option<(Mat4, f32)> {
    let frame = path.sample(elapsed, settings.looping)?;
    let position = settings.offset + frame.position * settings.scale;
    let view = Mat4::from_rotation_translation(frame.rotation, position).inverse();
    Some((view, frame.fov))
}

/// A playing cutscene, detached from its manager
#[derive(Debug, Clone, PartialEq)]
pub struct CutscenePlayback {
    path: Arc<CameraPath>,
    settings: CameraSettings,
    started: Instant,
}

impl CutscenePlayback {
    /// View matrix and FOV `elapsed` seconds into the session
    pub fn frame_at(&self, elapsed: f32) -> Option<(Mat4, f32)> {
        path_frame(&self.path, &self.settings, elapsed)
    }

    /// Seconds since the session started
    pub fn elapsed(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }
}

impl CutsceneSource for CutscenePlayback {
    fn next_matrix(&mut self) -> Option<Mat4> {
        self.frame_at(self.elapsed()).map(|(view, _)| view)
    }
}

impl CutsceneSource for Option<CutscenePlayback> {
    fn next_matrix(&mut self) -> Option<Mat4> {
        self.as_mut()?.next_matrix()
    }
}

/// Cutscene session state
#[derive(Debug)]
pub struct CutsceneManager {
    /// Camera driven by the path; `is_active_camera` is set while playing
    pub virtual_camera: VirtualCamera,
    pub settings: CameraSettings,
    path: Option<Arc<CameraPath>>,
    started: Option<Instant>,
}

impl Default for CutsceneManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CutsceneManager {
    pub fn new() -> Self {
        Self {
            virtual_camera: VirtualCamera::default(),
            settings: CameraSettings::default(),
            path: None,
            started: None,
        }
    }

    pub fn load_path(&mut self, path: CameraPath) {
        tracing::debug!(
            "Loaded camera path ({} keyframes, {:.2}s)",
            path.keyframes().len(),
            path.duration()
        );
        self.path = Some(Arc::new(path));
    }

    pub fn path(&self) -> Option<&CameraPath> {
        self.path.as_deref()
    }

    /// Start playback from the beginning of the loaded path
    pub fn play(&mut self) -> Result<(), CameraError> {
        if self.path.is_none() {
            return Err(CameraError::NoPath);
        }
        self.started = Some(Instant::now());
        self.virtual_camera.is_active_camera = true;
        tracing::info!("Cutscene camera started");
        Ok(())
    }

    /// End the session and reset its settings. The path stays loaded.
    pub fn stop(&mut self) {
        if self.virtual_camera.is_active_camera {
            tracing::info!("Cutscene camera stopped");
        }
        self.started = None;
        self.virtual_camera.is_active_camera = false;
        self.settings = CameraSettings::default();
    }

    pub fn is_playing(&self) -> bool {
        self.virtual_camera.is_active_camera
    }

    /// Detached copy of the running session, if one is playing
    pub fn playback(&self) -> Option<CutscenePlayback> {
        if !self.virtual_camera.is_active_camera {
            return None;
        }
        Some(CutscenePlayback {
            path: Arc::clone(self.path.as_ref()?),
            settings: self.settings,
            started: self.started?,
        })
    }
}
