//! Host camera records
//!
//! Handlers only see the [`CameraRecord`], [`SceneCameraRecord`] and
//! [`RenderMatrixSink`] traits. The raw adapters here are the one place
//! that knows host offsets and touches host memory.

use std::ptr::NonNull;

use glam::{Mat4, Vec2, Vec3};
use posecam_sdk::names::{
    OFFSET_GAME_CAMERA_COLLIDE, OFFSET_GAME_CAMERA_MAX_DISTANCE, OFFSET_GAME_CAMERA_SCENE,
    OFFSET_MANAGER_ACTIVE_INDEX, OFFSET_MANAGER_CAMERAS, OFFSET_SCENE_LOOK_AT,
    OFFSET_SCENE_POSITION, OFFSET_SCENE_RENDER_CAMERA, OFFSET_SCENE_VIEW_MATRIX,
};
use posecam_sdk::{
    CameraManager, CameraMatrixLoadFn, GameCamera, Matrix4x4, RenderCamera, SceneCamera, Vector3,
};

use super::CameraError;
use crate::gamedata::SignatureResolver;

/// Number of camera slots in the host camera manager
const MANAGER_CAMERA_SLOTS: usize = 4;

/// Game camera as seen by the update and collision paths
pub trait CameraRecord {
    fn position(&self) -> Vec3;
    fn set_position(&mut self, position: Vec3);
    fn look_at(&self) -> Vec3;
    fn set_look_at(&mut self, look_at: Vec3);
    fn max_distance(&self) -> f32;
    fn set_collision(&mut self, collide: Vec2);
}

/// Scene camera as seen by the scene-update path
pub trait SceneCameraRecord {
    fn view_matrix(&self) -> Mat4;
    fn set_view_matrix(&mut self, matrix: Mat4);

    /// Address of the stored view matrix
    fn view_matrix_ptr(&self) -> *const Matrix4x4;
}

/// Render-side view matrix cache
pub trait RenderMatrixSink {
    /// Whether an active render camera is there to load into
    fn has_render_camera(&self) -> bool;

    /// Load the matrix stored at `matrix` into the active render camera.
    /// Returns false when there is no render camera.
    ///
    /// # Safety
    /// `matrix` must be readable for the duration of the call.
    unsafe fn load(&mut self, matrix: *const Matrix4x4) -> bool;
}

/// Host record offsets for one host build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraLayout {
    pub game_scene: usize,
    pub max_distance: usize,
    pub collide: usize,
    pub position: usize,
    pub look_at: usize,
    pub view_matrix: usize,
    pub render_camera: usize,
    pub manager_active_index: usize,
    pub manager_cameras: usize,
}

impl CameraLayout {
    /// Load every offset from gamedata
    pub fn from_resolver(resolver: &dyn SignatureResolver) -> Result<Self, CameraError> {
        let offset = |name: &str| -> Result<usize, CameraError> {
            let value = resolver.offset(name)?;
            usize::try_from(value).map_err(|_| CameraError::InvalidOffset {
                name: name.to_string(),
                value,
            })
        };

        Ok(Self {
            game_scene: offset(OFFSET_GAME_CAMERA_SCENE)?,
            max_distance: offset(OFFSET_GAME_CAMERA_MAX_DISTANCE)?,
            collide: offset(OFFSET_GAME_CAMERA_COLLIDE)?,
            position: offset(OFFSET_SCENE_POSITION)?,
            look_at: offset(OFFSET_SCENE_LOOK_AT)?,
            view_matrix: offset(OFFSET_SCENE_VIEW_MATRIX)?,
            render_camera: offset(OFFSET_SCENE_RENDER_CAMERA)?,
            manager_active_index: offset(OFFSET_MANAGER_ACTIVE_INDEX)?,
            manager_cameras: offset(OFFSET_MANAGER_CAMERAS)?,
        })
    }
}

unsafe fn read<T: Copy>(base: NonNull<u8>, offset: usize) -> T {
    base.as_ptr().add(offset).cast::<T>().read_unaligned()
}

unsafe fn write<T>(base: NonNull<u8>, offset: usize, value: T) {
    base.as_ptr().add(offset).cast::<T>().write_unaligned(value)
}

unsafe fn read_vec3(base: NonNull<u8>, offset: usize) -> Vec3 {
    Vec3::from_array(read::<Vector3>(base, offset).into())
}

unsafe fn write_vec3(base: NonNull<u8>, offset: usize, value: Vec3) {
    write(base, offset, Vector3::from(value.to_array()))
}

/// Game camera record in host memory
pub struct RawGameCamera<'a> {
    base: NonNull<u8>,
    layout: &'a CameraLayout,
}

impl<'a> RawGameCamera<'a> {
    /// # Safety
    /// A non-null `camera` must point to a live game camera laid out as
    /// `layout` describes, for as long as the adapter is used.
    pub unsafe fn new(camera: *mut GameCamera, layout: &'a CameraLayout) -> Option<Self> {
        Some(Self {
            base: NonNull::new(camera.cast::<u8>())?,
            layout,
        })
    }

    fn scene(&self) -> NonNull<u8> {
        // SAFETY: the scene camera is embedded in the game camera
        unsafe { self.base.add(self.layout.game_scene) }
    }
}

impl CameraRecord for RawGameCamera<'_> {
    fn position(&self) -> Vec3 {
        unsafe { read_vec3(self.scene(), self.layout.position) }
    }

    fn set_position(&mut self, position: Vec3) {
        unsafe { write_vec3(self.scene(), self.layout.position, position) }
    }

    fn look_at(&self) -> Vec3 {
        unsafe { read_vec3(self.scene(), self.layout.look_at) }
    }

    fn set_look_at(&mut self, look_at: Vec3) {
        unsafe { write_vec3(self.scene(), self.layout.look_at, look_at) }
    }

    fn max_distance(&self) -> f32 {
        unsafe { read(self.base, self.layout.max_distance) }
    }

    fn set_collision(&mut self, collide: Vec2) {
        unsafe { write(self.base, self.layout.collide, collide.to_array()) }
    }
}

/// Scene camera record in host memory
pub struct RawSceneCamera<'a> {
    base: NonNull<u8>,
    layout: &'a CameraLayout,
}

impl<'a> RawSceneCamera<'a> {
    /// # Safety
    /// A non-null `camera` must point to a live scene camera laid out as
    /// `layout` describes, for as long as the adapter is used.
    pub unsafe fn new(camera: *mut SceneCamera, layout: &'a CameraLayout) -> Option<Self> {
        Some(Self {
            base: NonNull::new(camera.cast::<u8>())?,
            layout,
        })
    }
}

impl SceneCameraRecord for RawSceneCamera<'_> {
    fn view_matrix(&self) -> Mat4 {
        let raw: Matrix4x4 = unsafe { read(self.base, self.layout.view_matrix) };
        Mat4::from_cols_array(&raw.m)
    }

    fn set_view_matrix(&mut self, matrix: Mat4) {
        let raw = Matrix4x4 {
            m: matrix.to_cols_array(),
        };
        unsafe { write(self.base, self.layout.view_matrix, raw) }
    }

    fn view_matrix_ptr(&self) -> *const Matrix4x4 {
        // SAFETY: the matrix field lies inside the scene camera
        unsafe { self.base.add(self.layout.view_matrix).cast::<Matrix4x4>().as_ptr() }
    }
}

/// Pushes matrices through the host's render matrix load routine
///
/// The render camera is reached through the camera manager's active camera.
/// Any missing link means nothing is loaded.
pub struct NativeMatrixLoader<'a> {
    load: CameraMatrixLoadFn,
    manager: Option<NonNull<CameraManager>>,
    layout: &'a CameraLayout,
}

impl<'a> NativeMatrixLoader<'a> {
    /// # Safety
    /// `load` must be the host matrix load routine and a present `manager`
    /// must point to the live camera manager laid out as `layout` describes.
    pub unsafe fn new(
        load: CameraMatrixLoadFn,
        manager: Option<NonNull<CameraManager>>,
        layout: &'a CameraLayout,
    ) -> Self {
        Self {
            load,
            manager,
            layout,
        }
    }

    /// Render camera of the manager's active game camera
    fn render_camera(&self) -> Option<NonNull<RenderCamera>> {
        let manager = self.manager?.cast::<u8>();

        let index: i32 = unsafe { read(manager, self.layout.manager_active_index) };
        let index = usize::try_from(index).ok()?;
        if index >= MANAGER_CAMERA_SLOTS {
            return None;
        }

        let slot = self.layout.manager_cameras + index * std::mem::size_of::<usize>();
        let camera = NonNull::new(unsafe { read::<*mut GameCamera>(manager, slot) })?;
        let scene = unsafe { camera.cast::<u8>().add(self.layout.game_scene) };

        NonNull::new(unsafe { read::<*mut RenderCamera>(scene, self.layout.render_camera) })
    }
}

impl RenderMatrixSink for NativeMatrixLoader<'_> {
    fn has_render_camera(&self) -> bool {
        self.render_camera().is_some()
    }

    unsafe fn load(&mut self, matrix: *const Matrix4x4) -> bool {
        let Some(render) = self.render_camera() else {
            tracing::trace!("No active render camera; matrix not loaded");
            return false;
        };

        (self.load)(render.as_ptr(), matrix);
        true
    }
}
