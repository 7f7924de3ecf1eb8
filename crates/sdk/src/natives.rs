//! Native signatures of the host camera routines
//!
//! The host is an x86-64 Windows binary; `extern "C"` selects the Win64
//! calling convention on that target.

use std::ffi::c_void;

use crate::records::{GameCamera, Matrix4x4, RenderCamera, SceneCamera, Vector3};

/// Per-frame game camera update
pub type CameraUpdateFn = unsafe extern "C" fn(camera: *mut GameCamera) -> isize;

/// Camera collision resolution
///
/// Writes the resulting collision distance pair into the camera record.
pub type CameraCollisionFn = unsafe extern "C" fn(
    camera: *mut GameCamera,
    a2: *mut Vector3,
    a3: *mut Vector3,
    a4: f32,
    a5: isize,
    a6: f32,
) -> isize;

/// Projection matrix construction
pub type ProjectionMatrixFn = unsafe extern "C" fn(
    this: *mut c_void,
    fov: f32,
    aspect: f32,
    near_plane: f32,
    far_plane: f32,
    a6: f32,
    a7: f32,
) -> *mut Matrix4x4;

/// Scene camera update (recomputes the scene view matrix)
pub type CameraSceneUpdateFn = unsafe extern "C" fn(camera: *mut SceneCamera) -> isize;

/// Loads a view matrix into a render camera's cache
///
/// Called directly, never detoured.
pub type CameraMatrixLoadFn =
    unsafe extern "C" fn(camera: *mut RenderCamera, matrix: *const Matrix4x4);
