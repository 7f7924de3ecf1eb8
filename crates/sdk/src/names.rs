//! Gamedata key names
//!
//! These strings must match the keys in the deployed gamedata file.

/// Game camera per-frame update routine
pub const CAMERA_UPDATE: &str = "CameraUpdate";

/// Game camera collision routine
pub const CAMERA_COLLISION: &str = "CameraCollision";

/// Projection matrix builder
pub const CAMERA_PROJECTION: &str = "CameraProjection";

/// Scene camera update routine
pub const CAMERA_SCENE_UPDATE: &str = "CameraSceneUpdate";

/// Render camera matrix load routine (called, not hooked)
pub const CAMERA_MATRIX_LOAD: &str = "CameraMatrixLoad";

/// Static camera manager instance (resolved through a RIP-relative operand)
pub const CAMERA_MANAGER: &str = "CameraManager";

/// Offset of the embedded scene camera inside a game camera
pub const OFFSET_GAME_CAMERA_SCENE: &str = "GameCamera::SceneCamera";

/// Offset of the maximum zoom distance scalar inside a game camera
pub const OFFSET_GAME_CAMERA_MAX_DISTANCE: &str = "GameCamera::MaxDistance";

/// Offset of the collision distance pair inside a game camera
pub const OFFSET_GAME_CAMERA_COLLIDE: &str = "GameCamera::Collide";

/// Offset of the world position inside a scene camera
pub const OFFSET_SCENE_POSITION: &str = "SceneCamera::Position";

/// Offset of the look-at vector inside a scene camera
pub const OFFSET_SCENE_LOOK_AT: &str = "SceneCamera::LookAt";

/// Offset of the view matrix inside a scene camera
pub const OFFSET_SCENE_VIEW_MATRIX: &str = "SceneCamera::ViewMatrix";

/// Offset of the render camera pointer inside a scene camera
pub const OFFSET_SCENE_RENDER_CAMERA: &str = "SceneCamera::RenderCamera";

/// Offset of the active camera index inside the camera manager
pub const OFFSET_MANAGER_ACTIVE_INDEX: &str = "CameraManager::ActiveIndex";

/// Offset of the camera pointer array inside the camera manager
pub const OFFSET_MANAGER_CAMERAS: &str = "CameraManager::Cameras";

/// Collected signature names for iteration
pub const ALL_SIGNATURES: &[&str] = &[
    CAMERA_UPDATE,
    CAMERA_COLLISION,
    CAMERA_PROJECTION,
    CAMERA_SCENE_UPDATE,
    CAMERA_MATRIX_LOAD,
    CAMERA_MANAGER,
];

/// Collected offset names for iteration
pub const ALL_OFFSETS: &[&str] = &[
    OFFSET_GAME_CAMERA_SCENE,
    OFFSET_GAME_CAMERA_MAX_DISTANCE,
    OFFSET_GAME_CAMERA_COLLIDE,
    OFFSET_SCENE_POSITION,
    OFFSET_SCENE_LOOK_AT,
    OFFSET_SCENE_VIEW_MATRIX,
    OFFSET_SCENE_RENDER_CAMERA,
    OFFSET_MANAGER_ACTIVE_INDEX,
    OFFSET_MANAGER_CAMERAS,
];
