//! Camera ownership registry
//!
//! Two selection scopes decide which virtual camera drives the host:
//! - the container scope, used by the update and collision paths
//!   ([`CameraContainer::current_camera`])
//! - the global free-camera scope, used by the scene path
//!   ([`CameraRegistry::free_camera`])
//!
//! Selecting a camera sets both scopes and is exclusive: exactly one camera
//! carries `is_active_camera` afterwards.

use slotmap::{new_key_type, Key, KeyData, SlotMap};

use super::virtual_camera::VirtualCamera;
use super::CameraError;

new_key_type! {
    /// Handle for a virtual camera
    pub struct CameraId;
}

impl CameraId {
    /// Stable integer form for the C ABI
    pub fn to_ffi(self) -> u64 {
        self.data().as_ffi()
    }

    pub fn from_ffi(value: u64) -> Self {
        KeyData::from_ffi(value).into()
    }
}

/// Cameras owned by the pose session
#[derive(Debug)]
pub struct CameraContainer {
    cameras: SlotMap<CameraId, VirtualCamera>,
    current: Option<CameraId>,
    is_allowed: bool,
}

impl CameraContainer {
    fn new() -> Self {
        Self {
            cameras: SlotMap::with_key(),
            current: None,
            is_allowed: true,
        }
    }

    /// Camera selected in this container
    pub fn current_camera(&self) -> Option<&VirtualCamera> {
        self.current.and_then(|id| self.cameras.get(id))
    }

    pub fn current_id(&self) -> Option<CameraId> {
        self.current
    }

    /// Whether overrides are currently permitted for this container
    pub fn is_allowed(&self) -> bool {
        self.is_allowed
    }

    pub fn cameras(&self) -> impl Iterator<Item = (CameraId, &VirtualCamera)> {
        self.cameras.iter()
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}

/// Registry of the camera container and the free-camera selection
#[derive(Debug)]
pub struct CameraRegistry {
    container: Option<CameraContainer>,
    free_camera: Option<CameraId>,
    default_fov: f32,
}

impl CameraRegistry {
    /// Empty registry; new cameras start with `default_fov`
    pub fn new(default_fov: f32) -> Self {
        Self {
            container: None,
            free_camera: None,
            default_fov,
        }
    }

    pub fn set_default_fov(&mut self, fov: f32) {
        self.default_fov = fov;
    }

    pub fn container(&self) -> Option<&CameraContainer> {
        self.container.as_ref()
    }

    /// Create the container with one selected default camera
    ///
    /// Does nothing if a container already exists. Returns the selected
    /// camera.
    pub fn create_container(&mut self) -> Option<CameraId> {
        if let Some(container) = &self.container {
            return container.current;
        }

        self.container = Some(CameraContainer::new());
        let id = self.spawn_camera().ok()?;
        self.select_camera(id).ok()?;
        tracing::debug!("Created camera container");
        Some(id)
    }

    /// Destroy the container and every camera in it
    ///
    /// Returns the number of cameras destroyed.
    pub fn destroy_container(&mut self) -> usize {
        self.free_camera = None;
        match self.container.take() {
            Some(container) => {
                tracing::debug!("Destroyed camera container ({} cameras)", container.len());
                container.len()
            }
            None => 0,
        }
    }

    /// Add an unselected camera to the container
    pub fn spawn_camera(&mut self) -> Result<CameraId, CameraError> {
        let fov = self.default_fov;
        let container = self.container.as_mut().ok_or(CameraError::NoContainer)?;
        Ok(container.cameras.insert(VirtualCamera::new(fov)))
    }

    /// Remove a camera. Destroying the selected camera clears both selections.
    pub fn destroy_camera(&mut self, id: CameraId) -> Result<VirtualCamera, CameraError> {
        let container = self.container.as_mut().ok_or(CameraError::NoContainer)?;
        let camera = container
            .cameras
            .remove(id)
            .ok_or(CameraError::UnknownCamera(id))?;

        if container.current == Some(id) {
            container.current = None;
        }
        if self.free_camera == Some(id) {
            self.free_camera = None;
        }
        Ok(camera)
    }

    /// Make `id` the single authoritative camera in both scopes
    pub fn select_camera(&mut self, id: CameraId) -> Result<(), CameraError> {
        let container = self.container.as_mut().ok_or(CameraError::NoContainer)?;
        if !container.cameras.contains_key(id) {
            return Err(CameraError::UnknownCamera(id));
        }

        for (key, camera) in container.cameras.iter_mut() {
            camera.is_active_camera = key == id;
        }
        container.current = Some(id);
        self.free_camera = Some(id);
        Ok(())
    }

    pub fn camera(&self, id: CameraId) -> Option<&VirtualCamera> {
        self.container.as_ref()?.cameras.get(id)
    }

    pub fn camera_mut(&mut self, id: CameraId) -> Option<&mut VirtualCamera> {
        self.container.as_mut()?.cameras.get_mut(id)
    }

    /// Container-scoped selection
    pub fn current_camera(&self) -> Option<&VirtualCamera> {
        self.container.as_ref()?.current_camera()
    }

    /// Global free-camera selection
    pub fn free_camera(&self) -> Option<&VirtualCamera> {
        self.camera(self.free_camera?)
    }

    /// Gate overrides for the container. Returns false without a container.
    pub fn set_allowed(&mut self, allowed: bool) -> bool {
        match self.container.as_mut() {
            Some(container) => {
                container.is_allowed = allowed;
                true
            }
            None => false,
        }
    }
}
