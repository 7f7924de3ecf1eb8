//! Camera hook lifecycle and detours
//!
//! [`CameraService::install`] resolves the four host camera routines and
//! detours each one independently; a routine that cannot be found or hooked
//! only loses its own feature. The detours below are the host-facing edge:
//! they work from the published
//! [`FrameSnapshot`](super::state::FrameSnapshot) instead of the state lock,
//! never let a panic reach the host, and call the original routine exactly
//! once unless the collision override replaces it.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use bitflags::bitflags;
use parking_lot::{Mutex, RwLock};
use posecam_sdk::names::{
    CAMERA_COLLISION, CAMERA_MANAGER, CAMERA_MATRIX_LOAD, CAMERA_PROJECTION, CAMERA_SCENE_UPDATE,
    CAMERA_UPDATE,
};
use posecam_sdk::{
    CameraCollisionFn, CameraManager, CameraMatrixLoadFn, CameraSceneUpdateFn, CameraUpdateFn,
    GameCamera, Matrix4x4, ProjectionMatrixFn, SceneCamera, Vector3,
};

use super::handlers;
use super::host::{CameraLayout, CameraRecord, NativeMatrixLoader, RawGameCamera, RawSceneCamera};
use super::state::{published_snapshot, try_with_state};
use super::virtual_camera::CameraPose;
use super::CameraError;
use crate::config::HookToggles;
use crate::gamedata::SignatureResolver;
use crate::hooks::{FunctionHook, HookInstaller};

bitflags! {
    /// Hooks that are currently installed
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InstalledHooks: u8 {
        const UPDATE = 0x01;
        const COLLISION = 0x02;
        const PROJECTION = 0x04;
        const SCENE_UPDATE = 0x08;
    }
}

/// The four intercepted host routines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum HookTarget {
    Update = 0,
    Collision = 1,
    Projection = 2,
    SceneUpdate = 3,
}

impl HookTarget {
    pub const ALL: [HookTarget; 4] = [
        HookTarget::Update,
        HookTarget::Collision,
        HookTarget::Projection,
        HookTarget::SceneUpdate,
    ];

    /// Gamedata signature key, also used as the hook name
    pub fn name(self) -> &'static str {
        match self {
            HookTarget::Update => CAMERA_UPDATE,
            HookTarget::Collision => CAMERA_COLLISION,
            HookTarget::Projection => CAMERA_PROJECTION,
            HookTarget::SceneUpdate => CAMERA_SCENE_UPDATE,
        }
    }

    pub fn flag(self) -> InstalledHooks {
        match self {
            HookTarget::Update => InstalledHooks::UPDATE,
            HookTarget::Collision => InstalledHooks::COLLISION,
            HookTarget::Projection => InstalledHooks::PROJECTION,
            HookTarget::SceneUpdate => InstalledHooks::SCENE_UPDATE,
        }
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    fn enabled_in(self, toggles: &HookToggles) -> bool {
        match self {
            HookTarget::Update => toggles.update,
            HookTarget::Collision => toggles.collision,
            HookTarget::Projection => toggles.projection,
            HookTarget::SceneUpdate => toggles.scene_update,
        }
    }

    fn detour(self) -> *const () {
        match self {
            HookTarget::Update => camera_update_detour as *const (),
            HookTarget::Collision => camera_collision_detour as *const (),
            HookTarget::Projection => projection_detour as *const (),
            HookTarget::SceneUpdate => scene_update_detour as *const (),
        }
    }
}

/// Host addresses and layout the detours need
#[derive(Debug, Clone, Copy)]
struct HostBindings {
    layout: CameraLayout,
    matrix_load: Option<CameraMatrixLoadFn>,
    camera_manager: Option<NonNull<CameraManager>>,
}

// SAFETY: Plain host addresses, published once per install
unsafe impl Send for HostBindings {}
unsafe impl Sync for HostBindings {}

/// Trampolines to the original routines, indexed by `HookTarget`
static ORIGINALS: [AtomicUsize; 4] = [const { AtomicUsize::new(0) }; 4];

/// Present while a service is installed
static BINDINGS: RwLock<Option<HostBindings>> = RwLock::new(None);

/// Service backing the C ABI
static SERVICE: Mutex<Option<CameraService>> = Mutex::new(None);

fn original_address(target: HookTarget) -> usize {
    ORIGINALS[target as usize].load(Ordering::Acquire)
}

fn host_bindings() -> Option<HostBindings> {
    *BINDINGS.try_read()?
}


/// Run a detour body at the host boundary
///
/// `original` is what the body receives to call the host routine. If the
/// body panics, the panic stops here and the host gets the original result:
/// the one already produced, or a fresh call if the body never made one.
fn intercept<A, R>(
    target: HookTarget,
    arg: A,
    original: impl Fn(A) -> R,
    body: impl FnOnce(&dyn Fn(A) -> R) -> R,
) -> R
where
    A: Copy,
    R: Copy,
{
    let produced = Cell::new(None);
    let call = |arg: A| {
        let result = original(arg);
        produced.set(Some(result));
        result
    };

    match panic::catch_unwind(AssertUnwindSafe(|| body(&call))) {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Panic in {} detour; passing through", target.name());
            produced.get().unwrap_or_else(|| original(arg))
        }
    }
}

unsafe extern "C" fn camera_update_detour(camera: *mut GameCamera) -> isize {
    let address = original_address(HookTarget::Update);
    if address == 0 {
        return 0;
    }
    let original: CameraUpdateFn = std::mem::transmute(address);

    intercept(HookTarget::Update, (), |()| original(camera), |call| {
        let Some(bindings) = host_bindings() else {
            return call(());
        };

        let mut snapshot = published_snapshot();
        let gposing = snapshot.gposing;
        let mut record = RawGameCamera::new(camera, &bindings.layout);
        let result = handlers::camera_update(&snapshot.frame(), record.as_mut(), || call(()));

        if let (true, Some(record)) = (gposing, &record) {
            let pose = CameraPose {
                position: record.position(),
                look_at: record.look_at(),
            };
            // Only seeds free-fly; skipped when a tool thread holds the state
            try_with_state(|state| state.observe_host_pose(pose));
        }
        result
    })
}

unsafe extern "C" fn camera_collision_detour(
    camera: *mut GameCamera,
    a2: *mut Vector3,
    a3: *mut Vector3,
    a4: f32,
    a5: isize,
    a6: f32,
) -> isize {
    let address = original_address(HookTarget::Collision);
    if address == 0 {
        return 0;
    }
    let original: CameraCollisionFn = std::mem::transmute(address);

    intercept(
        HookTarget::Collision,
        (),
        |()| original(camera, a2, a3, a4, a5, a6),
        |call| {
            let Some(bindings) = host_bindings() else {
                return call(());
            };

            let mut snapshot = published_snapshot();
            let mut record = RawGameCamera::new(camera, &bindings.layout);
            handlers::camera_collision(&snapshot.frame(), record.as_mut(), || call(()))
        },
    )
}

unsafe extern "C" fn projection_detour(
    this: *mut std::ffi::c_void,
    fov: f32,
    aspect: f32,
    near_plane: f32,
    far_plane: f32,
    a6: f32,
    a7: f32,
) -> *mut Matrix4x4 {
    let address = original_address(HookTarget::Projection);
    if address == 0 {
        return std::ptr::null_mut();
    }
    let original: ProjectionMatrixFn = std::mem::transmute(address);

    intercept(
        HookTarget::Projection,
        fov,
        |fov| original(this, fov, aspect, near_plane, far_plane, a6, a7),
        |call| {
            let mut snapshot = published_snapshot();
            handlers::projection(&snapshot.frame(), fov, call)
        },
    )
}

unsafe extern "C" fn scene_update_detour(scene: *mut SceneCamera) -> isize {
    let address = original_address(HookTarget::SceneUpdate);
    if address == 0 {
        return 0;
    }
    let original: CameraSceneUpdateFn = std::mem::transmute(address);

    intercept(HookTarget::SceneUpdate, (), |()| original(scene), |call| {
        let Some(bindings) = host_bindings() else {
            return call(());
        };
        let Some(load) = bindings.matrix_load else {
            return call(());
        };

        let mut snapshot = published_snapshot();
        let mut record = RawSceneCamera::new(scene, &bindings.layout);
        let mut sink = NativeMatrixLoader::new(load, bindings.camera_manager, &bindings.layout);
        handlers::scene_update(&mut snapshot.frame(), record.as_mut(), &mut sink, || call(()))
    })
}

/// Installed camera hooks
///
/// Dropping the service disposes every hook.
pub struct CameraService {
    hooks: Vec<(HookTarget, Box<dyn FunctionHook>)>,
    disposed: bool,
}

impl CameraService {
    /// Resolve and detour the camera routines
    ///
    /// Fails only if another service is live. Individual routines that
    /// cannot be resolved or hooked are logged and left out of
    /// [`installed`](Self::installed).
    pub fn install(
        resolver: &dyn SignatureResolver,
        installer: &dyn HookInstaller,
        layout: CameraLayout,
        toggles: &HookToggles,
    ) -> Result<Self, CameraError> {
        let mut bindings = BINDINGS.write();
        if bindings.is_some() {
            return Err(CameraError::AlreadyInstalled);
        }

        let matrix_load = match resolver.resolve(CAMERA_MATRIX_LOAD) {
            // SAFETY: The signature names the host's matrix load routine
            Ok(address) => Some(unsafe {
                std::mem::transmute::<*const u8, CameraMatrixLoadFn>(address)
            }),
            Err(e) => {
                tracing::warn!("Render matrix load unavailable: {}", e);
                None
            }
        };

        let camera_manager = match resolver.resolve(CAMERA_MANAGER) {
            Ok(address) => NonNull::new(address as *mut CameraManager),
            Err(e) => {
                tracing::warn!("Camera manager unavailable: {}", e);
                None
            }
        };

        *bindings = Some(HostBindings {
            layout,
            matrix_load,
            camera_manager,
        });
        drop(bindings);

        let mut service = Self {
            hooks: Vec::with_capacity(HookTarget::ALL.len()),
            disposed: false,
        };

        for target in HookTarget::ALL {
            if !target.enabled_in(toggles) {
                tracing::info!("Hook '{}' disabled by config", target.name());
                continue;
            }
            if target == HookTarget::SceneUpdate && matrix_load.is_none() {
                tracing::warn!(
                    "Hook '{}' skipped: scene override needs the render matrix load",
                    target.name()
                );
                continue;
            }

            // SAFETY: The resolver hands out entries of the named routines
            if let Err(e) = unsafe { service.install_one(resolver, installer, target) } {
                tracing::error!("Failed to install hook '{}': {}", target.name(), e);
            }
        }

        tracing::info!("Camera service installed: {:?}", service.installed());
        Ok(service)
    }

    unsafe fn install_one(
        &mut self,
        resolver: &dyn SignatureResolver,
        installer: &dyn HookInstaller,
        target: HookTarget,
    ) -> Result<(), CameraError> {
        let address = resolver.resolve(target.name())?;
        let hook = installer.hook(target.name(), address as *const (), target.detour())?;

        // The detour must find its original before the patch goes live
        ORIGINALS[target as usize].store(hook.original() as usize, Ordering::Release);

        if let Err(e) = hook.enable() {
            if let Err(dispose_error) = hook.dispose() {
                tracing::error!(
                    "Failed to dispose '{}' after enable failure: {}",
                    target.name(),
                    dispose_error
                );
            } else {
                ORIGINALS[target as usize].store(0, Ordering::Release);
            }
            return Err(e.into());
        }

        self.hooks.push((target, hook));
        Ok(())
    }

    pub fn installed(&self) -> InstalledHooks {
        self.hooks
            .iter()
            .fold(InstalledHooks::empty(), |flags, (target, _)| flags | target.flag())
    }

    fn hook(&self, target: HookTarget) -> Result<&dyn FunctionHook, CameraError> {
        self.hooks
            .iter()
            .find(|(installed, _)| *installed == target)
            .map(|(_, hook)| hook.as_ref())
            .ok_or(CameraError::HookNotInstalled(target))
    }

    pub fn enable(&self, target: HookTarget) -> Result<(), CameraError> {
        Ok(self.hook(target)?.enable()?)
    }

    pub fn disable(&self, target: HookTarget) -> Result<(), CameraError> {
        Ok(self.hook(target)?.disable()?)
    }

    pub fn is_enabled(&self, target: HookTarget) -> bool {
        self.hook(target).is_ok_and(|hook| hook.is_enabled())
    }

    /// Remove every hook and unpublish the host bindings
    ///
    /// Safe to call more than once and after a partial install.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        for (target, hook) in self.hooks.drain(..) {
            match hook.dispose() {
                Ok(()) => ORIGINALS[target as usize].store(0, Ordering::Release),
                // Still patched: keep the original reachable
                Err(e) => tracing::error!("Failed to dispose hook '{}': {}", target.name(), e),
            }
        }

        *BINDINGS.write() = None;
        tracing::info!("Camera service disposed");
    }
}

impl Drop for CameraService {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ============================================================================
// Service slot
// ============================================================================

/// Install the camera service into the process-wide slot
pub fn install_service(
    resolver: &dyn SignatureResolver,
    installer: &dyn HookInstaller,
    layout: CameraLayout,
    toggles: &HookToggles,
) -> Result<InstalledHooks, CameraError> {
    let mut slot = SERVICE.lock();
    if slot.is_some() {
        return Err(CameraError::AlreadyInstalled);
    }

    let service = CameraService::install(resolver, installer, layout, toggles)?;
    let installed = service.installed();
    *slot = Some(service);
    Ok(installed)
}

/// Dispose the installed service
///
/// Returns `true` if a service was installed.
pub fn uninstall_service() -> bool {
    match SERVICE.lock().take() {
        Some(mut service) => {
            service.dispose();
            true
        }
        None => false,
    }
}

/// Hooks installed by the live service
pub fn installed_hooks() -> InstalledHooks {
    SERVICE
        .lock()
        .as_ref()
        .map(CameraService::installed)
        .unwrap_or_default()
}

/// Enable or disable one hook of the live service
pub fn set_hook_enabled(target: HookTarget, enabled: bool) -> Result<(), CameraError> {
    let slot = SERVICE.lock();
    let service = slot.as_ref().ok_or(CameraError::ServiceNotInstalled)?;
    if enabled {
        service.enable(target)
    } else {
        service.disable(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::state::{update_camera, with_state};
    use crate::camera::TEST_STATE_LOCK;
    use crate::gamedata::GamedataError;
    use crate::hooks::HookError;
    use glam::Vec3;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::AtomicBool;
    use std::sync::{mpsc, Arc};
    use std::thread;

    const LAYOUT: CameraLayout = CameraLayout {
        game_scene: 0x10,
        max_distance: 0x100,
        collide: 0x108,
        position: 0x20,
        look_at: 0x30,
        view_matrix: 0x40,
        render_camera: 0x90,
        manager_active_index: 0x8,
        manager_cameras: 0x10,
    };

    struct FakeResolver {
        addresses: HashMap<&'static str, usize>,
    }

    impl FakeResolver {
        fn complete() -> Self {
            let addresses = posecam_sdk::ALL_SIGNATURES
                .iter()
                .enumerate()
                .map(|(i, name)| (*name, 0x10_0000 + i * 0x100))
                .collect();
            Self { addresses }
        }

        fn without(mut self, name: &str) -> Self {
            self.addresses.remove(name);
            self
        }
    }

    impl SignatureResolver for FakeResolver {
        fn resolve(&self, name: &str) -> Result<*const u8, GamedataError> {
            self.addresses
                .get(name)
                .map(|address| *address as *const u8)
                .ok_or_else(|| GamedataError::ScanFailed(name.to_string()))
        }

        fn offset(&self, name: &str) -> Result<i64, GamedataError> {
            Err(GamedataError::OffsetNotFound(name.to_string()))
        }
    }

    struct FakeHook {
        name: String,
        original: usize,
        enabled: Arc<AtomicBool>,
        disposed: Arc<AtomicUsize>,
    }

    impl FunctionHook for FakeHook {
        fn name(&self) -> &str {
            &self.name
        }

        fn original(&self) -> *const () {
            self.original as *const ()
        }

        fn enable(&self) -> Result<(), HookError> {
            self.enabled.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn disable(&self) -> Result<(), HookError> {
            self.enabled.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }

        fn dispose(self: Box<Self>) -> Result<(), HookError> {
            self.disposed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeInstaller {
        failing: HashSet<&'static str>,
        requested: Mutex<Vec<String>>,
        enabled: Arc<AtomicBool>,
        disposed: Arc<AtomicUsize>,
    }

    impl HookInstaller for FakeInstaller {
        unsafe fn hook(
            &self,
            name: &str,
            target: *const (),
            _detour: *const (),
        ) -> Result<Box<dyn FunctionHook>, HookError> {
            self.requested.lock().push(name.to_string());
            if self.failing.contains(name) {
                return Err(HookError::DetourCreation(name.to_string()));
            }
            Ok(Box::new(FakeHook {
                name: name.to_string(),
                original: target as usize + 1,
                enabled: self.enabled.clone(),
                disposed: self.disposed.clone(),
            }))
        }
    }

    #[test]
    fn test_install_and_dispose() {
        let _guard = TEST_STATE_LOCK.lock();
        let installer = FakeInstaller::default();
        let mut service = CameraService::install(
            &FakeResolver::complete(),
            &installer,
            LAYOUT,
            &HookToggles::default(),
        )
        .unwrap();

        assert_eq!(service.installed(), InstalledHooks::all());
        assert!(service.is_enabled(HookTarget::Update));
        assert_ne!(original_address(HookTarget::SceneUpdate), 0);
        assert!(host_bindings().is_some());

        service.dispose();
        assert_eq!(service.installed(), InstalledHooks::empty());
        assert_eq!(installer.disposed.load(Ordering::SeqCst), 4);
        assert!(HookTarget::ALL.iter().all(|t| original_address(*t) == 0));
        assert!(host_bindings().is_none());

        service.dispose();
        drop(service);
        assert_eq!(installer.disposed.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_partial_install() {
        let _guard = TEST_STATE_LOCK.lock();
        let installer = FakeInstaller {
            failing: HashSet::from([CAMERA_PROJECTION]),
            ..Default::default()
        };
        let resolver = FakeResolver::complete().without(CAMERA_COLLISION);
        let service =
            CameraService::install(&resolver, &installer, LAYOUT, &HookToggles::default())
                .unwrap();

        assert_eq!(
            service.installed(),
            InstalledHooks::UPDATE | InstalledHooks::SCENE_UPDATE
        );
        assert_eq!(original_address(HookTarget::Collision), 0);
        assert!(matches!(
            service.enable(HookTarget::Projection),
            Err(CameraError::HookNotInstalled(HookTarget::Projection))
        ));

        drop(service);
        assert_eq!(installer.disposed.load(Ordering::SeqCst), 2);
        assert!(host_bindings().is_none());
    }

    #[test]
    fn test_scene_hook_needs_matrix_load() {
        let _guard = TEST_STATE_LOCK.lock();
        let installer = FakeInstaller::default();
        let resolver = FakeResolver::complete().without(CAMERA_MATRIX_LOAD);
        let service =
            CameraService::install(&resolver, &installer, LAYOUT, &HookToggles::default())
                .unwrap();

        assert!(!service.installed().contains(InstalledHooks::SCENE_UPDATE));
        assert_eq!(service.installed().bits().count_ones(), 3);
        assert!(!installer
            .requested
            .lock()
            .iter()
            .any(|name| name == CAMERA_SCENE_UPDATE));
    }

    #[test]
    fn test_toggles_skip_hooks() {
        let _guard = TEST_STATE_LOCK.lock();
        let toggles = HookToggles {
            update: false,
            projection: false,
            ..HookToggles::default()
        };
        let service = CameraService::install(
            &FakeResolver::complete(),
            &FakeInstaller::default(),
            LAYOUT,
            &toggles,
        )
        .unwrap();

        assert_eq!(
            service.installed(),
            InstalledHooks::COLLISION | InstalledHooks::SCENE_UPDATE
        );
    }

    #[test]
    fn test_single_live_service() {
        let _guard = TEST_STATE_LOCK.lock();
        let resolver = FakeResolver::complete();
        let installer = FakeInstaller::default();
        let toggles = HookToggles::default();

        let first = CameraService::install(&resolver, &installer, LAYOUT, &toggles).unwrap();
        assert!(matches!(
            CameraService::install(&resolver, &installer, LAYOUT, &toggles),
            Err(CameraError::AlreadyInstalled)
        ));
        drop(first);

        let second = CameraService::install(&resolver, &installer, LAYOUT, &toggles);
        assert!(second.is_ok());
    }

    #[test]
    fn test_enable_disable() {
        let _guard = TEST_STATE_LOCK.lock();
        let installer = FakeInstaller::default();
        let service = CameraService::install(
            &FakeResolver::complete(),
            &installer,
            LAYOUT,
            &HookToggles::default(),
        )
        .unwrap();

        service.disable(HookTarget::Collision).unwrap();
        assert!(!service.is_enabled(HookTarget::Collision));
        service.enable(HookTarget::Collision).unwrap();
        assert!(service.is_enabled(HookTarget::Collision));
    }

    #[test]
    fn test_service_slot() {
        let _guard = TEST_STATE_LOCK.lock();
        let resolver = FakeResolver::complete();
        let installer = FakeInstaller::default();
        let toggles = HookToggles::default();

        assert!(matches!(
            set_hook_enabled(HookTarget::Update, false),
            Err(CameraError::ServiceNotInstalled)
        ));

        let installed = install_service(&resolver, &installer, LAYOUT, &toggles).unwrap();
        assert_eq!(installed, InstalledHooks::all());
        assert_eq!(installed_hooks(), InstalledHooks::all());
        assert!(install_service(&resolver, &installer, LAYOUT, &toggles).is_err());

        set_hook_enabled(HookTarget::Update, false).unwrap();
        assert!(!installer.enabled.load(Ordering::SeqCst));

        assert!(uninstall_service());
        assert!(!uninstall_service());
        assert_eq!(installed_hooks(), InstalledHooks::empty());
    }

    #[test]
    fn test_hook_target_index() {
        assert_eq!(HookTarget::from_index(0), Some(HookTarget::Update));
        assert_eq!(HookTarget::from_index(3), Some(HookTarget::SceneUpdate));
        assert_eq!(HookTarget::from_index(4), None);
        assert_eq!(HookTarget::Projection.name(), "CameraProjection");
    }

    #[test]
    fn test_intercept_passes_body_result() {
        let calls = Cell::new(0);
        let result = intercept(
            HookTarget::Update,
            (),
            |()| {
                calls.set(calls.get() + 1);
                1
            },
            |call| call(()) + 1,
        );
        assert_eq!(result, 2);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_intercept_panic_before_original() {
        let calls = Cell::new(0);
        let result = intercept(
            HookTarget::Projection,
            0.5f32,
            |fov| {
                calls.set(calls.get() + 1);
                fov
            },
            |_| panic!("body failed"),
        );
        assert_eq!(result, 0.5);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_intercept_panic_after_original() {
        let calls = Cell::new(0);
        let result = intercept(
            HookTarget::SceneUpdate,
            (),
            |()| {
                calls.set(calls.get() + 1);
                7isize
            },
            |call| {
                call(());
                panic!("body failed")
            },
        );
        assert_eq!(result, 7);
        assert_eq!(calls.get(), 1);
    }

    static HOST_UPDATES: AtomicUsize = AtomicUsize::new(0);
    static HOST_COLLISIONS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn host_update(_camera: *mut GameCamera) -> isize {
        HOST_UPDATES.fetch_add(1, Ordering::SeqCst);
        0x77
    }

    unsafe extern "C" fn host_collision(
        _camera: *mut GameCamera,
        _a2: *mut Vector3,
        _a3: *mut Vector3,
        _a4: f32,
        _a5: isize,
        _a6: f32,
    ) -> isize {
        HOST_COLLISIONS.fetch_add(1, Ordering::SeqCst);
        0x55
    }

    /// Resolver whose "routines" are the fake host functions above
    fn host_resolver() -> FakeResolver {
        FakeResolver::complete().without(CAMERA_MATRIX_LOAD)
    }

    /// Installer that hands back the target as the original
    struct PassInstaller;

    impl HookInstaller for PassInstaller {
        unsafe fn hook(
            &self,
            name: &str,
            target: *const (),
            _detour: *const (),
        ) -> Result<Box<dyn FunctionHook>, HookError> {
            Ok(Box::new(FakeHook {
                name: name.to_string(),
                original: target as usize,
                enabled: Arc::default(),
                disposed: Arc::default(),
            }))
        }
    }

    #[test]
    fn test_detours_end_to_end() {
        let _guard = TEST_STATE_LOCK.lock();
        let mut resolver = host_resolver();
        resolver.addresses.insert(CAMERA_UPDATE, host_update as usize);
        resolver.addresses.insert(CAMERA_COLLISION, host_collision as usize);
        let service =
            CameraService::install(&resolver, &PassInstaller, LAYOUT, &HookToggles::default())
                .unwrap();

        let mut memory = vec![0u8; 0x200];
        let camera = memory.as_mut_ptr();
        unsafe {
            camera.add(LAYOUT.max_distance).cast::<f32>().write_unaligned(18.0);
        }
        let read_position = || unsafe {
            camera
                .add(LAYOUT.game_scene + LAYOUT.position)
                .cast::<[f32; 3]>()
                .read_unaligned()
        };
        let collide = || unsafe { camera.add(LAYOUT.collide).cast::<[f32; 2]>().read_unaligned() };

        // Outside pose mode: pure pass-through
        with_state(|state| state.set_gposing(false));
        let updates = HOST_UPDATES.load(Ordering::SeqCst);
        assert_eq!(unsafe { camera_update_detour(camera.cast()) }, 0x77);
        assert_eq!(HOST_UPDATES.load(Ordering::SeqCst), updates + 1);
        assert_eq!(read_position(), [0.0; 3]);

        // Pose mode with an offset and collision disabled
        let id = with_state(|state| {
            state.set_gposing(true);
            state.cameras.container().and_then(|c| c.current_id())
        })
        .unwrap();
        update_camera(id, |camera| {
            camera.position_offset = Vec3::new(1.0, 2.0, 3.0);
            camera.disable_collision = true;
        })
        .unwrap();

        assert_eq!(unsafe { camera_update_detour(camera.cast()) }, 0x77);
        assert_eq!(HOST_UPDATES.load(Ordering::SeqCst), updates + 2);
        assert_eq!(read_position(), [1.0, 2.0, 3.0]);
        assert!(with_state(|state| state.last_pose()).is_some());

        let collisions = HOST_COLLISIONS.load(Ordering::SeqCst);
        let null = std::ptr::null_mut();
        let result = unsafe { camera_collision_detour(camera.cast(), null, null, 0.0, 0, 0.0) };
        assert_eq!(result, handlers::COLLISION_OVERRIDDEN);
        assert_eq!(HOST_COLLISIONS.load(Ordering::SeqCst), collisions);
        assert_eq!(collide(), [18.0, 18.0]);

        // A tool thread holding the state does not cost the frame its overrides
        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = thread::spawn(move || {
            with_state(|_| {
                held_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
        });
        held_rx.recv().unwrap();

        unsafe {
            camera
                .add(LAYOUT.game_scene + LAYOUT.position)
                .cast::<[f32; 3]>()
                .write_unaligned([0.0; 3]);
        }
        assert_eq!(unsafe { camera_update_detour(camera.cast()) }, 0x77);
        assert_eq!(read_position(), [1.0, 2.0, 3.0]);

        let result = unsafe { camera_collision_detour(camera.cast(), null, null, 0.0, 0, 0.0) };
        assert_eq!(result, handlers::COLLISION_OVERRIDDEN);
        assert_eq!(HOST_COLLISIONS.load(Ordering::SeqCst), collisions);

        release_tx.send(()).unwrap();
        holder.join().unwrap();

        with_state(|state| state.set_gposing(false));
        drop(service);
    }
}
