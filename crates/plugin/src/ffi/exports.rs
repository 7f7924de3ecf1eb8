//! C-compatible exports called by the host-side tool
//!
//! Every export catches panics and reports failure through its return value;
//! nothing unwinds into the caller.

use std::ffi::{c_char, CStr};
use std::path::PathBuf;
use std::panic::{self, AssertUnwindSafe};

use tracing::instrument;
use tracing_subscriber::EnvFilter;

use posecam_core::camera::{self, CameraPath};
use posecam_core::config::posecam_base_dir;
use posecam_core::{CameraError, CameraId, CoreConfig, FreeCamInput, HookTarget, LoadError};

// Plugin metadata - static strings with null terminators for C compatibility
static AUTHOR: &[u8] = b"posecam contributors\0";
static NAME: &[u8] = b"posecam\0";
static DESCRIPTION: &[u8] = b"Pose mode camera interception\0";
static URL: &[u8] = b"https://github.com/posecam/posecam\0";
static LICENSE: &[u8] = b"MIT\0";
static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();

/// One frame of free camera input
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PosecamFreeCamInput {
    /// Strafe right (+) / left (-)
    pub move_x: f32,
    /// Rise (+) / sink (-)
    pub move_y: f32,
    /// Forward (+) / back (-)
    pub move_z: f32,
    /// Yaw delta
    pub look_x: f32,
    /// Pitch delta
    pub look_y: f32,
    /// Roll delta
    pub roll: f32,
    pub boost: bool,
}

impl From<PosecamFreeCamInput> for FreeCamInput {
    fn from(input: PosecamFreeCamInput) -> Self {
        Self {
            movement: [input.move_x, input.move_y, input.move_z].into(),
            look: [input.look_x, input.look_y].into(),
            roll: input.roll,
            boost: input.boost,
        }
    }
}

/// Run an export body, turning a panic into `fallback`
fn guard<R>(name: &str, fallback: R, body: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Panic in {}", name);
            fallback
        }
    }
}

/// Log a failed camera operation and flatten it to a flag
fn report<T>(name: &str, result: Result<T, CameraError>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("{} failed: {}", name, e);
            false
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn camera_id(id: u64) -> CameraId {
    CameraId::from_ffi(id)
}

/// Load the extension and install the camera hooks
///
/// # Safety
/// - `base_dir` must be a valid null-terminated C string, or null to use the
///   default location
/// - `error` must be a valid pointer to a buffer of at least `maxlen` bytes, or null
#[no_mangle]
#[instrument(skip_all)]
pub unsafe extern "C" fn posecam_load(
    base_dir: *const c_char,
    error: *mut c_char,
    maxlen: usize,
) -> bool {
    let base_dir = (!base_dir.is_null())
        .then(|| PathBuf::from(CStr::from_ptr(base_dir).to_string_lossy().into_owned()));

    let loaded = panic::catch_unwind(move || -> Result<_, LoadError> {
        let base = posecam_base_dir(base_dir.as_deref());
        let config = match &base {
            Ok(base) => CoreConfig::load(base),
            Err(_) => Ok(CoreConfig::default()),
        };
        init_logging(config.as_ref().is_ok_and(|c| c.debug));
        tracing::info!("posecam loading...");

        let base = base?;
        let config = config.unwrap_or_else(|e| {
            tracing::warn!("Using default config: {}", e);
            CoreConfig::default()
        });

        posecam_core::load(&config, &base)
    });

    match loaded {
        Ok(Ok(installed)) => {
            tracing::info!("posecam loaded, hooks: {:?}", installed);
            true
        }
        Ok(Err(e)) => {
            tracing::error!("Failed to load: {}", e);
            write_error(error, maxlen, &e.to_string());
            false
        }
        Err(_) => {
            write_error(error, maxlen, "Panic during load");
            false
        }
    }
}

/// Restore the host camera routines and drop all camera state
///
/// # Safety
/// - `error` must be a valid pointer to a buffer of at least `maxlen` bytes, or null
#[no_mangle]
#[instrument(skip_all)]
pub unsafe extern "C" fn posecam_unload(error: *mut c_char, maxlen: usize) -> bool {
    tracing::info!("posecam unloading...");

    match panic::catch_unwind(crate::shutdown) {
        Ok(()) => true,
        Err(_) => {
            write_error(error, maxlen, "Panic during shutdown");
            false
        }
    }
}

// === Pose mode ===

/// Called by the tool when the host enters or leaves pose mode
#[no_mangle]
pub extern "C" fn posecam_set_gposing(gposing: bool) {
    guard("posecam_set_gposing", (), || {
        camera::set_gposing(gposing);
    })
}

#[no_mangle]
pub extern "C" fn posecam_is_gposing() -> bool {
    guard("posecam_is_gposing", false, camera::is_gposing)
}

// === Cameras ===

/// Add a camera to the pose container
///
/// Returns the camera id, or 0 outside pose mode.
#[no_mangle]
pub extern "C" fn posecam_spawn_camera(free: bool) -> u64 {
    guard("posecam_spawn_camera", 0, || match camera::spawn_camera(free) {
        Ok(id) => id.to_ffi(),
        Err(e) => {
            tracing::warn!("posecam_spawn_camera failed: {}", e);
            0
        }
    })
}

#[no_mangle]
pub extern "C" fn posecam_destroy_camera(id: u64) -> bool {
    guard("posecam_destroy_camera", false, || {
        report("posecam_destroy_camera", camera::destroy_camera(camera_id(id)))
    })
}

/// Make a camera the authoritative one
#[no_mangle]
pub extern "C" fn posecam_select_camera(id: u64) -> bool {
    guard("posecam_select_camera", false, || {
        report("posecam_select_camera", camera::select_camera(camera_id(id)))
    })
}

/// Gate container overrides
#[no_mangle]
pub extern "C" fn posecam_set_allowed(allowed: bool) -> bool {
    guard("posecam_set_allowed", false, || camera::set_allowed(allowed))
}

#[no_mangle]
pub extern "C" fn posecam_set_position_offset(id: u64, x: f32, y: f32, z: f32) -> bool {
    guard("posecam_set_position_offset", false, || {
        report(
            "posecam_set_position_offset",
            camera::update_camera(camera_id(id), |cam| {
                cam.position_offset = [x, y, z].into();
            }),
        )
    })
}

/// Set a camera's FOV override, in radians
#[no_mangle]
pub extern "C" fn posecam_set_fov(id: u64, fov: f32) -> bool {
    if !fov.is_finite() || fov <= 0.0 {
        return false;
    }
    guard("posecam_set_fov", false, || {
        report(
            "posecam_set_fov",
            camera::update_camera(camera_id(id), |cam| cam.fov = fov),
        )
    })
}

#[no_mangle]
pub extern "C" fn posecam_set_collision_disabled(id: u64, disabled: bool) -> bool {
    guard("posecam_set_collision_disabled", false, || {
        report(
            "posecam_set_collision_disabled",
            camera::update_camera(camera_id(id), |cam| cam.disable_collision = disabled),
        )
    })
}

/// Switch a camera in or out of free-fly
#[no_mangle]
pub extern "C" fn posecam_set_free_camera(id: u64, enabled: bool) -> bool {
    guard("posecam_set_free_camera", false, || {
        report(
            "posecam_set_free_camera",
            camera::set_free_camera(camera_id(id), enabled),
        )
    })
}

/// Feed one frame of input to a free-flying camera
///
/// # Safety
/// - `input` must point to a valid `PosecamFreeCamInput`, or be null
#[no_mangle]
pub unsafe extern "C" fn posecam_move_free_camera(
    id: u64,
    input: *const PosecamFreeCamInput,
    dt: f32,
) -> bool {
    if input.is_null() {
        return false;
    }
    let input = FreeCamInput::from(*input);

    guard("posecam_move_free_camera", false, || {
        match camera::move_free_camera(camera_id(id), &input, dt) {
            Ok(moved) => moved,
            Err(e) => {
                tracing::warn!("posecam_move_free_camera failed: {}", e);
                false
            }
        }
    })
}

// === Cutscene ===

/// Load a camera path from JSON
///
/// # Safety
/// - `json` must be a valid null-terminated C string, or null
#[no_mangle]
pub unsafe extern "C" fn posecam_cutscene_load(json: *const c_char) -> bool {
    if json.is_null() {
        return false;
    }
    let Ok(json) = CStr::from_ptr(json).to_str() else {
        tracing::warn!("posecam_cutscene_load: path is not UTF-8");
        return false;
    };

    guard("posecam_cutscene_load", false, || {
        let path = CameraPath::from_json(json);
        report("posecam_cutscene_load", path.map(camera::load_cutscene))
    })
}

#[no_mangle]
pub extern "C" fn posecam_cutscene_play() -> bool {
    guard("posecam_cutscene_play", false, || {
        report("posecam_cutscene_play", camera::play_cutscene())
    })
}

#[no_mangle]
pub extern "C" fn posecam_cutscene_stop() {
    guard("posecam_cutscene_stop", (), camera::stop_cutscene)
}

#[no_mangle]
pub extern "C" fn posecam_cutscene_set_fov_enabled(enabled: bool) {
    guard("posecam_cutscene_set_fov_enabled", (), || {
        camera::set_cutscene_fov_enabled(enabled)
    })
}

// === Hooks ===

/// Enable or disable one hook: 0 update, 1 collision, 2 projection,
/// 3 scene update
#[no_mangle]
pub extern "C" fn posecam_set_hook_enabled(hook: u32, enabled: bool) -> bool {
    let Some(target) = HookTarget::from_index(hook) else {
        return false;
    };
    guard("posecam_set_hook_enabled", false, || {
        report(
            "posecam_set_hook_enabled",
            camera::set_hook_enabled(target, enabled),
        )
    })
}

/// Installed hooks as a bit set in `posecam_set_hook_enabled` order
#[no_mangle]
pub extern "C" fn posecam_installed_hooks() -> u8 {
    guard("posecam_installed_hooks", 0, || {
        camera::installed_hooks().bits()
    })
}

// Metadata exports - these return static strings for the tool to display

#[no_mangle]
pub extern "C" fn posecam_get_author() -> *const c_char {
    AUTHOR.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn posecam_get_name() -> *const c_char {
    NAME.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn posecam_get_description() -> *const c_char {
    DESCRIPTION.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn posecam_get_url() -> *const c_char {
    URL.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn posecam_get_license() -> *const c_char {
    LICENSE.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn posecam_get_version() -> *const c_char {
    VERSION.as_ptr() as *const c_char
}

/// Helper to write an error message to a C buffer
///
/// # Safety
/// - `error` must be a valid pointer or null
/// - `maxlen` must accurately reflect the buffer size
unsafe fn write_error(error: *mut c_char, maxlen: usize, msg: &str) {
    if !error.is_null() && maxlen > 0 {
        let bytes = msg.as_bytes();
        let len = bytes.len().min(maxlen - 1);
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), error as *mut u8, len);
        *error.add(len) = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    static SERIAL: Mutex<()> = Mutex::new(());

    fn c_str(ptr: *const c_char) -> String {
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    #[test]
    fn test_metadata_strings() {
        assert_eq!(c_str(posecam_get_name()), "posecam");
        assert_eq!(c_str(posecam_get_version()), env!("CARGO_PKG_VERSION"));
        assert_eq!(c_str(posecam_get_license()), "MIT");
    }

    #[test]
    fn test_write_error_truncates() {
        let mut buffer = [0x7f as c_char; 8];
        unsafe { write_error(buffer.as_mut_ptr(), buffer.len(), "a long message") };
        assert_eq!(c_str(buffer.as_ptr()), "a long ");

        unsafe { write_error(std::ptr::null_mut(), 8, "ignored") };
    }

    #[test]
    fn test_load_uses_explicit_base_dir() {
        let _guard = SERIAL.lock();
        let dir = tempfile::tempdir().unwrap();
        let base = std::ffi::CString::new(dir.path().to_str().unwrap()).unwrap();
        let mut buffer = [0 as c_char; 256];

        // No gamedata under the base dir, so loading stops after the config
        let loaded = unsafe { posecam_load(base.as_ptr(), buffer.as_mut_ptr(), buffer.len()) };

        assert!(!loaded);
        assert!(!c_str(buffer.as_ptr()).is_empty());
        assert!(dir.path().join("configs/core.toml").exists());
        assert!(std::env::var_os("POSECAM_DIR").is_none());
    }

    #[test]
    fn test_camera_controls() {
        let _guard = SERIAL.lock();

        assert_eq!(posecam_spawn_camera(false), 0);

        posecam_set_gposing(true);
        assert!(posecam_is_gposing());

        let id = posecam_spawn_camera(false);
        assert_ne!(id, 0);
        assert!(posecam_select_camera(id));
        assert!(posecam_set_position_offset(id, 1.0, 0.0, 0.0));
        assert!(posecam_set_collision_disabled(id, true));
        assert!(posecam_set_fov(id, 1.0));
        assert!(!posecam_set_fov(id, f32::NAN));
        assert!(posecam_set_allowed(false));

        assert!(posecam_set_free_camera(id, true));
        let input = PosecamFreeCamInput {
            move_z: 1.0,
            ..Default::default()
        };
        assert!(unsafe { posecam_move_free_camera(id, &input, 0.1) });
        assert!(!unsafe { posecam_move_free_camera(id, std::ptr::null(), 0.1) });

        assert!(posecam_destroy_camera(id));
        assert!(!posecam_destroy_camera(id));
        assert!(!posecam_select_camera(id));

        posecam_set_gposing(false);
        assert!(!posecam_is_gposing());
        assert!(!posecam_set_allowed(true));
    }

    #[test]
    fn test_cutscene_controls() {
        let _guard = SERIAL.lock();

        assert!(!unsafe { posecam_cutscene_load(std::ptr::null()) });
        assert!(!unsafe { posecam_cutscene_load(c"{\"keyframes\": []}".as_ptr()) });

        let path = c"{\"keyframes\": [{\"time\": 0.0, \"position\": [0.0, 0.0, 0.0], \"fov\": 0.9}]}";
        assert!(unsafe { posecam_cutscene_load(path.as_ptr()) });
        assert!(posecam_cutscene_play());
        posecam_cutscene_set_fov_enabled(true);
        posecam_cutscene_stop();
    }

    #[test]
    fn test_hooks_without_service() {
        assert!(!posecam_set_hook_enabled(0, false));
        assert!(!posecam_set_hook_enabled(9, false));
        assert_eq!(posecam_installed_hooks(), 0);
    }
}
