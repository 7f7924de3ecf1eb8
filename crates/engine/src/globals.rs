//! Global host state storage
//!
//! The host module is located once during load and stored here.
//! Access is thread-safe via OnceLock.

use std::sync::OnceLock;

use crate::error::HostError;
use crate::loader::ModuleRange;

/// Global host state
#[derive(Debug)]
pub struct HostGlobals {
    /// Executable code range of the host's main module
    pub module: ModuleRange,
}

/// Global host state storage
static HOST: OnceLock<HostGlobals> = OnceLock::new();

/// Initialize host globals
///
/// Called once during load. Returns error if already initialized.
pub fn init_host(globals: HostGlobals) -> Result<(), HostError> {
    HOST.set(globals).map_err(|_| HostError::AlreadyInitialized)
}

/// Get host globals
///
/// # Panics
/// Panics if called before `init_host`
pub fn host() -> &'static HostGlobals {
    HOST.get().expect("Host not initialized")
}

/// Try to get host globals without panicking
pub fn try_host() -> Option<&'static HostGlobals> {
    HOST.get()
}

/// Check if host globals are initialized
pub fn is_host_initialized() -> bool {
    HOST.get().is_some()
}

impl HostGlobals {
    pub fn new(module: ModuleRange) -> Self {
        Self { module }
    }
}
