//! Hook handle and installer abstractions
//!
//! Callers hold hooks through [`FunctionHook`] handles obtained from a
//! [`HookInstaller`], so the code that decides what to hook never touches the
//! patching backend directly and can be exercised with fakes.

use super::inline::{self, HookError, InlineHookKey};

/// An installed detour
pub trait FunctionHook: Send + Sync {
    /// Debug name given at install time
    fn name(&self) -> &str;

    /// Pointer that calls the original, unhooked routine
    fn original(&self) -> *const ();

    /// Re-apply the detour
    fn enable(&self) -> Result<(), HookError>;

    /// Restore the original routine, keeping the hook installed
    fn disable(&self) -> Result<(), HookError>;

    /// Check if the detour is currently applied
    fn is_enabled(&self) -> bool;

    /// Remove the detour for good
    fn dispose(self: Box<Self>) -> Result<(), HookError>;
}

/// Installs detours
pub trait HookInstaller {
    /// Prepare a detour from `target` to `detour`. The returned hook is
    /// disabled until [`FunctionHook::enable`] is called.
    ///
    /// # Safety
    /// `target` must be a function entry and `detour` a function with a
    /// compatible signature.
    unsafe fn hook(
        &self,
        name: &str,
        target: *const (),
        detour: *const (),
    ) -> Result<Box<dyn FunctionHook>, HookError>;
}

/// Inline hook handle backed by the global inline hook registry
#[derive(Debug)]
pub struct InlineHook {
    name: String,
    key: InlineHookKey,
    original: *const (),
}

// SAFETY: The handle only carries a registry key and a code address
unsafe impl Send for InlineHook {}
unsafe impl Sync for InlineHook {}

impl InlineHook {
    /// Registry key of this hook
    pub fn key(&self) -> InlineHookKey {
        self.key
    }
}

impl FunctionHook for InlineHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn original(&self) -> *const () {
        self.original
    }

    fn enable(&self) -> Result<(), HookError> {
        inline::enable_inline_hook(self.key)
    }

    fn disable(&self) -> Result<(), HookError> {
        inline::disable_inline_hook(self.key)
    }

    fn is_enabled(&self) -> bool {
        inline::is_inline_hook_enabled(self.key)
    }

    fn dispose(self: Box<Self>) -> Result<(), HookError> {
        inline::remove_inline_hook(self.key)
    }
}

/// Central hook manager
pub struct HookManager;

impl HookManager {
    /// Create an inline (detour) hook for a function
    ///
    /// # Safety
    /// Target must be a valid function pointer with matching signature
    ///
    /// # Example
    /// ```ignore
    /// unsafe extern "C" fn my_update(camera: *mut GameCamera) -> isize {
    ///     // Call original via trampoline
    ///     let original: CameraUpdateFn = std::mem::transmute(ORIGINAL.load(Ordering::Acquire));
    ///     original(camera)
    /// }
    ///
    /// let hook = unsafe {
    ///     HookManager::create_inline("CameraUpdate", update_addr, my_update as *const ())?
    /// };
    /// ORIGINAL.store(hook.original() as usize, Ordering::Release);
    /// hook.enable()?;
    /// ```
    pub unsafe fn create_inline(
        name: &str,
        target: *const (),
        detour: *const (),
    ) -> Result<InlineHook, HookError> {
        let (key, original) = inline::create_inline_hook(name, target, detour)?;
        Ok(InlineHook {
            name: name.to_string(),
            key,
            original,
        })
    }
}

impl HookInstaller for HookManager {
    unsafe fn hook(
        &self,
        name: &str,
        target: *const (),
        detour: *const (),
    ) -> Result<Box<dyn FunctionHook>, HookError> {
        Ok(Box::new(Self::create_inline(name, target, detour)?))
    }
}

/// Create an inline hook
///
/// # Safety
/// Target must be a valid function pointer with matching signature
pub unsafe fn hook(
    name: &str,
    target: *const (),
    detour: *const (),
) -> Result<InlineHook, HookError> {
    HookManager::create_inline(name, target, detour)
}
