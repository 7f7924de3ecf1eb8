//! Inline function hooks for x86-64
//!
//! The first whole instructions covering a `jmp rel32` are relocated into a
//! trampoline near the target (iced-x86 block encoder fixes RIP-relative
//! operands and branches), followed by a jump back. The target is patched to
//! jump to a relay stub that jumps absolutely to the detour.
//!
//! Patching is not synchronized with threads executing the prologue; install
//! hooks before the host calls the target or while it is idle.

use iced_x86::{
    BlockEncoder, BlockEncoderOptions, Code, Decoder, DecoderOptions, FlowControl, Instruction,
    InstructionBlock,
};
use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};
use std::sync::LazyLock;

use super::trampoline;

new_key_type! {
    /// Handle for an inline hook
    pub struct InlineHookKey;
}

/// Size of `jmp rel32`
const JMP_REL32_LEN: usize = 5;

/// Size of `jmp [rip+0]` followed by an absolute address
const ABS_JMP_LEN: usize = 14;

/// Bytes read from the target when planning the prologue
const PROLOGUE_WINDOW: usize = 32;

/// Space reserved for a relocated prologue plus the jump back
const TRAMPOLINE_CAPACITY: usize = 96;

/// Error type for hook operations
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Failed to create detour: {0}")]
    DetourCreation(String),

    #[error("Failed to enable hook: {0}")]
    EnableFailed(String),

    #[error("Failed to disable hook: {0}")]
    DisableFailed(String),

    #[error("Hook not found")]
    NotFound,

    #[error("Memory protection failed: {0}")]
    MemoryProtection(String),

    #[error("Invalid address: {0:x}")]
    InvalidAddress(usize),

    #[error("Instruction relocation failed: {0}")]
    RelocationFailed(String),
}

/// Internal storage for an inline hook
struct InlineHookEntry {
    /// Target function address
    target: usize,

    /// Bytes written over the prologue while enabled
    patch: Vec<u8>,

    /// Prologue bytes the patch replaces
    original_bytes: Vec<u8>,

    /// Trampoline (original function) pointer
    trampoline: *const (),

    /// Whether the patch is currently applied
    enabled: bool,

    /// Description for debugging
    name: String,
}

// SAFETY: Hook entries are protected by RwLock; raw addresses are plain data
unsafe impl Send for InlineHookEntry {}
unsafe impl Sync for InlineHookEntry {}

impl Drop for InlineHookEntry {
    fn drop(&mut self) {
        // Trampoline and relay blocks are never freed: a thread may still be
        // executing one.
        if self.enabled {
            if let Err(e) = unsafe { write_code(self.target, &self.original_bytes) } {
                tracing::error!("Failed to restore '{}' on drop: {}", self.name, e);
            }
        }
    }
}

/// Global inline hook registry
static INLINE_HOOKS: LazyLock<RwLock<SlotMap<InlineHookKey, InlineHookEntry>>> =
    LazyLock::new(|| RwLock::new(SlotMap::with_key()));

/// Decode the whole instructions that a `jmp rel32` at `ip` would overwrite
pub fn plan_prologue(code: &[u8], ip: u64) -> Result<Vec<Instruction>, HookError> {
    let mut decoder = Decoder::with_ip(64, code, ip, DecoderOptions::NONE);
    let mut instructions = Vec::new();
    let mut covered = 0;

    while covered < JMP_REL32_LEN {
        if !decoder.can_decode() {
            return Err(HookError::RelocationFailed(format!(
                "prologue at {:x} truncated",
                ip
            )));
        }

        let instruction = decoder.decode();
        if instruction.is_invalid() {
            return Err(HookError::RelocationFailed(format!(
                "invalid instruction at {:x}",
                instruction.ip()
            )));
        }

        covered += instruction.len();
        let terminal = matches!(
            instruction.flow_control(),
            FlowControl::Return
                | FlowControl::Interrupt
                | FlowControl::UnconditionalBranch
                | FlowControl::IndirectBranch
        );
        instructions.push(instruction);

        if terminal && covered < JMP_REL32_LEN {
            return Err(HookError::RelocationFailed(format!(
                "function at {:x} too short to patch",
                ip
            )));
        }
    }

    Ok(instructions)
}

/// Bytes that may be read for prologue decoding at `target` without running
/// past `end`
pub fn prologue_window_len(target: usize, end: usize) -> usize {
    end.saturating_sub(target).min(PROLOGUE_WINDOW)
}

/// End of the readable memory that starts at `target`
///
/// Bounded by the mapped region and, for targets inside the host module, by
/// the end of its code range.
fn readable_end(target: usize) -> Result<usize, HookError> {
    let region =
        region::query(target as *const u8).map_err(|_| HookError::InvalidAddress(target))?;
    let mut end = region.as_range().end;

    if let Some(host) = posecam_engine::try_host() {
        let module = host.module;
        if module.contains(target as *const u8) {
            end = end.min(module.base() as usize + module.size());
        }
    }

    Ok(end)
}

/// Number of prologue bytes the planned instructions cover
pub fn prologue_len(prologue: &[Instruction]) -> usize {
    prologue.iter().map(Instruction::len).sum()
}

/// Encode the relocated prologue at `at`, followed by a jump to `resume`
pub fn relocate(prologue: &[Instruction], resume: u64, at: u64) -> Result<Vec<u8>, HookError> {
    let mut instructions = prologue.to_vec();
    let jump_back = Instruction::with_branch(Code::Jmp_rel32_64, resume)
        .map_err(|e| HookError::RelocationFailed(e.to_string()))?;
    instructions.push(jump_back);

    let block = InstructionBlock::new(&instructions, at);
    BlockEncoder::encode(64, block, BlockEncoderOptions::NONE)
        .map(|result| result.code_buffer)
        .map_err(|e| HookError::RelocationFailed(e.to_string()))
}

/// `jmp qword ptr [rip+0]` followed by the destination
pub fn encode_abs_jump(destination: u64) -> [u8; ABS_JMP_LEN] {
    let mut stub = [0u8; ABS_JMP_LEN];
    stub[0..6].copy_from_slice(&[0xFF, 0x25, 0x00, 0x00, 0x00, 0x00]);
    stub[6..].copy_from_slice(&destination.to_le_bytes());
    stub
}

/// `jmp rel32` from `from` to `to`, padded with NOPs to `len` bytes
pub fn encode_rel_jump(from: usize, to: usize, len: usize) -> Result<Vec<u8>, HookError> {
    let rel = (to as i64) - (from as i64 + JMP_REL32_LEN as i64);
    let rel = i32::try_from(rel).map_err(|_| HookError::InvalidAddress(to))?;

    let mut patch = Vec::with_capacity(len.max(JMP_REL32_LEN));
    patch.push(0xE9);
    patch.extend_from_slice(&rel.to_le_bytes());
    patch.resize(len.max(JMP_REL32_LEN), 0x90);
    Ok(patch)
}

/// Overwrite code bytes, temporarily making them writable
///
/// # Safety
/// `target..target + bytes.len()` must be mapped code owned by a hook.
unsafe fn write_code(target: usize, bytes: &[u8]) -> Result<(), HookError> {
    let _guard = region::protect_with_handle(
        target as *const u8,
        bytes.len(),
        region::Protection::READ_WRITE_EXECUTE,
    )
    .map_err(|e| HookError::MemoryProtection(e.to_string()))?;

    std::ptr::copy_nonoverlapping(bytes.as_ptr(), target as *mut u8, bytes.len());
    Ok(())
}

/// Create an inline hook for a function
///
/// # Safety
/// - `target` must be the entry of a function in mapped, executable memory
/// - `detour` must be a valid function pointer with a compatible signature
///
/// # Arguments
/// * `name` - Debug name for the hook
/// * `target` - Pointer to the function to hook
/// * `detour` - Your replacement function pointer
///
/// # Returns
/// A key to manage the hook, and a pointer to call the original function.
/// The hook starts disabled; nothing is patched until it is enabled.
pub unsafe fn create_inline_hook(
    name: &str,
    target: *const (),
    detour: *const (),
) -> Result<(InlineHookKey, *const ()), HookError> {
    if target.is_null() {
        return Err(HookError::InvalidAddress(0));
    }
    if detour.is_null() {
        return Err(HookError::InvalidAddress(0));
    }

    tracing::debug!(
        "Creating inline hook '{}' at {:x} -> {:x}",
        name,
        target as usize,
        detour as usize
    );

    let target_addr = target as usize;
    let window_len = prologue_window_len(target_addr, readable_end(target_addr)?);
    let window = std::slice::from_raw_parts(target as *const u8, window_len);
    let prologue = plan_prologue(window, target_addr as u64)?;
    let covered = prologue_len(&prologue);

    let trampoline = trampoline::alloc_near(target as *const u8, TRAMPOLINE_CAPACITY)
        .ok_or_else(|| HookError::DetourCreation("no memory for trampoline".into()))?;
    let code = relocate(
        &prologue,
        (target_addr + covered) as u64,
        trampoline.as_ptr() as u64,
    )?;
    if code.len() > TRAMPOLINE_CAPACITY {
        return Err(HookError::RelocationFailed(format!(
            "relocated prologue needs {} bytes",
            code.len()
        )));
    }
    std::ptr::copy_nonoverlapping(code.as_ptr(), trampoline.as_ptr(), code.len());

    let relay = trampoline::alloc_near(target as *const u8, ABS_JMP_LEN)
        .ok_or_else(|| HookError::DetourCreation("no memory for relay".into()))?;
    let stub = encode_abs_jump(detour as u64);
    std::ptr::copy_nonoverlapping(stub.as_ptr(), relay.as_ptr(), stub.len());

    let patch = encode_rel_jump(target_addr, relay.as_ptr() as usize, covered)?;
    let original_bytes = window[..covered].to_vec();

    let entry = InlineHookEntry {
        target: target_addr,
        patch,
        original_bytes,
        trampoline: trampoline.as_ptr() as *const (),
        enabled: false,
        name: name.to_string(),
    };
    let original = entry.trampoline;

    let key = INLINE_HOOKS.write().insert(entry);

    tracing::info!("Created inline hook '{}' at {:x}", name, target_addr);

    Ok((key, original))
}

/// Enable an inline hook
pub fn enable_inline_hook(key: InlineHookKey) -> Result<(), HookError> {
    let mut hooks = INLINE_HOOKS.write();
    let entry = hooks.get_mut(key).ok_or(HookError::NotFound)?;

    if entry.enabled {
        return Ok(());
    }

    unsafe { write_code(entry.target, &entry.patch) }
        .map_err(|e| HookError::EnableFailed(e.to_string()))?;

    entry.enabled = true;
    tracing::info!(
        "Enabled inline hook '{}' at {:x}",
        entry.name,
        entry.target
    );
    Ok(())
}

/// Disable an inline hook (keeps it installed but restores original bytes)
pub fn disable_inline_hook(key: InlineHookKey) -> Result<(), HookError> {
    let mut hooks = INLINE_HOOKS.write();
    let entry = hooks.get_mut(key).ok_or(HookError::NotFound)?;

    if !entry.enabled {
        return Ok(());
    }

    unsafe { write_code(entry.target, &entry.original_bytes) }
        .map_err(|e| HookError::DisableFailed(e.to_string()))?;

    entry.enabled = false;
    tracing::info!(
        "Disabled inline hook '{}' at {:x}",
        entry.name,
        entry.target
    );
    Ok(())
}

/// Remove an inline hook completely
pub fn remove_inline_hook(key: InlineHookKey) -> Result<(), HookError> {
    disable_inline_hook(key)?;
    let entry = INLINE_HOOKS.write().remove(key).ok_or(HookError::NotFound)?;

    tracing::info!(
        "Removed inline hook '{}' at {:x}",
        entry.name,
        entry.target
    );
    Ok(())
}

/// Check if an inline hook is enabled
pub fn is_inline_hook_enabled(key: InlineHookKey) -> bool {
    INLINE_HOOKS
        .read()
        .get(key)
        .map(|e| e.enabled)
        .unwrap_or(false)
}

/// Get the original function trampoline for an inline hook
pub fn get_inline_hook_original(key: InlineHookKey) -> Option<*const ()> {
    INLINE_HOOKS.read().get(key).map(|e| e.trampoline)
}
