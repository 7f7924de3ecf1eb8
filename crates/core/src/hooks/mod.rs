//! Hook system
//!
//! Inline function detours for x86-64, built on iced-x86 instruction
//! relocation and near-allocated trampolines. Consumers work through the
//! [`FunctionHook`] / [`HookInstaller`] traits.

pub mod inline;
pub mod manager;
pub mod trampoline;

pub use inline::{HookError, InlineHookKey};
pub use manager::{hook, FunctionHook, HookInstaller, HookManager, InlineHook};
