//! posecam Engine - Host Discovery and Global Storage
//!
//! This crate handles:
//! - Locating the host's main executable image and its code section
//! - Storing host-wide state in thread-safe global statics
//! - Providing access to that state throughout the extension
//!
//! # Architecture
//!
//! The host module is located once during load via [`loader::load_host`]
//! and stored in [`globals::HostGlobals`]. Access is provided via the
//! [`host()`] function.
//!
//! # Thread Safety
//!
//! The module range is valid for the host's lifetime and never changes after
//! [`init_host()`].

pub mod error;
pub mod globals;
pub mod loader;

pub use error::HostError;
pub use globals::{host, init_host, is_host_initialized, try_host, HostGlobals};
pub use loader::{load_host, text_section, ModuleRange};
