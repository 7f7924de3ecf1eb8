//! posecam Plugin - FFI Layer
//!
//! This crate provides the C ABI the host-side tool loads and drives. It
//! compiles to a cdylib (.dll/.so); `build.rs` writes the matching C header.

pub mod ffi;

pub use posecam_core::shutdown;
