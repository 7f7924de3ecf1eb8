//! posecam SDK - Host Type Definitions
//!
//! This crate contains opaque host record types and the native signatures of
//! the camera routines the extension intercepts. It has no dependencies and
//! compiles quickly, allowing parallel compilation of dependent crates.
//!
//! # Modules
//!
//! - [`records`] - Opaque host records and layout-compatible math types
//! - [`natives`] - Function pointer types for intercepted host routines
//! - [`names`] - Gamedata keys for signatures and offsets

pub mod names;
pub mod natives;
pub mod records;

pub use natives::*;
pub use records::*;
pub use names::{ALL_OFFSETS, ALL_SIGNATURES};
