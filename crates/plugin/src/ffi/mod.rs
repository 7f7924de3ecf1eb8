//! C ABI surface

pub mod exports;

pub use exports::PosecamFreeCamInput;
