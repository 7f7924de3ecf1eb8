//! Error types for host discovery

/// Error type for host discovery operations
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The host's main module could not be located
    #[error("Host module not found: {0}")]
    ModuleNotFound(String),

    /// The module image headers could not be parsed
    #[error("Malformed module image: {0}")]
    MalformedImage(&'static str),

    /// The current platform has no module discovery backend
    #[error("Module discovery is not supported on this platform")]
    Unsupported,

    /// Host globals already initialized
    #[error("Host already initialized")]
    AlreadyInitialized,
}
