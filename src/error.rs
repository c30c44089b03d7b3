// this_file: src/error.rs
//! Error types for the glyphcache library

use thiserror::Error;

/// Main error type for glyphcache operations
#[derive(Debug, Error)]
pub enum Error {
    /// Font file loading or parsing error
    #[error("Font error: {0}")]
    Font(String),

    /// JSON parsing or validation error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Shaping operation error
    #[error("Shaping error: {0}")]
    Shaping(String),

    /// Rendering error
    #[error("Rendering error: {0}")]
    Rendering(String),

    /// Invalid input parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Cache contract breach, e.g. storing into a slot that is not pending
    #[error("Cache protocol violation: {0}")]
    Protocol(String),
}

/// Result type alias for glyphcache operations
pub type Result<T> = std::result::Result<T, Error>;
