//! Error handling for the cue engine
//!
//! Pipeline failures (missing clip, undecodable clip, device trouble) are
//! contained inside the playback thread that hit them. The remaining
//! variants surface at startup, before the control loop runs.

use thiserror::Error;

/// Result type alias for cue engine operations
pub type Result<T> = std::result::Result<T, CueError>;

/// Main error type for cue engine operations
#[derive(Error, Debug)]
pub enum CueError {
    // Clip Errors
    #[error("Clip not found: {path}")]
    ClipNotFound { path: String },

    #[error("Failed to decode {path}: {reason}")]
    DecodeFailure {
        path: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Device Errors
    #[error("Audio device failure: {reason}")]
    DeviceFailure { reason: String },

    // Startup Errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CueError {
    /// Build a decode failure without an underlying source error
    pub fn decode(path: impl Into<String>, reason: impl Into<String>) -> Self {
        CueError::DecodeFailure {
            path: path.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Build a device failure from anything displayable
    pub fn device(reason: impl std::fmt::Display) -> Self {
        CueError::DeviceFailure {
            reason: reason.to_string(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            CueError::ClipNotFound { .. } => "CLIP_NOT_FOUND",
            CueError::DecodeFailure { .. } => "DECODE_FAILURE",
            CueError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            CueError::DeviceFailure { .. } => "DEVICE_FAILURE",
            CueError::Config { .. } => "CONFIG_ERROR",
            CueError::Io(_) => "IO_ERROR",
            CueError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether this error belongs to a single playback run
    ///
    /// Such errors abort only the cue that raised them; the control loop
    /// keeps running.
    pub fn is_pipeline_failure(&self) -> bool {
        matches!(
            self,
            CueError::ClipNotFound { .. }
                | CueError::DecodeFailure { .. }
                | CueError::UnsupportedFormat { .. }
                | CueError::DeviceFailure { .. }
        )
    }
}
