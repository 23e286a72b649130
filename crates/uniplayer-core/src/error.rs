//! Error types for Uniplayer Core

use crate::types::{FatalErrorKind, SourceKind};
use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Source errors
    #[error("Unrecognized embed format: {locator}")]
    UnrecognizedEmbedFormat { locator: String },

    // Engine errors
    #[error("Failed to attach {kind} engine: {reason}")]
    EngineAttachFailure { kind: SourceKind, reason: String },

    // Playback errors
    #[error("Playback blocked: {reason}")]
    PlaybackBlocked { reason: String },

    #[error("Fatal playback error: {0}")]
    FatalPlayback(FatalErrorKind),

    // Lifecycle errors
    #[error("Controller has been disposed")]
    ControllerDisposed,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an attach failure for the given engine kind
    pub fn attach(kind: SourceKind, reason: impl Into<String>) -> Self {
        Error::EngineAttachFailure {
            kind,
            reason: reason.into(),
        }
    }

    /// Returns true if playback can continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::PlaybackBlocked { .. } | Error::UnrecognizedEmbedFormat { .. }
        )
    }

    /// Returns the error code reported to shells
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::UnrecognizedEmbedFormat { .. } => "UNRECOGNIZED_EMBED",
            Error::EngineAttachFailure { .. } => "ENGINE_ATTACH",
            Error::PlaybackBlocked { .. } => "PLAYBACK_BLOCKED",
            Error::FatalPlayback(_) => "FATAL_PLAYBACK",
            Error::ControllerDisposed => "DISPOSED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}

/// Failure reported by a host backend (media element, streaming library,
/// iframe player)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
