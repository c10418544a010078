//! Location source error types and handling

use thiserror::Error;

/// Failures reported by a location source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The user or platform refused location access
    #[error("location permission denied")]
    PermissionDenied,
    /// The platform could not produce a fix right now
    #[error("position unavailable: {reason}")]
    PositionUnavailable { reason: String },
    /// No fix arrived within the acquisition timeout
    #[error("position acquisition timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// How a location error affects the session that observed it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Informational; the stream stays open and may recover
    Transient,
    /// The stream ends and is not retried
    Terminal,
}

impl LocationError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        LocationError::PositionUnavailable {
            reason: reason.into(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LocationError::PermissionDenied => ErrorSeverity::Terminal,
            LocationError::PositionUnavailable { .. } | LocationError::Timeout { .. } => {
                ErrorSeverity::Transient
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.severity() == ErrorSeverity::Terminal
    }
}

/// Result type for location source operations
pub type LocationResult<T> = Result<T, LocationError>;
