use thiserror::Error as ThisError;
use uniffi::Error;

use crate::coach::CoachError;
use crate::session::SessionError;

#[derive(Debug, ThisError, Error)]
#[non_exhaustive]
pub enum PulseError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("session closed")]
    Closed,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("error: {0}")]
    Common(String),
}

impl From<SessionError> for PulseError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::InvalidConfig(msg) => PulseError::InvalidConfig(msg),
            SessionError::Closed => PulseError::Closed,
            SessionError::Coach(e) => PulseError::from(e),
            other => PulseError::Common(other.to_string()),
        }
    }
}

impl From<CoachError> for PulseError {
    fn from(e: CoachError) -> Self {
        match e {
            CoachError::PermissionDenied(msg) => PulseError::PermissionDenied(msg),
            CoachError::Connection(msg) => PulseError::Connection(msg),
            other => PulseError::Common(other.to_string()),
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for PulseError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        PulseError::Common(e.reason)
    }
}

impl From<PulseError> for CoachError {
    fn from(e: PulseError) -> Self {
        match e {
            PulseError::PermissionDenied(msg) => CoachError::PermissionDenied(msg),
            PulseError::Connection(msg) => CoachError::Connection(msg),
            other => CoachError::Device(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for PulseError {
    fn from(e: anyhow::Error) -> Self {
        PulseError::Common(e.to_string())
    }
}
