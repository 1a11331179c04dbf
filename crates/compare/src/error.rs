//! Error taxonomy for the comparison engine.
//!
//! Viewport-level errors ([`MountError`], [`ViewportError`]) are lifecycle
//! failures: they abort the transition in progress and the session falls back
//! to `Single`. Resolution-level errors ([`ResolveError`], [`TransportError`])
//! are user-facing: the session surfaces them and returns to the year picker.

use thiserror::Error;

use crate::viewport::ViewportId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountError {
    #[error("container `{0}` is not attached")]
    ContainerDetached(String),

    #[error("rendering surface failed to initialize: {0}")]
    Backend(String),

    #[error("rendering surface was dropped before becoming ready")]
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewportError {
    #[error(transparent)]
    Mount(#[from] MountError),

    #[error("viewport {0} is not ready")]
    NotReady(ViewportId),

    #[error("viewport handle {0} is no longer valid")]
    InvalidHandle(ViewportId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("imagery resolver unreachable: {0}")]
    Unreachable(String),

    #[error("imagery resolver timed out")]
    Timeout,

    #[error("imagery resolver returned malformed response: {0}")]
    Malformed(String),

    #[error("imagery resolver returned an unusable tile template `{0}`")]
    InvalidTemplate(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::Malformed(err.to_string())
        } else {
            TransportError::Unreachable(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no historical imagery offered for year `{0}`")]
    UnsupportedYear(String),

    #[error("imagery for {year} unavailable: {reason}")]
    Resolution { year: String, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Viewport(#[from] ViewportError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl From<MountError> for SessionError {
    fn from(err: MountError) -> Self {
        SessionError::Viewport(ViewportError::Mount(err))
    }
}
