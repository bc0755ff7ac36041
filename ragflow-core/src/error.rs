//! Core error types.
//!
//! Each subsystem gets its own `thiserror` enum rather than one crate-wide
//! error, mirroring how the rest of this codebase splits errors per module.
//! [`CoreError`] is the top-level enum the HTTP layer maps to status codes.

use thiserror::Error;

/// Stable error kind, used by the HTTP layer to pick a status code and by
/// tests to assert on error classification without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    Conflict,
    QuotaExceeded,
    Upstream,
    Cancelled,
    Internal,
}

/// Top-level error for the orchestration core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("authorization: {0}")]
    Authorization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("upstream: {0}")]
    Upstream(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Authorization(_) => ErrorKind::Authorization,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            CoreError::Upstream(_) => ErrorKind::Upstream,
            CoreError::Cancelled => ErrorKind::Cancelled,
            CoreError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Error raised by a single pipeline plugin stage.
///
/// Carries the stable `code` the stage-boundary `error` event surfaces,
/// e.g. `ErrRewrite`, `ErrSearch`, `ErrRerank`, `ErrModelCall`,
/// `ErrGetChatModel`.
#[derive(Debug, Error)]
#[error("pipeline stage failed: {code}: {cause}")]
pub struct PluginError {
    pub code: &'static str,
    pub cause: String,
}

impl PluginError {
    pub fn new(code: &'static str, cause: impl Into<String>) -> Self {
        Self {
            code,
            cause: cause.into(),
        }
    }
}

impl From<PluginError> for CoreError {
    fn from(e: PluginError) -> Self {
        CoreError::Upstream(format!("{}: {}", e.code, e.cause))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_each_variant() {
        assert_eq!(CoreError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(CoreError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(CoreError::QuotaExceeded("x".into()).kind(), ErrorKind::QuotaExceeded);
    }

    #[test]
    fn plugin_error_display_contains_code_and_cause() {
        let e = PluginError::new("ErrSearch", "engine timeout");
        let s = e.to_string();
        assert!(s.contains("ErrSearch"));
        assert!(s.contains("engine timeout"));
    }
}
