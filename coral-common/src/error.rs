//! Shared error model for cross-crate APIs.

use thiserror::Error;

/// Unified result type used by all public interfaces in `coral`.
pub type CoralResult<T> = Result<T, CoralError>;

/// High-level error categories.
///
/// Protocol errors are fatal to one connection, I/O errors to one syscall site, and the
/// config/state variants surface misuse during process bootstrap.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoralError {
    /// Configuration is invalid for the requested operation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Runtime state does not allow this operation.
    #[error("invalid runtime state: {0}")]
    InvalidState(&'static str),

    /// Client payload violates the wire framing rules.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Socket or poll I/O failed.
    #[error("io error: {0}")]
    Io(String),
}
