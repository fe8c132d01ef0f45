//! Error types for device access.

use thiserror::Error;

/// Errors surfaced by a signing device.
///
/// Both variants are passed through to callers unchanged. Nothing in the
/// workspace retries a failed device call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The device could not be reached, or the session is gone.
    #[error("device unavailable: {0}")]
    Unavailable(String),

    /// The device answered but refused the request.
    #[error("device rejected request: {0}")]
    Rejected(String),
}

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;
