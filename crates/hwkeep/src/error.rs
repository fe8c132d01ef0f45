//! Error types for the keeper.

use hwkeep_core::{CoreError, DecompressionError, IndexError};
use hwkeep_device::DeviceError;
use thiserror::Error;

/// Errors that can occur during keeper operations.
///
/// Every error aborts the whole batch. The key index state is left as it
/// was before the call.
#[derive(Debug, Error)]
pub enum KeeperError {
    /// A device blob did not decode to a key.
    #[error("decompression error: {0}")]
    Decompression(#[from] DecompressionError),

    /// A caller-supplied index was rejected.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Primitive encoding failed.
    #[error("encoding error: {0}")]
    Core(#[from] CoreError),

    /// The device failed or refused.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// The operation does not fit the current key index state.
    #[error("state consistency error: {0}")]
    StateConsistency(String),

    /// A key count was zero.
    #[error("invalid {field}: must be at least 1")]
    InvalidCount { field: &'static str },

    /// A parameter snapshot could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl KeeperError {
    /// The index error behind this error, wherever it was raised.
    pub fn index_error(&self) -> Option<&IndexError> {
        match self {
            KeeperError::Index(e) | KeeperError::Core(CoreError::Index(e)) => Some(e),
            _ => None,
        }
    }

    /// The decompression error behind this error, wherever it was raised.
    pub fn decompression_error(&self) -> Option<&DecompressionError> {
        match self {
            KeeperError::Decompression(e) | KeeperError::Core(CoreError::Decompression(e)) => {
                Some(e)
            }
            _ => None,
        }
    }
}

/// Result type for keeper operations.
pub type Result<T> = std::result::Result<T, KeeperError>;
