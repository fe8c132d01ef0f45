//! Error types for hwkeep core.

use thiserror::Error;

use crate::curve::Curve;

/// A compressed public key could not be turned into a verification key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecompressionError {
    #[error("invalid {curve} public key: expected 33 bytes, got {len}")]
    InvalidLength { curve: Curve, len: usize },

    #[error("invalid {curve} public key: unrecognized selector byte {selector:#04x}")]
    InvalidSelector { curve: Curve, selector: u8 },

    #[error("invalid {curve} public key {blob}: {reason}")]
    InvalidPoint {
        curve: Curve,
        blob: String,
        reason: &'static str,
    },
}

/// A caller-supplied signing index was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("invalid signing index = {0}, not whole number")]
    InvalidIndex(i64),

    #[error("invalid other signing index = {0}, not null or whole number")]
    InvalidOtherIndex(i64),

    #[error("signing index {index} exceeds maximum {max}")]
    IndexOutOfRange { index: u64, max: u64 },

    #[error("expected {expected} signing indices, got {got}")]
    CountMismatch { expected: usize, got: usize },
}

/// Core errors that can occur while building signature material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error(transparent)]
    Decompression(#[from] DecompressionError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("invalid raw signature length: expected {expected}, got {got}")]
    InvalidSignatureLength { expected: usize, got: usize },

    #[error("curve {0} cannot produce signatures")]
    UnsupportedCurve(Curve),

    #[error("qb64 decoding error: {0}")]
    Qb64(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// A curve name was not one of the supported device curve names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown curve name: {0}")]
pub struct UnknownCurve(pub String);
