//! # hwkeep core
//!
//! Pure primitives for hardware-held keys: point recovery, self-describing
//! primitive encoding and signature material.
//!
//! This crate contains no I/O and no device access. It turns bytes returned
//! by a signing device into qb64 text.
//!
//! ## Key Types
//!
//! - [`VerificationKey`] - A public key recovered from a 33-byte device blob
//! - [`Verfer`] - A verification key with its transferable/non-transferable code
//! - [`SignatureMaterial`] - An encoded signature, indexed ([`Siger`]) or not ([`Cigar`])
//! - [`Diger`] - A next-key commitment digest
//! - [`KeyId`] - Identifier of one derived key on the device
//!
//! ## Encoding
//!
//! Primitive code tables and qb64 framing live in the [`primitive`] module.

pub mod curve;
pub mod digest;
pub mod error;
pub mod primitive;
pub mod signing;
pub mod types;

pub use curve::{recover, Curve, EdwardsMarker, VerificationKey, COMPRESSED_KEY_LEN};
pub use digest::{DigestAlgorithm, Diger};
pub use error::{CoreError, DecompressionError, IndexError, Result, UnknownCurve};
pub use primitive::{Indexer, IndexerCode, Matter, MatterCode};
pub use signing::{
    encode, Cigar, IndexForm, IndexSpec, ResolvedIndex, Siger, SignatureMaterial, SigningRequest,
    Verfer, BIG_INDEX_MAX, SIGNATURE_LEN, SMALL_INDEX_MAX,
};
pub use types::KeyId;
