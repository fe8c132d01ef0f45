//! # hwkeep
//!
//! Signing keys held on a hardware device, used with a self-certifying,
//! rotation-based identifier protocol.
//!
//! ## Overview
//!
//! A [`Keeper`] ties together:
//!
//! - **Key index state**: which device derivation index backs which key slot
//! - **Device access**: public keys and raw signatures fetched over one session per batch
//! - **Encoding**: recovered keys, next-key digests and signatures as qb64 text
//!
//! ## Key Concepts
//!
//! - **Inception**: Derive the first signing keys and commit to the next keys by digest.
//! - **Rotation**: The committed next keys become signing keys. Indices only move forward.
//! - **Indexed signature**: A signature tagged with the signer's slot in the key list.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hwkeep::{Keeper, KeeperConfig, KeyIndexState};
//! use hwkeep::device::MemoryDevice;
//!
//! async fn example() -> hwkeep::Result<()> {
//!     let state = KeyIndexState::new(0, 1, 1)?;
//!     let keeper = Keeper::new(MemoryDevice::random(), state, KeeperConfig::default());
//!
//!     let keys = keeper.incept().await?;
//!     println!("signing keys: {:?}", keys.signing_qb64());
//!
//!     let signatures = keeper.sign(b"event", true, None, None).await?;
//!     println!("signature: {}", signatures[0].qb64());
//!
//!     let params = keeper.params().await.to_bytes()?;
//!     # let _ = params;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `hwkeep::core` - Point recovery, primitives and signature material
//! - `hwkeep::device` - Device trait, sessions and the in-memory device

pub mod config;
pub mod error;
pub mod keeper;
pub mod state;

// Re-export component crates
pub use hwkeep_core as core;
pub use hwkeep_device as device;

pub use config::KeeperConfig;
pub use error::{KeeperError, Result};
pub use keeper::{EstablishmentKeys, Keeper};
pub use state::{InceptionPlan, KeyIndexState, KeyParams, Phase, RotationPlan, DEFAULT_NAMESPACE};

// Re-export commonly used core types
pub use hwkeep_core::{
    Curve, DigestAlgorithm, Diger, IndexSpec, KeyId, SignatureMaterial, SigningRequest, Verfer,
};
