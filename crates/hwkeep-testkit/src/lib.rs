//! # hwkeep testkit
//!
//! Testing utilities for hwkeep.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known keys and signatures with their expected qb64 text
//! - **Generators**: Proptest strategies for curves, indices and key states
//! - **Fixtures**: Keepers wired to an in-memory device, with call counting
//!
//! ## Golden Vectors
//!
//! ```rust
//! use hwkeep_testkit::vectors::{all_vectors, verify_all_vectors};
//!
//! for (name, ok, detail) in verify_all_vectors() {
//!     assert!(ok, "{name}: {detail}");
//! }
//! assert!(!all_vectors().is_empty());
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use hwkeep_testkit::fixtures::KeeperFixture;
//!
//! async fn example() {
//!     let fixture = KeeperFixture::new(2, 3);
//!     let keys = fixture.keeper.incept().await.unwrap();
//!     assert_eq!(fixture.device.public_key_calls(), 5);
//!     # let _ = keys;
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{init_tracing, multi_owner_fixtures, KeeperFixture};
pub use generators::{KeyStateParams, ResolvedCase};
pub use vectors::{all_vectors, export_json, verify_all_vectors, GoldenVector, VectorInput};
