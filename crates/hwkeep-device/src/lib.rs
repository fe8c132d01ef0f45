//! # hwkeep device
//!
//! The boundary between hwkeep and a key-holding signing device.
//!
//! ## Overview
//!
//! Devices are reached through the [`KeyDevice`] trait. The workspace never
//! sees private keys: a device returns 33-byte compressed public keys and
//! raw signatures, addressed by [`KeyId`](hwkeep_core::KeyId) and curve.
//! The transport to real hardware lives outside this crate.
//!
//! ## Key Types
//!
//! - [`KeyDevice`] - The async trait every device implements
//! - [`DeviceHandle`] - Scoped session acquisition with a session cache and firmware check
//! - [`SessionCache`] - The session id reused across connections
//! - [`MemoryDevice`] - Software device for tests and local development
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hwkeep_core::{Curve, KeyId};
//! use hwkeep_device::{default_firmware_requirement, DeviceHandle, MemoryDevice};
//!
//! async fn example() -> hwkeep_device::Result<()> {
//!     let handle = DeviceHandle::new(MemoryDevice::random(), default_firmware_requirement());
//!
//!     let session = handle.acquire().await?;
//!     let key_id = KeyId::derive("hwkeep", 0, 0);
//!     let blob = handle.public_key(&session, &key_id, Curve::Ed25519).await;
//!     handle.release(session).await;
//!
//!     let _blob = blob?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod memory;
pub mod session;
pub mod traits;

pub use error::{DeviceError, Result};
pub use memory::MemoryDevice;
pub use semver::{Version, VersionReq};
pub use session::{default_firmware_requirement, DeviceHandle, SessionCache};
pub use traits::{DeviceInfo, DeviceSession, KeyDevice, SessionId};
