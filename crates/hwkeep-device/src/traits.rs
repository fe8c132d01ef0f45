//! Device trait: the abstract interface to a key-holding signing device.
//!
//! Private keys never leave the device. The workspace only ever sees
//! compressed public keys and raw signatures.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use hwkeep_core::{Curve, KeyId};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identifier of a device session, reusable across connections.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a device reports about itself on connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Stable identifier of the physical device.
    pub device_id: String,
    /// Firmware version as reported by the device.
    pub firmware: Version,
}

/// An open connection to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSession {
    pub id: SessionId,
    pub info: DeviceInfo,
}

/// The KeyDevice trait: async access to keys held on a signing device.
///
/// Calls may block for seconds while the device waits on its user.
#[async_trait]
pub trait KeyDevice: Send + Sync {
    /// Open a session, resuming `resume` when the device still knows it.
    async fn connect(&self, resume: Option<&SessionId>) -> Result<DeviceSession>;

    /// The 33-byte compressed public key for `key_id` on `curve`.
    async fn public_key(&self, session: &DeviceSession, key_id: &KeyId, curve: Curve)
        -> Result<Vec<u8>>;

    /// A raw signature over `message` by the key `key_id` on `curve`.
    async fn sign(
        &self,
        session: &DeviceSession,
        key_id: &KeyId,
        curve: Curve,
        message: &[u8],
    ) -> Result<Vec<u8>>;

    /// Close the session.
    async fn disconnect(&self, session: &DeviceSession) -> Result<()>;
}

#[async_trait]
impl<D: KeyDevice + ?Sized> KeyDevice for Arc<D> {
    async fn connect(&self, resume: Option<&SessionId>) -> Result<DeviceSession> {
        (**self).connect(resume).await
    }

    async fn public_key(
        &self,
        session: &DeviceSession,
        key_id: &KeyId,
        curve: Curve,
    ) -> Result<Vec<u8>> {
        (**self).public_key(session, key_id, curve).await
    }

    async fn sign(
        &self,
        session: &DeviceSession,
        key_id: &KeyId,
        curve: Curve,
        message: &[u8],
    ) -> Result<Vec<u8>> {
        (**self).sign(session, key_id, curve, message).await
    }

    async fn disconnect(&self, session: &DeviceSession) -> Result<()> {
        (**self).disconnect(session).await
    }
}
