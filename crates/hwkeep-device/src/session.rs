//! Scoped device sessions.
//!
//! A [`DeviceHandle`] wraps a [`KeyDevice`] and owns the session cache.
//! Callers bracket a batch of device calls with [`DeviceHandle::acquire`]
//! and [`DeviceHandle::release`] so every derivation of one operation runs
//! under a single session.

use hwkeep_core::{Curve, KeyId};
use semver::{Comparator, Op, Prerelease, VersionReq};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{DeviceError, Result};
use crate::traits::{DeviceSession, KeyDevice, SessionId};

/// The default firmware requirement, `>=1.4.0`.
pub fn default_firmware_requirement() -> VersionReq {
    VersionReq {
        comparators: vec![Comparator {
            op: Op::GreaterEq,
            major: 1,
            minor: Some(4),
            patch: Some(0),
            pre: Prerelease::EMPTY,
        }],
    }
}

/// The last session id handed out, and which device handed it out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCache {
    session_id: Option<SessionId>,
    device_id: Option<String>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session id to resume on the next connect.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Remember `session`.
    ///
    /// Returns true when a different device answered than the one cached.
    pub fn record(&mut self, session: &DeviceSession) -> bool {
        let switched = self
            .device_id
            .as_deref()
            .is_some_and(|known| known != session.info.device_id);
        self.session_id = Some(session.id.clone());
        self.device_id = Some(session.info.device_id.clone());
        switched
    }

    pub fn clear(&mut self) {
        self.session_id = None;
        self.device_id = None;
    }
}

/// A device together with its session cache and firmware policy.
pub struct DeviceHandle<D: KeyDevice> {
    device: D,
    firmware_requirement: VersionReq,
    cache: Mutex<SessionCache>,
}

impl<D: KeyDevice> DeviceHandle<D> {
    /// Wrap `device`, accepting firmware that matches `firmware_requirement`.
    pub fn new(device: D, firmware_requirement: VersionReq) -> Self {
        Self {
            device,
            firmware_requirement,
            cache: Mutex::new(SessionCache::new()),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn firmware_requirement(&self) -> &VersionReq {
        &self.firmware_requirement
    }

    /// A copy of the current session cache.
    pub async fn cache(&self) -> SessionCache {
        self.cache.lock().await.clone()
    }

    /// Forget the cached session so the next acquire starts fresh.
    pub async fn reset_session(&self) {
        self.cache.lock().await.clear();
    }

    /// Open a session, resuming the cached one when possible.
    ///
    /// A device whose firmware does not match the requirement is
    /// disconnected and rejected.
    pub async fn acquire(&self) -> Result<DeviceSession> {
        let resume = self.cache.lock().await.session_id().cloned();
        let session = self.device.connect(resume.as_ref()).await?;

        if !self.firmware_requirement.matches(&session.info.firmware) {
            if let Err(e) = self.device.disconnect(&session).await {
                warn!(session = %session.id, error = %e, "disconnect after firmware rejection failed");
            }
            return Err(DeviceError::Rejected(format!(
                "firmware {} does not satisfy {}",
                session.info.firmware, self.firmware_requirement
            )));
        }

        let mut cache = self.cache.lock().await;
        if cache.record(&session) {
            debug!(device = %session.info.device_id, "different device answered, session cache reset");
        }
        debug!(session = %session.id, resumed = resume.as_ref() == Some(&session.id), "device session acquired");
        Ok(session)
    }

    /// Close `session`, keeping its id for the next acquire.
    ///
    /// A failed disconnect is logged and otherwise ignored; the batch that
    /// ran under the session has already finished.
    pub async fn release(&self, session: DeviceSession) {
        if let Err(e) = self.device.disconnect(&session).await {
            warn!(session = %session.id, error = %e, "device disconnect failed");
        }
        debug!(session = %session.id, "device session released");
    }

    /// Fetch one compressed public key.
    pub async fn public_key(
        &self,
        session: &DeviceSession,
        key_id: &KeyId,
        curve: Curve,
    ) -> Result<Vec<u8>> {
        debug!(%key_id, %curve, "requesting public key");
        self.device.public_key(session, key_id, curve).await
    }

    /// Fetch one raw signature.
    pub async fn sign(
        &self,
        session: &DeviceSession,
        key_id: &KeyId,
        curve: Curve,
        message: &[u8],
    ) -> Result<Vec<u8>> {
        debug!(%key_id, %curve, len = message.len(), "requesting signature");
        self.device.sign(session, key_id, curve, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDevice;
    use crate::traits::DeviceInfo;
    use semver::Version;
    use std::sync::Arc;

    fn session(id: &str, device: &str) -> DeviceSession {
        DeviceSession {
            id: SessionId::new(id),
            info: DeviceInfo {
                device_id: device.into(),
                firmware: Version::new(1, 4, 0),
            },
        }
    }

    #[test]
    fn test_cache_record_and_switch() {
        let mut cache = SessionCache::new();
        assert!(!cache.record(&session("s1", "dev-a")));
        assert_eq!(cache.session_id(), Some(&SessionId::new("s1")));
        assert!(!cache.record(&session("s2", "dev-a")));
        assert!(cache.record(&session("s3", "dev-b")));
        assert_eq!(cache.device_id(), Some("dev-b"));

        cache.clear();
        assert_eq!(cache, SessionCache::default());
    }

    #[tokio::test]
    async fn test_acquire_resumes_cached_session() {
        let device = Arc::new(MemoryDevice::new([1u8; 32]));
        let handle = DeviceHandle::new(Arc::clone(&device), default_firmware_requirement());

        let first = handle.acquire().await.unwrap();
        handle.release(first.clone()).await;
        assert_eq!(device.open_sessions(), 0);

        let second = handle.acquire().await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(device.resumed_count(), 1);
        handle.release(second).await;

        handle.reset_session().await;
        let third = handle.acquire().await.unwrap();
        assert_ne!(third.id, first.id);
        handle.release(third).await;
    }

    #[tokio::test]
    async fn test_acquire_rejects_old_firmware() {
        let device = Arc::new(MemoryDevice::new([1u8; 32]).with_firmware(Version::new(1, 3, 2)));
        let handle = DeviceHandle::new(Arc::clone(&device), default_firmware_requirement());

        let err = handle.acquire().await.unwrap_err();
        assert!(matches!(err, DeviceError::Rejected(_)));
        assert_eq!(device.open_sessions(), 0);
        assert_eq!(handle.cache().await, SessionCache::default());
    }

    #[tokio::test]
    async fn test_acquire_surfaces_unavailable() {
        let device = MemoryDevice::new([1u8; 32]);
        device.set_unavailable(true);
        let handle = DeviceHandle::new(device, default_firmware_requirement());
        assert!(matches!(
            handle.acquire().await,
            Err(DeviceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_default_requirement() {
        let requirement = default_firmware_requirement();
        assert_eq!(requirement, VersionReq::parse(">=1.4.0").unwrap());
        assert!(requirement.matches(&Version::new(1, 4, 0)));
        assert!(requirement.matches(&Version::new(1, 10, 2)));
        assert!(requirement.matches(&Version::new(2, 0, 0)));
        assert!(!requirement.matches(&Version::new(1, 3, 9)));

        // Pre-releases parse but sit below their release.
        let candidate: Version = "1.4.0-rc1".parse().unwrap();
        assert!(!requirement.matches(&candidate));
    }

    #[tokio::test]
    async fn test_acquire_honors_custom_requirement() {
        let device = Arc::new(MemoryDevice::new([1u8; 32]).with_firmware("2.1.0-rc1".parse().unwrap()));
        let handle = DeviceHandle::new(Arc::clone(&device), VersionReq::parse(">=2.1.0-rc1").unwrap());

        let session = handle.acquire().await.unwrap();
        assert_eq!(session.info.firmware.pre.as_str(), "rc1");
        handle.release(session).await;

        let strict = DeviceHandle::new(device, default_firmware_requirement());
        assert!(strict.acquire().await.is_err());
    }

    #[tokio::test]
    async fn test_acquire_from_new_device_starts_fresh() {
        let first = Arc::new(MemoryDevice::new([1u8; 32]).with_device_id("dev-a"));
        let handle = DeviceHandle::new(Arc::clone(&first), default_firmware_requirement());
        let session = handle.acquire().await.unwrap();
        handle.release(session.clone()).await;
        assert_eq!(handle.cache().await.device_id(), Some("dev-a"));

        // Same seed, different physical device: the cached id means nothing to it.
        let second = Arc::new(MemoryDevice::new([1u8; 32]).with_device_id("dev-b"));
        let handle = DeviceHandle {
            device: Arc::clone(&second),
            firmware_requirement: default_firmware_requirement(),
            cache: Mutex::new(handle.cache().await),
        };
        let fresh = handle.acquire().await.unwrap();
        assert_ne!(fresh.id, session.id);
        assert_eq!(second.resumed_count(), 0);

        let cache = handle.cache().await;
        assert_eq!(cache.device_id(), Some("dev-b"));
        assert_eq!(cache.session_id(), Some(&fresh.id));
        handle.release(fresh).await;
    }
}
