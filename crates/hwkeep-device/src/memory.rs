//! In-memory implementation of the KeyDevice trait.
//!
//! A software stand-in for a hardware signer. Keys are derived
//! deterministically from a seed, the key identifier and the curve, so two
//! devices built from the same seed hold the same keys. Blobs and
//! signatures have the same shapes a hardware device returns.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use ed25519_dalek::Signer;
use hwkeep_core::{Curve, KeyId};
use rand::RngCore;
use semver::Version;

use crate::error::{DeviceError, Result};
use crate::traits::{DeviceInfo, DeviceSession, KeyDevice, SessionId};

const DERIVATION_CONTEXT: &str = "hwkeep memory device 2024-01 key derivation";

/// Firmware a memory device reports unless told otherwise.
const MEMORY_FIRMWARE: Version = Version::new(1, 4, 0);

/// In-memory signing device.
///
/// Thread-safe via Mutex. Counts every key and signature request so tests
/// can assert how many device round trips an operation made.
pub struct MemoryDevice {
    seed: [u8; 32],
    info: DeviceInfo,
    inner: Mutex<MemoryDeviceInner>,
}

#[derive(Default)]
struct MemoryDeviceInner {
    /// Sessions ever issued; resumable after disconnect.
    known_sessions: HashSet<SessionId>,
    /// Sessions currently connected.
    open_sessions: HashSet<SessionId>,
    next_session: u64,
    resumed: u64,
    public_key_calls: u64,
    sign_calls: u64,
    /// Key identifiers whose requests are refused.
    failing: HashSet<KeyId>,
    unavailable: bool,
}

impl MemoryDevice {
    /// Create a device holding keys derived from `seed`.
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            seed,
            info: DeviceInfo {
                device_id: format!("memory-{}", &blake3::hash(&seed).to_hex()[..12]),
                firmware: MEMORY_FIRMWARE,
            },
            inner: Mutex::new(MemoryDeviceInner::default()),
        }
    }

    /// Create a device with a random seed.
    pub fn random() -> Self {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        Self::new(seed)
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.info.device_id = device_id.into();
        self
    }

    pub fn with_firmware(mut self, firmware: Version) -> Self {
        self.info.firmware = firmware;
        self
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Refuse every request for `key_id` from now on.
    pub fn fail_on(&self, key_id: KeyId) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing.insert(key_id);
        }
    }

    /// Make every call fail as if the device were unplugged.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.unavailable = unavailable;
        }
    }

    pub fn public_key_calls(&self) -> u64 {
        self.inner.lock().map_or(0, |inner| inner.public_key_calls)
    }

    pub fn sign_calls(&self) -> u64 {
        self.inner.lock().map_or(0, |inner| inner.sign_calls)
    }

    /// Key and signature requests combined.
    pub fn device_calls(&self) -> u64 {
        self.public_key_calls() + self.sign_calls()
    }

    pub fn open_sessions(&self) -> usize {
        self.inner.lock().map_or(0, |inner| inner.open_sessions.len())
    }

    /// How many connects resumed an earlier session.
    pub fn resumed_count(&self) -> u64 {
        self.inner.lock().map_or(0, |inner| inner.resumed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryDeviceInner>> {
        self.inner
            .lock()
            .map_err(|_| DeviceError::Unavailable("device state poisoned".into()))
    }

    /// Lock and check that `session` is usable for `key_id`.
    fn admit(&self, session: &DeviceSession, key_id: &KeyId) -> Result<MutexGuard<'_, MemoryDeviceInner>> {
        let inner = self.lock()?;
        if inner.unavailable {
            return Err(DeviceError::Unavailable("device disconnected".into()));
        }
        if !inner.open_sessions.contains(&session.id) {
            return Err(DeviceError::Unavailable(format!(
                "session {} is not open",
                session.id
            )));
        }
        if inner.failing.contains(key_id) {
            return Err(DeviceError::Rejected(format!("request for {key_id} refused")));
        }
        Ok(inner)
    }

    fn secret(&self, key_id: &KeyId, curve: Curve) -> [u8; 32] {
        let mut material = Vec::with_capacity(32 + 16 + key_id.as_str().len());
        material.extend_from_slice(&self.seed);
        material.extend_from_slice(curve.name().as_bytes());
        material.push(0);
        material.extend_from_slice(key_id.as_str().as_bytes());
        blake3::derive_key(DERIVATION_CONTEXT, &material)
    }

    fn p256_key(&self, key_id: &KeyId) -> Result<p256::ecdsa::SigningKey> {
        p256::ecdsa::SigningKey::from_slice(&self.secret(key_id, Curve::NistP256))
            .map_err(|_| DeviceError::Rejected(format!("no usable P-256 key for {key_id}")))
    }

    fn compressed_key(&self, key_id: &KeyId, curve: Curve) -> Result<Vec<u8>> {
        let secret = self.secret(key_id, curve);
        let blob = match curve {
            Curve::Ed25519 => {
                let key = ed25519_dalek::SigningKey::from_bytes(&secret);
                let mut blob = vec![0x00];
                blob.extend_from_slice(key.verifying_key().as_bytes());
                blob
            }
            Curve::Curve25519 => {
                let secret = x25519_dalek::StaticSecret::from(secret);
                let mut blob = vec![0x00];
                blob.extend_from_slice(x25519_dalek::PublicKey::from(&secret).as_bytes());
                blob
            }
            Curve::NistP256 => {
                let key = self.p256_key(key_id)?;
                key.verifying_key().to_encoded_point(true).as_bytes().to_vec()
            }
        };
        Ok(blob)
    }

    fn raw_signature(&self, key_id: &KeyId, curve: Curve, message: &[u8]) -> Result<Vec<u8>> {
        match curve {
            Curve::Ed25519 => {
                let key = ed25519_dalek::SigningKey::from_bytes(&self.secret(key_id, curve));
                Ok(key.sign(message).to_bytes().to_vec())
            }
            Curve::NistP256 => {
                let signature: p256::ecdsa::Signature = self.p256_key(key_id)?.sign(message);
                Ok(signature.to_bytes().to_vec())
            }
            Curve::Curve25519 => Err(DeviceError::Rejected(format!(
                "{curve} keys cannot sign"
            ))),
        }
    }
}

#[async_trait]
impl KeyDevice for MemoryDevice {
    async fn connect(&self, resume: Option<&SessionId>) -> Result<DeviceSession> {
        let mut inner = self.lock()?;
        if inner.unavailable {
            return Err(DeviceError::Unavailable("no device attached".into()));
        }

        let id = match resume {
            Some(id) if inner.known_sessions.contains(id) => {
                inner.resumed += 1;
                id.clone()
            }
            _ => {
                inner.next_session += 1;
                let id = SessionId::new(format!("{}-s{}", self.info.device_id, inner.next_session));
                inner.known_sessions.insert(id.clone());
                id
            }
        };
        inner.open_sessions.insert(id.clone());

        Ok(DeviceSession {
            id,
            info: self.info.clone(),
        })
    }

    async fn public_key(
        &self,
        session: &DeviceSession,
        key_id: &KeyId,
        curve: Curve,
    ) -> Result<Vec<u8>> {
        let mut inner = self.admit(session, key_id)?;
        inner.public_key_calls += 1;
        drop(inner);
        self.compressed_key(key_id, curve)
    }

    async fn sign(
        &self,
        session: &DeviceSession,
        key_id: &KeyId,
        curve: Curve,
        message: &[u8],
    ) -> Result<Vec<u8>> {
        let mut inner = self.admit(session, key_id)?;
        inner.sign_calls += 1;
        drop(inner);
        self.raw_signature(key_id, curve, message)
    }

    async fn disconnect(&self, session: &DeviceSession) -> Result<()> {
        let mut inner = self.lock()?;
        if !inner.open_sessions.remove(&session.id) {
            return Err(DeviceError::Unavailable(format!(
                "session {} is not open",
                session.id
            )));
        }
        Ok(())
    }
}
