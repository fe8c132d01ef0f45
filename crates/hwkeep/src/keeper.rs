//! The Keeper: inception, rotation and signing with device-held keys.
//!
//! A keeper owns one key index state behind an async mutex. Each operation
//! holds the mutex for its whole batch, device round trips included, and
//! commits state changes only after every device call and every encoding
//! step has succeeded.

use hwkeep_core::{
    encode, recover, Curve, CoreError, Diger, IndexSpec, KeyId, SignatureMaterial,
    SigningRequest, Verfer,
};
use hwkeep_device::{DeviceHandle, DeviceSession, KeyDevice};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::KeeperConfig;
use crate::error::{KeeperError, Result};
use crate::state::{KeyIndexState, KeyParams};

/// Keys published by an establishment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstablishmentKeys {
    /// Verification keys of the current signing keys, in slot order.
    pub signing_keys: Vec<Verfer>,
    /// Digests committing to the next keys, in slot order.
    pub next_key_digests: Vec<Diger>,
}

impl EstablishmentKeys {
    pub fn signing_qb64(&self) -> Vec<String> {
        self.signing_keys.iter().map(Verfer::qb64).collect()
    }

    pub fn next_digests_qb64(&self) -> Vec<String> {
        self.next_key_digests.iter().map(Diger::qb64).collect()
    }
}

/// Signing keys held on a device, tracked across rotations.
pub struct Keeper<D: KeyDevice> {
    device: DeviceHandle<D>,
    state: Mutex<KeyIndexState>,
    config: KeeperConfig,
}

impl<D: KeyDevice> Keeper<D> {
    /// Create a keeper over `device` for `state`.
    pub fn new(device: D, state: KeyIndexState, config: KeeperConfig) -> Self {
        Self {
            device: DeviceHandle::new(device, config.firmware_requirement.clone()),
            state: Mutex::new(state),
            config,
        }
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    /// The wrapped device handle.
    pub fn device(&self) -> &DeviceHandle<D> {
        &self.device
    }

    /// A snapshot of the current key parameters.
    pub async fn params(&self) -> KeyParams {
        self.state.lock().await.params()
    }

    /// Forget the cached device session.
    pub async fn reset_session(&self) {
        self.device.reset_session().await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Establishment Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Derive the inception keys.
    ///
    /// Signing keys use the state's transferability, set up front with
    /// [`KeyIndexState::with_transferable`]. Next keys are always
    /// transferable and are published only as digests of their qb64 text.
    pub async fn incept(&self) -> Result<EstablishmentKeys> {
        let mut state = self.state.lock().await;
        let plan = state.plan_inception()?;

        let keys = self
            .establish(&plan.signing, &plan.next, state.transferable(), &state)
            .await?;

        state.commit_inception(plan)?;
        info!(
            owner = state.owner_index(),
            key_base_index = state.key_base_index(),
            signing = keys.signing_keys.len(),
            next = keys.next_key_digests.len(),
            "key state incepted"
        );
        Ok(keys)
    }

    /// Promote the committed next keys to signing keys and commit to
    /// `next_count` fresh ones.
    pub async fn rotate(&self, next_count: u32, transferable: bool) -> Result<EstablishmentKeys> {
        let mut state = self.state.lock().await;
        let plan = state.plan_rotation(next_count, transferable)?;

        let keys = self
            .establish(&plan.signing, &plan.next, transferable, &state)
            .await?;

        let from = state.key_base_index();
        state.commit_rotation(plan)?;
        info!(
            owner = state.owner_index(),
            from,
            to = state.key_base_index(),
            signing = state.signing_count(),
            next = state.next_count(),
            "key state rotated"
        );
        Ok(keys)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Signing Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Sign `message` with every current signing key.
    ///
    /// `indices` overrides the main index of each signature, which defaults
    /// to its slot. Supplying `ondices` switches every signature to dual
    /// indexing; a `None` entry reuses the main index. Both lists must have
    /// one entry per signing key. Non-indexed signing ignores both.
    ///
    /// Indices are validated before the device is contacted.
    pub async fn sign(
        &self,
        message: &[u8],
        indexed: bool,
        indices: Option<&[i64]>,
        ondices: Option<&[Option<i64>]>,
    ) -> Result<Vec<SignatureMaterial>> {
        let state = self.state.lock().await;
        state.require_active()?;

        let curve = self.config.curve;
        if !curve.can_sign() {
            return Err(CoreError::UnsupportedCurve(curve).into());
        }

        let key_ids = state.signing_key_ids();
        let specs = if indexed {
            let specs = IndexSpec::from_lists(key_ids.len(), indices, ondices)?;
            for (position, spec) in specs.iter().enumerate() {
                spec.resolve(position)?;
            }
            specs
        } else {
            vec![IndexSpec::default(); key_ids.len()]
        };

        let session = self.device.acquire().await?;
        let fetched = self
            .fetch_signatures(&session, &key_ids, curve, message, state.transferable())
            .await;
        self.device.release(session).await;

        let requests: Vec<SigningRequest> = fetched?
            .into_iter()
            .zip(specs)
            .map(|((signature, verfer), index)| SigningRequest {
                signature,
                verfer,
                index,
            })
            .collect();

        let signatures = encode(&requests, indexed)?;
        debug!(count = signatures.len(), indexed, "message signed");
        Ok(signatures)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Device Batches
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch and encode signing keys and next-key digests under one session.
    async fn establish(
        &self,
        signing: &[KeyId],
        next: &[KeyId],
        transferable: bool,
        state: &KeyIndexState,
    ) -> Result<EstablishmentKeys> {
        let curve = self.config.curve;
        let algorithm = state.digest_algorithm();

        let session = self.device.acquire().await?;
        let fetched = async {
            let signing_keys = self.fetch_verfers(&session, signing, curve, transferable).await?;
            let next_keys = self.fetch_verfers(&session, next, curve, true).await?;
            Ok::<_, KeeperError>((signing_keys, next_keys))
        }
        .await;
        self.device.release(session).await;

        let (signing_keys, next_keys) = fetched?;
        let next_key_digests = next_keys
            .iter()
            .map(|verfer| Diger::new(algorithm, verfer.qb64().as_bytes()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(EstablishmentKeys {
            signing_keys,
            next_key_digests,
        })
    }

    async fn fetch_verfers(
        &self,
        session: &DeviceSession,
        key_ids: &[KeyId],
        curve: Curve,
        transferable: bool,
    ) -> Result<Vec<Verfer>> {
        let mut verfers = Vec::with_capacity(key_ids.len());
        for key_id in key_ids {
            let blob = self.device.public_key(session, key_id, curve).await?;
            verfers.push(Verfer::new(recover(&blob, curve)?, transferable));
        }
        Ok(verfers)
    }

    async fn fetch_signatures(
        &self,
        session: &DeviceSession,
        key_ids: &[KeyId],
        curve: Curve,
        message: &[u8],
        transferable: bool,
    ) -> Result<Vec<(Vec<u8>, Verfer)>> {
        let mut out = Vec::with_capacity(key_ids.len());
        for key_id in key_ids {
            let blob = self.device.public_key(session, key_id, curve).await?;
            let verfer = Verfer::new(recover(&blob, curve)?, transferable);
            let signature = self.device.sign(session, key_id, curve, message).await?;
            out.push((signature, verfer));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwkeep_core::{DigestAlgorithm, IndexError, IndexerCode, MatterCode};
    use hwkeep_device::{DeviceError, MemoryDevice};
    use std::sync::Arc;

    fn keeper(signing: u32, next: u32) -> (Arc<MemoryDevice>, Keeper<Arc<MemoryDevice>>) {
        let device = Arc::new(MemoryDevice::new([9u8; 32]));
        let state = KeyIndexState::new(0, signing, next).unwrap();
        let keeper = Keeper::new(Arc::clone(&device), state, KeeperConfig::default());
        (device, keeper)
    }

    #[tokio::test]
    async fn test_incept_shapes() {
        let (device, keeper) = keeper(2, 3);
        let keys = keeper.incept().await.unwrap();

        assert_eq!(keys.signing_keys.len(), 2);
        assert_eq!(keys.next_key_digests.len(), 3);
        assert!(keys.signing_keys.iter().all(|v| v.code() == MatterCode::Ed25519));
        assert!(keys
            .next_digests_qb64()
            .iter()
            .all(|d| d.starts_with('E') && d.len() == 44));
        assert_eq!(device.public_key_calls(), 5);
        assert_eq!(device.open_sessions(), 0);
        assert_eq!(keeper.params().await.key_base_index, 0);
    }

    #[tokio::test]
    async fn test_incept_twice_is_state_error() {
        let (device, keeper) = keeper(1, 1);
        keeper.incept().await.unwrap();
        let calls = device.device_calls();

        let err = keeper.incept().await.unwrap_err();
        assert!(matches!(err, KeeperError::StateConsistency(_)));
        assert_eq!(device.device_calls(), calls);
    }

    #[tokio::test]
    async fn test_sign_before_incept_fails() {
        let (device, keeper) = keeper(1, 1);
        let err = keeper.sign(b"m", true, None, None).await.unwrap_err();
        assert!(matches!(err, KeeperError::StateConsistency(_)));
        assert_eq!(device.device_calls(), 0);
    }

    #[tokio::test]
    async fn test_next_digest_commits_to_rotated_key() {
        let (_, keeper) = keeper(1, 1);
        let incepted = keeper.incept().await.unwrap();
        let rotated = keeper.rotate(1, true).await.unwrap();

        let promoted = rotated.signing_keys[0].qb64();
        assert!(incepted.next_key_digests[0].verify(promoted.as_bytes()));
    }

    #[tokio::test]
    async fn test_sha3_digest_algorithm() {
        let device = MemoryDevice::new([2u8; 32]);
        let state = KeyIndexState::new(0, 1, 2)
            .unwrap()
            .with_digest_algorithm(DigestAlgorithm::Sha3_256);
        let keeper = Keeper::new(device, state, KeeperConfig::default());

        let keys = keeper.incept().await.unwrap();
        assert!(keys.next_digests_qb64().iter().all(|d| d.starts_with('H')));
    }

    #[tokio::test]
    async fn test_sign_list_length_mismatch() {
        let (device, keeper) = keeper(2, 1);
        keeper.incept().await.unwrap();
        let calls = device.device_calls();

        let err = keeper
            .sign(b"m", true, Some(&[0][..]), None)
            .await
            .unwrap_err();
        assert_eq!(
            err.index_error(),
            Some(&IndexError::CountMismatch {
                expected: 2,
                got: 1
            })
        );
        assert_eq!(device.device_calls(), calls);
    }

    #[tokio::test]
    async fn test_sign_surfaces_device_rejection_and_releases() {
        let (device, keeper) = keeper(2, 1);
        keeper.incept().await.unwrap();
        device.fail_on(KeyId::derive("hwkeep", 0, 1));

        let err = keeper.sign(b"m", true, None, None).await.unwrap_err();
        assert!(matches!(err, KeeperError::Device(DeviceError::Rejected(_))));
        assert_eq!(device.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_p256_keeper() {
        let device = MemoryDevice::new([4u8; 32]);
        let state = KeyIndexState::new(0, 1, 1).unwrap();
        let keeper = Keeper::new(device, state, KeeperConfig::for_curve(Curve::NistP256));

        let keys = keeper.incept().await.unwrap();
        assert_eq!(keys.signing_keys[0].code(), MatterCode::Ecdsa256r1);

        let sigs = keeper.sign(b"payload", true, None, None).await.unwrap();
        let siger = sigs[0].as_siger().unwrap();
        assert_eq!(siger.code(), IndexerCode::Ecdsa256r1CrtSig);
        assert!(sigs[0].verfer().key().verify(b"payload", sigs[0].raw()));
    }

    #[tokio::test]
    async fn test_curve25519_keeper_cannot_sign() {
        let device = Arc::new(MemoryDevice::new([4u8; 32]));
        let state = KeyIndexState::new(0, 1, 1).unwrap();
        let keeper = Keeper::new(
            Arc::clone(&device),
            state,
            KeeperConfig::for_curve(Curve::Curve25519),
        );

        let keys = keeper.incept().await.unwrap();
        assert_eq!(keys.signing_keys[0].code(), MatterCode::X25519);

        let calls = device.device_calls();
        let err = keeper.sign(b"m", false, None, None).await.unwrap_err();
        assert!(matches!(
            err,
            KeeperError::Core(CoreError::UnsupportedCurve(Curve::Curve25519))
        ));
        assert_eq!(device.device_calls(), calls);
    }
}
