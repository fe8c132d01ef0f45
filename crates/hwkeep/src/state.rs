//! Key index state: which device derivation index backs which key slot.
//!
//! Signing keys occupy `key_base_index .. key_base_index + signing_count`.
//! Next keys follow immediately after. Rotation promotes the next range to
//! signing and derives a fresh next range past everything issued so far:
//!
//! ```text
//! inception (base 0, 2 signing, 3 next):   [0 1][2 3 4]
//! rotation  (new next count 1):                 [2 3 4][5]
//! ```
//!
//! Mutation goes through plans. A plan is computed from an immutable view,
//! the device work runs, and only then is the plan committed. A failed
//! batch never touches the state.

use hwkeep_core::{DigestAlgorithm, KeyId};
use serde::{Deserialize, Serialize};

use crate::error::{KeeperError, Result};

/// Default derivation path label.
pub const DEFAULT_NAMESPACE: &str = "hwkeep";

/// Lifecycle phase of a key index state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Created, no keys issued yet.
    Inceptive,
    /// Incepted. Can sign and rotate.
    Active,
}

/// A snapshot of the parameters a caller persists between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyParams {
    pub owner_index: u32,
    pub key_base_index: u64,
    pub signing_count: u32,
    pub next_count: u32,
    pub digest_algorithm: DigestAlgorithm,
    pub transferable: bool,
    pub namespace: String,
}

impl KeyParams {
    /// Encode as CBOR.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| KeeperError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from CBOR.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| KeeperError::Serialization(e.to_string()))
    }
}

/// Key identifiers for an inception, plus the high-water mark it reaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InceptionPlan {
    pub signing: Vec<KeyId>,
    pub next: Vec<KeyId>,
    issued_until: u64,
}

/// Key identifiers and new counters for a rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPlan {
    pub signing: Vec<KeyId>,
    pub next: Vec<KeyId>,
    pub transferable: bool,
    from_base: u64,
    key_base_index: u64,
    signing_count: u32,
    next_count: u32,
    issued_until: u64,
}

impl RotationPlan {
    /// The key base index after the rotation is committed.
    pub fn key_base_index(&self) -> u64 {
        self.key_base_index
    }
}

/// The key index state machine for one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyIndexState {
    owner_index: u32,
    key_base_index: u64,
    signing_count: u32,
    next_count: u32,
    transferable: bool,
    namespace: String,
    digest_algorithm: DigestAlgorithm,
    phase: Phase,
    /// Exclusive upper bound of every derivation index ever issued.
    issued_until: u64,
}

impl KeyIndexState {
    /// A fresh state with transferable keys starting at derivation index 0.
    pub fn new(owner_index: u32, signing_count: u32, next_count: u32) -> Result<Self> {
        check_count("signing_count", signing_count)?;
        check_count("next_count", next_count)?;
        Ok(Self {
            owner_index,
            key_base_index: 0,
            signing_count,
            next_count,
            transferable: true,
            namespace: DEFAULT_NAMESPACE.to_string(),
            digest_algorithm: DigestAlgorithm::default(),
            phase: Phase::Inceptive,
            issued_until: 0,
        })
    }

    /// Start deriving at `key_base_index` instead of 0.
    pub fn with_key_base_index(mut self, key_base_index: u64) -> Self {
        self.key_base_index = key_base_index;
        self.issued_until = key_base_index;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_digest_algorithm(mut self, digest_algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = digest_algorithm;
        self
    }

    pub fn with_transferable(mut self, transferable: bool) -> Self {
        self.transferable = transferable;
        self
    }

    /// Rebuild an incepted state from a persisted snapshot.
    ///
    /// Everything up to the end of the snapshot's next range counts as
    /// issued.
    pub fn restore(params: KeyParams) -> Result<Self> {
        check_count("signing_count", params.signing_count)?;
        check_count("next_count", params.next_count)?;
        let issued_until = range_end(
            params.key_base_index,
            u64::from(params.signing_count) + u64::from(params.next_count),
        )?;
        Ok(Self {
            owner_index: params.owner_index,
            key_base_index: params.key_base_index,
            signing_count: params.signing_count,
            next_count: params.next_count,
            transferable: params.transferable,
            namespace: params.namespace,
            digest_algorithm: params.digest_algorithm,
            phase: Phase::Active,
            issued_until,
        })
    }

    /// The persisted snapshot of this state.
    pub fn params(&self) -> KeyParams {
        KeyParams {
            owner_index: self.owner_index,
            key_base_index: self.key_base_index,
            signing_count: self.signing_count,
            next_count: self.next_count,
            digest_algorithm: self.digest_algorithm,
            transferable: self.transferable,
            namespace: self.namespace.clone(),
        }
    }

    pub fn owner_index(&self) -> u32 {
        self.owner_index
    }

    pub fn key_base_index(&self) -> u64 {
        self.key_base_index
    }

    pub fn signing_count(&self) -> u32 {
        self.signing_count
    }

    pub fn next_count(&self) -> u32 {
        self.next_count
    }

    pub fn transferable(&self) -> bool {
        self.transferable
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest_algorithm
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn issued_until(&self) -> u64 {
        self.issued_until
    }

    /// Fail unless the state has been incepted.
    pub fn require_active(&self) -> Result<()> {
        match self.phase {
            Phase::Active => Ok(()),
            Phase::Inceptive => Err(KeeperError::StateConsistency(
                "key state has not been incepted".into(),
            )),
        }
    }

    /// Identifiers of the current signing keys.
    pub fn signing_key_ids(&self) -> Vec<KeyId> {
        self.key_ids(self.key_base_index, self.signing_count)
    }

    /// Identifiers of the committed next keys.
    pub fn next_key_ids(&self) -> Result<Vec<KeyId>> {
        let start = range_end(self.key_base_index, u64::from(self.signing_count))?;
        Ok(self.key_ids(start, self.next_count))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inception
    // ─────────────────────────────────────────────────────────────────────────

    /// Plan an inception. The key base index does not move.
    pub fn plan_inception(&self) -> Result<InceptionPlan> {
        if self.phase != Phase::Inceptive {
            return Err(KeeperError::StateConsistency(
                "key state is already incepted".into(),
            ));
        }
        let next_start = range_end(self.key_base_index, u64::from(self.signing_count))?;
        let issued_until = range_end(next_start, u64::from(self.next_count))?;

        Ok(InceptionPlan {
            signing: self.signing_key_ids(),
            next: self.key_ids(next_start, self.next_count),
            issued_until,
        })
    }

    /// Apply an inception plan computed from this state.
    pub fn commit_inception(&mut self, plan: InceptionPlan) -> Result<()> {
        if self.phase != Phase::Inceptive || plan.issued_until < self.issued_until {
            return Err(KeeperError::StateConsistency(
                "inception plan does not match the key state".into(),
            ));
        }
        self.phase = Phase::Active;
        self.issued_until = plan.issued_until;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rotation
    // ─────────────────────────────────────────────────────────────────────────

    /// Plan a rotation.
    ///
    /// The previous next keys become the signing keys and `new_next_count`
    /// fresh keys are derived past the issued high-water mark.
    pub fn plan_rotation(&self, new_next_count: u32, transferable: bool) -> Result<RotationPlan> {
        self.require_active()?;
        check_count("next_count", new_next_count)?;

        let key_base_index = range_end(self.key_base_index, u64::from(self.signing_count))?;
        let next_start = range_end(key_base_index, u64::from(self.next_count))?;
        if next_start != self.issued_until {
            return Err(KeeperError::StateConsistency(format!(
                "rotation would derive next keys from {next_start}, but indices up to {} are issued",
                self.issued_until
            )));
        }
        let issued_until = range_end(next_start, u64::from(new_next_count))?;

        Ok(RotationPlan {
            signing: self.key_ids(key_base_index, self.next_count),
            next: self.key_ids(next_start, new_next_count),
            transferable,
            from_base: self.key_base_index,
            key_base_index,
            signing_count: self.next_count,
            next_count: new_next_count,
            issued_until,
        })
    }

    /// Apply a rotation plan computed from this state.
    pub fn commit_rotation(&mut self, plan: RotationPlan) -> Result<()> {
        self.require_active()?;
        if plan.from_base != self.key_base_index || plan.key_base_index <= self.key_base_index {
            return Err(KeeperError::StateConsistency(format!(
                "rotation plan from base {} applied to state at base {}",
                plan.from_base, self.key_base_index
            )));
        }
        self.key_base_index = plan.key_base_index;
        self.signing_count = plan.signing_count;
        self.next_count = plan.next_count;
        self.transferable = plan.transferable;
        self.issued_until = plan.issued_until;
        Ok(())
    }

    fn key_ids(&self, start: u64, count: u32) -> Vec<KeyId> {
        KeyId::range(&self.namespace, self.owner_index, start, count)
    }
}

fn check_count(field: &'static str, count: u32) -> Result<()> {
    if count == 0 {
        return Err(KeeperError::InvalidCount { field });
    }
    Ok(())
}

fn range_end(start: u64, len: u64) -> Result<u64> {
    start
        .checked_add(len)
        .ok_or_else(|| KeeperError::StateConsistency("derivation index overflow".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(keys: &[KeyId]) -> Vec<&str> {
        keys.iter().map(KeyId::as_str).collect()
    }

    fn incepted(signing: u32, next: u32) -> KeyIndexState {
        let mut state = KeyIndexState::new(0, signing, next).unwrap();
        let plan = state.plan_inception().unwrap();
        state.commit_inception(plan).unwrap();
        state
    }

    #[test]
    fn test_new_rejects_zero_counts() {
        assert!(matches!(
            KeyIndexState::new(0, 0, 1),
            Err(KeeperError::InvalidCount {
                field: "signing_count"
            })
        ));
        assert!(matches!(
            KeyIndexState::new(0, 1, 0),
            Err(KeeperError::InvalidCount { field: "next_count" })
        ));
    }

    #[test]
    fn test_inception_plan_ranges() {
        let state = KeyIndexState::new(0, 2, 3).unwrap();
        let plan = state.plan_inception().unwrap();
        assert_eq!(ids(&plan.signing), vec!["hwkeep-0-0", "hwkeep-0-1"]);
        assert_eq!(
            ids(&plan.next),
            vec!["hwkeep-0-2", "hwkeep-0-3", "hwkeep-0-4"]
        );
        // Planning alone changes nothing.
        assert_eq!(state.phase(), Phase::Inceptive);
        assert_eq!(state.issued_until(), 0);
    }

    #[test]
    fn test_inception_does_not_move_base() {
        let state = incepted(2, 3);
        assert_eq!(state.phase(), Phase::Active);
        assert_eq!(state.key_base_index(), 0);
        assert_eq!(state.issued_until(), 5);
    }

    #[test]
    fn test_incept_twice_fails() {
        let state = incepted(1, 1);
        assert!(matches!(
            state.plan_inception(),
            Err(KeeperError::StateConsistency(_))
        ));
    }

    #[test]
    fn test_rotate_before_inception_fails() {
        let state = KeyIndexState::new(0, 1, 1).unwrap();
        assert!(matches!(
            state.plan_rotation(1, true),
            Err(KeeperError::StateConsistency(_))
        ));
        assert!(state.require_active().is_err());
    }

    #[test]
    fn test_rotation_promotes_next_range() {
        let mut state = incepted(2, 3);
        let plan = state.plan_rotation(1, false).unwrap();
        assert_eq!(
            ids(&plan.signing),
            vec!["hwkeep-0-2", "hwkeep-0-3", "hwkeep-0-4"]
        );
        assert_eq!(ids(&plan.next), vec!["hwkeep-0-5"]);

        state.commit_rotation(plan).unwrap();
        assert_eq!(state.key_base_index(), 2);
        assert_eq!(state.signing_count(), 3);
        assert_eq!(state.next_count(), 1);
        assert!(!state.transferable());
        assert_eq!(state.issued_until(), 6);
        assert_eq!(ids(&state.next_key_ids().unwrap()), vec!["hwkeep-0-5"]);
    }

    #[test]
    fn test_rotation_rejects_zero_next_count() {
        let state = incepted(1, 1);
        assert!(matches!(
            state.plan_rotation(0, true),
            Err(KeeperError::InvalidCount { field: "next_count" })
        ));
    }

    #[test]
    fn test_stale_rotation_plan_rejected() {
        let mut state = incepted(1, 1);
        let first = state.plan_rotation(1, true).unwrap();
        let stale = first.clone();
        state.commit_rotation(first).unwrap();

        let before = state.clone();
        assert!(matches!(
            state.commit_rotation(stale),
            Err(KeeperError::StateConsistency(_))
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_overflow_is_state_error() {
        let state = KeyIndexState::new(0, 2, 2)
            .unwrap()
            .with_key_base_index(u64::MAX - 1);
        assert!(matches!(
            state.plan_inception(),
            Err(KeeperError::StateConsistency(_))
        ));
    }

    #[test]
    fn test_restore_round_trip() {
        let mut state = KeyIndexState::new(3, 2, 2).unwrap().with_namespace("ns");
        let plan = state.plan_inception().unwrap();
        state.commit_inception(plan).unwrap();
        let plan = state.plan_rotation(4, true).unwrap();
        state.commit_rotation(plan).unwrap();

        let params = state.params();
        let restored = KeyIndexState::restore(params.clone()).unwrap();
        assert_eq!(restored.phase(), Phase::Active);
        assert_eq!(restored.params(), params);
        assert_eq!(restored.issued_until(), state.issued_until());

        let bytes = params.to_bytes().unwrap();
        assert_eq!(KeyParams::from_bytes(&bytes).unwrap(), params);
        assert!(matches!(
            KeyParams::from_bytes(&[0xff, 0x00]),
            Err(KeeperError::Serialization(_))
        ));
    }

    #[test]
    fn test_custom_namespace_and_owner() {
        let state = KeyIndexState::new(7, 1, 1)
            .unwrap()
            .with_namespace("wallet")
            .with_key_base_index(10);
        let plan = state.plan_inception().unwrap();
        assert_eq!(ids(&plan.signing), vec!["wallet-7-10"]);
        assert_eq!(ids(&plan.next), vec!["wallet-7-11"]);
    }

    proptest! {
        #[test]
        fn prop_rotation_never_reuses_indices(
            signing in 1u32..5,
            next in 1u32..5,
            rotations in proptest::collection::vec(1u32..5, 1..8),
        ) {
            let mut state = KeyIndexState::new(0, signing, next).unwrap();
            let plan = state.plan_inception().unwrap();
            let mut seen: std::collections::HashSet<KeyId> =
                plan.signing.iter().chain(&plan.next).cloned().collect();
            state.commit_inception(plan).unwrap();

            for new_next in rotations {
                let prior_next = state.next_key_ids().unwrap();
                let base = state.key_base_index();
                let plan = state.plan_rotation(new_next, true).unwrap();

                prop_assert_eq!(&plan.signing, &prior_next);
                for id in &plan.next {
                    prop_assert!(seen.insert(id.clone()), "reused {}", id);
                }
                state.commit_rotation(plan).unwrap();
                prop_assert!(state.key_base_index() > base);
                prop_assert_eq!(state.next_count(), new_next);
            }
        }
    }
}
