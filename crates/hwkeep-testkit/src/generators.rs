//! Proptest generators for property-based testing.

use proptest::prelude::*;

use hwkeep::KeyIndexState;
use hwkeep_core::{Curve, DigestAlgorithm, IndexSpec, KeyId};

/// Generate any device curve.
pub fn curve() -> impl Strategy<Value = Curve> {
    prop_oneof![
        Just(Curve::NistP256),
        Just(Curve::Ed25519),
        Just(Curve::Curve25519),
    ]
}

/// Generate a curve that can sign.
pub fn signing_curve() -> impl Strategy<Value = Curve> {
    prop_oneof![Just(Curve::NistP256), Just(Curve::Ed25519)]
}

/// Generate a digest algorithm.
pub fn digest_algorithm() -> impl Strategy<Value = DigestAlgorithm> {
    prop_oneof![
        Just(DigestAlgorithm::Blake3_256),
        Just(DigestAlgorithm::Sha3_256),
        Just(DigestAlgorithm::Sha2_256),
    ]
}

/// Generate a derivation namespace.
pub fn namespace() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,15}".prop_map(String::from)
}

/// Generate a key identifier.
pub fn key_id() -> impl Strategy<Value = KeyId> {
    (namespace(), any::<u32>(), any::<u64>())
        .prop_map(|(ns, owner, index)| KeyId::derive(&ns, owner, index))
}

/// Generate a valid main index, small or big.
pub fn valid_index() -> impl Strategy<Value = i64> {
    prop_oneof![0i64..=63, 64i64..=4095]
}

/// Generate an index spec whose indices all resolve.
pub fn index_spec() -> impl Strategy<Value = IndexSpec> {
    (
        proptest::option::of(valid_index()),
        proptest::option::of(valid_index()),
        any::<bool>(),
    )
        .prop_map(|(main_index, other_index, only_main)| IndexSpec {
            main_index,
            other_index,
            only_main,
        })
}

/// An index spec at a position, with the indices it must resolve to.
#[derive(Debug, Clone)]
pub struct ResolvedCase {
    pub position: usize,
    pub spec: IndexSpec,
    pub expected_index: u64,
    pub expected_ondex: Option<u64>,
}

impl Arbitrary for ResolvedCase {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (0usize..64, index_spec())
            .prop_map(|(position, spec)| {
                let expected_index = spec.main_index.map_or(position as u64, |i| i as u64);
                let expected_ondex = if spec.only_main {
                    None
                } else {
                    Some(spec.other_index.map_or(expected_index, |o| o as u64))
                };
                ResolvedCase {
                    position,
                    spec,
                    expected_index,
                    expected_ondex,
                }
            })
            .boxed()
    }
}

/// Parameters for a fresh key index state.
#[derive(Debug, Clone)]
pub struct KeyStateParams {
    pub owner_index: u32,
    pub signing_count: u32,
    pub next_count: u32,
    pub namespace: String,
    pub digest_algorithm: DigestAlgorithm,
    pub transferable: bool,
}

impl KeyStateParams {
    /// Build the inceptive state these parameters describe.
    pub fn state(&self) -> KeyIndexState {
        KeyIndexState::new(self.owner_index, self.signing_count, self.next_count)
            .expect("generated counts are positive")
            .with_namespace(self.namespace.clone())
            .with_digest_algorithm(self.digest_algorithm)
            .with_transferable(self.transferable)
    }
}

impl Arbitrary for KeyStateParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            0u32..16,
            1u32..6,
            1u32..6,
            namespace(),
            digest_algorithm(),
            any::<bool>(),
        )
            .prop_map(
                |(owner_index, signing_count, next_count, namespace, digest_algorithm, transferable)| {
                    KeyStateParams {
                        owner_index,
                        signing_count,
                        next_count,
                        namespace,
                        digest_algorithm,
                        transferable,
                    }
                },
            )
            .boxed()
    }
}

/// Generate a sequence of rotations as (next count, transferable) pairs.
pub fn rotations(max_len: usize) -> impl Strategy<Value = Vec<(u32, bool)>> {
    prop::collection::vec((1u32..6, any::<bool>()), 1..=max_len)
}
