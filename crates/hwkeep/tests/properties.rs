//! Property tests driving a keeper through generated rotation histories.

use std::collections::HashSet;

use hwkeep::KeeperConfig;
use hwkeep_testkit::fixtures::{KeeperFixture, DEFAULT_SEED};
use hwkeep_testkit::generators::{curve, rotations, signing_curve, KeyStateParams};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("test runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn rotation_history_never_reuses_keys(params: KeyStateParams, history in rotations(6)) {
        let fixture = KeeperFixture::with_state(DEFAULT_SEED, params.state(), KeeperConfig::default());

        runtime().block_on(async {
            let incepted = fixture.keeper.incept().await.unwrap();
            let mut signing_seen: HashSet<String> = incepted.signing_qb64().into_iter().collect();
            let mut committed = incepted.next_key_digests;
            let mut base = fixture.keeper.params().await.key_base_index;

            for (next_count, transferable) in history {
                let rotated = fixture.keeper.rotate(next_count, transferable).await.unwrap();

                // Each promoted key was committed to by digest one step earlier.
                prop_assert_eq!(rotated.signing_keys.len(), committed.len());
                if transferable {
                    for (verfer, digest) in rotated.signing_keys.iter().zip(&committed) {
                        prop_assert!(digest.verify(verfer.qb64().as_bytes()));
                    }
                }
                for key in rotated.signing_qb64() {
                    prop_assert!(signing_seen.insert(key));
                }

                let now = fixture.keeper.params().await;
                prop_assert!(now.key_base_index > base);
                prop_assert_eq!(now.next_count, next_count);
                base = now.key_base_index;
                committed = rotated.next_key_digests;
            }
            Ok(())
        })?;
    }

    #[test]
    fn signature_count_matches_signing_count(params: KeyStateParams, indexed in any::<bool>()) {
        let fixture = KeeperFixture::with_state(DEFAULT_SEED, params.state(), KeeperConfig::default());

        runtime().block_on(async {
            fixture.keeper.incept().await.unwrap();
            let signatures = fixture.keeper.sign(b"body", indexed, None, None).await.unwrap();
            prop_assert_eq!(signatures.len(), params.signing_count as usize);
            for (slot, signature) in signatures.iter().enumerate() {
                prop_assert_eq!(signature.is_indexed(), indexed);
                if let Some(siger) = signature.as_siger() {
                    prop_assert_eq!(siger.index(), slot as u64);
                }
                prop_assert!(signature.verfer().key().verify(b"body", signature.raw()));
            }
            Ok(())
        })?;
    }

    #[test]
    fn inception_recovers_keys_on_any_curve(key_curve in curve(), signing in 1u32..4, next in 1u32..4) {
        let fixture = KeeperFixture::on_curve(key_curve, signing, next);

        runtime().block_on(async {
            let keys = fixture.keeper.incept().await.unwrap();
            prop_assert_eq!(keys.signing_keys.len(), signing as usize);
            prop_assert_eq!(keys.next_key_digests.len(), next as usize);
            for verfer in &keys.signing_keys {
                prop_assert_eq!(verfer.key().curve(), key_curve);
            }
            Ok(())
        })?;
    }

    #[test]
    fn signatures_verify_on_signing_curves(key_curve in signing_curve(), signing in 1u32..4, message in prop::collection::vec(any::<u8>(), 0..64)) {
        let fixture = KeeperFixture::on_curve(key_curve, signing, 1);

        runtime().block_on(async {
            fixture.keeper.incept().await.unwrap();
            let signatures = fixture.keeper.sign(&message, true, None, None).await.unwrap();
            prop_assert_eq!(signatures.len(), signing as usize);
            for signature in &signatures {
                prop_assert!(signature.verfer().key().verify(&message, signature.raw()));
            }
            Ok(())
        })?;
    }
}

