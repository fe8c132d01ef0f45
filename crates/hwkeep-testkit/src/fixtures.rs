//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use hwkeep::{Keeper, KeeperConfig, KeyIndexState};
use hwkeep_core::Curve;
use hwkeep_device::MemoryDevice;

/// Seed used by fixtures that do not ask for one.
pub const DEFAULT_SEED: [u8; 32] = [0x42; 32];

/// A keeper over a shared in-memory device.
///
/// The fixture keeps its own handle on the device so tests can inspect call
/// counts and open sessions after driving the keeper.
pub struct KeeperFixture {
    pub device: Arc<MemoryDevice>,
    pub keeper: Keeper<Arc<MemoryDevice>>,
}

impl KeeperFixture {
    /// Ed25519 keeper for owner 0 with the given counts.
    pub fn new(signing_count: u32, next_count: u32) -> Self {
        Self::with_state(
            DEFAULT_SEED,
            state(0, signing_count, next_count),
            KeeperConfig::default(),
        )
    }

    /// Keeper on `curve` for owner 0 with the given counts.
    pub fn on_curve(curve: Curve, signing_count: u32, next_count: u32) -> Self {
        Self::with_state(
            DEFAULT_SEED,
            state(0, signing_count, next_count),
            KeeperConfig::for_curve(curve),
        )
    }

    /// Keeper with full control over seed, state and configuration.
    pub fn with_state(seed: [u8; 32], state: KeyIndexState, config: KeeperConfig) -> Self {
        let device = Arc::new(MemoryDevice::new(seed));
        let keeper = Keeper::new(Arc::clone(&device), state, config);
        Self { device, keeper }
    }

    /// A second keeper over the same device, for `state`.
    pub fn sibling(&self, state: KeyIndexState) -> Keeper<Arc<MemoryDevice>> {
        Keeper::new(
            Arc::clone(&self.device),
            state,
            self.keeper.config().clone(),
        )
    }
}

/// Fixtures for several owners, each on its own device seed.
pub fn multi_owner_fixtures(count: u32) -> Vec<KeeperFixture> {
    (0..count)
        .map(|owner| {
            let mut seed = DEFAULT_SEED;
            seed[0] = owner as u8;
            KeeperFixture::with_state(seed, state(owner, 1, 1), KeeperConfig::default())
        })
        .collect()
}

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn state(owner: u32, signing_count: u32, next_count: u32) -> KeyIndexState {
    KeyIndexState::new(owner, signing_count, next_count).expect("fixture counts must be positive")
}
