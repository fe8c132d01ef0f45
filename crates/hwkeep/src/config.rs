//! Keeper configuration.

use hwkeep_core::Curve;
use hwkeep_device::default_firmware_requirement;
use semver::VersionReq;
use serde::{Deserialize, Serialize};

/// Configuration for a [`Keeper`](crate::Keeper).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// Curve of every key the keeper derives.
    pub curve: Curve,
    /// Device firmware the keeper will talk to. Defaults to `>=1.4.0`.
    pub firmware_requirement: VersionReq,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            curve: Curve::Ed25519,
            firmware_requirement: default_firmware_requirement(),
        }
    }
}

impl KeeperConfig {
    /// Default configuration on `curve`.
    pub fn for_curve(curve: Curve) -> Self {
        Self {
            curve,
            ..Self::default()
        }
    }
}
