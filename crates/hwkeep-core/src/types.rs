//! Strong type definitions for hwkeep.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one derived key on the device.
///
/// Formatted as `{namespace}-{owner_index}-{derivation_index}`. Devices
/// derive keys deterministically from this string, so the format must not
/// change.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyId(String);

impl KeyId {
    /// Derive the identifier for one derivation index.
    pub fn derive(namespace: &str, owner_index: u32, derivation_index: u64) -> Self {
        Self(format!("{namespace}-{owner_index}-{derivation_index}"))
    }

    /// Identifiers for `count` consecutive indices starting at `start`.
    pub fn range(namespace: &str, owner_index: u32, start: u64, count: u32) -> Vec<Self> {
        (0..u64::from(count))
            .map(|offset| Self::derive(namespace, owner_index, start + offset))
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.0)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_id_format() {
        let id = KeyId::derive("hwkeep", 0, 3);
        assert_eq!(id.as_str(), "hwkeep-0-3");
        assert_eq!(format!("{id}"), "hwkeep-0-3");
        assert_eq!(format!("{id:?}"), "KeyId(hwkeep-0-3)");
    }

    #[test]
    fn test_key_id_range() {
        let ids = KeyId::range("ns", 2, 5, 3);
        let ids: Vec<_> = ids.iter().map(KeyId::as_str).collect();
        assert_eq!(ids, vec!["ns-2-5", "ns-2-6", "ns-2-7"]);
        assert!(KeyId::range("ns", 2, 5, 0).is_empty());
    }
}
