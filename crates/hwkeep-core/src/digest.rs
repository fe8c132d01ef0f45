//! Next-key commitment digests.

use serde::{Deserialize, Serialize};
use sha2::Digest;

use crate::error::Result;
use crate::primitive::{Matter, MatterCode};

/// Hash used to commit to next-key material.
///
/// Serialized as the primitive code of the digest it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    #[default]
    #[serde(rename = "E")]
    Blake3_256,
    #[serde(rename = "H")]
    Sha3_256,
    #[serde(rename = "I")]
    Sha2_256,
}

impl DigestAlgorithm {
    /// The primitive code for digests under this algorithm.
    pub const fn code(&self) -> MatterCode {
        match self {
            DigestAlgorithm::Blake3_256 => MatterCode::Blake3_256,
            DigestAlgorithm::Sha3_256 => MatterCode::Sha3_256,
            DigestAlgorithm::Sha2_256 => MatterCode::Sha2_256,
        }
    }

    /// Look up the algorithm for a primitive code.
    pub fn from_code(code: &str) -> Option<Self> {
        [
            DigestAlgorithm::Blake3_256,
            DigestAlgorithm::Sha3_256,
            DigestAlgorithm::Sha2_256,
        ]
        .into_iter()
        .find(|alg| alg.code().as_str() == code)
    }

    /// Compute the raw digest of `ser`.
    pub fn digest(&self, ser: &[u8]) -> [u8; 32] {
        match self {
            DigestAlgorithm::Blake3_256 => *blake3::hash(ser).as_bytes(),
            DigestAlgorithm::Sha3_256 => sha3::Sha3_256::digest(ser).into(),
            DigestAlgorithm::Sha2_256 => sha2::Sha256::digest(ser).into(),
        }
    }
}

/// A digest primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diger {
    algorithm: DigestAlgorithm,
    matter: Matter,
}

impl Diger {
    /// Digest `ser` under `algorithm`.
    pub fn new(algorithm: DigestAlgorithm, ser: &[u8]) -> Result<Self> {
        let matter = Matter::new(algorithm.code(), algorithm.digest(ser))?;
        Ok(Self { algorithm, matter })
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn raw(&self) -> &[u8] {
        self.matter.raw()
    }

    pub fn qb64(&self) -> String {
        self.matter.qb64()
    }

    /// Check whether `ser` digests to this value.
    pub fn verify(&self, ser: &[u8]) -> bool {
        self.algorithm.digest(ser).as_slice() == self.matter.raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_codes() {
        assert_eq!(DigestAlgorithm::default(), DigestAlgorithm::Blake3_256);
        for alg in [
            DigestAlgorithm::Blake3_256,
            DigestAlgorithm::Sha3_256,
            DigestAlgorithm::Sha2_256,
        ] {
            assert_eq!(DigestAlgorithm::from_code(alg.code().as_str()), Some(alg));
        }
        assert_eq!(DigestAlgorithm::from_code("D"), None);
    }

    #[test]
    fn test_diger_prefix_and_length() {
        let ser = b"DKxy2sgzfplyr-tgwIxS19f2OchFHtLwPWD3v4oYimBx";
        for (alg, prefix) in [
            (DigestAlgorithm::Blake3_256, "E"),
            (DigestAlgorithm::Sha3_256, "H"),
            (DigestAlgorithm::Sha2_256, "I"),
        ] {
            let diger = Diger::new(alg, ser).unwrap();
            let qb64 = diger.qb64();
            assert!(qb64.starts_with(prefix));
            assert_eq!(qb64.len(), 44);
            assert!(diger.verify(ser));
            assert!(!diger.verify(b"something else"));
        }
    }

    #[test]
    fn test_sha2_known_value() {
        let diger = Diger::new(DigestAlgorithm::Sha2_256, b"").unwrap();
        assert_eq!(
            hex::encode(diger.raw()),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_serde_uses_codes() {
        let json = serde_json::to_string(&DigestAlgorithm::Sha3_256).unwrap();
        assert_eq!(json, "\"H\"");
        let back: DigestAlgorithm = serde_json::from_str("\"E\"").unwrap();
        assert_eq!(back, DigestAlgorithm::Blake3_256);
    }
}
