//! Golden test vectors for deterministic verification.
//!
//! Each vector pins the exact qb64 text of a primitive built from fixed
//! inputs. The Ed25519 inputs are the first RFC 8032 test vector; the P-256
//! key is the curve generator.

use hwkeep_core::{encode, recover, Curve, DigestAlgorithm, Diger, SigningRequest, Verfer};
use serde::Serialize;

/// RFC 8032 test 1 public key.
pub const RFC8032_PUBLIC_KEY: &str =
    "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

/// RFC 8032 test 1 signature over the empty message.
pub const RFC8032_SIGNATURE: &str = "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e065224901555fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b";

/// Compressed NIST P-256 generator.
pub const P256_GENERATOR: &str =
    "036b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296";

/// What a vector builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VectorInput {
    /// A verification key from a device blob.
    Key { blob: String, curve: Curve, transferable: bool },
    /// A digest of the qb64 text of a transferable Ed25519 key.
    KeyDigest { blob: String, algorithm: DigestAlgorithm },
    /// A signature by the RFC 8032 key, with its indexing intent.
    Signature {
        indexed: bool,
        main_index: Option<i64>,
        other_index: Option<Option<i64>>,
    },
}

/// A golden test vector.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub input: VectorInput,
    /// Expected qb64 text.
    pub expected: &'static str,
}

fn ed25519_blob() -> String {
    format!("00{RFC8032_PUBLIC_KEY}")
}

fn signature(indexed: bool, main_index: Option<i64>, other_index: Option<Option<i64>>) -> VectorInput {
    VectorInput::Signature {
        indexed,
        main_index,
        other_index,
    }
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "ed25519 transferable key",
            input: VectorInput::Key {
                blob: ed25519_blob(),
                curve: Curve::Ed25519,
                transferable: true,
            },
            expected: "DNdamAGCsQq31Uv-08lkBzoO4XLz2qYjJa8CGmj3B1Ea",
        },
        GoldenVector {
            name: "ed25519 non-transferable key",
            input: VectorInput::Key {
                blob: ed25519_blob(),
                curve: Curve::Ed25519,
                transferable: false,
            },
            expected: "BNdamAGCsQq31Uv-08lkBzoO4XLz2qYjJa8CGmj3B1Ea",
        },
        GoldenVector {
            name: "p256 generator transferable key",
            input: VectorInput::Key {
                blob: P256_GENERATOR.to_string(),
                curve: Curve::NistP256,
                transferable: true,
            },
            expected: "1AAJA2sX0fLhLEJH-Lzm5WOkQPJ3A32BLeszoPShOUXYmMKW",
        },
        GoldenVector {
            name: "sha2 digest of ed25519 key",
            input: VectorInput::KeyDigest {
                blob: ed25519_blob(),
                algorithm: DigestAlgorithm::Sha2_256,
            },
            expected: "IHeDnIqj8ohlehoVqJmP8o1OuXoFET_vDDR8HTz0EbSY",
        },
        GoldenVector {
            name: "sha3 digest of ed25519 key",
            input: VectorInput::KeyDigest {
                blob: ed25519_blob(),
                algorithm: DigestAlgorithm::Sha3_256,
            },
            expected: "HJV_9SICTTay3XU-mMHjlvq_9uMgmkSNYpfEWgCLcytT",
        },
        GoldenVector {
            name: "non-indexed signature",
            input: signature(false, Some(9), Some(Some(2))),
            expected: "0BDlVkMAw2CscpCG4syAboKKhId_Hrjl2XTYc-BlIkkBVV-4ghWQozusxh45cBz5tGvSW_XwWVu-JGVRQUOOehAL",
        },
        GoldenVector {
            name: "indexed small single at 0",
            input: signature(true, None, None),
            expected: "BADlVkMAw2CscpCG4syAboKKhId_Hrjl2XTYc-BlIkkBVV-4ghWQozusxh45cBz5tGvSW_XwWVu-JGVRQUOOehAL",
        },
        GoldenVector {
            name: "indexed small dual at 5",
            input: signature(true, Some(5), Some(None)),
            expected: "AFDlVkMAw2CscpCG4syAboKKhId_Hrjl2XTYc-BlIkkBVV-4ghWQozusxh45cBz5tGvSW_XwWVu-JGVRQUOOehAL",
        },
        GoldenVector {
            name: "indexed big single at 64",
            input: signature(true, Some(64), None),
            expected: "2BBAAADlVkMAw2CscpCG4syAboKKhId_Hrjl2XTYc-BlIkkBVV-4ghWQozusxh45cBz5tGvSW_XwWVu-JGVRQUOOehAL",
        },
        GoldenVector {
            name: "indexed big dual 3/4",
            input: signature(true, Some(3), Some(Some(4))),
            expected: "2AADAEDlVkMAw2CscpCG4syAboKKhId_Hrjl2XTYc-BlIkkBVV-4ghWQozusxh45cBz5tGvSW_XwWVu-JGVRQUOOehAL",
        },
    ]
}

/// Build the qb64 text a vector describes.
pub fn render(vector: &GoldenVector) -> Result<String, String> {
    let decode = |blob: &str| hex::decode(blob).map_err(|e| e.to_string());
    match &vector.input {
        VectorInput::Key {
            blob,
            curve,
            transferable,
        } => {
            let key = recover(&decode(blob)?, *curve).map_err(|e| e.to_string())?;
            Ok(Verfer::new(key, *transferable).qb64())
        }
        VectorInput::KeyDigest { blob, algorithm } => {
            let key = recover(&decode(blob)?, Curve::Ed25519).map_err(|e| e.to_string())?;
            let verfer = Verfer::new(key, true);
            Diger::new(*algorithm, verfer.qb64().as_bytes())
                .map(|d| d.qb64())
                .map_err(|e| e.to_string())
        }
        VectorInput::Signature {
            indexed,
            main_index,
            other_index,
        } => {
            let key = recover(&decode(&ed25519_blob())?, Curve::Ed25519)
                .map_err(|e| e.to_string())?;
            let mut request = SigningRequest::new(decode(RFC8032_SIGNATURE)?, Verfer::new(key, true));
            if let Some(index) = main_index {
                request = request.main_index(*index);
            }
            if let Some(ondex) = other_index {
                request = request.other_index(*ondex);
            }
            let material = encode(&[request], *indexed).map_err(|e| e.to_string())?;
            Ok(material[0].qb64())
        }
    }
}

/// Check every vector. Returns (name, passed, detail) per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|vector| match render(vector) {
            Ok(actual) if actual == vector.expected => {
                (vector.name.to_string(), true, actual)
            }
            Ok(actual) => (
                vector.name.to_string(),
                false,
                format!("expected {}, got {actual}", vector.expected),
            ),
            Err(e) => (vector.name.to_string(), false, e),
        })
        .collect()
}

/// All vectors as pretty JSON, for other implementations to check against.
pub fn export_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    #[test]
    fn test_all_vectors_pass() {
        for (name, ok, detail) in verify_all_vectors() {
            assert!(ok, "{name}: {detail}");
        }
    }

    #[test]
    fn test_rfc8032_inputs_are_consistent() {
        let secret: [u8; 32] =
            hex::decode("9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60")
                .unwrap()
                .try_into()
                .unwrap();
        let signer = SigningKey::from_bytes(&secret);
        assert_eq!(hex::encode(signer.verifying_key().as_bytes()), RFC8032_PUBLIC_KEY);
        assert_eq!(hex::encode(signer.sign(b"").to_bytes()), RFC8032_SIGNATURE);
    }

    #[test]
    fn test_p256_generator_matches_library() {
        use p256::elliptic_curve::sec1::ToEncodedPoint;

        let encoded = p256::AffinePoint::GENERATOR.to_encoded_point(true);
        assert_eq!(hex::encode(encoded.as_bytes()), P256_GENERATOR);
    }

    #[test]
    fn test_export_json() {
        let json = export_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let vectors = parsed.as_array().unwrap();
        assert_eq!(vectors.len(), all_vectors().len());
        assert_eq!(vectors[0]["input"]["kind"], "key");
        assert_eq!(vectors[0]["input"]["curve"], "ed25519");
    }

    #[test]
    fn test_vector_names_unique() {
        let vectors = all_vectors();
        let mut names: Vec<_> = vectors.iter().map(|v| v.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), vectors.len());
    }
}
