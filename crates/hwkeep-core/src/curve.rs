//! Curve point recovery for compressed public keys returned by a device.
//!
//! The device hands back every public key as a 33-byte blob: one selector
//! byte followed by 32 bytes of curve-specific payload. The Edwards family
//! uses a device-specific `0x00`/`0x01` marker in front of the encoded
//! point, while NIST P-256 uses the SEC1 `0x02`/`0x03` parity marker in
//! front of the x-coordinate.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signature as Ed25519Signature, Verifier, VerifyingKey as Ed25519VerifyingKey};
use p256::ecdsa::{Signature as P256Signature, VerifyingKey as P256VerifyingKey};
use p256::elliptic_curve::ff::PrimeField;
use p256::{EncodedPoint, FieldBytes, NistP256};
use primeorder::PrimeCurveParams;
use serde::{Deserialize, Serialize};

use crate::error::{DecompressionError, UnknownCurve};

/// Length of a compressed public key blob.
pub const COMPRESSED_KEY_LEN: usize = 33;

type P256Field = <NistP256 as PrimeCurveParams>::FieldElement;

/// `(P + 1) / 4` for the P-256 base field as little-endian 64-bit limbs.
///
/// `P ≡ 3 (mod 4)`, so raising a quadratic residue to this power yields
/// one of its square roots.
const P256_SQRT_EXPONENT: [u64; 4] = [
    0x0000_0000_0000_0000,
    0x0000_0000_4000_0000,
    0x4000_0000_0000_0000,
    0x3fff_ffff_c000_0000,
];

/// Curves a device can derive keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Curve {
    #[serde(rename = "nist256p1")]
    NistP256,
    #[serde(rename = "ed25519")]
    Ed25519,
    #[serde(rename = "curve25519")]
    Curve25519,
}

impl Curve {
    /// The device-facing curve name.
    pub const fn name(&self) -> &'static str {
        match self {
            Curve::NistP256 => "nist256p1",
            Curve::Ed25519 => "ed25519",
            Curve::Curve25519 => "curve25519",
        }
    }

    /// The key agreement curve paired with this signing curve.
    pub const fn ecdh_curve(&self) -> Curve {
        match self {
            Curve::NistP256 => Curve::NistP256,
            Curve::Ed25519 | Curve::Curve25519 => Curve::Curve25519,
        }
    }

    /// Whether keys on this curve produce signatures.
    pub const fn can_sign(&self) -> bool {
        !matches!(self, Curve::Curve25519)
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Curve {
    type Err = UnknownCurve;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nist256p1" => Ok(Curve::NistP256),
            "ed25519" => Ok(Curve::Ed25519),
            "curve25519" => Ok(Curve::Curve25519),
            other => Err(UnknownCurve(other.to_string())),
        }
    }
}

/// The selector byte a device puts in front of an Edwards-family key.
///
/// This is not a point compression marker. The device sets it when
/// answering public key and identity signing requests, and only these two
/// values are ever produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdwardsMarker {
    Zero,
    One,
}

impl EdwardsMarker {
    /// Parse a selector byte.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(EdwardsMarker::Zero),
            0x01 => Some(EdwardsMarker::One),
            _ => None,
        }
    }

    /// The selector byte.
    pub const fn byte(&self) -> u8 {
        match self {
            EdwardsMarker::Zero => 0x00,
            EdwardsMarker::One => 0x01,
        }
    }
}

/// A public key recovered from a device blob, tagged with its curve.
#[derive(Clone, PartialEq, Eq)]
pub enum VerificationKey {
    Ed25519 {
        key: Ed25519VerifyingKey,
        marker: EdwardsMarker,
    },
    Curve25519 {
        key: x25519_dalek::PublicKey,
        marker: EdwardsMarker,
    },
    NistP256(P256VerifyingKey),
}

impl VerificationKey {
    /// The curve this key lives on.
    pub fn curve(&self) -> Curve {
        match self {
            VerificationKey::Ed25519 { .. } => Curve::Ed25519,
            VerificationKey::Curve25519 { .. } => Curve::Curve25519,
            VerificationKey::NistP256(_) => Curve::NistP256,
        }
    }

    /// The key bytes carried inside an encoded primitive.
    ///
    /// 32 bytes for the Edwards family, the 33-byte SEC1 compressed point
    /// for P-256.
    pub fn raw(&self) -> Vec<u8> {
        match self {
            VerificationKey::Ed25519 { key, .. } => key.to_bytes().to_vec(),
            VerificationKey::Curve25519 { key, .. } => key.as_bytes().to_vec(),
            VerificationKey::NistP256(key) => key.to_encoded_point(true).as_bytes().to_vec(),
        }
    }

    /// Re-compress into the device's 33-byte blob form.
    pub fn to_compressed(&self) -> [u8; COMPRESSED_KEY_LEN] {
        let mut out = [0u8; COMPRESSED_KEY_LEN];
        match self {
            VerificationKey::Ed25519 { key, marker } => {
                out[0] = marker.byte();
                out[1..].copy_from_slice(key.as_bytes());
            }
            VerificationKey::Curve25519 { key, marker } => {
                out[0] = marker.byte();
                out[1..].copy_from_slice(key.as_bytes());
            }
            VerificationKey::NistP256(key) => {
                out.copy_from_slice(key.to_encoded_point(true).as_bytes());
            }
        }
        out
    }

    /// Check a raw signature over `message`.
    ///
    /// Curve25519 keys never verify anything.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            VerificationKey::Ed25519 { key, .. } => Ed25519Signature::from_slice(signature)
                .map(|sig| key.verify(message, &sig).is_ok())
                .unwrap_or(false),
            VerificationKey::Curve25519 { .. } => false,
            VerificationKey::NistP256(key) => P256Signature::from_slice(signature)
                .map(|sig| key.verify(message, &sig).is_ok())
                .unwrap_or(false),
        }
    }

    /// Convert to hex string of the compressed form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_compressed())
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerificationKey({}, {})", self.curve(), &self.to_hex()[..16])
    }
}

/// Recover a verification key from a compressed device blob.
pub fn recover(blob: &[u8], curve: Curve) -> Result<VerificationKey, DecompressionError> {
    if blob.len() != COMPRESSED_KEY_LEN {
        return Err(DecompressionError::InvalidLength {
            curve,
            len: blob.len(),
        });
    }

    match curve {
        Curve::Ed25519 | Curve::Curve25519 => recover_edwards(blob, curve),
        Curve::NistP256 => recover_nist256(blob),
    }
}

fn recover_edwards(blob: &[u8], curve: Curve) -> Result<VerificationKey, DecompressionError> {
    let marker = EdwardsMarker::from_byte(blob[0]).ok_or(DecompressionError::InvalidSelector {
        curve,
        selector: blob[0],
    })?;

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&blob[1..]);

    if curve == Curve::Curve25519 {
        return Ok(VerificationKey::Curve25519 {
            key: x25519_dalek::PublicKey::from(bytes),
            marker,
        });
    }

    let key = Ed25519VerifyingKey::from_bytes(&bytes)
        .map_err(|_| invalid_point(curve, blob, "not an encoded Edwards point"))?;
    Ok(VerificationKey::Ed25519 { key, marker })
}

fn recover_nist256(blob: &[u8]) -> Result<VerificationKey, DecompressionError> {
    let curve = Curve::NistP256;
    let parity = match blob[0] {
        0x02 => false,
        0x03 => true,
        selector => return Err(DecompressionError::InvalidSelector { curve, selector }),
    };

    let x_bytes = FieldBytes::clone_from_slice(&blob[1..]);
    let x = Option::<P256Field>::from(P256Field::from_repr(x_bytes))
        .ok_or_else(|| invalid_point(curve, blob, "x-coordinate is not reduced modulo p"))?;

    let alpha = x * x * x + NistP256::EQUATION_A * x + NistP256::EQUATION_B;
    let beta = alpha.pow_vartime(&P256_SQRT_EXPONENT);

    // (beta + parity) odd selects the other root, P - beta.
    let y = if bool::from(beta.is_odd()) != parity {
        -beta
    } else {
        beta
    };

    if y.square() != alpha {
        return Err(invalid_point(curve, blob, "point is not on the curve"));
    }

    let point = EncodedPoint::from_affine_coordinates(&x.to_repr(), &y.to_repr(), false);
    let key = P256VerifyingKey::from_encoded_point(&point)
        .map_err(|_| invalid_point(curve, blob, "point is not a valid public key"))?;
    Ok(VerificationKey::NistP256(key))
}

fn invalid_point(curve: Curve, blob: &[u8], reason: &'static str) -> DecompressionError {
    DecompressionError::InvalidPoint {
        curve,
        blob: hex::encode(blob),
        reason,
    }
}
