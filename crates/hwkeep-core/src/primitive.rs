//! Fixed code tables and qb64 text framing for self-describing primitives.
//!
//! Only the subset of the external code table this workspace emits is
//! carried here. Every entry must match the external table exactly: a
//! primitive encoded here has to parse anywhere else the protocol runs.
//!
//! ## Framing
//!
//! A raw payload of `n` bytes is prepadded with `ps = (3 - n % 3) % 3` zero
//! bytes, encoded with the URL-safe base-64 alphabet, and the first `ps`
//! characters are dropped. The code (plus any index digits) is then
//! prepended. The code length always equals `ps` modulo 4, so the result is
//! a whole number of quadlets.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{CoreError, IndexError, Result};

const B64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Encode `value` as `len` big-endian base-64 digits, left-padded with `A`.
pub fn int_to_b64(value: u64, len: usize) -> String {
    let mut digits = vec![b'A'; len];
    let mut rest = value;
    for slot in digits.iter_mut().rev() {
        *slot = B64_ALPHABET[(rest % 64) as usize];
        rest /= 64;
    }
    // Callers check capacity before encoding.
    debug_assert_eq!(rest, 0, "value {value} does not fit in {len} digits");
    String::from_utf8(digits).unwrap_or_default()
}

/// Decode big-endian base-64 digits.
pub fn b64_to_int(digits: &str) -> Result<u64> {
    digits.bytes().try_fold(0u64, |acc, c| {
        let digit = B64_ALPHABET
            .iter()
            .position(|&a| a == c)
            .ok_or_else(|| CoreError::Qb64(format!("invalid base-64 digit {:?}", c as char)))?;
        Ok(acc * 64 + digit as u64)
    })
}

fn encode_payload(raw: &[u8]) -> String {
    let ps = (3 - raw.len() % 3) % 3;
    let mut padded = vec![0u8; ps];
    padded.extend_from_slice(raw);
    let text = URL_SAFE_NO_PAD.encode(&padded);
    text[ps..].to_string()
}

fn decode_payload(text: &str, raw_size: usize) -> Result<Vec<u8>> {
    let ps = (3 - raw_size % 3) % 3;
    let mut padded = "A".repeat(ps);
    padded.push_str(text);

    let bytes = URL_SAFE_NO_PAD
        .decode(padded.as_bytes())
        .map_err(|e| CoreError::Qb64(e.to_string()))?;
    if bytes.len() != raw_size + ps {
        return Err(CoreError::Qb64(format!(
            "expected {} raw bytes, got {}",
            raw_size,
            bytes.len().saturating_sub(ps)
        )));
    }
    if bytes[..ps].iter().any(|&b| b != 0) {
        return Err(CoreError::Qb64("non-zero pad bits".to_string()));
    }
    Ok(bytes[ps..].to_vec())
}

/// Encode a non-indexed primitive whose payload size is already known to
/// match its code.
pub(crate) fn matter_qb64(code: MatterCode, raw: &[u8]) -> String {
    let mut out = String::with_capacity(code.full_size());
    out.push_str(code.as_str());
    out.push_str(&encode_payload(raw));
    out
}

fn payload_chars(raw_size: usize) -> usize {
    let ps = (3 - raw_size % 3) % 3;
    (raw_size + ps) / 3 * 4 - ps
}

/// Codes for non-indexed primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatterCode {
    /// Ed25519 verification key, non-transferable.
    Ed25519N,
    /// X25519 public key agreement key.
    X25519,
    /// Ed25519 verification key, transferable.
    Ed25519,
    Blake3_256,
    Sha3_256,
    Sha2_256,
    /// Ed25519 non-indexed signature.
    Ed25519Sig,
    /// ECDSA secp256r1 non-indexed signature.
    Ecdsa256r1Sig,
    /// ECDSA secp256r1 verification key, non-transferable.
    Ecdsa256r1N,
    /// ECDSA secp256r1 verification key, transferable.
    Ecdsa256r1,
}

impl MatterCode {
    const ALL: [MatterCode; 10] = [
        MatterCode::Ed25519N,
        MatterCode::X25519,
        MatterCode::Ed25519,
        MatterCode::Blake3_256,
        MatterCode::Sha3_256,
        MatterCode::Sha2_256,
        MatterCode::Ed25519Sig,
        MatterCode::Ecdsa256r1Sig,
        MatterCode::Ecdsa256r1N,
        MatterCode::Ecdsa256r1,
    ];

    /// The hard code text.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MatterCode::Ed25519N => "B",
            MatterCode::X25519 => "C",
            MatterCode::Ed25519 => "D",
            MatterCode::Blake3_256 => "E",
            MatterCode::Sha3_256 => "H",
            MatterCode::Sha2_256 => "I",
            MatterCode::Ed25519Sig => "0B",
            MatterCode::Ecdsa256r1Sig => "0I",
            MatterCode::Ecdsa256r1N => "1AAI",
            MatterCode::Ecdsa256r1 => "1AAJ",
        }
    }

    /// Raw payload size in bytes.
    pub const fn raw_size(&self) -> usize {
        match self {
            MatterCode::Ed25519N
            | MatterCode::X25519
            | MatterCode::Ed25519
            | MatterCode::Blake3_256
            | MatterCode::Sha3_256
            | MatterCode::Sha2_256 => 32,
            MatterCode::Ed25519Sig | MatterCode::Ecdsa256r1Sig => 64,
            MatterCode::Ecdsa256r1N | MatterCode::Ecdsa256r1 => 33,
        }
    }

    /// Total qb64 length.
    pub fn full_size(&self) -> usize {
        self.as_str().len() + payload_chars(self.raw_size())
    }

    fn from_qb64_prefix(qb64: &str) -> Result<Self> {
        if !qb64.is_ascii() {
            return Err(CoreError::Qb64("non-ascii text".to_string()));
        }
        let hard = match qb64.as_bytes().first() {
            Some(b'0') => qb64.get(..2),
            Some(b'1') => qb64.get(..4),
            Some(_) => qb64.get(..1),
            None => None,
        }
        .ok_or_else(|| CoreError::Qb64("empty or truncated code".to_string()))?;

        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == hard)
            .ok_or_else(|| CoreError::Qb64(format!("unsupported matter code {hard:?}")))
    }
}

/// A non-indexed primitive: code plus raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matter {
    code: MatterCode,
    raw: Vec<u8>,
}

impl Matter {
    /// Create a primitive, checking the payload size against the code.
    pub fn new(code: MatterCode, raw: impl Into<Vec<u8>>) -> Result<Self> {
        let raw = raw.into();
        if raw.len() != code.raw_size() {
            return Err(CoreError::Qb64(format!(
                "code {} needs {} raw bytes, got {}",
                code.as_str(),
                code.raw_size(),
                raw.len()
            )));
        }
        Ok(Self { code, raw })
    }

    pub fn code(&self) -> MatterCode {
        self.code
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Fully qualified base-64 text.
    pub fn qb64(&self) -> String {
        matter_qb64(self.code, &self.raw)
    }

    /// Parse fully qualified base-64 text.
    pub fn from_qb64(qb64: &str) -> Result<Self> {
        let code = MatterCode::from_qb64_prefix(qb64)?;
        if qb64.len() != code.full_size() {
            return Err(CoreError::Qb64(format!(
                "code {} needs {} chars, got {}",
                code.as_str(),
                code.full_size(),
                qb64.len()
            )));
        }
        let raw = decode_payload(&qb64[code.as_str().len()..], code.raw_size())?;
        Ok(Self { code, raw })
    }
}

/// Codes for indexed signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexerCode {
    /// Ed25519, small index, same index in both lists.
    Ed25519Sig,
    /// Ed25519, small index, current list only.
    Ed25519CrtSig,
    /// ECDSA secp256r1, small index, same index in both lists.
    Ecdsa256r1Sig,
    /// ECDSA secp256r1, small index, current list only.
    Ecdsa256r1CrtSig,
    /// Ed25519, big indices, both lists.
    Ed25519BigSig,
    /// Ed25519, big index, current list only.
    Ed25519BigCrtSig,
    /// ECDSA secp256r1, big indices, both lists.
    Ecdsa256r1BigSig,
    /// ECDSA secp256r1, big index, current list only.
    Ecdsa256r1BigCrtSig,
}

impl IndexerCode {
    const ALL: [IndexerCode; 8] = [
        IndexerCode::Ed25519Sig,
        IndexerCode::Ed25519CrtSig,
        IndexerCode::Ecdsa256r1Sig,
        IndexerCode::Ecdsa256r1CrtSig,
        IndexerCode::Ed25519BigSig,
        IndexerCode::Ed25519BigCrtSig,
        IndexerCode::Ecdsa256r1BigSig,
        IndexerCode::Ecdsa256r1BigCrtSig,
    ];

    /// The hard code text.
    pub const fn as_str(&self) -> &'static str {
        match self {
            IndexerCode::Ed25519Sig => "A",
            IndexerCode::Ed25519CrtSig => "B",
            IndexerCode::Ecdsa256r1Sig => "E",
            IndexerCode::Ecdsa256r1CrtSig => "F",
            IndexerCode::Ed25519BigSig => "2A",
            IndexerCode::Ed25519BigCrtSig => "2B",
            IndexerCode::Ecdsa256r1BigSig => "2E",
            IndexerCode::Ecdsa256r1BigCrtSig => "2F",
        }
    }

    /// Whether this code uses the big index slots.
    pub const fn is_big(&self) -> bool {
        matches!(
            self,
            IndexerCode::Ed25519BigSig
                | IndexerCode::Ed25519BigCrtSig
                | IndexerCode::Ecdsa256r1BigSig
                | IndexerCode::Ecdsa256r1BigCrtSig
        )
    }

    /// Whether the signature indexes the current key list only.
    pub const fn is_current_only(&self) -> bool {
        matches!(
            self,
            IndexerCode::Ed25519CrtSig
                | IndexerCode::Ecdsa256r1CrtSig
                | IndexerCode::Ed25519BigCrtSig
                | IndexerCode::Ecdsa256r1BigCrtSig
        )
    }

    /// Total index digits (main plus other).
    pub const fn index_size(&self) -> usize {
        if self.is_big() {
            4
        } else {
            1
        }
    }

    /// Other-index digits.
    pub const fn other_size(&self) -> usize {
        if self.is_big() {
            2
        } else {
            0
        }
    }

    /// Main-index digits.
    pub const fn main_size(&self) -> usize {
        self.index_size() - self.other_size()
    }

    /// Largest main index this code can carry.
    pub const fn max_index(&self) -> u64 {
        (1u64 << (6 * self.main_size())) - 1
    }

    /// Largest other index this code can carry.
    pub const fn max_other_index(&self) -> u64 {
        (1u64 << (6 * self.other_size())) - 1
    }

    pub const fn raw_size(&self) -> usize {
        64
    }

    /// Total qb64 length.
    pub fn full_size(&self) -> usize {
        self.as_str().len() + self.index_size() + payload_chars(self.raw_size())
    }

    fn from_qb64_prefix(qb64: &str) -> Result<Self> {
        if !qb64.is_ascii() {
            return Err(CoreError::Qb64("non-ascii text".to_string()));
        }
        let hard = match qb64.as_bytes().first() {
            Some(b'0'..=b'9') => qb64.get(..2),
            Some(_) => qb64.get(..1),
            None => None,
        }
        .ok_or_else(|| CoreError::Qb64("empty or truncated code".to_string()))?;

        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == hard)
            .ok_or_else(|| CoreError::Qb64(format!("unsupported indexer code {hard:?}")))
    }
}

/// An indexed signature: code, main index, optional other index, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indexer {
    code: IndexerCode,
    raw: Vec<u8>,
    index: u64,
    ondex: Option<u64>,
}

impl Indexer {
    /// Create an indexed primitive.
    ///
    /// Current-only codes carry no other index. Small both-lists codes
    /// carry an other index equal to the main index. Big both-lists codes
    /// default a missing other index to the main index.
    pub fn new(code: IndexerCode, raw: impl Into<Vec<u8>>, index: u64, ondex: Option<u64>) -> Result<Self> {
        let raw = raw.into();
        if raw.len() != code.raw_size() {
            return Err(CoreError::InvalidSignatureLength {
                expected: code.raw_size(),
                got: raw.len(),
            });
        }
        if index > code.max_index() {
            return Err(IndexError::IndexOutOfRange {
                index,
                max: code.max_index(),
            }
            .into());
        }

        let ondex = if code.is_current_only() {
            if ondex.is_some() {
                return Err(CoreError::Qb64(format!(
                    "code {} carries no other index",
                    code.as_str()
                )));
            }
            None
        } else {
            let ondex = ondex.unwrap_or(index);
            if !code.is_big() && ondex != index {
                return Err(CoreError::Qb64(format!(
                    "code {} needs other index {index}, got {ondex}",
                    code.as_str()
                )));
            }
            if code.is_big() && ondex > code.max_other_index() {
                return Err(IndexError::IndexOutOfRange {
                    index: ondex,
                    max: code.max_other_index(),
                }
                .into());
            }
            Some(ondex)
        };

        Ok(Self {
            code,
            raw,
            index,
            ondex,
        })
    }

    pub fn code(&self) -> IndexerCode {
        self.code
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn ondex(&self) -> Option<u64> {
        self.ondex
    }

    /// Fully qualified base-64 text.
    pub fn qb64(&self) -> String {
        let mut out = String::with_capacity(self.code.full_size());
        out.push_str(self.code.as_str());
        out.push_str(&int_to_b64(self.index, self.code.main_size()));
        if self.code.other_size() > 0 {
            out.push_str(&int_to_b64(
                self.ondex.unwrap_or(0),
                self.code.other_size(),
            ));
        }
        out.push_str(&encode_payload(&self.raw));
        out
    }

    /// Parse fully qualified base-64 text.
    pub fn from_qb64(qb64: &str) -> Result<Self> {
        let code = IndexerCode::from_qb64_prefix(qb64)?;
        if qb64.len() != code.full_size() {
            return Err(CoreError::Qb64(format!(
                "code {} needs {} chars, got {}",
                code.as_str(),
                code.full_size(),
                qb64.len()
            )));
        }

        let hs = code.as_str().len();
        let ms = code.main_size();
        let os = code.other_size();
        let index = b64_to_int(&qb64[hs..hs + ms])?;
        let other = b64_to_int(&qb64[hs + ms..hs + ms + os])?;

        let ondex = if code.is_current_only() {
            if other != 0 {
                return Err(CoreError::Qb64(format!(
                    "current-only code {} with other index {other}",
                    code.as_str()
                )));
            }
            None
        } else if code.is_big() {
            Some(other)
        } else {
            Some(index)
        };

        let raw = decode_payload(&qb64[hs + ms + os..], code.raw_size())?;
        Ok(Self {
            code,
            raw,
            index,
            ondex,
        })
    }
}
