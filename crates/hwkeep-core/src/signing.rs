//! Signature material: turning raw device signatures into primitives.
//!
//! Each raw signature is paired with the verification key that produced it
//! and the caller's indexing intent. Non-indexed signatures always use the
//! curve's plain signature code. Indexed signatures go through two steps:
//!
//! 1. [`IndexSpec::resolve`] validates the caller's indices and fills the
//!    defaults (main index from position, other index from main index).
//! 2. [`IndexForm::select`] picks small or big, single or dual.
//!
//! Keeping the steps apart keeps the 63/64 width boundary in one place.

use crate::curve::{Curve, VerificationKey};
use crate::error::{CoreError, IndexError, Result};
use crate::primitive::{matter_qb64, Indexer, IndexerCode, Matter, MatterCode};

/// Raw signature length for every signing curve.
pub const SIGNATURE_LEN: usize = 64;

/// Largest main index the small indexed codes can carry.
pub const SMALL_INDEX_MAX: u64 = 63;

/// Largest main or other index any indexed code can carry.
pub const BIG_INDEX_MAX: u64 = 4095;

/// A verification key together with its primitive code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verfer {
    key: VerificationKey,
    code: MatterCode,
}

impl Verfer {
    /// Wrap a key, picking the transferable or non-transferable code.
    ///
    /// Key agreement keys have a single code.
    pub fn new(key: VerificationKey, transferable: bool) -> Self {
        let code = match (key.curve(), transferable) {
            (Curve::Ed25519, true) => MatterCode::Ed25519,
            (Curve::Ed25519, false) => MatterCode::Ed25519N,
            (Curve::NistP256, true) => MatterCode::Ecdsa256r1,
            (Curve::NistP256, false) => MatterCode::Ecdsa256r1N,
            (Curve::Curve25519, _) => MatterCode::X25519,
        };
        Self { key, code }
    }

    pub fn key(&self) -> &VerificationKey {
        &self.key
    }

    pub fn code(&self) -> MatterCode {
        self.code
    }

    pub fn transferable(&self) -> bool {
        !matches!(self.code, MatterCode::Ed25519N | MatterCode::Ecdsa256r1N)
    }

    pub fn qb64(&self) -> String {
        matter_qb64(self.code, &self.key.raw())
    }
}

/// The signature codes used for one curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SignatureCodes {
    plain: MatterCode,
    small_single: IndexerCode,
    small_dual: IndexerCode,
    big_single: IndexerCode,
    big_dual: IndexerCode,
}

impl SignatureCodes {
    fn for_curve(curve: Curve) -> Result<Self> {
        match curve {
            Curve::Ed25519 => Ok(Self {
                plain: MatterCode::Ed25519Sig,
                small_single: IndexerCode::Ed25519CrtSig,
                small_dual: IndexerCode::Ed25519Sig,
                big_single: IndexerCode::Ed25519BigCrtSig,
                big_dual: IndexerCode::Ed25519BigSig,
            }),
            Curve::NistP256 => Ok(Self {
                plain: MatterCode::Ecdsa256r1Sig,
                small_single: IndexerCode::Ecdsa256r1CrtSig,
                small_dual: IndexerCode::Ecdsa256r1Sig,
                big_single: IndexerCode::Ecdsa256r1BigCrtSig,
                big_dual: IndexerCode::Ecdsa256r1BigSig,
            }),
            Curve::Curve25519 => Err(CoreError::UnsupportedCurve(curve)),
        }
    }

    fn indexed(&self, form: IndexForm) -> IndexerCode {
        match form {
            IndexForm::SmallSingle => self.small_single,
            IndexForm::SmallDual => self.small_dual,
            IndexForm::BigSingle => self.big_single,
            IndexForm::BigDual => self.big_dual,
        }
    }
}

/// The caller's indexing intent for one signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    /// Index into the current signing-key list. Defaults to position.
    pub main_index: Option<i64>,
    /// Index into the prior next-key list.
    pub other_index: Option<i64>,
    /// Index the current list only. Any `other_index` is then ignored.
    pub only_main: bool,
}

impl Default for IndexSpec {
    fn default() -> Self {
        Self {
            main_index: None,
            other_index: None,
            only_main: true,
        }
    }
}

impl IndexSpec {
    /// Build per-signature specs from parallel caller lists.
    ///
    /// A missing `indices` list defaults every main index to its position.
    /// A missing `ondices` list means every signature indexes the current
    /// list only; an entry of `None` in a supplied list means "same as the
    /// main index".
    pub fn from_lists(
        count: usize,
        indices: Option<&[i64]>,
        ondices: Option<&[Option<i64>]>,
    ) -> std::result::Result<Vec<Self>, IndexError> {
        if let Some(indices) = indices {
            if indices.len() != count {
                return Err(IndexError::CountMismatch {
                    expected: count,
                    got: indices.len(),
                });
            }
        }
        if let Some(ondices) = ondices {
            if ondices.len() != count {
                return Err(IndexError::CountMismatch {
                    expected: count,
                    got: ondices.len(),
                });
            }
        }

        Ok((0..count)
            .map(|j| Self {
                main_index: indices.map(|i| i[j]),
                other_index: ondices.and_then(|o| o[j]),
                only_main: ondices.is_none(),
            })
            .collect())
    }

    /// Validate and fill defaults for the signature at `position`.
    ///
    /// Negative indices are rejected even when the other index is about
    /// to be discarded.
    pub fn resolve(&self, position: usize) -> std::result::Result<ResolvedIndex, IndexError> {
        let main = match self.main_index {
            Some(i) => i,
            None => i64::try_from(position).map_err(|_| IndexError::IndexOutOfRange {
                index: position as u64,
                max: i64::MAX as u64,
            })?,
        };
        if main < 0 {
            return Err(IndexError::InvalidIndex(main));
        }
        if let Some(other) = self.other_index {
            if other < 0 {
                return Err(IndexError::InvalidOtherIndex(other));
            }
        }

        let index = main as u64;
        let ondex = if self.only_main {
            None
        } else {
            Some(self.other_index.map_or(index, |o| o as u64))
        };

        for value in std::iter::once(index).chain(ondex) {
            if value > BIG_INDEX_MAX {
                return Err(IndexError::IndexOutOfRange {
                    index: value,
                    max: BIG_INDEX_MAX,
                });
            }
        }

        Ok(ResolvedIndex { index, ondex })
    }
}

/// Indices after validation and default filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIndex {
    pub index: u64,
    /// `None` when only the current list is indexed.
    pub ondex: Option<u64>,
}

impl ResolvedIndex {
    pub fn only_main(&self) -> bool {
        self.ondex.is_none()
    }
}

/// Which indexed signature form to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexForm {
    SmallSingle,
    BigSingle,
    SmallDual,
    BigDual,
}

impl IndexForm {
    /// Pick the form for resolved indices.
    pub fn select(resolved: &ResolvedIndex) -> Self {
        let small = resolved.index <= SMALL_INDEX_MAX;
        match resolved.ondex {
            None if small => IndexForm::SmallSingle,
            None => IndexForm::BigSingle,
            Some(ondex) if small && ondex == resolved.index => IndexForm::SmallDual,
            Some(_) => IndexForm::BigDual,
        }
    }
}

/// One raw signature awaiting encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    pub signature: Vec<u8>,
    pub verfer: Verfer,
    pub index: IndexSpec,
}

impl SigningRequest {
    pub fn new(signature: impl Into<Vec<u8>>, verfer: Verfer) -> Self {
        Self {
            signature: signature.into(),
            verfer,
            index: IndexSpec::default(),
        }
    }

    /// Set the main index.
    pub fn main_index(mut self, index: i64) -> Self {
        self.index.main_index = Some(index);
        self
    }

    /// Supply an other index, switching to dual indexing. `None` defaults
    /// the other index to the main index.
    pub fn other_index(mut self, ondex: Option<i64>) -> Self {
        self.index.other_index = ondex;
        self.index.only_main = false;
        self
    }

    /// Index the current list only, discarding any other index.
    pub fn only_main(mut self) -> Self {
        self.index.only_main = true;
        self
    }

    fn encode(&self, position: usize, indexed: bool) -> Result<SignatureMaterial> {
        let curve = self.verfer.key().curve();
        let codes = SignatureCodes::for_curve(curve)?;
        if self.signature.len() != SIGNATURE_LEN {
            return Err(CoreError::InvalidSignatureLength {
                expected: SIGNATURE_LEN,
                got: self.signature.len(),
            });
        }

        if !indexed {
            let matter = Matter::new(codes.plain, self.signature.clone())?;
            return Ok(SignatureMaterial::Cigar(Cigar {
                matter,
                verfer: self.verfer.clone(),
            }));
        }

        let resolved = self.index.resolve(position)?;
        let code = codes.indexed(IndexForm::select(&resolved));
        let indexer = Indexer::new(code, self.signature.clone(), resolved.index, resolved.ondex)?;
        Ok(SignatureMaterial::Siger(Siger {
            indexer,
            verfer: self.verfer.clone(),
        }))
    }
}

/// A non-indexed signature with its verification key attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cigar {
    matter: Matter,
    verfer: Verfer,
}

impl Cigar {
    pub fn code(&self) -> MatterCode {
        self.matter.code()
    }

    pub fn qb64(&self) -> String {
        self.matter.qb64()
    }
}

/// An indexed signature with its verification key attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Siger {
    indexer: Indexer,
    verfer: Verfer,
}

impl Siger {
    pub fn code(&self) -> IndexerCode {
        self.indexer.code()
    }

    pub fn index(&self) -> u64 {
        self.indexer.index()
    }

    pub fn ondex(&self) -> Option<u64> {
        self.indexer.ondex()
    }

    pub fn qb64(&self) -> String {
        self.indexer.qb64()
    }
}

/// An encoded signature, indexed or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureMaterial {
    Cigar(Cigar),
    Siger(Siger),
}

impl SignatureMaterial {
    pub fn qb64(&self) -> String {
        match self {
            SignatureMaterial::Cigar(cigar) => cigar.qb64(),
            SignatureMaterial::Siger(siger) => siger.qb64(),
        }
    }

    /// The verification key of the signer.
    pub fn verfer(&self) -> &Verfer {
        match self {
            SignatureMaterial::Cigar(cigar) => &cigar.verfer,
            SignatureMaterial::Siger(siger) => &siger.verfer,
        }
    }

    /// The raw signature bytes.
    pub fn raw(&self) -> &[u8] {
        match self {
            SignatureMaterial::Cigar(cigar) => cigar.matter.raw(),
            SignatureMaterial::Siger(siger) => siger.indexer.raw(),
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, SignatureMaterial::Siger(_))
    }

    pub fn as_siger(&self) -> Option<&Siger> {
        match self {
            SignatureMaterial::Siger(siger) => Some(siger),
            SignatureMaterial::Cigar(_) => None,
        }
    }

    pub fn as_cigar(&self) -> Option<&Cigar> {
        match self {
            SignatureMaterial::Cigar(cigar) => Some(cigar),
            SignatureMaterial::Siger(_) => None,
        }
    }
}

/// Encode each request, preserving order.
///
/// Any failure aborts the whole batch.
pub fn encode(requests: &[SigningRequest], indexed: bool) -> Result<Vec<SignatureMaterial>> {
    requests
        .iter()
        .enumerate()
        .map(|(position, request)| request.encode(position, indexed))
        .collect()
}
