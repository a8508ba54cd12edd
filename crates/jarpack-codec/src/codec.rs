//! Codec dispatch over the BHSD family and its composites.

use std::fmt;
use std::io::Read;

use crate::bhsd::BhsdCodec;
use crate::error::{CodecError, Result};
use crate::population::PopulationCodec;
use crate::run::RunCodec;

/// Any codec a band may be transmitted with.
#[derive(Debug, Clone, PartialEq)]
pub enum Codec {
    /// A plain BHSD codec
    Bhsd(BhsdCodec),
    /// A k-split run codec
    Run(RunCodec),
    /// A favoured/token/unfavoured population codec
    Population(PopulationCodec),
}

impl Codec {
    /// Decode `n` values with an initial `last` of zero.
    pub fn decode_ints<R: Read>(&self, n: usize, r: &mut R) -> Result<Vec<i32>> {
        self.decode_ints_from(n, r, 0)
    }

    /// Decode `n` values seeded with `last`.
    pub fn decode_ints_from<R: Read>(&self, n: usize, r: &mut R, last: i64) -> Result<Vec<i32>> {
        match self {
            Self::Bhsd(c) => c.decode_ints_from(n, r, last),
            Self::Run(c) => c.decode_ints_from(n, r, last),
            Self::Population(c) => c.decode_ints(n, r),
        }
    }

    /// Encode a whole band. Composites reject this; they are assembled
    /// band-wise by the selector.
    pub fn encode_ints(&self, band: &[i32]) -> Result<Vec<u8>> {
        match self {
            Self::Bhsd(c) => c.encode_ints(band),
            Self::Run(_) => Err(CodecError::EncodeUnsupported("run codec")),
            Self::Population(_) => Err(CodecError::EncodeUnsupported("population codec")),
        }
    }

    /// The underlying BHSD codec, when this is one.
    pub const fn as_bhsd(&self) -> Option<&BhsdCodec> {
        match self {
            Self::Bhsd(c) => Some(c),
            _ => None,
        }
    }
}

impl From<BhsdCodec> for Codec {
    fn from(c: BhsdCodec) -> Self {
        Self::Bhsd(c)
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bhsd(c) => c.fmt(f),
            Self::Run(c) => c.fmt(f),
            Self::Population(c) => c.fmt(f),
        }
    }
}
