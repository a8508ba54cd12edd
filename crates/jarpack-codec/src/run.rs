//! The run codec: the first `k` values of a band use one codec, the
//! remainder another, with a single `last` threaded across the split.

use std::fmt;
use std::io::Read;

use crate::codec::Codec;
use crate::error::{CodecError, Result};

/// A `(k, A, B)` run codec.
#[derive(Debug, Clone, PartialEq)]
pub struct RunCodec {
    k: usize,
    a: Box<Codec>,
    b: Box<Codec>,
}

impl RunCodec {
    /// Build a run codec. `k` must be positive.
    pub fn new(k: usize, a: Codec, b: Codec) -> Result<Self> {
        if k == 0 {
            return Err(CodecError::InvalidCodec("run codec requires k > 0".to_string()));
        }
        Ok(Self { k, a: Box::new(a), b: Box::new(b) })
    }

    /// The split point.
    pub const fn k(&self) -> usize {
        self.k
    }

    /// The codec for the first `k` values.
    pub fn a_codec(&self) -> &Codec {
        &self.a
    }

    /// The codec for the remaining values.
    pub fn b_codec(&self) -> &Codec {
        &self.b
    }

    /// Decode `n` values: `min(k, n)` through `A`, the rest through `B`
    /// seeded with the last value `A` produced.
    pub fn decode_ints_from<R: Read>(&self, n: usize, r: &mut R, last: i64) -> Result<Vec<i32>> {
        let head = self.k.min(n);
        let mut band = self.a.decode_ints_from(head, r, last)?;
        if n > head {
            let seed = band.last().copied().map_or(last, i64::from);
            let tail = self.b.decode_ints_from(n - head, r, seed)?;
            band.extend(tail);
        }
        Ok(band)
    }
}

impl fmt::Display for RunCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run({},{},{})", self.k, self.a, self.b)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bhsd::BhsdCodec;

    #[test]
    fn test_run_requires_positive_k() {
        assert!(
            RunCodec::new(0, BhsdCodec::BYTE1.into(), BhsdCodec::BYTE1.into()).is_err()
        );
    }

    #[test]
    fn test_run_split_decode() {
        // First 3 values as bytes, remainder as UNSIGNED5
        let head = [1u8, 2, 3];
        let tail = BhsdCodec::UNSIGNED5.encode_ints(&[500, 600]).expect("encode");
        let mut stream = head.to_vec();
        stream.extend(tail);

        let codec = RunCodec::new(3, BhsdCodec::BYTE1.into(), BhsdCodec::UNSIGNED5.into())
            .expect("valid codec");
        let decoded = codec
            .decode_ints_from(5, &mut Cursor::new(&stream), 0)
            .expect("decode");
        assert_eq!(decoded, vec![1, 2, 3, 500, 600]);
    }

    #[test]
    fn test_run_carries_last_into_delta_tail() {
        // Tail is a delta codec: its first value is coded against the
        // head's final value.
        let head = [10u8];
        let mut tail = Vec::new();
        BhsdCodec::UDELTA5.encode_to(12, 10, &mut tail).expect("encode");

        let mut stream = head.to_vec();
        stream.extend(tail);
        let codec = RunCodec::new(1, BhsdCodec::BYTE1.into(), BhsdCodec::UDELTA5.into())
            .expect("valid codec");
        let decoded = codec
            .decode_ints_from(2, &mut Cursor::new(&stream), 0)
            .expect("decode");
        assert_eq!(decoded, vec![10, 12]);
    }

    #[test]
    fn test_run_rejects_direct_encoding() {
        let codec: Codec = Codec::Run(
            RunCodec::new(1, BhsdCodec::BYTE1.into(), BhsdCodec::BYTE1.into())
                .expect("valid codec"),
        );
        assert!(codec.encode_ints(&[1, 2]).is_err());
    }
}
