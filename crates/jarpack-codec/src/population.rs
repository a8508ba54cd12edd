//! The population codec: a band is split into a small set of favoured
//! values, a token per original value, and the unfavoured remainder.
//!
//! The favoured sub-band is terminated by repeating its final value once;
//! tokens are 1-based indexes into the favoured list, with zero standing
//! for "take the next unfavoured value".

use std::fmt;
use std::io::Read;

use crate::bhsd::BhsdCodec;
use crate::error::{CodecError, Result};

/// A `(favoured, token, unfavoured)` population codec.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationCodec {
    favoured: BhsdCodec,
    token: BhsdCodec,
    unfavoured: BhsdCodec,
}

impl PopulationCodec {
    /// Build a population codec from its three sub-codecs.
    pub const fn new(favoured: BhsdCodec, token: BhsdCodec, unfavoured: BhsdCodec) -> Self {
        Self { favoured, token, unfavoured }
    }

    /// The codec carrying the favoured values and their sentinel.
    pub const fn favoured_codec(&self) -> &BhsdCodec {
        &self.favoured
    }

    /// The codec carrying one token per original value.
    pub const fn token_codec(&self) -> &BhsdCodec {
        &self.token
    }

    /// The codec carrying the unfavoured values.
    pub const fn unfavoured_codec(&self) -> &BhsdCodec {
        &self.unfavoured
    }

    /// Decode `n` values: favoured values up to the repeated sentinel,
    /// then `n` tokens, then one unfavoured value per zero token.
    pub fn decode_ints<R: Read>(&self, n: usize, r: &mut R) -> Result<Vec<i32>> {
        let mut favoured: Vec<i32> = Vec::new();
        let mut last = 0i64;
        loop {
            let v = self.favoured.decode(r, last)?;
            if favoured.last().is_some_and(|&p| p == v) {
                break;
            }
            favoured.push(v);
            last = i64::from(v);
            if favoured.len() > n {
                return Err(CodecError::InvalidCodec(
                    "favoured sub-band missing its sentinel".to_string(),
                ));
            }
        }
        self.favoured.normalize_band(&mut favoured);

        let tokens = self.token.decode_ints(n, r)?;
        let unfavoured_count = tokens.iter().filter(|&&t| t == 0).count();
        let unfavoured = self.unfavoured.decode_ints(unfavoured_count, r)?;

        let mut out = Vec::with_capacity(n);
        let mut next_unfavoured = unfavoured.into_iter();
        for t in tokens {
            if t == 0 {
                out.push(next_unfavoured.next().ok_or_else(|| {
                    CodecError::InvalidCodec("unfavoured sub-band underflow".to_string())
                })?);
            } else {
                let idx = (t - 1) as usize;
                let v = favoured.get(idx).copied().ok_or_else(|| {
                    CodecError::InvalidCodec(format!("token {t} beyond favoured set"))
                })?;
                out.push(v);
            }
        }
        Ok(out)
    }
}

impl fmt::Display for PopulationCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pop({},{},{})", self.favoured, self.token, self.unfavoured)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_population_decode() {
        // favoured = [7, 9], sentinel repeats the 9
        let codec =
            PopulationCodec::new(BhsdCodec::UNSIGNED5, BhsdCodec::BYTE1, BhsdCodec::UNSIGNED5);
        let mut stream = BhsdCodec::UNSIGNED5.encode_ints(&[7, 9, 9]).expect("encode");
        // tokens for band [7, 300, 9, 7, 400]
        stream.extend(BhsdCodec::BYTE1.encode_ints(&[1, 0, 2, 1, 0]).expect("encode"));
        stream.extend(BhsdCodec::UNSIGNED5.encode_ints(&[300, 400]).expect("encode"));

        let decoded = codec.decode_ints(5, &mut Cursor::new(&stream)).expect("decode");
        assert_eq!(decoded, vec![7, 300, 9, 7, 400]);
    }

    #[test]
    fn test_population_rejects_missing_sentinel() {
        let codec = PopulationCodec::new(BhsdCodec::BYTE1, BhsdCodec::BYTE1, BhsdCodec::BYTE1);
        // strictly increasing bytes never repeat, so no sentinel appears
        let stream: Vec<u8> = (0..=10).collect();
        assert!(codec.decode_ints(3, &mut Cursor::new(&stream)).is_err());
    }

    #[test]
    fn test_population_rejects_bad_token() {
        let codec = PopulationCodec::new(BhsdCodec::BYTE1, BhsdCodec::BYTE1, BhsdCodec::BYTE1);
        let mut stream = vec![5u8, 5]; // favoured = [5]
        stream.extend([9u8]); // token 9 with only one favoured value
        assert!(codec.decode_ints(1, &mut Cursor::new(&stream)).is_err());
    }
}
