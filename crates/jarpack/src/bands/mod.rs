//! Band sets and the shared emission plumbing.
//!
//! Every band set owns primitive arrays filled during shredding and an
//! `encode_to` that streams them through the codec selector in strict
//! band order. Selected non-default codecs prepend their specifier value
//! under the band's default codec; any extra specifier values accumulate
//! in the segment's band-headers sidecar.

pub(crate) mod attr_defs;
pub(crate) mod bc;
pub(crate) mod class;
pub(crate) mod cp;
pub(crate) mod file;
pub(crate) mod ic;
pub(crate) mod metadata;

use jarpack_codec::{BandEncoding, BhsdCodec, CodecChoice, CodecSelector};
use tracing::trace;

use crate::cp::ResolvedPool;
use crate::error::Result;

/// Sink for one segment's band bytes.
pub(crate) struct BandEmitter<'a> {
    pub selector: CodecSelector,
    pub band_headers: &'a mut Vec<i32>,
    pub out: &'a mut Vec<u8>,
}

impl BandEmitter<'_> {
    /// Encode one integer band under its default codec or a selected
    /// better one.
    pub fn band(&mut self, name: &str, values: &[i32], default: &BhsdCodec) -> Result<()> {
        let BandEncoding { bytes, choice } = self.selector.encode_band(name, values, default)?;
        match choice {
            CodecChoice::Default => self.out.extend_from_slice(&bytes),
            CodecChoice::Better { specifier, codec } => {
                trace!(band = name, codec = %codec, "band recoded");
                let first = specifier[0];
                let first = if default.is_signed() {
                    -1 - first
                } else {
                    first + default.l() as i32
                };
                default.encode_to(first, 0, self.out)?;
                self.band_headers.extend_from_slice(&specifier[1..]);
                self.out.extend_from_slice(&bytes);
            }
        }
        Ok(())
    }

    /// Emit one flag band: the high 32-bit halves first when `hi` is
    /// set, then the low halves.
    pub fn flags(&mut self, name: &str, values: &[u64], hi: bool) -> Result<()> {
        if hi {
            let hi_band: Vec<i32> = values.iter().map(|&f| (f >> 32) as i32).collect();
            self.band(&format!("{name}_hi"), &hi_band, &BhsdCodec::UNSIGNED5)?;
        }
        let lo_band: Vec<i32> = values.iter().map(|&f| f as i32).collect();
        self.band(&format!("{name}_lo"), &lo_band, &BhsdCodec::UNSIGNED5)
    }

    /// Append raw bytes outside any codec (file contents).
    pub fn raw(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }
}

/// A band family that can stream itself into an emitter once the pool is
/// resolved.
pub(crate) trait BandSet {
    /// Emit every band of the family in its fixed order.
    fn encode_to(&self, pool: &ResolvedPool, emitter: &mut BandEmitter<'_>) -> Result<()>;
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::io::Cursor;

    use jarpack_codec::BhsdCodec;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_band_with_default_codec_round_trips() {
        let mut headers = Vec::new();
        let mut out = Vec::new();
        let mut emitter = BandEmitter {
            selector: CodecSelector::new(1),
            band_headers: &mut headers,
            out: &mut out,
        };
        let values = vec![1, 2, 3, 500];
        emitter.band("test", &values, &BhsdCodec::UNSIGNED5).expect("encode");
        assert!(headers.is_empty());
        let decoded = BhsdCodec::UNSIGNED5
            .decode_ints(4, &mut Cursor::new(&out))
            .expect("decode");
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_recoded_band_carries_specifier_prefix() {
        let mut headers = Vec::new();
        let mut out = Vec::new();
        let mut emitter = BandEmitter {
            selector: CodecSelector::new(5),
            band_headers: &mut headers,
            out: &mut out,
        };
        // byte-ranged values force the BYTE1 shortcut past the
        // near-minimal margin
        let values = vec![200; 150];
        emitter.band("test", &values, &BhsdCodec::UNSIGNED5).expect("encode");

        // first value decodes above l, announcing canonical codec 1
        let mut cursor = Cursor::new(&out[..]);
        let first = BhsdCodec::UNSIGNED5.decode(&mut cursor, 0).expect("decode");
        assert_eq!(first - BhsdCodec::UNSIGNED5.l() as i32, 1);
        let rest = BhsdCodec::BYTE1
            .decode_ints(150, &mut cursor)
            .expect("decode");
        assert_eq!(rest, values);
    }

    #[test]
    fn test_flag_band_splits_high_words() {
        let mut headers = Vec::new();
        let mut out = Vec::new();
        let mut emitter = BandEmitter {
            selector: CodecSelector::new(1),
            band_headers: &mut headers,
            out: &mut out,
        };
        let values = vec![(1u64 << 35) | 17, 4];
        emitter.flags("test_flags", &values, true).expect("encode");
        let decoded = BhsdCodec::UNSIGNED5
            .decode_ints(4, &mut Cursor::new(&out))
            .expect("decode");
        assert_eq!(decoded, vec![8, 0, 17, 4]);
    }
}
