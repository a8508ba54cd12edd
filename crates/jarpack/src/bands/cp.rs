//! Constant-pool bands, derived entirely from the resolved pool.

use jarpack_codec::BhsdCodec;

use crate::bands::{BandEmitter, BandSet};
use crate::cp::ResolvedPool;
use crate::error::Result;

/// Any UTF-16 unit above this routes a string's suffix into the big-chars
/// sidecar band.
const BIG_CHAR_LIMIT: u16 = 0xFF;

/// The constant-pool band family.
#[derive(Debug, Default)]
pub(crate) struct CpBands;

impl BandSet for CpBands {
    fn encode_to(&self, pool: &ResolvedPool, emitter: &mut BandEmitter<'_>) -> Result<()> {
        self.encode_utf8(pool, emitter)?;

        let ints: Vec<i32> = pool.int_order.iter().map(|&i| pool.int_at(i)).collect();
        emitter.band("cp_Int", &ints, &BhsdCodec::UDELTA5)?;

        let floats: Vec<i32> =
            pool.float_order.iter().map(|&i| pool.float_bits_at(i) as i32).collect();
        emitter.band("cp_Float", &floats, &BhsdCodec::UDELTA5)?;

        let longs: Vec<i64> = pool.long_order.iter().map(|&i| pool.long_at(i)).collect();
        let long_hi: Vec<i32> = longs.iter().map(|&v| (v >> 32) as i32).collect();
        let long_lo: Vec<i32> = longs.iter().map(|&v| v as i32).collect();
        emitter.band("cp_Long_hi", &long_hi, &BhsdCodec::UDELTA5)?;
        emitter.band("cp_Long_lo", &long_lo, &BhsdCodec::DELTA5)?;

        let doubles: Vec<u64> =
            pool.double_order.iter().map(|&i| pool.double_bits_at(i)).collect();
        let double_hi: Vec<i32> = doubles.iter().map(|&v| (v >> 32) as i32).collect();
        let double_lo: Vec<i32> = doubles.iter().map(|&v| v as i32).collect();
        emitter.band("cp_Double_hi", &double_hi, &BhsdCodec::UDELTA5)?;
        emitter.band("cp_Double_lo", &double_lo, &BhsdCodec::DELTA5)?;

        let strings: Vec<i32> = pool
            .string_order
            .iter()
            .map(|&i| pool.utf8_index(pool.string_utf8_at(i)))
            .collect();
        emitter.band("cp_String", &strings, &BhsdCodec::UDELTA5)?;

        let classes: Vec<i32> = pool
            .class_order
            .iter()
            .map(|&i| pool.utf8_index(pool.class_at(i).name))
            .collect();
        emitter.band("cp_Class", &classes, &BhsdCodec::UDELTA5)?;

        let mut sig_form = Vec::new();
        let mut sig_classes = Vec::new();
        for &i in &pool.sig_order {
            let entry = pool.signature_at(i);
            sig_form.push(pool.utf8_index(entry.form));
            for &class in &entry.classes {
                sig_classes.push(pool.class_index(class));
            }
        }
        emitter.band("cp_Signature_form", &sig_form, &BhsdCodec::DELTA5)?;
        emitter.band("cp_Signature_classes", &sig_classes, &BhsdCodec::UDELTA5)?;

        let mut descr_name = Vec::new();
        let mut descr_type = Vec::new();
        for &i in &pool.descr_order {
            let entry = pool.descr_at(i);
            descr_name.push(pool.utf8_index(entry.name));
            descr_type.push(pool.sig_index(entry.sig));
        }
        emitter.band("cp_Descr_name", &descr_name, &BhsdCodec::DELTA5)?;
        emitter.band("cp_Descr_type", &descr_type, &BhsdCodec::UDELTA5)?;

        type MemberAt = fn(&ResolvedPool, usize) -> crate::cp::MemberEntry;
        for (name, order, at) in [
            ("cp_Field", &pool.field_order, ResolvedPool::field_at as MemberAt),
            ("cp_Method", &pool.method_order, ResolvedPool::method_at as MemberAt),
            ("cp_Imethod", &pool.imethod_order, ResolvedPool::imethod_at as MemberAt),
        ] {
            let mut class_band = Vec::new();
            let mut desc_band = Vec::new();
            for &i in order {
                let entry = at(pool, i);
                class_band.push(pool.class_index(entry.class));
                desc_band.push(pool.descr_index(entry.descr));
            }
            emitter.band(&format!("{name}_class"), &class_band, &BhsdCodec::DELTA5)?;
            emitter.band(&format!("{name}_desc"), &desc_band, &BhsdCodec::UDELTA5)?;
        }
        Ok(())
    }
}

impl CpBands {
    /// The UTF-8 bands: shared prefixes, suffix lengths, and the suffix
    /// characters, with over-wide strings routed to per-string big-chars
    /// bands.
    fn encode_utf8(&self, pool: &ResolvedPool, emitter: &mut BandEmitter<'_>) -> Result<()> {
        let strings: Vec<Vec<u16>> = pool
            .utf8_order
            .iter()
            .map(|&i| pool.utf8_at(i).encode_utf16().collect())
            .collect();

        let mut prefix = Vec::new();
        let mut suffix = Vec::new();
        let mut chars = Vec::new();
        let mut big_suffix = Vec::new();
        let mut big_chars: Vec<Vec<i32>> = Vec::new();
        for (i, units) in strings.iter().enumerate() {
            if i == 0 {
                // the leading empty string is implicit
                continue;
            }
            let shared = common_prefix(&strings[i - 1], units);
            if i >= 2 {
                prefix.push(shared as i32);
            }
            let tail = &units[shared..];
            if tail.iter().any(|&u| u > BIG_CHAR_LIMIT) {
                suffix.push(0);
                big_suffix.push(tail.len() as i32);
                big_chars.push(tail.iter().map(|&u| i32::from(u)).collect());
            } else {
                suffix.push(tail.len() as i32);
                chars.extend(tail.iter().map(|&u| i32::from(u)));
            }
        }

        emitter.band("cp_Utf8_prefix", &prefix, &BhsdCodec::DELTA5)?;
        emitter.band("cp_Utf8_suffix", &suffix, &BhsdCodec::UNSIGNED5)?;
        emitter.band("cp_Utf8_chars", &chars, &BhsdCodec::CHAR3)?;
        emitter.band("cp_Utf8_big_suffix", &big_suffix, &BhsdCodec::DELTA5)?;
        for (i, band) in big_chars.iter().enumerate() {
            emitter.band(&format!("cp_Utf8_big_chars_{i}"), band, &BhsdCodec::DELTA5)?;
        }
        Ok(())
    }
}

fn common_prefix(a: &[u16], b: &[u16]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use jarpack_codec::CodecSelector;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::cp::ConstantPool;

    fn emit(pool: &ResolvedPool) -> (Vec<u8>, Vec<i32>) {
        let mut headers = Vec::new();
        let mut out = Vec::new();
        let mut emitter = BandEmitter {
            selector: CodecSelector::new(1),
            band_headers: &mut headers,
            out: &mut out,
        };
        CpBands.encode_to(pool, &mut emitter).expect("encode");
        (out, headers)
    }

    #[test]
    fn test_empty_pool_emits_nothing_but_empty_bands() {
        let pool = ConstantPool::new().finalise();
        let (out, headers) = emit(&pool);
        // only the implicit empty string exists: every band is empty
        assert!(out.is_empty());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_utf8_prefix_sharing() {
        let mut pool = ConstantPool::new();
        pool.add_utf8("abcd");
        pool.add_utf8("abxy");
        let resolved = pool.finalise();
        let (out, _) = emit(&resolved);
        // suffix band: "abcd" (4 units), then 2 shared + "xy"
        // prefix band: one entry (2); chars: a b c d x y
        assert_eq!(out.len(), 1 + 2 + 6);
    }

    #[test]
    fn test_wide_string_goes_to_big_chars() {
        let mut pool = ConstantPool::new();
        pool.add_utf8("snow\u{2603}");
        let resolved = pool.finalise();
        let (out, _) = emit(&resolved);
        // suffix = [0], big_suffix = [5], big chars band carries 5 values
        assert!(!out.is_empty());
    }
}
