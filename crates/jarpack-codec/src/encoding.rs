//! The canonical codec table and codec-specifier arithmetic.
//!
//! A band transmitted with a non-default codec is prefixed by a specifier
//! value: canonical BHSD codecs occupy indexes 1..=115, arbitrary BHSD
//! codecs use 116 plus two extra values, run codecs 117..=140 and
//! population codecs 141..=188. Extra specifier values beyond the first
//! travel in the segment's band-headers sidecar.

use crate::bhsd::BhsdCodec;
use crate::codec::Codec;
use crate::error::{CodecError, Result};

/// Number of canonical codecs.
pub const CANONICAL_COUNT: usize = 115;

/// First specifier value for an arbitrary (non-canonical) BHSD codec.
pub const ARBITRARY_BHSD: i32 = 116;
/// First specifier value for a run codec.
pub const RUN_BASE: i32 = 117;
/// First specifier value for a population codec.
pub const POPULATION_BASE: i32 = 141;

const NARROW_H: [u32; 5] = [192, 224, 240, 248, 252];
const DELTA_H: [u32; 9] = [8, 16, 32, 64, 128, 192, 224, 240, 248];
const FIVE_H: [u32; 5] = [4, 16, 32, 64, 128];

const fn build_canonical() -> [BhsdCodec; CANONICAL_COUNT + 1] {
    let mut t = [BhsdCodec::BYTE1; CANONICAL_COUNT + 1];
    let mut i = 1;

    // 1..=16: (b,256) for b in 1..=4, each as plain/signed/delta/signed-delta
    let mut b = 1;
    while b <= 4 {
        t[i] = BhsdCodec::new_unchecked(b, 256, 0, 0);
        t[i + 1] = BhsdCodec::new_unchecked(b, 256, 1, 0);
        t[i + 2] = BhsdCodec::new_unchecked(b, 256, 0, 1);
        t[i + 3] = BhsdCodec::new_unchecked(b, 256, 1, 1);
        i += 4;
        b += 1;
    }

    // 17..=31: (5,h,s) and 32..=46: (5,h,s,1)
    let mut d = 0;
    while d <= 1 {
        let mut hi = 0;
        while hi < FIVE_H.len() {
            let mut s = 0;
            while s <= 2 {
                t[i] = BhsdCodec::new_unchecked(5, FIVE_H[hi], s, d);
                i += 1;
                s += 1;
            }
            hi += 1;
        }
        d += 1;
    }

    // For b in 2..=4: five narrow non-delta codecs, then the delta pairs
    let mut b = 2;
    while b <= 4 {
        let mut hi = 0;
        while hi < NARROW_H.len() {
            t[i] = BhsdCodec::new_unchecked(b, NARROW_H[hi], 0, 0);
            i += 1;
            hi += 1;
        }
        let mut hi = 0;
        while hi < DELTA_H.len() {
            t[i] = BhsdCodec::new_unchecked(b, DELTA_H[hi], 0, 1);
            t[i + 1] = BhsdCodec::new_unchecked(b, DELTA_H[hi], 1, 1);
            i += 2;
            hi += 1;
        }
        b += 1;
    }

    assert!(i == CANONICAL_COUNT + 1);
    t
}

static CANONICAL: [BhsdCodec; CANONICAL_COUNT + 1] = build_canonical();

/// The canonical codec at `index`, for `index` in 1..=115.
pub fn canonical(index: usize) -> Option<&'static BhsdCodec> {
    if (1..=CANONICAL_COUNT).contains(&index) { Some(&CANONICAL[index]) } else { None }
}

/// The canonical index of `codec`, if it has one.
pub fn canonical_index(codec: &BhsdCodec) -> Option<usize> {
    CANONICAL[1..].iter().position(|c| c == codec).map(|p| p + 1)
}

/// Compute the specifier values identifying `codec` to a decoder whose
/// band default is `default`. The first value is the specifier proper;
/// any further values belong in the band-headers sidecar.
pub fn specifier(codec: &Codec, default: &BhsdCodec) -> Result<Vec<i32>> {
    match codec {
        Codec::Bhsd(c) => Ok(bhsd_specifier(c)),
        Codec::Run(rc) => {
            let k = rc.k();
            let (kx, kb) = run_k_split(k)
                .ok_or_else(|| CodecError::UnknownSpecifier(format!("run k={k}")))?;
            let kb_flag = kb != 3;
            let a_def = rc.a_codec().as_bhsd() == Some(default);
            let b_def = !a_def && rc.b_codec().as_bhsd() == Some(default);
            let mut out = vec![
                RUN_BASE
                    + kx as i32
                    + 4 * i32::from(kb_flag)
                    + 8 * i32::from(a_def)
                    + 16 * i32::from(b_def),
            ];
            if kb_flag {
                out.push(kb as i32);
            }
            if !a_def {
                out.extend(specifier(rc.a_codec(), default)?);
            }
            if !b_def {
                out.extend(specifier(rc.b_codec(), default)?);
            }
            Ok(out)
        }
        Codec::Population(pc) => {
            let f_def = pc.favoured_codec() == default;
            let u_def = pc.unfavoured_codec() == default;
            let t_byte1 = *pc.token_codec() == BhsdCodec::BYTE1;
            let tdefl: i32 = i32::from(t_byte1);
            let mut out =
                vec![POPULATION_BASE + i32::from(f_def) + 2 * i32::from(u_def) + 4 * tdefl];
            if !f_def {
                out.extend(bhsd_specifier(pc.favoured_codec()));
            }
            if !t_byte1 {
                out.extend(bhsd_specifier(pc.token_codec()));
            }
            if !u_def {
                out.extend(bhsd_specifier(pc.unfavoured_codec()));
            }
            Ok(out)
        }
    }
}

fn bhsd_specifier(c: &BhsdCodec) -> Vec<i32> {
    if let Some(i) = canonical_index(c) {
        return vec![i as i32];
    }
    vec![
        ARBITRARY_BHSD,
        (c.d() + 2 * c.s() + 8 * (c.b() - 1)) as i32,
        (c.h() - 1) as i32,
    ]
}

/// Express `k` as `(kb + 1) * 16^kx` with `kb` in 0..=255.
fn run_k_split(k: usize) -> Option<(u32, u32)> {
    let mut kx = 0u32;
    let mut rest = k;
    while rest > 256 {
        if rest % 16 != 0 || kx == 3 {
            return None;
        }
        rest /= 16;
        kx += 1;
    }
    if rest == 0 { None } else { Some((kx, rest as u32 - 1)) }
}
