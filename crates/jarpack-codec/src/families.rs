//! Canonical codec families tried by the selector, grouped by sign,
//! delta and byte width. Members are canonical-table indexes so the
//! specifier for any family member is a single value.

use crate::bhsd::BhsdCodec;
use crate::encoding::canonical;

/// Full-radix unsigned codecs `(2..4, 256)`.
pub const NON_DELTA_UNSIGNED_1: &[usize] = &[5, 9, 13];
/// Two-byte narrow-radix unsigned codecs `(2, 192..252)`.
pub const NON_DELTA_UNSIGNED_2: &[usize] = &[47, 48, 49, 50, 51];
/// Three-byte narrow-radix unsigned codecs `(3, 192..252)`.
pub const NON_DELTA_UNSIGNED_3: &[usize] = &[70, 71, 72, 73, 74];
/// Four-byte narrow-radix unsigned codecs `(4, 192..252)`.
pub const NON_DELTA_UNSIGNED_4: &[usize] = &[93, 94, 95, 96, 97];
/// Five-byte unsigned codecs `(5, 4..128)`.
pub const NON_DELTA_UNSIGNED_5: &[usize] = &[17, 20, 23, 26, 29];

/// Full-radix unsigned delta codecs `(2..4, 256, 0, 1)`.
pub const DELTA_UNSIGNED_1: &[usize] = &[7, 11, 15];
/// Two-byte unsigned delta codecs `(2, 8..248, 0, 1)`.
pub const DELTA_UNSIGNED_2: &[usize] = &[52, 54, 56, 58, 60, 62, 64, 66, 68];
/// Three-byte unsigned delta codecs `(3, 8..248, 0, 1)`.
pub const DELTA_UNSIGNED_3: &[usize] = &[75, 77, 79, 81, 83, 85, 87, 89, 91];
/// Four-byte unsigned delta codecs `(4, 8..248, 0, 1)`.
pub const DELTA_UNSIGNED_4: &[usize] = &[98, 100, 102, 104, 106, 108, 110, 112, 114];
/// Five-byte unsigned delta codecs `(5, 4..128, 0, 1)`.
pub const DELTA_UNSIGNED_5: &[usize] = &[32, 35, 38, 41, 44];

/// Full-radix signed codecs `(2..4, 256, 1)`.
pub const NON_DELTA_SIGNED_1: &[usize] = &[6, 10, 14];
/// Five-byte signed codecs `(5, 4..128, 1)`.
pub const NON_DELTA_SIGNED_2: &[usize] = &[18, 21, 24, 27, 30];
/// Five-byte double-signed codecs `(5, 4..128, 2)`.
pub const NON_DELTA_DOUBLE_SIGNED: &[usize] = &[19, 22, 25, 28, 31];

/// Full-radix signed delta codecs `(2..4, 256, 1, 1)`.
pub const DELTA_SIGNED_1: &[usize] = &[8, 12, 16];
/// Two-byte signed delta codecs `(2, 8..248, 1, 1)`.
pub const DELTA_SIGNED_2: &[usize] = &[53, 55, 57, 59, 61, 63, 65, 67, 69];
/// Three-byte signed delta codecs `(3, 8..248, 1, 1)`.
pub const DELTA_SIGNED_3: &[usize] = &[76, 78, 80, 82, 84, 86, 88, 90, 92];
/// Four-byte signed delta codecs `(4, 8..248, 1, 1)`.
pub const DELTA_SIGNED_4: &[usize] = &[99, 101, 103, 105, 107, 109, 111, 113, 115];
/// Five-byte signed delta codecs `(5, 4..128, 1, 1)`.
pub const DELTA_SIGNED_5: &[usize] = &[33, 36, 39, 42, 45];
/// Five-byte double-signed delta codecs `(5, 4..128, 2, 1)`.
pub const DELTA_DOUBLE_SIGNED: &[usize] = &[34, 37, 40, 43, 46];

/// All unsigned delta families, widest coverage last.
pub const DELTA_UNSIGNED: &[&[usize]] = &[
    DELTA_UNSIGNED_1,
    DELTA_UNSIGNED_3,
    DELTA_UNSIGNED_4,
    DELTA_UNSIGNED_5,
    DELTA_UNSIGNED_2,
];

/// All non-delta unsigned families.
pub const NON_DELTA_UNSIGNED: &[&[usize]] = &[
    NON_DELTA_UNSIGNED_1,
    NON_DELTA_UNSIGNED_3,
    NON_DELTA_UNSIGNED_4,
    NON_DELTA_UNSIGNED_5,
    NON_DELTA_UNSIGNED_2,
];

/// All signed delta families.
pub const DELTA_SIGNED: &[&[usize]] = &[
    DELTA_SIGNED_1,
    DELTA_SIGNED_3,
    DELTA_SIGNED_4,
    DELTA_SIGNED_5,
    DELTA_SIGNED_2,
    DELTA_DOUBLE_SIGNED,
];

/// All non-delta signed families.
pub const NON_DELTA_SIGNED: &[&[usize]] =
    &[NON_DELTA_SIGNED_1, NON_DELTA_SIGNED_2, NON_DELTA_DOUBLE_SIGNED];

/// Resolve a family of canonical indexes to codecs.
pub fn members(family: &[usize]) -> impl Iterator<Item = &'static BhsdCodec> + '_ {
    family.iter().filter_map(|&i| canonical(i))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_families_resolve_and_agree() {
        let groups: [(&[&[usize]], bool, bool); 4] = [
            (DELTA_UNSIGNED, false, true),
            (NON_DELTA_UNSIGNED, false, false),
            (DELTA_SIGNED, true, true),
            (NON_DELTA_SIGNED, true, false),
        ];
        for (group, signed, delta) in groups {
            for family in group {
                for codec in members(family) {
                    assert_eq!(codec.is_delta(), delta, "{codec}");
                    assert_eq!(codec.is_signed(), signed, "{codec}");
                }
            }
        }
    }
}
