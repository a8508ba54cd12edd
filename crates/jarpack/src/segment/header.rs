//! The segment header: magic, computed option bits, and counts.

use std::io::Write;

use jarpack_codec::BhsdCodec;

use crate::error::Result;

/// The four magic bytes opening every segment.
pub const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xD0, 0x0D];
/// Pack format minor version.
pub const PACK_MINVER: i32 = 7;
/// Pack format major version.
pub const PACK_MAJVER: i32 = 150;

/// Archive option bit: attribute definitions or band headers follow.
pub(crate) const HAVE_SPECIAL_FORMATS: u32 = 1;
/// Archive option bit: numeric constant-pool counts follow.
pub(crate) const HAVE_CP_NUMBERS: u32 = 1 << 1;
/// Archive option bit: every code attribute transmits its flags.
pub(crate) const HAVE_ALL_CODE_FLAGS: u32 = 1 << 2;
/// Archive option bit: file headers follow.
pub(crate) const HAVE_FILE_HEADERS: u32 = 1 << 4;
/// Archive option bit: the whole archive should be deflated on unpack.
pub(crate) const DEFLATE_HINT: u32 = 1 << 5;
/// Archive option bit: per-file timestamps are transmitted.
pub(crate) const HAVE_FILE_MODTIME: u32 = 1 << 6;
/// Archive option bit: per-file option words are transmitted.
pub(crate) const HAVE_FILE_OPTIONS: u32 = 1 << 7;
/// Archive option bit: 64-bit file sizes are transmitted.
pub(crate) const HAVE_FILE_SIZE_HI: u32 = 1 << 8;
/// Archive option bit: class flags have a high word.
pub(crate) const HAVE_CLASS_FLAGS_HI: u32 = 1 << 9;
/// Archive option bit: field flags have a high word.
pub(crate) const HAVE_FIELD_FLAGS_HI: u32 = 1 << 10;
/// Archive option bit: method flags have a high word.
pub(crate) const HAVE_METHOD_FLAGS_HI: u32 = 1 << 11;
/// Archive option bit: code flags have a high word.
pub(crate) const HAVE_CODE_FLAGS_HI: u32 = 1 << 12;

/// A computed segment header, ready to emit.
#[derive(Debug, Default)]
pub(crate) struct SegmentHeader {
    pub archive_options: u32,
    pub archive_size: u64,
    pub archive_next_count: i32,
    pub archive_modtime: i64,
    pub file_count: usize,
    pub band_headers_size: usize,
    pub attr_definition_count: usize,
    /// Utf8, Int, Float, Long, Double, String, Class, Signature, Descr,
    /// Field, Method, IMethod
    pub cp_counts: [usize; 12],
    pub ic_count: usize,
    pub default_class_minver: u16,
    pub default_class_majver: u16,
    pub class_count: usize,
}

impl SegmentHeader {
    pub fn has(&self, bit: u32) -> bool {
        self.archive_options & bit != 0
    }

    /// Emit the magic and the header band. Returns the byte count.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<usize> {
        let mut values = vec![PACK_MINVER, PACK_MAJVER, self.archive_options as i32];
        if self.has(HAVE_FILE_HEADERS) {
            values.push((self.archive_size >> 32) as i32);
            values.push(self.archive_size as i32);
            values.push(self.archive_next_count);
            values.push(self.archive_modtime as i32);
            values.push(self.file_count as i32);
        }
        if self.has(HAVE_SPECIAL_FORMATS) {
            values.push(self.band_headers_size as i32);
            values.push(self.attr_definition_count as i32);
        }
        values.push(self.cp_counts[0] as i32);
        if self.has(HAVE_CP_NUMBERS) {
            for &count in &self.cp_counts[1..5] {
                values.push(count as i32);
            }
        }
        for &count in &self.cp_counts[5..] {
            values.push(count as i32);
        }
        values.push(self.ic_count as i32);
        values.push(i32::from(self.default_class_minver));
        values.push(i32::from(self.default_class_majver));
        values.push(self.class_count as i32);

        let encoded = BhsdCodec::UNSIGNED5.encode_ints(&values)?;
        out.write_all(&MAGIC)?;
        out.write_all(&encoded)?;
        Ok(MAGIC.len() + encoded.len())
    }
}
