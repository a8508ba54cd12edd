//! File bands: names, sizes, timestamps, options and contents of
//! non-class files (and passed-through classes).

use jarpack_codec::BhsdCodec;

use crate::bands::BandEmitter;
use crate::cp::{ConstantPool, ResolvedPool, Utf8Ref};
use crate::error::Result;

/// File option bit: the file should be stored deflated.
pub(crate) const FO_DEFLATE_HINT: i32 = 1;
/// File option bit: the file is really a passed-through class.
pub(crate) const FO_IS_CLASS_STUB: i32 = 1 << 1;

#[derive(Debug)]
struct FileRecord {
    name: Utf8Ref,
    size: u64,
    modtime: i64,
    options: i32,
    bytes: Vec<u8>,
}

/// The file band family.
#[derive(Debug, Default)]
pub(crate) struct FileBands {
    files: Vec<FileRecord>,
}

impl FileBands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one file for this segment.
    pub fn add_file(
        &mut self,
        pool: &mut ConstantPool,
        name: &str,
        bytes: Vec<u8>,
        modtime: i64,
        options: i32,
    ) {
        self.files.push(FileRecord {
            name: pool.add_utf8(name),
            size: bytes.len() as u64,
            modtime,
            options,
            bytes,
        });
    }

    /// Number of files recorded.
    pub fn count(&self) -> usize {
        self.files.len()
    }

    /// Latest modification time of any file, or zero.
    pub fn latest_modtime(&self) -> i64 {
        self.files.iter().map(|f| f.modtime).max().unwrap_or(0)
    }

    /// Whether any file has a nonzero timestamp.
    pub fn any_modtime(&self) -> bool {
        self.files.iter().any(|f| f.modtime != 0)
    }

    /// Whether any file carries options bits.
    pub fn any_options(&self) -> bool {
        self.files.iter().any(|f| f.options != 0)
    }

    /// Whether any file needs the high size band.
    pub fn any_size_hi(&self) -> bool {
        self.files.iter().any(|f| f.size > u64::from(u32::MAX))
    }

    /// Emit the file bands. Conditional bands follow the already-decided
    /// header bits; timestamps travel as deltas from `archive_modtime`.
    pub fn encode_to(
        &self,
        pool: &ResolvedPool,
        emitter: &mut BandEmitter<'_>,
        archive_modtime: i64,
        have_modtime: bool,
        have_options: bool,
        have_size_hi: bool,
    ) -> Result<()> {
        let names: Vec<i32> = self.files.iter().map(|f| pool.utf8_index(f.name)).collect();
        emitter.band("file_name", &names, &BhsdCodec::UNSIGNED5)?;

        if have_size_hi {
            let hi: Vec<i32> = self.files.iter().map(|f| (f.size >> 32) as i32).collect();
            emitter.band("file_size_hi", &hi, &BhsdCodec::UNSIGNED5)?;
        }
        let lo: Vec<i32> = self.files.iter().map(|f| f.size as i32).collect();
        emitter.band("file_size_lo", &lo, &BhsdCodec::UNSIGNED5)?;

        if have_modtime {
            let modtimes: Vec<i32> =
                self.files.iter().map(|f| (f.modtime - archive_modtime) as i32).collect();
            emitter.band("file_modtime", &modtimes, &BhsdCodec::DELTA5)?;
        }
        if have_options {
            let options: Vec<i32> = self.files.iter().map(|f| f.options).collect();
            emitter.band("file_options", &options, &BhsdCodec::UNSIGNED5)?;
        }
        for file in &self.files {
            emitter.raw(&file.bytes);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use jarpack_codec::CodecSelector;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_file_bands_round_trip_contents() {
        let mut pool = ConstantPool::new();
        let mut files = FileBands::new();
        files.add_file(&mut pool, "META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".to_vec(), 1_000, 0);
        files.add_file(&mut pool, "data.bin", vec![1, 2, 3], 2_000, FO_DEFLATE_HINT);
        assert_eq!(files.count(), 2);
        assert_eq!(files.latest_modtime(), 2_000);
        assert!(files.any_options());

        let resolved = pool.finalise();
        let mut headers = Vec::new();
        let mut out = Vec::new();
        let mut emitter = BandEmitter {
            selector: CodecSelector::new(1),
            band_headers: &mut headers,
            out: &mut out,
        };
        files
            .encode_to(&resolved, &mut emitter, 2_000, true, true, false)
            .expect("encode");
        // the raw contents land at the tail of the band block
        let tail: Vec<u8> = out[out.len() - 25..].to_vec();
        let mut expected = b"Manifest-Version: 1.0\n".to_vec();
        expected.extend([1, 2, 3]);
        assert_eq!(tail, expected);
    }
}
