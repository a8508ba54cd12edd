//! The packer driver: option application, segment splitting, and the
//! per-segment pack loop.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use crate::error::Result;
use crate::options::{ModTimePolicy, PackOptions};
use crate::segment::{InputFile, Segment, SegmentUnit};
use crate::visitor::ClassParser;

/// The Pack200-style packer.
///
/// Feed it an ordered file list and a class parser; it splits the input
/// into segments honoring the segment limit and writes each one to the
/// sink.
#[derive(Debug)]
pub struct Packer {
    options: PackOptions,
}

impl Packer {
    /// A packer with the given options.
    pub fn new(options: PackOptions) -> Self {
        Self { options }
    }

    /// A packer with default options.
    pub fn with_defaults() -> Self {
        Self::new(PackOptions::default())
    }

    /// Pack `files` into `out`. Returns the total packed byte count.
    pub fn pack<W: Write>(
        &self,
        files: Vec<InputFile>,
        parser: &dyn ClassParser,
        out: W,
    ) -> Result<u64> {
        let files = self.arrange(files);
        let units = split_into_segments(files, self.options.segment_limit);
        info!(segments = units.len(), effort = self.options.effort, "packing");

        if self.options.gzip {
            let mut encoder = GzEncoder::new(out, Compression::default());
            let total = self.pack_units(units, parser, &mut encoder)?;
            encoder.finish()?;
            Ok(total)
        } else {
            let mut out = out;
            self.pack_units(units, parser, &mut out)
        }
    }

    fn pack_units<W: Write>(
        &self,
        units: Vec<SegmentUnit>,
        parser: &dyn ClassParser,
        out: &mut W,
    ) -> Result<u64> {
        let mut total = 0;
        for unit in units {
            total += Segment::new(&self.options)?.pack(unit, parser, out)?;
        }
        Ok(total)
    }

    /// Apply the ordering and timestamp options.
    fn arrange(&self, mut files: Vec<InputFile>) -> Vec<InputFile> {
        if self.options.modification_time == ModTimePolicy::Latest {
            let latest = files.iter().map(|f| f.modtime).max().unwrap_or(0);
            for file in &mut files {
                file.modtime = latest;
            }
        }
        if !self.options.keep_file_order {
            // classes keep their positions; side files sort by name with
            // the manifest first
            let mut side: Vec<InputFile> =
                files.iter().filter(|f| !f.is_class()).cloned().collect();
            side.sort_by(|a, b| {
                let a_manifest = a.name == "META-INF/MANIFEST.MF";
                let b_manifest = b.name == "META-INF/MANIFEST.MF";
                b_manifest.cmp(&a_manifest).then_with(|| a.name.cmp(&b.name))
            });
            let mut side = side.into_iter();
            files = files
                .into_iter()
                .map(|f| {
                    if f.is_class() {
                        f
                    } else {
                        side.next().unwrap_or(f)
                    }
                })
                .collect();
        }
        files
    }
}

/// Split the input into segment units: greedy accumulation against the
/// limit, with the first entry of each fresh segment costing nothing. A
/// limit of `-1` yields one segment; `0` yields one segment per class
/// with side files grouped alongside.
pub(crate) fn split_into_segments(files: Vec<InputFile>, limit: i64) -> Vec<SegmentUnit> {
    if limit < 0 {
        let unit = SegmentUnit { files };
        return if unit.files.is_empty() { Vec::new() } else { vec![unit] };
    }
    if limit == 0 {
        let mut units = Vec::new();
        let mut pending: Vec<InputFile> = Vec::new();
        for file in files {
            let is_class = file.is_class();
            pending.push(file);
            if is_class {
                units.push(SegmentUnit { files: std::mem::take(&mut pending) });
            }
        }
        if !pending.is_empty() {
            units.push(SegmentUnit { files: pending });
        }
        return units;
    }

    let mut units = Vec::new();
    let mut current: Vec<InputFile> = Vec::new();
    let mut running = 0i64;
    for file in files {
        let size = file.packed_size_estimate();
        if !current.is_empty() && running + size > limit {
            debug!(files = current.len(), estimate = running, "segment full");
            units.push(SegmentUnit { files: std::mem::take(&mut current) });
            running = 0;
        }
        let was_empty = current.is_empty();
        current.push(file);
        running += size;
        if was_empty {
            // the first entry of a fresh segment is free
            running = 0;
        }
    }
    if !current.is_empty() {
        units.push(SegmentUnit { files: current });
    }
    units
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn plain(name: &str, size: usize) -> InputFile {
        InputFile::new(name, vec![0; size])
    }

    #[test]
    fn test_no_limit_is_one_segment() {
        let files = vec![plain("a", 10_000_000), plain("b", 10_000_000)];
        let units = split_into_segments(files, -1);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].files.len(), 2);
    }

    #[test]
    fn test_zero_limit_is_one_segment_per_class() {
        let files = vec![
            plain("META-INF/MANIFEST.MF", 10),
            InputFile::new("A.class", vec![1]),
            InputFile::new("B.class", vec![1]),
            plain("readme.txt", 10),
        ];
        let units = split_into_segments(files, 0);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].files.len(), 2, "manifest groups with first class");
        assert_eq!(units[1].files.len(), 1);
        assert_eq!(units[2].files.len(), 1, "trailing side files form a unit");
    }

    #[test]
    fn test_greedy_split_with_free_first_entry() {
        // each file estimates 1 + 100 + 5 = 106
        let files = vec![
            plain("a", 100),
            plain("b", 100),
            plain("c", 100),
            plain("d", 100),
        ];
        let units = split_into_segments(files, 250);
        // first entry free, so segments hold 1 + floor(250/106) = 3 files
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].files.len(), 3);
        assert_eq!(units[1].files.len(), 1);
    }

    #[test]
    fn test_meta_inf_costs_nothing() {
        let mut files = vec![plain("seed", 100)];
        for i in 0..50 {
            files.push(plain(&format!("META-INF/x{i}"), 1000));
        }
        let units = split_into_segments(files, 200);
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn test_arrange_sorts_side_files_with_manifest_first() {
        let mut options = PackOptions::new();
        options.set_keep_file_order(false);
        let packer = Packer::new(options);
        let files = vec![
            plain("z.txt", 1),
            InputFile::new("A.class", vec![1]),
            plain("a.txt", 1),
            plain("META-INF/MANIFEST.MF", 1),
        ];
        let arranged = packer.arrange(files);
        let names: Vec<&str> = arranged.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["META-INF/MANIFEST.MF", "A.class", "a.txt", "z.txt"]);
    }

    #[test]
    fn test_arrange_latest_modtime() {
        let mut options = PackOptions::new();
        options.set_modification_time("latest").expect("valid");
        let packer = Packer::new(options);
        let mut a = plain("a", 1);
        a.modtime = 100;
        let mut b = plain("b", 1);
        b.modtime = 300;
        let arranged = packer.arrange(vec![a, b]);
        assert!(arranged.iter().all(|f| f.modtime == 300));
    }
}
