//! Pack200-style packer core.
//!
//! jarpack re-encodes an ordered set of parsed Java class files plus
//! arbitrary side files into a stream of segments: each segment carries a
//! header, a deduplicated constant pool, and dozens of parallel integer
//! bands, every band variable-length coded by a selected BHSD or
//! composite codec (see the [`jarpack_codec`] crate).
//!
//! The class-file parser is an external collaborator: it walks each
//! class and reports what it sees to the packer's [`visitor::ClassVisitor`].
//! JAR reading, the unpacker, and the CLI live elsewhere too.
//!
//! # Example
//!
//! ```no_run
//! use jarpack::{InputFile, PackOptions, Packer};
//! use jarpack::visitor::{ClassParser, ClassVisitor};
//!
//! struct MyParser;
//! impl ClassParser for MyParser {
//!     fn parse(
//!         &self,
//!         bytes: &[u8],
//!         visitor: &mut dyn ClassVisitor,
//!     ) -> jarpack::Result<()> {
//!         // walk the class file, invoking visitor callbacks
//!         # let _ = (bytes, visitor);
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> jarpack::Result<()> {
//! let files = vec![InputFile::new(
//!     "META-INF/MANIFEST.MF",
//!     b"Manifest-Version: 1.0\n".to_vec(),
//! )];
//! let mut out = Vec::new();
//! let packed = Packer::new(PackOptions::default()).pack(files, &MyParser, &mut out)?;
//! assert_eq!(packed, out.len() as u64);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::cast_possible_truncation)] // Intentional for band arithmetic
#![allow(clippy::cast_possible_wrap)] // Intentional for decoded band values
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred

pub(crate) mod bands;
pub mod cp;
pub mod error;
pub mod layout;
pub(crate) mod offsets;
pub mod opcodes;
pub mod options;
pub mod packer;
pub mod segment;
pub mod visitor;

pub use error::{PackError, Result};
pub use options::{AttrContext, AttributeAction, PackOptions};
pub use packer::Packer;
pub use segment::{InputFile, SegmentUnit};
