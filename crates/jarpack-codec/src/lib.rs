//! BHSD and composite codecs for Pack200-style band encoding.
//!
//! This crate owns the variable-length integer wire format used by band
//! archives: the four-parameter BHSD codec family, the Run and Population
//! composites, the canonical codec table with its specifier arithmetic,
//! and the effort-driven selector that picks a better canonical codec for
//! a band when one pays for its specifier.
//!
//! # Example
//!
//! ```
//! use jarpack_codec::{BhsdCodec, CodecSelector};
//!
//! # fn main() -> Result<(), jarpack_codec::CodecError> {
//! let band: Vec<i32> = (0..200).map(|i| 1000 + i * 10).collect();
//! let selector = CodecSelector::new(5);
//! let encoding = selector.encode_band("demo", &band, &BhsdCodec::UNSIGNED5)?;
//! assert!(encoding.bytes.len() < band.len() * 2);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::cast_possible_truncation)] // Intentional for wire-format arithmetic
#![allow(clippy::cast_possible_wrap)] // Decoded values wrap to i32 like the format says
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::cast_precision_loss)] // Band statistics tolerate it

pub mod bhsd;
pub mod codec;
pub mod encoding;
pub mod error;
pub mod families;
pub mod population;
pub mod run;
pub mod select;

pub use bhsd::BhsdCodec;
pub use codec::Codec;
pub use error::{CodecError, Result};
pub use population::PopulationCodec;
pub use run::RunCodec;
pub use select::{BandEncoding, CodecChoice, CodecSelector};
