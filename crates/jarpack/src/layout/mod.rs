//! The JSR-200 attribute-layout mini-language.
//!
//! A layout string describes how an attribute payload decomposes into
//! integers: integral reads, constant-pool references, counted
//! replications, tagged unions and calls into reusable callables. Parsing
//! yields an arena of elements ([`parser`]); each integral or reference
//! element owns one band that attribute instances stream into
//! ([`bands`]).

pub mod bands;
mod element;
pub mod parser;

pub use bands::NewAttributeBands;
pub use element::{ElemId, IntegralKind, LayoutArena, LayoutElement, RefKind, UintType, UnionCase};
pub use parser::parse_layout;
