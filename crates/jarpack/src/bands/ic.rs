//! Inner-class bands and the segment-global IC tuple set.

use std::collections::HashMap;

use jarpack_codec::BhsdCodec;

use crate::bands::{BandEmitter, BandSet};
use crate::cp::{ClassRef, ConstantPool, ResolvedPool, Utf8Ref};
use crate::error::Result;

/// The flag bit marking a tuple whose outer class and inner name travel
/// explicitly.
pub(crate) const IC_EXPLICIT: u32 = 1 << 16;

/// One inner-class record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IcTuple {
    pub class: ClassRef,
    pub flags: u32,
    pub outer: Option<ClassRef>,
    pub name: Option<Utf8Ref>,
    /// Whether the tuple matches the `$`-convention derivation from its
    /// class name, with this outer.
    pub predicted: bool,
    /// Whether the attribute declared no simple name.
    pub anonymous: bool,
    /// The derived outer class name, for relevance checks.
    pub derived_outer: Option<String>,
}

/// Split a binary name at its last `$`: the derived outer name, and the
/// derived simple name with leading digits stripped (empty for anonymous
/// classes).
pub(crate) fn derive_names(name: &str) -> Option<(String, Option<String>)> {
    let pos = name.rfind('$')?;
    let outer = name[..pos].to_string();
    let simple: String =
        name[pos + 1..].chars().skip_while(char::is_ascii_digit).collect();
    let simple = if simple.is_empty() { None } else { Some(simple) };
    Some((outer, simple))
}

/// The segment-global inner-class tuple set and its bands.
#[derive(Debug, Default)]
pub(crate) struct IcBands {
    tuples: Vec<IcTuple>,
    by_class: HashMap<ClassRef, usize>,
}

impl IcBands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one `InnerClasses` entry. The first tuple recorded for a
    /// class wins; the returned flag reports whether a later duplicate
    /// disagreed with the stored tuple.
    pub fn add_tuple(
        &mut self,
        pool: &mut ConstantPool,
        name: &str,
        outer_name: Option<&str>,
        inner_name: Option<&str>,
        access: u16,
    ) -> (usize, bool) {
        let class = pool.add_class(name);
        let tuple = Self::build_tuple(pool, class, name, outer_name, inner_name, access);
        if let Some(&i) = self.by_class.get(&class) {
            let conflict = self.tuples[i] != tuple;
            return (i, conflict);
        }
        let i = self.tuples.len();
        self.tuples.push(tuple);
        self.by_class.insert(class, i);
        (i, false)
    }

    fn build_tuple(
        pool: &mut ConstantPool,
        class: ClassRef,
        name: &str,
        outer_name: Option<&str>,
        inner_name: Option<&str>,
        access: u16,
    ) -> IcTuple {
        let derived = derive_names(name);
        let predicted = derived.as_ref().is_some_and(|(d_outer, d_simple)| {
            outer_name == Some(d_outer.as_str()) && inner_name == d_simple.as_deref()
        });
        let anonymous = inner_name.is_none();
        if predicted {
            IcTuple {
                class,
                flags: u32::from(access),
                outer: None,
                name: None,
                predicted: true,
                anonymous,
                derived_outer: derived.map(|(o, _)| o),
            }
        } else {
            IcTuple {
                class,
                flags: u32::from(access) | IC_EXPLICIT,
                outer: outer_name.map(|o| pool.add_class(o)),
                name: inner_name.map(|n| pool.add_utf8(n)),
                predicted: false,
                anonymous,
                derived_outer: derived.map(|(o, _)| o),
            }
        }
    }

    /// Length snapshot for class rollback.
    pub fn snapshot(&self) -> usize {
        self.tuples.len()
    }

    /// Drop tuples recorded after `snapshot`.
    pub fn rollback(&mut self, snapshot: usize) {
        for tuple in &self.tuples[snapshot..] {
            self.by_class.remove(&tuple.class);
        }
        self.tuples.truncate(snapshot);
    }

    /// The tuple recorded for a class, if any.
    pub fn tuple_for(&self, class: ClassRef) -> Option<&IcTuple> {
        self.by_class.get(&class).map(|&i| &self.tuples[i])
    }

    /// Number of tuples.
    pub fn count(&self) -> usize {
        self.tuples.len()
    }

    /// Whether a tuple would already be implied for a class with this
    /// name: predicted tuples whose derived outer is the class itself.
    pub fn implied_for(&self, tuple: &IcTuple, class_name: &str) -> bool {
        tuple.predicted && tuple.derived_outer.as_deref() == Some(class_name)
    }
}

impl BandSet for IcBands {
    fn encode_to(&self, pool: &ResolvedPool, emitter: &mut BandEmitter<'_>) -> Result<()> {
        let mut order: Vec<&IcTuple> = self.tuples.iter().collect();
        order.sort_by_key(|t| pool.class_index(t.class));

        let this_class: Vec<i32> = order.iter().map(|t| pool.class_index(t.class)).collect();
        let flags: Vec<i32> = order.iter().map(|t| t.flags as i32).collect();
        let mut outer = Vec::new();
        let mut name = Vec::new();
        for tuple in order.iter().filter(|t| t.flags & IC_EXPLICIT != 0) {
            outer.push(tuple.outer.map_or(0, |c| pool.class_index(c) + 1));
            name.push(tuple.name.map_or(0, |n| pool.utf8_index(n) + 1));
        }
        emitter.band("ic_this_class", &this_class, &BhsdCodec::UDELTA5)?;
        emitter.band("ic_flags", &flags, &BhsdCodec::UNSIGNED5)?;
        emitter.band("ic_outer_class", &outer, &BhsdCodec::DELTA5)?;
        emitter.band("ic_name", &name, &BhsdCodec::DELTA5)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_derive_names() {
        assert_eq!(
            derive_names("p/Outer$Inner"),
            Some(("p/Outer".to_string(), Some("Inner".to_string())))
        );
        assert_eq!(derive_names("p/Outer$1"), Some(("p/Outer".to_string(), None)));
        assert_eq!(
            derive_names("p/Outer$1Local"),
            Some(("p/Outer".to_string(), Some("Local".to_string())))
        );
        assert_eq!(derive_names("p/Plain"), None);
    }

    #[test]
    fn test_predicted_member_class_has_no_explicit_parts() {
        let mut pool = ConstantPool::new();
        let mut ic = IcBands::new();
        let (i, _) = ic.add_tuple(&mut pool, "p/Outer$Inner", Some("p/Outer"), Some("Inner"), 1);
        let tuple = &ic.tuples[i];
        assert!(tuple.predicted);
        assert_eq!(tuple.flags, 1);
        assert!(tuple.outer.is_none());
        assert!(tuple.name.is_none());
    }

    #[test]
    fn test_mismatched_outer_is_explicit() {
        let mut pool = ConstantPool::new();
        let mut ic = IcBands::new();
        let (i, _) = ic.add_tuple(&mut pool, "p/Outer$Inner", Some("p/Elsewhere"), Some("Inner"), 1);
        let tuple = &ic.tuples[i];
        assert!(!tuple.predicted);
        assert_eq!(tuple.flags & IC_EXPLICIT, IC_EXPLICIT);
        assert!(tuple.outer.is_some());
        assert!(tuple.name.is_some());
    }

    #[test]
    fn test_anonymous_class_prediction() {
        let mut pool = ConstantPool::new();
        let mut ic = IcBands::new();
        let (i, _) = ic.add_tuple(&mut pool, "p/Outer$1", Some("p/Outer"), None, 0);
        assert!(ic.tuples[i].predicted);
    }

    #[test]
    fn test_first_tuple_wins() {
        let mut pool = ConstantPool::new();
        let mut ic = IcBands::new();
        let (a, first_conflict) = ic.add_tuple(&mut pool, "p/O$I", Some("p/O"), Some("I"), 1);
        let (b, conflict) = ic.add_tuple(&mut pool, "p/O$I", Some("p/X"), Some("I"), 2);
        assert_eq!(a, b);
        assert!(!first_conflict);
        assert!(conflict, "a disagreeing duplicate is reported");
        assert_eq!(ic.count(), 1);
        assert_eq!(ic.tuples[a].flags, 1);
    }

    #[test]
    fn test_band_emission_sorted_by_class_index() {
        let mut pool = ConstantPool::new();
        let mut ic = IcBands::new();
        ic.add_tuple(&mut pool, "z/Z$B", Some("z/Z"), Some("B"), 0);
        ic.add_tuple(&mut pool, "a/A$X", None, None, 8);
        let resolved = pool.finalise();

        let mut headers = Vec::new();
        let mut out = Vec::new();
        let mut emitter = BandEmitter {
            selector: jarpack_codec::CodecSelector::new(1),
            band_headers: &mut headers,
            out: &mut out,
        };
        IcBands::encode_to(&ic, &resolved, &mut emitter).expect("encode");
        assert!(!out.is_empty());
    }
}
