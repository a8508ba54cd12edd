//! Attribute-definition bands and custom-attribute index assignment.

use std::collections::HashMap;

use jarpack_codec::BhsdCodec;
use tracing::debug;

use crate::bands::{BandEmitter, BandSet};
use crate::cp::{ConstantPool, ResolvedPool, Utf8Ref};
use crate::error::{PackError, Result};
use crate::layout::bands::LayoutSnapshot;
use crate::layout::NewAttributeBands;
use crate::options::AttrContext;

/// Flag indexes still free for custom attributes, per context. The
/// reserved indexes below each list belong to the predefined attributes.
const CLASS_FREE: &[u32] = &[25, 26, 27, 28, 29, 30, 31];
const METHOD_FREE: &[u32] = &[26, 27, 28, 29, 30, 31];
const FIELD_FREE: &[u32] = &[18, 23, 24, 25, 26, 27, 28, 29, 30, 31];
const CODE_FREE: &[u32] = &[
    17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31,
];

/// Indexes opened once a context's low list is exhausted; using any of
/// these turns on the context's `have_*_flags_hi` bit. The top index is
/// unusable: its definition header would not fit a byte.
const HI_FIRST: u32 = 32;
const HI_LAST: u32 = 62;

#[derive(Debug)]
struct AttrDef {
    context: AttrContext,
    index: u32,
    name: Utf8Ref,
    layout: Utf8Ref,
    bands: NewAttributeBands,
}

/// Custom attribute definitions and their bands.
#[derive(Debug, Default)]
pub(crate) struct AttributeDefinitionBands {
    defs: Vec<AttrDef>,
    by_key: HashMap<(AttrContext, String), usize>,
    free: HashMap<u8, Vec<u32>>,
    next_hi: HashMap<u8, u32>,
}

/// Rollback snapshot of every definition's layout bands.
#[derive(Debug)]
pub(crate) struct AttrDefSnapshot {
    layouts: Vec<LayoutSnapshot>,
}

impl AttributeDefinitionBands {
    pub fn new() -> Self {
        let mut free = HashMap::new();
        free.insert(AttrContext::Class.code() as u8, CLASS_FREE.to_vec());
        free.insert(AttrContext::Method.code() as u8, METHOD_FREE.to_vec());
        free.insert(AttrContext::Field.code() as u8, FIELD_FREE.to_vec());
        free.insert(AttrContext::Code.code() as u8, CODE_FREE.to_vec());
        Self { defs: Vec::new(), by_key: HashMap::new(), free, next_hi: HashMap::new() }
    }

    /// Define a custom attribute, assigning the next free flag index in
    /// its context. Returns the existing definition when already known.
    pub fn define(
        &mut self,
        pool: &mut ConstantPool,
        context: AttrContext,
        name: &str,
        layout: &str,
    ) -> Result<usize> {
        if let Some(&id) = self.by_key.get(&(context, name.to_string())) {
            return Ok(id);
        }
        let index = self.next_index(context)?;
        let bands = NewAttributeBands::new(name, layout)?;
        let def = AttrDef {
            context,
            index,
            name: pool.add_utf8(name),
            layout: pool.add_utf8(layout),
            bands,
        };
        debug!(context = context.name(), name, index, "defined custom attribute");
        let id = self.defs.len();
        self.defs.push(def);
        self.by_key.insert((context, name.to_string()), id);
        Ok(id)
    }

    fn next_index(&mut self, context: AttrContext) -> Result<u32> {
        let key = context.code() as u8;
        if let Some(list) = self.free.get_mut(&key)
            && !list.is_empty()
        {
            return Ok(list.remove(0));
        }
        let next = self.next_hi.entry(key).or_insert(HI_FIRST);
        if *next > HI_LAST {
            return Err(PackError::TooManyAttributes { context: context.name() });
        }
        let index = *next;
        *next += 1;
        Ok(index)
    }

    /// The definition for an attribute in a context, if any.
    pub fn lookup(&self, context: AttrContext, name: &str) -> Option<usize> {
        self.by_key.get(&(context, name.to_string())).copied()
    }

    /// The flag index a definition owns.
    pub fn flag_index(&self, id: usize) -> u32 {
        self.defs[id].index
    }

    /// Stream one attribute instance into a definition's bands.
    pub fn add_instance(&mut self, id: usize, payload: &[u8]) -> Result<()> {
        self.defs[id].bands.add_attribute(payload)
    }

    /// Whether any definition in `context` uses a hi flag index.
    pub fn uses_hi_flags(&self, context: AttrContext) -> bool {
        self.defs.iter().any(|d| d.context == context && d.index >= HI_FIRST)
    }

    /// Renumber code-context layout positions against a finished
    /// method's offset map.
    pub fn renumber_code_attributes(&mut self, map: &crate::offsets::OffsetMap) -> Result<()> {
        for def in &mut self.defs {
            if def.context == AttrContext::Code {
                def.bands.renumber(map)?;
            }
        }
        Ok(())
    }

    /// Resolve any remaining positions in non-code contexts as raw
    /// values.
    pub fn resolve_plain_attributes(&mut self) {
        for def in &mut self.defs {
            if def.context != AttrContext::Code {
                def.bands.resolve_raw();
            }
        }
    }

    /// Backwards call counts of every definition in `context`, in
    /// definition order.
    pub fn backwards_counts(&self, context: AttrContext) -> Vec<i32> {
        self.defs
            .iter()
            .filter(|d| d.context == context)
            .flat_map(|d| d.bands.backwards_counts().iter().copied())
            .collect()
    }

    /// Emit the layout bands of every definition in `context`.
    pub fn pack_context_bands(
        &self,
        context: AttrContext,
        emitter: &mut BandEmitter<'_>,
    ) -> Result<()> {
        for def in self.defs.iter().filter(|d| d.context == context) {
            def.bands.pack(context.name(), emitter)?;
        }
        Ok(())
    }

    /// Number of definitions.
    pub fn count(&self) -> usize {
        self.defs.len()
    }

    pub fn snapshot(&self) -> AttrDefSnapshot {
        AttrDefSnapshot { layouts: self.defs.iter().map(|d| d.bands.snapshot()).collect() }
    }

    pub fn rollback(&mut self, snapshot: &AttrDefSnapshot) {
        for (def, layout) in self.defs.iter_mut().zip(&snapshot.layouts) {
            def.bands.rollback(layout);
        }
    }
}

impl BandSet for AttributeDefinitionBands {
    fn encode_to(&self, pool: &ResolvedPool, emitter: &mut BandEmitter<'_>) -> Result<()> {
        let headers: Vec<i32> =
            self.defs.iter().map(|d| d.context.code() | ((d.index as i32 + 1) << 2)).collect();
        let names: Vec<i32> = self.defs.iter().map(|d| pool.utf8_index(d.name)).collect();
        let layouts: Vec<i32> = self.defs.iter().map(|d| pool.utf8_index(d.layout)).collect();
        emitter.band("attr_definition_headers", &headers, &BhsdCodec::BYTE1)?;
        emitter.band("attr_definition_name", &names, &BhsdCodec::UNSIGNED5)?;
        emitter.band("attr_definition_layout", &layouts, &BhsdCodec::UNSIGNED5)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_index_assignment_from_free_lists() {
        let mut defs = AttributeDefinitionBands::new();
        let mut pool = ConstantPool::new();
        let a = defs.define(&mut pool, AttrContext::Class, "A", "B").expect("define");
        let b = defs.define(&mut pool, AttrContext::Class, "B", "B").expect("define");
        assert_eq!(defs.flag_index(a), 25);
        assert_eq!(defs.flag_index(b), 26);
        // fields start at their own list
        let f = defs.define(&mut pool, AttrContext::Field, "F", "B").expect("define");
        assert_eq!(defs.flag_index(f), 18);
        // redefinition returns the same id
        let a2 = defs.define(&mut pool, AttrContext::Class, "A", "B").expect("define");
        assert_eq!(a, a2);
    }

    #[test]
    fn test_exhausting_low_indexes_opens_hi_half() {
        let mut defs = AttributeDefinitionBands::new();
        let mut pool = ConstantPool::new();
        for i in 0..CLASS_FREE.len() {
            defs.define(&mut pool, AttrContext::Class, &format!("A{i}"), "B")
                .expect("define");
        }
        assert!(!defs.uses_hi_flags(AttrContext::Class));
        let hi = defs.define(&mut pool, AttrContext::Class, "Hi", "B").expect("define");
        assert_eq!(defs.flag_index(hi), HI_FIRST);
        assert!(defs.uses_hi_flags(AttrContext::Class));
    }

    #[test]
    fn test_hi_half_exhaustion_is_an_error() {
        let mut defs = AttributeDefinitionBands::new();
        let mut pool = ConstantPool::new();
        let total = METHOD_FREE.len() + (HI_LAST - HI_FIRST + 1) as usize;
        for i in 0..total {
            defs.define(&mut pool, AttrContext::Method, &format!("M{i}"), "B")
                .expect("define");
        }
        assert!(matches!(
            defs.define(&mut pool, AttrContext::Method, "overflow", "B"),
            Err(PackError::TooManyAttributes { context: "method" })
        ));
    }

    #[test]
    fn test_definition_band_headers() {
        let mut defs = AttributeDefinitionBands::new();
        let mut pool = ConstantPool::new();
        defs.define(&mut pool, AttrContext::Code, "Extra", "NH[H]").expect("define");
        let resolved = pool.finalise();

        let mut headers = Vec::new();
        let mut out = Vec::new();
        let mut emitter = BandEmitter {
            selector: jarpack_codec::CodecSelector::new(1),
            band_headers: &mut headers,
            out: &mut out,
        };
        defs.encode_to(&resolved, &mut emitter).expect("encode");
        // header byte: context 3 | (17+1) << 2
        assert_eq!(out[0] as i32, 3 | (18 << 2));
    }
}
