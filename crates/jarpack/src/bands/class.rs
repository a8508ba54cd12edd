//! Class bands: per-class, per-member and per-code metadata.

use std::collections::HashMap;

use jarpack_codec::BhsdCodec;

use crate::bands::attr_defs::AttributeDefinitionBands;
use crate::bands::ic::IC_EXPLICIT;
use crate::bands::metadata::{MetadataBandGroup, MetadataSnapshot};
use crate::bands::{BandEmitter, BandSet};
use crate::cp::{ClassRef, ConstRef, DescrRef, ResolvedPool, SigRef, Utf8Ref};
use crate::error::Result;
use crate::options::AttrContext;

/// Stack/locals/handler limits of one code attribute, candidates for
/// header folding.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CodeLimits {
    pub max_stack: i32,
    pub max_na_locals: i32,
    pub handler_count: i32,
}

/// One renumbered exception-table entry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HandlerEntry {
    /// Handler range start, absolute instruction index
    pub start: i32,
    /// Range end minus start, in instructions
    pub end_offset: i32,
    /// Handler entry point minus range end, in instructions
    pub catch_offset: i32,
    /// The caught class, or none for `finally`
    pub class: Option<ClassRef>,
}

/// One local `InnerClasses` entry: a copy of the global tuple, or an
/// explicit override.
#[derive(Debug, Clone)]
pub(crate) struct LocalIcEntry {
    pub class: ClassRef,
    /// `None` copies the segment-global tuple (`F = 0`)
    pub explicit: Option<(u32, Option<ClassRef>, Option<Utf8Ref>)>,
}

/// One local-variable (or local-variable-type) table.
#[derive(Debug, Default)]
pub(crate) struct LocalVarBands {
    pub counts: Vec<i32>,
    pub bci: Vec<i32>,
    pub span: Vec<i32>,
    pub name: Vec<Utf8Ref>,
    pub sig: Vec<SigRef>,
    pub slot: Vec<i32>,
}

impl LocalVarBands {
    fn lens(&self) -> [usize; 6] {
        [
            self.counts.len(),
            self.bci.len(),
            self.span.len(),
            self.name.len(),
            self.sig.len(),
            self.slot.len(),
        ]
    }

    fn truncate(&mut self, lens: [usize; 6]) {
        self.counts.truncate(lens[0]);
        self.bci.truncate(lens[1]);
        self.span.truncate(lens[2]);
        self.name.truncate(lens[3]);
        self.sig.truncate(lens[4]);
        self.slot.truncate(lens[5]);
    }

    fn encode_to(
        &self,
        prefix: &str,
        pool: &ResolvedPool,
        emitter: &mut BandEmitter<'_>,
    ) -> Result<()> {
        emitter.band(&format!("{prefix}_N"), &self.counts, &BhsdCodec::UNSIGNED5)?;
        emitter.band(&format!("{prefix}_bci_P"), &self.bci, &BhsdCodec::BCI5)?;
        emitter.band(&format!("{prefix}_span_O"), &self.span, &BhsdCodec::BRANCH5)?;
        let names: Vec<i32> = self.name.iter().map(|&r| pool.utf8_index(r)).collect();
        emitter.band(&format!("{prefix}_name_RU"), &names, &BhsdCodec::UNSIGNED5)?;
        let sigs: Vec<i32> = self.sig.iter().map(|&r| pool.sig_index(r)).collect();
        emitter.band(&format!("{prefix}_type_RS"), &sigs, &BhsdCodec::UNSIGNED5)?;
        emitter.band(&format!("{prefix}_slot"), &self.slot, &BhsdCodec::UNSIGNED5)
    }
}

/// The class band family.
#[derive(Debug)]
pub(crate) struct ClassBands {
    pub class_this: Vec<ClassRef>,
    pub class_super: Vec<Option<ClassRef>>,
    pub class_interface_counts: Vec<i32>,
    pub class_interfaces: Vec<ClassRef>,
    pub class_field_counts: Vec<i32>,
    pub class_method_counts: Vec<i32>,
    pub class_flags: Vec<u64>,
    pub class_versions: Vec<(u16, u16)>,
    pub class_source_file: Vec<Option<Utf8Ref>>,
    pub class_enclosing: Vec<(ClassRef, Option<DescrRef>)>,
    pub class_signature: Vec<SigRef>,
    pub class_ic_counts: Vec<i32>,
    pub class_ic_entries: Vec<LocalIcEntry>,
    pub class_rva: MetadataBandGroup,
    pub class_ria: MetadataBandGroup,

    pub field_descr: Vec<DescrRef>,
    pub field_flags: Vec<u64>,
    pub field_constants: Vec<ConstRef>,
    pub field_signature: Vec<SigRef>,
    pub field_rva: MetadataBandGroup,
    pub field_ria: MetadataBandGroup,

    pub method_descr: Vec<DescrRef>,
    pub method_flags: Vec<u64>,
    pub method_exception_counts: Vec<i32>,
    pub method_exceptions: Vec<ClassRef>,
    pub method_signature: Vec<SigRef>,
    pub method_rva: MetadataBandGroup,
    pub method_ria: MetadataBandGroup,
    pub method_rvpa: MetadataBandGroup,
    pub method_ripa: MetadataBandGroup,
    pub method_ad: MetadataBandGroup,

    pub code_limits: Vec<CodeLimits>,
    pub code_handlers: Vec<HandlerEntry>,
    pub code_flags: Vec<u64>,
    pub code_lnt_counts: Vec<i32>,
    pub code_lnt_bci: Vec<i32>,
    pub code_lnt_line: Vec<i32>,
    pub code_lvt: LocalVarBands,
    pub code_lvtt: LocalVarBands,
}

/// Rollback snapshot of the class bands.
#[derive(Debug)]
pub(crate) struct ClassSnapshot {
    lens: Vec<usize>,
    lvt: [usize; 6],
    lvtt: [usize; 6],
    metadata: Vec<MetadataSnapshot>,
}

impl ClassBands {
    pub fn new() -> Self {
        Self {
            class_this: Vec::new(),
            class_super: Vec::new(),
            class_interface_counts: Vec::new(),
            class_interfaces: Vec::new(),
            class_field_counts: Vec::new(),
            class_method_counts: Vec::new(),
            class_flags: Vec::new(),
            class_versions: Vec::new(),
            class_source_file: Vec::new(),
            class_enclosing: Vec::new(),
            class_signature: Vec::new(),
            class_ic_counts: Vec::new(),
            class_ic_entries: Vec::new(),
            class_rva: MetadataBandGroup::new("class_RVA"),
            class_ria: MetadataBandGroup::new("class_RIA"),
            field_descr: Vec::new(),
            field_flags: Vec::new(),
            field_constants: Vec::new(),
            field_signature: Vec::new(),
            field_rva: MetadataBandGroup::new("field_RVA"),
            field_ria: MetadataBandGroup::new("field_RIA"),
            method_descr: Vec::new(),
            method_flags: Vec::new(),
            method_exception_counts: Vec::new(),
            method_exceptions: Vec::new(),
            method_signature: Vec::new(),
            method_rva: MetadataBandGroup::new("method_RVA"),
            method_ria: MetadataBandGroup::new("method_RIA"),
            method_rvpa: MetadataBandGroup::new("method_RVPA"),
            method_ripa: MetadataBandGroup::new("method_RIPA"),
            method_ad: MetadataBandGroup::new("method_AD"),
            code_limits: Vec::new(),
            code_handlers: Vec::new(),
            code_flags: Vec::new(),
            code_lnt_counts: Vec::new(),
            code_lnt_bci: Vec::new(),
            code_lnt_line: Vec::new(),
            code_lvt: LocalVarBands::default(),
            code_lvtt: LocalVarBands::default(),
        }
    }

    /// Number of classes shredded into the bands.
    pub fn class_count(&self) -> usize {
        self.class_this.len()
    }

    /// The default class-file version: minor zero, the most common
    /// observed major (smallest wins ties).
    pub fn default_version(&self) -> (u16, u16) {
        let mut counts: HashMap<u16, usize> = HashMap::new();
        for &(_, major) in &self.class_versions {
            *counts.entry(major).or_insert(0) += 1;
        }
        let major = counts
            .into_iter()
            .max_by_key(|&(major, count)| (count, std::cmp::Reverse(major)))
            .map_or(0, |(major, _)| major);
        (0, major)
    }

    /// Per-class flags with the non-default-version bit applied.
    fn effective_class_flags(&self) -> (Vec<u64>, Vec<i32>, Vec<i32>) {
        let default = self.default_version();
        let mut flags = self.class_flags.clone();
        let mut minor_band = Vec::new();
        let mut major_band = Vec::new();
        for (i, &(minor, major)) in self.class_versions.iter().enumerate() {
            if (minor, major) != default {
                flags[i] |= 1 << 24;
                minor_band.push(i32::from(minor));
                major_band.push(i32::from(major));
            }
        }
        (flags, minor_band, major_band)
    }

    /// Emit every class band in segment order.
    pub fn encode_to(
        &self,
        pool: &ResolvedPool,
        emitter: &mut BandEmitter<'_>,
        attr_defs: &AttributeDefinitionBands,
    ) -> Result<()> {
        let empty: Vec<i32> = Vec::new();

        let this: Vec<i32> = self.class_this.iter().map(|&c| pool.class_index(c)).collect();
        emitter.band("class_this", &this, &BhsdCodec::DELTA5)?;
        let superc: Vec<i32> = self
            .class_super
            .iter()
            .map(|s| s.map_or(0, |c| pool.class_index(c)))
            .collect();
        emitter.band("class_super", &superc, &BhsdCodec::DELTA5)?;
        emitter.band("class_interface_count", &self.class_interface_counts, &BhsdCodec::DELTA5)?;
        let interfaces: Vec<i32> =
            self.class_interfaces.iter().map(|&c| pool.class_index(c)).collect();
        emitter.band("class_interface", &interfaces, &BhsdCodec::DELTA5)?;
        emitter.band("class_field_count", &self.class_field_counts, &BhsdCodec::DELTA5)?;
        emitter.band("class_method_count", &self.class_method_counts, &BhsdCodec::DELTA5)?;

        // field bands
        let field_descr: Vec<i32> =
            self.field_descr.iter().map(|&d| pool.descr_index(d)).collect();
        emitter.band("field_descr", &field_descr, &BhsdCodec::DELTA5)?;
        emitter.flags("field_flags", &self.field_flags, attr_defs.uses_hi_flags(AttrContext::Field))?;
        emitter.band("field_attr_count", &empty, &BhsdCodec::UNSIGNED5)?;
        emitter.band("field_attr_indexes", &empty, &BhsdCodec::UNSIGNED5)?;
        emitter.band(
            "field_attr_calls",
            &attr_defs.backwards_counts(AttrContext::Field),
            &BhsdCodec::UNSIGNED5,
        )?;
        let constants: Vec<i32> =
            self.field_constants.iter().map(|&c| pool.const_index(c)).collect();
        emitter.band("field_ConstantValue_KQ", &constants, &BhsdCodec::UNSIGNED5)?;
        let field_sig: Vec<i32> =
            self.field_signature.iter().map(|&s| pool.sig_index(s)).collect();
        emitter.band("field_Signature_RS", &field_sig, &BhsdCodec::UNSIGNED5)?;
        self.field_rva.encode_to(pool, emitter)?;
        self.field_ria.encode_to(pool, emitter)?;
        attr_defs.pack_context_bands(AttrContext::Field, emitter)?;

        // method bands
        let method_descr: Vec<i32> =
            self.method_descr.iter().map(|&d| pool.descr_index(d)).collect();
        emitter.band("method_descr", &method_descr, &BhsdCodec::MDELTA5)?;
        emitter.flags(
            "method_flags",
            &self.method_flags,
            attr_defs.uses_hi_flags(AttrContext::Method),
        )?;
        emitter.band("method_attr_count", &empty, &BhsdCodec::UNSIGNED5)?;
        emitter.band("method_attr_indexes", &empty, &BhsdCodec::UNSIGNED5)?;
        emitter.band(
            "method_attr_calls",
            &attr_defs.backwards_counts(AttrContext::Method),
            &BhsdCodec::UNSIGNED5,
        )?;
        emitter.band("method_Exceptions_N", &self.method_exception_counts, &BhsdCodec::UNSIGNED5)?;
        let exceptions: Vec<i32> =
            self.method_exceptions.iter().map(|&c| pool.class_index(c)).collect();
        emitter.band("method_Exceptions_RC", &exceptions, &BhsdCodec::UNSIGNED5)?;
        let method_sig: Vec<i32> =
            self.method_signature.iter().map(|&s| pool.sig_index(s)).collect();
        emitter.band("method_Signature_RS", &method_sig, &BhsdCodec::UNSIGNED5)?;
        self.method_rva.encode_to(pool, emitter)?;
        self.method_ria.encode_to(pool, emitter)?;
        self.method_rvpa.encode_to(pool, emitter)?;
        self.method_ripa.encode_to(pool, emitter)?;
        self.method_ad.encode_to(pool, emitter)?;
        attr_defs.pack_context_bands(AttrContext::Method, emitter)?;

        // class attribute bands
        let (class_flags, minor_band, major_band) = self.effective_class_flags();
        emitter.flags("class_flags", &class_flags, attr_defs.uses_hi_flags(AttrContext::Class))?;
        emitter.band("class_attr_count", &empty, &BhsdCodec::UNSIGNED5)?;
        emitter.band("class_attr_indexes", &empty, &BhsdCodec::UNSIGNED5)?;
        emitter.band(
            "class_attr_calls",
            &attr_defs.backwards_counts(AttrContext::Class),
            &BhsdCodec::UNSIGNED5,
        )?;
        let source: Vec<i32> = self
            .class_source_file
            .iter()
            .map(|s| s.map_or(0, |u| pool.utf8_index(u) + 1))
            .collect();
        emitter.band("class_SourceFile_RUN", &source, &BhsdCodec::UNSIGNED5)?;
        let enclosing_class: Vec<i32> =
            self.class_enclosing.iter().map(|&(c, _)| pool.class_index(c)).collect();
        emitter.band("class_EnclosingMethod_RC", &enclosing_class, &BhsdCodec::UNSIGNED5)?;
        let enclosing_descr: Vec<i32> = self
            .class_enclosing
            .iter()
            .map(|&(_, d)| d.map_or(0, |d| pool.descr_index(d) + 1))
            .collect();
        emitter.band("class_EnclosingMethod_RDN", &enclosing_descr, &BhsdCodec::UNSIGNED5)?;
        let class_sig: Vec<i32> =
            self.class_signature.iter().map(|&s| pool.sig_index(s)).collect();
        emitter.band("class_Signature_RS", &class_sig, &BhsdCodec::UNSIGNED5)?;

        emitter.band("class_InnerClasses_N", &self.class_ic_counts, &BhsdCodec::UNSIGNED5)?;
        let ic_class: Vec<i32> =
            self.class_ic_entries.iter().map(|e| pool.class_index(e.class)).collect();
        emitter.band("class_InnerClasses_RC", &ic_class, &BhsdCodec::UNSIGNED5)?;
        let ic_flags: Vec<i32> = self
            .class_ic_entries
            .iter()
            .map(|e| e.explicit.as_ref().map_or(0, |&(f, _, _)| f as i32))
            .collect();
        emitter.band("class_InnerClasses_F", &ic_flags, &BhsdCodec::UNSIGNED5)?;
        let mut ic_outer = Vec::new();
        let mut ic_name = Vec::new();
        for entry in &self.class_ic_entries {
            if let Some((flags, outer, name)) = &entry.explicit
                && flags & IC_EXPLICIT != 0
            {
                ic_outer.push(outer.map_or(0, |c| pool.class_index(c) + 1));
                ic_name.push(name.map_or(0, |n| pool.utf8_index(n) + 1));
            }
        }
        emitter.band("class_InnerClasses_outer_RCN", &ic_outer, &BhsdCodec::UNSIGNED5)?;
        emitter.band("class_InnerClasses_name_RUN", &ic_name, &BhsdCodec::UNSIGNED5)?;

        emitter.band("class_ClassFile_version_minor_H", &minor_band, &BhsdCodec::UNSIGNED5)?;
        emitter.band("class_ClassFile_version_major_H", &major_band, &BhsdCodec::UNSIGNED5)?;
        self.class_rva.encode_to(pool, emitter)?;
        self.class_ria.encode_to(pool, emitter)?;
        attr_defs.pack_context_bands(AttrContext::Class, emitter)?;

        // code bands
        let mut headers = Vec::new();
        let mut max_stack = Vec::new();
        let mut max_na_locals = Vec::new();
        let mut handler_counts = Vec::new();
        for limits in &self.code_limits {
            let header = fold_code_header(limits);
            headers.push(header);
            if header == 0 {
                max_stack.push(limits.max_stack);
                max_na_locals.push(limits.max_na_locals);
                handler_counts.push(limits.handler_count);
            }
        }
        emitter.band("code_headers", &headers, &BhsdCodec::BYTE1)?;
        emitter.band("code_max_stack", &max_stack, &BhsdCodec::UNSIGNED5)?;
        emitter.band("code_max_na_locals", &max_na_locals, &BhsdCodec::UNSIGNED5)?;
        emitter.band("code_handler_count", &handler_counts, &BhsdCodec::UNSIGNED5)?;

        let starts: Vec<i32> = self.code_handlers.iter().map(|h| h.start).collect();
        emitter.band("code_handler_start_P", &starts, &BhsdCodec::BCI5)?;
        let ends: Vec<i32> = self.code_handlers.iter().map(|h| h.end_offset).collect();
        emitter.band("code_handler_end_PO", &ends, &BhsdCodec::BRANCH5)?;
        let catches: Vec<i32> = self.code_handlers.iter().map(|h| h.catch_offset).collect();
        emitter.band("code_handler_catch_PO", &catches, &BhsdCodec::BRANCH5)?;
        let handler_class: Vec<i32> = self
            .code_handlers
            .iter()
            .map(|h| h.class.map_or(0, |c| pool.class_index(c) + 1))
            .collect();
        emitter.band("code_handler_class_RCN", &handler_class, &BhsdCodec::UNSIGNED5)?;

        emitter.flags("code_flags", &self.code_flags, attr_defs.uses_hi_flags(AttrContext::Code))?;
        emitter.band("code_attr_count", &empty, &BhsdCodec::UNSIGNED5)?;
        emitter.band("code_attr_indexes", &empty, &BhsdCodec::UNSIGNED5)?;
        emitter.band(
            "code_attr_calls",
            &attr_defs.backwards_counts(AttrContext::Code),
            &BhsdCodec::UNSIGNED5,
        )?;
        emitter.band("code_LineNumberTable_N", &self.code_lnt_counts, &BhsdCodec::UNSIGNED5)?;
        emitter.band("code_LineNumberTable_bci_P", &self.code_lnt_bci, &BhsdCodec::BCI5)?;
        emitter.band("code_LineNumberTable_line", &self.code_lnt_line, &BhsdCodec::UNSIGNED5)?;
        self.code_lvt.encode_to("code_LocalVariableTable", pool, emitter)?;
        self.code_lvtt.encode_to("code_LocalVariableTypeTable", pool, emitter)?;
        attr_defs.pack_context_bands(AttrContext::Code, emitter)
    }

    pub fn snapshot(&self) -> ClassSnapshot {
        ClassSnapshot {
            lens: vec![
                self.class_this.len(),
                self.class_super.len(),
                self.class_interface_counts.len(),
                self.class_interfaces.len(),
                self.class_field_counts.len(),
                self.class_method_counts.len(),
                self.class_flags.len(),
                self.class_versions.len(),
                self.class_source_file.len(),
                self.class_enclosing.len(),
                self.class_signature.len(),
                self.class_ic_counts.len(),
                self.class_ic_entries.len(),
                self.field_descr.len(),
                self.field_flags.len(),
                self.field_constants.len(),
                self.field_signature.len(),
                self.method_descr.len(),
                self.method_flags.len(),
                self.method_exception_counts.len(),
                self.method_exceptions.len(),
                self.method_signature.len(),
                self.code_limits.len(),
                self.code_handlers.len(),
                self.code_flags.len(),
                self.code_lnt_counts.len(),
                self.code_lnt_bci.len(),
                self.code_lnt_line.len(),
            ],
            lvt: self.code_lvt.lens(),
            lvtt: self.code_lvtt.lens(),
            metadata: vec![
                self.class_rva.snapshot(),
                self.class_ria.snapshot(),
                self.field_rva.snapshot(),
                self.field_ria.snapshot(),
                self.method_rva.snapshot(),
                self.method_ria.snapshot(),
                self.method_rvpa.snapshot(),
                self.method_ripa.snapshot(),
                self.method_ad.snapshot(),
            ],
        }
    }

    pub fn rollback(&mut self, s: &ClassSnapshot) {
        self.class_this.truncate(s.lens[0]);
        self.class_super.truncate(s.lens[1]);
        self.class_interface_counts.truncate(s.lens[2]);
        self.class_interfaces.truncate(s.lens[3]);
        self.class_field_counts.truncate(s.lens[4]);
        self.class_method_counts.truncate(s.lens[5]);
        self.class_flags.truncate(s.lens[6]);
        self.class_versions.truncate(s.lens[7]);
        self.class_source_file.truncate(s.lens[8]);
        self.class_enclosing.truncate(s.lens[9]);
        self.class_signature.truncate(s.lens[10]);
        self.class_ic_counts.truncate(s.lens[11]);
        self.class_ic_entries.truncate(s.lens[12]);
        self.field_descr.truncate(s.lens[13]);
        self.field_flags.truncate(s.lens[14]);
        self.field_constants.truncate(s.lens[15]);
        self.field_signature.truncate(s.lens[16]);
        self.method_descr.truncate(s.lens[17]);
        self.method_flags.truncate(s.lens[18]);
        self.method_exception_counts.truncate(s.lens[19]);
        self.method_exceptions.truncate(s.lens[20]);
        self.method_signature.truncate(s.lens[21]);
        self.code_limits.truncate(s.lens[22]);
        self.code_handlers.truncate(s.lens[23]);
        self.code_flags.truncate(s.lens[24]);
        self.code_lnt_counts.truncate(s.lens[25]);
        self.code_lnt_bci.truncate(s.lens[26]);
        self.code_lnt_line.truncate(s.lens[27]);
        self.code_lvt.truncate(s.lvt);
        self.code_lvtt.truncate(s.lvtt);
        self.class_rva.rollback(&s.metadata[0]);
        self.class_ria.rollback(&s.metadata[1]);
        self.field_rva.rollback(&s.metadata[2]);
        self.field_ria.rollback(&s.metadata[3]);
        self.method_rva.rollback(&s.metadata[4]);
        self.method_ria.rollback(&s.metadata[5]);
        self.method_rvpa.rollback(&s.metadata[6]);
        self.method_ripa.rollback(&s.metadata[7]);
        self.method_ad.rollback(&s.metadata[8]);
    }
}

/// Fold small code limits into a single header byte: handler counts of
/// zero, one and two get the ranges starting at 1, 145 and 209.
pub(crate) fn fold_code_header(limits: &CodeLimits) -> i32 {
    let (stack, locals, handlers) =
        (limits.max_stack, limits.max_na_locals, limits.handler_count);
    if stack < 0 || locals < 0 {
        return 0;
    }
    match handlers {
        0 if stack < 12 => {
            let header = locals * 12 + stack + 1;
            if header < 145 { header } else { 0 }
        }
        1 if stack < 8 => {
            let header = locals * 8 + stack + 145;
            if header < 209 { header } else { 0 }
        }
        2 if stack < 7 => {
            let header = locals * 7 + stack + 209;
            if header < 256 { header } else { 0 }
        }
        _ => 0,
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_code_header_folding_ranges() {
        // no handlers: max_locals*12 + max_stack + 1
        assert_eq!(
            fold_code_header(&CodeLimits { max_stack: 0, max_na_locals: 0, handler_count: 0 }),
            1
        );
        assert_eq!(
            fold_code_header(&CodeLimits { max_stack: 11, max_na_locals: 11, handler_count: 0 }),
            144
        );
        assert_eq!(
            fold_code_header(&CodeLimits { max_stack: 12, max_na_locals: 0, handler_count: 0 }),
            0,
            "stack 12 never folds"
        );
        // one handler
        assert_eq!(
            fold_code_header(&CodeLimits { max_stack: 0, max_na_locals: 0, handler_count: 1 }),
            145
        );
        assert_eq!(
            fold_code_header(&CodeLimits { max_stack: 7, max_na_locals: 7, handler_count: 1 }),
            208
        );
        assert_eq!(
            fold_code_header(&CodeLimits { max_stack: 0, max_na_locals: 8, handler_count: 1 }),
            0,
            "209 belongs to the two-handler range"
        );
        // two handlers
        assert_eq!(
            fold_code_header(&CodeLimits { max_stack: 0, max_na_locals: 0, handler_count: 2 }),
            209
        );
        assert_eq!(
            fold_code_header(&CodeLimits { max_stack: 4, max_na_locals: 6, handler_count: 2 }),
            255
        );
        assert_eq!(
            fold_code_header(&CodeLimits { max_stack: 5, max_na_locals: 6, handler_count: 2 }),
            0,
            "256 does not fit the header byte"
        );
        // three handlers never fold
        assert_eq!(
            fold_code_header(&CodeLimits { max_stack: 0, max_na_locals: 0, handler_count: 3 }),
            0
        );
    }

    #[test]
    fn test_default_version_most_common_major() {
        let mut bands = ClassBands::new();
        bands.class_versions.extend([(0, 52), (0, 49), (0, 52)]);
        assert_eq!(bands.default_version(), (0, 52));
    }

    #[test]
    fn test_default_version_tie_prefers_smaller() {
        let mut bands = ClassBands::new();
        bands.class_versions.extend([(0, 52), (0, 49)]);
        assert_eq!(bands.default_version(), (0, 49));
    }

    #[test]
    fn test_non_default_version_sets_flag_bit() {
        let mut bands = ClassBands::new();
        bands.class_versions.extend([(0, 52), (0, 52), (3, 52)]);
        bands.class_flags.extend([0, 0, 0]);
        let (flags, minor, major) = bands.effective_class_flags();
        assert_eq!(flags, vec![0, 0, 1 << 24]);
        assert_eq!(minor, vec![3]);
        assert_eq!(major, vec![52]);
    }
}
