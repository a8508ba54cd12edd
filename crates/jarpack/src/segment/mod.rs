//! One segment: the shredder, its band state, and segment emission.
//!
//! The segment implements [`ClassVisitor`]; the external parser drives it
//! over each class, and the visitor callbacks distribute what they see
//! into the band sets. A class that cannot be shredded rolls every band
//! back to its pre-class snapshot and travels verbatim in the file bands.

pub(crate) mod header;
mod unit;

use std::collections::HashSet;
use std::io::Write;

use jarpack_codec::{BhsdCodec, CodecSelector};
use tracing::{debug, info, trace};

use crate::bands::attr_defs::{AttrDefSnapshot, AttributeDefinitionBands};
use crate::bands::bc::{BcBands, BcSnapshot};
use crate::bands::class::{ClassBands, ClassSnapshot, CodeLimits, HandlerEntry, LocalIcEntry};
use crate::bands::cp::CpBands;
use crate::bands::file::{FileBands, FO_DEFLATE_HINT, FO_IS_CLASS_STUB};
use crate::bands::ic::{IcBands, IC_EXPLICIT};
use crate::bands::metadata::MetadataBandGroup;
use crate::bands::{BandEmitter, BandSet};
use crate::cp::{ClassRef, ConstantPool, DescrRef, SigRef};
use crate::error::{PackError, Result};
use crate::offsets::OffsetMap;
use crate::options::{
    AttrContext, AttributeAction, AttributeDisposition, DeflateHint, PackOptions,
};
use crate::visitor::{
    descriptor_arg_count, Annotation, AnnotationValue, ClassParser, ClassVisitor, CpValue,
};

pub use unit::{InputFile, SegmentUnit};

use header::{
    SegmentHeader, DEFLATE_HINT, HAVE_ALL_CODE_FLAGS, HAVE_CLASS_FLAGS_HI, HAVE_CODE_FLAGS_HI,
    HAVE_CP_NUMBERS, HAVE_FIELD_FLAGS_HI, HAVE_FILE_HEADERS, HAVE_FILE_MODTIME,
    HAVE_FILE_OPTIONS, HAVE_FILE_SIZE_HI, HAVE_METHOD_FLAGS_HI, HAVE_SPECIAL_FORMATS,
};

// Attribute presence bits shared by the four flag words.
const FLAG_SOURCE_FILE: u64 = 1 << 17; // ConstantValue on fields, Code on methods
const FLAG_ENCLOSING_METHOD: u64 = 1 << 18; // Exceptions on methods
const FLAG_SIGNATURE: u64 = 1 << 19;
const FLAG_DEPRECATED: u64 = 1 << 20;
const FLAG_RVA: u64 = 1 << 21;
const FLAG_RIA: u64 = 1 << 22;
const FLAG_INNER_CLASSES: u64 = 1 << 23; // RVPA on methods
const FLAG_RIPA: u64 = 1 << 24;
const FLAG_AD: u64 = 1 << 25;

const CODE_FLAG_LNT: u64 = 1 << 1;
const CODE_FLAG_LVT: u64 = 1 << 2;
const CODE_FLAG_LVTT: u64 = 1 << 3;

const ACC_STATIC: u16 = 0x0008;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Target {
    #[default]
    Class,
    Field,
    Method,
}

#[derive(Debug, Default)]
struct RawHandler {
    start: u32,
    end: u32,
    handler: u32,
    catch_type: Option<ClassRef>,
}

#[derive(Debug)]
struct RawLocalVar {
    name: String,
    desc: String,
    start: u32,
    length: u32,
    slot: u16,
}

#[derive(Debug, Default)]
struct ShredState {
    class_name: String,
    super_name: Option<String>,
    target: Target,
    in_code: bool,
    passing: bool,

    class_flags: u64,
    field_flags: u64,
    method_flags: u64,
    code_flags: u64,

    field_count: i32,
    method_count: i32,

    method_desc: String,
    method_access: u16,
    has_code: bool,
    max_stack: u16,
    max_locals: u16,
    offsets: OffsetMap,
    handlers: Vec<RawHandler>,
    line_numbers: Vec<(u32, u16)>,
    local_vars: Vec<RawLocalVar>,
    local_var_types: Vec<RawLocalVar>,

    refs: HashSet<ClassRef>,
    own_explicit: Vec<LocalIcEntry>,

    class_rva_n: i32,
    class_ria_n: i32,
    field_rva_n: i32,
    field_ria_n: i32,
    method_rva_n: i32,
    method_ria_n: i32,
    rvpa_counts: Vec<i32>,
    ripa_counts: Vec<i32>,
}

struct Snapshot {
    class: ClassSnapshot,
    bc: BcSnapshot,
    attrs: AttrDefSnapshot,
    ic: usize,
}

/// What shredding one class produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ClassOutcome {
    /// The class was distributed into the bands
    Shredded,
    /// The class could not be shredded; its original bytes travel in
    /// the file bands instead
    Passed(Vec<u8>),
}

/// One segment under construction.
pub(crate) struct Segment<'o> {
    options: &'o PackOptions,
    pool: ConstantPool,
    ic: IcBands,
    class_bands: ClassBands,
    bc: BcBands,
    attr_defs: AttributeDefinitionBands,
    files: FileBands,
    state: ShredState,
}

impl<'o> Segment<'o> {
    /// A fresh segment. Attribute-layout overrides from the options are
    /// defined up front so their flag indexes are stable.
    pub fn new(options: &'o PackOptions) -> Result<Self> {
        let mut segment = Self {
            options,
            pool: ConstantPool::new(),
            ic: IcBands::new(),
            class_bands: ClassBands::new(),
            bc: BcBands::new(),
            attr_defs: AttributeDefinitionBands::new(),
            files: FileBands::new(),
            state: ShredState::default(),
        };
        let mut overrides: Vec<(&(AttrContext, String), &AttributeDisposition)> =
            options.attribute_overrides.iter().collect();
        overrides.sort_by_key(|((context, name), _)| (context.code(), name.clone()));
        for ((context, name), disposition) in overrides {
            if let AttributeDisposition::Layout(layout) = disposition {
                segment.attr_defs.define(&mut segment.pool, *context, name, layout)?;
            }
        }
        Ok(segment)
    }

    /// Pack one unit: shred its classes, absorb its files, and write the
    /// complete segment. Returns the packed byte count.
    pub fn pack<W: Write>(
        mut self,
        unit: SegmentUnit,
        parser: &dyn ClassParser,
        out: &mut W,
    ) -> Result<u64> {
        let input_bytes = unit.byte_count();
        for file in unit.files {
            if file.is_directory {
                continue;
            }
            if file.is_class() && !self.options.is_pass_file(&file.name) {
                match self.shred_class(parser, &file)? {
                    ClassOutcome::Shredded => {}
                    ClassOutcome::Passed(bytes) => {
                        debug!(file = %file.name, "class passed through");
                        self.add_file(&file, bytes, FO_IS_CLASS_STUB);
                    }
                }
            } else {
                let bytes = file.bytes.clone();
                self.add_file(&file, bytes, 0);
            }
        }
        self.attr_defs.resolve_plain_attributes();

        let class_count = self.class_bands.class_count();
        let (default_minver, default_majver) = self.class_bands.default_version();
        let archive_modtime = self.files.latest_modtime();
        let have_modtime = self.files.any_modtime();
        let have_options = self.files.any_options();
        let have_size_hi = self.files.any_size_hi();

        let pool = std::mem::take(&mut self.pool).finalise();
        let mut band_headers: Vec<i32> = Vec::new();
        let mut body: Vec<u8> = Vec::new();
        {
            let mut emitter = BandEmitter {
                selector: CodecSelector::new(self.options.effort),
                band_headers: &mut band_headers,
                out: &mut body,
            };
            CpBands.encode_to(&pool, &mut emitter)?;
            self.attr_defs.encode_to(&pool, &mut emitter)?;
            self.ic.encode_to(&pool, &mut emitter)?;
            self.class_bands.encode_to(&pool, &mut emitter, &self.attr_defs)?;
            self.bc.encode_to(&pool, &mut emitter)?;
            self.files.encode_to(
                &pool,
                &mut emitter,
                archive_modtime,
                have_modtime,
                have_options,
                have_size_hi,
            )?;
        }
        let band_headers_bytes = BhsdCodec::BYTE1.encode_ints(&band_headers)?;

        let mut archive_options = HAVE_ALL_CODE_FLAGS;
        if self.attr_defs.count() > 0 || !band_headers.is_empty() {
            archive_options |= HAVE_SPECIAL_FORMATS;
        }
        if pool.has_numbers() {
            archive_options |= HAVE_CP_NUMBERS;
        }
        if self.files.count() > 0 {
            archive_options |= HAVE_FILE_HEADERS;
        }
        if self.options.deflate_hint == DeflateHint::True {
            archive_options |= DEFLATE_HINT;
        }
        if have_modtime {
            archive_options |= HAVE_FILE_MODTIME;
        }
        if have_options {
            archive_options |= HAVE_FILE_OPTIONS;
        }
        if have_size_hi {
            archive_options |= HAVE_FILE_SIZE_HI;
        }
        if self.attr_defs.uses_hi_flags(AttrContext::Class) {
            archive_options |= HAVE_CLASS_FLAGS_HI;
        }
        if self.attr_defs.uses_hi_flags(AttrContext::Field) {
            archive_options |= HAVE_FIELD_FLAGS_HI;
        }
        if self.attr_defs.uses_hi_flags(AttrContext::Method) {
            archive_options |= HAVE_METHOD_FLAGS_HI;
        }
        if self.attr_defs.uses_hi_flags(AttrContext::Code) {
            archive_options |= HAVE_CODE_FLAGS_HI;
        }

        let header = SegmentHeader {
            archive_options,
            archive_size: (band_headers_bytes.len() + body.len()) as u64,
            archive_next_count: 0,
            archive_modtime,
            file_count: self.files.count(),
            band_headers_size: band_headers_bytes.len(),
            attr_definition_count: self.attr_defs.count(),
            cp_counts: pool.counts(),
            ic_count: self.ic.count(),
            default_class_minver: default_minver,
            default_class_majver: default_majver,
            class_count,
        };
        let header_len = header.write_to(out)?;
        out.write_all(&band_headers_bytes)?;
        out.write_all(&body)?;

        let total = (header_len + band_headers_bytes.len() + body.len()) as u64;
        info!(
            classes = class_count,
            files = header.file_count,
            input_bytes,
            packed_bytes = total,
            "segment packed"
        );
        Ok(total)
    }

    /// Shred one class, or roll every band back and hand the original
    /// bytes over for the file bands.
    fn shred_class(&mut self, parser: &dyn ClassParser, file: &InputFile) -> Result<ClassOutcome> {
        let snapshot = self.snapshot();
        self.state = ShredState::default();
        trace!(file = %file.name, "shredding class");
        match parser.parse(&file.bytes, self) {
            Ok(()) if !self.state.passing => Ok(ClassOutcome::Shredded),
            Ok(()) => {
                self.rollback(&snapshot);
                Ok(ClassOutcome::Passed(file.bytes.clone()))
            }
            Err(e) => {
                let recoverable = matches!(
                    e,
                    PackError::MalformedClass { .. } | PackError::TruncatedInput { .. }
                );
                if recoverable
                    && self.options.unknown_attribute_action == AttributeAction::Pass
                {
                    debug!(file = %file.name, error = %e, "pass-through after parse failure");
                    self.rollback(&snapshot);
                    Ok(ClassOutcome::Passed(file.bytes.clone()))
                } else if let PackError::MalformedClass { class, reason } = e {
                    Err(PackError::MalformedClass {
                        class: if class.is_empty() { file.name.clone() } else { class },
                        reason,
                    })
                } else {
                    Err(e)
                }
            }
        }
    }

    fn add_file(&mut self, file: &InputFile, bytes: Vec<u8>, extra_options: i32) {
        let mut options = extra_options;
        if self.options.deflate_hint == DeflateHint::Keep && file.deflate_hint {
            options |= FO_DEFLATE_HINT;
        }
        self.files.add_file(&mut self.pool, &file.name, bytes, file.modtime, options);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            class: self.class_bands.snapshot(),
            bc: self.bc.snapshot(),
            attrs: self.attr_defs.snapshot(),
            ic: self.ic.snapshot(),
        }
    }

    fn rollback(&mut self, snapshot: &Snapshot) {
        self.class_bands.rollback(&snapshot.class);
        self.bc.rollback(&snapshot.bc);
        self.attr_defs.rollback(&snapshot.attrs);
        self.ic.rollback(snapshot.ic);
    }

    fn intern_class_ref(&mut self, name: &str) -> ClassRef {
        let r = self.pool.add_class(name);
        self.state.refs.insert(r);
        r
    }

    fn intern_signature(&mut self, signature: &str) -> SigRef {
        let r = self.pool.add_signature(signature);
        for &class in self.pool.signature_classes(r) {
            self.state.refs.insert(class);
        }
        r
    }

    fn intern_descr(&mut self, name: &str, desc: &str) -> DescrRef {
        let r = self.pool.add_descr(name, desc);
        let sig = self.pool.descr_sig(r);
        for &class in self.pool.signature_classes(sig) {
            self.state.refs.insert(class);
        }
        r
    }

    fn attribute_context(&self) -> AttrContext {
        if self.state.in_code {
            AttrContext::Code
        } else {
            match self.state.target {
                Target::Class => AttrContext::Class,
                Target::Field => AttrContext::Field,
                Target::Method => AttrContext::Method,
            }
        }
    }

    fn target_flags(&mut self) -> &mut u64 {
        if self.state.in_code {
            &mut self.state.code_flags
        } else {
            match self.state.target {
                Target::Class => &mut self.state.class_flags,
                Target::Field => &mut self.state.field_flags,
                Target::Method => &mut self.state.method_flags,
            }
        }
    }

    /// The simple source name a decoder would derive: the class name
    /// after its package, cut at the first `$`, plus `.java`.
    fn implicit_source_name(class_name: &str) -> String {
        let simple = class_name.rsplit('/').next().unwrap_or(class_name);
        let simple = simple.split('$').next().unwrap_or(simple);
        format!("{simple}.java")
    }

    fn flush_member_annotations(&mut self) {
        match self.state.target {
            Target::Field => {
                if self.state.field_rva_n > 0 {
                    self.class_bands.field_rva.add_entity(self.state.field_rva_n);
                    self.state.field_flags |= FLAG_RVA;
                    self.state.field_rva_n = 0;
                }
                if self.state.field_ria_n > 0 {
                    self.class_bands.field_ria.add_entity(self.state.field_ria_n);
                    self.state.field_flags |= FLAG_RIA;
                    self.state.field_ria_n = 0;
                }
            }
            Target::Method => {
                if self.state.method_rva_n > 0 {
                    self.class_bands.method_rva.add_entity(self.state.method_rva_n);
                    self.state.method_flags |= FLAG_RVA;
                    self.state.method_rva_n = 0;
                }
                if self.state.method_ria_n > 0 {
                    self.class_bands.method_ria.add_entity(self.state.method_ria_n);
                    self.state.method_flags |= FLAG_RIA;
                    self.state.method_ria_n = 0;
                }
                if !self.state.rvpa_counts.is_empty() {
                    let counts = std::mem::take(&mut self.state.rvpa_counts);
                    self.class_bands.method_rvpa.add_param_count(counts.len() as i32);
                    for count in counts {
                        self.class_bands.method_rvpa.add_entity(count);
                    }
                    self.state.method_flags |= FLAG_INNER_CLASSES;
                }
                if !self.state.ripa_counts.is_empty() {
                    let counts = std::mem::take(&mut self.state.ripa_counts);
                    self.class_bands.method_ripa.add_param_count(counts.len() as i32);
                    for count in counts {
                        self.class_bands.method_ripa.add_entity(count);
                    }
                    self.state.method_flags |= FLAG_RIPA;
                }
            }
            Target::Class => {}
        }
    }

    fn finish_local_inner_classes(&mut self) {
        let mut entries = std::mem::take(&mut self.state.own_explicit);
        let mut seen: HashSet<ClassRef> = entries.iter().map(|e| e.class).collect();
        let mut refs: Vec<ClassRef> = self.state.refs.iter().copied().collect();
        refs.sort_by(|a, b| self.pool.class_name(*a).cmp(self.pool.class_name(*b)));
        for r in refs {
            if seen.contains(&r) || !self.pool.is_inner_class(r) {
                continue;
            }
            let name = self.pool.class_name(r);
            if name == self.state.class_name {
                continue;
            }
            // enclosing scopes are derivable, never listed
            if self.state.class_name.len() > name.len()
                && self.state.class_name.starts_with(name)
                && self.state.class_name.as_bytes()[name.len()] == b'$'
            {
                continue;
            }
            let Some(tuple) = self.ic.tuple_for(r) else { continue };
            if tuple.anonymous || self.ic.implied_for(tuple, &self.state.class_name) {
                continue;
            }
            seen.insert(r);
            entries.push(LocalIcEntry { class: r, explicit: None });
        }
        if !entries.is_empty() {
            self.state.class_flags |= FLAG_INNER_CLASSES;
            self.class_bands.class_ic_counts.push(entries.len() as i32);
            self.class_bands.class_ic_entries.extend(entries);
        }
    }
}

impl ClassVisitor for Segment<'_> {
    fn begin_class(
        &mut self,
        minor: u16,
        major: u16,
        access: u16,
        name: &str,
        super_name: Option<&str>,
        interfaces: &[String],
    ) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.class_name = name.to_string();
        self.state.super_name = super_name.map(str::to_string);
        self.state.class_flags = u64::from(access);
        self.state.target = Target::Class;

        let this = self.pool.add_class(name);
        self.class_bands.class_this.push(this);
        let superc = super_name.map(|s| self.intern_class_ref(s));
        self.class_bands.class_super.push(superc);
        self.class_bands.class_interface_counts.push(interfaces.len() as i32);
        for interface in interfaces {
            let r = self.intern_class_ref(interface);
            self.class_bands.class_interfaces.push(r);
        }
        self.class_bands.class_versions.push((minor, major));
        Ok(())
    }

    fn visit_source_file(&mut self, name: &str) -> Result<()> {
        if self.state.passing || self.options.strip_debug {
            return Ok(());
        }
        let implicit = Self::implicit_source_name(&self.state.class_name);
        let value = if name == implicit { None } else { Some(self.pool.add_utf8(name)) };
        self.class_bands.class_source_file.push(value);
        self.state.class_flags |= FLAG_SOURCE_FILE;
        Ok(())
    }

    fn visit_enclosing_method(
        &mut self,
        owner: &str,
        method_name: Option<&str>,
        method_desc: Option<&str>,
    ) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        let class = self.intern_class_ref(owner);
        let descr = match (method_name, method_desc) {
            (Some(name), Some(desc)) => Some(self.intern_descr(name, desc)),
            _ => None,
        };
        self.class_bands.class_enclosing.push((class, descr));
        self.state.class_flags |= FLAG_ENCLOSING_METHOD;
        Ok(())
    }

    fn visit_signature(&mut self, signature: &str) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        let sig = self.intern_signature(signature);
        match self.state.target {
            Target::Class => self.class_bands.class_signature.push(sig),
            Target::Field => self.class_bands.field_signature.push(sig),
            Target::Method => self.class_bands.method_signature.push(sig),
        }
        *self.target_flags() |= FLAG_SIGNATURE;
        Ok(())
    }

    fn visit_deprecated(&mut self) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        *self.target_flags() |= FLAG_DEPRECATED;
        Ok(())
    }

    fn visit_inner_class(
        &mut self,
        name: &str,
        outer_name: Option<&str>,
        inner_name: Option<&str>,
        access: u16,
    ) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        let class = self.intern_class_ref(name);
        let (_, conflict) =
            self.ic.add_tuple(&mut self.pool, name, outer_name, inner_name, access);
        if conflict {
            // this class's own attribute disagrees with the segment
            // tuple, so its entry travels explicitly
            let outer = outer_name.map(|o| self.pool.add_class(o));
            let inner = inner_name.map(|n| self.pool.add_utf8(n));
            self.state.own_explicit.push(LocalIcEntry {
                class,
                explicit: Some((u32::from(access) | IC_EXPLICIT, outer, inner)),
            });
        }
        Ok(())
    }

    fn visit_annotation(&mut self, annotation: &Annotation, visible: bool) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        let group: &mut MetadataBandGroup = match (self.state.target, visible) {
            (Target::Class, true) => &mut self.class_bands.class_rva,
            (Target::Class, false) => &mut self.class_bands.class_ria,
            (Target::Field, true) => &mut self.class_bands.field_rva,
            (Target::Field, false) => &mut self.class_bands.field_ria,
            (Target::Method, true) => &mut self.class_bands.method_rva,
            (Target::Method, false) => &mut self.class_bands.method_ria,
        };
        group.add_annotation(&mut self.pool, annotation)?;
        match (self.state.target, visible) {
            (Target::Class, true) => self.state.class_rva_n += 1,
            (Target::Class, false) => self.state.class_ria_n += 1,
            (Target::Field, true) => self.state.field_rva_n += 1,
            (Target::Field, false) => self.state.field_ria_n += 1,
            (Target::Method, true) => self.state.method_rva_n += 1,
            (Target::Method, false) => self.state.method_ria_n += 1,
        }
        Ok(())
    }

    fn visit_parameter_annotation(
        &mut self,
        parameter: u8,
        annotation: &Annotation,
        visible: bool,
    ) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        let group = if visible {
            &mut self.class_bands.method_rvpa
        } else {
            &mut self.class_bands.method_ripa
        };
        group.add_annotation(&mut self.pool, annotation)?;
        let counts =
            if visible { &mut self.state.rvpa_counts } else { &mut self.state.ripa_counts };
        if counts.len() <= usize::from(parameter) {
            counts.resize(usize::from(parameter) + 1, 0);
        }
        counts[usize::from(parameter)] += 1;
        Ok(())
    }

    fn visit_annotation_default(&mut self, value: &AnnotationValue) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.class_bands.method_ad.add_value(&mut self.pool, value)?;
        self.state.method_flags |= FLAG_AD;
        Ok(())
    }

    fn visit_attribute(&mut self, name: &str, payload: &[u8]) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        let context = self.attribute_context();
        match self.options.attribute_disposition(context, name) {
            AttributeDisposition::Layout(_) => {
                let Some(def) = self.attr_defs.lookup(context, name) else {
                    // layouts are registered up front; an unknown one
                    // here is a bookkeeping bug, treat it as unknown
                    return Err(PackError::UnknownAttribute {
                        attribute: name.to_string(),
                        class: self.state.class_name.clone(),
                    });
                };
                let index = self.attr_defs.flag_index(def);
                *self.target_flags() |= 1 << index;
                self.attr_defs.add_instance(def, payload)
            }
            AttributeDisposition::Action(AttributeAction::Pass) => {
                debug!(
                    class = %self.state.class_name,
                    attribute = name,
                    "unknown attribute, passing class through"
                );
                self.state.passing = true;
                Ok(())
            }
            AttributeDisposition::Action(AttributeAction::Error) => {
                Err(PackError::UnknownAttribute {
                    attribute: name.to_string(),
                    class: self.state.class_name.clone(),
                })
            }
            AttributeDisposition::Action(AttributeAction::Strip) => {
                debug!(
                    class = %self.state.class_name,
                    attribute = name,
                    "stripping unknown attribute"
                );
                Ok(())
            }
        }
    }

    fn begin_field(
        &mut self,
        access: u16,
        name: &str,
        desc: &str,
        constant: Option<&CpValue>,
    ) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.target = Target::Field;
        self.state.field_flags = u64::from(access);
        self.state.field_count += 1;
        let descr = self.intern_descr(name, desc);
        self.class_bands.field_descr.push(descr);
        if let Some(value) = constant {
            let r = self.pool.add_const(value);
            self.class_bands.field_constants.push(r);
            self.state.field_flags |= FLAG_SOURCE_FILE; // ConstantValue
        }
        Ok(())
    }

    fn end_field(&mut self) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.flush_member_annotations();
        self.class_bands.field_flags.push(self.state.field_flags);
        self.state.target = Target::Class;
        Ok(())
    }

    fn begin_method(
        &mut self,
        access: u16,
        name: &str,
        desc: &str,
        exceptions: &[String],
    ) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.target = Target::Method;
        self.state.method_flags = u64::from(access);
        self.state.method_access = access;
        self.state.method_desc = desc.to_string();
        self.state.method_count += 1;
        self.state.has_code = false;
        let descr = self.intern_descr(name, desc);
        self.class_bands.method_descr.push(descr);
        if !exceptions.is_empty() {
            self.state.method_flags |= FLAG_ENCLOSING_METHOD; // Exceptions
            self.class_bands.method_exception_counts.push(exceptions.len() as i32);
            for exception in exceptions {
                let r = self.intern_class_ref(exception);
                self.class_bands.method_exceptions.push(r);
            }
        }
        Ok(())
    }

    fn begin_code(&mut self) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.in_code = true;
        self.state.has_code = true;
        self.state.method_flags |= FLAG_SOURCE_FILE; // Code
        self.state.code_flags = 0;
        self.state.offsets.clear();
        self.state.handlers.clear();
        self.state.line_numbers.clear();
        self.state.local_vars.clear();
        self.state.local_var_types.clear();
        self.bc.start_code();
        Ok(())
    }

    fn visit_insn(&mut self, at: u32, opcode: u8) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.offsets.add_instruction(at);
        self.bc.visit_insn(opcode);
        Ok(())
    }

    fn visit_int_insn(&mut self, at: u32, opcode: u8, operand: i32) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.offsets.add_instruction(at);
        self.bc.visit_int_insn(opcode, operand);
        Ok(())
    }

    fn visit_var_insn(&mut self, at: u32, opcode: u8, var: u16) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.offsets.add_instruction(at);
        self.bc.visit_var_insn(opcode, var);
        Ok(())
    }

    fn visit_type_insn(&mut self, at: u32, opcode: u8, class_name: &str) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.offsets.add_instruction(at);
        let class_name_owned = class_name.to_string();
        let current = self.state.class_name.clone();
        self.bc.visit_type_insn(&mut self.pool, &current, opcode, &class_name_owned);
        if class_name != current {
            self.intern_class_ref(class_name);
        }
        Ok(())
    }

    fn visit_field_insn(
        &mut self,
        at: u32,
        opcode: u8,
        owner: &str,
        name: &str,
        desc: &str,
    ) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.offsets.add_instruction(at);
        let current = self.state.class_name.clone();
        let superc = self.state.super_name.clone();
        self.bc.visit_field_insn(
            &mut self.pool,
            &current,
            superc.as_deref(),
            opcode,
            owner,
            name,
            desc,
        );
        self.intern_class_ref(owner);
        Ok(())
    }

    fn visit_method_insn(
        &mut self,
        at: u32,
        opcode: u8,
        owner: &str,
        name: &str,
        desc: &str,
    ) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.offsets.add_instruction(at);
        let current = self.state.class_name.clone();
        let superc = self.state.super_name.clone();
        self.bc.visit_method_insn(
            &mut self.pool,
            &current,
            superc.as_deref(),
            opcode,
            owner,
            name,
            desc,
        );
        self.intern_class_ref(owner);
        Ok(())
    }

    fn visit_jump_insn(&mut self, at: u32, opcode: u8, target: u32) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.offsets.add_instruction(at);
        self.bc.visit_jump_insn(at, opcode, target);
        Ok(())
    }

    fn visit_ldc_insn(&mut self, at: u32, wide: bool, value: &CpValue) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.offsets.add_instruction(at);
        self.bc.visit_ldc_insn(&mut self.pool, wide, value);
        if let CpValue::Class(name) = value {
            self.intern_class_ref(name);
        }
        Ok(())
    }

    fn visit_iinc_insn(&mut self, at: u32, var: u16, delta: i16) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.offsets.add_instruction(at);
        self.bc.visit_iinc_insn(var, delta);
        Ok(())
    }

    fn visit_table_switch(
        &mut self,
        at: u32,
        default: u32,
        low: i32,
        targets: &[u32],
    ) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.offsets.add_instruction(at);
        self.bc.visit_table_switch(at, default, low, targets);
        Ok(())
    }

    fn visit_lookup_switch(&mut self, at: u32, default: u32, pairs: &[(i32, u32)]) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.offsets.add_instruction(at);
        self.bc.visit_lookup_switch(at, default, pairs);
        Ok(())
    }

    fn visit_multianewarray(&mut self, at: u32, class_name: &str, dims: u8) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.offsets.add_instruction(at);
        let current = self.state.class_name.clone();
        self.bc.visit_multianewarray(&mut self.pool, &current, class_name, dims);
        if class_name != current {
            self.intern_class_ref(class_name);
        }
        Ok(())
    }

    fn visit_try_catch(
        &mut self,
        start: u32,
        end: u32,
        handler: u32,
        catch_type: Option<&str>,
    ) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        let catch_type = catch_type.map(|c| self.intern_class_ref(c));
        self.state.handlers.push(RawHandler { start, end, handler, catch_type });
        Ok(())
    }

    fn visit_line_number(&mut self, at: u32, line: u16) -> Result<()> {
        if self.state.passing || self.options.strip_debug {
            return Ok(());
        }
        self.state.line_numbers.push((at, line));
        Ok(())
    }

    fn visit_local_variable(
        &mut self,
        name: &str,
        desc: &str,
        start: u32,
        length: u32,
        slot: u16,
        type_table: bool,
    ) -> Result<()> {
        if self.state.passing || self.options.strip_debug {
            return Ok(());
        }
        let var = RawLocalVar {
            name: name.to_string(),
            desc: desc.to_string(),
            start,
            length,
            slot,
        };
        if type_table {
            self.state.local_var_types.push(var);
        } else {
            self.state.local_vars.push(var);
        }
        Ok(())
    }

    fn visit_maxs(&mut self, max_stack: u16, max_locals: u16) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.max_stack = max_stack;
        self.state.max_locals = max_locals;
        Ok(())
    }

    fn end_code(&mut self, code_length: u32) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.state.offsets.set_code_end(code_length);
        self.state.in_code = false;
        Ok(())
    }

    fn end_method(&mut self) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        if self.state.has_code {
            self.finish_code()?;
        }
        self.flush_member_annotations();
        self.class_bands.method_flags.push(self.state.method_flags);
        self.state.target = Target::Class;
        Ok(())
    }

    fn end_class(&mut self) -> Result<()> {
        if self.state.passing {
            return Ok(());
        }
        self.class_bands.class_field_counts.push(self.state.field_count);
        self.class_bands.class_method_counts.push(self.state.method_count);
        if self.state.class_rva_n > 0 {
            self.class_bands.class_rva.add_entity(self.state.class_rva_n);
            self.state.class_flags |= FLAG_RVA;
            self.state.class_rva_n = 0;
        }
        if self.state.class_ria_n > 0 {
            self.class_bands.class_ria.add_entity(self.state.class_ria_n);
            self.state.class_flags |= FLAG_RIA;
            self.state.class_ria_n = 0;
        }
        self.finish_local_inner_classes();
        self.class_bands.class_flags.push(self.state.class_flags);
        Ok(())
    }
}

impl Segment<'_> {
    fn finish_code(&mut self) -> Result<()> {
        let map = &self.state.offsets;
        let class_name = self.state.class_name.clone();
        let position_error = |offset: u32| PackError::MalformedClass {
            class: class_name.clone(),
            reason: format!("code position {offset} is not an instruction boundary"),
        };

        self.bc.end_code(map).map_err(|e| match e {
            PackError::MalformedClass { reason, .. } => {
                PackError::MalformedClass { class: class_name.clone(), reason }
            }
            other => other,
        })?;
        self.attr_defs.renumber_code_attributes(map)?;

        let handlers = std::mem::take(&mut self.state.handlers);
        for h in &handlers {
            let start = map.renumber(h.start).ok_or_else(|| position_error(h.start))?;
            let end = map.renumber(h.end).ok_or_else(|| position_error(h.end))?;
            let catch = map.renumber(h.handler).ok_or_else(|| position_error(h.handler))?;
            self.class_bands.code_handlers.push(HandlerEntry {
                start,
                end_offset: end - start,
                catch_offset: catch - end,
                class: h.catch_type,
            });
        }

        let args = descriptor_arg_count(&self.state.method_desc);
        let this_slot = if self.state.method_access & ACC_STATIC == 0 { 1 } else { 0 };
        let max_na_locals =
            (i32::from(self.state.max_locals) - this_slot - args as i32).max(0);
        self.class_bands.code_limits.push(CodeLimits {
            max_stack: i32::from(self.state.max_stack),
            max_na_locals,
            handler_count: handlers.len() as i32,
        });

        let line_numbers = std::mem::take(&mut self.state.line_numbers);
        if !line_numbers.is_empty() {
            self.state.code_flags |= CODE_FLAG_LNT;
            self.class_bands.code_lnt_counts.push(line_numbers.len() as i32);
            for (at, line) in line_numbers {
                let bci = map.renumber(at).ok_or_else(|| position_error(at))?;
                self.class_bands.code_lnt_bci.push(bci);
                self.class_bands.code_lnt_line.push(i32::from(line));
            }
        }

        for (type_table, flag) in [(false, CODE_FLAG_LVT), (true, CODE_FLAG_LVTT)] {
            let vars = if type_table {
                std::mem::take(&mut self.state.local_var_types)
            } else {
                std::mem::take(&mut self.state.local_vars)
            };
            if vars.is_empty() {
                continue;
            }
            self.state.code_flags |= flag;
            let mut resolved = Vec::new();
            for var in &vars {
                let map = &self.state.offsets;
                let bci = map.renumber(var.start).ok_or_else(|| position_error(var.start))?;
                let span = map
                    .renumber_delta(var.start, var.start + var.length)
                    .ok_or_else(|| position_error(var.start + var.length))?;
                resolved.push((bci, span));
            }
            let bands = if type_table {
                &mut self.class_bands.code_lvtt
            } else {
                &mut self.class_bands.code_lvt
            };
            bands.counts.push(vars.len() as i32);
            for (var, (bci, span)) in vars.iter().zip(resolved) {
                bands.bci.push(bci);
                bands.span.push(span);
                bands.slot.push(i32::from(var.slot));
            }
            for var in &vars {
                let name = self.pool.add_utf8(&var.name);
                let sig = self.intern_signature(&var.desc);
                let bands = if type_table {
                    &mut self.class_bands.code_lvtt
                } else {
                    &mut self.class_bands.code_lvt
                };
                bands.name.push(name);
                bands.sig.push(sig);
            }
        }

        self.class_bands.code_flags.push(self.state.code_flags);
        Ok(())
    }
}
