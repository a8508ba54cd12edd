//! Annotation metadata band groups.
//!
//! One group exists per (context, attribute) pair: runtime visible and
//! invisible annotations for classes, fields and methods, parameter
//! annotations and `AnnotationDefault` for methods. Values flatten into
//! per-tag bands in visit order.

use jarpack_codec::BhsdCodec;

use crate::bands::{BandEmitter, BandSet};
use crate::cp::{ConstantPool, DoubleRef, FloatRef, IntRef, LongRef, ResolvedPool, SigRef, Utf8Ref};
use crate::error::{PackError, Result};
use crate::visitor::{Annotation, AnnotationValue, CpValue};

/// One annotation band group.
#[derive(Debug)]
pub(crate) struct MetadataBandGroup {
    prefix: &'static str,
    /// Parameter counts, parameter-annotation groups only
    param_nb: Vec<i32>,
    /// Annotations per entity (unused for `AnnotationDefault`)
    anno_n: Vec<i32>,
    type_rs: Vec<SigRef>,
    pair_n: Vec<i32>,
    name_ru: Vec<Utf8Ref>,
    tags: Vec<i32>,
    case_i: Vec<IntRef>,
    case_d: Vec<DoubleRef>,
    case_f: Vec<FloatRef>,
    case_j: Vec<LongRef>,
    case_c: Vec<SigRef>,
    case_et: Vec<SigRef>,
    case_ec: Vec<Utf8Ref>,
    case_s: Vec<Utf8Ref>,
    case_array_n: Vec<i32>,
    nest_type_rs: Vec<SigRef>,
    nest_pair_n: Vec<i32>,
    nest_name_ru: Vec<Utf8Ref>,
}

/// Rollback snapshot of a band group.
#[derive(Debug, Clone)]
pub(crate) struct MetadataSnapshot {
    lens: [usize; 18],
}

impl MetadataBandGroup {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            param_nb: Vec::new(),
            anno_n: Vec::new(),
            type_rs: Vec::new(),
            pair_n: Vec::new(),
            name_ru: Vec::new(),
            tags: Vec::new(),
            case_i: Vec::new(),
            case_d: Vec::new(),
            case_f: Vec::new(),
            case_j: Vec::new(),
            case_c: Vec::new(),
            case_et: Vec::new(),
            case_ec: Vec::new(),
            case_s: Vec::new(),
            case_array_n: Vec::new(),
            nest_type_rs: Vec::new(),
            nest_pair_n: Vec::new(),
            nest_name_ru: Vec::new(),
        }
    }

    /// Open an entity with `count` annotations.
    pub fn add_entity(&mut self, count: i32) {
        self.anno_n.push(count);
    }

    /// Record one parameter count (parameter-annotation groups).
    pub fn add_param_count(&mut self, count: i32) {
        self.param_nb.push(count);
    }

    /// Record one annotation.
    pub fn add_annotation(&mut self, pool: &mut ConstantPool, annotation: &Annotation) -> Result<()> {
        self.type_rs.push(pool.add_signature(&annotation.type_desc));
        self.pair_n.push(annotation.pairs.len() as i32);
        for (name, value) in &annotation.pairs {
            self.name_ru.push(pool.add_utf8(name));
            self.add_value(pool, value)?;
        }
        Ok(())
    }

    /// Record one element value (also the `AnnotationDefault` entry
    /// point).
    pub fn add_value(&mut self, pool: &mut ConstantPool, value: &AnnotationValue) -> Result<()> {
        match value {
            AnnotationValue::Const { tag, value } => {
                self.tags.push(*tag as i32);
                match (tag, value) {
                    ('B' | 'C' | 'I' | 'S' | 'Z', CpValue::Int(v)) => {
                        self.case_i.push(pool.add_int(*v));
                    }
                    ('D', CpValue::Double(v)) => self.case_d.push(pool.add_double(*v)),
                    ('F', CpValue::Float(v)) => self.case_f.push(pool.add_float(*v)),
                    ('J', CpValue::Long(v)) => self.case_j.push(pool.add_long(*v)),
                    ('s', CpValue::Str(v)) => self.case_s.push(pool.add_utf8(v)),
                    (tag, value) => {
                        return Err(PackError::MalformedClass {
                            class: String::new(),
                            reason: format!(
                                "annotation element tag {tag:?} does not match value {value:?}"
                            ),
                        });
                    }
                }
            }
            AnnotationValue::Enum { type_desc, const_name } => {
                self.tags.push('e' as i32);
                self.case_et.push(pool.add_signature(type_desc));
                self.case_ec.push(pool.add_utf8(const_name));
            }
            AnnotationValue::ClassInfo(desc) => {
                self.tags.push('c' as i32);
                self.case_c.push(pool.add_signature(desc));
            }
            AnnotationValue::Array(values) => {
                self.tags.push('[' as i32);
                self.case_array_n.push(values.len() as i32);
                for v in values {
                    self.add_value(pool, v)?;
                }
            }
            AnnotationValue::Nested(annotation) => {
                self.tags.push('@' as i32);
                self.nest_type_rs.push(pool.add_signature(&annotation.type_desc));
                self.nest_pair_n.push(annotation.pairs.len() as i32);
                for (name, value) in &annotation.pairs {
                    self.nest_name_ru.push(pool.add_utf8(name));
                    self.add_value(pool, value)?;
                }
            }
        }
        Ok(())
    }

    /// Whether the group carries anything.
    pub fn is_empty(&self) -> bool {
        self.anno_n.is_empty() && self.tags.is_empty() && self.param_nb.is_empty()
    }

    pub fn snapshot(&self) -> MetadataSnapshot {
        MetadataSnapshot {
            lens: [
                self.param_nb.len(),
                self.anno_n.len(),
                self.type_rs.len(),
                self.pair_n.len(),
                self.name_ru.len(),
                self.tags.len(),
                self.case_i.len(),
                self.case_d.len(),
                self.case_f.len(),
                self.case_j.len(),
                self.case_c.len(),
                self.case_et.len(),
                self.case_ec.len(),
                self.case_s.len(),
                self.case_array_n.len(),
                self.nest_type_rs.len(),
                self.nest_pair_n.len(),
                self.nest_name_ru.len(),
            ],
        }
    }

    pub fn rollback(&mut self, s: &MetadataSnapshot) {
        self.param_nb.truncate(s.lens[0]);
        self.anno_n.truncate(s.lens[1]);
        self.type_rs.truncate(s.lens[2]);
        self.pair_n.truncate(s.lens[3]);
        self.name_ru.truncate(s.lens[4]);
        self.tags.truncate(s.lens[5]);
        self.case_i.truncate(s.lens[6]);
        self.case_d.truncate(s.lens[7]);
        self.case_f.truncate(s.lens[8]);
        self.case_j.truncate(s.lens[9]);
        self.case_c.truncate(s.lens[10]);
        self.case_et.truncate(s.lens[11]);
        self.case_ec.truncate(s.lens[12]);
        self.case_s.truncate(s.lens[13]);
        self.case_array_n.truncate(s.lens[14]);
        self.nest_type_rs.truncate(s.lens[15]);
        self.nest_pair_n.truncate(s.lens[16]);
        self.nest_name_ru.truncate(s.lens[17]);
    }
}

impl BandSet for MetadataBandGroup {
    fn encode_to(&self, pool: &ResolvedPool, emitter: &mut BandEmitter<'_>) -> Result<()> {
        let p = self.prefix;
        if !self.param_nb.is_empty() {
            emitter.band(&format!("{p}_param_NB"), &self.param_nb, &BhsdCodec::BYTE1)?;
        }
        emitter.band(&format!("{p}_anno_N"), &self.anno_n, &BhsdCodec::UNSIGNED5)?;
        let type_rs: Vec<i32> = self.type_rs.iter().map(|&r| pool.sig_index(r)).collect();
        emitter.band(&format!("{p}_type_RS"), &type_rs, &BhsdCodec::UNSIGNED5)?;
        emitter.band(&format!("{p}_pair_N"), &self.pair_n, &BhsdCodec::UNSIGNED5)?;
        let name_ru: Vec<i32> = self.name_ru.iter().map(|&r| pool.utf8_index(r)).collect();
        emitter.band(&format!("{p}_name_RU"), &name_ru, &BhsdCodec::UNSIGNED5)?;
        emitter.band(&format!("{p}_T"), &self.tags, &BhsdCodec::BYTE1)?;

        let case_i: Vec<i32> = self.case_i.iter().map(|&r| pool.int_index(r)).collect();
        emitter.band(&format!("{p}_caseI_KI"), &case_i, &BhsdCodec::UNSIGNED5)?;
        let case_d: Vec<i32> = self.case_d.iter().map(|&r| pool.double_index(r)).collect();
        emitter.band(&format!("{p}_caseD_KD"), &case_d, &BhsdCodec::UNSIGNED5)?;
        let case_f: Vec<i32> = self.case_f.iter().map(|&r| pool.float_index(r)).collect();
        emitter.band(&format!("{p}_caseF_KF"), &case_f, &BhsdCodec::UNSIGNED5)?;
        let case_j: Vec<i32> = self.case_j.iter().map(|&r| pool.long_index(r)).collect();
        emitter.band(&format!("{p}_caseJ_KJ"), &case_j, &BhsdCodec::UNSIGNED5)?;
        let case_c: Vec<i32> = self.case_c.iter().map(|&r| pool.sig_index(r)).collect();
        emitter.band(&format!("{p}_casec_RS"), &case_c, &BhsdCodec::UNSIGNED5)?;
        let case_et: Vec<i32> = self.case_et.iter().map(|&r| pool.sig_index(r)).collect();
        emitter.band(&format!("{p}_caseet_RS"), &case_et, &BhsdCodec::UNSIGNED5)?;
        let case_ec: Vec<i32> = self.case_ec.iter().map(|&r| pool.utf8_index(r)).collect();
        emitter.band(&format!("{p}_caseec_RU"), &case_ec, &BhsdCodec::UNSIGNED5)?;
        let case_s: Vec<i32> = self.case_s.iter().map(|&r| pool.utf8_index(r)).collect();
        emitter.band(&format!("{p}_cases_RU"), &case_s, &BhsdCodec::UNSIGNED5)?;
        emitter.band(&format!("{p}_casearray_N"), &self.case_array_n, &BhsdCodec::UNSIGNED5)?;
        let nest_type: Vec<i32> = self.nest_type_rs.iter().map(|&r| pool.sig_index(r)).collect();
        emitter.band(&format!("{p}_nesttype_RS"), &nest_type, &BhsdCodec::UNSIGNED5)?;
        emitter.band(&format!("{p}_nestpair_N"), &self.nest_pair_n, &BhsdCodec::UNSIGNED5)?;
        let nest_name: Vec<i32> = self.nest_name_ru.iter().map(|&r| pool.utf8_index(r)).collect();
        emitter.band(&format!("{p}_nestname_RU"), &nest_name, &BhsdCodec::UNSIGNED5)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample_annotation() -> Annotation {
        Annotation {
            type_desc: "Lcom/example/Marker;".to_string(),
            pairs: vec![
                (
                    "value".to_string(),
                    AnnotationValue::Const { tag: 'I', value: CpValue::Int(42) },
                ),
                (
                    "names".to_string(),
                    AnnotationValue::Array(vec![
                        AnnotationValue::Const {
                            tag: 's',
                            value: CpValue::Str("a".to_string()),
                        },
                        AnnotationValue::Const {
                            tag: 's',
                            value: CpValue::Str("b".to_string()),
                        },
                    ]),
                ),
                (
                    "kind".to_string(),
                    AnnotationValue::Enum {
                        type_desc: "Lcom/example/Kind;".to_string(),
                        const_name: "LEFT".to_string(),
                    },
                ),
            ],
        }
    }

    #[test]
    fn test_annotation_flattening() {
        let mut pool = ConstantPool::new();
        let mut group = MetadataBandGroup::new("class_RVA");
        group.add_entity(1);
        group.add_annotation(&mut pool, &sample_annotation()).expect("add");

        assert_eq!(group.anno_n, vec![1]);
        assert_eq!(group.pair_n, vec![3]);
        assert_eq!(group.name_ru.len(), 3);
        // tags: I, [, s, s, e
        assert_eq!(
            group.tags,
            vec!['I' as i32, '[' as i32, 's' as i32, 's' as i32, 'e' as i32]
        );
        assert_eq!(group.case_array_n, vec![2]);
        assert_eq!(group.case_i.len(), 1);
        assert_eq!(group.case_s.len(), 2);
        assert_eq!(group.case_et.len(), 1);
        assert_eq!(group.case_ec.len(), 1);
    }

    #[test]
    fn test_nested_annotation() {
        let mut pool = ConstantPool::new();
        let mut group = MetadataBandGroup::new("method_RIA");
        group.add_entity(1);
        let outer = Annotation {
            type_desc: "LOuter;".to_string(),
            pairs: vec![(
                "inner".to_string(),
                AnnotationValue::Nested(Annotation {
                    type_desc: "LInner;".to_string(),
                    pairs: vec![(
                        "flag".to_string(),
                        AnnotationValue::Const { tag: 'Z', value: CpValue::Int(1) },
                    )],
                }),
            )],
        };
        group.add_annotation(&mut pool, &outer).expect("add");
        assert_eq!(group.tags, vec!['@' as i32, 'Z' as i32]);
        assert_eq!(group.nest_pair_n, vec![1]);
        assert_eq!(group.nest_name_ru.len(), 1);
    }

    #[test]
    fn test_mismatched_tag_rejected() {
        let mut pool = ConstantPool::new();
        let mut group = MetadataBandGroup::new("field_RVA");
        let bad = AnnotationValue::Const { tag: 'J', value: CpValue::Int(1) };
        assert!(group.add_value(&mut pool, &bad).is_err());
    }

    #[test]
    fn test_rollback() {
        let mut pool = ConstantPool::new();
        let mut group = MetadataBandGroup::new("class_RVA");
        let snapshot = group.snapshot();
        group.add_entity(1);
        group.add_annotation(&mut pool, &sample_annotation()).expect("add");
        group.rollback(&snapshot);
        assert!(group.is_empty());
    }
}
