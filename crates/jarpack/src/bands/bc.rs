//! Bytecode bands: the renumbered opcode stream and its operand bands.
//!
//! Constant-pool-carrying instructions are rewritten: `ldc` splits into
//! typed forms, member accesses on the current class or its superclass
//! move to the compact self/super forms, and `<init>` invocations get
//! their own forms. Branch targets become instruction-index differences
//! at the end of each method.

use jarpack_codec::BhsdCodec;

use crate::bands::{BandEmitter, BandSet};
use crate::cp::{
    ClassRef, ConstantPool, DoubleRef, FieldRef, FloatRef, IMethodRef, IntRef, LongRef, MethodRef,
    ResolvedPool, StringRef,
};
use crate::error::{PackError, Result};
use crate::offsets::OffsetMap;
use crate::opcodes;
use crate::visitor::CpValue;

#[derive(Debug, Clone, Copy)]
struct PendingLabel {
    pos: usize,
    source: u32,
    target: u32,
}

/// The bytecode band family, filled method by method.
#[derive(Debug, Default)]
pub(crate) struct BcBands {
    codes: Vec<i32>,
    case_count: Vec<i32>,
    case_value: Vec<i32>,
    byte: Vec<i32>,
    short: Vec<i32>,
    local: Vec<i32>,
    label: Vec<i32>,
    intref: Vec<IntRef>,
    floatref: Vec<FloatRef>,
    longref: Vec<LongRef>,
    doubleref: Vec<DoubleRef>,
    stringref: Vec<StringRef>,
    classref: Vec<Option<ClassRef>>,
    fieldref: Vec<FieldRef>,
    methodref: Vec<MethodRef>,
    imethodref: Vec<IMethodRef>,
    thisfield: Vec<FieldRef>,
    superfield: Vec<FieldRef>,
    thismethod: Vec<MethodRef>,
    supermethod: Vec<MethodRef>,
    initref: Vec<MethodRef>,
    pending: Vec<PendingLabel>,
    new_class: Option<String>,
}

/// Rollback snapshot of the bytecode bands.
#[derive(Debug, Clone)]
pub(crate) struct BcSnapshot {
    lens: [usize; 21],
    pending_len: usize,
}

impl BcBands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-method tracking.
    pub fn start_code(&mut self) {
        self.new_class = None;
    }

    pub fn visit_insn(&mut self, opcode: u8) {
        self.codes.push(i32::from(opcode));
    }

    pub fn visit_int_insn(&mut self, opcode: u8, operand: i32) {
        self.codes.push(i32::from(opcode));
        if opcode == opcodes::SIPUSH {
            self.short.push(operand);
        } else {
            // bipush and newarray carry a single byte
            self.byte.push(operand & 0xFF);
        }
    }

    pub fn visit_var_insn(&mut self, opcode: u8, var: u16) {
        if var > 255 {
            self.codes.push(i32::from(opcodes::WIDE));
        }
        self.codes.push(i32::from(opcode));
        self.local.push(i32::from(var));
    }

    pub fn visit_iinc_insn(&mut self, var: u16, delta: i16) {
        let wide = var > 255 || i8::try_from(delta).is_err();
        if wide {
            self.codes.push(i32::from(opcodes::WIDE));
        }
        self.codes.push(i32::from(opcodes::IINC));
        self.local.push(i32::from(var));
        if wide {
            self.short.push(i32::from(delta));
        } else {
            self.byte.push(i32::from(delta) & 0xFF);
        }
    }

    pub fn visit_type_insn(
        &mut self,
        pool: &mut ConstantPool,
        current_class: &str,
        opcode: u8,
        class_name: &str,
    ) {
        self.codes.push(i32::from(opcode));
        self.classref.push(if class_name == current_class {
            None
        } else {
            Some(pool.add_class(class_name))
        });
        if opcode == opcodes::NEW {
            self.new_class = Some(class_name.to_string());
        }
    }

    pub fn visit_field_insn(
        &mut self,
        pool: &mut ConstantPool,
        current_class: &str,
        super_class: Option<&str>,
        opcode: u8,
        owner: &str,
        name: &str,
        desc: &str,
    ) {
        let field = pool.add_field(owner, name, desc);
        if owner == current_class {
            self.codes.push(i32::from(opcode + opcodes::SELF_OP_SHIFT));
            self.thisfield.push(field);
        } else if super_class == Some(owner) {
            self.codes.push(i32::from(opcode + opcodes::SUPER_OP_SHIFT));
            self.superfield.push(field);
        } else {
            self.codes.push(i32::from(opcode));
            self.fieldref.push(field);
        }
    }

    pub fn visit_method_insn(
        &mut self,
        pool: &mut ConstantPool,
        current_class: &str,
        super_class: Option<&str>,
        opcode: u8,
        owner: &str,
        name: &str,
        desc: &str,
    ) {
        if opcode == opcodes::INVOKEINTERFACE {
            self.codes.push(i32::from(opcode));
            self.imethodref.push(pool.add_imethod(owner, name, desc));
            return;
        }
        if opcode == opcodes::INVOKESPECIAL && name == "<init>" {
            let form = if owner == current_class {
                Some(opcodes::INVOKESPECIAL_THIS_INIT)
            } else if super_class == Some(owner) {
                Some(opcodes::INVOKESPECIAL_SUPER_INIT)
            } else if self.new_class.as_deref() == Some(owner) {
                Some(opcodes::INVOKESPECIAL_NEW_INIT)
            } else {
                None
            };
            if let Some(form) = form {
                self.codes.push(form);
                self.initref.push(pool.add_method(owner, name, desc));
                return;
            }
        }
        let method = pool.add_method(owner, name, desc);
        if owner == current_class {
            self.codes.push(i32::from(opcode + opcodes::SELF_OP_SHIFT));
            self.thismethod.push(method);
        } else if super_class == Some(owner) {
            self.codes.push(i32::from(opcode + opcodes::SUPER_OP_SHIFT));
            self.supermethod.push(method);
        } else {
            self.codes.push(i32::from(opcode));
            self.methodref.push(method);
        }
    }

    pub fn visit_jump_insn(&mut self, at: u32, opcode: u8, target: u32) {
        // wide gotos lose their width along with their byte offsets
        let opcode = match opcode {
            200 => 167, // goto_w -> goto
            201 => 168, // jsr_w -> jsr
            other => other,
        };
        self.codes.push(i32::from(opcode));
        self.push_label(at, target);
    }

    pub fn visit_ldc_insn(&mut self, pool: &mut ConstantPool, wide: bool, value: &CpValue) {
        match value {
            CpValue::Int(v) => {
                self.codes.push(if wide { opcodes::ILDC_W } else { opcodes::ILDC });
                self.intref.push(pool.add_int(*v));
            }
            CpValue::Float(v) => {
                self.codes.push(if wide { opcodes::FLDC_W } else { opcodes::FLDC });
                self.floatref.push(pool.add_float(*v));
            }
            CpValue::Long(v) => {
                self.codes.push(opcodes::LLDC2_W);
                self.longref.push(pool.add_long(*v));
            }
            CpValue::Double(v) => {
                self.codes.push(opcodes::DLDC2_W);
                self.doubleref.push(pool.add_double(*v));
            }
            CpValue::Str(s) => {
                self.codes.push(if wide { opcodes::ALDC_W } else { opcodes::ALDC });
                self.stringref.push(pool.add_string(s));
            }
            CpValue::Class(name) => {
                self.codes.push(if wide { opcodes::CLDC_W } else { opcodes::CLDC });
                self.classref.push(Some(pool.add_class(name)));
            }
        }
    }

    pub fn visit_table_switch(&mut self, at: u32, default: u32, low: i32, targets: &[u32]) {
        self.codes.push(i32::from(opcodes::TABLESWITCH));
        self.case_count.push(targets.len() as i32);
        self.case_value.push(low);
        self.push_label(at, default);
        for &target in targets {
            self.push_label(at, target);
        }
    }

    pub fn visit_lookup_switch(&mut self, at: u32, default: u32, pairs: &[(i32, u32)]) {
        self.codes.push(i32::from(opcodes::LOOKUPSWITCH));
        self.case_count.push(pairs.len() as i32);
        self.push_label(at, default);
        for &(key, target) in pairs {
            self.case_value.push(key);
            self.push_label(at, target);
        }
    }

    pub fn visit_multianewarray(
        &mut self,
        pool: &mut ConstantPool,
        current_class: &str,
        class_name: &str,
        dims: u8,
    ) {
        self.codes.push(i32::from(opcodes::MULTIANEWARRAY));
        self.classref.push(if class_name == current_class {
            None
        } else {
            Some(pool.add_class(class_name))
        });
        self.byte.push(i32::from(dims));
    }

    fn push_label(&mut self, source: u32, target: u32) {
        let pos = self.label.len();
        self.label.push(0);
        self.pending.push(PendingLabel { pos, source, target });
    }

    /// Resolve this method's labels against its offset map and close its
    /// opcode stream.
    pub fn end_code(&mut self, map: &OffsetMap) -> Result<()> {
        for label in std::mem::take(&mut self.pending) {
            let value = map.renumber_delta(label.source, label.target).ok_or_else(|| {
                PackError::MalformedClass {
                    class: String::new(),
                    reason: format!(
                        "branch target {} is not an instruction boundary",
                        label.target
                    ),
                }
            })?;
            self.label[label.pos] = value;
        }
        self.codes.push(opcodes::END_OF_CODE);
        Ok(())
    }

    pub fn snapshot(&self) -> BcSnapshot {
        BcSnapshot {
            lens: [
                self.codes.len(),
                self.case_count.len(),
                self.case_value.len(),
                self.byte.len(),
                self.short.len(),
                self.local.len(),
                self.label.len(),
                self.intref.len(),
                self.floatref.len(),
                self.longref.len(),
                self.doubleref.len(),
                self.stringref.len(),
                self.classref.len(),
                self.fieldref.len(),
                self.methodref.len(),
                self.imethodref.len(),
                self.thisfield.len(),
                self.superfield.len(),
                self.thismethod.len(),
                self.supermethod.len(),
                self.initref.len(),
            ],
            pending_len: self.pending.len(),
        }
    }

    pub fn rollback(&mut self, s: &BcSnapshot) {
        self.codes.truncate(s.lens[0]);
        self.case_count.truncate(s.lens[1]);
        self.case_value.truncate(s.lens[2]);
        self.byte.truncate(s.lens[3]);
        self.short.truncate(s.lens[4]);
        self.local.truncate(s.lens[5]);
        self.label.truncate(s.lens[6]);
        self.intref.truncate(s.lens[7]);
        self.floatref.truncate(s.lens[8]);
        self.longref.truncate(s.lens[9]);
        self.doubleref.truncate(s.lens[10]);
        self.stringref.truncate(s.lens[11]);
        self.classref.truncate(s.lens[12]);
        self.fieldref.truncate(s.lens[13]);
        self.methodref.truncate(s.lens[14]);
        self.imethodref.truncate(s.lens[15]);
        self.thisfield.truncate(s.lens[16]);
        self.superfield.truncate(s.lens[17]);
        self.thismethod.truncate(s.lens[18]);
        self.supermethod.truncate(s.lens[19]);
        self.initref.truncate(s.lens[20]);
        self.pending.truncate(s.pending_len);
    }

    #[cfg(test)]
    pub(crate) fn codes(&self) -> &[i32] {
        &self.codes
    }
}

impl BandSet for BcBands {
    fn encode_to(&self, pool: &ResolvedPool, emitter: &mut BandEmitter<'_>) -> Result<()> {
        emitter.band("bc_codes", &self.codes, &BhsdCodec::BYTE1)?;
        emitter.band("bc_case_count", &self.case_count, &BhsdCodec::UNSIGNED5)?;
        emitter.band("bc_case_value", &self.case_value, &BhsdCodec::DELTA5)?;
        emitter.band("bc_byte", &self.byte, &BhsdCodec::BYTE1)?;
        emitter.band("bc_short", &self.short, &BhsdCodec::DELTA5)?;
        emitter.band("bc_local", &self.local, &BhsdCodec::UNSIGNED5)?;
        emitter.band("bc_label", &self.label, &BhsdCodec::BRANCH5)?;
        let ints: Vec<i32> = self.intref.iter().map(|&r| pool.int_index(r)).collect();
        emitter.band("bc_intref", &ints, &BhsdCodec::DELTA5)?;
        let floats: Vec<i32> = self.floatref.iter().map(|&r| pool.float_index(r)).collect();
        emitter.band("bc_floatref", &floats, &BhsdCodec::DELTA5)?;
        let longs: Vec<i32> = self.longref.iter().map(|&r| pool.long_index(r)).collect();
        emitter.band("bc_longref", &longs, &BhsdCodec::DELTA5)?;
        let doubles: Vec<i32> = self.doubleref.iter().map(|&r| pool.double_index(r)).collect();
        emitter.band("bc_doubleref", &doubles, &BhsdCodec::DELTA5)?;
        let strings: Vec<i32> = self.stringref.iter().map(|&r| pool.string_index(r)).collect();
        emitter.band("bc_stringref", &strings, &BhsdCodec::DELTA5)?;
        let classes: Vec<i32> = self
            .classref
            .iter()
            .map(|r| r.map_or(0, |c| pool.class_index(c) + 1))
            .collect();
        emitter.band("bc_classref", &classes, &BhsdCodec::UNSIGNED5)?;
        let fields: Vec<i32> = self.fieldref.iter().map(|&r| pool.field_index(r)).collect();
        emitter.band("bc_fieldref", &fields, &BhsdCodec::DELTA5)?;
        let methods: Vec<i32> = self.methodref.iter().map(|&r| pool.method_index(r)).collect();
        emitter.band("bc_methodref", &methods, &BhsdCodec::UNSIGNED5)?;
        let imethods: Vec<i32> =
            self.imethodref.iter().map(|&r| pool.imethod_index(r)).collect();
        emitter.band("bc_imethodref", &imethods, &BhsdCodec::DELTA5)?;
        let thisfield: Vec<i32> =
            self.thisfield.iter().map(|&r| pool.field_subindex(r)).collect();
        emitter.band("bc_thisfield", &thisfield, &BhsdCodec::UNSIGNED5)?;
        let superfield: Vec<i32> =
            self.superfield.iter().map(|&r| pool.field_subindex(r)).collect();
        emitter.band("bc_superfield", &superfield, &BhsdCodec::UNSIGNED5)?;
        let thismethod: Vec<i32> =
            self.thismethod.iter().map(|&r| pool.method_subindex(r)).collect();
        emitter.band("bc_thismethod", &thismethod, &BhsdCodec::UNSIGNED5)?;
        let supermethod: Vec<i32> =
            self.supermethod.iter().map(|&r| pool.method_subindex(r)).collect();
        emitter.band("bc_supermethod", &supermethod, &BhsdCodec::UNSIGNED5)?;
        let initref: Vec<i32> = self.initref.iter().map(|&r| pool.init_subindex(r)).collect();
        emitter.band("bc_initref", &initref, &BhsdCodec::UNSIGNED5)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_ldc_rewriting() {
        let mut pool = ConstantPool::new();
        let mut bc = BcBands::new();
        bc.start_code();
        bc.visit_ldc_insn(&mut pool, false, &CpValue::Int(7));
        bc.visit_ldc_insn(&mut pool, true, &CpValue::Float(1.5));
        bc.visit_ldc_insn(&mut pool, false, &CpValue::Str("hi".to_string()));
        bc.visit_ldc_insn(&mut pool, false, &CpValue::Long(9));
        assert_eq!(
            bc.codes(),
            &[opcodes::ILDC, opcodes::FLDC_W, opcodes::ALDC, opcodes::LLDC2_W]
        );
        assert_eq!(bc.intref.len(), 1);
        assert_eq!(bc.floatref.len(), 1);
        assert_eq!(bc.stringref.len(), 1);
        assert_eq!(bc.longref.len(), 1);
    }

    #[test]
    fn test_self_and_super_member_forms() {
        let mut pool = ConstantPool::new();
        let mut bc = BcBands::new();
        bc.start_code();
        bc.visit_field_insn(&mut pool, "Me", Some("Base"), opcodes::GETFIELD, "Me", "x", "I");
        bc.visit_field_insn(&mut pool, "Me", Some("Base"), opcodes::GETFIELD, "Base", "y", "I");
        bc.visit_field_insn(&mut pool, "Me", Some("Base"), opcodes::GETFIELD, "Other", "z", "I");
        assert_eq!(
            bc.codes(),
            &[
                i32::from(opcodes::GETFIELD + opcodes::SELF_OP_SHIFT),
                i32::from(opcodes::GETFIELD + opcodes::SUPER_OP_SHIFT),
                i32::from(opcodes::GETFIELD),
            ]
        );
        assert_eq!(bc.thisfield.len(), 1);
        assert_eq!(bc.superfield.len(), 1);
        assert_eq!(bc.fieldref.len(), 1);
    }

    #[test]
    fn test_init_forms() {
        let mut pool = ConstantPool::new();
        let mut bc = BcBands::new();
        bc.start_code();
        bc.visit_method_insn(
            &mut pool,
            "Me",
            Some("Base"),
            opcodes::INVOKESPECIAL,
            "Base",
            "<init>",
            "()V",
        );
        bc.visit_type_insn(&mut pool, "Me", opcodes::NEW, "Other");
        bc.visit_method_insn(
            &mut pool,
            "Me",
            Some("Base"),
            opcodes::INVOKESPECIAL,
            "Other",
            "<init>",
            "()V",
        );
        assert_eq!(
            bc.codes(),
            &[
                opcodes::INVOKESPECIAL_SUPER_INIT,
                i32::from(opcodes::NEW),
                opcodes::INVOKESPECIAL_NEW_INIT,
            ]
        );
        assert_eq!(bc.initref.len(), 2);
        assert_eq!(bc.classref, vec![Some(pool.add_class("Other"))]);
    }

    #[test]
    fn test_branch_labels_renumber() {
        let mut pool = ConstantPool::new();
        let _ = &mut pool;
        let mut bc = BcBands::new();
        let mut map = OffsetMap::new();
        bc.start_code();
        // iconst_0 at 0, goto 4 at 1, nop at 4
        map.add_instruction(0);
        bc.visit_insn(3);
        map.add_instruction(1);
        bc.visit_jump_insn(1, 167, 4);
        map.add_instruction(4);
        bc.visit_insn(0);
        map.set_code_end(5);
        bc.end_code(&map).expect("labels resolve");
        assert_eq!(bc.label, vec![1], "goto jumps one instruction forward");
        assert_eq!(bc.codes().last(), Some(&opcodes::END_OF_CODE));
    }

    #[test]
    fn test_switch_bands() {
        let mut bc = BcBands::new();
        let mut map = OffsetMap::new();
        bc.start_code();
        map.add_instruction(0);
        bc.visit_table_switch(0, 20, 5, &[12, 16]);
        map.add_instruction(12);
        bc.visit_insn(0);
        map.add_instruction(16);
        bc.visit_insn(0);
        map.add_instruction(20);
        bc.visit_insn(0);
        map.set_code_end(21);
        bc.end_code(&map).expect("labels resolve");
        assert_eq!(bc.case_count, vec![2]);
        assert_eq!(bc.case_value, vec![5]);
        assert_eq!(bc.label, vec![3, 1, 2], "default first, then case targets");
    }

    #[test]
    fn test_wide_variable_forms() {
        let mut bc = BcBands::new();
        bc.start_code();
        bc.visit_var_insn(21, 3); // iload 3
        bc.visit_var_insn(21, 300); // wide iload
        bc.visit_iinc_insn(2, 1);
        bc.visit_iinc_insn(2, 1000); // wide iinc
        assert_eq!(
            bc.codes(),
            &[21, i32::from(opcodes::WIDE), 21, i32::from(opcodes::IINC), i32::from(opcodes::WIDE), i32::from(opcodes::IINC)]
        );
        assert_eq!(bc.local, vec![3, 300, 2, 2]);
        assert_eq!(bc.byte, vec![1]);
        assert_eq!(bc.short, vec![1000]);
    }

    #[test]
    fn test_rollback() {
        let mut pool = ConstantPool::new();
        let mut bc = BcBands::new();
        bc.start_code();
        bc.visit_insn(0);
        let snapshot = bc.snapshot();
        bc.visit_ldc_insn(&mut pool, false, &CpValue::Int(1));
        bc.visit_jump_insn(1, 167, 0);
        bc.rollback(&snapshot);
        assert_eq!(bc.codes(), &[0]);
        assert!(bc.intref.is_empty());
        assert!(bc.pending.is_empty());
    }
}
