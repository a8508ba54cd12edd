//! The contract between the external class-file parser and the packer.
//!
//! The parser walks one class file and reports everything it finds to a
//! single stateful [`ClassVisitor`]: class-scoped callbacks first, then
//! `begin_field`/`begin_method` pairs whose subsequent callbacks apply to
//! the open member until the matching `end_*`. Every bytecode callback
//! carries the instruction's byte offset in the original code array;
//! branch targets, handler ranges and debug positions are byte offsets
//! too, renumbered to instruction indexes by the packer.

use crate::error::Result;

/// A loadable constant, as found in `ldc`/`ConstantValue`.
#[derive(Debug, Clone, PartialEq)]
pub enum CpValue {
    /// CONSTANT_Integer
    Int(i32),
    /// CONSTANT_Float
    Float(f32),
    /// CONSTANT_Long
    Long(i64),
    /// CONSTANT_Double
    Double(f64),
    /// CONSTANT_String
    Str(String),
    /// CONSTANT_Class, by internal name
    Class(String),
}

/// One annotation element value.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    /// A primitive or string constant with its element tag
    /// (`B C D F I J S Z s`)
    Const {
        /// The element tag byte
        tag: char,
        /// The constant
        value: CpValue,
    },
    /// An enum constant: type descriptor and constant name
    Enum {
        /// The enum type descriptor
        type_desc: String,
        /// The enum constant name
        const_name: String,
    },
    /// A class literal, by descriptor
    ClassInfo(String),
    /// A nested annotation
    Nested(Annotation),
    /// An array of element values
    Array(Vec<AnnotationValue>),
}

/// An annotation: type descriptor plus named element values.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// The annotation type descriptor
    pub type_desc: String,
    /// Element name/value pairs in declaration order
    pub pairs: Vec<(String, AnnotationValue)>,
}

/// Receiver for one parsed class.
#[allow(unused_variables)]
pub trait ClassVisitor {
    /// Class header: version, access flags, names and interfaces.
    fn begin_class(
        &mut self,
        minor: u16,
        major: u16,
        access: u16,
        name: &str,
        super_name: Option<&str>,
        interfaces: &[String],
    ) -> Result<()>;

    /// `SourceFile` attribute.
    fn visit_source_file(&mut self, name: &str) -> Result<()> {
        Ok(())
    }

    /// `EnclosingMethod` attribute.
    fn visit_enclosing_method(
        &mut self,
        owner: &str,
        method_name: Option<&str>,
        method_desc: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }

    /// `Signature` attribute of the open class, field or method.
    fn visit_signature(&mut self, signature: &str) -> Result<()> {
        Ok(())
    }

    /// `Deprecated` attribute of the open class, field or method.
    fn visit_deprecated(&mut self) -> Result<()> {
        Ok(())
    }

    /// One `InnerClasses` table entry.
    fn visit_inner_class(
        &mut self,
        name: &str,
        outer_name: Option<&str>,
        inner_name: Option<&str>,
        access: u16,
    ) -> Result<()> {
        Ok(())
    }

    /// A runtime annotation on the open class, field or method.
    fn visit_annotation(&mut self, annotation: &Annotation, visible: bool) -> Result<()> {
        Ok(())
    }

    /// A runtime parameter annotation on the open method.
    fn visit_parameter_annotation(
        &mut self,
        parameter: u8,
        annotation: &Annotation,
        visible: bool,
    ) -> Result<()> {
        Ok(())
    }

    /// `AnnotationDefault` of the open method.
    fn visit_annotation_default(&mut self, value: &AnnotationValue) -> Result<()> {
        Ok(())
    }

    /// Any attribute the parser has no dedicated callback for, with its
    /// raw payload. Applies to the open class, field, method or code.
    fn visit_attribute(&mut self, name: &str, payload: &[u8]) -> Result<()> {
        Ok(())
    }

    /// Open a field.
    fn begin_field(
        &mut self,
        access: u16,
        name: &str,
        desc: &str,
        constant: Option<&CpValue>,
    ) -> Result<()>;

    /// Close the open field.
    fn end_field(&mut self) -> Result<()>;

    /// Open a method.
    fn begin_method(
        &mut self,
        access: u16,
        name: &str,
        desc: &str,
        exceptions: &[String],
    ) -> Result<()>;

    /// The open method has a `Code` attribute; bytecode callbacks follow.
    fn begin_code(&mut self) -> Result<()> {
        Ok(())
    }

    /// An operand-free instruction at byte offset `at`.
    fn visit_insn(&mut self, at: u32, opcode: u8) -> Result<()> {
        Ok(())
    }

    /// `bipush`, `sipush` or `newarray`.
    fn visit_int_insn(&mut self, at: u32, opcode: u8, operand: i32) -> Result<()> {
        Ok(())
    }

    /// A local-variable instruction (`*load`, `*store`, `ret`).
    fn visit_var_insn(&mut self, at: u32, opcode: u8, var: u16) -> Result<()> {
        Ok(())
    }

    /// `new`, `anewarray`, `checkcast` or `instanceof`.
    fn visit_type_insn(&mut self, at: u32, opcode: u8, class_name: &str) -> Result<()> {
        Ok(())
    }

    /// A field access instruction.
    fn visit_field_insn(
        &mut self,
        at: u32,
        opcode: u8,
        owner: &str,
        name: &str,
        desc: &str,
    ) -> Result<()> {
        Ok(())
    }

    /// A method invocation instruction.
    fn visit_method_insn(
        &mut self,
        at: u32,
        opcode: u8,
        owner: &str,
        name: &str,
        desc: &str,
    ) -> Result<()> {
        Ok(())
    }

    /// A branch; `target` is the absolute byte offset of its target.
    fn visit_jump_insn(&mut self, at: u32, opcode: u8, target: u32) -> Result<()> {
        Ok(())
    }

    /// An `ldc`-family instruction. `wide` reports whether the original
    /// used a two-byte constant-pool index.
    fn visit_ldc_insn(&mut self, at: u32, wide: bool, value: &CpValue) -> Result<()> {
        Ok(())
    }

    /// `iinc`.
    fn visit_iinc_insn(&mut self, at: u32, var: u16, delta: i16) -> Result<()> {
        Ok(())
    }

    /// `tableswitch` with its case range and absolute byte targets.
    fn visit_table_switch(
        &mut self,
        at: u32,
        default: u32,
        low: i32,
        targets: &[u32],
    ) -> Result<()> {
        Ok(())
    }

    /// `lookupswitch` with `(key, absolute byte target)` pairs.
    fn visit_lookup_switch(&mut self, at: u32, default: u32, pairs: &[(i32, u32)]) -> Result<()> {
        Ok(())
    }

    /// `multianewarray`.
    fn visit_multianewarray(&mut self, at: u32, class_name: &str, dims: u8) -> Result<()> {
        Ok(())
    }

    /// One exception-table entry, all positions in byte offsets.
    fn visit_try_catch(
        &mut self,
        start: u32,
        end: u32,
        handler: u32,
        catch_type: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }

    /// One `LineNumberTable` entry.
    fn visit_line_number(&mut self, at: u32, line: u16) -> Result<()> {
        Ok(())
    }

    /// One `LocalVariableTable` (or, with `type_table`,
    /// `LocalVariableTypeTable`) entry.
    #[allow(clippy::too_many_arguments)]
    fn visit_local_variable(
        &mut self,
        name: &str,
        desc: &str,
        start: u32,
        length: u32,
        slot: u16,
        type_table: bool,
    ) -> Result<()> {
        Ok(())
    }

    /// Stack and locals limits of the open code attribute.
    fn visit_maxs(&mut self, max_stack: u16, max_locals: u16) -> Result<()> {
        Ok(())
    }

    /// The open code attribute is complete; `code_length` is the byte
    /// length of the original code array.
    fn end_code(&mut self, code_length: u32) -> Result<()> {
        Ok(())
    }

    /// Close the open method.
    fn end_method(&mut self) -> Result<()>;

    /// Close the class.
    fn end_class(&mut self) -> Result<()>;
}

/// The external class-file parser: drives a [`ClassVisitor`] over raw
/// class bytes.
pub trait ClassParser {
    /// Parse `bytes`, reporting everything to `visitor`.
    fn parse(&self, bytes: &[u8], visitor: &mut dyn ClassVisitor) -> Result<()>;
}

/// Count the argument slots of a method descriptor: `D` and `J` take
/// two, every other parameter one.
pub(crate) fn descriptor_arg_count(desc: &str) -> u32 {
    let Some(open) = desc.find('(') else { return 0 };
    let Some(close) = desc.rfind(')') else { return 0 };
    let mut args = 0u32;
    let params = &desc.as_bytes()[open + 1..close];
    let mut i = 0;
    while i < params.len() {
        match params[i] {
            b'D' | b'J' => {
                args += 2;
                i += 1;
            }
            b'L' => {
                args += 1;
                while i < params.len() && params[i] != b';' {
                    i += 1;
                }
                i += 1;
            }
            b'[' => {
                args += 1;
                while i < params.len() && params[i] == b'[' {
                    i += 1;
                }
                if i < params.len() && params[i] == b'L' {
                    while i < params.len() && params[i] != b';' {
                        i += 1;
                    }
                }
                i += 1;
            }
            _ => {
                args += 1;
                i += 1;
            }
        }
    }
    args
}
