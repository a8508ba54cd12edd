//! JVM opcode values the shredder branches on, plus the renumbered
//! pseudo-opcodes of the packed bytecode stream.

#![allow(missing_docs)]

// Plain JVM opcodes
pub const NOP: u8 = 0;
pub const ALOAD_0: u8 = 42;
pub const BIPUSH: u8 = 16;
pub const SIPUSH: u8 = 17;
pub const LDC: u8 = 18;
pub const LDC_W: u8 = 19;
pub const LDC2_W: u8 = 20;
pub const IINC: u8 = 132;
pub const TABLESWITCH: u8 = 170;
pub const LOOKUPSWITCH: u8 = 171;
pub const GETSTATIC: u8 = 178;
pub const PUTSTATIC: u8 = 179;
pub const GETFIELD: u8 = 180;
pub const PUTFIELD: u8 = 181;
pub const INVOKEVIRTUAL: u8 = 182;
pub const INVOKESPECIAL: u8 = 183;
pub const INVOKESTATIC: u8 = 184;
pub const INVOKEINTERFACE: u8 = 185;
pub const NEW: u8 = 187;
pub const NEWARRAY: u8 = 188;
pub const ANEWARRAY: u8 = 189;
pub const CHECKCAST: u8 = 192;
pub const INSTANCEOF: u8 = 193;
pub const WIDE: u8 = 196;
pub const MULTIANEWARRAY: u8 = 197;

// Packed pseudo-opcodes: member accesses on the current class move up by
// SELF_OP_SHIFT, on the superclass by SUPER_OP_SHIFT, so the constant-pool
// reference can come from the per-class sub-band.
pub const SELF_OP_SHIFT: u8 = 24; // getstatic 178 -> getstatic_this 202
pub const SUPER_OP_SHIFT: u8 = 32; // getstatic 178 -> getstatic_super 210

pub const INVOKESPECIAL_THIS_INIT: i32 = 230;
pub const INVOKESPECIAL_SUPER_INIT: i32 = 231;
pub const INVOKESPECIAL_NEW_INIT: i32 = 232;

// Renumbered ldc family
pub const CLDC: i32 = 233;
pub const ILDC: i32 = 234;
pub const FLDC: i32 = 235;
pub const CLDC_W: i32 = 236;
pub const ILDC_W: i32 = 237;
pub const FLDC_W: i32 = 238;
pub const DLDC2_W: i32 = 239;
pub const ALDC: i32 = 18;
pub const ALDC_W: i32 = 19;
pub const LLDC2_W: i32 = 20;

/// Terminates each method's packed opcode stream.
pub const END_OF_CODE: i32 = 255;
