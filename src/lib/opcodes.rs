use lazy_static::lazy_static;
use std::collections::HashMap;

use super::ast::RefKind;

pub const BIPUSH: u8 = 0x10;
pub const SIPUSH: u8 = 0x11;
pub const LDC: u8 = 0x12;
pub const LDC2_W: u8 = 0x14;
pub const IINC: u8 = 0x84;
pub const GOTO_W: u8 = 0xC8;
pub const JSR_W: u8 = 0xC9;
pub const TABLESWITCH: u8 = 0xAA;
pub const LOOKUPSWITCH: u8 = 0xAB;
pub const INVOKEINTERFACE: u8 = 0xB9;
pub const INVOKEDYNAMIC: u8 = 0xBA;
pub const NEWARRAY: u8 = 0xBC;
pub const WIDE: u8 = 0xC4;
pub const MULTIANEWARRAY: u8 = 0xC5;

static OPNAMES: [&str; 202] = [
    // 0x00
    "nop", "aconst_null", "iconst_m1", "iconst_0", "iconst_1", "iconst_2", "iconst_3", "iconst_4",
    "iconst_5", "lconst_0", "lconst_1", "fconst_0", "fconst_1", "fconst_2", "dconst_0", "dconst_1",
    // 0x10
    "bipush", "sipush", "ldc", "ldc_w", "ldc2_w", "iload", "lload", "fload",
    "dload", "aload", "iload_0", "iload_1", "iload_2", "iload_3", "lload_0", "lload_1",
    // 0x20
    "lload_2", "lload_3", "fload_0", "fload_1", "fload_2", "fload_3", "dload_0", "dload_1",
    "dload_2", "dload_3", "aload_0", "aload_1", "aload_2", "aload_3", "iaload", "laload",
    // 0x30
    "faload", "daload", "aaload", "baload", "caload", "saload", "istore", "lstore",
    "fstore", "dstore", "astore", "istore_0", "istore_1", "istore_2", "istore_3", "lstore_0",
    // 0x40
    "lstore_1", "lstore_2", "lstore_3", "fstore_0", "fstore_1", "fstore_2", "fstore_3", "dstore_0",
    "dstore_1", "dstore_2", "dstore_3", "astore_0", "astore_1", "astore_2", "astore_3", "iastore",
    // 0x50
    "lastore", "fastore", "dastore", "aastore", "bastore", "castore", "sastore", "pop",
    "pop2", "dup", "dup_x1", "dup_x2", "dup2", "dup2_x1", "dup2_x2", "swap",
    // 0x60
    "iadd", "ladd", "fadd", "dadd", "isub", "lsub", "fsub", "dsub",
    "imul", "lmul", "fmul", "dmul", "idiv", "ldiv", "fdiv", "ddiv",
    // 0x70
    "irem", "lrem", "frem", "drem", "ineg", "lneg", "fneg", "dneg",
    "ishl", "lshl", "ishr", "lshr", "iushr", "lushr", "iand", "land",
    // 0x80
    "ior", "lor", "ixor", "lxor", "iinc", "i2l", "i2f", "i2d",
    "l2i", "l2f", "l2d", "f2i", "f2l", "f2d", "d2i", "d2l",
    // 0x90
    "d2f", "i2b", "i2c", "i2s", "lcmp", "fcmpl", "fcmpg", "dcmpl",
    "dcmpg", "ifeq", "ifne", "iflt", "ifge", "ifgt", "ifle", "if_icmpeq",
    // 0xA0
    "if_icmpne", "if_icmplt", "if_icmpge", "if_icmpgt", "if_icmple", "if_acmpeq", "if_acmpne", "goto",
    "jsr", "ret", "tableswitch", "lookupswitch", "ireturn", "lreturn", "freturn", "dreturn",
    // 0xB0
    "areturn", "return", "getstatic", "putstatic", "getfield", "putfield", "invokevirtual", "invokespecial",
    "invokestatic", "invokeinterface", "invokedynamic", "new", "newarray", "anewarray", "arraylength", "athrow",
    // 0xC0
    "checkcast", "instanceof", "monitorenter", "monitorexit", "wide", "multianewarray", "ifnull", "ifnonnull",
    "goto_w", "jsr_w",
];

/// How the operand bytes following an opcode are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Simple,
    Push,
    Local,
    Member(RefKind),
    Ldc,
    Class,
    Jump,
    Iinc,
    TableSwitch,
    LookupSwitch,
    MultiANewArray,
    NewArray,
    InvokeInterface,
    InvokeDynamic,
    Wide,
}

pub fn name(op: u8) -> Option<&'static str> {
    OPNAMES.get(op as usize).copied()
}

pub fn lookup(s: &str) -> Option<u8> {
    lazy_static! {
        static ref OPCODES: HashMap<&'static str, u8> =
            OPNAMES.iter().enumerate().map(|(i, name)| (*name, i as u8)).collect();
    }
    OPCODES.get(s).copied()
}

/// Returns None for bytes that are not valid opcodes.
pub fn shape(op: u8) -> Option<Shape> {
    use Shape::*;
    Some(match op {
        BIPUSH | SIPUSH => Push,
        LDC..=LDC2_W => Ldc,
        0x15..=0x19 | 0x36..=0x3A | 0xA9 => Local,
        IINC => Iinc,
        0x99..=0xA8 | 0xC6..=0xC9 => Jump,
        TABLESWITCH => TableSwitch,
        LOOKUPSWITCH => LookupSwitch,
        0xB2..=0xB5 => Member(RefKind::Field),
        0xB6..=0xB8 => Member(RefKind::Method),
        INVOKEINTERFACE => InvokeInterface,
        INVOKEDYNAMIC => InvokeDynamic,
        0xBB | 0xBD | 0xC0 | 0xC1 => Class,
        NEWARRAY => NewArray,
        WIDE => Wide,
        MULTIANEWARRAY => MultiANewArray,
        0x00..=0xC9 => Simple,
        _ => return None,
    })
}

/// Whether the opcode can follow a `wide` prefix with a single slot operand.
pub fn is_wide_local(op: u8) -> bool {
    matches!(op, 0x15..=0x19 | 0x36..=0x3A | 0xA9)
}

pub fn is_wide_jump(op: u8) -> bool {
    op == GOTO_W || op == JSR_W
}
