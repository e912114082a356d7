//! The canonical class tree shared by the decoder, printer, parser and encoder.
//!
//! Nothing in here refers to constant pool indices. Every symbolic reference is
//! stored by value, and every bytecode offset is replaced by a [`Label`].
use bitflags::bitflags;
use std::fmt;

use super::opcodes;

bitflags! {
    /// Access flags on classes
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

bitflags! {
    /// Access flags on fields
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Access flags on methods
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// Access flags on entries of the InnerClasses attribute
    pub struct InnerClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

/// Symbolic name for a bytecode offset within one method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub String);
impl Label {
    /// The label the decoder assigns to a byte offset.
    pub fn at(pos: u32) -> Self {
        Label(format!("L{}", pos))
    }
}
impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}
impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label(s.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameAndType {
    pub name: String,
    pub desc: String,
}
impl NameAndType {
    pub fn new(name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
        }
    }
}

/// A field or method reference: owning class plus name and descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub class: String,
    pub nat: NameAndType,
}
impl MemberRef {
    pub fn new(class: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            nat: NameAndType::new(name, desc),
        }
    }
}

/// Which of the three member reference constant kinds a reference uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Field,
    Method,
    InterfaceMethod,
}
impl RefKind {
    pub fn name(self) -> &'static str {
        match self {
            RefKind::Field => "Field",
            RefKind::Method => "Method",
            RefKind::InterfaceMethod => "InterfaceMethod",
        }
    }
}

static HANDLE_KIND_NAMES: [&str; 9] = [
    "getField",
    "getStatic",
    "putField",
    "putStatic",
    "invokeVirtual",
    "invokeStatic",
    "invokeSpecial",
    "newInvokeSpecial",
    "invokeInterface",
];

/// Method handle reference kinds (JVMS 4.4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}
impl HandleKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        use HandleKind::*;
        Some(match v {
            1 => GetField,
            2 => GetStatic,
            3 => PutField,
            4 => PutStatic,
            5 => InvokeVirtual,
            6 => InvokeStatic,
            7 => InvokeSpecial,
            8 => NewInvokeSpecial,
            9 => InvokeInterface,
            _ => return None,
        })
    }

    pub fn from_name(s: &str) -> Option<Self> {
        HANDLE_KIND_NAMES
            .iter()
            .position(|&name| name == s)
            .and_then(|i| Self::from_u8(i as u8 + 1))
    }

    pub fn name(self) -> &'static str {
        HANDLE_KIND_NAMES[self as usize - 1]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodHandle {
    pub kind: HandleKind,
    pub ref_kind: RefKind,
    pub member: MemberRef,
}

/// A typed constant value. Floats and doubles are stored as raw bits so NaN
/// payloads survive every conversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Const {
    Utf8(String),
    Int(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(String),
    Str(String),
    MethodType(String),
    NameAndType(NameAndType),
    Ref(RefKind, MemberRef),
    MethodHandle(MethodHandle),
    /// Bootstrap method index plus name and type
    Dynamic(u16, NameAndType),
    InvokeDynamic(u16, NameAndType),
    /// Placeholder for a constant pool tag the decoder does not understand.
    Unknown(u8),
}
impl Const {
    pub fn is_wide(&self) -> bool {
        matches!(self, Const::Long(_) | Const::Double(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BootstrapMethod {
    pub handle: MethodHandle,
    pub args: Vec<Const>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub u8);
impl Opcode {
    pub fn from_name(s: &str) -> Option<Self> {
        opcodes::lookup(s).map(Opcode)
    }

    pub fn name(self) -> &'static str {
        opcodes::name(self.0).unwrap_or("<invalid>")
    }
}
impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayType {
    Boolean = 4,
    Char = 5,
    Float = 6,
    Double = 7,
    Byte = 8,
    Short = 9,
    Int = 10,
    Long = 11,
}
impl ArrayType {
    const NAMES: [(&'static str, ArrayType); 8] = [
        ("boolean", ArrayType::Boolean),
        ("char", ArrayType::Char),
        ("float", ArrayType::Float),
        ("double", ArrayType::Double),
        ("byte", ArrayType::Byte),
        ("short", ArrayType::Short),
        ("int", ArrayType::Int),
        ("long", ArrayType::Long),
    ];

    pub fn from_code(v: u8) -> Option<Self> {
        Self::NAMES.iter().map(|p| p.1).find(|t| *t as u8 == v)
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::NAMES.iter().find(|p| p.0 == s).map(|p| p.1)
    }

    pub fn name(self) -> &'static str {
        Self::NAMES[self as usize - 4].0
    }
}

/// Operand of a `wide` prefixed instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WideInstruction {
    Local(Opcode, u16),
    Iinc { index: u16, delta: i32 },
}

/// One variant per operand shape. The opcode is carried where more than one
/// mnemonic shares a shape.
///
/// Numeric operands are stored wider than their encoding so that out of range
/// values coming from text reach the encoder and are reported there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Instruction {
    Simple(Opcode),
    /// bipush and sipush
    Push(Opcode, i32),
    /// Local variable slot operand, including ret
    Local(Opcode, u16),
    /// getfield, putfield, getstatic, putstatic, invokevirtual, invokespecial, invokestatic
    Member(Opcode, RefKind, MemberRef),
    /// ldc, ldc_w and ldc2_w
    Ldc(Opcode, Const),
    /// new, checkcast, instanceof and anewarray
    Class(Opcode, String),
    Jump(Opcode, Label),
    Iinc {
        index: u16,
        delta: i32,
    },
    TableSwitch {
        low: i32,
        targets: Vec<Label>,
        default: Label,
    },
    LookupSwitch {
        pairs: Vec<(i32, Label)>,
        default: Label,
    },
    MultiANewArray {
        class: String,
        dims: u8,
    },
    NewArray(ArrayType),
    InvokeInterface {
        method: MemberRef,
        count: u8,
    },
    InvokeDynamic {
        bootstrap: u16,
        nat: NameAndType,
    },
    Wide(WideInstruction),
}
impl Instruction {
    pub fn opcode(&self) -> Opcode {
        use Instruction::*;
        match self {
            Simple(op) | Push(op, _) | Local(op, _) | Member(op, ..) | Ldc(op, _) | Class(op, _) | Jump(op, _) => *op,
            Iinc { .. } => Opcode(opcodes::IINC),
            TableSwitch { .. } => Opcode(opcodes::TABLESWITCH),
            LookupSwitch { .. } => Opcode(opcodes::LOOKUPSWITCH),
            MultiANewArray { .. } => Opcode(opcodes::MULTIANEWARRAY),
            NewArray(_) => Opcode(opcodes::NEWARRAY),
            InvokeInterface { .. } => Opcode(opcodes::INVOKEINTERFACE),
            InvokeDynamic { .. } => Opcode(opcodes::INVOKEDYNAMIC),
            Wide(_) => Opcode(opcodes::WIDE),
        }
    }

    /// Labels this instruction may transfer control to.
    pub fn targets(&self) -> Vec<&Label> {
        match self {
            Instruction::Jump(_, l) => vec![l],
            Instruction::TableSwitch { targets, default, .. } => {
                targets.iter().chain(std::iter::once(default)).collect()
            }
            Instruction::LookupSwitch { pairs, default } => {
                pairs.iter().map(|p| &p.1).chain(std::iter::once(default)).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeItem {
    pub label: Option<Label>,
    pub instr: Option<Instruction>,
}
impl CodeItem {
    pub fn labeled(label: Label, instr: Instruction) -> Self {
        Self {
            label: Some(label),
            instr: Some(instr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    /// None catches everything
    pub catch_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumber {
    pub start: Label,
    pub line: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub start: Label,
    pub end: Label,
    pub index: u16,
    pub name: String,
    /// Descriptor, or generic signature inside a LocalVariableTypeTable
    pub desc: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object(String),
    Uninitialized(Label),
}

/// A StackMapTable frame. The compact or extended encoding is chosen by the
/// encoder from the offset delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Same,
    SameLocals1Stack(VType),
    Chop(u8),
    Append(Vec<VType>),
    Full { locals: Vec<VType>, stack: Vec<VType> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapFrame {
    pub label: Label,
    pub frame: Frame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeAttribute {
    LineNumberTable(Vec<LineNumber>),
    LocalVariableTable(Vec<LocalVariable>),
    LocalVariableTypeTable(Vec<LocalVariable>),
    StackMapTable(Vec<StackMapFrame>),
    Raw(RawAttribute),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub stack: u16,
    pub locals: u16,
    pub items: Vec<CodeItem>,
    pub exceptions: Vec<ExceptionHandler>,
    pub attrs: Vec<CodeAttribute>,
}
impl Code {
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.items.iter().filter_map(|item| item.instr.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClass {
    pub inner: String,
    pub outer: Option<String>,
    pub name: Option<String>,
    pub flags: InnerClassAccessFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub type_desc: String,
    pub elements: Vec<(String, ElementValue)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
    Byte(i32),
    Char(i32),
    Int(i32),
    Short(i32),
    Boolean(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    Str(String),
    Enum { type_desc: String, name: String },
    Class(String),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

/// An attribute this codec does not model, kept as its raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub name: String,
    pub data: Vec<u8>,
}

/// Attributes that may appear on a class, field or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Code(Code),
    Exceptions(Vec<String>),
    SourceFile(String),
    InnerClasses(Vec<InnerClass>),
    Signature(String),
    Deprecated,
    Synthetic,
    Annotations { visible: bool, annotations: Vec<Annotation> },
    ParameterAnnotations { visible: bool, params: Vec<Vec<Annotation>> },
    AnnotationDefault(ElementValue),
    Raw(RawAttribute),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub flags: FieldAccessFlags,
    pub name: String,
    pub desc: String,
    /// Lifted from the ConstantValue attribute
    pub constant: Option<Const>,
    pub attrs: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub flags: MethodAccessFlags,
    pub name: String,
    pub desc: String,
    pub attrs: Vec<Attribute>,
}
impl Method {
    pub fn code(&self) -> Option<&Code> {
        self.attrs.iter().find_map(|a| match a {
            Attribute::Code(c) => Some(c),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassItem {
    Field(Field),
    Method(Method),
    Attribute(Attribute),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub version: Option<Version>,
    pub flags: ClassAccessFlags,
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub items: Vec<ClassItem>,
    pub bootstrap_methods: Vec<BootstrapMethod>,
}
impl Class {
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.items.iter().filter_map(|item| match item {
            ClassItem::Field(f) => Some(f),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.items.iter().filter_map(|item| match item {
            ClassItem::Method(m) => Some(m),
            _ => None,
        })
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.items.iter().filter_map(|item| match item {
            ClassItem::Attribute(a) => Some(a),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_type_codes() {
        assert_eq!(ArrayType::from_code(4), Some(ArrayType::Boolean));
        assert_eq!(ArrayType::from_code(11), Some(ArrayType::Long));
        assert_eq!(ArrayType::from_code(12), None);
        assert_eq!(ArrayType::Short.name(), "short");
        assert_eq!(ArrayType::from_name("double").map(|t| t as u8), Some(7));
    }

    #[test]
    fn test_handle_kind_names() {
        assert_eq!(HandleKind::InvokeStatic.name(), "invokeStatic");
        assert_eq!(HandleKind::from_name("newInvokeSpecial"), Some(HandleKind::NewInvokeSpecial));
        assert_eq!(HandleKind::from_name("INVALID"), None);
        assert_eq!(HandleKind::from_u8(0), None);
    }

    #[test]
    fn test_instruction_opcode() {
        let ins = Instruction::Iinc { index: 1, delta: -1 };
        assert_eq!(ins.opcode().name(), "iinc");
        let ins = Instruction::Jump(Opcode::from_name("goto").unwrap(), Label::at(7));
        assert_eq!(ins.opcode().0, 0xA7);
        assert_eq!(ins.targets(), vec![&Label::from("L7")]);
    }
}
