use std::fmt;

use crate::lib::ast::Label;
use crate::lib::ast::Opcode;

/// What went wrong while encoding. See [`EncodeError`] for where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeErrorKind {
    UnknownOpcode(u8),
    /// The instruction variant does not match the operand shape of its opcode
    WrongShape(Opcode),
    /// A value does not fit the field that has to hold it
    Overflow(String),
    UndefinedLabel(Label),
    DuplicateLabel(Label),
    BootstrapIndex { index: u16, count: usize },
    IincRange(i32),
    /// Decode placeholder for a constant with an unsupported tag
    UnknownConstant(u8),
    BranchOverflow { delta: i64 },
    DuplicateLookupKey(i32),
    EmptyTableSwitch,
    CodeTooLong(usize),
    TooManyConstants,
}
impl fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use EncodeErrorKind::*;
        match self {
            UnknownOpcode(op) => write!(f, "unknown opcode 0x{:02X}", op),
            WrongShape(op) => write!(f, "wrong operand type for {}", op),
            Overflow(msg) => f.write_str(msg),
            UndefinedLabel(l) => write!(f, "undefined label {}", l),
            DuplicateLabel(l) => write!(f, "label {} defined more than once", l),
            BootstrapIndex { index, count } => write!(
                f,
                "bootstrap method index {} out of range (class has {} bootstrap methods)",
                index, count
            ),
            IincRange(v) => write!(f, "iinc constant {} out of range", v),
            UnknownConstant(tag) => write!(f, "cannot encode placeholder for unsupported constant tag {}", tag),
            BranchOverflow { delta } => write!(f, "branch offset {} does not fit in 16 bits", delta),
            DuplicateLookupKey(k) => write!(f, "duplicate lookupswitch key {}", k),
            EmptyTableSwitch => f.write_str("tableswitch requires at least one target"),
            CodeTooLong(n) => write!(f, "code length {} exceeds maximum of 65535 bytes", n),
            TooManyConstants => f.write_str("exceeded maximum of 65534 constant pool slots"),
        }
    }
}

/// Where in the class an [`EncodeError`] happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeContext {
    pub class: String,
    /// Name and descriptor of the method being encoded
    pub method: Option<(String, String)>,
    /// Index into the method's code items
    pub item: Option<usize>,
    /// Bytecode offset of that item, once known
    pub offset: Option<u32>,
}
impl EncodeContext {
    pub fn error(&self, kind: EncodeErrorKind) -> EncodeError {
        EncodeError {
            kind,
            context: self.clone(),
        }
    }
}
impl fmt::Display for EncodeContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "class {}", self.class)?;
        if let Some((name, desc)) = &self.method {
            write!(f, ", method {}{}", name, desc)?;
        }
        if let Some(item) = self.item {
            write!(f, ", item {}", item)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " (offset {})", offset)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeError {
    pub kind: EncodeErrorKind,
    pub context: EncodeContext,
}
impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.kind)
    }
}
impl std::error::Error for EncodeError {}

pub type Result<T> = std::result::Result<T, EncodeError>;

/// Attaches the current context to errors from context free helpers.
pub trait WithContext<T> {
    fn ctx(self, ctx: &EncodeContext) -> Result<T>;
}
impl<T> WithContext<T> for std::result::Result<T, EncodeErrorKind> {
    fn ctx(self, ctx: &EncodeContext) -> Result<T> {
        self.map_err(|kind| ctx.error(kind))
    }
}
