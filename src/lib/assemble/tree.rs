//! Parse tree produced by the grammar. It mirrors [`crate::lib::ast`] except
//! that constants may still be symbolic references (`[_3]`, `[bs:_0]`) which
//! only the bridge pass can resolve, since definitions may follow their uses.
use super::span::Span;
use super::span::Spanned;
use crate::lib::ast;

#[derive(Debug)]
pub enum ConstExpr<'a> {
    Ref(Span<'a>),
    Inline(Spanned<'a, InlineConst<'a>>),
}

#[derive(Debug)]
pub enum InlineConst<'a> {
    /// A constant with no reference left in it
    Value(ast::Const),
    MethodHandle(ast::HandleKind, Box<ConstExpr<'a>>),
    Dynamic(BsExpr<'a>, ast::NameAndType),
    InvokeDynamic(BsExpr<'a>, ast::NameAndType),
}

#[derive(Debug)]
pub enum BsExpr<'a> {
    Ref(Span<'a>),
    Inline(Spanned<'a, BsInline<'a>>),
}

/// An inline `Bootstrap` definition or the right hand side of a
/// `.bootstrap` definition.
#[derive(Debug)]
pub struct BsInline<'a> {
    /// Order of appearance in the class text, starting from 0
    pub id: usize,
    pub handle: Box<ConstExpr<'a>>,
    pub args: Vec<ConstExpr<'a>>,
}

#[derive(Debug)]
pub enum Instr<'a> {
    Plain(ast::Instruction),
    Ldc(ast::Opcode, ConstExpr<'a>),
    InvokeDynamic(ConstExpr<'a>),
}

#[derive(Debug)]
pub struct CodeItem<'a> {
    pub label: Option<ast::Label>,
    pub instr: Option<Spanned<'a, Instr<'a>>>,
}

#[derive(Debug)]
pub struct Code<'a> {
    pub stack: u16,
    pub locals: u16,
    pub items: Vec<CodeItem<'a>>,
    pub exceptions: Vec<ast::ExceptionHandler>,
    pub attrs: Vec<ast::CodeAttribute>,
}

#[derive(Debug)]
pub enum Attribute<'a> {
    Code(Code<'a>),
    Other(ast::Attribute),
}

#[derive(Debug)]
pub struct Field<'a> {
    pub flags: ast::FieldAccessFlags,
    pub name: String,
    pub desc: String,
    pub constant: Option<ConstExpr<'a>>,
    pub attrs: Vec<Attribute<'a>>,
}

#[derive(Debug)]
pub struct Method<'a> {
    pub flags: ast::MethodAccessFlags,
    pub name: String,
    pub desc: String,
    pub attrs: Vec<Attribute<'a>>,
}

#[derive(Debug)]
pub enum Item<'a> {
    Field(Field<'a>),
    Method(Method<'a>),
    Attribute(Attribute<'a>),
    Const { lhs: Span<'a>, rhs: ConstExpr<'a> },
    Bootstrap { lhs: Span<'a>, rhs: BsExpr<'a> },
}

#[derive(Debug)]
pub struct Class<'a> {
    /// Position of the `.class` directive
    pub span: Span<'a>,
    pub version: Option<ast::Version>,
    pub flags: ast::ClassAccessFlags,
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub items: Vec<Item<'a>>,
}
