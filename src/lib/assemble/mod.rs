//! Text-to-AST parser. Grammar productions in the `parse_*` modules build a
//! parse tree that may still contain symbolic constant references, which
//! [`bridge`] then resolves into the canonical AST.
mod base_parser;
mod bridge;
mod class_parser;
mod flags;
mod parse_attr;
mod parse_class;
mod parse_code;
mod parse_literal;
mod span;
mod string;
mod tokenize;
mod tree;

use std::fmt;

use crate::lib::ast;
use base_parser::BaseParser;
use class_parser::ClassParser;
pub use bridge::BridgeError;
pub use span::ParseError;
use tokenize::tokenize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    Parse(ParseError),
    Bridge(BridgeError),
}
impl AssembleError {
    pub fn line(&self) -> usize {
        match self {
            AssembleError::Parse(e) => e.line(),
            AssembleError::Bridge(e) => e.line(),
        }
    }

    pub fn col(&self) -> usize {
        match self {
            AssembleError::Parse(e) => e.col(),
            AssembleError::Bridge(e) => e.col(),
        }
    }
}
impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AssembleError::Parse(e) => e.fmt(f),
            AssembleError::Bridge(e) => e.fmt(f),
        }
    }
}
impl std::error::Error for AssembleError {}
impl From<ParseError> for AssembleError {
    fn from(e: ParseError) -> Self {
        AssembleError::Parse(e)
    }
}
impl From<BridgeError> for AssembleError {
    fn from(e: BridgeError) -> Self {
        AssembleError::Bridge(e)
    }
}

/// Parse every class in `source`. Stops at the first error.
pub fn parse(source: &str) -> Result<Vec<ast::Class>, AssembleError> {
    let tokens = tokenize(source)?;
    log::trace!("{} tokens", tokens.len());

    let mut base_parser = BaseParser::new(source, tokens);
    let mut results = Vec::new();

    while base_parser.has_tokens_left() {
        let parser = ClassParser::new(base_parser);
        let (parser, class) = parser.parse()?;
        results.push(bridge::bridge(source, &class)?);
        base_parser = parser;
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::ast::Instruction;
    use crate::lib::ast::Opcode;
    use pretty_assertions::assert_eq;

    const HELLO: &str = "
.version 52 0
.class public super Hello
.super java/lang/Object

.method public static main : ([Ljava/lang/String;)V
    .code stack 2 locals 1
L0:     getstatic Field java/lang/System out Ljava/io/PrintStream;
L3:     ldc \"Hello\"
L5:     invokevirtual Method java/io/PrintStream println (Ljava/lang/String;)V
L8:     return
    .end code
.end method
.end class
";

    #[test]
    fn test_hello() {
        let classes = parse(HELLO).unwrap();
        assert_eq!(classes.len(), 1);
        let class = &classes[0];
        assert_eq!(class.version, Some(ast::Version { major: 52, minor: 0 }));
        assert_eq!(class.flags, ast::ClassAccessFlags::PUBLIC | ast::ClassAccessFlags::SUPER);
        assert_eq!(class.super_name.as_deref(), Some("java/lang/Object"));

        let method = class.methods().next().unwrap();
        assert_eq!(method.desc, "([Ljava/lang/String;)V");
        let code = method.code().unwrap();
        assert_eq!((code.stack, code.locals), (2, 1));
        let instrs: Vec<_> = code.instructions().cloned().collect();
        assert_eq!(
            instrs,
            vec![
                Instruction::Member(
                    Opcode::from_name("getstatic").unwrap(),
                    ast::RefKind::Field,
                    ast::MemberRef::new("java/lang/System", "out", "Ljava/io/PrintStream;"),
                ),
                Instruction::Ldc(Opcode::from_name("ldc").unwrap(), ast::Const::Str("Hello".into())),
                Instruction::Member(
                    Opcode::from_name("invokevirtual").unwrap(),
                    ast::RefKind::Method,
                    ast::MemberRef::new("java/io/PrintStream", "println", "(Ljava/lang/String;)V"),
                ),
                Instruction::Simple(Opcode::from_name("return").unwrap()),
            ]
        );
        assert_eq!(code.items[3].label, Some(ast::Label::at(8)));
    }

    #[test]
    fn test_multiple_classes() {
        let source = ".class A\n.end class\n; between\n.class B\n.super A\n.end class";
        let classes = parse(source).unwrap();
        let names: Vec<_> = classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(classes[0].super_name, None);
        assert_eq!(classes[0].version, None);
    }

    #[test]
    fn test_error_kinds() {
        let err = parse(".class A\n.module foo\n.end class\n").unwrap_err();
        assert!(matches!(err, AssembleError::Parse(_)));
        assert_eq!((err.line(), err.col()), (2, 1));
        assert!(err.to_string().contains("Unsupported directive .module"));

        let err = parse(".class A\n.field static x I = [_1]\n.end class\n").unwrap_err();
        assert!(matches!(err, AssembleError::Bridge(_)));
        assert_eq!(err.line(), 2);

        match parse(".class A\n.field\n").unwrap_err() {
            AssembleError::Parse(e) => assert!(!e.expected.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }
}
