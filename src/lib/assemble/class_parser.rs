use std::collections::HashSet;

use super::base_parser::BaseParser;
use super::flags::FlagList;
use super::parse_literal;
use super::span::ParseError;
use super::span::Span;
use super::string;
use super::tokenize::Token;
use super::tokenize::TokenType;
use super::tree::BsExpr;
use super::tree::BsInline;
use super::tree::ConstExpr;
use super::tree::InlineConst;
use crate::lib::ast;
use crate::lib::ast::Const;
use crate::lib::ast::HandleKind;
use crate::lib::ast::RefKind;
use crate::lib::util::to_mutf8;

pub struct ClassParser<'a> {
    pub parser: BaseParser<'a>,
    /// Number of inline bootstrap definitions parsed so far in this class
    pub bootstrap_count: usize,
    // Temporary values only set during parsing of Code attributes
    pub labels: HashSet<&'a str>,
}
impl<'a> std::ops::Deref for ClassParser<'a> {
    type Target = BaseParser<'a>;

    fn deref(&self) -> &Self::Target {
        &self.parser
    }
}
impl<'a> std::ops::DerefMut for ClassParser<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.parser
    }
}
impl<'a> ClassParser<'a> {
    pub fn new(parser: BaseParser<'a>) -> Self {
        Self {
            parser,
            bootstrap_count: 0,
            labels: HashSet::new(),
        }
    }

    fn check_utf_len(&self, s: String, span: Span<'a>) -> Result<String, ParseError> {
        if to_mutf8(&s).len() > u16::MAX as usize {
            self.err1("Constant strings must be at most 65535 bytes in MUTF8 encoding.", span)
        } else {
            Ok(s)
        }
    }

    pub fn utf_from(&self, tok: Token<'a>) -> Result<String, ParseError> {
        use TokenType::*;
        match tok.0 {
            Word => self.check_utf_len(tok.1 .0.to_owned(), tok.1),
            StringLit => {
                let s = string::unescape(tok.1 .0).map_err(|(msg, s)| self.error1(msg, Span(s)))?;
                self.check_utf_len(s, tok.1)
            }
            Ref | BsRef => self.err1("References can only be used in constant positions", tok.1),
            _ => self.err1("Expected identifier or string literal", tok.1),
        }
    }

    pub fn utf(&mut self) -> Result<String, ParseError> {
        if !self.has_type(TokenType::Word) {
            self.has_type(TokenType::StringLit);
        }
        let tok = self.next()?;
        self.utf_from(tok)
    }

    /// A class name or `[0]` for none.
    pub fn opt_cls(&mut self) -> Result<Option<String>, ParseError> {
        if self.tryv("[0]") {
            Ok(None)
        } else {
            Ok(Some(self.utf()?))
        }
    }

    pub fn nat(&mut self) -> Result<ast::NameAndType, ParseError> {
        let name = self.utf()?;
        let desc = self.utf()?;
        Ok(ast::NameAndType { name, desc })
    }

    pub fn ref_kind(&self, span: Span<'a>) -> Option<RefKind> {
        match span.0 {
            "Field" => Some(RefKind::Field),
            "Method" => Some(RefKind::Method),
            "InterfaceMethod" => Some(RefKind::InterfaceMethod),
            _ => None,
        }
    }

    /// Class, name and descriptor following a `Field`/`Method`/`InterfaceMethod` tag.
    pub fn member_body(&mut self) -> Result<ast::MemberRef, ParseError> {
        let class = self.utf()?;
        let nat = self.nat()?;
        Ok(ast::MemberRef { class, nat })
    }

    /// Tag word followed by a member reference, as used by the field and
    /// method instructions.
    pub fn member(&mut self, allowed: &[RefKind]) -> Result<(RefKind, ast::MemberRef), ParseError> {
        for kind in allowed {
            self.expect(format!("'{}'", kind.name()));
        }
        let span = self.next()?.1;
        match self.ref_kind(span) {
            Some(kind) if allowed.contains(&kind) => Ok((kind, self.member_body()?)),
            _ => {
                let names: Vec<_> = allowed.iter().map(|k| k.name()).collect();
                self.err1str(format!("Expected {}", names.join(" or ")), span)
            }
        }
    }

    pub fn mhnotref(&mut self, tag_span: Span<'a>) -> Result<InlineConst<'a>, ParseError> {
        let kind = HandleKind::from_name(tag_span.0).ok_or_else(|| self.error1("Invalid method handle tag", tag_span))?;
        let body = Box::new(self.ref_or_tagged_const()?);
        Ok(InlineConst::MethodHandle(kind, body))
    }

    pub fn bs_args(&mut self, handle: ConstExpr<'a>) -> Result<BsInline<'a>, ParseError> {
        let id = self.bootstrap_count;
        self.bootstrap_count += 1;

        let mut args = Vec::new();
        while !self.tryv(":") {
            if args.len() >= u16::MAX as usize {
                let next_span = self.peek()?.1;
                return self.err1("Maximum number of arguments to bootstrap method (65535) exceeded", next_span);
            }
            args.push(self.ref_or_tagged_const()?);
        }
        Ok(BsInline {
            id,
            handle: Box::new(handle),
            args,
        })
    }

    /// Bootstrap operand of `Dynamic` and `InvokeDynamic` constants: either a
    /// `[bs:_n]` reference or an inline method handle followed by arguments.
    pub fn bsref(&mut self) -> Result<BsExpr<'a>, ParseError> {
        if self.has_type(TokenType::BsRef) {
            return Ok(BsExpr::Ref(self.next()?.1));
        }
        let tok = self.next()?;
        match tok.0 {
            TokenType::Word => {
                let mh = ConstExpr::Inline(tok.1.of(self.mhnotref(tok.1)?));
                Ok(BsExpr::Inline(tok.1.of(self.bs_args(mh)?)))
            }
            _ => self.err1("Expected methodhandle tag or bootstrap ref", tok.1),
        }
    }

    pub fn float_from(&self, span: Span<'a>) -> Result<Const, ParseError> {
        let s = span.0.trim_end_matches('f');
        parse_literal::float(s)
            .map(Const::Float)
            .ok_or_else(|| self.error1("Invalid float literal", span))
    }

    pub fn double_from(&self, span: Span<'a>) -> Result<Const, ParseError> {
        parse_literal::double(span.0)
            .map(Const::Double)
            .ok_or_else(|| self.error1("Invalid double literal", span))
    }

    pub fn long_from(&self, span: Span<'a>) -> Result<Const, ParseError> {
        let s = span.0.trim_end_matches('L');
        parse_literal::int::<i64>(s)
            .map(Const::Long)
            .ok_or_else(|| self.error1("Invalid long literal", span))
    }

    pub fn int_from(&self, span: Span<'a>) -> Result<Const, ParseError> {
        parse_literal::int::<i32>(span.0)
            .map(Const::Int)
            .ok_or_else(|| self.error1("Invalid integer literal", span))
    }

    pub fn tagged_const_from(&mut self, span: Span<'a>) -> Result<InlineConst<'a>, ParseError> {
        use InlineConst::Value;

        Ok(match span.0 {
            "Utf8" => Value(Const::Utf8(self.utf()?)),
            "Int" => Value(Const::Int(self.i32()?)),
            "Float" => {
                let span = self.assert_type(TokenType::FloatLit)?;
                Value(self.float_from(span)?)
            }
            "Long" => {
                let span = self.assert_type(TokenType::LongLit)?;
                Value(self.long_from(span)?)
            }
            "Double" => {
                let span = self.assert_type(TokenType::DoubleLit)?;
                Value(self.double_from(span)?)
            }

            "Class" => Value(Const::Class(self.utf()?)),
            "String" => Value(Const::Str(self.utf()?)),
            "MethodType" => Value(Const::MethodType(self.utf()?)),
            "NameAndType" => Value(Const::NameAndType(self.nat()?)),

            "Field" | "Method" | "InterfaceMethod" => {
                let kind = self.ref_kind(span).unwrap_or(RefKind::Method);
                Value(Const::Ref(kind, self.member_body()?))
            }
            "MethodHandle" => {
                let tag_span = self.assert_type(TokenType::Word)?;
                self.mhnotref(tag_span)?
            }

            "Dynamic" => InlineConst::Dynamic(self.bsref()?, self.nat()?),
            "InvokeDynamic" => InlineConst::InvokeDynamic(self.bsref()?, self.nat()?),

            "Unknown" => Value(Const::Unknown(self.u8()?)),
            "Module" | "Package" => {
                return self.err1("Module and Package constants are not supported in this position", span)
            }
            _ => return self.err1("Unrecognized constant tag", span),
        })
    }

    pub fn ref_or_tagged_const(&mut self) -> Result<ConstExpr<'a>, ParseError> {
        use TokenType::*;
        if self.has_type(Ref) {
            return Ok(ConstExpr::Ref(self.next()?.1));
        }
        self.has_type(Word);
        let tok = self.next()?;
        match tok.0 {
            Word => Ok(ConstExpr::Inline(tok.1.of(self.tagged_const_from(tok.1)?))),
            _ => self.err1("Expected constant pool tag (Utf8, Int, String, NameAndType, etc.) or reference", tok.1),
        }
    }

    pub fn ref_or_tagged_bootstrap(&mut self) -> Result<BsExpr<'a>, ParseError> {
        use TokenType::*;
        if self.has_type(BsRef) {
            return Ok(BsExpr::Ref(self.next()?.1));
        }

        let tag_span = match self.tryv2("Bootstrap") {
            Some(span) => span,
            None => {
                let span = self.next()?.1;
                return self.err1("Expected 'Bootstrap' or bootstrap reference", span);
            }
        };

        let mh = if self.has_type(Ref) {
            ConstExpr::Ref(self.next()?.1)
        } else {
            let tok = self.next()?;
            match tok.0 {
                Word => ConstExpr::Inline(tok.1.of(self.mhnotref(tok.1)?)),
                _ => return self.err1("Expected methodhandle tag or ref", tok.1),
            }
        };
        Ok(BsExpr::Inline(tag_span.of(self.bs_args(mh)?)))
    }

    /// Operand of the ldc family and field initializers: a bare literal, a
    /// tagged constant or a reference.
    pub fn ldc_rhs(&mut self) -> Result<ConstExpr<'a>, ParseError> {
        use TokenType::*;

        for ty in [IntLit, FloatLit, LongLit, DoubleLit, StringLit, Ref] {
            self.has_type(ty);
        }
        let tok = self.next()?;
        let c = match tok.0 {
            IntLit => self.int_from(tok.1)?,
            FloatLit => self.float_from(tok.1)?,
            LongLit => self.long_from(tok.1)?,
            DoubleLit => self.double_from(tok.1)?,
            StringLit => Const::Str(self.utf_from(tok)?),

            Ref => return Ok(ConstExpr::Ref(tok.1)),
            Word => return Ok(ConstExpr::Inline(tok.1.of(self.tagged_const_from(tok.1)?))),
            _ => {
                return self.err1(
                    "Expected constant pool tag (Utf8, Int, String, NameAndType, etc.) or reference",
                    tok.1,
                )
            }
        };
        Ok(ConstExpr::Inline(tok.1.of(InlineConst::Value(c))))
    }

    /// Flag words up to the first word that is not one. `from_bits` rejects
    /// flags that do not apply to the item being parsed.
    pub fn flags<T>(&mut self, from_bits: fn(u16) -> Option<T>, what: &str) -> Result<T, ParseError> {
        let start = self.peek()?.1;
        let mut flags = FlagList::new();
        while self.has_type(TokenType::Word) {
            if flags.push(self.peek()?.1).is_ok() {
                self.next()?;
            } else {
                break;
            }
        }
        let bits = flags.flush();
        from_bits(bits).ok_or_else(|| self.error1(&format!("Flag not allowed on {}", what), start))
    }

    /////////////////////////////////////////////////////////////////////////////////////
    pub fn lbl(&mut self) -> Result<ast::Label, ParseError> {
        self.expect("label");
        let tok = self.next()?;
        if tok.0 != TokenType::Word || !tok.1 .0.starts_with('L') {
            self.err1("Expected label", tok.1)
        } else {
            Ok(ast::Label::from(tok.1 .0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::assemble::tokenize::tokenize;

    fn parser(source: &str) -> ClassParser {
        ClassParser::new(BaseParser::new(source, tokenize(source).unwrap()))
    }

    #[test]
    fn test_ldc_rhs() {
        let mut p = parser("-5L \"a b\" Class java/lang/Object [_1] +NaN<0x7FC00001>f\n");
        let mut next = || match p.ldc_rhs().unwrap() {
            ConstExpr::Inline(c) => match c.v {
                InlineConst::Value(v) => Some(v),
                _ => None,
            },
            ConstExpr::Ref(_) => None,
        };
        assert_eq!(next(), Some(Const::Long(-5)));
        assert_eq!(next(), Some(Const::Str("a b".into())));
        assert_eq!(next(), Some(Const::Class("java/lang/Object".into())));
        assert_eq!(next(), None);
        assert_eq!(next(), Some(Const::Float(0x7FC00001)));
    }

    #[test]
    fn test_inline_bootstraps_are_numbered() {
        let mut p = parser("Bootstrap [_0] Int 1 : Dynamic invokeStatic Method A b ()V : x I\n");
        let first = match p.ref_or_tagged_bootstrap().unwrap() {
            BsExpr::Inline(bs) => bs.v,
            BsExpr::Ref(_) => panic!("expected inline bootstrap"),
        };
        assert_eq!((first.id, first.args.len()), (0, 1));
        match p.ref_or_tagged_const().unwrap() {
            ConstExpr::Inline(c) => match c.v {
                InlineConst::Dynamic(BsExpr::Inline(bs), nat) => {
                    assert_eq!(bs.v.id, 1);
                    assert_eq!(nat, ast::NameAndType::new("x", "I"));
                }
                other => panic!("unexpected {:?}", other),
            },
            ConstExpr::Ref(_) => panic!("expected inline constant"),
        }
        assert_eq!(p.bootstrap_count, 2);
    }

    #[test]
    fn test_member_tags() {
        let mut p = parser("Field A x I Method A f ()V\n");
        assert_eq!(
            p.member(&[RefKind::Field]).unwrap(),
            (RefKind::Field, ast::MemberRef::new("A", "x", "I"))
        );
        let err = p.member(&[RefKind::Field]).unwrap_err();
        assert_eq!(err.msg, "Expected Field");
    }

    #[test]
    fn test_refs_rejected_in_name_position() {
        let mut p = parser("[_1]\n");
        assert_eq!(
            p.utf().unwrap_err().msg,
            "References can only be used in constant positions"
        );
    }
}
