use std::collections::BTreeSet;

use super::parse_literal;
use super::span::ParseError;
use super::span::Span;
use super::span::SpanBounds;
use super::tokenize::Token;
use super::tokenize::TokenType;

type Iter<'a> = std::iter::Peekable<std::vec::IntoIter<Token<'a>>>;

macro_rules! define_int_parse {
    ($t:ident) => {
        pub fn $t(&mut self) -> Result<$t, ParseError> {
            let tok = self.int()?;
            parse_literal::int(tok.1 .0).ok_or_else(|| {
                self.error1(&format!("Value must be in range {} <= {} <= {}", $t::MIN, tok.1 .0, $t::MAX), tok.1)
            })
        }
    };
}

pub struct BaseParser<'a> {
    source: &'a str,
    tokens: Iter<'a>,
    /// Furthest byte offset any alternative was tried at, and what was tried there
    expected: (usize, BTreeSet<String>),
}
impl<'a> BaseParser<'a> {
    pub fn new(source: &'a str, tokens: Vec<Token<'a>>) -> Self {
        Self {
            source,
            tokens: tokens.into_iter().peekable(),
            expected: (0, BTreeSet::new()),
        }
    }

    fn eof_span(&self) -> Span<'a> {
        Span(&self.source[self.source.len()..])
    }

    fn current_pos(&mut self) -> usize {
        let span = self.tokens.peek().map(|tok| tok.1).unwrap_or_else(|| self.eof_span());
        SpanBounds::new(span, self.source).start
    }

    /// Remember an alternative that did not match the upcoming token.
    pub fn expect(&mut self, what: impl Into<String>) {
        let pos = self.current_pos();
        if pos > self.expected.0 {
            self.expected = (pos, BTreeSet::new());
        }
        if pos == self.expected.0 {
            self.expected.1.insert(what.into());
        }
    }

    pub fn error1(&self, msg: &str, span: Span<'_>) -> ParseError {
        let pos = SpanBounds::new(span, self.source).start;
        let expected = if pos == self.expected.0 {
            self.expected.1.iter().cloned().collect()
        } else {
            Vec::new()
        };
        ParseError::new(self.source, msg, span, expected)
    }

    pub fn err1<T>(&self, msg: &str, span: Span<'_>) -> Result<T, ParseError> {
        Err(self.error1(msg, span))
    }

    pub fn err1str<T>(&self, msg: String, span: Span<'_>) -> Result<T, ParseError> {
        Err(self.error1(&msg, span))
    }

    pub fn has_tokens_left(&mut self) -> bool {
        self.tokens.peek().is_some()
    }

    pub fn next(&mut self) -> Result<Token<'a>, ParseError> {
        match self.tokens.next() {
            Some(tok) => Ok(tok),
            None => self.err1("Unexpected end of file", self.eof_span()),
        }
    }

    pub fn peek(&mut self) -> Result<Token<'a>, ParseError> {
        match self.tokens.peek() {
            Some(tok) => Ok(*tok),
            None => self.err1("Unexpected end of file", self.eof_span()),
        }
    }

    pub fn tryv(&mut self, v: &str) -> bool {
        self.tryv2(v).is_some()
    }

    pub fn tryv2(&mut self, v: &str) -> Option<Span<'a>> {
        let res = self.tokens.next_if(|tok| tok.1 .0 == v).map(|tok| tok.1);
        if res.is_none() {
            self.expect(format!("'{}'", v));
        }
        res
    }

    pub fn has_type(&mut self, ty: TokenType) -> bool {
        let res = matches!(self.tokens.peek(), Some(tok) if tok.0 == ty);
        if !res {
            self.expect(ty.describe());
        }
        res
    }

    pub fn val(&mut self, v: &str) -> Result<(), ParseError> {
        if self.tryv(v) {
            Ok(())
        } else {
            let span = self.next()?.1;
            self.err1str(format!("Expected {}", v), span)
        }
    }

    pub fn assert_type(&mut self, ty: TokenType) -> Result<Span<'a>, ParseError> {
        if self.has_type(ty) {
            Ok(self.next()?.1)
        } else {
            let span = self.next()?.1;
            self.err1str(format!("Expected {}", ty.describe()), span)
        }
    }

    pub fn eol(&mut self) -> Result<(), ParseError> {
        if self.has_type(TokenType::Newlines) {
            self.next()?;
            Ok(())
        } else {
            let span = self.next()?.1;
            self.err1("Expected end of line", span)
        }
    }

    ///////////////////////////////////////////////////////////////////////////
    pub fn int(&mut self) -> Result<Token<'a>, ParseError> {
        let span = self.assert_type(TokenType::IntLit)?;
        Ok(Token(TokenType::IntLit, span))
    }

    define_int_parse!(u8);
    define_int_parse!(u16);

    define_int_parse!(i32);
    ///////////////////////////////////////////////////////////////////////////
}
