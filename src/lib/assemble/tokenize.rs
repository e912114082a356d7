use lazy_static::lazy_static;
use regex::Regex;
use regex::RegexSet;

use super::span::ParseError;
use super::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Newlines,
    Colon,
    Equals,
    Directive,
    Word,
    Ref,
    BsRef,
    LabelDef,
    StringLit,
    IntLit,
    LongLit,
    FloatLit,
    DoubleLit,
}
impl TokenType {
    /// Name used when listing expected alternatives in error messages.
    pub fn describe(self) -> &'static str {
        use TokenType::*;
        match self {
            Newlines => "end of line",
            Colon => "':'",
            Equals => "'='",
            Directive => "directive",
            Word => "word",
            Ref => "constant reference",
            BsRef => "bootstrap reference",
            LabelDef => "label definition",
            StringLit => "string literal",
            IntLit => "integer literal",
            LongLit => "long literal",
            FloatLit => "float literal",
            DoubleLit => "double literal",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Token<'a>(pub TokenType, pub Span<'a>);

static SET_PATTERNS: &[&str] = &[
    // whitespace and comments, including a comment on the last line
    r"\A(?:;.*)?(?:\s+|\z)",
    // COLON
    r"\A:($|\s)",
    // EQUALS
    r"\A=($|\s)",
    // DIRECTIVE
    r"\A\.[a-z]+($|\s)",
    // WORD
    r"\A(?-u)(?:[a-zA-Z_$\(<]|\[[A-Z\[])[\w$;/\[\(\)<>*+-]*($|\s)",
    // REF
    r"\A\[[a-z0-9_]+\]($|\s)",
    r"\A\[bs:[a-z0-9_]+\]($|\s)",
    // LABEL_DEF
    r"\AL\w+:($|\s)",
    // STRING_LITERAL
    r#"\Ab?"[^"\n\\]*(?:\\.[^"\n\\]*)*"($|\s)"#,
    r#"\Ab?'[^'\n\\]*(?:\\.[^'\n\\]*)*'($|\s)"#,
    // INT_LITERAL
    r#"\A[+-]?(?:0x[0-9a-fA-F]+|[1-9][0-9]*|0)L?($|\s)"#,
    // FLOAT_LITERAL
    r#"\A[+-]Infinityf?($|\s)"#,
    r#"\A[+-]NaN(?:<0x[0-9a-fA-F]+>)?f?($|\s)"#,
    r#"\A(?-u)[+-]?\d+\.\d+(?:e[+-]?\d+)?f?($|\s)"#, // decimal float
    r#"\A(?-u)[+-]?\d+(?:e[+-]?\d+)f?($|\s)"#,       // decimal float without fraction (exponent mandatory)
    r#"\A(?-u)[+-]?0x[0-9a-fA-F]+(?:\.[0-9a-fA-F]+)?(?:p[+-]?\d+)f?($|\s)"#, // hex float
];

lazy_static! {
    static ref RE_SET: RegexSet = RegexSet::new(SET_PATTERNS).unwrap();
    static ref RE_VEC: Vec<Regex> = SET_PATTERNS.iter().map(|pat| Regex::new(pat).unwrap()).collect();
    // Same patterns without the trailing whitespace requirement, used to point at bad tokens
    static ref RE_TRIMMED: Vec<Regex> = SET_PATTERNS[1..]
        .iter()
        .map(|p| Regex::new(&p[..p.len() - r"($|\s)".len()]).unwrap())
        .collect();
}

fn token_type(m_i: usize, tok: &str) -> TokenType {
    use TokenType::*;
    match m_i {
        1 => Colon,
        2 => Equals,
        3 => Directive,
        4 => Word,
        5 => Ref,
        6 => BsRef,
        7 => LabelDef,
        8..=9 => StringLit,
        10 => {
            if tok.ends_with('L') {
                LongLit
            } else {
                IntLit
            }
        }
        _ => {
            if tok.ends_with('f') {
                FloatLit
            } else {
                DoubleLit
            }
        }
    }
}

fn invalid_token(source: &str, s: &str) -> ParseError {
    let best = RE_TRIMMED.iter().filter_map(|re| re.find(s)).max_by_key(|m| m.end());
    if let Some(best) = best {
        let tok = Span(&s[..best.end()]);
        ParseError::new(source, "Invalid token (try adding a space after it)", tok, vec![])
    } else if s.starts_with('"') || s.starts_with('\'') {
        ParseError::new(source, "Unclosed string literal", Span(&s[..1]), vec![])
    } else {
        let tok = Span(s.split_whitespace().next().unwrap_or(s));
        ParseError::new(source, "Invalid token", tok, vec![])
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut s = source.trim_end();
    let mut has_newline = true;

    while !s.is_empty() {
        let m_i = match RE_SET.matches(s).iter().next() {
            Some(m_i) => m_i,
            None => return Err(invalid_token(source, s)),
        };
        let end = match RE_VEC[m_i].find(s) {
            Some(m) => m.end(),
            None => return Err(invalid_token(source, s)),
        };
        let (tok, rest) = s.split_at(end);

        if m_i == 0 {
            // whitespace
            if !has_newline && tok.contains('\n') {
                tokens.push(Token(TokenType::Newlines, Span(tok)));
                has_newline = true;
            }
        } else {
            has_newline = tok.ends_with('\n');
            let tok = tok.trim_end();
            tokens.push(Token(token_type(m_i, tok), Span(tok)));
            if has_newline {
                tokens.push(Token(TokenType::Newlines, Span(&s[tok.len()..tok.len() + 1])));
            }
        }
        s = rest;
    }
    if !has_newline {
        tokens.push(Token(TokenType::Newlines, Span(s)));
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(source: &str) -> Vec<TokenType> {
        tokenize(source).unwrap().into_iter().map(|t| t.0).collect()
    }

    #[test]
    fn test_token_types() {
        use TokenType::*;
        assert_eq!(
            types("L12:     ldc2_w -5L ; comment\n\n  ldc +NaN<0x7FC00001>f\n"),
            vec![LabelDef, Word, LongLit, Newlines, Word, FloatLit, Newlines]
        );
        assert_eq!(
            types(".bootstrap [bs:_0] = Bootstrap [_1] String \"a b\" :"),
            vec![Directive, BsRef, Equals, Word, Ref, Word, StringLit, Colon, Newlines]
        );
        assert_eq!(types("1.5e0 -Infinity 1e-45f 0x1.8p1"), vec![DoubleLit, DoubleLit, FloatLit, DoubleLit, Newlines]);
        assert_eq!(types("[Ljava/lang/String; 0x7F"), vec![Word, IntLit, Newlines]);
        assert_eq!(types(".end class\n; trailing words"), vec![Directive, Word, Newlines]);
    }

    #[test]
    fn test_invalid_tokens() {
        let err = tokenize("iload 5:").unwrap_err();
        assert_eq!(err.col(), 7);
        let err = tokenize("ldc \"abc").unwrap_err();
        assert_eq!(err.msg, "Unclosed string literal");
    }
}
