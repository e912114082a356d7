use std::cmp::Eq;
use std::cmp::PartialEq;
use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;
use std::hash::Hasher;

#[derive(Debug, Clone, Copy)]
pub struct Span<'a>(pub &'a str);
impl<'a> Span<'a> {
    pub fn of<T>(self, val: T) -> Spanned<'a, T> {
        Spanned { v: val, span: self }
    }
}

#[derive(Clone, Copy)]
pub struct Spanned<'a, T> {
    pub v: T,
    pub span: Span<'a>,
}
impl<T: Hash> Hash for Spanned<'_, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.v.hash(state);
    }
}
impl<T: PartialEq> PartialEq for Spanned<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.v == other.v
    }
}
impl<T: Eq> Eq for Spanned<'_, T> {}
impl<T: Debug> Debug for Spanned<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.v.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanBounds {
    pub start: usize,
    pub end: usize,
}
impl SpanBounds {
    /// Spans always borrow from the source they are checked against. Anything
    /// else is clamped to the end of the source.
    pub fn new(span: Span, source: &str) -> Self {
        let base = source.as_ptr() as usize;
        let start = (span.0.as_ptr() as usize)
            .checked_sub(base)
            .filter(|off| *off <= source.len())
            .unwrap_or(source.len());
        let end = std::cmp::min(start + span.0.len(), source.len());
        Self { start, end }
    }
}

/// Line and column (both 1 based) of a span plus a rendering of its source
/// line with the span underlined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub col: usize,
    snippet: String,
}
impl Location {
    pub fn new(source: &str, bounds: SpanBounds) -> Self {
        // todo - better line limit
        const MAXLINELEN: usize = 115;

        let start = bounds.start;
        let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = source[start..].find('\n').map_or(source.len(), |i| start + i);
        let line = source[line_start..line_end].trim_end_matches('\r');
        let line_no = source[..line_start].matches('\n').count() + 1;
        let col = source[line_start..start].chars().count() + 1;

        let span_len = source[start..std::cmp::max(start, std::cmp::min(bounds.end, line_end))]
            .chars()
            .count();
        let mut underline: String = source[line_start..start]
            .chars()
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();
        underline.push('^');
        for _ in 1..span_len {
            underline.push('~');
        }

        fn trim(s: &str) -> &str {
            match s.char_indices().nth(MAXLINELEN) {
                Some((i, _)) => &s[..i],
                None => s,
            }
        }

        Self {
            line: line_no,
            col,
            snippet: format!("{}\n{}", trim(line), trim(&underline)),
        }
    }

    /// The source line followed by a line underlining the span.
    pub fn snippet(&self) -> &str {
        &self.snippet
    }
}

/// Failure to recognize assembly text. Carries the position the parser got
/// stuck at and every alternative it tried there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub msg: String,
    /// Byte offset into the source text
    pub pos: usize,
    pub location: Location,
    pub expected: Vec<String>,
}
impl ParseError {
    pub fn new(source: &str, msg: impl Into<String>, span: Span<'_>, expected: Vec<String>) -> Self {
        let bounds = SpanBounds::new(span, source);
        Self {
            msg: msg.into(),
            pos: bounds.start,
            location: Location::new(source, bounds),
            expected,
        }
    }

    pub fn line(&self) -> usize {
        self.location.line
    }

    pub fn col(&self) -> usize {
        self.location.col
    }
}
impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}: {}", self.location.line, self.location.col, self.msg)?;
        if !self.expected.is_empty() {
            write!(f, " (expected one of: {})", self.expected.join(", "))?;
        }
        write!(f, "\n{}", self.location.snippet())
    }
}
impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location() {
        let source = "first line\n  second\tline\nthird";
        let span = Span(&source[20..24]);
        let err = ParseError::new(source, "Bad", span, vec![]);
        assert_eq!(err.line(), 2);
        assert_eq!(err.col(), 10);
        assert_eq!(err.to_string(), "2:10: Bad\n  second\tline\n        \t^~~~");
    }

    #[test]
    fn test_eof_location() {
        let source = "abc\n";
        let err = ParseError::new(source, "Unexpected end of file", Span(&source[4..]), vec!["'.end'".into()]);
        assert_eq!((err.line(), err.col()), (2, 1));
        assert!(err.to_string().starts_with("2:1: Unexpected end of file (expected one of: '.end')"));
    }
}
