use super::flags::ALL_FLAGS;
use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;
use std::fmt::Write;

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"\A(?:[a-zA-Z_$\(<]|\[[A-Z\[])[a-zA-Z0-9_$;/\[\(\)<>*+-]*\z").unwrap();
}

fn is_word(s: &str) -> bool {
    WORD_RE.is_match(s) && !ALL_FLAGS.contains(&s)
}

/// Body of a double quoted literal. Everything outside printable ASCII is
/// written as UTF-16 escapes so supplementary characters become two escapes.
fn escape_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.encode_utf16() {
        match c {
            34 => out.push_str("\\\""),
            92 => out.push_str("\\\\"),
            32..=126 => out.push(c as u8 as char),
            _ => {
                let _ = write!(&mut out, "\\u{:04X}", c);
            }
        }
    }
    out.push('"');
    out
}

/// Bare word if the parser would read it back unchanged, a quoted literal otherwise.
pub(super) fn escape(s: &str) -> Cow<str> {
    if is_word(s) {
        Cow::from(s)
    } else {
        Cow::from(escape_quoted(s))
    }
}

/// Always quoted, for positions where a bare word would mean something else.
pub(super) fn quote(s: &str) -> String {
    escape_quoted(s)
}

pub(super) fn escape_byte_string(s: &[u8]) -> String {
    let mut buf = String::with_capacity(s.len() * 4 + 3);
    buf.push_str("b\"");
    for b in s {
        let _ = write!(buf, "\\x{:02X}", b);
    }
    buf.push('"');
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_word() {
        assert!(is_word("hello"));
        assert!(is_word("[Lhello/world;"));
        assert!(is_word("[[[Z"));
        assert!(is_word("<init>"));
        assert!(is_word("(ZZ)[LFoo;"));
        assert!(is_word("foo2"));
        assert!(!is_word(""));
        assert!(!is_word("[42]"));
        assert!(!is_word("0"));
        assert!(!is_word("hello\n"));
        assert!(!is_word("a b"));
        assert!(!is_word("a.b"));
        assert!(!is_word("public"));
        assert!(!is_word("strictfp"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("hello").as_ref(), "hello");
        assert_eq!(escape("[42]").as_ref(), "\"[42]\"");
        assert_eq!(escape("s = \"42\";").as_ref(), r#""s = \"42\";""#);
        assert_eq!(escape("\0").as_ref(), r#""\u0000""#);
        assert_eq!(escape("\u{07FF}\u{FFFF}").as_ref(), r#""\u07FF\uFFFF""#);
        assert_eq!(escape("\u{10FFFF}").as_ref(), r#""\uDBFF\uDFFF""#);
        assert_eq!(escape("a\\b").as_ref(), r#""a\\b""#);
        assert_eq!(quote("hello"), "\"hello\"");
    }

    #[test]
    fn test_escape_byte_string() {
        assert_eq!(escape_byte_string(b"\x00\xAB"), r#"b"\x00\xAB""#);
        assert_eq!(escape_byte_string(b""), r#"b"""#);
    }
}
