use crate::lib::util::to_mutf8;

type EscapeError<'a> = (&'static str, &'a str);

/// One decoded piece of a string literal.
enum Piece {
    Char(char),
    /// `\uXXXX`, which may be half of a surrogate pair
    Unit(u16),
    /// `\xNN`
    Byte(u8),
}

/// Walks a quoted literal (the `b` prefix already removed), calling `f` for
/// every character or escape.
fn pieces<'a>(s: &'a str, mut f: impl FnMut(Piece)) -> Result<(), EscapeError<'a>> {
    let mut chars = s.chars();
    let quote = match chars.next() {
        Some(c @ ('"' | '\'')) => c,
        _ => return Err(("Expected string literal", s)),
    };

    while let Some(c) = chars.next() {
        if c == quote {
            break;
        } else if c == '\\' {
            let rest = chars.as_str();

            match chars.next().ok_or(("Premature end of input", rest))? {
                '\\' => f(Piece::Char('\\')),
                'n' => f(Piece::Char('\n')),
                'r' => f(Piece::Char('\r')),
                't' => f(Piece::Char('\t')),
                '"' => f(Piece::Char('"')),
                '\'' => f(Piece::Char('\'')),
                'u' => {
                    let hex = chars.as_str().get(..4).ok_or(("Illegal unicode escape", rest))?;
                    let c = u16::from_str_radix(hex, 16).map_err(|_| ("Illegal unicode escape", hex))?;
                    f(Piece::Unit(c));
                    chars = rest[5..].chars();
                }
                'U' => {
                    let hex = chars.as_str().get(..8).ok_or(("Illegal unicode escape", rest))?;
                    let c = u32::from_str_radix(hex, 16).map_err(|_| ("Illegal unicode escape", hex))?;
                    let c = char::from_u32(c).ok_or(("Illegal unicode code point value", hex))?;
                    f(Piece::Char(c));
                    chars = rest[9..].chars();
                }
                'x' => {
                    let hex = chars.as_str().get(..2).ok_or(("Illegal hex escape", rest))?;
                    let c = u8::from_str_radix(hex, 16).map_err(|_| ("Illegal hex escape", hex))?;
                    f(Piece::Byte(c));
                    chars = rest[3..].chars();
                }
                _ => return Err(("Illegal string escape", rest)),
            }
        } else {
            f(Piece::Char(c));
        }
    }
    Ok(())
}

/// Decode a text literal. `\u` escapes are UTF-16 code units, so supplementary
/// characters are written as a surrogate pair; a lone surrogate is rejected.
pub fn unescape(s: &str) -> Result<String, EscapeError> {
    if s.starts_with('b') {
        return Err(("Byte string literals are only allowed in .attribute", s));
    }

    let mut units = Vec::with_capacity(s.len());
    pieces(s, |p| match p {
        Piece::Char(c) => {
            let mut buf = [0u16; 2];
            units.extend_from_slice(c.encode_utf16(&mut buf));
        }
        Piece::Unit(u) => units.push(u),
        Piece::Byte(b) => units.push(b as u16),
    })?;

    std::char::decode_utf16(units.into_iter())
        .collect::<Result<String, _>>()
        .map_err(|_| ("String literal contains an unpaired surrogate", s))
}

/// Decode the body of a raw attribute. `\x` escapes are single bytes and
/// everything else is written as modified UTF-8.
pub fn unescape_bytes(s: &str) -> Result<Vec<u8>, EscapeError> {
    let is_binary = s.starts_with('b');
    let body = s.strip_prefix('b').unwrap_or(s);

    let mut out = Vec::with_capacity(s.len());
    let mut buf = [0u8; 4];
    pieces(body, |p| match p {
        Piece::Char(c) => out.extend(to_mutf8(c.encode_utf8(&mut buf))),
        Piece::Unit(u) => match char::from_u32(u as u32) {
            Some(c) => out.extend(to_mutf8(c.encode_utf8(&mut buf))),
            // Lone surrogate halves are still representable in modified UTF-8
            None => {
                out.push(0xE0 ^ ((u >> 12) as u8));
                out.push(0x80 ^ (((u >> 6) & 63) as u8));
                out.push(0x80 ^ ((u & 63) as u8));
            }
        },
        Piece::Byte(b) if is_binary => out.push(b),
        Piece::Byte(b) => out.extend(to_mutf8(char::from(b).encode_utf8(&mut buf))),
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#""a\"b\\c""#).unwrap(), "a\"b\\c");
        assert_eq!(unescape(r#""\u0000\n""#).unwrap(), "\0\n");
        assert_eq!(unescape(r#""\uDBFF\uDFFF""#).unwrap(), "\u{10FFFF}");
        assert_eq!(unescape(r#""\U0001F600\xE9""#).unwrap(), "\u{1F600}\u{E9}");
        assert_eq!(unescape(r#"'it'"#).unwrap(), "it");
        assert!(unescape(r#""\uD800""#).is_err());
        assert!(unescape(r#""\q""#).is_err());
        assert!(unescape(r#"b"\x00""#).is_err());
    }

    #[test]
    fn test_unescape_bytes() {
        assert_eq!(unescape_bytes(r#"b"\x00\xAB""#).unwrap(), b"\x00\xAB");
        assert_eq!(unescape_bytes(r#""\x00a""#).unwrap(), b"\xC0\x80a");
    }
}
