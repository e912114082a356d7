use std::str;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BStr<'a>(pub &'a [u8]);
impl<'a> std::fmt::Debug for BStr<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        String::from_utf8_lossy(self.0).fmt(f)
    }
}

/// Decode modified UTF-8 into UTF-16 code units. Returns false on invalid input.
fn decode_mutf8(mut iter: impl Iterator<Item = u8>, mut cb: impl FnMut(u16)) -> bool {
    while let Some(b) = iter.next() {
        match b {
            0b00000001..=0b01111111 => cb(b as u16),
            0b11000000..=0b11011111 => {
                let val = (b as u16) & 31;
                match iter.next() {
                    Some(b) => cb((val << 6) ^ (b as u16) & 63),
                    None => return false,
                }
            }
            0b11100000..=0b11101111 => {
                let val = (b as u16) & 15;
                match (iter.next(), iter.next()) {
                    (Some(b1), Some(b2)) => cb((((val << 6) ^ (b1 as u16) & 63) << 6) ^ (b2 as u16) & 63),
                    _ => return false,
                }
            }
            _ => return false,
        }
    }
    true
}

/// Decode a constant pool Utf8 entry. Plain UTF-8 is accepted as well since
/// it coincides with modified UTF-8 for most strings.
pub fn parse_utf8(s: &[u8]) -> Option<String> {
    if let Ok(s) = str::from_utf8(s) {
        if !s.contains('\0') {
            return Some(s.to_owned());
        }
    }

    let mut u16s = Vec::with_capacity(s.len());
    if !decode_mutf8(s.iter().copied(), |c16| {
        u16s.push(c16);
    }) {
        return None;
    }

    std::char::decode_utf16(u16s.into_iter()).collect::<Result<String, _>>().ok()
}

fn mutf8_codepoint(out: &mut Vec<u8>, c: u16) {
    match c {
        1..=127 => out.push(c as u8),
        0 | 0x80..=0x7FF => {
            out.push(0xC0 ^ ((c >> 6) as u8));
            out.push(0x80 ^ ((c & 63) as u8));
        }
        0x800..=0xFFFF => {
            out.push(0xE0 ^ ((c >> 12) as u8));
            out.push(0x80 ^ (((c >> 6) & 63) as u8));
            out.push(0x80 ^ ((c & 63) as u8));
        }
    }
}

/// Encode a string as modified UTF-8: NUL takes two bytes and supplementary
/// characters are written as surrogate pairs.
pub fn to_mutf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        let mut buf = [0u16; 2];
        for unit in c.encode_utf16(&mut buf) {
            mutf8_codepoint(&mut out, *unit);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutf8_nul_and_surrogates() {
        assert_eq!(to_mutf8("a\0b"), b"a\xC0\x80b");
        assert_eq!(to_mutf8("\u{10FFFF}"), b"\xed\xaf\xbf\xed\xbf\xbf");
        assert_eq!(parse_utf8(b"a\xC0\x80b").as_deref(), Some("a\0b"));
        assert_eq!(parse_utf8(b"\xed\xaf\xbf\xed\xbf\xbf").as_deref(), Some("\u{10FFFF}"));
        assert_eq!(parse_utf8(b"\xdf\xbf\xef\xbf\xbf").as_deref(), Some("\u{07FF}\u{FFFF}"));
    }

    #[test]
    fn test_invalid_mutf8() {
        // lone surrogate
        assert_eq!(parse_utf8(b"\xed\xaf\xbf"), None);
        assert_eq!(parse_utf8(b"\xff"), None);
    }
}
