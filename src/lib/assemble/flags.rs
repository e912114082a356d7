use super::span::Span;

const FLAG_PAIRS: [(&str, u16); 20] = [
    ("abstract", 0x0400),
    ("annotation", 0x2000),
    ("bridge", 0x0040),
    ("enum", 0x4000),
    ("final", 0x0010),
    ("interface", 0x0200),
    ("module", 0x8000),
    ("native", 0x0100),
    ("private", 0x0002),
    ("protected", 0x0004),
    ("public", 0x0001),
    ("static", 0x0008),
    ("strict", 0x0800),
    ("strictfp", 0x0800),
    ("super", 0x0020),
    ("synchronized", 0x0020),
    ("synthetic", 0x1000),
    ("transient", 0x0080),
    ("varargs", 0x0080),
    ("volatile", 0x0040),
];

/// Accumulates a bitset of flag words. The caller decides which bits are
/// legal for the item being parsed.
pub struct FlagList {
    flags: u16,
}
impl FlagList {
    pub fn new() -> Self {
        Self { flags: 0 }
    }

    pub fn push(&mut self, span: Span<'_>) -> Result<(), ()> {
        let ind = FLAG_PAIRS.binary_search_by_key(&span.0, |t| t.0).map_err(|_| ())?;
        self.flags |= FLAG_PAIRS[ind].1;
        Ok(())
    }

    pub fn flush(self) -> u16 {
        self.flags
    }
}
