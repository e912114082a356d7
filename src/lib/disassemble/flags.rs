use std::fmt;

use crate::lib::ast;

type FlagNames = &'static [(u16, &'static str)];

static CLASS: FlagNames = &[
    (0x0001, "public"),
    (0x0010, "final"),
    (0x0020, "super"),
    (0x0200, "interface"),
    (0x0400, "abstract"),
    (0x1000, "synthetic"),
    (0x2000, "annotation"),
    (0x4000, "enum"),
    (0x8000, "module"),
];
static FIELD: FlagNames = &[
    (0x0001, "public"),
    (0x0002, "private"),
    (0x0004, "protected"),
    (0x0008, "static"),
    (0x0010, "final"),
    (0x0040, "volatile"),
    (0x0080, "transient"),
    (0x1000, "synthetic"),
    (0x4000, "enum"),
];
static METHOD: FlagNames = &[
    (0x0001, "public"),
    (0x0002, "private"),
    (0x0004, "protected"),
    (0x0008, "static"),
    (0x0010, "final"),
    (0x0020, "synchronized"),
    (0x0040, "bridge"),
    (0x0080, "varargs"),
    (0x0100, "native"),
    (0x0400, "abstract"),
    (0x0800, "strict"),
    (0x1000, "synthetic"),
];
static INNER_CLASS: FlagNames = &[
    (0x0001, "public"),
    (0x0002, "private"),
    (0x0004, "protected"),
    (0x0008, "static"),
    (0x0010, "final"),
    (0x0200, "interface"),
    (0x0400, "abstract"),
    (0x1000, "synthetic"),
    (0x2000, "annotation"),
    (0x4000, "enum"),
];

/// Every word the assembler reads as a flag. Strings equal to one of these
/// are always quoted when printed.
pub static ALL_FLAGS: [&str; 20] = [
    "abstract",
    "annotation",
    "bridge",
    "enum",
    "final",
    "interface",
    "module",
    "native",
    "private",
    "protected",
    "public",
    "static",
    "strict",
    "strictfp",
    "super",
    "synchronized",
    "synthetic",
    "transient",
    "varargs",
    "volatile",
];

/// Displays as a space prefixed list of flag words.
pub(super) struct Flags(FlagNames, u16);
impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (bit, name) in self.0 {
            if self.1 & bit != 0 {
                f.write_str(" ")?;
                f.write_str(name)?;
            }
        }
        Ok(())
    }
}
impl Flags {
    pub(super) fn class(v: ast::ClassAccessFlags) -> Flags {
        Flags(CLASS, v.bits())
    }
    pub(super) fn field(v: ast::FieldAccessFlags) -> Flags {
        Flags(FIELD, v.bits())
    }
    pub(super) fn method(v: ast::MethodAccessFlags) -> Flags {
        Flags(METHOD, v.bits())
    }
    pub(super) fn inner_class(v: ast::InnerClassAccessFlags) -> Flags {
        Flags(INNER_CLASS, v.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_words() {
        let flags = ast::MethodAccessFlags::PUBLIC | ast::MethodAccessFlags::STATIC | ast::MethodAccessFlags::VARARGS;
        assert_eq!(Flags::method(flags).to_string(), " public static varargs");
        assert_eq!(Flags::class(ast::ClassAccessFlags::empty()).to_string(), "");
        let flags = ast::FieldAccessFlags::PRIVATE | ast::FieldAccessFlags::VOLATILE;
        assert_eq!(Flags::field(flags).to_string(), " private volatile");
    }

    #[test]
    fn test_all_flags_sorted() {
        let mut sorted = ALL_FLAGS;
        sorted.sort_unstable();
        assert_eq!(sorted, ALL_FLAGS);
        for table in [CLASS, FIELD, METHOD, INNER_CLASS] {
            assert!(table.iter().all(|(_, name)| ALL_FLAGS.contains(name)));
        }
    }
}
