use std::collections::HashMap;
use std::fmt;

use super::string::escape;
use super::string::quote;
use crate::lib::ast::Const;
use crate::lib::ast::MemberRef;
use crate::lib::ast::MethodHandle;
use crate::lib::ast::NameAndType;
use crate::lib::ast::RefKind;

pub(super) fn float_lit(bits: u32) -> String {
    let f = f32::from_bits(bits);
    if f.is_nan() {
        format!("+NaN<0x{:08X}>f", bits)
    } else if f.is_infinite() {
        let s = if f > 0.0 { "+Infinityf" } else { "-Infinityf" };
        s.to_owned()
    } else {
        format!("{:e}f", f)
    }
}

pub(super) fn double_lit(bits: u64) -> String {
    let f = f64::from_bits(bits);
    if f.is_nan() {
        format!("+NaN<0x{:016X}>", bits)
    } else if f.is_infinite() {
        let s = if f > 0.0 { "+Infinity" } else { "-Infinity" };
        s.to_owned()
    } else {
        format!("{:e}", f)
    }
}

pub(super) fn bs_ref(ind: u16) -> String {
    format!("[bs:_{}]", ind)
}

pub(super) fn nat(nat: &NameAndType) -> String {
    format!("{} {}", escape(&nat.name), escape(&nat.desc))
}

pub(super) fn member(kind: RefKind, m: &MemberRef) -> String {
    format!("{} {} {}", kind.name(), escape(&m.class), nat(&m.nat))
}

/// Hands out symbolic `[_n]` keys for the constants that are printed by
/// reference (method handles and invokedynamic call sites) and remembers
/// them so their `.const` definitions can be written at the end of the class.
pub(super) struct RefPrinter {
    defs: Vec<Const>,
    keys: HashMap<Const, usize>,
}
impl RefPrinter {
    pub(super) fn new() -> Self {
        Self {
            defs: Vec::new(),
            keys: HashMap::new(),
        }
    }

    pub(super) fn symref(&mut self, c: Const) -> String {
        let next = self.defs.len();
        let ind = *self.keys.entry(c.clone()).or_insert(next);
        if ind == next {
            self.defs.push(c);
        }
        format!("[_{}]", ind)
    }

    pub(super) fn handle(&mut self, mh: &MethodHandle) -> String {
        self.symref(Const::MethodHandle(mh.clone()))
    }

    pub(super) fn invoke_dynamic(&mut self, bs: u16, n: &NameAndType) -> String {
        self.symref(Const::InvokeDynamic(bs, n.clone()))
    }

    /// Tagged form, used for bootstrap arguments and `.const` definitions.
    pub(super) fn tagged(&mut self, c: &Const) -> String {
        use Const::*;
        match c {
            Int(v) => format!("Int {}", v),
            Float(v) => format!("Float {}", float_lit(*v)),
            Long(v) => format!("Long {}L", v),
            Double(v) => format!("Double {}", double_lit(*v)),
            Str(s) => format!("String {}", escape(s)),
            _ => self.ldc(c),
        }
    }

    /// Right hand side of an `ldc` family instruction or field initializer.
    pub(super) fn ldc(&mut self, c: &Const) -> String {
        use Const::*;
        match c {
            Utf8(s) => format!("Utf8 {}", escape(s)),
            Int(v) => format!("{}", v),
            Float(v) => float_lit(*v),
            Long(v) => format!("{}L", v),
            Double(v) => double_lit(*v),
            Class(s) => format!("Class {}", escape(s)),
            Str(s) => quote(s),
            MethodType(s) => format!("MethodType {}", escape(s)),
            Const::NameAndType(n) => format!("NameAndType {}", nat(n)),
            Ref(kind, m) => member(*kind, m),
            Const::MethodHandle(mh) => self.handle(mh),
            Dynamic(bs, n) => format!("Dynamic {} {}", bs_ref(*bs), nat(n)),
            InvokeDynamic(bs, n) => format!("InvokeDynamic {} {}", bs_ref(*bs), nat(n)),
            Unknown(tag) => format!("Unknown {}", tag),
        }
    }

    fn def_rhs(c: &Const) -> String {
        match c {
            Const::MethodHandle(mh) => format!("MethodHandle {} {}", mh.kind.name(), member(mh.ref_kind, &mh.member)),
            Const::InvokeDynamic(bs, n) => format!("InvokeDynamic {} {}", bs_ref(*bs), nat(n)),
            // Only handles and call sites are ever given keys
            _ => String::new(),
        }
    }

    pub(super) fn print_const_defs(&self, mut w: impl fmt::Write) -> fmt::Result {
        for (ind, c) in self.defs.iter().enumerate() {
            writeln!(w, ".const [_{}] = {}", ind, Self::def_rhs(c))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::ast::HandleKind;

    #[test]
    fn test_float_literals() {
        assert_eq!(float_lit(1.5f32.to_bits()), "1.5e0f");
        assert_eq!(float_lit(f32::NEG_INFINITY.to_bits()), "-Infinityf");
        assert_eq!(float_lit(0x7FC00001), "+NaN<0x7FC00001>f");
        assert_eq!(double_lit((-0.0f64).to_bits()), "-0e0");
        assert_eq!(double_lit(0x7FF0000000000123), "+NaN<0x7FF0000000000123>");
        assert_eq!(double_lit(f64::INFINITY.to_bits()), "+Infinity");
    }

    #[test]
    fn test_symrefs_are_shared() {
        let mh = MethodHandle {
            kind: HandleKind::InvokeStatic,
            ref_kind: RefKind::Method,
            member: MemberRef::new("Foo", "bar", "()V"),
        };
        let mut rp = RefPrinter::new();
        assert_eq!(rp.handle(&mh), "[_0]");
        assert_eq!(rp.invoke_dynamic(0, &NameAndType::new("run", "()V")), "[_1]");
        assert_eq!(rp.ldc(&Const::MethodHandle(mh)), "[_0]");

        let mut out = String::new();
        rp.print_const_defs(&mut out).unwrap();
        assert_eq!(
            out,
            ".const [_0] = MethodHandle invokeStatic Method Foo bar ()V\n.const [_1] = InvokeDynamic [bs:_0] run ()V\n"
        );
    }

    #[test]
    fn test_ldc_forms() {
        let mut rp = RefPrinter::new();
        assert_eq!(rp.ldc(&Const::Str("hello".into())), "\"hello\"");
        assert_eq!(rp.ldc(&Const::Long(-5)), "-5L");
        assert_eq!(rp.ldc(&Const::Class("java/lang/Object".into())), "Class java/lang/Object");
        assert_eq!(rp.tagged(&Const::Str("a b".into())), "String \"a b\"");
        assert_eq!(rp.tagged(&Const::Int(7)), "Int 7");
        assert_eq!(rp.ldc(&Const::Unknown(19)), "Unknown 19");
    }
}
