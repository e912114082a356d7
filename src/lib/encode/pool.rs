use std::collections::HashMap;

use super::error::EncodeErrorKind;
use super::writer::BufWriter;
use crate::lib::ast;
use crate::lib::ast::Const;
use crate::lib::ast::RefKind;
use crate::lib::classfile::cpool::tags;
use crate::lib::util::to_mutf8;

type Result<T> = std::result::Result<T, EncodeErrorKind>;

/// A constant pool entry with its references already turned into indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RawConst {
    Utf8(Vec<u8>),

    Int(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class(u16),
    Str(u16),
    Field(u16, u16),
    Method(u16, u16),
    InterfaceMethod(u16, u16),
    NameAndType(u16, u16),

    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
}
impl RawConst {
    fn is_wide(&self) -> bool {
        matches!(self, RawConst::Long(_) | RawConst::Double(_))
    }

    fn tag(&self) -> u8 {
        use RawConst::*;
        match self {
            Utf8(_) => tags::UTF8,
            Int(_) => tags::INT,
            Float(_) => tags::FLOAT,
            Long(_) => tags::LONG,
            Double(_) => tags::DOUBLE,
            Class(_) => tags::CLASS,
            Str(_) => tags::STRING,
            Field(..) => tags::FIELD,
            Method(..) => tags::METHOD,
            InterfaceMethod(..) => tags::INTERFACE_METHOD,
            NameAndType(..) => tags::NAME_AND_TYPE,
            MethodHandle(..) => tags::METHOD_HANDLE,
            MethodType(_) => tags::METHOD_TYPE,
            Dynamic(..) => tags::DYNAMIC,
            InvokeDynamic(..) => tags::INVOKE_DYNAMIC,
        }
    }

    fn write(&self, w: &mut BufWriter) {
        use RawConst::*;
        w.u8(self.tag());
        match self {
            Utf8(s) => {
                // length checked on insertion
                w.u16(s.len() as u16);
                w.write(s);
            }
            Int(v) | Float(v) => w.u32(*v),
            Long(v) | Double(v) => w.u64(*v),
            Class(v) | Str(v) | MethodType(v) => w.u16(*v),
            Field(a, b)
            | Method(a, b)
            | InterfaceMethod(a, b)
            | NameAndType(a, b)
            | Dynamic(a, b)
            | InvokeDynamic(a, b) => {
                w.u16(*a);
                w.u16(*b);
            }
            MethodHandle(kind, val) => {
                w.u8(*kind);
                w.u16(*val);
            }
        }
    }
}

/// Constant pool under construction for a single class. Equal entries share
/// one index, and indices are handed out in order of first request.
pub struct PoolBuilder {
    entries: Vec<RawConst>,
    allocated: HashMap<RawConst, u16>,
    /// Next free index, which is also the constant_pool_count
    next: u16,
    bootstrap_count: usize,
}
impl PoolBuilder {
    pub fn new(bootstrap_count: usize) -> Self {
        Self {
            entries: Vec::new(),
            allocated: HashMap::new(),
            next: 1,
            bootstrap_count,
        }
    }

    fn allocate(&mut self, c: RawConst) -> Result<u16> {
        if let Some(ind) = self.allocated.get(&c) {
            return Ok(*ind);
        }

        let width = if c.is_wide() { 2 } else { 1 };
        let ind = self.next;
        if ind as u32 + width > u16::MAX as u32 {
            return Err(EncodeErrorKind::TooManyConstants);
        }
        self.next += width as u16;
        self.allocated.insert(c.clone(), ind);
        self.entries.push(c);
        Ok(ind)
    }

    pub fn utf8(&mut self, s: &str) -> Result<u16> {
        let b = to_mutf8(s);
        if b.len() > u16::MAX as usize {
            return Err(EncodeErrorKind::Overflow(format!(
                "string of {} bytes exceeds maximum Utf8 length of 65535",
                b.len()
            )));
        }
        self.allocate(RawConst::Utf8(b))
    }

    pub fn class(&mut self, name: &str) -> Result<u16> {
        let ind = self.utf8(name)?;
        self.allocate(RawConst::Class(ind))
    }

    pub fn opt_class(&mut self, name: Option<&str>) -> Result<u16> {
        name.map_or(Ok(0), |name| self.class(name))
    }

    pub fn nat(&mut self, nat: &ast::NameAndType) -> Result<u16> {
        let n = self.utf8(&nat.name)?;
        let t = self.utf8(&nat.desc)?;
        self.allocate(RawConst::NameAndType(n, t))
    }

    pub fn member(&mut self, kind: RefKind, m: &ast::MemberRef) -> Result<u16> {
        let cls = self.class(&m.class)?;
        let nat = self.nat(&m.nat)?;
        self.allocate(match kind {
            RefKind::Field => RawConst::Field(cls, nat),
            RefKind::Method => RawConst::Method(cls, nat),
            RefKind::InterfaceMethod => RawConst::InterfaceMethod(cls, nat),
        })
    }

    pub fn handle(&mut self, mh: &ast::MethodHandle) -> Result<u16> {
        let target = self.member(mh.ref_kind, &mh.member)?;
        self.allocate(RawConst::MethodHandle(mh.kind as u8, target))
    }

    pub fn bootstrap_index(&self, index: u16) -> Result<u16> {
        if (index as usize) < self.bootstrap_count {
            Ok(index)
        } else {
            Err(EncodeErrorKind::BootstrapIndex {
                index,
                count: self.bootstrap_count,
            })
        }
    }

    pub fn constant(&mut self, c: &Const) -> Result<u16> {
        let raw = match c {
            Const::Utf8(s) => return self.utf8(s),
            Const::Int(v) => RawConst::Int(*v as u32),
            Const::Float(v) => RawConst::Float(*v),
            Const::Long(v) => RawConst::Long(*v as u64),
            Const::Double(v) => RawConst::Double(*v),
            Const::Class(s) => return self.class(s),
            Const::Str(s) => RawConst::Str(self.utf8(s)?),
            Const::MethodType(s) => RawConst::MethodType(self.utf8(s)?),
            Const::NameAndType(nat) => return self.nat(nat),
            Const::Ref(kind, m) => return self.member(*kind, m),
            Const::MethodHandle(mh) => return self.handle(mh),
            Const::Dynamic(bs, nat) => RawConst::Dynamic(self.bootstrap_index(*bs)?, self.nat(nat)?),
            Const::InvokeDynamic(bs, nat) => RawConst::InvokeDynamic(self.bootstrap_index(*bs)?, self.nat(nat)?),
            Const::Unknown(tag) => return Err(EncodeErrorKind::UnknownConstant(*tag)),
        };
        self.allocate(raw)
    }

    /// The constant_pool_count field: one more than the highest used index.
    pub fn count(&self) -> u16 {
        self.next
    }

    pub fn write(&self, w: &mut BufWriter) {
        w.u16(self.next);
        for c in &self.entries {
            c.write(w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_and_wide_slots() {
        let mut pool = PoolBuilder::new(0);
        let s1 = pool.constant(&Const::Str("hello".into())).unwrap();
        let s2 = pool.constant(&Const::Str("hello".into())).unwrap();
        assert_eq!((s1, s2), (2, 2));
        assert_eq!(pool.utf8("hello").unwrap(), 1);

        let l = pool.constant(&Const::Long(7)).unwrap();
        let next = pool.constant(&Const::Int(7)).unwrap();
        assert_eq!(next, l + 2);
        assert_eq!(pool.count(), next + 1);

        // floats are compared by bit pattern
        let nan1 = pool.constant(&Const::Float(0x7FC00000)).unwrap();
        let nan2 = pool.constant(&Const::Float(0x7FC00001)).unwrap();
        assert_ne!(nan1, nan2);
    }

    #[test]
    fn test_member_and_handle() {
        let mut pool = PoolBuilder::new(1);
        let m = ast::MemberRef::new("A", "f", "()V");
        let method = pool.member(RefKind::Method, &m).unwrap();
        let imethod = pool.member(RefKind::InterfaceMethod, &m).unwrap();
        assert_ne!(method, imethod);

        let mh = ast::MethodHandle {
            kind: ast::HandleKind::InvokeStatic,
            ref_kind: RefKind::Method,
            member: m,
        };
        let h = pool.handle(&mh).unwrap();
        assert_eq!(pool.constant(&Const::MethodHandle(mh)).unwrap(), h);

        let mut w = BufWriter::default();
        pool.write(&mut w);
        let buf = w.into_buf();
        // last entry is the handle: tag 15, kind 6, target index
        assert_eq!(&buf[buf.len() - 4..], &[15, 6, 0, method as u8]);
    }

    #[test]
    fn test_errors() {
        let mut pool = PoolBuilder::new(1);
        let nat = ast::NameAndType::new("x", "()V");
        assert!(pool.constant(&Const::InvokeDynamic(0, nat.clone())).is_ok());
        assert_eq!(
            pool.constant(&Const::InvokeDynamic(1, nat)),
            Err(EncodeErrorKind::BootstrapIndex { index: 1, count: 1 })
        );
        assert_eq!(pool.constant(&Const::Unknown(19)), Err(EncodeErrorKind::UnknownConstant(19)));
    }

    #[test]
    fn test_pool_limit() {
        let mut pool = PoolBuilder::new(0);
        for i in 0..32767 {
            pool.constant(&Const::Long(i)).unwrap();
        }
        assert_eq!(pool.count(), 65535);
        // already present, so no new slot is needed
        assert_eq!(pool.constant(&Const::Long(0)), Ok(1));
        assert_eq!(pool.constant(&Const::Int(0)), Err(EncodeErrorKind::TooManyConstants));
    }
}
