use super::reader::ParseError;
use super::reader::Reader;
use crate::lib::util::BStr;

/// Constant pool tag bytes, shared with the encoder.
pub mod tags {
    pub const UTF8: u8 = 1;
    pub const INT: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELD: u8 = 9;
    pub const METHOD: u8 = 10;
    pub const INTERFACE_METHOD: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;
}

/// A tag-dispatched constant pool entry. Indices are not yet resolved.
#[derive(Debug)]
pub enum Const<'a> {
    Null, // 0 unused, and the slot after a Long or Double
    Utf8(BStr<'a>),
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
    Module(u16),
    Package(u16),
}
impl<'a> Const<'a> {
    fn read(r: &mut Reader<'a>) -> Result<Self, ParseError> {
        use Const::*;
        Ok(match r.u8()? {
            tags::UTF8 => {
                let len = r.u16()?;
                Utf8(BStr(r.get(len as usize)?))
            }
            tags::INT => Int(r.u32()?),
            tags::FLOAT => Float(r.u32()?),
            tags::LONG => Long(r.u64()?),
            tags::DOUBLE => Double(r.u64()?),
            tags::CLASS => Class(r.u16()?),
            tags::STRING => Str(r.u16()?),
            tags::FIELD => Field(r.u16()?, r.u16()?),
            tags::METHOD => Method(r.u16()?, r.u16()?),
            tags::INTERFACE_METHOD => InterfaceMethod(r.u16()?, r.u16()?),
            tags::NAME_AND_TYPE => NameAndType(r.u16()?, r.u16()?),
            tags::METHOD_HANDLE => MethodHandle(r.u8()?, r.u16()?),
            tags::METHOD_TYPE => MethodType(r.u16()?),
            tags::DYNAMIC => Dynamic(r.u16()?, r.u16()?),
            tags::INVOKE_DYNAMIC => InvokeDynamic(r.u16()?, r.u16()?),
            tags::MODULE => Module(r.u16()?),
            tags::PACKAGE => Package(r.u16()?),
            // The entry width is unknown, so the rest of the pool cannot be located.
            _ => return ParseError::s("Unrecognized constant pool tag"),
        })
    }

    /// Tag byte of the entry, 0 for unused slots.
    pub fn tag(&self) -> u8 {
        use Const::*;
        match self {
            Null => 0,
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
            Module(_) => tags::MODULE,
            Package(_) => tags::PACKAGE,
        }
    }

    /// Long and Double take up two pool slots.
    pub fn is_wide(&self) -> bool {
        matches!(self, Const::Long(_) | Const::Double(_))
    }
}

#[derive(Debug)]
pub struct ConstPool<'a>(pub Vec<Const<'a>>);
impl<'a> ConstPool<'a> {
    pub(super) fn new(r: &mut Reader<'a>) -> Result<Self, ParseError> {
        let count = r.u16()? as usize;
        let mut cp = Vec::with_capacity(count);
        cp.push(Const::Null);
        while cp.len() < count {
            let entry = Const::read(r)?;
            let wide = entry.is_wide();
            cp.push(entry);
            if wide {
                cp.push(Const::Null)
            }
        }
        Ok(Self(cp))
    }

    pub fn get(&self, i: u16) -> Option<&Const<'a>> {
        self.0.get(i as usize)
    }

    pub fn utf8(&self, i: u16) -> Option<&'a [u8]> {
        self.0
            .get(i as usize)
            .and_then(|c| if let Const::Utf8(s) = c { Some(s.0) } else { None })
    }
}
