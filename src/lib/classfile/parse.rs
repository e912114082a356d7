use super::attrs::Attribute;
use super::cpool::ConstPool;
use super::reader::ParseError;
use super::reader::Reader;

/// A field or method as laid out in the class file.
#[derive(Debug)]
pub struct Field<'a> {
    pub access: u16,
    pub name: u16,
    pub desc: u16,
    pub attrs: Vec<Attribute<'a>>,
}
impl<'a> Field<'a> {
    fn new(r: &mut Reader<'a>, cp: &ConstPool<'a>) -> Result<Self, ParseError> {
        let access = r.u16()?;
        let name = r.u16()?;
        let desc = r.u16()?;
        let attrs = Attribute::new_list(r, cp, None)?;

        Ok(Self {
            access,
            name,
            desc,
            attrs,
        })
    }
}

#[derive(Debug)]
pub struct Class<'a> {
    pub version: (u16, u16),
    pub cp: ConstPool<'a>,
    pub access: u16,
    pub this: u16,
    pub super_: u16,

    pub interfaces: Vec<u16>,
    pub fields: Vec<Field<'a>>,
    pub methods: Vec<Field<'a>>,
    pub attrs: Vec<Attribute<'a>>,
}
impl<'a> Class<'a> {
    fn new(r: &mut Reader<'a>) -> Result<Self, ParseError> {
        if r.u32()? != 0xCAFEBABE {
            return ParseError::s("Classfile does not start with magic bytes. Are you sure you passed in a classfile?");
        }

        let minor = r.u16()?;
        let major = r.u16()?;
        let version = (major, minor);

        let cp = ConstPool::new(r)?;

        let access = r.u16()?;
        let this = r.u16()?;
        let super_ = r.u16()?;

        let interfaces = r.parse_list(|r| r.u16())?;
        let fields = r.parse_list(|r| Field::new(r, &cp))?;
        let methods = r.parse_list(|r| Field::new(r, &cp))?;
        let attrs = Attribute::new_list(r, &cp, None)?;

        if r.0.len() > 0 {
            return ParseError::s("Extra data at end of classfile");
        }

        Ok(Class {
            version,
            cp,
            access,
            this,
            super_,
            interfaces,
            fields,
            methods,
            attrs,
        })
    }
}

pub fn parse(data: &[u8]) -> Result<Class, ParseError> {
    let mut r = Reader(data);
    Class::new(&mut r)
}
