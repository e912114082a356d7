use super::code;
use super::code::MaybePosSet;
use super::code::Pos;
use super::code::PosSet;
use super::cpool::ConstPool;
use super::reader::ParseError;
use super::reader::Reader;
use crate::lib::util::BStr;

///////////////////////////////////////////////////////////////////////////////
#[derive(Debug)]
pub struct BootstrapMethod {
    pub bsref: u16,
    pub args: Vec<u16>,
}
impl BootstrapMethod {
    fn new(r: &mut Reader) -> Result<Self, ParseError> {
        Ok(Self {
            bsref: r.u16()?,
            args: r.parse_list(Reader::u16)?,
        })
    }
}
///////////////////////////////////////////////////////////////////////////////
#[derive(Debug)]
pub enum ElementValue {
    Anno(Annotation),
    Array(Vec<ElementValue>),
    Enum(u16, u16),

    Class(u16),
    Str(u16),

    Byte(u16),
    Boolean(u16),
    Char(u16),
    Short(u16),
    Int(u16),
    Float(u16),
    Long(u16),
    Double(u16),
}
impl ElementValue {
    fn new(r: &mut Reader) -> Result<Self, ParseError> {
        use ElementValue::*;
        Ok(match r.u8()? {
            b'@' => Anno(Annotation::new(r)?),
            b'B' => Byte(r.u16()?),
            b'C' => Char(r.u16()?),
            b'D' => Double(r.u16()?),
            b'F' => Float(r.u16()?),
            b'I' => Int(r.u16()?),
            b'J' => Long(r.u16()?),
            b'S' => Short(r.u16()?),
            b'Z' => Boolean(r.u16()?),
            b'[' => Array(r.parse_list(ElementValue::new)?),
            b'c' => Class(r.u16()?),
            b'e' => Enum(r.u16()?, r.u16()?),
            b's' => Str(r.u16()?),
            _ => return ParseError::s("Invalid element value tag"),
        })
    }
}

#[derive(Debug)]
pub struct Annotation(pub u16, pub Vec<(u16, ElementValue)>);
impl Annotation {
    fn new(r: &mut Reader) -> Result<Self, ParseError> {
        let desc = r.u16()?;
        let vals = r.parse_list(|r| Ok((r.u16()?, ElementValue::new(r)?)))?;
        Ok(Self(desc, vals))
    }
}

#[derive(Debug)]
pub struct ParameterAnnotation(pub Vec<Annotation>);
impl ParameterAnnotation {
    fn new(r: &mut Reader) -> Result<Self, ParseError> {
        Ok(Self(r.parse_list(Annotation::new)?))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InnerClassLine {
    pub inner: u16,
    pub outer: u16,
    pub name: u16,
    pub flags: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct LocalVarLine {
    pub start: Pos,
    pub end: Pos,
    pub name: u16,
    pub desc: u16,
    pub ind: u16,
}
impl LocalVarLine {
    fn new(r: &mut Reader, pset: Option<&PosSet>) -> Result<Self, ParseError> {
        let start = pset.make(r.u16()?)?;
        let length = r.u16()?;
        let end = pset.make_off(start, length)?;

        Ok(Self {
            start,
            end,
            name: r.u16()?,
            desc: r.u16()?,
            ind: r.u16()?,
        })
    }
}
///////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
pub enum AttrBody<'a> {
    AnnotationDefault(Box<ElementValue>),
    BootstrapMethods(Vec<BootstrapMethod>),
    Code(Box<code::Code<'a>>),
    ConstantValue(u16),
    Deprecated,
    Exceptions(Vec<u16>),
    InnerClasses(Vec<InnerClassLine>),
    LineNumberTable(Vec<(Pos, u16)>),
    LocalVariableTable(Vec<LocalVarLine>),
    LocalVariableTypeTable(Vec<LocalVarLine>),

    RuntimeInvisibleAnnotations(Vec<Annotation>),
    RuntimeInvisibleParameterAnnotations(Vec<ParameterAnnotation>),
    RuntimeVisibleAnnotations(Vec<Annotation>),
    RuntimeVisibleParameterAnnotations(Vec<ParameterAnnotation>),

    Signature(u16),
    SourceFile(u16),
    StackMapTable(code::StackMapTable),
    Synthetic,

    /// Unknown, or failed to parse; the bytes stay in `Attribute::data`
    Raw,
}
impl<'a> AttrBody<'a> {
    pub fn new(name: &'a [u8], data: &'a [u8], cp: &ConstPool<'a>, pset: Option<&PosSet>) -> Self {
        Self::try_parse(name, data, cp, pset).unwrap_or(Self::Raw)
    }

    fn try_parse(name: &'a [u8], data: &'a [u8], cp: &ConstPool<'a>, pset: Option<&PosSet>) -> Result<Self, ParseError> {
        use AttrBody::*;
        let mut r = Reader(data);
        let r = &mut r;

        let parsed = match name {
            b"AnnotationDefault" => AnnotationDefault(Box::new(ElementValue::new(r)?)),
            b"BootstrapMethods" => BootstrapMethods(r.parse_list(BootstrapMethod::new)?),
            b"Code" => Code(Box::new(code::Code::new(r, cp)?)),
            b"ConstantValue" => ConstantValue(r.u16()?),
            b"Deprecated" => Deprecated,
            b"Exceptions" => Exceptions(r.parse_list(Reader::u16)?),
            b"InnerClasses" => InnerClasses(r.parse_list(|r| {
                Ok(InnerClassLine {
                    inner: r.u16()?,
                    outer: r.u16()?,
                    name: r.u16()?,
                    flags: r.u16()?,
                })
            })?),
            b"LineNumberTable" => LineNumberTable(r.parse_list(|r| Ok((pset.make(r.u16()?)?, r.u16()?)))?),
            b"LocalVariableTable" => LocalVariableTable(r.parse_list(|r| LocalVarLine::new(r, pset))?),
            b"LocalVariableTypeTable" => LocalVariableTypeTable(r.parse_list(|r| LocalVarLine::new(r, pset))?),

            b"RuntimeInvisibleAnnotations" => RuntimeInvisibleAnnotations(r.parse_list(Annotation::new)?),
            b"RuntimeInvisibleParameterAnnotations" => {
                RuntimeInvisibleParameterAnnotations(r.parse_list_bytelen(ParameterAnnotation::new)?)
            }
            b"RuntimeVisibleAnnotations" => RuntimeVisibleAnnotations(r.parse_list(Annotation::new)?),
            b"RuntimeVisibleParameterAnnotations" => {
                RuntimeVisibleParameterAnnotations(r.parse_list_bytelen(ParameterAnnotation::new)?)
            }

            b"Signature" => Signature(r.u16()?),
            b"SourceFile" => SourceFile(r.u16()?),
            b"StackMapTable" => StackMapTable(code::StackMapTable::new(r, pset)?),
            b"Synthetic" => Synthetic,

            _ => Raw,
        };
        Ok(if r.0.len() > 0 { Raw } else { parsed })
    }
}

#[derive(Debug)]
pub struct Attribute<'a> {
    pub name: u16,
    pub name_utf: BStr<'a>,
    pub data: &'a [u8],
    pub body: AttrBody<'a>,
}
impl<'a> Attribute<'a> {
    pub(super) fn new(
        r: &mut Reader<'a>,
        cp: &ConstPool<'a>,
        pset: Option<&PosSet>,
        allow_stackmap: bool,
    ) -> Result<Self, ParseError> {
        let name_ind = r.u16()?;
        let length = r.u32()?;

        let name_utf = cp.utf8(name_ind).ok_or(ParseError("Attribute has invalid name index"))?;

        let data = r.get(length as usize)?;
        let mut body = AttrBody::new(name_utf, data, cp, pset);

        if !allow_stackmap {
            if let AttrBody::StackMapTable(..) = body {
                body = AttrBody::Raw;
            }
        }

        Ok(Self {
            name: name_ind,
            name_utf: BStr(name_utf),
            data,
            body,
        })
    }

    pub(super) fn new_list(
        r: &mut Reader<'a>,
        cp: &ConstPool<'a>,
        pset: Option<&PosSet>,
    ) -> Result<Vec<Self>, ParseError> {
        let mut allow_stackmap = true;
        r.parse_list(|r| {
            let attr = Attribute::new(r, cp, pset, allow_stackmap)?;
            if let AttrBody::StackMapTable(..) = attr.body {
                allow_stackmap = false;
            }
            Ok(attr)
        })
    }
}
