use std::collections::HashMap;

use super::DecodeWarning;
use crate::lib::ast::Const;
use crate::lib::ast::HandleKind;
use crate::lib::ast::MemberRef;
use crate::lib::ast::MethodHandle;
use crate::lib::ast::NameAndType;
use crate::lib::ast::RefKind;
use crate::lib::classfile::cpool;
use crate::lib::classfile::cpool::ConstPool;
use crate::lib::classfile::ParseError;
use crate::lib::util::parse_utf8;

/// Resolves constant pool indices into typed constants. Each index is resolved
/// at most once; repeated references get a clone of the cached value.
pub(super) struct Resolver<'a, 'b> {
    cp: &'b ConstPool<'a>,
    cache: HashMap<u16, Const>,
    pub(super) warnings: Vec<DecodeWarning>,
}
impl<'a, 'b> Resolver<'a, 'b> {
    pub(super) fn new(cp: &'b ConstPool<'a>) -> Self {
        Self {
            cp,
            cache: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    pub(super) fn warn(&mut self, w: DecodeWarning) {
        log::warn!("{}", w);
        self.warnings.push(w);
    }

    /// Typed constant at `ind`. Tags without an AST representation become
    /// `Const::Unknown` rather than an error.
    pub(super) fn constant(&mut self, ind: u16) -> Result<Const, ParseError> {
        if let Some(c) = self.cache.get(&ind) {
            return Ok(c.clone());
        }

        let raw = self.cp.get(ind).ok_or(ParseError("Constant pool index out of range"))?;
        use cpool::Const as Raw;
        let c = match *raw {
            Raw::Utf8(s) => Const::Utf8(match parse_utf8(s.0) {
                Some(s) => s,
                None => {
                    self.warn(DecodeWarning::InvalidUtf8 { index: ind });
                    String::from_utf8_lossy(s.0).into_owned()
                }
            }),
            Raw::Int(v) => Const::Int(v as i32),
            Raw::Float(v) => Const::Float(v),
            Raw::Long(v) => Const::Long(v as i64),
            Raw::Double(v) => Const::Double(v),
            Raw::Class(v) => Const::Class(self.utf(v)?),
            Raw::Str(v) => Const::Str(self.utf(v)?),
            Raw::MethodType(v) => Const::MethodType(self.utf(v)?),
            Raw::NameAndType(n, t) => Const::NameAndType(NameAndType {
                name: self.utf(n)?,
                desc: self.utf(t)?,
            }),
            Raw::Field(c, nat) => Const::Ref(RefKind::Field, self.member_from(c, nat)?),
            Raw::Method(c, nat) => Const::Ref(RefKind::Method, self.member_from(c, nat)?),
            Raw::InterfaceMethod(c, nat) => Const::Ref(RefKind::InterfaceMethod, self.member_from(c, nat)?),
            Raw::MethodHandle(kind, target) => {
                let kind = HandleKind::from_u8(kind).ok_or(ParseError("Invalid method handle kind"))?;
                let (ref_kind, member) = self.member(target)?;
                Const::MethodHandle(MethodHandle { kind, ref_kind, member })
            }
            Raw::Dynamic(bs, nat) => Const::Dynamic(bs, self.nat(nat)?),
            Raw::InvokeDynamic(bs, nat) => Const::InvokeDynamic(bs, self.nat(nat)?),
            Raw::Null | Raw::Module(_) | Raw::Package(_) => {
                let tag = raw.tag();
                self.warn(DecodeWarning::UnknownConstant { index: ind, tag });
                Const::Unknown(tag)
            }
        };

        self.cache.insert(ind, c.clone());
        Ok(c)
    }

    pub(super) fn utf(&mut self, ind: u16) -> Result<String, ParseError> {
        match self.cp.get(ind) {
            Some(cpool::Const::Utf8(_)) => match self.constant(ind)? {
                Const::Utf8(s) => Ok(s),
                _ => ParseError::s("Expected Utf8 constant"),
            },
            _ => ParseError::s("Expected Utf8 constant"),
        }
    }

    pub(super) fn opt_utf(&mut self, ind: u16) -> Result<Option<String>, ParseError> {
        if ind == 0 {
            Ok(None)
        } else {
            self.utf(ind).map(Some)
        }
    }

    pub(super) fn cls(&mut self, ind: u16) -> Result<String, ParseError> {
        match self.cp.get(ind) {
            Some(cpool::Const::Class(utf)) => self.utf(*utf),
            _ => ParseError::s("Expected Class constant"),
        }
    }

    pub(super) fn opt_cls(&mut self, ind: u16) -> Result<Option<String>, ParseError> {
        if ind == 0 {
            Ok(None)
        } else {
            self.cls(ind).map(Some)
        }
    }

    pub(super) fn nat(&mut self, ind: u16) -> Result<NameAndType, ParseError> {
        match self.cp.get(ind) {
            Some(cpool::Const::NameAndType(..)) => match self.constant(ind)? {
                Const::NameAndType(nat) => Ok(nat),
                _ => ParseError::s("Expected NameAndType constant"),
            },
            _ => ParseError::s("Expected NameAndType constant"),
        }
    }

    fn member_from(&mut self, cls: u16, nat: u16) -> Result<MemberRef, ParseError> {
        Ok(MemberRef {
            class: self.cls(cls)?,
            nat: self.nat(nat)?,
        })
    }

    pub(super) fn member(&mut self, ind: u16) -> Result<(RefKind, MemberRef), ParseError> {
        match self.constant(ind)? {
            Const::Ref(kind, m) => Ok((kind, m)),
            _ => ParseError::s("Expected field or method reference"),
        }
    }

    pub(super) fn handle(&mut self, ind: u16) -> Result<MethodHandle, ParseError> {
        match self.constant(ind)? {
            Const::MethodHandle(mh) => Ok(mh),
            _ => ParseError::s("Expected MethodHandle constant"),
        }
    }
}
