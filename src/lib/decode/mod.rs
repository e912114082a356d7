//! Builds the AST from the raw class structure produced by [`crate::lib::classfile`].
mod code;
mod resolver;

use std::fmt;

use crate::lib::ast;
use crate::lib::classfile;
use crate::lib::classfile::attrs;
use crate::lib::classfile::attrs::AttrBody;
use crate::lib::classfile::ParseError;
use resolver::Resolver;

/// Recoverable oddities noticed while decoding. None of them stop the decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// A constant whose tag has no AST representation. It decodes as `Const::Unknown`.
    UnknownConstant { index: u16, tag: u8 },
    /// A Utf8 entry that is not valid modified UTF-8. Decoded lossily.
    InvalidUtf8 { index: u16 },
    /// Access flag bits that are not defined for the item were dropped.
    UnknownFlags { context: String, bits: u16 },
    /// An attribute kept as raw bytes. Any constant pool indices inside it are
    /// not renumbered when the class is encoded again.
    OpaqueAttribute { name: String },
}
impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use DecodeWarning::*;
        match self {
            UnknownConstant { index, tag } => write!(f, "constant pool entry {} has unsupported tag {}", index, tag),
            InvalidUtf8 { index } => write!(f, "constant pool entry {} is not valid modified UTF-8", index),
            UnknownFlags { context, bits } => write!(f, "dropped unknown access flags 0x{:04X} on {}", bits, context),
            OpaqueAttribute { name } => write!(f, "attribute {} kept as raw bytes", name),
        }
    }
}

#[derive(Debug)]
pub struct Decoded {
    pub class: ast::Class,
    pub warnings: Vec<DecodeWarning>,
}

macro_rules! decode_flags {
    ($res:expr, $t:ty, $bits:expr, $context:expr) => {{
        let bits: u16 = $bits;
        let flags = <$t>::from_bits_truncate(bits);
        if flags.bits() != bits {
            $res.warn(DecodeWarning::UnknownFlags {
                context: $context,
                bits: bits & !flags.bits(),
            });
        }
        flags
    }};
}

fn annotation(res: &mut Resolver, a: &attrs::Annotation) -> Result<ast::Annotation, ParseError> {
    Ok(ast::Annotation {
        type_desc: res.utf(a.0)?,
        elements: a
            .1
            .iter()
            .map(|(name, ev)| Ok((res.utf(*name)?, element_value(res, ev)?)))
            .collect::<Result<_, ParseError>>()?,
    })
}

fn annotations(res: &mut Resolver, annos: &[attrs::Annotation]) -> Result<Vec<ast::Annotation>, ParseError> {
    annos.iter().map(|a| annotation(res, a)).collect()
}

fn param_annotations(
    res: &mut Resolver,
    params: &[attrs::ParameterAnnotation],
) -> Result<Vec<Vec<ast::Annotation>>, ParseError> {
    params.iter().map(|p| annotations(res, &p.0)).collect()
}

fn element_value(res: &mut Resolver, ev: &attrs::ElementValue) -> Result<ast::ElementValue, ParseError> {
    use attrs::ElementValue as EV;
    use ast::ElementValue::*;

    let int = |res: &mut Resolver, ind: u16| match res.constant(ind)? {
        ast::Const::Int(v) => Ok(v),
        _ => ParseError::s("Annotation element requires an Integer constant"),
    };

    Ok(match ev {
        EV::Anno(a) => Annotation(annotation(res, a)?),
        EV::Array(vals) => Array(vals.iter().map(|v| element_value(res, v)).collect::<Result<_, _>>()?),
        EV::Enum(t, n) => Enum {
            type_desc: res.utf(*t)?,
            name: res.utf(*n)?,
        },
        EV::Class(ind) => Class(res.utf(*ind)?),
        EV::Str(ind) => Str(res.utf(*ind)?),
        EV::Byte(ind) => Byte(int(res, *ind)?),
        EV::Boolean(ind) => Boolean(int(res, *ind)?),
        EV::Char(ind) => Char(int(res, *ind)?),
        EV::Short(ind) => Short(int(res, *ind)?),
        EV::Int(ind) => Int(int(res, *ind)?),
        EV::Float(ind) => match res.constant(*ind)? {
            ast::Const::Float(v) => Float(v),
            _ => return ParseError::s("Annotation element requires a Float constant"),
        },
        EV::Long(ind) => match res.constant(*ind)? {
            ast::Const::Long(v) => Long(v),
            _ => return ParseError::s("Annotation element requires a Long constant"),
        },
        EV::Double(ind) => match res.constant(*ind)? {
            ast::Const::Double(v) => Double(v),
            _ => return ParseError::s("Annotation element requires a Double constant"),
        },
    })
}

fn raw_attr(res: &mut Resolver, a: &attrs::Attribute) -> Result<ast::Attribute, ParseError> {
    let name = res.utf(a.name)?;
    res.warn(DecodeWarning::OpaqueAttribute { name: name.clone() });
    Ok(ast::Attribute::Raw(ast::RawAttribute {
        name,
        data: a.data.to_vec(),
    }))
}

fn attribute(res: &mut Resolver, a: &attrs::Attribute) -> Result<ast::Attribute, ParseError> {
    use ast::Attribute::*;
    Ok(match &a.body {
        AttrBody::Code(c) => Code(code::code(res, c)?),
        AttrBody::Exceptions(vals) => Exceptions(vals.iter().map(|ind| res.cls(*ind)).collect::<Result<_, _>>()?),
        AttrBody::SourceFile(ind) => SourceFile(res.utf(*ind)?),
        AttrBody::Signature(ind) => Signature(res.utf(*ind)?),
        AttrBody::Deprecated => Deprecated,
        AttrBody::Synthetic => Synthetic,
        AttrBody::InnerClasses(lines) => InnerClasses(
            lines
                .iter()
                .map(|line| {
                    let inner = res.cls(line.inner)?;
                    let flags =
                        decode_flags!(res, ast::InnerClassAccessFlags, line.flags, format!("inner class {}", inner));
                    Ok(ast::InnerClass {
                        inner,
                        outer: res.opt_cls(line.outer)?,
                        name: res.opt_utf(line.name)?,
                        flags,
                    })
                })
                .collect::<Result<_, ParseError>>()?,
        ),
        AttrBody::RuntimeVisibleAnnotations(annos) => Annotations {
            visible: true,
            annotations: annotations(res, annos)?,
        },
        AttrBody::RuntimeInvisibleAnnotations(annos) => Annotations {
            visible: false,
            annotations: annotations(res, annos)?,
        },
        AttrBody::RuntimeVisibleParameterAnnotations(params) => ParameterAnnotations {
            visible: true,
            params: param_annotations(res, params)?,
        },
        AttrBody::RuntimeInvisibleParameterAnnotations(params) => ParameterAnnotations {
            visible: false,
            params: param_annotations(res, params)?,
        },
        AttrBody::AnnotationDefault(ev) => AnnotationDefault(element_value(res, ev)?),
        // Everything else is only meaningful in a position handled by the caller
        _ => raw_attr(res, a)?,
    })
}

fn field(res: &mut Resolver, f: &classfile::parse::Field) -> Result<ast::Field, ParseError> {
    let name = res.utf(f.name)?;
    let desc = res.utf(f.desc)?;
    let flags = decode_flags!(res, ast::FieldAccessFlags, f.access, format!("field {}", name));

    let mut constant = None;
    let mut attrs = Vec::with_capacity(f.attrs.len());
    for a in &f.attrs {
        match a.body {
            AttrBody::ConstantValue(ind) if constant.is_none() => constant = Some(res.constant(ind)?),
            _ => attrs.push(attribute(res, a)?),
        }
    }

    Ok(ast::Field {
        flags,
        name,
        desc,
        constant,
        attrs,
    })
}

fn method(res: &mut Resolver, m: &classfile::parse::Field) -> Result<ast::Method, ParseError> {
    let name = res.utf(m.name)?;
    let desc = res.utf(m.desc)?;
    let flags = decode_flags!(res, ast::MethodAccessFlags, m.access, format!("method {}{}", name, desc));
    log::debug!("decoding method {}{}", name, desc);

    let attrs = m.attrs.iter().map(|a| attribute(res, a)).collect::<Result<_, _>>()?;
    Ok(ast::Method {
        flags,
        name,
        desc,
        attrs,
    })
}

fn bootstrap_methods(
    res: &mut Resolver,
    bsms: &[attrs::BootstrapMethod],
) -> Result<Vec<ast::BootstrapMethod>, ParseError> {
    bsms.iter()
        .map(|bsm| {
            Ok(ast::BootstrapMethod {
                handle: res.handle(bsm.bsref)?,
                args: bsm.args.iter().map(|ind| res.constant(*ind)).collect::<Result<_, _>>()?,
            })
        })
        .collect()
}

/// Convert a raw class into the AST. Fails only when the raw structure refers
/// to constants of the wrong kind where a name or class is required.
pub fn decode(c: &classfile::parse::Class) -> Result<Decoded, ParseError> {
    let mut res = Resolver::new(&c.cp);

    let name = res.cls(c.this)?;
    let flags = decode_flags!(res, ast::ClassAccessFlags, c.access, format!("class {}", name));
    let super_name = res.opt_cls(c.super_)?;
    let interfaces = c.interfaces.iter().map(|ind| res.cls(*ind)).collect::<Result<_, _>>()?;

    let mut items = Vec::with_capacity(c.fields.len() + c.methods.len() + c.attrs.len());
    for f in &c.fields {
        items.push(ast::ClassItem::Field(field(&mut res, f)?));
    }
    for m in &c.methods {
        items.push(ast::ClassItem::Method(method(&mut res, m)?));
    }

    let mut bootstrap = None;
    for a in &c.attrs {
        match &a.body {
            AttrBody::BootstrapMethods(bsms) if bootstrap.is_none() => {
                bootstrap = Some(bootstrap_methods(&mut res, bsms)?);
            }
            _ => items.push(ast::ClassItem::Attribute(attribute(&mut res, a)?)),
        }
    }

    let class = ast::Class {
        version: Some(ast::Version {
            major: c.version.0,
            minor: c.version.1,
        }),
        flags,
        name,
        super_name,
        interfaces,
        items,
        bootstrap_methods: bootstrap.unwrap_or_default(),
    };
    log::debug!(
        "decoded class {} with {} items and {} warnings",
        class.name,
        class.items.len(),
        res.warnings.len()
    );

    Ok(Decoded {
        class,
        warnings: res.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn utf8(out: &mut Vec<u8>, s: &str) {
        out.push(1);
        out.extend((s.len() as u16).to_be_bytes());
        out.extend(s.as_bytes());
    }

    /// Class T with two constant fields, the second one pointing at a Module
    /// entry, and an attribute the decoder does not know.
    fn odd_class() -> Vec<u8> {
        let mut out = vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52, 0, 10];
        utf8(&mut out, "T"); // 1
        out.extend([7, 0, 1]); // 2
        utf8(&mut out, "Custom"); // 3
        out.extend([19, 0, 1]); // 4
        utf8(&mut out, "ConstantValue"); // 5
        utf8(&mut out, "x"); // 6
        utf8(&mut out, "I"); // 7
        out.extend([3, 0, 0, 0, 5]); // 8
        utf8(&mut out, "y"); // 9

        // public super, plus private which classes cannot have
        out.extend([0x00, 0x23, 0, 2, 0, 0, 0, 0]);
        out.extend([0, 2]);
        out.extend([0, 8, 0, 6, 0, 7, 0, 1, 0, 5, 0, 0, 0, 2, 0, 8]);
        out.extend([0, 8, 0, 9, 0, 7, 0, 1, 0, 5, 0, 0, 0, 2, 0, 4]);
        out.extend([0, 0]);
        out.extend([0, 1, 0, 3, 0, 0, 0, 3, 1, 2, 3]);
        out
    }

    #[test]
    fn test_warnings_do_not_stop_decoding() {
        let data = odd_class();
        let raw = classfile::parse(&data).unwrap();
        let Decoded { class, warnings } = decode(&raw).unwrap();

        assert_eq!(
            warnings,
            vec![
                DecodeWarning::UnknownFlags {
                    context: "class T".into(),
                    bits: 0x0002
                },
                DecodeWarning::UnknownConstant { index: 4, tag: 19 },
                DecodeWarning::OpaqueAttribute { name: "Custom".into() },
            ]
        );
        assert_eq!(class.version, Some(ast::Version { major: 52, minor: 0 }));
        assert_eq!(class.flags, ast::ClassAccessFlags::PUBLIC | ast::ClassAccessFlags::SUPER);
        assert_eq!(class.super_name, None);

        let constants: Vec<_> = class.fields().map(|f| f.constant.clone()).collect();
        assert_eq!(
            constants,
            vec![Some(ast::Const::Int(5)), Some(ast::Const::Unknown(19))]
        );
        let attrs: Vec<_> = class.attributes().cloned().collect();
        assert_eq!(
            attrs,
            vec![ast::Attribute::Raw(ast::RawAttribute {
                name: "Custom".into(),
                data: vec![1, 2, 3],
            })]
        );
    }

    #[test]
    fn test_wrong_constant_kind_is_an_error() {
        let mut data = odd_class();
        // this_class now points at the Utf8 entry instead of the Class entry
        let this = data.len() - 2 - 16 * 2 - 2 - 11 - 6;
        assert_eq!(&data[this..this + 2], &[0, 2]);
        data[this + 1] = 1;
        let raw = classfile::parse(&data).unwrap();
        assert!(decode(&raw).is_err());
    }
}
