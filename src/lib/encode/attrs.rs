use super::error::Result;
use super::writer::BufWriter;
use super::Encoder;
use crate::lib::ast;
use crate::lib::ast::Attribute;
use crate::lib::ast::Const;
use crate::lib::ast::ElementValue;

impl Encoder {
    pub(super) fn raw_attr(&mut self, w: &mut BufWriter, raw: &ast::RawAttribute) -> Result<()> {
        let name = self.utf8(&raw.name)?;
        let len = match u32::try_from(raw.data.len()) {
            Ok(len) => len,
            Err(_) => return self.overflow_attr(&raw.name),
        };
        w.u16(name);
        w.u32(len);
        w.write(&raw.data);
        Ok(())
    }

    fn annotation(&mut self, w: &mut BufWriter, a: &ast::Annotation) -> Result<()> {
        w.u16(self.utf8(&a.type_desc)?);
        w.u16(self.count16(a.elements.len(), "annotation elements")?);
        for (name, ev) in &a.elements {
            w.u16(self.utf8(name)?);
            self.element_value(w, ev)?;
        }
        Ok(())
    }

    fn annotations(&mut self, w: &mut BufWriter, annos: &[ast::Annotation]) -> Result<()> {
        w.u16(self.count16(annos.len(), "annotations")?);
        for a in annos {
            self.annotation(w, a)?;
        }
        Ok(())
    }

    fn element_value(&mut self, w: &mut BufWriter, ev: &ElementValue) -> Result<()> {
        use ElementValue::*;
        let (tag, c) = match ev {
            Byte(v) => (b'B', Const::Int(*v)),
            Char(v) => (b'C', Const::Int(*v)),
            Int(v) => (b'I', Const::Int(*v)),
            Short(v) => (b'S', Const::Int(*v)),
            Boolean(v) => (b'Z', Const::Int(*v)),
            Long(v) => (b'J', Const::Long(*v)),
            Float(v) => (b'F', Const::Float(*v)),
            Double(v) => (b'D', Const::Double(*v)),
            Str(s) => (b's', Const::Utf8(s.clone())),
            Class(s) => (b'c', Const::Utf8(s.clone())),
            Enum { type_desc, name } => {
                w.u8(b'e');
                w.u16(self.utf8(type_desc)?);
                w.u16(self.utf8(name)?);
                return Ok(());
            }
            Annotation(a) => {
                w.u8(b'@');
                return self.annotation(w, a);
            }
            Array(vals) => {
                w.u8(b'[');
                w.u16(self.count16(vals.len(), "array elements")?);
                for v in vals {
                    self.element_value(w, v)?;
                }
                return Ok(());
            }
        };
        w.u8(tag);
        w.u16(self.constant(&c)?);
        Ok(())
    }

    /// One attribute of a class, field or method.
    pub(super) fn attribute(&mut self, w: &mut BufWriter, a: &Attribute) -> Result<()> {
        match a {
            Attribute::Code(code) => self.attr(w, "Code", |e, w| e.code(w, code)),
            Attribute::Exceptions(classes) => self.attr(w, "Exceptions", |e, w| {
                w.u16(e.count16(classes.len(), "exceptions")?);
                for cls in classes {
                    w.u16(e.class(cls)?);
                }
                Ok(())
            }),
            Attribute::SourceFile(s) => self.attr(w, "SourceFile", |e, w| {
                w.u16(e.utf8(s)?);
                Ok(())
            }),
            Attribute::InnerClasses(lines) => self.attr(w, "InnerClasses", |e, w| {
                w.u16(e.count16(lines.len(), "inner classes")?);
                for line in lines {
                    w.u16(e.class(&line.inner)?);
                    w.u16(e.opt_class(line.outer.as_deref())?);
                    let name = match &line.name {
                        Some(name) => e.utf8(name)?,
                        None => 0,
                    };
                    w.u16(name);
                    w.u16(line.flags.bits());
                }
                Ok(())
            }),
            Attribute::Signature(s) => self.attr(w, "Signature", |e, w| {
                w.u16(e.utf8(s)?);
                Ok(())
            }),
            Attribute::Deprecated => self.attr(w, "Deprecated", |_, _| Ok(())),
            Attribute::Synthetic => self.attr(w, "Synthetic", |_, _| Ok(())),
            Attribute::Annotations { visible, annotations } => {
                let name = if *visible {
                    "RuntimeVisibleAnnotations"
                } else {
                    "RuntimeInvisibleAnnotations"
                };
                self.attr(w, name, |e, w| e.annotations(w, annotations))
            }
            Attribute::ParameterAnnotations { visible, params } => {
                let name = if *visible {
                    "RuntimeVisibleParameterAnnotations"
                } else {
                    "RuntimeInvisibleParameterAnnotations"
                };
                self.attr(w, name, |e, w| {
                    match u8::try_from(params.len()) {
                        Ok(n) => w.u8(n),
                        Err(_) => return e.overflow_attr(name),
                    }
                    for annos in params {
                        e.annotations(w, annos)?;
                    }
                    Ok(())
                })
            }
            Attribute::AnnotationDefault(ev) => self.attr(w, "AnnotationDefault", |e, w| e.element_value(w, ev)),
            Attribute::Raw(raw) => self.raw_attr(w, raw),
        }
    }
}
