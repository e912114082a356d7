//! AST-to-bytes encoder. A fresh [`pool::PoolBuilder`] is created for every
//! class, primed with the `ldc` operands of all methods so that they land on
//! indices an 8 bit operand can reach, and then filled while the class
//! structures are serialized.
mod attrs;
mod code;
mod error;
mod pool;
mod writer;

use crate::lib::ast;
pub use error::EncodeContext;
pub use error::EncodeError;
pub use error::EncodeErrorKind;
use error::Result;
use error::WithContext;
use pool::PoolBuilder;
use writer::BufWriter;

/// Version written for classes that do not specify one.
pub const DEFAULT_VERSION: ast::Version = ast::Version { major: 49, minor: 0 };

struct Encoder {
    pool: PoolBuilder,
    ctx: EncodeContext,
}
impl Encoder {
    fn err<T>(&self, kind: EncodeErrorKind) -> Result<T> {
        Err(self.ctx.error(kind))
    }

    fn count16(&self, n: usize, what: &str) -> Result<u16> {
        u16::try_from(n).or_else(|_| {
            self.err(EncodeErrorKind::Overflow(format!(
                "too many {} ({}), maximum is 65535",
                what, n
            )))
        })
    }

    fn overflow_attr<T>(&self, name: &str) -> Result<T> {
        self.err(EncodeErrorKind::Overflow(format!("{} attribute is too large", name)))
    }

    fn utf8(&mut self, s: &str) -> Result<u16> {
        self.pool.utf8(s).ctx(&self.ctx)
    }

    fn class(&mut self, name: &str) -> Result<u16> {
        self.pool.class(name).ctx(&self.ctx)
    }

    fn opt_class(&mut self, name: Option<&str>) -> Result<u16> {
        self.pool.opt_class(name).ctx(&self.ctx)
    }

    fn member(&mut self, kind: ast::RefKind, m: &ast::MemberRef) -> Result<u16> {
        self.pool.member(kind, m).ctx(&self.ctx)
    }

    fn handle(&mut self, mh: &ast::MethodHandle) -> Result<u16> {
        self.pool.handle(mh).ctx(&self.ctx)
    }

    fn constant(&mut self, c: &ast::Const) -> Result<u16> {
        self.pool.constant(c).ctx(&self.ctx)
    }

    /// Writes an attribute header, the body produced by `f` and then patches
    /// in the body length.
    fn attr(
        &mut self,
        w: &mut BufWriter,
        name: &str,
        f: impl FnOnce(&mut Self, &mut BufWriter) -> Result<()>,
    ) -> Result<()> {
        let name_ind = self.utf8(name)?;
        w.u16(name_ind);
        let ph = w.ph32();
        f(self, w)?;
        let len = match u32::try_from(ph.distance(w)) {
            Ok(len) => len,
            Err(_) => return self.overflow_attr(name),
        };
        w.fill32(ph, len);
        Ok(())
    }

    ///////////////////////////////////////////////////////////////////////////
    fn prime(&mut self, class: &ast::Class) -> Result<()> {
        for m in class.methods() {
            self.ctx.method = Some((m.name.clone(), m.desc.clone()));
            for code in m.attrs.iter().filter_map(|a| match a {
                ast::Attribute::Code(c) => Some(c),
                _ => None,
            }) {
                for (i, item) in code.items.iter().enumerate() {
                    if let Some(ast::Instruction::Ldc(_, c)) = &item.instr {
                        self.ctx.item = Some(i);
                        self.constant(c)?;
                    }
                }
            }
        }
        self.ctx.method = None;
        self.ctx.item = None;
        Ok(())
    }

    fn bootstrap_methods(&mut self, w: &mut BufWriter, bsms: &[ast::BootstrapMethod]) -> Result<()> {
        w.u16(self.count16(bsms.len(), "bootstrap methods")?);
        for bsm in bsms {
            w.u16(self.handle(&bsm.handle)?);
            w.u16(self.count16(bsm.args.len(), "bootstrap arguments")?);
            for arg in &bsm.args {
                w.u16(self.constant(arg)?);
            }
        }
        Ok(())
    }

    fn field(&mut self, w: &mut BufWriter, f: &ast::Field) -> Result<()> {
        w.u16(f.flags.bits());
        w.u16(self.utf8(&f.name)?);
        w.u16(self.utf8(&f.desc)?);

        let count = f.attrs.len() + f.constant.is_some() as usize;
        w.u16(self.count16(count, "field attributes")?);
        if let Some(c) = &f.constant {
            self.attr(w, "ConstantValue", |e, w| {
                w.u16(e.constant(c)?);
                Ok(())
            })?;
        }
        for a in &f.attrs {
            self.attribute(w, a)?;
        }
        Ok(())
    }

    fn method(&mut self, w: &mut BufWriter, m: &ast::Method) -> Result<()> {
        self.ctx.method = Some((m.name.clone(), m.desc.clone()));
        w.u16(m.flags.bits());
        w.u16(self.utf8(&m.name)?);
        w.u16(self.utf8(&m.desc)?);
        w.u16(self.count16(m.attrs.len(), "method attributes")?);
        for a in &m.attrs {
            self.attribute(w, a)?;
        }
        self.ctx.method = None;
        Ok(())
    }
}

/// Serialize a class to class file bytes. Nothing is returned unless the
/// whole class encodes without error.
pub fn encode(class: &ast::Class) -> std::result::Result<Vec<u8>, EncodeError> {
    let mut e = Encoder {
        pool: PoolBuilder::new(class.bootstrap_methods.len()),
        ctx: EncodeContext {
            class: class.name.clone(),
            ..Default::default()
        },
    };
    e.prime(class)?;

    let this = e.class(&class.name)?;
    let super_ = e.opt_class(class.super_name.as_deref())?;
    let interfaces = class
        .interfaces
        .iter()
        .map(|name| e.class(name))
        .collect::<Result<Vec<_>>>()?;

    let mut bootstrap = BufWriter::default();
    e.bootstrap_methods(&mut bootstrap, &class.bootstrap_methods)?;

    let mut fields = BufWriter::default();
    let mut methods = BufWriter::default();
    let mut attrs = BufWriter::default();
    let (mut field_count, mut method_count, mut attr_count) = (0, 0, 0);
    for item in &class.items {
        match item {
            ast::ClassItem::Field(f) => {
                e.field(&mut fields, f)?;
                field_count += 1;
            }
            ast::ClassItem::Method(m) => {
                e.method(&mut methods, m)?;
                method_count += 1;
            }
            ast::ClassItem::Attribute(a) => {
                e.attribute(&mut attrs, a)?;
                attr_count += 1;
            }
        }
    }
    if !class.bootstrap_methods.is_empty() {
        e.attr(&mut attrs, "BootstrapMethods", |_, w| {
            w.extend(&bootstrap);
            Ok(())
        })?;
        attr_count += 1;
    }

    let version = class.version.unwrap_or(DEFAULT_VERSION);
    let mut w = BufWriter::default();
    w.u32(0xCAFEBABE);
    w.u16(version.minor);
    w.u16(version.major);
    e.pool.write(&mut w);
    w.u16(class.flags.bits());
    w.u16(this);
    w.u16(super_);
    w.u16(e.count16(interfaces.len(), "interfaces")?);
    for ind in interfaces {
        w.u16(ind);
    }
    w.u16(e.count16(field_count, "fields")?);
    w.extend(&fields);
    w.u16(e.count16(method_count, "methods")?);
    w.extend(&methods);
    w.u16(e.count16(attr_count, "class attributes")?);
    w.extend(&attrs);

    log::debug!(
        "encoded class {} with {} constant pool slots, {} bytes",
        class.name,
        e.pool.count(),
        w.len()
    );
    Ok(w.into_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::ast::Instruction;
    use crate::lib::ast::Label;
    use crate::lib::ast::Opcode;
    use crate::lib::classfile;
    use crate::lib::classfile::attrs::AttrBody;

    fn op(name: &str) -> Opcode {
        Opcode::from_name(name).unwrap()
    }

    fn class_with_code(items: Vec<ast::CodeItem>) -> ast::Class {
        ast::Class {
            version: Some(ast::Version { major: 52, minor: 0 }),
            flags: ast::ClassAccessFlags::PUBLIC,
            name: "T".into(),
            super_name: Some("java/lang/Object".into()),
            interfaces: vec![],
            items: vec![ast::ClassItem::Method(ast::Method {
                flags: ast::MethodAccessFlags::STATIC,
                name: "m".into(),
                desc: "()V".into(),
                attrs: vec![ast::Attribute::Code(ast::Code {
                    stack: 2,
                    locals: 2,
                    items,
                    exceptions: vec![],
                    attrs: vec![],
                })],
            })],
            bootstrap_methods: vec![],
        }
    }

    fn at(pos: u32, ins: Instruction) -> ast::CodeItem {
        ast::CodeItem::labeled(Label::at(pos), ins)
    }

    #[test]
    fn test_header() {
        let mut class = class_with_code(vec![at(0, Instruction::Simple(op("return")))]);
        class.version = None;
        let bytes = encode(&class).unwrap();
        assert_eq!(&bytes[..8], &[0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 49]);
    }

    #[test]
    fn test_errors_carry_context() {
        let class = class_with_code(vec![
            at(0, Instruction::Simple(op("nop"))),
            at(1, Instruction::Jump(op("goto"), Label::from("Lmissing"))),
        ]);
        let err = encode(&class).unwrap_err();
        assert_eq!(err.kind, EncodeErrorKind::UndefinedLabel(Label::from("Lmissing")));
        assert_eq!(err.context.method, Some(("m".into(), "()V".into())));
        assert_eq!((err.context.item, err.context.offset), (Some(1), Some(1)));
        assert_eq!(
            err.to_string(),
            "class T, method m()V, item 1 (offset 1): undefined label Lmissing"
        );

        let class = class_with_code(vec![at(0, Instruction::Iinc { index: 1, delta: 200 })]);
        assert_eq!(encode(&class).unwrap_err().kind, EncodeErrorKind::IincRange(200));

        let class = class_with_code(vec![at(
            0,
            Instruction::InvokeDynamic {
                bootstrap: 0,
                nat: ast::NameAndType::new("x", "()V"),
            },
        )]);
        assert_eq!(
            encode(&class).unwrap_err().kind,
            EncodeErrorKind::BootstrapIndex { index: 0, count: 0 }
        );

        let class = class_with_code(vec![at(0, Instruction::Push(op("bipush"), 128))]);
        assert!(matches!(encode(&class).unwrap_err().kind, EncodeErrorKind::Overflow(_)));

        let class = class_with_code(vec![at(0, Instruction::Local(op("iload"), 256))]);
        assert!(matches!(encode(&class).unwrap_err().kind, EncodeErrorKind::Overflow(_)));

        let class = class_with_code(vec![
            at(0, Instruction::Simple(op("nop"))),
            at(0, Instruction::Simple(op("nop"))),
        ]);
        assert_eq!(
            encode(&class).unwrap_err().kind,
            EncodeErrorKind::DuplicateLabel(Label::at(0))
        );

        let class = class_with_code(vec![at(
            0,
            Instruction::LookupSwitch {
                pairs: vec![(3, Label::at(0)), (3, Label::at(0))],
                default: Label::at(0),
            },
        )]);
        assert_eq!(encode(&class).unwrap_err().kind, EncodeErrorKind::DuplicateLookupKey(3));

        let class = class_with_code(vec![at(0, Instruction::Ldc(op("ldc"), ast::Const::Unknown(19)))]);
        assert_eq!(encode(&class).unwrap_err().kind, EncodeErrorKind::UnknownConstant(19));
    }

    #[test]
    fn test_branch_overflow() {
        let mut items = vec![at(0, Instruction::Jump(op("goto"), Label::from("Lend")))];
        for i in 0..40000 {
            items.push(at(3 + i, Instruction::Simple(op("nop"))));
        }
        items.push(ast::CodeItem {
            label: Some(Label::from("Lend")),
            instr: Some(Instruction::Simple(op("return"))),
        });
        let err = encode(&class_with_code(items)).unwrap_err();
        assert_eq!(err.kind, EncodeErrorKind::BranchOverflow { delta: 40003 });
        assert_eq!(err.context.offset, Some(0));
    }

    #[test]
    fn test_ldc_index_limit() {
        let mut items = Vec::new();
        // 200 ints followed by a string: every ldc operand gets a slot before anything else
        for i in 0..200 {
            items.push(at(i * 2, Instruction::Ldc(op("ldc"), ast::Const::Int(1000 + i as i32))));
        }
        items.push(at(400, Instruction::Ldc(op("ldc"), ast::Const::Str("s".into()))));
        assert!(encode(&class_with_code(items.clone())).is_ok());

        for i in 0..100 {
            items.push(at(
                402 + i * 2,
                Instruction::Ldc(op("ldc"), ast::Const::Float(i)),
            ));
        }
        let err = encode(&class_with_code(items)).unwrap_err();
        assert!(matches!(err.kind, EncodeErrorKind::Overflow(_)));
        assert!(err.to_string().contains("use ldc_w instead"));
    }

    #[test]
    fn test_code_size_errors() {
        let items = (0..65536).map(|i| at(i, Instruction::Simple(op("nop")))).collect();
        let err = encode(&class_with_code(items)).unwrap_err();
        assert_eq!(err.kind, EncodeErrorKind::CodeTooLong(65536));
        assert_eq!(err.context.item, Some(65535));

        let class = class_with_code(vec![at(
            0,
            Instruction::TableSwitch {
                low: 0,
                targets: vec![],
                default: Label::at(0),
            },
        )]);
        assert_eq!(encode(&class).unwrap_err().kind, EncodeErrorKind::EmptyTableSwitch);
    }

    #[test]
    fn test_too_many_constants() {
        let mut class = class_with_code(vec![at(0, Instruction::Simple(op("return")))]);
        for i in 0..33000 {
            class.items.push(ast::ClassItem::Field(ast::Field {
                flags: ast::FieldAccessFlags::STATIC | ast::FieldAccessFlags::FINAL,
                name: "f".into(),
                desc: "J".into(),
                constant: Some(ast::Const::Long(i)),
                attrs: vec![],
            }));
        }
        assert_eq!(encode(&class).unwrap_err().kind, EncodeErrorKind::TooManyConstants);
    }

    #[test]
    fn test_stack_map_extended_frames() {
        let mut items: Vec<_> = (0..140).map(|i| at(i, Instruction::Simple(op("nop")))).collect();
        items.push(at(140, Instruction::Simple(op("return"))));
        let frames = vec![
            ast::StackMapFrame {
                label: Label::at(65),
                frame: ast::Frame::Same,
            },
            ast::StackMapFrame {
                label: Label::at(135),
                frame: ast::Frame::SameLocals1Stack(ast::VType::Integer),
            },
            ast::StackMapFrame {
                label: Label::at(140),
                frame: ast::Frame::Same,
            },
        ];
        let mut class = class_with_code(items);
        if let ast::ClassItem::Method(m) = &mut class.items[0] {
            if let ast::Attribute::Code(code) = &mut m.attrs[0] {
                code.attrs.push(ast::CodeAttribute::StackMapTable(frames.clone()));
            }
        }
        let bytes = encode(&class).unwrap();

        let raw = classfile::parse(&bytes).unwrap();
        let code = match &raw.methods[0].attrs[0].body {
            AttrBody::Code(code) => code,
            body => panic!("expected Code, got {:?}", body),
        };
        let table = code.attrs.iter().find(|a| a.name_utf.0 == b"StackMapTable").unwrap();
        // deltas 65 and 69 need the extended forms, 4 fits the compact one
        assert_eq!(table.data, &[0, 3, 251, 0, 65, 247, 0, 69, 1, 4][..]);

        let decoded = crate::lib::decode_class(&bytes).unwrap().class;
        let code = decoded.methods().next().and_then(|m| m.code()).unwrap();
        assert!(code.attrs.contains(&ast::CodeAttribute::StackMapTable(frames)));
    }
}
