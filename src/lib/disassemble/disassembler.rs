use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt::Result;
use std::fmt::Write;

use super::flags::Flags;
use super::refprinter;
use super::refprinter::RefPrinter;
use super::string::escape;
use super::string::escape_byte_string;
use crate::lib::ast;
use crate::lib::ast::CodeAttribute;
use crate::lib::ast::Instruction;
use crate::lib::ast::Label;
use crate::lib::ast::RefKind;

static INDENT_BUF: &str = "                                        ";
const ERROR: &str = "Internal error: Please report this!";

fn opt_cls(s: &Option<String>) -> String {
    match s {
        Some(s) => escape(s).into_owned(),
        None => "[0]".to_owned(),
    }
}

struct Disassembler<W: Write> {
    w: W,
    rp: RefPrinter,
    indentlevel: usize,
    sol: &'static str,
}
impl<W: Write> Disassembler<W> {
    fn new(w: W) -> Self {
        Self {
            w,
            rp: RefPrinter::new(),
            indentlevel: 0,
            sol: "",
        }
    }

    fn enter_block(&mut self) {
        self.indentlevel += 1;
        self.sol = &INDENT_BUF[0..std::cmp::min(self.indentlevel * 4, INDENT_BUF.len())];
    }

    fn exit_block(&mut self) {
        self.indentlevel = self.indentlevel.saturating_sub(1);
        self.sol = &INDENT_BUF[0..std::cmp::min(self.indentlevel * 4, INDENT_BUF.len())];
    }

    fn field(&mut self, f: &ast::Field) -> Result {
        write!(self.w, ".field{} {} {}", Flags::field(f.flags), escape(&f.name), escape(&f.desc))?;
        if let Some(c) = &f.constant {
            write!(self.w, " = {}", self.rp.ldc(c))?;
        }

        if !f.attrs.is_empty() {
            writeln!(self.w, " .fieldattributes")?;
            self.enter_block();
            for a in &f.attrs {
                self.attr(a)?;
            }
            self.exit_block();
            writeln!(self.w, ".end fieldattributes")?;
        } else {
            writeln!(self.w)?;
        }
        Ok(())
    }

    fn method(&mut self, m: &ast::Method) -> Result {
        writeln!(self.w, "\n.method{} {} : {}", Flags::method(m.flags), escape(&m.name), escape(&m.desc))?;
        self.enter_block();

        for a in &m.attrs {
            self.attr(a)?;
        }

        self.exit_block();
        writeln!(self.w, ".end method")
    }

    fn attr(&mut self, a: &ast::Attribute) -> Result {
        write!(self.w, "{}", self.sol)?;

        use ast::Attribute::*;
        match a {
            AnnotationDefault(ev) => {
                write!(self.w, ".annotationdefault ")?;
                self.element_value(ev)?;
            }
            Code(code) => self.code(code)?,
            Deprecated => write!(self.w, ".deprecated")?,
            Exceptions(vals) => {
                write!(self.w, ".exceptions")?;
                for ex in vals {
                    write!(self.w, " {}", escape(ex))?;
                }
            }
            InnerClasses(lines) => {
                writeln!(self.w, ".innerclasses")?;
                self.enter_block();
                for ic in lines {
                    writeln!(
                        self.w,
                        "{}{} {} {}{}",
                        self.sol,
                        escape(&ic.inner),
                        opt_cls(&ic.outer),
                        opt_cls(&ic.name),
                        Flags::inner_class(ic.flags)
                    )?;
                }
                self.exit_block();
                write!(self.w, "{}.end innerclasses", self.sol)?;
            }
            Annotations { visible, annotations } => self.runtime_annotations(*visible, annotations)?,
            ParameterAnnotations { visible, params } => self.runtime_param_annotations(*visible, params)?,
            Signature(s) => write!(self.w, ".signature {}", escape(s))?,
            SourceFile(s) => write!(self.w, ".sourcefile {}", escape(s))?,
            Synthetic => write!(self.w, ".synthetic")?,
            Raw(raw) => self.raw_attr(raw)?,
        };

        writeln!(self.w)
    }

    fn raw_attr(&mut self, raw: &ast::RawAttribute) -> Result {
        write!(self.w, ".attribute {} {}", escape(&raw.name), escape_byte_string(&raw.data))
    }

    fn local_var_table(&mut self, lines: &[ast::LocalVariable]) -> Result {
        self.enter_block();
        for lv in lines {
            writeln!(
                self.w,
                "{}{} is {} {} from {} to {}",
                self.sol,
                lv.index,
                escape(&lv.name),
                escape(&lv.desc),
                lv.start,
                lv.end,
            )?;
        }
        self.exit_block();
        Ok(())
    }

    fn code_attr(&mut self, a: &CodeAttribute, frames_printed: &mut bool) -> Result {
        write!(self.w, "{}", self.sol)?;
        match a {
            CodeAttribute::LineNumberTable(lines) => {
                writeln!(self.w, ".linenumbertable")?;
                self.enter_block();
                for ln in lines {
                    writeln!(self.w, "{}{} {}", self.sol, ln.start, ln.line)?;
                }
                self.exit_block();
                write!(self.w, "{}.end linenumbertable", self.sol)?;
            }
            CodeAttribute::LocalVariableTable(lines) => {
                writeln!(self.w, ".localvariabletable")?;
                self.local_var_table(lines)?;
                write!(self.w, "{}.end localvariabletable", self.sol)?;
            }
            CodeAttribute::LocalVariableTypeTable(lines) => {
                writeln!(self.w, ".localvariabletypetable")?;
                self.local_var_table(lines)?;
                write!(self.w, "{}.end localvariabletypetable", self.sol)?;
            }
            // The frames themselves were printed inline with the code
            CodeAttribute::StackMapTable(_) => {
                if *frames_printed {
                    write!(self.w, "; duplicate StackMapTable omitted")?;
                } else {
                    write!(self.w, ".stackmaptable")?;
                    *frames_printed = true;
                }
            }
            CodeAttribute::Raw(raw) => self.raw_attr(raw)?,
        }
        writeln!(self.w)
    }

    fn vtype(&mut self, vt: &ast::VType) -> Result {
        use ast::VType::*;
        match vt {
            Top => write!(self.w, " Top"),
            Integer => write!(self.w, " Integer"),
            Float => write!(self.w, " Float"),
            Long => write!(self.w, " Long"),
            Double => write!(self.w, " Double"),
            Null => write!(self.w, " Null"),
            UninitializedThis => write!(self.w, " UninitializedThis"),
            Object(cls) => write!(self.w, " Object {}", escape(cls)),
            Uninitialized(label) => write!(self.w, " Uninitialized {}", label),
        }
    }

    fn frame(&mut self, f: &ast::Frame) -> Result {
        write!(self.w, "{}.stack ", self.sol)?;
        use ast::Frame::*;
        match f {
            Same => writeln!(self.w, "same")?,
            SameLocals1Stack(vt) => {
                write!(self.w, "stack_1")?;
                self.vtype(vt)?;
                writeln!(self.w)?;
            }
            Chop(cnt) => writeln!(self.w, "chop {}", cnt)?,
            Append(vts) => {
                write!(self.w, "append")?;
                for vt in vts {
                    self.vtype(vt)?;
                }
                writeln!(self.w)?;
            }
            Full { locals, stack } => {
                writeln!(self.w, "full")?;

                self.enter_block();
                write!(self.w, "{}locals", self.sol)?;
                for vt in locals {
                    self.vtype(vt)?;
                }
                writeln!(self.w)?;
                write!(self.w, "{}stack", self.sol)?;
                for vt in stack {
                    self.vtype(vt)?;
                }
                writeln!(self.w)?;
                self.exit_block();

                writeln!(self.w, "{}.end stack", self.sol)?;
            }
        }
        Ok(())
    }

    fn begin_item(&mut self, label: Option<&Label>, has_instr: bool) -> Result {
        match label {
            Some(label) if !has_instr => write!(self.w, "{}:", label),
            Some(label) => {
                let lhs = format!("{}:", label);
                let indent = self.sol.len();
                if lhs.len() < indent {
                    write!(self.w, "{:indent$}", lhs)
                } else {
                    write!(self.w, "{} ", lhs)
                }
            }
            None => write!(self.w, "{}", self.sol),
        }
    }

    fn instr(&mut self, ins: &Instruction) -> Result {
        use Instruction::*;
        match ins {
            Simple(op) => writeln!(self.w, "{}", op)?,
            Push(op, v) => writeln!(self.w, "{} {}", op, v)?,
            Local(op, ind) => writeln!(self.w, "{} {}", op, ind)?,
            Member(op, kind, m) => writeln!(self.w, "{} {}", op, refprinter::member(*kind, m))?,
            Ldc(op, c) => writeln!(self.w, "{} {}", op, self.rp.ldc(c))?,
            Class(op, cls) => writeln!(self.w, "{} {}", op, escape(cls))?,
            Jump(op, target) => writeln!(self.w, "{} {}", op, target)?,
            Iinc { index, delta } => writeln!(self.w, "iinc {} {}", index, delta)?,
            TableSwitch { low, targets, default } => {
                writeln!(self.w, "tableswitch {}", low)?;
                self.enter_block();
                for target in targets {
                    writeln!(self.w, "{}{}", self.sol, target)?;
                }
                writeln!(self.w, "{}default : {}", self.sol, default)?;
                self.exit_block();
            }
            LookupSwitch { pairs, default } => {
                writeln!(self.w, "lookupswitch")?;
                self.enter_block();
                for (key, target) in pairs {
                    writeln!(self.w, "{}{} : {}", self.sol, key, target)?;
                }
                writeln!(self.w, "{}default : {}", self.sol, default)?;
                self.exit_block();
            }
            MultiANewArray { class, dims } => writeln!(self.w, "multianewarray {} {}", escape(class), dims)?,
            NewArray(t) => writeln!(self.w, "newarray {}", t.name())?,
            InvokeInterface { method, count } => writeln!(
                self.w,
                "invokeinterface {} {}",
                refprinter::member(RefKind::InterfaceMethod, method),
                count
            )?,
            InvokeDynamic { bootstrap, nat } => {
                writeln!(self.w, "invokedynamic {}", self.rp.invoke_dynamic(*bootstrap, nat))?
            }
            Wide(ast::WideInstruction::Local(op, ind)) => writeln!(self.w, "wide {} {}", op, ind)?,
            Wide(ast::WideInstruction::Iinc { index, delta }) => writeln!(self.w, "wide iinc {} {}", index, delta)?,
        }
        Ok(())
    }

    fn code(&mut self, c: &ast::Code) -> Result {
        let mut frames: BTreeMap<&Label, Vec<&ast::Frame>> = BTreeMap::new();
        if let Some(smt) = c.attrs.iter().find_map(|a| match a {
            CodeAttribute::StackMapTable(smt) => Some(smt),
            _ => None,
        }) {
            for f in smt {
                frames.entry(&f.label).or_default().push(&f.frame);
            }
        }

        writeln!(self.w, ".code stack {} locals {}", c.stack, c.locals)?;
        self.enter_block();

        let defined: HashSet<&Label> = c.items.iter().filter_map(|item| item.label.as_ref()).collect();
        for label in frames.keys() {
            if !defined.contains(label) {
                writeln!(self.w, "{}; stack frame at undefined label {} omitted", self.sol, label)?;
            }
        }

        for (i, item) in c.items.iter().enumerate() {
            if let Some(fs) = item.label.as_ref().and_then(|l| frames.get(l)) {
                // Blank line before stack frames for readability, except at start of code
                if i > 0 {
                    writeln!(self.w)?;
                }
                for f in fs {
                    self.frame(f)?;
                }
            }

            self.begin_item(item.label.as_ref(), item.instr.is_some())?;
            match &item.instr {
                Some(ins) => self.instr(ins)?,
                None => writeln!(self.w)?,
            }
        }

        for e in &c.exceptions {
            writeln!(
                self.w,
                "{}.catch {} from {} to {} using {}",
                self.sol,
                opt_cls(&e.catch_type),
                e.start,
                e.end,
                e.handler,
            )?;
        }

        let mut frames_printed = false;
        for a in &c.attrs {
            self.code_attr(a, &mut frames_printed)?;
        }

        self.exit_block();
        write!(self.w, "{}.end code", self.sol)
    }

    fn runtime_annotations(&mut self, visible: bool, annos: &[ast::Annotation]) -> Result {
        writeln!(self.w, ".runtime {} annotations", visibility(visible))?;
        self.enter_block();
        for anno in annos {
            write!(self.w, "{}.annotation ", self.sol)?;
            self.annotation_contents(anno)?;
            writeln!(self.w, "{}.end annotation", self.sol)?;
        }
        self.exit_block();
        write!(self.w, "{}.end runtime", self.sol)
    }

    fn runtime_param_annotations(&mut self, visible: bool, params: &[Vec<ast::Annotation>]) -> Result {
        writeln!(self.w, ".runtime {} paramannotations", visibility(visible))?;
        self.enter_block();
        for param in params {
            writeln!(self.w, "{}.paramannotation", self.sol)?;
            self.enter_block();
            for anno in param {
                write!(self.w, "{}.annotation ", self.sol)?;
                self.annotation_contents(anno)?;
                writeln!(self.w, "{}.end annotation", self.sol)?;
            }
            self.exit_block();
            writeln!(self.w, "{}.end paramannotation", self.sol)?;
        }
        self.exit_block();
        write!(self.w, "{}.end runtime", self.sol)
    }

    fn element_value(&mut self, ev: &ast::ElementValue) -> Result {
        use ast::ElementValue::*;
        match ev {
            Annotation(anno) => {
                write!(self.w, "annotation ")?;
                self.annotation_contents(anno)?;
                write!(self.w, "{}.end annotation", self.sol)?;
            }
            Array(vals) => {
                writeln!(self.w, "array")?;
                self.enter_block();
                for val in vals {
                    write!(self.w, "{}", self.sol)?;
                    self.element_value(val)?;
                    writeln!(self.w)?;
                }
                self.exit_block();
                write!(self.w, "{}.end array", self.sol)?;
            }
            Enum { type_desc, name } => write!(self.w, "enum {} {}", escape(type_desc), escape(name))?,
            Class(s) => write!(self.w, "class {}", escape(s))?,
            Str(s) => write!(self.w, "string {}", escape(s))?,

            Byte(v) => write!(self.w, "byte {}", v)?,
            Boolean(v) => write!(self.w, "boolean {}", v)?,
            Char(v) => write!(self.w, "char {}", v)?,
            Short(v) => write!(self.w, "short {}", v)?,
            Int(v) => write!(self.w, "int {}", v)?,
            Float(v) => write!(self.w, "float {}", refprinter::float_lit(*v))?,
            Long(v) => write!(self.w, "long {}L", v)?,
            Double(v) => write!(self.w, "double {}", refprinter::double_lit(*v))?,
        }
        Ok(())
    }

    fn annotation_contents(&mut self, anno: &ast::Annotation) -> Result {
        writeln!(self.w, "{}", escape(&anno.type_desc))?;
        self.enter_block();
        for (name, val) in &anno.elements {
            write!(self.w, "{}{} = ", self.sol, escape(name))?;
            self.element_value(val)?;
            writeln!(self.w)?;
        }
        self.exit_block();
        Ok(())
    }

    fn class(&mut self, c: &ast::Class) -> Result {
        if let Some(v) = c.version {
            writeln!(self.w, ".version {} {}", v.major, v.minor)?;
        }
        writeln!(self.w, ".class{} {}", Flags::class(c.flags), escape(&c.name))?;
        if let Some(s) = &c.super_name {
            writeln!(self.w, ".super {}", escape(s))?;
        }
        for iface in &c.interfaces {
            writeln!(self.w, ".implements {}", escape(iface))?;
        }

        for item in &c.items {
            match item {
                ast::ClassItem::Field(f) => self.field(f)?,
                ast::ClassItem::Method(m) => self.method(m)?,
                ast::ClassItem::Attribute(a) => self.attr(a)?,
            }
        }

        // Written highest index first; the assembler numbers bootstrap
        // definitions in reverse order of appearance.
        if !c.bootstrap_methods.is_empty() {
            writeln!(self.w)?;
        }
        for (ind, bsm) in c.bootstrap_methods.iter().enumerate().rev() {
            write!(
                self.w,
                ".bootstrap {} = Bootstrap {}",
                refprinter::bs_ref(ind as u16),
                self.rp.handle(&bsm.handle)
            )?;
            for arg in &bsm.args {
                write!(self.w, " {}", self.rp.tagged(arg))?;
            }
            writeln!(self.w, " :")?;
        }
        self.rp.print_const_defs(&mut self.w)?;
        writeln!(self.w, ".end class")
    }
}

fn visibility(visible: bool) -> &'static str {
    if visible {
        "visible"
    } else {
        "invisible"
    }
}

/// Render a class in assembler syntax.
pub fn disassemble(c: &ast::Class) -> String {
    let mut d = Disassembler::new(String::with_capacity(4096));
    d.class(c).expect(ERROR);
    log::debug!("printed class {} ({} bytes)", c.name, d.w.len());
    d.w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::ast::*;
    use pretty_assertions::assert_eq;

    fn op(name: &str) -> Opcode {
        Opcode::from_name(name).unwrap()
    }

    fn simple_class(items: Vec<ClassItem>) -> Class {
        Class {
            version: Some(Version { major: 52, minor: 0 }),
            flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            name: "Foo".into(),
            super_name: Some("java/lang/Object".into()),
            interfaces: vec![],
            items,
            bootstrap_methods: vec![],
        }
    }

    #[test]
    fn test_header_and_field() {
        let mut class = simple_class(vec![ClassItem::Field(Field {
            flags: FieldAccessFlags::PRIVATE | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
            name: "X".into(),
            desc: "I".into(),
            constant: Some(Const::Int(42)),
            attrs: vec![],
        })]);
        class.interfaces.push("java/lang/Runnable".into());
        class.items.push(ClassItem::Attribute(Attribute::SourceFile("Foo.java".into())));

        let expected = "\
.version 52 0
.class public super Foo
.super java/lang/Object
.implements java/lang/Runnable
.field private static final X I = 42
.sourcefile \"Foo.java\"
.end class
";
        assert_eq!(disassemble(&class), expected);
    }

    #[test]
    fn test_code_layout() {
        let code = Code {
            stack: 2,
            locals: 2,
            items: vec![
                CodeItem::labeled(Label::at(0), Instruction::Local(op("iload"), 0)),
                CodeItem::labeled(Label::at(2), Instruction::Jump(op("ifeq"), Label::at(9))),
                CodeItem {
                    label: None,
                    instr: Some(Instruction::TableSwitch {
                        low: 0,
                        targets: vec![Label::at(9)],
                        default: Label::at(9),
                    }),
                },
                CodeItem::labeled(Label::at(9), Instruction::Simple(op("return"))),
                CodeItem {
                    label: Some(Label::at(10)),
                    instr: None,
                },
            ],
            exceptions: vec![ExceptionHandler {
                start: Label::at(0),
                end: Label::at(9),
                handler: Label::at(9),
                catch_type: None,
            }],
            attrs: vec![
                CodeAttribute::LineNumberTable(vec![LineNumber {
                    start: Label::at(0),
                    line: 3,
                }]),
                CodeAttribute::StackMapTable(vec![StackMapFrame {
                    label: Label::at(9),
                    frame: Frame::Same,
                }]),
            ],
        };
        let class = simple_class(vec![ClassItem::Method(Method {
            flags: MethodAccessFlags::STATIC,
            name: "f".into(),
            desc: "(I)V".into(),
            attrs: vec![Attribute::Code(code)],
        })]);

        let expected = "\
.version 52 0
.class public super Foo
.super java/lang/Object

.method static f : (I)V
    .code stack 2 locals 2
L0:     iload 0
L2:     ifeq L9
        tableswitch 0
            L9
            default : L9

        .stack same
L9:     return
L10:
        .catch [0] from L0 to L9 using L9
        .linenumbertable
            L0 3
        .end linenumbertable
        .stackmaptable
    .end code
.end method
.end class
";
        assert_eq!(disassemble(&class), expected);
    }

    #[test]
    fn test_bootstrap_defs_descending() {
        let handle = MethodHandle {
            kind: HandleKind::InvokeStatic,
            ref_kind: RefKind::Method,
            member: MemberRef::new("Boot", "bsm", "()V"),
        };
        let mut class = simple_class(vec![]);
        class.super_name = None;
        class.version = None;
        class.bootstrap_methods = vec![
            BootstrapMethod {
                handle: handle.clone(),
                args: vec![Const::Str("a".into())],
            },
            BootstrapMethod {
                handle,
                args: vec![Const::Int(1)],
            },
        ];

        let expected = "\
.class public super Foo

.bootstrap [bs:_1] = Bootstrap [_0] Int 1 :
.bootstrap [bs:_0] = Bootstrap [_0] String a :
.const [_0] = MethodHandle invokeStatic Method Boot bsm ()V
.end class
";
        assert_eq!(disassemble(&class), expected);
    }

    #[test]
    fn test_long_label_keeps_separator() {
        let code = Code {
            stack: 0,
            locals: 0,
            items: vec![CodeItem::labeled(Label::from("Lsomewhere"), Instruction::Simple(op("return")))],
            exceptions: vec![],
            attrs: vec![],
        };
        let mut d = Disassembler::new(String::new());
        d.enter_block();
        d.code(&code).unwrap();
        assert!(d.w.contains("Lsomewhere: return\n"));
    }
}
