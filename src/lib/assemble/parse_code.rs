use super::class_parser::ClassParser;
use super::span::ParseError;
use super::span::Span;
use super::span::Spanned;
use super::tokenize::TokenType;
use super::tree;
use super::tree::Instr;
use crate::lib::ast;
use crate::lib::ast::Instruction;
use crate::lib::ast::Opcode;
use crate::lib::ast::RefKind;
use crate::lib::opcodes;
use crate::lib::opcodes::Shape;

#[derive(Default)]
struct BytecodeState<'a> {
    items: Vec<tree::CodeItem<'a>>,
    exceptions: Vec<ast::ExceptionHandler>,
    frames: Vec<ast::StackMapFrame>,
    /// Frames seen since the last label definition
    pending_frames: Vec<(Span<'a>, ast::Frame)>,
}

/// Argument slots taken by a method descriptor, plus one for the receiver.
fn interface_arg_count(desc: &str) -> usize {
    let desc = desc.as_bytes();
    let mut count = 1;
    let mut off = 1;
    while off < desc.len() {
        match desc[off] {
            b')' => break,
            b'[' => {
                while off < desc.len() && desc[off] == b'[' {
                    off += 1;
                }
                count += 1;
                if desc.get(off) == Some(&b'L') {
                    while off < desc.len() && desc[off] != b';' {
                        off += 1;
                    }
                }
            }
            b'D' | b'J' => count += 2,
            b'L' => {
                count += 1;
                while off < desc.len() && desc[off] != b';' {
                    off += 1;
                }
            }
            _ => count += 1,
        }
        off += 1;
    }
    count
}

impl<'a> ClassParser<'a> {
    fn parse_invokeinterface(&mut self) -> Result<Instruction, ParseError> {
        let (_, method) = self.member(&[RefKind::InterfaceMethod, RefKind::Method])?;

        let count = if self.has_type(TokenType::Newlines) {
            let span = self.peek()?.1;
            interface_arg_count(&method.nat.desc)
                .try_into()
                .map_err(|_| self.error1("Too many arguments for invokeinterface", span))?
        } else {
            self.u8()?
        };
        Ok(Instruction::InvokeInterface { method, count })
    }

    fn parse_tableswitch(&mut self) -> Result<Instruction, ParseError> {
        let low = self.i32()?;
        self.eol()?;

        let mut targets = Vec::new();
        let mut high = low as i64 - 1;
        while !self.tryv("default") {
            if high == i32::MAX as i64 {
                let span = self.peek()?.1;
                return self.err1("Overflow in tableswitch index", span);
            }
            high += 1;
            targets.push(self.lbl()?);
            self.eol()?;
        }
        self.val(":")?;
        let default = self.lbl()?;
        Ok(Instruction::TableSwitch { low, targets, default })
    }

    fn parse_lookupswitch(&mut self) -> Result<Instruction, ParseError> {
        self.eol()?;

        let mut pairs = Vec::new();
        while !self.tryv("default") {
            let key = self.i32()?;
            self.val(":")?;
            let target = self.lbl()?;
            self.eol()?;
            pairs.push((key, target));
        }
        self.val(":")?;
        let default = self.lbl()?;
        Ok(Instruction::LookupSwitch { pairs, default })
    }

    fn parse_wide(&mut self) -> Result<Instruction, ParseError> {
        let span = self.next()?.1;
        if span.0 == "iinc" {
            let index = self.u16()?;
            let delta = self.i32()?;
            return Ok(Instruction::Wide(ast::WideInstruction::Iinc { index, delta }));
        }
        match opcodes::lookup(span.0) {
            Some(op) if opcodes::is_wide_local(op) => {
                Ok(Instruction::Wide(ast::WideInstruction::Local(Opcode(op), self.u16()?)))
            }
            _ => self.err1("Unrecognized wide bytecode opcode", span),
        }
    }

    fn newarray_type(&mut self) -> Result<ast::ArrayType, ParseError> {
        let span = self.next()?.1;
        ast::ArrayType::from_name(span.0).ok_or_else(|| {
            self.error1(
                "Error, expected 'boolean', 'byte', 'char', 'double', 'float', 'int', 'long', or 'short'.",
                span,
            )
        })
    }

    fn parse_stack_directive(&mut self) -> Result<ast::Frame, ParseError> {
        use ast::Frame;
        let span = self.next()?.1;

        Ok(match span.0 {
            "same" | "same_extended" => Frame::Same,
            "stack_1" | "stack_1_extended" => Frame::SameLocals1Stack(self.parse_vtype()?),
            "chop" => {
                let amt = self.u8()?;
                if !(1..=3).contains(&amt) {
                    return self.err1("Chop amount must be between 1 and 3. Use a full frame to remove more items.", span);
                }
                Frame::Chop(amt)
            }
            "append" => {
                let mut vts = Vec::new();
                while vts.len() < 3 && self.has_type(TokenType::Word) {
                    vts.push(self.parse_vtype()?);
                }
                if vts.is_empty() {
                    return self.err1("Append frame must add between 1 and 3 items", span);
                }
                Frame::Append(vts)
            }
            "full" => {
                self.eol()?;
                self.val("locals")?;
                let locals = self.vtype_list()?;
                self.eol()?;
                self.val("stack")?;
                let stack = self.vtype_list()?;
                self.eol()?;
                self.val(".end")?;
                self.val("stack")?;
                Frame::Full { locals, stack }
            }
            _ => return self.err1("Expected same, stack_1, stack_1_extended, chop, same_extended, append, or full", span),
        })
    }

    fn vtype_list(&mut self) -> Result<Vec<ast::VType>, ParseError> {
        let mut vts = Vec::new();
        while self.has_type(TokenType::Word) {
            if vts.len() == u16::MAX as usize {
                let span = self.peek()?.1;
                return self.err1("Maximum number of verification types (65535) exceeded", span);
            }
            vts.push(self.parse_vtype()?);
        }
        Ok(vts)
    }

    fn parse_vtype(&mut self) -> Result<ast::VType, ParseError> {
        use ast::VType::*;
        let span = self.next()?.1;
        Ok(match span.0 {
            "Double" => Double,
            "Float" => Float,
            "Integer" => Integer,
            "Long" => Long,
            "Null" => Null,
            "Object" => Object(self.utf()?),
            "Top" => Top,
            "Uninitialized" => Uninitialized(self.lbl()?),
            "UninitializedThis" => UninitializedThis,
            _ => return self.err1("Expected 'Double', 'Float', 'Integer', 'Long', 'Null', 'Object', 'Top', 'Uninitialized', or 'UninitializedThis'", span),
        })
    }

    ///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

    fn parse_code_inner(&mut self, state: &mut BytecodeState<'a>) -> Result<(), ParseError> {
        self.labels.clear();

        loop {
            let tok = self.peek()?;
            match tok.0 {
                TokenType::LabelDef => {
                    self.next()?;
                    let name = tok.1 .0.trim_end_matches(':');
                    if !self.labels.insert(name) {
                        return self.err1("Duplicate label.", tok.1);
                    }
                    let label = ast::Label::from(name);
                    for (_, frame) in state.pending_frames.drain(..) {
                        state.frames.push(ast::StackMapFrame {
                            label: label.clone(),
                            frame,
                        });
                    }

                    let instr = if self.has_type(TokenType::Word) {
                        Some(self.parse_instr_line()?)
                    } else {
                        self.eol()?;
                        None
                    };
                    state.items.push(tree::CodeItem {
                        label: Some(label),
                        instr,
                    });
                }
                TokenType::Directive => {
                    if !self.parse_code_directive_line(state, tok.1)? {
                        break;
                    }
                }
                TokenType::Word => {
                    if let Some((span, _)) = state.pending_frames.first() {
                        return self.err1("Stack frame must be followed by a label definition", *span);
                    }
                    let instr = Some(self.parse_instr_line()?);
                    state.items.push(tree::CodeItem { label: None, instr });
                }
                _ => return self.err1("Expected bytecode instruction or directive.", tok.1),
            }
        }

        if let Some((span, _)) = state.pending_frames.first() {
            return self.err1("Stack frame must be followed by a label definition", *span);
        }
        Ok(())
    }

    fn parse_code_attr(
        &mut self,
        state: &mut BytecodeState<'a>,
        smt_span: &mut Option<Span<'a>>,
    ) -> Result<ast::CodeAttribute, ParseError> {
        use ast::CodeAttribute::*;
        let directive = self.next()?.1;
        Ok(match directive.0 {
            ".linenumbertable" => LineNumberTable(self.dotend_list("linenumbertable", |p| {
                let start = p.lbl()?;
                let line = p.u16()?;
                p.eol()?;
                Ok(ast::LineNumber { start, line })
            })?),
            ".localvariabletable" => {
                LocalVariableTable(self.dotend_list("localvariabletable", Self::local_var_table_item)?)
            }
            ".localvariabletypetable" => {
                LocalVariableTypeTable(self.dotend_list("localvariabletypetable", Self::local_var_table_item)?)
            }
            ".stackmaptable" => {
                if smt_span.is_some() {
                    return self.err1("StackMapTable attribute may only be used once per method", directive);
                }
                *smt_span = Some(directive);
                StackMapTable(std::mem::take(&mut state.frames))
            }
            ".attribute" => Raw(self.raw_attr_body()?),
            _ => return self.unsupported_directive(directive),
        })
    }

    fn local_var_table_item(&mut self) -> Result<ast::LocalVariable, ParseError> {
        let index = self.u16()?;
        self.val("is")?;
        let name = self.utf()?;
        let desc = self.utf()?;
        self.val("from")?;
        let start = self.lbl()?;
        self.val("to")?;
        let end = self.lbl()?;
        self.eol()?;
        Ok(ast::LocalVariable {
            start,
            end,
            index,
            name,
            desc,
        })
    }

    /// Body of a `.code` directive, up to and including `.end code`.
    pub fn parse_code(&mut self) -> Result<tree::Code<'a>, ParseError> {
        self.val("stack")?;
        let stack = self.u16()?;
        self.val("locals")?;
        let locals = self.u16()?;
        self.eol()?;

        let mut state = BytecodeState::default();
        self.parse_code_inner(&mut state)?;

        // Only accept code attributes after all bytecode and code directives
        let mut attrs = Vec::new();
        let mut smt_span = None;
        while !self.tryv(".end") {
            if attrs.len() == u16::MAX as usize {
                let span = self.peek()?.1;
                return self.err1("Maximum number of attributes (65535) exceeded", span);
            }
            attrs.push(self.parse_code_attr(&mut state, &mut smt_span)?);
            self.eol()?;
        }
        self.val("code")?;

        // Implicit StackMapTable attribute
        if !state.frames.is_empty() {
            attrs.push(ast::CodeAttribute::StackMapTable(state.frames));
        }
        self.labels.clear();

        Ok(tree::Code {
            stack,
            locals,
            items: state.items,
            exceptions: state.exceptions,
            attrs,
        })
    }

    fn parse_code_directive_line(&mut self, state: &mut BytecodeState<'a>, directive: Span<'a>) -> Result<bool, ParseError> {
        match directive.0 {
            ".catch" => {
                self.next()?;
                let catch_type = self.opt_cls()?;
                self.val("from")?;
                let start = self.lbl()?;
                self.val("to")?;
                let end = self.lbl()?;
                self.val("using")?;
                let handler = self.lbl()?;

                if state.exceptions.len() == u16::MAX as usize {
                    return self.err1("Maximum 65535 exception handlers per method", directive);
                }
                state.exceptions.push(ast::ExceptionHandler {
                    start,
                    end,
                    handler,
                    catch_type,
                });
            }
            ".stack" => {
                self.next()?;
                let frame = self.parse_stack_directive()?;
                state.pending_frames.push((directive, frame));
            }
            _ => return Ok(false),
        }
        self.eol()?;
        Ok(true)
    }

    fn parse_instr_line(&mut self) -> Result<Spanned<'a, Instr<'a>>, ParseError> {
        let span = self.next()?.1;
        let op = match opcodes::lookup(span.0) {
            Some(op) => op,
            None => return self.err1("Unrecognized bytecode opcode", span),
        };
        let opcode = Opcode(op);

        use Instruction::*;
        let instr = match opcodes::shape(op) {
            Some(Shape::Simple) | None => Simple(opcode),
            Some(Shape::Push) => Push(opcode, self.i32()?),
            Some(Shape::Local) => Local(opcode, self.u16()?),
            Some(Shape::Member(RefKind::Field)) => {
                let (kind, m) = self.member(&[RefKind::Field])?;
                Member(opcode, kind, m)
            }
            Some(Shape::Member(_)) => {
                let (kind, m) = self.member(&[RefKind::Method, RefKind::InterfaceMethod])?;
                Member(opcode, kind, m)
            }
            Some(Shape::Ldc) => {
                let rhs = self.ldc_rhs()?;
                self.eol()?;
                return Ok(span.of(Instr::Ldc(opcode, rhs)));
            }
            Some(Shape::Class) => Class(opcode, self.utf()?),
            Some(Shape::Jump) => Jump(opcode, self.lbl()?),
            Some(Shape::Iinc) => {
                let index = self.u16()?;
                let delta = self.i32()?;
                Iinc { index, delta }
            }
            Some(Shape::TableSwitch) => self.parse_tableswitch()?,
            Some(Shape::LookupSwitch) => self.parse_lookupswitch()?,
            Some(Shape::MultiANewArray) => {
                let class = self.utf()?;
                let dims = self.u8()?;
                MultiANewArray { class, dims }
            }
            Some(Shape::NewArray) => NewArray(self.newarray_type()?),
            Some(Shape::InvokeInterface) => self.parse_invokeinterface()?,
            Some(Shape::InvokeDynamic) => {
                let rhs = self.ref_or_tagged_const()?;
                self.eol()?;
                return Ok(span.of(Instr::InvokeDynamic(rhs)));
            }
            Some(Shape::Wide) => self.parse_wide()?,
        };

        self.eol()?;
        Ok(span.of(Instr::Plain(instr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::assemble::base_parser::BaseParser;
    use crate::lib::assemble::tokenize::tokenize;

    fn parse_code(source: &str) -> Result<tree::Code, ParseError> {
        let mut p = ClassParser::new(BaseParser::new(source, tokenize(source)?));
        p.parse_code()
    }

    #[test]
    fn test_interface_arg_count() {
        assert_eq!(interface_arg_count("()V"), 1);
        assert_eq!(interface_arg_count("(IJLjava/lang/String;[[D[Ljava/lang/Object;)V"), 7);
    }

    #[test]
    fn test_frames_attach_to_next_label() {
        let code = parse_code(
            "stack 1 locals 1
    .stack same
L0: iload 0
    ifeq L0
    .stack stack_1 Object java/lang/String
    .stack chop 1
L5:
    .stackmaptable
.end code
",
        )
        .unwrap();
        assert_eq!(code.items.len(), 3);
        match &code.attrs[..] {
            [ast::CodeAttribute::StackMapTable(frames)] => {
                let labels: Vec<_> = frames.iter().map(|f| f.label.0.as_str()).collect();
                assert_eq!(labels, vec!["L0", "L5", "L5"]);
                assert_eq!(frames[2].frame, ast::Frame::Chop(1));
            }
            other => panic!("unexpected attrs {:?}", other),
        }
    }

    #[test]
    fn test_code_errors() {
        let err = parse_code("stack 1 locals 1\n    .stack same\n    return\n.end code\n").unwrap_err();
        assert_eq!(err.msg, "Stack frame must be followed by a label definition");

        let err = parse_code("stack 1 locals 1\nL0: nop\nL0: return\n.end code\n").unwrap_err();
        assert_eq!(err.msg, "Duplicate label.");

        let err = parse_code("stack 1 locals 1\n    frobnicate\n.end code\n").unwrap_err();
        assert_eq!(err.msg, "Unrecognized bytecode opcode");

        let err = parse_code("stack 1 locals 1\n    return\n    .stackmaptable\n    .stackmaptable\n.end code\n")
            .unwrap_err();
        assert_eq!(err.line(), 4);
    }

    #[test]
    fn test_switches_and_wide() {
        let code = parse_code(
            "stack 1 locals 300
    tableswitch 5
        L0
        L0
        default : L0
    lookupswitch
        -1 : L0
        default : L0
    invokeinterface InterfaceMethod I f (JI)V
L0: wide iinc 300 -1000
.end code
",
        )
        .unwrap();
        let instrs: Vec<_> = code
            .items
            .iter()
            .filter_map(|item| match &item.instr.as_ref()?.v {
                Instr::Plain(i) => Some(i.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            instrs[0],
            Instruction::TableSwitch {
                low: 5,
                targets: vec![ast::Label::from("L0"), ast::Label::from("L0")],
                default: ast::Label::from("L0"),
            }
        );
        assert_eq!(
            instrs[1],
            Instruction::LookupSwitch {
                pairs: vec![(-1, ast::Label::from("L0"))],
                default: ast::Label::from("L0"),
            }
        );
        assert!(matches!(instrs[2], Instruction::InvokeInterface { count: 4, .. }));
        assert_eq!(
            instrs[3],
            Instruction::Wide(ast::WideInstruction::Iinc {
                index: 300,
                delta: -1000
            })
        );
    }
}
