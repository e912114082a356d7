//! Bytecode and the attributes nested in Code. Offsets of every label are
//! computed in a first pass over the items; the second pass emits bytes.
use std::collections::HashMap;

use super::error::EncodeErrorKind;
use super::error::Result;
use super::writer::BufWriter;
use super::Encoder;
use crate::lib::ast;
use crate::lib::ast::CodeAttribute;
use crate::lib::ast::Const;
use crate::lib::ast::Frame;
use crate::lib::ast::Instruction;
use crate::lib::ast::Label;
use crate::lib::ast::RefKind;
use crate::lib::ast::VType;
use crate::lib::ast::WideInstruction;
use crate::lib::opcodes;
use crate::lib::opcodes::Shape;

type Labels<'c> = HashMap<&'c Label, u32>;

fn switch_padding(pos: u32) -> u32 {
    3 - pos % 4
}

/// Byte length of an instruction starting at `pos`.
fn instr_len(ins: &Instruction, pos: u32) -> u32 {
    use Instruction::*;
    match ins {
        Simple(_) => 1,
        Push(op, _) => {
            if op.0 == opcodes::BIPUSH {
                2
            } else {
                3
            }
        }
        Local(..) | NewArray(_) => 2,
        Ldc(op, _) => {
            if op.0 == opcodes::LDC {
                2
            } else {
                3
            }
        }
        Member(..) | Class(..) | Iinc { .. } => 3,
        Jump(op, _) => {
            if opcodes::is_wide_jump(op.0) {
                5
            } else {
                3
            }
        }
        TableSwitch { targets, .. } => 1 + switch_padding(pos) + 12 + 4 * targets.len() as u32,
        LookupSwitch { pairs, .. } => 1 + switch_padding(pos) + 8 + 8 * pairs.len() as u32,
        MultiANewArray { .. } => 4,
        InvokeInterface { .. } | InvokeDynamic { .. } => 5,
        Wide(WideInstruction::Local(..)) => 4,
        Wide(WideInstruction::Iinc { .. }) => 6,
    }
}

/// Rejects instructions whose variant does not fit their opcode.
fn check_shape(ins: &Instruction) -> std::result::Result<(), EncodeErrorKind> {
    use Instruction::*;
    let op = ins.opcode();
    let shape = opcodes::shape(op.0).ok_or(EncodeErrorKind::UnknownOpcode(op.0))?;
    let ok = match ins {
        Simple(_) => shape == Shape::Simple,
        Push(..) => shape == Shape::Push,
        Local(..) => shape == Shape::Local,
        Member(_, kind, _) => match shape {
            Shape::Member(RefKind::Field) => *kind == RefKind::Field,
            // invokespecial and invokestatic may name interface methods
            Shape::Member(_) => *kind != RefKind::Field,
            _ => false,
        },
        Ldc(_, c) => shape == Shape::Ldc && (op.0 == opcodes::LDC2_W) == c.is_wide(),
        Class(..) => shape == Shape::Class,
        Jump(..) => shape == Shape::Jump,
        Wide(WideInstruction::Local(op2, _)) => opcodes::is_wide_local(op2.0),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(EncodeErrorKind::WrongShape(op))
    }
}

impl Encoder {
    fn offset(&self, labels: &Labels, l: &Label) -> Result<u32> {
        match labels.get(l) {
            Some(pos) => Ok(*pos),
            None => self.err(EncodeErrorKind::UndefinedLabel(l.clone())),
        }
    }

    /// Label offsets never exceed the maximum code length, so they fit in 16 bits.
    fn offset16(&self, labels: &Labels, l: &Label) -> Result<u16> {
        Ok(self.offset(labels, l)? as u16)
    }

    fn jump_offset(&self, labels: &Labels, l: &Label, pos: u32) -> Result<i32> {
        Ok(self.offset(labels, l)? as i32 - pos as i32)
    }

    fn overflow<T>(&self, msg: String) -> Result<T> {
        self.err(EncodeErrorKind::Overflow(msg))
    }

    fn instruction(&mut self, w: &mut BufWriter, ins: &Instruction, pos: u32, labels: &Labels) -> Result<()> {
        use Instruction::*;
        w.u8(ins.opcode().0);
        match ins {
            Simple(_) => {}
            Push(op, v) => {
                if op.0 == opcodes::BIPUSH {
                    match i8::try_from(*v) {
                        Ok(v) => w.i8(v),
                        Err(_) => return self.overflow(format!("bipush operand {} out of range", v)),
                    }
                } else {
                    match i16::try_from(*v) {
                        Ok(v) => w.i16(v),
                        Err(_) => return self.overflow(format!("sipush operand {} out of range", v)),
                    }
                }
            }
            Local(op, ind) => match u8::try_from(*ind) {
                Ok(ind) => w.u8(ind),
                Err(_) => return self.overflow(format!("{} slot {} requires the wide prefix", op, ind)),
            },
            Member(_, kind, m) => {
                let ind = self.member(*kind, m)?;
                w.u16(ind);
            }
            Ldc(op, c) => {
                let ind = self.constant(c)?;
                if op.0 == opcodes::LDC {
                    match u8::try_from(ind) {
                        Ok(ind) => w.u8(ind),
                        Err(_) => {
                            return self.overflow(format!(
                                "ldc constant index {} exceeds 255, use ldc_w instead",
                                ind
                            ))
                        }
                    }
                } else {
                    w.u16(ind);
                }
            }
            Class(_, name) => {
                let ind = self.class(name)?;
                w.u16(ind);
            }
            Jump(op, target) => {
                let delta = self.jump_offset(labels, target, pos)?;
                if opcodes::is_wide_jump(op.0) {
                    w.i32(delta);
                } else {
                    match i16::try_from(delta) {
                        Ok(delta) => w.i16(delta),
                        Err(_) => {
                            return self.err(EncodeErrorKind::BranchOverflow { delta: delta.into() });
                        }
                    }
                }
            }
            Iinc { index, delta } => {
                let index = match u8::try_from(*index) {
                    Ok(index) => index,
                    Err(_) => return self.overflow(format!("iinc slot {} requires the wide prefix", index)),
                };
                let delta = i8::try_from(*delta).or_else(|_| self.err(EncodeErrorKind::IincRange(*delta)))?;
                w.u8(index);
                w.i8(delta);
            }
            TableSwitch { low, targets, default } => {
                if targets.is_empty() {
                    return self.err(EncodeErrorKind::EmptyTableSwitch);
                }
                let high = match i32::try_from(*low as i64 + targets.len() as i64 - 1) {
                    Ok(high) => high,
                    Err(_) => return self.overflow("tableswitch high value out of range".to_owned()),
                };
                w.write(&[0; 3][..switch_padding(pos) as usize]);
                w.i32(self.jump_offset(labels, default, pos)?);
                w.i32(*low);
                w.i32(high);
                for target in targets {
                    w.i32(self.jump_offset(labels, target, pos)?);
                }
            }
            LookupSwitch { pairs, default } => {
                let mut sorted: Vec<_> = pairs.iter().collect();
                sorted.sort_by_key(|p| p.0);
                if let Some(dup) = sorted.windows(2).find(|p| p[0].0 == p[1].0) {
                    return self.err(EncodeErrorKind::DuplicateLookupKey(dup[0].0));
                }

                w.write(&[0; 3][..switch_padding(pos) as usize]);
                w.i32(self.jump_offset(labels, default, pos)?);
                // bounded by the code length check
                w.u32(sorted.len() as u32);
                for (key, target) in sorted {
                    w.i32(*key);
                    w.i32(self.jump_offset(labels, target, pos)?);
                }
            }
            MultiANewArray { class, dims } => {
                let ind = self.class(class)?;
                w.u16(ind);
                w.u8(*dims);
            }
            NewArray(t) => w.u8(*t as u8),
            InvokeInterface { method, count } => {
                let ind = self.member(RefKind::InterfaceMethod, method)?;
                w.u16(ind);
                w.u8(*count);
                w.u8(0);
            }
            InvokeDynamic { bootstrap, nat } => {
                let ind = self.constant(&Const::InvokeDynamic(*bootstrap, nat.clone()))?;
                w.u16(ind);
                w.u16(0);
            }
            Wide(WideInstruction::Local(op, ind)) => {
                w.u8(op.0);
                w.u16(*ind);
            }
            Wide(WideInstruction::Iinc { index, delta }) => {
                let delta = i16::try_from(*delta).or_else(|_| self.err(EncodeErrorKind::IincRange(*delta)))?;
                w.u8(opcodes::IINC);
                w.u16(*index);
                w.i16(delta);
            }
        }
        Ok(())
    }

    ///////////////////////////////////////////////////////////////////////////
    fn vtype(&mut self, w: &mut BufWriter, vt: &VType, labels: &Labels) -> Result<()> {
        match vt {
            VType::Top => w.u8(0),
            VType::Integer => w.u8(1),
            VType::Float => w.u8(2),
            VType::Double => w.u8(3),
            VType::Long => w.u8(4),
            VType::Null => w.u8(5),
            VType::UninitializedThis => w.u8(6),
            VType::Object(cls) => {
                let ind = self.class(cls)?;
                w.u8(7);
                w.u16(ind);
            }
            VType::Uninitialized(l) => {
                let pos = self.offset16(labels, l)?;
                w.u8(8);
                w.u16(pos);
            }
        }
        Ok(())
    }

    fn vtypes(&mut self, w: &mut BufWriter, vts: &[VType], labels: &Labels) -> Result<()> {
        for vt in vts {
            self.vtype(w, vt, labels)?;
        }
        Ok(())
    }

    fn stack_map(&mut self, w: &mut BufWriter, frames: &[ast::StackMapFrame], labels: &Labels) -> Result<()> {
        w.u16(self.count16(frames.len(), "stack map frames")?);
        let mut prev = None;
        for f in frames {
            let pos = self.offset(labels, &f.label)?;
            let delta = match prev {
                None => pos as i64,
                Some(prev) => pos as i64 - prev as i64 - 1,
            };
            if delta < 0 {
                return self.overflow(format!("stack map frame at {} must come after the previous frame", f.label));
            }
            let delta = delta as u16;
            prev = Some(pos);

            match &f.frame {
                Frame::Same => {
                    if delta < 64 {
                        w.u8(delta as u8);
                    } else {
                        w.u8(251);
                        w.u16(delta);
                    }
                }
                Frame::SameLocals1Stack(vt) => {
                    if delta < 64 {
                        w.u8(64 + delta as u8);
                    } else {
                        w.u8(247);
                        w.u16(delta);
                    }
                    self.vtype(w, vt, labels)?;
                }
                Frame::Chop(n) => {
                    if !(1..=3).contains(n) {
                        return self.overflow(format!("chop frame removes {} locals, must be 1 to 3", n));
                    }
                    w.u8(251 - n);
                    w.u16(delta);
                }
                Frame::Append(vts) => {
                    if !(1..=3).contains(&vts.len()) {
                        return self.overflow(format!("append frame adds {} locals, must be 1 to 3", vts.len()));
                    }
                    w.u8(251 + vts.len() as u8);
                    w.u16(delta);
                    self.vtypes(w, vts, labels)?;
                }
                Frame::Full { locals, stack } => {
                    w.u8(255);
                    w.u16(delta);
                    w.u16(self.count16(locals.len(), "frame locals")?);
                    self.vtypes(w, locals, labels)?;
                    w.u16(self.count16(stack.len(), "frame stack entries")?);
                    self.vtypes(w, stack, labels)?;
                }
            }
        }
        Ok(())
    }

    fn local_vars(&mut self, w: &mut BufWriter, vars: &[ast::LocalVariable], labels: &Labels) -> Result<()> {
        w.u16(self.count16(vars.len(), "local variables")?);
        for lv in vars {
            let start = self.offset16(labels, &lv.start)?;
            let end = self.offset16(labels, &lv.end)?;
            if end < start {
                return self.overflow(format!("local variable {} ends before it starts", lv.name));
            }
            let name = self.utf8(&lv.name)?;
            let desc = self.utf8(&lv.desc)?;
            w.u16(start);
            w.u16(end - start);
            w.u16(name);
            w.u16(desc);
            w.u16(lv.index);
        }
        Ok(())
    }

    fn code_attr(&mut self, w: &mut BufWriter, a: &CodeAttribute, labels: &Labels) -> Result<()> {
        match a {
            CodeAttribute::LineNumberTable(lines) => self.attr(w, "LineNumberTable", |e, w| {
                w.u16(e.count16(lines.len(), "line numbers")?);
                for line in lines {
                    w.u16(e.offset16(labels, &line.start)?);
                    w.u16(line.line);
                }
                Ok(())
            }),
            CodeAttribute::LocalVariableTable(vars) => {
                self.attr(w, "LocalVariableTable", |e, w| e.local_vars(w, vars, labels))
            }
            CodeAttribute::LocalVariableTypeTable(vars) => {
                self.attr(w, "LocalVariableTypeTable", |e, w| e.local_vars(w, vars, labels))
            }
            CodeAttribute::StackMapTable(frames) => self.attr(w, "StackMapTable", |e, w| e.stack_map(w, frames, labels)),
            CodeAttribute::Raw(raw) => self.raw_attr(w, raw),
        }
    }

    /// Body of a Code attribute.
    pub(super) fn code(&mut self, w: &mut BufWriter, code: &ast::Code) -> Result<()> {
        let mut labels = Labels::new();
        let mut pos = 0u32;
        for (i, item) in code.items.iter().enumerate() {
            self.ctx.item = Some(i);
            self.ctx.offset = Some(pos);
            if let Some(l) = &item.label {
                if labels.insert(l, pos).is_some() {
                    return self.err(EncodeErrorKind::DuplicateLabel(l.clone()));
                }
            }
            if let Some(ins) = &item.instr {
                check_shape(ins).map_err(|kind| self.ctx.error(kind))?;
                let end = pos as usize + instr_len(ins, pos) as usize;
                if end > u16::MAX as usize {
                    return self.err(EncodeErrorKind::CodeTooLong(end));
                }
                pos = end as u32;
            }
        }

        let mut bytecode = BufWriter::default();
        for (i, item) in code.items.iter().enumerate() {
            if let Some(ins) = &item.instr {
                let pos = bytecode.len() as u32;
                self.ctx.item = Some(i);
                self.ctx.offset = Some(pos);
                self.instruction(&mut bytecode, ins, pos, &labels)?;
            }
        }
        debug_assert_eq!(bytecode.len() as u32, pos);
        self.ctx.item = None;
        self.ctx.offset = None;

        w.u16(code.stack);
        w.u16(code.locals);
        w.u32(pos);
        w.extend(&bytecode);

        w.u16(self.count16(code.exceptions.len(), "exception handlers")?);
        for e in &code.exceptions {
            let start = self.offset16(&labels, &e.start)?;
            let end = self.offset16(&labels, &e.end)?;
            let handler = self.offset16(&labels, &e.handler)?;
            let catch_type = self.opt_class(e.catch_type.as_deref())?;
            w.u16(start);
            w.u16(end);
            w.u16(handler);
            w.u16(catch_type);
        }

        w.u16(self.count16(code.attrs.len(), "code attributes")?);
        for a in &code.attrs {
            self.code_attr(w, a, &labels)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::ast::Opcode;

    fn op(name: &str) -> Opcode {
        Opcode::from_name(name).unwrap()
    }

    #[test]
    fn test_switch_lengths() {
        let ins = Instruction::TableSwitch {
            low: 0,
            targets: vec![Label::at(0); 3],
            default: Label::at(0),
        };
        // opcode at 0, payload starts at 4
        assert_eq!(instr_len(&ins, 0), 1 + 3 + 12 + 12);
        assert_eq!(instr_len(&ins, 3), 1 + 0 + 12 + 12);
        assert_eq!(instr_len(&ins, 5), 1 + 2 + 12 + 12);

        let ins = Instruction::LookupSwitch {
            pairs: vec![(1, Label::at(0))],
            default: Label::at(0),
        };
        assert_eq!(instr_len(&ins, 2), 1 + 1 + 8 + 8);
    }

    #[test]
    fn test_check_shape() {
        assert_eq!(check_shape(&Instruction::Simple(op("iadd"))), Ok(()));
        assert_eq!(
            check_shape(&Instruction::Simple(op("iload"))),
            Err(EncodeErrorKind::WrongShape(op("iload")))
        );
        assert_eq!(
            check_shape(&Instruction::Jump(op("iload"), Label::at(0))),
            Err(EncodeErrorKind::WrongShape(op("iload")))
        );
        assert_eq!(
            check_shape(&Instruction::Simple(ast::Opcode(0xFE))),
            Err(EncodeErrorKind::UnknownOpcode(0xFE))
        );
        assert_eq!(
            check_shape(&Instruction::Ldc(op("ldc"), Const::Long(1))),
            Err(EncodeErrorKind::WrongShape(op("ldc")))
        );
        let m = ast::MemberRef::new("I", "f", "()V");
        assert_eq!(
            check_shape(&Instruction::Member(op("invokestatic"), RefKind::InterfaceMethod, m.clone())),
            Ok(())
        );
        assert!(check_shape(&Instruction::Member(op("getfield"), RefKind::Method, m)).is_err());
        assert!(check_shape(&Instruction::Wide(WideInstruction::Local(op("iadd"), 300))).is_err());
    }
}
