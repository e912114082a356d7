use super::resolver::Resolver;
use super::DecodeWarning;
use crate::lib::ast;
use crate::lib::ast::Instruction;
use crate::lib::ast::Label;
use crate::lib::ast::Opcode;
use crate::lib::classfile::attrs::AttrBody;
use crate::lib::classfile::attrs::LocalVarLine;
use crate::lib::classfile::code;
use crate::lib::classfile::code::Operands;
use crate::lib::classfile::code::Pos;
use crate::lib::classfile::ParseError;
use crate::lib::opcodes;
use crate::lib::opcodes::Shape;

fn lbl(pos: Pos) -> Label {
    Label::at(pos.0)
}

fn instruction(res: &mut Resolver, ins: &code::Instr) -> Result<Instruction, ParseError> {
    let op = Opcode(ins.op);
    let shape = opcodes::shape(ins.op).ok_or(ParseError("Invalid opcode"))?;

    Ok(match (&ins.args, shape) {
        (Operands::None, _) => Instruction::Simple(op),
        (Operands::Push(v), _) => Instruction::Push(op, *v),
        (Operands::Local(ind), _) => Instruction::Local(op, *ind),
        (Operands::Cp(ind), Shape::Ldc) => Instruction::Ldc(op, res.constant(*ind)?),
        (Operands::Cp(ind), Shape::Member(_)) => {
            let (kind, member) = res.member(*ind)?;
            Instruction::Member(op, kind, member)
        }
        (Operands::Cp(ind), Shape::Class) => Instruction::Class(op, res.cls(*ind)?),
        (Operands::Cp(ind), Shape::InvokeDynamic) => match res.constant(*ind)? {
            ast::Const::InvokeDynamic(bootstrap, nat) => Instruction::InvokeDynamic { bootstrap, nat },
            _ => return ParseError::s("invokedynamic must reference an InvokeDynamic constant"),
        },
        (Operands::Cp(_), _) => return ParseError::s("Unexpected constant pool operand"),
        (Operands::Iinc(index, delta), _) => Instruction::Iinc {
            index: *index,
            delta: (*delta).into(),
        },
        (Operands::Jump(target), _) => Instruction::Jump(op, lbl(*target)),
        (Operands::TableSwitch(t), _) => Instruction::TableSwitch {
            low: t.low,
            targets: t.table.iter().copied().map(lbl).collect(),
            default: lbl(t.default),
        },
        (Operands::LookupSwitch(m), _) => Instruction::LookupSwitch {
            pairs: m.table.iter().map(|(k, p)| (*k, lbl(*p))).collect(),
            default: lbl(m.default),
        },
        (Operands::InvokeInterface(ind, count), _) => Instruction::InvokeInterface {
            method: res.member(*ind)?.1,
            count: *count,
        },
        (Operands::MultiANewArray(ind, dims), _) => Instruction::MultiANewArray {
            class: res.cls(*ind)?,
            dims: *dims,
        },
        (Operands::NewArray(tag), _) => {
            Instruction::NewArray(ast::ArrayType::from_code(*tag).ok_or(ParseError("Invalid newarray tag"))?)
        }
        (Operands::WideLocal(op2, ind), _) => Instruction::Wide(ast::WideInstruction::Local(Opcode(*op2), *ind)),
        (Operands::WideIinc(index, delta), _) => Instruction::Wide(ast::WideInstruction::Iinc {
            index: *index,
            delta: (*delta).into(),
        }),
    })
}

fn vtype(res: &mut Resolver, vt: code::VType) -> Result<ast::VType, ParseError> {
    use code::VType::*;
    Ok(match vt {
        Top => ast::VType::Top,
        Int => ast::VType::Integer,
        Float => ast::VType::Float,
        Long => ast::VType::Long,
        Double => ast::VType::Double,
        Null => ast::VType::Null,
        UninitThis => ast::VType::UninitializedThis,
        Object(ind) => ast::VType::Object(res.cls(ind)?),
        UninitObj(pos) => ast::VType::Uninitialized(lbl(pos)),
    })
}

fn vtypes(res: &mut Resolver, vts: &[code::VType]) -> Result<Vec<ast::VType>, ParseError> {
    vts.iter().map(|vt| vtype(res, *vt)).collect()
}

fn frame(res: &mut Resolver, f: &code::Frame) -> Result<ast::Frame, ParseError> {
    use code::Frame::*;
    Ok(match f {
        Same => ast::Frame::Same,
        Stack1(vt) => ast::Frame::SameLocals1Stack(vtype(res, *vt)?),
        Chop(n) => ast::Frame::Chop(*n),
        Append(vts) => ast::Frame::Append(vtypes(res, vts)?),
        Full(locals, stack) => ast::Frame::Full {
            locals: vtypes(res, locals)?,
            stack: vtypes(res, stack)?,
        },
    })
}

fn local_vars(res: &mut Resolver, lines: &[LocalVarLine]) -> Result<Vec<ast::LocalVariable>, ParseError> {
    lines
        .iter()
        .map(|lv| {
            Ok(ast::LocalVariable {
                start: lbl(lv.start),
                end: lbl(lv.end),
                index: lv.ind,
                name: res.utf(lv.name)?,
                desc: res.utf(lv.desc)?,
            })
        })
        .collect()
}

pub(super) fn code(res: &mut Resolver, c: &code::Code) -> Result<ast::Code, ParseError> {
    let mut items = Vec::with_capacity(c.bytecode.0.len() + 1);
    for (pos, ins) in &c.bytecode.0 {
        items.push(ast::CodeItem::labeled(lbl(*pos), instruction(res, ins)?));
    }
    // end of code marker
    items.push(ast::CodeItem {
        label: Some(lbl(c.bytecode.1)),
        instr: None,
    });

    let exceptions = c
        .exceptions
        .iter()
        .map(|e| {
            Ok(ast::ExceptionHandler {
                start: lbl(e.start),
                end: lbl(e.end),
                handler: lbl(e.handler),
                catch_type: res.opt_cls(e.ctype)?,
            })
        })
        .collect::<Result<_, ParseError>>()?;

    let mut attrs = Vec::with_capacity(c.attrs.len());
    for a in &c.attrs {
        use ast::CodeAttribute as CA;
        attrs.push(match &a.body {
            AttrBody::LineNumberTable(lines) => CA::LineNumberTable(
                lines
                    .iter()
                    .map(|(pos, line)| ast::LineNumber {
                        start: lbl(*pos),
                        line: *line,
                    })
                    .collect(),
            ),
            AttrBody::LocalVariableTable(lines) => CA::LocalVariableTable(local_vars(res, lines)?),
            AttrBody::LocalVariableTypeTable(lines) => CA::LocalVariableTypeTable(local_vars(res, lines)?),
            AttrBody::StackMapTable(smt) => CA::StackMapTable(
                smt.0
                    .iter()
                    .map(|(pos, f)| {
                        Ok(ast::StackMapFrame {
                            label: lbl(*pos),
                            frame: frame(res, f)?,
                        })
                    })
                    .collect::<Result<_, ParseError>>()?,
            ),
            _ => {
                let name = res.utf(a.name)?;
                res.warn(DecodeWarning::OpaqueAttribute { name: name.clone() });
                CA::Raw(ast::RawAttribute {
                    name,
                    data: a.data.to_vec(),
                })
            }
        });
    }

    Ok(ast::Code {
        stack: c.stack,
        locals: c.locals,
        items,
        exceptions,
        attrs,
    })
}
