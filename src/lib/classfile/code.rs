use super::attrs::Attribute;
use super::cpool::ConstPool;
use super::reader::ParseError;
use super::reader::Reader;
use crate::lib::opcodes;
use crate::lib::opcodes::Shape;
use std::collections::HashSet;
use std::fmt;
use std::fmt::Display;

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
pub struct Pos(pub u32);
impl Pos {
    fn off_sub(self, off: i32) -> Result<Self, ParseError> {
        match (self.0 as i64)
            .checked_add(off as i64)
            .map(u32::try_from)
            .and_then(|r| r.ok())
        {
            Some(v) => Ok(Self(v)),
            None => ParseError::s("Bytecode offset overflow"),
        }
    }

    fn off(self, off: impl Into<i32>) -> Result<Self, ParseError> {
        self.off_sub(off.into())
    }
}
impl Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

pub struct PosSet(HashSet<u32>);
impl PosSet {
    fn new() -> Self {
        Self(HashSet::new())
    }

    fn add(&mut self, v: Pos) {
        self.0.insert(v.0);
    }

    fn contains(&self, v: Pos) -> bool {
        self.0.contains(&v.0)
    }
}

pub trait MaybePosSet {
    fn check(&self, v: Pos) -> Result<Pos, ParseError>;
    fn validate(&self, v: Pos) -> Result<(), ParseError> {
        self.check(v).map(|_| ())
    }

    fn make(&self, v: u16) -> Result<Pos, ParseError> {
        self.check(Pos(v as u32))
    }
    fn make_off(&self, v: Pos, off: u16) -> Result<Pos, ParseError> {
        self.check(v.off(off)?)
    }
}
impl MaybePosSet for PosSet {
    fn check(&self, v: Pos) -> Result<Pos, ParseError> {
        if self.contains(v) {
            Ok(v)
        } else {
            ParseError::s("Invalid bytecode offset")
        }
    }
}
impl MaybePosSet for Option<&'_ PosSet> {
    fn check(&self, v: Pos) -> Result<Pos, ParseError> {
        if let Some(set) = self {
            set.check(v)
        } else {
            ParseError::s("Invalid bytecode offset outside of Code attribute")
        }
    }
}

#[derive(Debug)]
pub struct SwitchTable {
    pub default: Pos,
    pub low: i32,
    pub table: Vec<Pos>,
}
impl SwitchTable {
    fn new(r: &mut Reader, pos: Pos) -> Result<Self, ParseError> {
        let padding = 3 - (pos.0 as usize % 4);
        // JVM requires padding bytes to be 0, so they are not preserved
        r.get(padding)?;

        let default = pos.off(r.i32()?)?;
        let low = r.i32()?;
        let high = r.i32()?;
        if high < low {
            return ParseError::s("tableswitch high is less than low");
        }
        let count = (high as i64 - low as i64 + 1) as usize;
        if count * 4 > r.0.len() {
            return ParseError::s("end of data");
        }

        let mut table = Vec::with_capacity(count);
        for _ in 0..count {
            table.push(pos.off(r.i32()?)?);
        }

        Ok(Self { default, low, table })
    }
}

#[derive(Debug)]
pub struct SwitchMap {
    pub default: Pos,
    pub table: Vec<(i32, Pos)>,
}
impl SwitchMap {
    fn new(r: &mut Reader, pos: Pos) -> Result<Self, ParseError> {
        let padding = 3 - (pos.0 as usize % 4);
        r.get(padding)?;

        let default = pos.off(r.i32()?)?;
        let count = r.i32()?;
        if count < 0 || count as usize * 8 > r.0.len() {
            return ParseError::s("Invalid lookupswitch count");
        }

        let mut table = Vec::with_capacity(count as usize);
        for _ in 0..count {
            table.push((r.i32()?, pos.off(r.i32()?)?));
        }

        Ok(Self { default, table })
    }
}

/// Numeric operand fields of one instruction. Constant pool indices are left
/// unresolved and branch offsets are already converted to absolute positions.
#[derive(Debug)]
pub enum Operands {
    None,
    Push(i32),
    Local(u16),
    Cp(u16),
    Iinc(u16, i16),
    Jump(Pos),
    TableSwitch(Box<SwitchTable>),
    LookupSwitch(Box<SwitchMap>),
    InvokeInterface(u16, u8),
    MultiANewArray(u16, u8),
    NewArray(u8),
    WideLocal(u8, u16),
    WideIinc(u16, i16),
}

#[derive(Debug)]
pub struct Instr {
    pub op: u8,
    pub args: Operands,
}
impl Instr {
    fn new(r: &mut Reader, pos: Pos) -> Result<Self, ParseError> {
        use Operands::*;
        let op = r.u8()?;
        let shape = opcodes::shape(op).ok_or(ParseError("Invalid opcode"))?;

        let args = match shape {
            Shape::Simple => None,
            Shape::Push => {
                if op == opcodes::BIPUSH {
                    Push(r.i8()?.into())
                } else {
                    Push(r.i16()?.into())
                }
            }
            Shape::Local => Local(r.u8()?.into()),
            Shape::Ldc => {
                if op == opcodes::LDC {
                    Cp(r.u8()?.into())
                } else {
                    Cp(r.u16()?)
                }
            }
            Shape::Member(_) | Shape::Class => Cp(r.u16()?),
            Shape::Jump => {
                if opcodes::is_wide_jump(op) {
                    Jump(pos.off(r.i32()?)?)
                } else {
                    Jump(pos.off(r.i16()?)?)
                }
            }
            Shape::Iinc => Iinc(r.u8()?.into(), r.i8()?.into()),
            Shape::TableSwitch => TableSwitch(Box::new(SwitchTable::new(r, pos)?)),
            Shape::LookupSwitch => LookupSwitch(Box::new(SwitchMap::new(r, pos)?)),
            Shape::InvokeInterface => {
                let args = InvokeInterface(r.u16()?, r.u8()?);
                r.u8()?;
                args
            }
            Shape::InvokeDynamic => {
                let args = Cp(r.u16()?);
                r.u16()?;
                args
            }
            Shape::NewArray => {
                let tag = r.u8()?;
                if !(4..=11).contains(&tag) {
                    return ParseError::s("Invalid newarray tag");
                }
                NewArray(tag)
            }
            Shape::MultiANewArray => MultiANewArray(r.u16()?, r.u8()?),
            Shape::Wide => {
                let op2 = r.u8()?;
                if op2 == opcodes::IINC {
                    WideIinc(r.u16()?, r.i16()?)
                } else if opcodes::is_wide_local(op2) {
                    WideLocal(op2, r.u16()?)
                } else {
                    return ParseError::s("Invalid wide instr opcode");
                }
            }
        };
        Ok(Self { op, args })
    }

    fn validate(&self, pset: &PosSet) -> Result<(), ParseError> {
        use Operands::*;
        match &self.args {
            Jump(p) => pset.validate(*p)?,
            TableSwitch(table) => {
                for p in table.table.iter() {
                    pset.validate(*p)?;
                }
                pset.validate(table.default)?
            }
            LookupSwitch(map) => {
                for (_, p) in map.table.iter() {
                    pset.validate(*p)?;
                }
                pset.validate(map.default)?
            }
            _ => {}
        };
        Ok(())
    }
}

#[derive(Debug)]
pub struct Bytecode(pub Vec<(Pos, Instr)>, pub Pos);
impl Bytecode {
    fn new(r: &mut Reader) -> Result<(Self, PosSet), ParseError> {
        let len = r.0.len();
        if len > 0xFFFF {
            return ParseError::s("Bytecode length > 65535 bytes");
        }

        let mut instrs = Vec::new();
        while r.0.len() > 0 {
            let pos = Pos((len - r.0.len()) as u32);
            instrs.push((pos, Instr::new(r, pos)?));
        }
        let endpos = Pos(len as u32);

        // Now that all bytecode is parsed, create set of offsets and check them
        let mut pset = PosSet::new();
        for (p, _) in &instrs {
            pset.add(*p);
        }
        pset.add(endpos);

        for (_, instr) in &instrs {
            instr.validate(&pset)?;
        }

        Ok((Self(instrs, endpos), pset))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Except {
    pub start: Pos,
    pub end: Pos,
    pub handler: Pos,
    pub ctype: u16,
}
impl Except {
    fn new(r: &mut Reader, pset: &PosSet) -> Result<Self, ParseError> {
        Ok(Self {
            start: pset.make(r.u16()?)?,
            end: pset.make(r.u16()?)?,
            handler: pset.make(r.u16()?)?,
            ctype: r.u16()?,
        })
    }
}

#[derive(Debug)]
pub struct Code<'a> {
    pub stack: u16,
    pub locals: u16,
    pub bytecode: Bytecode,
    pub exceptions: Vec<Except>,
    pub attrs: Vec<Attribute<'a>>,
}
impl<'a> Code<'a> {
    pub(super) fn new(r: &mut Reader<'a>, cp: &ConstPool<'a>) -> Result<Self, ParseError> {
        let stack = r.u16()?;
        let locals = r.u16()?;
        let bclen = r.u32()? as usize;

        let (bytecode, pset) = Bytecode::new(&mut Reader(r.get(bclen)?))?;

        let exceptions = r.parse_list(|r| Except::new(r, &pset))?;
        let attrs = Attribute::new_list(r, cp, Some(&pset))?;

        if r.0.len() > 0 {
            return ParseError::s("Extra data at end of Code attribute");
        }

        Ok(Self {
            stack,
            locals,
            bytecode,
            exceptions,
            attrs,
        })
    }
}

///////////////////////////////////////////////////////////////////////////////
#[derive(Debug, Clone, Copy)]
pub enum VType {
    Top,
    Int,
    Float,
    Long,
    Double,
    Null,
    UninitThis,
    Object(u16),
    UninitObj(Pos),
}
impl VType {
    fn new(r: &mut Reader, pset: &PosSet) -> Result<Self, ParseError> {
        use VType::*;
        Ok(match r.u8()? {
            0 => Top,
            1 => Int,
            2 => Float,
            3 => Double,
            4 => Long,
            5 => Null,
            6 => UninitThis,
            7 => Object(r.u16()?),
            8 => UninitObj(pset.make(r.u16()?)?),
            _ => return ParseError::s("Invalid verification type"),
        })
    }
}

#[derive(Debug)]
pub enum Frame {
    Same,
    Stack1(VType),
    Chop(u8),
    Append(Vec<VType>),
    Full(Vec<VType>, Vec<VType>),
}
impl Frame {
    fn new(r: &mut Reader, pset: &PosSet) -> Result<(Self, u16), ParseError> {
        use Frame::*;
        let tag = r.u8()?;
        let delta = if tag <= 127 { tag as u16 % 64 } else { r.u16()? };

        Ok((
            match tag {
                0..=63 | 251 => Same,
                64..=127 | 247 => Stack1(VType::new(r, pset)?),
                128..=246 => return ParseError::s("Invalid frame tag"),
                248..=250 => Chop(251 - tag),
                252..=254 => {
                    let count = (tag - 251) as usize;
                    let mut vals = Vec::with_capacity(count);
                    for _ in 0..count {
                        vals.push(VType::new(r, pset)?);
                    }
                    Append(vals)
                }
                255 => Full(r.parse_list(|r| VType::new(r, pset))?, r.parse_list(|r| VType::new(r, pset))?),
            },
            delta,
        ))
    }
}

#[derive(Debug)]
pub struct StackMapTable(pub Vec<(Pos, Frame)>);
impl StackMapTable {
    pub(super) fn new(r: &mut Reader, pset: Option<&PosSet>) -> Result<Self, ParseError> {
        let pset = pset.ok_or(ParseError("StackMapTable outside Code attribute"))?;

        let mut pos = Pos(0);
        let mut first = true;

        Ok(Self(r.parse_list(|r| {
            let (frame, delta) = Frame::new(r, pset)?;
            pos = pos.off(delta)?;
            if first {
                first = false;
            } else {
                pos = pos.off(1)?;
            }
            Ok((pset.check(pos)?, frame))
        })?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytecode(data: &[u8]) -> Result<Bytecode, ParseError> {
        Bytecode::new(&mut Reader(data)).map(|(bc, _)| bc)
    }

    #[test]
    fn test_branch_targets_are_absolute() {
        // nop; goto -1; return
        let bc = bytecode(&[0x00, 0xA7, 0xFF, 0xFF, 0xB1]).unwrap();
        assert_eq!(bc.0.len(), 3);
        assert!(matches!(bc.0[1].1.args, Operands::Jump(Pos(0))));
        assert_eq!(bc.1, Pos(5));
    }

    #[test]
    fn test_tableswitch_padding() {
        // nop; tableswitch at offset 1 with 2 bytes of padding, low=0 high=0
        let data = [
            0x00, 0xAA, 0, 0, //
            0, 0, 0, 19, // default
            0, 0, 0, 0, // low
            0, 0, 0, 0, // high
            0, 0, 0, 19, // case 0
            0xB1,
        ];
        let bc = bytecode(&data).unwrap();
        match &bc.0[1].1.args {
            Operands::TableSwitch(t) => {
                assert_eq!(t.low, 0);
                assert_eq!(t.default, Pos(20));
                assert_eq!(t.table, vec![Pos(20)]);
            }
            other => panic!("unexpected operands {:?}", other),
        }
    }

    #[test]
    fn test_invalid_branch_target() {
        assert_eq!(
            bytecode(&[0xA7, 0x00, 0x02, 0xB1]).err(),
            Some(ParseError("Invalid bytecode offset"))
        );
    }

    #[test]
    fn test_wide_forms() {
        let bc = bytecode(&[0xC4, 0x84, 0x01, 0x00, 0xFF, 0xFF, 0xC4, 0x19, 0x01, 0x02]).unwrap();
        assert!(matches!(bc.0[0].1.args, Operands::WideIinc(256, -1)));
        assert!(matches!(bc.0[1].1.args, Operands::WideLocal(0x19, 258)));
        assert_eq!(bytecode(&[0xC4, 0x00]).err(), Some(ParseError("Invalid wide instr opcode")));
    }
}
