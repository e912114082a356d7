pub mod assemble;
pub mod ast;
pub mod classfile;
pub mod decode;
pub mod disassemble;
pub mod encode;
pub mod opcodes;
mod util;

#[cfg(test)]
mod codec_tests;

pub use assemble::parse;
pub use decode::Decoded;
pub use disassemble::disassemble;
pub use encode::encode;

/// Read class file bytes into the AST.
pub fn decode_class(data: &[u8]) -> Result<Decoded, classfile::ParseError> {
    let raw = classfile::parse(data)?;
    decode::decode(&raw)
}
