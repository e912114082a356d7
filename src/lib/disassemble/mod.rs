//! AST-to-text printer. The output is accepted by [`crate::lib::assemble`]
//! and parses back to the same class.
mod disassembler;
pub(crate) mod flags;
mod refprinter;
mod string;

pub use disassembler::disassemble;
