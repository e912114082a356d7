//! Low level reader that splits class file bytes into a raw structure: a
//! tag-dispatched constant pool, access flags, attributes with unresolved
//! indices and per-method instruction streams.
pub mod attrs;
pub mod code;
pub mod cpool;
pub mod parse;
pub mod reader;

pub use parse::parse;
pub use reader::ParseError;
