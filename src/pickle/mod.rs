//! Decoder for Python object-serialization ("pickle") streams
//!
//! Protocols 0 through 5 are supported. Types the stream references are
//! resolved through a static registry; anything unregistered decodes as a
//! [`Placeholder`] that keeps its constructor arguments and restored state,
//! and [`get_attr`] recovers attributes from either kind of object.

pub mod attributes;
pub mod disassembler;
pub mod opcodes;
pub mod placeholder;
pub mod reader;
pub mod repr;
pub mod resolver;
pub mod unpickler;
pub mod value;

pub use attributes::{get_attr, Attribute};
pub use disassembler::{disassemble, Disassembler};
pub use placeholder::Placeholder;
pub use repr::{pretty, repr};
pub use resolver::{ClassRef, TypeResolver};
pub use unpickler::{loads, Unpickler};
pub use value::{Graph, Key, Mapping, Node, NodeId, Value};
