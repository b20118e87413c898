//! Pickle opcode table
//!
//! Maps raw opcode bytes to the `Opcode` enum, their canonical names, and the
//! shape of the inline operand that follows each one. The decoder and the
//! disassembler both walk the stream through this table so they can never
//! disagree on operand widths.

/// Highest protocol version the decoder understands
pub const HIGHEST_PROTOCOL: u8 = 5;

/// Inline operand layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// No inline operand
    None,
    /// Unsigned 1-byte integer
    U8,
    /// Unsigned 2-byte little-endian integer
    U16,
    /// Unsigned 4-byte little-endian integer
    U32,
    /// Signed 4-byte little-endian integer
    I32,
    /// Unsigned 8-byte little-endian integer
    U64,
    /// 8-byte big-endian IEEE double
    F64,
    /// Newline-terminated text
    Line,
    /// Two newline-terminated text lines (namespace, name)
    TwoLines,
    /// Payload prefixed by a 1-byte length
    Bytes1,
    /// Payload prefixed by a signed 4-byte length
    BytesI4,
    /// Payload prefixed by an unsigned 4-byte length
    Bytes4,
    /// Payload prefixed by an unsigned 8-byte length
    Bytes8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Mark,
    Stop,
    Pop,
    PopMark,
    Dup,
    Float,
    Int,
    BinInt,
    BinInt1,
    Long,
    BinInt2,
    None,
    PersId,
    BinPersId,
    Reduce,
    String,
    BinString,
    ShortBinString,
    Unicode,
    BinUnicode,
    Append,
    Build,
    Global,
    Dict,
    EmptyDict,
    Appends,
    Get,
    BinGet,
    Inst,
    LongBinGet,
    List,
    EmptyList,
    Obj,
    Put,
    BinPut,
    LongBinPut,
    SetItem,
    Tuple,
    EmptyTuple,
    SetItems,
    BinFloat,
    // protocol 2
    Proto,
    NewObj,
    Ext1,
    Ext2,
    Ext4,
    Tuple1,
    Tuple2,
    Tuple3,
    NewTrue,
    NewFalse,
    Long1,
    Long4,
    // protocol 3
    BinBytes,
    ShortBinBytes,
    // protocol 4
    ShortBinUnicode,
    BinUnicode8,
    BinBytes8,
    EmptySet,
    AddItems,
    FrozenSet,
    NewObjEx,
    StackGlobal,
    Memoize,
    Frame,
    // protocol 5
    ByteArray8,
    NextBuffer,
    ReadonlyBuffer,
}

impl Opcode {
    /// Decode an opcode byte, `None` for bytes the format does not define
    pub fn from_byte(byte: u8) -> Option<Self> {
        let op = match byte {
            b'(' => Opcode::Mark,
            b'.' => Opcode::Stop,
            b'0' => Opcode::Pop,
            b'1' => Opcode::PopMark,
            b'2' => Opcode::Dup,
            b'F' => Opcode::Float,
            b'I' => Opcode::Int,
            b'J' => Opcode::BinInt,
            b'K' => Opcode::BinInt1,
            b'L' => Opcode::Long,
            b'M' => Opcode::BinInt2,
            b'N' => Opcode::None,
            b'P' => Opcode::PersId,
            b'Q' => Opcode::BinPersId,
            b'R' => Opcode::Reduce,
            b'S' => Opcode::String,
            b'T' => Opcode::BinString,
            b'U' => Opcode::ShortBinString,
            b'V' => Opcode::Unicode,
            b'X' => Opcode::BinUnicode,
            b'a' => Opcode::Append,
            b'b' => Opcode::Build,
            b'c' => Opcode::Global,
            b'd' => Opcode::Dict,
            b'}' => Opcode::EmptyDict,
            b'e' => Opcode::Appends,
            b'g' => Opcode::Get,
            b'h' => Opcode::BinGet,
            b'i' => Opcode::Inst,
            b'j' => Opcode::LongBinGet,
            b'l' => Opcode::List,
            b']' => Opcode::EmptyList,
            b'o' => Opcode::Obj,
            b'p' => Opcode::Put,
            b'q' => Opcode::BinPut,
            b'r' => Opcode::LongBinPut,
            b's' => Opcode::SetItem,
            b't' => Opcode::Tuple,
            b')' => Opcode::EmptyTuple,
            b'u' => Opcode::SetItems,
            b'G' => Opcode::BinFloat,
            0x80 => Opcode::Proto,
            0x81 => Opcode::NewObj,
            0x82 => Opcode::Ext1,
            0x83 => Opcode::Ext2,
            0x84 => Opcode::Ext4,
            0x85 => Opcode::Tuple1,
            0x86 => Opcode::Tuple2,
            0x87 => Opcode::Tuple3,
            0x88 => Opcode::NewTrue,
            0x89 => Opcode::NewFalse,
            0x8a => Opcode::Long1,
            0x8b => Opcode::Long4,
            b'B' => Opcode::BinBytes,
            b'C' => Opcode::ShortBinBytes,
            0x8c => Opcode::ShortBinUnicode,
            0x8d => Opcode::BinUnicode8,
            0x8e => Opcode::BinBytes8,
            0x8f => Opcode::EmptySet,
            0x90 => Opcode::AddItems,
            0x91 => Opcode::FrozenSet,
            0x92 => Opcode::NewObjEx,
            0x93 => Opcode::StackGlobal,
            0x94 => Opcode::Memoize,
            0x95 => Opcode::Frame,
            0x96 => Opcode::ByteArray8,
            0x97 => Opcode::NextBuffer,
            0x98 => Opcode::ReadonlyBuffer,
            _ => return None,
        };
        Some(op)
    }

    /// Canonical opcode name, as printed by disassemblers of the format
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Mark => "MARK",
            Opcode::Stop => "STOP",
            Opcode::Pop => "POP",
            Opcode::PopMark => "POP_MARK",
            Opcode::Dup => "DUP",
            Opcode::Float => "FLOAT",
            Opcode::Int => "INT",
            Opcode::BinInt => "BININT",
            Opcode::BinInt1 => "BININT1",
            Opcode::Long => "LONG",
            Opcode::BinInt2 => "BININT2",
            Opcode::None => "NONE",
            Opcode::PersId => "PERSID",
            Opcode::BinPersId => "BINPERSID",
            Opcode::Reduce => "REDUCE",
            Opcode::String => "STRING",
            Opcode::BinString => "BINSTRING",
            Opcode::ShortBinString => "SHORT_BINSTRING",
            Opcode::Unicode => "UNICODE",
            Opcode::BinUnicode => "BINUNICODE",
            Opcode::Append => "APPEND",
            Opcode::Build => "BUILD",
            Opcode::Global => "GLOBAL",
            Opcode::Dict => "DICT",
            Opcode::EmptyDict => "EMPTY_DICT",
            Opcode::Appends => "APPENDS",
            Opcode::Get => "GET",
            Opcode::BinGet => "BINGET",
            Opcode::Inst => "INST",
            Opcode::LongBinGet => "LONG_BINGET",
            Opcode::List => "LIST",
            Opcode::EmptyList => "EMPTY_LIST",
            Opcode::Obj => "OBJ",
            Opcode::Put => "PUT",
            Opcode::BinPut => "BINPUT",
            Opcode::LongBinPut => "LONG_BINPUT",
            Opcode::SetItem => "SETITEM",
            Opcode::Tuple => "TUPLE",
            Opcode::EmptyTuple => "EMPTY_TUPLE",
            Opcode::SetItems => "SETITEMS",
            Opcode::BinFloat => "BINFLOAT",
            Opcode::Proto => "PROTO",
            Opcode::NewObj => "NEWOBJ",
            Opcode::Ext1 => "EXT1",
            Opcode::Ext2 => "EXT2",
            Opcode::Ext4 => "EXT4",
            Opcode::Tuple1 => "TUPLE1",
            Opcode::Tuple2 => "TUPLE2",
            Opcode::Tuple3 => "TUPLE3",
            Opcode::NewTrue => "NEWTRUE",
            Opcode::NewFalse => "NEWFALSE",
            Opcode::Long1 => "LONG1",
            Opcode::Long4 => "LONG4",
            Opcode::BinBytes => "BINBYTES",
            Opcode::ShortBinBytes => "SHORT_BINBYTES",
            Opcode::ShortBinUnicode => "SHORT_BINUNICODE",
            Opcode::BinUnicode8 => "BINUNICODE8",
            Opcode::BinBytes8 => "BINBYTES8",
            Opcode::EmptySet => "EMPTY_SET",
            Opcode::AddItems => "ADDITEMS",
            Opcode::FrozenSet => "FROZENSET",
            Opcode::NewObjEx => "NEWOBJ_EX",
            Opcode::StackGlobal => "STACK_GLOBAL",
            Opcode::Memoize => "MEMOIZE",
            Opcode::Frame => "FRAME",
            Opcode::ByteArray8 => "BYTEARRAY8",
            Opcode::NextBuffer => "NEXT_BUFFER",
            Opcode::ReadonlyBuffer => "READONLY_BUFFER",
        }
    }

    /// Layout of the inline operand following this opcode
    pub fn operand(self) -> Operand {
        match self {
            Opcode::Float
            | Opcode::Int
            | Opcode::Long
            | Opcode::PersId
            | Opcode::String
            | Opcode::Unicode
            | Opcode::Get
            | Opcode::Put => Operand::Line,
            Opcode::Global | Opcode::Inst => Operand::TwoLines,
            Opcode::BinInt => Operand::I32,
            Opcode::BinInt1
            | Opcode::BinGet
            | Opcode::BinPut
            | Opcode::Proto
            | Opcode::Ext1 => Operand::U8,
            Opcode::BinInt2 | Opcode::Ext2 => Operand::U16,
            Opcode::LongBinGet | Opcode::LongBinPut | Opcode::Ext4 => Operand::U32,
            Opcode::BinFloat => Operand::F64,
            Opcode::Frame => Operand::U64,
            Opcode::ShortBinString
            | Opcode::ShortBinBytes
            | Opcode::ShortBinUnicode
            | Opcode::Long1 => Operand::Bytes1,
            Opcode::BinString | Opcode::Long4 => Operand::BytesI4,
            Opcode::BinUnicode | Opcode::BinBytes => Operand::Bytes4,
            Opcode::BinUnicode8 | Opcode::BinBytes8 | Opcode::ByteArray8 => Operand::Bytes8,
            _ => Operand::None,
        }
    }
}
