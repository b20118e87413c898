use crate::error::FormatErrorKind;
use crate::pickle::opcodes::{Opcode, Operand};
use crate::pickle::reader::Reader;
use crate::pickle::repr::{bytes_repr, str_repr};
use std::fmt::Write;

/// Longest operand payload shown before it is elided
const MAX_OPERAND_CHARS: usize = 60;

pub struct Disassembler<'a> {
    data: &'a [u8],
}

impl<'a> Disassembler<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Disassembler { data }
    }

    /// List opcodes from the start of the stream
    /// Stops at STOP, at the first undecodable opcode, or once `byte_limit`
    /// bytes have been covered
    pub fn disassemble(&self, byte_limit: Option<usize>) -> String {
        let mut output = String::new();
        let mut reader = Reader::new(self.data);
        let mut depth = 0usize;

        let _ = writeln!(output, "Disassembly of {} bytes:", self.data.len());
        loop {
            let offset = reader.position();
            if let Some(limit) = byte_limit {
                if offset >= limit {
                    let _ = writeln!(output, "{:6}: ... (limit of {} bytes reached)", offset, limit);
                    break;
                }
            }
            if reader.is_empty() {
                let _ = writeln!(output, "{:6}: <end of stream>", offset);
                break;
            }

            let byte = self.data[offset];
            let _ = reader.read_u8();
            let Some(op) = Opcode::from_byte(byte) else {
                let _ = writeln!(output, "{:6}: {:02x} <unknown opcode>", offset, byte);
                break;
            };

            if matches!(
                op,
                Opcode::Tuple
                    | Opcode::List
                    | Opcode::Dict
                    | Opcode::Appends
                    | Opcode::SetItems
                    | Opcode::AddItems
                    | Opcode::FrozenSet
                    | Opcode::Inst
                    | Opcode::Obj
                    | Opcode::PopMark
            ) {
                depth = depth.saturating_sub(1);
            }

            match format_operand(&mut reader, op) {
                Ok(operand) => {
                    let _ = writeln!(
                        output,
                        "{:6}: {:02x} {}{:<16} {}",
                        offset,
                        byte,
                        "  ".repeat(depth),
                        op.name(),
                        operand
                    );
                }
                Err(kind) => {
                    let _ = writeln!(
                        output,
                        "{:6}: {:02x} {}{:<16} <{}>",
                        offset,
                        byte,
                        "  ".repeat(depth),
                        op.name(),
                        kind
                    );
                    break;
                }
            }

            match op {
                Opcode::Mark => depth += 1,
                Opcode::Stop => break,
                _ => {}
            }
        }
        output
    }
}

fn elide(text: String) -> String {
    if text.chars().count() <= MAX_OPERAND_CHARS {
        return text;
    }
    let mut short: String = text.chars().take(MAX_OPERAND_CHARS).collect();
    short.push_str("...");
    short
}

fn text_operand(bytes: &[u8]) -> String {
    elide(str_repr(&String::from_utf8_lossy(bytes)))
}

fn format_operand(reader: &mut Reader, op: Opcode) -> Result<String, FormatErrorKind> {
    Ok(match op.operand() {
        Operand::None => String::new(),
        Operand::U8 => reader.read_u8()?.to_string(),
        Operand::U16 => reader.read_u16()?.to_string(),
        Operand::U32 => reader.read_u32()?.to_string(),
        Operand::I32 => reader.read_i32()?.to_string(),
        Operand::U64 => reader.read_u64()?.to_string(),
        Operand::F64 => reader.read_f64_be()?.to_string(),
        Operand::Line => text_operand(reader.read_line()?),
        Operand::TwoLines => {
            let module = String::from_utf8_lossy(reader.read_line()?).into_owned();
            let name = String::from_utf8_lossy(reader.read_line()?).into_owned();
            format!("{} {}", module, name)
        }
        Operand::Bytes1 | Operand::BytesI4 | Operand::Bytes4 | Operand::Bytes8 => {
            let payload = match op.operand() {
                Operand::Bytes1 => reader.read_bytes1()?,
                Operand::BytesI4 => reader.read_bytes_i4()?,
                Operand::Bytes4 => reader.read_bytes4()?,
                _ => reader.read_bytes8()?,
            };
            match op {
                Opcode::Long1 | Opcode::Long4 => format!("<{} byte integer>", payload.len()),
                Opcode::BinBytes
                | Opcode::ShortBinBytes
                | Opcode::BinBytes8
                | Opcode::ByteArray8 => elide(bytes_repr(payload)),
                _ => text_operand(payload),
            }
        }
    })
}

/// Disassemble at most `byte_limit` bytes of `data`
pub fn disassemble(data: &[u8], byte_limit: usize) -> String {
    Disassembler::new(data).disassemble(Some(byte_limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_stops_at_stop() {
        let listing = disassemble(b"\x80\x04](K\x01\x8c\x02hie.trailing", 500);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], "Disassembly of 20 bytes:");
        assert!(lines[1].contains("PROTO") && lines[1].ends_with(" 4"));
        assert!(lines[3].contains("MARK"));
        // nested under the mark
        assert!(lines[4].contains("  BININT1"));
        assert!(lines[5].contains("SHORT_BINUNICODE") && lines[5].ends_with("'hi'"));
        assert!(lines[6].contains("APPENDS"));
        assert!(lines[7].contains("STOP"));
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn test_listing_respects_byte_limit() {
        let listing = disassemble(b"NNNNNN.", 3);
        assert_eq!(listing.matches("NONE").count(), 3);
        assert!(listing.contains("limit of 3 bytes reached"));
    }

    #[test]
    fn test_listing_reports_bad_input() {
        let listing = disassemble(b"N\xff", 500);
        assert!(listing.contains("<unknown opcode>"));

        let listing = disassemble(b"X\x10\x00\x00\x00ab", 500);
        assert!(listing.contains("BINUNICODE"));
        assert!(listing.contains("truncated stream"));
    }
}
