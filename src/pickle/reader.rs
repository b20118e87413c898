//! Bounds-checked cursor over the serialized byte stream

use crate::error::FormatErrorKind;

pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Consume exactly `n` bytes
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], FormatErrorKind> {
        if n > self.remaining() {
            return Err(FormatErrorKind::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], FormatErrorKind> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatErrorKind> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, FormatErrorKind> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, FormatErrorKind> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, FormatErrorKind> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, FormatErrorKind> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    /// BINFLOAT is the one big-endian operand in the format
    pub fn read_f64_be(&mut self) -> Result<f64, FormatErrorKind> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    /// Read up to and including the next `\n`, returning the line without it
    pub fn read_line(&mut self) -> Result<&'a [u8], FormatErrorKind> {
        let rest = &self.data[self.pos..];
        match rest.iter().position(|&b| b == b'\n') {
            Some(end) => {
                self.pos += end + 1;
                Ok(&rest[..end])
            }
            None => Err(FormatErrorKind::Truncated {
                needed: rest.len() + 1,
                available: rest.len(),
            }),
        }
    }

    /// Payload with a 1-byte length prefix
    pub fn read_bytes1(&mut self) -> Result<&'a [u8], FormatErrorKind> {
        let len = self.read_u8()? as usize;
        self.take(len)
    }

    /// Payload with an unsigned 4-byte length prefix
    pub fn read_bytes4(&mut self) -> Result<&'a [u8], FormatErrorKind> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    /// Payload with a signed 4-byte length prefix; negative lengths are rejected
    pub fn read_bytes_i4(&mut self) -> Result<&'a [u8], FormatErrorKind> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(FormatErrorKind::InvalidOperand(format!(
                "negative length {}",
                len
            )));
        }
        self.take(len as usize)
    }

    /// Payload with an unsigned 8-byte length prefix
    pub fn read_bytes8(&mut self) -> Result<&'a [u8], FormatErrorKind> {
        let len = self.read_u64()?;
        let len = usize::try_from(len).map_err(|_| {
            FormatErrorKind::InvalidOperand(format!("length {} exceeds address space", len))
        })?;
        self.take(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_reads() {
        let data = [0x01, 0x34, 0x12, 0xff, 0xff, 0xff, 0xff];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_i32().unwrap(), -1);
        assert!(r.is_empty());
    }

    #[test]
    fn test_truncated_read_reports_shortfall() {
        let data = [0x05, b'a', b'b'];
        let mut r = Reader::new(&data);
        assert_eq!(
            r.read_bytes1(),
            Err(FormatErrorKind::Truncated {
                needed: 5,
                available: 2
            })
        );
    }

    #[test]
    fn test_read_line() {
        let mut r = Reader::new(b"builtins\nset\nrest");
        assert_eq!(r.read_line().unwrap(), b"builtins");
        assert_eq!(r.read_line().unwrap(), b"set");
        assert!(matches!(
            r.read_line(),
            Err(FormatErrorKind::Truncated { .. })
        ));
    }

    #[test]
    fn test_negative_length_is_rejected() {
        let data = (-2i32).to_le_bytes();
        let mut r = Reader::new(&data);
        assert!(matches!(
            r.read_bytes_i4(),
            Err(FormatErrorKind::InvalidOperand(_))
        ));
    }
}
