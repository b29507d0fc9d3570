use crate::error::{Error, Result};

/// Cursor over a byte slice with big-endian readers
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                Error::MalformedContainer(format!(
                    "unexpected end of data reading {} bytes at 0x{:X}",
                    len, self.position
                ))
            })?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32_be(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64_be(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_i64_be(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    /// Read a NUL-terminated string (terminator consumed, lossy UTF-8)
    pub fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.position.min(self.data.len())..];
        let len = rest.iter().position(|&b| b == 0).ok_or_else(|| {
            Error::MalformedContainer(format!("unterminated string at 0x{:X}", self.position))
        })?;
        let value = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.position += len + 1;
        Ok(value)
    }

    pub fn align(&mut self, alignment: usize) {
        self.position += padding_for(self.position, alignment);
    }
}

/// Bytes needed to bring `position` to a multiple of `alignment`
pub fn padding_for(position: usize, alignment: usize) -> usize {
    match position % alignment {
        0 => 0,
        rem => alignment - rem,
    }
}

/// Append zeros until `out.len()` is a multiple of `alignment`
pub fn pad_to(out: &mut Vec<u8>, alignment: usize) {
    let padding = padding_for(out.len(), alignment);
    out.resize(out.len() + padding, 0);
}
