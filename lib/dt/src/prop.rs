use alloc::{boxed::Box, vec::Vec};
use core::str;

pub struct Property {
    pub name: Box<str>,
    pub data: Box<[u8]>,
}

impl Property {
    pub fn new(name: &str, data: &[u8]) -> Property {
        Property {
            name: Box::from(name),
            data: Box::from(data),
        }
    }

    fn value_as_utf8(bytes: &[u8]) -> Result<&str, PropertyError> {
        str::from_utf8(bytes).map_err(|_| PropertyError::InvalidPropFormat)
    }
}

impl Property {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn value_as_u32(&self) -> Result<u32, PropertyError> {
        let bytes = self
            .data
            .get(0..4)
            .ok_or(PropertyError::InvalidPropFormat)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
    pub fn value_as_u64(&self) -> Result<u64, PropertyError> {
        let bytes = self
            .data
            .get(0..8)
            .ok_or(PropertyError::InvalidPropFormat)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }
    pub fn value_as_str(&self) -> Result<&str, PropertyError> {
        let end = self
            .data
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.data.len());
        Self::value_as_utf8(&self.data[..end])
    }
    pub fn value_as_strlist(&self) -> Result<Vec<&str>, PropertyError> {
        let mut data: &[u8] = &self.data;
        // a terminating NUL does not start another entry
        if data.last() == Some(&0) {
            data = &data[..data.len() - 1];
        }
        if data.is_empty() {
            return Ok(Vec::new());
        }
        data.split(|b| *b == 0).map(Self::value_as_utf8).collect()
    }
    /// Decode the value as a list of big-endian cells.
    pub fn value_as_u32_list(&self) -> Result<Vec<u32>, PropertyError> {
        if self.data.len() % 4 != 0 {
            return Err(PropertyError::InvalidPropFormat);
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyError {
    InvalidPropFormat,
    PropNotFound,
    DanglingHandle,
}
