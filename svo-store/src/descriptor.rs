use std::fmt::{Display, Formatter};

use crate::errors::{OctreeError, OctreeResult};

/// Names the byte range `[start_byte, end_byte)` of every data record.
///
/// Descriptors document the payload layout only. The store does not check
/// them against `data_size` or against each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataDescriptor {
    name: String,
    start_byte: u32,
    end_byte: u32,
}

impl DataDescriptor {
    /// Creates a descriptor. The name is written to the whitespace-separated
    /// header, so it must be non-empty and free of whitespace.
    pub fn new(name: &str, start_byte: u32, end_byte: u32) -> OctreeResult<Self> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(OctreeError::InvalidOperation(format!(
                "invalid data descriptor name [{}]",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            start_byte,
            end_byte,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_byte(&self) -> u32 {
        self.start_byte
    }

    pub fn end_byte(&self) -> u32 {
        self.end_byte
    }

    /// Number of bytes covered, zero for an inverted range
    pub fn len(&self) -> u32 {
        self.end_byte.saturating_sub(self.start_byte)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bytes of `record` this descriptor covers, if the record is long enough.
    pub fn slice<'a>(&self, record: &'a [u8]) -> Option<&'a [u8]> {
        record.get(self.start_byte as usize..self.end_byte as usize)
    }
}

impl Display for DataDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.name, self.start_byte, self.end_byte)
    }
}
