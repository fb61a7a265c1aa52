//! This module provides functionalities to resolve a flattened device tree

use bitflags::bitflags;

pub mod reader;
#[cfg(test)]
pub mod writer;

/// Expected FDT magic number.
pub const FDT_MAGIC: u32 = 0xd00dfeed;
/// The FDT version this crate reads.
pub const FDT_VERSION: u32 = 17;
/// The last compatible FDT version accepted by the reader.
pub const LAST_COMP_VERSION: u32 = 16;
/// Size of the header in bytes.
pub const FDT_HEADER_SIZE: usize = 40;

/// Flattened Device Tree header, decoded from its big-endian representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdtHeader {
    pub magic: u32,
    pub totalsize: u32,
    pub off_dt_struct: u32,
    pub off_dt_strings: u32,
    pub off_mem_rsvmap: u32,
    pub version: u32,
    pub last_comp_version: u32,
    pub boot_cpuid_phys: u32,
    pub size_dt_strings: u32,
    pub size_dt_struct: u32,
}

impl FdtHeader {
    pub fn parse(blob: &[u8]) -> Result<FdtHeader, FdtError> {
        let bytes = blob
            .get(0..FDT_HEADER_SIZE)
            .ok_or(FdtError::Truncated { offset: blob.len() })?;
        let mut words = bytes
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]));
        let mut next = || words.next().unwrap_or_default();
        Ok(FdtHeader {
            magic: next(),
            totalsize: next(),
            off_dt_struct: next(),
            off_dt_strings: next(),
            off_mem_rsvmap: next(),
            version: next(),
            last_comp_version: next(),
            boot_cpuid_phys: next(),
            size_dt_strings: next(),
            size_dt_struct: next(),
        })
    }

    #[cfg(test)]
    pub fn to_bytes(&self) -> [u8; FDT_HEADER_SIZE] {
        let words = [
            self.magic,
            self.totalsize,
            self.off_dt_struct,
            self.off_dt_strings,
            self.off_mem_rsvmap,
            self.version,
            self.last_comp_version,
            self.boot_cpuid_phys,
            self.size_dt_strings,
            self.size_dt_struct,
        ];
        let mut res = [0u8; FDT_HEADER_SIZE];
        for (chunk, word) in res.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        res
    }
}

bitflags! {
    /// Type tags found in the FDT structure block.
    pub struct FdtNodeType : u32{
        /// Begin a node (followed by its name string)
        const FDT_BEGIN_NODE  = 0x01;
        /// End a node
        const FDT_END_NODE    = 0x02;
        /// A property entry (length, nameoff, data)
        const FDT_PROP        = 0x03;
        /// No-op padding word
        const FDT_NOP         = 0x04;
        /// End of the structure block
        const FDT_END         = 0x09;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdtError {
    InvalidNodeType { node_type: usize, cursor: usize },
    InvalidMagic { magic: usize },
    IncompatibleVersion { version: usize },
    /// The blob ends before the structure it describes.
    Truncated { offset: usize },
    /// A node name or property name is not valid UTF-8.
    InvalidString { offset: usize },
}
