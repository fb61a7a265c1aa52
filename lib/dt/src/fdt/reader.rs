use core::{mem::take, ops::Range, slice, str};

use crate::{
    fdt::{FDT_MAGIC, FDT_VERSION, FdtError, FdtHeader, FdtNodeType, LAST_COMP_VERSION},
    node::{DeviceTree, Node},
    prop::Property,
};
use alloc::{vec, vec::Vec};
use utils::num::AlignableTo;

pub struct FdtReader<'a> {
    blob: &'a [u8],
    cursor: usize,
    nodes: Vec<Node>,
}

/// Basic Reader Functions
impl<'a> FdtReader<'a> {
    /// Read a 32-bit big-endian word at the cursor without advancing it.
    #[inline(always)]
    fn peek_u32(&self) -> Result<u32, FdtError> {
        let bytes = self
            .blob
            .get(self.cursor..self.cursor + 4)
            .ok_or(FdtError::Truncated {
                offset: self.cursor,
            })?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Advance the cursor by 4 bytes.
    #[inline(always)]
    fn advance(&mut self) {
        self.cursor += 4;
    }

    /// Read a 32-bit big-endian word and advance the cursor by 4 bytes.
    #[inline(always)]
    fn read_u32(&mut self) -> Result<u32, FdtError> {
        let res = self.peek_u32()?;
        self.advance();
        Ok(res)
    }

    /// Read `len` bytes and move the cursor to the next 4-byte aligned position.
    #[inline(always)]
    fn readbytes_aligned(&mut self, len: usize) -> Result<&'a [u8], FdtError> {
        let res = self
            .blob
            .get(self.cursor..self.cursor + len)
            .ok_or(FdtError::Truncated {
                offset: self.cursor,
            })?;
        self.cursor = (self.cursor + len).align_up(4);
        Ok(res)
    }

    /// Move the cursor past padding words to the next meaningful token.
    #[inline(always)]
    fn skip(&mut self) -> Result<(), FdtError> {
        let mut p = self.peek_u32()?;
        while p == 0 || p == FdtNodeType::FDT_NOP.bits() {
            self.advance();
            p = self.peek_u32()?;
        }
        Ok(())
    }

    /// Read a NUL-terminated string starting at `offset`.
    fn str_at(&self, offset: usize) -> Result<&'a str, FdtError> {
        let tail = self.blob.get(offset..).ok_or(FdtError::Truncated { offset })?;
        let len = tail
            .iter()
            .position(|b| *b == 0)
            .ok_or(FdtError::Truncated {
                offset: self.blob.len(),
            })?;
        str::from_utf8(&tail[..len]).map_err(|_| FdtError::InvalidString { offset })
    }

    /// Read a NUL-terminated string at the cursor and move to the next aligned position.
    #[inline(always)]
    fn readstr_aligned(&mut self) -> Result<&'a str, FdtError> {
        let res = self.str_at(self.cursor)?;
        self.cursor = (self.cursor + res.len() + 1).align_up(4);
        Ok(res)
    }

    /// Read a tag word and verify it equals `supposed`.
    fn read_and_check(&mut self, supposed: FdtNodeType) -> Result<(), FdtError> {
        let node_type = self.read_u32()?;
        if node_type != supposed.bits() {
            return Err(FdtError::InvalidNodeType {
                node_type: node_type as usize,
                cursor: self.cursor,
            });
        }
        Ok(())
    }
}

impl<'a> FdtReader<'a> {
    // region: constructor

    /// Create a reader over an in-memory blob.
    ///
    /// This does not validate the blob; [Self::read] validates before parsing.
    pub fn new(blob: &'a [u8]) -> FdtReader<'a> {
        FdtReader {
            blob,
            cursor: 0,
            nodes: vec![],
        }
    }

    /// Create a reader over a blob handed over by the boot loader.
    ///
    /// # Safety
    /// `ptr` must point to a readable FDT whose `totalsize` bytes stay valid and unmodified
    /// for the rest of the program.
    pub unsafe fn from_ptr(ptr: *const u8) -> Result<FdtReader<'static>, FdtError> {
        // SAFETY: the caller guarantees at least a full header is readable.
        let header = unsafe { slice::from_raw_parts(ptr, super::FDT_HEADER_SIZE) };
        let header = FdtHeader::parse(header)?;
        if header.magic != FDT_MAGIC {
            return Err(FdtError::InvalidMagic {
                magic: header.magic as usize,
            });
        }
        // SAFETY: the caller guarantees `totalsize` bytes are readable.
        let blob = unsafe { slice::from_raw_parts(ptr, header.totalsize as usize) };
        Ok(FdtReader::new(blob))
    }

    // endregion

    /// Decode the FDT header.
    pub fn get_header(&self) -> Result<FdtHeader, FdtError> {
        FdtHeader::parse(self.blob)
    }

    /// Validate the FDT header (magic number, compatible version range and size).
    pub fn validate(&self) -> Result<FdtHeader, FdtError> {
        let header = self.get_header()?;

        // 1. Check the magic number
        if header.magic != FDT_MAGIC {
            return Err(FdtError::InvalidMagic {
                magic: header.magic as usize,
            });
        }

        // 2. Check the fdt version. We use version 17, and the last compatible version is 16
        if header.version < LAST_COMP_VERSION || header.last_comp_version > FDT_VERSION {
            return Err(FdtError::IncompatibleVersion {
                version: header.version as usize,
            });
        }

        if header.totalsize as usize > self.blob.len() {
            return Err(FdtError::Truncated {
                offset: self.blob.len(),
            });
        }
        Ok(header)
    }

    /// Read a string from the FDT string table at `offset`.
    pub fn get_string(&self, header: &FdtHeader, offset: usize) -> Result<&'a str, FdtError> {
        self.str_at(header.off_dt_strings as usize + offset)
    }

    /// Read consecutive property entries from the structure block.
    ///
    /// Stops when a non-`FDT_PROP` tag is encountered and returns the collected props.
    fn read_props(&mut self, header: &FdtHeader) -> Result<Vec<Property>, FdtError> {
        let mut res = Vec::<Property>::new();
        loop {
            self.skip()?;
            if self.peek_u32()? != FdtNodeType::FDT_PROP.bits() {
                break Ok(res);
            }
            self.advance();
            let len = self.read_u32()? as usize;
            let name_offset = self.read_u32()? as usize;
            let name = self.get_string(header, name_offset)?;
            let data = self.readbytes_aligned(len)?;
            res.push(Property::new(name, data));
        }
    }

    /// Parse a single node (name, properties and child nodes) from the structure block.
    ///
    /// Recursively parses subnodes until the matching `FDT_END_NODE` is found. The parent
    /// link of the returned node still points to itself.
    fn read_node(&mut self, header: &FdtHeader) -> Result<usize, FdtError> {
        self.skip()?;
        self.read_and_check(FdtNodeType::FDT_BEGIN_NODE)?;
        let full_name = self.readstr_aligned()?;
        let props = self.read_props(header)?;
        let mut children = vec![];
        loop {
            self.skip()?;
            let nodetype = self.peek_u32()?;
            if nodetype == FdtNodeType::FDT_BEGIN_NODE.bits() {
                children.push(self.read_node(header)?);
            } else if nodetype == FdtNodeType::FDT_END_NODE.bits() {
                self.advance();
                break;
            } else {
                return Err(FdtError::InvalidNodeType {
                    node_type: nodetype as usize,
                    cursor: self.cursor,
                });
            }
        }
        let id = self.nodes.len();
        for child in &children {
            self.nodes[*child].parent_id = id;
        }
        self.nodes.push(Node::new(id, full_name, props, children));
        Ok(id)
    }

    /// Get the memory reservation map.
    ///
    /// **The reserved memory block are not promised to be not overlapped**
    ///
    /// The blob itself is appended to the reservation map.
    fn get_mem_rsv_map(&self, header: &FdtHeader) -> Result<Vec<Range<usize>>, FdtError> {
        let mut res = Vec::new();
        let mut offset = header.off_mem_rsvmap as usize;
        loop {
            let entry = self
                .blob
                .get(offset..offset + 16)
                .ok_or(FdtError::Truncated { offset })?;
            let mut addr = [0u8; 8];
            let mut size = [0u8; 8];
            addr.copy_from_slice(&entry[0..8]);
            size.copy_from_slice(&entry[8..16]);
            let addr = u64::from_be_bytes(addr) as usize;
            let size = u64::from_be_bytes(size) as usize;
            if addr == 0 && size == 0 {
                break;
            }
            res.push(addr..addr + size);
            offset += 16;
        }
        let start = self.blob.as_ptr() as usize;
        res.push(start..start + header.totalsize as usize);
        Ok(res)
    }

    fn read_internal(&mut self) -> Result<DeviceTree, FdtError> {
        let header = self.validate()?;
        self.cursor = header.off_dt_struct as usize;
        let root_id = self.read_node(&header)?;
        self.skip()?;
        self.read_and_check(FdtNodeType::FDT_END)?;
        let mem_rsv_map = self.get_mem_rsv_map(&header)?;
        Ok(DeviceTree::from_parts(take(&mut self.nodes), root_id, mem_rsv_map))
    }

    /// Parse the entire blob into a [DeviceTree].
    ///
    /// All strings and byte-array data are **copied**, and the blob can be safely wiped
    /// afterwards.
    pub fn read(&mut self) -> Result<DeviceTree, FdtError> {
        match self.read_internal() {
            Ok(res) => Ok(res),
            Err(err) => {
                self.cursor = 0;
                self.nodes.clear();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FdtReader;
    use crate::{
        builder::NodeBuilder,
        fdt::{FdtError, FdtHeader, writer::FdtWriter},
    };

    fn sample_blob() -> Vec<u8> {
        let tree = NodeBuilder::new("")
            .prop_u32("#address-cells", 1)
            .prop_u32("#size-cells", 1)
            .prop_strlist("compatible", &["nvidia,tegra20"])
            .child(
                NodeBuilder::new("nor@70009000")
                    .prop_strlist("compatible", &["nvidia,tegra20-nor"])
                    .prop_u32_list("reg", &[0x7000_9000, 0x1000])
                    .prop_u32_list("clocks", &[1, 42])
                    .prop_u32("#address-cells", 1)
                    .prop_u32("#size-cells", 1)
                    .child(
                        NodeBuilder::new("flash@0")
                            .prop_strlist("compatible", &["cfi-flash"])
                            .prop_u32_list("reg", &[0x0, 0x0400_0000]),
                    ),
            )
            .child(
                NodeBuilder::new("car@60006000")
                    .prop_u32("#clock-cells", 1)
                    .prop_u32("phandle", 1),
            )
            .build_with_reserved(vec![0x1000..0x2000]);
        FdtWriter::write(&tree)
    }

    #[test]
    fn reads_written_blob() {
        let blob = sample_blob();
        let tree = FdtReader::new(&blob).read().unwrap();
        let nor = tree.get_node("/nor@70009000").unwrap();
        assert_eq!(tree.get_compatible(nor), vec!["nvidia,tegra20-nor"]);
        assert_eq!(tree.get_reg_value(nor), Ok(vec![0x7000_9000..0x7000_a000]));
        let flash = tree.get_node("/nor@70009000/flash@0").unwrap();
        assert_eq!(tree.get_parent(flash).node_id, nor.node_id);
        assert_eq!(tree.get_reg_value(flash), Ok(vec![0x0..0x0400_0000]));
        let car = tree.get_node_by_phandle(1).unwrap();
        assert_eq!(&*car.full_name, "car@60006000");
        assert_eq!(tree.mem_rsv_map[0], 0x1000..0x2000);
        assert_eq!(tree.mem_rsv_map.len(), 2);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut blob = sample_blob();
        blob[0] = 0;
        assert!(matches!(
            FdtReader::new(&blob).read(),
            Err(FdtError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn rejects_incompatible_version() {
        let blob = sample_blob();
        let mut header = FdtHeader::parse(&blob).unwrap();
        header.version = 15;
        let mut patched = blob.clone();
        patched[..40].copy_from_slice(&header.to_bytes());
        assert_eq!(
            FdtReader::new(&patched).read().err(),
            Some(FdtError::IncompatibleVersion { version: 15 })
        );
    }

    #[test]
    fn rejects_truncated_blob() {
        let blob = sample_blob();
        let short = &blob[..blob.len() - 8];
        assert!(matches!(
            FdtReader::new(short).read(),
            Err(FdtError::Truncated { .. })
        ));
        assert!(matches!(
            FdtReader::new(&blob[..12]).read(),
            Err(FdtError::Truncated { .. })
        ));
    }
}
