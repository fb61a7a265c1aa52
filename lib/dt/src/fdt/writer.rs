use crate::{
    fdt::{FDT_HEADER_SIZE, FDT_MAGIC, FDT_VERSION, FdtHeader, FdtNodeType, LAST_COMP_VERSION},
    node::{DeviceTree, Node},
};
use alloc::{boxed::Box, collections::btree_map::BTreeMap, vec::Vec};
use utils::num::AlignableTo;

/// Serialize a [DeviceTree] into a version 17 flattened device tree blob.
///
/// Layout: header, memory reservation block, structure block, strings block.
pub struct FdtWriter {
    structure: Vec<u8>,
    strings: Vec<u8>,
    string_offsets: BTreeMap<Box<str>, u32>,
}

impl FdtWriter {
    pub fn write(tree: &DeviceTree) -> Vec<u8> {
        let mut writer = FdtWriter {
            structure: Vec::new(),
            strings: Vec::new(),
            string_offsets: BTreeMap::new(),
        };
        writer.write_node(tree, tree.root());
        writer.put_u32(FdtNodeType::FDT_END.bits());

        let mut rsvmap = Vec::new();
        for range in &tree.mem_rsv_map {
            rsvmap.extend_from_slice(&(range.start as u64).to_be_bytes());
            rsvmap.extend_from_slice(&(range.len() as u64).to_be_bytes());
        }
        rsvmap.extend_from_slice(&[0u8; 16]);

        let off_mem_rsvmap = FDT_HEADER_SIZE.align_up(8);
        let off_dt_struct = off_mem_rsvmap + rsvmap.len();
        let off_dt_strings = off_dt_struct + writer.structure.len();
        let totalsize = off_dt_strings + writer.strings.len();
        let header = FdtHeader {
            magic: FDT_MAGIC,
            totalsize: totalsize as u32,
            off_dt_struct: off_dt_struct as u32,
            off_dt_strings: off_dt_strings as u32,
            off_mem_rsvmap: off_mem_rsvmap as u32,
            version: FDT_VERSION,
            last_comp_version: LAST_COMP_VERSION,
            boot_cpuid_phys: 0,
            size_dt_strings: writer.strings.len() as u32,
            size_dt_struct: writer.structure.len() as u32,
        };

        let mut blob = Vec::with_capacity(totalsize);
        blob.extend_from_slice(&header.to_bytes());
        blob.resize(off_mem_rsvmap, 0);
        blob.extend_from_slice(&rsvmap);
        blob.extend_from_slice(&writer.structure);
        blob.extend_from_slice(&writer.strings);
        blob
    }

    fn put_u32(&mut self, value: u32) {
        self.structure.extend_from_slice(&value.to_be_bytes());
    }

    fn put_bytes_aligned(&mut self, bytes: &[u8]) {
        self.structure.extend_from_slice(bytes);
        let len = self.structure.len().align_up(4);
        self.structure.resize(len, 0);
    }

    fn string_offset(&mut self, name: &str) -> u32 {
        if let Some(offset) = self.string_offsets.get(name) {
            return *offset;
        }
        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(name.as_bytes());
        self.strings.push(0);
        self.string_offsets.insert(Box::from(name), offset);
        offset
    }

    fn write_node(&mut self, tree: &DeviceTree, node: &Node) {
        self.put_u32(FdtNodeType::FDT_BEGIN_NODE.bits());
        let mut name = Vec::from(node.full_name.as_bytes());
        name.push(0);
        self.put_bytes_aligned(&name);
        for prop in &node.props {
            let name_offset = self.string_offset(&prop.name);
            self.put_u32(FdtNodeType::FDT_PROP.bits());
            self.put_u32(prop.data.len() as u32);
            self.put_u32(name_offset);
            self.put_bytes_aligned(&prop.data);
        }
        for child in tree.get_children(node) {
            self.write_node(tree, child);
        }
        self.put_u32(FdtNodeType::FDT_END_NODE.bits());
    }
}
