//! Firmware node handles.
//!
//! A [FwNode] pins the whole [DeviceTree] so devices can keep their node for as long as
//! they live, independently of who parsed the blob.

use crate::dev::mmio::IoRange;
use alloc::{boxed::Box, format, sync::Arc, vec::Vec};
use core::fmt::Debug;
use dt::{
    node::{DeviceTree, Node, NodeType},
    prop::{Property, PropertyError},
};

/// Bus nodes whose children are populated together with the bus itself.
pub const DEFAULT_BUS_MATCH_TABLE: &[&str] = &["simple-bus", "simple-mfd", "isa", "arm,amba-bus"];

#[derive(Clone)]
pub struct FwNode {
    tree: Arc<DeviceTree>,
    id: usize,
}

impl FwNode {
    pub fn new(tree: Arc<DeviceTree>, id: usize) -> FwNode {
        FwNode { tree, id }
    }

    pub fn root(tree: Arc<DeviceTree>) -> FwNode {
        let id = tree.root_id;
        FwNode { tree, id }
    }

    pub fn tree(&self) -> &Arc<DeviceTree> {
        &self.tree
    }

    pub fn node(&self) -> &Node {
        &self.tree.container[self.id]
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn full_name(&self) -> &str {
        &self.node().full_name
    }

    pub fn full_path(&self) -> Box<str> {
        self.tree.get_full_path(self.node())
    }

    pub fn compatible(&self) -> Vec<&str> {
        self.tree.get_compatible(self.node())
    }

    pub fn is_available(&self) -> bool {
        self.tree.is_available(self.node())
    }

    pub fn is_description(&self) -> bool {
        self.node().node_type == NodeType::Description
    }

    pub fn child_count(&self) -> usize {
        self.node().children.len()
    }

    pub fn children(&self) -> impl Iterator<Item = FwNode> + '_ {
        self.node()
            .children
            .iter()
            .map(|id| FwNode::new(self.tree.clone(), *id))
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.tree.get_property(self.node(), name)
    }

    /// Decoded `reg` entries. A node without `reg` has no ranges.
    pub fn reg(&self) -> Result<Vec<IoRange>, PropertyError> {
        match self.tree.get_reg_value(self.node()) {
            Ok(ranges) => Ok(ranges.into_iter().map(IoRange::from).collect()),
            Err(PropertyError::PropNotFound) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    pub fn phandle(&self) -> Option<u32> {
        self.property("phandle")
            .or_else(|| self.property("linux,phandle"))
            .and_then(|prop| prop.value_as_u32().ok())
    }

    /// `<unit-addr>.<node-name>`, or the bare node name without a unit address.
    pub fn bus_id(&self) -> Box<str> {
        let node = self.node();
        if node.unit_addr.is_empty() {
            node.node_name.clone()
        } else {
            format!("{}.{}", node.unit_addr, node.node_name).into_boxed_str()
        }
    }

    /// Whether the node is compatible with any entry of `matches`.
    pub fn match_table(&self, matches: &[&str]) -> bool {
        self.compatible().iter().any(|comp| matches.contains(comp))
    }
}

impl PartialEq for FwNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree) && self.id == other.id
    }
}

impl Debug for FwNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FwNode({})", self.full_path())
    }
}
