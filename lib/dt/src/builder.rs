//! Assemble a [DeviceTree] in code.
//!
//! Properties are stored exactly as a flattened device tree would carry them: cells are
//! big-endian and strings are NUL-terminated.

use crate::{
    node::{DeviceTree, Node},
    prop::Property,
};
use alloc::{boxed::Box, vec, vec::Vec};
use core::ops::Range;

pub struct NodeBuilder {
    full_name: Box<str>,
    props: Vec<Property>,
    children: Vec<NodeBuilder>,
}

impl NodeBuilder {
    /// Start a node. The root node has an empty name.
    pub fn new(full_name: &str) -> NodeBuilder {
        NodeBuilder {
            full_name: Box::from(full_name),
            props: vec![],
            children: vec![],
        }
    }

    pub fn prop_bytes(mut self, name: &str, data: &[u8]) -> Self {
        self.props.push(Property::new(name, data));
        self
    }

    pub fn prop_empty(self, name: &str) -> Self {
        self.prop_bytes(name, &[])
    }

    pub fn prop_u32(self, name: &str, value: u32) -> Self {
        self.prop_bytes(name, &value.to_be_bytes())
    }

    pub fn prop_u32_list(self, name: &str, values: &[u32]) -> Self {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.prop_bytes(name, &data)
    }

    pub fn prop_str(self, name: &str, value: &str) -> Self {
        self.prop_strlist(name, &[value])
    }

    pub fn prop_strlist(self, name: &str, values: &[&str]) -> Self {
        let mut data = Vec::new();
        for value in values {
            data.extend_from_slice(value.as_bytes());
            data.push(0);
        }
        self.prop_bytes(name, &data)
    }

    pub fn child(mut self, child: NodeBuilder) -> Self {
        self.children.push(child);
        self
    }

    fn push_into(self, container: &mut Vec<Node>, parent_id: Option<usize>) -> usize {
        let id = container.len();
        container.push(Node::new(id, &self.full_name, self.props, vec![]));
        container[id].parent_id = parent_id.unwrap_or(id);
        for child in self.children {
            let child_id = child.push_into(container, Some(id));
            container[id].children.push(child_id);
        }
        id
    }

    /// Finish the tree with this node as its root.
    pub fn build(self) -> DeviceTree {
        self.build_with_reserved(vec![])
    }

    pub fn build_with_reserved(self, mem_rsv_map: Vec<Range<usize>>) -> DeviceTree {
        let mut container = vec![];
        let root_id = self.push_into(&mut container, None);
        DeviceTree::from_parts(container, root_id, mem_rsv_map)
    }
}
