use crate::prop::{Property, PropertyError};
use alloc::{boxed::Box, collections::btree_map::BTreeMap, string::String, vec, vec::Vec};
use core::ops::Range;

pub struct DeviceTree {
    pub root_id: usize,
    pub container: Vec<Node>,
    pub mem_rsv_map: Vec<Range<usize>>,
    /// phandle value to node id
    pub phandle_map: BTreeMap<u32, usize>,
}

pub struct Node {
    pub node_id: usize,
    pub parent_id: usize,
    pub full_name: Box<str>,
    pub node_name: Box<str>,
    pub unit_addr: Box<str>,
    pub children: Vec<usize>,
    pub props: Vec<Property>,
    pub node_type: NodeType,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum NodeType {
    Device,
    Description,
}

impl Node {
    /// Split `name@unit` and create a detached node.
    pub fn new(node_id: usize, full_name: &str, props: Vec<Property>, children: Vec<usize>) -> Node {
        let (node_name, unit_addr) = full_name.split_once('@').unwrap_or((full_name, ""));
        Node {
            node_id,
            parent_id: node_id,
            full_name: Box::from(full_name),
            node_name: Box::from(node_name),
            unit_addr: Box::from(unit_addr),
            children,
            props,
            node_type: NodeType::Device,
        }
    }
}

impl DeviceTree {
    /// Assemble a tree from an arena whose `parent_id` links are already set.
    ///
    /// Collect phandles and tag the nodes that only describe the system.
    pub fn from_parts(container: Vec<Node>, root_id: usize, mem_rsv_map: Vec<Range<usize>>) -> DeviceTree {
        let mut tree = DeviceTree {
            root_id,
            container,
            mem_rsv_map,
            phandle_map: BTreeMap::new(),
        };
        let handles: Vec<(u32, usize)> = tree
            .container
            .iter()
            .filter_map(|node| {
                let prop = tree
                    .get_property(node, "phandle")
                    .or_else(|| tree.get_property(node, "linux,phandle"))?;
                Some((prop.value_as_u32().ok()?, node.node_id))
            })
            .collect();
        tree.phandle_map.extend(handles);
        for path in ["/aliases", "/chosen", "/reserved-memory"] {
            if let Some(node) = tree.get_node_mut(path) {
                node.node_type = NodeType::Description;
            }
        }
        tree.get_nodes_mut("/memory", |node| {
            node.node_type = NodeType::Description;
        });
        tree
    }

    pub fn root(&self) -> &Node {
        &self.container[self.root_id]
    }
    pub fn is_root(&self, node: &Node) -> bool {
        self.get_parent(node).node_id == node.node_id
    }
    fn full_path(&self, node: &Node) -> String {
        if self.is_root(node) {
            String::from("")
        } else {
            self.full_path(self.get_parent(node)) + "/" + node.full_name.as_ref()
        }
    }
    pub fn get_full_path(&self, node: &Node) -> Box<str> {
        if self.is_root(node) {
            return Box::from("/");
        }
        self.full_path(node).into_boxed_str()
    }
    pub fn get_parent(&self, node: &Node) -> &Node {
        &self.container[node.parent_id]
    }
    pub fn get_children<'b>(&'b self, node: &Node) -> impl Iterator<Item = &'b Node> {
        node.children.iter().map(|x| &self.container[*x])
    }
    pub fn get_property<'b>(&self, node: &'b Node, name: impl AsRef<str>) -> Option<&'b Property> {
        let name = name.as_ref();
        node.props.iter().find(|prop| prop.name.as_ref().eq(name))
    }
    pub fn get_node_by_phandle(&self, phandle: u32) -> Option<&Node> {
        self.phandle_map.get(&phandle).map(|id| &self.container[*id])
    }
    fn find_node_id(&self, path: &str) -> Option<usize> {
        let mut node = &self.container[self.root_id];
        for section in path.split('/') {
            if section.trim().is_empty() {
                continue;
            }
            node = self
                .get_children(node)
                .find(|subnode| subnode.full_name.as_ref().eq(section))?;
        }
        Some(node.node_id)
    }
    pub fn get_node(&self, path: impl AsRef<str>) -> Option<&Node> {
        let id = self.find_node_id(path.as_ref())?;
        Some(&self.container[id])
    }
    pub fn get_node_mut(&mut self, path: impl AsRef<str>) -> Option<&mut Node> {
        let id = self.find_node_id(path.as_ref())?;
        Some(&mut self.container[id])
    }
    /// Resolve a path whose sections may be `*`, a full name or a bare node name.
    pub fn get_nodes(&self, path: impl AsRef<str>) -> Vec<&Node> {
        let path: Vec<&str> = path.as_ref().split('/').collect();
        self.get_sub_nodes(self.root(), &path, 0)
    }
    pub fn get_nodes_mut<F: Fn(&mut Node)>(&mut self, path: impl AsRef<str>, f: F) {
        let ids: Vec<usize> = self.get_nodes(path).iter().map(|x| x.node_id).collect();
        for id in ids {
            f(&mut self.container[id]);
        }
    }
    fn get_sub_nodes<'b>(&'b self, node: &'b Node, path: &[&str], mut cursor: usize) -> Vec<&'b Node> {
        while cursor < path.len() && path[cursor].trim().is_empty() {
            cursor += 1;
        }
        if cursor >= path.len() {
            return vec![node];
        }
        let sec = path[cursor];
        self.get_children(node)
            .flat_map(|child| {
                if sec.eq("*")
                    || child.full_name.as_ref().eq(sec)
                    || child.node_name.as_ref().eq(sec)
                {
                    self.get_sub_nodes(child, path, cursor + 1)
                } else {
                    vec![]
                }
            })
            .collect()
    }
    /// Entries of the `compatible` property, most specific first.
    pub fn get_compatible<'b>(&self, node: &'b Node) -> Vec<&'b str> {
        self.get_property(node, "compatible")
            .and_then(|prop| prop.value_as_strlist().ok())
            .unwrap_or_default()
    }
    /// A node without `status` is available.
    pub fn is_available(&self, node: &Node) -> bool {
        match self.get_property(node, "status") {
            None => true,
            Some(prop) => matches!(prop.value_as_str(), Ok("okay") | Ok("ok")),
        }
    }
    pub fn get_reg_value(&self, node: &Node) -> Result<Vec<Range<usize>>, PropertyError> {
        let mut size_cel = 1;
        let mut addr_cel = 2;
        if !self.is_root(node) {
            let parent = self.get_parent(node);
            if let Some(prop) = self.get_property(parent, "#address-cells") {
                addr_cel = prop.value_as_u32()? as usize;
            }
            if let Some(prop) = self.get_property(parent, "#size-cells") {
                size_cel = prop.value_as_u32()? as usize;
            }
        }
        let reg = self
            .get_property(node, "reg")
            .ok_or(PropertyError::PropNotFound)?;
        let reg = reg.value_as_u32_list()?;
        let width = size_cel + addr_cel;
        if width == 0 || reg.len() % width != 0 {
            return Err(PropertyError::InvalidPropFormat);
        }
        let res = reg
            .chunks_exact(width)
            .map(|entry| {
                let (addr, size) = entry.split_at(addr_cel);
                let addr = addr.iter().fold(0usize, |acc, c| (acc << 32) + *c as usize);
                let size = size.iter().fold(0usize, |acc, c| (acc << 32) + *c as usize);
                addr..addr + size
            })
            .collect();
        Ok(res)
    }
}
