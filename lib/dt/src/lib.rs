//! Device tree model shared by the platform layer.
//!
//! [node::DeviceTree] is an arena of [node::Node]s that can be obtained by parsing a
//! flattened device tree blob with [fdt::reader::FdtReader] or assembled in code with
//! [builder::NodeBuilder].
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod builder;
pub mod fdt;
pub mod node;
pub mod prop;
