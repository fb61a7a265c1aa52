//! Platform layer: devices, drivers and the services drivers consume while probing.

pub mod clk;
pub mod device;
pub mod driver;
pub mod handle;
pub mod mmio;
pub mod of;
pub mod platform;
pub mod resource;

pub use device::Device;
