//! Bring-up of the Nvidia Tegra20/30 NOR/SNOR/GMI bus controller.
//!
//! The crate carries a small platform layer ([dev]) modelled on the usual kernel split:
//! drivers matched by compatible strings, devices created from a device tree, managed
//! MMIO mappings and reference counted clocks. [drivers::tegra_nor] is the bus enabler
//! itself.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

#[doc(hidden)]
pub use log;

#[macro_use]
pub mod console;
#[macro_use]
pub mod logging;
pub mod dev;
pub mod drivers;

#[cfg(test)]
pub(crate) mod testing;

pub use dev::platform::{get_platform, init};
