//! Built-in drivers.

use crate::dev::platform::Platform;
use alloc::sync::Arc;

pub mod fixed_clk;
pub mod tegra_nor;

/// Register every built-in driver with `platform`.
pub fn register_drivers(platform: &Platform) {
    platform.register_driver(Arc::new(fixed_clk::FixedClockDriver));
    platform.register_driver(Arc::new(tegra_nor::TegraNorDriver));
}
