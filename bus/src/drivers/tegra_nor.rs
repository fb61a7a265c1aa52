//! Nvidia Tegra20/30 NOR/SNOR/GMI controller.
//!
//! The controller only needs to be clocked and switched on to give its children (NOR
//! flash, FPGAs and other memory-mapped parts on the GMI bus) access to the bus. The
//! timing registers are left at their reset values.

use crate::dev::{
    Device,
    clk::Clk,
    driver::{Driver, DriverProbeError, ModuleInfo, ProbePolicy},
    handle::Handle,
    mmio::IoMem,
    of::DEFAULT_BUS_MATCH_TABLE,
    platform::Platform,
};
use bitflags::bitflags;

pub const TEGRA_NOR_CONFIG: usize = 0x00;
pub const TEGRA_NOR_STATUS: usize = 0x04;
pub const TEGRA_NOR_ADDR_PTR: usize = 0x08;
pub const TEGRA_NOR_AHB_ADDR_PTR: usize = 0x0c;
pub const TEGRA_NOR_TIMING0: usize = 0x10;
pub const TEGRA_NOR_TIMING1: usize = 0x14;
pub const TEGRA_NOR_MIO_CONFIG: usize = 0x18;
pub const TEGRA_NOR_MIO_TIMING: usize = 0x1c;
pub const TEGRA_NOR_DMA_CONFIG: usize = 0x20;
pub const TEGRA_NOR_CS_MUX_CONFIG: usize = 0x24;
/// Size of the register file.
pub const TEGRA_NOR_REG_SIZE: usize = 0x28;

bitflags! {
    /// Fields of the CONFIG register written by the driver.
    pub struct NorConfig: u32 {
        /// Start the controller.
        const GO            = 1 << 31;
        /// Multiplexed address/data bus.
        const MUX           = 1 << 28;
        /// ADV is active high.
        const ADV_POL       = 1 << 22;
        /// Chip select, bits [7:4].
        const SNOR_CS_MASK  = 0xf << 4;
    }
}

impl NorConfig {
    pub const fn snor_cs(cs: u32) -> NorConfig {
        NorConfig::from_bits_truncate((cs << 4) & NorConfig::SNOR_CS_MASK.bits())
    }
}

pub const NOR_ID_TABLE: &[&str] = &[
    // Tegra30
    "nvidia,tegra30-nor",
    // Tegra20
    "nvidia,tegra20-nor",
];

pub static MODULE_INFO: ModuleInfo = ModuleInfo {
    name: "tegra-nor",
    author: "Host Mobility AB",
    description: "Nvidia Tegra20/30 NOR/SNOR/GMI Controller Driver",
    license: "GPL",
};

/// State of a bound controller, kept as driver data of its device.
pub struct TegraNor {
    mem: IoMem<TEGRA_NOR_REG_SIZE>,
    clk: Clk,
}

impl TegraNor {
    pub fn config(&self) -> NorConfig {
        NorConfig::from_bits_truncate(self.mem.read32::<TEGRA_NOR_CONFIG>())
    }

    pub fn base(&self) -> usize {
        self.mem.base()
    }

    pub fn clk(&self) -> &Clk {
        &self.clk
    }
}

#[derive(Debug)]
pub struct TegraNorDriver;

/// Program the chip select and bus mode, start the controller, then create the devices
/// sitting on the bus.
fn nor_parse_dt(
    platform: &Platform,
    dev: &Handle<Device>,
    mem: &IoMem<TEGRA_NOR_REG_SIZE>,
) -> Result<(), DriverProbeError> {
    let config = NorConfig::snor_cs(4) | NorConfig::MUX | NorConfig::ADV_POL;
    mem.write32::<TEGRA_NOR_CONFIG>(config.bits());

    // GO goes in a second write, on top of whatever the controller reports back
    let config = mem.read32::<TEGRA_NOR_CONFIG>() | NorConfig::GO.bits();
    mem.write32::<TEGRA_NOR_CONFIG>(config);

    let Some(node) = dev.node.as_ref() else {
        return Ok(());
    };
    if node.child_count() > 0 {
        platform
            .populate(dev, DEFAULT_BUS_MATCH_TABLE)
            .map_err(|err| {
                dev_err!(dev, "{} fail to create devices.", node.full_path());
                err
            })?;
    }
    Ok(())
}

impl Driver for TegraNorDriver {
    fn get_name(&self) -> &'static str {
        MODULE_INFO.name
    }

    fn get_comp_strs(&self) -> &'static [&'static str] {
        NOR_ID_TABLE
    }

    fn probe_policy(&self) -> ProbePolicy {
        ProbePolicy::BootOnly
    }

    fn module_info(&self) -> Option<&'static ModuleInfo> {
        Some(&MODULE_INFO)
    }

    fn probe(&self, platform: &Platform, dev: &Handle<Device>) -> Result<(), DriverProbeError> {
        let mem = platform.ioremap_resource::<TEGRA_NOR_REG_SIZE>(dev, 0)?;
        let clk = platform.devm_clk_get(dev, None)?;
        clk.prepare_enable()?;

        if let Err(err) = nor_parse_dt(platform, dev, &mem) {
            clk.disable_unprepare();
            return Err(err);
        }

        dev_info!(dev, "Driver registered.");
        dev.set_drvdata(TegraNor { mem, clk });
        Ok(())
    }
}
