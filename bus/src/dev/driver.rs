//! Driver subsystem: registration, discovery and error types.
//!
//! Responsibilities:
//! - Provide the [Driver] trait for platform drivers and a [DriverRegistry] mapping
//!   compatible strings to driver implementations.
//! - Keep driver instances alive for the lifetime of the platform; candidates are handed
//!   out as [Arc] clones so no lock is held while a driver probes.
//!
//! Ownership and concurrency notes:
//! - The compatible map is protected by an [RwLock] for reader-heavy access patterns.
//! - **Candidates returned by [DriverRegistry::find_drivers] are in registration order.**
use crate::dev::{Device, handle::Handle, platform::Platform};
use alloc::{collections::btree_map::BTreeMap, sync::Arc, vec, vec::Vec};
use core::fmt::Debug;
use dt::prop::PropertyError;
use spin::RwLock;

/// When a driver may be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePolicy {
    /// Bind whenever a matching device shows up.
    Hotplug,
    /// Bind only devices present while the platform boots.
    BootOnly,
}

/// Descriptive metadata of a driver module.
#[derive(Debug)]
pub struct ModuleInfo {
    pub name: &'static str,
    pub author: &'static str,
    pub description: &'static str,
    pub license: &'static str,
}

/// Trait implemented by drivers.
///
/// Responsibilities:
/// - Identify compatible strings via [Driver::get_comp_strs] so the registry can discover candidates.
/// - Implement [Driver::probe] to bind to a [Device]. Return `Ok(())` on success or a [DriverProbeError].
/// - Provide an optional hook [Driver::on_registered] that runs once at registration time.
///
/// Guarantees and expectations:
/// - A failed probe must not rely on cleanup of its own managed resources: the platform
///   releases them after the probe returns.
/// - [Driver::probe] runs without any platform lock held and may populate child devices.
pub trait Driver: Send + Sync + Debug {
    fn get_name(&self) -> &'static str;
    fn get_comp_strs(&self) -> &'static [&'static str];
    fn probe(&self, platform: &Platform, dev: &Handle<Device>) -> Result<(), DriverProbeError>;
    fn probe_policy(&self) -> ProbePolicy {
        ProbePolicy::Hotplug
    }
    fn module_info(&self) -> Option<&'static ModuleInfo> {
        None
    }
    fn on_registered(&self) {}
}

/// Registry mapping from compatible string to candidate drivers.
pub struct DriverRegistry {
    comp_map: RwLock<BTreeMap<&'static str, Vec<Arc<dyn Driver>>>>,
    drivers: RwLock<Vec<Arc<dyn Driver>>>,
}

impl DriverRegistry {
    pub const fn new() -> DriverRegistry {
        DriverRegistry {
            comp_map: RwLock::new(BTreeMap::new()),
            drivers: RwLock::new(vec![]),
        }
    }

    /// Register a driver instance.
    ///
    /// Steps:
    /// 1. Log registration and invoke [Driver::on_registered].
    /// 2. Keep the instance in the registry.
    /// 3. Insert it into the compatible map under each compatible string of the driver.
    pub fn register(&self, driver: Arc<dyn Driver>) {
        match driver.module_info() {
            Some(info) => {
                debug_ex!(
                    "\tRegistered driver '{}' ({}, {}).",
                    driver.get_name(),
                    info.description,
                    info.license
                );
            }
            None => {
                debug_ex!("\tRegistered driver '{}'.", driver.get_name());
            }
        }
        driver.on_registered();
        self.drivers.write().push(driver.clone());

        let mut guard = self.comp_map.write();
        for comp in driver.get_comp_strs() {
            guard.entry(*comp).or_default().push(driver.clone());
        }
    }

    /// Look up drivers matching `comp_str`. Return an empty vec if none match.
    pub fn find_drivers(&self, comp_str: &str) -> Vec<Arc<dyn Driver>> {
        let guard = self.comp_map.read();
        match guard.get(comp_str) {
            Some(drv) => drv.clone(),
            None => vec![],
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers
            .read()
            .iter()
            .find(|drv| drv.get_name() == name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.drivers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// region: Error Types

/// Errors that may be returned by [Driver::probe].
///
/// Underlying subsystem errors are wrapped unchanged so callers can tell exactly which
/// step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverProbeError {
    /// MMIO-related failures (address missing, invalid or busy).
    Mmio(MmioError),
    /// Clock lookup or gating failures.
    Clk(ClkError),
    /// Child devices could not be created.
    Populate(PopulateError),
    /// Custom driver-specific information.
    Customized { info: &'static str },
}

impl DriverProbeError {
    /// Whether the probe should be retried once more providers are available.
    pub fn is_defer(&self) -> bool {
        matches!(self, DriverProbeError::Clk(ClkError::ProbeDefer))
    }
}

/// MMIO-related probe failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmioError {
    /// MMIO space is not enough.
    NotEnoughSpace,
    /// MMIO address is invalid or out of supported range.
    InvalidAddress,
    /// Device did not specify MMIO resources.
    AddressNotSpecified,
    /// The region is already claimed.
    Busy,
    /// Access outside the mapped register file.
    OutOfRange,
}

/// Clock lookup and gating failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClkError {
    /// The consumer does not reference such a clock.
    NotFound,
    /// The provider exists in the device tree but has not registered yet.
    ProbeDefer,
    /// The `clocks` specifier is malformed or points to no node.
    InvalidSpecifier,
    /// A provider is already registered under this phandle.
    DuplicatedProvider,
    /// `enable` was called on a clock that is not prepared.
    NotPrepared,
    /// The provider failed with a hardware-specific code.
    Failed(i32),
}

/// Child device creation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulateError {
    /// A child node carries a malformed property.
    Property(PropertyError),
    /// Another device already uses the bus id.
    DuplicateName,
    /// The parent device has no firmware node to walk.
    NoNode,
}

impl From<MmioError> for DriverProbeError {
    fn from(err: MmioError) -> Self {
        DriverProbeError::Mmio(err)
    }
}

impl From<ClkError> for DriverProbeError {
    fn from(err: ClkError) -> Self {
        DriverProbeError::Clk(err)
    }
}

impl From<PopulateError> for DriverProbeError {
    fn from(err: PopulateError) -> Self {
        DriverProbeError::Populate(err)
    }
}

// endregion
