//! The platform bus: devices created from the device tree and bound to drivers.
//!
//! Responsibilities:
//! - Walk the device tree and create a [Device] for every node that should become one
//!   ([Platform::populate]).
//! - Bind devices to drivers by compatible string, in the order the node lists them
//!   ([Platform::probe_device]), and retry devices whose probe was deferred.
//! - Hand out managed resources: claimed register regions ([Platform::ioremap_resource])
//!   and clock references ([Platform::devm_clk_get]).
//!
//! No platform lock is held while a driver probes, so a probe may populate its own children.

use crate::{
    dev::{
        Device,
        clk::{Clk, ClockRegistry},
        driver::{ClkError, Driver, DriverProbeError, DriverRegistry, MmioError, PopulateError, ProbePolicy},
        handle::Handle,
        mmio::{IoAccess, IoMem, IoRangeValidationType},
        of::{DEFAULT_BUS_MATCH_TABLE, FwNode},
        resource::IoResourceMap,
    },
    drivers,
};
use alloc::{
    boxed::Box,
    collections::btree_set::BTreeSet,
    sync::Arc,
    vec,
    vec::Vec,
};
use core::{
    mem::take,
    ops::Range,
    sync::atomic::{AtomicBool, Ordering},
};
use dt::node::DeviceTree;
use spin::{Mutex, Once};

pub struct Platform {
    tree: Arc<DeviceTree>,
    drivers: DriverRegistry,
    clocks: Arc<ClockRegistry>,
    io: Arc<IoResourceMap>,
    backend: Arc<dyn IoAccess>,
    root: Handle<Device>,
    /// Bus ids in use.
    names: Mutex<BTreeSet<Box<str>>>,
    /// Ids of nodes that already have a device.
    populated: Mutex<BTreeSet<usize>>,
    deferred: Mutex<Vec<Handle<Device>>>,
    booted: AtomicBool,
}

impl Platform {
    pub fn new(tree: Arc<DeviceTree>, backend: Arc<dyn IoAccess>) -> Platform {
        let root = Device::new("platform", None, Some(FwNode::root(tree.clone())), vec![]);
        Platform {
            tree,
            drivers: DriverRegistry::new(),
            clocks: Arc::new(ClockRegistry::new()),
            io: Arc::new(IoResourceMap::new()),
            backend,
            root: Handle::from(root),
            names: Mutex::new(BTreeSet::new()),
            populated: Mutex::new(BTreeSet::new()),
            deferred: Mutex::new(vec![]),
            booted: AtomicBool::new(false),
        }
    }

    pub fn tree(&self) -> &Arc<DeviceTree> {
        &self.tree
    }

    /// The device standing for the tree's root node.
    pub fn root(&self) -> &Handle<Device> {
        &self.root
    }

    pub fn clocks(&self) -> &Arc<ClockRegistry> {
        &self.clocks
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    pub fn register_driver(&self, driver: Arc<dyn Driver>) {
        self.drivers.register(driver);
    }

    pub fn is_booted(&self) -> bool {
        self.booted.load(Ordering::Acquire)
    }

    /// End of boot. Boot-only drivers bind nothing from now on.
    pub fn finish_boot(&self) {
        self.booted.store(true, Ordering::Release);
        let pending = self.deferred.lock().len();
        if pending > 0 {
            log::warn!("{} device(s) still waiting for resources after boot", pending);
        }
        log::info!("Platform booted.");
    }

    /// Create a device for `node` below `parent`. The device is not probed.
    pub fn create_device(
        &self,
        parent: &Handle<Device>,
        node: FwNode,
    ) -> Result<Handle<Device>, PopulateError> {
        let io_ranges = node.reg().map_err(PopulateError::Property)?;
        let name = node.bus_id();
        if !self.names.lock().insert(name.clone()) {
            return Err(PopulateError::DuplicateName);
        }
        self.populated.lock().insert(node.id());
        let dev = Handle::from(Device::new(
            &name,
            Some(parent.create_ref()),
            Some(node),
            io_ranges,
        ));
        parent.add_child(dev.clone());
        dev_dbg!(dev, "created with {:?}", dev.io_ranges);
        Ok(dev)
    }

    /// Try to bind `dev` to a driver.
    ///
    /// Compatible strings are tried most specific first, and for each of them the
    /// candidates in registration order. A failed attempt drops every resource the
    /// driver acquired. A deferred attempt queues the device for [Platform::retry_deferred],
    /// unless the driver is boot-only: those get a single attempt.
    ///
    /// Returns the name of the bound driver, `None` if no driver wants the device, or the
    /// error of the last failed attempt.
    pub fn probe_device(&self, dev: &Handle<Device>) -> Result<Option<&'static str>, DriverProbeError> {
        if let Some(bound) = dev.driver() {
            return Ok(Some(bound));
        }
        let Some(node) = dev.node.clone() else {
            return Ok(None);
        };
        let booted = self.is_booted();
        let mut result = Ok(None);
        for comp in node.compatible() {
            for driver in self.drivers.find_drivers(comp) {
                if booted && driver.probe_policy() == ProbePolicy::BootOnly {
                    dev_dbg!(dev, "'{}' only binds during boot", driver.get_name());
                    continue;
                }
                match driver.probe(self, dev) {
                    Ok(()) => {
                        dev.bind(driver.get_name());
                        self.deferred.lock().retain(|x| !x.ptr_eq(dev));
                        dev_dbg!(dev, "bound to '{}'", driver.get_name());
                        self.retry_deferred();
                        return Ok(Some(driver.get_name()));
                    }
                    Err(err) => {
                        dev.clear_drvdata();
                        dev.release_resources();
                        if err.is_defer() && driver.probe_policy() == ProbePolicy::BootOnly {
                            dev_warn!(dev, "'{}' does not support probe deferral", driver.get_name());
                        } else if err.is_defer() {
                            let mut queue = self.deferred.lock();
                            if !queue.iter().any(|x| x.ptr_eq(dev)) {
                                queue.push(dev.clone());
                            }
                            drop(queue);
                            dev_dbg!(dev, "probe deferred");
                        } else {
                            dev_warn!(dev, "probe with driver '{}' failed: {:?}", driver.get_name(), err);
                        }
                        result = Err(err);
                    }
                }
            }
        }
        result
    }

    /// Probe every deferred device once more.
    pub fn retry_deferred(&self) {
        let pending = take(&mut *self.deferred.lock());
        for dev in pending {
            // a deferred probe queues the device again
            let _ = self.probe_device(&dev);
        }
    }

    pub fn deferred_count(&self) -> usize {
        self.deferred.lock().len()
    }

    /// Create and probe devices for the children of `parent`'s node.
    ///
    /// Nodes without `compatible`, disabled nodes, description nodes and nodes that
    /// already have a device are skipped. Children compatible with `matches` are buses:
    /// their own children are populated as well. Probe failures only leave the device
    /// unbound; the first failure to create a device stops the walk.
    pub fn populate(&self, parent: &Handle<Device>, matches: &[&str]) -> Result<(), PopulateError> {
        let node = parent.node.clone().ok_or(PopulateError::NoNode)?;
        for child in node.children() {
            if child.compatible().is_empty()
                || !child.is_available()
                || child.is_description()
                || self.populated.lock().contains(&child.id())
            {
                continue;
            }
            let dev = self.create_device(parent, child.clone())?;
            if let Err(err) = self.probe_device(&dev) {
                dev_dbg!(dev, "left unbound: {:?}", err);
            }
            if child.match_table(matches) {
                self.populate(&dev, matches)?;
            }
        }
        Ok(())
    }

    pub fn default_populate(&self) -> Result<(), PopulateError> {
        self.populate(&self.root, DEFAULT_BUS_MATCH_TABLE)
    }

    /// Remove `dev` and everything below it.
    ///
    /// Driver data and managed resources are dropped; drivers have no remove hook, so a
    /// clock a driver enabled keeps running.
    pub fn remove_device(&self, dev: &Handle<Device>) {
        for child in dev.children() {
            self.remove_device(&child);
        }
        dev.clear_drvdata();
        dev.release_resources();
        dev.unbind();
        self.deferred.lock().retain(|x| !x.ptr_eq(dev));
        if let Some(parent) = dev.parent.as_ref().and_then(|p| p.get_handle()) {
            parent.remove_child(dev);
        }
        self.names.lock().remove(&dev.name);
        if let Some(node) = &dev.node {
            self.populated.lock().remove(&node.id());
        }
        dev_dbg!(dev, "removed");
    }

    /// Claim register region `index` of `dev` and map at least `SIZE` bytes of it.
    ///
    /// The claim is a managed resource of the device.
    pub fn ioremap_resource<const SIZE: usize>(
        &self,
        dev: &Handle<Device>,
        index: usize,
    ) -> Result<IoMem<SIZE>, MmioError> {
        let range = dev
            .io_ranges
            .get(index)
            .ok_or(MmioError::AddressNotSpecified)?
            .clone();
        if range.is_empty() {
            return Err(MmioError::InvalidAddress);
        }
        if !range.validate_size(SIZE, IoRangeValidationType::Compatible) {
            return Err(MmioError::NotEnoughSpace);
        }
        let claim = self.io.claim(range.clone())?;
        dev.add_resource(claim);
        Ok(IoMem::new(range.start, self.backend.clone()))
    }

    /// Look up a clock of `dev`. The reference is also kept as a managed resource.
    pub fn devm_clk_get(&self, dev: &Handle<Device>, name: Option<&str>) -> Result<Clk, ClkError> {
        let node = dev.node.as_ref().ok_or(ClkError::NotFound)?;
        let clk = self.clocks.get(node, name)?;
        dev.add_resource(clk.clone());
        Ok(clk)
    }

    pub fn is_claimed(&self, range: &Range<usize>) -> bool {
        self.io.is_claimed(range)
    }

    /// Find a device by bus id anywhere below the root.
    pub fn find_device(&self, name: &str) -> Option<Handle<Device>> {
        fn walk(dev: &Handle<Device>, name: &str) -> Option<Handle<Device>> {
            if dev.name.as_ref() == name {
                return Some(dev.clone());
            }
            dev.children().iter().find_map(|child| walk(child, name))
        }
        walk(&self.root, name)
    }
}

static PLATFORM: Once<Platform> = Once::new();

/// Bring the platform up: register the built-in drivers, create devices for the tree
/// and close the boot window.
pub fn init(tree: Arc<DeviceTree>, backend: Arc<dyn IoAccess>) -> &'static Platform {
    let mut fresh = false;
    let platform = PLATFORM.call_once(|| {
        fresh = true;
        Platform::new(tree, backend)
    });
    if !fresh {
        panic_init!("the platform is already initialized");
    }
    drivers::register_drivers(platform);
    if let Err(err) = platform.default_populate() {
        log::error!("Failed to populate the platform: {:?}", err);
    }
    platform.finish_boot();
    platform
}

/// Boot from a flattened device tree in memory, with register access through the
/// configured linear mapping.
///
/// # Safety
/// `dtb` must point to a valid blob that stays mapped forever, and every device region
/// it describes must be mapped at `phys + MMIO_VIRT_OFFSET`.
pub unsafe fn boot(dtb: *const u8) -> &'static Platform {
    crate::logging::init();
    let mut reader = unsafe { dt::fdt::reader::FdtReader::from_ptr(dtb) }
        .unwrap_or_else(|err| panic_init!("Invalid device tree blob: {:?}", err));
    let tree = reader
        .read()
        .unwrap_or_else(|err| panic_init!("Error parsing device tree: {:?}", err));
    // SAFETY: forwarded from the caller.
    let backend = unsafe { crate::dev::mmio::PhysMmio::from_config() };
    init(Arc::new(tree), Arc::new(backend))
}

pub fn get_platform() -> &'static Platform {
    PLATFORM
        .get()
        .unwrap_or_else(|| panic_init!("the platform is used before initialization"))
}
