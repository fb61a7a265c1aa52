use crate::dev::{
    handle::{Handle, HandleRef},
    mmio::IoRange,
    of::FwNode,
};
use alloc::{boxed::Box, vec, vec::Vec};
use core::{any::Any, fmt::Debug, mem::take};
use spin::{Mutex, RwLock};

/// Resource whose lifetime is bound to a device (a region claim, a clock reference, ...).
pub type ManagedResource = Box<dyn Any + Send + Sync>;

pub struct Device {
    /// Bus id, unique on the platform.
    pub name: Box<str>,
    pub parent: Option<HandleRef<Device>>,
    pub node: Option<FwNode>,
    /// Register ranges decoded from the node's `reg` property.
    pub io_ranges: Vec<IoRange>,
    children: RwLock<Vec<Handle<Device>>>,
    driver: RwLock<Option<&'static str>>,
    devres: Mutex<Vec<ManagedResource>>,
    drvdata: Mutex<Option<Box<dyn Any + Send + Sync>>>,
}

impl Device {
    pub fn new(
        name: &str,
        parent: Option<HandleRef<Device>>,
        node: Option<FwNode>,
        io_ranges: Vec<IoRange>,
    ) -> Device {
        Device {
            name: Box::from(name),
            parent,
            node,
            io_ranges,
            children: RwLock::new(vec![]),
            driver: RwLock::new(None),
            devres: Mutex::new(vec![]),
            drvdata: Mutex::new(None),
        }
    }

    pub fn children(&self) -> Vec<Handle<Device>> {
        self.children.read().clone()
    }

    pub fn find_child(&self, name: &str) -> Option<Handle<Device>> {
        self.children
            .read()
            .iter()
            .find(|child| child.name.as_ref() == name)
            .cloned()
    }

    pub(crate) fn add_child(&self, child: Handle<Device>) {
        self.children.write().push(child);
    }

    pub(crate) fn remove_child(&self, child: &Handle<Device>) {
        self.children.write().retain(|x| !x.ptr_eq(child));
    }

    /// Name of the bound driver.
    pub fn driver(&self) -> Option<&'static str> {
        *self.driver.read()
    }

    pub(crate) fn bind(&self, driver: &'static str) {
        *self.driver.write() = Some(driver);
    }

    pub(crate) fn unbind(&self) {
        *self.driver.write() = None;
    }

    /// Tie `res` to the device. It is dropped when the device is unbound or removed.
    pub fn add_resource<R: Any + Send + Sync>(&self, res: R) {
        self.devres.lock().push(Box::new(res));
    }

    pub fn resource_count(&self) -> usize {
        self.devres.lock().len()
    }

    /// Drop every managed resource, newest first.
    pub fn release_resources(&self) {
        let resources = take(&mut *self.devres.lock());
        for res in resources.into_iter().rev() {
            drop(res);
        }
    }

    pub fn set_drvdata<T: Any + Send + Sync>(&self, data: T) {
        *self.drvdata.lock() = Some(Box::new(data));
    }

    /// Run `f` on the driver data if it is of type `T`.
    pub fn with_drvdata<T: Any + Send + Sync, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.drvdata.lock();
        guard.as_ref()?.downcast_ref::<T>().map(f)
    }

    pub(crate) fn clear_drvdata(&self) {
        let data = self.drvdata.lock().take();
        drop(data);
    }
}

impl Debug for Device {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("driver", &self.driver())
            .field("io_ranges", &self.io_ranges)
            .finish()
    }
}
