//! Mapped register regions.
//!
//! Drivers never touch raw pointers: they receive an [IoMem] from
//! [crate::dev::platform::Platform::ioremap_resource] and access registers by offset.
//! The actual bus cycles are issued by an [IoAccess] backend, [PhysMmio] on hardware.

use crate::dev::{driver::MmioError, mmio::reg::Register};
use alloc::sync::Arc;

/// Issue 32-bit bus cycles at physical addresses.
pub trait IoAccess: Send + Sync {
    fn read32(&self, addr: usize) -> u32;
    fn write32(&self, addr: usize, value: u32);
}

/// Volatile accesses through the kernel's linear mapping of device memory.
pub struct PhysMmio {
    virt_offset: usize,
}

impl PhysMmio {
    /// # Safety
    /// Every physical range later handed to this backend must be mapped at
    /// `phys + virt_offset` as device memory for the lifetime of the backend.
    pub const unsafe fn new(virt_offset: usize) -> PhysMmio {
        PhysMmio { virt_offset }
    }

    /// # Safety
    /// See [PhysMmio::new]; the offset is the `MMIO_VIRT_OFFSET` build flag.
    pub const unsafe fn from_config() -> PhysMmio {
        unsafe { PhysMmio::new(config::MMIO_VIRT_OFFSET) }
    }

    #[inline(always)]
    fn register(&self, addr: usize) -> &Register<u32> {
        // SAFETY: the constructor's contract makes `addr + virt_offset` a mapped register.
        unsafe { &*((addr + self.virt_offset) as *const Register<u32>) }
    }
}

impl IoAccess for PhysMmio {
    fn read32(&self, addr: usize) -> u32 {
        self.register(addr).read()
    }

    fn write32(&self, addr: usize, value: u32) {
        self.register(addr).write(value);
    }
}

/// A claimed register region of at least `SIZE` bytes.
pub struct IoMem<const SIZE: usize> {
    base: usize,
    io: Arc<dyn IoAccess>,
}

impl<const SIZE: usize> IoMem<SIZE> {
    pub(crate) fn new(base: usize, io: Arc<dyn IoAccess>) -> Self {
        IoMem { base, io }
    }

    /// Physical base address.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Read the register at `OFF`. The offset is checked at compile time.
    #[inline]
    pub fn read32<const OFF: usize>(&self) -> u32 {
        const { assert!(OFF % 4 == 0 && OFF + 4 <= SIZE) };
        self.io.read32(self.base + OFF)
    }

    /// Write the register at `OFF`. The offset is checked at compile time.
    #[inline]
    pub fn write32<const OFF: usize>(&self, value: u32) {
        const { assert!(OFF % 4 == 0 && OFF + 4 <= SIZE) };
        self.io.write32(self.base + OFF, value);
    }

    fn check(offset: usize) -> Result<(), MmioError> {
        match offset.checked_add(4) {
            Some(end) if offset % 4 == 0 && end <= SIZE => Ok(()),
            _ => Err(MmioError::OutOfRange),
        }
    }

    pub fn try_read32(&self, offset: usize) -> Result<u32, MmioError> {
        Self::check(offset)?;
        Ok(self.io.read32(self.base + offset))
    }

    pub fn try_write32(&self, offset: usize, value: u32) -> Result<(), MmioError> {
        Self::check(offset)?;
        self.io.write32(self.base + offset, value);
        Ok(())
    }
}
