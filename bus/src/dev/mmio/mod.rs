use core::{fmt::Debug, ops::Range};
use utils::impl_basic;

pub mod io_mem;
pub mod reg;

pub use io_mem::{IoAccess, IoMem, PhysMmio};

/// A physical address range occupied by a device's registers.
#[derive(PartialEq, Eq)]
pub struct IoRange {
    inner: Range<usize>,
}

impl_basic!(IoRange, Range<usize>);

impl IoRange {
    pub fn validate<T: Sized>(&self, val_type: IoRangeValidationType) -> bool {
        self.validate_size(size_of::<T>(), val_type)
    }

    pub fn validate_size(&self, size: usize, val_type: IoRangeValidationType) -> bool {
        let self_size = self.len();
        match val_type {
            IoRangeValidationType::Fit => self_size == size,
            IoRangeValidationType::Compatible => self_size >= size,
        }
    }
}

impl Clone for IoRange {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Debug for IoRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("[{:#x},{:#x})", self.start, self.end))
    }
}

pub enum IoRangeValidationType {
    /// The size of the IO range is exactly the size of the register file
    Fit,
    /// The size of the IO range is equal to or greater than the size of the register file
    Compatible,
}

#[cfg(test)]
mod tests {
    use super::{IoRange, IoRangeValidationType};

    #[test]
    fn validates_register_file_size() {
        let range = IoRange::from(0x7000_9000..0x7000_9028);
        assert!(range.validate::<[u32; 10]>(IoRangeValidationType::Fit));
        assert!(range.validate::<[u32; 4]>(IoRangeValidationType::Compatible));
        assert!(!range.validate::<[u32; 4]>(IoRangeValidationType::Fit));
        assert!(!range.validate_size(0x1000, IoRangeValidationType::Compatible));
        assert_eq!(format!("{:?}", range), "[0x70009000,0x70009028)");
    }
}
