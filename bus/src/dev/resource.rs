//! Bookkeeping of claimed register regions.
//!
//! A region may be claimed by one device at a time. The claim is released when the
//! [IoClaim] is dropped, normally as one of the owning device's managed resources.

use crate::dev::{driver::MmioError, mmio::IoRange};
use alloc::sync::Arc;
use core::ops::Range;
use spin::Mutex;
use utils::range_set::SortedRangeSet;

pub struct IoResourceMap {
    claimed: Mutex<SortedRangeSet>,
}

impl IoResourceMap {
    pub const fn new() -> IoResourceMap {
        IoResourceMap {
            claimed: Mutex::new(SortedRangeSet::new()),
        }
    }

    pub fn claim(self: &Arc<Self>, range: IoRange) -> Result<IoClaim, MmioError> {
        if range.is_empty() {
            return Err(MmioError::InvalidAddress);
        }
        let mut guard = self.claimed.lock();
        if guard.overlaps(&range) {
            return Err(MmioError::Busy);
        }
        guard.add(range.clone().into());
        drop(guard);
        debug_ex!("\tClaimed I/O region {:?}.", range);
        Ok(IoClaim {
            map: self.clone(),
            range,
        })
    }

    /// Whether any address of `range` is currently claimed.
    pub fn is_claimed(&self, range: &Range<usize>) -> bool {
        self.claimed.lock().overlaps(range)
    }
}

impl Default for IoResourceMap {
    fn default() -> Self {
        Self::new()
    }
}

/// A live claim on a register region.
pub struct IoClaim {
    map: Arc<IoResourceMap>,
    range: IoRange,
}

impl IoClaim {
    pub fn range(&self) -> &IoRange {
        &self.range
    }
}

impl Drop for IoClaim {
    fn drop(&mut self) {
        self.map.claimed.lock().sub(self.range.clone().into());
        debug_ex!("\tReleased I/O region {:?}.", self.range);
    }
}
