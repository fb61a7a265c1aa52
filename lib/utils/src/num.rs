//! Numeric Utilities
use core::ops::{Add, Rem, Sub};

/// Align values up to a multiple of `align`.
pub trait AlignableTo {
    fn align_up(self, align: Self) -> Self;
}

impl<T> AlignableTo for T
where
    T: Copy + Rem<Output = T> + Add<Output = T> + PartialEq<T> + Default + Sub<Output = T>,
{
    fn align_up(self, align: Self) -> Self {
        if self % align == T::default() {
            self
        } else {
            self + (align - (self % align))
        }
    }
}
