//! # Physical Memory Address Types
//!
//! Strongly typed wrappers for physical addresses and the page granularity
//! they are aligned to.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PhysicalAddress`] | A raw 64-bit physical address (RAM, DMA target, MMIO). |
//! | [`PageSize`] / [`Size4K`] | Marker for the 4 KiB frame granularity. |
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let end_of_kernel = PhysicalAddress::new(0x8002_1a40);
//! let first_frame = end_of_kernel.align_up::<Size4K>();
//! assert_eq!(first_frame.as_u64(), 0x8002_2000);
//! assert!(first_frame.is_aligned::<Size4K>());
//! assert_eq!((first_frame + Size4K::SIZE) - first_frame, 4096);
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`, and
//!   `Hash`, making them suitable as map keys or for FFI use.
//! - All alignment and offset calculations are `const fn` and zero-cost in
//!   release builds.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod page_size;
mod physical_address;

pub use page_size::{PageSize, Size4K};
pub use physical_address::PhysicalAddress;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        let a = PhysicalAddress::new(0x12345);
        assert_eq!(a.align_down::<Size4K>().as_u64(), 0x12000);
        assert_eq!(a.align_up::<Size4K>().as_u64(), 0x13000);
        assert_eq!(a.page_offset::<Size4K>(), 0x345);
        assert!(!a.is_aligned::<Size4K>());
    }

    #[test]
    fn align_up_is_identity_on_boundaries() {
        let a = PhysicalAddress::new(0x8000_0000);
        assert_eq!(a.align_up::<Size4K>(), a);
        assert!(a.is_aligned::<Size4K>());
    }

    #[test]
    fn align_up_saturates() {
        let a = PhysicalAddress::new(u64::MAX - 3);
        assert_eq!(a.align_up::<Size4K>().as_u64(), 0xFFFF_FFFF_FFFF_F000);
    }

    #[test]
    fn register_halves() {
        let a = PhysicalAddress::new(0x0000_0012_8000_4000);
        assert_eq!(a.low_u32(), 0x8000_4000);
        assert_eq!(a.high_u32(), 0x12);
    }

    #[test]
    fn distance() {
        let base = PhysicalAddress::new(0x8000_0000);
        assert_eq!((base + 3 * Size4K::SIZE) - base, 3 * 4096);
    }
}
