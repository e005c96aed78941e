//! # Physical Memory Access
//!
//! The frame allocator writes poison patterns into the frames it manages, so
//! it has to "see" physical memory. Rust code can only dereference virtual
//! addresses; [`PhysMapper`] abstracts over how a physical address is turned
//! into a usable reference.
//!
//! - In the kernel, every physical address is reachable at `HHDM_BASE + pa`
//!   ([`HhdmPhysMapper`]).
//! - Tests back "physical memory" with a host allocation and translate by
//!   offset.

use kernel_info::memory::HHDM_BASE;
use kernel_memory_addresses::PhysicalAddress;

/// Converts physical addresses into references in the current address space.
pub trait PhysMapper {
    /// Returns a mutable reference to the `T` stored at `pa`.
    ///
    /// # Safety
    /// - `pa` must be mapped, writable, and suitably aligned for `T`.
    /// - The caller must have exclusive ownership of `[pa, pa + size_of::<T>())`
    ///   for the lifetime `'a`.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

impl<M: PhysMapper + ?Sized> PhysMapper for &M {
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { (**self).phys_to_mut(pa) }
    }
}

/// [`PhysMapper`] implementation for kernels with a higher-half direct map (HHDM).
///
/// # Safety
/// - The HHDM mapping must be present and cover the referenced physical range.
pub struct HhdmPhysMapper;

impl PhysMapper for HhdmPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = (HHDM_BASE + pa.as_u64()) as *mut T;
        // SAFETY: Caller must ensure the physical address is valid and mapped via HHDM.
        unsafe { &mut *va }
    }
}
