//! # Register Access
//!
//! The driver never touches device registers directly; it goes through a
//! [`RegisterFile`]. In the kernel that is [`MmioRegisters`], a volatile view
//! of the PCI BAR. Tests supply a simulated register file.

use crate::regs::Register;
use core::ptr::NonNull;
use core::sync::atomic::{Ordering, fence};

/// Ordered access to the device's 32-bit registers.
pub trait RegisterFile {
    fn read(&self, reg: Register) -> u32;

    fn write(&self, reg: Register, value: u32);

    /// Full memory barrier.
    ///
    /// All memory writes issued before the barrier (in particular descriptor
    /// writes) are visible to the device before any register write issued
    /// after it.
    #[inline]
    fn barrier(&self) {
        fence(Ordering::SeqCst);
    }
}

impl<T: RegisterFile + ?Sized> RegisterFile for &T {
    #[inline]
    fn read(&self, reg: Register) -> u32 {
        (**self).read(reg)
    }

    #[inline]
    fn write(&self, reg: Register, value: u32) {
        (**self).write(reg, value);
    }

    #[inline]
    fn barrier(&self) {
        (**self).barrier();
    }
}

/// Memory-mapped register window of one e1000.
pub struct MmioRegisters {
    base: NonNull<u32>,
}

// SAFETY: register accesses are single volatile loads/stores; the device
// tolerates them from any core.
unsafe impl Send for MmioRegisters {}
unsafe impl Sync for MmioRegisters {}

impl MmioRegisters {
    /// # Safety
    /// `base` must be the virtual address of the device's register BAR,
    /// mapped uncached for at least 128 KiB, and must stay mapped for the
    /// lifetime of the returned value.
    #[must_use]
    pub const unsafe fn new(base: NonNull<u32>) -> Self {
        Self { base }
    }

    #[inline]
    fn register(&self, reg: Register) -> *mut u32 {
        // SAFETY: every register offset lies inside the mapped window.
        unsafe { self.base.as_ptr().byte_add(reg.offset()) }
    }
}

impl RegisterFile for MmioRegisters {
    #[inline]
    fn read(&self, reg: Register) -> u32 {
        // SAFETY: see `new`.
        unsafe { self.register(reg).read_volatile() }
    }

    #[inline]
    fn write(&self, reg: Register, value: u32) {
        // SAFETY: see `new`.
        unsafe { self.register(reg).write_volatile(value) }
    }
}
