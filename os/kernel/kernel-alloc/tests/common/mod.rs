#![allow(dead_code)]

use kernel_alloc::{FrameLink, MemoryLayout, PhysMapper};
use kernel_memory_addresses::PhysicalAddress;
use kernel_sync::{CpuLocal, InterruptControl};
use std::cell::Cell;

pub const BASE: u64 = 0x8000_0000;
pub const RAM_FRAMES: usize = 64;

/// Kernel image ends mid-frame, so the arena starts at frame 2.
pub const KERNEL_END: u64 = BASE + 0x1a40;
pub const PHYS_TOP: u64 = BASE + RAM_FRAMES as u64 * 4096;
pub const ARENA_FRAMES: usize = RAM_FRAMES - 2;

pub fn layout() -> MemoryLayout {
    MemoryLayout::new(PhysicalAddress::new(KERNEL_END), PhysicalAddress::new(PHYS_TOP))
}

pub fn link_table() -> Vec<FrameLink> {
    (0..layout().frame_capacity())
        .map(|_| FrameLink::new())
        .collect()
}

/// Simulated RAM starting at physical [`BASE`].
pub struct HostMemory {
    ptr: *mut u8,
    len: usize,
}

// Frames are only touched by their current owner.
unsafe impl Send for HostMemory {}
unsafe impl Sync for HostMemory {}

impl HostMemory {
    pub fn leak() -> &'static Self {
        let ram = Box::leak(vec![0u8; RAM_FRAMES * 4096].into_boxed_slice());
        Box::leak(Box::new(Self {
            ptr: ram.as_mut_ptr(),
            len: ram.len(),
        }))
    }

    fn offset(&self, pa: PhysicalAddress) -> usize {
        let offset = usize::try_from(pa.as_u64() - BASE).unwrap();
        assert!(offset + 4096 <= self.len, "{pa} outside simulated RAM");
        offset
    }

    /// Contents of the frame at `pa`.
    pub fn frame(&self, pa: PhysicalAddress) -> Vec<u8> {
        let offset = self.offset(pa);
        unsafe { std::slice::from_raw_parts(self.ptr.add(offset), 4096) }.to_vec()
    }

    /// Overwrites the frame at `pa` with `byte`.
    pub fn scribble(&self, pa: PhysicalAddress, byte: u8) {
        let offset = self.offset(pa);
        unsafe { std::ptr::write_bytes(self.ptr.add(offset), byte, 4096) };
    }
}

impl PhysMapper for HostMemory {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let offset = self.offset(pa);
        unsafe { &mut *self.ptr.add(offset).cast::<T>() }
    }
}

thread_local! {
    static CPU: Cell<usize> = const { Cell::new(0) };
    static IRQ_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Current core and interrupt flag, simulated per test thread.
#[derive(Clone, Copy)]
pub struct TestCpu;

impl TestCpu {
    /// Pretends the calling thread now runs on core `id`.
    pub fn enter(id: usize) {
        CPU.with(|c| c.set(id));
    }

    pub fn irq_enabled() -> bool {
        IRQ_ENABLED.with(Cell::get)
    }
}

impl InterruptControl for TestCpu {
    fn interrupts_enabled(&self) -> bool {
        IRQ_ENABLED.with(Cell::get)
    }

    fn disable_interrupts(&self) {
        IRQ_ENABLED.with(|e| e.set(false));
    }

    fn enable_interrupts(&self) {
        IRQ_ENABLED.with(|e| e.set(true));
    }
}

impl CpuLocal for TestCpu {
    fn cpu_id(&self) -> usize {
        CPU.with(Cell::get)
    }
}
