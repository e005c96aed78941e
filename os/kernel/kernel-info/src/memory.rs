//! # Memory Layout

/// Size of one physical frame in bytes.
pub const FRAME_SIZE: u64 = 4096;

/// First byte of physical RAM. The kernel image is loaded here.
pub const PHYS_MEMORY_BASE: u64 = 0x8000_0000;

/// Amount of physical RAM the kernel manages.
pub const PHYS_MEMORY_SIZE: u64 = 128 * 1024 * 1024; // 128 MiB

/// First address past the end of usable physical RAM.
pub const PHYS_MEMORY_TOP: u64 = PHYS_MEMORY_BASE + PHYS_MEMORY_SIZE;

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything you map at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Maximum number of cores the kernel brings up.
///
/// Per-core tables (frame free lists, statistics) are sized by this value.
pub const MAX_CPUS: usize = 8;

/// Byte pattern written over a frame when it is returned to a free list.
///
/// Code that keeps reading a frame after freeing it sees this pattern instead
/// of the data it expects.
pub const FRAME_FREE_POISON: u8 = 0x01;

/// Byte pattern written over a frame right before it is handed out.
///
/// Must differ from [`FRAME_FREE_POISON`] so that a test can tell a
/// freshly allocated frame from a stale one.
pub const FRAME_ALLOC_POISON: u8 = 0x05;

/// Number of frames between the memory base and top; an upper bound for the
/// allocator's link table.
#[allow(clippy::cast_possible_truncation)]
pub const MAX_FRAMES: usize = (PHYS_MEMORY_SIZE / FRAME_SIZE) as usize;

const _: () = {
    assert!(FRAME_SIZE.is_power_of_two());
    assert!(PHYS_MEMORY_BASE.is_multiple_of(FRAME_SIZE));
    assert!(PHYS_MEMORY_TOP.is_multiple_of(FRAME_SIZE));
    assert!(MAX_CPUS > 0 && MAX_CPUS <= 64);
    assert!(FRAME_FREE_POISON != FRAME_ALLOC_POISON);
};
