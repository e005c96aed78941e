//! # Kernel Physical Memory Allocation
//!
//! Hands out 4 KiB physical frames to the rest of the kernel.
//!
//! ## Components
//!
//! ### Frame Allocator ([`frame_alloc`])
//!
//! [`FrameAllocator`] keeps one free list per core:
//! * **Local fast path**: a core allocates from and frees to its own list,
//!   so cores do not contend on a shared lock.
//! * **Stealing**: a core whose list is empty takes a frame from another
//!   core's list, probing candidates one lock at a time.
//! * **Poisoning**: freed and allocated frames are overwritten with distinct
//!   byte patterns so stale references stand out.
//! * **Accounting**: per-core free counts and [`AllocStats`] counters.
//!
//! ### Free Lists ([`free_list`])
//!
//! The lists are threaded through a [`FrameLink`] table with one entry per
//! frame instead of through the frames themselves.
//!
//! ### Physical Mapper ([`phys_mapper`])
//!
//! [`PhysMapper`] turns a physical address into a reference the allocator can
//! write through. [`HhdmPhysMapper`] uses the higher-half direct map.
//!
//! ## Memory Layout
//!
//! ```text
//! PHYS_MEMORY_BASE  ┌──────────────────────────────┐
//!                   │ kernel image (text + data)   │
//! kernel_end        ├──────────────────────────────┤ ◄─ align_up: frame #0
//!                   │ frame arena                  │
//!                   │ (managed by FrameAllocator)  │
//! phys_top          └──────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::{FrameAllocator, FrameLink, MemoryLayout, PhysMapper};
//! use kernel_memory_addresses::PhysicalAddress;
//! use kernel_sync::{CpuLocal, InterruptControl};
//!
//! // A single core that never takes interrupts.
//! struct OneCore;
//! impl InterruptControl for OneCore {
//!     fn interrupts_enabled(&self) -> bool { false }
//!     fn disable_interrupts(&self) {}
//!     fn enable_interrupts(&self) {}
//! }
//! impl CpuLocal for OneCore {
//!     fn cpu_id(&self) -> usize { 0 }
//! }
//!
//! // "Physical memory" backed by a host buffer at physical 0x10_0000.
//! struct Host(*mut u8);
//! impl PhysMapper for Host {
//!     unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
//!         unsafe { &mut *self.0.add((pa.as_u64() - 0x10_0000) as usize).cast() }
//!     }
//! }
//!
//! let ram = Box::leak(vec![[0u8; 4096]; 4].into_boxed_slice());
//! let layout = MemoryLayout::new(PhysicalAddress::new(0x10_0000), PhysicalAddress::new(0x10_4000));
//! let links: Vec<FrameLink> = (0..layout.frame_capacity()).map(|_| FrameLink::new()).collect();
//!
//! let frames = FrameAllocator::new(Host(ram.as_mut_ptr().cast()), OneCore, layout, 1, &links)?;
//! unsafe { frames.init(layout.kernel_end, layout.phys_top) };
//! assert_eq!(frames.free_frames(), 4);
//!
//! let frame = frames.allocate().expect("four frames are free");
//! frames.free(frame);
//! # Ok::<(), kernel_alloc::FrameAllocatorError>(())
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod frame_alloc;
pub mod free_list;
pub mod phys_mapper;

pub use frame_alloc::{AllocStats, Frame, FrameAllocator, FrameAllocatorError, MemoryLayout};
pub use free_list::FrameLink;
pub use phys_mapper::{HhdmPhysMapper, PhysMapper};
