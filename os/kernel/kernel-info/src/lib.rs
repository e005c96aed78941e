//! # Kernel Configuration
//!
//! Compile-time constants shared by the memory and network subsystems.
//! Everything here is plain data: the crates that consume these values build
//! their runtime configuration structs (`MemoryLayout`, `E1000Config`) from
//! them and may override individual fields at boot.
//!
//! ## Modules
//!
//! ### Memory ([`memory`])
//! * **Physical layout**: where RAM starts and ends, and the direct map used to
//!   reach it from kernel code
//! * **Core count**: upper bound for per-core data structures
//! * **Poison bytes**: patterns written into frames on free and on allocation
//!
//! ### Network ([`net`])
//! * **Ring geometry**: descriptor counts for the transmit and receive rings
//! * **Buffers**: receive buffer size and headroom
//! * **Station address**: the MAC address programmed into the receive filter
//!
//! ```text
//! Physical memory (default layout):
//!
//! PHYS_MEMORY_BASE  ┌─────────────────────────────┐ 0x8000_0000
//!                   │  kernel text & data         │
//! end of kernel     ├─────────────────────────────┤ (linker symbol)
//!                   │  frames managed by the      │
//!                   │  per-core frame allocator   │
//! PHYS_MEMORY_TOP   └─────────────────────────────┘ 0x8800_0000
//! ```
//!
//! All constants are validated at compile time; see the `const _` blocks in
//! each module.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod memory;
pub mod net;
