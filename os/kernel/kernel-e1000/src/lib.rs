//! # Intel 8254x (e1000) Packet Rings
//!
//! Transmit and receive descriptor ring handling for the e1000 family as
//! emulated by QEMU.
//!
//! ## Components
//!
//! * [`regs`]: register offsets and typed control registers.
//! * [`mmio`]: the [`RegisterFile`] abstraction and its MMIO implementation.
//! * [`desc`]: descriptor layouts and DMA-shared ring memory.
//! * [`buffer`]: the packet buffer, buffer pool, and receive sink the driver
//!   works with but does not own.
//! * [`E1000`]: the device context with `init`, `transmit`, `on_interrupt`,
//!   and `drain`.
//!
//! ## Ring Ownership
//!
//! ```text
//! transmit:  driver fills slot at TDT ──barrier──► TDT += 1 ──► device sends,
//!            sets DD ──► slot reusable on the next lap
//!
//! receive:   device fills slot past RDT, sets DD|EOP ──► drain delivers
//!            buffer, posts a fresh one ──barrier──► RDT = slot
//! ```
//!
//! Descriptor writes are always followed by [`RegisterFile::barrier`] before
//! the tail register moves, so the device never sees a half-written slot.
//!
//! ## Fatal Conditions
//!
//! A ring the device cannot address, a packet spanning several receive
//! descriptors, running out of receive buffers, or an out-of-range ring
//! register are not recoverable. They are logged at error level and panic.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod buffer;
pub mod desc;
mod driver;
pub mod mmio;
pub mod regs;
mod rx;
mod tx;

pub use buffer::{BufferPool, PacketBuffer, ReceiveSink};
pub use desc::{DescriptorRing, DmaRing, RingLayoutError, RxDescriptor, TxDescriptor};
pub use driver::{E1000, E1000Config, MacAddress, NicStats, RingFull};
pub use mmio::{MmioRegisters, RegisterFile};
pub use regs::Register;

use core::fmt;

#[cold]
#[track_caller]
fn fatal(args: fmt::Arguments<'_>) -> ! {
    log::error!("{args}");
    panic!("{args}");
}
