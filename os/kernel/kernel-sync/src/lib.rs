//! # Kernel synchronization primitives
//!
//! * [`SpinLock`]: test-and-test-and-set lock with blocking and one-shot
//!   acquisition.
//! * [`IrqGuard`] / [`SpinLock::lock_irq`]: keep interrupts (and with them,
//!   preemption) off for the duration of a critical section.
//! * [`CpuLocal`]: the current core's id, for per-core data structures.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod cpu;
pub mod irq;
mod spin_lock;

pub use cpu::CpuLocal;
#[cfg(target_arch = "x86_64")]
pub use irq::X86Interrupts;
pub use irq::{InterruptControl, IrqGuard, IrqSpinLockGuard};
pub use spin_lock::{SpinLock, SpinLockGuard};
