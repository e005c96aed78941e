use crate::{SpinLock, SpinLockGuard};

/// Local interrupt enable state of the executing core.
///
/// Kernel code implements this over the real CPU flag (see
/// [`X86Interrupts`]); tests implement it over a thread-local flag.
///
/// While interrupts are disabled on a core, the scheduler cannot preempt the
/// running context, so it cannot migrate to another core either.
pub trait InterruptControl {
    /// Whether interrupts are currently enabled on this core.
    fn interrupts_enabled(&self) -> bool;

    /// Disables interrupts on this core.
    fn disable_interrupts(&self);

    /// Enables interrupts on this core.
    fn enable_interrupts(&self);
}

impl<T: InterruptControl + ?Sized> InterruptControl for &T {
    #[inline]
    fn interrupts_enabled(&self) -> bool {
        (**self).interrupts_enabled()
    }

    #[inline]
    fn disable_interrupts(&self) {
        (**self).disable_interrupts();
    }

    #[inline]
    fn enable_interrupts(&self) {
        (**self).enable_interrupts();
    }
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// `IrqGuard::new()` snapshots the interrupt enable state. If interrupts
/// were enabled, it disables them. On drop, it re-enables them **only** if
/// they were previously enabled, preserving the original state. Guards
/// therefore nest: an inner guard created while interrupts are already off
/// leaves them off when it goes away.
///
/// # Examples
///
/// ```no_run
/// # #[cfg(target_arch = "x86_64")] {
/// use kernel_sync::{IrqGuard, X86Interrupts};
///
/// {
///     let _g = IrqGuard::new(&X86Interrupts); // interrupts disabled here if previously enabled
///     // critical section
/// }
/// // IF restored to prior state
/// # }
/// ```
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct IrqGuard<'c, C: InterruptControl + ?Sized> {
    ctl: &'c C,
    /// Whether interrupts were enabled when the guard was created.
    were_enabled: bool,
}

impl<'c, C: InterruptControl + ?Sized> IrqGuard<'c, C> {
    /// Disables interrupts if they are currently enabled and remembers the state.
    #[inline]
    pub fn new(ctl: &'c C) -> Self {
        let enabled = ctl.interrupts_enabled();
        if enabled {
            ctl.disable_interrupts();
        }
        Self {
            ctl,
            were_enabled: enabled,
        }
    }
}

impl<C: InterruptControl + ?Sized> Drop for IrqGuard<'_, C> {
    /// Restores interrupts only if they were previously enabled.
    fn drop(&mut self) {
        if self.were_enabled {
            self.ctl.enable_interrupts();
        }
    }
}

/// A spin lock guard that also keeps interrupts disabled while held.
///
/// Created by [`SpinLock::lock_irq`] and [`SpinLock::try_lock_irq`]. The lock
/// is released before interrupts are restored, so an interrupt handler that
/// takes the same lock can never observe it held by the context it
/// interrupted.
pub struct IrqSpinLockGuard<'a, 'c, T, C: InterruptControl + ?Sized> {
    // Field order is drop order: unlock first, then restore interrupts.
    guard: SpinLockGuard<'a, T>,
    _irq: IrqGuard<'c, C>,
}

impl<T, C: InterruptControl + ?Sized> core::ops::Deref for IrqSpinLockGuard<'_, '_, T, C> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, C: InterruptControl + ?Sized> core::ops::DerefMut for IrqSpinLockGuard<'_, '_, T, C> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> SpinLock<T> {
    /// Disables interrupts through `ctl`, then acquires the lock.
    ///
    /// Use this for any lock that an interrupt handler may also take;
    /// otherwise the handler can interrupt the holder on the same core and
    /// spin forever.
    #[inline]
    pub fn lock_irq<'a, 'c, C: InterruptControl + ?Sized>(
        &'a self,
        ctl: &'c C,
    ) -> IrqSpinLockGuard<'a, 'c, T, C> {
        let irq = IrqGuard::new(ctl);
        let guard = self.lock();
        IrqSpinLockGuard { guard, _irq: irq }
    }

    /// Disables interrupts through `ctl` and tries to acquire the lock once.
    ///
    /// On failure the previous interrupt state is restored before returning.
    #[inline]
    pub fn try_lock_irq<'a, 'c, C: InterruptControl + ?Sized>(
        &'a self,
        ctl: &'c C,
    ) -> Option<IrqSpinLockGuard<'a, 'c, T, C>> {
        let irq = IrqGuard::new(ctl);
        let guard = self.try_lock()?;
        Some(IrqSpinLockGuard { guard, _irq: irq })
    }
}

/// [`InterruptControl`] over the `IF` bit of `RFLAGS`.
///
/// # Safety & Privilege
///
/// Must only be used in contexts where `cli`/`sti` are permitted (ring 0).
/// Using it from user space faults.
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Default, Clone, Copy)]
pub struct X86Interrupts;

#[cfg(target_arch = "x86_64")]
impl InterruptControl for X86Interrupts {
    #[inline]
    fn interrupts_enabled(&self) -> bool {
        (x86::rflags() & (1 << 9)) != 0
    }

    #[inline]
    fn disable_interrupts(&self) {
        x86::cli_stop_interrupts();
    }

    #[inline]
    fn enable_interrupts(&self) {
        x86::sti_enable_interrupts();
    }
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    /// Disables hardware interrupts (`cli`).
    #[inline]
    pub fn cli_stop_interrupts() {
        unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
    }

    /// Enables hardware interrupts (`sti`).
    #[inline]
    pub fn sti_enable_interrupts() {
        unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
    }

    /// Returns the current `RFLAGS` value (via `pushfq/pop`).
    ///
    /// Bit 9 (`IF`) indicates whether interrupts are enabled.
    #[inline]
    #[must_use]
    pub fn rflags() -> u64 {
        let r: u64;
        unsafe { core::arch::asm!("pushfq; pop {}", out(reg) r, options(preserves_flags)) }
        r
    }
}
