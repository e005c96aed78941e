use crate::InterruptControl;

/// Identity of the core the caller is executing on.
///
/// The value is only stable while the caller cannot be migrated, i.e. while
/// interrupts are disabled on the current core. Callers that use the id to
/// pick a per-core structure therefore read it under an
/// [`IrqGuard`](crate::IrqGuard) and keep the guard alive until they are done
/// with that structure.
pub trait CpuLocal: InterruptControl {
    /// Logical index of the current core, `0..n`.
    fn cpu_id(&self) -> usize;
}

impl<T: CpuLocal + ?Sized> CpuLocal for &T {
    #[inline]
    fn cpu_id(&self) -> usize {
        (**self).cpu_id()
    }
}
