//! Transmit ring bookkeeping.

use crate::buffer::{BufferPool, PacketBuffer};
use crate::desc::{Descriptor, DmaRing, TxCommand, TxDescriptor, TxStatus};
use crate::fatal;
use crate::mmio::RegisterFile;
use crate::regs::Register;

/// Transmit descriptors plus the buffer each slot last sent.
///
/// A buffer stays attached to its slot after the doorbell, because the device
/// reads it asynchronously. It is released the next time the slot is reused.
pub(crate) struct TxRing<'r, B, const N: usize> {
    ring: DmaRing<'r, TxDescriptor, N>,
    in_flight: [Option<B>; N],
}

impl<'r, B: PacketBuffer, const N: usize> TxRing<'r, B, N> {
    pub(crate) fn new(ring: DmaRing<'r, TxDescriptor, N>) -> Self {
        Self {
            ring,
            in_flight: core::array::from_fn(|_| None),
        }
    }

    /// Marks every slot done and empty, then points the device at the ring.
    pub(crate) fn start<R: RegisterFile>(&mut self, regs: &R) {
        let done = TxDescriptor {
            status: TxStatus::new().with_dd(true),
            ..TxDescriptor::ZERO
        };
        for index in 0..N {
            self.ring.descriptors().write(index, done);
        }
        self.in_flight.iter_mut().for_each(|slot| *slot = None);

        let phys = self.ring.phys();
        regs.write(Register::Tdbal, phys.low_u32());
        regs.write(Register::Tdbah, phys.high_u32());
        regs.write(Register::Tdlen, self.ring.length_register());
        regs.write(Register::Tdh, 0);
        regs.write(Register::Tdt, 0);
    }

    /// Queues `buffer` at the tail slot and rings the doorbell.
    ///
    /// Returns the slot used, or hands `buffer` back if the device has not
    /// finished with the tail slot yet.
    pub(crate) fn push<R, P>(&mut self, regs: &R, pool: &P, buffer: B) -> Result<usize, B>
    where
        R: RegisterFile,
        P: BufferPool<Buffer = B>,
    {
        let tail = ring_index::<N>(regs.read(Register::Tdt), "TDT");
        let descriptors = self.ring.descriptors();
        if !descriptors.read(tail).status.dd() {
            return Err(buffer);
        }

        if let Some(sent) = self.in_flight[tail].take() {
            pool.free(sent);
        }

        let Ok(length) = u16::try_from(buffer.len()) else {
            fatal(format_args!(
                "transmit: packet of {} bytes exceeds a descriptor",
                buffer.len()
            ));
        };
        descriptors.write(
            tail,
            TxDescriptor {
                addr: buffer.dma_address().as_u64(),
                length,
                cmd: TxCommand::new().with_eop(true).with_rs(true),
                status: TxStatus::new(),
                ..TxDescriptor::ZERO
            },
        );
        self.in_flight[tail] = Some(buffer);

        regs.barrier();
        regs.write(Register::Tdt, index_value((tail + 1) % N));
        Ok(tail)
    }
}

/// Validates a ring register value read from the device.
#[track_caller]
pub(crate) fn ring_index<const N: usize>(value: u32, name: &str) -> usize {
    match usize::try_from(value) {
        Ok(index) if index < N => index,
        _ => fatal(format_args!("{name} = {value} outside a ring of {N} slots")),
    }
}

/// A ring index as a head/tail register value. Ring sizes are far below `u32::MAX`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) const fn index_value(index: usize) -> u32 {
    index as u32
}
