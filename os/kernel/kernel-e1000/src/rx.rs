//! Receive ring bookkeeping.

use crate::buffer::{BufferPool, PacketBuffer, ReceiveSink};
use crate::desc::{Descriptor, DmaRing, RxDescriptor};
use crate::fatal;
use crate::mmio::RegisterFile;
use crate::regs::Register;
use crate::tx::{index_value, ring_index};
use log::trace;

/// Receive descriptors plus the empty buffer posted in each slot.
pub(crate) struct RxRing<'r, B, const N: usize> {
    ring: DmaRing<'r, RxDescriptor, N>,
    posted: [Option<B>; N],
}

/// What one drain pass delivered.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Drained {
    pub packets: u64,
    pub bytes: u64,
}

impl<'r, B: PacketBuffer, const N: usize> RxRing<'r, B, N> {
    pub(crate) fn new(ring: DmaRing<'r, RxDescriptor, N>) -> Self {
        Self {
            ring,
            posted: core::array::from_fn(|_| None),
        }
    }

    /// Posts a fresh buffer in every slot, then points the device at the ring.
    pub(crate) fn start<R, P>(&mut self, regs: &R, pool: &P, headroom: usize)
    where
        R: RegisterFile,
        P: BufferPool<Buffer = B>,
    {
        self.ring.descriptors().clear();
        for index in 0..N {
            if let Some(stale) = self.posted[index].take() {
                pool.free(stale);
            }
            self.post(index, pool, headroom);
        }

        let phys = self.ring.phys();
        regs.write(Register::Rdbal, phys.low_u32());
        regs.write(Register::Rdbah, phys.high_u32());
        regs.write(Register::Rdlen, self.ring.length_register());
        regs.write(Register::Rdh, 0);
        regs.write(Register::Rdt, index_value(N - 1));
    }

    /// Hands every completed packet past the tail to `sink`.
    ///
    /// Each completed slot gets a fresh buffer and the tail is advanced to it
    /// before the next slot is inspected. Stops at the first slot the device
    /// has not completed.
    pub(crate) fn drain<R, P, S>(
        &mut self,
        regs: &R,
        pool: &P,
        sink: &S,
        headroom: usize,
    ) -> Drained
    where
        R: RegisterFile,
        P: BufferPool<Buffer = B>,
        S: ReceiveSink<B>,
    {
        let mut drained = Drained::default();
        loop {
            let tail = ring_index::<N>(regs.read(Register::Rdt), "RDT");
            let index = (tail + 1) % N;
            let descriptor = self.ring.descriptors().read(index);
            if !descriptor.status.dd() {
                break;
            }
            if !descriptor.status.eop() {
                fatal(format_args!(
                    "receive: slot {index} holds a packet spanning several descriptors"
                ));
            }

            let Some(mut packet) = self.posted[index].take() else {
                fatal(format_args!("receive: slot {index} completed without a buffer"));
            };
            let length = usize::from(descriptor.length);
            packet.set_len(length);
            trace!("e1000: received {length} bytes in slot {index}");
            sink.deliver(packet);

            drained.packets += 1;
            drained.bytes += u64::from(descriptor.length);

            self.post(index, pool, headroom);
            regs.barrier();
            regs.write(Register::Rdt, index_value(index));
        }
        drained
    }

    fn post<P: BufferPool<Buffer = B>>(&mut self, index: usize, pool: &P, headroom: usize) {
        let Some(buffer) = pool.alloc(headroom) else {
            fatal(format_args!("receive: no buffer to post in slot {index}"));
        };
        self.ring.descriptors().write(
            index,
            RxDescriptor {
                addr: buffer.dma_address().as_u64(),
                ..RxDescriptor::ZERO
            },
        );
        self.posted[index] = Some(buffer);
    }
}
