//! # Packet Buffers
//!
//! Packet buffers are owned and formatted by the network stack. The driver
//! only moves them between the stack and the rings: it asks a [`BufferPool`]
//! for empty buffers, points descriptors at their DMA address, and hands
//! filled buffers to a [`ReceiveSink`].

use kernel_memory_addresses::PhysicalAddress;

/// A buffer the device can read from or write into.
pub trait PacketBuffer {
    /// Device-visible address of the first payload byte.
    fn dma_address(&self) -> PhysicalAddress;

    /// Payload length in bytes.
    fn len(&self) -> usize;

    /// Sets the payload length after the device filled the buffer.
    fn set_len(&mut self, len: usize);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source and sink of empty buffers.
pub trait BufferPool {
    type Buffer: PacketBuffer;

    /// Returns an empty buffer with `headroom` bytes reserved in front of the
    /// payload, or `None` if the pool is exhausted.
    fn alloc(&self, headroom: usize) -> Option<Self::Buffer>;

    /// Takes back a buffer the driver no longer needs.
    fn free(&self, buffer: Self::Buffer);
}

impl<T: BufferPool + ?Sized> BufferPool for &T {
    type Buffer = T::Buffer;

    #[inline]
    fn alloc(&self, headroom: usize) -> Option<Self::Buffer> {
        (**self).alloc(headroom)
    }

    #[inline]
    fn free(&self, buffer: Self::Buffer) {
        (**self).free(buffer);
    }
}

/// Receives packets the device has written.
pub trait ReceiveSink<B> {
    /// Takes ownership of a received packet.
    ///
    /// Called from the receive path with the receive ring locked. The sink may
    /// transmit, but must not drain the receive ring again.
    fn deliver(&self, buffer: B);
}

impl<B, T: ReceiveSink<B> + ?Sized> ReceiveSink<B> for &T {
    #[inline]
    fn deliver(&self, buffer: B) {
        (**self).deliver(buffer);
    }
}
