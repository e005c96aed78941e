//! # Network Device Configuration

/// Number of descriptors in the transmit ring.
pub const TX_RING_SIZE: usize = 16;

/// Number of descriptors in the receive ring.
pub const RX_RING_SIZE: usize = 16;

/// Size in bytes of one hardware descriptor (transmit and receive alike).
pub const DESCRIPTOR_SIZE: usize = 16;

/// The device requires the byte length of each ring to be a multiple of this.
pub const RING_LENGTH_ALIGNMENT: usize = 128;

/// Receive buffer size programmed into the receive control register.
pub const RX_BUFFER_SIZE: usize = 2048;

/// Headroom requested from the buffer pool for receive buffers.
pub const RX_HEADROOM: usize = 0;

/// Station address programmed into receive address slot 0.
///
/// This is the address QEMU assigns to its emulated e1000 by default
/// (`52:54:00:12:34:56`).
pub const DEFAULT_MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];

/// Number of 32-bit entries in the multicast table array.
pub const MULTICAST_TABLE_ENTRIES: usize = 4096 / 32;

const _: () = {
    assert!((TX_RING_SIZE * DESCRIPTOR_SIZE).is_multiple_of(RING_LENGTH_ALIGNMENT));
    assert!((RX_RING_SIZE * DESCRIPTOR_SIZE).is_multiple_of(RING_LENGTH_ALIGNMENT));
    assert!(RX_HEADROOM < RX_BUFFER_SIZE);
};
