//! # Descriptors and Descriptor Rings
//!
//! A ring is an array of 16-byte descriptors in memory that both the driver
//! and the device's DMA engine read and write. The driver never forms a
//! `&mut` to ring memory: every slot is a [`DmaCell`] accessed with volatile
//! loads and stores.
//!
//! ```text
//!   DescriptorRing (16-byte aligned, N × 16 bytes, multiple of 128)
//! ┌──────┬──────┬──────┬──────┬─────┬────────┐
//! │ #0   │ #1   │ #2   │ #3   │ ... │ #N-1   │
//! └──────┴──────┴──────┴──────┴─────┴────────┘
//!    ▲ head (device)          ▲ tail (driver)
//! ```

use bitfield_struct::bitfield;
use core::cell::UnsafeCell;
use core::mem::size_of;
use kernel_info::net::{DESCRIPTOR_SIZE, RING_LENGTH_ALIGNMENT};
use kernel_memory_addresses::PhysicalAddress;

/// Transmit descriptor command byte.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct TxCommand {
    /// Bit 0: End Of Packet: last descriptor of the packet.
    pub eop: bool,
    /// Bit 1: Insert FCS.
    pub ifcs: bool,
    /// Bit 2: Insert Checksum.
    pub ic: bool,
    /// Bit 3: Report Status: set DD once the descriptor is done.
    pub rs: bool,
    /// Bit 4: Report Packet Sent.
    pub rps: bool,
    /// Bit 5: Descriptor Extension.
    pub dext: bool,
    /// Bit 6: VLAN Packet Enable.
    pub vle: bool,
    /// Bit 7: Interrupt Delay Enable.
    pub ide: bool,
}

/// Transmit descriptor status byte.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct TxStatus {
    /// Bit 0: Descriptor Done.
    pub dd: bool,
    /// Bit 1: Excess Collisions.
    pub ec: bool,
    /// Bit 2: Late Collision.
    pub lc: bool,
    /// Bit 3: Transmit Underrun.
    pub tu: bool,
    #[bits(4)]
    _reserved_4_7: u8,
}

/// Receive descriptor status byte.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct RxStatus {
    /// Bit 0: Descriptor Done.
    pub dd: bool,
    /// Bit 1: End Of Packet.
    pub eop: bool,
    /// Bit 2: Ignore Checksum Indication.
    pub ixsm: bool,
    /// Bit 3: 802.1Q packet.
    pub vp: bool,
    /// Bit 4: UDP checksum calculated.
    pub udpcs: bool,
    /// Bit 5: TCP checksum calculated.
    pub tcpcs: bool,
    /// Bit 6: IP checksum calculated.
    pub ipcs: bool,
    /// Bit 7: Passed in-exact filter.
    pub pif: bool,
}

/// Legacy transmit descriptor.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxDescriptor {
    pub addr: u64,
    pub length: u16,
    /// Checksum offset.
    pub cso: u8,
    pub cmd: TxCommand,
    pub status: TxStatus,
    /// Checksum start.
    pub css: u8,
    pub special: u16,
}

/// Legacy receive descriptor.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxDescriptor {
    pub addr: u64,
    pub length: u16,
    /// Packet checksum.
    pub csum: u16,
    pub status: RxStatus,
    pub errors: u8,
    pub special: u16,
}

const _: () = {
    assert!(size_of::<TxDescriptor>() == DESCRIPTOR_SIZE);
    assert!(size_of::<RxDescriptor>() == DESCRIPTOR_SIZE);
};

/// A hardware descriptor layout.
pub trait Descriptor: Copy {
    /// The all-zero descriptor.
    const ZERO: Self;
}

impl Descriptor for TxDescriptor {
    const ZERO: Self = Self {
        addr: 0,
        length: 0,
        cso: 0,
        cmd: TxCommand::new(),
        status: TxStatus::new(),
        css: 0,
        special: 0,
    };
}

impl Descriptor for RxDescriptor {
    const ZERO: Self = Self {
        addr: 0,
        length: 0,
        csum: 0,
        status: RxStatus::new(),
        errors: 0,
        special: 0,
    };
}

/// Memory shared with a DMA engine.
///
/// Reads and writes are volatile so they are neither elided nor merged; the
/// device may change the contents at any time.
#[repr(transparent)]
pub struct DmaCell<T>(UnsafeCell<T>);

// SAFETY: all access is by whole-value volatile copies.
unsafe impl<T: Copy + Send> Sync for DmaCell<T> {}

impl<T: Copy> DmaCell<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    #[inline]
    pub fn read(&self) -> T {
        // SAFETY: the pointer is valid and aligned; `T: Copy`.
        unsafe { self.0.get().read_volatile() }
    }

    #[inline]
    pub fn write(&self, value: T) {
        // SAFETY: see `read`.
        unsafe { self.0.get().write_volatile(value) }
    }
}

/// Reasons a ring cannot be handed to the device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RingLayoutError {
    #[error("descriptor ring has no slots")]
    Empty,
    #[error("descriptor ring spans {bytes} bytes, not a multiple of 128")]
    Length { bytes: usize },
    #[error("descriptor ring at {phys} is not 16-byte aligned")]
    Unaligned { phys: PhysicalAddress },
}

/// Backing memory of a ring of `N` descriptors.
///
/// Usually a `static`, since the device needs a stable physical address:
///
/// ```rust
/// use kernel_e1000::desc::{DescriptorRing, TxDescriptor};
///
/// static TX_RING: DescriptorRing<TxDescriptor, 16> = DescriptorRing::new();
/// assert_eq!(TX_RING.byte_len(), 256);
/// ```
#[repr(C, align(16))]
pub struct DescriptorRing<D, const N: usize> {
    slots: [DmaCell<D>; N],
}

impl<D: Descriptor, const N: usize> DescriptorRing<D, N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [const { DmaCell::new(D::ZERO) }; N],
        }
    }

    /// Verifies the device can use a ring of this size.
    ///
    /// # Errors
    /// [`RingLayoutError::Empty`] for `N == 0`, [`RingLayoutError::Length`]
    /// if the byte length is not a multiple of 128.
    pub const fn check_layout() -> Result<(), RingLayoutError> {
        let bytes = N * size_of::<D>();
        if N == 0 {
            Err(RingLayoutError::Empty)
        } else if !bytes.is_multiple_of(RING_LENGTH_ALIGNMENT) {
            Err(RingLayoutError::Length { bytes })
        } else {
            Ok(())
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        N
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Size of the descriptor array in bytes, as programmed into RDLEN/TDLEN.
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        N * size_of::<D>()
    }

    /// Copies descriptor `index` out of ring memory.
    ///
    /// # Panics
    /// If `index >= N`.
    #[inline]
    #[must_use]
    pub fn read(&self, index: usize) -> D {
        self.slots[index].read()
    }

    /// Overwrites descriptor `index`.
    ///
    /// # Panics
    /// If `index >= N`.
    #[inline]
    pub fn write(&self, index: usize, descriptor: D) {
        self.slots[index].write(descriptor);
    }

    /// Resets every descriptor to [`Descriptor::ZERO`].
    pub fn clear(&self) {
        for slot in &self.slots {
            slot.write(D::ZERO);
        }
    }
}

impl<D: Descriptor, const N: usize> Default for DescriptorRing<D, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A descriptor ring together with the address the device reaches it at.
pub struct DmaRing<'r, D, const N: usize> {
    ring: &'r DescriptorRing<D, N>,
    phys: PhysicalAddress,
}

impl<'r, D: Descriptor, const N: usize> DmaRing<'r, D, N> {
    /// # Safety
    /// `phys` must be the device-visible address of `ring`, and nothing but
    /// the driver and the device may access the ring from now on.
    #[must_use]
    pub const unsafe fn new(ring: &'r DescriptorRing<D, N>, phys: PhysicalAddress) -> Self {
        Self { ring, phys }
    }

    /// # Errors
    /// See [`DescriptorRing::check_layout`]; also rejects a base address that
    /// is not 16-byte aligned.
    pub fn check(&self) -> Result<(), RingLayoutError> {
        DescriptorRing::<D, N>::check_layout()?;
        if !self.phys.as_u64().is_multiple_of(16) {
            return Err(RingLayoutError::Unaligned { phys: self.phys });
        }
        Ok(())
    }

    #[must_use]
    pub const fn phys(&self) -> PhysicalAddress {
        self.phys
    }

    #[must_use]
    pub const fn descriptors(&self) -> &'r DescriptorRing<D, N> {
        self.ring
    }

    /// Ring length in bytes as a register value.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn length_register(&self) -> u32 {
        self.ring.byte_len() as u32
    }
}
