//! # The e1000 Device Context

use crate::buffer::{BufferPool, PacketBuffer, ReceiveSink};
use crate::desc::{DmaRing, RxDescriptor, TxDescriptor};
use crate::fatal;
use crate::mmio::RegisterFile;
use crate::regs::{
    DeviceControl, InterruptCause, Register, ReceiveControl, TransmitControl, TransmitIpg,
    buffer_size,
};
use crate::rx::RxRing;
use crate::tx::TxRing;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use kernel_info::net::{DEFAULT_MAC, MULTICAST_TABLE_ENTRIES, RX_HEADROOM, RX_RING_SIZE, TX_RING_SIZE};
use kernel_sync::{InterruptControl, SpinLock};
use log::{info, trace};

/// Address-valid bit of a receive address high register.
const RAH_ADDRESS_VALID: u32 = 1 << 31;

/// An Ethernet station address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Lower four bytes as stored in a receive address low register.
    #[must_use]
    pub const fn ral(self) -> u32 {
        let [a, b, c, d, _, _] = self.0;
        u32::from_le_bytes([a, b, c, d])
    }

    /// Upper two bytes plus the address-valid bit, as stored in a receive
    /// address high register.
    #[must_use]
    pub const fn rah(self) -> u32 {
        let [_, _, _, _, e, f] = self.0;
        u32::from_le_bytes([e, f, 0, 0]) | RAH_ADDRESS_VALID
    }
}

impl Default for MacAddress {
    fn default() -> Self {
        Self(DEFAULT_MAC)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Runtime settings for [`E1000::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct E1000Config {
    /// Station address programmed into receive filter slot 0.
    pub mac: MacAddress,
    /// Headroom requested for every receive buffer.
    pub rx_headroom: usize,
}

impl Default for E1000Config {
    fn default() -> Self {
        Self {
            mac: MacAddress::default(),
            rx_headroom: RX_HEADROOM,
        }
    }
}

/// The transmit ring had no free slot; the packet was not queued.
///
/// Carries the buffer back to the caller, who decides whether to retry or drop.
pub struct RingFull<B>(pub B);

impl<B> RingFull<B> {
    pub fn into_inner(self) -> B {
        self.0
    }
}

impl<B> fmt::Debug for RingFull<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RingFull(..)")
    }
}

impl<B> fmt::Display for RingFull<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("transmit ring full")
    }
}

impl<B> core::error::Error for RingFull<B> {}

/// Snapshot of driver counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NicStats {
    pub tx_packets: u64,
    pub tx_bytes: u64,
    /// Transmit calls turned away with [`RingFull`].
    pub tx_busy: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub interrupts: u64,
}

#[derive(Default)]
struct Counters {
    tx_packets: AtomicU64,
    tx_bytes: AtomicU64,
    tx_busy: AtomicU64,
    rx_packets: AtomicU64,
    rx_bytes: AtomicU64,
    interrupts: AtomicU64,
}

impl Counters {
    fn add(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> NicStats {
        NicStats {
            tx_packets: self.tx_packets.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            tx_busy: self.tx_busy.load(Ordering::Relaxed),
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            interrupts: self.interrupts.load(Ordering::Relaxed),
        }
    }
}

/// One initialized e1000.
///
/// * `R` reaches the device registers.
/// * `I` masks interrupts on the current core while a ring lock is held, so
///   the interrupt handler cannot spin on a lock its own core holds.
/// * `P` provides packet buffers; `S` consumes received packets.
///
/// Each ring has its own lock. The receive path may transmit from inside
/// [`ReceiveSink::deliver`]; the lock order is therefore receive, then
/// transmit, and never the reverse.
pub struct E1000<'r, R, I, P, S, const TX: usize = TX_RING_SIZE, const RX: usize = RX_RING_SIZE>
where
    P: BufferPool,
{
    regs: R,
    irq: I,
    pool: P,
    sink: S,
    config: E1000Config,
    tx: SpinLock<TxRing<'r, P::Buffer, TX>>,
    rx: SpinLock<RxRing<'r, P::Buffer, RX>>,
    counters: Counters,
}

impl<'r, R, I, P, S, const TX: usize, const RX: usize> E1000<'r, R, I, P, S, TX, RX>
where
    R: RegisterFile,
    I: InterruptControl,
    P: BufferPool,
    S: ReceiveSink<P::Buffer>,
{
    /// Resets the device and brings up both rings.
    ///
    /// Both rings are validated before any register is written; a ring the
    /// device cannot use is fatal, as is running out of receive buffers while
    /// filling the receive ring.
    pub fn init(
        regs: R,
        irq: I,
        pool: P,
        sink: S,
        tx_ring: DmaRing<'r, TxDescriptor, TX>,
        rx_ring: DmaRing<'r, RxDescriptor, RX>,
        config: E1000Config,
    ) -> Self {
        if let Err(e) = tx_ring.check() {
            fatal(format_args!("e1000: transmit ring unusable: {e}"));
        }
        if let Err(e) = rx_ring.check() {
            fatal(format_args!("e1000: receive ring unusable: {e}"));
        }

        // Reset with interrupts masked.
        regs.write(Register::Ims, 0);
        let ctrl = DeviceControl::from_bits(regs.read(Register::Ctrl)).with_rst_device_reset(true);
        regs.write(Register::Ctrl, ctrl.into_bits());
        regs.write(Register::Ims, 0);
        regs.barrier();

        let mut tx = TxRing::new(tx_ring);
        tx.start(&regs);

        let mut rx = RxRing::new(rx_ring);
        rx.start(&regs, &pool, config.rx_headroom);

        regs.write(Register::Ral(0), config.mac.ral());
        regs.write(Register::Rah(0), config.mac.rah());
        for i in 0..MULTICAST_TABLE_ENTRIES {
            regs.write(Register::Mta(i), 0);
        }

        let tctl = TransmitControl::new()
            .with_en_enable(true)
            .with_psp_pad_short_packets(true)
            .with_ct_collision_threshold(0x10)
            .with_cold_collision_distance(0x40);
        regs.write(Register::Tctl, tctl.into_bits());
        let tipg = TransmitIpg::new().with_ipgt(10).with_ipgr1(8).with_ipgr2(6);
        regs.write(Register::Tipg, tipg.into_bits());

        let rctl = ReceiveControl::new()
            .with_en_enable(true)
            .with_bam_broadcast_accept(true)
            .with_bsize(buffer_size::B2048)
            .with_secrc_strip_crc(true);
        regs.write(Register::Rctl, rctl.into_bits());

        // Interrupt on every received packet, no batching delay.
        regs.write(Register::Rdtr, 0);
        regs.write(Register::Radv, 0);
        regs.write(Register::Ims, InterruptCause::new().with_rxt0(true).into_bits());

        info!(
            "e1000 up: mac {}, {TX} transmit / {RX} receive descriptors",
            config.mac
        );

        Self {
            regs,
            irq,
            pool,
            sink,
            config,
            tx: SpinLock::new(tx),
            rx: SpinLock::new(rx),
            counters: Counters::default(),
        }
    }

    /// Queues one packet for transmission.
    ///
    /// Never waits: if the device still owns the next slot, the buffer is
    /// returned in [`RingFull`] and nothing changes.
    ///
    /// # Errors
    /// [`RingFull`] if the transmit ring has no free slot.
    pub fn transmit(&self, buffer: P::Buffer) -> Result<(), RingFull<P::Buffer>> {
        let len = buffer.len() as u64;
        let result = self.tx.lock_irq(&self.irq).push(&self.regs, &self.pool, buffer);
        match result {
            Ok(slot) => {
                trace!("e1000: queued {len} bytes in transmit slot {slot}");
                Counters::add(&self.counters.tx_packets, 1);
                Counters::add(&self.counters.tx_bytes, len);
                Ok(())
            }
            Err(buffer) => {
                trace!("e1000: transmit ring full");
                Counters::add(&self.counters.tx_busy, 1);
                Err(RingFull(buffer))
            }
        }
    }

    /// Interrupt entry point: acknowledges every pending cause, then drains
    /// the receive ring.
    pub fn on_interrupt(&self) {
        self.regs.write(Register::Icr, u32::MAX);
        Counters::add(&self.counters.interrupts, 1);
        self.drain();
    }

    /// Delivers every completed receive descriptor to the sink, refilling
    /// each slot. Returns the number of packets delivered.
    pub fn drain(&self) -> usize {
        let drained = self.rx.lock_irq(&self.irq).drain(
            &self.regs,
            &self.pool,
            &self.sink,
            self.config.rx_headroom,
        );
        Counters::add(&self.counters.rx_packets, drained.packets);
        Counters::add(&self.counters.rx_bytes, drained.bytes);
        usize::try_from(drained.packets).unwrap_or(usize::MAX)
    }

    #[must_use]
    pub const fn mac_address(&self) -> MacAddress {
        self.config.mac
    }

    #[must_use]
    pub fn stats(&self) -> NicStats {
        self.counters.snapshot()
    }
}
