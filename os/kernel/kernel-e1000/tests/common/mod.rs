#![allow(dead_code)]

use kernel_e1000::desc::{RxStatus, TxStatus};
use kernel_e1000::{
    BufferPool, DescriptorRing, DmaRing, E1000, E1000Config, PacketBuffer, ReceiveSink,
    Register, RegisterFile, RxDescriptor, TxDescriptor,
};
use kernel_memory_addresses::PhysicalAddress;
use kernel_sync::InterruptControl;
use std::cell::Cell;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering, fence};

/// Ring addresses as the device would see them. The transmit ring sits above
/// 4 GiB so both base address halves are exercised.
pub const TX_PHYS: u64 = 0x1_0020_0000;
pub const RX_PHYS: u64 = 0x0020_1000;

pub const BUFFER_BASE: u64 = 0x1000_0000;
pub const BUFFER_SIZE: u64 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Write(Register, u32),
    Barrier,
}

/// Register window backed by plain memory, recording every driver write.
pub struct FakeRegisters {
    words: Vec<AtomicU32>,
    log: Mutex<Vec<Access>>,
}

impl FakeRegisters {
    pub fn new() -> Self {
        Self {
            words: (0..0x6000 / 4).map(|_| AtomicU32::new(0)).collect(),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self, reg: Register) -> u32 {
        self.words[reg.offset() / 4].load(Ordering::SeqCst)
    }

    /// Changes a register the way the device would, without logging.
    pub fn set(&self, reg: Register, value: u32) {
        self.words[reg.offset() / 4].store(value, Ordering::SeqCst);
    }

    pub fn log(&self) -> Vec<Access> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Every value written to `reg`, oldest first.
    pub fn writes_to(&self, reg: Register) -> Vec<u32> {
        self.log()
            .into_iter()
            .filter_map(|a| match a {
                Access::Write(r, v) if r == reg => Some(v),
                _ => None,
            })
            .collect()
    }
}

impl RegisterFile for FakeRegisters {
    fn read(&self, reg: Register) -> u32 {
        self.get(reg)
    }

    fn write(&self, reg: Register, value: u32) {
        self.set(reg, value);
        self.log.lock().unwrap().push(Access::Write(reg, value));
    }

    fn barrier(&self) {
        fence(Ordering::SeqCst);
        self.log.lock().unwrap().push(Access::Barrier);
    }
}

thread_local! {
    static IRQ_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Interrupt flag of the calling test thread.
#[derive(Clone, Copy)]
pub struct FakeIrq;

impl FakeIrq {
    pub fn enabled() -> bool {
        IRQ_ENABLED.with(Cell::get)
    }
}

impl InterruptControl for FakeIrq {
    fn interrupts_enabled(&self) -> bool {
        IRQ_ENABLED.with(Cell::get)
    }

    fn disable_interrupts(&self) {
        IRQ_ENABLED.with(|e| e.set(false));
    }

    fn enable_interrupts(&self) {
        IRQ_ENABLED.with(|e| e.set(true));
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct FakeBuffer {
    pub id: usize,
    pub len: usize,
}

impl FakeBuffer {
    pub fn address_of(id: usize) -> u64 {
        BUFFER_BASE + id as u64 * BUFFER_SIZE
    }
}

impl PacketBuffer for FakeBuffer {
    fn dma_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(Self::address_of(self.id))
    }

    fn len(&self) -> usize {
        self.len
    }

    fn set_len(&mut self, len: usize) {
        self.len = len;
    }
}

/// Hands out numbered buffers and remembers which ones came back.
#[derive(Default)]
pub struct FakePool {
    next: AtomicUsize,
    failing: AtomicBool,
    freed: Mutex<Vec<usize>>,
    headrooms: Mutex<Vec<usize>>,
}

impl FakePool {
    /// A buffer holding a `len`-byte packet, as the stack would hand it to `transmit`.
    pub fn packet(&self, len: usize) -> FakeBuffer {
        let mut b = self.alloc(0).expect("pool is failing");
        b.len = len;
        b
    }

    pub fn allocated(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }

    pub fn freed(&self) -> Vec<usize> {
        self.freed.lock().unwrap().clone()
    }

    pub fn headrooms(&self) -> Vec<usize> {
        self.headrooms.lock().unwrap().clone()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl BufferPool for FakePool {
    type Buffer = FakeBuffer;

    fn alloc(&self, headroom: usize) -> Option<FakeBuffer> {
        if self.failing.load(Ordering::SeqCst) {
            return None;
        }
        self.headrooms.lock().unwrap().push(headroom);
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        Some(FakeBuffer { id, len: 0 })
    }

    fn free(&self, buffer: FakeBuffer) {
        self.freed.lock().unwrap().push(buffer.id);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<FakeBuffer>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<FakeBuffer> {
        std::mem::take(&mut *self.delivered.lock().unwrap())
    }
}

impl ReceiveSink<FakeBuffer> for RecordingSink {
    fn deliver(&self, buffer: FakeBuffer) {
        self.delivered.lock().unwrap().push(buffer);
    }
}

pub type Nic<S = &'static RecordingSink> =
    E1000<'static, &'static FakeRegisters, FakeIrq, &'static FakePool, S>;

/// Simulated device side: registers, buffer pool and both rings.
#[derive(Clone, Copy)]
pub struct Device {
    pub regs: &'static FakeRegisters,
    pub pool: &'static FakePool,
    pub tx: &'static DescriptorRing<TxDescriptor, 16>,
    pub rx: &'static DescriptorRing<RxDescriptor, 16>,
}

impl Device {
    pub fn new() -> Self {
        Self {
            regs: Box::leak(Box::new(FakeRegisters::new())),
            pool: Box::leak(Box::default()),
            tx: Box::leak(Box::new(DescriptorRing::new())),
            rx: Box::leak(Box::new(DescriptorRing::new())),
        }
    }

    pub fn tx_ring(&self) -> DmaRing<'static, TxDescriptor, 16> {
        unsafe { DmaRing::new(self.tx, PhysicalAddress::new(TX_PHYS)) }
    }

    pub fn rx_ring(&self) -> DmaRing<'static, RxDescriptor, 16> {
        unsafe { DmaRing::new(self.rx, PhysicalAddress::new(RX_PHYS)) }
    }

    pub fn attach<S: ReceiveSink<FakeBuffer>>(&self, sink: S, config: E1000Config) -> Nic<S> {
        E1000::init(
            self.regs,
            FakeIrq,
            self.pool,
            sink,
            self.tx_ring(),
            self.rx_ring(),
            config,
        )
    }

    /// The device finished sending `slot`.
    pub fn complete_tx(&self, slot: usize) {
        let mut d = self.tx.read(slot);
        d.status = TxStatus::new().with_dd(true);
        self.tx.write(slot, d);
    }

    /// The device wrote a `len`-byte packet into `slot`.
    pub fn receive(&self, slot: usize, len: u16) {
        let mut d = self.rx.read(slot);
        d.length = len;
        d.status = RxStatus::new().with_dd(true).with_eop(true);
        self.rx.write(slot, d);
    }
}

/// A device brought up with the default configuration and a recording sink.
pub fn bring_up() -> (Nic, Device, &'static RecordingSink) {
    let device = Device::new();
    let sink: &'static RecordingSink = Box::leak(Box::default());
    let nic = device.attach(sink, E1000Config::default());
    (nic, device, sink)
}
