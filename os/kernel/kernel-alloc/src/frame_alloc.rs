//! # Per-Core Physical Frame Allocator
//!
//! Hands out 4 KiB physical frames from one free list per core. A core
//! allocates from and frees to its own list; only when its list runs dry
//! does it take a frame from another core's list ("stealing").
//!
//! ```text
//!   cpu 0            cpu 1            cpu 2            cpu 3
//! ┌────────┐       ┌────────┐       ┌────────┐       ┌────────┐
//! │ lock   │       │ lock   │       │ lock   │       │ lock   │
//! │ head ──┼─► 7   │ head ──┼─► ∅   │ head ──┼─► 3   │ head ──┼─► ∅
//! └────────┘   │   └────────┘       └────────┘   │   └────────┘
//!              ▼                                 ▼
//!   link table: [ .. | 3:→9 | .. | 7:→2 | .. | 9:→∅ | .. ]
//! ```
//!
//! Lists are threaded through a link table indexed by frame number rather
//! than through the free frames themselves, so the allocator never
//! reinterprets frame contents.
//!
//! ## Locking
//! * Every list lock is taken with interrupts disabled on the current core
//!   (an [`IrqGuard`] spans the whole operation). This pins the caller to its
//!   core between reading the core id and locking that core's list, and keeps
//!   interrupt handlers that allocate from deadlocking against the context
//!   they interrupted.
//! * At most one list lock is held at a time. The steal scan releases each
//!   candidate's lock before probing the next one.
//!
//! ## Poisoning
//! Freed frames are filled with [`FRAME_FREE_POISON`], allocated frames with
//! [`FRAME_ALLOC_POISON`]. Stale or uninitialized reads show up as these
//! patterns instead of plausible data.

use crate::free_list::{FrameIndex, FrameLink, FrameList, MAX_INDEXABLE_FRAMES};
use crate::phys_mapper::PhysMapper;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use kernel_info::memory::{FRAME_ALLOC_POISON, FRAME_FREE_POISON, MAX_CPUS, PHYS_MEMORY_TOP};
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K};
use kernel_sync::{CpuLocal, IrqGuard, SpinLock};
use log::{debug, error, info};

/// The bytes of one frame, as seen through a [`PhysMapper`].
#[allow(clippy::cast_possible_truncation)]
pub type FrameBytes = [u8; Size4K::SIZE as usize];

/// Physical memory bounds the allocator enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    /// First byte after the kernel image (need not be page aligned).
    pub kernel_end: PhysicalAddress,
    /// First byte past usable RAM.
    pub phys_top: PhysicalAddress,
}

impl MemoryLayout {
    #[must_use]
    pub const fn new(kernel_end: PhysicalAddress, phys_top: PhysicalAddress) -> Self {
        Self {
            kernel_end,
            phys_top,
        }
    }

    /// Layout for the default machine, given the linker's end-of-kernel symbol.
    #[must_use]
    pub const fn with_kernel_end(kernel_end: PhysicalAddress) -> Self {
        Self::new(kernel_end, PhysicalAddress::new(PHYS_MEMORY_TOP))
    }

    /// Address of frame index 0.
    #[must_use]
    pub const fn arena_base(&self) -> PhysicalAddress {
        self.kernel_end.align_up::<Size4K>()
    }

    /// Number of link table entries needed to describe every frame of the layout.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn frame_capacity(&self) -> usize {
        let base = self.arena_base().as_u64();
        let top = self.phys_top.as_u64();
        if top <= base {
            0
        } else {
            (top - base).div_ceil(Size4K::SIZE) as usize
        }
    }
}

/// Errors reported while constructing a [`FrameAllocator`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameAllocatorError {
    #[error("at least one CPU is required")]
    NoCpus,
    #[error("{requested} CPUs requested, at most {max} are supported")]
    TooManyCpus { requested: usize, max: usize },
    #[error("no frames between end of kernel {kernel_end} and top of memory {phys_top}")]
    EmptyLayout {
        kernel_end: PhysicalAddress,
        phys_top: PhysicalAddress,
    },
    #[error("layout spans {frames} frames, more than a link table can index")]
    TooManyFrames { frames: usize },
    #[error("link table has {provided} entries, layout needs {needed}")]
    LinkTableTooSmall { needed: usize, provided: usize },
}

/// An owned physical frame.
///
/// The handle is not `Clone`: whoever holds it owns the frame until it is
/// passed back to [`FrameAllocator::free`].
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frame(PhysicalAddress);

impl Frame {
    /// Wraps a raw physical address.
    ///
    /// # Safety
    /// The caller must own the frame at `pa`: nothing else may use it or free it.
    #[must_use]
    pub const unsafe fn from_address(pa: PhysicalAddress) -> Self {
        Self(pa)
    }

    #[must_use]
    pub const fn address(&self) -> PhysicalAddress {
        self.0
    }

    /// Gives up the handle, e.g. to install the frame in a page table.
    #[must_use]
    pub const fn into_address(self) -> PhysicalAddress {
        self.0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

/// Snapshot of allocator counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocStats {
    /// Allocations served from the current core's own list.
    pub local_hits: u64,
    /// Allocations served from another core's list.
    pub steals: u64,
    /// Lock attempts made while looking for a list to steal from.
    pub steal_probes: u64,
    /// Allocations that found every list empty.
    pub exhausted: u64,
    /// Frames returned through [`FrameAllocator::free`].
    pub frees: u64,
}

#[derive(Default)]
struct Counters {
    local_hits: AtomicU64,
    steals: AtomicU64,
    steal_probes: AtomicU64,
    exhausted: AtomicU64,
    frees: AtomicU64,
}

impl Counters {
    #[inline]
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> AllocStats {
        AllocStats {
            local_hits: self.local_hits.load(Ordering::Relaxed),
            steals: self.steals.load(Ordering::Relaxed),
            steal_probes: self.steal_probes.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
        }
    }
}

/// Per-core free-list frame allocator.
///
/// Constructed once at boot with [`new`](Self::new), filled once with
/// [`init`](Self::init), then shared by reference among all cores.
///
/// * `M` turns physical addresses into references for poisoning.
/// * `C` reports the current core and controls its interrupt flag.
pub struct FrameAllocator<'a, M, C> {
    mapper: M,
    cpu: C,
    layout: MemoryLayout,
    arena_base: PhysicalAddress,
    links: &'a [FrameLink],
    lists: [SpinLock<FrameList>; MAX_CPUS],
    cpus: usize,
    initialized: AtomicBool,
    counters: Counters,
}

impl<'a, M, C> FrameAllocator<'a, M, C>
where
    M: PhysMapper,
    C: CpuLocal,
{
    /// Creates an allocator with `cpus` empty free lists.
    ///
    /// `links` must have at least [`MemoryLayout::frame_capacity`] entries.
    ///
    /// # Errors
    /// Returns a [`FrameAllocatorError`] if the CPU count or the layout is
    /// unusable, or if `links` is too small to describe every frame.
    pub fn new(
        mapper: M,
        cpu: C,
        layout: MemoryLayout,
        cpus: usize,
        links: &'a [FrameLink],
    ) -> Result<Self, FrameAllocatorError> {
        if cpus == 0 {
            return Err(FrameAllocatorError::NoCpus);
        }
        if cpus > MAX_CPUS {
            return Err(FrameAllocatorError::TooManyCpus {
                requested: cpus,
                max: MAX_CPUS,
            });
        }

        let needed = layout.frame_capacity();
        if needed == 0 {
            return Err(FrameAllocatorError::EmptyLayout {
                kernel_end: layout.kernel_end,
                phys_top: layout.phys_top,
            });
        }
        if needed > MAX_INDEXABLE_FRAMES {
            return Err(FrameAllocatorError::TooManyFrames { frames: needed });
        }
        if links.len() < needed {
            return Err(FrameAllocatorError::LinkTableTooSmall {
                needed,
                provided: links.len(),
            });
        }

        Ok(Self {
            mapper,
            cpu,
            layout,
            arena_base: layout.arena_base(),
            links,
            lists: core::array::from_fn(|_| SpinLock::new(FrameList::new())),
            cpus,
            initialized: AtomicBool::new(false),
            counters: Counters::default(),
        })
    }

    /// Frees every whole frame in `[align_up(start), end)` onto the current
    /// core's list.
    ///
    /// Must be called exactly once, before the first [`allocate`](Self::allocate);
    /// a second call is fatal. Frames outside the layout are fatal as in
    /// [`free`](Self::free).
    ///
    /// # Safety
    /// The range must be unused RAM, owned by nobody else from now on.
    pub unsafe fn init(&self, start: PhysicalAddress, end: PhysicalAddress) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            corrupted(format_args!("frame allocator initialized twice"));
        }

        debug!("Sweeping physical range {start}..{end} into the frame allocator ...");
        let mut count = 0usize;
        let mut pa = start.align_up::<Size4K>();
        while pa.as_u64() + Size4K::SIZE <= end.as_u64() {
            // SAFETY: the caller hands us the whole range.
            self.free(unsafe { Frame::from_address(pa) });
            pa += Size4K::SIZE;
            count += 1;
        }

        info!(
            "Frame allocator online: {count} frames free, {} CPUs",
            self.cpus
        );
    }

    /// Returns `frame` to the current core's free list.
    ///
    /// The frame is overwritten with [`FRAME_FREE_POISON`] first.
    ///
    /// A frame that is not page aligned, lies below the end of the kernel, or
    /// lies at or above the top of physical memory is fatal: such a handle
    /// can only come from memory corruption.
    pub fn free(&self, frame: Frame) {
        let pa = frame.into_address();
        self.validate(pa);
        self.fill(pa, FRAME_FREE_POISON);

        let index = self.index_of(pa);
        {
            let _irq = IrqGuard::new(&self.cpu);
            let me = self.current_cpu();
            self.lists[me].lock().push(self.links, index);
        }
        Counters::bump(&self.counters.frees, 1);
    }

    /// Takes one frame, preferring the current core's list.
    ///
    /// When the local list is empty, the other cores' lists are probed in
    /// the fixed order `me + 1, me + 2, … (mod cpus)`. Returns `None` only if
    /// every list was observed empty; the caller decides what to do then.
    ///
    /// The returned frame is filled with [`FRAME_ALLOC_POISON`].
    pub fn allocate(&self) -> Option<Frame> {
        let index = {
            let _irq = IrqGuard::new(&self.cpu);
            let me = self.current_cpu();

            // Bind first so the local guard is released before stealing.
            let local = self.lists[me].lock().pop(self.links);
            match local {
                Some(index) => {
                    Counters::bump(&self.counters.local_hits, 1);
                    Some(index)
                }
                None => self.steal(me),
            }
        };

        let Some(index) = index else {
            Counters::bump(&self.counters.exhausted, 1);
            return None;
        };

        let pa = self.address_of(index);
        self.fill(pa, FRAME_ALLOC_POISON);
        // SAFETY: the frame just left a free list; we are its only owner.
        Some(unsafe { Frame::from_address(pa) })
    }

    /// Total number of free frames across all cores.
    ///
    /// Lists are counted one after another, so the sum is only exact when no
    /// other core allocates or frees concurrently.
    pub fn free_frames(&self) -> usize {
        (0..self.cpus).map(|cpu| self.free_frames_on(cpu)).sum()
    }

    /// Number of free frames on `cpu`'s list; zero for cores that do not exist.
    pub fn free_frames_on(&self, cpu: usize) -> usize {
        if cpu >= self.cpus {
            return 0;
        }
        let _irq = IrqGuard::new(&self.cpu);
        self.lists[cpu].lock().len()
    }

    #[must_use]
    pub fn stats(&self) -> AllocStats {
        self.counters.snapshot()
    }

    #[must_use]
    pub const fn cpus(&self) -> usize {
        self.cpus
    }

    #[must_use]
    pub const fn layout(&self) -> MemoryLayout {
        self.layout
    }

    /// Pops the head of the first non-empty foreign list.
    ///
    /// The first pass only uses `try_lock`, so a busy list is skipped rather
    /// than waited for. Lists that were busy get one blocking probe each in a
    /// second pass; only then is the scan allowed to report exhaustion.
    ///
    /// Must be called with interrupts disabled and no list lock held.
    fn steal(&self, me: usize) -> Option<FrameIndex> {
        let mut busy = 0u64;
        let mut probes = 0u64;

        let mut found = None;
        for victim in victims(me, self.cpus) {
            probes += 1;
            let Some(mut list) = self.lists[victim].try_lock() else {
                busy |= 1u64 << victim;
                continue;
            };
            if let Some(index) = list.pop(self.links) {
                found = Some((victim, index));
                break;
            }
        }

        if found.is_none() && busy != 0 {
            for victim in victims(me, self.cpus).filter(|&v| busy & (1u64 << v) != 0) {
                probes += 1;
                if let Some(index) = self.lists[victim].lock().pop(self.links) {
                    found = Some((victim, index));
                    break;
                }
            }
        }

        Counters::bump(&self.counters.steal_probes, probes);
        let (victim, index) = found?;
        Counters::bump(&self.counters.steals, 1);
        debug!(
            "cpu {me} stole frame #{} from cpu {victim} after {probes} probes",
            index.as_usize()
        );
        Some(index)
    }

    /// Current core id. Only meaningful while interrupts are disabled.
    fn current_cpu(&self) -> usize {
        let id = self.cpu.cpu_id();
        if id >= self.cpus {
            corrupted(format_args!(
                "cpu id {id} out of range, allocator configured for {} CPUs",
                self.cpus
            ));
        }
        id
    }

    fn validate(&self, pa: PhysicalAddress) {
        if !pa.is_aligned::<Size4K>() {
            corrupted(format_args!("free: frame {pa} is not page aligned"));
        }
        if pa < self.layout.kernel_end {
            corrupted(format_args!(
                "free: frame {pa} lies below the end of the kernel at {}",
                self.layout.kernel_end
            ));
        }
        if pa >= self.layout.phys_top {
            corrupted(format_args!(
                "free: frame {pa} lies at or above the top of memory at {}",
                self.layout.phys_top
            ));
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn index_of(&self, pa: PhysicalAddress) -> FrameIndex {
        FrameIndex::new(((pa - self.arena_base) >> Size4K::SHIFT) as u32)
    }

    fn address_of(&self, index: FrameIndex) -> PhysicalAddress {
        self.arena_base + ((index.as_usize() as u64) << Size4K::SHIFT)
    }

    fn fill(&self, pa: PhysicalAddress, pattern: u8) {
        // SAFETY: `pa` was validated against the layout and the frame is owned
        // by the current call (being freed, or just popped).
        let bytes: &mut FrameBytes = unsafe { self.mapper.phys_to_mut(pa) };
        bytes.fill(pattern);
    }
}

/// Cores other than `me`, in steal order.
fn victims(me: usize, cpus: usize) -> impl Iterator<Item = usize> {
    (1..cpus).map(move |k| (me + k) % cpus)
}

/// Reports a violated allocator invariant and halts the current context.
#[cold]
#[track_caller]
fn corrupted(args: fmt::Arguments<'_>) -> ! {
    error!("{args}");
    panic!("{args}");
}
