use core::sync::atomic::{AtomicU32, Ordering};

/// Link value meaning "no next frame".
const NIL: u32 = u32::MAX;

/// Largest number of frames a link table may describe.
pub(crate) const MAX_INDEXABLE_FRAMES: usize = NIL as usize;

/// One entry of the frame link table.
///
/// The table has one entry per frame of the managed arena. While a frame sits
/// on a free list, its entry holds the index of the next free frame on the
/// same list. The entry of an allocated frame is meaningless.
///
/// The kernel places the table in a static so it exists before the frame
/// allocator does:
///
/// ```rust
/// use kernel_alloc::free_list::FrameLink;
/// use kernel_info::memory::MAX_FRAMES;
///
/// static FRAME_LINKS: [FrameLink; MAX_FRAMES] = [const { FrameLink::new() }; MAX_FRAMES];
/// ```
#[repr(transparent)]
pub struct FrameLink(AtomicU32);

impl FrameLink {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU32::new(NIL))
    }

    // Entries are only touched by the holder of the list lock that owns the
    // frame; the lock provides the ordering, so relaxed accesses suffice.
    #[inline]
    fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    fn set(&self, next: u32) {
        self.0.store(next, Ordering::Relaxed);
    }
}

impl Default for FrameLink {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of a frame within the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct FrameIndex(u32);

impl FrameIndex {
    #[inline]
    pub(crate) const fn new(index: u32) -> Self {
        debug_assert!(index != NIL);
        Self(index)
    }

    #[inline]
    pub(crate) const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Singly linked LIFO list of free frames, threaded through a link table.
///
/// # Invariants
/// - Every index reachable from `head` is in bounds of the link table the
///   list is used with, and appears at most once.
/// - A frame is reachable from at most one list.
/// - `len` equals the number of reachable frames.
pub(crate) struct FrameList {
    head: u32,
    len: usize,
}

impl FrameList {
    pub(crate) const fn new() -> Self {
        Self { head: NIL, len: 0 }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) const fn is_empty(&self) -> bool {
        self.head == NIL
    }

    /// Put `index` at the front of the list.
    #[inline]
    pub(crate) fn push(&mut self, links: &[FrameLink], index: FrameIndex) {
        links[index.as_usize()].set(self.head);
        self.head = index.0;
        self.len += 1;
    }

    /// Take the most recently pushed frame.
    #[inline]
    pub(crate) fn pop(&mut self, links: &[FrameLink]) -> Option<FrameIndex> {
        if self.is_empty() {
            return None;
        }
        let index = FrameIndex(self.head);
        self.head = links[index.as_usize()].get();
        self.len -= 1;
        Some(index)
    }
}
