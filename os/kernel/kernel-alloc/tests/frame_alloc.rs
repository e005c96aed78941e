mod common;

use common::{ARENA_FRAMES, HostMemory, KERNEL_END, PHYS_TOP, TestCpu, layout, link_table};
use kernel_alloc::{Frame, FrameAllocator, FrameAllocatorError, FrameLink, MemoryLayout};
use kernel_info::memory::{FRAME_ALLOC_POISON, FRAME_FREE_POISON, MAX_CPUS};
use kernel_memory_addresses::PhysicalAddress;
use std::collections::HashSet;
use std::sync::Barrier;
use std::thread;

type Alloc<'a> = FrameAllocator<'a, &'static HostMemory, TestCpu>;

fn allocator(links: &[FrameLink], cpus: usize) -> (Alloc<'_>, &'static HostMemory) {
    let ram = HostMemory::leak();
    let alloc = FrameAllocator::new(ram, TestCpu, layout(), cpus, links).unwrap();
    (alloc, ram)
}

/// An allocator whose whole arena was swept onto `cpu`'s list.
fn initialized_on(links: &[FrameLink], cpus: usize, cpu: usize) -> (Alloc<'_>, &'static HostMemory) {
    let (alloc, ram) = allocator(links, cpus);
    TestCpu::enter(cpu);
    unsafe { alloc.init(PhysicalAddress::new(KERNEL_END), PhysicalAddress::new(PHYS_TOP)) };
    (alloc, ram)
}

fn frame_at(pa: u64) -> Frame {
    unsafe { Frame::from_address(PhysicalAddress::new(pa)) }
}

#[test]
fn layout_arena_starts_at_first_whole_frame() {
    let l = layout();
    assert_eq!(l.arena_base().as_u64(), common::BASE + 0x2000);
    assert_eq!(l.frame_capacity(), ARENA_FRAMES);

    let empty = MemoryLayout::new(PhysicalAddress::new(PHYS_TOP), PhysicalAddress::new(KERNEL_END));
    assert_eq!(empty.frame_capacity(), 0);
}

#[test]
fn construction_rejects_bad_configuration() {
    let links = link_table();
    let ram = HostMemory::leak();

    let err = FrameAllocator::new(ram, TestCpu, layout(), 0, &links).err();
    assert_eq!(err, Some(FrameAllocatorError::NoCpus));

    let err = FrameAllocator::new(ram, TestCpu, layout(), MAX_CPUS + 1, &links).err();
    assert_eq!(
        err,
        Some(FrameAllocatorError::TooManyCpus {
            requested: MAX_CPUS + 1,
            max: MAX_CPUS
        })
    );

    let inverted = MemoryLayout::new(PhysicalAddress::new(PHYS_TOP), PhysicalAddress::new(KERNEL_END));
    let err = FrameAllocator::new(ram, TestCpu, inverted, 1, &links).err();
    assert!(matches!(err, Some(FrameAllocatorError::EmptyLayout { .. })));

    let err = FrameAllocator::new(ram, TestCpu, layout(), 1, &links[..10]).err();
    assert_eq!(
        err,
        Some(FrameAllocatorError::LinkTableTooSmall {
            needed: ARENA_FRAMES,
            provided: 10
        })
    );
}

#[test]
fn error_messages_name_the_problem() {
    let msg = FrameAllocatorError::LinkTableTooSmall {
        needed: 62,
        provided: 10,
    }
    .to_string();
    assert_eq!(msg, "link table has 10 entries, layout needs 62");
}

#[test]
fn init_sweeps_the_arena_onto_the_current_core() {
    let links = link_table();
    let (alloc, _) = initialized_on(&links, 4, 2);

    assert_eq!(alloc.free_frames(), ARENA_FRAMES);
    assert_eq!(alloc.free_frames_on(2), ARENA_FRAMES);
    for cpu in [0, 1, 3] {
        assert_eq!(alloc.free_frames_on(cpu), 0);
    }
    assert_eq!(alloc.free_frames_on(99), 0);
    assert_eq!(alloc.stats().frees, ARENA_FRAMES as u64);
}

#[test]
fn init_skips_a_trailing_partial_frame() {
    let links = link_table();
    let (alloc, _) = allocator(&links, 1);
    TestCpu::enter(0);
    unsafe { alloc.init(PhysicalAddress::new(KERNEL_END), PhysicalAddress::new(PHYS_TOP - 1)) };
    assert_eq!(alloc.free_frames(), ARENA_FRAMES - 1);
}

#[test]
fn frames_carry_free_and_alloc_poison() {
    let links = link_table();
    let (alloc, ram) = initialized_on(&links, 1, 0);

    let frame = alloc.allocate().unwrap();
    let pa = frame.address();
    assert!(ram.frame(pa).iter().all(|&b| b == FRAME_ALLOC_POISON));

    ram.scribble(pa, 0xAB);
    alloc.free(frame);
    assert!(ram.frame(pa).iter().all(|&b| b == FRAME_FREE_POISON));

    // LIFO: the same frame comes back, overwritten again
    let again = alloc.allocate().unwrap();
    assert_eq!(again.address(), pa);
    assert!(ram.frame(pa).iter().all(|&b| b == FRAME_ALLOC_POISON));
}

#[test]
fn exhaustion_returns_none_after_every_frame_is_handed_out() {
    let links = link_table();
    let (alloc, _) = initialized_on(&links, 1, 0);

    let mut seen = HashSet::new();
    let mut held = Vec::new();
    while let Some(frame) = alloc.allocate() {
        let pa = frame.address();
        assert!(pa.is_aligned::<kernel_memory_addresses::Size4K>());
        assert!(pa >= layout().arena_base() && pa.as_u64() < PHYS_TOP);
        assert!(seen.insert(pa), "{pa} handed out twice");
        held.push(frame);
    }
    assert_eq!(held.len(), ARENA_FRAMES);
    assert!(alloc.allocate().is_none());

    let stats = alloc.stats();
    assert_eq!(stats.local_hits, ARENA_FRAMES as u64);
    assert_eq!(stats.exhausted, 2);
    assert_eq!(stats.steals, 0);

    for frame in held {
        alloc.free(frame);
    }
    assert_eq!(alloc.free_frames(), ARENA_FRAMES);
}

#[test]
fn empty_core_steals_from_the_only_non_empty_core() {
    let links = link_table();
    let (alloc, _) = initialized_on(&links, 4, 2);

    // cpu 3 probes 0, 1, 2 in that order
    TestCpu::enter(3);
    let frame = alloc.allocate().unwrap();
    let stats = alloc.stats();
    assert_eq!(stats.steals, 1);
    assert_eq!(stats.local_hits, 0);
    assert!(stats.steal_probes <= 3);
    assert_eq!(alloc.free_frames_on(2), ARENA_FRAMES - 1);

    // cpu 1 finds cpu 2 on its first probe
    TestCpu::enter(1);
    let second = alloc.allocate().unwrap();
    assert_eq!(alloc.stats().steal_probes, stats.steal_probes + 1);

    // frees land on the freeing core, not on the core the frame came from
    alloc.free(frame);
    alloc.free(second);
    assert_eq!(alloc.free_frames_on(1), 2);
    assert_eq!(alloc.free_frames_on(2), ARENA_FRAMES - 2);

    let local = alloc.allocate().unwrap();
    assert_eq!(alloc.stats().local_hits, 1);
    alloc.free(local);
}

#[test]
fn every_list_empty_means_none() {
    let links = link_table();
    let (alloc, _) = allocator(&links, 3);
    TestCpu::enter(1);
    assert!(alloc.allocate().is_none());
    let stats = alloc.stats();
    assert_eq!(stats.exhausted, 1);
    assert_eq!(stats.steal_probes, 2);
}

#[test]
fn interrupt_state_is_restored() {
    let links = link_table();
    let (alloc, _) = initialized_on(&links, 2, 0);

    assert!(TestCpu::irq_enabled());
    let frame = alloc.allocate().unwrap();
    assert!(TestCpu::irq_enabled());
    alloc.free(frame);
    assert!(TestCpu::irq_enabled());

    kernel_sync::InterruptControl::disable_interrupts(&TestCpu);
    let frame = alloc.allocate().unwrap();
    alloc.free(frame);
    assert!(!TestCpu::irq_enabled(), "allocator must not enable interrupts");
    kernel_sync::InterruptControl::enable_interrupts(&TestCpu);
}

#[test]
#[should_panic(expected = "not page aligned")]
fn freeing_a_misaligned_frame_is_fatal() {
    let links = link_table();
    let (alloc, _) = allocator(&links, 1);
    alloc.free(frame_at(layout().arena_base().as_u64() + 8));
}

#[test]
#[should_panic(expected = "below the end of the kernel")]
fn freeing_kernel_memory_is_fatal() {
    let links = link_table();
    let (alloc, _) = allocator(&links, 1);
    alloc.free(frame_at(common::BASE + 0x1000));
}

#[test]
#[should_panic(expected = "top of memory")]
fn freeing_past_the_top_of_memory_is_fatal() {
    let links = link_table();
    let (alloc, _) = allocator(&links, 1);
    alloc.free(frame_at(PHYS_TOP));
}

#[test]
#[should_panic(expected = "initialized twice")]
fn second_init_is_fatal() {
    let links = link_table();
    let (alloc, _) = initialized_on(&links, 1, 0);
    unsafe { alloc.init(PhysicalAddress::new(KERNEL_END), PhysicalAddress::new(PHYS_TOP)) };
}

#[test]
fn concurrent_cores_never_share_a_frame() {
    const CPUS: usize = 4;
    const ROUNDS: usize = 200;

    let links = link_table();
    let (alloc, ram) = initialized_on(&links, CPUS, 0);
    let start = Barrier::new(CPUS);

    let counts: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..CPUS)
            .map(|cpu| {
                let alloc = &alloc;
                let start = &start;
                s.spawn(move || {
                    TestCpu::enter(cpu);
                    start.wait();
                    let marker = 0x10 + u8::try_from(cpu).unwrap();
                    let mut got = 0;
                    for _ in 0..ROUNDS {
                        let mut held = Vec::new();
                        for _ in 0..4 {
                            if let Some(frame) = alloc.allocate() {
                                ram.scribble(frame.address(), marker);
                                held.push(frame);
                            }
                        }
                        for frame in held {
                            // nobody else may have written into our frame
                            assert!(ram.frame(frame.address()).iter().all(|&b| b == marker));
                            got += 1;
                            alloc.free(frame);
                        }
                    }
                    got
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(alloc.free_frames(), ARENA_FRAMES);

    let stats = alloc.stats();
    let served: usize = counts.iter().sum();
    assert_eq!(stats.local_hits + stats.steals, served as u64);
    assert_eq!(served as u64 + stats.exhausted, (CPUS * ROUNDS * 4) as u64);
    assert!(stats.steals > 0, "cores 1..=3 start empty and must steal");
}

#[test]
fn concurrent_drain_hands_out_each_frame_once() {
    const CPUS: usize = 4;

    let links = link_table();
    let (alloc, _) = initialized_on(&links, CPUS, 1);
    let start = Barrier::new(CPUS);

    let taken: Vec<Vec<Frame>> = thread::scope(|s| {
        let handles: Vec<_> = (0..CPUS)
            .map(|cpu| {
                let alloc = &alloc;
                let start = &start;
                s.spawn(move || {
                    TestCpu::enter(cpu);
                    start.wait();
                    std::iter::from_fn(|| alloc.allocate()).collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut seen = HashSet::new();
    for frame in taken.iter().flatten() {
        assert!(seen.insert(frame.address()), "{:?} handed out twice", frame);
    }
    assert_eq!(seen.len(), ARENA_FRAMES);
    assert_eq!(alloc.free_frames(), 0);
}
