//! Integration tests of the pools through their public API only.

#![allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::modulo_arithmetic,
    reason = "test code doesn't need the same safety rigor as production code"
)]

use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;
use std::thread;

use block_pool::{DropPolicy, DynamicPool, Error, FixedPool};

#[test]
fn allocation_count_tracks_allocations_minus_releases() {
    let mut pool = DynamicPool::<u64>::new(8);
    let mut live = Vec::new();

    for round in 0..5_u64 {
        for value in 0..7 {
            live.push(pool.allocate(round * 100 + value).unwrap());
        }

        // Release every other object of this round.
        let mut index = 0;
        live.retain(|ptr| {
            index += 1;

            if index % 2 == 0 {
                unsafe { pool.release(ptr.as_ptr()) };
                false
            } else {
                true
            }
        });

        assert_eq!(pool.stats().allocation_count, live.len());
    }

    for ptr in live.drain(..) {
        unsafe { pool.release(ptr.as_ptr()) };
    }

    assert_eq!(pool.stats().allocation_count, 0);
}

#[test]
fn fixed_pool_rejects_allocation_beyond_capacity() {
    let mut pool = FixedPool::<u32>::new(4);

    let ptrs: Vec<_> = (0..4).map(|v| pool.allocate(v).unwrap()).collect();

    assert!(pool.is_full());
    assert!(pool.allocate(99).is_none());
    assert!(matches!(
        pool.try_allocate(99),
        Err(Error::Exhausted { capacity: 4 })
    ));

    // Releasing one object makes room for exactly one more.
    unsafe { pool.release(ptrs[1].as_ptr()) };
    let replacement = pool.allocate(5).unwrap();
    assert!(pool.allocate(6).is_none());

    for ptr in [ptrs[0], replacement, ptrs[2], ptrs[3]] {
        unsafe { pool.release(ptr.as_ptr()) };
    }
}

#[test]
fn dynamic_pool_adds_block_when_full() {
    const ENTRIES_PER_BLOCK: usize = 16;

    let mut pool = DynamicPool::<u32>::new(ENTRIES_PER_BLOCK);

    let ptrs: Vec<_> = (0..=ENTRIES_PER_BLOCK)
        .map(|v| pool.allocate(u32::try_from(v).unwrap()).unwrap())
        .collect();

    let stats = pool.stats();
    assert_eq!(stats.block_count, 2);
    assert_eq!(stats.allocation_count, ENTRIES_PER_BLOCK + 1);

    for ptr in ptrs {
        unsafe { pool.release(ptr.as_ptr()) };
    }

    // Blocks are kept after the objects are gone.
    assert_eq!(pool.stats().block_count, 2);
}

#[test]
fn released_address_is_reused_by_next_allocation() {
    let mut fixed = FixedPool::<String>::new(8);
    let mut dynamic = DynamicPool::<String>::new(8);

    let a = fixed.allocate("a".to_string()).unwrap();
    let b = fixed.allocate("b".to_string()).unwrap();
    unsafe { fixed.release(a.as_ptr()) };
    let c = fixed.allocate("c".to_string()).unwrap();
    assert_eq!(a, c);

    let x = dynamic.allocate("x".to_string()).unwrap();
    let y = dynamic.allocate("y".to_string()).unwrap();
    unsafe { dynamic.release(x.as_ptr()) };
    let z = dynamic.allocate("z".to_string()).unwrap();
    assert_eq!(x, z);

    unsafe {
        assert_eq!(c.as_ref(), "c");
        assert_eq!(z.as_ref(), "z");

        fixed.release(b.as_ptr());
        fixed.release(c.as_ptr());
        dynamic.release(y.as_ptr());
        dynamic.release(z.as_ptr());
    }
}

#[test]
fn for_each_visits_only_live_objects() {
    let mut fixed = FixedPool::<u32>::new(8);
    let mut dynamic = DynamicPool::<u32>::new(2);

    let fixed_ptrs: Vec<_> = (0..5).map(|v| fixed.allocate(v).unwrap()).collect();
    let dynamic_ptrs: Vec<_> = (0..5).map(|v| dynamic.allocate(v).unwrap()).collect();

    unsafe {
        fixed.release(fixed_ptrs[1].as_ptr());
        fixed.release(fixed_ptrs[3].as_ptr());
        dynamic.release(dynamic_ptrs[1].as_ptr());
        dynamic.release(dynamic_ptrs[3].as_ptr());
    }

    let mut fixed_seen = Vec::new();
    fixed.for_each(|ptr| fixed_seen.push(unsafe { ptr.read() }));
    assert_eq!(fixed_seen, vec![0, 2, 4]);

    let mut dynamic_seen = Vec::new();
    dynamic.for_each(|ptr| dynamic_seen.push(unsafe { ptr.read() }));
    assert_eq!(dynamic_seen, vec![0, 2, 4]);

    for index in [0, 2, 4] {
        unsafe {
            fixed.release(fixed_ptrs[index].as_ptr());
            dynamic.release(dynamic_ptrs[index].as_ptr());
        }
    }
}

#[test]
fn objects_are_modifiable_through_pointers() {
    let mut pool = DynamicPool::<Vec<u32>>::new(4);

    let mut ptr = pool.allocate(Vec::new()).unwrap();

    unsafe {
        ptr.as_mut().extend([1, 2, 3]);
        assert_eq!(ptr.as_ref().iter().sum::<u32>(), 6);

        pool.release(ptr.as_ptr());
    }
}

#[test]
fn objects_are_aligned_for_their_type() {
    #[repr(align(256))]
    struct PageAligned(u8);

    let mut pool = DynamicPool::<PageAligned>::new(3);

    let ptrs: Vec<_> = (0..10).map(|v| pool.allocate(PageAligned(v)).unwrap()).collect();

    for (value, ptr) in ptrs.iter().enumerate() {
        assert_eq!(ptr.as_ptr().addr() % 256, 0);
        assert_eq!(usize::from(unsafe { ptr.as_ref() }.0), value);
    }

    for ptr in ptrs {
        unsafe { pool.release(ptr.as_ptr()) };
    }
}

#[test]
fn dropping_empty_pools_is_fine() {
    let mut fixed = FixedPool::<u32>::new(4);
    let ptr = fixed.allocate(1).unwrap();
    unsafe { fixed.release(ptr.as_ptr()) };
    drop(fixed);

    let mut dynamic = DynamicPool::<u32>::new(1);
    let a = dynamic.allocate(1).unwrap();
    let b = dynamic.allocate(2).unwrap();
    unsafe {
        dynamic.release(a.as_ptr());
        dynamic.release(b.as_ptr());
    }
    drop(dynamic);
}

#[test]
#[should_panic]
fn dropping_fixed_pool_with_live_objects_panics() {
    let mut pool = FixedPool::<u32>::new(4);
    _ = pool.allocate(1);
}

#[test]
#[should_panic]
fn dropping_dynamic_pool_with_live_objects_panics() {
    let mut pool = DynamicPool::<u32>::new(4);
    _ = pool.allocate(1);
}

#[test]
fn dropping_pool_drops_live_objects_with_may_drop_policy() {
    struct Counted(Rc<Cell<u32>>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    let tracker = Rc::new(Cell::new(0));

    {
        let mut pool = DynamicPool::<Counted>::builder()
            .entries_per_block(2)
            .drop_policy(DropPolicy::MayDropItems)
            .build();

        for _ in 0..5 {
            _ = pool.allocate(Counted(Rc::clone(&tracker))).unwrap();
        }

        assert_eq!(tracker.get(), 0);
    }

    assert_eq!(tracker.get(), 5);
}

#[test]
fn pool_can_move_to_another_thread() {
    let mut pool = DynamicPool::<u64>::new(4);

    let ptrs: Vec<_> = (0..6).map(|v| pool.allocate(v).unwrap()).collect();

    // Raw pointers are not Send, so we ship the addresses and the pool together.
    let addresses: Vec<usize> = ptrs.iter().map(|ptr| ptr.as_ptr().addr()).collect();

    let sum = thread::spawn(move || {
        let mut sum = 0;
        pool.for_each(|ptr| sum += unsafe { ptr.read() });

        for ptr in ptrs_from(&pool, &addresses) {
            unsafe { pool.release(ptr.as_ptr()) };
        }

        assert_eq!(pool.stats().allocation_count, 0);
        sum
    })
    .join()
    .unwrap();

    assert_eq!(sum, 15);
}

/// Recovers the pointers of the live objects whose addresses are listed.
fn ptrs_from(pool: &DynamicPool<u64>, addresses: &[usize]) -> Vec<NonNull<u64>> {
    let mut found = Vec::new();

    pool.for_each(|ptr| {
        if addresses.contains(&ptr.as_ptr().addr()) {
            found.push(ptr);
        }
    });

    found
}
