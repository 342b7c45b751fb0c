//! Basic usage of the `block_pool` crate:
//!
//! * Creating fixed-capacity and growing pools.
//! * Allocating objects.
//! * Accessing and enumerating objects via pointers.
//! * Releasing objects.

use block_pool::{DynamicPool, FixedPool};

fn main() {
    let mut names = FixedPool::<String>::new(3);

    // Allocating an object gives you a pointer that stays valid until you release the object.
    let alice = names.allocate("Alice".to_string()).unwrap();
    let bob = names.allocate("Bob".to_string()).unwrap();
    let charlie = names.allocate("Charlie".to_string()).unwrap();

    // A fixed pool never grows, so the fourth allocation fails.
    assert!(names.allocate("Dave".to_string()).is_none());

    println!(
        "Fixed pool contains {} objects in {} slots",
        names.stats().allocation_count,
        names.capacity()
    );

    // SAFETY: The pool does not create references to its objects, so as the owner of the
    // object we may access it as long as we have not released it.
    println!("Retrieved object: {}", unsafe { alice.as_ref() });

    // SAFETY: The pointers came from this pool and are not used after release.
    unsafe {
        names.release(bob.as_ptr());
        names.release(charlie.as_ptr());
    }

    // The slot released last is the first to be reused.
    let dave = names.allocate("Dave".to_string()).unwrap();
    assert_eq!(dave, charlie);

    names.for_each(|ptr| {
        // SAFETY: Every visited object is live and nobody else is accessing it.
        println!("Enumerated object: {}", unsafe { ptr.as_ref() });
    });

    // SAFETY: The pointers came from this pool and are not used after release.
    unsafe {
        names.release(alice.as_ptr());
        names.release(dave.as_ptr());
    }

    // A dynamic pool adds blocks as needed and keeps them until it is dropped.
    let mut numbers = DynamicPool::<u64>::new(4);

    let ptrs: Vec<_> = (0..10).map(|v| numbers.allocate(v).unwrap()).collect();

    let stats = numbers.stats();
    println!(
        "Dynamic pool contains {} objects in {} blocks",
        stats.allocation_count, stats.block_count
    );

    for ptr in ptrs {
        // SAFETY: The pointers came from this pool and are not used after release.
        unsafe { numbers.release(ptr.as_ptr()) };
    }
}
