use std::mem::MaybeUninit;
use std::ptr::NonNull;

use crate::block_layout::slot_capacity;
use crate::{Block, DropPolicy, Error, FixedPoolBuilder, PoolStats, Result};

/// An object pool with a fixed capacity, backed by a single block allocated up front.
///
/// Allocating and releasing objects are both constant-time operations that never touch the host
/// allocator. Once all slots are occupied, further allocations fail until an object is released;
/// the pool never grows. Use [`DynamicPool`][crate::DynamicPool] if you do not know an upper
/// bound for the number of live objects.
///
/// The pool hands out raw pointers to the objects it stores. The objects never move, so the
/// pointers remain valid until the object is released. The pool itself never creates references
/// to the objects, so the owner of an object may freely create references to it from unsafe code.
///
/// # Example
///
/// ```rust
/// use block_pool::FixedPool;
///
/// let mut pool = FixedPool::<String>::new(2);
///
/// let hello = pool.allocate("Hello".to_string()).unwrap();
/// let world = pool.allocate("World".to_string()).unwrap();
///
/// // The pool is full, so this allocation fails.
/// assert!(pool.allocate("!".to_string()).is_none());
///
/// // SAFETY: The object is live and nobody else is accessing it.
/// assert_eq!(unsafe { hello.as_ref() }, "Hello");
///
/// // SAFETY: Both pointers came from this pool and are not used after release.
/// unsafe {
///     pool.release(hello.as_ptr());
///     pool.release(world.as_ptr());
/// }
///
/// assert_eq!(pool.stats().allocation_count, 0);
/// ```
///
/// # Dropping the pool
///
/// By default, the pool panics if it is dropped while it still contains objects. See
/// [`DropPolicy`] for the alternative.
#[derive(Debug)]
pub struct FixedPool<T> {
    block: Block<T>,
}

impl<T> FixedPool<T> {
    pub(crate) fn new_inner(max_entries: usize, drop_policy: DropPolicy) -> Result<Self> {
        let block = Block::create(slot_capacity(max_entries), drop_policy)?;

        Ok(Self { block })
    }

    /// Creates a pool with room for `max_entries` objects.
    ///
    /// # Panics
    ///
    /// Panics if `max_entries` is zero or does not fit in a `u32`, if `T` is zero-sized or
    /// if the host allocator cannot provide the memory for the pool.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self::builder().capacity(max_entries).build()
    }

    /// Starts building a new [`FixedPool`].
    ///
    /// Use this when you want to customize the pool configuration or handle allocation failure
    /// when creating the pool.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::{DropPolicy, FixedPool};
    ///
    /// let pool = FixedPool::<u64>::builder()
    ///     .capacity(1024)
    ///     .drop_policy(DropPolicy::MayDropItems)
    ///     .try_build()
    ///     .expect("not enough memory for the pool");
    ///
    /// assert_eq!(pool.capacity(), 1024);
    /// ```
    pub fn builder() -> FixedPoolBuilder<T> {
        FixedPoolBuilder::new()
    }

    /// The maximum number of objects the pool can hold at the same time.
    #[must_use]
    pub fn capacity(&self) -> usize {
        usize::try_from(self.block.capacity()).expect("slot index always fits in usize")
    }

    /// Whether every slot in the pool is occupied.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.block.is_full()
    }

    /// Moves `value` into a vacant slot and returns a pointer to it.
    ///
    /// The pointer remains valid until it is passed to [`release()`][Self::release].
    ///
    /// Returns `None` if the pool is full, in which case `value` is dropped.
    #[must_use]
    pub fn allocate(&mut self, value: T) -> Option<NonNull<T>> {
        self.block.allocate(value)
    }

    /// Moves `value` into a vacant slot and returns a pointer to it.
    ///
    /// This is [`allocate()`][Self::allocate] with the reason for failure spelled out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exhausted`] if the pool is full, in which case `value` is dropped.
    pub fn try_allocate(&mut self, value: T) -> Result<NonNull<T>> {
        let capacity = self.capacity();

        self.block
            .allocate(value)
            .ok_or(Error::Exhausted { capacity })
    }

    /// Initializes an object in place in a vacant slot and returns a pointer to it.
    ///
    /// This can avoid moving large objects and allows leaving `MaybeUninit` fields of the object
    /// uninitialized. Returns `None` if the pool is full, in which case `f` is not called.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<[u8; 4096]>::new(4);
    ///
    /// // SAFETY: The closure initializes the entire array.
    /// let page = unsafe {
    ///     pool.allocate_with(|uninit| {
    ///         uninit.write([0xFF; 4096]);
    ///     })
    /// }
    /// .unwrap();
    ///
    /// // SAFETY: The pointer came from this pool and is not used after release.
    /// unsafe { pool.release(page.as_ptr()) };
    /// ```
    ///
    /// # Safety
    ///
    /// The closure must fully initialize the object before returning.
    #[must_use]
    pub unsafe fn allocate_with(
        &mut self,
        f: impl FnOnce(&mut MaybeUninit<T>),
    ) -> Option<NonNull<T>> {
        // SAFETY: Forwarding the guarantee of the caller.
        unsafe { self.block.allocate_with(f) }
    }

    /// Drops the object at `ptr` and makes its slot available for reuse.
    ///
    /// Does nothing if `ptr` is null. The most recently released slot is the first to be reused.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` does not point to a live object in this pool.
    ///
    /// # Safety
    ///
    /// The caller must ensure that no references to the object exist and that neither `ptr` nor
    /// any other pointer to the object is used after this call.
    pub unsafe fn release(&mut self, ptr: *const T) {
        // SAFETY: Forwarding the guarantee of the caller.
        unsafe {
            self.block.release(ptr);
        }
    }

    /// Calls `visit` with a pointer to every live object in the pool, in slot order.
    ///
    /// This scans every slot of the pool, so it takes time proportional to the capacity.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::{DropPolicy, FixedPool};
    ///
    /// let mut pool = FixedPool::<u32>::builder()
    ///     .capacity(8)
    ///     .drop_policy(DropPolicy::MayDropItems)
    ///     .build();
    ///
    /// _ = pool.allocate(1);
    /// _ = pool.allocate(2);
    ///
    /// let mut sum = 0;
    /// // SAFETY: All objects are live and nobody else is accessing them.
    /// pool.for_each(|ptr| sum += unsafe { *ptr.as_ref() });
    ///
    /// assert_eq!(sum, 3);
    /// ```
    pub fn for_each(&self, visit: impl FnMut(NonNull<T>)) {
        self.block.for_each(visit);
    }

    /// Reports the number of blocks (always one) and the number of live objects.
    ///
    /// The live objects are counted by scanning every slot of the pool.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            block_count: 1,
            allocation_count: self.block.count_live(),
        }
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(test)]
    pub(crate) fn integrity_check(&self) {
        self.block.integrity_check();
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::indexing_slicing,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::cell::Cell;
    use std::ptr;
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(FixedPool<u32>: Send);
    assert_not_impl_any!(FixedPool<u32>: Sync);
    assert_not_impl_any!(FixedPool<Rc<u32>>: Send);

    #[test]
    fn smoke_test() {
        let mut pool = FixedPool::<u32>::new(3);

        let a = pool.allocate(1).unwrap();
        let b = pool.allocate(2).unwrap();
        let c = pool.allocate(3).unwrap();

        assert!(pool.is_full());
        assert_eq!(
            pool.stats(),
            PoolStats {
                block_count: 1,
                allocation_count: 3
            }
        );

        unsafe {
            assert_eq!(*a.as_ref(), 1);
            assert_eq!(*b.as_ref(), 2);
            assert_eq!(*c.as_ref(), 3);

            pool.release(a.as_ptr());
            pool.release(b.as_ptr());
            pool.release(c.as_ptr());
        }

        assert_eq!(pool.stats().allocation_count, 0);
        pool.integrity_check();
    }

    #[test]
    fn exactly_capacity_allocations_succeed() {
        let mut pool = FixedPool::<u64>::builder()
            .capacity(5)
            .drop_policy(DropPolicy::MayDropItems)
            .build();

        for value in 0..5 {
            assert!(pool.allocate(value).is_some());
        }

        assert!(pool.allocate(5).is_none());
        assert_eq!(pool.stats().allocation_count, 5);
    }

    #[test]
    fn try_allocate_reports_exhaustion() {
        let mut pool = FixedPool::<u64>::builder()
            .capacity(1)
            .drop_policy(DropPolicy::MayDropItems)
            .build();

        assert!(pool.try_allocate(1).is_ok());
        assert!(matches!(
            pool.try_allocate(2),
            Err(Error::Exhausted { capacity: 1 })
        ));
    }

    #[test]
    fn rejected_value_is_dropped() {
        struct Droppable(Rc<Cell<usize>>);

        impl Drop for Droppable {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let drops = Rc::new(Cell::new(0));
        let mut pool = FixedPool::<Droppable>::new(1);

        let a = pool.allocate(Droppable(Rc::clone(&drops))).unwrap();
        assert!(pool.allocate(Droppable(Rc::clone(&drops))).is_none());
        assert_eq!(drops.get(), 1);

        unsafe { pool.release(a.as_ptr()) };
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn release_null_is_noop() {
        let mut pool = FixedPool::<u32>::new(1);

        unsafe { pool.release(ptr::null()) };

        assert_eq!(pool.stats().allocation_count, 0);
    }

    #[test]
    fn allocate_with_initializes_in_place() {
        let mut pool = FixedPool::<[u64; 16]>::new(2);

        let ptr = unsafe {
            pool.allocate_with(|uninit| {
                uninit.write([7; 16]);
            })
        }
        .unwrap();

        unsafe {
            assert_eq!(ptr.as_ref()[15], 7);
            pool.release(ptr.as_ptr());
        }
    }

    #[test]
    fn for_each_visits_live_objects() {
        let mut pool = FixedPool::<u32>::new(5);

        let ptrs: Vec<_> = (10..15).map(|v| pool.allocate(v).unwrap()).collect();

        unsafe {
            pool.release(ptrs[1].as_ptr());
            pool.release(ptrs[3].as_ptr());
        }

        let mut seen = Vec::new();
        pool.for_each(|ptr| seen.push(unsafe { ptr.read() }));

        assert_eq!(seen, vec![10, 12, 14]);
        assert_eq!(pool.stats().allocation_count, seen.len());

        unsafe {
            pool.release(ptrs[0].as_ptr());
            pool.release(ptrs[2].as_ptr());
            pool.release(ptrs[4].as_ptr());
        }

        pool.integrity_check();
    }

    #[test]
    fn released_address_is_reused() {
        let mut pool = FixedPool::<u32>::new(3);

        let a = pool.allocate(1).unwrap();
        let b = pool.allocate(2).unwrap();
        let c = pool.allocate(3).unwrap();

        unsafe { pool.release(b.as_ptr()) };

        let d = pool.allocate(4).unwrap();
        assert_eq!(d, b);

        unsafe {
            pool.release(a.as_ptr());
            pool.release(c.as_ptr());
            pool.release(d.as_ptr());
        }
    }

    #[test]
    #[should_panic]
    fn release_foreign_pointer_panics() {
        let mut pool = FixedPool::<u32>::builder()
            .capacity(2)
            .drop_policy(DropPolicy::MayDropItems)
            .build();

        let mut other = FixedPool::<u32>::builder()
            .capacity(2)
            .drop_policy(DropPolicy::MayDropItems)
            .build();

        let foreign = other.allocate(1).unwrap();

        unsafe { pool.release(foreign.as_ptr()) };
    }

    #[test]
    #[should_panic]
    fn drop_with_live_objects_panics() {
        let mut pool = FixedPool::<u32>::new(2);
        _ = pool.allocate(1);
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        drop(FixedPool::<u32>::new(0));
    }

    #[test]
    #[should_panic]
    fn zst_panics() {
        drop(FixedPool::<()>::new(4));
    }

    #[test]
    fn over_aligned_objects_are_aligned() {
        #[repr(align(64))]
        struct CacheLine(u8);

        let mut pool = FixedPool::<CacheLine>::new(3);

        let ptrs: Vec<_> = (0..3).map(|v| pool.allocate(CacheLine(v)).unwrap()).collect();

        for ptr in &ptrs {
            assert_eq!(ptr.as_ptr().addr() % 64, 0);
        }

        for ptr in ptrs {
            unsafe {
                assert!(ptr.as_ref().0 < 3);
                pool.release(ptr.as_ptr());
            }
        }
    }
}
