use std::any::type_name;
use std::mem::MaybeUninit;
use std::num::NonZero;
use std::ptr::{self, NonNull};

use crate::block_layout::{SlotIndex, slot_capacity};
use crate::{Block, DropPolicy, DynamicPoolBuilder, Error, PoolStats, Result};

/// An object pool of unbounded size, assembled from blocks of a fixed number of slots.
///
/// The pool starts with one block and adds another whenever all existing blocks are full. Blocks
/// are never removed, merged or compacted while the pool exists, so objects never move: a pointer
/// returned by [`allocate()`][Self::allocate] stays valid until the object is released.
///
/// Allocation prefers the earliest block that has a vacant slot, so objects stay packed towards
/// the front of the pool. It takes constant time unless the pool needs to look past full blocks
/// or grow. Releasing an object takes time proportional to the number of blocks, as the pool has
/// to find the block that contains the object.
///
/// # Example
///
/// ```rust
/// use block_pool::DynamicPool;
///
/// let mut pool = DynamicPool::<u64>::new(2);
///
/// let ptrs: Vec<_> = (0..3).map(|v| pool.allocate(v).unwrap()).collect();
///
/// // Two slots per block, so the third object required a second block.
/// assert_eq!(pool.stats().block_count, 2);
/// assert_eq!(pool.stats().allocation_count, 3);
///
/// for ptr in ptrs {
///     // SAFETY: The pointers came from this pool and are not used after release.
///     unsafe { pool.release(ptr.as_ptr()) };
/// }
///
/// // Blocks are retained until the pool is dropped.
/// assert_eq!(pool.stats().block_count, 2);
/// ```
///
/// # Dropping the pool
///
/// By default, the pool panics if it is dropped while it still contains objects. See
/// [`DropPolicy`] for the alternative.
#[derive(Debug)]
pub struct DynamicPool<T> {
    /// The blocks that provide the storage of the pool, in creation order.
    ///
    /// This Vec may reallocate as it grows, moving the `Block` values, but the memory of each
    /// block is a separate allocation that never moves, so the objects stay where they are.
    blocks: Vec<Block<T>>,

    /// Cached facts about each block, parallel to `blocks`. Kept in sync with the blocks on
    /// every allocation and release so we do not need to scan block contents to find space.
    block_infos: Vec<BlockInfo<T>>,

    /// Index of the earliest block that may have a vacant slot. Every block before this one is
    /// known to be full. Equal to `block_infos.len()` if no block is known to have space.
    free_block_hint: usize,

    entries_per_block: NonZero<SlotIndex>,

    drop_policy: DropPolicy,
}

/// The frequently accessed facts about one block, packed together for locality.
#[derive(Debug)]
struct BlockInfo<T> {
    /// Number of vacant slots in the block.
    num_free: SlotIndex,

    /// Address of the first slot of the block.
    storage_base: NonNull<T>,

    /// Index of the block in the pool's list of blocks.
    block_index: usize,
}

impl<T> BlockInfo<T> {
    /// Whether `ptr` points into the storage region of the block.
    fn contains(&self, ptr: *const T, entries_per_block: usize) -> bool {
        let start = self.storage_base.as_ptr().addr();

        // Cannot overflow because the storage region exists in memory.
        let end = start.wrapping_add(entries_per_block.wrapping_mul(size_of::<T>()));

        (start..end).contains(&ptr.addr())
    }
}

// SAFETY: The pointer only refers to memory owned by the pool's blocks, which can move between
// threads whenever the objects can.
unsafe impl<T: Send> Send for BlockInfo<T> {}

impl<T> DynamicPool<T> {
    pub(crate) fn new_inner(entries_per_block: usize, drop_policy: DropPolicy) -> Result<Self> {
        let mut pool = Self {
            blocks: Vec::new(),
            block_infos: Vec::new(),
            free_block_hint: 0,
            entries_per_block: slot_capacity(entries_per_block),
            drop_policy,
        };

        // The pool always starts with one block.
        pool.add_block()?;

        Ok(pool)
    }

    /// Creates a pool that allocates blocks of `entries_per_block` slots.
    ///
    /// The first block is allocated immediately.
    ///
    /// # Panics
    ///
    /// Panics if `entries_per_block` is zero or does not fit in a `u32`, if `T` is zero-sized or
    /// if the host allocator cannot provide the memory for the first block.
    #[must_use]
    pub fn new(entries_per_block: usize) -> Self {
        Self::builder().entries_per_block(entries_per_block).build()
    }

    /// Starts building a new [`DynamicPool`].
    ///
    /// Use this when you want to customize the pool configuration or handle allocation failure
    /// when creating the pool.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::{DropPolicy, DynamicPool};
    ///
    /// let pool = DynamicPool::<String>::builder()
    ///     .entries_per_block(64)
    ///     .drop_policy(DropPolicy::MayDropItems)
    ///     .try_build()
    ///     .expect("not enough memory for the first block");
    ///
    /// assert_eq!(pool.capacity(), 64);
    /// ```
    pub fn builder() -> DynamicPoolBuilder<T> {
        DynamicPoolBuilder::new()
    }

    /// The number of slots in each block.
    #[must_use]
    pub fn entries_per_block(&self) -> usize {
        usize::try_from(self.entries_per_block.get()).expect("slot index always fits in usize")
    }

    /// The number of blocks the pool has allocated so far.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.block_infos.len()
    }

    /// The number of objects the pool can hold without allocating another block.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.block_count()
            .checked_mul(self.entries_per_block())
            .expect("overflow here would mean the pool can hold more objects than virtual memory can fit")
    }

    /// Moves `value` into a vacant slot and returns a pointer to it, adding a block if needed.
    ///
    /// The pointer remains valid until it is passed to [`release()`][Self::release].
    ///
    /// Returns `None` if the pool needed another block but the host allocator could not provide
    /// the memory for it, in which case `value` is dropped.
    #[must_use]
    pub fn allocate(&mut self, value: T) -> Option<NonNull<T>> {
        self.try_allocate(value).ok()
    }

    /// Moves `value` into a vacant slot and returns a pointer to it, adding a block if needed.
    ///
    /// This is [`allocate()`][Self::allocate] with the reason for failure spelled out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`] if the pool needed another block but the host
    /// allocator could not provide the memory for it. In this case `value` is dropped.
    pub fn try_allocate(&mut self, value: T) -> Result<NonNull<T>> {
        // SAFETY: The closure initializes the whole object.
        unsafe {
            self.try_allocate_with(|uninit: &mut MaybeUninit<T>| {
                uninit.write(value);
            })
        }
    }

    /// Initializes an object in place in a vacant slot and returns a pointer to it, adding a
    /// block if needed.
    ///
    /// Returns `None` if the pool needed another block but the host allocator could not provide
    /// the memory for it, in which case `f` is not called.
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
        unsafe { self.try_allocate_with(f) }.ok()
    }

    /// # Safety
    ///
    /// The closure must fully initialize the object before returning.
    unsafe fn try_allocate_with(
        &mut self,
        f: impl FnOnce(&mut MaybeUninit<T>),
    ) -> Result<NonNull<T>> {
        let info_index = match self.index_of_block_with_vacant_slot() {
            Some(index) => index,
            None => self.add_block()?,
        };

        let info = self
            .block_infos
            .get_mut(info_index)
            .expect("we just found or created a block at this index");

        let block = self
            .blocks
            .get_mut(info.block_index)
            .expect("block infos always refer to existing blocks");

        // SAFETY: Forwarding the guarantee of the caller.
        let ptr = unsafe { block.allocate_with(f) }.unwrap_or_else(|| {
            panic!(
                "block {} was believed to have {} vacant slots but was full in pool of {}",
                info.block_index,
                info.num_free,
                type_name::<T>()
            )
        });

        info.num_free = info
            .num_free
            .checked_sub(1)
            .expect("a block that accepted an object cannot have had zero vacant slots");

        Ok(ptr)
    }

    /// Finds the earliest block with a vacant slot, starting the search from the hint.
    ///
    /// Returns `None` if all blocks are full, leaving the hint pointing past the last block.
    fn index_of_block_with_vacant_slot(&mut self) -> Option<usize> {
        let start = self.free_block_hint;

        let found = self
            .block_infos
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, info)| info.num_free > 0)
            .map(|(index, _)| index);

        self.free_block_hint = found.unwrap_or(self.block_infos.len());

        found
    }

    /// Appends a new block to the pool and returns the index of its info record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`] if the host allocator cannot provide the memory for
    /// the block or for its bookkeeping data. The pool is unchanged in this case.
    fn add_block(&mut self) -> Result<usize> {
        assert!(
            self.free_block_hint == self.block_infos.len(),
            "adding a block while block {} may still have vacant slots in pool of {}",
            self.free_block_hint,
            type_name::<T>()
        );

        self.blocks
            .try_reserve(1)
            .and_then(|()| self.block_infos.try_reserve(1))
            .map_err(|error| {
                tracing::warn!(
                    item_type = type_name::<T>(),
                    block_count = self.block_infos.len(),
                    %error,
                    "failed to grow block metadata of pool"
                );

                Error::AllocationFailed { layout: None }
            })?;

        let block = Block::create(self.entries_per_block, self.drop_policy)?;

        let info = BlockInfo {
            num_free: block.capacity(),
            storage_base: block.storage_base(),
            block_index: self.blocks.len(),
        };

        let info_index = self.block_infos.len();

        // Cannot reallocate because we reserved the space above.
        self.blocks.push(block);
        self.block_infos.push(info);

        tracing::debug!(
            item_type = type_name::<T>(),
            block_count = self.block_infos.len(),
            entries_per_block = self.entries_per_block.get(),
            "pool grew by one block"
        );

        Ok(info_index)
    }

    /// Drops the object at `ptr` and makes its slot available for reuse.
    ///
    /// Does nothing if `ptr` is null or does not point into any block of this pool. The most
    /// recently released slot of a block is the first to be reused from that block.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` points into a block of this pool but not to a live object.
    ///
    /// # Safety
    ///
    /// The caller must ensure that no references to the object exist and that neither `ptr` nor
    /// any other pointer to the object is used after this call.
    pub unsafe fn release(&mut self, ptr: *const T) {
        if ptr.is_null() {
            return;
        }

        let entries_per_block = self.entries_per_block();

        let Some(info_index) = self
            .block_infos
            .iter()
            .position(|info| info.contains(ptr, entries_per_block))
        else {
            tracing::trace!(
                item_type = type_name::<T>(),
                ?ptr,
                "ignoring release of pointer that does not belong to the pool"
            );

            return;
        };

        let info = self
            .block_infos
            .get_mut(info_index)
            .expect("we just found the block info at this index");

        let block = self
            .blocks
            .get_mut(info.block_index)
            .expect("block infos always refer to existing blocks");

        let object = block
            .unlink(ptr)
            .expect("null pointers were filtered out above");

        info.num_free = info
            .num_free
            .checked_add(1)
            .expect("a block that released an object cannot have been without live objects");

        // The pool is consistent again before the object is dropped, in case drop() panics.
        self.update_free_block_hint(info_index);

        // SAFETY: The slot was live, so it holds an initialized T. The caller guarantees that
        // nobody will use the object again.
        unsafe {
            ptr::drop_in_place(object.as_ptr());
        }
    }

    /// Lowers the hint to the given block if it precedes the block the hint points to.
    fn update_free_block_hint(&mut self, block_with_vacant_slot: usize) {
        if block_with_vacant_slot < self.free_block_hint {
            self.free_block_hint = block_with_vacant_slot;
        }
    }

    /// Calls `visit` with a pointer to every live object in the pool, in slot order within each
    /// block and with blocks in the order they were created.
    ///
    /// Blocks without any live objects are skipped. Every other block is scanned in full.
    pub fn for_each(&self, mut visit: impl FnMut(NonNull<T>)) {
        let entries_per_block = self.entries_per_block.get();

        for info in &self.block_infos {
            if info.num_free == entries_per_block {
                continue;
            }

            self.blocks
                .get(info.block_index)
                .expect("block infos always refer to existing blocks")
                .for_each(&mut visit);
        }
    }

    /// Reports the number of blocks and the number of live objects.
    ///
    /// The live objects are counted by scanning every block that is not known to be empty,
    /// rather than trusting the cached vacancy counts.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let entries_per_block = self.entries_per_block.get();

        let allocation_count = self
            .block_infos
            .iter()
            .filter(|info| info.num_free < entries_per_block)
            .map(|info| {
                self.blocks
                    .get(info.block_index)
                    .expect("block infos always refer to existing blocks")
                    .count_live()
            })
            .sum();

        PoolStats {
            block_count: self.block_infos.len(),
            allocation_count,
        }
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(test)]
    pub(crate) fn integrity_check(&self) {
        assert!(
            self.blocks.len() == self.block_infos.len(),
            "{} blocks but {} block infos in pool of {}",
            self.blocks.len(),
            self.block_infos.len(),
            type_name::<T>()
        );

        assert!(
            self.free_block_hint <= self.block_infos.len(),
            "free block hint {} points beyond {} blocks in pool of {}",
            self.free_block_hint,
            self.block_infos.len(),
            type_name::<T>()
        );

        for (info_index, info) in self.block_infos.iter().enumerate() {
            let block = self
                .blocks
                .get(info.block_index)
                .expect("block infos always refer to existing blocks");

            block.integrity_check();

            assert!(
                info.storage_base == block.storage_base(),
                "cached storage base of block {info_index} is stale in pool of {}",
                type_name::<T>()
            );

            let actual_free = self
                .entries_per_block()
                .checked_sub(block.count_live())
                .expect("a block cannot have more live objects than slots");

            assert!(
                usize::try_from(info.num_free).ok() == Some(actual_free),
                "block {info_index} is cached as having {} vacant slots but has {actual_free} in pool of {}",
                info.num_free,
                type_name::<T>()
            );

            assert!(
                info_index >= self.free_block_hint || info.num_free == 0,
                "block {info_index} has vacant slots but precedes the free block hint {} in pool of {}",
                self.free_block_hint,
                type_name::<T>()
            );
        }
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
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(DynamicPool<u32>: Send);
    assert_not_impl_any!(DynamicPool<u32>: Sync);
    assert_not_impl_any!(DynamicPool<Rc<u32>>: Send);

    fn may_drop_pool<T>(entries_per_block: usize) -> DynamicPool<T> {
        DynamicPool::builder()
            .entries_per_block(entries_per_block)
            .drop_policy(DropPolicy::MayDropItems)
            .build()
    }

    #[test]
    fn starts_with_one_block() {
        let pool = DynamicPool::<u32>::new(4);

        assert_eq!(pool.block_count(), 1);
        assert_eq!(pool.capacity(), 4);
        assert_eq!(
            pool.stats(),
            PoolStats {
                block_count: 1,
                allocation_count: 0
            }
        );
    }

    #[test]
    fn grows_when_full() {
        let mut pool = DynamicPool::<u32>::new(2);

        let ptrs: Vec<_> = (0..3).map(|v| pool.allocate(v).unwrap()).collect();

        assert_eq!(pool.stats().block_count, 2);
        assert_eq!(pool.stats().allocation_count, 3);
        assert_eq!(pool.capacity(), 4);
        pool.integrity_check();

        for ptr in ptrs {
            unsafe { pool.release(ptr.as_ptr()) };
        }

        assert_eq!(pool.stats().allocation_count, 0);
        assert_eq!(pool.stats().block_count, 2);
        pool.integrity_check();
    }

    #[test]
    fn earlier_block_is_refilled_first() {
        let mut pool = DynamicPool::<u32>::new(2);

        let a = pool.allocate(1).unwrap();
        let b = pool.allocate(2).unwrap();
        let c = pool.allocate(3).unwrap();

        // Block 0 is full and the hint has moved on to block 1.
        assert_eq!(pool.free_block_hint, 1);

        unsafe { pool.release(a.as_ptr()) };

        // The hint must have moved back to block 0, which now has space.
        assert_eq!(pool.free_block_hint, 0);

        let d = pool.allocate(4).unwrap();
        assert_eq!(d, a);
        pool.integrity_check();

        unsafe {
            pool.release(b.as_ptr());
            pool.release(c.as_ptr());
            pool.release(d.as_ptr());
        }
    }

    #[test]
    fn hint_skips_full_blocks() {
        let mut pool = DynamicPool::<u32>::new(1);

        let ptrs: Vec<_> = (0..4).map(|v| pool.allocate(v).unwrap()).collect();
        assert_eq!(pool.block_count(), 4);

        // Free a slot in the last block only. The hint is lowered to it, and the next
        // allocation must land there instead of growing the pool.
        unsafe { pool.release(ptrs[3].as_ptr()) };

        let reused = pool.allocate(9).unwrap();
        assert_eq!(reused, ptrs[3]);
        assert_eq!(pool.block_count(), 4);
        pool.integrity_check();

        unsafe {
            pool.release(ptrs[0].as_ptr());
            pool.release(ptrs[1].as_ptr());
            pool.release(ptrs[2].as_ptr());
            pool.release(reused.as_ptr());
        }
    }

    #[test]
    fn release_of_foreign_pointer_is_ignored() {
        let mut pool = DynamicPool::<u32>::new(2);
        let a = pool.allocate(1).unwrap();

        let foreign = 5_u32;
        unsafe { pool.release(&raw const foreign) };

        assert_eq!(pool.stats().allocation_count, 1);
        pool.integrity_check();

        unsafe { pool.release(a.as_ptr()) };
    }

    #[test]
    fn release_null_is_noop() {
        let mut pool = DynamicPool::<u32>::new(2);

        unsafe { pool.release(ptr::null()) };

        assert_eq!(pool.stats().allocation_count, 0);
    }

    #[test]
    #[should_panic]
    fn double_release_panics() {
        let mut pool = may_drop_pool::<u32>(2);
        let a = pool.allocate(1).unwrap();
        let _b = pool.allocate(2).unwrap();

        unsafe {
            pool.release(a.as_ptr());
            pool.release(a.as_ptr());
        }
    }

    #[test]
    fn for_each_skips_empty_blocks_and_keeps_order() {
        let mut pool = DynamicPool::<u32>::new(2);

        let ptrs: Vec<_> = (0..6).map(|v| pool.allocate(v).unwrap()).collect();

        // Empty out the middle block entirely.
        unsafe {
            pool.release(ptrs[2].as_ptr());
            pool.release(ptrs[3].as_ptr());
        }

        let mut seen = Vec::new();
        pool.for_each(|ptr| seen.push(unsafe { ptr.read() }));

        assert_eq!(seen, vec![0, 1, 4, 5]);
        assert_eq!(pool.stats().allocation_count, seen.len());
        pool.integrity_check();

        for index in [0, 1, 4, 5] {
            unsafe { pool.release(ptrs[index].as_ptr()) };
        }
    }

    #[test]
    fn addresses_are_stable_across_growth() {
        let mut pool = may_drop_pool::<u64>(4);

        let first = pool.allocate(42).unwrap();

        // Force the block list to reallocate several times.
        for value in 0..1000 {
            _ = pool.allocate(value).unwrap();
        }

        assert!(pool.block_count() > 200);
        assert_eq!(unsafe { first.read() }, 42);
    }

    #[test]
    fn try_allocate_succeeds_while_memory_is_available() {
        let mut pool = may_drop_pool::<u32>(1);

        for value in 0..10 {
            assert!(pool.try_allocate(value).is_ok());
        }

        assert_eq!(pool.block_count(), 10);
    }

    #[test]
    fn allocate_with_initializes_in_place() {
        let mut pool = DynamicPool::<[u32; 8]>::new(1);

        let a = unsafe { pool.allocate_with(|uninit| _ = uninit.write([1; 8])) }.unwrap();
        let b = unsafe { pool.allocate_with(|uninit| _ = uninit.write([2; 8])) }.unwrap();

        unsafe {
            assert_eq!(a.as_ref()[7], 1);
            assert_eq!(b.as_ref()[7], 2);

            pool.release(a.as_ptr());
            pool.release(b.as_ptr());
        }
    }

    #[test]
    fn drop_with_may_drop_policy_drops_objects() {
        struct Droppable(Rc<Cell<usize>>);

        impl Drop for Droppable {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let drops = Rc::new(Cell::new(0));

        {
            let mut pool = may_drop_pool::<Droppable>(2);

            for _ in 0..5 {
                _ = pool.allocate(Droppable(Rc::clone(&drops))).unwrap();
            }
        }

        assert_eq!(drops.get(), 5);
    }

    #[test]
    #[should_panic]
    fn drop_with_live_objects_panics() {
        let mut pool = DynamicPool::<u32>::new(2);
        _ = pool.allocate(1);
    }

    #[test]
    fn panicking_drop_on_release_keeps_slot_reusable() {
        struct PanicOnDrop(bool);

        impl Drop for PanicOnDrop {
            fn drop(&mut self) {
                assert!(!self.0, "drop of poisoned object");
            }
        }

        let mut pool = may_drop_pool::<PanicOnDrop>(1);

        let poisoned = pool.allocate(PanicOnDrop(true)).unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| unsafe {
            pool.release(poisoned.as_ptr());
        }));
        assert!(result.is_err());

        // The slot went back to the pool before the object's drop() panicked.
        pool.integrity_check();
        assert_eq!(pool.stats().allocation_count, 0);

        let reused = pool.allocate(PanicOnDrop(false)).unwrap();
        assert_eq!(reused, poisoned);
        assert_eq!(pool.block_count(), 1);
        pool.integrity_check();

        unsafe { pool.release(reused.as_ptr()) };
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn oversized_block_is_allocation_failure() {
        let result = DynamicPool::<[u8; 1 << 40]>::builder()
            .entries_per_block(1 << 24)
            .try_build();

        assert!(matches!(result, Err(Error::AllocationFailed { .. })));
    }

    #[test]
    #[should_panic]
    fn zero_entries_per_block_panics() {
        drop(DynamicPool::<u32>::new(0));
    }
}
