use std::alloc::Layout;
use std::any::type_name;
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::num::NonZero;
use std::ptr::{self, NonNull};
use std::{slice, thread};

use num_integer::Integer;

use crate::block_layout::{BlockLayout, SlotIndex};
use crate::{DropPolicy, Error, Result, aligned};

/// A fixed-capacity arena for objects of type `T`, backed by a single aligned allocation.
///
/// The allocation holds an index array followed by the slot storage (see [`BlockLayout`]). The
/// index array doubles as an intrusive free list and as the record of which slots are occupied:
///
/// * `indices[i] == i` means slot `i` holds a live object.
/// * Otherwise `indices[i]` is the index of the next free slot, or `capacity` (the sentinel) if
///   slot `i` is the last free slot.
///
/// `free_head` is the first free slot, or the sentinel if the block is full. Allocating pops the
/// head of the free list and releasing pushes the slot back onto it, so the most recently
/// released slot is always the next one to be reused.
///
/// # Out of band access
///
/// The block never creates references to the objects it stores, so it is valid for the owner of
/// an object to access it through the pointer returned at allocation time, even while the block
/// itself is being used to allocate or release other objects.
pub(crate) struct Block<T> {
    /// Start of the allocation, which is also the start of the index array.
    allocation: NonNull<u8>,

    /// The layout passed to the host allocator, needed again when releasing the allocation.
    allocation_layout: Layout,

    layout: BlockLayout<T>,

    /// Head of the free list. Equal to the capacity (the sentinel) when the block is full.
    free_head: SlotIndex,

    drop_policy: DropPolicy,

    _item: PhantomData<T>,
}

impl<T> Block<T> {
    /// Creates a new block with room for `capacity` objects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`] if the host allocator cannot provide the memory for
    /// the block or if a block of this size cannot exist at all.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    pub(crate) fn create(capacity: NonZero<SlotIndex>, drop_policy: DropPolicy) -> Result<Self> {
        let Some(layout) = BlockLayout::<T>::new(capacity) else {
            tracing::warn!(
                item_type = type_name::<T>(),
                capacity = capacity.get(),
                "block size exceeds the address space"
            );

            return Err(Error::AllocationFailed { layout: None });
        };

        let (allocation, allocation_layout) = aligned::allocate(layout.size(), layout.align())
            .inspect_err(|error| {
                tracing::warn!(
                    item_type = type_name::<T>(),
                    capacity = capacity.get(),
                    bytes = layout.size(),
                    align = layout.align(),
                    %error,
                    "host allocator failed to provide memory for block"
                );
            })?;

        let indices = allocation.cast::<SlotIndex>();

        // Thread every slot onto the free list in ascending order. The last slot points at
        // the sentinel, which is equal to the capacity.
        for index in 0..capacity.get() {
            let offset = usize::try_from(index).expect("slot index always fits in usize");

            // SAFETY: The allocation starts with an index array of `capacity` entries and the
            // allocation is aligned to at least MIN_BLOCK_ALIGN, which is enough for SlotIndex.
            // We stay in bounds because index < capacity.
            unsafe {
                indices.add(offset).write(index.wrapping_add(1));
            }
        }

        tracing::debug!(
            item_type = type_name::<T>(),
            capacity = capacity.get(),
            bytes = layout.size(),
            align = layout.align(),
            "created block"
        );

        Ok(Self {
            allocation,
            allocation_layout,
            layout,
            free_head: 0,
            drop_policy,
            _item: PhantomData,
        })
    }

    /// The number of slots in the block. This is also the value of the free list sentinel.
    #[must_use]
    pub(crate) fn capacity(&self) -> SlotIndex {
        self.layout.capacity().get()
    }

    #[must_use]
    fn capacity_usize(&self) -> usize {
        usize::try_from(self.capacity()).expect("slot index always fits in usize")
    }

    /// Address of slot 0. All slots follow contiguously.
    #[must_use]
    pub(crate) fn storage_base(&self) -> NonNull<T> {
        // SAFETY: The storage offset is within the allocation, as calculated by BlockLayout.
        unsafe { self.allocation.byte_add(self.layout.storage_offset()).cast::<T>() }
    }

    #[must_use]
    pub(crate) fn is_full(&self) -> bool {
        self.free_head == self.capacity()
    }

    fn indices(&self) -> &[SlotIndex] {
        // SAFETY: The index array lives at the start of the allocation, has `capacity` entries
        // and every entry was initialized in create(). We never hand out pointers into it.
        unsafe {
            slice::from_raw_parts(
                self.allocation.cast::<SlotIndex>().as_ptr(),
                self.capacity_usize(),
            )
        }
    }

    #[expect(
        clippy::needless_pass_by_ref_mut,
        reason = "the receiver expresses exclusive access to the index array behind the raw pointer"
    )]
    fn indices_mut(&mut self) -> &mut [SlotIndex] {
        // SAFETY: See indices(). We hold an exclusive reference to the block, so nobody else
        // can be looking at the index array.
        unsafe {
            slice::from_raw_parts_mut(
                self.allocation.cast::<SlotIndex>().as_ptr(),
                self.capacity_usize(),
            )
        }
    }

    fn slot_ptr(&self, index: SlotIndex) -> NonNull<T> {
        assert!(
            index < self.capacity(),
            "slot {index} index out of bounds in block of {}",
            type_name::<T>()
        );

        let offset = usize::try_from(index).expect("slot index always fits in usize");

        // SAFETY: Guarded by the bounds check above.
        unsafe { self.storage_base().add(offset) }
    }

    fn is_live(&self, index: SlotIndex) -> bool {
        let slot = usize::try_from(index).expect("slot index always fits in usize");

        self.indices().get(slot).is_some_and(|&next| next == index)
    }

    /// Determines which slot the pointer refers to.
    ///
    /// Returns `None` if the pointer is outside the storage region of this block or does not
    /// point to the start of a slot.
    #[must_use]
    pub(crate) fn slot_index_of(&self, ptr: *const T) -> Option<SlotIndex> {
        let base = self.storage_base().as_ptr().addr();
        let offset = ptr.addr().checked_sub(base)?;

        let (index, remainder) = Integer::div_rem(&offset, &size_of::<T>());

        if remainder != 0 || index >= self.capacity_usize() {
            return None;
        }

        SlotIndex::try_from(index).ok()
    }

    /// Allocates a slot and moves `value` into it.
    ///
    /// Returns `None` if the block is full.
    #[must_use]
    pub(crate) fn allocate(&mut self, value: T) -> Option<NonNull<T>> {
        // SAFETY: The closure initializes the whole object.
        unsafe {
            self.allocate_with(|uninit: &mut MaybeUninit<T>| {
                uninit.write(value);
            })
        }
    }

    /// Allocates a slot and lets the closure initialize the object in place.
    ///
    /// Returns `None` if the block is full, in which case the closure is not called.
    ///
    /// # Safety
    ///
    /// The closure must fully initialize the object before returning.
    #[must_use]
    pub(crate) unsafe fn allocate_with(
        &mut self,
        f: impl FnOnce(&mut MaybeUninit<T>),
    ) -> Option<NonNull<T>> {
        if self.is_full() {
            return None;
        }

        let index = self.free_head;
        let slot_ptr = self.slot_ptr(index);

        // If the closure panics, no block state has been modified yet, so we back out cleanly.
        {
            // SAFETY: The slot is vacant, so nobody else may hold a reference to it, and the
            // pointer is valid and aligned for T as guaranteed by BlockLayout.
            let uninit = unsafe { slot_ptr.cast::<MaybeUninit<T>>().as_mut() };

            f(uninit);
        }

        let slot = usize::try_from(index).expect("slot index always fits in usize");
        let entry = self
            .indices_mut()
            .get_mut(slot)
            .expect("free list head is always in bounds when the block is not full");

        let next_free = *entry;

        assert!(
            next_free != index,
            "free list head {index} refers to a live slot in block of {}",
            type_name::<T>()
        );

        // A self-reference marks the slot as live.
        *entry = index;
        self.free_head = next_free;

        Some(slot_ptr)
    }

    /// Drops the object at `ptr` and returns its slot to the free list. Does nothing if `ptr`
    /// is null.
    ///
    /// # Panics
    ///
    /// Panics if the pointer does not refer to a live object in this block.
    ///
    /// # Safety
    ///
    /// The caller must ensure that no references to the object exist and that the pointer is
    /// not used again after this call.
    pub(crate) unsafe fn release(&mut self, ptr: *const T) {
        let Some(object) = self.unlink(ptr) else {
            return;
        };

        // SAFETY: The slot was live, so it holds an initialized T. The caller guarantees that
        // nobody will use the object again.
        unsafe {
            ptr::drop_in_place(object.as_ptr());
        }
    }

    /// Returns the slot of the object at `ptr` to the free list without dropping the object.
    ///
    /// Returns a pointer to the object, which the caller must drop, or `None` if `ptr` is null.
    /// The block is fully consistent before the object is dropped, so a panicking `drop()`
    /// cannot corrupt it.
    ///
    /// # Panics
    ///
    /// Panics if the pointer does not refer to a live object in this block.
    #[must_use]
    pub(crate) fn unlink(&mut self, ptr: *const T) -> Option<NonNull<T>> {
        if ptr.is_null() {
            return None;
        }

        let Some(index) = self.slot_index_of(ptr) else {
            panic!(
                "released pointer {ptr:p} does not refer to a slot in block of {}",
                type_name::<T>()
            );
        };

        assert!(
            self.is_live(index),
            "released pointer {ptr:p} refers to vacant slot {index} in block of {}",
            type_name::<T>()
        );

        let free_head = self.free_head;
        let slot = usize::try_from(index).expect("slot index always fits in usize");

        *self
            .indices_mut()
            .get_mut(slot)
            .expect("slot_index_of() only returns in-bounds indices") = free_head;
        self.free_head = index;

        Some(self.slot_ptr(index))
    }

    /// Calls `visit` with a pointer to every live object, in slot order.
    pub(crate) fn for_each(&self, mut visit: impl FnMut(NonNull<T>)) {
        for (index, &next) in (0..self.capacity()).zip(self.indices()) {
            if next == index {
                visit(self.slot_ptr(index));
            }
        }
    }

    /// Counts the live objects by scanning the whole index array.
    #[must_use]
    pub(crate) fn count_live(&self) -> usize {
        let mut count: usize = 0;

        // Cannot overflow because we cannot have more live objects than slots.
        self.for_each(|_| count = count.wrapping_add(1));

        count
    }

    /// Drops every live object, unlinking each slot before its object is dropped.
    ///
    /// If an object's `drop()` panics, the remaining objects are still dropped while unwinding.
    fn drop_live_objects(&mut self) {
        struct ContinueOnUnwind<'a, T>(&'a mut Block<T>);

        impl<T> Drop for ContinueOnUnwind<'_, T> {
            fn drop(&mut self) {
                self.0.drop_live_objects();
            }
        }

        for index in 0..self.capacity() {
            if !self.is_live(index) {
                continue;
            }

            let object = self
                .unlink(self.slot_ptr(index).as_ptr())
                .expect("slot pointers are never null");

            let guard = ContinueOnUnwind(self);

            // SAFETY: The slot was live, so it holds an initialized T. The block is going away,
            // so nothing is allowed to use the object any more.
            unsafe {
                ptr::drop_in_place(object.as_ptr());
            }

            mem::forget(guard);
        }
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(test)]
    pub(crate) fn integrity_check(&self) {
        let capacity = self.capacity();
        let mut on_free_list = vec![false; self.capacity_usize()];
        let mut free_list_length: usize = 0;

        let mut cursor = self.free_head;

        while cursor != capacity {
            assert!(
                cursor < capacity,
                "free list link {cursor} is out of bounds in block of {}",
                type_name::<T>()
            );

            assert!(
                !self.is_live(cursor),
                "free list passes through live slot {cursor} in block of {}",
                type_name::<T>()
            );

            let slot = usize::try_from(cursor).expect("slot index always fits in usize");
            let seen = on_free_list.get_mut(slot).expect("guarded by bounds check above");

            assert!(
                !*seen,
                "free list visits slot {cursor} twice in block of {}",
                type_name::<T>()
            );

            *seen = true;
            free_list_length = free_list_length.wrapping_add(1);

            cursor = *self.indices().get(slot).expect("guarded by bounds check above");
        }

        let live = self.count_live();

        assert!(
            live.wrapping_add(free_list_length) == self.capacity_usize(),
            "{live} live slots and {free_list_length} free slots do not add up to capacity {capacity} in block of {}",
            type_name::<T>()
        );
    }
}

impl<T> Drop for Block<T> {
    fn drop(&mut self) {
        let live = self.count_live();

        {
            // Declared first so it is dropped last, including when an object's drop() panics.
            let _allocation = AllocationGuard {
                allocation: self.allocation,
                layout: self.allocation_layout,
            };

            self.drop_live_objects();
        }

        // We do this check at the end so we clean up the memory first.
        //
        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if self.drop_policy == DropPolicy::MustNotDropItems && !thread::panicking() {
            assert!(
                live == 0,
                "dropped a block of {} with {live} live objects - this is forbidden by DropPolicy::MustNotDropItems",
                type_name::<T>()
            );
        }
    }
}

impl<T> std::fmt::Debug for Block<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("storage_base", &self.storage_base())
            .field("layout", &self.layout)
            .field("free_head", &self.free_head)
            .field("drop_policy", &self.drop_policy)
            .finish_non_exhaustive()
    }
}

/// Returns a block allocation to the host allocator when dropped.
struct AllocationGuard {
    allocation: NonNull<u8>,
    layout: Layout,
}

impl Drop for AllocationGuard {
    fn drop(&mut self) {
        // SAFETY: The guard is only created from the pair that Block::create() obtained from
        // aligned::allocate(), once, right before the block goes away.
        unsafe {
            aligned::release(self.allocation, self.layout);
        }
    }
}

// SAFETY: The raw pointers only refer to memory owned by the block, which does not depend on
// any thread-local state, so the block can move between threads whenever the objects can.
unsafe impl<T: Send> Send for Block<T> {}

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

    use super::*;

    fn nz(value: SlotIndex) -> NonZero<SlotIndex> {
        NonZero::new(value).unwrap()
    }

    fn block_of<T>(capacity: SlotIndex) -> Block<T> {
        Block::create(nz(capacity), DropPolicy::MayDropItems).unwrap()
    }

    struct Droppable {
        drops: Rc<Cell<usize>>,
    }

    impl Drop for Droppable {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn smoke_test() {
        let mut block = block_of::<u32>(3);

        let a = block.allocate(42).unwrap();
        let b = block.allocate(43).unwrap();
        let c = block.allocate(44).unwrap();

        unsafe {
            assert_eq!(a.read(), 42);
            assert_eq!(b.read(), 43);
            assert_eq!(c.read(), 44);
        }

        assert_eq!(block.count_live(), 3);
        assert!(block.is_full());

        unsafe { block.release(b.as_ptr()) };

        assert_eq!(block.count_live(), 2);
        assert!(!block.is_full());

        let d = block.allocate(45).unwrap();

        unsafe {
            assert_eq!(a.read(), 42);
            assert_eq!(c.read(), 44);
            assert_eq!(d.read(), 45);
        }

        block.integrity_check();
    }

    #[test]
    fn fresh_block_hands_out_slots_in_ascending_order() {
        let mut block = block_of::<u64>(4);
        let base = block.storage_base();

        for expected in 0..4_usize {
            let ptr = block.allocate(0).unwrap();
            assert_eq!(ptr, unsafe { base.add(expected) });
        }
    }

    #[test]
    fn full_block_returns_none() {
        let mut block = block_of::<u32>(2);

        assert!(block.allocate(1).is_some());
        assert!(block.allocate(2).is_some());
        assert!(block.allocate(3).is_none());
        assert_eq!(block.count_live(), 2);
    }

    #[test]
    fn full_block_does_not_call_initializer() {
        let mut block = block_of::<u32>(1);
        _ = block.allocate(1).unwrap();

        let called = Cell::new(false);
        let result = unsafe {
            block.allocate_with(|uninit| {
                called.set(true);
                uninit.write(2);
            })
        };

        assert!(result.is_none());
        assert!(!called.get());
    }

    #[test]
    fn released_slot_is_reused_first() {
        let mut block = block_of::<u32>(4);

        let _a = block.allocate(1).unwrap();
        let b = block.allocate(2).unwrap();
        let c = block.allocate(3).unwrap();

        unsafe {
            block.release(c.as_ptr());
            block.release(b.as_ptr());
        }

        // LIFO: b was released last, so it comes back first.
        assert_eq!(block.allocate(4).unwrap(), b);
        assert_eq!(block.allocate(5).unwrap(), c);

        block.integrity_check();
    }

    #[test]
    fn release_null_is_noop() {
        let mut block = block_of::<u32>(2);
        let a = block.allocate(1).unwrap();

        unsafe { block.release(ptr::null()) };

        assert_eq!(block.count_live(), 1);
        unsafe { block.release(a.as_ptr()) };
    }

    #[test]
    fn release_drops_object() {
        let drops = Rc::new(Cell::new(0));
        let mut block = block_of::<Droppable>(2);

        let a = block
            .allocate(Droppable {
                drops: Rc::clone(&drops),
            })
            .unwrap();

        assert_eq!(drops.get(), 0);
        unsafe { block.release(a.as_ptr()) };
        assert_eq!(drops.get(), 1);
    }

    #[test]
    #[should_panic]
    fn double_release_panics() {
        let mut block = block_of::<u32>(2);
        let a = block.allocate(1).unwrap();

        unsafe {
            block.release(a.as_ptr());
            block.release(a.as_ptr());
        }
    }

    #[test]
    #[should_panic]
    fn release_foreign_pointer_panics() {
        let mut block = block_of::<u32>(2);
        let foreign = 5_u32;

        unsafe { block.release(&raw const foreign) };
    }

    #[test]
    #[should_panic]
    fn release_misaligned_pointer_panics() {
        let mut block = block_of::<u32>(2);
        let a = block.allocate(1).unwrap();

        unsafe { block.release(a.as_ptr().cast::<u8>().add(1).cast::<u32>()) };
    }

    #[test]
    fn slot_index_of_maps_slots() {
        let mut block = block_of::<u64>(3);
        let a = block.allocate(1).unwrap();
        let b = block.allocate(2).unwrap();

        assert_eq!(block.slot_index_of(a.as_ptr()), Some(0));
        assert_eq!(block.slot_index_of(b.as_ptr()), Some(1));

        let past_end = unsafe { block.storage_base().add(3) };
        assert_eq!(block.slot_index_of(past_end.as_ptr()), None);
        assert_eq!(block.slot_index_of(ptr::null()), None);
    }

    #[test]
    fn for_each_visits_live_objects_in_slot_order() {
        let mut block = block_of::<u32>(5);

        let ptrs: Vec<_> = (0..5).map(|v| block.allocate(v).unwrap()).collect();

        unsafe {
            block.release(ptrs[1].as_ptr());
            block.release(ptrs[3].as_ptr());
        }

        let mut seen = Vec::new();
        block.for_each(|ptr| seen.push(unsafe { ptr.read() }));

        assert_eq!(seen, vec![0, 2, 4]);
        assert_eq!(block.count_live(), 3);
    }

    #[test]
    fn panicking_initializer_leaves_block_untouched() {
        let mut block = block_of::<u32>(2);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| unsafe {
            _ = block.allocate_with(|_| panic!("initializer failed"));
        }));

        assert!(result.is_err());
        assert_eq!(block.count_live(), 0);
        block.integrity_check();
    }

    #[test]
    fn over_aligned_objects_are_aligned() {
        #[repr(align(128))]
        struct Aligned(#[allow(dead_code, reason = "only the layout matters")] u8);

        let mut block = block_of::<Aligned>(4);

        for _ in 0..4 {
            let ptr = block.allocate(Aligned(1)).unwrap();
            assert_eq!(ptr.as_ptr().addr() % 128, 0);
        }
    }

    #[test]
    fn index_array_is_aligned_for_indices() {
        let block = block_of::<u8>(7);

        assert_eq!(block.allocation.as_ptr().addr() % align_of::<SlotIndex>(), 0);
        assert_eq!(
            block.storage_base().as_ptr().addr() - block.allocation.as_ptr().addr(),
            28
        );
    }

    #[test]
    fn drop_with_may_drop_policy_drops_objects() {
        let drops = Rc::new(Cell::new(0));

        {
            let mut block = block_of::<Droppable>(3);

            for _ in 0..2 {
                _ = block
                    .allocate(Droppable {
                        drops: Rc::clone(&drops),
                    })
                    .unwrap();
            }
        }

        assert_eq!(drops.get(), 2);
    }

    /// Counts its drops and panics while being dropped if poisoned.
    struct Poisonable {
        drops: Rc<Cell<usize>>,
        poisoned: bool,
    }

    impl Drop for Poisonable {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
            assert!(!self.poisoned, "drop of poisoned object");
        }
    }

    #[test]
    fn panicking_drop_during_block_drop_still_drops_the_rest() {
        let drops = Rc::new(Cell::new(0));

        let mut block = block_of::<Poisonable>(4);

        for index in 0..4 {
            _ = block
                .allocate(Poisonable {
                    drops: Rc::clone(&drops),
                    poisoned: index == 1,
                })
                .unwrap();
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| drop(block)));
        assert!(result.is_err());

        // The poisoned object counts its drop before panicking.
        assert_eq!(drops.get(), 4);
    }

    #[test]
    fn panicking_drop_on_release_leaves_block_consistent() {
        let drops = Rc::new(Cell::new(0));

        let mut block = block_of::<Poisonable>(2);

        let poisoned = block
            .allocate(Poisonable {
                drops: Rc::clone(&drops),
                poisoned: true,
            })
            .unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| unsafe {
            block.release(poisoned.as_ptr());
        }));
        assert!(result.is_err());

        block.integrity_check();
        assert_eq!(block.count_live(), 0);
        assert_eq!(drops.get(), 1);

        // The released slot is the first to be reused.
        let reused = block
            .allocate(Poisonable {
                drops: Rc::clone(&drops),
                poisoned: false,
            })
            .unwrap();
        assert_eq!(reused, poisoned);
    }

    #[test]
    fn unlink_returns_slot_without_dropping() {
        let drops = Rc::new(Cell::new(0));

        let mut block = block_of::<Droppable>(2);
        let a = block
            .allocate(Droppable {
                drops: Rc::clone(&drops),
            })
            .unwrap();

        assert!(block.unlink(ptr::null()).is_none());

        let object = block.unlink(a.as_ptr()).unwrap();
        assert_eq!(object, a);
        assert_eq!(block.count_live(), 0);
        assert_eq!(drops.get(), 0);
        block.integrity_check();

        unsafe { ptr::drop_in_place(object.as_ptr()) };
        assert_eq!(drops.get(), 1);
    }

    #[test]
    #[should_panic]
    fn drop_live_with_must_not_drop_policy_panics() {
        let mut block = Block::<u32>::create(nz(3), DropPolicy::MustNotDropItems).unwrap();
        _ = block.allocate(123);
    }

    #[test]
    fn drop_empty_with_must_not_drop_policy_ok() {
        let mut block = Block::<u32>::create(nz(3), DropPolicy::MustNotDropItems).unwrap();
        let a = block.allocate(123).unwrap();
        unsafe { block.release(a.as_ptr()) };

        drop(block);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn oversized_block_is_allocation_failure() {
        let result = Block::<[u8; 1 << 40]>::create(nz(1 << 24), DropPolicy::MayDropItems);

        assert!(matches!(result, Err(Error::AllocationFailed { layout: None })));
    }

    #[test]
    #[should_panic]
    fn zst_is_panic() {
        drop(Block::<()>::create(nz(3), DropPolicy::MayDropItems));
    }
}
