use std::any::type_name;
use std::marker::PhantomData;

use crate::{DropPolicy, DynamicPool, FixedPool, Result};

/// Number of slots used by a builder unless configured otherwise.
const DEFAULT_CAPACITY: usize = 128;

/// Builder for creating an instance of [`FixedPool`].
///
/// You only need to use this builder if you want to customize the drop policy or handle failure
/// to allocate the memory of the pool. Otherwise [`FixedPool::new()`][1] is enough.
///
/// # Examples
///
/// ```
/// use block_pool::{DropPolicy, FixedPool};
///
/// let pool = FixedPool::<u32>::builder()
///     .capacity(1000)
///     .drop_policy(DropPolicy::MayDropItems)
///     .build();
///
/// assert_eq!(pool.capacity(), 1000);
/// ```
///
/// [1]: FixedPool::new
#[must_use]
pub struct FixedPoolBuilder<T> {
    capacity: usize,
    drop_policy: DropPolicy,

    _item: PhantomData<T>,
}

impl<T> std::fmt::Debug for FixedPoolBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedPoolBuilder")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("capacity", &self.capacity)
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}

impl<T> FixedPoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            drop_policy: DropPolicy::default(),
            _item: PhantomData,
        }
    }

    /// Sets the number of objects the pool can hold. Defaults to 128.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs how
    /// to treat remaining objects in the pool when the pool is dropped.
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the pool with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if the capacity is zero or does not fit in a `u32`, if `T` is zero-sized or if the
    /// host allocator cannot provide the memory for the pool.
    #[must_use]
    pub fn build(self) -> FixedPool<T> {
        self.try_build()
            .unwrap_or_else(|error| panic!("cannot create pool of {}: {error}", type_name::<T>()))
    }

    /// Builds the pool with the specified configuration, reporting failure to allocate its memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`][crate::Error::AllocationFailed] if the host allocator
    /// cannot provide the memory for the pool.
    ///
    /// # Panics
    ///
    /// Panics if the capacity is zero or does not fit in a `u32` or if `T` is zero-sized.
    pub fn try_build(self) -> Result<FixedPool<T>> {
        FixedPool::new_inner(self.capacity, self.drop_policy)
    }
}

/// Builder for creating an instance of [`DynamicPool`].
///
/// # Examples
///
/// ```
/// use block_pool::DynamicPool;
///
/// let pool = DynamicPool::<u32>::builder().entries_per_block(16).build();
///
/// assert_eq!(pool.entries_per_block(), 16);
/// assert_eq!(pool.block_count(), 1);
/// ```
#[must_use]
pub struct DynamicPoolBuilder<T> {
    entries_per_block: usize,
    drop_policy: DropPolicy,

    _item: PhantomData<T>,
}

impl<T> std::fmt::Debug for DynamicPoolBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicPoolBuilder")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("entries_per_block", &self.entries_per_block)
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}

impl<T> DynamicPoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries_per_block: DEFAULT_CAPACITY,
            drop_policy: DropPolicy::default(),
            _item: PhantomData,
        }
    }

    /// Sets the number of slots in each block of the pool. Defaults to 128.
    ///
    /// Larger blocks mean fewer allocations from the host allocator and faster release at the
    /// cost of more memory held while the pool is lightly used.
    pub fn entries_per_block(mut self, entries_per_block: usize) -> Self {
        self.entries_per_block = entries_per_block;
        self
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs how
    /// to treat remaining objects in the pool when the pool is dropped.
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the pool with the specified configuration, allocating its first block.
    ///
    /// # Panics
    ///
    /// Panics if the block size is zero or does not fit in a `u32`, if `T` is zero-sized or if
    /// the host allocator cannot provide the memory for the first block.
    #[must_use]
    pub fn build(self) -> DynamicPool<T> {
        self.try_build()
            .unwrap_or_else(|error| panic!("cannot create pool of {}: {error}", type_name::<T>()))
    }

    /// Builds the pool with the specified configuration, reporting failure to allocate its
    /// first block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`][crate::Error::AllocationFailed] if the host allocator
    /// cannot provide the memory for the first block.
    ///
    /// # Panics
    ///
    /// Panics if the block size is zero or does not fit in a `u32` or if `T` is zero-sized.
    pub fn try_build(self) -> Result<DynamicPool<T>> {
        DynamicPool::new_inner(self.entries_per_block, self.drop_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let fixed = FixedPoolBuilder::<u32>::new();
        assert_eq!(fixed.capacity, DEFAULT_CAPACITY);
        assert_eq!(fixed.drop_policy, DropPolicy::MustNotDropItems);

        let dynamic = DynamicPoolBuilder::<u32>::new();
        assert_eq!(dynamic.entries_per_block, DEFAULT_CAPACITY);
        assert_eq!(dynamic.drop_policy, DropPolicy::MustNotDropItems);
    }

    #[test]
    fn debug_names_item_type() {
        let builder = FixedPool::<u16>::builder().capacity(7);
        let text = format!("{builder:?}");

        assert!(text.contains("u16"));
        assert!(text.contains('7'));

        let builder = DynamicPool::<i64>::builder().entries_per_block(9);
        let text = format!("{builder:?}");

        assert!(text.contains("i64"));
        assert!(text.contains('9'));
    }

    #[test]
    fn build_applies_configuration() {
        let fixed = FixedPool::<u32>::builder().capacity(3).build();
        assert_eq!(fixed.capacity(), 3);

        let dynamic = DynamicPool::<u32>::builder().entries_per_block(5).build();
        assert_eq!(dynamic.capacity(), 5);
    }

    #[test]
    #[should_panic]
    fn build_with_zero_capacity_panics() {
        drop(FixedPool::<u32>::builder().capacity(0).build());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic]
    fn build_with_oversized_block_panics() {
        drop(
            DynamicPool::<[u8; 1 << 40]>::builder()
                .entries_per_block(1 << 24)
                .build(),
        );
    }
}
