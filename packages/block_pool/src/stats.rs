/// A point-in-time summary of the state of a pool.
///
/// Returned by [`FixedPool::stats()`][crate::FixedPool::stats] and
/// [`DynamicPool::stats()`][crate::DynamicPool::stats].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct PoolStats {
    /// Number of blocks currently owned by the pool.
    pub block_count: usize,

    /// Number of live objects in the pool, counted by scanning the blocks.
    pub allocation_count: usize,
}
