/// Determines what happens when a pool is dropped while it still contains live objects.
///
/// By default, dropping a pool that still contains objects is treated as a contract violation
/// and causes a panic.
///
/// # Examples
///
/// ```
/// use block_pool::{DropPolicy, FixedPool};
///
/// // The drop policy is set at pool creation time.
/// let pool = FixedPool::<u32>::builder()
///     .capacity(16)
///     .drop_policy(DropPolicy::MayDropItems)
///     .build();
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// The pool will panic if it still contains objects when it is dropped. This is the default.
    ///
    /// Every object handed out by a pool is expected to be released by its owner before the pool
    /// goes away, as other code may still be holding pointers to the objects. The remaining
    /// objects are still dropped and the memory released before the panic is raised.
    #[default]
    MustNotDropItems,

    /// The pool will drop any remaining objects when the pool is dropped.
    MayDropItems,
}
