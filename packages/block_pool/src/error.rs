use std::alloc::Layout;

use thiserror::Error;

/// Errors that can occur when allocating memory from a pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The host allocator could not provide the memory for a new block or for the pool's
    /// bookkeeping data.
    #[error("{}", describe_allocation_failure(.layout.as_ref()))]
    AllocationFailed {
        /// The layout of the allocation that failed, if the request could be expressed as a
        /// layout at all. This is `None` if the requested block would have been larger than
        /// the address space or if the failure happened when growing the block metadata.
        layout: Option<Layout>,
    },

    /// A fixed-capacity pool has no vacant slots left.
    #[error("pool is exhausted: all {capacity} slots are occupied")]
    Exhausted {
        /// The total number of slots in the pool.
        capacity: usize,
    },
}

fn describe_allocation_failure(layout: Option<&Layout>) -> String {
    match layout {
        Some(layout) => format!(
            "host allocator failed to provide {} bytes aligned to {}",
            layout.size(),
            layout.align()
        ),
        None => "host allocator could not satisfy the allocation request".to_string(),
    }
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn allocation_failed_mentions_layout() {
        let error = Error::AllocationFailed {
            layout: Some(Layout::from_size_align(4096, 64).unwrap()),
        };

        let message = error.to_string();
        assert!(message.contains("4096"));
        assert!(message.contains("64"));
    }

    #[test]
    fn allocation_failed_without_layout() {
        let error = Error::AllocationFailed { layout: None };

        assert!(error.to_string().contains("could not satisfy"));
    }

    #[test]
    fn exhausted_mentions_capacity() {
        let error = Error::Exhausted { capacity: 42 };

        let result: Result<()> = Err(error);
        assert!(matches!(result, Err(Error::Exhausted { capacity: 42 })));
        assert!(result.unwrap_err().to_string().contains("42"));
    }
}
