use std::alloc::{Layout, alloc, dealloc};
use std::ptr::NonNull;

use num_integer::Integer;

use crate::{Error, Result};

/// Every block allocation is aligned to at least a cache line, even if the item type itself
/// has a weaker alignment requirement. This keeps the hot block header data of neighboring
/// blocks from sharing cache lines.
pub(crate) const MIN_BLOCK_ALIGN: usize = 64;

/// Allocates `size` bytes aligned to `align` from the host allocator.
///
/// The returned layout is the one that must later be passed to [`release()`].
///
/// # Errors
///
/// Returns [`Error::AllocationFailed`] if the host allocator cannot satisfy the request, naming
/// the layout that was requested. If the request cannot even be expressed as a valid [`Layout`]
/// (e.g. because the size overflows `isize`), the error carries no layout.
///
/// # Panics
///
/// Panics if `size` is zero or `align` is not a power of two.
pub(crate) fn allocate(size: usize, align: usize) -> Result<(NonNull<u8>, Layout)> {
    assert!(size > 0, "aligned allocation of zero bytes requested");
    assert!(
        align.is_power_of_two(),
        "aligned allocation requested with alignment {align} that is not a power of two"
    );

    let layout = Layout::from_size_align(size, align)
        .map_err(|_layout_error| Error::AllocationFailed { layout: None })?;

    // SAFETY: The layout is valid and not zero-sized (asserted above).
    let ptr = unsafe { alloc(layout) };

    NonNull::new(ptr)
        .map(|ptr| (ptr, layout))
        .ok_or(Error::AllocationFailed {
            layout: Some(layout),
        })
}

/// Returns memory obtained from [`allocate()`] to the host allocator.
///
/// # Safety
///
/// `ptr` and `layout` must be a pair previously returned by [`allocate()`] and the memory must
/// not have been released already.
pub(crate) unsafe fn release(ptr: NonNull<u8>, layout: Layout) {
    // SAFETY: Forwarding the guarantees of the caller, who promises this pair came from alloc().
    unsafe {
        dealloc(ptr.as_ptr(), layout);
    }
}

/// The smallest multiple of `align` that is greater than or equal to `n`.
///
/// Returns `None` on overflow.
///
/// # Panics
///
/// Panics if `align` is not a power of two.
#[must_use]
pub(crate) fn round_up_to_alignment(n: usize, align: usize) -> Option<usize> {
    assert!(
        align.is_power_of_two(),
        "cannot round up to alignment {align} that is not a power of two"
    );

    // The maximum padding we could ever add is `align - 1`, so if that fits, the result fits.
    n.checked_add(align.wrapping_sub(1))?;

    Some(Integer::next_multiple_of(&n, &align))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_leaves_multiples_unchanged() {
        assert_eq!(round_up_to_alignment(0, 8), Some(0));
        assert_eq!(round_up_to_alignment(8, 8), Some(8));
        assert_eq!(round_up_to_alignment(128, 64), Some(128));
        assert_eq!(round_up_to_alignment(7, 1), Some(7));
    }

    #[test]
    fn round_up_moves_to_next_multiple() {
        assert_eq!(round_up_to_alignment(1, 8), Some(8));
        assert_eq!(round_up_to_alignment(12, 8), Some(16));
        assert_eq!(round_up_to_alignment(65, 64), Some(128));
        assert_eq!(round_up_to_alignment(4 * 3, 16), Some(16));
    }

    #[test]
    fn round_up_overflow_is_none() {
        assert_eq!(round_up_to_alignment(usize::MAX, 2), None);
        assert_eq!(round_up_to_alignment(usize::MAX - 2, 4), None);
    }

    #[test]
    #[should_panic]
    fn round_up_to_non_power_of_two_panics() {
        _ = round_up_to_alignment(10, 12);
    }

    #[test]
    fn allocate_respects_alignment() {
        for align in [1, 8, 64, 4096] {
            let (ptr, layout) = allocate(100, align).unwrap();

            assert_eq!(ptr.as_ptr() as usize % align, 0);
            assert_eq!(layout.size(), 100);
            assert_eq!(layout.align(), align);

            // SAFETY: We got this pair from allocate() just above.
            unsafe {
                release(ptr, layout);
            }
        }
    }

    #[test]
    fn allocate_with_unrepresentable_size_fails_without_layout() {
        assert!(matches!(
            allocate(usize::MAX, MIN_BLOCK_ALIGN),
            Err(Error::AllocationFailed { layout: None })
        ));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn allocate_refused_by_host_reports_layout() {
        // Valid as a layout but far beyond what any host can provide.
        let size = 1_usize << 62;

        let Err(Error::AllocationFailed { layout: Some(layout) }) = allocate(size, MIN_BLOCK_ALIGN)
        else {
            panic!("allocation of {size} bytes unexpectedly succeeded");
        };

        assert_eq!(layout.size(), size);
        assert_eq!(layout.align(), MIN_BLOCK_ALIGN);
    }

    #[test]
    #[should_panic]
    fn allocate_zero_bytes_panics() {
        _ = allocate(0, 8);
    }
}
