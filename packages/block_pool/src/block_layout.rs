use std::any::type_name;
use std::marker::PhantomData;
use std::num::NonZero;

use crate::aligned::{MIN_BLOCK_ALIGN, round_up_to_alignment};

/// The type used for slot indices in the index array of a block.
///
/// This dictates the maximum number of slots in a single block.
pub(crate) type SlotIndex = u32;

/// Converts a caller-provided capacity into the slot count of a block.
///
/// # Panics
///
/// Panics if the capacity is zero or too large to be addressed by a [`SlotIndex`].
#[must_use]
pub(crate) fn slot_capacity(capacity: usize) -> NonZero<SlotIndex> {
    let capacity = SlotIndex::try_from(capacity).unwrap_or_else(|_| {
        panic!(
            "block capacity {capacity} exceeds the maximum of {}",
            SlotIndex::MAX
        )
    });

    NonZero::new(capacity).expect("blocks must have non-zero capacity")
}

/// Precalculates the layout of the single allocation that backs a [`Block`][crate::Block].
///
/// The allocation consists of two consecutive regions:
///
/// ```text
/// [index array: capacity × SlotIndex][padding to align_of::<T>()][storage: capacity × T]
/// ```
///
/// The padding makes sure that the storage region begins at an address suitable for `T`, and
/// because `size_of::<T>()` is always a multiple of `align_of::<T>()`, every slot in the storage
/// region is then also suitably aligned.
pub(crate) struct BlockLayout<T> {
    capacity: NonZero<SlotIndex>,

    /// Byte offset from the start of the allocation to the first slot of the storage region.
    storage_offset: usize,

    /// Total size of the allocation in bytes.
    size: usize,

    /// Alignment of the allocation, at least `MIN_BLOCK_ALIGN`.
    align: usize,

    _item: PhantomData<fn() -> T>,
}

impl<T> BlockLayout<T> {
    /// Calculates the layout of a block with the given capacity.
    ///
    /// Returns `None` if the block would be larger than virtual memory can express.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    #[must_use]
    pub(crate) fn new(capacity: NonZero<SlotIndex>) -> Option<Self> {
        assert!(
            size_of::<T>() > 0,
            "blocks cannot store zero-sized items of type {}",
            type_name::<T>()
        );

        let capacity_usize = usize::try_from(capacity.get()).ok()?;

        let indices_size = size_of::<SlotIndex>().checked_mul(capacity_usize)?;
        let storage_offset = round_up_to_alignment(indices_size, align_of::<T>())?;
        let storage_size = size_of::<T>().checked_mul(capacity_usize)?;
        let size = storage_offset.checked_add(storage_size)?;

        Some(Self {
            capacity,
            storage_offset,
            size,
            align: align_of::<T>().max(MIN_BLOCK_ALIGN),
            _item: PhantomData,
        })
    }

    #[must_use]
    pub(crate) fn capacity(&self) -> NonZero<SlotIndex> {
        self.capacity
    }

    #[must_use]
    pub(crate) fn storage_offset(&self) -> usize {
        self.storage_offset
    }

    #[must_use]
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub(crate) fn align(&self) -> usize {
        self.align
    }
}

// Manual impls because derives would require T: Clone/Copy/Debug.
impl<T> Clone for BlockLayout<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BlockLayout<T> {}

impl<T> std::fmt::Debug for BlockLayout<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockLayout")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("capacity", &self.capacity)
            .field("storage_offset", &self.storage_offset)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(value: SlotIndex) -> NonZero<SlotIndex> {
        NonZero::new(value).unwrap()
    }

    #[test]
    fn slot_capacity_accepts_index_range() {
        assert_eq!(slot_capacity(1).get(), 1);
        assert_eq!(slot_capacity(128).get(), 128);
        assert_eq!(slot_capacity(SlotIndex::MAX as usize).get(), SlotIndex::MAX);
    }

    #[test]
    #[should_panic]
    fn slot_capacity_zero_panics() {
        _ = slot_capacity(0);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic]
    fn slot_capacity_beyond_index_range_panics() {
        _ = slot_capacity(SlotIndex::MAX as usize + 1);
    }

    #[test]
    fn for_u8() {
        let layout = BlockLayout::<u8>::new(nz(10)).unwrap();

        // 10 × u32 indices, no padding needed for u8.
        assert_eq!(layout.storage_offset(), 40);
        assert_eq!(layout.size(), 50);
        assert_eq!(layout.align(), MIN_BLOCK_ALIGN);
        assert_eq!(layout.capacity().get(), 10);
    }

    #[test]
    fn for_u64_with_odd_capacity() {
        let layout = BlockLayout::<u64>::new(nz(3)).unwrap();

        // 3 × u32 = 12 bytes of indices, padded to 16 for u64 storage.
        assert_eq!(layout.storage_offset(), 16);
        assert_eq!(layout.size(), 16 + 24);
    }

    #[test]
    fn for_type_with_large_alignment() {
        #[repr(align(256))]
        #[allow(dead_code, reason = "only the layout of this type matters")]
        struct LargeAligned(u64);

        let layout = BlockLayout::<LargeAligned>::new(nz(5)).unwrap();

        assert_eq!(layout.storage_offset() % 256, 0);
        assert_eq!(layout.storage_offset(), 256);
        assert_eq!(layout.align(), 256);
        assert_eq!(layout.size(), 256 + 5 * 256);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn oversized_block_is_none() {
        // 2^40 bytes per item × 2^24 items does not fit in a 64-bit address space.
        assert!(BlockLayout::<[u8; 1 << 40]>::new(nz(1 << 24)).is_none());
    }

    #[test]
    #[should_panic]
    fn zst_is_panic() {
        _ = BlockLayout::<()>::new(nz(3));
    }
}
