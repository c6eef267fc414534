use std::mem;

/// Descriptor size in bytes. The arena accounting treats every table slot as
/// occupying this many bytes of capacity, so the struct layout below is part
/// of the allocator's arithmetic, not just an implementation detail. See
/// [`crate::table::Table`].
pub(crate) const DESC_SIZE: usize = mem::size_of::<Descriptor>();

// The accounting in `Table` and the admission test in `Defralloc::allocate`
// assume this exact size. If a field is added, the packing below has to be
// reworked, not just this assertion.
const _: () = assert!(DESC_SIZE == 8);

/// Top bit of [`Descriptor::tag`]: set while the span is owned by a caller.
const USED_BIT: u32 = 1 << 31;

/// Low 31 bits of [`Descriptor::tag`]: the span size in bytes.
const SIZE_MASK: u32 = USED_BIT - 1;

/// Offset stored in a vacant descriptor. Never a valid data offset because
/// arena capacity is capped below `u32::MAX`, so the compaction scan can
/// never mistake a vacant slot for a live neighbor.
const NO_OFFSET: u32 = u32::MAX;

/// Opaque, stable reference to an allocation.
///
/// A handle is the index of a descriptor slot and never changes for the life
/// of the allocation, no matter how often the bytes behind it are slid
/// around by compaction. Dereference it with [`crate::Defralloc::get`] or
/// [`crate::Defralloc::get_mut`]; the borrow rules make it impossible to
/// hold the resulting slice across a call that could relocate the data.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Handle(pub(crate) u32);

impl Handle {
    /// The reserved sentinel returned for zero-size allocations. It is not
    /// backed by a descriptor: releasing it is a no-op, its size is 0 and it
    /// dereferences to an empty slice.
    pub const EMPTY: Handle = Handle(u32::MAX);

    /// Whether this is the zero-size sentinel.
    #[inline]
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        Handle(index as u32)
    }

    /// Descriptor slot this handle refers to. For [`Handle::EMPTY`] this is
    /// out of range for any table, which is exactly what the validation
    /// paths rely on.
    #[inline]
    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Fixed-size record naming one data span of the arena.
///
/// ```text
/// +--------------------------+
/// | offset           (4 B)   |  where the span starts in the arena
/// +--------------------------+
/// | used bit | size (4 B)    |  owned-by-caller flag + span length
/// +--------------------------+
/// ```
///
/// The used flag is packed into the top bit of the size word to keep the
/// record at exactly 8 bytes; sizes are therefore capped at 2 GiB, far above
/// the `u32` offset range the arena supports anyway.
///
/// A descriptor is in one of three states:
/// - **used**: names a span owned by a caller (`used` set, any size),
/// - **free region**: the anchor slot, the single non-zero free span,
/// - **vacant**: released and recyclable (`used` clear, size 0, no offset).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Descriptor {
    offset: u32,
    tag: u32,
}

impl Descriptor {
    /// A used descriptor for a freshly carved span.
    #[inline]
    pub fn carved(offset: u32, size: u32) -> Self {
        debug_assert!(size <= SIZE_MASK);
        Self {
            offset,
            tag: size | USED_BIT,
        }
    }

    /// The anchor's initial state: the whole data region, starting at 0.
    #[inline]
    pub fn free_region(size: u32) -> Self {
        Self {
            offset: 0,
            tag: size,
        }
    }

    /// A recyclable slot that names no data at all.
    #[inline]
    pub fn vacant() -> Self {
        Self {
            offset: NO_OFFSET,
            tag: 0,
        }
    }

    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.tag & SIZE_MASK
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.tag & USED_BIT != 0
    }

    /// Whether this slot can be handed out again by the next carve.
    #[inline]
    pub fn is_vacant(&self) -> bool {
        self.tag == 0
    }

    /// First offset past the span. Compaction looks the successor up by this
    /// value.
    #[inline]
    pub fn end(&self) -> u32 {
        self.offset + self.size()
    }

    #[inline]
    pub fn set_offset(&mut self, offset: u32) {
        self.offset = offset;
    }

    #[inline]
    pub fn set_size(&mut self, size: u32) {
        debug_assert!(size <= SIZE_MASK);
        self.tag = (self.tag & USED_BIT) | size;
    }

    /// Drops the used flag but keeps the size. This is the state a span is
    /// in while compaction still needs to know how many bytes to slide away.
    #[inline]
    pub fn set_released(&mut self) {
        self.tag &= SIZE_MASK;
    }

    /// Resets the slot to [`Descriptor::vacant`].
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::vacant();
    }
}
