use std::cmp;

use log::{trace, warn};

use crate::{
    align::{round_word, WORD_SIZE},
    arena::Arena,
    descriptor::{Descriptor, Handle, DESC_SIZE},
    error::AllocError,
    table::{Table, ANCHOR},
};

/// How many descriptors' worth of free space the admission test holds back
/// on every allocation: one so a new slot can always be carved, one so the
/// anchor itself never degenerates to zero size while still existing.
/// Deliberately conservative. Do not "tighten" it to one descriptor
/// without reworking the accounting and the tests that assume it.
const ADMISSION_RESERVE: usize = 2 * DESC_SIZE;

/// A compacting, handle-based arena allocator.
///
/// Unlike a conventional allocator, this one guarantees the managed region
/// never develops *external* fragmentation: every release slides the data
/// spans that follow the freed one backward, so all free memory is one
/// contiguous run at all times. The price is indirection. Callers never hold
/// a pointer to their data; they hold a stable [`Handle`] and the allocator
/// is free to move the bytes behind it.
///
/// The arena looks like this (the descriptor table is accounted at the far
/// end, see [`crate::table::Table`]):
///
/// ```text
/// +--------+--------+--------+----------------------+----------------+
/// | span A | span B | span C |      free region     |     table      |
/// +--------+--------+--------+----------------------+----------------+
/// 0        ^        ^        ^ anchor offset                         N
/// ```
///
/// Releasing B slides C back over it and grows the free region:
///
/// ```text
/// +--------+--------+-------------------------------+----------------+
/// | span A | span C |          free region          |     table      |
/// +--------+--------+-------------------------------+----------------+
/// ```
///
/// A and C keep their handles through all of this; only the offsets stored
/// in their descriptors change.
///
/// Every mutating operation takes `&mut self`, so the single-threaded
/// contract is compiler enforced. To share an allocator across threads,
/// wrap it in a `Mutex`; that is the caller's business, not this crate's.
///
/// # Examples
///
/// ```rust
/// use defralloc::Defralloc;
///
/// let mut mem = Defralloc::new(4096);
///
/// let list = mem.allocate(64).unwrap();
/// mem.get_mut(list).unwrap().fill(0xAB);
///
/// // Unrelated traffic may slide the bytes around; the handle stays put.
/// let scratch = mem.allocate(128).unwrap();
/// mem.release(scratch).unwrap();
///
/// assert!(mem.get(list).unwrap().iter().all(|&b| b == 0xAB));
/// assert_eq!(mem.stats().frag_pct, 0);
/// ```
pub struct Defralloc {
    pub(crate) arena: Arena,
    pub(crate) table: Table,
}

impl Defralloc {
    /// Builds an allocator over a fresh arena of `capacity` bytes.
    ///
    /// Capacity is fixed for the allocator's lifetime. It must be a multiple
    /// of the 4-byte word, large enough for the anchor descriptor plus some
    /// data, and fit in the `u32` offset space; those are asserted, not
    /// reported, because capacity is a deployment constant, not runtime
    /// input.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity % WORD_SIZE == 0, "capacity must be word aligned");
        assert!(capacity >= 2 * DESC_SIZE, "capacity too small for the anchor");
        assert!(capacity < u32::MAX as usize, "capacity exceeds u32 offsets");

        trace!("new arena: {} bytes", capacity);

        Self {
            arena: Arena::new(capacity),
            table: Table::new(capacity),
        }
    }

    /// Fixed capacity of the backing arena in bytes, table overhead
    /// included.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Carves `size` bytes off the front of the free region.
    ///
    /// `size` is rounded up to the 4-byte word. A request for 0 bytes
    /// returns [`Handle::EMPTY`] without consuming anything.
    ///
    /// The admission test requires the free region to hold the rounded size
    /// plus two descriptors' worth of reserve (`ADMISSION_RESERVE`). There
    /// is no search over multiple free regions and no best-fit policy,
    /// because there is only ever one free region to look at.
    ///
    /// The returned span's content is not zeroed; it holds whatever the
    /// previous occupant left there (released spans happen to be zeroed as
    /// hygiene, but that is not a contract).
    pub fn allocate(&mut self, size: usize) -> Result<Handle, AllocError> {
        if size == 0 {
            return Ok(Handle::EMPTY);
        }

        let rounded = round_word(size);
        let free = self.table.anchor().size() as usize;

        if free < rounded.saturating_add(ADMISSION_RESERVE) {
            warn!("allocate({}) -> out of memory, {} free", size, free);
            return Err(AllocError::OutOfMemory {
                requested: size,
                free,
            });
        }

        let slot = self.table.take_vacant_slot();
        let offset = self.table.anchor().offset();
        *self.table.desc_mut(slot) = Descriptor::carved(offset, rounded as u32);

        let anchor = self.table.anchor_mut();
        anchor.set_offset(offset + rounded as u32);
        anchor.set_size(anchor.size() - rounded as u32);

        let handle = Handle::from_index(slot);
        trace!("allocate({}) -> {:?}, {} bytes at {}", size, handle, rounded, offset);
        Ok(handle)
    }

    /// Releases an allocation and compacts the arena.
    ///
    /// Releasing [`Handle::EMPTY`] is a no-op, and so is releasing a handle
    /// that has already been released (logged, not an error). A handle this
    /// allocator never produced is reported as
    /// [`AllocError::InvalidHandle`].
    ///
    /// # Cost
    ///
    /// Compaction looks up "the span that starts where the hole ends" with
    /// a full table scan, once per surviving span after the hole, so one
    /// release costs `O(spans_after * table_len)`: quadratic in
    /// pathological patterns such as freeing the lowest-addressed of many
    /// small live allocations. Zero fragmentation is bought with free-call
    /// latency. Anything faster (say, a secondary data-order list) changes
    /// the asymptotics and the performance expectations in the test suite,
    /// so it has to come with benchmarks, not slip in quietly.
    pub fn release(&mut self, handle: Handle) -> Result<(), AllocError> {
        if handle.is_empty() {
            return Ok(());
        }

        let index = handle.index();
        let Some(desc) = self.table.slot(index) else {
            return Err(AllocError::InvalidHandle(handle));
        };
        if index == ANCHOR {
            return Err(AllocError::InvalidHandle(handle));
        }
        if !desc.is_used() {
            // Double release. The slot may even belong to someone else by
            // now if it was recycled, which is why this is defined as a
            // no-op only for slots that are currently free.
            warn!("release({:?}) -> already free, ignored", handle);
            return Ok(());
        }

        self.compact(index);

        // The recycler only walks when the outermost slot was the one
        // released; inner vacant slots stay behind for reuse.
        if index == self.table.len() - 1 {
            self.table.reclaim_trailing();
        }

        Ok(())
    }

    /// The core algorithm: slides every span after the hole backward until
    /// the hole reaches the free region, then merges it into the anchor.
    ///
    /// One step of the loop, releasing B:
    ///
    /// ```text
    /// before:  | A |  hole  |   C   | free |        C starts at hole end
    /// after:   | A |   C   |  hole  | free |        hole slid past C
    /// ```
    ///
    /// The hole keeps its size and walks toward the free region one span at
    /// a time; when no used span starts at its end anymore, the free region
    /// does, and the two merge into one.
    fn compact(&mut self, hole: usize) {
        let freed = self.table.desc(hole);
        let hole_size = freed.size();
        let mut hole_offset = freed.offset();

        self.table.desc_mut(hole).set_released();

        let mut slid = 0usize;
        while let Some(next) = self.table.used_slot_at(hole_offset + hole_size) {
            let span = self.table.desc(next);
            self.arena.copy_span(span.offset(), hole_offset, span.size());
            self.table.desc_mut(next).set_offset(hole_offset);
            hole_offset += span.size();
            slid += 1;
        }

        // Used spans form an unbroken prefix, so once nothing used starts
        // at the hole's end, the free region must.
        debug_assert_eq!(self.table.anchor().offset(), hole_offset + hole_size);

        let merged = self.table.anchor().size() + hole_size;
        let anchor = self.table.anchor_mut();
        anchor.set_offset(hole_offset);
        anchor.set_size(merged);

        // Hygiene, not contract: scrub the vacated bytes.
        self.arena.zero_span(hole_offset, hole_size);
        self.table.desc_mut(hole).clear();

        trace!(
            "release slot {}: {} bytes, slid {} spans, free region {}@{}",
            hole,
            hole_size,
            slid,
            merged,
            hole_offset
        );
    }

    /// Moves an allocation to a span of `new_size` bytes.
    ///
    /// Carves first: if that fails, the original allocation is untouched
    /// and the error is returned. On success, `min(old, new)` bytes are
    /// copied over and the old handle is released. The returned handle is
    /// never the old one.
    ///
    /// `reallocate(Handle::EMPTY, n)` is just `allocate(n)`, and
    /// `reallocate(h, 0)` releases `h` and returns [`Handle::EMPTY`].
    pub fn reallocate(&mut self, handle: Handle, new_size: usize) -> Result<Handle, AllocError> {
        if handle.is_empty() {
            return self.allocate(new_size);
        }

        // Validate before carving so a bogus handle can't cost an
        // allocation.
        let index = self.live_index(handle)?;
        let old = self.table.desc(index);

        let new_handle = self.allocate(new_size)?;

        if !new_handle.is_empty() {
            let new = self.table.desc(new_handle.index());
            let count = cmp::min(old.size(), new.size());
            self.arena.copy_span(old.offset(), new.offset(), count);
        }

        trace!("reallocate({:?}, {}) -> {:?}", handle, new_size, new_handle);

        // Can't fail: the handle was validated live above and carving never
        // touches a used slot.
        self.release(handle)?;

        Ok(new_handle)
    }

    /// Current size of the allocation in bytes, rounding included. Returns
    /// 0 for [`Handle::EMPTY`] and for handles that are not live; this one
    /// is infallible by contract.
    pub fn size_of(&self, handle: Handle) -> usize {
        if handle.is_empty() {
            return 0;
        }

        match self.table.slot(handle.index()) {
            Some(desc) if handle.index() != ANCHOR && desc.is_used() => desc.size() as usize,
            _ => 0,
        }
    }

    /// Borrows the bytes behind a handle for the duration of one operation.
    ///
    /// The borrow is tied to the allocator, so the compiler rejects any
    /// attempt to keep it across an `allocate`/`release`/`reallocate`
    /// call, which is exactly the window in which the bytes may be slid
    /// elsewhere. [`Handle::EMPTY`] dereferences to an empty slice.
    pub fn get(&self, handle: Handle) -> Result<&[u8], AllocError> {
        if handle.is_empty() {
            return Ok(&[]);
        }

        let index = self.live_index(handle)?;
        let desc = self.table.desc(index);
        Ok(self.arena.span(desc.offset(), desc.size()))
    }

    /// Mutable flavor of [`Defralloc::get`], same borrow rules.
    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut [u8], AllocError> {
        if handle.is_empty() {
            return Ok(&mut []);
        }

        let index = self.live_index(handle)?;
        let desc = self.table.desc(index);
        Ok(self.arena.span_mut(desc.offset(), desc.size()))
    }

    /// Maps a handle to its slot if it names a live allocation.
    fn live_index(&self, handle: Handle) -> Result<usize, AllocError> {
        let index = handle.index();
        match self.table.slot(index) {
            Some(desc) if index != ANCHOR && desc.is_used() => Ok(index),
            _ => Err(AllocError::InvalidHandle(handle)),
        }
    }
}
