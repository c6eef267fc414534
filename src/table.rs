use log::debug;

use crate::descriptor::{Descriptor, DESC_SIZE};

/// Slot of the anchor descriptor, the one descriptor that always represents
/// the single free region. Created once at construction, never recycled,
/// never handed out as a [`crate::Handle`].
pub(crate) const ANCHOR: usize = 0;

/// The descriptor table. Conceptually it occupies one end of the arena and
/// grows toward the other as more concurrent allocations exist:
///
/// ```text
/// +--------+--------+--------+---------------------+-----------------+
/// | span 1 | span 2 | span 3 |     free region     |      table      |
/// +--------+--------+--------+---------------------+-----------------+
/// 0                          ^ anchor offset        ^ grows leftward  N
/// ```
///
/// The slots actually live in a `Vec` (descriptor order and data order are
/// independent anyway), but every slot is *accounted* against the arena at
/// [`DESC_SIZE`] bytes: growing the table debits the anchor, reclaiming a
/// slot credits it back. That keeps the conservation law
///
/// ```text
/// sum(used spans) + anchor size + slots * DESC_SIZE == capacity
/// ```
///
/// intact across every operation, which is what the monitor and the test
/// suite check.
pub(crate) struct Table {
    slots: Vec<Descriptor>,
}

impl Table {
    /// Builds the table with only the anchor in it, covering everything the
    /// anchor's own slot doesn't.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Descriptor::free_region((capacity - DESC_SIZE) as u32)],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Bytes of capacity currently accounted to the table itself.
    #[inline]
    pub fn overhead(&self) -> usize {
        self.slots.len() * DESC_SIZE
    }

    #[inline]
    pub fn anchor(&self) -> Descriptor {
        self.slots[ANCHOR]
    }

    #[inline]
    pub fn anchor_mut(&mut self) -> &mut Descriptor {
        &mut self.slots[ANCHOR]
    }

    /// Checked slot access for validating caller-supplied handles.
    #[inline]
    pub fn slot(&self, index: usize) -> Option<&Descriptor> {
        self.slots.get(index)
    }

    /// Unchecked-by-contract access for indices the allocator produced
    /// itself.
    #[inline]
    pub fn desc(&self, index: usize) -> Descriptor {
        self.slots[index]
    }

    #[inline]
    pub fn desc_mut(&mut self, index: usize) -> &mut Descriptor {
        &mut self.slots[index]
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Descriptor> {
        self.slots.iter()
    }

    /// Finds a slot for a new allocation: the first vacant one, or a fresh
    /// slot pushed onto the table. Growing debits [`DESC_SIZE`] from the
    /// anchor; the admission test in [`crate::Defralloc::allocate`] has
    /// already reserved room for that.
    pub fn take_vacant_slot(&mut self) -> usize {
        for (index, desc) in self.slots.iter().enumerate().skip(1) {
            if desc.is_vacant() {
                return index;
            }
        }

        let anchor = self.anchor_mut();
        anchor.set_size(anchor.size() - DESC_SIZE as u32);
        self.slots.push(Descriptor::vacant());

        let index = self.slots.len() - 1;
        debug!("descriptor table grew to {} slots", self.slots.len());
        index
    }

    /// Finds the used descriptor whose span starts exactly at `offset`, i.e.
    /// the span immediately following a hole in arena-address order.
    ///
    /// This is a full scan on purpose: descriptor order says nothing about
    /// data order, and there is no secondary index. Compaction performs one
    /// such scan per span it slides, which is where the documented
    /// worst-case quadratic cost of a release comes from.
    #[inline]
    pub fn used_slot_at(&self, offset: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|desc| desc.is_used() && desc.offset() == offset)
    }

    /// Pops every trailing vacant slot, crediting the anchor for each one.
    /// Returns how many slots were reclaimed. Called after releasing the
    /// outermost slot so the table shrinks back toward the data region
    /// instead of retaining slots it no longer needs.
    pub fn reclaim_trailing(&mut self) -> usize {
        let mut reclaimed = 0;

        while self.slots.len() > 1 && self.slots[self.slots.len() - 1].is_vacant() {
            self.slots.pop();
            let anchor = self.anchor_mut();
            anchor.set_size(anchor.size() + DESC_SIZE as u32);
            reclaimed += 1;
        }

        if reclaimed > 0 {
            debug!(
                "reclaimed {} descriptor slots, table is {} slots",
                reclaimed,
                self.slots.len()
            );
        }

        reclaimed
    }
}
