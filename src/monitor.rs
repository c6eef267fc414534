use crate::allocator::Defralloc;

/// Read-only snapshot of an allocator, built by walking the descriptor
/// table, anchor first. See [`Defralloc::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemStats {
    /// Descriptors currently naming caller-owned spans.
    pub used_count: usize,
    /// Free descriptors. This counts the anchor *and* every vacant
    /// recycled slot, so it can exceed 1 even though there is only ever
    /// one free region. Cosmetic bookkeeping quirk; `free_bytes` is the
    /// number that means something.
    pub free_count: usize,
    /// Bytes in caller-owned spans (word rounding included).
    pub used_bytes: usize,
    /// Bytes in free spans. Vacant slots contribute 0, so this is always
    /// the anchor's size.
    pub free_bytes: usize,
    /// Largest contiguous free run. Equal to `free_bytes` in a correctly
    /// functioning instance; that equality *is* the zero-fragmentation
    /// guarantee.
    pub largest_free: usize,
    /// `100 - largest_free * 100 / free_bytes`, or 0 when nothing is free.
    /// Always 0 here; the field exists so the guarantee is observable
    /// rather than taken on faith.
    pub frag_pct: u8,
    /// Bytes of capacity accounted to the descriptor table itself. Together
    /// with the other byte counts this makes the conservation law checkable
    /// from outside: `used_bytes + free_bytes + table_bytes == capacity`.
    pub table_bytes: usize,
}

impl Defralloc {
    /// Takes a [`MemStats`] snapshot. Read-only; a walk over the table, no
    /// allocation, no compaction.
    pub fn stats(&self) -> MemStats {
        let mut stats = MemStats {
            used_count: 0,
            free_count: 0,
            used_bytes: 0,
            free_bytes: 0,
            largest_free: 0,
            frag_pct: 0,
            table_bytes: self.table.overhead(),
        };

        for desc in self.table.iter() {
            let size = desc.size() as usize;
            if desc.is_used() {
                stats.used_count += 1;
                stats.used_bytes += size;
            } else {
                stats.free_count += 1;
                stats.free_bytes += size;
                stats.largest_free = stats.largest_free.max(size);
            }
        }

        if stats.free_bytes > 0 {
            stats.frag_pct = (100 - stats.largest_free * 100 / stats.free_bytes) as u8;
        }

        stats
    }
}
