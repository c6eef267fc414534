/// Allocation granularity in bytes. Every requested size is rounded up to a
/// multiple of this, so two spans carved back to back keep their payloads
/// word aligned. This is a fixed property of the allocator, not the machine
/// word of the host: the arena is addressed with `u32` offsets and data is
/// accessed through byte slices, so 4 is enough.
pub(crate) const WORD_SIZE: usize = 4;

/// Rounds `size` up to the next multiple of [`WORD_SIZE`].
///
/// Saturates near `usize::MAX` instead of wrapping; the result is then far
/// larger than any arena, so the admission test in
/// [`crate::Defralloc::allocate`] rejects it like any other oversized
/// request.
#[inline]
pub(crate) fn round_word(size: usize) -> usize {
    size.saturating_add(WORD_SIZE - 1) & !(WORD_SIZE - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_word_multiples() {
        assert_eq!(round_word(0), 0);

        for i in 0..10 {
            // (1..=4) -> 4, (5..=8) -> 8, (9..=12) -> 12 and so on.
            let expected = WORD_SIZE * (i + 1);
            for size in (WORD_SIZE * i + 1)..=(WORD_SIZE * (i + 1)) {
                assert_eq!(round_word(size), expected);
            }
        }
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        assert!(round_word(usize::MAX) >= usize::MAX - WORD_SIZE);
        assert!(round_word(usize::MAX - 1) >= usize::MAX - WORD_SIZE);
    }
}
