use thiserror::Error;

use crate::descriptor::Handle;

/// Everything that can go wrong talking to a [`crate::Defralloc`].
///
/// Freeing the empty sentinel, freeing an already-released handle and asking
/// for the size of a dead handle are all *defined* no-ops or zero returns,
/// not errors. Nothing in this crate panics on a caller mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The free region cannot admit the request. The original allocation is
    /// untouched when this comes out of [`crate::Defralloc::reallocate`].
    #[error("out of memory: requested {requested} bytes, {free} free")]
    OutOfMemory { requested: usize, free: usize },

    /// The handle does not name a live allocation of this allocator.
    #[error("invalid handle {0:?}")]
    InvalidHandle(Handle),
}
