//! A compacting, handle-based arena allocator for devices where a normal
//! allocator's fragmentation is unacceptable. Callers hold stable
//! [`Handle`]s instead of pointers; every release compacts the arena so all
//! free memory stays in one contiguous run. See [`Defralloc`] for the full
//! story and examples.

mod align;
mod allocator;
mod arena;
mod descriptor;
mod error;
mod monitor;
mod table;

pub use allocator::Defralloc;
pub use descriptor::Handle;
pub use error::AllocError;
pub use monitor::MemStats;
