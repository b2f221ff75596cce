//! Allocator contract and the concrete strategies behind it
//!
//! - [`Allocator`]: the pass-by-value handle every consumer accepts
//! - [`BumpAllocator`]: linear allocation out of a caller-supplied region
//! - [`HeapAllocator`]: adapter over the system allocator
//! - [`TrackingAllocator`]: leak-tracking decorator over another handle
//!
//! The arena strategy lives in [`crate::arena`].

mod bump;
mod handle;
mod heap;
mod traits;
mod tracked;

pub use bump::{BumpAllocator, LastAllocation};
pub use handle::{Allocator, Block, CallSite, Operation, Procedure};
pub use heap::{HeapAllocator, heap_allocator};
pub use traits::{MemoryUsage, RawAllocator};
pub use tracked::{LeakReport, LeakedAllocation, TrackingAllocator};
