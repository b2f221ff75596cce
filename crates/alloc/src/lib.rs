//! # nebula-alloc
//!
//! Handle-based memory allocation for the Nebula ecosystem.
//!
//! Every memory consumer accepts a single, copyable [`Allocator`] handle and
//! never cares which strategy sits behind it:
//! - [`BumpAllocator`]: linear allocation out of a caller-supplied region
//! - [`ArenaAllocator`]: growable chain of bump pools, released all at once
//! - [`TrackingAllocator`]: leak-detecting decorator over any other handle
//! - [`HeapAllocator`]: the process heap, the usual backing of the others
//!
//! ## Quick Start
//!
//! ```rust
//! use nebula_alloc::prelude::*;
//!
//! let tracker = TrackingAllocator::new(heap_allocator());
//! {
//!     let arena = ArenaAllocator::new(tracker.as_allocator());
//!     let numbers = arena.as_allocator().make_slice(16, 0_u32).unwrap();
//!     assert_eq!(numbers.len(), 16);
//! }
//! // the arena returned its pools when it was dropped
//! assert!(tracker.report().is_ok());
//! ```
//!
//! ## Features
//!
//! - `logging` (default): structured events via `tracing`
//! - `serde`: (de)serialization of [`ArenaConfig`] and [`ResetMode`]
//!
//! ## Threading
//!
//! All strategies are single-threaded. They use `Cell`/`RefCell` internally
//! and handles carry raw pointers, so none of them is `Send` or `Sync`.

#![cfg_attr(docsrs, feature(doc_cfg))]
// Allocators are built on raw pointers; every unsafe block carries a SAFETY note
#![allow(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
// inline(always) on small alignment helpers is intentional for hot paths
#![allow(clippy::inline_always)]
// #[must_use] on fns returning Self/Result documents intent even if type is already must_use
#![allow(clippy::double_must_use)]
#![allow(clippy::return_self_not_must_use)]
// Blocks are byte slices; casting to T is checked against the requested layout
#![allow(clippy::cast_ptr_alignment)]

pub mod allocator;
pub mod arena;
pub mod boxed;
pub mod error;
pub mod utils;

pub use crate::allocator::{
    Allocator, Block, BumpAllocator, CallSite, HeapAllocator, LeakReport, MemoryUsage, Operation,
    RawAllocator, TrackingAllocator, heap_allocator,
};
pub use crate::arena::{ArenaAllocator, ArenaConfig, ResetMode};
pub use crate::boxed::AllocBox;
pub use crate::error::{AllocError, AllocResult, MemoryError, MemoryResult};

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::allocator::{
        Allocator, BumpAllocator, HeapAllocator, MemoryUsage, RawAllocator, TrackingAllocator,
        heap_allocator,
    };
    pub use crate::arena::{ArenaAllocator, ArenaConfig, ResetMode};
    pub use crate::boxed::AllocBox;
    pub use crate::error::{AllocError, AllocResult, MemoryError, MemoryResult};
}
