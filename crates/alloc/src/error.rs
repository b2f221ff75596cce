//! Error types for nebula-alloc
//!
//! Uses thiserror for clean, idiomatic Rust error definitions.
//!
//! [`AllocError`] is the closed set of outcomes an allocator operation can
//! report. It is `Copy` so that strategies and decorators can inspect and
//! forward it without allocation. [`MemoryError`] covers everything around the
//! contract (configuration, construction).

use thiserror::Error;

// ============================================================================
// Allocator Contract Errors
// ============================================================================

/// Outcome of a failed allocator operation.
///
/// Success is expressed as `Ok(_)`; there is no "no error" variant.
#[must_use = "errors should be handled"]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocError {
    /// The strategy has no room left for the request.
    #[error("out of memory")]
    OutOfMemory,

    /// The pointer was not handed out by this allocator.
    #[error("pointer is not owned by this allocator")]
    NotOwnedPointer,

    /// The strategy could not honour the requested alignment.
    #[error("alignment cannot be satisfied")]
    AlignmentError,

    /// The block cannot be grown or shrunk in place.
    #[error("allocation cannot be resized in place")]
    CannotResize,

    /// The block cannot be released on its own.
    #[error("allocation cannot be freed individually")]
    CannotFree,

    /// The strategy structurally does not provide this operation.
    #[error("operation not supported by this allocator")]
    UnsupportedOperation,

    /// Strategy-specific failure, identified by an implementation-defined code.
    #[error("allocator-specific error (code {0})")]
    Custom(u32),
}

impl AllocError {
    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "MEM:ALLOC:OOM",
            Self::NotOwnedPointer => "MEM:ALLOC:NOT_OWNED",
            Self::AlignmentError => "MEM:ALLOC:ALIGN",
            Self::CannotResize => "MEM:ALLOC:RESIZE",
            Self::CannotFree => "MEM:ALLOC:FREE",
            Self::UnsupportedOperation => "MEM:ALLOC:UNSUPPORTED",
            Self::Custom(_) => "MEM:ALLOC:CUSTOM",
        }
    }

    /// `true` when the operation is simply not available on this strategy.
    ///
    /// Callers must not retry these; they should pick another path.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedOperation)
    }

    /// `true` when the allocator ran out of space.
    #[must_use]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory)
    }

    /// `true` for the outcomes a tracking allocator treats as a logical free.
    #[must_use]
    pub(crate) fn is_logical_free(&self) -> bool {
        matches!(self, Self::UnsupportedOperation | Self::CannotFree)
    }
}

// ============================================================================
// Crate Errors
// ============================================================================

/// Errors raised outside the allocator contract itself.
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Alloc(#[from] AllocError),
}

impl MemoryError {
    /// Create invalid config error
    pub fn invalid_config(reason: &str) -> Self {
        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "MEM:CONFIG:INVALID",
            Self::Alloc(err) => err.code(),
        }
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result of an allocator operation
pub type AllocResult<T> = core::result::Result<T, AllocError>;

/// Result type for crate-level operations
pub type MemoryResult<T> = core::result::Result<T, MemoryError>;
