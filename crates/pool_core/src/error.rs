//! Error types for the pool allocator crates

use std::alloc::Layout;

use thiserror::Error;

/// Errors a pool can surface to its caller.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The system allocator could not satisfy a block acquisition. No pool
    /// state is mutated when this is returned.
    #[error("failed to acquire a {}-byte block (align {}) from the system allocator", layout.size(), layout.align())]
    AllocationFailure { layout: Layout },
}

/// Result type alias used throughout the pool allocator crates.
pub type Result<T> = core::result::Result<T, PoolError>;
