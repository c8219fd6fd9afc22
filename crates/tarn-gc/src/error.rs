//! Heap error types.

use thiserror::Error;

/// Errors surfaced by the allocator and heap setup.
///
/// Collector-internal invariant violations (re-entry, unknown tags during
/// the scan phase) are bugs rather than recoverable conditions and panic
/// with a diagnostic instead of returning a variant here.
#[derive(Debug, Error)]
pub enum GcError {
    /// A collection ran and the request still does not fit.
    #[error("memory exhausted: requested {requested} bytes, {available} available")]
    MemoryExhausted { requested: usize, available: usize },

    /// The operating system refused the semispace mapping.
    #[error("failed to map semispace: {0}")]
    Map(#[from] std::io::Error),

    /// The configuration failed validation.
    #[error("invalid heap configuration: {0}")]
    InvalidConfig(String),
}
