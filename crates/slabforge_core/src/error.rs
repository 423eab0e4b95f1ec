//! # Pool Error Types
//!
//! All errors that can occur while allocating from or releasing into a pool.
//! Errors are always returned as values; the pools never panic on their own
//! account.

use thiserror::Error;

/// Errors that can occur in the pool allocators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// No block could be handed out.
    ///
    /// For a growable pool this means the system refused a new chunk; for a
    /// fixed-capacity pool it means every block is in use.
    #[error("pool exhausted: could not provide {requested_bytes} byte(s)")]
    Exhausted {
        /// Bytes the pool tried to obtain (a whole chunk when growing,
        /// a single block for a full fixed pool).
        requested_bytes: usize,
    },

    /// The pointer, index or handle does not belong to this pool.
    #[error("block does not belong to this pool")]
    ForeignPointerRejected,

    /// The block is already on the free list.
    #[error("block {index} is already free")]
    DoubleFree {
        /// Global index of the block.
        index: usize,
    },

    /// Invalid pool configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PoolError::Exhausted { requested_bytes: 256 };
        assert_eq!(err.to_string(), "pool exhausted: could not provide 256 byte(s)");

        let err = PoolError::DoubleFree { index: 7 };
        assert_eq!(err.to_string(), "block 7 is already free");
    }
}
