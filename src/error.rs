//! Error types for the replay buffer library

use thiserror::Error;

/// Result type alias for replay buffer operations
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Main error type for the replay buffer library
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplayError {
    /// A constructor or method argument violates its contract
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument
        message: String,
    },

    /// An explicit index lookup fell outside `[0, len)`
    #[error("index {index} out of range for length {len}")]
    OutOfRange {
        /// The offending index
        index: usize,
        /// The current occupancy of the buffer
        len: usize,
    },

    /// The buffer or a segment tree is not in a state that permits the
    /// requested operation (empty buffer, zero-sum tree, zero-min tree)
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state
        message: String,
    },

    /// A collaborator (device copy, pinning) failed
    #[error("backend failure: {message}")]
    BackendFailure {
        /// Description of the backend failure
        message: String,
    },
}

/// Extends `Result<&T, ReplayError>` with an `Option`-style `cloned`,
/// so call sites reading a borrowed slot can hand back an owned copy
/// with the same `?`-friendly shape as the rest of this crate's API.
pub(crate) trait ClonedResult<'a, T: Clone + 'a> {
    fn cloned(self) -> Result<T>;
}

impl<'a, T: Clone + 'a> ClonedResult<'a, T> for Result<&'a T> {
    fn cloned(self) -> Result<T> {
        self.map(|v| v.clone())
    }
}

impl ReplayError {
    /// Create a new invalid-argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    /// Create a new out-of-range error
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self::OutOfRange { index, len }
    }

    /// Create a new invalid-state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState { message: message.into() }
    }

    /// Create a new backend-failure error
    pub fn backend_failure(message: impl Into<String>) -> Self {
        Self::BackendFailure { message: message.into() }
    }

    /// Whether this error reflects a caller mistake rather than buffer state
    pub fn is_argument_error(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. } | Self::OutOfRange { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_carries_both_fields() {
        let err = ReplayError::out_of_range(5, 3);
        assert!(matches!(err, ReplayError::OutOfRange { index: 5, len: 3 }));
        assert!(err.is_argument_error());
    }

    #[test]
    fn invalid_state_is_not_an_argument_error() {
        let err = ReplayError::invalid_state("sum tree total is zero");
        assert!(!err.is_argument_error());
    }
}
