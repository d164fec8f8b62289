//
// Copyright (c) 2025 Nathan Fiedler
//

//! Error types for the resizable arrays.

use std::alloc::Layout;
use std::fmt;

/// Error type for sequence operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The requested position is not within `0..len`.
    OutOfRange { index: usize, len: usize },

    /// The allocator could not satisfy a request for a block or directory.
    ResourceExhaustion(Layout),

    /// An operation was invoked in a state where it is not defined, such as
    /// removing from an empty sequence.
    PreconditionViolation(&'static str),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfRange { index, len } => {
                write!(f, "index out of range: {} (len is {})", index, len)
            }
            Error::ResourceExhaustion(layout) => write!(
                f,
                "memory allocation of {} bytes failed",
                layout.size()
            ),
            Error::PreconditionViolation(msg) => write!(f, "precondition violated: {}", msg),
        }
    }
}

/// Result type alias for sequence operations.
pub type Result<T> = std::result::Result<T, Error>;
