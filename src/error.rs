//! Error types for rank-index.

use std::fmt;
use std::io;

/// Errors produced by the transposition builder, the posting-list manager,
/// and the storage substrate they share.
///
/// Preconditions and programmer misuse (`IndexOutOfRange`) surface
/// immediately. I/O errors propagate after the offending stream's `Drop`
/// impl has released its handle. `MalformedStream` aborts whatever pass or
/// decode produced it. `TokenMismatch` is never constructed as an `Err`,
/// it is recorded in a `BuildReport` and logged, never returned to a caller
/// (see `direct_index::BuildReport`).
#[derive(Debug)]
pub enum IndexError {
    /// A precondition in §4.3 was violated. The build aborts cleanly and
    /// leaves no destination structure registered.
    PreconditionFailure(String),

    /// Underlying read/write fault.
    Io(io::Error),

    /// A bit-level decode inconsistency (truncated unary prefix, posting
    /// list shorter than its header claimed, etc.).
    MalformedStream(String),

    /// `score`/`posting`/`statistics`/`term` called with an index outside
    /// `0..num_terms`.
    IndexOutOfRange { index: usize, len: usize },

    /// A named index structure was not found.
    NotFound(String),

    /// The sum of token counts observed while transposing a pass did not
    /// match the token count recorded on the source index's properties.
    /// Never returned as an `Err` by any public operation; recorded in a
    /// `BuildReport` and logged via `log::warn!` (see `direct_index`).
    TokenMismatch { expected: u64, observed: u64 },
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreconditionFailure(msg) => write!(f, "precondition failed: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::MalformedStream(msg) => write!(f, "malformed stream: {msg}"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range (len {len})")
            }
            Self::NotFound(name) => write!(f, "structure not found: {name}"),
            Self::TokenMismatch { expected, observed } => write!(
                f,
                "token count mismatch: expected {expected}, observed {observed}"
            ),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for IndexError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Convenience alias used throughout the crate.
pub type IndexResult<T> = Result<T, IndexError>;
