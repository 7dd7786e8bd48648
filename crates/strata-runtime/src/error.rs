//! Assembly invariant violations
//!
//! Empty match sets are ordinary data. Everything here means the engine (or
//! the lookup collaborator feeding it) broke an invariant: the pass is
//! aborted and the error handed to the caller.

use strata_core::StreamIndex;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("Match sets cover {actual} streams but the join tree has {expected}")]
    StreamCountMismatch { expected: usize, actual: usize },

    #[error("Row slot for stream {stream} written twice")]
    SlotAlreadySet { stream: StreamIndex },

    #[error("Row slot {stream} is outside a row of width {width}")]
    SlotOutOfRange { stream: StreamIndex, width: usize },

    #[error("Match node {index} of stream {stream} does not exist")]
    UnknownMatchNode { stream: StreamIndex, index: usize },

    #[error("Stream {stream} received a match reference for stream {actual}")]
    MatchStreamMismatch {
        stream: StreamIndex,
        actual: StreamIndex,
    },

    #[error("Result for stream {stream} names an event missing from match node {index}")]
    ForeignEvent { stream: StreamIndex, index: usize },

    #[error("Match node {index} of stream {stream} has no parent link")]
    MissingParentLink { stream: StreamIndex, index: usize },

    #[error("Match node {index} of root stream {stream} links to a parent")]
    UnexpectedParentLink { stream: StreamIndex, index: usize },

    #[error("Match node of stream {stream} links to stream {actual}, expected parent stream {expected}")]
    ParentStreamMismatch {
        stream: StreamIndex,
        expected: StreamIndex,
        actual: StreamIndex,
    },

    #[error("Stream {stream} received a result from stream {from}, which is not one of its children")]
    UnexpectedChildResult {
        stream: StreamIndex,
        from: StreamIndex,
    },
}

pub type AssemblyResult<T> = Result<T, AssemblyError>;
