//! Join tree configuration errors

use thiserror::Error;

use crate::tree::StreamIndex;

/// A malformed join tree, reported when the statement is compiled.
///
/// These never reach the assembly engine: a tree that fails validation is
/// never handed to a driver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinTreeError {
    #[error("Join tree has no streams")]
    EmptyTree,

    #[error("Stream {stream} is out of range for a join of {num_streams} streams")]
    StreamOutOfRange {
        stream: StreamIndex,
        num_streams: usize,
    },

    #[error("Stream {0} is declared more than once")]
    DuplicateStream(StreamIndex),

    #[error("Stream {0} is never declared")]
    UndeclaredStream(StreamIndex),

    #[error("Join tree has no root stream")]
    NoRoot,

    #[error("Join tree has more than one root: streams {first} and {second}")]
    MultipleRoots {
        first: StreamIndex,
        second: StreamIndex,
    },

    #[error("Stream {stream} names unknown parent stream {parent}")]
    UnknownParent {
        stream: StreamIndex,
        parent: StreamIndex,
    },

    #[error("Stream {0} is part of a cycle and cannot be reached from the root")]
    Cycle(StreamIndex),

    #[error("Root stream {0} cannot be optional")]
    OptionalRoot(StreamIndex),

    #[error("Unknown stream name '{0}'")]
    UnknownStreamName(String),

    #[error("Stream name '{0}' is declared more than once")]
    DuplicateStreamName(String),
}

pub type JoinTreeResult<T> = Result<T, JoinTreeError>;
