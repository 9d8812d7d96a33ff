// registry error types.

use thiserror::Error;


// ==== base error types ====


/// Error for waiting on a request handle which has already been waited on or deleted
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("repetition call of wait_answer")]
pub struct RepetitionCallError;

/// Error for a wait whose timeout elapsed before any answer was committed
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("deadline exceeded")]
pub struct DeadlineExceededError;

/// Error for constructing a registry with a shard count that is not a power of two
///
/// Raised at construction time only. No registry is constructed when this is returned.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("shard count must be a power of two no greater than 65536, got {shard_count}")]
pub struct InvalidShardCountError {
    /// The rejected shard count
    pub shard_count: usize,
}


// ==== compound error types ====


/// Error for waiting on the answer to a request
///
/// `E` is the producer's error type, which is passed through verbatim.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum WaitError<E> {
    /// The request handle was already waited on or deleted
    #[error(transparent)]
    RepetitionCall(#[from] RepetitionCallError),
    /// The timeout elapsed before an answer arrived
    #[error(transparent)]
    DeadlineExceeded(#[from] DeadlineExceededError),
    /// The producer answered with an error
    #[error("answered with error: {0}")]
    Answered(E),
}

impl<E> WaitError<E> {
    /// Whether this is [`WaitError::RepetitionCall`]
    pub fn is_repetition_call(&self) -> bool {
        matches!(self, WaitError::RepetitionCall(_))
    }

    /// Whether this is [`WaitError::DeadlineExceeded`]
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, WaitError::DeadlineExceeded(_))
    }

    /// If the producer answered with an error, take it
    pub fn into_answered(self) -> Option<E> {
        match self {
            WaitError::Answered(e) => Some(e),
            _ => None,
        }
    }
}
