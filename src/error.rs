use thiserror::Error;

/// Engine-level failures. Any of these stops the job.
#[derive(Debug, Error)]
pub enum MrError {
    #[error("pipeline has no steps")]
    EmptyPipeline,

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// The two sides of a join disagree on how many elements they contribute,
    /// which means the operands' dimensions do not match.
    #[error("join for key {key} has {left} left and {right} right contributions")]
    JoinLengthMismatch {
        key: String,
        left: usize,
        right: usize,
    },

    #[error("join for key {key} pairs left index {left} with right index {right}")]
    JoinIndexMismatch {
        key: String,
        left: usize,
        right: usize,
    },

    #[error("task panicked on worker {worker}")]
    WorkerPanicked { worker: String },

    #[error("worker pool is closed")]
    PoolClosed,

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

/// A record that could not be turned into key/value pairs.
/// Mappers return it; the engine drops the record and counts it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed record: {reason}")]
pub struct MalformedRecord {
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
