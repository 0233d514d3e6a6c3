use std::fmt;

/// Error taxonomy surfaced by the combiner. All variants propagate
/// immediately to the caller; nothing here is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum CombineError {
    #[error("{0}")]
    Config(String),

    #[error("Combiner have no images.")]
    EmptyStack,

    #[error("frame {index} shape incompatible: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("frame {index} unit incompatible: expected {expected:?}, got {got:?}")]
    UnitMismatch {
        index: usize,
        expected: String,
        got: String,
    },

    #[error("{0} is not a valid combining method.")]
    InvalidMethod(String),

    #[error("disk cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CombineError {
    pub fn config<M: fmt::Display>(msg: M) -> Self {
        CombineError::Config(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CombineError>;
