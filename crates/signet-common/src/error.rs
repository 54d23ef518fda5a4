use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignetError {
    #[error("Shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: String,
        expected: String,
        got: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error in {path} (line {line}): {reason}")]
    Parse {
        path: String,
        line: u64,
        reason: String,
    },

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SignetError {
    /// Build a [`SignetError::ShapeMismatch`] from anything printable.
    pub fn shape(
        what: impl Into<String>,
        expected: impl std::fmt::Debug,
        got: impl std::fmt::Debug,
    ) -> Self {
        SignetError::ShapeMismatch {
            what: what.into(),
            expected: format!("{expected:?}"),
            got: format!("{got:?}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, SignetError>;
