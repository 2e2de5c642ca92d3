use std::{fmt, io};

/// The result type used across the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// All errors the training engine can report.
#[derive(Debug)]
pub enum EngineError {
    /// A run or a normalization was requested over zero samples.
    EmptyDataset,
    /// Every labeled sample belongs to the same class.
    SingleClass,
    /// A classification run found a sample without a class label.
    UnlabeledSample { index: usize },
    /// A length invariant was violated (e.g. coefficients vs. row width).
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// A setting is outside of its domain.
    InvalidInput(&'static str),
    /// A scene file could not be interpreted.
    Config(String),
    /// An underlying I/O error.
    Io(io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDataset => write!(f, "the dataset has no samples"),
            Self::SingleClass => write!(f, "all samples belong to a single class"),
            Self::UnlabeledSample { index } => write!(f, "sample {index} has no class label"),
            Self::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "shape mismatch for {what}: got {got}, expected {expected}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::Config(msg) => write!(f, "invalid config: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Fails with `ShapeMismatch` unless `got == expected`.
pub(crate) fn ensure_len(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(EngineError::ShapeMismatch {
            what,
            got,
            expected,
        });
    }

    Ok(())
}
