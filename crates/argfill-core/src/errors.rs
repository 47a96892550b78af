//! Error types for the argfill core library.

#[cfg(feature = "python")]
use pyo3::exceptions::{PyIOError, PyLookupError, PyRuntimeError, PyValueError};
#[cfg(feature = "python")]
use pyo3::PyErr;

/// Top-level error enum for the argfill core library.
///
/// Conditions the engine recovers from on its own (unresolvable callees,
/// unknown types, exhausted depth) are never reported through this type.
#[derive(Debug, thiserror::Error)]
pub enum ArgfillError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown file: {0}")]
    UnknownFile(String),

    #[error("No call expression at {path}:{offset}")]
    NoCallAt { path: String, offset: usize },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Edit rejected: {0}")]
    Mutation(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "python")]
impl From<ArgfillError> for PyErr {
    fn from(err: ArgfillError) -> PyErr {
        match &err {
            ArgfillError::Parse(_) | ArgfillError::Config(_) | ArgfillError::Json(_) => {
                PyValueError::new_err(err.to_string())
            }
            ArgfillError::UnknownFile(_) | ArgfillError::NoCallAt { .. } => {
                PyLookupError::new_err(err.to_string())
            }
            ArgfillError::Cancelled | ArgfillError::Mutation(_) => {
                PyRuntimeError::new_err(err.to_string())
            }
            ArgfillError::Io(_) => PyIOError::new_err(err.to_string()),
        }
    }
}

pub type ArgfillResult<T> = Result<T, ArgfillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_call_message() {
        let err = ArgfillError::NoCallAt {
            path: "main.py".to_string(),
            offset: 12,
        };
        assert_eq!(err.to_string(), "No call expression at main.py:12");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ArgfillError = io.into();
        assert!(matches!(err, ArgfillError::Io(_)));
        assert!(err.to_string().starts_with("IO error"));
    }
}
