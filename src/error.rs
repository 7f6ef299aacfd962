//! Error types for the lob_research library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse an input file
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// CSV reading or writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration could not be read
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration could not be written
    #[error("Cannot serialize configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Insufficient data for analysis
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Array shapes do not line up
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    /// ndarray could not build the requested shape
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Tensor data could not be read back
    #[error("Tensor error: {0}")]
    Tensor(String),

    /// Order id not present in the book
    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    /// The matching engine or a client saw a message it cannot accept
    #[error("Order book protocol violation: {0}")]
    Protocol(String),
}

impl Error {
    /// Build a parse error for the given 1-based line
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message() {
        let err = Error::parse(7, "expected 6 columns, found 5");
        assert_eq!(
            err.to_string(),
            "Parse error at line 7: expected 6 columns, found 5"
        );
    }

    #[test]
    fn test_shape_error_converts() {
        let err: Error = ndarray::Array2::<f64>::from_shape_vec((2, 2), vec![1.0])
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Shape(_)));
    }
}
