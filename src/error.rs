//! Error types for the conversion pipeline

use std::fmt;

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Main error type for conversion operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// A non-header line that is not a valid CIDR literal
    InvalidCidr {
        /// 1-based line number in the source
        line_number: usize,
        /// The offending (trimmed) line
        line: String,
        /// Why it was rejected
        reason: String,
    },

    /// The database writer refused a network
    Insert(String),

    /// I/O errors
    Io(String),

    /// Writer construction or serialization errors
    Writer(String),

    /// Record catalog construction errors
    Catalog(String),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::InvalidCidr {
                line_number,
                line,
                reason,
            } => write!(f, "invalid CIDR {} on line {}: {}", line, line_number, reason),
            ConvertError::Insert(msg) => write!(f, "insert failed: {}", msg),
            ConvertError::Io(msg) => write!(f, "I/O error: {}", msg),
            ConvertError::Writer(msg) => write!(f, "writer error: {}", msg),
            ConvertError::Catalog(msg) => write!(f, "catalog error: {}", msg),
        }
    }
}

impl std::error::Error for ConvertError {}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::Io(err.to_string())
    }
}
