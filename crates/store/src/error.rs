//! Error types for state-store providers.

use std::io;

use snafu::Snafu;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in a state-store provider.
#[derive(Debug, Snafu)]
pub enum Error {
    /// I/O error from the underlying storage backend.
    #[snafu(display("I/O error: {source}"))]
    Io {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Provider-specific failure.
    #[snafu(display("Storage backend error: {reason}"))]
    Backend {
        /// Description of the failure.
        reason: String,
    },
}

// Provide automatic conversion from io::Error for ergonomic ? usage
impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Io { source }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(format!("{err}").starts_with("I/O error:"));
    }

    #[test]
    fn test_error_display_backend() {
        let err = Error::Backend { reason: "lease expired".to_string() };
        assert_eq!(format!("{err}"), "Storage backend error: lease expired");
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error as StdError;

        let err = Error::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(err.source().is_some(), "Error::Io should have a source");
    }
}
