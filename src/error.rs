//! Error types for pdfstr.

use thiserror::Error;

/// Result type alias for pdfstr operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while extracting text.
#[derive(Error, Debug)]
pub enum Error {
    /// The source could not be opened or parsed as a PDF document.
    #[error("Failed to open document: {0}")]
    DocumentOpen(String),

    /// A page could not be loaded or its content could not be interpreted.
    #[error("Failed to access page {page}: {reason}")]
    PageAccess { page: u32, reason: String },

    /// The source is unusable as given (empty path, empty buffer, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A background page task panicked or was cancelled.
    #[error("Extraction task failed: {0}")]
    Task(String),
}

impl Error {
    /// Build a [`Error::PageAccess`] for `page`.
    pub fn page_access(page: u32, reason: impl ToString) -> Self {
        Error::PageAccess {
            page,
            reason: reason.to_string(),
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::Decryption(_) => {
                Error::DocumentOpen("document is encrypted".to_string())
            }
            _ => Error::DocumentOpen(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::page_access(3, "missing Contents stream");
        assert_eq!(
            err.to_string(),
            "Failed to access page 3: missing Contents stream"
        );

        let err = Error::InvalidArgument("empty byte buffer".into());
        assert_eq!(err.to_string(), "Invalid argument: empty byte buffer");
    }

    #[test]
    fn test_lopdf_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let err: Error = lopdf::Error::IO(io_err).into();
        assert!(matches!(err, Error::DocumentOpen(_)));
    }
}
