//! # pdfstr
//!
//! Extract the text of a PDF in three shapes: one string, one list of text
//! runs per page, or a flat list of runs.
//!
//! ## Quick Start
//!
//! ```no_run
//! fn main() -> pdfstr::Result<()> {
//!     // Runs joined with "\n", pages joined with "\n"
//!     let text = pdfstr::extract_string("document.pdf")?;
//!     println!("{}", text);
//!
//!     // One Vec<String> per page
//!     let pages = pdfstr::extract_pages("document.pdf")?;
//!     println!("{} pages", pages.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Sources
//!
//! Anything convertible into a [`Source`]: a path (`&str`, `String`,
//! `&Path`, `PathBuf`), a byte buffer (`Vec<u8>`, `&[u8]`), or a
//! [`RangeTransport`] that serves the document in byte ranges.
//!
//! ## Engines
//!
//! PDF decoding lives behind [`PdfEngine`]. The default [`LopdfEngine`] is
//! backed by `lopdf`; plug in another with [`Extractor::with_engine`].
//!
//! ## Features
//!
//! - `async` (default): [`nonblocking`] API on tokio.

pub mod detect;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod options;
pub mod source;

#[cfg(feature = "async")]
pub mod nonblocking;

// Re-export commonly used types
pub use engine::{
    DocumentHandle, LopdfDocument, LopdfEngine, LopdfPage, PageHandle, PdfEngine, TextRun,
    DEFAULT_RANGE_CHUNK_SIZE,
};
pub use error::{Error, Result};
pub use extractor::{flatten_pages, join_pages, Extractor};
pub use options::{ExtractOptions, DEFAULT_SEPARATOR};
pub use source::{FileTransport, RangeTransport, Source};

#[cfg(feature = "async")]
pub use nonblocking::AsyncExtractor;

/// Extract all text as one string, runs and pages separated by newlines.
///
/// # Example
///
/// ```no_run
/// let text = pdfstr::extract_string("document.pdf").unwrap();
/// ```
pub fn extract_string(source: impl Into<Source>) -> Result<String> {
    Extractor::new().extract_string(source)
}

/// Extract all text as one string with custom separators.
///
/// # Arguments
///
/// * `source` - Path, bytes, or range transport
/// * `run_join` - Inserted between runs of the same page
/// * `page_join` - Inserted between pages
///
/// # Example
///
/// ```no_run
/// let data = std::fs::read("document.pdf").unwrap();
/// let text = pdfstr::extract_string_with(data, " ", "\n\n").unwrap();
/// ```
pub fn extract_string_with(
    source: impl Into<Source>,
    run_join: &str,
    page_join: &str,
) -> Result<String> {
    Extractor::new().extract_string_with(source, run_join, page_join)
}

/// Extract text runs per page.
///
/// Returns one entry per page in document order; pages without text give
/// an empty list.
pub fn extract_pages(source: impl Into<Source>) -> Result<Vec<Vec<String>>> {
    Extractor::new().extract_pages(source)
}

/// Extract text runs of all pages as one list, in page order.
pub fn extract_flat(source: impl Into<Source>) -> Result<Vec<String>> {
    Extractor::new().extract_flat(source)
}
