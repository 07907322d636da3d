//! PDF engine abstraction layer.
//!
//! The extractor never touches PDF objects. It talks to an engine through
//! three traits: an engine opens a [`Source`] into a document handle, the
//! document hands out pages by 1-based index, and a page reports its text
//! runs in content-stream order.

mod content;
mod tokenizer;
mod lopdf_engine;

pub use lopdf_engine::{LopdfDocument, LopdfEngine, LopdfPage, DEFAULT_RANGE_CHUNK_SIZE};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::source::Source;

/// A text fragment reported by the engine for one page.
///
/// Only `text` is used by the extractor; the rest is engine metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// The decoded text
    pub text: String,
    /// Font resource or base font name
    pub font_name: String,
    /// Effective font size in points
    pub font_size: f32,
    /// X position in text space
    pub x: f32,
    /// Y position in text space
    pub y: f32,
}

impl TextRun {
    /// Create a run with no position or font information.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_name: String::new(),
            font_size: 0.0,
            x: 0.0,
            y: 0.0,
        }
    }
}

/// Opens sources into document handles.
///
/// Engines are stateless; one instance can serve any number of calls.
pub trait PdfEngine: Send + Sync {
    /// Decoded document type.
    type Document: DocumentHandle;

    /// Open and parse a source.
    fn open(&self, source: &Source) -> Result<Self::Document>;
}

/// A decoded document, shared read-only by page tasks.
pub trait DocumentHandle: Send + Sync {
    /// Page type.
    type Page: PageHandle;

    /// Number of pages in the document.
    fn page_count(&self) -> u32;

    /// Fetch a page by 1-based index.
    fn page(&self, index: u32) -> Result<Self::Page>;
}

/// A single page.
pub trait PageHandle: Send {
    /// Text runs in content-stream order.
    fn text_runs(&self) -> Result<Vec<TextRun>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_run_plain() {
        let run = TextRun::plain("Hello");
        assert_eq!(run.text, "Hello");
        assert!(run.font_name.is_empty());
        assert_eq!(run.font_size, 0.0);
    }
}
