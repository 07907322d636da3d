//! Async extractor on tokio.
//!
//! Opening and page decoding are CPU work, so they run on the blocking pool.
//! Every page is its own task in a [`JoinSet`]; results are slotted by page
//! index as they complete. When pages fail, the lowest failing page is
//! reported, as with the blocking extractor.

use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};

use crate::engine::{DocumentHandle, LopdfEngine, PdfEngine};
use crate::error::{Error, Result};
use crate::extractor::{assemble, flatten_pages, join_pages, page_texts};
use crate::options::ExtractOptions;
use crate::source::Source;

fn task_error(err: JoinError) -> Error {
    Error::Task(err.to_string())
}

/// Async counterpart of [`Extractor`](crate::Extractor).
///
/// # Example
///
/// ```no_run
/// use pdfstr::nonblocking::AsyncExtractor;
///
/// # async fn run() -> pdfstr::Result<()> {
/// let extractor = AsyncExtractor::new();
/// let pages = extractor.extract_pages("document.pdf").await?;
/// println!("{} pages", pages.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AsyncExtractor<E = LopdfEngine> {
    engine: Arc<E>,
    options: ExtractOptions,
}

impl<E> Clone for AsyncExtractor<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            options: self.options.clone(),
        }
    }
}

impl AsyncExtractor<LopdfEngine> {
    /// Create an extractor backed by [`LopdfEngine`].
    pub fn new() -> Self {
        Self::with_engine(LopdfEngine::new())
    }
}

impl Default for AsyncExtractor<LopdfEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> AsyncExtractor<E>
where
    E: PdfEngine + 'static,
    E::Document: 'static,
{
    /// Create an extractor with a custom engine.
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
            options: ExtractOptions::default(),
        }
    }

    /// Replace the options.
    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Current options.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Text runs of every page, in page order.
    pub async fn extract_pages(&self, source: impl Into<Source>) -> Result<Vec<Vec<String>>> {
        let source = source.into();
        let kind = source.kind();

        let engine = Arc::clone(&self.engine);
        let doc = tokio::task::spawn_blocking(move || engine.open(&source))
            .await
            .map_err(task_error)??;
        let doc = Arc::new(doc);
        let count = doc.page_count();

        let mut tasks = JoinSet::new();
        for index in 1..=count {
            let doc = Arc::clone(&doc);
            tasks.spawn_blocking(move || (index, page_texts(doc.as_ref(), index)));
        }

        let mut results = Vec::with_capacity(count as usize);
        while let Some(joined) = tasks.join_next().await {
            results.push(joined.map_err(task_error)?);
        }
        let pages = assemble(count, results)?;

        log::debug!("extracted {} pages from {} source", pages.len(), kind);
        Ok(pages)
    }

    /// All runs of all pages as one list, page order then run order.
    pub async fn extract_flat(&self, source: impl Into<Source>) -> Result<Vec<String>> {
        self.extract_pages(source).await.map(flatten_pages)
    }

    /// All text as one string, joined with the configured separators.
    pub async fn extract_string(&self, source: impl Into<Source>) -> Result<String> {
        let pages = self.extract_pages(source).await?;
        Ok(join_pages(
            &pages,
            &self.options.run_separator,
            &self.options.page_separator,
        ))
    }

    /// All text as one string, joined with the given separators.
    pub async fn extract_string_with(
        &self,
        source: impl Into<Source>,
        run_join: &str,
        page_join: &str,
    ) -> Result<String> {
        let pages = self.extract_pages(source).await?;
        Ok(join_pages(&pages, run_join, page_join))
    }
}

/// Extract all text as one string, runs and pages separated by newlines.
pub async fn extract_string(source: impl Into<Source>) -> Result<String> {
    AsyncExtractor::new().extract_string(source).await
}

/// Extract all text as one string with custom separators.
pub async fn extract_string_with(
    source: impl Into<Source>,
    run_join: &str,
    page_join: &str,
) -> Result<String> {
    AsyncExtractor::new()
        .extract_string_with(source, run_join, page_join)
        .await
}

/// Extract text runs per page.
pub async fn extract_pages(source: impl Into<Source>) -> Result<Vec<Vec<String>>> {
    AsyncExtractor::new().extract_pages(source).await
}

/// Extract text runs of all pages as one list.
pub async fn extract_flat(source: impl Into<Source>) -> Result<Vec<String>> {
    AsyncExtractor::new().extract_flat(source).await
}
