//! Blocking extractor.
//!
//! Pages are fanned out onto the rayon pool and joined back in page order:
//! each task sends `(index, result)` over a channel and the receiver drops it
//! into a fixed slot, so completion order never leaks into the output.

use crossbeam_channel::unbounded;

use crate::engine::{DocumentHandle, LopdfEngine, PageHandle, PdfEngine};
use crate::error::{Error, Result};
use crate::options::ExtractOptions;
use crate::source::Source;

/// Join each page's runs with `run_join`, then the pages with `page_join`.
///
/// A page without runs contributes an empty string but keeps its slot.
///
/// # Example
///
/// ```
/// use pdfstr::join_pages;
///
/// let pages = vec![vec!["A".to_string()], vec![]];
/// assert_eq!(join_pages(&pages, "-", "|"), "A|");
/// ```
pub fn join_pages(pages: &[Vec<String>], run_join: &str, page_join: &str) -> String {
    pages
        .iter()
        .map(|runs| runs.join(run_join))
        .collect::<Vec<_>>()
        .join(page_join)
}

/// Concatenate per-page runs in page order.
pub fn flatten_pages(pages: Vec<Vec<String>>) -> Vec<String> {
    pages.into_iter().flatten().collect()
}

/// Fetch one page and keep only the text of its runs.
pub(crate) fn page_texts<D: DocumentHandle>(doc: &D, index: u32) -> Result<Vec<String>> {
    let runs = doc.page(index)?.text_runs()?;
    Ok(runs.into_iter().map(|run| run.text).collect())
}

/// Place `(index, result)` pairs into page order.
///
/// Every slot must be filled; the error of the lowest failing page wins.
pub(crate) fn assemble<I>(count: u32, results: I) -> Result<Vec<Vec<String>>>
where
    I: IntoIterator<Item = (u32, Result<Vec<String>>)>,
{
    let mut slots: Vec<Option<Vec<String>>> = vec![None; count as usize];
    let mut failure: Option<(u32, Error)> = None;

    for (index, result) in results {
        match result {
            Ok(texts) => {
                if let Some(slot) = index.checked_sub(1).and_then(|i| slots.get_mut(i as usize)) {
                    *slot = Some(texts);
                }
            }
            Err(err) => {
                if failure.as_ref().map_or(true, |(page, _)| index < *page) {
                    failure = Some((index, err));
                }
            }
        }
    }

    if let Some((_, err)) = failure {
        return Err(err);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            let page = i as u32 + 1;
            slot.ok_or_else(|| Error::page_access(page, "page produced no result"))
        })
        .collect()
}

fn collect_sequential<D: DocumentHandle>(doc: &D) -> Result<Vec<Vec<String>>> {
    (1..=doc.page_count())
        .map(|index| page_texts(doc, index))
        .collect()
}

fn collect_parallel<D: DocumentHandle>(doc: &D) -> Result<Vec<Vec<String>>> {
    let count = doc.page_count();
    let (tx, rx) = unbounded();

    rayon::scope(|scope| {
        for index in 1..=count {
            let tx = tx.clone();
            scope.spawn(move |_| {
                // The receiver outlives the scope, so sending cannot fail.
                let _ = tx.send((index, page_texts(doc, index)));
            });
        }
    });
    drop(tx);

    assemble(count, rx.into_iter())
}

/// Extracts text from PDF sources through a [`PdfEngine`].
///
/// # Example
///
/// ```no_run
/// use pdfstr::{ExtractOptions, Extractor};
///
/// let extractor = Extractor::new().with_options(ExtractOptions::new().with_separators(" ", "\n\n"));
/// let text = extractor.extract_string("document.pdf")?;
/// # Ok::<(), pdfstr::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Extractor<E = LopdfEngine> {
    engine: E,
    options: ExtractOptions,
}

impl Extractor<LopdfEngine> {
    /// Create an extractor backed by [`LopdfEngine`].
    pub fn new() -> Self {
        Self::with_engine(LopdfEngine::new())
    }
}

impl Default for Extractor<LopdfEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: PdfEngine> Extractor<E> {
    /// Create an extractor with a custom engine.
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine,
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

    /// The engine in use.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Text runs of every page, in page order.
    ///
    /// The result has one entry per page, empty for pages without text.
    ///
    /// # Errors
    ///
    /// [`Error::DocumentOpen`] or [`Error::InvalidArgument`] if the source
    /// cannot be opened, [`Error::PageAccess`] if any page fails.
    pub fn extract_pages(&self, source: impl Into<Source>) -> Result<Vec<Vec<String>>> {
        let source = source.into();
        let doc = self.engine.open(&source)?;
        let count = doc.page_count();

        let pages = if self.options.parallel && count > 1 {
            collect_parallel(&doc)?
        } else {
            collect_sequential(&doc)?
        };

        log::debug!("extracted {} pages from {} source", pages.len(), source.kind());
        Ok(pages)
    }

    /// All runs of all pages as one list, page order then run order.
    pub fn extract_flat(&self, source: impl Into<Source>) -> Result<Vec<String>> {
        self.extract_pages(source).map(flatten_pages)
    }

    /// All text as one string, joined with the configured separators.
    pub fn extract_string(&self, source: impl Into<Source>) -> Result<String> {
        self.extract_string_with(
            source,
            &self.options.run_separator,
            &self.options.page_separator,
        )
    }

    /// All text as one string, joined with the given separators.
    pub fn extract_string_with(
        &self,
        source: impl Into<Source>,
        run_join: &str,
        page_join: &str,
    ) -> Result<String> {
        let pages = self.extract_pages(source)?;
        Ok(join_pages(&pages, run_join, page_join))
    }
}
