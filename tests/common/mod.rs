//! Shared fixtures: PDF documents built with lopdf and a scriptable engine.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use pdfstr::{DocumentHandle, Error, PageHandle, PdfEngine, Result, Source, TextRun};

/// Builds small PDFs page by page.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<Object>,
    compress: bool,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        Self {
            doc,
            pages_id,
            font_id,
            kids: Vec::new(),
            compress: false,
        }
    }

    fn font_resources(&self) -> Dictionary {
        dictionary! {
            "Font" => dictionary! { "F1" => self.font_id },
        }
    }

    fn add_page(&mut self, mut page: Dictionary) {
        page.set("Type", "Page");
        page.set("Parent", self.pages_id);
        page.set("MediaBox", media_box());
        let page_id = self.doc.add_object(page);
        self.kids.push(Object::Reference(page_id));
    }

    /// A page showing each run with its own `Tj`.
    pub fn page(mut self, runs: &[&str]) -> Self {
        let content = show_runs(runs, &[]);
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let page = dictionary! {
            "Contents" => content_id,
            "Resources" => self.font_resources(),
        };
        self.add_page(page);
        self
    }

    /// A page whose content is split over an array of streams.
    pub fn page_split(mut self, first: &[&str], second: &[&str]) -> Self {
        let first_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, show_runs(first, &[])));
        let second_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, show_runs(second, &[])));
        let page = dictionary! {
            "Contents" => vec![Object::Reference(first_id), Object::Reference(second_id)],
            "Resources" => self.font_resources(),
        };
        self.add_page(page);
        self
    }

    /// A page with no `/Contents` entry at all.
    pub fn blank_page(mut self) -> Self {
        self.add_page(dictionary! {});
        self
    }

    /// A page showing `runs`, then painting a form XObject that shows `form_runs`.
    pub fn page_with_form(mut self, runs: &[&str], form_runs: &[&str]) -> Self {
        let form_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => media_box(),
                "Resources" => self.font_resources(),
            },
            show_runs(form_runs, &[]),
        ));
        let paint = [Operation::new("Do", vec!["Fm1".into()])];
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, show_runs(runs, &paint)));
        let page = dictionary! {
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => self.font_id },
                "XObject" => dictionary! { "Fm1" => form_id },
            },
        };
        self.add_page(page);
        self
    }

    /// A page with raw content bytes.
    pub fn page_raw(mut self, content: &[u8]) -> Self {
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page = dictionary! {
            "Contents" => content_id,
            "Resources" => self.font_resources(),
        };
        self.add_page(page);
        self
    }

    /// A page whose `/Contents` is not a stream.
    pub fn page_bad_contents(mut self) -> Self {
        let page = dictionary! {
            "Contents" => 42,
            "Resources" => self.font_resources(),
        };
        self.add_page(page);
        self
    }

    /// A page tree kid pointing at an object that does not exist.
    pub fn dangling_page(mut self) -> Self {
        self.kids.push(Object::Reference((999, 0)));
        self
    }

    /// Flate-compress all streams on save.
    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        if self.compress {
            self.doc.compress();
        }

        let mut buf = Vec::new();
        self.doc.save_to(&mut buf).expect("save pdf");
        buf
    }
}

fn media_box() -> Vec<Object> {
    vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(612),
        Object::Integer(792),
    ]
}

/// Content stream: one `Tj` per run inside a text object, then `trailing` ops.
fn show_runs(runs: &[&str], trailing: &[Operation]) -> Vec<u8> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![72.into(), 720.into()]),
    ];
    for run in runs {
        operations.push(Operation::new("Tj", vec![Object::string_literal(*run)]));
        operations.push(Operation::new("Td", vec![0.into(), (-14).into()]));
    }
    operations.push(Operation::new("ET", vec![]));
    operations.extend(trailing.iter().cloned());

    Content { operations }.encode().expect("encode content")
}

/// One page per entry, each run shown with its own `Tj`.
pub fn build_pdf(pages: &[&[&str]]) -> Vec<u8> {
    pages
        .iter()
        .fold(PdfBuilder::new(), |builder, runs| builder.page(runs))
        .build()
}

pub fn to_strings(pages: &[&[&str]]) -> Vec<Vec<String>> {
    pages
        .iter()
        .map(|runs| runs.iter().map(|s| s.to_string()).collect())
        .collect()
}

// ---------------------------------------------------------------------------
// ScriptedEngine — engine whose pages, delays and failures are set by the test
// ---------------------------------------------------------------------------

/// Behaviour of one scripted page.
#[derive(Debug, Clone)]
pub enum ScriptedPage {
    /// Report these runs after sleeping.
    Runs(Vec<&'static str>, Duration),
    /// Fail while reading text runs.
    BrokenContent,
    /// Fail while reading text runs, after sleeping.
    SlowBroken(Duration),
    /// Fail while fetching the page.
    Missing,
}

impl ScriptedPage {
    pub fn runs(runs: &[&'static str]) -> Self {
        ScriptedPage::Runs(runs.to_vec(), Duration::ZERO)
    }

    pub fn slow(runs: &[&'static str], millis: u64) -> Self {
        ScriptedPage::Runs(runs.to_vec(), Duration::from_millis(millis))
    }
}

/// Opens `Source::Bytes(b"scripted")` into the configured pages.
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    pages: Arc<Vec<ScriptedPage>>,
    page_fetches: Arc<AtomicUsize>,
}

pub const SCRIPTED_SOURCE: &[u8] = b"scripted";

impl ScriptedEngine {
    pub fn new(pages: Vec<ScriptedPage>) -> Self {
        Self {
            pages: Arc::new(pages),
            page_fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn page_fetches(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
    }
}

impl PdfEngine for ScriptedEngine {
    type Document = ScriptedDocument;

    fn open(&self, source: &Source) -> Result<ScriptedDocument> {
        match source {
            Source::Bytes(data) if data.as_slice() == SCRIPTED_SOURCE => Ok(ScriptedDocument {
                pages: Arc::clone(&self.pages),
                page_fetches: Arc::clone(&self.page_fetches),
            }),
            other => Err(Error::DocumentOpen(format!("cannot open {:?}", other))),
        }
    }
}

pub struct ScriptedDocument {
    pages: Arc<Vec<ScriptedPage>>,
    page_fetches: Arc<AtomicUsize>,
}

impl DocumentHandle for ScriptedDocument {
    type Page = ScriptedPageHandle;

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page(&self, index: u32) -> Result<ScriptedPageHandle> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(index as usize - 1) {
            Some(ScriptedPage::Missing) | None => Err(Error::page_access(index, "missing page")),
            Some(page) => Ok(ScriptedPageHandle {
                index,
                page: page.clone(),
            }),
        }
    }
}

pub struct ScriptedPageHandle {
    index: u32,
    page: ScriptedPage,
}

impl PageHandle for ScriptedPageHandle {
    fn text_runs(&self) -> Result<Vec<TextRun>> {
        match &self.page {
            ScriptedPage::Runs(runs, delay) => {
                std::thread::sleep(*delay);
                Ok(runs.iter().map(|r| TextRun::plain(*r)).collect())
            }
            ScriptedPage::SlowBroken(delay) => {
                std::thread::sleep(*delay);
                Err(Error::page_access(self.index, "broken content stream"))
            }
            _ => Err(Error::page_access(self.index, "broken content stream")),
        }
    }
}
