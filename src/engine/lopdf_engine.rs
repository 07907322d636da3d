//! Engine backed by `lopdf`.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::content::{resolve_dict, stream_bytes, FontMap, RunCollector};
use super::{DocumentHandle, PageHandle, PdfEngine, TextRun};
use crate::detect::detect_header;
use crate::error::{Error, Result};
use crate::source::{RangeTransport, Source};

/// Bytes requested per call when reading a range transport.
pub const DEFAULT_RANGE_CHUNK_SIZE: usize = 65536;

/// Page tree nodes deeper than this are treated as corrupt.
const MAX_TREE_DEPTH: usize = 32;

/// A leaf of the page tree, or why it could not be resolved.
type PageSlot = std::result::Result<ObjectId, String>;

/// [`PdfEngine`] that loads documents fully into a `lopdf::Document`.
#[derive(Debug, Clone)]
pub struct LopdfEngine {
    range_chunk_size: usize,
}

impl LopdfEngine {
    /// Create an engine with default settings.
    pub fn new() -> Self {
        Self {
            range_chunk_size: DEFAULT_RANGE_CHUNK_SIZE,
        }
    }

    /// Set the chunk size used for range transports (minimum 1 byte).
    pub fn with_range_chunk_size(mut self, size: usize) -> Self {
        self.range_chunk_size = size.max(1);
        self
    }

    /// Chunk size used for range transports.
    pub fn range_chunk_size(&self) -> usize {
        self.range_chunk_size
    }

    /// Load a document from an in-memory byte slice.
    pub fn load_bytes(&self, data: &[u8]) -> Result<LopdfDocument> {
        if data.is_empty() {
            return Err(Error::InvalidArgument("empty byte buffer".to_string()));
        }
        detect_header(data)?;

        let doc = Document::load_mem(data)?;
        let pages = page_slots(&doc)?;

        Ok(LopdfDocument {
            doc: Arc::new(doc),
            pages,
        })
    }

    fn read_source<'s>(&self, source: &'s Source) -> Result<Cow<'s, [u8]>> {
        match source {
            Source::Path(path) => {
                if path.as_os_str().is_empty() {
                    return Err(Error::InvalidArgument("empty path".to_string()));
                }
                let data = std::fs::read(path)
                    .map_err(|e| Error::DocumentOpen(format!("{}: {}", path.display(), e)))?;
                Ok(Cow::Owned(data))
            }
            Source::Bytes(data) => Ok(Cow::Borrowed(data.as_slice())),
            Source::Range(transport) => {
                read_transport(transport.as_ref(), self.range_chunk_size).map(Cow::Owned)
            }
        }
    }
}

impl Default for LopdfEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfEngine for LopdfEngine {
    type Document = LopdfDocument;

    fn open(&self, source: &Source) -> Result<LopdfDocument> {
        let data = self.read_source(source)?;
        let document = self.load_bytes(&data)?;
        log::debug!(
            "opened {} source: PDF {}, {} pages",
            source.kind(),
            document.version(),
            document.page_count()
        );
        Ok(document)
    }
}

/// Pull a whole document through a range transport.
fn read_transport(transport: &dyn RangeTransport, chunk_size: usize) -> Result<Vec<u8>> {
    let length = transport.length();
    if length == 0 {
        return Err(Error::InvalidArgument(
            "range transport reports zero length".to_string(),
        ));
    }
    let capacity = usize::try_from(length).map_err(|_| {
        Error::InvalidArgument(format!("range transport length {} is too large", length))
    })?;

    let initial = transport.initial_data();
    if initial.len() > capacity {
        return Err(Error::DocumentOpen(format!(
            "initial data ({} bytes) exceeds document length ({} bytes)",
            initial.len(),
            length
        )));
    }

    let mut data = Vec::with_capacity(capacity);
    data.extend_from_slice(initial);

    let mut begin = initial.len() as u64;
    while begin < length {
        let end = begin.saturating_add(chunk_size as u64).min(length);
        let chunk = transport
            .read_range(begin, end)
            .map_err(|e| Error::DocumentOpen(format!("range {}..{}: {}", begin, end, e)))?;
        if chunk.len() as u64 != end - begin {
            return Err(Error::DocumentOpen(format!(
                "range {}..{}: expected {} bytes, got {}",
                begin,
                end,
                end - begin,
                chunk.len()
            )));
        }
        data.extend_from_slice(&chunk);
        begin = end;
    }

    log::trace!("read {} bytes through range transport", data.len());
    Ok(data)
}

/// Walk the page tree from the catalog, one slot per page in document order.
///
/// Kids that cannot be resolved keep their slot as an error. When the walk
/// hits such a kid, the root `/Count` decides how many slots there are, since
/// the lost kid may have been a subtree.
fn page_slots(doc: &Document) -> Result<Vec<PageSlot>> {
    let root = doc
        .catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| Error::DocumentOpen(format!("missing page tree: {}", e)))?;

    let mut slots = Vec::new();
    let mut visited = BTreeSet::new();
    walk_page_tree(doc, root, 0, &mut visited, &mut slots);

    if slots.iter().any(|slot| slot.is_err()) {
        let declared = doc
            .get_dictionary(root)
            .and_then(|node| node.get(b"Count"))
            .and_then(Object::as_i64)
            .unwrap_or(0);
        let declared = usize::try_from(declared).unwrap_or(0);
        if declared > slots.len() {
            log::debug!(
                "page tree lists {} pages, /Count declares {}",
                slots.len(),
                declared
            );
            slots.resize(declared, Err("page missing from page tree".to_string()));
        }
    }

    Ok(slots)
}

fn walk_page_tree(
    doc: &Document,
    id: ObjectId,
    depth: usize,
    visited: &mut BTreeSet<ObjectId>,
    slots: &mut Vec<PageSlot>,
) {
    if depth > MAX_TREE_DEPTH {
        slots.push(Err(format!("page tree deeper than {} levels", MAX_TREE_DEPTH)));
        return;
    }
    if !visited.insert(id) {
        slots.push(Err(format!("page tree cycle at object {} {}", id.0, id.1)));
        return;
    }

    let node = match doc.get_dictionary(id) {
        Ok(node) => node,
        Err(e) => {
            slots.push(Err(format!(
                "page tree node {} {} cannot be resolved: {}",
                id.0, id.1, e
            )));
            return;
        }
    };

    let is_tree_node = match node.get(b"Type").and_then(Object::as_name).ok() {
        Some(b"Pages") => true,
        Some(b"Page") => false,
        _ => node.has(b"Kids"),
    };
    if !is_tree_node {
        slots.push(Ok(id));
        return;
    }

    let kids = match node.get(b"Kids") {
        Err(_) => return,
        Ok(kids) => match kids.as_array() {
            Ok(kids) => kids,
            Err(_) => {
                slots.push(Err(format!("page tree node {} {} has invalid /Kids", id.0, id.1)));
                return;
            }
        },
    };

    for kid in kids {
        match kid.as_reference() {
            Ok(kid) => walk_page_tree(doc, kid, depth + 1, visited, slots),
            Err(_) => slots.push(Err("page tree kid is not a reference".to_string())),
        }
    }
}

/// A decoded document.
#[derive(Debug, Clone)]
pub struct LopdfDocument {
    doc: Arc<Document>,
    pages: Vec<PageSlot>,
}

impl LopdfDocument {
    /// PDF version string from the header.
    pub fn version(&self) -> String {
        self.doc.version.to_string()
    }
}

impl DocumentHandle for LopdfDocument {
    type Page = LopdfPage;

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page(&self, index: u32) -> Result<LopdfPage> {
        let slot = index
            .checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .ok_or_else(|| {
                Error::page_access(
                    index,
                    format!("out of range (document has {} pages)", self.pages.len()),
                )
            })?;
        let id = *slot
            .as_ref()
            .map_err(|reason| Error::page_access(index, reason))?;

        self.doc
            .get_dictionary(id)
            .map_err(|e| Error::page_access(index, e))?;

        Ok(LopdfPage {
            doc: Arc::clone(&self.doc),
            id,
            number: index,
        })
    }
}

/// A page of a [`LopdfDocument`].
#[derive(Debug, Clone)]
pub struct LopdfPage {
    doc: Arc<Document>,
    id: ObjectId,
    number: u32,
}

impl LopdfPage {
    /// 1-based page number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Raw (decompressed) content stream bytes for the page.
    fn content(&self) -> Result<Vec<u8>> {
        let page_dict = self
            .doc
            .get_dictionary(self.id)
            .map_err(|e| Error::page_access(self.number, e))?;

        let Ok(contents) = page_dict.get(b"Contents") else {
            return Ok(Vec::new());
        };

        match contents {
            Object::Reference(r) => match self.doc.get_object(*r) {
                Ok(Object::Stream(s)) => stream_bytes(s, self.number),
                Ok(Object::Array(arr)) => self.concat_streams(arr),
                _ => Err(Error::page_access(self.number, "invalid content stream")),
            },
            Object::Array(arr) => self.concat_streams(arr),
            Object::Stream(s) => stream_bytes(s, self.number),
            _ => Err(Error::page_access(self.number, "invalid content stream")),
        }
    }

    fn concat_streams(&self, parts: &[Object]) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        for obj in parts {
            let stream = obj
                .as_reference()
                .ok()
                .and_then(|r| self.doc.get_object(r).ok())
                .and_then(|o| o.as_stream().ok())
                .ok_or_else(|| Error::page_access(self.number, "invalid content stream part"))?;
            content.extend_from_slice(&stream_bytes(stream, self.number)?);
            content.push(b' ');
        }
        Ok(content)
    }

    /// XObject dictionary from the page's own or inherited resources.
    fn xobjects(&self) -> Option<&Dictionary> {
        let doc = self.doc.as_ref();
        let mut node = doc.get_dictionary(self.id).ok()?;
        for _ in 0..MAX_TREE_DEPTH {
            if let Ok(resources) = node.get(b"Resources") {
                return resolve_dict(doc, resources)?
                    .get(b"XObject")
                    .ok()
                    .and_then(|x| resolve_dict(doc, x));
            }
            let parent = node.get(b"Parent").and_then(|p| p.as_reference()).ok()?;
            node = doc.get_dictionary(parent).ok()?;
        }
        None
    }
}

impl PageHandle for LopdfPage {
    fn text_runs(&self) -> Result<Vec<TextRun>> {
        let content = self.content()?;
        if content.is_empty() {
            return Ok(Vec::new());
        }

        let fonts: FontMap<'_> = self
            .doc
            .get_page_fonts(self.id)
            .map_err(|e| Error::page_access(self.number, e))?;

        let runs =
            RunCollector::new(self.doc.as_ref(), self.number).collect(&content, &fonts, self.xobjects())?;
        log::trace!("page {}: {} text runs", self.number, runs.len());
        Ok(runs)
    }
}
