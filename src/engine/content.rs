//! Content stream interpretation.
//!
//! Walks a page's operators and emits one [`TextRun`] per text-showing
//! operator (`Tj`, `TJ`, `'`, `"`), descending into form XObjects.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, Stream};

use super::tokenizer::tokenize;
use super::TextRun;
use crate::error::{Error, Result};

/// Font resources by resource name.
pub(super) type FontMap<'a> = BTreeMap<Vec<u8>, &'a Dictionary>;

/// Form XObjects nested deeper than this are ignored.
const MAX_FORM_DEPTH: usize = 8;

/// TJ adjustments beyond this (thousandths of an em) read as a word gap.
const WORD_GAP_THRESHOLD: f32 = 200.0;

/// Collects text runs from one page.
pub(super) struct RunCollector<'a> {
    doc: &'a Document,
    page: u32,
    runs: Vec<TextRun>,
}

#[derive(Debug, Clone)]
struct TextState {
    font_key: Vec<u8>,
    font_name: String,
    font_size: f32,
    leading: f32,
    matrix: TextMatrix,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_name: String::new(),
            font_size: 12.0,
            leading: 0.0,
            matrix: TextMatrix::default(),
        }
    }
}

impl<'a> RunCollector<'a> {
    pub(super) fn new(doc: &'a Document, page: u32) -> Self {
        Self {
            doc,
            page,
            runs: Vec::new(),
        }
    }

    /// Interpret `content` and return the runs in operator order.
    pub(super) fn collect(
        mut self,
        content: &[u8],
        fonts: &FontMap<'a>,
        xobjects: Option<&'a Dictionary>,
    ) -> Result<Vec<TextRun>> {
        self.interpret(content, fonts, xobjects, 0)?;
        Ok(self.runs)
    }

    fn interpret(
        &mut self,
        content: &[u8],
        fonts: &FontMap<'a>,
        xobjects: Option<&'a Dictionary>,
        depth: usize,
    ) -> Result<()> {
        let operations = tokenize(content).map_err(|e| {
            Error::page_access(self.page, format!("invalid content stream: {}", e))
        })?;

        let mut state = TextState::default();
        let mut saved: Vec<TextState> = Vec::new();

        for op in &operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => saved.push(state.clone()),
                "Q" => {
                    if let Some(prev) = saved.pop() {
                        state = prev;
                    }
                }
                "BT" => state.matrix = TextMatrix::default(),
                "Tf" => {
                    if operands.len() >= 2 {
                        if let Object::Name(key) = &operands[0] {
                            state.font_name = fonts
                                .get(key.as_slice())
                                .and_then(|f| f.get(b"BaseFont").ok())
                                .and_then(|o| o.as_name_str().ok())
                                .map(String::from)
                                .unwrap_or_else(|| String::from_utf8_lossy(key).to_string());
                            state.font_key = key.clone();
                        }
                        state.font_size = get_number(&operands[1]).unwrap_or(12.0);
                    }
                }
                "TL" => {
                    if let Some(leading) = operands.first().and_then(get_number) {
                        state.leading = leading;
                    }
                }
                "Td" | "TD" => {
                    if operands.len() >= 2 {
                        let tx = get_number(&operands[0]).unwrap_or(0.0);
                        let ty = get_number(&operands[1]).unwrap_or(0.0);
                        if op.operator == "TD" {
                            state.leading = -ty;
                        }
                        state.matrix.translate(tx, ty);
                    }
                }
                "Tm" => {
                    if operands.len() >= 6 {
                        state.matrix.set(
                            get_number(&operands[0]).unwrap_or(1.0),
                            get_number(&operands[1]).unwrap_or(0.0),
                            get_number(&operands[2]).unwrap_or(0.0),
                            get_number(&operands[3]).unwrap_or(1.0),
                            get_number(&operands[4]).unwrap_or(0.0),
                            get_number(&operands[5]).unwrap_or(0.0),
                        );
                    }
                }
                "T*" => state.matrix.next_line(state.leading),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        let text = self.decode(fonts, &state.font_key, bytes);
                        self.push_run(text, &state);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let text = self.decode_array(fonts, &state.font_key, items);
                        self.push_run(text, &state);
                    }
                }
                "'" | "\"" => {
                    state.matrix.next_line(state.leading);
                    let text_idx = if op.operator == "\"" { 2 } else { 0 };
                    if let Some(Object::String(bytes, _)) = operands.get(text_idx) {
                        let text = self.decode(fonts, &state.font_key, bytes);
                        self.push_run(text, &state);
                    }
                }
                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        if depth < MAX_FORM_DEPTH {
                            self.interpret_form(name, fonts, xobjects, depth)?;
                        } else {
                            log::warn!(
                                "page {}: form XObject nesting exceeds {}, skipping",
                                self.page,
                                MAX_FORM_DEPTH
                            );
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Run a form XObject with its own resources layered over the caller's.
    fn interpret_form(
        &mut self,
        name: &[u8],
        fonts: &FontMap<'a>,
        xobjects: Option<&'a Dictionary>,
        depth: usize,
    ) -> Result<()> {
        let doc = self.doc;
        let Some(stream) = xobjects
            .and_then(|x| x.get(name).ok())
            .and_then(|o| o.as_reference().ok())
            .and_then(|id| match doc.get_object(id) {
                Ok(Object::Stream(s)) => Some(s),
                _ => None,
            })
        else {
            return Ok(());
        };

        if !matches!(stream.dict.get(b"Subtype").and_then(|o| o.as_name_str()), Ok("Form")) {
            return Ok(());
        }

        let resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve_dict(doc, r));

        let mut form_fonts = fonts.clone();
        let mut form_xobjects = xobjects;
        if let Some(resources) = resources {
            if let Some(font_dict) = resources
                .get(b"Font")
                .ok()
                .and_then(|f| resolve_dict(doc, f))
            {
                for (key, obj) in font_dict.iter() {
                    if let Some(font) = resolve_dict(doc, obj) {
                        form_fonts.insert(key.clone(), font);
                    }
                }
            }
            if let Some(inner) = resources
                .get(b"XObject")
                .ok()
                .and_then(|x| resolve_dict(doc, x))
            {
                form_xobjects = Some(inner);
            }
        }

        let content = stream_bytes(stream, self.page)?;
        self.interpret(&content, &form_fonts, form_xobjects, depth + 1)
    }

    fn push_run(&mut self, text: String, state: &TextState) {
        if text.is_empty() {
            return;
        }
        let (x, y) = state.matrix.position();
        self.runs.push(TextRun {
            text,
            font_name: state.font_name.clone(),
            font_size: state.font_size * state.matrix.scale(),
            x,
            y,
        });
    }

    /// Decode a string with the font's encoding, falling back to simple decoding.
    fn decode(&self, fonts: &FontMap<'a>, font_key: &[u8], bytes: &[u8]) -> String {
        if let Some(font) = fonts.get(font_key) {
            if let Ok(encoding) = font.get_font_encoding(self.doc) {
                if let Ok(text) = Document::decode_text(&encoding, bytes) {
                    return text;
                }
            }
        }
        decode_text_simple(bytes)
    }

    /// Decode a TJ array; large negative adjustments become word spaces.
    fn decode_array(&self, fonts: &FontMap<'a>, font_key: &[u8], items: &[Object]) -> String {
        let mut combined = String::new();
        for item in items {
            match item {
                Object::String(bytes, _) => combined.push_str(&self.decode(fonts, font_key, bytes)),
                Object::Integer(_) | Object::Real(_) => {
                    let adjustment = -get_number(item).unwrap_or(0.0);
                    if adjustment > WORD_GAP_THRESHOLD && needs_word_space(&combined) {
                        combined.push(' ');
                    }
                }
                _ => {}
            }
        }
        combined
    }
}

fn needs_word_space(text: &str) -> bool {
    match text.chars().last() {
        Some(c) => !c.is_whitespace() && !is_spaceless_script_char(c),
        None => false,
    }
}

/// Resolve a direct or referenced dictionary.
pub(super) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Stream payload, decompressed when a filter is declared.
pub(super) fn stream_bytes(stream: &Stream, page: u32) -> Result<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|e| Error::page_access(page, format!("cannot decode content stream: {}", e)))
    } else {
        Ok(stream.content.clone())
    }
}

#[derive(Debug, Clone, Copy)]
struct TextMatrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Default for TextMatrix {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }
}

impl TextMatrix {
    fn set(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        *self = Self { a, b, c, d, e, f };
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        self.e += tx * self.a + ty * self.c;
        self.f += tx * self.b + ty * self.d;
    }

    fn next_line(&mut self, leading: f32) {
        self.translate(0.0, -leading);
    }

    fn position(&self) -> (f32, f32) {
        (self.e, self.f)
    }

    fn scale(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }
}

fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Scripts written without spaces between words (Han, kana).
/// Hangul is not included: Korean uses word spaces.
fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x20000..=0x2EBEF).contains(&code)
        || (0x3040..=0x30FF).contains(&code)
        || (0x3000..=0x303F).contains(&code)
}

/// Decode a string with no font encoding: UTF-16BE with BOM, UTF-8, then Latin-1.
pub(super) fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(content: &[u8]) -> Vec<TextRun> {
        let doc = Document::with_version("1.5");
        RunCollector::new(&doc, 1)
            .collect(content, &FontMap::new(), None)
            .unwrap()
    }

    fn texts(runs: &[TextRun]) -> Vec<&str> {
        runs.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn test_one_run_per_show_operator() {
        let runs = collect(b"BT /F1 12 Tf (Hello) Tj 0 -14 Td (World) Tj ET");
        assert_eq!(texts(&runs), vec!["Hello", "World"]);
        assert_eq!(runs[1].y, -14.0);
        assert_eq!(runs[0].font_name, "F1");
        assert_eq!(runs[0].font_size, 12.0);
    }

    #[test]
    fn test_empty_strings_produce_no_run() {
        let runs = collect(b"BT () Tj ( ) Tj ET");
        assert_eq!(texts(&runs), vec![" "]);
    }

    #[test]
    fn test_tj_array_word_gap() {
        let runs = collect(b"BT [(Hel) -20 (lo) -300 (World)] TJ ET");
        assert_eq!(texts(&runs), vec!["Hello World"]);
    }

    #[test]
    fn test_quote_operators() {
        let runs = collect(b"BT 14 TL (a) Tj (b) ' 1 2 (c) \" ET");
        assert_eq!(texts(&runs), vec!["a", "b", "c"]);
        assert_eq!(runs[1].y, -14.0);
        assert_eq!(runs[2].y, -28.0);
    }

    #[test]
    fn test_graphics_state_restores_font() {
        let runs = collect(b"BT /F1 10 Tf q /F2 20 Tf (x) Tj Q (y) Tj ET");
        assert_eq!(runs[0].font_size, 20.0);
        assert_eq!(runs[1].font_size, 10.0);
        assert_eq!(runs[1].font_name, "F1");
    }

    #[test]
    fn test_matrix_scale_applies_to_font_size() {
        let runs = collect(b"BT /F1 1 Tf 12 0 0 12 72 720 Tm (x) Tj ET");
        assert_eq!(runs[0].font_size, 12.0);
        assert_eq!((runs[0].x, runs[0].y), (72.0, 720.0));
    }

    #[test]
    fn test_text_after_inline_image() {
        let runs = collect(
            b"q 2 0 0 2 0 0 cm BI /W 2 /H 1 /BPC 8 /CS /G ID \x00\xff\nEI Q BT /F1 12 Tf 72 700 Td (after) Tj ET",
        );
        assert_eq!(texts(&runs), vec!["after"]);
    }

    #[test]
    fn test_malformed_content_is_page_access() {
        let doc = Document::with_version("1.5");
        let result = RunCollector::new(&doc, 4).collect(
            b"BT /F1 12 Tf (one) Tj ET } ] BT (two) Tj ET",
            &FontMap::new(),
            None,
        );
        assert!(matches!(result, Err(Error::PageAccess { page: 4, .. })));
    }

    #[test]
    fn test_no_space_after_cjk() {
        assert!(!needs_word_space("日本"));
        assert!(needs_word_space("abc"));
        assert!(!needs_word_space("abc "));
        assert!(!needs_word_space(""));
    }

    #[test]
    fn test_decode_text_simple() {
        assert_eq!(decode_text_simple(b"Hello"), "Hello");
        assert_eq!(decode_text_simple(&[0x48, 0x65, 0x6C, 0x6C, 0xE9]), "Hellé");
        assert_eq!(decode_text_simple(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
    }
}
