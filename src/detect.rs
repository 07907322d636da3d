//! PDF header detection.

use crate::error::{Error, Result};

/// PDF header information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfHeader {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
    /// Byte offset of the `%PDF-` marker
    pub offset: usize,
}

impl std::fmt::Display for PdfHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3; // e.g., "1.7"

/// Readers tolerate leading garbage before the header, up to this many bytes.
pub const HEADER_SEARCH_WINDOW: usize = 1024;

/// Locate the PDF header in the first [`HEADER_SEARCH_WINDOW`] bytes.
///
/// # Returns
/// * `Ok(PdfHeader)` if a `%PDF-x.y` marker is found
/// * `Err(Error::DocumentOpen)` otherwise
///
/// # Example
/// ```
/// use pdfstr::detect::detect_header;
///
/// let header = detect_header(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3").unwrap();
/// assert_eq!(header.version, "1.7");
/// ```
pub fn detect_header(data: &[u8]) -> Result<PdfHeader> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];

    let offset = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)
        .ok_or_else(|| Error::DocumentOpen("not a PDF: missing %PDF- header".to_string()))?;

    let start = offset + PDF_MAGIC.len();
    let version_bytes = data
        .get(start..start + VERSION_LEN)
        .ok_or_else(|| Error::DocumentOpen("not a PDF: truncated header".to_string()))?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(Error::DocumentOpen(format!(
            "unsupported PDF version: {}",
            version
        )));
    }

    Ok(PdfHeader { version, offset })
}

/// Check if a version string is valid.
fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3 && bytes[0].is_ascii_digit() && bytes[1] == b'.' && bytes[2].is_ascii_digit()
}

/// Check if bytes carry a PDF header.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_header(data).is_ok()
}
