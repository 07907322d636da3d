//! Extraction options and configuration.

use serde::{Deserialize, Serialize};

/// Default separator between runs and between pages.
pub const DEFAULT_SEPARATOR: &str = "\n";

/// Options for extracting text.
///
/// Deserializes with missing fields taking their defaults, so options can
/// be read from a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Inserted between consecutive runs of a page
    pub run_separator: String,

    /// Inserted between consecutive pages
    pub page_separator: String,

    /// Whether pages are processed in parallel
    pub parallel: bool,
}

impl ExtractOptions {
    /// Create new extract options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the separator between runs of a page.
    pub fn with_run_separator(mut self, separator: impl Into<String>) -> Self {
        self.run_separator = separator.into();
        self
    }

    /// Set the separator between pages.
    pub fn with_page_separator(mut self, separator: impl Into<String>) -> Self {
        self.page_separator = separator.into();
        self
    }

    /// Set both separators.
    pub fn with_separators(
        self,
        run_separator: impl Into<String>,
        page_separator: impl Into<String>,
    ) -> Self {
        self.with_run_separator(run_separator)
            .with_page_separator(page_separator)
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            run_separator: DEFAULT_SEPARATOR.to_string(),
            page_separator: DEFAULT_SEPARATOR.to_string(),
            parallel: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ExtractOptions::default();
        assert_eq!(options.run_separator, "\n");
        assert_eq!(options.page_separator, "\n");
        assert!(options.parallel);
    }

    #[test]
    fn test_extract_options_builder() {
        let options = ExtractOptions::new()
            .with_separators(" ", "\n\n")
            .sequential();

        assert_eq!(options.run_separator, " ");
        assert_eq!(options.page_separator, "\n\n");
        assert!(!options.parallel);
        assert!(options.with_parallel(true).parallel);
    }

    #[test]
    fn test_deserialize_partial_options() {
        let options: ExtractOptions = serde_json::from_str(r#"{"page_separator": "\f"}"#).unwrap();
        assert_eq!(options.run_separator, "\n");
        assert_eq!(options.page_separator, "\u{c}");
        assert!(options.parallel);
    }

    #[test]
    fn test_serialize_round_trip() {
        let options = ExtractOptions::new().with_separators("", "|").sequential();
        let json = serde_json::to_string(&options).unwrap();
        let back: ExtractOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }
}
