//! Dump output formats for ring buffer exports.

use std::fmt;
use std::str::FromStr;

/// Supported export targets for ring buffer dumps.
///
/// Parsed case-insensitively so CLI flags and config files can use any
/// spelling:
///
/// ```
/// use logfan::domain::DumpFormat;
///
/// assert_eq!("JSON".parse::<DumpFormat>().unwrap(), DumpFormat::Json);
/// assert_eq!(" html-table ".parse::<DumpFormat>().unwrap(), DumpFormat::HtmlTable);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpFormat {
    /// Line-oriented text with template placeholders
    Text,
    /// Deterministic JSON array
    Json,
    /// HTML table with one row per event
    HtmlTable,
    /// Pre-formatted text wrapped in HTML
    HtmlText,
}

/// Error returned for unrecognised dump format names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpFormatParseError(pub String);

impl fmt::Display for DumpFormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported dump format: {:?}", self.0)
    }
}

impl std::error::Error for DumpFormatParseError {}

impl DumpFormat {
    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            DumpFormat::Text => "text",
            DumpFormat::Json => "json",
            DumpFormat::HtmlTable => "html_table",
            DumpFormat::HtmlText => "html_txt",
        }
    }
}

impl fmt::Display for DumpFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DumpFormat {
    type Err = DumpFormatParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(DumpFormat::Text),
            "json" => Ok(DumpFormat::Json),
            "html_table" | "html-table" => Ok(DumpFormat::HtmlTable),
            "html_txt" | "html-txt" | "html_text" | "html-text" => Ok(DumpFormat::HtmlText),
            _ => Err(DumpFormatParseError(value.to_string())),
        }
    }
}
