//! Log severity levels and their presentation metadata.
//!
//! Levels carry everything the adapters need to render them: a numeric
//! severity for ordering, a fixed four-character code for column-aligned
//! output, a console glyph, and the syslog priority used by structured
//! backends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordered log severity.
///
/// The derive order defines the total order used by every sink gate:
/// `Debug < Info < Warning < Error < Critical`.
///
/// # Example
/// ```
/// use logfan::domain::LogLevel;
///
/// assert!(LogLevel::Error > LogLevel::Info);
/// assert_eq!(LogLevel::Warning.code(), "WARN");
/// assert_eq!("critical".parse::<LogLevel>().unwrap(), LogLevel::Critical);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Verbose diagnostics for developers
    Debug,
    /// Routine operational messages
    Info,
    /// Unexpected but recoverable situations
    Warning,
    /// Failures that abort the current operation
    Error,
    /// Failures that endanger the whole process
    Critical,
}

/// Error returned when a level name or numeric severity cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelParseError(pub String);

impl fmt::Display for LevelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log level: {:?}", self.0)
    }
}

impl std::error::Error for LevelParseError {}

impl LogLevel {
    /// All levels from least to most severe.
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    /// Numeric severity used for comparisons in serialized payloads.
    pub fn severity(self) -> u8 {
        match self {
            LogLevel::Debug => 10,
            LogLevel::Info => 20,
            LogLevel::Warning => 30,
            LogLevel::Error => 40,
            LogLevel::Critical => 50,
        }
    }

    /// Upper-case level name (`"WARNING"`).
    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Fixed four-character code for column-aligned text output.
    ///
    /// The codes are part of the dump format contract and must not change.
    pub fn code(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERRO",
            LogLevel::Critical => "CRIT",
        }
    }

    /// Console glyph shown next to colorized output.
    pub fn icon(self) -> &'static str {
        match self {
            LogLevel::Debug => "🐞",
            LogLevel::Info => "ℹ",
            LogLevel::Warning => "⚠",
            LogLevel::Error => "✖",
            LogLevel::Critical => "☠",
        }
    }

    /// Syslog priority consumed by journald and GELF payloads.
    pub fn syslog_priority(self) -> u8 {
        match self {
            LogLevel::Debug => 7,
            LogLevel::Info => 6,
            LogLevel::Warning => 4,
            LogLevel::Error => 3,
            LogLevel::Critical => 2,
        }
    }

    /// Resolve a level from its numeric severity.
    pub fn from_severity(value: u8) -> Result<Self, LevelParseError> {
        match value {
            10 => Ok(LogLevel::Debug),
            20 => Ok(LogLevel::Info),
            30 => Ok(LogLevel::Warning),
            40 => Ok(LogLevel::Error),
            50 => Ok(LogLevel::Critical),
            other => Err(LevelParseError(other.to_string())),
        }
    }

    /// Index into [`LogLevel::ALL`], usable for per-level caches.
    pub(crate) fn index(self) -> usize {
        match self {
            LogLevel::Debug => 0,
            LogLevel::Info => 1,
            LogLevel::Warning => 2,
            LogLevel::Error => 3,
            LogLevel::Critical => 4,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogLevel {
    type Err = LevelParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            _ => Err(LevelParseError(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Critical);
    }

    #[test]
    fn test_codes_are_four_chars() {
        for level in LogLevel::ALL {
            assert_eq!(level.code().len(), 4, "{level} code must be 4 chars");
        }
    }

    #[test]
    fn test_syslog_mapping() {
        assert_eq!(LogLevel::Debug.syslog_priority(), 7);
        assert_eq!(LogLevel::Info.syslog_priority(), 6);
        assert_eq!(LogLevel::Warning.syslog_priority(), 4);
        assert_eq!(LogLevel::Error.syslog_priority(), 3);
        assert_eq!(LogLevel::Critical.syslog_priority(), 2);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("  WaRnInG ".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_severity_roundtrip() {
        for level in LogLevel::ALL {
            assert_eq!(LogLevel::from_severity(level.severity()).unwrap(), level);
        }
        assert!(LogLevel::from_severity(15).is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&LogLevel::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");
        let back: LogLevel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, LogLevel::Warning);
    }
}
