//! Regex-based field scrubber.
//!
//! Applies configurable regular expressions to the `extra` payloads of an
//! event (both the event's own and the context's), masking sensitive
//! values before fan-out. Field-name patterns match case-insensitively;
//! matched values are replaced wholesale with a fixed placeholder, so
//! scrubbing is idempotent.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde_json::Value;

use crate::application::ports::ScrubberPort;
use crate::domain::LogEvent;

/// Placeholder substituted for redacted values.
pub const REDACTED: &str = "***";

/// Error raised when a scrub pattern fails to compile.
#[derive(Debug)]
pub struct ScrubPatternError {
    /// The offending field-name or value pattern
    pub pattern: String,
    /// Regex compile error detail
    pub detail: String,
}

impl fmt::Display for ScrubPatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid scrub pattern {:?}: {}", self.pattern, self.detail)
    }
}

impl std::error::Error for ScrubPatternError {}

/// Redacts sensitive fields by name.
#[derive(Debug)]
pub struct RegexScrubber {
    patterns: Vec<(Regex, Regex)>,
    replacement: String,
}

impl RegexScrubber {
    /// Compile a field-name → value pattern mapping.
    ///
    /// Field-name patterns are matched case-insensitively against each
    /// key; the value pattern decides whether the value is redacted.
    pub fn new(
        patterns: &BTreeMap<String, String>,
        replacement: impl Into<String>,
    ) -> Result<Self, ScrubPatternError> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for (field, value) in patterns {
            let field_regex = Regex::new(&format!("(?i){field}")).map_err(|err| ScrubPatternError {
                pattern: field.clone(),
                detail: err.to_string(),
            })?;
            let value_regex = Regex::new(value).map_err(|err| ScrubPatternError {
                pattern: value.clone(),
                detail: err.to_string(),
            })?;
            compiled.push((field_regex, value_regex));
        }
        Ok(Self {
            patterns: compiled,
            replacement: replacement.into(),
        })
    }

    fn redact_map(&self, map: &mut BTreeMap<String, Value>) {
        for (key, value) in map.iter_mut() {
            if self.should_redact(key, value) {
                *value = Value::String(self.replacement.clone());
            } else if let Value::Object(inner) = value {
                // Nested mappings are walked one level only.
                for (inner_key, inner_value) in inner.iter_mut() {
                    if self.should_redact(inner_key, inner_value) {
                        *inner_value = Value::String(self.replacement.clone());
                    }
                }
            }
        }
    }

    fn should_redact(&self, key: &str, value: &Value) -> bool {
        let text = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        self.patterns
            .iter()
            .any(|(field, pattern)| field.is_match(key) && pattern.is_match(&text))
    }
}

impl Default for RegexScrubber {
    /// Default policy: fully redact keys matching `password|secret|token`.
    fn default() -> Self {
        let patterns = BTreeMap::from([("password|secret|token".to_string(), ".+".to_string())]);
        Self::new(&patterns, REDACTED).expect("built-in scrub patterns are valid")
    }
}

impl ScrubberPort for RegexScrubber {
    fn scrub(&self, event: LogEvent) -> LogEvent {
        let mut extra = event.extra.clone();
        self.redact_map(&mut extra);

        let mut context = event.context.clone();
        self.redact_map(&mut context.extra);

        event.with_extra(extra).with_context(context)
    }
}
