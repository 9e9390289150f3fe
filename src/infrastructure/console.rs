//! ANSI console sink.
//!
//! Renders events through the shared template engine and writes them to
//! an injectable target (stderr by default). Colors come from explicit
//! per-level style overrides, a named theme, or the built-in palette, in
//! that order. The resolved ANSI prefix per level is memoized: the cache
//! is populated lazily, is thread-safe, and is bounded by the level
//! enumeration.

use std::io::Write;
use std::sync::{Mutex, OnceLock};

use crate::application::ports::{ConsolePort, SinkError};
use crate::domain::{LogEvent, LogLevel};
use crate::infrastructure::format::render_template;

/// Default per-level style names, matching the classic theme.
const FALLBACK_PALETTE: [&str; 5] = ["cyan", "green", "yellow", "red", "magenta"];

/// Resolve a named theme to its per-level style palette
/// (debug, info, warning, error, critical).
pub fn theme_palette(name: &str) -> Option<[&'static str; 5]> {
    match name.trim().to_ascii_lowercase().as_str() {
        "classic" => Some(FALLBACK_PALETTE),
        "dark" => Some([
            "bright_black",
            "bright_green",
            "bright_yellow",
            "bright_red",
            "bright_magenta",
        ]),
        "mono" => Some(["white", "white", "white", "white", "white"]),
        _ => None,
    }
}

/// Translate a style name (`"cyan"`, `"bold red"`, `"bright_yellow"`)
/// into an ANSI escape prefix. Unknown tokens are skipped.
pub fn ansi_prefix(style: &str) -> String {
    let mut codes: Vec<&str> = Vec::new();
    for token in style.split_whitespace() {
        let code = match token.to_ascii_lowercase().as_str() {
            "bold" => "1",
            "dim" => "2",
            "black" => "30",
            "red" => "31",
            "green" => "32",
            "yellow" => "33",
            "blue" => "34",
            "magenta" => "35",
            "cyan" => "36",
            "white" => "37",
            "bright_black" => "90",
            "bright_red" => "91",
            "bright_green" => "92",
            "bright_yellow" => "93",
            "bright_blue" => "94",
            "bright_magenta" => "95",
            "bright_cyan" => "96",
            "bright_white" => "97",
            _ => continue,
        };
        codes.push(code);
    }
    if codes.is_empty() {
        String::new()
    } else {
        format!("\u{1b}[{}m", codes.join(";"))
    }
}

/// CSS color used by HTML dumps for a style name.
pub fn css_color(style: &str) -> Option<&'static str> {
    let color = match style
        .split_whitespace()
        .last()?
        .to_ascii_lowercase()
        .as_str()
    {
        "black" => "#000000",
        "red" => "#cc0000",
        "green" => "#4e9a06",
        "yellow" => "#c4a000",
        "blue" => "#3465a4",
        "magenta" => "#75507b",
        "cyan" => "#06989a",
        "white" => "#d3d7cf",
        "bright_black" => "#555753",
        "bright_red" => "#ef2929",
        "bright_green" => "#8ae234",
        "bright_yellow" => "#fce94f",
        "bright_blue" => "#729fcf",
        "bright_magenta" => "#ad7fa8",
        "bright_cyan" => "#34e2e2",
        "bright_white" => "#eeeeec",
        _ => return None,
    };
    Some(color)
}

/// Console sink writing templated lines with optional ANSI color.
pub struct AnsiConsoleAdapter {
    template: String,
    styles: [String; 5],
    cache: [OnceLock<String>; 5],
    writer: Mutex<Box<dyn Write + Send>>,
}

impl AnsiConsoleAdapter {
    /// Sink writing to stderr.
    pub fn new(template: String, styles: [String; 5]) -> Self {
        Self::with_writer(template, styles, Box::new(std::io::stderr()))
    }

    /// Sink writing to an explicit target (tests, embedded hosts).
    pub fn with_writer(
        template: String,
        styles: [String; 5],
        writer: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            template,
            styles,
            cache: [const { OnceLock::new() }; 5],
            writer: Mutex::new(writer),
        }
    }

    /// Per-level styles resolved from overrides, then theme, then the
    /// built-in palette.
    pub fn resolve_styles(
        overrides: &std::collections::BTreeMap<LogLevel, String>,
        theme: Option<&str>,
    ) -> [String; 5] {
        let palette = theme
            .and_then(theme_palette)
            .unwrap_or(FALLBACK_PALETTE);
        LogLevel::ALL.map(|level| {
            overrides
                .get(&level)
                .cloned()
                .unwrap_or_else(|| palette[level.index()].to_string())
        })
    }

    fn style_prefix(&self, level: LogLevel) -> &str {
        self.cache[level.index()].get_or_init(|| ansi_prefix(&self.styles[level.index()]))
    }
}

impl ConsolePort for AnsiConsoleAdapter {
    fn emit(&self, event: &LogEvent, colorize: bool) -> Result<(), SinkError> {
        let line = render_template(&self.template, event)
            .map_err(|err| SinkError::Render(err.to_string()))?;
        let mut writer = self.writer.lock().expect("console writer lock poisoned");
        if colorize {
            let prefix = self.style_prefix(event.level);
            if prefix.is_empty() {
                writeln!(writer, "{line}")?;
            } else {
                writeln!(writer, "{prefix}{line}\u{1b}[0m")?;
            }
        } else {
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for AnsiConsoleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnsiConsoleAdapter")
            .field("template", &self.template)
            .field("styles", &self.styles)
            .finish()
    }
}
