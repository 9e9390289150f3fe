//! Dump adapter rendering ring-buffer snapshots as text, JSON, or HTML.
//!
//! Rendering is deterministic: identical snapshots produce byte-identical
//! output, so operators can diff dumps across runs. File output is
//! atomic (temp file plus rename) with create-or-truncate semantics.

use std::collections::BTreeMap;
use std::path::Path;

use crate::application::ports::{DumpError, DumpPort, DumpRequest};
use crate::domain::{DumpFormat, LogEvent, LogLevel};
use crate::infrastructure::console::{ansi_prefix, css_color, theme_palette};
use crate::infrastructure::format::{preset_template, render_template, resolve, DEFAULT_TEMPLATE};

const HTML_HEADER: &str = "<html><head><title>logfan dump</title></head><body>";
const HTML_FOOTER: &str = "</body></html>";

/// Renders snapshots according to the configured defaults and per-call
/// overrides.
#[derive(Debug, Clone, Default)]
pub struct DumpAdapter {
    default_template: Option<String>,
    default_preset: Option<String>,
    default_theme: Option<String>,
    default_styles: BTreeMap<LogLevel, String>,
}

impl DumpAdapter {
    /// Adapter with runtime-configured defaults.
    pub fn new(
        default_template: Option<String>,
        default_preset: Option<String>,
        default_theme: Option<String>,
        default_styles: BTreeMap<LogLevel, String>,
    ) -> Self {
        Self {
            default_template,
            default_preset,
            default_theme,
            default_styles,
        }
    }

    fn resolve_template(&self, request: &DumpRequest) -> Result<String, DumpError> {
        if let Some(template) = &request.template {
            return Ok(template.clone());
        }
        if let Some(preset) = &request.preset {
            return preset_template(preset)
                .map(str::to_string)
                .ok_or_else(|| DumpError::UnknownPreset(preset.clone()));
        }
        if let Some(template) = &self.default_template {
            return Ok(template.clone());
        }
        if let Some(preset) = &self.default_preset {
            return preset_template(preset)
                .map(str::to_string)
                .ok_or_else(|| DumpError::UnknownPreset(preset.clone()));
        }
        Ok(DEFAULT_TEMPLATE.to_string())
    }

    fn style_for(&self, request: &DumpRequest, level: LogLevel) -> Option<String> {
        if let Some(styles) = &request.styles {
            if let Some(style) = styles.get(&level) {
                return Some(style.clone());
            }
        }
        if let Some(style) = self.default_styles.get(&level) {
            return Some(style.clone());
        }
        let theme = request.theme.as_deref().or(self.default_theme.as_deref());
        let palette = theme.and_then(theme_palette).unwrap_or_else(|| {
            theme_palette("classic").expect("built-in theme exists")
        });
        Some(palette[level.index()].to_string())
    }

    fn render_text(
        &self,
        events: &[&LogEvent],
        template: &str,
        request: &DumpRequest,
    ) -> Result<String, DumpError> {
        let mut lines = Vec::with_capacity(events.len());
        for event in events {
            let line = render_template(template, event)?;
            if request.color {
                let prefix = self
                    .style_for(request, event.level)
                    .map(|style| ansi_prefix(&style))
                    .unwrap_or_default();
                if prefix.is_empty() {
                    lines.push(line);
                } else {
                    lines.push(format!("{prefix}{line}\u{1b}[0m"));
                }
            } else {
                lines.push(line);
            }
        }
        Ok(lines.join("\n"))
    }

    fn render_json(events: &[&LogEvent]) -> String {
        serde_json::to_string_pretty(events).unwrap_or_else(|_| "[]".to_string())
    }

    fn render_html_table(events: &[&LogEvent]) -> String {
        let mut rows = String::new();
        for event in events {
            let context = resolve(event, "context").unwrap_or_default();
            rows.push_str("<tr>");
            for cell in [
                event.timestamp_rfc3339(),
                event.level.name().to_string(),
                event.logger_name.clone(),
                event.event_id.clone(),
                event.message.clone(),
                context,
            ] {
                rows.push_str("<td>");
                rows.push_str(&escape_html(&cell));
                rows.push_str("</td>");
            }
            rows.push_str("</tr>");
        }
        format!(
            "{HTML_HEADER}<table><thead><tr>\
             <th>Timestamp</th><th>Level</th><th>Logger</th>\
             <th>Event ID</th><th>Message</th><th>Context</th>\
             </tr></thead><tbody>{rows}</tbody></table>{HTML_FOOTER}"
        )
    }

    fn render_html_text(
        &self,
        events: &[&LogEvent],
        template: &str,
        request: &DumpRequest,
    ) -> Result<String, DumpError> {
        let mut body = String::from("<pre>");
        for event in events {
            let line = render_template(template, event)?;
            let escaped = escape_html(&line);
            if request.color {
                let color = self
                    .style_for(request, event.level)
                    .and_then(|style| css_color(&style));
                match color {
                    Some(color) => {
                        body.push_str(&format!("<span style=\"color: {color}\">{escaped}</span>\n"))
                    }
                    None => {
                        body.push_str(&escaped);
                        body.push('\n');
                    }
                }
            } else {
                body.push_str(&escaped);
                body.push('\n');
            }
        }
        body.push_str("</pre>");
        Ok(format!("{HTML_HEADER}{body}{HTML_FOOTER}"))
    }
}

impl DumpPort for DumpAdapter {
    fn render(&self, events: &[LogEvent], request: &DumpRequest) -> Result<String, DumpError> {
        let format = request.format.unwrap_or(DumpFormat::Text);
        let filtered: Vec<&LogEvent> = events
            .iter()
            .filter(|event| request.min_level.map_or(true, |min| event.level >= min))
            .collect();

        let content = match format {
            DumpFormat::Text => {
                let template = self.resolve_template(request)?;
                self.render_text(&filtered, &template, request)?
            }
            DumpFormat::Json => Self::render_json(&filtered),
            DumpFormat::HtmlTable => Self::render_html_table(&filtered),
            DumpFormat::HtmlText => {
                let template = self.resolve_template(request)?;
                self.render_html_text(&filtered, &template, request)?
            }
        };

        if let Some(path) = &request.path {
            write_atomic(path, &content)?;
        }
        Ok(content)
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// Write UTF-8 content next to the target, then rename into place.
fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dump".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.tmp-{}", std::process::id()));
    std::fs::write(&tmp, content)?;
    match std::fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = std::fs::remove_file(&tmp);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContextBinder, ContextFields, ExceptionInfo};
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    fn events() -> Vec<LogEvent> {
        let binder = ContextBinder::new();
        let scope = binder
            .bind(
                ContextFields::new()
                    .service("svc")
                    .environment("dev")
                    .job_id("job-1"),
            )
            .unwrap();
        let context = scope.context().clone();
        let at = |minute| Utc.with_ymd_and_hms(2025, 9, 30, 12, minute, 0).unwrap();
        vec![
            LogEvent::new(
                "evt-1",
                at(0),
                "svc.worker",
                LogLevel::Info,
                "started <batch>",
                context.clone(),
                BTreeMap::new(),
                None,
            )
            .unwrap(),
            LogEvent::new(
                "evt-2",
                at(1),
                "svc.worker",
                LogLevel::Error,
                "failed",
                context,
                BTreeMap::from([("attempt".to_string(), serde_json::json!(2))]),
                Some(ExceptionInfo {
                    type_name: "io::Error".into(),
                    message: "denied".into(),
                    trace: "frame-1\nframe-2".into(),
                }),
            )
            .unwrap(),
        ]
    }

    fn request(format: DumpFormat) -> DumpRequest {
        DumpRequest {
            format: Some(format),
            ..DumpRequest::default()
        }
    }

    #[test]
    fn test_text_dump_uses_template() {
        let adapter = DumpAdapter::default();
        let request = DumpRequest {
            template: Some("{level_code} {logger_name} {message}".to_string()),
            ..request(DumpFormat::Text)
        };
        let output = adapter.render(&events(), &request).unwrap();
        assert_eq!(
            output,
            "INFO svc.worker started <batch>\nERRO svc.worker failed"
        );
    }

    #[test]
    fn test_dump_is_deterministic() {
        let adapter = DumpAdapter::default();
        let events = events();
        for format in [
            DumpFormat::Text,
            DumpFormat::Json,
            DumpFormat::HtmlTable,
            DumpFormat::HtmlText,
        ] {
            let first = adapter.render(&events, &request(format)).unwrap();
            let second = adapter.render(&events, &request(format)).unwrap();
            assert_eq!(first, second, "{format} dump must be byte-identical");
        }
    }

    #[test]
    fn test_min_level_filter() {
        let adapter = DumpAdapter::default();
        let request = DumpRequest {
            min_level: Some(LogLevel::Warning),
            template: Some("{event_id}".to_string()),
            ..request(DumpFormat::Text)
        };
        let output = adapter.render(&events(), &request).unwrap();
        assert_eq!(output, "evt-2");
    }

    #[test]
    fn test_json_dump_structure() {
        let adapter = DumpAdapter::default();
        let output = adapter.render(&events(), &request(DumpFormat::Json)).unwrap();
        let decoded: Vec<Value> = serde_json::from_str(&output).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0]["event_id"], "evt-1");
        assert_eq!(decoded[0]["level"], "INFO");
        assert_eq!(decoded[0]["timestamp"], "2025-09-30T12:00:00.000000Z");
        assert_eq!(decoded[0]["context"]["service"], "svc");
        assert_eq!(decoded[1]["exception"]["type"], "io::Error");
        assert_eq!(decoded[1]["exception"]["trace"], "frame-1\nframe-2");
    }

    #[test]
    fn test_html_table_rows_and_escaping() {
        let adapter = DumpAdapter::default();
        let output = adapter
            .render(&events(), &request(DumpFormat::HtmlTable))
            .unwrap();
        assert!(output.starts_with("<html>"));
        assert_eq!(output.matches("<tr>").count(), 3); // header + 2 rows
        assert!(output.contains("started &lt;batch&gt;"));
        assert!(!output.contains("started <batch>"));
    }

    #[test]
    fn test_html_text_colors_only_when_enabled() {
        let adapter = DumpAdapter::default();
        let mono = adapter
            .render(&events(), &request(DumpFormat::HtmlText))
            .unwrap();
        assert!(!mono.contains("<span"));

        let colored_request = DumpRequest {
            color: true,
            theme: Some("classic".to_string()),
            ..request(DumpFormat::HtmlText)
        };
        let colored = adapter.render(&events(), &colored_request).unwrap();
        assert!(colored.contains("<span style=\"color:"));
    }

    #[test]
    fn test_text_color_uses_ansi() {
        let adapter = DumpAdapter::default();
        let colored_request = DumpRequest {
            color: true,
            template: Some("{message}".to_string()),
            ..request(DumpFormat::Text)
        };
        let output = adapter.render(&events(), &colored_request).unwrap();
        assert!(output.contains("\u{1b}["));
    }

    #[test]
    fn test_unknown_placeholder_fails() {
        let adapter = DumpAdapter::default();
        let bad = DumpRequest {
            template: Some("{oops}".to_string()),
            ..request(DumpFormat::Text)
        };
        assert!(matches!(
            adapter.render(&events(), &bad),
            Err(DumpError::Template(_))
        ));
    }

    #[test]
    fn test_unknown_preset_fails() {
        let adapter = DumpAdapter::default();
        let bad = DumpRequest {
            preset: Some("fancy".to_string()),
            ..request(DumpFormat::Text)
        };
        assert!(matches!(
            adapter.render(&events(), &bad),
            Err(DumpError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_file_write_is_atomic_and_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("dump.json");
        let adapter = DumpAdapter::default();
        let request = DumpRequest {
            path: Some(target.clone()),
            ..request(DumpFormat::Json)
        };
        let rendered = adapter.render(&events(), &request).unwrap();
        let written = std::fs::read_to_string(&target).unwrap();
        assert_eq!(rendered, written);
        // No temp file left behind.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_empty_snapshot_renders_empty() {
        let adapter = DumpAdapter::default();
        assert_eq!(adapter.render(&[], &request(DumpFormat::Text)).unwrap(), "");
        assert_eq!(
            adapter.render(&[], &request(DumpFormat::Json)).unwrap(),
            "[]"
        );
    }
}
