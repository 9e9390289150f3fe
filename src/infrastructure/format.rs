//! Placeholder templates shared by console output and text dumps.
//!
//! Both adapters accept the same `{placeholder}` syntax, so presets,
//! custom templates, and documentation stay in sync. Placeholders accept
//! a format spec after `:` honoring fill, alignment, and width
//! (`{level:<8}`, `{logger_name:*^20}`). Literal braces are written
//! `{{` and `}}`.

use chrono::{Datelike, Local, SecondsFormat, Timelike};

use crate::application::ports::TemplateError;
use crate::domain::LogEvent;

/// Template applied when neither a preset nor a custom template is set.
pub const DEFAULT_TEMPLATE: &str = "{timestamp} {level:<8} {logger_name} {event_id} {message}";

/// Resolve a named template preset.
pub fn preset_template(name: &str) -> Option<&'static str> {
    match name.trim().to_ascii_lowercase().as_str() {
        "full" => Some("{timestamp} {level:<8} {logger_name} {event_id} {message}{context_fields}"),
        "short" => Some("{hh}:{mm}:{ss}|{level_code}|{logger_name}: {message}"),
        "full_loc" => {
            Some("{timestamp_loc} {level:<8} {logger_name} {event_id} {message}{context_fields}")
        }
        "short_loc" => Some("{hh_loc}:{mm_loc}:{ss_loc}|{level_code}|{logger_name}: {message}"),
        _ => None,
    }
}

/// Substitute every placeholder in `template` with values from `event`.
pub fn render_template(template: &str, event: &LogEvent) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(template.len() + 32);
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    output.push('{');
                    continue;
                }
                let mut body = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    body.push(inner);
                }
                if !closed {
                    return Err(TemplateError::UnclosedPlaceholder);
                }
                let (name, spec) = match body.split_once(':') {
                    Some((name, spec)) => (name, Some(spec)),
                    None => (body.as_str(), None),
                };
                let value = resolve(event, name)
                    .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
                match spec {
                    Some(spec) => output.push_str(&apply_spec(&value, spec)?),
                    None => output.push_str(&value),
                }
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                output.push('}');
            }
            other => output.push(other),
        }
    }
    Ok(output)
}

/// Value of one placeholder, or `None` when the name is unknown.
pub fn resolve(event: &LogEvent, name: &str) -> Option<String> {
    let utc = event.timestamp;
    let loc = event.timestamp.with_timezone(&Local);
    let context = &event.context;
    let value = match name {
        "timestamp" => event.timestamp_rfc3339(),
        "timestamp_loc" => loc.to_rfc3339_opts(SecondsFormat::Micros, false),
        "YYYY" => format!("{:04}", utc.year()),
        "MM" => format!("{:02}", utc.month()),
        "DD" => format!("{:02}", utc.day()),
        "hh" => format!("{:02}", utc.hour()),
        "mm" => format!("{:02}", utc.minute()),
        "ss" => format!("{:02}", utc.second()),
        "YYYY_loc" => format!("{:04}", loc.year()),
        "MM_loc" => format!("{:02}", loc.month()),
        "DD_loc" => format!("{:02}", loc.day()),
        "hh_loc" => format!("{:02}", loc.hour()),
        "mm_loc" => format!("{:02}", loc.minute()),
        "ss_loc" => format!("{:02}", loc.second()),
        "level" => event.level.name().to_string(),
        "level_code" => event.level.code().to_string(),
        "level_icon" => event.level.icon().to_string(),
        "logger_name" => event.logger_name.clone(),
        "event_id" => event.event_id.clone(),
        "message" => event.message.clone(),
        "user_name" => context.user_name.clone().unwrap_or_default(),
        "hostname" => context.hostname.clone().unwrap_or_default(),
        "process_id" => context.process_id.to_string(),
        "process_id_chain" => context.chain_display(),
        "context" => join_fields(context.display_fields()),
        "extra" => join_fields(
            event
                .extra
                .iter()
                .map(|(key, value)| (key.clone(), value_display(value)))
                .collect(),
        ),
        "context_fields" => {
            let mut pairs = context.display_fields();
            pairs.extend(
                event
                    .extra
                    .iter()
                    .map(|(key, value)| (key.clone(), value_display(value))),
            );
            pairs.sort();
            if pairs.is_empty() {
                String::new()
            } else {
                format!(" {}", join_fields(pairs))
            }
        }
        _ => return None,
    };
    Some(value)
}

fn join_fields(pairs: Vec<(String, String)>) -> String {
    pairs
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn value_display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Apply `[[fill]align][width]` to `value`.
fn apply_spec(value: &str, spec: &str) -> Result<String, TemplateError> {
    if spec.is_empty() {
        return Ok(value.to_string());
    }
    let chars: Vec<char> = spec.chars().collect();
    let (fill, align, width_start) = if chars.len() >= 2 && is_align(chars[1]) {
        (chars[0], chars[1], 2)
    } else if is_align(chars[0]) {
        (' ', chars[0], 1)
    } else {
        (' ', '<', 0)
    };
    let width_text: String = chars[width_start..].iter().collect();
    if width_text.is_empty() {
        return Err(TemplateError::BadSpec(spec.to_string()));
    }
    let width: usize = width_text
        .parse()
        .map_err(|_| TemplateError::BadSpec(spec.to_string()))?;

    let length = value.chars().count();
    if length >= width {
        return Ok(value.to_string());
    }
    let padding = width - length;
    let padded = match align {
        '>' => format!("{}{}", fill.to_string().repeat(padding), value),
        '^' => {
            let left = padding / 2;
            let right = padding - left;
            format!(
                "{}{}{}",
                fill.to_string().repeat(left),
                value,
                fill.to_string().repeat(right)
            )
        }
        _ => format!("{}{}", value, fill.to_string().repeat(padding)),
    };
    Ok(padded)
}

fn is_align(ch: char) -> bool {
    matches!(ch, '<' | '>' | '^')
}
