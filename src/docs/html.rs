//! HTML rendering of a report
//!
//! Records are rendered by walking their serialized JSON form, so every field
//! the YAML/JSON encodings carry also shows up in the document.

use crate::inventory::{Report, Section};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fmt::Write;

const STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; margin: 2rem; color: #1f2328; }
h1 { border-bottom: 2px solid #d0d7de; padding-bottom: .4rem; }
h2 { margin-top: 2.2rem; color: #0b5394; }
.meta { color: #57606a; }
.record { border: 1px solid #d0d7de; border-radius: 6px; padding: .8rem 1rem; margin: 1rem 0; }
.record h3 { margin: 0 0 .6rem 0; }
table { border-collapse: collapse; }
th, td { text-align: left; vertical-align: top; padding: .2rem .8rem .2rem 0; }
th { color: #57606a; font-weight: 600; white-space: nowrap; }
ul { margin: 0; padding-left: 1.2rem; }
.empty { color: #8c959f; font-style: italic; }
"#;

/// Escape text for element content and attribute values
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render the report as a standalone HTML document
pub fn render_html(report: &Report) -> Result<String> {
    let meta = &report.metadata;
    let app_id = escape(meta.app_id.as_str());

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>Infrastructure documentation: {}</title>", app_id);
    let _ = writeln!(out, "<style>{}</style>\n</head>\n<body>", STYLE);
    let _ = writeln!(out, "<h1>Infrastructure documentation: {}</h1>", app_id);
    let _ = writeln!(
        out,
        "<p class=\"meta\">Generated {} &middot; {} project {} &middot; {} resources</p>",
        escape(&meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        escape(&meta.provider),
        escape(&meta.project),
        report.resource_count()
    );

    if report.is_empty() {
        out.push_str("<p class=\"empty\">No resources carry this application id.</p>\n");
    }

    for section in report.sections() {
        render_section(&mut out, section)?;
    }

    out.push_str("</body>\n</html>\n");
    Ok(out)
}

fn render_section(out: &mut String, section: &Section) -> Result<()> {
    let category = section.category();
    let value = serde_json::to_value(section)
        .with_context(|| format!("Failed to serialize {} section", category))?;

    let _ = writeln!(
        out,
        "<section id=\"{}\">\n<h2>{}</h2>",
        category.key(),
        escape(category.title())
    );

    let records = value
        .get(category.items_key())
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    for record in records {
        out.push_str("<div class=\"record\">\n");
        if let Some(title) = record_title(record) {
            let _ = writeln!(out, "<h3>{}</h3>", escape(&title));
        }
        render_value(out, record);
        out.push_str("</div>\n");
    }

    out.push_str("</section>\n");
    Ok(())
}

/// The first `*name` field of a record, used as its heading
fn record_title(record: &Value) -> Option<String> {
    record
        .as_object()?
        .iter()
        .find(|(key, value)| key.ends_with("name") && value.is_string())
        .and_then(|(_, value)| value.as_str().map(|s| s.to_string()))
}

fn render_value(out: &mut String, value: &Value) {
    match value {
        Value::Object(fields) => {
            out.push_str("<table>\n");
            for (key, field) in fields {
                let _ = write!(out, "<tr><th>{}</th><td>", escape(&label(key)));
                render_value(out, field);
                out.push_str("</td></tr>\n");
            }
            out.push_str("</table>\n");
        },
        Value::Array(items) if items.is_empty() => {
            out.push_str("<span class=\"empty\">none</span>");
        },
        Value::Array(items) => {
            out.push_str("<ul>\n");
            for item in items {
                out.push_str("<li>");
                render_value(out, item);
                out.push_str("</li>\n");
            }
            out.push_str("</ul>\n");
        },
        Value::String(s) => out.push_str(&escape(s)),
        Value::Null => out.push_str("<span class=\"empty\">-</span>"),
        other => out.push_str(&escape(&other.to_string())),
    }
}

/// `instance_type` -> `Instance type`
fn label(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => spaced,
    }
}
