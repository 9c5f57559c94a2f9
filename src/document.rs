// Copyright (c) 2025 Robert August Vincent II <pillarsdotnet@gmail.com>
// Co-author: Cursor-AI.

//! Load/save of the per-project JSON document, plus the local timestamp helpers every
//! mutating operation shares.
//!
//! A missing or unreadable document is not an error: it loads as an empty object so that
//! a first run and a corrupted file both start fresh.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use log::debug;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::Result;

/// The whole project document: a JSON object whose keys keep insertion order.
pub type Document = Map<String, Value>;

/// Format used for every stored timestamp (local time, no offset).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Reads and parses the document. Missing file, bad JSON, or a non-object root all yield an empty document.
pub fn load(path: &Path) -> Document {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            debug!("{}: {}; starting with an empty document", path.display(), e);
            return Document::new();
        }
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            debug!("{}: root is not an object; starting with an empty document", path.display());
            Document::new()
        }
        Err(e) => {
            debug!("{}: {}; starting with an empty document", path.display(), e);
            Document::new()
        }
    }
}

/// Writes the document in full (2-space indent, trailing newline), creating parent directories.
pub fn save(path: &Path, doc: &Document) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut out = serde_json::to_string_pretty(doc)?;
    out.push('\n');
    fs::write(path, out)?;
    debug!("saved {} ({} keys)", path.display(), doc.len());
    Ok(())
}

/// Current local time, truncated to whole seconds.
pub fn now() -> NaiveDateTime {
    let t = Local::now().naive_local();
    t.with_nanosecond(0).unwrap_or(t)
}

/// Renders a timestamp in the stored `YYYY-MM-DDTHH:MM:SS` form.
pub fn format_timestamp(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored timestamp; tries several ISO forms (e.g. `2025-02-20T09:00:00`, `2025-02-20 09:00`, `2025-02-20`).
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    let formats = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_time(NaiveTime::MIN));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    None
}

/// Sets `updated` to the given time.
pub fn touch(doc: &mut Document, now: NaiveDateTime) {
    doc.insert("updated".to_string(), Value::String(format_timestamp(now)));
}
