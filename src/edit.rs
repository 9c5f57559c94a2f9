// Copyright (c) 2025 Robert August Vincent II <pillarsdotnet@gmail.com>
// Co-author: Cursor-AI.

//! Plain key/value edits on the project document: get, set, set-nested, delete-nested,
//! append, pop-list, list-keys, count, dump, init, migrate-conf.
//!
//! Every mutating edit stamps `updated`, even when nothing else changed.

use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use crate::document::{format_timestamp, touch, Document};
use crate::error::{ProjError, Result};

/// Project name used by `init` when none is given.
pub const DEFAULT_NAME: &str = "Unnamed";

/// Returns `args[index]` or a missing-argument error naming it.
pub fn required<'a>(args: &'a [String], index: usize, op: &'static str, name: &'static str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or(ProjError::MissingArgument { op, name })
}

/// Parses an integer argument (surrounding whitespace allowed).
pub fn parse_int(value: &str, op: &'static str, name: &'static str) -> Result<i64> {
    value.trim().parse().map_err(|_| ProjError::InvalidArgument {
        op,
        name,
        value: value.to_string(),
    })
}

/// JSON if the text parses as JSON, otherwise the text itself as a string.
fn parse_loose(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

/// Single-line JSON with a space after `,` and `:`.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

fn to_spaced_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| ProjError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// How `get` prints a value: strings raw, `None`/`True`/`False` for the literals the shell
/// front end matches on, containers as one-line JSON.
fn render(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("None".to_string()),
        Value::Bool(true) => Ok("True".to_string()),
        Value::Bool(false) => Ok("False".to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Number(_) => Ok(value.to_string()),
        Value::Array(_) | Value::Object(_) => to_spaced_string(value),
    }
}

/// Array index as a shell caller writes it; negative counts from the end.
fn list_index(key: &str, len: usize) -> Option<usize> {
    let i: i64 = key.trim().parse().ok()?;
    let idx = if i < 0 { len as i64 + i } else { i };
    usize::try_from(idx).ok().filter(|&idx| idx < len)
}

/// Walks `keys` through objects (by key) and arrays (by index). Anything that does not resolve prints as empty.
pub fn get(doc: &Document, keys: &[String]) -> Result<String> {
    let Some((first, rest)) = keys.split_first() else {
        return to_spaced_string(doc);
    };
    let mut current = doc.get(first.as_str());
    for key in rest {
        current = match current {
            Some(Value::Object(map)) => map.get(key.as_str()),
            Some(Value::Array(items)) => list_index(key, items.len()).and_then(|i| items.get(i)),
            _ => None,
        };
    }
    match current {
        Some(value) => render(value),
        None => Ok(String::new()),
    }
}

/// `set <key> <value>`
pub fn set(doc: &mut Document, args: &[String], now: NaiveDateTime) -> Result<()> {
    let key = required(args, 0, "set", "key")?;
    let value = required(args, 1, "set", "value")?;
    doc.insert(key.to_string(), parse_loose(value));
    touch(doc, now);
    Ok(())
}

/// `set-nested <key> <subkey> <value>`; the value is always stored as a string.
pub fn set_nested(doc: &mut Document, args: &[String], now: NaiveDateTime) -> Result<()> {
    let key = required(args, 0, "set-nested", "key")?;
    let subkey = required(args, 1, "set-nested", "subkey")?;
    let value = required(args, 2, "set-nested", "value")?;
    let slot = doc.entry(key).or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(map) = slot {
        map.insert(subkey.to_string(), Value::String(value.to_string()));
    }
    touch(doc, now);
    Ok(())
}

/// `delete-nested <key> <subkey>`
pub fn delete_nested(doc: &mut Document, args: &[String], now: NaiveDateTime) -> Result<()> {
    let key = required(args, 0, "delete-nested", "key")?;
    let subkey = required(args, 1, "delete-nested", "subkey")?;
    if let Some(Value::Object(map)) = doc.get_mut(key) {
        map.shift_remove(subkey);
    }
    touch(doc, now);
    Ok(())
}

/// `append <key> <value>`
pub fn append(doc: &mut Document, args: &[String], now: NaiveDateTime) -> Result<()> {
    let key = required(args, 0, "append", "key")?;
    let value = required(args, 1, "append", "value")?;
    let slot = doc.entry(key).or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    if let Value::Array(items) = slot {
        items.push(parse_loose(value));
    }
    touch(doc, now);
    Ok(())
}

/// `pop-list <key> <index>`; an out-of-range index removes nothing.
pub fn pop_list(doc: &mut Document, args: &[String], now: NaiveDateTime) -> Result<()> {
    let key = required(args, 0, "pop-list", "key")?;
    let index = parse_int(required(args, 1, "pop-list", "index")?, "pop-list", "index")?;
    if let Some(Value::Array(items)) = doc.get_mut(key) {
        if let Some(i) = usize::try_from(index).ok().filter(|&i| i < items.len()) {
            items.remove(i);
        }
    }
    touch(doc, now);
    Ok(())
}

/// Keys of the document, or of the object under `key`; empty when the target is not an object.
pub fn list_keys(doc: &Document, key: Option<&str>) -> Vec<String> {
    let target = match key {
        None => Some(doc),
        Some(k) => doc.get(k).and_then(Value::as_object),
    };
    target.map(|map| map.keys().cloned().collect()).unwrap_or_default()
}

/// Length of the array or object under `key`, else zero.
pub fn count(doc: &Document, key: &str) -> usize {
    match doc.get(key) {
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(map)) => map.len(),
        _ => 0,
    }
}

/// The whole document, pretty-printed with 2-space indentation.
pub fn dump(doc: &Document) -> Result<String> {
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Fields of a fresh project document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub color: String,
    pub task: String,
    pub notes: Vec<String>,
}

impl Project {
    /// The full document layout: metadata, empty links/time/ai, and both timestamps.
    pub fn into_document(self, now: NaiveDateTime) -> Document {
        let stamp = format_timestamp(now);
        let mut doc = Document::new();
        doc.insert("name".to_string(), Value::String(self.name));
        doc.insert("color".to_string(), Value::String(self.color));
        doc.insert("task".to_string(), Value::String(self.task));
        doc.insert("notes".to_string(), json!(self.notes));
        doc.insert("links".to_string(), json!({}));
        doc.insert("time".to_string(), json!([]));
        doc.insert("ai".to_string(), json!({}));
        doc.insert("created".to_string(), Value::String(stamp.clone()));
        doc.insert("updated".to_string(), Value::String(stamp));
        doc
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    Exists,
}

impl fmt::Display for InitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitOutcome::Created => write!(f, "created"),
            InitOutcome::Exists => write!(f, "exists"),
        }
    }
}

/// `init [name] [color]`: fills an empty document, leaves a non-empty one alone.
pub fn init(doc: &mut Document, args: &[String], now: NaiveDateTime) -> InitOutcome {
    if !doc.is_empty() {
        return InitOutcome::Exists;
    }
    let project = Project {
        name: args.first().cloned().unwrap_or_else(|| DEFAULT_NAME.to_string()),
        color: args.get(1).cloned().unwrap_or_default(),
        ..Project::default()
    };
    *doc = project.into_document(now);
    InitOutcome::Created
}

fn conf_line() -> &'static Regex {
    static CONF_LINE: OnceLock<Regex> = OnceLock::new();
    CONF_LINE.get_or_init(|| Regex::new(r"^(name|color|task|note)=(.*)$").expect("valid conf line pattern"))
}

/// Parses a legacy `key=value` project conf. Unknown lines are ignored; `note=` may repeat.
pub fn parse_conf(content: &str) -> Project {
    let mut project = Project::default();
    for line in content.lines() {
        let Some(caps) = conf_line().captures(line.trim()) else {
            continue;
        };
        let value = caps[2].to_string();
        match &caps[1] {
            "name" => project.name = value,
            "color" => project.color = value,
            "task" => project.task = value,
            _ => project.notes.push(value),
        }
    }
    project
}

/// `migrate-conf <conf-file>`: replaces the document with one built from the conf file. Returns the project name.
pub fn migrate_conf(doc: &mut Document, args: &[String], now: NaiveDateTime) -> Result<String> {
    let conf_path = Path::new(required(args, 0, "migrate-conf", "conf-file")?);
    if !conf_path.is_file() {
        return Err(ProjError::NotFound);
    }
    let project = parse_conf(&fs::read_to_string(conf_path)?);
    let name = project.name.clone();
    *doc = project.into_document(now);
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TIMESTAMP_FORMAT;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Document {
        match json!({
            "name": "Atlas",
            "links": { "repo": "https://example.com/atlas", "docs": "https://example.com/docs" },
            "notes": ["first", "zweite", { "n": 1 }],
            "done": false,
            "hours": 12,
            "nothing": null
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_get_scalars() {
        let doc = sample();
        assert_eq!(get(&doc, &args(&["name"])).unwrap(), "Atlas");
        assert_eq!(get(&doc, &args(&["hours"])).unwrap(), "12");
        assert_eq!(get(&doc, &args(&["done"])).unwrap(), "False");
        assert_eq!(get(&doc, &args(&["nothing"])).unwrap(), "None");
        assert_eq!(get(&doc, &args(&["missing"])).unwrap(), "");
    }

    #[test]
    fn test_get_literals_print_like_the_shell_expects() {
        let mut doc = Document::new();
        doc.insert("active".into(), json!(true));
        doc.insert("ai".into(), json!({ "session": null, "pinned": false }));
        assert_eq!(get(&doc, &args(&["active"])).unwrap(), "True");
        assert_eq!(get(&doc, &args(&["ai", "session"])).unwrap(), "None");
        assert_eq!(get(&doc, &args(&["ai", "pinned"])).unwrap(), "False");
        assert_eq!(get(&doc, &args(&["ai"])).unwrap(), r#"{"session": null, "pinned": false}"#);
        assert_eq!(get(&doc, &args(&["ai", "missing"])).unwrap(), "");
    }

    #[test]
    fn test_get_nested_and_indexed() {
        let doc = sample();
        assert_eq!(get(&doc, &args(&["links", "repo"])).unwrap(), "https://example.com/atlas");
        assert_eq!(get(&doc, &args(&["notes", "1"])).unwrap(), "zweite");
        assert_eq!(get(&doc, &args(&["notes", "-1", "n"])).unwrap(), "1");
        assert_eq!(get(&doc, &args(&["notes", "9"])).unwrap(), "");
        assert_eq!(get(&doc, &args(&["notes", "x"])).unwrap(), "");
        assert_eq!(get(&doc, &args(&["name", "deeper"])).unwrap(), "");
    }

    #[test]
    fn test_get_containers_one_line() {
        let doc = sample();
        assert_eq!(
            get(&doc, &args(&["links"])).unwrap(),
            r#"{"repo": "https://example.com/atlas", "docs": "https://example.com/docs"}"#
        );
        assert_eq!(get(&doc, &args(&["notes"])).unwrap(), r#"["first", "zweite", {"n": 1}]"#);
        let mut small = Document::new();
        small.insert("ai".into(), json!({ "tool": "Käfer" }));
        assert_eq!(get(&small, &[]).unwrap(), r#"{"ai": {"tool": "Käfer"}}"#);
        assert_eq!(get(&Document::new(), &[]).unwrap(), "{}");
    }

    #[test]
    fn test_set_parses_json_or_keeps_string() {
        let mut doc = sample();
        let now = at("2025-02-20T09:00:00");
        set(&mut doc, &args(&["hours", "40"]), now).unwrap();
        set(&mut doc, &args(&["task", "write docs"]), now).unwrap();
        set(&mut doc, &args(&["tags", r#"["a","b"]"#]), now).unwrap();
        assert_eq!(doc["hours"], json!(40));
        assert_eq!(doc["task"], json!("write docs"));
        assert_eq!(doc["tags"], json!(["a", "b"]));
        assert_eq!(doc["updated"], json!("2025-02-20T09:00:00"));
        assert_eq!(list_keys(&doc, None)[..2], ["name", "links"]);
    }

    #[test]
    fn test_set_missing_value() {
        let mut doc = Document::new();
        let err = set(&mut doc, &args(&["task"]), at("2025-02-20T09:00:00")).unwrap_err();
        assert!(err.to_string().contains("missing argument <value>"));
        assert!(doc.is_empty());
    }

    #[test]
    fn test_set_nested_creates_and_replaces() {
        let mut doc = sample();
        let now = at("2025-02-20T09:00:00");
        set_nested(&mut doc, &args(&["links", "ci", "https://ci"]), now).unwrap();
        set_nested(&mut doc, &args(&["name", "k", "{\"raw\": 1}"]), now).unwrap();
        set_nested(&mut doc, &args(&["ai", "session", "abc"]), now).unwrap();
        assert_eq!(doc["links"]["ci"], json!("https://ci"));
        assert_eq!(doc["name"], json!({ "k": "{\"raw\": 1}" }));
        assert_eq!(doc["ai"], json!({ "session": "abc" }));
        assert_eq!(doc.keys().next().map(String::as_str), Some("name"));
    }

    #[test]
    fn test_delete_nested_preserves_order() {
        let mut doc = sample();
        set_nested(&mut doc, &args(&["links", "ci", "x"]), at("2025-02-20T09:00:00")).unwrap();
        delete_nested(&mut doc, &args(&["links", "repo"]), at("2025-02-20T09:00:00")).unwrap();
        delete_nested(&mut doc, &args(&["links", "nope"]), at("2025-02-20T09:00:00")).unwrap();
        delete_nested(&mut doc, &args(&["missing", "nope"]), at("2025-02-20T09:00:00")).unwrap();
        assert_eq!(list_keys(&doc, Some("links")), vec!["docs", "ci"]);
        assert!(!doc.contains_key("missing"));
    }

    #[test]
    fn test_append_and_pop_list() {
        let mut doc = sample();
        let now = at("2025-02-20T09:00:00");
        append(&mut doc, &args(&["notes", "plain text"]), now).unwrap();
        append(&mut doc, &args(&["log", "{\"a\": 1}"]), now).unwrap();
        append(&mut doc, &args(&["name", "x"]), now).unwrap();
        assert_eq!(count(&doc, "notes"), 4);
        assert_eq!(doc["log"], json!([{ "a": 1 }]));
        assert_eq!(doc["name"], json!(["x"]));

        pop_list(&mut doc, &args(&["notes", "0"]), now).unwrap();
        pop_list(&mut doc, &args(&["notes", "10"]), now).unwrap();
        pop_list(&mut doc, &args(&["notes", "-1"]), now).unwrap();
        assert_eq!(doc["notes"], json!(["zweite", { "n": 1 }, "plain text"]));
    }

    #[test]
    fn test_pop_list_bad_index() {
        let mut doc = sample();
        let err = pop_list(&mut doc, &args(&["notes", "one"]), at("2025-02-20T09:00:00")).unwrap_err();
        assert!(matches!(err, ProjError::InvalidArgument { name: "index", .. }));
        assert_eq!(count(&doc, "notes"), 3);
    }

    #[test]
    fn test_list_keys_and_count() {
        let doc = sample();
        assert_eq!(list_keys(&doc, None), vec!["name", "links", "notes", "done", "hours", "nothing"]);
        assert_eq!(list_keys(&doc, Some("links")), vec!["repo", "docs"]);
        assert!(list_keys(&doc, Some("notes")).is_empty());
        assert!(list_keys(&doc, Some("missing")).is_empty());
        assert_eq!(count(&doc, "links"), 2);
        assert_eq!(count(&doc, "name"), 0);
        assert_eq!(count(&doc, "missing"), 0);
    }

    #[test]
    fn test_dump_pretty() {
        let mut doc = Document::new();
        doc.insert("name".into(), json!("Atlas"));
        doc.insert("notes".into(), json!(["a"]));
        assert_eq!(dump(&doc).unwrap(), "{\n  \"name\": \"Atlas\",\n  \"notes\": [\n    \"a\"\n  ]\n}");
    }

    #[test]
    fn test_init_creates_default_layout() {
        let mut doc = Document::new();
        let outcome = init(&mut doc, &args(&["Atlas", "blue"]), at("2025-02-20T09:00:00"));
        assert_eq!(outcome, InitOutcome::Created);
        assert_eq!(outcome.to_string(), "created");
        assert_eq!(
            list_keys(&doc, None),
            vec!["name", "color", "task", "notes", "links", "time", "ai", "created", "updated"]
        );
        assert_eq!(doc["name"], json!("Atlas"));
        assert_eq!(doc["color"], json!("blue"));
        assert_eq!(doc["time"], json!([]));
        assert_eq!(doc["created"], doc["updated"]);
    }

    #[test]
    fn test_init_defaults_and_exists() {
        let mut doc = Document::new();
        init(&mut doc, &[], at("2025-02-20T09:00:00"));
        assert_eq!(doc["name"], json!(DEFAULT_NAME));
        assert_eq!(doc["color"], json!(""));
        let outcome = init(&mut doc, &args(&["Other"]), at("2025-02-21T09:00:00"));
        assert_eq!(outcome.to_string(), "exists");
        assert_eq!(doc["name"], json!(DEFAULT_NAME));
        assert_eq!(doc["updated"], json!("2025-02-20T09:00:00"));
    }

    #[test]
    fn test_parse_conf() {
        let project = parse_conf("# legacy\nname=Atlas\n  color=red  \ntask=ship it\nnote=one\nbogus=1\nnote=two=2\n");
        assert_eq!(
            project,
            Project {
                name: "Atlas".into(),
                color: "red".into(),
                task: "ship it".into(),
                notes: vec!["one".into(), "two=2".into()],
            }
        );
    }

    #[test]
    fn test_migrate_conf_replaces_document() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("atlas.conf");
        fs::write(&conf, "name=Atlas\nnote=remember\n").unwrap();
        let mut doc = sample();
        let name = migrate_conf(&mut doc, &[conf.to_string_lossy().to_string()], at("2025-02-20T09:00:00")).unwrap();
        assert_eq!(name, "Atlas");
        assert_eq!(doc["notes"], json!(["remember"]));
        assert_eq!(doc["links"], json!({}));
        assert!(!doc.contains_key("hours"));
    }

    #[test]
    fn test_migrate_conf_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = sample();
        let missing = dir.path().join("none.conf").to_string_lossy().to_string();
        let err = migrate_conf(&mut doc, &[missing], at("2025-02-20T09:00:00")).unwrap_err();
        assert_eq!(err.to_string(), "not_found");
        let err = migrate_conf(&mut doc, &[dir.path().to_string_lossy().to_string()], at("2025-02-20T09:00:00")).unwrap_err();
        assert!(matches!(err, ProjError::NotFound));
        assert_eq!(doc["name"], json!("Atlas"));
    }
}
