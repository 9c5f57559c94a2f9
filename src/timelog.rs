// Copyright (c) 2025 Robert August Vincent II <pillarsdotnet@gmail.com>
// Co-author: Cursor-AI.

//! # Time log
//!
//! Work sessions live in the document's `time` array, one object per session:
//!
//! - `{"start": "2025-02-20T09:00:00", "stop": null}` while running
//! - `{"start": "2025-02-20T09:00:00", "stop": "2025-02-20T10:30:00"}` once stopped
//!
//! At most one entry is open at a time. Elements that are not objects, lack a parseable
//! `start`, or carry an unparseable `stop` are skipped by every scan; nothing here fails
//! on document shape.
//!
//! Durations print as `Hh Mm` for single events (`time-stop`, `time-status`) and as
//! `Hh MMm` in the log report and its total.

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use log::debug;
use serde_json::{json, Value};
use std::fmt;

use crate::document::{format_timestamp, parse_timestamp, touch, Document};

/// Days covered by `time-log` when no argument is given.
pub const DEFAULT_LOG_DAYS: i64 = 30;

/// Document key holding the entries.
const TIME_KEY: &str = "time";

/// Whole seconds between two timestamps. Negative when the clock went backwards; never clamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Elapsed(i64);

impl Elapsed {
    pub fn between(start: NaiveDateTime, stop: NaiveDateTime) -> Self {
        Elapsed((stop - start).num_seconds())
    }

    /// Hours by floor division, minutes from the non-negative remainder.
    fn hours_minutes(self) -> (i64, i64) {
        (self.0.div_euclid(3600), self.0.rem_euclid(3600) / 60)
    }

    /// Report form with two-digit minutes (`1h 05m`).
    pub fn padded(self) -> Padded {
        Padded(self)
    }
}

impl std::ops::Add for Elapsed {
    type Output = Elapsed;

    fn add(self, other: Elapsed) -> Elapsed {
        Elapsed(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, m) = self.hours_minutes();
        write!(f, "{}h {}m", h, m)
    }
}

/// [`Elapsed`] with zero-padded minutes, as used by the log report.
pub struct Padded(Elapsed);

impl fmt::Display for Padded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, m) = self.0.hours_minutes();
        write!(f, "{}h {:02}m", h, m)
    }
}

/// State of an entry's `stop` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stop {
    Open,
    At(NaiveDateTime),
    Malformed,
}

/// A well-formed view of one element of the `time` array.
#[derive(Debug)]
struct Entry<'a> {
    /// `start` exactly as stored; reports echo it unchanged.
    start_raw: &'a str,
    start: NaiveDateTime,
    stop: Stop,
}

impl Entry<'_> {
    fn is_open(&self) -> bool {
        self.stop == Stop::Open
    }
}

/// Missing, null, false, zero, and empty values all leave an entry open.
fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Reads an element of the `time` array; `None` if it is not an object with a parseable `start`.
fn read_entry(v: &Value) -> Option<Entry<'_>> {
    let obj = v.as_object()?;
    let start_raw = obj.get("start")?.as_str()?;
    let start = parse_timestamp(start_raw)?;
    let stop = match obj.get("stop") {
        None => Stop::Open,
        Some(s) if is_blank(s) => Stop::Open,
        Some(Value::String(s)) => parse_timestamp(s).map(Stop::At).unwrap_or(Stop::Malformed),
        Some(_) => Stop::Malformed,
    };
    Some(Entry { start_raw, start, stop })
}

/// The `time` array, replacing a missing or non-array value with an empty one.
fn entries_mut(doc: &mut Document) -> &mut Vec<Value> {
    let slot = doc.entry(TIME_KEY).or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => items,
        _ => unreachable!("time slot was just set to an array"),
    }
}

fn entries(doc: &Document) -> &[Value] {
    match doc.get(TIME_KEY) {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// A session was already open; carries its start.
    AlreadyRunning(String),
    /// A new session was appended; carries its start.
    Started(String),
}

impl StartOutcome {
    /// Whether the document changed and must be saved.
    pub fn changed(&self) -> bool {
        matches!(self, StartOutcome::Started(_))
    }
}

impl fmt::Display for StartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartOutcome::AlreadyRunning(start) => write!(f, "running:{}", start),
            StartOutcome::Started(start) => write!(f, "started:{}", start),
        }
    }
}

/// Opens a session at `now` unless one is already open anywhere in the log.
pub fn start(doc: &mut Document, now: NaiveDateTime) -> StartOutcome {
    let items = entries_mut(doc);
    if let Some(open) = items.iter().filter_map(read_entry).find(Entry::is_open) {
        debug!("time-start: session already open since {}", open.start_raw);
        return StartOutcome::AlreadyRunning(open.start_raw.to_string());
    }
    let stamp = format_timestamp(now);
    items.push(json!({ "start": stamp, "stop": null }));
    touch(doc, now);
    debug!("time-start: opened session at {}", stamp);
    StartOutcome::Started(stamp)
}

#[derive(Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped {
        start: String,
        stop: String,
        elapsed: Elapsed,
    },
    NoTimer,
}

impl StopOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, StopOutcome::Stopped { .. })
    }
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopOutcome::Stopped { start, stop, elapsed } => {
                write!(f, "stopped:{}:{}:{}", start, stop, elapsed)
            }
            StopOutcome::NoTimer => write!(f, "no_timer"),
        }
    }
}

/// Closes the most recent open session at `now`.
pub fn stop(doc: &mut Document, now: NaiveDateTime) -> StopOutcome {
    let items = match doc.get_mut(TIME_KEY) {
        Some(Value::Array(items)) => items,
        _ => return StopOutcome::NoTimer,
    };
    let stamp = format_timestamp(now);
    let mut closed = None;
    for item in items.iter_mut().rev() {
        let (start_raw, start) = match read_entry(item) {
            Some(entry) if entry.is_open() => (entry.start_raw.to_string(), entry.start),
            _ => continue,
        };
        if let Value::Object(obj) = item {
            obj.insert("stop".to_string(), Value::String(stamp.clone()));
        }
        closed = Some((start_raw, start));
        break;
    }
    let Some((start_raw, start)) = closed else {
        debug!("time-stop: no open session");
        return StopOutcome::NoTimer;
    };
    touch(doc, now);
    debug!("time-stop: closed session {} .. {}", start_raw, stamp);
    StopOutcome::Stopped {
        start: start_raw,
        stop: stamp,
        elapsed: Elapsed::between(start, now),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Status {
    Running { start: String, elapsed: Elapsed },
    Idle,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Running { start, elapsed } => write!(f, "running:{}:{}", start, elapsed),
            Status::Idle => write!(f, "idle"),
        }
    }
}

/// Reports the most recent open session and how long it has been running.
pub fn status(doc: &Document, now: NaiveDateTime) -> Status {
    match entries(doc).iter().rev().filter_map(read_entry).find(Entry::is_open) {
        Some(open) => Status::Running {
            start: open.start_raw.to_string(),
            elapsed: Elapsed::between(open.start, now),
        },
        None => Status::Idle,
    }
}

/// One line of the `time-log` report; `stop` is `None` while the session is still open.
#[derive(Debug, PartialEq, Eq)]
pub struct LogRow {
    pub start: NaiveDateTime,
    pub stop: Option<NaiveDateTime>,
}

impl LogRow {
    pub fn elapsed(&self) -> Option<Elapsed> {
        self.stop.map(|stop| Elapsed::between(self.start, stop))
    }
}

impl fmt::Display for LogRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|", self.start.format("%Y-%m-%d"), self.start.format("%H:%M"))?;
        match (self.stop, self.elapsed()) {
            (Some(stop), Some(elapsed)) => write!(f, "{}|{}", stop.format("%H:%M"), elapsed.padded()),
            _ => write!(f, "running|--"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct LogReport {
    pub rows: Vec<LogRow>,
    /// Sum over closed rows only.
    pub total: Elapsed,
}

impl fmt::Display for LogReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            writeln!(f, "{}", row)?;
        }
        write!(f, "TOTAL|{}|{} entries", self.total.padded(), self.rows.len())
    }
}

/// Local midnight `days` days before `now`'s date. Saturates when `days` is out of range.
pub fn cutoff(now: NaiveDateTime, days: i64) -> NaiveDateTime {
    let midnight = now.date().and_time(NaiveTime::MIN);
    TimeDelta::try_days(days)
        .and_then(|d| midnight.checked_sub_signed(d))
        .unwrap_or(if days > 0 { NaiveDateTime::MIN } else { NaiveDateTime::MAX })
}

/// Lists sessions starting on or after [`cutoff`], in stored order, with the closed-session total.
pub fn log(doc: &Document, now: NaiveDateTime, days: i64) -> LogReport {
    let cutoff = cutoff(now, days);
    let mut rows = Vec::new();
    let mut total = Elapsed::default();
    for entry in entries(doc).iter().filter_map(read_entry) {
        if entry.start < cutoff {
            continue;
        }
        let row = match entry.stop {
            Stop::Open => LogRow { start: entry.start, stop: None },
            Stop::At(stop) => LogRow { start: entry.start, stop: Some(stop) },
            Stop::Malformed => continue,
        };
        if let Some(elapsed) = row.elapsed() {
            total = total + elapsed;
        }
        rows.push(row);
    }
    debug!("time-log: {} rows since {}", rows.len(), format_timestamp(cutoff));
    LogReport { rows, total }
}
