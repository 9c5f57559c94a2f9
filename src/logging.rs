// Copyright (c) 2025 Robert August Vincent II <pillarsdotnet@gmail.com>
// Co-author: Cursor-AI.

//! Debug logging to stderr, switched on by `PROJ_DEBUG`.

use flexi_logger::{FlexiLoggerError, LogSpecification, Logger, LoggerHandle};
use std::env;

/// Environment variable that enables debug logging.
pub const DEBUG_ENV: &str = "PROJ_DEBUG";

/// Values that only switch logging on; they select `debug`.
const ON_SWITCHES: [&str; 5] = ["", "1", "true", "yes", "on"];

/// Maps the `PROJ_DEBUG` value to a log spec: a valid flexi_logger spec (`info`, `off`,
/// `proj::timelog=trace`) is used as-is, an on-switch or anything unparseable means `debug`.
fn level_spec(value: &str) -> &str {
    let value = value.trim();
    if ON_SWITCHES.contains(&value.to_ascii_lowercase().as_str()) {
        return "debug";
    }
    match LogSpecification::parse(value) {
        Ok(_) => value,
        Err(_) => "debug",
    }
}

/// Starts the stderr logger when `PROJ_DEBUG` is set. The returned handle must stay alive until exit.
pub fn init_logging() -> Result<Option<LoggerHandle>, FlexiLoggerError> {
    let value = match env::var(DEBUG_ENV) {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };
    let handle = Logger::try_with_str(level_spec(&value))?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()?;
    Ok(Some(handle))
}
