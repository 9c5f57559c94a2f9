// Copyright (c) 2025 Robert August Vincent II <pillarsdotnet@gmail.com>
// Co-author: Cursor-AI.

//! # proj — project document helper
//!
//! Edits one JSON document per project (name, notes, links, AI context) and keeps a
//! start/stop time log inside it. Called by the shell front end once per operation:
//!
//! ```text
//! proj <file> <operation> [args...]
//! ```
//!
//! A missing or corrupt document is treated as `{}`. Mutating operations stamp
//! `updated` and rewrite the file with 2-space indentation.
//!
//! ## Operations
//!
//! | Operation       | Description |
//! |-----------------|-------------|
//! | `get`           | Print the value at a key path (`get links repo`, `get notes 0`). |
//! | `set`           | Set a key; the value is stored as JSON if it parses, else as a string. |
//! | `set-nested`    | Set a string under an object key. |
//! | `delete-nested` | Remove a key from an object key. |
//! | `append`        | Append to an array key. |
//! | `pop-list`      | Remove an array element by index. |
//! | `list-keys`     | Print the keys of the document or of an object key. |
//! | `count`         | Print the length of an array/object key. |
//! | `dump`          | Print the whole document. |
//! | `init`          | Create the default document if empty; prints `created` or `exists`. |
//! | `migrate-conf`  | Build the document from a legacy `key=value` conf file. |
//! | `time-start`    | Open a work session unless one is running. |
//! | `time-stop`     | Close the running session and print its duration. |
//! | `time-status`   | Print the running session and elapsed time, or `idle`. |
//! | `time-log`      | Print sessions from the last N days (default 30) and their total. |
//!
//! Set `PROJ_DEBUG` (any value, or a level such as `trace`) to log debug messages to stderr.

mod document;
mod edit;
mod error;
mod logging;
mod timelog;

use log::debug;
use std::env;
use std::path::Path;
use std::process;

use crate::error::{ProjError, Result};

const USAGE: &str = "Usage: proj <file> <operation> [args...]
Operations:
  get [key...]                 set <key> <value>
  set-nested <key> <sub> <v>   delete-nested <key> <sub>
  append <key> <value>         pop-list <key> <index>
  list-keys [key]              count <key>
  dump                         init [name] [color]
  migrate-conf <conf-file>
  time-start                   time-stop
  time-status                  time-log [days]";

/// Runs one operation against the document at `args[0]`.
fn run(args: &[String]) -> Result<()> {
    let (file, op, rest) = match args {
        [file, op, rest @ ..] => (Path::new(file), op.as_str(), rest),
        _ => return Err(ProjError::Usage(USAGE)),
    };
    debug!("dispatching {:?} on {} with {} args", op, file.display(), rest.len());
    let mut doc = document::load(file);
    let now = document::now();

    match op {
        "get" => println!("{}", edit::get(&doc, rest)?),
        "set" => {
            edit::set(&mut doc, rest, now)?;
            document::save(file, &doc)?;
        }
        "set-nested" => {
            edit::set_nested(&mut doc, rest, now)?;
            document::save(file, &doc)?;
        }
        "delete-nested" => {
            edit::delete_nested(&mut doc, rest, now)?;
            document::save(file, &doc)?;
        }
        "append" => {
            edit::append(&mut doc, rest, now)?;
            document::save(file, &doc)?;
        }
        "pop-list" => {
            edit::pop_list(&mut doc, rest, now)?;
            document::save(file, &doc)?;
        }
        "list-keys" => {
            for key in edit::list_keys(&doc, rest.first().map(String::as_str)) {
                println!("{}", key);
            }
        }
        "count" => {
            let key = edit::required(rest, 0, "count", "key")?;
            println!("{}", edit::count(&doc, key));
        }
        "dump" => println!("{}", edit::dump(&doc)?),
        "init" => {
            let outcome = edit::init(&mut doc, rest, now);
            if outcome == edit::InitOutcome::Created {
                document::save(file, &doc)?;
            }
            println!("{}", outcome);
        }
        "migrate-conf" => {
            let name = edit::migrate_conf(&mut doc, rest, now)?;
            document::save(file, &doc)?;
            println!("migrated:{}", name);
        }
        "time-start" => {
            let outcome = timelog::start(&mut doc, now);
            if outcome.changed() {
                document::save(file, &doc)?;
            }
            println!("{}", outcome);
        }
        "time-stop" => {
            let outcome = timelog::stop(&mut doc, now);
            if outcome.changed() {
                document::save(file, &doc)?;
            }
            println!("{}", outcome);
        }
        "time-status" => println!("{}", timelog::status(&doc, now)),
        "time-log" => {
            let days = match rest.first() {
                Some(d) => edit::parse_int(d, "time-log", "days")?,
                None => timelog::DEFAULT_LOG_DAYS,
            };
            println!("{}", timelog::log(&doc, now, days));
        }
        _ => return Err(ProjError::UnknownOperation(op.to_string())),
    }
    Ok(())
}

fn main() {
    let _logger = logging::init_logging().unwrap_or_else(|e| {
        eprintln!("proj: debug logging unavailable: {}", e);
        None
    });
    // Exit quietly when stdout is a closed pipe (`proj f dump | head`).
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
    let args: Vec<String> = env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        debug!("failed: {:?}", e);
        eprintln!("{}", e);
        process::exit(1);
    }
}
