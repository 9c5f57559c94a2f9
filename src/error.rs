// Copyright (c) 2025 Robert August Vincent II <pillarsdotnet@gmail.com>
// Co-author: Cursor-AI.

//! Error type shared by every operation. Only `main` turns these into output.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjError {
    /// Too few command-line arguments; carries the usage text.
    #[error("{0}")]
    Usage(&'static str),

    #[error("proj {op}: missing argument <{name}>")]
    MissingArgument { op: &'static str, name: &'static str },

    #[error("proj {op}: invalid {name}: {value}")]
    InvalidArgument {
        op: &'static str,
        name: &'static str,
        value: String,
    },

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Printed verbatim; shell callers match on it.
    #[error("not_found")]
    NotFound,

    #[error("proj: {0}")]
    Io(#[from] std::io::Error),

    #[error("proj: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProjError>;
