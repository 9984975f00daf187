//! Error taxonomy for the enrichment and merge stages.
//!
//! `Config`, `Auth` and `Fetch` stop a run. `Data` and `Merge` describe a
//! stage that cannot produce output from what it was given; stage runners
//! report them and carry on (see `stages::settle`).

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Last outcome seen by the fetcher before it gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Server answered with a non-2xx status
    Status(u16),
    /// No response at all (timeout, connection reset, DNS)
    Transport(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Status(code) => write!(f, "HTTP {}", code),
            FetchFailure::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request to {url} failed after {attempts} attempts ({last})")]
    Fetch {
        url: String,
        attempts: usize,
        last: FetchFailure,
    },

    #[error("data error: {0}")]
    Data(String),

    #[error("merge produced no rows: {0}")]
    Merge(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Short, stable name used as the `kind` field of log records.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Auth(_) => "auth",
            Error::Fetch { .. } => "fetch",
            Error::Data(_) => "data",
            Error::Merge(_) => "merge",
            Error::Io(_) => "io",
            Error::Csv(_) => "csv",
            Error::Json(_) => "json",
            Error::Http(_) => "http",
        }
    }

    /// Whether a stage may report this error and exit cleanly.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Data(_) | Error::Merge(_))
    }

    /// HTTP status of the last attempt, if the failure was a status code.
    pub fn last_status(&self) -> Option<u16> {
        match self {
            Error::Fetch {
                last: FetchFailure::Status(code),
                ..
            } => Some(*code),
            _ => None,
        }
    }
}
