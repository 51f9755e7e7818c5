//! Failure taxonomy for both halves of the transfer.
//!
//! Every variant is fatal to the orchestration that produced it: nothing is
//! retried and no partial content is ever handed to the caller.

use reqwest::StatusCode;

/// Errors produced by metadata resolution, range parsing, chunk planning,
/// and fetch orchestration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The resource identifier did not resolve to readable bytes.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// A client-supplied range header was present but malformed. Signalled
    /// distinctly from "no range requested" so the server can answer 416
    /// instead of silently downgrading to a full response.
    #[error("malformed byte range: {0:?}")]
    RangeParse(String),

    /// The remote reported no Content-Length, so chunking cannot proceed.
    #[error("remote did not report a content length")]
    MissingSize,

    /// A chunk request settled with a non-success status.
    #[error("chunk request failed with status {status}")]
    ChunkFetch { status: StatusCode },

    /// Non-positive size or chunk size handed to the planner.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
