use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Library error type for a single display cycle.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("base url {url:?} is invalid: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The API key contains bytes that are not valid in an HTTP header.
    #[error("api key is not a valid header value")]
    InvalidApiKey,

    /// Transport-level failure: connect, timeout, or body read.
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The random-asset response was not the expected JSON array.
    #[error("malformed asset list from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("asset id must not be empty")]
    EmptyAssetId,

    /// Writing the downloaded image failed.
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The display program could not be launched or exited unsuccessfully.
    #[error("display command `{command}` failed: {reason}")]
    Display { command: String, reason: String },

    #[error("display command `{command}` did not finish within {}", humantime::format_duration(*timeout))]
    DisplayTimeout { command: String, timeout: Duration },
}

pub type Result<T> = std::result::Result<T, Error>;
