// src/error.rs

//! Crate-level error type shared by the storage engine and the server.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the catalogue, pack codec and server front-end.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An atomic commit could not open, write or rename its temp file.
    #[error("atomic commit of {path} failed: {source}")]
    IoFault {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A pack file on disk could not be inflated or parsed.
    #[error("corrupt pack {path}: {detail}")]
    CorruptPack { path: PathBuf, detail: String },

    /// The server configuration is unreadable or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// An inbound document was malformed or violated the protocol.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Passphrase verification failed.
    #[error("passphrase does not match for add-on '{0}'")]
    Unauthorized(String),

    /// The operation is refused for this add-on.
    #[error("operation denied for add-on '{0}'")]
    Denied(String),

    /// No add-on with that identifier exists (or it is hidden).
    #[error("add-on '{0}' not found")]
    NotFound(String),

    /// The add-on has no versions on record.
    #[error("no versions of add-on '{0}' are available")]
    NoVersions(String),

    /// A specific requested version does not exist.
    #[error("version {version} of add-on '{addon}' not found")]
    UnknownVersion { addon: String, version: String },

    /// A delta upload arrived for an add-on the server does not know.
    #[error("received a delta for unknown add-on '{0}'")]
    UnexpectedDelta(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an I/O error with the path of the file being committed.
    pub fn commit(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::IoFault {
            path: path.into(),
            source,
        }
    }

    /// Wrap a decode failure with the path of the offending pack.
    pub fn corrupt(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::CorruptPack {
            path: path.into(),
            detail: detail.into(),
        }
    }
}
