use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors raised while decoding or encoding a KeyValues tree.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("unknown binary type tag 0x{tag:02x} at offset {offset}")]
    UnknownTag { tag: u8, offset: u64 },

    /// The stream ended inside a key, value or node. Sentinel framing means a
    /// truncated file always surfaces here.
    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("expected {expected} on line {line}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        line: usize,
    },

    #[error("node \"{key}\" opened on line {line} is never closed")]
    Unterminated { key: String, line: usize },

    #[error("invalid UTF-8 in {context}")]
    InvalidUtf8 { context: &'static str },

    #[error("nesting deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("{what} contains an embedded NUL byte")]
    EmbeddedNul { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl KvError {
    /// True for malformed input, false for failures of the underlying stream.
    pub fn is_format(&self) -> bool {
        !matches!(self, KvError::Io(_))
    }
}

pub type KvResult<T> = std::result::Result<T, KvError>;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup file not found: {}", path.display())]
    MissingBackup { path: PathBuf },

    #[error("cannot resolve the shortcuts file for identity \"{identity_key}\"")]
    UnresolvedTarget { identity_key: String },

    #[error("invalid identity key \"{identity_key}\"")]
    InvalidIdentityKey { identity_key: String },

    #[error("snapshot {} does not match its source", path.display())]
    VerificationFailed { path: PathBuf },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Codec(#[from] KvError),
}

impl BackupError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        BackupError::Io {
            context: context.into(),
            source,
        }
    }
}

pub type BackupResult<T> = std::result::Result<T, BackupError>;
