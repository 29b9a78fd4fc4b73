use std::path::PathBuf;

use crate::Hash;

/// error type for zub-dump operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("repository not found at {0}")]
    NoRepo(PathBuf),

    #[error("repository already exists at {0}")]
    RepoExists(PathBuf),

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("invalid ref name: {0}")]
    InvalidRef(String),

    #[error("path not found in snapshot: {0}")]
    PathNotFound(String),

    #[error("object not found: {0}")]
    ObjectNotFound(Hash),

    #[error("corrupt object: hash mismatch for {0}")]
    CorruptObject(Hash),

    #[error("invalid tree entry name: {0}")]
    InvalidEntryName(String),

    #[error("duplicate tree entry name: {0}")]
    DuplicateEntryName(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cbor serialization error: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("cbor deserialization error: {0}")]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),

    #[error("invalid object type: {0}")]
    InvalidObjectType(String),

    #[error("cannot make {path} relative to {root}")]
    PathResolution { path: String, root: String },

    #[error("{op}: writing entry header failed: {source}")]
    HeaderWrite {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{op}: reading content of {path} failed: {source}")]
    ContentRead {
        op: &'static str,
        path: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{op}: writing link target of {path} failed: {source}")]
    LinkWrite {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{op}: loading directory {path} failed: {source}")]
    TreeLoad {
        op: &'static str,
        path: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{op}: finalizing archive failed: {source}")]
    Finalize {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("size mismatch for {path}: expected {expected} bytes, blocks hold {actual}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("archive writer already closed")]
    WriterClosed,

    #[error("unsupported archive format: {0}")]
    UnknownFormat(String),

    #[error("{0} archives need a seekable output")]
    SeekRequired(&'static str),

    #[error("dump cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
