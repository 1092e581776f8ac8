use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TabError>;

/// Errors raised while resolving a file down to its metadata.
///
/// These never cross [`crate::parse_metadata`] or [`crate::TabParser::metadata`], which degrade
/// to the sentinel record instead. They are exposed through
/// [`crate::TabParser::try_metadata`] for diagnostics.
#[derive(Debug, Error)]
pub enum TabError {
    #[error("input is too short to identify ({len} bytes, need at least {min})")]
    TooShort { len: usize, min: usize },

    #[error("compressed container is corrupt")]
    ContainerCorrupt {
        #[source]
        source: InflateError,
    },

    #[error("no GPIF document could be located inside the container")]
    MetadataNotLocated,

    #[error("failed to extract the GPIF document from the archive")]
    Zip(#[from] ZipError),

    #[error("Failed to open file {}", path.display())]
    FailedToOpenFile {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

#[derive(Debug, Error)]
pub enum ZipError {
    #[error("end of central directory signature not found")]
    EndOfCentralDirectoryNotFound,

    #[error("Offset {offset}: truncated {what}")]
    Truncated { what: &'static str, offset: usize },

    #[error("Offset {offset}: invalid {what} signature `{magic:02X?}`")]
    InvalidSignature {
        what: &'static str,
        magic: [u8; 4],
        offset: usize,
    },

    #[error("entry `{name}` not found in central directory")]
    EntryNotFound { name: String },

    #[error("entry `{name}` uses unsupported compression method {method}")]
    UnsupportedCompression { name: String, method: u16 },

    #[error("failed to inflate entry")]
    Inflate(#[from] InflateError),
}

#[derive(Debug, Error)]
pub enum InflateError {
    #[error("neither raw deflate nor zlib produced output for {input_len} bytes of input")]
    Exhausted { input_len: usize },
}
