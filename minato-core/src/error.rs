use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the table pipelines and the transport layer.
#[derive(Error, Debug)]
pub enum Error {
    /// The shard directory could not be listed at open time.
    #[error("storage directory {dir:?} unavailable: {source}")]
    StorageUnavailable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A shard file violated the frame format. Readers treat the shard
    /// as exhausted at the first malformed frame.
    #[error("malformed shard {path:?}: {detail}")]
    MalformedShard { path: PathBuf, detail: String },

    /// A peer failed to acknowledge a completion barrier in time.
    #[error("peer did not acknowledge within {waited:?}")]
    PeerUnresponsive { waited: Duration },

    #[error("transport error: {message}")]
    Transport { message: String },

    /// A channel endpoint hung up while the other side was still using it.
    #[error("{channel} channel closed")]
    Closed { channel: &'static str },

    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}
