use std::io;
use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;
use tokio::task::JoinError;

/// Broad classification of a [TransferError], for callers that branch on the failure class rather
/// than on the exact variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferErrorKind {
    /// Opening, reading or writing a local file or caller-supplied stream failed.
    LocalIo,
    /// The upload sources could not be turned into a request body.
    Encoding,
    /// The request never produced a response.
    Transport,
    /// The server answered with a non-success status.
    Server,
    Cancelled,
    Internal,
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("Neither destination path nor writer was set in download source")]
    MissingDestination,

    #[error("Neither file name nor path was set in upload source")]
    MissingSourceName,

    #[error("Neither reader nor path was set in upload source {name}")]
    MissingSourceData { name: String },

    #[error("malformed multipart body: {0}")]
    MalformedMultipart(String),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Transport(#[from] reqwest_middleware::Error),

    /// The message is the response body exactly as the server sent it.
    #[error("{body}")]
    Server { status: StatusCode, body: String },

    #[error("transfer cancelled")]
    Cancelled,

    #[error("transfer task failed: {0}")]
    TaskJoin(#[from] JoinError),

    #[error("transfer task ended without reporting a result")]
    Abandoned,
}

pub type Result<T> = std::result::Result<T, TransferError>;

impl TransferError {
    pub fn kind(&self) -> TransferErrorKind {
        match self {
            TransferError::Open { .. } | TransferError::Io(_) | TransferError::MissingDestination => {
                TransferErrorKind::LocalIo
            },
            TransferError::MissingSourceName
            | TransferError::MissingSourceData { .. }
            | TransferError::MalformedMultipart(_) => TransferErrorKind::Encoding,
            TransferError::InvalidUrl(_) | TransferError::Transport(_) => TransferErrorKind::Transport,
            TransferError::Server { .. } => TransferErrorKind::Server,
            TransferError::Cancelled => TransferErrorKind::Cancelled,
            TransferError::TaskJoin(_) | TransferError::Abandoned => TransferErrorKind::Internal,
        }
    }

    /// Status code of a server rejection.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransferError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransferError::Cancelled)
    }

    /// True when the write side of the upload pipe failed because the reading side went away.  Such
    /// an error is only a symptom; whatever stopped the reader is the real failure.
    pub(crate) fn is_broken_pipe(&self) -> bool {
        matches!(self, TransferError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe)
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(value: reqwest::Error) -> Self {
        TransferError::Transport(reqwest_middleware::Error::Reqwest(value))
    }
}
