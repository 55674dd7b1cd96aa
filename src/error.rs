use std::path::PathBuf;

use crate::rc::ReturnCode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{kind} is already closed")]
    Closed { kind: &'static str },

    #[error("failed to open {kind}: {message} [{rc}]")]
    OpenFailed {
        kind: &'static str,
        rc: ReturnCode,
        message: String,
    },

    #[error("{message} [{rc}]")]
    Native { rc: ReturnCode, message: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}

impl Error {
    /// The native return code carried by this error, if any.
    pub fn rc(&self) -> Option<ReturnCode> {
        match self {
            Error::OpenFailed { rc, .. } | Error::Native { rc, .. } => {
                Some(*rc)
            }
            Error::InvalidArgument(_) => Some(ReturnCode::InvalidArgument),
            _ => None,
        }
    }

    /// Whether this error reports use of a released object.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed { .. })
    }

    /// Return code an engine reports when one of its own operations fails
    /// with this error.
    pub(crate) fn native_rc(&self) -> ReturnCode {
        match self {
            Error::Io(_) => ReturnCode::InputOutputError,
            Error::Tantivy(_) => ReturnCode::FileCorrupt,
            Error::Closed { .. } => ReturnCode::OperationNotPermitted,
            other => other.rc().unwrap_or(ReturnCode::UnknownError),
        }
    }
}
