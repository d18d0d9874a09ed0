use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection error ({path}): {source}")]
    Connection {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{op} error: {source}")]
    Statement {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("IO error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Connection { .. } => "ConnectionError",
            Error::Statement { .. } => "StatementError",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::AlreadyExists(_) => "AlreadyExists",
            Error::Io { .. } => "IoError",
        }
    }
}

/// Tags an engine error with the name of the operation that hit it.
pub(crate) trait StatementContext<T> {
    fn op(self, op: &'static str) -> Result<T>;
}

impl<T> StatementContext<T> for std::result::Result<T, rusqlite::Error> {
    fn op(self, op: &'static str) -> Result<T> {
        self.map_err(|source| Error::Statement { op, source })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
