use std::path::{Path, PathBuf};

use thiserror::Error;

/// Everything that can go wrong while compressing or decompressing.
#[derive(Error, Debug)]
pub enum Error {
    /// An argument broke a function's contract: an empty symbol set, a
    /// malformed tree packet, a corrupt payload and so on.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the argument
        message: String,
    },

    /// A file or stream could not be opened, read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file's extension does not match the requested operation.
    #[error("{}: {reason}", path.display())]
    FormatMismatch {
        /// The offending file
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },
}

impl Error {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn format_mismatch(path: &Path, reason: impl Into<String>) -> Self {
        Error::FormatMismatch {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
