//! Server error type and its mapping to process exit codes.

use crate::sizing::BlockSizeError;
use exitcode::{ExitCode, HasExitCode};
use pathutil::PathError;
use thiserror::Error;

/// Errors that can terminate the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding the socket, or reading the pinned file's metadata, failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The requested `--blocksize` was out of range.
    #[error("invalid block size: {0}")]
    BlockSize(#[from] BlockSizeError),
    /// The pinned file's name could not be sanitised for advertisement.
    #[error("unsafe file name: {0}")]
    Path(#[from] PathError),
}

impl HasExitCode for ServerError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Io(_) => ExitCode::FileIo,
            Self::BlockSize(_) => ExitCode::Usage,
            Self::Path(_) => ExitCode::Protocol,
        }
    }
}

impl ServerError {
    /// Returns the process exit code this error maps to.
    #[must_use]
    pub fn exit_code(&self) -> std::process::ExitCode {
        HasExitCode::exit_code(self).into()
    }
}

#[cfg(test)]
mod tests {
    use super::ServerError;
    use crate::sizing::BlockSizeError;
    use exitcode::{ExitCode, HasExitCode};
    use pathutil::PathError;

    #[test]
    fn block_size_error_maps_to_usage() {
        let err = ServerError::BlockSize(BlockSizeError::TooLarge(99999));
        assert_eq!(HasExitCode::exit_code(&err), ExitCode::Usage);
    }

    #[test]
    fn path_error_maps_to_protocol() {
        let err = ServerError::Path(PathError::TooManySegments(999));
        assert_eq!(HasExitCode::exit_code(&err), ExitCode::Protocol);
    }
}
