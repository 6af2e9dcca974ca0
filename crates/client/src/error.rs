//! Client error type and its mapping to process exit codes.

use exitcode::{ExitCode, HasExitCode};
use hold::HoldError;
use pathutil::PathError;
use thiserror::Error;

/// Errors that can terminate the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket setup or I/O failed.
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),
    /// The server's `INFO_REPLY` failed basic sanity checks.
    #[error("protocol error: {0}")]
    Protocol(#[from] wire::WireError),
    /// The advertised file name could not be sanitised.
    #[error("unsafe file name: {0}")]
    Path(#[from] PathError),
    /// The packet hold could not grow to admit a packet.
    #[error("allocation failure: {0}")]
    Hold(#[from] HoldError),
    /// `max_timeout` was reached while a section's head cache stayed
    /// empty.
    #[error("timed out waiting for section {section} (received {received} packets, {discarded} discarded)")]
    Timeout {
        /// The section that stalled.
        section: u32,
        /// Packets received in this transfer before the stall.
        received: u64,
        /// Packets discarded in this transfer before the stall.
        discarded: u64,
    },
    /// The server advertised nonsensical file metadata.
    #[error("invalid file metadata: {0}")]
    InvalidMetadata(&'static str),
}

impl HasExitCode for ClientError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Network(_) => ExitCode::SocketIo,
            Self::Protocol(_) | Self::InvalidMetadata(_) => ExitCode::Protocol,
            Self::Path(_) => ExitCode::Protocol,
            Self::Hold(_) => ExitCode::Malloc,
            Self::Timeout { .. } => ExitCode::Timeout,
        }
    }
}

impl ClientError {
    /// Returns the process exit code this error maps to.
    #[must_use]
    pub fn exit_code(&self) -> std::process::ExitCode {
        HasExitCode::exit_code(self).into()
    }
}

impl From<decoder::DecodeError<std::convert::Infallible>> for ClientError {
    fn from(err: decoder::DecodeError<std::convert::Infallible>) -> Self {
        match err {
            decoder::DecodeError::Sink(never) => match never {},
            decoder::DecodeError::Hold(hold_err) => Self::Hold(hold_err),
        }
    }
}
