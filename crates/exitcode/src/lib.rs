#![deny(unsafe_code)]
#![deny(missing_docs)]

//! Process exit codes for `fountain-server` and `fountain-client`.
//!
//! This narrows the teacher's `core::exit_code` table down to the error
//! kinds this system actually produces (§7 of the design notes this crate
//! implements); the numeric values are kept the same where a kind is
//! shared, so a script grepping for "exit code 11" behaves the same way
//! across both tools.

use std::fmt;

/// An exit status for `fountain-server`/`fountain-client`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    /// Clean completion.
    Ok = 0,
    /// CLI argument error.
    Usage = 1,
    /// `protocol`/`unknown_magic` failure at a fatal site.
    Protocol = 2,
    /// `network` failure at a fatal site (bind, `recvfrom`, `sendto`).
    SocketIo = 10,
    /// `io_write` failure: output file or mapping could not be written.
    FileIo = 11,
    /// Allocation failure (`mem`/`packet_add`).
    Malloc = 22,
    /// `max_timeout` reached while the head cache stayed empty.
    Timeout = 30,
}

impl ExitCode {
    /// Returns the numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Returns a human-readable description, matching §7's "When" column.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Ok => "success",
            Self::Usage => "argument error",
            Self::Protocol => "protocol violation",
            Self::SocketIo => "socket I/O error",
            Self::FileIo => "file I/O error",
            Self::Malloc => "allocation failure",
            Self::Timeout => "timed out waiting for data",
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        let value = code.as_i32().clamp(0, 255) as u8;
        Self::from(value)
    }
}

/// Trait for error types that know which exit code they map to.
pub trait HasExitCode {
    /// Returns the exit code this error should terminate the process with.
    fn exit_code(&self) -> ExitCode;
}
