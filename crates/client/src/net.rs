//! Small helpers shared by the handshake and the cache ring's feed loop.

use std::io::ErrorKind;

/// The largest datagram this client ever sends or receives: a maximal
/// `WAIT`/control message or a maximal fountain packet
/// (`blk_size <= 16384` plus an 18-byte header), rounded up.
pub const RECV_BUF_LEN: usize = 65536;

/// Whether `err` represents a `recv` timing out rather than a real
/// failure, across the two `ErrorKind`s platforms use for it.
pub fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
