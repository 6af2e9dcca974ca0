#![deny(missing_docs)]

//! # Overview
//!
//! The wire codec: the byte layout of a fountain packet frame and of the
//! three control messages (`INFO_REQUEST`, `INFO_REPLY`, `WAIT`). Every
//! multi-byte integer is network byte order. A packet frame's checksum
//! covers every byte after itself; receivers drop a frame whose checksum
//! does not match rather than propagating an error, since a corrupted
//! datagram is an expected, non-fatal event on an unreliable transport.
//!
//! Membership is never sent on the wire: [`decode_packet`] recomputes it
//! from `(section_size, num_blocks, seed)` using the same derivation the
//! encoder used (see the `rng` crate), which is why every decode needs the
//! section size as context.
//!
//! # See also
//!
//! - `fountain::Packet` is the in-memory type this module serializes.
//! - `rng::membership` is what [`decode_packet`] calls to reconstruct the
//!   set this frame's payload was XORed over.

mod checksum;
mod control;
mod packet;

pub use checksum::fletcher16;
pub use control::{
    ControlMessage, FileInfo, SectionCapacity, WaitRequest, decode_control, encode_info_reply,
    encode_info_request, encode_wait, INFO_REPLY_MAGIC, INFO_REQUEST_MAGIC, WAIT_MAGIC,
};
pub use packet::{decode_packet, encode_packet};

use thiserror::Error;

/// Errors decoding a wire frame or control message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// The buffer was too short to contain a valid header.
    #[error("frame too short to contain a valid header")]
    Truncated,
    /// The Fletcher-16 checksum did not match the frame's contents.
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// `num_blocks` or `blk_size` was non-positive.
    #[error("packet header declared a non-positive num_blocks or blk_size")]
    InvalidHeader,
    /// The payload length did not match the declared `blk_size`.
    #[error("payload length does not match declared blk_size")]
    LengthMismatch,
    /// The control message magic did not match any known message type.
    #[error("unrecognised control message magic {0:#010x}")]
    UnknownMagic(u32),
}
