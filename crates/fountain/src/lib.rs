#![deny(missing_docs)]

//! # Overview
//!
//! The fountain packet type and the encoder that produces packets from a
//! file section. A packet is the in-memory unit both client and server
//! operate on: `{section, seed, num_blocks, payload, membership}`. Only
//! `section`, `seed`, `num_blocks` and `payload` cross the wire (see the
//! `wire` crate); `membership` is always recomputed from `seed` by whoever
//! receives the packet.
//!
//! # Invariants
//!
//! - `packet.membership.popcount() == packet.num_blocks`.
//! - Two packets encoded with the same `(section, seed)` against the same
//!   file contents are bit-identical.
//! - `packet.payload` equals the XOR of the blocks named by `membership`
//!   in the section's source bytes, short reads at EOF treated as zero.
//!
//! # See also
//!
//! - `decoder` consumes packets produced here to solve sections.
//! - `wire` serializes/deserializes the wire-visible subset of a packet.

mod packet;

use rng::Lcg;
use std::io::{Read, Seek, SeekFrom};
use thiserror::Error;
use std::time::{SystemTime, UNIX_EPOCH};

pub use packet::Packet;

/// Errors an [`Encoder`] can report for reasons other than a transient
/// per-packet I/O failure (those are swallowed and reported as `Ok(None)`,
/// per the `io_read` policy: drop the packet, let the caller try again).
#[derive(Debug, Error)]
pub enum EncodeError {
    /// `section_size` was zero; there is nothing to sample a degree from.
    #[error("section_size must be nonzero")]
    EmptySection,
    /// `blk_size` was zero.
    #[error("blk_size must be nonzero")]
    EmptyBlock,
}

/// Produces fountain packets for a single section of a file-like source.
///
/// Holds its own entropy generator, seeded once at construction from the
/// process clock, so repeated calls to [`encode`](Self::encode) draw fresh
/// `seed` values rather than deterministic ones (determinism only applies
/// *given* a seed, not to how fresh seeds are chosen).
pub struct Encoder<R> {
    entropy: Lcg,
    reader: R,
}

impl<R> Encoder<R>
where
    R: Read + Seek,
{
    /// Creates an encoder reading blocks from `reader`.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            entropy: Lcg::new(process_entropy_seed()),
            reader,
        }
    }

    /// Creates an encoder with an explicit entropy seed, for reproducible
    /// tests.
    #[must_use]
    pub fn with_seed(reader: R, entropy_seed: u64) -> Self {
        Self {
            entropy: Lcg::new(entropy_seed),
            reader,
        }
    }

    /// Produces one packet for `section` of a file laid out as
    /// `section_size` blocks of `blk_size` bytes each.
    ///
    /// Returns `Ok(None)` if any block read fails with a (non-EOF) I/O
    /// error: the caller is expected to drop the packet and let the next
    /// request retry, per this system's `io_read` policy. Short reads at
    /// EOF are not errors; the unread tail of the block is treated as
    /// zero.
    pub fn encode(
        &mut self,
        section: u16,
        section_size: u32,
        blk_size: u16,
    ) -> Result<Option<Packet>, EncodeError> {
        if section_size == 0 {
            return Err(EncodeError::EmptySection);
        }
        if blk_size == 0 {
            return Err(EncodeError::EmptyBlock);
        }

        let degree = rng::degree(section_size, &mut self.entropy);
        let seed = self.entropy.state();
        let membership = rng::membership(section_size, degree, seed);

        let mut payload = vec![0u8; blk_size as usize];
        let mut block_buf = vec![0u8; blk_size as usize];

        let mut bit = 0usize;
        while let Some(b) = membership.lowest_set_above(bit) {
            bit = b + 1;
            let offset = section_block_offset(section, section_size, blk_size, b as u32);
            if self.reader.seek(SeekFrom::Start(offset)).is_err() {
                return Ok(None);
            }
            block_buf.fill(0);
            match read_short(&mut self.reader, &mut block_buf) {
                Ok(()) => {}
                Err(_) => return Ok(None),
            }
            for (p, blk) in payload.iter_mut().zip(&block_buf) {
                *p ^= blk;
            }
        }

        Ok(Some(Packet {
            section,
            seed,
            num_blocks: degree,
            blk_size,
            payload,
            membership,
        }))
    }
}

/// Reads as much of `buf` as the reader has remaining, treating EOF as
/// implicit zero padding rather than an error. Only propagates genuine
/// I/O errors.
fn read_short<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Computes the absolute byte offset of block `block` within `section`,
/// given the file's fixed `section_size`/`blk_size` layout.
const fn section_block_offset(section: u16, section_size: u32, blk_size: u16, block: u32) -> u64 {
    let section_bytes = section_size as u64 * blk_size as u64;
    section as u64 * section_bytes + block as u64 * blk_size as u64
}

/// Derives a fresh entropy seed from the process clock. Not used for any
/// protocol determinism; only to avoid reusing the same `seed` sequence
/// across process restarts.
fn process_entropy_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    nanos ^ (std::process::id() as u64).wrapping_mul(0x9E3779B97F4A7C15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn encodes_single_block_section() {
        let data = vec![0x41u8];
        let mut enc = Encoder::with_seed(Cursor::new(data), 7);
        let packet = enc.encode(0, 1, 1).unwrap().unwrap();
        assert_eq!(packet.num_blocks, 1);
        assert_eq!(packet.payload, vec![0x41]);
        assert_eq!(packet.membership.popcount(), 1);
    }

    #[test]
    fn short_read_is_zero_padded() {
        let data = vec![0xFFu8]; // one byte, blk_size 4: tail 3 bytes are zero
        let mut enc = Encoder::with_seed(Cursor::new(data), 1);
        // Force a degree-1 packet against block 0 by retrying until we hit it;
        // membership derivation is deterministic from the entropy stream, so
        // just check whichever packet came out XORs consistently.
        let packet = enc.encode(0, 1, 4).unwrap().unwrap();
        assert_eq!(packet.payload, vec![0xFF, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn rejects_zero_section_size() {
        let mut enc = Encoder::with_seed(Cursor::new(Vec::<u8>::new()), 0);
        assert!(matches!(
            enc.encode(0, 0, 4),
            Err(EncodeError::EmptySection)
        ));
    }

    #[test]
    fn rejects_zero_block_size() {
        let mut enc = Encoder::with_seed(Cursor::new(Vec::<u8>::new()), 0);
        assert!(matches!(enc.encode(0, 4, 0), Err(EncodeError::EmptyBlock)));
    }

    #[test]
    fn repeated_encodes_draw_distinct_seeds() {
        let data = vec![0u8; 64];
        let mut enc = Encoder::with_seed(Cursor::new(data), 42);
        let a = enc.encode(0, 4, 4).unwrap().unwrap();
        let b = enc.encode(0, 4, 4).unwrap().unwrap();
        assert_ne!(a.seed, b.seed);
    }

    #[test]
    fn section_offset_accounts_for_section_index() {
        assert_eq!(section_block_offset(0, 4, 8, 0), 0);
        assert_eq!(section_block_offset(0, 4, 8, 1), 8);
        assert_eq!(section_block_offset(1, 4, 8, 0), 32);
    }

    #[test]
    fn payload_matches_manual_xor_of_membership_blocks() {
        let data: Vec<u8> = (0..32u8).collect();
        let mut enc = Encoder::with_seed(Cursor::new(data.clone()), 123);
        let packet = enc.encode(0, 8, 4).unwrap().unwrap();

        let mut expected = vec![0u8; 4];
        let mut bit = 0;
        while let Some(b) = packet.membership.lowest_set_above(bit) {
            bit = b + 1;
            let offset = b * 4;
            for i in 0..4 {
                expected[i] ^= data[offset + i];
            }
        }
        assert_eq!(packet.payload, expected);
    }
}
