//! Packet frame layout:
//! `[u16 checksum][i32 num_blocks][i16 blk_size][u16 section][u64 seed][payload]`.

use crate::WireError;
use crate::checksum::fletcher16;
use fountain::Packet;

const HEADER_LEN: usize = 2 + 4 + 2 + 2 + 8;

/// Serializes `packet` into a wire frame, computing its checksum.
///
/// `membership` is not serialized; a receiver recomputes it from
/// `(section_size, num_blocks, seed)`.
#[must_use]
pub fn encode_packet(packet: &Packet) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + packet.payload.len());
    buf.extend_from_slice(&[0, 0]);
    buf.extend_from_slice(&(packet.num_blocks as i32).to_be_bytes());
    buf.extend_from_slice(&(packet.blk_size as i16).to_be_bytes());
    buf.extend_from_slice(&packet.section.to_be_bytes());
    buf.extend_from_slice(&packet.seed.to_be_bytes());
    buf.extend_from_slice(&packet.payload);

    let checksum = fletcher16(&buf[2..]);
    buf[0..2].copy_from_slice(&checksum.to_be_bytes());
    buf
}

/// Parses a wire frame back into a [`Packet`], recomputing its membership
/// set from `section_size` and the frame's `(num_blocks, seed)`.
///
/// Rejects the frame (without panicking) if it is too short, its checksum
/// does not match, its header is malformed, or its payload length
/// disagrees with the declared `blk_size`.
pub fn decode_packet(buf: &[u8], section_size: u32) -> Result<Packet, WireError> {
    if buf.len() < HEADER_LEN {
        return Err(WireError::Truncated);
    }

    let checksum = u16::from_be_bytes([buf[0], buf[1]]);
    if fletcher16(&buf[2..]) != checksum {
        return Err(WireError::ChecksumMismatch);
    }

    let num_blocks = i32::from_be_bytes(buf[2..6].try_into().expect("4 bytes"));
    let blk_size = i16::from_be_bytes(buf[6..8].try_into().expect("2 bytes"));
    let section = u16::from_be_bytes(buf[8..10].try_into().expect("2 bytes"));
    let seed = u64::from_be_bytes(buf[10..18].try_into().expect("8 bytes"));

    if num_blocks <= 0 || blk_size <= 0 {
        return Err(WireError::InvalidHeader);
    }
    let num_blocks = num_blocks as u32;
    let blk_size = blk_size as u16;

    let payload = &buf[HEADER_LEN..];
    if payload.len() != blk_size as usize {
        return Err(WireError::LengthMismatch);
    }
    if num_blocks > section_size {
        return Err(WireError::InvalidHeader);
    }

    let membership = rng::membership(section_size, num_blocks, seed);

    Ok(Packet {
        section,
        seed,
        num_blocks,
        blk_size,
        payload: payload.to_vec(),
        membership,
    })
}


#[cfg(test)]
mod fuzz {
    use super::decode_packet;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn decode_never_panics_on_arbitrary_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..256), n in 1u32..64) {
            let _ = decode_packet(&bytes, n);
        }
    }
}
