use bitset::Bitset;

/// A fountain-encoded packet: the XOR of `num_blocks` source blocks of one
/// section, plus enough metadata for a receiver to recompute which blocks
/// those were.
///
/// `membership` is derived, not transmitted: the wire codec only carries
/// `section`, `seed`, `num_blocks` and `blk_size`; any receiver reconstructs
/// `membership` by calling `rng::membership(section_size, num_blocks, seed)`
/// once it knows the section's size.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Section index this packet belongs to.
    pub section: u16,
    /// PRNG seed that determines `membership`.
    pub seed: u64,
    /// Degree: the number of source blocks XORed into `payload`.
    pub num_blocks: u32,
    /// Payload length in bytes.
    pub blk_size: u16,
    /// The XOR of the selected blocks.
    pub payload: Vec<u8>,
    /// The set of block indices XORed into `payload`.
    pub membership: Bitset,
}

impl Packet {
    /// Returns whether this packet is solved for a single block (degree 1).
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.num_blocks == 1
    }

    /// Returns the single block index this packet resolves to, if it is a
    /// singleton.
    #[must_use]
    pub fn singleton_block(&self) -> Option<usize> {
        self.is_singleton()
            .then(|| self.membership.lowest_set_above(0))
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::Packet;
    use bitset::Bitset;

    fn sample_packet(bits: &[usize], num_bits: usize) -> Packet {
        let mut membership = Bitset::new(num_bits);
        for &b in bits {
            membership.set(b);
        }
        Packet {
            section: 0,
            seed: 0,
            num_blocks: bits.len() as u32,
            blk_size: 4,
            payload: vec![0; 4],
            membership,
        }
    }

    #[test]
    fn singleton_detection() {
        let p = sample_packet(&[3], 8);
        assert!(p.is_singleton());
        assert_eq!(p.singleton_block(), Some(3));
    }

    #[test]
    fn non_singleton_has_no_block() {
        let p = sample_packet(&[1, 2], 8);
        assert!(!p.is_singleton());
        assert_eq!(p.singleton_block(), None);
    }
}
