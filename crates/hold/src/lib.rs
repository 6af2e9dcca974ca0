#![deny(missing_docs)]

//! # Overview
//!
//! The packet hold is the decoder's parking lot for fountain packets that
//! cannot yet be resolved to a single block: an append-mostly arena with
//! deferred compaction, so that packet reduction (see the `decoder` crate)
//! can iterate it without indices shifting mid-sweep.
//!
//! A logically deleted slot is represented by `None` rather than a
//! separate `deleted` bit array: the borrow checker then makes "no deleted
//! slot's payload is dereferenced" a property of the type rather than a
//! runtime invariant to maintain by hand. A `mark` array is kept alongside
//! it, exactly as the source design calls for, since marks are set and
//! cleared far more often than slots are freed.
//!
//! # Invariants
//!
//! - `0 <= num_packets() <= offset() <= num_slots()`.
//! - No index `< num_packets()` that is still live (`get(i).is_some()`)
//!   is ever mistaken for deleted, and no deleted index's packet is
//!   reachable.
//! - [`collect_garbage`](PacketHold::collect_garbage) only compacts when
//!   `offset > 2 * live_count`, and never runs implicitly mid-iteration.

use fountain::Packet;
use thiserror::Error;

/// Error returned when the hold cannot grow to accept a new packet.
#[derive(Debug, Error)]
pub enum HoldError {
    /// The allocator could not satisfy the requested growth.
    #[error("packet hold failed to grow: {0}")]
    OutOfMemory(#[from] std::collections::TryReserveError),
}

/// An append-mostly arena of unsolved fountain packets for one section.
pub struct PacketHold {
    slots: Vec<Option<Packet>>,
    mark: Vec<bool>,
    offset: usize,
    num_packets: usize,
}

impl PacketHold {
    /// Creates an empty hold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            mark: Vec::new(),
            offset: 0,
            num_packets: 0,
        }
    }

    /// Current slot capacity.
    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Next free slot index (equal to `num_packets` in this
    /// implementation: every `add` advances both together).
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// High-water index: the bound on valid indices for `get`/`remove`.
    #[must_use]
    pub fn num_packets(&self) -> usize {
        self.num_packets
    }

    /// Number of slots in `0..num_packets()` that are still live.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots[..self.num_packets]
            .iter()
            .filter(|s| s.is_some())
            .count()
    }

    /// Appends `packet`, growing the arena by 1.5x if full.
    ///
    /// # Errors
    ///
    /// Returns [`HoldError::OutOfMemory`] if growing the backing storage
    /// fails; per this system's `packet_add` policy, that is fatal to the
    /// transfer.
    pub fn add(&mut self, packet: Packet) -> Result<(), HoldError> {
        if self.offset == self.slots.len() {
            self.grow()?;
        }
        let idx = self.offset;
        self.slots[idx] = Some(packet);
        self.mark[idx] = false;
        self.offset += 1;
        self.num_packets += 1;
        Ok(())
    }

    fn grow(&mut self) -> Result<(), HoldError> {
        let old_len = self.slots.len();
        let new_len = if old_len == 0 {
            4
        } else {
            ((old_len * 3).div_ceil(2)).max(old_len + 1)
        };
        let additional = new_len - old_len;
        self.slots.try_reserve(additional)?;
        self.mark.try_reserve(additional)?;
        self.slots.resize_with(new_len, || None);
        self.mark.resize(new_len, false);
        Ok(())
    }

    /// Returns a reference to the packet at `i`, or `None` if deleted.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.num_packets()`.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&Packet> {
        assert!(i < self.num_packets, "hold index out of range");
        self.slots[i].as_ref()
    }

    /// Returns a mutable reference to the packet at `i`, or `None` if
    /// deleted.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.num_packets()`.
    pub fn get_mut(&mut self, i: usize) -> Option<&mut Packet> {
        assert!(i < self.num_packets, "hold index out of range");
        self.slots[i].as_mut()
    }

    /// Returns whether slot `i` is marked for re-examination.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.num_packets()`.
    #[must_use]
    pub fn is_marked(&self, i: usize) -> bool {
        assert!(i < self.num_packets, "hold index out of range");
        self.mark[i]
    }

    /// Sets or clears the mark bit for slot `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.num_packets()`.
    pub fn set_mark(&mut self, i: usize, value: bool) {
        assert!(i < self.num_packets, "hold index out of range");
        self.mark[i] = value;
    }

    /// Removes and returns the packet at `i`, marking the slot deleted and
    /// clearing its mark bit. Does not compact.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.num_packets()` or slot `i` is already deleted.
    pub fn remove(&mut self, i: usize) -> Packet {
        assert!(i < self.num_packets, "hold index out of range");
        self.mark[i] = false;
        self.slots[i].take().expect("slot already deleted")
    }

    /// Iterates the indices of currently live slots, in order.
    pub fn live_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_packets).filter(|&i| self.slots[i].is_some())
    }

    /// Returns whether a structurally equal packet already lives in the
    /// hold.
    #[must_use]
    pub fn contains(&self, packet: &Packet) -> bool {
        self.live_indices()
            .any(|i| packets_equal(self.slots[i].as_ref().unwrap(), packet))
    }

    /// Compacts the arena if `offset > 2 * live_count`, moving every live
    /// entry to the prefix in order and resetting `offset`/`num_packets`
    /// to the new live count. Must only be called between reduction
    /// sweeps, never while a caller holds an index into the hold.
    pub fn collect_garbage(&mut self) {
        let live = self.live_count();
        if self.offset <= 2 * live {
            return;
        }

        let capacity = self.slots.len();
        let mut compacted_slots = Vec::with_capacity(capacity);
        let mut compacted_mark = Vec::with_capacity(capacity);
        for i in 0..self.num_packets {
            if let Some(packet) = self.slots[i].take() {
                compacted_mark.push(self.mark[i]);
                compacted_slots.push(Some(packet));
            }
        }
        compacted_slots.resize_with(capacity, || None);
        compacted_mark.resize(capacity, false);

        self.slots = compacted_slots;
        self.mark = compacted_mark;
        self.offset = live;
        self.num_packets = live;
    }
}

impl Default for PacketHold {
    fn default() -> Self {
        Self::new()
    }
}

fn packets_equal(a: &Packet, b: &Packet) -> bool {
    a.section == b.section
        && a.seed == b.seed
        && a.num_blocks == b.num_blocks
        && a.blk_size == b.blk_size
        && a.payload == b.payload
        && a.membership == b.membership
}

#[cfg(test)]
mod tests {
    use super::PacketHold;
    use bitset::Bitset;
    use fountain::Packet;

    fn packet(section: u16, seed: u64, degree: u32, num_bits: usize, bits: &[usize]) -> Packet {
        let mut membership = Bitset::new(num_bits);
        for &b in bits {
            membership.set(b);
        }
        Packet {
            section,
            seed,
            num_blocks: degree,
            blk_size: 4,
            payload: vec![0; 4],
            membership,
        }
    }

    #[test]
    fn add_then_get_round_trips() {
        let mut hold = PacketHold::new();
        hold.add(packet(0, 1, 2, 8, &[0, 1])).unwrap();
        assert_eq!(hold.num_packets(), 1);
        assert_eq!(hold.offset(), 1);
        assert!(hold.get(0).is_some());
    }

    #[test]
    fn grow_happens_at_capacity() {
        let mut hold = PacketHold::new();
        for i in 0..10 {
            hold.add(packet(0, i, 1, 8, &[0])).unwrap();
        }
        assert_eq!(hold.num_packets(), 10);
        assert!(hold.num_slots() >= 10);
    }

    #[test]
    fn remove_marks_slot_deleted_without_compacting() {
        let mut hold = PacketHold::new();
        hold.add(packet(0, 1, 1, 8, &[0])).unwrap();
        hold.add(packet(0, 2, 1, 8, &[1])).unwrap();
        let removed = hold.remove(0);
        assert_eq!(removed.seed, 1);
        assert!(hold.get(0).is_none());
        assert_eq!(hold.num_packets(), 2, "remove must not shrink num_packets");
        assert_eq!(hold.live_count(), 1);
    }

    #[test]
    #[should_panic(expected = "already deleted")]
    fn remove_twice_panics() {
        let mut hold = PacketHold::new();
        hold.add(packet(0, 1, 1, 8, &[0])).unwrap();
        hold.remove(0);
        hold.remove(0);
    }

    #[test]
    fn collect_garbage_noop_below_threshold() {
        let mut hold = PacketHold::new();
        hold.add(packet(0, 1, 1, 8, &[0])).unwrap();
        hold.add(packet(0, 2, 1, 8, &[1])).unwrap();
        hold.remove(0);
        // offset=2, live=1: 2 > 2*1 is false, so no compaction yet.
        hold.collect_garbage();
        assert_eq!(hold.num_packets(), 2);
    }

    #[test]
    fn collect_garbage_compacts_above_threshold() {
        let mut hold = PacketHold::new();
        for i in 0..6 {
            hold.add(packet(0, i, 1, 8, &[0])).unwrap();
        }
        for i in 0..5 {
            hold.remove(i);
        }
        // offset=6, live=1: 6 > 2*1 → compacts.
        hold.collect_garbage();
        assert_eq!(hold.num_packets(), 1);
        assert_eq!(hold.offset(), 1);
        assert_eq!(hold.live_count(), 1);
        assert!(hold.get(0).is_some());
        assert_eq!(hold.get(0).unwrap().seed, 5);
    }

    #[test]
    fn contains_matches_structural_equality() {
        let mut hold = PacketHold::new();
        hold.add(packet(0, 9, 2, 8, &[1, 2])).unwrap();
        assert!(hold.contains(&packet(0, 9, 2, 8, &[1, 2])));
        assert!(!hold.contains(&packet(0, 9, 2, 8, &[1, 3])));
    }

    #[test]
    fn invariant_num_packets_le_offset_le_num_slots() {
        let mut hold = PacketHold::new();
        for i in 0..20 {
            hold.add(packet(0, i, 1, 8, &[0])).unwrap();
            if i % 3 == 0 {
                hold.remove(i as usize);
            }
            hold.collect_garbage();
            assert!(hold.num_packets() <= hold.offset());
            assert!(hold.offset() <= hold.num_slots());
        }
    }

    #[test]
    fn live_indices_skips_deleted() {
        let mut hold = PacketHold::new();
        hold.add(packet(0, 1, 1, 8, &[0])).unwrap();
        hold.add(packet(0, 2, 1, 8, &[1])).unwrap();
        hold.add(packet(0, 3, 1, 8, &[2])).unwrap();
        hold.remove(1);
        let indices: Vec<usize> = hold.live_indices().collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn mark_round_trips() {
        let mut hold = PacketHold::new();
        hold.add(packet(0, 1, 2, 8, &[0, 1])).unwrap();
        assert!(!hold.is_marked(0));
        hold.set_mark(0, true);
        assert!(hold.is_marked(0));
    }
}
