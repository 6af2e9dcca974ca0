#![deny(missing_docs)]

//! # Overview
//!
//! The decoder is the peeling/reduction engine that turns a stream of
//! fountain packets for one section into solved blocks. It owns a
//! [`Sink`] (the output destination for solved blocks) and a
//! [`hold::PacketHold`] (the parking lot for packets that aren't yet
//! resolvable to a single block).
//!
//! # Algorithm
//!
//! Feeding a packet `ftn` with degree 1 writes its block directly and then
//! sweeps the hold for any entry whose membership contains that block,
//! reducing it and recursively draining any entry that becomes degree 1 in
//! turn (a worklist of newly-singleton packets).
//!
//! Feeding a packet with degree `> 1` first peels off any already-solved
//! bits in its own membership (reading them back from the sink and
//! XORing them out), then attempts reduction against the hold in both
//! directions: a held packet that is a superset of `ftn`'s membership
//! shrinks by `ftn`; a held packet that is a subset of `ftn`'s membership
//! shrinks `ftn` and forces a retest from the top (it may have become
//! degree 1 itself, or have more already-solved bits to peel). A packet
//! that survives all of this with degree `> 1` and no structural
//! duplicate already held is admitted to the hold.
//!
//! # Invariants
//!
//! - `popcount(solved)` is non-decreasing across any single [`feed`](DecodeState::feed) call.
//! - The sum of `num_blocks` across live hold entries is non-increasing
//!   across a `feed` call, except for the one freshly admitted packet.
//! - `collect_garbage` is only ever called between sweeps, never while a
//!   sweep holds an index into the hold.

use fountain::Packet;
use hold::{HoldError, PacketHold};
use std::collections::VecDeque;
use thiserror::Error;

/// The output destination a [`DecodeState`] writes solved blocks to and
/// reads already-solved blocks back from (to fold them out of an incoming
/// packet's payload).
pub trait Sink {
    /// The error type this sink's I/O can fail with.
    type Error: std::error::Error + 'static;

    /// Reads the current contents of `block` into `buf`.
    fn read_block(&mut self, block: usize, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Writes `data` as the contents of `block`.
    fn write_block(&mut self, block: usize, data: &[u8]) -> Result<(), Self::Error>;
}

/// Errors a [`DecodeState::feed`] call can return.
#[derive(Debug, Error)]
pub enum DecodeError<E: std::error::Error + 'static> {
    /// The sink failed to read or write a block.
    #[error("sink I/O failed")]
    Sink(#[source] E),
    /// The packet hold could not grow to admit a new packet.
    #[error(transparent)]
    Hold(#[from] HoldError),
}

/// The result of feeding one packet to a [`DecodeState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The packet was processed normally (solved a block, reduced the
    /// hold, or was admitted to it).
    Processed,
    /// The packet's single block was already solved; it carried no new
    /// information.
    AlreadyDecoded,
}

/// Per-section decode state: what's solved so far, the hold of unsolved
/// packets, and the output sink.
pub struct DecodeState<S: Sink> {
    section: u16,
    section_size: u32,
    blk_size: u16,
    solved: bitset::Bitset,
    hold: PacketHold,
    packets_so_far: u64,
    sink: S,
}

impl<S: Sink> DecodeState<S> {
    /// Creates a decode state for `section`, sized for `section_size`
    /// blocks of `blk_size` bytes each, writing to `sink`.
    pub fn new(section: u16, section_size: u32, blk_size: u16, sink: S) -> Self {
        Self {
            section,
            section_size,
            blk_size,
            solved: bitset::Bitset::new(section_size as usize),
            hold: PacketHold::new(),
            packets_so_far: 0,
            sink,
        }
    }

    /// The section index this state is decoding.
    #[must_use]
    pub fn section(&self) -> u16 {
        self.section
    }

    /// Number of blocks solved so far.
    #[must_use]
    pub fn solved_count(&self) -> u32 {
        self.solved.popcount()
    }

    /// Whether every block in the section has been solved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.solved_count() == self.section_size
    }

    /// Number of packets fed to this state so far (including ones that
    /// were dropped as already-decoded or parked in the hold).
    #[must_use]
    pub fn packets_so_far(&self) -> u64 {
        self.packets_so_far
    }

    /// Number of packets currently parked, unsolved, in the hold.
    #[must_use]
    pub fn hold_live_count(&self) -> usize {
        self.hold.live_count()
    }

    /// Consumes this decode state, returning its sink.
    ///
    /// Useful once [`is_complete`](Self::is_complete) holds and the
    /// caller wants to reclaim the underlying resource (a mapped file
    /// region, say) to hand to the next section's decode state.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Feeds one incoming packet for this section to the decoder.
    pub fn feed(&mut self, mut ftn: Packet) -> Result<Outcome, DecodeError<S::Error>> {
        self.packets_so_far += 1;

        loop {
            if ftn.num_blocks == 1 {
                let mut queue = VecDeque::new();
                queue.push_back(ftn);
                let outcome = self.drain_singletons(&mut queue)?;
                self.hold.collect_garbage();
                return Ok(outcome);
            }

            if let Some(j) = self.find_solved_bit(&ftn) {
                self.fold_solved_block(&mut ftn, j)?;
                continue;
            }

            let retest = self.reduce_against_hold(&mut ftn)?;
            self.hold.collect_garbage();

            if !retest {
                if !self.hold.contains(&ftn) {
                    self.hold.add(ftn)?;
                }
                return Ok(Outcome::Processed);
            }
        }
    }

    /// Drains a worklist of degree-1 packets: writes each one's block
    /// (unless already solved), then sweeps the hold for entries whose
    /// membership contains that block, reducing them and enqueuing any
    /// that become degree 1 in turn.
    fn drain_singletons(
        &mut self,
        queue: &mut VecDeque<Packet>,
    ) -> Result<Outcome, DecodeError<S::Error>> {
        let mut outcome = Outcome::Processed;
        let mut first = true;

        while let Some(p) = queue.pop_front() {
            let block = p
                .membership
                .lowest_set_above(0)
                .expect("degree-1 packet must have exactly one set bit");

            if self.solved.test(block) {
                if first {
                    outcome = Outcome::AlreadyDecoded;
                }
                first = false;
                continue;
            }

            self.sink
                .write_block(block, &p.payload)
                .map_err(DecodeError::Sink)?;
            self.solved.set(block);

            let candidates: Vec<usize> = self.hold.live_indices().collect();
            let mut newly_singleton = Vec::new();
            for i in candidates {
                let is_subset = p
                    .membership
                    .is_subset(&self.hold.get(i).expect("live index").membership);
                if !is_subset {
                    continue;
                }
                let entry = self.hold.get_mut(i).expect("live index");
                reduce_into(entry, &p);
                if entry.num_blocks == 1 {
                    newly_singleton.push(i);
                }
            }
            for i in newly_singleton {
                queue.push_back(self.hold.remove(i));
            }

            first = false;
        }

        Ok(outcome)
    }

    fn find_solved_bit(&self, ftn: &Packet) -> Option<usize> {
        let mut from = 0usize;
        while let Some(j) = ftn.membership.lowest_set_above(from) {
            if self.solved.test(j) {
                return Some(j);
            }
            from = j + 1;
        }
        None
    }

    fn fold_solved_block(
        &mut self,
        ftn: &mut Packet,
        block: usize,
    ) -> Result<(), DecodeError<S::Error>> {
        let mut buf = vec![0u8; self.blk_size as usize];
        self.sink
            .read_block(block, &mut buf)
            .map_err(DecodeError::Sink)?;
        for (p, b) in ftn.payload.iter_mut().zip(&buf) {
            *p ^= b;
        }
        ftn.membership.clear(block);
        ftn.num_blocks -= 1;
        Ok(())
    }

    /// Attempts one sweep of reduction between `ftn` and the hold.
    /// Returns whether `ftn` was reduced by a smaller held entry and
    /// should be retested from the top of [`feed`](Self::feed).
    fn reduce_against_hold(&mut self, ftn: &mut Packet) -> Result<bool, DecodeError<S::Error>> {
        let indices: Vec<usize> = self.hold.live_indices().collect();
        let mut promote = Vec::new();
        let mut retest = false;

        for i in indices {
            let held_blocks = self.hold.get(i).expect("live index").num_blocks;
            if held_blocks == ftn.num_blocks {
                continue;
            }
            if held_blocks > ftn.num_blocks {
                let is_subset = ftn
                    .membership
                    .is_subset(&self.hold.get(i).expect("live index").membership);
                if is_subset {
                    let entry = self.hold.get_mut(i).expect("live index");
                    reduce_into(entry, ftn);
                    self.hold.set_mark(i, true);
                    promote.push(i);
                }
            } else {
                let is_subset = self
                    .hold
                    .get(i)
                    .expect("live index")
                    .membership
                    .is_subset(&ftn.membership);
                if is_subset {
                    let reducer = self.hold.get(i).expect("live index").clone();
                    reduce_into(ftn, &reducer);
                    retest = true;
                    break;
                }
            }
        }

        for i in promote {
            let became_singleton = self
                .hold
                .get(i)
                .map(|p| p.num_blocks == 1)
                .unwrap_or(false);
            if became_singleton {
                let removed = self.hold.remove(i);
                let mut queue = VecDeque::new();
                queue.push_back(removed);
                let _ = self.drain_singletons(&mut queue)?;
            } else {
                self.hold.set_mark(i, false);
            }
        }

        Ok(retest)
    }
}

fn reduce_into(target: &mut Packet, reducer: &Packet) {
    for (t, r) in target.payload.iter_mut().zip(&reducer.payload) {
        *t ^= r;
    }
    target.membership.xor_assign(&reducer.membership);
    target.num_blocks -= reducer.num_blocks;
}
