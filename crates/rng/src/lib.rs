#![deny(missing_docs)]

//! # Overview
//!
//! Deterministic PRNG and the two derivations built on it: a packet's
//! *degree* (how many source blocks it XORs together) and its *membership*
//! (which blocks, exactly). Both the encoder and decoder must agree
//! bit-for-bit on these derivations: a packet only carries its 64-bit
//! `seed` over the wire, never its membership set, so the decoder has to
//! recompute the same set the encoder used.
//!
//! # Invariants
//!
//! - [`Lcg::next15`] is a pure function of its internal state; two
//!   generators seeded identically produce identical sequences forever.
//! - [`membership`] always returns a set with exactly `degree` bits set,
//!   for any `degree` in `1..=section_size`.
//!
//! # See also
//!
//! - `fountain::Encoder` samples a degree and seed, then calls
//!   [`membership`] to select which blocks to XOR.
//! - `decoder` recomputes the same [`membership`] from a received packet's
//!   `seed` field.

use bitset::Bitset;

/// The linear-congruential generator used for every seeded draw in this
/// system.
///
/// `next = seed.wrapping_mul(1103515245).wrapping_add(12345)`, and each
/// draw extracts bits `15..30` of `next` (equivalently `(next >> 16) &
/// 0x7FFF`), giving a value in `0..=32767`. This is bit-identical to the
/// reference generator this protocol is built on: changing the constants
/// or the extracted bit range would silently desynchronize every decoder
/// from every encoder in the field.
#[derive(Debug, Clone, Copy)]
pub struct Lcg {
    state: u64,
}

/// The exclusive upper bound of a single [`Lcg::next15`] draw.
pub const DRAW_RANGE: u32 = 32768;

impl Lcg {
    /// Creates a generator seeded with `seed`.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Returns the current internal state (the most recently produced
    /// `next`, or the original seed if no draw has happened yet).
    #[must_use]
    pub const fn state(&self) -> u64 {
        self.state
    }

    /// Advances the generator and returns the next 15-bit draw, a value in
    /// `0..32768`.
    pub fn next15(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        ((self.state >> 16) & 0x7FFF) as u32
    }

    /// Draws a value uniformly distributed in `0..modulus` by rejection
    /// sampling over [`next15`](Self::next15).
    ///
    /// `modulus` must be nonzero and at most [`DRAW_RANGE`]; callers in
    /// this crate only ever call it with `modulus <= section_size`, and
    /// section sizes are bounded well below 32768 (see `fountain`'s sizing
    /// notes), so plain modulo is used rather than rejection sampling, to
    /// stay bit-identical with the reference generator's behavior.
    pub fn next_below(&mut self, modulus: u32) -> u32 {
        debug_assert!(modulus > 0, "modulus must be nonzero");
        self.next15() % modulus
    }

    /// Draws a uniform double in `[0, 1)` from a single 15-bit draw.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next15()) / f64::from(DRAW_RANGE)
    }
}

/// Samples a packet degree for a section of `section_size` blocks.
///
/// Draws `x` uniformly from `[0, 1)`, applies the cubic transform
/// `y = x <= 0.5 ? x^3 : 1 - (1-x)^3` (the robust soliton approximation
/// this system uses in place of the full Luby transform), and returns
/// `d = min(1 + floor(section_size * y), section_size)`.
///
/// The transform biases heavily towards small degrees (most packets XOR a
/// handful of blocks) while still occasionally producing a high-degree
/// packet that lets the decoder escape a stall.
///
/// # Panics
///
/// Panics if `section_size` is zero.
pub fn degree(section_size: u32, rng: &mut Lcg) -> u32 {
    assert!(section_size > 0, "section_size must be nonzero");
    let x = rng.next_f64();
    let y = if x <= 0.5 {
        x * x * x
    } else {
        1.0 - (1.0 - x) * (1.0 - x) * (1.0 - x)
    };
    let scaled = 1 + (f64::from(section_size) * y).floor() as u32;
    scaled.min(section_size)
}

/// Derives the block-membership set for a packet of the given `degree`
/// within a section of `section_size` blocks, from `seed`.
///
/// Repeatedly draws `r = next() mod section_size` from a generator seeded
/// with `seed`, setting bit `r`; a draw landing on an already-set bit is
/// discarded and redrawn. Terminates because `degree <= section_size`, so
/// the set can always still grow.
///
/// # Panics
///
/// Panics if `degree` is zero or greater than `section_size`.
#[must_use]
pub fn membership(section_size: u32, degree: u32, seed: u64) -> Bitset {
    assert!(degree > 0, "degree must be nonzero");
    assert!(
        degree <= section_size,
        "degree must not exceed section_size"
    );

    let mut rng = Lcg::new(seed);
    let mut set = Bitset::new(section_size as usize);
    let mut picked = 0u32;
    while picked < degree {
        let r = rng.next_below(section_size) as usize;
        if !set.test(r) {
            set.set(r);
            picked += 1;
        }
    }
    set
}
