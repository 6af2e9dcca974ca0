#![allow(unsafe_code)]

//! NEON subset-test backend for `aarch64`.
//!
//! # Safety
//!
//! NEON is mandatory on every `aarch64` target Rust supports, so unlike the
//! `x86` backend this one requires no runtime feature probe; the `unsafe`
//! here is solely for the intrinsic calls themselves, which all operate on
//! unaligned loads.

use std::arch::aarch64::*;
use std::sync::OnceLock;

type SubsetFn = fn(&[u64], &[u64]) -> bool;

pub(super) fn dispatch() -> Option<SubsetFn> {
    static CACHE: OnceLock<Option<SubsetFn>> = OnceLock::new();
    *CACHE.get_or_init(|| Some(neon_is_subset as SubsetFn))
}

fn neon_is_subset(a: &[u64], b: &[u64]) -> bool {
    // SAFETY: NEON is always available on aarch64.
    unsafe { neon_is_subset_impl(a, b) }
}

#[target_feature(enable = "neon")]
unsafe fn neon_is_subset_impl(a: &[u64], b: &[u64]) -> bool {
    let chunks = a.len() / 2;
    for i in 0..chunks {
        let off = i * 2;
        // SAFETY: `off + 2 <= a.len() == b.len()`, loads are unaligned.
        let va = unsafe { vld1q_u64(a.as_ptr().add(off)) };
        let vb = unsafe { vld1q_u64(b.as_ptr().add(off)) };
        let missing = vbicq_u64(va, vb);
        let lanes = vreinterpretq_u32_u64(missing);
        if vmaxvq_u32(lanes) != 0 {
            return false;
        }
    }
    a[chunks * 2..]
        .iter()
        .zip(&b[chunks * 2..])
        .all(|(&wa, &wb)| ((wa & wb) ^ wa) == 0)
}
