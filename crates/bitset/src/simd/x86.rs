#![allow(unsafe_code)]

//! AVX2/SSE2 subset-test backend.
//!
//! # Safety
//!
//! Every `unsafe fn` below requires the caller to have already confirmed,
//! via [`dispatch`], that the corresponding CPU feature is present. The
//! intrinsics used here operate on unaligned loads (`_mm256_loadu_si256`,
//! `_mm_loadu_si128`), so no alignment requirement is imposed on `a`/`b`
//! beyond what [`crate::Bitset`] already provides for its own purposes.
//! Tail words that don't fill a full vector register are compared with the
//! portable scalar loop.

#[cfg(target_arch = "x86")]
use std::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use std::sync::OnceLock;

type SubsetFn = fn(&[u64], &[u64]) -> bool;

/// Returns the fastest backend the running CPU supports, or `None` if
/// neither AVX2 nor SSE2 is available (SSE2 is implied on `x86_64` but not
/// on `x86`, so the check still runs there).
pub(super) fn dispatch() -> Option<SubsetFn> {
    static CACHE: OnceLock<Option<SubsetFn>> = OnceLock::new();
    *CACHE.get_or_init(|| {
        if is_x86_feature_detected!("avx2") {
            Some(avx2_is_subset as SubsetFn)
        } else if is_x86_feature_detected!("sse2") {
            Some(sse2_is_subset as SubsetFn)
        } else {
            None
        }
    })
}

fn avx2_is_subset(a: &[u64], b: &[u64]) -> bool {
    // SAFETY: `dispatch` only returns this function when `avx2` was
    // detected at runtime.
    unsafe { avx2_is_subset_impl(a, b) }
}

#[target_feature(enable = "avx2")]
unsafe fn avx2_is_subset_impl(a: &[u64], b: &[u64]) -> bool {
    let chunks = a.len() / 4;
    for i in 0..chunks {
        let off = i * 4;
        // SAFETY: `off + 4 <= a.len() == b.len()`, loads are unaligned.
        let va = unsafe { _mm256_loadu_si256(a.as_ptr().add(off).cast()) };
        let vb = unsafe { _mm256_loadu_si256(b.as_ptr().add(off).cast()) };
        let missing = _mm256_andnot_si256(vb, va);
        if _mm256_testz_si256(missing, missing) == 0 {
            return false;
        }
    }
    super_scalar_tail(a, b, chunks * 4)
}

fn sse2_is_subset(a: &[u64], b: &[u64]) -> bool {
    // SAFETY: `dispatch` only returns this function when `sse2` was
    // detected at runtime.
    unsafe { sse2_is_subset_impl(a, b) }
}

#[target_feature(enable = "sse2")]
unsafe fn sse2_is_subset_impl(a: &[u64], b: &[u64]) -> bool {
    let chunks = a.len() / 2;
    for i in 0..chunks {
        let off = i * 2;
        // SAFETY: `off + 2 <= a.len() == b.len()`, loads are unaligned.
        let va = unsafe { _mm_loadu_si128(a.as_ptr().add(off).cast()) };
        let vb = unsafe { _mm_loadu_si128(b.as_ptr().add(off).cast()) };
        let missing = _mm_andnot_si128(vb, va);
        let mask = _mm_movemask_epi8(_mm_cmpeq_epi8(missing, _mm_setzero_si128()));
        if mask != 0xFFFF {
            return false;
        }
    }
    super_scalar_tail(a, b, chunks * 2)
}

fn super_scalar_tail(a: &[u64], b: &[u64], from: usize) -> bool {
    a[from..]
        .iter()
        .zip(&b[from..])
        .all(|(&wa, &wb)| ((wa & wb) ^ wa) == 0)
}

#[cfg(test)]
mod tests {
    use super::dispatch;

    #[test]
    fn dispatch_is_cached_and_consistent() {
        let first = dispatch();
        let second = dispatch();
        assert_eq!(first.is_some(), second.is_some());
    }

    #[test]
    fn backend_agrees_with_scalar_when_available() {
        let a = [0b1010u64, u64::MAX, 0, 7, 1];
        let b = [0b1110u64, u64::MAX, 0, 7, 3];
        if let Some(f) = dispatch() {
            let scalar = a
                .iter()
                .zip(&b)
                .all(|(&wa, &wb)| ((wa & wb) ^ wa) == 0);
            assert_eq!(f(&a, &b), scalar);
        }
    }
}
