//! Dispatch for the [`crate::Bitset::is_subset`] inner loop.
//!
//! Mirrors the rolling-checksum SIMD dispatch this crate's teacher uses:
//! a cached runtime feature probe selects between a scalar fallback and an
//! architecture-specific accelerated path. The scalar path is always
//! correct; the accelerated paths exist purely for throughput on the large
//! membership sets a high-degree fountain packet can carry.

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod x86;

#[cfg(target_arch = "aarch64")]
mod neon;

/// The largest alignment any SIMD backend in this module asks for.
///
/// Currently driven by AVX2's 256-bit (32-byte) registers. Kept as a single
/// constant so [`crate::Bitset`]'s backing allocation and any future wider
/// backend agree on the bound.
pub(crate) const MAX_SIMD_ALIGNMENT: usize = 32;

/// Returns whether every word set in `a` is also set in `b`.
///
/// Dispatches to an accelerated backend when the runtime CPU supports one
/// and the `simd` feature is enabled; otherwise falls back to the scalar
/// loop. Both paths compute the same result: callers cannot observe which
/// one ran except through timing.
pub(crate) fn is_subset(a: &[u64], b: &[u64]) -> bool {
    debug_assert_eq!(a.len(), b.len());

    #[cfg(feature = "simd")]
    {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        if let Some(f) = x86::dispatch() {
            return f(a, b);
        }
        #[cfg(target_arch = "aarch64")]
        if let Some(f) = neon::dispatch() {
            return f(a, b);
        }
    }

    scalar_is_subset(a, b)
}

/// Portable subset test: `a` is a subset of `b` iff `(a & b) ^ a == 0` for
/// every word, i.e. no bit set in `a` is clear in `b`.
fn scalar_is_subset(a: &[u64], b: &[u64]) -> bool {
    a.iter()
        .zip(b)
        .all(|(&wa, &wb)| ((wa & wb) ^ wa) == 0)
}

/// Reports whether this build was compiled with SIMD dispatch enabled and
/// whether the running CPU actually has a matching accelerated backend.
///
/// Exposed for diagnostics (`--verbose` startup logging) rather than for
/// correctness: [`is_subset`] falls back transparently either way.
#[must_use]
pub fn simd_acceleration_available() -> bool {
    #[cfg(feature = "simd")]
    {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            return x86::dispatch().is_some();
        }
        #[cfg(target_arch = "aarch64")]
        {
            return neon::dispatch().is_some();
        }
        #[cfg(not(any(
            target_arch = "x86",
            target_arch = "x86_64",
            target_arch = "aarch64"
        )))]
        {
            return false;
        }
    }
    #[cfg(not(feature = "simd"))]
    {
        false
    }
}


#[cfg(all(test, feature = "simd", any(target_arch = "x86", target_arch = "x86_64")))]
mod simd_agreement_tests {
    use super::{scalar_is_subset, x86};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn simd_matches_scalar(a in proptest::collection::vec(any::<u64>(), 0..32),
                                extra in proptest::collection::vec(any::<u64>(), 0..32)) {
            let len = a.len().min(extra.len());
            let a = &a[..len];
            let b: Vec<u64> = extra[..len].iter().zip(a).map(|(&x, &y)| x | y).collect();
            if let Some(f) = x86::dispatch() {
                prop_assert_eq!(f(a, &b), scalar_is_subset(a, &b));
            }
        }
    }
}
