//! Runtime backend selection.
//!
//! The only process-wide state in this crate: an atomic cache of which
//! backend was selected on first probe. Selection is idempotent — probing
//! twice, concurrently or not, always converges on the same answer, so a
//! relaxed compare-exchange race is harmless (both racing writers compute
//! the same value).
//!
//! Hot loops never call through a trait object for this choice: callers
//! `match` on [`Selected`] once per parse and then call a `fn run<B: Backend>`
//! monomorphized for that one backend, keeping dynamic dispatch off the
//! per-block path.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::config::BackendChoice;

/// The backend actually in effect for a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selected {
    Fallback,
    Sse42,
    Avx2,
    Avx512,
    Neon,
}

impl Selected {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fallback => "fallback",
            Self::Sse42 => "sse4.2",
            Self::Avx2 => "avx2",
            Self::Avx512 => "avx512",
            Self::Neon => "neon",
        }
    }

    const fn to_tag(self) -> u8 {
        match self {
            Self::Fallback => 0,
            Self::Sse42 => 1,
            Self::Avx2 => 2,
            Self::Avx512 => 3,
            Self::Neon => 4,
        }
    }

    const fn from_tag(tag: u8) -> Self {
        match tag {
            1 => Self::Sse42,
            2 => Self::Avx2,
            3 => Self::Avx512,
            4 => Self::Neon,
            _ => Self::Fallback,
        }
    }
}

const UNINIT: u8 = u8::MAX;
static CACHED_AUTO: AtomicU8 = AtomicU8::new(UNINIT);

/// Probes CPU features and returns the best backend in preference order
/// AVX-512 > AVX2 > SSE4.2 > fallback on x86_64, NEON > fallback on
/// aarch64, fallback everywhere else (including when the `std` feature,
/// required for runtime probing, is disabled).
#[cfg(feature = "std")]
fn probe() -> Selected {
    #[cfg(target_arch = "x86_64")]
    {
        let avx512 = is_x86_feature_detected!("avx512f")
            && is_x86_feature_detected!("avx512bw")
            && is_x86_feature_detected!("avx512dq")
            && is_x86_feature_detected!("avx512cd")
            && is_x86_feature_detected!("avx512vl");
        if avx512 {
            return Selected::Avx512;
        }
        if is_x86_feature_detected!("avx2") {
            return Selected::Avx2;
        }
        if is_x86_feature_detected!("sse4.2") {
            return Selected::Sse42;
        }
        return Selected::Fallback;
    }
    #[cfg(target_arch = "aarch64")]
    {
        if std::arch::is_aarch64_feature_detected!("neon") {
            return Selected::Neon;
        }
        return Selected::Fallback;
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        Selected::Fallback
    }
}

#[cfg(not(feature = "std"))]
fn probe() -> Selected {
    Selected::Fallback
}

/// Resolves a [`BackendChoice`] to a concrete [`Selected`] backend,
/// probing and caching on [`BackendChoice::Auto`].
pub fn select(choice: BackendChoice) -> Selected {
    match choice {
        BackendChoice::Auto => {
            let cached = CACHED_AUTO.load(Ordering::Relaxed);
            if cached != UNINIT {
                return Selected::from_tag(cached);
            }
            let picked = probe();
            CACHED_AUTO.store(picked.to_tag(), Ordering::Relaxed);
            picked
        }
        BackendChoice::Fallback => Selected::Fallback,
        BackendChoice::Sse42 => Selected::Sse42,
        BackendChoice::Avx2 => Selected::Avx2,
        BackendChoice::Avx512 => Selected::Avx512,
        BackendChoice::Neon => Selected::Neon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_choices_bypass_probing() {
        assert_eq!(select(BackendChoice::Fallback), Selected::Fallback);
        assert_eq!(select(BackendChoice::Avx2), Selected::Avx2);
    }

    #[test]
    fn auto_selection_is_idempotent() {
        let first = select(BackendChoice::Auto);
        let second = select(BackendChoice::Auto);
        assert_eq!(first, second);
    }

    #[test]
    fn tag_round_trips() {
        for s in [
            Selected::Fallback,
            Selected::Sse42,
            Selected::Avx2,
            Selected::Avx512,
            Selected::Neon,
        ] {
            assert_eq!(Selected::from_tag(s.to_tag()), s);
        }
    }
}
