//! AVX2 backend: 32-byte registers, two per 64-byte block.
//!
//! `vpshufb` (`_mm256_shuffle_epi8`) operates independently within each
//! 128-bit lane, so the 16-entry table is replicated into both lanes by
//! [`Avx2::table16`] before use — the same broadcast this codebase's AVX2
//! string scanner already relies on.

use core::arch::x86_64::*;

use super::Backend;

#[derive(Clone, Copy)]
pub struct Avx2;

impl Backend for Avx2 {
    type Vector = __m256i;

    const LANES: usize = 32;
    const NAME: &'static str = "avx2";

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn zero() -> Self::Vector {
        _mm256_setzero_si256()
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn splat(byte: u8) -> Self::Vector {
        _mm256_set1_epi8(byte as i8)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn load(ptr: *const u8) -> Self::Vector {
        _mm256_loadu_si256(ptr as *const __m256i)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn table16(table: &[u8; 16]) -> Self::Vector {
        let lane = _mm_loadu_si128(table.as_ptr() as *const __m128i);
        _mm256_set_m128i(lane, lane)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn shuffle(table: Self::Vector, indices: Self::Vector) -> Self::Vector {
        _mm256_shuffle_epi8(table, indices)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn shr4(v: Self::Vector) -> Self::Vector {
        let shifted = _mm256_srli_epi16(v, 4);
        _mm256_and_si256(shifted, _mm256_set1_epi8(0x0F))
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn and(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        _mm256_and_si256(a, b)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn or(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        _mm256_or_si256(a, b)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn xor(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        _mm256_xor_si256(a, b)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn eq(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        _mm256_cmpeq_epi8(a, b)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn gt_zero(v: Self::Vector) -> Self::Vector {
        _mm256_cmpgt_epi8(v, _mm256_setzero_si256())
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn saturating_sub(v: Self::Vector, bound: u8) -> Self::Vector {
        _mm256_subs_epu8(v, _mm256_set1_epi8(bound as i8))
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn to_bitmask(v: Self::Vector) -> u64 {
        _mm256_movemask_epi8(v) as u32 as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supported() -> bool {
        is_x86_feature_detected!("avx2")
    }

    #[test]
    fn table16_replicates_into_both_lanes() {
        if !supported() {
            return;
        }
        unsafe {
            let table = Avx2::table16(&[9; 16]);
            let idx = Avx2::splat(0x00);
            let out = Avx2::shuffle(table, idx);
            let mut buf = [0u8; 32];
            _mm256_storeu_si256(buf.as_mut_ptr() as *mut __m256i, out);
            assert!(buf.iter().all(|&b| b == 9));
        }
    }

    #[test]
    fn to_bitmask_spans_32_lanes() {
        if !supported() {
            return;
        }
        unsafe {
            let mut buf = [0u8; 32];
            buf[0] = 0x80;
            buf[31] = 0x80;
            let v = Avx2::load(buf.as_ptr());
            assert_eq!(Avx2::to_bitmask(v), (1 << 0) | (1 << 31));
        }
    }
}
