//! AVX-512 backend: one 64-byte register covers a whole block.
//!
//! AVX-512 compares produce `__mmask64` values directly rather than
//! all-ones/all-zero vectors; `movm`/`movepi8_mask` convert between the two
//! representations so this backend can still satisfy the same
//! [`Backend`] contract as the narrower ones, following the k-mask style
//! already used by this codebase's AVX-512 semi-index builder.

use core::arch::x86_64::*;

use super::Backend;

#[derive(Clone, Copy)]
pub struct Avx512;

impl Backend for Avx512 {
    type Vector = __m512i;

    const LANES: usize = 64;
    const NAME: &'static str = "avx512";

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn zero() -> Self::Vector {
        _mm512_setzero_si512()
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn splat(byte: u8) -> Self::Vector {
        _mm512_set1_epi8(byte as i8)
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn load(ptr: *const u8) -> Self::Vector {
        _mm512_loadu_si512(ptr as *const __m512i)
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn table16(table: &[u8; 16]) -> Self::Vector {
        let lane = _mm_loadu_si128(table.as_ptr() as *const __m128i);
        _mm512_broadcast_i32x4(lane)
    }

    #[inline]
    #[target_feature(enable = "avx512bw")]
    unsafe fn shuffle(table: Self::Vector, indices: Self::Vector) -> Self::Vector {
        _mm512_shuffle_epi8(table, indices)
    }

    #[inline]
    #[target_feature(enable = "avx512bw")]
    unsafe fn shr4(v: Self::Vector) -> Self::Vector {
        let shifted = _mm512_srli_epi16(v, 4);
        _mm512_and_si512(shifted, _mm512_set1_epi8(0x0F))
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn and(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        _mm512_and_si512(a, b)
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn or(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        _mm512_or_si512(a, b)
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn xor(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        _mm512_xor_si512(a, b)
    }

    #[inline]
    #[target_feature(enable = "avx512bw")]
    unsafe fn eq(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        let mask = _mm512_cmpeq_epi8_mask(a, b);
        _mm512_movm_epi8(mask)
    }

    #[inline]
    #[target_feature(enable = "avx512bw")]
    unsafe fn gt_zero(v: Self::Vector) -> Self::Vector {
        let mask = _mm512_cmpgt_epi8_mask(v, _mm512_setzero_si512());
        _mm512_movm_epi8(mask)
    }

    #[inline]
    #[target_feature(enable = "avx512bw")]
    unsafe fn saturating_sub(v: Self::Vector, bound: u8) -> Self::Vector {
        _mm512_subs_epu8(v, _mm512_set1_epi8(bound as i8))
    }

    #[inline]
    #[target_feature(enable = "avx512bw")]
    unsafe fn to_bitmask(v: Self::Vector) -> u64 {
        _mm512_movepi8_mask(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supported() -> bool {
        is_x86_feature_detected!("avx512f") && is_x86_feature_detected!("avx512bw")
    }

    #[test]
    fn to_bitmask_spans_64_lanes() {
        if !supported() {
            return;
        }
        unsafe {
            let mut buf = [0u8; 64];
            buf[0] = 0x80;
            buf[63] = 0x80;
            let v = Avx512::load(buf.as_ptr());
            assert_eq!(Avx512::to_bitmask(v), (1u64 << 0) | (1u64 << 63));
        }
    }

    #[test]
    fn gt_zero_round_trips_through_bitmask() {
        if !supported() {
            return;
        }
        unsafe {
            let mut buf = [0u8; 64];
            buf[5] = 3;
            let v = Avx512::load(buf.as_ptr());
            let mask = Avx512::to_bitmask(Avx512::gt_zero(v));
            assert_eq!(mask, 1u64 << 5);
        }
    }
}
