//! NEON backend: 16-byte registers, four per 64-byte block.
//!
//! ARM has no `movmskb` equivalent, so [`Neon::to_bitmask`] materializes
//! one bit per lane with a multiply-by-power-of-two-then-pairwise-add
//! reduction rather than a single instruction.

use core::arch::aarch64::*;

use super::Backend;

#[derive(Clone, Copy)]
pub struct Neon;

const BIT_POSITIONS: [u8; 16] = [
    0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80, 0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80,
];

impl Backend for Neon {
    type Vector = uint8x16_t;

    const LANES: usize = 16;
    const NAME: &'static str = "neon";

    #[inline]
    unsafe fn zero() -> Self::Vector {
        vdupq_n_u8(0)
    }

    #[inline]
    unsafe fn splat(byte: u8) -> Self::Vector {
        vdupq_n_u8(byte)
    }

    #[inline]
    unsafe fn load(ptr: *const u8) -> Self::Vector {
        vld1q_u8(ptr)
    }

    #[inline]
    unsafe fn table16(table: &[u8; 16]) -> Self::Vector {
        vld1q_u8(table.as_ptr())
    }

    #[inline]
    unsafe fn shuffle(table: Self::Vector, indices: Self::Vector) -> Self::Vector {
        // vqtbl1q_u8 already zeroes lanes whose index is >= 16, which is
        // exactly the pshufb "high bit set -> zero" convention since every
        // index this crate feeds in is either a nibble (0..16) or has bit
        // 7 set as a sentinel (>= 128, also >= 16).
        vqtbl1q_u8(table, indices)
    }

    #[inline]
    unsafe fn shr4(v: Self::Vector) -> Self::Vector {
        vshrq_n_u8(v, 4)
    }

    #[inline]
    unsafe fn and(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        vandq_u8(a, b)
    }

    #[inline]
    unsafe fn or(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        vorrq_u8(a, b)
    }

    #[inline]
    unsafe fn xor(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        veorq_u8(a, b)
    }

    #[inline]
    unsafe fn eq(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        vceqq_u8(a, b)
    }

    #[inline]
    unsafe fn gt_zero(v: Self::Vector) -> Self::Vector {
        vcgtq_u8(v, vdupq_n_u8(0))
    }

    #[inline]
    unsafe fn saturating_sub(v: Self::Vector, bound: u8) -> Self::Vector {
        vqsubq_u8(v, vdupq_n_u8(bound))
    }

    #[inline]
    unsafe fn to_bitmask(v: Self::Vector) -> u64 {
        let bit_mask = vld1q_u8(BIT_POSITIONS.as_ptr());
        let masked = vandq_u8(v, bit_mask);
        // Three pairwise adds fold the 16 lanes down to two adjacent sum
        // bytes: lane 0 holds bits 0-7, lane 1 holds bits 8-15.
        let mut reduced = vpaddq_u8(masked, masked);
        reduced = vpaddq_u8(reduced, reduced);
        reduced = vpaddq_u8(reduced, reduced);
        vgetq_lane_u16(vreinterpretq_u16_u8(reduced), 0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_bitmask_packs_all_16_lanes() {
        unsafe {
            let mut buf = [0u8; 16];
            buf[0] = 0x80;
            buf[15] = 0x80;
            let v = Neon::load(buf.as_ptr());
            assert_eq!(Neon::to_bitmask(v), (1 << 0) | (1 << 15));
        }
    }

    #[test]
    fn shuffle_zeroes_out_of_range_indices() {
        unsafe {
            let table = Neon::table16(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
            let mut idx = [0u8; 16];
            idx[0] = 0xFF;
            idx[1] = 15;
            let v = Neon::load(idx.as_ptr());
            let out = Neon::shuffle(table, v);
            let mut buf = [0u8; 16];
            vst1q_u8(buf.as_mut_ptr(), out);
            assert_eq!(buf[0], 0);
            assert_eq!(buf[1], 16);
        }
    }
}
