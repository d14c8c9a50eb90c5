//! UTF-8 validator.
//!
//! Stage 1 calls [`Utf8Checker::check_block`] once per 64-byte block, in
//! lock-step with the classifier and resolver. The checker runs the
//! three-table nibble-lookup algorithm: for every byte it combines an
//! error-class bitmask keyed by the previous byte's high nibble, one keyed
//! by the previous byte's low nibble, and one keyed by the current byte's
//! high nibble. A byte is ill-formed exactly when all three lookups share
//! a bit. Sequences longer than two bytes are covered by a separate check
//! that the bytes two and three back promise a continuation here, XOR-ed
//! against what the tables already established.
//!
//! Cross-block state is one saved block (so `prev1`/`prev2`/`prev3` can
//! reach backwards at the boundary) plus a single *incomplete* flag for a
//! multibyte sequence still open at the block's end. Blocks with no high
//! bit set skip all of it; most JSON is close to pure ASCII.
//!
//! The checker reports *that* the input is ill-formed, not *where*; when it
//! fires, Stage 1 re-runs [`validate_scalar`] — the byte-by-byte reference
//! this module's tests also hold the lookup tables to — to recover the
//! exact offset on what is by then a cold error path.

use crate::error::{Error, ErrorCode};
use crate::simd::Backend;

// Error classes. Each bit names one way a (previous byte, current byte)
// pair can be ill-formed; the tables below distribute them so that the
// three-way AND is nonzero exactly for the RFC 3629 violations.
const TOO_SHORT: u8 = 1 << 0; // lead byte followed by another lead or ASCII
const TOO_LONG: u8 = 1 << 1; // ASCII followed by a continuation byte
const OVERLONG_3: u8 = 1 << 2; // E0 followed by 80..9F
const TOO_LARGE: u8 = 1 << 3; // F4 followed by 90..BF, or F5..FF lead
const SURROGATE: u8 = 1 << 4; // ED followed by A0..BF
const OVERLONG_2: u8 = 1 << 5; // C0/C1 lead
const TOO_LARGE_1000: u8 = 1 << 6; // F8..FF lead
const OVERLONG_4: u8 = 1 << 6; // F0 followed by 80..8F (shares a bit)
const TWO_CONTS: u8 = 1 << 7; // two continuation bytes in a row

const CARRY: u8 = TOO_SHORT | TOO_LONG | TWO_CONTS;

/// Indexed by the high nibble of the previous byte.
const BYTE_1_HIGH: [u8; 16] = [
    // 0_..7_: ASCII
    TOO_LONG, TOO_LONG, TOO_LONG, TOO_LONG, TOO_LONG, TOO_LONG, TOO_LONG, TOO_LONG,
    // 8_..B_: continuation
    TWO_CONTS, TWO_CONTS, TWO_CONTS, TWO_CONTS,
    // C_, D_: 2-byte lead
    TOO_SHORT | OVERLONG_2,
    TOO_SHORT,
    // E_: 3-byte lead
    TOO_SHORT | OVERLONG_3 | SURROGATE,
    // F_: 4-byte lead
    TOO_SHORT | TOO_LARGE | TOO_LARGE_1000 | OVERLONG_4,
];

/// Indexed by the low nibble of the previous byte.
const BYTE_1_LOW: [u8; 16] = [
    CARRY | OVERLONG_3 | OVERLONG_2 | OVERLONG_4, // _0: E0, C0, F0
    CARRY | OVERLONG_2,                           // _1: C1
    CARRY,
    CARRY,
    CARRY | TOO_LARGE,                  // _4: F4
    CARRY | TOO_LARGE | TOO_LARGE_1000, // _5: F5
    CARRY | TOO_LARGE | TOO_LARGE_1000,
    CARRY | TOO_LARGE | TOO_LARGE_1000,
    CARRY | TOO_LARGE | TOO_LARGE_1000,
    CARRY | TOO_LARGE | TOO_LARGE_1000,
    CARRY | TOO_LARGE | TOO_LARGE_1000,
    CARRY | TOO_LARGE | TOO_LARGE_1000,
    CARRY | TOO_LARGE | TOO_LARGE_1000,
    CARRY | TOO_LARGE | TOO_LARGE_1000 | SURROGATE, // _D: ED
    CARRY | TOO_LARGE | TOO_LARGE_1000,
    CARRY | TOO_LARGE | TOO_LARGE_1000,
];

/// Indexed by the high nibble of the current byte.
const BYTE_2_HIGH: [u8; 16] = [
    // 0_..7_: ASCII after a lead is too short
    TOO_SHORT, TOO_SHORT, TOO_SHORT, TOO_SHORT, TOO_SHORT, TOO_SHORT, TOO_SHORT, TOO_SHORT,
    // 8_: continuation in 80..8F
    TOO_LONG | OVERLONG_2 | TWO_CONTS | OVERLONG_3 | TOO_LARGE_1000 | OVERLONG_4,
    // 9_: continuation in 90..9F
    TOO_LONG | OVERLONG_2 | TWO_CONTS | OVERLONG_3 | TOO_LARGE,
    // A_, B_: continuation in A0..BF
    TOO_LONG | OVERLONG_2 | TWO_CONTS | SURROGATE | TOO_LARGE,
    TOO_LONG | OVERLONG_2 | TWO_CONTS | SURROGATE | TOO_LARGE,
    // C_..F_: lead after a lead is too short
    TOO_SHORT, TOO_SHORT, TOO_SHORT, TOO_SHORT,
];

/// Cross-block state for [`Utf8Checker::check_block`].
#[derive(Debug, Clone, Copy)]
pub struct Utf8Checker {
    has_error: bool,
    /// The previous block ended in a multibyte sequence still owed one or
    /// more continuation bytes.
    prev_incomplete: bool,
    prev_block: [u8; 64],
}

impl Default for Utf8Checker {
    fn default() -> Self {
        Self {
            has_error: false,
            prev_incomplete: false,
            prev_block: [0u8; 64],
        }
    }
}

impl Utf8Checker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sticky: true once any block so far contained ill-formed UTF-8.
    pub fn has_error(&self) -> bool {
        self.has_error
    }

    /// True if the most recent block ended mid-sequence; at true end of
    /// input this means the final character was cut off.
    pub fn pending_incomplete(&self) -> bool {
        self.prev_incomplete
    }

    /// End-of-input verdict: every byte seen was valid and no sequence was
    /// left open.
    pub fn finish(&self) -> bool {
        !self.has_error && !self.prev_incomplete
    }

    /// Validates one 64-byte block.
    pub fn check_block<B: Backend>(&mut self, block: &[u8; 64]) {
        // SAFETY: every intrinsic call below is gated behind the same
        // target-feature requirement the caller already proved when it
        // chose backend `B` (see `crate::simd::dispatch`).
        unsafe {
            if is_ascii::<B>(block) {
                // A sequence left open by the previous block can only be
                // completed by continuation bytes, which are not ASCII.
                self.has_error |= self.prev_incomplete;
                return;
            }

            // `prev1`/`prev2`/`prev3` loads reach across the block boundary,
            // so the two blocks are laid out back to back first.
            let mut concat = [0u8; 128];
            concat[..64].copy_from_slice(&self.prev_block);
            concat[64..].copy_from_slice(block);

            let low_nibbles = B::splat(0x0F);
            let high_bit = B::splat(0x80);
            let t_b1h = B::table16(&BYTE_1_HIGH);
            let t_b1l = B::table16(&BYTE_1_LOW);
            let t_b2h = B::table16(&BYTE_2_HIGH);

            let sub_vectors = 64 / B::LANES;
            for i in 0..sub_vectors {
                let offset = i * B::LANES;
                let cur = B::load(block.as_ptr().add(offset));
                let prev1 = B::load(concat.as_ptr().add(64 + offset - 1));
                let prev2 = B::load(concat.as_ptr().add(64 + offset - 2));
                let prev3 = B::load(concat.as_ptr().add(64 + offset - 3));

                let b1h = B::shuffle(t_b1h, B::shr4(prev1));
                let b1l = B::shuffle(t_b1l, B::and(prev1, low_nibbles));
                let b2h = B::shuffle(t_b2h, B::shr4(cur));
                let special_cases = B::and(B::and(b1h, b1l), b2h);

                // Bytes two (three) back that are 3-byte (4-byte) leads
                // promise a continuation here; saturating subtraction
                // leaves the high bit set exactly for those lanes.
                let is_third_byte = B::saturating_sub(prev2, 0xE0 - 0x80);
                let is_fourth_byte = B::saturating_sub(prev3, 0xF0 - 0x80);
                let must_be_continuation =
                    B::and(B::or(is_third_byte, is_fourth_byte), high_bit);

                // A required continuation cancels the TWO_CONTS bit the
                // tables raised for it; a missing or surplus one survives
                // the XOR as an error.
                let errors = B::xor(must_be_continuation, special_cases);
                if any_nonzero::<B>(errors) {
                    self.has_error = true;
                }
            }

            self.prev_incomplete =
                block[63] >= 0xC0 || block[62] >= 0xE0 || block[61] >= 0xF0;
            self.prev_block = *block;
        }
    }
}

#[inline]
unsafe fn is_ascii<B: Backend>(block: &[u8; 64]) -> bool {
    let sub_vectors = 64 / B::LANES;
    let mut high = 0u64;
    for i in 0..sub_vectors {
        let v = B::load(block.as_ptr().add(i * B::LANES));
        high |= B::to_bitmask(v) << (i * B::LANES);
    }
    high == 0
}

/// True iff any lane of `v` is nonzero. The error masks carry their
/// payload in low bits too, so a plain sign-bit gather is not enough.
#[inline]
unsafe fn any_nonzero<B: Backend>(v: B::Vector) -> bool {
    let zero_lanes = B::to_bitmask(B::eq(v, B::zero()));
    let all_lanes = if B::LANES == 64 {
        u64::MAX
    } else {
        (1u64 << B::LANES) - 1
    };
    zero_lanes != all_lanes
}

/// Portable byte-by-byte validator: the reference the lookup tables are
/// differential-tested against, and the error-offset recovery path Stage 1
/// falls back to once [`Utf8Checker`] has flagged a block.
///
/// A truncated sequence at the very end of `input` reports its error at
/// offset `input.len()`, which is how streaming callers distinguish "cut
/// off" from "ill-formed".
pub fn validate_scalar(input: &[u8]) -> Result<(), Error> {
    let mut pos = 0usize;
    while pos < input.len() {
        let lead = input[pos];
        let (len, min, max) = match lead {
            0x00..=0x7F => {
                pos += 1;
                continue;
            }
            0xC2..=0xDF => (2, 0x80, 0xBF),
            0xE0 => (3, 0xA0, 0xBF),
            0xE1..=0xEC | 0xEE..=0xEF => (3, 0x80, 0xBF),
            0xED => (3, 0x80, 0x9F),
            0xF0 => (4, 0x90, 0xBF),
            0xF1..=0xF3 => (4, 0x80, 0xBF),
            0xF4 => (4, 0x80, 0x8F),
            _ => return Err(Error::at(ErrorCode::Utf8Error, pos)),
        };
        // The first continuation byte carries the tightened range; the
        // rest are plain 80..BF.
        for i in 1..len {
            let Some(&byte) = input.get(pos + i) else {
                return Err(Error::at(ErrorCode::Utf8Error, input.len()));
            };
            let (lo, hi) = if i == 1 { (min, max) } else { (0x80, 0xBF) };
            if byte < lo || byte > hi {
                return Err(Error::at(ErrorCode::Utf8Error, pos + i));
            }
        }
        pos += len;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::scalar::Scalar;

    fn check_whole<B: Backend>(input: &[u8]) -> bool {
        let mut checker = Utf8Checker::new();
        let mut pos = 0;
        while pos < input.len() {
            let take = core::cmp::min(64, input.len() - pos);
            let mut block = [0u8; 64];
            block[..take].copy_from_slice(&input[pos..pos + take]);
            checker.check_block::<B>(&block);
            pos += take;
        }
        checker.finish()
    }

    fn agree(input: &[u8]) {
        assert_eq!(
            check_whole::<Scalar>(input),
            validate_scalar(input).is_ok(),
            "lookup and scalar validators disagree on {input:x?}"
        );
    }

    #[test]
    fn ascii_is_valid() {
        assert!(check_whole::<Scalar>(b"hello world"));
        assert!(validate_scalar(b"hello world").is_ok());
    }

    #[test]
    fn multibyte_sequences_are_valid() {
        for s in ["é", "日本語", "🎉", "مرحبا"] {
            assert!(check_whole::<Scalar>(s.as_bytes()), "{s}");
            assert!(validate_scalar(s.as_bytes()).is_ok(), "{s}");
        }
    }

    #[test]
    fn bare_continuation_byte_is_an_error() {
        assert!(!check_whole::<Scalar>(&[0x80]));
        assert!(!check_whole::<Scalar>(b"ab\x80cd"));
    }

    #[test]
    fn truncated_sequence_at_eof_is_an_error() {
        assert!(!check_whole::<Scalar>(&[0xC2]));
        assert!(!check_whole::<Scalar>(&[0xE0, 0xA0]));
        assert!(!check_whole::<Scalar>(&[0xF0, 0x90, 0x80]));
    }

    #[test]
    fn overlong_2byte_is_rejected() {
        assert!(!check_whole::<Scalar>(&[0xC0, 0x80]));
        assert!(!check_whole::<Scalar>(&[0xC1, 0x81]));
    }

    #[test]
    fn overlong_3byte_is_rejected() {
        assert!(!check_whole::<Scalar>(&[0xE0, 0x80, 0x80]));
        assert!(!check_whole::<Scalar>(&[0xE0, 0x9F, 0xBF]));
        assert!(check_whole::<Scalar>(&[0xE0, 0xA0, 0x80]));
    }

    #[test]
    fn overlong_4byte_is_rejected() {
        assert!(!check_whole::<Scalar>(&[0xF0, 0x80, 0x80, 0x80]));
        assert!(!check_whole::<Scalar>(&[0xF0, 0x8F, 0xBF, 0xBF]));
        assert!(check_whole::<Scalar>(&[0xF0, 0x90, 0x80, 0x80]));
    }

    #[test]
    fn surrogate_codepoints_are_rejected() {
        assert!(!check_whole::<Scalar>(&[0xED, 0xA0, 0x80]));
        assert!(!check_whole::<Scalar>(&[0xED, 0xBF, 0xBF]));
        assert!(check_whole::<Scalar>(&[0xED, 0x9F, 0xBF]));
    }

    #[test]
    fn too_large_codepoints_are_rejected() {
        assert!(!check_whole::<Scalar>(&[0xF4, 0x90, 0x80, 0x80]));
        assert!(check_whole::<Scalar>(&[0xF4, 0x8F, 0xBF, 0xBF]));
        assert!(!check_whole::<Scalar>(&[0xF5, 0x80, 0x80, 0x80]));
        assert!(!check_whole::<Scalar>(&[0xFF]));
    }

    #[test]
    fn missing_third_continuation_is_an_error() {
        // 3-byte lead, one continuation, then ASCII.
        assert!(!check_whole::<Scalar>(&[0xE1, 0x80, b'x']));
        // 4-byte lead, two continuations, then ASCII.
        assert!(!check_whole::<Scalar>(&[0xF1, 0x80, 0x80, b'x']));
    }

    #[test]
    fn surplus_continuation_is_an_error() {
        assert!(!check_whole::<Scalar>(&[0xC2, 0x80, 0x80]));
        assert!(!check_whole::<Scalar>(&[0xE1, 0x80, 0x80, 0x80]));
    }

    #[test]
    fn sequence_crossing_a_block_boundary_is_valid() {
        let mut input = vec![b'A'; 63];
        input.extend_from_slice("日".as_bytes());
        assert!(check_whole::<Scalar>(&input));
    }

    #[test]
    fn truncated_sequence_crossing_a_block_boundary_is_an_error() {
        let mut input = vec![b'A'; 63];
        input.push(0xE0);
        assert!(!check_whole::<Scalar>(&input));

        // Lead at the very end of a block, bad continuation opening the next.
        let mut input = vec![b'A'; 63];
        input.push(0xE0);
        input.push(0x80); // E0 requires A0..BF here
        input.push(0x80);
        assert!(!check_whole::<Scalar>(&input));
    }

    #[test]
    fn incomplete_sequence_followed_by_ascii_block_is_an_error() {
        let mut input = vec![b'A'; 63];
        input.push(0xC2);
        input.extend_from_slice(&[b'B'; 64]);
        assert!(!check_whole::<Scalar>(&input));
    }

    #[test]
    fn lookup_matches_scalar_on_all_two_byte_prefixes() {
        // Every (first, second) pair with a non-ASCII first byte, embedded
        // in ASCII so sequences are clearly delimited.
        for first in 0x80u16..=0xFF {
            for second in 0x00u16..=0xFF {
                let input = [b'a', first as u8, second as u8, b'z'];
                agree(&input);
            }
        }
    }

    #[test]
    fn lookup_matches_scalar_on_mixed_documents() {
        let corpus: &[&[u8]] = &[
            "{\"name\": \"café 日本語 🎉\", \"n\": 1}".as_bytes(),
            &[0xE2, 0x82, 0xAC, 0xF0, 0x9F, 0x98, 0x80],
            &[0xED, 0x9F, 0xBF, 0xEE, 0x80, 0x80],
            &[b'a', 0xC2, 0xA9, 0xC2, 0xA9, b'b'],
        ];
        for input in corpus {
            agree(input);
        }
    }
}
