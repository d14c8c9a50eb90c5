//! Escape and string resolver.
//!
//! Everything here operates on the plain `u64` block masks; once the three
//! input masks (`backslash`, `quote`, `control`) are in hand, the rest is
//! portable bit-twiddling with one bit of carry explicitly threaded
//! between blocks; rescanning a trailing backslash run at the next block
//! would do the same job with more machinery.

use crate::simd::{prefix_xor, Backend};

const EVEN_BITS: u64 = 0x5555_5555_5555_5555;

/// Carry state threaded from one 64-byte block to the next.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverState {
    /// True if the previous block ended inside an odd-length backslash run.
    backslash_carry: bool,
    /// True if the previous block ended inside a string.
    inside_string_carry: bool,
    /// True if the previous non-whitespace, non-operator byte was the
    /// start of a still-open primitive run (number/literal continuation).
    primitive_carry: bool,
    /// Sticky: set once any control character is found inside a string.
    pub had_unescaped_control: bool,
}

impl ResolverState {
    /// True if the final block ended mid-escape (an odd-length backslash
    /// run with nothing after it) — a truncated-input error at end of input.
    pub fn backslash_carry_out(&self) -> bool {
        self.backslash_carry
    }

    /// True if the final block ended inside an open string.
    pub fn inside_string_carry_out(&self) -> bool {
        self.inside_string_carry
    }
}

/// Per-block output of the resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvedMasks {
    pub inside_string: u64,
    pub structurals: u64,
}

/// Computes the three raw per-byte comparisons the resolver needs:
/// `\`, `"`, and bytes `<= 0x1F`.
#[inline]
fn scan_bytes<B: Backend>(block: &[u8; 64]) -> (u64, u64, u64) {
    // SAFETY: same contract as `classify_block` — `B` was chosen by a
    // feature probe the caller already performed.
    unsafe {
        let sub_vectors = 64 / B::LANES;
        let mut backslash = 0u64;
        let mut quote = 0u64;
        let mut control = 0u64;
        let backslash_needle = B::splat(b'\\');
        let quote_needle = B::splat(b'"');

        for i in 0..sub_vectors {
            let v = B::load(block.as_ptr().add(i * B::LANES));
            let b = B::to_bitmask(B::eq(v, backslash_needle));
            let q = B::to_bitmask(B::eq(v, quote_needle));
            let c = B::to_bitmask(B::lteq(v, 0x1F));
            backslash |= b << (i * B::LANES);
            quote |= q << (i * B::LANES);
            control |= c << (i * B::LANES);
        }

        (backslash, quote, control)
    }
}

/// Escape mask algorithm, operating purely on `u64`.
/// Returns `(escaped, carry_out)`.
///
/// When the previous block ended in an odd-length backslash run, its carry
/// escapes this block's first byte; if that byte is itself a backslash it
/// is a literal and must not start a new run, hence the bit-0 clear.
fn escape_mask(backslash: u64, carry_in: bool) -> (u64, bool) {
    let carry_in_bit = carry_in as u64;
    let backslash = backslash & !carry_in_bit;

    let follows = (backslash << 1) | carry_in_bit;
    let odd_sequence_starts = backslash & !EVEN_BITS & !follows;

    let (sum, carry_out) = backslash.overflowing_add(odd_sequence_starts);
    let invert_mask = sum << 1;

    let escaped = (EVEN_BITS ^ invert_mask) & follows;
    (escaped, carry_out)
}

/// Runs the classifier's output plus the resolver over one block.
///
/// `quote` is folded directly into the structural set rather than left to
/// fall out of `primitive`/`start_primitive`, and `primitive` itself
/// excludes quote bytes, keeping quote detection out of the run-start
/// bookkeeping and ORing it back in separately.
/// Without that split, an opening quote (preceded by a string
/// byte in a prior adjacent string, or simply by an operator) could land on
/// the wrong side of the inside-string mask depending on block boundaries.
///
/// `inside_string` (called `string_tail` in the derivation) is the prefix
/// XOR of the quote toggle shifted one bit later than the textbook
/// inclusive version: bit `i` means "byte `i` is string content or a
/// closing quote", so the opening quote itself is never masked out of
/// `structurals`, while the closing quote never gets a spurious structural
/// entry of its own.
pub fn resolve_block<B: Backend>(
    block: &[u8; 64],
    whitespace: u64,
    op: u64,
    state: &mut ResolverState,
) -> ResolvedMasks {
    let (backslash, quote_raw, control) = scan_bytes::<B>(block);

    let (escaped, backslash_carry_out) = escape_mask(backslash, state.backslash_carry);
    state.backslash_carry = backslash_carry_out;

    let quote = quote_raw & !escaped;
    let local_incl = prefix_xor(quote);
    let incl = local_incl ^ sign_extend(state.inside_string_carry);
    let carry_in_bit = state.inside_string_carry as u64;
    let inside_string = (incl << 1) | carry_in_bit;
    state.inside_string_carry = (incl >> 63) & 1 != 0;

    state.had_unescaped_control |= (control & inside_string) != 0;

    let primitive = !(op | whitespace | quote);
    let follows_primitive = (primitive << 1) | (state.primitive_carry as u64);
    state.primitive_carry = (primitive >> 63) & 1 != 0;
    let start_primitive = primitive & !follows_primitive;

    let structurals = (op | quote | start_primitive) & !inside_string;

    ResolvedMasks {
        inside_string,
        structurals,
    }
}

#[inline]
fn sign_extend(carry: bool) -> u64 {
    if carry {
        u64::MAX
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_block;
    use crate::simd::scalar::Scalar;

    fn run(input: &[u8]) -> (ResolvedMasks, ResolverState) {
        let mut block = [0u8; 64];
        block[..input.len()].copy_from_slice(input);
        let masks = classify_block::<Scalar>(&block);
        let mut state = ResolverState::default();
        let resolved = resolve_block::<Scalar>(&block, masks.whitespace, masks.op, &mut state);
        (resolved, state)
    }

    #[test]
    fn no_backslashes_no_escapes() {
        let (_, state) = run(b"\"abc\"");
        assert!(!state.backslash_carry);
    }

    #[test]
    fn double_backslash_is_not_an_escape() {
        // `\\` is a literal backslash; it does not escape anything after it.
        let mut block = [0u8; 64];
        let text = br#""a\\"b"#;
        block[..text.len()].copy_from_slice(text);
        let masks = classify_block::<Scalar>(&block);
        let mut state = ResolverState::default();
        let resolved = resolve_block::<Scalar>(&block, masks.whitespace, masks.op, &mut state);
        // quote at index 0 opens, the second `"` at index 4 closes (since
        // `\\` does not escape it), so `b` at index 5 is outside the string.
        assert_eq!(resolved.inside_string & (1 << 5), 0);
    }

    #[test]
    fn escaped_quote_does_not_close_string() {
        let text = br#""a\"b""#;
        let mut block = [0u8; 64];
        block[..text.len()].copy_from_slice(text);
        let masks = classify_block::<Scalar>(&block);
        let mut state = ResolverState::default();
        let resolved = resolve_block::<Scalar>(&block, masks.whitespace, masks.op, &mut state);
        // the whole literal `"a\"b"` (indices 0..=5) is the string.
        for i in 1..5 {
            assert_ne!(resolved.inside_string & (1 << i), 0, "index {i}");
        }
        assert_eq!(resolved.inside_string & (1 << 6), 0);
    }

    #[test]
    fn control_byte_inside_string_is_flagged() {
        let mut block = [0u8; 64];
        block[0] = b'"';
        block[1] = 0x01;
        block[2] = b'"';
        let masks = classify_block::<Scalar>(&block);
        let mut state = ResolverState::default();
        let _ = resolve_block::<Scalar>(&block, masks.whitespace, masks.op, &mut state);
        assert!(state.had_unescaped_control);
    }

    #[test]
    fn escape_carry_spans_a_block_boundary() {
        // `"a...a\` fills the first block so the backslash is its last
        // byte; the quote opening the second block is escaped by it and
        // must not close the string.
        let mut input = alloc::vec::Vec::new();
        input.push(b'"');
        input.resize(63, b'a');
        input.push(b'\\');
        input.extend_from_slice(b"\"b\"");

        let mut state = ResolverState::default();
        let mut resolved = ResolvedMasks::default();
        for chunk in input.chunks(64) {
            let mut block = [b' '; 64];
            block[..chunk.len()].copy_from_slice(chunk);
            let masks = classify_block::<Scalar>(&block);
            resolved = resolve_block::<Scalar>(&block, masks.whitespace, masks.op, &mut state);
        }
        // Second block is `"b"`: the escaped quote at 0 stays inside the
        // string, `b` at 1 is content, the quote at 2 closes it.
        assert_ne!(resolved.inside_string & (1 << 0), 0);
        assert_ne!(resolved.inside_string & (1 << 1), 0);
        assert!(!state.inside_string_carry_out());
    }

    #[test]
    fn literal_backslash_pair_split_across_blocks_still_closes() {
        // Block 1 ends in `\`, block 2 begins with `\"`: the two
        // backslashes form one literal and the quote closes the string.
        let mut input = alloc::vec::Vec::new();
        input.push(b'"');
        input.resize(63, b'a');
        input.push(b'\\');
        input.extend_from_slice(b"\\\"");

        let mut state = ResolverState::default();
        for chunk in input.chunks(64) {
            let mut block = [b' '; 64];
            block[..chunk.len()].copy_from_slice(chunk);
            let masks = classify_block::<Scalar>(&block);
            let _ = resolve_block::<Scalar>(&block, masks.whitespace, masks.op, &mut state);
        }
        assert!(!state.inside_string_carry_out());
        assert!(!state.backslash_carry_out());
    }

    #[test]
    fn structurals_mark_value_starts_outside_strings() {
        let (resolved, _) = run(b"{\"a\":1}");
        // `{` at 0, `"` at 1 (start of string), `1` at 5, `}` at 6
        assert_ne!(resolved.structurals & (1 << 0), 0);
        assert_ne!(resolved.structurals & (1 << 1), 0);
        assert_ne!(resolved.structurals & (1 << 5), 0);
        assert_ne!(resolved.structurals & (1 << 6), 0);
        // the colon at index 4 is *inside* neither a string nor a primitive,
        // but it is itself an operator, so it is structural too.
        assert_ne!(resolved.structurals & (1 << 4), 0);
        // the `a` at index 2 is inside the string, never structural.
        assert_eq!(resolved.structurals & (1 << 2), 0);
    }
}
