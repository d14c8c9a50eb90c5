//! Stage 1: structural indexer.
//!
//! Drives the classifier, escape resolver and UTF-8 checker one 64-byte
//! block at a time and flattens each block's `structurals_in_block` mask
//! into the caller-owned structural-index vector.

use alloc::vec::Vec;

use crate::classify::classify_block;
use crate::config::PAD;
use crate::error::{Error, ErrorCode};
use crate::escape::{resolve_block, ResolverState};
use crate::simd::Backend;
use crate::utf8::{validate_scalar, Utf8Checker};

/// Runs Stage 1 over `input`, appending absolute byte offsets to
/// `structurals` (cleared first) and terminating with a sentinel equal to
/// `input.len()`.
///
/// `input` need not be padded by the caller — this function copies each
/// tail block into a space-filled 64-byte scratch, matching the data
/// model's PAD contract without requiring the caller to over-allocate.
pub fn run<B: Backend>(input: &[u8], structurals: &mut Vec<u32>) -> Result<(), Error> {
    run_impl::<B>(input, structurals, false).map(|_| ())
}

/// As [`run`], but tolerant of a truncated trailing string or UTF-8
/// sequence — the tail of a batch window that simply hasn't arrived yet
/// rather than malformed input. Returns whether the input also ended
/// cleanly (no string, escape, or UTF-8 sequence left pending); pass that
/// through to [`last_complete_document`], which needs it to judge whether
/// a bare value touching the very end of `input` is trustworthy or merely
/// cut off.
pub fn run_streaming<B: Backend>(input: &[u8], structurals: &mut Vec<u32>) -> Result<bool, Error> {
    run_impl::<B>(input, structurals, true)
}

fn run_impl<B: Backend>(input: &[u8], structurals: &mut Vec<u32>, streaming: bool) -> Result<bool, Error> {
    structurals.clear();
    if input.is_empty() {
        return Err(Error::new(ErrorCode::Empty));
    }
    if input.len() > (u32::MAX as usize) - PAD {
        return Err(Error::new(ErrorCode::Capacity));
    }

    let mut resolver_state = ResolverState::default();
    let mut utf8 = Utf8Checker::new();

    let mut offset = 0usize;
    let mut scratch;
    let mut utf8_failed = false;
    while offset < input.len() {
        let remaining = input.len() - offset;
        let block: &[u8; 64] = if remaining >= 64 {
            <&[u8; 64]>::try_from(&input[offset..offset + 64]).unwrap()
        } else {
            // The tail is padded with spaces, not zeros: spaces are
            // whitespace to the classifier and legal string content to the
            // resolver, so the padding can neither invent structurals nor
            // trip the unescaped-control check while a string is open.
            scratch = [b' '; 64];
            scratch[..remaining].copy_from_slice(&input[offset..]);
            &scratch
        };

        let masks = classify_block::<B>(block);
        let resolved = resolve_block::<B>(block, masks.whitespace, masks.op, &mut resolver_state);
        utf8.check_block::<B>(block);

        let limit = core::cmp::min(64, remaining);
        flatten(resolved.structurals, offset, limit, structurals);

        // Stop at the first ill-formed block; its structurals are already
        // flattened, which the streaming truncation path below relies on.
        if utf8.has_error() {
            utf8_failed = true;
            break;
        }

        offset += 64;
    }

    // The block checker only knows *that* a block was bad; the scalar
    // oracle recovers the exact byte. A truncated final sequence reports
    // at `input.len()`, which streaming mode forgives as a cut-off tail.
    let mut utf8_truncated = false;
    if utf8_failed || !utf8.finish() {
        match validate_scalar(input) {
            Err(err) if streaming && err.offset == Some(input.len()) => {
                utf8_truncated = true;
            }
            Err(err) => return Err(err),
            // The scan stopped early, so the structural array is short;
            // a disagreement with the oracle still has to be an error.
            Ok(()) if utf8_failed => {
                return Err(Error::at(ErrorCode::Utf8Error, offset));
            }
            Ok(()) => {}
        }
    }

    if resolver_state.had_unescaped_control {
        return Err(Error::new(ErrorCode::UnescapedChars));
    }
    let ended_cleanly = !resolver_state.backslash_carry_out()
        && !resolver_state.inside_string_carry_out()
        && !utf8_truncated;
    if !streaming && !ended_cleanly {
        return Err(Error::at(ErrorCode::UnclosedString, input.len()));
    }
    if structurals.is_empty() {
        return Err(Error::new(ErrorCode::Empty));
    }

    structurals.push(input.len() as u32);
    Ok(ended_cleanly)
}

/// Appends every set bit of `mask` below bit `limit` to `out`, offset by
/// `base`.
///
/// Set bits are consumed via `x & (x - 1)` and `trailing_zeros`, eight
/// slots at a time: each round of eight writes unconditionally (an
/// exhausted mask just writes junk into slots the final truncate discards),
/// so the only branch taken per round is the count check. JSON blocks
/// rarely exceed eight structurals, so the common case is one round.
fn flatten(mask: u64, base: usize, limit: usize, out: &mut Vec<u32>) {
    let mask = if limit >= 64 {
        mask
    } else {
        mask & ((1u64 << limit) - 1)
    };
    if mask == 0 {
        return;
    }
    let count = mask.count_ones() as usize;
    let start = out.len();
    let rounded = (count + 7) & !7;
    out.resize(start + rounded, 0);

    let mut remaining = mask;
    let mut slot = start;
    while slot < start + rounded {
        for lane in 0..8 {
            out[slot + lane] = base as u32 + remaining.trailing_zeros();
            remaining &= remaining.wrapping_sub(1);
        }
        slot += 8;
    }
    out.truncate(start + count);
}

/// Streaming sub-mode: given indices already produced for a (possibly
/// truncated) prefix of a larger stream, finds the last fully complete
/// document by walking the structural indices forward and tracking
/// bracket balance, returning the byte offset one past that document's
/// close.
///
/// A bare top-level value (number, string, or literal — no bracket of its
/// own to balance) is only trusted as complete once the *next* structural
/// index names a genuine later position; if that next index is merely the
/// trailing sentinel, the value's own closing byte was never actually
/// observed, so it is only accepted when `ended_cleanly` confirms nothing
/// — no open string, no pending escape, no unfinished UTF-8 sequence —
/// was left hanging at end of input.
pub fn last_complete_document(input: &[u8], structurals: &[u32], ended_cleanly: bool) -> Option<usize> {
    let mut depth: i64 = 0;
    let mut last_complete_end: Option<usize> = None;
    let mut i = 0usize;
    while i < structurals.len() {
        let pos = structurals[i] as usize;
        if pos >= input.len() {
            break;
        }
        match input[pos] {
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth -= 1;
                if depth == 0 {
                    last_complete_end = Some(pos + 1);
                }
            }
            _ if depth == 0 => {
                if let Some(&next) = structurals.get(i + 1) {
                    let next = next as usize;
                    if next < input.len() || ended_cleanly {
                        last_complete_end = Some(next);
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    last_complete_end
}
