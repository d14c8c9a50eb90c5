//! Tape: the flat 64-bit-word document representation Stage 2 builds.

use crate::error::{Error, ErrorCode};

/// One-byte tags stored in the high byte of every [`TapeWord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Kind {
    Root = b'r',
    ObjectOpen = b'{',
    ObjectClose = b'}',
    ArrayOpen = b'[',
    ArrayClose = b']',
    String = b'"',
    Int64 = b'l',
    Uint64 = b'u',
    Double = b'd',
    True = b't',
    False = b'f',
    Null = b'n',
}

impl Kind {
    const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            b'r' => Self::Root,
            b'{' => Self::ObjectOpen,
            b'}' => Self::ObjectClose,
            b'[' => Self::ArrayOpen,
            b']' => Self::ArrayClose,
            b'"' => Self::String,
            b'l' => Self::Int64,
            b'u' => Self::Uint64,
            b'd' => Self::Double,
            b't' => Self::True,
            b'f' => Self::False,
            b'n' => Self::Null,
            _ => return None,
        })
    }
}

const PAYLOAD_MASK: u64 = (1 << 56) - 1;

/// One 64-bit tape word: an 8-bit kind tag plus a 56-bit payload.
///
/// `l`/`u`/`d` words carry no payload of their own; the raw value occupies
/// the immediately following tape word instead.
///
/// `Pod`/`Zeroable` let [`Tape::as_bytes`] hand out the backing words as a
/// plain byte slice with no copy, the same way the rest of this codebase
/// reaches for `bytemuck` instead of `unsafe`-transmuting fixed-layout data.
#[derive(Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(transparent)]
pub struct TapeWord(u64);

impl TapeWord {
    #[inline]
    pub fn new(kind: Kind, payload: u64) -> Self {
        debug_assert!(payload <= PAYLOAD_MASK, "tape payload overflowed 56 bits");
        Self(((kind as u64) << 56) | (payload & PAYLOAD_MASK))
    }

    /// A raw 64-bit value word (the word following `l`/`u`/`d`), stored
    /// bit-for-bit rather than split into kind/payload.
    #[inline]
    pub fn raw(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    pub fn kind(self) -> Option<Kind> {
        Kind::from_tag((self.0 >> 56) as u8)
    }

    #[inline]
    pub fn payload(self) -> u64 {
        self.0 & PAYLOAD_MASK
    }

    #[inline]
    pub fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    /// Overwrites the payload in place, used to cross-link an opening
    /// bracket word once its matching close has been written.
    #[inline]
    pub fn set_payload(&mut self, payload: u64) {
        let kind_bits = self.0 & !PAYLOAD_MASK;
        self.0 = kind_bits | (payload & PAYLOAD_MASK);
    }
}

impl core::fmt::Debug for TapeWord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind() {
            Some(kind) => f
                .debug_struct("TapeWord")
                .field("kind", &(kind as u8 as char))
                .field("payload", &self.payload())
                .finish(),
            None => f.debug_tuple("TapeWord::raw").field(&self.0).finish(),
        }
    }
}

use alloc::vec::Vec;

/// Growable tape buffer, reused across parses by [`crate::parser::Parser`].
#[derive(Debug, Default)]
pub struct Tape {
    words: Vec<TapeWord>,
}

impl Tape {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.words.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    #[inline]
    pub fn push(&mut self, word: TapeWord) -> usize {
        let index = self.words.len();
        self.words.push(word);
        index
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<TapeWord> {
        self.words.get(index).copied()
    }

    #[inline]
    pub fn words(&self) -> &[TapeWord] {
        &self.words
    }

    /// The tape's words viewed as raw little-endian bytes, for dumping to
    /// a file or benchmark harness without an intermediate copy.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    #[inline]
    pub fn patch_payload(&mut self, index: usize, payload: u64) {
        self.words[index].set_payload(payload);
    }

    /// Validates the tape's structural invariants: the tape opens and
    /// closes with cross-linked `r` words, and every bracket payload points
    /// at the matching complement, which points straight back.
    ///
    /// The raw words following `l`/`u`/`d` hold arbitrary bits and are
    /// skipped rather than interpreted; a stored integer whose high byte
    /// happens to spell a bracket must not fail the audit.
    pub fn validate_structure(&self) -> Result<(), Error> {
        if self.words.len() < 2 {
            return Err(Error::new(ErrorCode::TapeError));
        }
        let first = self.words[0];
        let last = *self.words.last().unwrap();
        if first.kind() != Some(Kind::Root) || last.kind() != Some(Kind::Root) {
            return Err(Error::new(ErrorCode::TapeError));
        }
        if first.payload() as usize != self.words.len() - 1 || last.payload() != 0 {
            return Err(Error::new(ErrorCode::TapeError));
        }

        let mut i = 1usize;
        while i < self.words.len() - 1 {
            let word = self.words[i];
            match word.kind() {
                Some(Kind::Int64) | Some(Kind::Uint64) | Some(Kind::Double) => {
                    i += 2;
                    continue;
                }
                Some(open @ Kind::ObjectOpen) | Some(open @ Kind::ArrayOpen) => {
                    let target = word.payload() as usize;
                    let close = match open {
                        Kind::ObjectOpen => Kind::ObjectClose,
                        _ => Kind::ArrayClose,
                    };
                    let linked = target > i
                        && target < self.words.len()
                        && self.words[target].kind() == Some(close)
                        && self.words[target].payload() as usize == i;
                    if !linked {
                        return Err(Error::new(ErrorCode::TapeError));
                    }
                }
                Some(Kind::ObjectClose) | Some(Kind::ArrayClose) => {
                    if word.payload() as usize >= i {
                        return Err(Error::new(ErrorCode::TapeError));
                    }
                }
                _ => {}
            }
            i += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_through_56_bits() {
        let word = TapeWord::new(Kind::ObjectOpen, 0x00FF_FFFF_FFFF_FFFF);
        assert_eq!(word.kind(), Some(Kind::ObjectOpen));
        assert_eq!(word.payload(), 0x00FF_FFFF_FFFF_FFFF);
    }

    #[test]
    fn set_payload_preserves_kind() {
        let mut word = TapeWord::new(Kind::ArrayOpen, 3);
        word.set_payload(42);
        assert_eq!(word.kind(), Some(Kind::ArrayOpen));
        assert_eq!(word.payload(), 42);
    }

    #[test]
    fn raw_word_round_trips_integer_bits() {
        let word = TapeWord::raw((-7i64) as u64);
        assert_eq!(word.as_i64(), -7);
    }

    #[test]
    fn raw_word_round_trips_float_bits() {
        let word = TapeWord::raw(3.5f64.to_bits());
        assert_eq!(word.as_f64(), 3.5);
    }

    #[test]
    fn well_formed_document_validates() {
        let mut tape = Tape::default();
        tape.push(TapeWord::new(Kind::Root, 0));
        tape.push(TapeWord::new(Kind::True, 0));
        let close_index = tape.len() as u64;
        tape.patch_payload(0, close_index);
        tape.push(TapeWord::new(Kind::Root, 0));
        assert!(tape.validate_structure().is_ok());
    }

    #[test]
    fn raw_value_words_are_not_misread_as_brackets() {
        // An i64 payload whose high byte spells `{` must be skipped, not
        // audited as an unmatched bracket.
        let poison = (b'{' as u64) << 56;
        let mut tape = Tape::default();
        tape.push(TapeWord::new(Kind::Root, 0));
        tape.push(TapeWord::new(Kind::Int64, 0));
        tape.push(TapeWord::raw(poison));
        tape.patch_payload(0, 3);
        tape.push(TapeWord::new(Kind::Root, 0));
        assert!(tape.validate_structure().is_ok());
    }

    #[test]
    fn dangling_bracket_payload_is_rejected() {
        let mut tape = Tape::default();
        tape.push(TapeWord::new(Kind::Root, 0));
        tape.push(TapeWord::new(Kind::ArrayOpen, 9)); // points past the end
        tape.push(TapeWord::new(Kind::ArrayClose, 1));
        tape.patch_payload(0, 3);
        tape.push(TapeWord::new(Kind::Root, 0));
        assert!(tape.validate_structure().is_err());
    }

    #[test]
    fn as_bytes_is_little_endian_words() {
        let mut tape = Tape::default();
        tape.push(TapeWord::raw(0x0102_0304_0506_0708));
        assert_eq!(
            tape.as_bytes(),
            &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn truncated_tape_is_rejected() {
        let tape = Tape::default();
        assert!(tape.validate_structure().is_err());
    }
}
