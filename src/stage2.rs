//! Stage 2: tape builder.
//!
//! Walks the structural indices Stage 1 produced with an explicit state
//! machine over an explicit container stack. The stack doubles as both the
//! depth bookkeeping the tape format calls for and the call stack a
//! recursive-descent builder would need, so a pathologically nested
//! document can exhaust only its configured depth budget, never the real
//! call stack.
//!
//! The machine has two states. In the *value* state the current structural
//! must start a value; scalars are emitted on the spot, brackets push a
//! frame and re-enter the value state (objects via their first key). In
//! the *continuation* state a value has just finished and the innermost
//! open container decides what may follow: a comma re-enters the value
//! state, a close pops the frame and continues unwinding, and an empty
//! stack means the document is complete.

use alloc::vec::Vec;

use crate::error::{Error, ErrorCode};
use crate::number_parser::{parse_number, NumberValue};
use crate::string_parser::parse_string;
use crate::tape::{Kind, Tape, TapeWord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

/// One entry of the container stack: which bracket is open and the tape
/// index of its opening word, patched once the close is written.
#[derive(Debug, Clone, Copy)]
struct Frame {
    container: Container,
    open_index: usize,
}

/// Runs Stage 2 over `input`'s structural indices (including the trailing
/// sentinel Stage 1 always appends), filling `tape` and `strings`.
///
/// `tape` and `strings` are cleared first. `max_depth` bounds container
/// nesting; exceeding it returns `DEPTH_ERROR` rather than growing without
/// limit.
pub fn run(
    input: &[u8],
    structurals: &[u32],
    max_depth: usize,
    tape: &mut Tape,
    strings: &mut Vec<u8>,
) -> Result<(), Error> {
    tape.clear();
    strings.clear();

    // One offset plus the sentinel is the minimum for any document. Stage
    // 1 already reports bare whitespace, but direct callers can hand over
    // an index array holding nothing else.
    if structurals.len() < 2 {
        return Err(Error::new(ErrorCode::Empty));
    }

    let root_index = tape.push(TapeWord::new(Kind::Root, 0));
    let mut stack: Vec<Frame> = Vec::new();
    let mut i = 0usize;

    'value: loop {
        let (byte, pos) = at(input, structurals, i)?;
        i += 1;
        match byte {
            b'{' => {
                let frame = push_container(Container::Object, pos, max_depth, tape, &mut stack)?;
                let (next, next_pos) = at(input, structurals, i)?;
                match next {
                    b'}' => {
                        i += 1;
                        close_container(frame, tape, &mut stack);
                    }
                    b'"' => {
                        i += 1;
                        parse_key(input, structurals, &mut i, next_pos, tape, strings)?;
                        continue 'value;
                    }
                    _ => return Err(Error::at(ErrorCode::TapeError, next_pos)),
                }
            }
            b'[' => {
                let frame = push_container(Container::Array, pos, max_depth, tape, &mut stack)?;
                let (next, _) = at(input, structurals, i)?;
                if next == b']' {
                    i += 1;
                    close_container(frame, tape, &mut stack);
                } else {
                    continue 'value;
                }
            }
            _ => emit_scalar(byte, input, pos, tape, strings)?,
        }

        loop {
            let Some(&frame) = stack.last() else {
                break 'value;
            };
            let (byte, pos) = at(input, structurals, i)?;
            i += 1;
            match (frame.container, byte) {
                (Container::Object, b',') => {
                    let (key, key_pos) = at(input, structurals, i)?;
                    if key != b'"' {
                        return Err(Error::at(ErrorCode::TapeError, key_pos));
                    }
                    i += 1;
                    parse_key(input, structurals, &mut i, key_pos, tape, strings)?;
                    continue 'value;
                }
                (Container::Object, b'}') | (Container::Array, b']') => {
                    close_container(frame, tape, &mut stack);
                }
                (Container::Array, b',') => continue 'value,
                _ => return Err(Error::at(ErrorCode::TapeError, pos)),
            }
        }
    }

    // Exactly the trailing sentinel may remain: one document, one value.
    if i + 1 != structurals.len() {
        return Err(Error::at(ErrorCode::TapeError, structurals[i] as usize));
    }
    let close_index = tape.len();
    tape.patch_payload(root_index, close_index as u64);
    tape.push(TapeWord::new(Kind::Root, root_index as u64));
    Ok(())
}

/// The byte at structural index `i`, plus its input offset. Reading the
/// sentinel of an unpadded buffer is a grammar error (the document ended
/// where a token was required).
#[inline]
fn at(input: &[u8], structurals: &[u32], i: usize) -> Result<(u8, usize), Error> {
    let pos = *structurals
        .get(i)
        .ok_or_else(|| Error::at(ErrorCode::TapeError, input.len()))? as usize;
    let byte = *input
        .get(pos)
        .ok_or(Error::at(ErrorCode::TapeError, pos))?;
    Ok((byte, pos))
}

fn push_container(
    container: Container,
    pos: usize,
    max_depth: usize,
    tape: &mut Tape,
    stack: &mut Vec<Frame>,
) -> Result<Frame, Error> {
    if stack.len() >= max_depth {
        return Err(Error::at(ErrorCode::DepthError, pos));
    }
    let open_kind = match container {
        Container::Object => Kind::ObjectOpen,
        Container::Array => Kind::ArrayOpen,
    };
    let frame = Frame {
        container,
        open_index: tape.push(TapeWord::new(open_kind, 0)),
    };
    stack.push(frame);
    Ok(frame)
}

fn close_container(frame: Frame, tape: &mut Tape, stack: &mut Vec<Frame>) {
    stack.pop();
    let close_kind = match frame.container {
        Container::Object => Kind::ObjectClose,
        Container::Array => Kind::ArrayClose,
    };
    let close_index = tape.push(TapeWord::new(close_kind, frame.open_index as u64));
    tape.patch_payload(frame.open_index, close_index as u64);
}

/// Parses an object key whose opening quote sits at `quote_pos`, plus the
/// `:` that must follow it. On return `*i` names the field value's
/// structural index.
fn parse_key(
    input: &[u8],
    structurals: &[u32],
    i: &mut usize,
    quote_pos: usize,
    tape: &mut Tape,
    strings: &mut Vec<u8>,
) -> Result<(), Error> {
    let (record_offset, _end) = parse_string(input, quote_pos + 1, strings)?;
    tape.push(TapeWord::new(Kind::String, record_offset as u64));
    let (colon, colon_pos) = at(input, structurals, *i)?;
    if colon != b':' {
        return Err(Error::at(ErrorCode::TapeError, colon_pos));
    }
    *i += 1;
    Ok(())
}

fn emit_scalar(
    byte: u8,
    input: &[u8],
    pos: usize,
    tape: &mut Tape,
    strings: &mut Vec<u8>,
) -> Result<(), Error> {
    match byte {
        b'"' => {
            let (record_offset, _end) = parse_string(input, pos + 1, strings)?;
            tape.push(TapeWord::new(Kind::String, record_offset as u64));
        }
        b'0'..=b'9' | b'-' => {
            let (value, end) = parse_number(input, pos)?;
            check_scalar_end(input, end, ErrorCode::NumberError)?;
            match value {
                NumberValue::Signed(v) => {
                    tape.push(TapeWord::new(Kind::Int64, 0));
                    tape.push(TapeWord::raw(v as u64));
                }
                NumberValue::Unsigned(v) => {
                    tape.push(TapeWord::new(Kind::Uint64, 0));
                    tape.push(TapeWord::raw(v));
                }
                NumberValue::Double(v) => {
                    tape.push(TapeWord::new(Kind::Double, 0));
                    tape.push(TapeWord::raw(v.to_bits()));
                }
            }
        }
        b't' => {
            expect_literal(input, pos, b"true", ErrorCode::TAtomError)?;
            check_scalar_end(input, pos + 4, ErrorCode::TAtomError)?;
            tape.push(TapeWord::new(Kind::True, 0));
        }
        b'f' => {
            expect_literal(input, pos, b"false", ErrorCode::FAtomError)?;
            check_scalar_end(input, pos + 5, ErrorCode::FAtomError)?;
            tape.push(TapeWord::new(Kind::False, 0));
        }
        b'n' => {
            expect_literal(input, pos, b"null", ErrorCode::NAtomError)?;
            check_scalar_end(input, pos + 4, ErrorCode::NAtomError)?;
            tape.push(TapeWord::new(Kind::Null, 0));
        }
        _ => return Err(Error::at(ErrorCode::TapeError, pos)),
    }
    Ok(())
}

fn expect_literal(input: &[u8], pos: usize, literal: &[u8], code: ErrorCode) -> Result<(), Error> {
    let end = pos + literal.len();
    if input.len() < end || &input[pos..end] != literal {
        return Err(Error::at(code, pos));
    }
    Ok(())
}

/// A scalar token must be followed by whitespace, a structural operator,
/// the parser's NUL padding, or the end of the buffer; anything else
/// (`123abc`, `truex`) glues onto the token and is an error. Stage 1 never
/// indexes such a tail as its own structural, so this is the only place it
/// can be caught.
fn check_scalar_end(input: &[u8], end: usize, code: ErrorCode) -> Result<(), Error> {
    match input.get(end) {
        None => Ok(()),
        Some(&b) if matches!(b, b' ' | b'\t' | b'\n' | b'\r') => Ok(()),
        Some(&b) if matches!(b, b'{' | b'}' | b'[' | b']' | b',' | b':') => Ok(()),
        Some(&0) => Ok(()),
        Some(_) => Err(Error::at(code, end)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::scalar::Scalar;
    use crate::tape::Kind;

    fn try_parse(input: &[u8]) -> Result<(Tape, Vec<u8>), Error> {
        let mut structurals = Vec::new();
        crate::stage1::run::<Scalar>(input, &mut structurals)?;
        let mut tape = Tape::default();
        let mut strings = Vec::new();
        run(input, &structurals, 1024, &mut tape, &mut strings)?;
        Ok((tape, strings))
    }

    fn parse(input: &[u8]) -> (Tape, Vec<u8>) {
        try_parse(input).unwrap()
    }

    #[test]
    fn scalar_true() {
        let (tape, _) = parse(b"true");
        assert_eq!(tape.words().len(), 3);
        assert_eq!(tape.get(1).unwrap().kind(), Some(Kind::True));
        tape.validate_structure().unwrap();
    }

    #[test]
    fn scalar_number() {
        let (tape, _) = parse(b"42");
        assert_eq!(tape.get(1).unwrap().kind(), Some(Kind::Int64));
        assert_eq!(tape.get(2).unwrap().as_i64(), 42);
        tape.validate_structure().unwrap();
    }

    #[test]
    fn empty_object() {
        let (tape, _) = parse(b"{}");
        assert_eq!(tape.get(1).unwrap().kind(), Some(Kind::ObjectOpen));
        assert_eq!(tape.get(1).unwrap().payload(), 2);
        assert_eq!(tape.get(2).unwrap().kind(), Some(Kind::ObjectClose));
        assert_eq!(tape.get(2).unwrap().payload(), 1);
        tape.validate_structure().unwrap();
    }

    #[test]
    fn root_words_cross_link() {
        let (tape, _) = parse(b"[]");
        assert_eq!(tape.get(0).unwrap().payload(), 3);
        assert_eq!(tape.get(3).unwrap().payload(), 0);
    }

    #[test]
    fn nested_object_with_values() {
        let (tape, strings) = parse(br#"{"a":1,"b":[true,null]}"#);
        tape.validate_structure().unwrap();
        assert_eq!(tape.get(1).unwrap().kind(), Some(Kind::String));
        let key =
            crate::string_parser::read_record(&strings, tape.get(1).unwrap().payload() as usize);
        assert_eq!(key, b"a");
    }

    #[test]
    fn deeply_nested_document_never_touches_the_call_stack() {
        // Far deeper than any recursive builder could survive; the
        // explicit stack just grows.
        let depth = 50_000;
        let mut json = alloc::string::String::new();
        for _ in 0..depth {
            json.push('[');
        }
        for _ in 0..depth {
            json.push(']');
        }
        let input = json.as_bytes();
        let mut structurals = Vec::new();
        crate::stage1::run::<Scalar>(input, &mut structurals).unwrap();
        let mut tape = Tape::default();
        let mut strings = Vec::new();
        run(input, &structurals, depth, &mut tape, &mut strings).unwrap();
        tape.validate_structure().unwrap();
    }

    #[test]
    fn trailing_comma_is_rejected() {
        assert!(try_parse(br#"[1,]"#).is_err());
        assert!(try_parse(br#"{"a":1,}"#).is_err());
    }

    #[test]
    fn mismatched_brackets_are_rejected() {
        assert!(try_parse(br#"[1}"#).is_err());
        assert!(try_parse(br#"{"a":1]"#).is_err());
    }

    #[test]
    fn glued_scalar_tails_are_rejected() {
        assert_eq!(try_parse(b"truex").unwrap_err().code, ErrorCode::TAtomError);
        assert_eq!(try_parse(b"falsey").unwrap_err().code, ErrorCode::FAtomError);
        assert_eq!(try_parse(b"nullz").unwrap_err().code, ErrorCode::NAtomError);
        assert_eq!(try_parse(b"123abc").unwrap_err().code, ErrorCode::NumberError);
        assert_eq!(
            try_parse(b"[1.5e2q]").unwrap_err().code,
            ErrorCode::NumberError
        );
    }

    #[test]
    fn misspelled_atoms_are_rejected() {
        assert_eq!(try_parse(b"tru").unwrap_err().code, ErrorCode::TAtomError);
        assert_eq!(try_parse(b"nul").unwrap_err().code, ErrorCode::NAtomError);
        assert_eq!(try_parse(b"fals").unwrap_err().code, ErrorCode::FAtomError);
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut json = alloc::string::String::new();
        for _ in 0..5 {
            json.push('[');
        }
        for _ in 0..5 {
            json.push(']');
        }
        let input = json.as_bytes();
        let mut structurals = Vec::new();
        crate::stage1::run::<Scalar>(input, &mut structurals).unwrap();
        let mut tape = Tape::default();
        let mut strings = Vec::new();
        let err = run(input, &structurals, 3, &mut tape, &mut strings).unwrap_err();
        assert_eq!(err.code, ErrorCode::DepthError);
        assert!(run(input, &structurals, 5, &mut tape, &mut strings).is_ok());
    }

    #[test]
    fn multiple_top_level_values_is_rejected() {
        assert!(try_parse(br#"1 2"#).is_err());
        assert!(try_parse(br#"{} []"#).is_err());
    }

    #[test]
    fn missing_colon_is_rejected() {
        assert!(try_parse(br#"{"a" 1}"#).is_err());
    }

    #[test]
    fn non_string_key_is_rejected() {
        assert!(try_parse(br#"{1:2}"#).is_err());
    }
}
