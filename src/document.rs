//! Document query surface: read-only access to a parsed tape.
//!
//! A [`Document`] borrows the tape and string buffer a [`crate::parser::Parser`]
//! just filled; it never owns them, so it cannot outlive the parser (or the
//! next `parse` call) without the borrow checker noticing.

use crate::error::{Error, ErrorCode};
use crate::string_parser::read_record;
use crate::tape::{Kind, Tape, TapeWord};

/// What kind of JSON value a [`Value`] currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Object,
    Array,
    String,
    Int64,
    Uint64,
    Double,
    Bool,
    Null,
}

/// A parsed document: the tape plus the string buffer it points into.
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    tape: &'a Tape,
    strings: &'a [u8],
}

impl<'a> Document<'a> {
    pub(crate) fn new(tape: &'a Tape, strings: &'a [u8]) -> Self {
        Self { tape, strings }
    }

    /// The document's single top-level value.
    pub fn root(&self) -> Value<'a> {
        Value {
            tape: self.tape,
            strings: self.strings,
            index: 1,
        }
    }
}

/// A cursor onto one tape word and everything reachable from it.
#[derive(Debug, Clone, Copy)]
pub struct Value<'a> {
    tape: &'a Tape,
    strings: &'a [u8],
    index: usize,
}

impl<'a> Value<'a> {
    fn word(&self) -> TapeWord {
        self.tape.get(self.index).expect("value index within tape")
    }

    pub fn value_type(&self) -> ValueType {
        match self.word().kind() {
            Some(Kind::ObjectOpen) => ValueType::Object,
            Some(Kind::ArrayOpen) => ValueType::Array,
            Some(Kind::String) => ValueType::String,
            Some(Kind::Int64) => ValueType::Int64,
            Some(Kind::Uint64) => ValueType::Uint64,
            Some(Kind::Double) => ValueType::Double,
            Some(Kind::True) | Some(Kind::False) => ValueType::Bool,
            Some(Kind::Null) => ValueType::Null,
            _ => unreachable!("tape word at a value position is never a bracket close or root"),
        }
    }

    pub fn is_null(&self) -> bool {
        self.value_type() == ValueType::Null
    }

    pub fn get_bool(&self) -> Result<bool, Error> {
        match self.word().kind() {
            Some(Kind::True) => Ok(true),
            Some(Kind::False) => Ok(false),
            _ => Err(Error::new(ErrorCode::IncorrectType)),
        }
    }

    pub fn get_i64(&self) -> Result<i64, Error> {
        match self.word().kind() {
            Some(Kind::Int64) => Ok(self.next_word().as_i64()),
            Some(Kind::Uint64) => {
                let v = self.next_word().as_u64();
                i64::try_from(v).map_err(|_| Error::new(ErrorCode::NumberOutOfRange))
            }
            _ => Err(Error::new(ErrorCode::IncorrectType)),
        }
    }

    pub fn get_u64(&self) -> Result<u64, Error> {
        match self.word().kind() {
            Some(Kind::Uint64) => Ok(self.next_word().as_u64()),
            Some(Kind::Int64) => {
                let v = self.next_word().as_i64();
                u64::try_from(v).map_err(|_| Error::new(ErrorCode::NumberOutOfRange))
            }
            _ => Err(Error::new(ErrorCode::IncorrectType)),
        }
    }

    pub fn get_f64(&self) -> Result<f64, Error> {
        match self.word().kind() {
            Some(Kind::Double) => Ok(self.next_word().as_f64()),
            Some(Kind::Int64) => Ok(self.next_word().as_i64() as f64),
            Some(Kind::Uint64) => Ok(self.next_word().as_u64() as f64),
            _ => Err(Error::new(ErrorCode::IncorrectType)),
        }
    }

    pub fn get_string(&self) -> Result<&'a [u8], Error> {
        match self.word().kind() {
            Some(Kind::String) => Ok(read_record(self.strings, self.word().payload() as usize)),
            _ => Err(Error::new(ErrorCode::IncorrectType)),
        }
    }

    fn next_word(&self) -> TapeWord {
        self.tape
            .get(self.index + 1)
            .expect("l/u/d words are always followed by their raw payload word")
    }

    pub fn get_array(&self) -> Result<ArrayIter<'a>, Error> {
        if self.word().kind() != Some(Kind::ArrayOpen) {
            return Err(Error::new(ErrorCode::IncorrectType));
        }
        Ok(ArrayIter {
            tape: self.tape,
            strings: self.strings,
            cursor: self.index + 1,
            end: self.word().payload() as usize,
        })
    }

    pub fn get_object(&self) -> Result<ObjectIter<'a>, Error> {
        if self.word().kind() != Some(Kind::ObjectOpen) {
            return Err(Error::new(ErrorCode::IncorrectType));
        }
        Ok(ObjectIter {
            tape: self.tape,
            strings: self.strings,
            cursor: self.index + 1,
            end: self.word().payload() as usize,
        })
    }
}

/// Advances `cursor` past the value starting there, returning the index one
/// past it (the `l`/`u`/`d` raw-value words count as part of the value).
fn skip_value(tape: &Tape, cursor: usize) -> usize {
    let word = tape.get(cursor).expect("value index within tape");
    match word.kind() {
        Some(Kind::ObjectOpen) | Some(Kind::ArrayOpen) => word.payload() as usize + 1,
        Some(Kind::Int64) | Some(Kind::Uint64) | Some(Kind::Double) => cursor + 2,
        _ => cursor + 1,
    }
}

/// Iterator over an array's elements.
pub struct ArrayIter<'a> {
    tape: &'a Tape,
    strings: &'a [u8],
    cursor: usize,
    end: usize,
}

impl<'a> Iterator for ArrayIter<'a> {
    type Item = Value<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.end {
            return None;
        }
        let value = Value {
            tape: self.tape,
            strings: self.strings,
            index: self.cursor,
        };
        self.cursor = skip_value(self.tape, self.cursor);
        Some(value)
    }
}

/// Iterator over an object's `(key, value)` field records.
pub struct ObjectIter<'a> {
    tape: &'a Tape,
    strings: &'a [u8],
    cursor: usize,
    end: usize,
}

impl<'a> Iterator for ObjectIter<'a> {
    type Item = (&'a [u8], Value<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.end {
            return None;
        }
        let key_word = self.tape.get(self.cursor).expect("object key within tape");
        let key = read_record(self.strings, key_word.payload() as usize);
        let value_index = self.cursor + 1;
        let value = Value {
            tape: self.tape,
            strings: self.strings,
            index: value_index,
        };
        self.cursor = skip_value(self.tape, value_index);
        Some((key, value))
    }
}

impl<'a> ObjectIter<'a> {
    /// Linear scan for a field by key; objects carry no auxiliary index
    /// of their own.
    pub fn find(mut self, key: &[u8]) -> Result<Value<'a>, Error> {
        self.find_map(|(k, v)| if k == key { Some(v) } else { None })
            .ok_or_else(|| Error::new(ErrorCode::NoSuchField))
    }
}
