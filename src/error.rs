//! The stable error taxonomy returned by every entry point.
//!
//! No logging or exception mechanism is used anywhere in this crate; a
//! parse either returns `Ok` or an [`Error`] plus the byte offset at which
//! it gave up. `Display` is hand-written (no `thiserror`) to match the
//! rest of this codebase.

use core::fmt;

/// Every way a parse, allocation, or document query can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The document is larger than the parser's configured capacity.
    Capacity,
    /// A scratch buffer could not be grown.
    MemAlloc,
    /// The structural index array does not describe well-formed JSON grammar.
    TapeError,
    /// Container nesting exceeded the configured maximum depth.
    DepthError,
    /// A string literal contains an invalid escape or unpaired surrogate.
    StringError,
    /// A numeric literal is malformed or over/underflows its target type.
    NumberError,
    /// The literal `true` was malformed.
    TAtomError,
    /// The literal `false` was malformed.
    FAtomError,
    /// The literal `null` was malformed.
    NAtomError,
    /// The input is not valid UTF-8.
    Utf8Error,
    /// A control character (`< 0x20`) appeared unescaped inside a string.
    UnescapedChars,
    /// A string, or the document itself, ended before a closing quote.
    UnclosedString,
    /// The input was empty (or all whitespace).
    Empty,
    /// The caller did not provide the minimum required trailing padding.
    InsufficientPadding,
    /// A document query expected a different tape-word kind.
    IncorrectType,
    /// An object lookup found no field with the requested key.
    NoSuchField,
    /// An array index was out of bounds.
    IndexOutOfBounds,
    /// A number was syntactically valid but outside the representable range.
    NumberOutOfRange,
    /// A JSON Pointer string was malformed. Reserved for the (external)
    /// JSON Pointer accessor layered atop this crate.
    InvalidJsonPointer,
}

impl ErrorCode {
    /// The wire name, identical to the enum variant's spelling in the
    /// original design (`CAPACITY`, `DEPTH_ERROR`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            Self::Capacity => "CAPACITY",
            Self::MemAlloc => "MEMALLOC",
            Self::TapeError => "TAPE_ERROR",
            Self::DepthError => "DEPTH_ERROR",
            Self::StringError => "STRING_ERROR",
            Self::NumberError => "NUMBER_ERROR",
            Self::TAtomError => "T_ATOM_ERROR",
            Self::FAtomError => "F_ATOM_ERROR",
            Self::NAtomError => "N_ATOM_ERROR",
            Self::Utf8Error => "UTF8_ERROR",
            Self::UnescapedChars => "UNESCAPED_CHARS",
            Self::UnclosedString => "UNCLOSED_STRING",
            Self::Empty => "EMPTY",
            Self::InsufficientPadding => "INSUFFICIENT_PADDING",
            Self::IncorrectType => "INCORRECT_TYPE",
            Self::NoSuchField => "NO_SUCH_FIELD",
            Self::IndexOutOfBounds => "INDEX_OUT_OF_BOUNDS",
            Self::NumberOutOfRange => "NUMBER_OUT_OF_RANGE",
            Self::InvalidJsonPointer => "INVALID_JSON_POINTER",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failure from any entry point, carrying the byte offset at which
/// parsing gave up when one is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    pub code: ErrorCode,
    /// Byte offset into the input at which the failure was detected.
    /// `None` for errors that are not tied to a single input position
    /// (e.g. `CAPACITY`, `MEMALLOC`).
    pub offset: Option<usize>,
}

impl Error {
    pub const fn new(code: ErrorCode) -> Self {
        Self { code, offset: None }
    }

    pub const fn at(code: ErrorCode, offset: usize) -> Self {
        Self {
            code,
            offset: Some(offset),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{} at byte offset {}", self.code, offset),
            None => write!(f, "{}", self.code),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_offset_when_present() {
        let err = Error::at(ErrorCode::NumberError, 7);
        assert_eq!(format!("{err}"), "NUMBER_ERROR at byte offset 7");
    }

    #[test]
    fn display_omits_offset_when_absent() {
        let err = Error::new(ErrorCode::Capacity);
        assert_eq!(format!("{err}"), "CAPACITY");
    }

    #[test]
    fn every_code_round_trips_through_name() {
        let codes = [
            ErrorCode::Capacity,
            ErrorCode::MemAlloc,
            ErrorCode::TapeError,
            ErrorCode::DepthError,
            ErrorCode::StringError,
            ErrorCode::NumberError,
            ErrorCode::TAtomError,
            ErrorCode::FAtomError,
            ErrorCode::NAtomError,
            ErrorCode::Utf8Error,
            ErrorCode::UnescapedChars,
            ErrorCode::UnclosedString,
            ErrorCode::Empty,
            ErrorCode::InsufficientPadding,
            ErrorCode::IncorrectType,
            ErrorCode::NoSuchField,
            ErrorCode::IndexOutOfBounds,
            ErrorCode::NumberOutOfRange,
            ErrorCode::InvalidJsonPointer,
        ];
        for code in codes {
            assert!(!code.name().is_empty());
        }
    }
}
