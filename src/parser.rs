//! The `Parser` entry points: owns every scratch buffer and reuses
//! them across parses, exactly as the resource model demands.

use alloc::vec::Vec;

use crate::config::{BackendChoice, ParserConfig, MAX_CAPACITY, PAD};
use crate::document::Document;
use crate::error::{Error, ErrorCode};
use crate::simd::dispatch::{self, Selected};
#[cfg(target_arch = "aarch64")]
use crate::simd::neon::Neon as NeonBackend;
use crate::simd::scalar::Scalar;
#[cfg(target_arch = "x86_64")]
use crate::simd::{avx2::Avx2, avx512::Avx512, sse42::Sse42};
use crate::stage1;
use crate::stage2;
use crate::tape::Tape;

/// Owns every per-parse scratch buffer: structural indices, tape, string
/// buffer, and a padded copy of the input. Reused across calls to `parse`.
pub struct Parser {
    config: ParserConfig,
    padded_input: Vec<u8>,
    structurals: Vec<u32>,
    tape: Tape,
    strings: Vec<u8>,
}

impl Parser {
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        let mut parser = Self {
            config,
            padded_input: Vec::new(),
            structurals: Vec::new(),
            tape: Tape::with_capacity(0),
            strings: Vec::new(),
        };
        parser.reserve(config.capacity);
        parser
    }

    /// Pre-sizes every scratch buffer for documents up to `capacity` bytes
    /// and `max_depth` nesting.
    pub fn allocate(&mut self, capacity: usize, max_depth: usize) -> Result<(), Error> {
        if capacity > MAX_CAPACITY {
            return Err(Error::new(ErrorCode::Capacity));
        }
        self.config.capacity = capacity;
        self.config.max_depth = max_depth;
        self.reserve(capacity);
        Ok(())
    }

    fn reserve(&mut self, capacity: usize) {
        self.padded_input.reserve(capacity + PAD);
        self.structurals.reserve(capacity / 2);
        self.tape = Tape::with_capacity(capacity);
        self.strings.reserve(capacity);
    }

    /// Parses `input`, returning a [`Document`] borrowing this parser's
    /// tape and string buffer. A later `parse` call invalidates it.
    pub fn parse(&mut self, input: &[u8]) -> Result<Document<'_>, Error> {
        if input.is_empty() {
            return Err(Error::new(ErrorCode::Empty));
        }
        if input.len() > self.config.capacity {
            return Err(Error::new(ErrorCode::Capacity));
        }

        self.padded_input.clear();
        self.padded_input.extend_from_slice(input);
        self.padded_input.resize(input.len() + PAD, 0);

        run_stage1(self.config.backend, &self.padded_input[..input.len()], &mut self.structurals)?;
        stage2::run(
            &self.padded_input,
            &self.structurals,
            self.config.max_depth,
            &mut self.tape,
            &mut self.strings,
        )?;
        self.tape.validate_structure()?;

        Ok(Document::new(&self.tape, &self.strings))
    }

    /// Iterates documents in a concatenation of JSON values, e.g. JSON
    /// Lines or a bare stream of whitespace-separated top-level values.
    pub fn parse_stream<'p, 'i>(&'p mut self, input: &'i [u8]) -> DocumentStream<'p, 'i> {
        DocumentStream {
            parser: self,
            input,
            offset: 0,
        }
    }

    /// Which backend this parser will actually use, resolving `Auto`.
    pub fn selected_backend(&self) -> Selected {
        dispatch::select(self.config.backend)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn run_stage1(backend: BackendChoice, input: &[u8], structurals: &mut Vec<u32>) -> Result<(), Error> {
    match dispatch::select(backend) {
        Selected::Fallback => stage1::run::<Scalar>(input, structurals),
        #[cfg(target_arch = "x86_64")]
        Selected::Sse42 => stage1::run::<Sse42>(input, structurals),
        #[cfg(target_arch = "x86_64")]
        Selected::Avx2 => stage1::run::<Avx2>(input, structurals),
        #[cfg(target_arch = "x86_64")]
        Selected::Avx512 => stage1::run::<Avx512>(input, structurals),
        #[cfg(target_arch = "aarch64")]
        Selected::Neon => stage1::run::<NeonBackend>(input, structurals),
        // A backend selected for an architecture that isn't compiled in
        // (e.g. forcing `avx2` on aarch64) falls back rather than panicking.
        _ => stage1::run::<Scalar>(input, structurals),
    }
}

fn run_stage1_streaming(
    backend: BackendChoice,
    input: &[u8],
    structurals: &mut Vec<u32>,
) -> Result<bool, Error> {
    match dispatch::select(backend) {
        Selected::Fallback => stage1::run_streaming::<Scalar>(input, structurals),
        #[cfg(target_arch = "x86_64")]
        Selected::Sse42 => stage1::run_streaming::<Sse42>(input, structurals),
        #[cfg(target_arch = "x86_64")]
        Selected::Avx2 => stage1::run_streaming::<Avx2>(input, structurals),
        #[cfg(target_arch = "x86_64")]
        Selected::Avx512 => stage1::run_streaming::<Avx512>(input, structurals),
        #[cfg(target_arch = "aarch64")]
        Selected::Neon => stage1::run_streaming::<NeonBackend>(input, structurals),
        _ => stage1::run_streaming::<Scalar>(input, structurals),
    }
}

/// Finds the next top-level JSON value in `input` starting at `from`,
/// skipping leading whitespace, and returns its exclusive end offset.
fn next_document_end(backend: BackendChoice, input: &[u8], from: usize) -> Option<usize> {
    let mut structurals = Vec::new();
    let start = input[from..]
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))?
        + from;
    let ended_cleanly = run_stage1_streaming(backend, &input[start..], &mut structurals).ok()?;
    stage1::last_complete_document(&input[start..], &structurals, ended_cleanly).map(|end| start + end)
}

/// Iterator produced by [`Parser::parse_stream`].
pub struct DocumentStream<'p, 'i> {
    parser: &'p mut Parser,
    input: &'i [u8],
    offset: usize,
}

impl<'p, 'i> DocumentStream<'p, 'i> {
    /// Parses the next document, if any remain.
    ///
    /// Returns `None` once the stream is exhausted (only whitespace, or
    /// nothing, remains). Borrowed from the parser the same way `parse`
    /// is: the returned document is only valid until the next call.
    pub fn next(&mut self) -> Option<Result<Document<'_>, Error>> {
        let end = next_document_end(self.parser.config.backend, self.input, self.offset)?;
        let slice = &self.input[self.offset..end];
        self.offset = end;
        Some(self.parser.parse(slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_document() {
        let mut parser = Parser::new();
        let doc = parser.parse(br#"{"a":1}"#).unwrap();
        assert_eq!(doc.root().get_object().unwrap().find(b"a").unwrap().get_i64().unwrap(), 1);
    }

    #[test]
    fn reusing_a_parser_across_documents_works() {
        let mut parser = Parser::new();
        assert_eq!(parser.parse(b"1").unwrap().root().get_i64().unwrap(), 1);
        assert_eq!(parser.parse(b"2").unwrap().root().get_i64().unwrap(), 2);
    }

    #[test]
    fn empty_input_is_rejected() {
        let mut parser = Parser::new();
        assert!(parser.parse(b"").is_err());
    }

    #[test]
    fn oversized_input_is_a_capacity_error() {
        let mut parser = Parser::with_config(ParserConfig::with_capacity(4));
        assert!(matches!(
            parser.parse(b"123456").unwrap_err().code,
            ErrorCode::Capacity
        ));
    }

    #[test]
    fn allocate_grows_capacity_for_a_later_parse() {
        let mut parser = Parser::with_config(ParserConfig::with_capacity(4));
        parser.allocate(64, 1024).unwrap();
        assert!(parser.parse(b"123456").is_ok());
    }

    #[test]
    fn stream_parses_json_lines() {
        let mut parser = Parser::new();
        let input = b"1\n2\n3";
        let mut stream = parser.parse_stream(input);
        let mut values = Vec::new();
        while let Some(doc) = stream.next() {
            values.push(doc.unwrap().root().get_i64().unwrap());
        }
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn stream_parses_concatenated_objects() {
        let mut parser = Parser::new();
        let input = br#"{"a":1}{"a":2}"#;
        let mut stream = parser.parse_stream(input);
        let mut values = Vec::new();
        while let Some(doc) = stream.next() {
            let doc = doc.unwrap();
            values.push(doc.root().get_object().unwrap().find(b"a").unwrap().get_i64().unwrap());
        }
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn stream_stops_before_a_trailing_partial_document() {
        let mut parser = Parser::new();
        let input = br#"{"a":1}{"b""#;
        let mut stream = parser.parse_stream(input);
        let mut complete = 0;
        while let Some(doc) = stream.next() {
            doc.unwrap();
            complete += 1;
        }
        assert_eq!(complete, 1);
    }
}
