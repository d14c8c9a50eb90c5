//! # tapejson
//!
//! A two-stage SIMD JSON parser that produces a flat, 64-bit-word tape
//! instead of a DOM of heap-allocated nodes.
//!
//! Stage 1 (the structural indexer, [`stage1`]) classifies the input one
//! 64-byte block at a time, resolves string/escape state and validates
//! UTF-8 concurrently with classification, and flattens every structural
//! byte's position into a single index array. Stage 2 (the tape builder,
//! [`stage2`]) walks that index array once with an explicit state machine,
//! emitting one or two tape words per value and cross-linking every bracket
//! pair by tape index.
//!
//! ## Module Organization
//!
//! - [`simd`] - per-architecture backends (scalar, SSE4.2, AVX2, AVX-512, NEON)
//! - [`classify`] - byte classification into whitespace/operator masks
//! - [`escape`] - backslash/quote resolution with cross-block carry
//! - [`utf8`] - streaming UTF-8 validation with cross-block carry
//! - [`stage1`] - the structural indexer
//! - [`tape`] - the flat tape word format and its string buffer
//! - [`number_parser`] - JSON number literal parsing
//! - [`string_parser`] - JSON string literal unescaping
//! - [`stage2`] - the tape builder state machine
//! - [`document`] - the read-only query API over a parsed tape
//! - [`parser`] - the `Parser` entry points (`parse`, `parse_stream`, `allocate`)
//! - [`minify`] - canonical re-serialization of a parsed document
//! - [`config`] - parser tunables (capacity, max depth, backend choice)
//! - [`error`] - the stable error taxonomy every entry point returns
//!
//! ## Quick Start
//!
//! ```
//! use tapejson::parser::Parser;
//!
//! let mut parser = Parser::new();
//! let doc = parser.parse(br#"{"a": [1, 2, 3]}"#).unwrap();
//! let sum: i64 = doc
//!     .root()
//!     .get_object()
//!     .unwrap()
//!     .find(b"a")
//!     .unwrap()
//!     .get_array()
//!     .unwrap()
//!     .map(|v| v.get_i64().unwrap())
//!     .sum();
//! assert_eq!(sum, 6);
//! ```
//!
//! ## Features
//!
//! - `std` (default) - enables runtime CPU-feature detection for backend
//!   auto-selection. Without it the parser always runs the scalar backend.
//! - `cli` - builds the `tapejson` binary (`validate`/`minify` subcommands).

// Use no_std unless std feature is enabled or we're in test mode
#![cfg_attr(not(any(test, feature = "std")), no_std)]

// When using no_std, we need to explicitly link the alloc crate
#[cfg(not(any(test, feature = "std")))]
extern crate alloc;

// When using std, re-export alloc types from std for compatibility
#[cfg(any(test, feature = "std"))]
extern crate std as alloc;

// =============================================================================
// Core modules (organized by pipeline stage)
// =============================================================================

/// Parser tunables: capacity, maximum nesting depth, backend choice.
pub mod config;

/// The stable error taxonomy returned by every entry point.
pub mod error;

/// Per-architecture SIMD backends and runtime dispatch.
pub mod simd;

/// Byte classification into whitespace/structural-operator masks.
pub mod classify;

/// Backslash/quote resolution with cross-block carry.
pub mod escape;

/// Streaming UTF-8 validation with cross-block carry.
pub mod utf8;

/// Stage 1: the structural indexer.
pub mod stage1;

/// The flat tape word format and its string buffer.
pub mod tape;

/// JSON number literal parsing.
pub mod number_parser;

/// Precomputed power-of-five mantissas backing the number parser.
mod pow5_table;

/// JSON string literal unescaping.
pub mod string_parser;

/// Stage 2: the tape builder state machine.
pub mod stage2;

/// The read-only query API over a parsed tape.
pub mod document;

/// The `Parser` entry points.
pub mod parser;

/// Canonical re-serialization of a parsed document.
pub mod minify;

// =============================================================================
// Public re-exports (convenience)
// =============================================================================

pub use config::{BackendChoice, ParserConfig};
pub use document::{Document, Value, ValueType};
pub use error::{Error, ErrorCode};
pub use parser::{DocumentStream, Parser};
