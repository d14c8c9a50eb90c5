//! Minifier: re-serializes a parsed document as
//! canonical, minimal JSON.
//!
//! Rebuilding straight from the tape rather than re-scanning the source
//! text is what makes `Parse(Minify(J))` tape-identical to `Parse(J)`:
//! every value written here passed through the exact same number/string
//! decoding the original parse did, so nothing is re-derived from source
//! formatting quirks (insignificant whitespace, escape spelling, digit
//! grouping) that minification is supposed to erase.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;

use crate::document::{Document, Value, ValueType};
use crate::error::Error;
use crate::parser::Parser;

/// Parses `input` and writes its canonical minified form to `out` (cleared
/// first).
pub fn minify(parser: &mut Parser, input: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
    let doc = parser.parse(input)?;
    out.clear();
    write_document(&doc, out);
    Ok(())
}

fn write_document(doc: &Document<'_>, out: &mut Vec<u8>) {
    write_value(doc.root(), out);
}

fn write_value(value: Value<'_>, out: &mut Vec<u8>) {
    match value.value_type() {
        ValueType::Object => {
            out.push(b'{');
            for (i, (key, field_value)) in value.get_object().unwrap().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_escaped_string(key, out);
                out.push(b':');
                write_value(field_value, out);
            }
            out.push(b'}');
        }
        ValueType::Array => {
            out.push(b'[');
            for (i, element) in value.get_array().unwrap().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(element, out);
            }
            out.push(b']');
        }
        ValueType::String => write_escaped_string(value.get_string().unwrap(), out),
        ValueType::Int64 => {
            let mut scratch = String::new();
            let _ = write!(scratch, "{}", value.get_i64().unwrap());
            out.extend_from_slice(scratch.as_bytes());
        }
        ValueType::Uint64 => {
            let mut scratch = String::new();
            let _ = write!(scratch, "{}", value.get_u64().unwrap());
            out.extend_from_slice(scratch.as_bytes());
        }
        ValueType::Double => {
            let mut scratch = String::new();
            let _ = write!(scratch, "{}", value.get_f64().unwrap());
            // A whole-valued double formats without a fraction ("2", "-0")
            // and would re-parse as an integer, changing the tape kind.
            if !scratch.contains(['.', 'e', 'E']) {
                scratch.push_str(".0");
            }
            out.extend_from_slice(scratch.as_bytes());
        }
        ValueType::Bool => {
            out.extend_from_slice(if value.get_bool().unwrap() { b"true" } else { b"false" });
        }
        ValueType::Null => out.extend_from_slice(b"null"),
    }
}

/// Re-escapes a string buffer record (already fully unescaped by the
/// parser) back into minimal-but-valid JSON string syntax.
fn write_escaped_string(bytes: &[u8], out: &mut Vec<u8>) {
    out.push(b'"');
    for &b in bytes {
        match b {
            b'"' => out.extend_from_slice(b"\\\""),
            b'\\' => out.extend_from_slice(b"\\\\"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0C => out.extend_from_slice(b"\\f"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x00..=0x1F => {
                let mut scratch = String::new();
                let _ = write!(scratch, "\\u{:04x}", b);
                out.extend_from_slice(scratch.as_bytes());
            }
            _ => out.push(b),
        }
    }
    out.push(b'"');
}
