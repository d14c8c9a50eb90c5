//! Number parser.
//!
//! Integers that never see a fraction or exponent are accumulated exactly
//! in a `u64` with checked arithmetic and disambiguated into `l`/`u`.
//! Everything else becomes `f64` through a three-tier conversion:
//!
//! 1. The Clinger fast path: when the significand fits in 53 bits and the
//!    decimal exponent's magnitude is at most 22, one double multiply or
//!    divide by an exact power of ten is itself exact.
//! 2. The Eisel-Lemire path: multiply the 64-bit significand by a
//!    precomputed 128-bit power-of-five mantissa ([`crate::pow5_table`]),
//!    derive the binary exponent from the decimal one, and round to 53
//!    bits, bailing out only when the truncated product cannot decide the
//!    tie (all-ones in the 9-bit slack, or an exact halfway value).
//! 3. The slow path, for significands truncated past 19 digits and the
//!    rare Eisel-Lemire bail: re-parse the literal through the standard
//!    library's arbitrary-precision decimal conversion.
//!
//! Every tier is correctly rounded, so which one fires never changes the
//! resulting bits; the tiers only trade latency.

use crate::error::{Error, ErrorCode};
use crate::pow5_table::{POWER_OF_FIVE_128, LARGEST_POWER_OF_FIVE, SMALLEST_POWER_OF_FIVE};

/// The parsed value plus the exclusive end offset of the numeric token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberValue {
    Signed(i64),
    Unsigned(u64),
    Double(f64),
}

const MAX_MANTISSA_DIGITS: u32 = 19;
const CLINGER_MAX_EXPONENT: i32 = 22;
const CLINGER_MAX_MANTISSA: u64 = 1 << 53;

/// Parses a JSON number starting at `start`, returning the value and the
/// offset of the first byte after it.
pub fn parse_number(bytes: &[u8], start: usize) -> Result<(NumberValue, usize), Error> {
    let mut pos = start;
    let negative = bytes.get(pos) == Some(&b'-');
    if negative {
        pos += 1;
    }

    match bytes.get(pos) {
        Some(b'0') => {
            pos += 1;
            // `0` takes no siblings: `012` is not a shorter spelling of 12.
            if matches!(bytes.get(pos), Some(b'0'..=b'9')) {
                return Err(Error::at(ErrorCode::NumberError, start));
            }
        }
        Some(b'1'..=b'9') => {
            pos += 1;
            while matches!(bytes.get(pos), Some(b'0'..=b'9')) {
                pos += 1;
            }
        }
        _ => return Err(Error::at(ErrorCode::NumberError, start)),
    }

    let mut is_float = false;
    if bytes.get(pos) == Some(&b'.') {
        is_float = true;
        pos += 1;
        let frac_start = pos;
        while matches!(bytes.get(pos), Some(b'0'..=b'9')) {
            pos += 1;
        }
        if pos == frac_start {
            return Err(Error::at(ErrorCode::NumberError, start));
        }
    }

    if matches!(bytes.get(pos), Some(b'e') | Some(b'E')) {
        is_float = true;
        pos += 1;
        if matches!(bytes.get(pos), Some(b'+') | Some(b'-')) {
            pos += 1;
        }
        let exp_start = pos;
        while matches!(bytes.get(pos), Some(b'0'..=b'9')) {
            pos += 1;
        }
        if pos == exp_start {
            return Err(Error::at(ErrorCode::NumberError, start));
        }
    }

    let literal = &bytes[start..pos];
    let value = if is_float {
        NumberValue::Double(parse_float(literal, start)?)
    } else {
        parse_integer(literal, negative, start)?
    };
    Ok((value, pos))
}

fn parse_integer(literal: &[u8], negative: bool, start: usize) -> Result<NumberValue, Error> {
    let digits = if negative { &literal[1..] } else { literal };
    let mut value: u64 = 0;
    for &d in digits {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((d - b'0') as u64))
            .ok_or_else(|| Error::at(ErrorCode::NumberError, start))?;
    }
    if negative {
        if value > (i64::MAX as u64) + 1 {
            return Err(Error::at(ErrorCode::NumberError, start));
        }
        if value == (i64::MAX as u64) + 1 {
            return Ok(NumberValue::Signed(i64::MIN));
        }
        Ok(NumberValue::Signed(-(value as i64)))
    } else if value <= i64::MAX as u64 {
        Ok(NumberValue::Signed(value as i64))
    } else {
        Ok(NumberValue::Unsigned(value))
    }
}

fn parse_float(literal: &[u8], start: usize) -> Result<f64, Error> {
    let mut pos = 0usize;
    let negative = literal.first() == Some(&b'-');
    if negative {
        pos += 1;
    }

    let mut mantissa: u64 = 0;
    let mut digit_count: u32 = 0;
    let mut exponent: i32 = 0;
    let mut truncated = false;

    while let Some(&d) = literal.get(pos) {
        if !d.is_ascii_digit() {
            break;
        }
        accumulate_digit(d, &mut mantissa, &mut digit_count, &mut truncated);
        pos += 1;
    }

    if literal.get(pos) == Some(&b'.') {
        pos += 1;
        while let Some(&d) = literal.get(pos) {
            if !d.is_ascii_digit() {
                break;
            }
            let had_capacity = digit_count < MAX_MANTISSA_DIGITS;
            accumulate_digit(d, &mut mantissa, &mut digit_count, &mut truncated);
            if had_capacity {
                exponent -= 1;
            }
            pos += 1;
        }
    }

    let mut explicit_exponent: i32 = 0;
    let mut explicit_exponent_negative = false;
    if matches!(literal.get(pos), Some(b'e') | Some(b'E')) {
        pos += 1;
        if literal.get(pos) == Some(&b'-') {
            explicit_exponent_negative = true;
            pos += 1;
        } else if literal.get(pos) == Some(&b'+') {
            pos += 1;
        }
        while let Some(&d) = literal.get(pos) {
            if !d.is_ascii_digit() {
                break;
            }
            explicit_exponent = explicit_exponent.saturating_mul(10).saturating_add((d - b'0') as i32);
            pos += 1;
        }
    }
    if explicit_exponent_negative {
        explicit_exponent = -explicit_exponent;
    }
    let total_exponent = exponent.saturating_add(explicit_exponent);

    let value = if truncated {
        slow_parse(literal, start)?
    } else if mantissa == 0 {
        0.0
    } else if mantissa <= CLINGER_MAX_MANTISSA
        && total_exponent.unsigned_abs() as i32 <= CLINGER_MAX_EXPONENT
    {
        let base = mantissa as f64;
        if total_exponent >= 0 {
            base * pow10(total_exponent as u32)
        } else {
            base / pow10((-total_exponent) as u32)
        }
    } else if total_exponent < SMALLEST_POWER_OF_FIVE {
        // Even a 19-digit significand at 10^-343 is below half the
        // smallest subnormal; it rounds to zero, which is not an error.
        0.0
    } else if total_exponent > LARGEST_POWER_OF_FIVE {
        f64::INFINITY
    } else {
        match eisel_lemire(mantissa, total_exponent) {
            Some(value) => value,
            None => slow_parse(literal, start)?,
        }
    };

    let value = if negative { -value } else { value };
    if value.is_infinite() {
        return Err(Error::at(ErrorCode::NumberError, start));
    }
    Ok(value)
}

/// Converts `mantissa * 10^power10` to the nearest `f64` via one 64x128
/// multiply against the power-of-five table. Returns `None` when the
/// truncated product cannot settle the rounding, sending the caller to the
/// slow path.
///
/// Caller guarantees `mantissa != 0` and `power10` within the table range.
fn eisel_lemire(mantissa: u64, power10: i32) -> Option<f64> {
    // Binary exponent estimate: floor(log2(10^power10)) + 1086, computed
    // as a fixed-point multiply by log2(10) ~= 217706 / 2^16.
    let exponent: i64 = (((152170 + 65536) * power10 as i64) >> 16) + 1024 + 63;

    let mut lz = mantissa.leading_zeros() as i64;
    let w = mantissa << lz;

    let index = (power10 - SMALLEST_POWER_OF_FIVE) as usize;
    let (p_hi, p_lo) = POWER_OF_FIVE_128[index];
    let (mut lower, mut upper) = full_multiplication(w, p_hi);

    // 9 bits of slack separate the 55 bits the rounding needs from the 64
    // the product's high word supplies; all-ones there means the truncated
    // tail of the power could still carry into the result.
    if upper & 0x1FF == 0x1FF {
        let (_, second_hi) = full_multiplication(w, p_lo);
        lower = lower.wrapping_add(second_hi);
        if second_hi > lower {
            upper += 1;
        }
        if lower == u64::MAX {
            return None;
        }
    }

    let upperbit = upper >> 63;
    let mut m = upper >> (upperbit + 9);
    lz += (1 ^ upperbit) as i64;
    let mut real_exponent = exponent - lz;

    if real_exponent <= 0 {
        // Subnormal range (or underflow to zero past 64 shifted-out bits).
        if -real_exponent + 1 >= 64 {
            return Some(0.0);
        }
        m >>= -real_exponent + 1;
        m += m & 1;
        m >>= 1;
        let biased = u64::from(m >= (1u64 << 52));
        return Some(f64::from_bits(m | (biased << 52)));
    }

    // Round-to-even tie guard: a product that is exactly a halfway value
    // must not be rounded up. Only powers whose 5^q divides into 64 bits
    // can produce one.
    if lower <= 1 && (-4..=23).contains(&power10) && m & 3 == 1 && (m << (upperbit + 9)) == upper {
        m &= !1;
    }

    m += m & 1;
    m >>= 1;
    if m >= (1u64 << 53) {
        m = 1u64 << 52;
        real_exponent += 1;
    }
    m &= !(1u64 << 52);
    if real_exponent > 2046 {
        return Some(f64::INFINITY);
    }
    Some(f64::from_bits(m | ((real_exponent as u64) << 52)))
}

#[inline]
fn full_multiplication(a: u64, b: u64) -> (u64, u64) {
    let product = (a as u128) * (b as u128);
    (product as u64, (product >> 64) as u64)
}

#[inline]
fn accumulate_digit(d: u8, mantissa: &mut u64, digit_count: &mut u32, truncated: &mut bool) {
    if *digit_count < MAX_MANTISSA_DIGITS {
        *mantissa = *mantissa * 10 + (d - b'0') as u64;
        *digit_count += 1;
    } else {
        *truncated = true;
    }
}

fn pow10(exp: u32) -> f64 {
    const POWERS: [f64; 23] = [
        1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15,
        1e16, 1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
    ];
    POWERS[exp as usize]
}

fn slow_parse(literal: &[u8], start: usize) -> Result<f64, Error> {
    let text = core::str::from_utf8(literal).map_err(|_| Error::at(ErrorCode::NumberError, start))?;
    text.parse::<f64>()
        .map_err(|_| Error::at(ErrorCode::NumberError, start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> NumberValue {
        parse_number(s.as_bytes(), 0).unwrap().0
    }

    #[test]
    fn small_integers_are_signed() {
        assert_eq!(parse("0"), NumberValue::Signed(0));
        assert_eq!(parse("42"), NumberValue::Signed(42));
        assert_eq!(parse("-42"), NumberValue::Signed(-42));
    }

    #[test]
    fn i64_min_round_trips() {
        assert_eq!(parse("-9223372036854775808"), NumberValue::Signed(i64::MIN));
    }

    #[test]
    fn value_between_i64_max_and_u64_max_is_unsigned() {
        assert_eq!(
            parse("18446744073709551615"),
            NumberValue::Unsigned(u64::MAX)
        );
    }

    #[test]
    fn u64_overflow_is_an_error() {
        assert!(parse_number(b"18446744073709551616", 0).is_err());
    }

    #[test]
    fn negative_overflow_is_an_error() {
        assert!(parse_number(b"-9223372036854775809", 0).is_err());
    }

    #[test]
    fn leading_zero_followed_by_digit_is_rejected() {
        assert!(parse_number(b"012", 0).is_err());
    }

    #[test]
    fn bare_minus_is_rejected() {
        assert!(parse_number(b"-", 0).is_err());
    }

    #[test]
    fn simple_floats() {
        assert_eq!(parse("1.5"), NumberValue::Double(1.5));
        assert_eq!(parse("-0.5"), NumberValue::Double(-0.5));
        assert_eq!(parse("1e3"), NumberValue::Double(1000.0));
        assert_eq!(parse("1.5e2"), NumberValue::Double(150.0));
        assert_eq!(parse("1E-2"), NumberValue::Double(0.01));
    }

    #[test]
    fn trailing_dot_without_digits_is_rejected() {
        assert!(parse_number(b"1.", 0).is_err());
    }

    #[test]
    fn exponent_without_digits_is_rejected() {
        assert!(parse_number(b"1e", 0).is_err());
        assert!(parse_number(b"1e+", 0).is_err());
    }

    #[test]
    fn high_precision_literal_uses_the_exact_fallback() {
        let (value, _) = parse_number(b"1.2345678901234567890123456789", 0).unwrap();
        match value {
            NumberValue::Double(d) => assert!((d - 1.234_567_890_123_456_7).abs() < 1e-15),
            other => panic!("expected double, got {other:?}"),
        }
    }

    #[test]
    fn very_large_exponent_rounds_to_infinity_and_errors() {
        assert!(parse_number(b"1e400", 0).is_err());
        assert!(parse_number(b"-1e400", 0).is_err());
        assert!(parse_number(b"1e309", 0).is_err());
    }

    #[test]
    fn tiny_exponent_underflows_to_zero_without_error() {
        assert_eq!(parse("1e-400"), NumberValue::Double(0.0));
        match parse("-1e-400") {
            NumberValue::Double(d) => {
                assert_eq!(d, 0.0);
                assert!(d.is_sign_negative());
            }
            other => panic!("expected double, got {other:?}"),
        }
    }

    /// The compiler's own decimal-to-binary conversion is an independent,
    /// correctly rounded oracle for these literals.
    #[test]
    fn eisel_lemire_agrees_with_the_compiler_on_hard_literals() {
        assert_eq!(parse("1e23"), NumberValue::Double(1e23));
        assert_eq!(parse("8e-23"), NumberValue::Double(8e-23));
        assert_eq!(parse("7.2057594037927933e16"), NumberValue::Double(7.2057594037927933e16));
        assert_eq!(
            parse("1.7976931348623157e308"),
            NumberValue::Double(f64::MAX)
        );
        assert_eq!(parse("2.2250738585072014e-308"), NumberValue::Double(2.2250738585072014e-308));
        // The infamous slightly-below-normal boundary literal.
        assert_eq!(parse("2.2250738585072011e-308"), NumberValue::Double(2.2250738585072011e-308));
        assert_eq!(parse("1e-308"), NumberValue::Double(1e-308));
    }

    #[test]
    fn subnormals_round_trip() {
        assert_eq!(parse("5e-324"), NumberValue::Double(5e-324));
        assert_eq!(parse("4.9406564584124654e-324"), NumberValue::Double(5e-324));
        assert_eq!(parse("2.4703282292062327e-324"), NumberValue::Double(0.0));
    }

    #[test]
    fn parser_stops_at_terminator() {
        let (value, end) = parse_number(b"123,456", 0).unwrap();
        assert_eq!(value, NumberValue::Signed(123));
        assert_eq!(end, 3);
    }
}
