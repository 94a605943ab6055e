/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Typed field codecs.
//!
//! Decoders for the FIX value grammars the session layer interprets:
//! UTC timestamps (with and without milliseconds), booleans, day-of-week
//! names, and strict integer/float forms. Every decoder fails with
//! `DecodeError::InvalidFieldValue` on any byte outside its grammar.
//! Values that the engine does not interpret stay as byte strings, so
//! floats keep their textual representation across a parse/serialize
//! round trip.

use anvilfix_core::error::DecodeError;
use anvilfix_core::types::Timestamp;
use chrono::NaiveDateTime;

fn invalid(tag: u32, reason: &str) -> DecodeError {
    DecodeError::InvalidFieldValue {
        tag,
        reason: reason.to_string(),
    }
}

/// Parses a UTC timestamp value, `YYYYMMDD-HH:MM:SS` or
/// `YYYYMMDD-HH:MM:SS.sss`.
///
/// # Errors
/// Returns `DecodeError::InvalidFieldValue` for any other shape.
pub fn parse_utc_timestamp(tag: u32, value: &[u8]) -> Result<Timestamp, DecodeError> {
    let s = std::str::from_utf8(value).map_err(|_| invalid(tag, "timestamp is not ASCII"))?;

    let parsed = match s.len() {
        17 => NaiveDateTime::parse_from_str(s, "%Y%m%d-%H:%M:%S"),
        21 => NaiveDateTime::parse_from_str(s, "%Y%m%d-%H:%M:%S%.3f"),
        _ => return Err(invalid(tag, "timestamp has wrong length")),
    };

    parsed
        .map(|dt| Timestamp::from_millis(dt.and_utc().timestamp_millis()))
        .map_err(|_| invalid(tag, "malformed timestamp"))
}

/// Formats a UTC timestamp, with milliseconds when `millis` is set.
#[must_use]
pub fn format_utc_timestamp(ts: Timestamp, millis: bool) -> String {
    if millis {
        ts.format_millis().to_string()
    } else {
        ts.format_seconds().to_string()
    }
}

/// Parses a FIX boolean: exactly `Y` or `N`.
///
/// # Errors
/// Returns `DecodeError::InvalidFieldValue` otherwise.
pub fn parse_bool(tag: u32, value: &[u8]) -> Result<bool, DecodeError> {
    match value {
        b"Y" => Ok(true),
        b"N" => Ok(false),
        _ => Err(invalid(tag, "expected 'Y' or 'N'")),
    }
}

/// Parses a day-of-week name `SU`/`MO`/`TU`/`WE`/`TH`/`FR`/`SA`
/// (case-insensitive) to 1..=7. An empty value means unset and maps to -1.
///
/// # Errors
/// Returns `DecodeError::InvalidFieldValue` for unrecognized names.
pub fn parse_day_of_week(tag: u32, value: &[u8]) -> Result<i8, DecodeError> {
    if value.is_empty() {
        return Ok(-1);
    }
    if value.len() < 2 {
        return Err(invalid(tag, "day name too short"));
    }

    match &[
        value[0].to_ascii_uppercase(),
        value[1].to_ascii_uppercase(),
    ] {
        b"SU" => Ok(1),
        b"MO" => Ok(2),
        b"TU" => Ok(3),
        b"WE" => Ok(4),
        b"TH" => Ok(5),
        b"FR" => Ok(6),
        b"SA" => Ok(7),
        _ => Err(invalid(tag, "unrecognized day name")),
    }
}

/// Formats a day-of-week value 1..=7 as its two-letter name.
///
/// Out-of-range values (including the -1 "unset" marker) format as empty.
#[must_use]
pub const fn format_day_of_week(day: i8) -> &'static str {
    match day {
        1 => "SU",
        2 => "MO",
        3 => "TU",
        4 => "WE",
        5 => "TH",
        6 => "FR",
        7 => "SA",
        _ => "",
    }
}

/// Parses a strict FIX integer: optional leading `-`, then ASCII digits.
///
/// # Errors
/// Returns `DecodeError::InvalidFieldValue` for any other byte.
pub fn parse_int(tag: u32, value: &[u8]) -> Result<i64, DecodeError> {
    let (negative, digits) = match value {
        [b'-', rest @ ..] => (true, rest),
        _ => (false, value),
    };
    if digits.is_empty() {
        return Err(invalid(tag, "empty integer"));
    }

    let mut result: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(invalid(tag, "non-digit in integer"));
        }
        result = result
            .checked_mul(10)
            .and_then(|r| r.checked_add((b - b'0') as i64))
            .ok_or_else(|| invalid(tag, "integer overflow"))?;
    }

    Ok(if negative { -result } else { result })
}

/// Parses a strict FIX float: optional sign, digits, optional `.` fraction.
///
/// The caller keeps the original bytes; this only validates the grammar
/// and produces a numeric view.
///
/// # Errors
/// Returns `DecodeError::InvalidFieldValue` for any other shape.
pub fn parse_float(tag: u32, value: &[u8]) -> Result<f64, DecodeError> {
    let s = std::str::from_utf8(value).map_err(|_| invalid(tag, "float is not ASCII"))?;

    let unsigned = s.strip_prefix('-').or_else(|| s.strip_prefix('+')).unwrap_or(s);
    let mut parts = unsigned.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();

    let digits_only = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    let valid = match frac_part {
        Some(frac) => (int_part.is_empty() || digits_only(int_part)) && digits_only(frac),
        None => digits_only(int_part),
    };
    if !valid {
        return Err(invalid(tag, "malformed float"));
    }

    s.parse().map_err(|_| invalid(tag, "malformed float"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_utc_timestamp_seconds() {
        let ts = parse_utc_timestamp(52, b"20240101-00:00:00").unwrap();
        assert_eq!(ts.format_seconds().as_str(), "20240101-00:00:00");
    }

    #[test]
    fn test_parse_utc_timestamp_millis() {
        let ts = parse_utc_timestamp(52, b"20240101-12:30:45.123").unwrap();
        assert_eq!(ts.format_millis().as_str(), "20240101-12:30:45.123");
    }

    #[test]
    fn test_parse_utc_timestamp_rejects_garbage() {
        assert!(parse_utc_timestamp(52, b"2024-01-01 00:00:00").is_err());
        assert!(parse_utc_timestamp(52, b"20240101").is_err());
        assert!(parse_utc_timestamp(52, b"20241301-00:00:00").is_err());
        assert!(parse_utc_timestamp(52, b"").is_err());
    }

    #[test]
    fn test_format_utc_timestamp_honors_millis_flag() {
        let ts = Timestamp::from_millis(1500);
        assert_eq!(format_utc_timestamp(ts, false), "19700101-00:00:01");
        assert_eq!(format_utc_timestamp(ts, true), "19700101-00:00:01.500");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool(43, b"Y").unwrap());
        assert!(!parse_bool(43, b"N").unwrap());
        assert!(parse_bool(43, b"y").is_err());
        assert!(parse_bool(43, b"YES").is_err());
    }

    #[test]
    fn test_parse_day_of_week() {
        assert_eq!(parse_day_of_week(1, b"SU").unwrap(), 1);
        assert_eq!(parse_day_of_week(1, b"mo").unwrap(), 2);
        assert_eq!(parse_day_of_week(1, b"Sa").unwrap(), 7);
        assert_eq!(parse_day_of_week(1, b"").unwrap(), -1);
        assert!(parse_day_of_week(1, b"XX").is_err());
    }

    #[test]
    fn test_day_of_week_roundtrip() {
        for day in 1..=7i8 {
            let name = format_day_of_week(day);
            assert_eq!(parse_day_of_week(1, name.as_bytes()).unwrap(), day);
        }
        assert_eq!(format_day_of_week(-1), "");
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(34, b"0").unwrap(), 0);
        assert_eq!(parse_int(34, b"12345").unwrap(), 12345);
        assert_eq!(parse_int(34, b"-7").unwrap(), -7);
        assert!(parse_int(34, b"").is_err());
        assert!(parse_int(34, b"12a").is_err());
        assert!(parse_int(34, b"-").is_err());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float(44, b"1.25").unwrap(), 1.25);
        assert_eq!(parse_float(44, b"-0.5").unwrap(), -0.5);
        assert_eq!(parse_float(44, b"42").unwrap(), 42.0);
        assert!(parse_float(44, b"1.2.3").is_err());
        assert!(parse_float(44, b"abc").is_err());
        assert!(parse_float(44, b".").is_err());
        assert!(parse_float(44, b"").is_err());
    }
}
