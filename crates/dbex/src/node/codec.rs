//! Text encoding of node content.
//!
//! XML 1.0 cannot carry most C0 control characters or the non-characters
//! U+FFFE and U+FFFF, not even as character references. Such characters are
//! written as `\uXXXX` (upper-case hex) and a literal backslash as `\\`; the
//! result is then XML-escaped normally by the writer.

use std::borrow::Cow;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;

/// Timestamp layout: UTC with millisecond precision.
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Accepts any number of fractional digits when reading.
const DATE_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

fn needs_escape(c: char) -> bool {
    matches!(c,
        '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}' | '\\')
}

/// Replace characters XML cannot carry with backslash escapes.
pub fn escape(value: &str) -> Cow<'_, str> {
    if !value.chars().any(needs_escape) {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        if c == '\\' {
            out.push_str("\\\\");
        } else if needs_escape(c) {
            out.push_str(&format!("\\u{:04X}", c as u32));
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Reverse [`escape`]. The error string describes the malformed sequence.
pub fn unescape(value: &str) -> std::result::Result<Cow<'_, str>, String> {
    if !value.contains('\\') {
        return Ok(Cow::Borrowed(value));
    }

    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = (hex.len() == 4)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("Invalid escape sequence '\\u{}'", hex))?;
                out.push(decoded);
            }
            Some(other) => return Err(format!("Invalid escape sequence '\\{}'", other)),
            None => return Err("Dangling escape character at end of text".to_string()),
        }
    }
    Ok(Cow::Owned(out))
}

pub fn format_date(value: &DateTime<Utc>) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), DATE_PARSE_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

pub fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// `true` only for a case-insensitive "true".
pub fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

pub fn parse_integer(value: &str) -> Option<i64> {
    value.trim().parse().ok()
}

/// Plain or scientific notation.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let value = value.trim();
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

pub fn format_decimal(value: &Decimal) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_plain_text_is_borrowed() {
        assert!(matches!(escape("hello world"), Cow::Borrowed(_)));
        assert!(matches!(unescape("hello world").unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_escape_control_characters() {
        assert_eq!(escape("a\u{1}b"), "a\\u0001b");
        assert_eq!(escape("\u{ffff}"), "\\uFFFF");
        assert_eq!(escape("tab\tand\nnewline\r"), "tab\tand\nnewline\r");
        assert_eq!(escape("back\\slash"), "back\\\\slash");
        assert_eq!(escape("\u{1b}[0m"), "\\u001B[0m");
    }

    #[test]
    fn test_unescape_reverses_escape() {
        let samples = [
            "",
            "plain",
            "\u{0}\u{8}\u{b}\u{c}\u{e}\u{1f}",
            "mixed \\ with \u{7} bell and \\u0041 lookalike",
            "\u{fffe}\u{ffff} non-characters",
            "ünïcödé ✓ 𝄞",
        ];
        for sample in samples {
            assert_eq!(unescape(&escape(sample)).unwrap(), sample);
        }
    }

    #[test]
    fn test_unescape_rejects_malformed_sequences() {
        assert!(unescape("\\x").is_err());
        assert!(unescape("\\u12").is_err());
        assert!(unescape("\\uZZZZ").is_err());
        assert!(unescape("trailing\\").is_err());
    }

    #[test]
    fn test_date_format_round_trip() {
        let date = Utc.with_ymd_and_hms(2011, 3, 15, 9, 41, 7).unwrap()
            + chrono::Duration::milliseconds(250);
        let text = format_date(&date);
        assert_eq!(text, "2011-03-15T09:41:07.250Z");
        assert_eq!(parse_date(&text), Some(date));
        assert_eq!(
            parse_date("2011-03-15T09:41:07Z"),
            Some(Utc.with_ymd_and_hms(2011, 3, 15, 9, 41, 7).unwrap())
        );
        assert_eq!(parse_date("15/03/2011"), None);
    }

    #[test]
    fn test_scalar_parsing() {
        assert!(parse_bool("TRUE"));
        assert!(!parse_bool("yes"));
        assert_eq!(parse_integer(" 42 "), Some(42));
        assert_eq!(parse_integer("4.2"), None);
        assert_eq!(parse_decimal("12.50"), Some(Decimal::new(1250, 2)));
        assert_eq!(parse_decimal("1.5E+2"), Some(Decimal::new(150, 0)));
        assert_eq!(parse_decimal("abc"), None);
    }
}
