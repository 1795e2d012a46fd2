//! Canonical serializer for the metadata language.

use std::fmt::Write;

use chrono::{DateTime, Datelike, Timelike, Utc};

use super::value::{Map, Value};

/// Stringify a top-level mapping as `key:value\n` lines.
///
/// The empty mapping yields the empty string. Keys whose value is `NaN` are
/// dropped, at this level and at every nested level.
pub fn stringify(map: &Map) -> String {
    let mut out = String::new();
    for (key, value) in map.iter() {
        if value.is_nan() {
            continue;
        }
        write_key(key, &mut out);
        out.push(':');
        write_value(value, &mut out);
        out.push('\n');
    }
    out
}

/// Stringify a single value in its inline form, as it would appear on the
/// right-hand side of a `key:` pair. `NaN` renders as the empty string.
pub fn stringify_value(value: &Value) -> String {
    let mut out = String::new();
    if !value.is_nan() {
        write_value(value, &mut out);
    }
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null        => out.push('*'),
        Value::Bool(true)  => out.push('+'),
        Value::Bool(false) => out.push('-'),
        Value::Number(n)   => write_number(*n, out),
        Value::String(s)   => write_string(s, out),
        Value::Date(d)     => {
            out.push_str("_\"");
            write_date(d, out);
            out.push('"');
        }
        Value::Array(items) => {
            out.push('[');
            let mut first = true;
            for item in items.iter().filter(|v| !v.is_nan()) {
                if !first {
                    out.push(',');
                }
                write_value(item, out);
                first = false;
            }
            out.push(']');
        }
        Value::Map(map) => {
            out.push('{');
            let mut first = true;
            for (key, item) in map.iter().filter(|(_, v)| !v.is_nan()) {
                if !first {
                    out.push(',');
                }
                write_key(key, out);
                out.push(':');
                write_value(item, out);
                first = false;
            }
            out.push('}');
        }
    }
}

/// ISO-8601 in UTC with a `Z` suffix. Milliseconds are always written and
/// nanoseconds only when present; years outside `0000..=9999` use the signed
/// six-digit expanded form (`+010000`, `-000001`).
fn write_date(d: &DateTime<Utc>, out: &mut String) {
    let year = d.year();
    if (0..=9999).contains(&year) {
        let _ = write!(out, "{year:04}");
    } else {
        let _ = write!(out, "{year:+07}");
    }
    let pattern = if d.nanosecond() % 1_000_000 == 0 {
        "-%m-%dT%H:%M:%S%.3fZ"
    } else {
        "-%m-%dT%H:%M:%S%.9fZ"
    };
    let _ = write!(out, "{}", d.format(pattern));
}

fn write_number(n: f64, out: &mut String) {
    if n == f64::INFINITY {
        out.push_str("inf");
    } else if n == f64::NEG_INFINITY {
        out.push_str("-inf");
    } else {
        // f64's Display is the shortest round-trip decimal and never uses an
        // exponent, which the number grammar accepts as-is.
        let _ = write!(out, "{n}");
    }
}

#[inline]
pub(crate) fn is_key_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'@' | b'_' | b'$' | b'-')
}

#[inline]
fn is_key_letter(c: u8) -> bool {
    c.is_ascii_alphabetic() || matches!(c, b'@' | b'_' | b'$')
}

/// Keys made only of digits and `-` are quoted to avoid reading them as numbers.
fn write_key(key: &str, out: &mut String) {
    let bytes = key.as_bytes();
    if !bytes.is_empty()
        && bytes.iter().all(|&c| is_key_char(c))
        && bytes.iter().any(|&c| is_key_letter(c))
    {
        out.push_str(key);
    } else {
        write_string(key, out);
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    if !s.bytes().any(needs_escape) {
        out.push_str(s);
        out.push('"');
        return;
    }

    let mut start = 0;
    for (i, c) in s.bytes().enumerate() {
        if !needs_escape(c) {
            continue;
        }
        out.push_str(&s[start..i]);
        match c {
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            0x0c  => out.push_str("\\f"),
            b'\r' => out.push_str("\\r"),
            b'\\' => out.push_str("\\\\"),
            b'"'  => out.push_str("\\\""),
            _     => {
                let _ = write!(out, "\\u{c:04x}");
            }
        }
        start = i + 1;
    }
    out.push_str(&s[start..]);
    out.push('"');
}

#[inline]
fn needs_escape(c: u8) -> bool {
    c < 0x20 || c == b'\\' || c == b'"'
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_map_is_empty_string() {
        assert_eq!(stringify(&Map::new()), "");
    }

    #[test]
    fn simple_object() {
        let map = Map::from([
            ("width", Value::from(640)),
            ("height", Value::from(480)),
            ("title", Value::from("A beautiful picture")),
        ]);
        assert_eq!(stringify(&map), "width:640\nheight:480\ntitle:\"A beautiful picture\"\n");
    }

    #[test]
    fn constants() {
        let map = Map::from([
            ("a", Value::Bool(true)),
            ("b", Value::Bool(false)),
            ("c", Value::Null),
            ("d", Value::Number(f64::INFINITY)),
            ("e", Value::Number(f64::NEG_INFINITY)),
        ]);
        assert_eq!(stringify(&map), "a:+\nb:-\nc:*\nd:inf\ne:-inf\n");

        let nested = Map::from([("sub", Value::Map(map))]);
        assert_eq!(stringify(&nested), "sub:{a:+,b:-,c:*,d:inf,e:-inf}\n");
    }

    #[test]
    fn nan_keys_are_dropped_everywhere() {
        let map = Map::from([
            ("n1", Value::Number(f64::NAN)),
            ("a", Value::Bool(true)),
            ("b", Value::Bool(false)),
            ("c", Value::Null),
            ("n2", Value::Number(f64::NAN)),
            ("d", Value::Number(f64::INFINITY)),
            ("e", Value::Number(f64::NEG_INFINITY)),
            ("n3", Value::Number(f64::NAN)),
        ]);
        assert_eq!(stringify(&map), "a:+\nb:-\nc:*\nd:inf\ne:-inf\n");

        let nested = Map::from([(
            "sub",
            Value::Map(Map::from([
                ("x", Value::Number(f64::NAN)),
                ("y", Value::from(1)),
            ])),
        ), (
            "list",
            Value::Array(vec![Value::from(1), Value::Number(f64::NAN), Value::from(2)]),
        )]);
        assert_eq!(stringify(&nested), "sub:{y:1}\nlist:[1,2]\n");
    }

    #[test]
    fn date() {
        let date = Utc.with_ymd_and_hms(2024, 10, 22, 8, 55, 22).unwrap();
        let map = Map::from([("date", Value::Date(date))]);
        assert_eq!(stringify(&map), "date:_\"2024-10-22T08:55:22.000Z\"\n");
    }

    #[test]
    fn date_keeps_sub_millisecond_digits() {
        let date = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(stringify_value(&Value::Date(date)), "_\"2023-11-14T22:13:20.123456789Z\"");
        let date = Utc.timestamp_opt(1_700_000_000, 5_000_000).unwrap();
        assert_eq!(stringify_value(&Value::Date(date)), "_\"2023-11-14T22:13:20.005Z\"");
    }

    #[test]
    fn date_expanded_years() {
        let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(stringify_value(&Value::Date(far)), "_\"+010000-01-01T00:00:00.000Z\"");
        let early = Utc.with_ymd_and_hms(-1, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(stringify_value(&Value::Date(early)), "_\"-000001-03-04T05:06:07.000Z\"");
    }

    #[test]
    fn nested_objects_and_arrays() {
        let sub = Map::from([
            ("a", Value::from(1)),
            ("b", Value::from(2)),
            ("array", Value::Array(vec![1.into(), 2.into(), 3.into()])),
        ]);
        let map = Map::from([
            ("width", Value::from(640)),
            ("height", Value::from(480)),
            ("sub", Value::Map(sub)),
        ]);
        assert_eq!(stringify(&map), "width:640\nheight:480\nsub:{a:1,b:2,array:[1,2,3]}\n");
    }

    #[test]
    fn numbers() {
        assert_eq!(stringify_value(&Value::Number(0.5)), "0.5");
        assert_eq!(stringify_value(&Value::Number(-12.25)), "-12.25");
        assert_eq!(stringify_value(&Value::Number(1e21)), "1000000000000000000000");
        assert_eq!(stringify_value(&Value::Number(f64::NAN)), "");
    }

    #[test]
    fn string_escapes() {
        let s = "line\nbreak\ttab \"quoted\" back\\slash \u{1} bell\u{7} é";
        assert_eq!(
            stringify_value(&Value::from(s)),
            "\"line\\nbreak\\ttab \\\"quoted\\\" back\\\\slash \\u0001 bell\\u0007 é\""
        );
        assert_eq!(stringify_value(&Value::from("\r\u{c}\u{1f}")), "\"\\r\\f\\u001f\"");
    }

    #[test]
    fn key_quoting() {
        let map = Map::from([
            ("plain_key", Value::Null),
            ("@at$dollar-dash", Value::Null),
            ("123", Value::Null),
            ("-1-2", Value::Null),
            ("has space", Value::Null),
            ("", Value::Null),
            ("x1", Value::Null),
        ]);
        assert_eq!(
            stringify(&map),
            "plain_key:*\n@at$dollar-dash:*\n\"123\":*\n\"-1-2\":*\n\"has space\":*\n\"\":*\nx1:*\n"
        );
    }

    #[test]
    fn empty_containers() {
        let map = Map::from([("a", Value::Array(vec![])), ("m", Value::Map(Map::new()))]);
        assert_eq!(stringify(&map), "a:[]\nm:{}\n");
    }
}
