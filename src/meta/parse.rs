//! Single-pass recursive-descent parser for the metadata language.
//!
//! The parser walks the UTF-8 input with a byte cursor. Every token boundary
//! it stops on is an ASCII byte, so slicing the source at the cursor always
//! lands on a char boundary.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

use super::stringify::is_key_char;
use super::value::{Map, Value};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("unexpected '{found}' at offset {offset}, expecting {expected}")]
    Unexpected { found: char, offset: usize, expected: &'static str },
    #[error("unexpected end of input at offset {offset}, expecting {expected}")]
    UnexpectedEnd { offset: usize, expected: &'static str },
    #[error("unexpected control character 0x{code:02x} at offset {offset}")]
    ControlCharacter { code: u8, offset: usize },
    #[error("unknown constant '{word}' at offset {offset}")]
    UnknownConstant { word: String, offset: usize },
    #[error("invalid escape sequence '\\{sequence}' at offset {offset}")]
    InvalidEscape { sequence: String, offset: usize },
    #[error("invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },
    #[error("invalid date '{text}' at offset {offset}: {reason}")]
    InvalidDate { text: String, offset: usize, reason: String },
}

impl SyntaxError {
    /// Byte offset of the failure in the parsed text.
    pub fn offset(&self) -> usize {
        match self {
            SyntaxError::Unexpected { offset, .. }
            | SyntaxError::UnexpectedEnd { offset, .. }
            | SyntaxError::ControlCharacter { offset, .. }
            | SyntaxError::UnknownConstant { offset, .. }
            | SyntaxError::InvalidEscape { offset, .. }
            | SyntaxError::InvalidNumber { offset, .. }
            | SyntaxError::InvalidDate { offset, .. } => *offset,
        }
    }
}

type Result<T> = std::result::Result<T, SyntaxError>;

/// Parse a top-level document of `key:value\n` lines into a mapping.
pub fn parse(src: &str) -> Result<Map> {
    let mut parser = Parser::new(src);
    let map = parser.parse_top_level()?;
    if parser.pos < parser.bytes.len() {
        return Err(parser.unexpected("end of input"));
    }
    Ok(map)
}

/// Parse a single inline value, as found on the right-hand side of `key:`.
pub fn parse_value(src: &str) -> Result<Value> {
    let mut parser = Parser::new(src);
    parser.skip_blank()?;
    let value = parser.parse_value()?;
    parser.skip_blank()?;
    if parser.pos < parser.bytes.len() {
        return Err(parser.unexpected("end of input"));
    }
    Ok(value)
}

struct Parser<'a> {
    src:   &'a str,
    bytes: &'a [u8],
    pos:   usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, bytes: src.as_bytes(), pos: 0 }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn unexpected(&self, expected: &'static str) -> SyntaxError {
        match self.src[self.pos..].chars().next() {
            Some(found) => SyntaxError::Unexpected { found, offset: self.pos, expected },
            None => SyntaxError::UnexpectedEnd { offset: self.pos, expected },
        }
    }

    /// Skip spaces and return the next significant byte. A newline is
    /// significant: it separates top-level pairs.
    fn skip_blank(&mut self) -> Result<Option<u8>> {
        while let Some(c) = self.peek() {
            match c {
                b' ' => self.pos += 1,
                b'\n' => return Ok(Some(c)),
                c if c > 0x20 => return Ok(Some(c)),
                code => return Err(SyntaxError::ControlCharacter { code, offset: self.pos }),
            }
        }
        Ok(None)
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<()> {
        if self.skip_blank()? == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn parse_top_level(&mut self) -> Result<Map> {
        let mut map = Map::new();
        while self.pos < self.bytes.len() {
            let key = self.parse_key()?;
            self.expect(b':', "':'")?;
            self.skip_blank()?;
            let value = self.parse_value()?;
            self.expect(b'\n', "a newline")?;
            map.insert(key, value);
        }
        Ok(map)
    }

    fn parse_key(&mut self) -> Result<String> {
        match self.peek() {
            Some(c) if is_key_char(c) => {
                let start = self.pos;
                while self.peek().is_some_and(is_key_char) {
                    self.pos += 1;
                }
                Ok(self.src[start..self.pos].to_owned())
            }
            Some(b'"') => {
                self.pos += 1;
                self.parse_string()
            }
            _ => Err(self.unexpected("a key")),
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        let Some(c) = self.peek() else {
            return Err(self.unexpected("a value"));
        };

        match c {
            b'-' => {
                self.pos += 1;
                match self.skip_blank()? {
                    Some(c) if c.is_ascii_digit() => self.parse_number(true),
                    Some(c) if c.is_ascii_alphabetic() => self.parse_constant(negative_constant),
                    // A lone minus is `false`.
                    _ => Ok(Value::Bool(false)),
                }
            }
            c if c.is_ascii_digit() => self.parse_number(false),
            b'+' => {
                self.pos += 1;
                Ok(Value::Bool(true))
            }
            b'*' => {
                self.pos += 1;
                Ok(Value::Null)
            }
            b'{' => {
                self.pos += 1;
                self.parse_object()
            }
            b'[' => {
                self.pos += 1;
                self.parse_array()
            }
            b'"' => {
                self.pos += 1;
                self.parse_string().map(Value::String)
            }
            b'_' => {
                self.pos += 1;
                self.parse_date()
            }
            c if c.is_ascii_alphabetic() => self.parse_constant(constant),
            _ => Err(self.unexpected("a value")),
        }
    }

    /// Numbers match `[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?`; any leading minus
    /// has already been consumed.
    fn parse_number(&mut self, negative: bool) -> Result<Value> {
        let start = self.pos;
        self.skip_digits();

        if self.peek() == Some(b'.') && self.byte_at(self.pos + 1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            self.skip_digits();
        }

        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mut end = self.pos + 1;
            if matches!(self.byte_at(end), Some(b'+' | b'-')) {
                end += 1;
            }
            if self.byte_at(end).is_some_and(|c| c.is_ascii_digit()) {
                self.pos = end;
                self.skip_digits();
            }
        }

        let text = &self.src[start..self.pos];
        let n: f64 = text.parse().map_err(|_| SyntaxError::InvalidNumber {
            text: text.to_owned(),
            offset: start,
        })?;
        Ok(Value::Number(if negative { -n } else { n }))
    }

    #[inline]
    fn byte_at(&self, index: usize) -> Option<u8> {
        self.bytes.get(index).copied()
    }

    fn skip_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn parse_constant(&mut self, lookup: fn(&str) -> Option<Value>) -> Result<Value> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        let word = &self.src[start..self.pos];
        lookup(word).ok_or_else(|| SyntaxError::UnknownConstant {
            word: word.to_owned(),
            offset: start,
        })
    }

    fn parse_date(&mut self) -> Result<Value> {
        if self.peek() != Some(b'"') {
            return Err(self.unexpected("'\"' after '_'"));
        }
        self.pos += 1;
        let start = self.pos;
        let text = self.parse_string()?;
        parse_iso_date(&text)
            .map(Value::Date)
            .map_err(|e| SyntaxError::InvalidDate { text, offset: start, reason: e.to_string() })
    }

    /// Parse the body of a double-quoted string; the opening quote has
    /// already been consumed.
    fn parse_string(&mut self) -> Result<String> {
        let mut out = String::new();
        // `\uXXXX` escapes are UTF-16 code units; consecutive ones are decoded
        // together so surrogate pairs combine.
        let mut units: Vec<u16> = Vec::new();
        let mut start = self.pos;

        loop {
            let Some(c) = self.peek() else {
                return Err(SyntaxError::UnexpectedEnd {
                    offset: self.pos,
                    expected: "a closing '\"'",
                });
            };

            match c {
                b'"' => {
                    push_segment(&mut out, &mut units, &self.src[start..self.pos]);
                    flush_units(&mut out, &mut units);
                    self.pos += 1;
                    return Ok(out);
                }
                b'\\' => {
                    push_segment(&mut out, &mut units, &self.src[start..self.pos]);
                    self.pos += 1;
                    self.parse_escape(&mut out, &mut units)?;
                    start = self.pos;
                }
                code if code < 0x20 => {
                    return Err(SyntaxError::ControlCharacter { code, offset: self.pos });
                }
                _ => self.pos += 1,
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String, units: &mut Vec<u16>) -> Result<()> {
        let Some(c) = self.peek() else {
            return Err(SyntaxError::UnexpectedEnd { offset: self.pos, expected: "an escape sequence" });
        };

        let decoded = match c {
            b'u' => {
                self.pos += 1;
                let hex = self.bytes.get(self.pos..self.pos + 4).ok_or(SyntaxError::UnexpectedEnd {
                    offset: self.pos,
                    expected: "4 hex digits",
                })?;
                if !hex.iter().all(u8::is_ascii_hexdigit) {
                    let end = (self.pos + 4).min(self.bytes.len());
                    return Err(SyntaxError::InvalidEscape {
                        sequence: format!("u{}", String::from_utf8_lossy(&self.bytes[self.pos..end])),
                        offset: self.pos - 2,
                    });
                }
                let text = &self.src[self.pos..self.pos + 4];
                let unit = u16::from_str_radix(text, 16).map_err(|_| SyntaxError::InvalidEscape {
                    sequence: format!("u{text}"),
                    offset: self.pos - 2,
                })?;
                units.push(unit);
                self.pos += 4;
                return Ok(());
            }
            b'n' => '\n',
            b't' => '\t',
            b'r' => '\r',
            b'f' => '\u{c}',
            b'b' => '\u{8}',
            b'\\' => '\\',
            b'/' => '/',
            b'"' => '"',
            _ => {
                let sequence = self.src[self.pos..].chars().next().map(String::from).unwrap_or_default();
                return Err(SyntaxError::InvalidEscape { sequence, offset: self.pos - 1 });
            }
        };

        flush_units(out, units);
        out.push(decoded);
        self.pos += 1;
        Ok(())
    }

    fn parse_array(&mut self) -> Result<Value> {
        let mut items = Vec::new();
        if self.skip_blank()? == Some(b']') {
            self.pos += 1;
            return Ok(Value::Array(items));
        }

        loop {
            items.push(self.parse_value()?);
            match self.skip_blank()? {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                _ => return Err(self.unexpected("',' or ']'")),
            }
            self.skip_blank()?;
        }
    }

    fn parse_object(&mut self) -> Result<Value> {
        let mut map = Map::new();
        if self.skip_blank()? == Some(b'}') {
            self.pos += 1;
            return Ok(Value::Map(map));
        }

        loop {
            let key = self.parse_key()?;
            self.expect(b':', "':'")?;
            self.skip_blank()?;
            let value = self.parse_value()?;
            map.insert(key, value);

            match self.skip_blank()? {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Map(map));
                }
                _ => return Err(self.unexpected("',' or '}'")),
            }
            self.skip_blank()?;
        }
    }
}

fn constant(word: &str) -> Option<Value> {
    match word {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        "NaN" | "nan" => Some(Value::Number(f64::NAN)),
        "Infinity" | "infinity" | "inf" => Some(Value::Number(f64::INFINITY)),
        _ => None,
    }
}

fn negative_constant(word: &str) -> Option<Value> {
    match word {
        "Infinity" | "infinity" | "inf" => Some(Value::Number(f64::NEG_INFINITY)),
        _ => None,
    }
}

fn push_segment(out: &mut String, units: &mut Vec<u16>, segment: &str) {
    if !segment.is_empty() {
        flush_units(out, units);
        out.push_str(segment);
    }
}

/// Lone surrogates decode to U+FFFD.
fn flush_units(out: &mut String, units: &mut Vec<u16>) {
    if units.is_empty() {
        return;
    }
    out.extend(char::decode_utf16(units.drain(..)).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)));
}

/// RFC 3339, plus the signed expanded-year form (`+010000-01-01T00:00:00.000Z`)
/// used for years outside `0000..=9999`. Expanded years must be in UTC.
fn parse_iso_date(text: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(text) {
        Ok(d) => Ok(d.with_timezone(&Utc)),
        Err(e) => match text.strip_suffix('Z') {
            Some(local) if local.starts_with(['+', '-']) => {
                NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|naive| Utc.from_utc_datetime(&naive))
            }
            _ => Err(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::stringify::stringify;

    #[test]
    fn empty_input_is_empty_map() {
        assert_eq!(parse("").unwrap(), Map::new());
    }

    #[test]
    fn simple_pairs() {
        let map = parse("width:640\nheight:480\ntitle:\"A beautiful picture\"\n").unwrap();
        assert_eq!(map.get("width"), Some(&Value::Number(640.0)));
        assert_eq!(map.get("height"), Some(&Value::Number(480.0)));
        assert_eq!(map.get("title"), Some(&Value::from("A beautiful picture")));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["width", "height", "title"]);
    }

    #[test]
    fn symbolic_constants() {
        let map = parse("a:+\nb:-\nc:*\nd:inf\ne:-inf\n").unwrap();
        assert_eq!(map.get("a"), Some(&Value::Bool(true)));
        assert_eq!(map.get("b"), Some(&Value::Bool(false)));
        assert_eq!(map.get("c"), Some(&Value::Null));
        assert_eq!(map.get("d"), Some(&Value::Number(f64::INFINITY)));
        assert_eq!(map.get("e"), Some(&Value::Number(f64::NEG_INFINITY)));

        let map = parse("sub:{a:+,b:-,c:*,d:inf,e:-inf}\n").unwrap();
        let sub = map.get("sub").and_then(Value::as_map).unwrap();
        assert_eq!(sub.get("b"), Some(&Value::Bool(false)));
        assert_eq!(sub.get("e"), Some(&Value::Number(f64::NEG_INFINITY)));

        let list = parse_value("[-,+,-]").unwrap();
        assert_eq!(list, Value::Array(vec![false.into(), true.into(), false.into()]));
    }

    #[test]
    fn bareword_constants() {
        let map = parse("a:true\nb:false\nc:null\nd:Infinity\ne:-infinity\nf:NaN\n").unwrap();
        assert_eq!(map.get("a"), Some(&Value::Bool(true)));
        assert_eq!(map.get("b"), Some(&Value::Bool(false)));
        assert_eq!(map.get("c"), Some(&Value::Null));
        assert_eq!(map.get("d"), Some(&Value::Number(f64::INFINITY)));
        assert_eq!(map.get("e"), Some(&Value::Number(f64::NEG_INFINITY)));
        assert!(map.get("f").unwrap().is_nan());
    }

    #[test]
    fn unknown_constant() {
        let err = parse("a:yes\n").unwrap_err();
        assert_eq!(err, SyntaxError::UnknownConstant { word: "yes".into(), offset: 2 });
        assert!(matches!(parse("a:-nan\n"), Err(SyntaxError::UnknownConstant { .. })));
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_value("12.5e2").unwrap(), Value::Number(1250.0));
        assert_eq!(parse_value("-3").unwrap(), Value::Number(-3.0));
        assert_eq!(parse_value("- 3").unwrap(), Value::Number(-3.0));
        assert_eq!(parse_value("1E-2").unwrap(), Value::Number(0.01));
        assert_eq!(parse_value("0.000001").unwrap(), Value::Number(0.000001));
        // "1." is a number followed by a stray dot.
        assert!(matches!(parse_value("1."), Err(SyntaxError::Unexpected { found: '.', offset: 1, .. })));
    }

    #[test]
    fn date() {
        let map = parse("date:_\"2024-10-22T08:55:22.000Z\"\n").unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 10, 22, 8, 55, 22).unwrap();
        assert_eq!(map.get("date"), Some(&Value::Date(expected)));
    }

    #[test]
    fn date_with_nanoseconds() {
        let date = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let map = Map::from([("d", Value::Date(date))]);
        assert_eq!(parse(&stringify(&map)).unwrap(), map);
        assert_eq!(
            parse_value("_\"2023-11-14T22:13:20.123456789Z\"").unwrap(),
            Value::Date(date)
        );
    }

    #[test]
    fn date_expanded_years() {
        let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_value("_\"+010000-01-01T00:00:00.000Z\"").unwrap(), Value::Date(far));
        assert_eq!(parse_value("_\"+10000-01-01T00:00:00.000Z\"").unwrap(), Value::Date(far));

        let early = Utc.with_ymd_and_hms(-1, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(parse_value("_\"-000001-03-04T05:06:07.000Z\"").unwrap(), Value::Date(early));

        let map = Map::from([("far", Value::Date(far)), ("early", Value::Date(early))]);
        assert_eq!(parse(&stringify(&map)).unwrap(), map);
    }

    #[test]
    fn bad_date() {
        assert!(matches!(parse("d:_\"yesterday\"\n"), Err(SyntaxError::InvalidDate { .. })));
        assert!(matches!(parse("d:_\"+010000-01-01T00:00:00+02:00\"\n"), Err(SyntaxError::InvalidDate { .. })));
        assert!(matches!(parse("d:_5\n"), Err(SyntaxError::Unexpected { found: '5', .. })));
    }

    #[test]
    fn nested_structures() {
        let map = parse("width:640\nheight:480\nsub:{a:1,b:2,array:[1,2,3]}\n").unwrap();
        let sub = map.get("sub").and_then(Value::as_map).unwrap();
        assert_eq!(sub.keys().collect::<Vec<_>>(), vec!["a", "b", "array"]);
        assert_eq!(
            sub.get("array"),
            Some(&Value::Array(vec![1.into(), 2.into(), 3.into()]))
        );
    }

    #[test]
    fn spaces_between_tokens() {
        let map = parse("a : { x : 1 , y : [ 1 , 2 ] }\n").unwrap();
        let a = map.get("a").and_then(Value::as_map).unwrap();
        assert_eq!(a.get("x"), Some(&Value::from(1)));
        assert_eq!(a.get("y"), Some(&Value::Array(vec![1.into(), 2.into()])));
    }

    #[test]
    fn quoted_keys() {
        let map = parse("\"123\":1\n\"has space\":2\n\"\":3\n").unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["123", "has space", ""]);
    }

    #[test]
    fn string_escapes() {
        let value = parse_value(r#""a\nb\tc\rd\fe\\f\"g\/h\bi\u00e9\u00C9""#).unwrap();
        assert_eq!(value, Value::from("a\nb\tc\rd\u{c}e\\f\"g/h\u{8}iéÉ"));
    }

    #[test]
    fn surrogate_pairs_combine() {
        assert_eq!(parse_value(r#""\ud83d\ude00""#).unwrap(), Value::from("😀"));
        assert_eq!(parse_value(r#""\ud83dx""#).unwrap(), Value::from("\u{fffd}x"));
    }

    #[test]
    fn non_ascii_passes_through() {
        let map = parse("title:\"Paris la nuit, été\"\n").unwrap();
        assert_eq!(map.get("title"), Some(&Value::from("Paris la nuit, été")));
    }

    #[test]
    fn invalid_escape() {
        assert!(matches!(parse_value(r#""\q""#), Err(SyntaxError::InvalidEscape { .. })));
        assert!(matches!(parse_value(r#""\u12g4""#), Err(SyntaxError::InvalidEscape { .. })));
        assert!(matches!(parse_value(r#""\u12"#), Err(SyntaxError::UnexpectedEnd { .. })));
    }

    #[test]
    fn unterminated_string() {
        let err = parse("a:\"abc").unwrap_err();
        assert_eq!(err, SyntaxError::UnexpectedEnd { offset: 6, expected: "a closing '\"'" });
    }

    #[test]
    fn control_character_in_string() {
        let err = parse("a:\"ab\u{1}c\"\n").unwrap_err();
        assert_eq!(err, SyntaxError::ControlCharacter { code: 1, offset: 5 });
    }

    #[test]
    fn tab_is_not_blank() {
        assert!(matches!(parse("a:\t1\n"), Err(SyntaxError::ControlCharacter { code: 0x09, .. })));
    }

    #[test]
    fn missing_trailing_newline() {
        let err = parse("a:1").unwrap_err();
        assert_eq!(err, SyntaxError::UnexpectedEnd { offset: 3, expected: "a newline" });
    }

    #[test]
    fn trailing_garbage() {
        let err = parse("a:1 b\n").unwrap_err();
        assert_eq!(err.offset(), 4);
        assert!(matches!(err, SyntaxError::Unexpected { found: 'b', .. }));
    }

    #[test]
    fn missing_colon() {
        assert!(matches!(parse("abc\n"), Err(SyntaxError::Unexpected { found: '\n', .. })));
    }

    #[test]
    fn unclosed_containers() {
        assert!(matches!(parse("a:[1,2\n"), Err(SyntaxError::Unexpected { found: '\n', .. })));
        assert!(matches!(parse("a:{x:1"), Err(SyntaxError::UnexpectedEnd { .. })));
    }

    #[test]
    fn round_trip_mixed_document() {
        let date = Utc.with_ymd_and_hms(2001, 2, 3, 4, 5, 6).unwrap();
        let map = Map::from([
            ("name", Value::from("x \"y\" \n z")),
            ("neg", Value::from(-0.125)),
            ("list", Value::Array(vec![Value::Null, true.into(), Value::Map(Map::new())])),
            ("when", Value::Date(date)),
            ("1-2", Value::from(false)),
        ]);
        assert_eq!(parse(&stringify(&map)).unwrap(), map);
    }
}
