//! PHP `serialize()` / `unserialize()` for plain data
//!
//! Grammar, with string lengths counted in bytes:
//!
//! ```text
//! N;                          null
//! b:0;  b:1;                  bool
//! i:<decimal>;                int
//! d:<decimal>;                float (also INF, -INF, NAN)
//! s:<len>:"<bytes>";          string
//! a:<count>:{<key><value>...} array, keys are i: or s: entries
//! ```
//!
//! Objects, references and enums are outside what this codec accepts.

use crate::error::{ErrorCategory, ErrorKind, LaracryptError, Result};
use crate::value::{Value, unsupported_key};

/// Arrays nested deeper than this are rejected when decoding. The decoder
/// recurses once per level, so this must fit a default 2 MiB thread stack.
pub const MAX_DEPTH: usize = 128;

/// Encode a value. Strings are written as raw bytes, so the output is only
/// UTF-8 when every string in the value is.
pub fn serialize(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Null => out.extend_from_slice(b"N;"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"b:1;" } else { b"b:0;" }),
        Value::Int(i) => out.extend_from_slice(format!("i:{};", i).as_bytes()),
        Value::Float(f) => out.extend_from_slice(format!("d:{};", format_float(*f)).as_bytes()),
        Value::String(s) => write_string(out, s.as_bytes()),
        Value::Bytes(b) => write_string(out, b),
        Value::Array(entries) => {
            out.extend_from_slice(format!("a:{}:{{", entries.len()).as_bytes());
            for (k, v) in entries {
                match k {
                    Value::Int(_) | Value::String(_) | Value::Bytes(_) => write_value(out, k)?,
                    other => return Err(unsupported_key(other)),
                }
                write_value(out, v)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(format!("s:{}:\"", bytes.len()).as_bytes());
    out.extend_from_slice(bytes);
    out.extend_from_slice(b"\";");
}

/// Shortest decimal that reads back as the same `f64`, with PHP's spelling
/// of the non-finite values.
fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NAN".to_string()
    } else if f.is_infinite() {
        let spelled = if f > 0.0 { "INF" } else { "-INF" };
        spelled.to_string()
    } else {
        f.to_string()
    }
}

/// Decode a single serialized value of any type.
pub fn unserialize(input: &[u8]) -> Result<Value> {
    let mut parser = Parser { input, pos: 0 };
    let value = parser.parse_value(0)?;
    if parser.pos != input.len() {
        return Err(parser.error("unexpected trailing data"));
    }
    Ok(value)
}

/// Decode a serialized value that must be an array at the top level.
pub fn unserialize_array(input: &[u8]) -> Result<Value> {
    match unserialize(input)? {
        value @ Value::Array(_) => Ok(value),
        other => Err(LaracryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::MalformedSerialization,
            format!("expected an array at top level, got {}", other.type_name()),
        )),
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    // Kept out of line so the recursive `parse_value` frame stays small.
    #[cold]
    #[inline(never)]
    fn error(&self, what: &str) -> LaracryptError {
        LaracryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::MalformedSerialization,
            format!("could not unserialize: {} at offset {}", what, self.pos),
        )
    }

    fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    fn next_byte(&mut self) -> Result<u8> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or_else(|| self.error("input truncated"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, wanted: u8) -> Result<()> {
        let start = self.pos;
        if self.next_byte()? != wanted {
            self.pos = start;
            return Err(self.error(&format!("expected `{}`", wanted as char)));
        }
        Ok(())
    }

    /// Consume bytes up to `delim`, returning them without the delimiter.
    fn take_until(&mut self, delim: u8) -> Result<&'a [u8]> {
        let input = self.input;
        let rest = &input[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == delim)
            .ok_or_else(|| self.error(&format!("missing `{}`", delim as char)))?;
        self.pos += len + 1;
        Ok(&rest[..len])
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.error("length prefix exceeds remaining input"));
        }
        let input = self.input;
        let bytes = &input[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn parse_length(&mut self) -> Result<usize> {
        let digits = self.take_until(b':')?;
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(self.error("invalid length prefix"));
        }
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("length prefix out of range"))
    }

    fn parse_value(&mut self, depth: usize) -> Result<Value> {
        let tag_pos = self.pos;
        match self.next_byte()? {
            b'N' => {
                self.expect(b';')?;
                Ok(Value::Null)
            }
            b'b' => {
                self.expect(b':')?;
                match self.take_until(b';')? {
                    b"0" => Ok(Value::Bool(false)),
                    b"1" => Ok(Value::Bool(true)),
                    _ => Err(self.error("invalid boolean")),
                }
            }
            b'i' => {
                self.expect(b':')?;
                let digits = self.take_until(b';')?;
                parse_int(digits)
                    .map(Value::Int)
                    .ok_or_else(|| self.error("invalid integer"))
            }
            b'd' => {
                self.expect(b':')?;
                let text = self.take_until(b';')?;
                parse_float(text)
                    .map(Value::Float)
                    .ok_or_else(|| self.error("invalid float"))
            }
            b's' => {
                self.expect(b':')?;
                let len = self.parse_length()?;
                self.expect(b'"')?;
                let bytes = self.take(len)?;
                self.expect(b'"')?;
                self.expect(b';')?;
                Ok(Value::bytes(bytes))
            }
            b'a' => {
                if depth >= MAX_DEPTH {
                    return Err(self.error("arrays nested too deeply"));
                }
                self.expect(b':')?;
                let count = self.parse_length()?;
                self.expect(b'{')?;
                // Every entry takes at least six bytes (`i:0;N;`).
                let mut entries = Vec::with_capacity(count.min(self.remaining() / 6));
                for _ in 0..count {
                    let key = self.parse_key()?;
                    let value = self.parse_value(depth + 1)?;
                    entries.push((key, value));
                }
                self.expect(b'}')?;
                Ok(Value::Array(entries))
            }
            other => {
                self.pos = tag_pos;
                Err(self.unknown_tag(other))
            }
        }
    }

    #[cold]
    #[inline(never)]
    fn unknown_tag(&self, tag: u8) -> LaracryptError {
        self.error(&format!("unknown type tag `{}`", tag.escape_ascii()))
    }

    fn parse_key(&mut self) -> Result<Value> {
        match self.input.get(self.pos) {
            Some(b'i' | b's') => self.parse_value(0),
            Some(_) => Err(self.error("array key must be an int or string")),
            None => Err(self.error("input truncated")),
        }
    }
}

fn parse_int(digits: &[u8]) -> Option<i64> {
    let unsigned = match digits {
        [b'-' | b'+', rest @ ..] => rest,
        _ => digits,
    };
    if unsigned.is_empty() || !unsigned.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn parse_float(text: &[u8]) -> Option<f64> {
    match text {
        b"INF" => return Some(f64::INFINITY),
        b"-INF" => return Some(f64::NEG_INFINITY),
        b"NAN" => return Some(f64::NAN),
        _ => {}
    }
    // Restrict to numeric spellings; Rust's parser also accepts words like
    // "inf" and "nan" that PHP never writes.
    if text.is_empty()
        || !text
            .iter()
            .all(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
    {
        return None;
    }
    std::str::from_utf8(text).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: &Value) -> Value {
        unserialize(&serialize(value).unwrap()).unwrap()
    }

    fn encoded(value: &Value) -> String {
        String::from_utf8(serialize(value).unwrap()).unwrap()
    }

    fn nested(depth: usize) -> String {
        let mut input = "a:1:{i:0;".repeat(depth);
        input.push_str("N;");
        input.push_str(&"}".repeat(depth));
        input
    }

    fn malformed(input: &str) {
        let err = unserialize(input.as_bytes()).expect_err(input);
        assert_eq!(err.kind, Some(ErrorKind::MalformedSerialization), "{}", input);
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encoded(&Value::Null), "N;");
        assert_eq!(encoded(&Value::Bool(true)), "b:1;");
        assert_eq!(encoded(&Value::Bool(false)), "b:0;");
        assert_eq!(encoded(&Value::Int(-17)), "i:-17;");
        assert_eq!(encoded(&Value::Float(1.5)), "d:1.5;");
        assert_eq!(encoded(&Value::Float(0.1)), "d:0.1;");
        assert_eq!(encoded(&Value::from("hello")), r#"s:5:"hello";"#);
    }

    #[test]
    fn test_encode_non_finite_floats() {
        assert_eq!(encoded(&Value::Float(f64::INFINITY)), "d:INF;");
        assert_eq!(encoded(&Value::Float(f64::NEG_INFINITY)), "d:-INF;");
        assert_eq!(encoded(&Value::Float(f64::NAN)), "d:NAN;");
    }

    #[test]
    fn test_string_length_counts_bytes() {
        assert_eq!(encoded(&Value::from("héllo")), "s:6:\"héllo\";");
        assert_eq!(encoded(&Value::from("")), r#"s:0:"";"#);
    }

    #[test]
    fn test_encode_array() {
        let value = Value::array([("a", Value::Int(1)), ("b", Value::from("x"))]);
        assert_eq!(
            encoded(&value),
            r#"a:2:{s:1:"a";i:1;s:1:"b";s:1:"x";}"#
        );
    }

    #[test]
    fn test_encode_nested_mixed_keys() {
        let value = Value::Array(vec![
            (Value::Int(0), Value::from("zero")),
            (
                Value::from("inner"),
                Value::Array(vec![(Value::Int(5), Value::Null)]),
            ),
        ]);
        assert_eq!(
            encoded(&value),
            r#"a:2:{i:0;s:4:"zero";s:5:"inner";a:1:{i:5;N;}}"#
        );
    }

    #[test]
    fn test_encode_rejects_bad_keys() {
        for key in [Value::Null, Value::Bool(true), Value::Float(1.0), Value::list([1])] {
            let value = Value::Array(vec![(key, Value::Int(1))]);
            let err = serialize(&value).expect_err("expected unsupported key");
            assert_eq!(err.kind, Some(ErrorKind::SerializationUnsupportedType));
        }
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(unserialize(b"i:42;").unwrap(), Value::Int(42));
        assert_eq!(unserialize(b"i:-9223372036854775808;").unwrap(), Value::Int(i64::MIN));
        assert_eq!(unserialize(b"d:42;").unwrap(), Value::Float(42.0));
        assert_eq!(unserialize(b"d:1.0E+25;").unwrap(), Value::Float(1.0e25));
        assert_eq!(unserialize(b"d:-INF;").unwrap(), Value::Float(f64::NEG_INFINITY));
        assert_eq!(unserialize(br#"s:2:"42";"#).unwrap(), Value::from("42"));
        assert_eq!(unserialize(b"b:0;").unwrap(), Value::Bool(false));
        assert_eq!(unserialize(b"N;").unwrap(), Value::Null);
    }

    #[test]
    fn test_decode_nan() {
        match unserialize(b"d:NAN;").unwrap() {
            Value::Float(f) => assert!(f.is_nan()),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_string_with_embedded_delimiters() {
        let raw = r#"s:9:"a";b:"c}{";"#;
        assert_eq!(unserialize(raw.as_bytes()).unwrap(), Value::from(r#"a";b:"c}{"#));
    }

    #[test]
    fn test_decode_array_preserves_order_and_key_types() {
        let value = unserialize(br#"a:3:{s:1:"z";i:1;i:1;d:0.5;s:1:"1";b:1;}"#).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![
                (Value::from("z"), Value::Int(1)),
                (Value::Int(1), Value::Float(0.5)),
                (Value::from("1"), Value::Bool(true)),
            ])
        );
    }

    #[test]
    fn test_roundtrip_nested() {
        let value = Value::array([
            (Value::from("user"), Value::array([("id", Value::Int(7)), ("name", Value::from("Zoë"))])),
            (Value::Int(-3), Value::list([Value::Float(2.25), Value::Null, Value::Bool(false)])),
            (Value::from(""), Value::Array(vec![])),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_roundtrip_float_precision() {
        for f in [0.1, -0.0, 1e-300, 1e300, f64::MAX, f64::MIN_POSITIVE, 123456789.123] {
            assert_eq!(roundtrip(&Value::Float(f)), Value::Float(f), "{}", f);
        }
    }

    #[test]
    fn test_unserialize_array_requires_array() {
        assert!(unserialize_array(b"a:0:{}").is_ok());
        let err = unserialize_array(b"i:1;").expect_err("expected top-level error");
        assert_eq!(err.kind, Some(ErrorKind::MalformedSerialization));
    }

    #[test]
    fn test_malformed_inputs() {
        malformed("");
        malformed("N");
        malformed("x:1;");
        malformed("O:8:\"stdClass\":0:{}");
        malformed("b:2;");
        malformed("i:;");
        malformed("i:12a;");
        malformed("i:99999999999999999999;");
        malformed("d:inf;");
        malformed("d:;");
        malformed(r#"s:5:"abc";"#);
        malformed(r#"s:2:"abc";"#);
        malformed(r#"s:-1:"";"#);
        malformed(r#"s:3:"abc""#);
        malformed("a:2:{i:0;N;}");
        malformed("a:1:{i:0;N;");
        malformed("a:1:{N;N;}");
        malformed("a:1:{a:0:{}N;}");
        malformed("N;N;");
        malformed("i:1");
    }

    #[test]
    fn test_binary_string() {
        let input = b"a:1:{s:1:\"t\";s:2:\"\xff\xfe\";}";
        let value = unserialize(input).unwrap();
        assert_eq!(value, Value::array([("t", Value::Bytes(vec![0xff, 0xfe]))]));
        assert_eq!(value.get("t").and_then(Value::as_str), None);
        assert_eq!(serialize(&value).unwrap(), input);
    }

    #[test]
    fn test_binary_string_length_counts_bytes() {
        let value = Value::Bytes(vec![b'"', 0x00, 0x80, b';']);
        assert_eq!(serialize(&value).unwrap(), b"s:4:\"\"\x00\x80;\";");
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_binary_array_key() {
        let value = Value::Array(vec![(Value::Bytes(vec![0xc0]), Value::Int(1))]);
        assert_eq!(serialize(&value).unwrap(), b"a:1:{s:1:\"\xc0\";i:1;}");
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_depth_limit() {
        assert!(unserialize(nested(MAX_DEPTH).as_bytes()).is_ok());
        malformed(&nested(MAX_DEPTH + 1));
    }

    #[test]
    fn test_far_too_deep_is_an_error() {
        // Rejected at MAX_DEPTH without recursing any further.
        malformed(&nested(100_000));
    }

    #[test]
    fn test_huge_count_does_not_preallocate() {
        malformed("a:18446744073709551615:{}");
    }
}
