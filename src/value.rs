//! Structured plaintext values
//!
//! [`Value`] mirrors what PHP's `serialize()` can express for plain data:
//! scalars and ordered arrays whose keys are integers or strings. Arrays are
//! kept as an ordered list of pairs so that key order, and the distinction
//! between `1` and `"1"` as keys, survive a round trip.

use crate::error::{ErrorCategory, ErrorKind, LaracryptError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// A PHP string whose bytes are not valid UTF-8, such as the output of
    /// `random_bytes()`. Decoding yields [`Value::String`] whenever the bytes
    /// are valid UTF-8, so both spellings of the same text never coexist.
    Bytes(Vec<u8>),
    /// Ordered `(key, value)` entries. Keys must be [`Value::Int`],
    /// [`Value::String`] or [`Value::Bytes`] to be serializable.
    Array(Vec<(Value, Value)>),
}

impl Value {
    /// Build an array from anything yielding key/value pairs.
    pub fn array<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Array(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a string from raw bytes: [`Value::String`] when they are valid
    /// UTF-8, [`Value::Bytes`] otherwise.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        match String::from_utf8(bytes.into()) {
            Ok(s) => Value::String(s),
            Err(e) => Value::Bytes(e.into_bytes()),
        }
    }

    /// Build an array keyed `0..n`, like a PHP list.
    pub fn list<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Value::Array(
            items
                .into_iter()
                .zip(0i64..)
                .map(|(v, i)| (Value::Int(i), v.into()))
                .collect(),
        )
    }

    pub fn as_array(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Array(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes of either string variant.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Look up an array entry by key. Returns `None` for non-arrays.
    ///
    /// Keys compare by type as well as content: `1` does not match `"1"`.
    pub fn get(&self, key: impl Into<Value>) -> Option<&Value> {
        let key = key.into();
        self.as_array()?
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// True for arrays whose keys are exactly `0, 1, 2, ...` in order.
    pub fn is_list(&self) -> bool {
        match self {
            Value::Array(entries) => entries
                .iter()
                .zip(0i64..)
                .all(|((k, _), i)| *k == Value::Int(i)),
            _ => false,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) | Value::Bytes(_) => "string",
            Value::Array(_) => "array",
        }
    }

    /// Render as JSON.
    ///
    /// Lists become JSON arrays, other arrays become objects with their keys
    /// rendered as strings. Non-finite floats become `null`, and byte strings
    /// are rendered lossily with U+FFFD for invalid sequences.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
            Value::Array(entries) if self.is_list() => serde_json::Value::Array(
                entries
                    .iter()
                    .map(|(_, v)| v.to_json())
                    .collect::<Result<_>>()?,
            ),
            Value::Array(entries) => {
                let mut object = serde_json::Map::with_capacity(entries.len());
                for (k, v) in entries {
                    let key = match k {
                        Value::Int(i) => i.to_string(),
                        Value::String(s) => s.clone(),
                        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
                        other => return Err(unsupported_key(other)),
                    };
                    object.insert(key, v.to_json()?);
                }
                serde_json::Value::Object(object)
            }
        })
    }
}

pub(crate) fn unsupported_key(key: &Value) -> LaracryptError {
    LaracryptError::with_kind(
        ErrorCategory::User,
        ErrorKind::SerializationUnsupportedType,
        format!(
            "array keys must be int or string, got {}",
            key.type_name()
        ),
    )
}

impl From<serde_json::Value> for Value {
    /// JSON objects keep their key order and become string-keyed arrays;
    /// JSON arrays become lists. Integers outside `i64` become floats.
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::list(items.into_iter().map(Value::from)),
            serde_json::Value::Object(map) => {
                Value::Array(map.into_iter().map(|(k, v)| (Value::String(k), v.into())).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}
