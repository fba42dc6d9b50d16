//! Field type tags and decoded values for the WDBC format

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Field type tag, one per format-string character
///
/// `n`, `d`, `i` and `l` all decode as a 4-byte unsigned integer; they are kept
/// apart so `describe` can report the role the catalog assigned to the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `n` - primary index column
    Index,
    /// `d` - sorted index column
    SortedIndex,
    /// `i` - 32-bit integer
    Int,
    /// `l` - 32-bit logical/boolean
    Logical,
    /// `f` - 32-bit float
    Float,
    /// `s` - 4-byte offset into the string block
    String,
    /// `b` - 8-bit unsigned integer
    Byte,
    /// `x` - 4 unused bytes
    Skip,
    /// `X` - 1 unused byte
    SkipByte,
}

impl FieldType {
    /// Map a format-string character to its tag
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'n' => Some(FieldType::Index),
            'd' => Some(FieldType::SortedIndex),
            'i' => Some(FieldType::Int),
            'l' => Some(FieldType::Logical),
            'f' => Some(FieldType::Float),
            's' => Some(FieldType::String),
            'b' => Some(FieldType::Byte),
            'x' => Some(FieldType::Skip),
            'X' => Some(FieldType::SkipByte),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            FieldType::Index => 'n',
            FieldType::SortedIndex => 'd',
            FieldType::Int => 'i',
            FieldType::Logical => 'l',
            FieldType::Float => 'f',
            FieldType::String => 's',
            FieldType::Byte => 'b',
            FieldType::Skip => 'x',
            FieldType::SkipByte => 'X',
        }
    }

    /// Bytes occupied in a record, skip tags included
    pub fn byte_width(self) -> usize {
        match self {
            FieldType::Byte | FieldType::SkipByte => 1,
            _ => 4,
        }
    }

    pub fn is_skip(self) -> bool {
        matches!(self, FieldType::Skip | FieldType::SkipByte)
    }

    /// Kind of value this tag decodes to, `None` for skip tags
    pub fn value_kind(self) -> Option<ValueKind> {
        match self {
            FieldType::Index | FieldType::SortedIndex | FieldType::Int | FieldType::Logical => {
                Some(ValueKind::UInt32)
            }
            FieldType::Float => Some(ValueKind::Float),
            FieldType::String => Some(ValueKind::String),
            FieldType::Byte => Some(ValueKind::UInt8),
            FieldType::Skip | FieldType::SkipByte => None,
        }
    }

    /// Short descriptive name used in `describe` output
    pub fn name(self) -> &'static str {
        match self {
            FieldType::Index => "index",
            FieldType::SortedIndex => "sorted_index",
            FieldType::Int => "int",
            FieldType::Logical => "logical",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Byte => "byte",
            FieldType::Skip => "skip",
            FieldType::SkipByte => "skip_byte",
        }
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// The four kinds of decoded value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    UInt32,
    Float,
    String,
    UInt8,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueKind::UInt32 => "uint32",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::UInt8 => "uint8",
        };
        f.write_str(name)
    }
}

/// A decoded field value
///
/// `InvalidString` is produced for a string field whose offset points outside
/// the string block when decoding with
/// [`StringOffsetPolicy::ErrorValue`](super::StringOffsetPolicy::ErrorValue).
/// It never compares equal to a filter value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    UInt(u32),
    Float(f32),
    Byte(u8),
    String(String),
    InvalidString { offset: u32 },
}

impl FieldValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::UInt(_) => ValueKind::UInt32,
            FieldValue::Float(_) => ValueKind::Float,
            FieldValue::Byte(_) => ValueKind::UInt8,
            FieldValue::String(_) | FieldValue::InvalidString { .. } => ValueKind::String,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            FieldValue::UInt(v) => Some(*v),
            FieldValue::Byte(v) => Some(*v as u32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a caller-supplied JSON value into a value of `kind`
    ///
    /// No coercion across kinds: a JSON string never becomes a number and a
    /// fractional number never becomes an integer.
    pub fn from_json(value: &Value, kind: ValueKind) -> Result<Self> {
        let mismatch = || {
            Error::InvalidFilter(format!("expected a {} value, got {}", kind, value))
        };
        match kind {
            ValueKind::UInt32 => value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(FieldValue::UInt)
                .ok_or_else(mismatch),
            ValueKind::UInt8 => value
                .as_u64()
                .and_then(|v| u8::try_from(v).ok())
                .map(FieldValue::Byte)
                .ok_or_else(mismatch),
            ValueKind::Float => value
                .as_f64()
                .map(|v| FieldValue::Float(v as f32))
                .ok_or_else(mismatch),
            ValueKind::String => value
                .as_str()
                .map(|s| FieldValue::String(s.to_string()))
                .ok_or_else(mismatch),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::UInt(v) => serializer.serialize_u32(*v),
            FieldValue::Float(v) => serializer.serialize_f32(*v),
            FieldValue::Byte(v) => serializer.serialize_u8(*v),
            FieldValue::String(s) => serializer.serialize_str(s),
            FieldValue::InvalidString { offset } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("invalid_string_offset", offset)?;
                map.end()
            }
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::UInt(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Byte(v) => write!(f, "{}", v),
            FieldValue::String(s) => f.write_str(s),
            FieldValue::InvalidString { offset } => write!(f, "<bad string offset {}>", offset),
        }
    }
}
