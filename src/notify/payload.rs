use std::{collections::BTreeMap, fmt};

use itertools::Itertools;
use serde::{Serialize, Serializer};
use serde_json as json;

/// A value handed to notifiers.
///
/// Only string notifiers and templates look inside it. Everything else treats
/// it as opaque and forwards it unchanged.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Payload>),
    Map(BTreeMap<String, Payload>),
}

impl Payload {
    pub fn map<K: Into<String>, V: Into<Payload>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

// The default string form. Fingerprints and string notifiers both depend on
// it, so it must stay stable.
impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "<nil>"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Float(v) => fmt_float(*v, f),
            Self::Str(s) => f.write_str(s),
            Self::Bytes(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            Self::List(items) => write!(f, "[{}]", items.iter().join(" ")),
            Self::Map(entries) => write!(
                f,
                "map[{}]",
                entries.iter().map(|(k, v)| format!("{k}:{v}")).join(" ")
            ),
        }
    }
}

// Shortest round-trip digits, in exponent form when the exponent is below -4
// or at least 6, with a signed exponent of two or more digits.
fn fmt_float(v: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if v.is_nan() {
        return f.write_str("NaN");
    }
    if v.is_infinite() {
        return f.write_str(if v > 0.0 { "+Inf" } else { "-Inf" });
    }

    let sci = format!("{v:e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp = exp.parse::<i32>().unwrap_or(0);
    if (-4..6).contains(&exp) {
        write!(f, "{v}")
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        write!(f, "{mantissa}e{sign}{:02}", exp.abs())
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::UInt(u) => serializer.serialize_u64(*u),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Bytes(bytes) => serializer.serialize_str(&String::from_utf8_lossy(bytes)),
            Self::List(items) => items.serialize(serializer),
            Self::Map(entries) => entries.serialize(serializer),
        }
    }
}

macro_rules! impl_from {
    ( $variant:ident as $target:ty => $($ty:ty),+ ) => {
        $(impl From<$ty> for Payload {
            fn from(value: $ty) -> Self {
                Self::$variant(value as $target)
            }
        })+
    };
}

impl_from!(Int as i64 => i8, i16, i32, i64, isize);
impl_from!(UInt as u64 => u8, u16, u32, u64, usize);
impl_from!(Float as f64 => f32, f64);

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for Payload {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<Vec<Payload>> for Payload {
    fn from(value: Vec<Payload>) -> Self {
        Self::List(value)
    }
}

impl From<BTreeMap<String, Payload>> for Payload {
    fn from(value: BTreeMap<String, Payload>) -> Self {
        Self::Map(value)
    }
}

impl From<json::Value> for Payload {
    fn from(value: json::Value) -> Self {
        match value {
            json::Value::Null => Self::Null,
            json::Value::Bool(b) => Self::Bool(b),
            json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            json::Value::String(s) => Self::Str(s),
            json::Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            json::Value::Object(entries) => {
                Self::Map(entries.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}
