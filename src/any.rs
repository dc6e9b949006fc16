use crate::read::ReadExt;
use crate::write::WriteExt;
use bytes::Bytes;
use serde::de::{Error as DeError, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::io::{Read, Write};
use std::sync::Arc;

pub const TAG_UNDEFINED: u8 = 127;
pub const TAG_NULL: u8 = 126;
pub const TAG_INTEGER: u8 = 125;
pub const TAG_FLOAT32: u8 = 124;
pub const TAG_FLOAT64: u8 = 123;
pub const TAG_BIGINT: u8 = 122;
pub const TAG_FALSE: u8 = 121;
pub const TAG_TRUE: u8 = 120;
pub const TAG_STRING: u8 = 119;
pub const TAG_OBJECT: u8 = 118;
pub const TAG_ARRAY: u8 = 117;
pub const TAG_BYTE_ARRAY: u8 = 116;

pub const F64_MAX_SAFE_INTEGER: i64 = i64::pow(2, 53) - 1;
pub const F64_MIN_SAFE_INTEGER: i64 = -F64_MAX_SAFE_INTEGER;

/// Self-describing value used as a payload of atom and embed content. Encodes as a single tag
/// byte followed by a tag-specific body.
#[derive(Debug, Clone, PartialEq)]
pub enum Any {
    Undefined,
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(Arc<str>),
    Object(HashMap<String, Any>),
    Array(Vec<Any>),
    ByteArray(Bytes),
}

impl Any {
    pub fn encode<W: Write>(&self, w: &mut W) -> crate::Result<()> {
        match self {
            Any::Undefined => w.write_u8(TAG_UNDEFINED),
            Any::Null => w.write_u8(TAG_NULL),
            Any::Int(value) => {
                if *value >= F64_MIN_SAFE_INTEGER && *value <= F64_MAX_SAFE_INTEGER {
                    w.write_u8(TAG_INTEGER)?;
                    w.write_var(*value)
                } else {
                    w.write_u8(TAG_BIGINT)?;
                    w.write_i64(*value)
                }
            }
            Any::Float(value) => {
                if (*value as f32) as f64 == *value {
                    w.write_u8(TAG_FLOAT32)?;
                    w.write_f32(*value as f32)
                } else {
                    w.write_u8(TAG_FLOAT64)?;
                    w.write_f64(*value)
                }
            }
            Any::Bool(value) => w.write_u8(if *value { TAG_TRUE } else { TAG_FALSE }),
            Any::String(value) => {
                w.write_u8(TAG_STRING)?;
                w.write_string(value)
            }
            Any::Object(entries) => {
                w.write_u8(TAG_OBJECT)?;
                w.write_var(entries.len())?;
                for (key, value) in entries.iter() {
                    w.write_string(key)?;
                    value.encode(w)?;
                }
                Ok(())
            }
            Any::Array(values) => {
                w.write_u8(TAG_ARRAY)?;
                w.write_var(values.len())?;
                for value in values.iter() {
                    value.encode(w)?;
                }
                Ok(())
            }
            Any::ByteArray(bytes) => {
                w.write_u8(TAG_BYTE_ARRAY)?;
                w.write_buf(bytes)
            }
        }
    }

    pub fn decode<R: Read>(r: &mut R) -> crate::Result<Self> {
        match r.read_u8()? {
            TAG_UNDEFINED => Ok(Any::Undefined),
            TAG_NULL => Ok(Any::Null),
            TAG_INTEGER => Ok(Any::Int(r.read_var()?)),
            TAG_FLOAT32 => Ok(Any::Float(r.read_f32()? as f64)),
            TAG_FLOAT64 => Ok(Any::Float(r.read_f64()?)),
            TAG_BIGINT => Ok(Any::Int(r.read_i64()?)),
            TAG_FALSE => Ok(Any::Bool(false)),
            TAG_TRUE => Ok(Any::Bool(true)),
            TAG_STRING => {
                let mut str = String::new();
                r.read_string(&mut str)?;
                Ok(Any::String(str.into()))
            }
            TAG_OBJECT => {
                let len: usize = r.read_var()?;
                let mut entries = HashMap::new();
                entries.try_reserve(len)?;
                for _ in 0..len {
                    let mut key = String::new();
                    r.read_string(&mut key)?;
                    let value = Any::decode(r)?;
                    entries.insert(key, value);
                }
                Ok(Any::Object(entries))
            }
            TAG_ARRAY => {
                let len: usize = r.read_var()?;
                let mut values = Vec::new();
                values.try_reserve(len)?;
                for _ in 0..len {
                    values.push(Any::decode(r)?);
                }
                Ok(Any::Array(values))
            }
            TAG_BYTE_ARRAY => {
                let mut buf = Vec::new();
                r.read_buf(&mut buf)?;
                Ok(Any::ByteArray(buf.into()))
            }
            tag => Err(crate::Error::UnknownValueTag(tag)),
        }
    }
}

impl From<bool> for Any {
    fn from(value: bool) -> Self {
        Any::Bool(value)
    }
}

impl From<i64> for Any {
    fn from(value: i64) -> Self {
        Any::Int(value)
    }
}

impl From<i32> for Any {
    fn from(value: i32) -> Self {
        Any::Int(value as i64)
    }
}

impl From<f64> for Any {
    fn from(value: f64) -> Self {
        Any::Float(value)
    }
}

impl From<&str> for Any {
    fn from(value: &str) -> Self {
        Any::String(value.into())
    }
}

impl From<String> for Any {
    fn from(value: String) -> Self {
        Any::String(value.into())
    }
}

impl From<Vec<Any>> for Any {
    fn from(values: Vec<Any>) -> Self {
        Any::Array(values)
    }
}

impl Serialize for Any {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Any::Undefined => serializer.serialize_unit(),
            Any::Null => serializer.serialize_none(),
            Any::Int(v) => serializer.serialize_i64(*v),
            Any::Float(v) => serializer.serialize_f64(*v),
            Any::Bool(v) => serializer.serialize_bool(*v),
            Any::String(v) => serializer.serialize_str(&*v),
            Any::Object(v) => v.serialize(serializer),
            Any::Array(v) => v.serialize(serializer),
            Any::ByteArray(v) => serializer.serialize_bytes(&*v),
        }
    }
}

impl<'de> Deserialize<'de> for Any {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AnyVisitor;
        impl<'de> Visitor<'de> for AnyVisitor {
            type Value = Any;

            fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
                formatter.write_str("a self-describing value")
            }

            #[inline]
            fn visit_bool<E: DeError>(self, v: bool) -> Result<Self::Value, E> {
                Ok(Any::Bool(v))
            }

            #[inline]
            fn visit_i64<E: DeError>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Any::Int(v))
            }

            #[inline]
            fn visit_u64<E: DeError>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Any::Int(v as i64))
            }

            #[inline]
            fn visit_f64<E: DeError>(self, v: f64) -> Result<Self::Value, E> {
                Ok(Any::Float(v))
            }

            #[inline]
            fn visit_unit<E: DeError>(self) -> Result<Self::Value, E> {
                Ok(Any::Undefined)
            }

            #[inline]
            fn visit_none<E: DeError>(self) -> Result<Self::Value, E> {
                Ok(Any::Null)
            }

            #[inline]
            fn visit_bytes<E: DeError>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(Any::ByteArray(Bytes::copy_from_slice(v)))
            }

            #[inline]
            fn visit_str<E: DeError>(self, v: &str) -> Result<Self::Value, E> {
                Ok(Any::String(v.into()))
            }

            #[inline]
            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut values = match map.size_hint() {
                    None => HashMap::new(),
                    Some(len) => HashMap::with_capacity(len),
                };
                while let Some((key, value)) = map.next_entry()? {
                    values.insert(key, value);
                }
                Ok(Any::Object(values))
            }

            #[inline]
            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut values = match seq.size_hint() {
                    None => Vec::new(),
                    Some(len) => Vec::with_capacity(len),
                };
                while let Some(value) = seq.next_element()? {
                    values.push(value);
                }
                Ok(Any::Array(values))
            }
        }

        deserializer.deserialize_any(AnyVisitor)
    }
}

impl Display for Any {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Any::Undefined => write!(f, "undefined"),
            Any::Null => write!(f, "null"),
            Any::Int(v) => Display::fmt(v, f),
            Any::Float(v) => Display::fmt(v, f),
            Any::Bool(v) => Display::fmt(v, f),
            Any::String(v) => write!(f, "\"{}\"", v),
            Any::Object(v) => {
                let mut i = v.iter();
                write!(f, "{{")?;
                if let Some((k, v)) = i.next() {
                    write!(f, "\"{}\": {}", k, v)?;
                }
                while let Some((k, v)) = i.next() {
                    write!(f, ", \"{}\": {}", k, v)?;
                }
                write!(f, "}}")
            }
            Any::Array(v) => {
                let mut i = v.iter();
                write!(f, "[")?;
                if let Some(v) = i.next() {
                    write!(f, "{}", v)?;
                }
                while let Some(v) = i.next() {
                    write!(f, ", {}", v)?;
                }
                write!(f, "]")
            }
            Any::ByteArray(v) => {
                write!(f, "b\"")?;
                for &b in v.iter() {
                    if (0x20..0x7f).contains(&b) {
                        write!(f, "{}", b as char)?;
                    } else {
                        write!(f, "\\x{:02x}", b)?;
                    }
                }
                write!(f, "\"")
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(value: Any) {
        let mut buf = Vec::new();
        value.encode(&mut buf).unwrap();
        let decoded = Any::decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn scalar_roundtrips() {
        roundtrip(Any::Undefined);
        roundtrip(Any::Null);
        roundtrip(Any::Bool(true));
        roundtrip(Any::Bool(false));
        roundtrip(Any::Int(0));
        roundtrip(Any::Int(-1));
        roundtrip(Any::Int(F64_MAX_SAFE_INTEGER));
        roundtrip(Any::Int(i64::MAX));
        roundtrip(Any::Float(0.5));
        roundtrip(Any::Float(1.0e-300));
        roundtrip(Any::String("hello".into()));
    }

    #[test]
    fn nested_roundtrips() {
        let mut obj = HashMap::new();
        obj.insert("key".to_string(), Any::Int(1));
        obj.insert(
            "nested".to_string(),
            Any::Array(vec![Any::Null, Any::Bool(false), "tail".into()]),
        );
        roundtrip(Any::Object(obj));
        roundtrip(Any::ByteArray(Bytes::from_static(&[0, 1, 2, 255])));
    }

    #[test]
    fn unknown_tag() {
        let buf = [42u8];
        assert!(Any::decode(&mut Cursor::new(buf)).is_err());
    }
}
