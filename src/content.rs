use crate::any::Any;
use crate::read::Decoder;
use crate::types::TypeRef;
use crate::write::Encoder;
use crate::Clock;
use bytes::Bytes;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub(crate) const CONTENT_TYPE_GC: u8 = 0;
pub(crate) const CONTENT_TYPE_DELETED: u8 = 1;
pub(crate) const CONTENT_TYPE_JSON: u8 = 2;
pub(crate) const CONTENT_TYPE_BINARY: u8 = 3;
pub(crate) const CONTENT_TYPE_STRING: u8 = 4;
pub(crate) const CONTENT_TYPE_EMBED: u8 = 5;
pub(crate) const CONTENT_TYPE_FORMAT: u8 = 6;
pub(crate) const CONTENT_TYPE_NODE: u8 = 7;
pub(crate) const CONTENT_TYPE_ATOM: u8 = 8;
pub(crate) const CONTENT_TYPE_SKIP: u8 = 10;

/// Payload of an [crate::Item], selected by the low 5 bits of the info byte. The payload kind
/// decides how many clock values the item occupies and whether the item can be split.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Content of a deleted item whose value has been dropped at the source. Claims the
    /// original clock length.
    Deleted(Clock),
    /// A run of JSON values, one clock each.
    Json(Vec<serde_json::Value>),
    /// An opaque binary payload, single clock.
    Binary(Bytes),
    /// A run of characters, one clock per unicode scalar value.
    String(String),
    /// A single embedded value, carried as JSON.
    Embed(serde_json::Value),
    /// Formatting marker. Occupies a clock but is not countable.
    Format {
        key: Arc<str>,
        value: serde_json::Value,
    },
    /// Head of a nested collection.
    Node(TypeRef),
    /// A run of self-describing values, one clock each.
    Atom(Vec<Any>),
}

impl Content {
    pub fn len(&self) -> Clock {
        match self {
            Content::Deleted(len) => *len,
            Content::Json(values) => values.len() as Clock,
            Content::Binary(_) => 1,
            Content::String(str) => str.chars().count() as Clock,
            Content::Embed(_) => 1,
            Content::Format { .. } => 1,
            Content::Node(_) => 1,
            Content::Atom(values) => values.len() as Clock,
        }
    }

    /// Content kind carried in the low 5 bits of the info byte.
    pub(crate) fn type_ref(&self) -> u8 {
        match self {
            Content::Deleted(_) => CONTENT_TYPE_DELETED,
            Content::Json(_) => CONTENT_TYPE_JSON,
            Content::Binary(_) => CONTENT_TYPE_BINARY,
            Content::String(_) => CONTENT_TYPE_STRING,
            Content::Embed(_) => CONTENT_TYPE_EMBED,
            Content::Format { .. } => CONTENT_TYPE_FORMAT,
            Content::Node(_) => CONTENT_TYPE_NODE,
            Content::Atom(_) => CONTENT_TYPE_ATOM,
        }
    }

    /// Countable content contributes to the length of its parent collection; deleted runs and
    /// formatting markers don't.
    pub fn is_countable(&self) -> bool {
        !matches!(self, Content::Deleted(_) | Content::Format { .. })
    }

    /// Last value of the content run, converted to a self-describing value. Used by map reads,
    /// where the rightmost value of an entry chain wins.
    pub(crate) fn get_last(&self) -> Option<Any> {
        match self {
            Content::Atom(values) => values.last().cloned(),
            Content::String(str) => Some(Any::String(str.as_str().into())),
            Content::Embed(value) => serde_json::from_value(value.clone()).ok(),
            Content::Json(values) => values
                .last()
                .and_then(|value| serde_json::from_value(value.clone()).ok()),
            Content::Binary(buf) => Some(Any::ByteArray(buf.clone())),
            _ => None,
        }
    }

    /// Splits the content at `offset`, leaving `[0, offset)` in place and returning the rest.
    /// Only multi-clock kinds can be split; single-clock kinds never reach this call.
    pub(crate) fn splice(&mut self, offset: Clock) -> Content {
        match self {
            Content::Deleted(len) => {
                let right = Content::Deleted(*len - offset);
                *len = offset;
                right
            }
            Content::Json(values) => Content::Json(values.split_off(offset as usize)),
            Content::Atom(values) => Content::Atom(values.split_off(offset as usize)),
            Content::String(str) => {
                let at = str
                    .char_indices()
                    .nth(offset as usize)
                    .map(|(i, _)| i)
                    .unwrap_or(str.len());
                Content::String(str.split_off(at))
            }
            other => {
                unreachable!("tried to split single-clock content: {}", other.type_ref())
            }
        }
    }

    pub(crate) fn encode_with<E: Encoder>(
        &self,
        encoder: &mut E,
        offset: Clock,
    ) -> crate::Result<()> {
        match self {
            Content::Deleted(len) => encoder.write_len(*len - offset),
            Content::Json(values) => {
                encoder.write_len(values.len() as Clock - offset)?;
                for value in &values[offset as usize..] {
                    encoder.write_json(value)?;
                }
                Ok(())
            }
            Content::Binary(buf) => {
                use crate::write::WriteExt;
                encoder.write_buf(buf)
            }
            Content::String(str) => {
                use crate::write::WriteExt;
                let at = str
                    .char_indices()
                    .nth(offset as usize)
                    .map(|(i, _)| i)
                    .unwrap_or(str.len());
                encoder.write_string(&str[at..])
            }
            Content::Embed(value) => encoder.write_json(value),
            Content::Format { key, value } => {
                encoder.write_key(key)?;
                encoder.write_json(value)
            }
            Content::Node(type_ref) => encoder.write_type_ref(*type_ref as u8),
            Content::Atom(values) => {
                encoder.write_len(values.len() as Clock - offset)?;
                for value in &values[offset as usize..] {
                    encoder.write_any(value)?;
                }
                Ok(())
            }
        }
    }

    /// Dispatches on the low 5 bits of `info` read ahead by the caller.
    pub(crate) fn decode_with<D: Decoder>(decoder: &mut D, info: u8) -> crate::Result<Content> {
        use crate::read::ReadExt;
        match info & crate::block::CARRIER_INFO {
            CONTENT_TYPE_DELETED => {
                let len = decoder.read_len()?;
                Ok(Content::Deleted(len))
            }
            CONTENT_TYPE_JSON => {
                let len = decoder.read_len()?;
                let mut values = Vec::new();
                values.try_reserve(len as usize)?;
                for _ in 0..len {
                    values.push(decoder.read_json()?);
                }
                Ok(Content::Json(values))
            }
            CONTENT_TYPE_BINARY => {
                let mut buf = Vec::new();
                decoder.read_buf(&mut buf)?;
                Ok(Content::Binary(buf.into()))
            }
            CONTENT_TYPE_STRING => {
                let mut str = String::new();
                decoder.read_string(&mut str)?;
                Ok(Content::String(str))
            }
            CONTENT_TYPE_EMBED => Ok(Content::Embed(decoder.read_json()?)),
            CONTENT_TYPE_FORMAT => {
                let key = decoder.read_key()?;
                let value = decoder.read_json()?;
                Ok(Content::Format { key, value })
            }
            CONTENT_TYPE_NODE => {
                let type_ref = TypeRef::try_from(decoder.read_type_ref()?)?;
                Ok(Content::Node(type_ref))
            }
            CONTENT_TYPE_ATOM => {
                let len = decoder.read_len()?;
                let mut values = Vec::new();
                values.try_reserve(len as usize)?;
                for _ in 0..len {
                    values.push(decoder.read_any()?);
                }
                Ok(Content::Atom(values))
            }
            content_type => Err(crate::Error::UnsupportedContent(content_type)),
        }
    }
}

impl Display for Content {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Content::Deleted(len) => write!(f, "deleted({})", len),
            Content::Json(values) => write!(f, "json(x{})", values.len()),
            Content::Binary(buf) => write!(f, "binary({}B)", buf.len()),
            Content::String(str) => write!(f, "{:?}", str),
            Content::Embed(value) => write!(f, "embed({})", value),
            Content::Format { key, .. } => write!(f, "format({})", key),
            Content::Node(type_ref) => write!(f, "node({:?})", type_ref),
            Content::Atom(values) => {
                write!(f, "[")?;
                let mut i = values.iter();
                if let Some(value) = i.next() {
                    write!(f, "{}", value)?;
                }
                while let Some(value) = i.next() {
                    write!(f, ", {}", value)?;
                }
                write!(f, "]")
            }
        }
    }
}
