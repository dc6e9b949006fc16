mod any;
mod block;
mod codec;
mod content;
mod doc;
mod id_set;
mod integrate;
mod read;
mod state_vector;
mod store;
mod transaction;
mod types;
mod update;
mod varint;
mod write;

#[cfg(test)]
mod test_util;

pub use any::Any;
pub use block::{Block, Item, ID};
pub use codec::v1::{DecoderV1, EncoderV1};
pub use codec::v2::{DecoderV2, EncoderV2};
pub use codec::Format;
pub use content::Content;
pub use doc::{Doc, Options};
pub use id_set::IDSet;
pub use read::{Decode, Decoder};
pub use state_vector::StateVector;
pub use write::{Encode, Encoder};
pub use transaction::{Origin, TransactionMut};
pub use types::map::MapRef;
pub use types::text::TextRef;
pub use types::TypeRef;
pub use update::Update;

use serde::{Deserialize, Serialize};
use smallvec::CollectionAllocErr;
use std::collections::TryReserveError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Logical clock value. Each replica keeps its own monotonically growing sequence of clocks,
/// with every block occupying a contiguous `[clock, clock+len)` range.
pub type Clock = u64;

pub type DynError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("value under provided index or key was not found")]
    NotFound,
    #[error("I/O error: {0}")]
    IO(#[from] std::io::Error),
    #[error("expected more data, reached end of buffer")]
    EndOfBuffer,
    #[error("operation tried to allocate too much memory")]
    OutOfMemory,
    #[error("index is out of range of expected type")]
    OutOfRange,
    #[error("provided key is longer than 255 bytes")]
    KeyTooLong,
    #[error("malformed block: {0}")]
    MalformedBlock(ID),
    #[error("unsupported content type: {0}")]
    UnsupportedContent(u8),
    #[error("unknown collection type: {0}")]
    UnknownTypeRef(u8),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown value tag: {0}")]
    UnknownValueTag(u8),
    #[error("{0}")]
    Custom(DynError),
    #[error("block not found: {0}")]
    BlockNotFound(ID),
}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

impl From<CollectionAllocErr> for Error {
    fn from(_: CollectionAllocErr) -> Self {
        Self::OutOfMemory
    }
}

impl Error {
    pub fn not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

/// Unique identifier of a document replica. Any peer producing updates must do so under its own
/// client identifier, never reusing clock ranges already claimed by another peer.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Ord, PartialOrd, Hash, Default)]
pub struct ClientID(u64);

impl ClientID {
    /// Client identifiers are kept within the 53-bit range for interoperability with peers
    /// that represent them as IEEE-754 doubles.
    const MAX: u64 = (1 << 53) - 1;

    pub fn new_random() -> Self {
        ClientID(rand::random_range(..=Self::MAX))
    }

    pub const fn new(id: u64) -> Self {
        ClientID(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ClientID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ClientID {
    fn from(value: u64) -> Self {
        ClientID(value)
    }
}

impl From<ClientID> for u64 {
    fn from(value: ClientID) -> Self {
        value.0
    }
}

impl Serialize for ClientID {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for ClientID {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u64::deserialize(deserializer)?;
        Ok(ClientID(value))
    }
}
