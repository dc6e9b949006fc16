use crate::content::Content;
use crate::store::DocStore;
use crate::write::Encoder;
use crate::{ClientID, Clock};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

pub(crate) const CARRIER_INFO: u8 = 0b0001_1111;
pub(crate) const HAS_ORIGIN: u8 = 0b1000_0000;
pub(crate) const HAS_RIGHT_ORIGIN: u8 = 0b0100_0000;
pub(crate) const HAS_PARENT_SUB: u8 = 0b0010_0000;

/// Unique identifier of a block: the producing replica plus the first clock value the block
/// occupies. Blocks spanning more than one clock are addressed by any clock within their range.
#[derive(PartialEq, Eq, Hash, Copy, Clone, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ID {
    pub client: ClientID,
    pub clock: Clock,
}

impl ID {
    #[inline]
    pub const fn new(client: ClientID, clock: Clock) -> Self {
        Self { client, clock }
    }
}

impl Debug for ID {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for ID {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}:{}>", self.client, self.clock)
    }
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct ItemFlags(u8);

bitflags! {
    impl ItemFlags : u8 {
        const NONE = 0b0000_0000;
        const DELETED = 0b0000_0001;
        const COUNTABLE = 0b0000_0010;
    }
}

/// Parent collection of an item. Items inserted mid-sequence don't carry their parent on the
/// wire; it is recovered from the origin neighbor during integration (the [Parent::Unset] case).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parent {
    /// A named top-level collection.
    Root(Arc<str>),
    /// A nested collection, identified by the block holding its [crate::TypeRef] content.
    Nested(ID),
    /// Parent not carried on the wire, recoverable from left or right origin.
    Unset,
}

/// A single operation produced by some replica: a chunk of content spliced into a parent
/// collection between the two origin neighbors observed at production time.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ID,
    /// Current left neighbor, established during integration.
    pub left: Option<ID>,
    /// Current right neighbor, established during integration.
    pub right: Option<ID>,
    /// Left neighbor at the time this item was produced.
    pub origin: Option<ID>,
    /// Right neighbor at the time this item was produced.
    pub right_origin: Option<ID>,
    pub parent: Parent,
    /// Key within a map parent. Items sharing a `parent_sub` form an entry history chain.
    pub parent_sub: Option<Arc<str>>,
    pub content: Content,
    pub(crate) flags: ItemFlags,
}

impl Item {
    pub(crate) fn new(
        id: ID,
        origin: Option<ID>,
        right_origin: Option<ID>,
        parent: Parent,
        parent_sub: Option<Arc<str>>,
        content: Content,
    ) -> Self {
        let flags = if content.is_countable() {
            ItemFlags::COUNTABLE
        } else {
            ItemFlags::NONE
        };
        Item {
            id,
            left: None,
            right: None,
            origin,
            right_origin,
            parent,
            parent_sub,
            content,
            flags,
        }
    }

    #[inline]
    pub fn len(&self) -> Clock {
        self.content.len()
    }

    /// Identifier of the last clock value occupied by this item.
    pub fn last_id(&self) -> ID {
        ID::new(self.id.client, self.id.clock + self.len() - 1)
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.flags.contains(ItemFlags::DELETED)
    }

    #[inline]
    pub fn is_countable(&self) -> bool {
        self.flags.contains(ItemFlags::COUNTABLE)
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.flags |= ItemFlags::DELETED;
    }

    /// Splits the item at `offset` (exclusive upper bound of the retained part), returning the
    /// item covering `[offset, len)`. Neighbor pointers of surrounding blocks are fixed up by
    /// the store, not here.
    pub(crate) fn splice(&mut self, offset: Clock) -> Item {
        debug_assert!(offset > 0 && offset < self.len());
        let right_content = self.content.splice(offset);
        let right = Item {
            id: ID::new(self.id.client, self.id.clock + offset),
            left: Some(self.id),
            right: self.right,
            origin: Some(ID::new(self.id.client, self.id.clock + offset - 1)),
            right_origin: self.right_origin,
            parent: self.parent.clone(),
            parent_sub: self.parent_sub.clone(),
            content: right_content,
            flags: self.flags,
        };
        self.right = Some(right.id);
        right
    }
}

/// A contiguous clock range whose content has been discarded. The range still claims its clock
/// space so that causality checks keep working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRange {
    pub id: ID,
    pub len: Clock,
}

impl BlockRange {
    pub fn new(id: ID, len: Clock) -> Self {
        Self { id, len }
    }

    pub fn clock_end(&self) -> Clock {
        self.id.clock + self.len
    }
}

impl Display for BlockRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<{}:{}..{}>",
            self.id.client,
            self.id.clock,
            self.id.clock + self.len - 1
        )
    }
}

/// A structure occupying a clock range on some replica: either a live operation or a tombstone
/// left after its content has been collapsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Item(Item),
    GC(BlockRange),
}

impl Block {
    pub fn id(&self) -> &ID {
        match self {
            Block::Item(item) => &item.id,
            Block::GC(range) => &range.id,
        }
    }

    pub fn len(&self) -> Clock {
        match self {
            Block::Item(item) => item.len(),
            Block::GC(range) => range.len,
        }
    }

    #[inline]
    pub fn clock_start(&self) -> Clock {
        self.id().clock
    }

    #[inline]
    pub fn clock_end(&self) -> Clock {
        self.id().clock + self.len()
    }

    pub fn last_id(&self) -> ID {
        ID::new(self.id().client, self.clock_end() - 1)
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            Block::Item(item) => item.is_deleted(),
            Block::GC(_) => true,
        }
    }

    pub fn as_item(&self) -> Option<&Item> {
        match self {
            Block::Item(item) => Some(item),
            Block::GC(_) => None,
        }
    }

    /// Checks whether all blocks this one depends on are already integrated. Returns the client
    /// owning the first missing dependency. Dependencies on own clock ranges are not reported
    /// here; the integration loop resolves those through the intra-replica gap check.
    pub(crate) fn missing(&self, store: &DocStore) -> Option<ClientID> {
        let item = self.as_item()?;
        if let Some(origin) = &item.origin {
            if origin.client != item.id.client && origin.clock >= store.get_state(&origin.client) {
                return Some(origin.client);
            }
        }
        if let Some(right_origin) = &item.right_origin {
            if right_origin.client != item.id.client
                && right_origin.clock >= store.get_state(&right_origin.client)
            {
                return Some(right_origin.client);
            }
        }
        if let Parent::Nested(parent_id) = &item.parent {
            if parent_id.client != item.id.client
                && parent_id.clock >= store.get_state(&parent_id.client)
            {
                return Some(parent_id.client);
            }
        }
        None
    }

    /// Splits the block at `offset`, returning its right part.
    pub(crate) fn splice(&mut self, offset: Clock) -> Block {
        match self {
            Block::Item(item) => Block::Item(item.splice(offset)),
            Block::GC(range) => {
                let right = BlockRange::new(
                    ID::new(range.id.client, range.id.clock + offset),
                    range.len - offset,
                );
                range.len = offset;
                Block::GC(right)
            }
        }
    }

    /// Serializes the block, skipping the first `offset` clock values (the prefix already known
    /// to the receiving peer).
    pub(crate) fn encode_with<E: Encoder>(&self, encoder: &mut E, offset: Clock) -> crate::Result<()> {
        match self {
            Block::GC(range) => {
                encoder.write_info(0)?;
                encoder.write_len(range.len - offset)
            }
            Block::Item(item) => {
                let origin = if offset > 0 {
                    Some(ID::new(item.id.client, item.id.clock + offset - 1))
                } else {
                    item.origin
                };
                let info = item.content.type_ref()
                    | origin.map_or(0, |_| HAS_ORIGIN)
                    | item.right_origin.map_or(0, |_| HAS_RIGHT_ORIGIN)
                    | item.parent_sub.as_ref().map_or(0, |_| HAS_PARENT_SUB);
                encoder.write_info(info)?;
                if let Some(origin) = &origin {
                    encoder.write_left_id(origin)?;
                }
                if let Some(right_origin) = &item.right_origin {
                    encoder.write_right_id(right_origin)?;
                }
                if origin.is_none() && item.right_origin.is_none() {
                    match &item.parent {
                        Parent::Root(name) => {
                            encoder.write_parent_info(true)?;
                            encoder.write_key(name)?;
                        }
                        Parent::Nested(id) => {
                            encoder.write_parent_info(false)?;
                            encoder.write_left_id(id)?;
                        }
                        Parent::Unset => return Err(crate::Error::MalformedBlock(item.id)),
                    }
                    if let Some(parent_sub) = &item.parent_sub {
                        encoder.write_key(parent_sub)?;
                    }
                }
                item.content.encode_with(encoder, offset)
            }
        }
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Block::GC(range) => write!(f, "gc({})", range),
            Block::Item(item) => {
                write!(f, "({}", item.id)?;
                if let Some(origin) = &item.origin {
                    write!(f, ", origin: {}", origin)?;
                }
                if let Some(right_origin) = &item.right_origin {
                    write!(f, ", right origin: {}", right_origin)?;
                }
                if let Some(parent_sub) = &item.parent_sub {
                    write!(f, ", key: {:?}", parent_sub)?;
                }
                write!(f, ": {})", item.content)
            }
        }
    }
}
