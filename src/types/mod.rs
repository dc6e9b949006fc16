use crate::block::ID;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::sync::Arc;
use twox_hash::XxHash64;

pub mod map;
pub mod text;

/// Kind of a shared collection, carried on the wire as the payload of node content.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    List = 0,
    Map = 1,
    Text = 2,
}

impl TryFrom<u8> for TypeRef {
    type Error = crate::Error;

    fn try_from(value: u8) -> crate::Result<Self> {
        match value {
            0 => Ok(TypeRef::List),
            1 => Ok(TypeRef::Map),
            2 => Ok(TypeRef::Text),
            other => Err(crate::Error::UnknownTypeRef(other)),
        }
    }
}

/// Identifier of a collection: either a user-named root type or a nested collection introduced
/// by a block with node content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum BranchID {
    Root(Arc<str>),
    Nested(ID),
}

/// Runtime state of a single collection: the head of its sequence chain and the most recent
/// entry per map key. Blocks are referenced by [ID], never by pointer.
#[derive(Debug, Default)]
pub(crate) struct Branch {
    /// Leftmost item of the sequence chain.
    pub start: Option<ID>,
    /// Rightmost (most recently integrated) entry item per key.
    pub map: HashMap<Arc<str>, ID, BuildHasherDefault<XxHash64>>,
    /// Collection kind, unknown until a local accessor or node content names it.
    pub type_ref: Option<TypeRef>,
}

impl Branch {
    pub fn new(type_ref: Option<TypeRef>) -> Self {
        Branch {
            start: None,
            map: HashMap::default(),
            type_ref,
        }
    }

    /// Collections are created implicitly by incoming blocks before any local accessor names
    /// their kind; the first caller that knows the kind fills it in.
    pub fn repair_type_ref(&mut self, type_ref: Option<TypeRef>) {
        if self.type_ref.is_none() {
            self.type_ref = type_ref;
        }
    }
}
