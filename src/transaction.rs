use crate::block::{Block, Item, Parent, ID};
use crate::codec::v1::{DecoderV1, EncoderV1};
use crate::codec::v2::{DecoderV2, EncoderV2};
use crate::codec::Format;
use crate::content::Content;
use crate::id_set::IDSet;
use crate::integrate::integrate;
use crate::read::Decode;
use crate::state_vector::StateVector;
use crate::store::DocStore;
use crate::update::{self, Update};
use crate::write::Encode;
use crate::Clock;
use bytes::Bytes;
use std::cell::RefMut;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// A mutable transaction scope over a document. All mutation of the store - local edits, update
/// application, delete set replay - happens inside one. A single document must never be driven
/// by two concurrent transactions; [crate::Doc] enforces this by handing out transactions
/// behind a runtime borrow.
pub struct TransactionMut<'doc> {
    pub(crate) store: RefMut<'doc, DocStore>,
    format: Format,
    origin: Option<Origin>,
    /// Deletions performed within this transaction, squashed on commit.
    pub(crate) delete_set: IDSet,
}

impl<'doc> TransactionMut<'doc> {
    pub(crate) fn new(
        store: RefMut<'doc, DocStore>,
        format: Format,
        origin: Option<Origin>,
    ) -> Self {
        TransactionMut {
            store,
            format,
            origin,
            delete_set: IDSet::default(),
        }
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    pub fn state_vector(&self) -> StateVector {
        self.store.state_vector()
    }

    /// Next clock value expected from a given replica.
    pub fn state(&self, client: &crate::ClientID) -> Clock {
        self.store.get_state(client)
    }

    /// Deletions performed so far within this transaction.
    pub fn delete_set(&self) -> &IDSet {
        &self.delete_set
    }

    /// Serializes the state vector of this document using the configured wire format.
    pub fn encode_state_vector(&self) -> crate::Result<Bytes> {
        let sv = self.state_vector();
        match self.format {
            Format::V1 => {
                let mut encoder = EncoderV1::new();
                sv.encode_with(&mut encoder)?;
                Ok(encoder.finalize())
            }
            Format::V2 => {
                let mut encoder = EncoderV2::new();
                sv.encode_with(&mut encoder)?;
                encoder.finalize()
            }
        }
    }

    pub fn decode_state_vector(&self, bytes: &[u8]) -> crate::Result<StateVector> {
        match self.format {
            Format::V1 => StateVector::decode_with(&mut DecoderV1::from_slice(bytes)),
            Format::V2 => StateVector::decode_with(&mut DecoderV2::from_slice(bytes)?),
        }
    }

    /// Serializes every block the remote peer is missing relative to its state vector,
    /// followed by the delete set of the whole store. An empty state vector produces the full
    /// document state.
    pub fn encode_diff(&self, remote_sv: &StateVector) -> crate::Result<Bytes> {
        match self.format {
            Format::V1 => self.encode_diff_v1(remote_sv),
            Format::V2 => self.encode_diff_v2(remote_sv),
        }
    }

    pub fn encode_diff_v1(&self, remote_sv: &StateVector) -> crate::Result<Bytes> {
        let mut encoder = EncoderV1::new();
        update::encode_diff(&self.store, remote_sv, &mut encoder)?;
        Ok(encoder.finalize())
    }

    pub fn encode_diff_v2(&self, remote_sv: &StateVector) -> crate::Result<Bytes> {
        let mut encoder = EncoderV2::new();
        update::encode_diff(&self.store, remote_sv, &mut encoder)?;
        encoder.finalize()
    }

    /// Serializes the whole document state as a single update.
    pub fn encode_state_as_update(&self) -> crate::Result<Bytes> {
        self.encode_diff(&StateVector::default())
    }

    /// Parses and applies an update encoded in the configured wire format.
    pub fn apply_update_bytes(&mut self, bytes: &[u8]) -> crate::Result<()> {
        let update = match self.format {
            Format::V1 => Update::decode_v1(bytes)?,
            Format::V2 => Update::decode_v2(bytes)?,
        };
        self.apply_update(update)
    }

    /// Applies a parsed update: merges its blocks into the pending area, drains the integration
    /// loop until it blocks on missing causal dependencies, then applies the delete set - with
    /// one replay round for delete sets deferred by earlier calls.
    ///
    /// Updates are idempotent and commutative; blocks whose dependencies have not arrived yet
    /// are buffered and picked up by a later call.
    pub fn apply_update(&mut self, update: Update) -> crate::Result<()> {
        let Update { blocks, delete_set } = update;
        self.store.merge_pending(blocks);
        update::integrate_pending(&mut self.store, &mut self.delete_set)?;
        self.store.cleanup_pending();

        let deferred = std::mem::take(&mut self.store.pending_ds);
        if let Some(rest) = update::apply_delete_set(&mut self.store, &mut self.delete_set, delete_set)? {
            self.store.pending_ds.push(rest);
        }
        for ds in deferred {
            if let Some(rest) = update::apply_delete_set(&mut self.store, &mut self.delete_set, ds)? {
                self.store.pending_ds.push(rest);
            }
        }
        Ok(())
    }

    /// True when buffered work is waiting for missing updates.
    pub fn has_pending(&self) -> bool {
        !self.store.pending.is_empty()
            || !self.store.pending_stack.is_empty()
            || !self.store.pending_ds.is_empty()
    }

    /// Creates and immediately integrates a locally produced item.
    pub(crate) fn create_item(
        &mut self,
        parent: Parent,
        parent_sub: Option<Arc<str>>,
        origin: Option<ID>,
        right_origin: Option<ID>,
        content: Content,
    ) -> crate::Result<ID> {
        let client = self.store.client_id;
        let clock = self.store.get_state(&client);
        let id = ID::new(client, clock);
        let item = Item::new(id, origin, right_origin, parent, parent_sub, content);
        integrate(&mut self.store, &mut self.delete_set, Block::Item(item), 0)?;
        Ok(id)
    }

    pub(crate) fn split_at(&mut self, id: &ID) -> crate::Result<()> {
        self.store.split_at(id)
    }

    pub(crate) fn delete_item(&mut self, id: &ID) -> crate::Result<()> {
        let mut deleted = std::mem::take(&mut self.delete_set);
        let res = self.store.delete_item(id, &mut deleted);
        self.delete_set = deleted;
        res
    }

    /// Squashes the accumulated delete set. Dropping the transaction has the same effect.
    pub fn commit(&mut self) {
        self.delete_set.squash();
    }
}

impl Drop for TransactionMut<'_> {
    fn drop(&mut self) {
        self.commit();
    }
}

/// Opaque marker of an update source, attached to a transaction by its creator. Carried around
/// so that synchronization layers can tell their own transactions apart from remote ones.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin(Box<[u8]>);

impl Origin {
    pub fn new(data: &[u8]) -> Self {
        Self(data.into())
    }
}

impl AsRef<[u8]> for Origin {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<'a, T> From<&'a T> for Origin
where
    T: AsRef<[u8]>,
{
    fn from(value: &'a T) -> Self {
        Origin(value.as_ref().into())
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match std::str::from_utf8(&self.0) {
            // for strings try to print them as utf8
            Ok(s) => write!(f, "{}", s),
            _ => {
                // for non-strings print as hex
                for byte in &self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}
