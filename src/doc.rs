use crate::codec::Format;
use crate::store::DocStore;
use crate::transaction::{Origin, TransactionMut};
use crate::types::map::MapRef;
use crate::types::text::TextRef;
use crate::types::{BranchID, TypeRef};
use crate::ClientID;
use std::cell::RefCell;
use uuid::Uuid;

/// Configuration of a [Doc] instance.
#[derive(Debug, Clone)]
pub struct Options {
    /// Identifier of this replica. Two documents exchanging updates must never share one.
    pub client_id: ClientID,
    /// Globally unique identifier of the document itself.
    pub guid: Uuid,
    /// Wire format used by encode/decode entry points that don't name a codec version.
    pub format: Format,
}

impl Options {
    pub fn with_client_id(client_id: ClientID) -> Self {
        Options {
            client_id,
            ..Options::default()
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            client_id: ClientID::new_random(),
            guid: Uuid::new_v4(),
            format: Format::default(),
        }
    }
}

/// A synchronized document: the single owner of a block store and its pending area. All access
/// goes through transactions; the document hands them out one at a time.
pub struct Doc {
    options: Options,
    store: RefCell<DocStore>,
}

impl Doc {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        let store = RefCell::new(DocStore::new(options.client_id));
        Doc { options, store }
    }

    pub fn with_client_id<C: Into<ClientID>>(client_id: C) -> Self {
        Self::with_options(Options::with_client_id(client_id.into()))
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn client_id(&self) -> ClientID {
        self.options.client_id
    }

    pub fn guid(&self) -> &Uuid {
        &self.options.guid
    }

    /// Opens a mutable transaction over this document.
    ///
    /// Panics if another transaction is still alive: a document must not be driven by two
    /// transactions at a time.
    pub fn transact_mut(&self) -> TransactionMut<'_> {
        TransactionMut::new(self.store.borrow_mut(), self.options.format, None)
    }

    /// Opens a mutable transaction tagged with an origin marker.
    pub fn transact_mut_with<O: Into<Origin>>(&self, origin: O) -> TransactionMut<'_> {
        TransactionMut::new(self.store.borrow_mut(), self.options.format, Some(origin.into()))
    }

    /// Returns a handle to a root-level text sequence, registering the root on first use.
    pub fn get_or_insert_text(&self, name: &str) -> TextRef {
        let name: std::sync::Arc<str> = name.into();
        self.store
            .borrow_mut()
            .get_or_create_branch(BranchID::Root(name.clone()), Some(TypeRef::Text));
        TextRef::new(name)
    }

    /// Returns a handle to a root-level map, registering the root on first use.
    pub fn get_or_insert_map(&self, name: &str) -> MapRef {
        let name: std::sync::Arc<str> = name.into();
        self.store
            .borrow_mut()
            .get_or_create_branch(BranchID::Root(name.clone()), Some(TypeRef::Map));
        MapRef::new(name)
    }
}

impl Default for Doc {
    fn default() -> Self {
        Doc::new()
    }
}

impl std::fmt::Debug for Doc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Doc")
            .field("client_id", &self.options.client_id)
            .field("guid", &self.options.guid)
            .finish()
    }
}
