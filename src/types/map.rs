use crate::any::Any;
use crate::block::Parent;
use crate::content::Content;
use crate::transaction::TransactionMut;
use crate::types::BranchID;
use std::sync::Arc;

/// Handle to a root-level collaborative map. Every key holds a chain of entry items; the
/// rightmost live item is the visible value, earlier ones are tombstoned on overwrite.
#[derive(Debug, Clone)]
pub struct MapRef {
    name: Arc<str>,
}

impl MapRef {
    pub(crate) fn new(name: Arc<str>) -> Self {
        MapRef { name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn branch_id(&self) -> BranchID {
        BranchID::Root(self.name.clone())
    }

    /// Sets `key` to `value`, superseding any previous entry.
    pub fn insert<V: Into<Any>>(
        &self,
        txn: &mut TransactionMut,
        key: &str,
        value: V,
    ) -> crate::Result<()> {
        let sub: Arc<str> = key.into();
        let left = txn.store.branch_map_get(&self.branch_id(), &sub);
        let origin = match left {
            Some(left) => Some(txn.store.item_view(&left)?.last_id()),
            None => None,
        };
        txn.create_item(
            Parent::Root(self.name.clone()),
            Some(sub),
            origin,
            None,
            Content::Atom(vec![value.into()]),
        )?;
        Ok(())
    }

    pub fn get(&self, txn: &TransactionMut, key: &str) -> Option<Any> {
        let entry = txn.store.branch_map_get(&self.branch_id(), key)?;
        let item = txn.store.get_item(&entry)?;
        if item.is_deleted() {
            None
        } else {
            item.content.get_last()
        }
    }

    pub fn contains_key(&self, txn: &TransactionMut, key: &str) -> bool {
        self.get(txn, key).is_some()
    }

    /// Removes an entry. Returns false if the key held no live value.
    pub fn remove(&self, txn: &mut TransactionMut, key: &str) -> crate::Result<bool> {
        let Some(entry) = txn.store.branch_map_get(&self.branch_id(), key) else {
            return Ok(false);
        };
        if txn.store.item_view(&entry)?.deleted {
            return Ok(false);
        }
        txn.delete_item(&entry)?;
        Ok(true)
    }

    /// Number of keys holding a live value.
    pub fn len(&self, txn: &TransactionMut) -> usize {
        let Some(entries) = txn.store.branch_map(&self.branch_id()) else {
            return 0;
        };
        entries
            .values()
            .filter(|id| {
                txn.store
                    .get_item(*id)
                    .map(|item| !item.is_deleted())
                    .unwrap_or(false)
            })
            .count()
    }

    pub fn is_empty(&self, txn: &TransactionMut) -> bool {
        self.len(txn) == 0
    }

    /// Keys holding a live value, in unspecified order.
    pub fn keys(&self, txn: &TransactionMut) -> Vec<Arc<str>> {
        let Some(entries) = txn.store.branch_map(&self.branch_id()) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|(_, id)| {
                txn.store
                    .get_item(*id)
                    .map(|item| !item.is_deleted())
                    .unwrap_or(false)
            })
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use crate::test_util::sync;
    use crate::{Any, Doc};

    #[test]
    fn insert_get_and_overwrite() {
        let doc = Doc::with_client_id(1u64);
        let map = doc.get_or_insert_map("root");
        let mut txn = doc.transact_mut();
        map.insert(&mut txn, "a", 1i64).unwrap();
        map.insert(&mut txn, "b", "value").unwrap();
        assert_eq!(map.get(&txn, "a"), Some(Any::Int(1)));
        assert_eq!(map.get(&txn, "b"), Some(Any::String("value".into())));
        assert_eq!(map.len(&txn), 2);

        map.insert(&mut txn, "a", 2i64).unwrap();
        assert_eq!(map.get(&txn, "a"), Some(Any::Int(2)));
        assert_eq!(map.len(&txn), 2);
    }

    #[test]
    fn remove_entry() {
        let doc = Doc::with_client_id(1u64);
        let map = doc.get_or_insert_map("root");
        let mut txn = doc.transact_mut();
        map.insert(&mut txn, "a", 1i64).unwrap();
        assert!(map.remove(&mut txn, "a").unwrap());
        assert!(!map.remove(&mut txn, "a").unwrap());
        assert_eq!(map.get(&txn, "a"), None);
        assert_eq!(map.len(&txn), 0);
        assert!(txn.delete_set().contains(&crate::ID::new(1.into(), 0)));
    }

    #[test]
    fn concurrent_overwrites_converge() {
        let d1 = Doc::with_client_id(1u64);
        let d2 = Doc::with_client_id(2u64);
        let m1 = d1.get_or_insert_map("root");
        let m2 = d2.get_or_insert_map("root");

        m1.insert(&mut d1.transact_mut(), "key", "from one").unwrap();
        m2.insert(&mut d2.transact_mut(), "key", "from two").unwrap();
        sync([&d1, &d2]);

        let txn1 = d1.transact_mut();
        let v1 = m1.get(&txn1, "key");
        drop(txn1);
        let txn2 = d2.transact_mut();
        let v2 = m2.get(&txn2, "key");
        assert_eq!(v1, v2);
        // ties between concurrent writers go to the same side everywhere
        assert_eq!(v1, Some(Any::String("from two".into())));
    }

    #[test]
    fn remote_updates_are_visible() {
        let d1 = Doc::with_client_id(1u64);
        let d2 = Doc::with_client_id(2u64);
        let m1 = d1.get_or_insert_map("root");
        let m2 = d2.get_or_insert_map("root");

        m1.insert(&mut d1.transact_mut(), "n", 42i64).unwrap();
        sync([&d1, &d2]);
        let txn2 = d2.transact_mut();
        assert_eq!(m2.get(&txn2, "n"), Some(Any::Int(42)));
        drop(txn2);

        assert!(m2.remove(&mut d2.transact_mut(), "n").unwrap());
        sync([&d1, &d2]);
        let txn1 = d1.transact_mut();
        assert_eq!(m1.get(&txn1, "n"), None);
        assert_eq!(m1.keys(&txn1), Vec::<std::sync::Arc<str>>::new());
    }
}
