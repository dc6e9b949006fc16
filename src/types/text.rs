use crate::block::{Parent, ID};
use crate::content::Content;
use crate::transaction::TransactionMut;
use crate::types::BranchID;
use std::sync::Arc;

/// Handle to a root-level collaborative text sequence. Character runs are stored as string
/// content items; concurrent inserts at the same position are ordered by the conflict
/// resolution of the integration layer.
#[derive(Debug, Clone)]
pub struct TextRef {
    name: Arc<str>,
}

impl TextRef {
    pub(crate) fn new(name: Arc<str>) -> Self {
        TextRef { name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn branch_id(&self) -> BranchID {
        BranchID::Root(self.name.clone())
    }

    /// Number of visible characters.
    pub fn len(&self, txn: &TransactionMut) -> usize {
        let mut len = 0u64;
        let mut cur = txn.store.branch_start(&self.branch_id());
        while let Some(id) = cur {
            let Ok(view) = txn.store.item_view(&id) else {
                break;
            };
            if view.countable && !view.deleted {
                len += view.len;
            }
            cur = view.right;
        }
        len as usize
    }

    pub fn is_empty(&self, txn: &TransactionMut) -> bool {
        self.len(txn) == 0
    }

    /// Concatenates all visible character runs.
    pub fn get_string(&self, txn: &TransactionMut) -> String {
        let mut out = String::new();
        let mut cur = txn.store.branch_start(&self.branch_id());
        while let Some(id) = cur {
            let Some(item) = txn.store.get_item(&id) else {
                break;
            };
            if !item.is_deleted() {
                if let Content::String(chunk) = &item.content {
                    out.push_str(chunk);
                }
            }
            cur = item.right;
        }
        out
    }

    /// Inserts a chunk of text at given character index.
    pub fn insert(&self, txn: &mut TransactionMut, index: usize, chunk: &str) -> crate::Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let (origin, right_origin) = self.find_position(txn, index)?;
        txn.create_item(
            Parent::Root(self.name.clone()),
            None,
            origin,
            right_origin,
            Content::String(chunk.to_string()),
        )?;
        Ok(())
    }

    /// Appends a chunk of text at the end of the sequence.
    pub fn push(&self, txn: &mut TransactionMut, chunk: &str) -> crate::Result<()> {
        let len = self.len(txn);
        self.insert(txn, len, chunk)
    }

    /// Removes `len` visible characters starting at given character index.
    pub fn remove_range(
        &self,
        txn: &mut TransactionMut,
        index: usize,
        len: usize,
    ) -> crate::Result<()> {
        let mut remaining = index as u64;
        let mut right = txn.store.branch_start(&self.branch_id());

        // forward to the first removed character, splitting a block it lands inside of
        while remaining > 0 {
            let rid = right.ok_or(crate::Error::OutOfRange)?;
            let view = txn.store.item_view(&rid)?;
            if view.countable && !view.deleted {
                if remaining < view.len {
                    let mid = ID::new(rid.client, rid.clock + remaining);
                    txn.split_at(&mid)?;
                    right = Some(mid);
                    break;
                }
                remaining -= view.len;
            }
            right = view.right;
        }

        let mut to_remove = len as u64;
        while to_remove > 0 {
            let rid = right.ok_or(crate::Error::OutOfRange)?;
            let view = txn.store.item_view(&rid)?;
            if view.countable && !view.deleted {
                if to_remove < view.len {
                    txn.split_at(&ID::new(rid.client, rid.clock + to_remove))?;
                }
                let view = txn.store.item_view(&rid)?;
                txn.delete_item(&rid)?;
                to_remove -= view.len;
                right = view.right;
            } else {
                right = view.right;
            }
        }
        Ok(())
    }

    /// Finds the `(origin, right origin)` pair for an insert at given index. An index landing
    /// inside a block names a mid-block clock; integration splits the block on demand.
    fn find_position(
        &self,
        txn: &TransactionMut,
        index: usize,
    ) -> crate::Result<(Option<ID>, Option<ID>)> {
        let mut origin = None;
        let mut right = txn.store.branch_start(&self.branch_id());
        let mut remaining = index as u64;
        while remaining > 0 {
            let rid = right.ok_or(crate::Error::OutOfRange)?;
            let view = txn.store.item_view(&rid)?;
            if view.countable && !view.deleted {
                if remaining < view.len {
                    origin = Some(ID::new(rid.client, rid.clock + remaining - 1));
                    right = Some(ID::new(rid.client, rid.clock + remaining));
                    break;
                }
                remaining -= view.len;
            }
            origin = Some(view.last_id());
            right = view.right;
        }
        Ok((origin, right))
    }
}

#[cfg(test)]
mod test {
    use crate::test_util::sync;
    use crate::Doc;

    #[test]
    fn insert_and_read_back() {
        let doc = Doc::with_client_id(1u64);
        let text = doc.get_or_insert_text("name");
        let mut txn = doc.transact_mut();
        text.insert(&mut txn, 0, "hello").unwrap();
        text.insert(&mut txn, 5, "!").unwrap();
        text.insert(&mut txn, 2, "--").unwrap();
        assert_eq!(text.get_string(&txn), "he--llo!");
        assert_eq!(text.len(&txn), 8);
    }

    #[test]
    fn insert_past_end_is_rejected() {
        let doc = Doc::with_client_id(1u64);
        let text = doc.get_or_insert_text("name");
        let mut txn = doc.transact_mut();
        text.insert(&mut txn, 0, "ab").unwrap();
        assert!(text.insert(&mut txn, 3, "x").is_err());
    }

    #[test]
    fn remove_range_splits_blocks() {
        let doc = Doc::with_client_id(1u64);
        let text = doc.get_or_insert_text("name");
        let mut txn = doc.transact_mut();
        text.insert(&mut txn, 0, "hello world").unwrap();
        text.remove_range(&mut txn, 4, 3).unwrap();
        assert_eq!(text.get_string(&txn), "hellorld");
        assert_eq!(text.len(&txn), 8);

        // removal spanning multiple blocks, including already tombstoned ones
        text.remove_range(&mut txn, 2, 4).unwrap();
        assert_eq!(text.get_string(&txn), "held");
    }

    #[test]
    fn concurrent_inserts_converge() {
        let d1 = Doc::with_client_id(1u64);
        let d2 = Doc::with_client_id(2u64);
        let t1 = d1.get_or_insert_text("name");
        let t2 = d2.get_or_insert_text("name");

        t1.insert(&mut d1.transact_mut(), 0, "abc").unwrap();
        t2.insert(&mut d2.transact_mut(), 0, "xyz").unwrap();
        sync([&d1, &d2]);

        let txn1 = d1.transact_mut();
        assert_eq!(t1.get_string(&txn1), "abcxyz");
        drop(txn1);
        let txn2 = d2.transact_mut();
        assert_eq!(t2.get_string(&txn2), "abcxyz");
    }

    #[test]
    fn remote_removal_is_applied() {
        let d1 = Doc::with_client_id(1u64);
        let d2 = Doc::with_client_id(2u64);
        let t1 = d1.get_or_insert_text("name");
        let t2 = d2.get_or_insert_text("name");

        t1.insert(&mut d1.transact_mut(), 0, "hello world").unwrap();
        sync([&d1, &d2]);
        t2.remove_range(&mut d2.transact_mut(), 5, 6).unwrap();
        sync([&d1, &d2]);

        let txn1 = d1.transact_mut();
        assert_eq!(t1.get_string(&txn1), "hello");
        drop(txn1);
        let txn2 = d2.transact_mut();
        assert_eq!(t2.get_string(&txn2), "hello");
    }

    #[test]
    fn interleaved_edits_converge() {
        let d1 = Doc::with_client_id(1u64);
        let d2 = Doc::with_client_id(2u64);
        let t1 = d1.get_or_insert_text("name");
        let t2 = d2.get_or_insert_text("name");

        t1.insert(&mut d1.transact_mut(), 0, "base").unwrap();
        sync([&d1, &d2]);

        t1.insert(&mut d1.transact_mut(), 4, " one").unwrap();
        t2.insert(&mut d2.transact_mut(), 4, " two").unwrap();
        sync([&d1, &d2]);

        let txn1 = d1.transact_mut();
        let s1 = t1.get_string(&txn1);
        drop(txn1);
        let txn2 = d2.transact_mut();
        let s2 = t2.get_string(&txn2);
        assert_eq!(s1, s2);
        assert_eq!(s1, "base one two");
    }
}
