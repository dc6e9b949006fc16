use crate::block::{Block, Item, ID};
use crate::id_set::IDSet;
use crate::state_vector::StateVector;
use crate::types::{Branch, BranchID, TypeRef};
use crate::{ClientID, Clock};
use smallvec::SmallVec;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::BuildHasherDefault;
use std::sync::Arc;
use twox_hash::XxHash64;

pub(crate) type XxHashMap<K, V> = HashMap<K, V, BuildHasherDefault<XxHash64>>;

/// Small copy of an [Item]'s wiring fields, used by walk-heavy code (integration, position
/// lookups) to avoid holding borrows into the block lists.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ItemView {
    pub id: ID,
    pub len: Clock,
    pub left: Option<ID>,
    pub right: Option<ID>,
    pub origin: Option<ID>,
    pub right_origin: Option<ID>,
    pub deleted: bool,
    pub countable: bool,
}

impl ItemView {
    pub fn last_id(&self) -> ID {
        ID::new(self.id.client, self.id.clock + self.len - 1)
    }
}

/// In-memory document store: per-replica block lists ordered by clock, the collection registry,
/// and the pending area holding work that can't be integrated yet.
pub(crate) struct DocStore {
    pub client_id: ClientID,

    /// All integrated blocks, per producing replica, ordered by clock and gap-free.
    blocks: BTreeMap<ClientID, Vec<Block>>,

    /// All known collections, rooted and nested.
    branches: XxHashMap<BranchID, Branch>,

    /// Parsed but not yet integrated blocks, per source replica, ordered by clock. The consumed
    /// prefix is dropped eagerly to keep pending memory bounded.
    pub pending: BTreeMap<ClientID, VecDeque<Block>>,

    /// Integration work stack. Persisted across update applications so that a blocked
    /// integration resumes exactly where it paused.
    pub pending_stack: Vec<Block>,

    /// Delete sets whose target blocks were not integrated at the time they arrived.
    pub pending_ds: SmallVec<[IDSet; 2]>,
}

impl DocStore {
    pub fn new(client_id: ClientID) -> Self {
        DocStore {
            client_id,
            blocks: BTreeMap::new(),
            branches: HashMap::default(),
            pending: BTreeMap::new(),
            pending_stack: Vec::new(),
            pending_ds: SmallVec::new(),
        }
    }

    /// Next clock value expected from a given replica. Everything below it is integrated.
    pub fn get_state(&self, client: &ClientID) -> Clock {
        match self.blocks.get(client).and_then(|blocks| blocks.last()) {
            Some(last) => last.clock_end(),
            None => 0,
        }
    }

    pub fn state_vector(&self) -> StateVector {
        let mut sv = StateVector::default();
        for (client, blocks) in self.blocks.iter() {
            if let Some(last) = blocks.last() {
                sv.set_max(*client, last.clock_end());
            }
        }
        sv
    }

    pub fn clients(&self) -> &BTreeMap<ClientID, Vec<Block>> {
        &self.blocks
    }

    /// Binary search for the index of the block containing given clock value.
    pub fn find_index_in(blocks: &[Block], clock: Clock) -> crate::Result<usize> {
        let mut left = 0;
        let mut right = blocks.len().checked_sub(1).ok_or(crate::Error::NotFound)?;
        while left <= right {
            let mid = (left + right) / 2;
            let block = &blocks[mid];
            if clock < block.clock_start() {
                right = mid.checked_sub(1).ok_or(crate::Error::NotFound)?;
            } else if clock >= block.clock_end() {
                left = mid + 1;
                if left > right {
                    return Err(crate::Error::NotFound);
                }
            } else {
                return Ok(mid);
            }
        }
        Err(crate::Error::NotFound)
    }

    /// Returns the block containing the given clock value.
    pub fn get_block(&self, id: &ID) -> Option<&Block> {
        let blocks = self.blocks.get(&id.client)?;
        let i = Self::find_index_in(blocks, id.clock).ok()?;
        Some(&blocks[i])
    }

    /// Returns the item containing the given clock value, if it is live (not a tombstone).
    pub fn get_item(&self, id: &ID) -> Option<&Item> {
        self.get_block(id)?.as_item()
    }

    fn get_item_mut(&mut self, id: &ID) -> Option<&mut Item> {
        let blocks = self.blocks.get_mut(&id.client)?;
        let i = Self::find_index_in(blocks, id.clock).ok()?;
        match &mut blocks[i] {
            Block::Item(item) => Some(item),
            Block::GC(_) => None,
        }
    }

    /// Head identifier of the block containing the given clock value.
    pub fn block_head_id(&self, id: &ID) -> Option<ID> {
        Some(*self.get_block(id)?.id())
    }

    pub fn item_view(&self, id: &ID) -> crate::Result<ItemView> {
        let item = self.get_item(id).ok_or(crate::Error::BlockNotFound(*id))?;
        Ok(ItemView {
            id: item.id,
            len: item.len(),
            left: item.left,
            right: item.right,
            origin: item.origin,
            right_origin: item.right_origin,
            deleted: item.is_deleted(),
            countable: item.is_countable(),
        })
    }

    pub fn set_item_left(&mut self, id: &ID, left: Option<ID>) -> crate::Result<()> {
        let item = self
            .get_item_mut(id)
            .ok_or(crate::Error::BlockNotFound(*id))?;
        item.left = left;
        Ok(())
    }

    pub fn set_item_right(&mut self, id: &ID, right: Option<ID>) -> crate::Result<()> {
        let item = self
            .get_item_mut(id)
            .ok_or(crate::Error::BlockNotFound(*id))?;
        item.right = right;
        Ok(())
    }

    /// Appends a freshly integrated block. The integration loop guarantees blocks arrive in
    /// clock order with no gaps.
    pub fn push_block(&mut self, block: Block) {
        let blocks = self.blocks.entry(block.id().client).or_default();
        debug_assert_eq!(
            blocks.last().map(|b| b.clock_end()).unwrap_or(0),
            block.clock_start()
        );
        blocks.push(block);
    }

    /// Makes sure a block boundary exists at `id.clock`, splitting the covering block if it
    /// starts earlier. No-op when the boundary is already there or the clock is past the end of
    /// the replica's range.
    pub fn split_at(&mut self, id: &ID) -> crate::Result<()> {
        if id.clock >= self.get_state(&id.client) {
            return Ok(());
        }
        let old_right = {
            let blocks = self
                .blocks
                .get_mut(&id.client)
                .ok_or(crate::Error::BlockNotFound(*id))?;
            let i = Self::find_index_in(blocks, id.clock)?;
            let start = blocks[i].clock_start();
            if start == id.clock {
                return Ok(());
            }
            let right = blocks[i].splice(id.clock - start);
            let old_right = right.as_item().and_then(|item| item.right);
            blocks.insert(i + 1, right);
            old_right
        };
        // the split-off part took over as the left neighbor of the block that used to follow
        if let Some(next) = old_right {
            if let Some(item) = self.get_item_mut(&next) {
                item.left = Some(*id);
            }
        }
        Ok(())
    }

    /// Makes sure `id` is the last clock value of some block and returns that block's head
    /// identifier, or `None` when the clock landed in a tombstone.
    pub fn get_item_clean_end(&mut self, id: &ID) -> crate::Result<Option<ID>> {
        self.split_at(&ID::new(id.client, id.clock + 1))?;
        let block = self
            .get_block(id)
            .ok_or(crate::Error::BlockNotFound(*id))?;
        Ok(match block {
            Block::Item(item) => Some(item.id),
            Block::GC(_) => None,
        })
    }

    /// Makes sure `id` is the first clock value of some block and returns its head identifier,
    /// or `None` when the clock landed in a tombstone.
    pub fn get_item_clean_start(&mut self, id: &ID) -> crate::Result<Option<ID>> {
        self.split_at(id)?;
        let block = self
            .get_block(id)
            .ok_or(crate::Error::BlockNotFound(*id))?;
        Ok(match block {
            Block::Item(item) => Some(item.id),
            Block::GC(_) => None,
        })
    }

    /// Marks a whole item as deleted, recording the deletion in `deleted`.
    pub fn delete_item(&mut self, id: &ID, deleted: &mut IDSet) -> crate::Result<()> {
        let item = self
            .get_item_mut(id)
            .ok_or(crate::Error::BlockNotFound(*id))?;
        if !item.is_deleted() {
            item.mark_deleted();
            deleted.insert(item.id, item.len());
        }
        Ok(())
    }

    /// Marks all items covering `[start, end)` of a given replica as deleted. Boundaries are
    /// split on demand; tombstones within the range are left alone. `end` must not exceed the
    /// replica's integrated state.
    pub fn delete_range(
        &mut self,
        client: ClientID,
        start: Clock,
        end: Clock,
        deleted: &mut IDSet,
    ) -> crate::Result<()> {
        if start >= end {
            return Ok(());
        }
        self.split_at(&ID::new(client, start))?;
        self.split_at(&ID::new(client, end))?;
        let blocks = self
            .blocks
            .get_mut(&client)
            .ok_or(crate::Error::BlockNotFound(ID::new(client, start)))?;
        let mut i = Self::find_index_in(blocks, start)?;
        while i < blocks.len() && blocks[i].clock_start() < end {
            if let Block::Item(item) = &mut blocks[i] {
                if !item.is_deleted() {
                    item.mark_deleted();
                    deleted.insert(item.id, item.len());
                }
            }
            i += 1;
        }
        Ok(())
    }

    /// Derives the delete set of the whole store: every tombstone plus every deleted item.
    pub fn delete_set(&self) -> IDSet {
        let mut ds = IDSet::default();
        for blocks in self.blocks.values() {
            for block in blocks.iter() {
                if block.is_deleted() {
                    ds.insert(*block.id(), block.len());
                }
            }
        }
        ds.squash();
        ds
    }

    pub fn branch(&self, id: &BranchID) -> Option<&Branch> {
        self.branches.get(id)
    }

    pub fn get_or_create_branch(&mut self, id: BranchID, type_ref: Option<TypeRef>) {
        match self.branches.entry(id) {
            Entry::Occupied(e) => e.into_mut().repair_type_ref(type_ref),
            Entry::Vacant(e) => {
                e.insert(Branch::new(type_ref));
            }
        }
    }

    pub fn branch_start(&self, id: &BranchID) -> Option<ID> {
        self.branches.get(id)?.start
    }

    pub fn set_branch_start(&mut self, id: &BranchID, start: ID) {
        if let Some(branch) = self.branches.get_mut(id) {
            branch.start = Some(start);
        }
    }

    pub fn branch_map(&self, id: &BranchID) -> Option<&XxHashMap<Arc<str>, ID>> {
        Some(&self.branches.get(id)?.map)
    }

    pub fn branch_map_get(&self, id: &BranchID, key: &str) -> Option<ID> {
        self.branches.get(id)?.map.get(key).copied()
    }

    pub fn branch_map_insert(&mut self, id: &BranchID, key: Arc<str>, entry: ID) {
        if let Some(branch) = self.branches.get_mut(id) {
            branch.map.insert(key, entry);
        }
    }

    /// Merges freshly parsed per-replica block lists into the pending area. Lists are combined
    /// with whatever unconsumed work is already buffered and kept sorted by clock.
    pub fn merge_pending(&mut self, parsed: BTreeMap<ClientID, VecDeque<Block>>) {
        for (client, refs) in parsed {
            match self.pending.entry(client) {
                std::collections::btree_map::Entry::Vacant(e) => {
                    e.insert(refs);
                }
                std::collections::btree_map::Entry::Occupied(e) => {
                    let existing = e.into_mut();
                    existing.extend(refs);
                    existing
                        .make_contiguous()
                        .sort_by(|a, b| a.clock_start().cmp(&b.clock_start()));
                }
            }
        }
    }

    /// Drops exhausted pending entries. The consumed prefix of each entry is discarded as it is
    /// taken, so the only cleanup left is removing empty lists.
    pub fn cleanup_pending(&mut self) {
        self.pending.retain(|_, refs| !refs.is_empty());
    }
}
