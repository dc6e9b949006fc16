use crate::block::{Block, BlockRange, Item, Parent, ID};
use crate::content::Content;
use crate::id_set::IDSet;
use crate::store::DocStore;
use crate::types::BranchID;
use crate::Clock;
use std::collections::HashSet;
use std::hash::BuildHasherDefault;
use twox_hash::XxHash64;

type IDSetScratch = HashSet<ID, BuildHasherDefault<XxHash64>>;

/// Integrates a single block into the store. `offset` trims a prefix already covered by the
/// integrated state; callers guarantee `offset < block.len()` and that after trimming the block
/// starts exactly at the replica's current state.
pub(crate) fn integrate(
    store: &mut DocStore,
    deleted: &mut IDSet,
    block: Block,
    offset: Clock,
) -> crate::Result<()> {
    match block {
        Block::GC(mut range) => {
            if offset > 0 {
                range.id.clock += offset;
                range.len -= offset;
            }
            store.push_block(Block::GC(range));
            Ok(())
        }
        Block::Item(item) => integrate_item(store, deleted, item, offset),
    }
}

fn integrate_item(
    store: &mut DocStore,
    deleted: &mut IDSet,
    mut item: Item,
    offset: Clock,
) -> crate::Result<()> {
    if offset > 0 {
        // drop the prefix the store already covers; the item now hangs off its own trimmed tail
        item.id.clock += offset;
        item.origin = Some(ID::new(item.id.client, item.id.clock - 1));
        let right = item.content.splice(offset);
        item.content = right;
    }

    // materialize the neighbors named by the origins, splitting blocks where an origin points
    // into the middle of one
    let mut origin_collapsed = false;
    if let Some(origin) = item.origin {
        match store.get_item_clean_end(&origin)? {
            Some(left) => item.left = Some(left),
            None => origin_collapsed = true,
        }
    }
    if let Some(right_origin) = item.right_origin {
        match store.get_item_clean_start(&right_origin)? {
            Some(right) => item.right = Some(right),
            None => origin_collapsed = true,
        }
    }

    // an item inserted mid-sequence doesn't carry its parent; recover it from a neighbor
    if matches!(item.parent, Parent::Unset) {
        let neighbor = item.left.or(item.right);
        if let Some(neighbor_item) = neighbor.and_then(|id| store.get_item(&id)) {
            item.parent = neighbor_item.parent.clone();
            item.parent_sub = neighbor_item.parent_sub.clone();
        }
    }

    let parent = if origin_collapsed {
        None
    } else {
        match &item.parent {
            Parent::Root(name) => Some(BranchID::Root(name.clone())),
            Parent::Nested(parent_id) => match store.get_item(parent_id) {
                Some(parent_item) if matches!(parent_item.content, Content::Node(_)) => {
                    Some(BranchID::Nested(parent_item.id))
                }
                _ => None,
            },
            Parent::Unset => None,
        }
    };

    let Some(parent) = parent else {
        // the item's surroundings are gone; keep claiming its clock range as a tombstone
        store.push_block(Block::GC(BlockRange::new(item.id, item.len())));
        return Ok(());
    };
    store.get_or_create_branch(parent.clone(), None);

    let conflict = match (item.left, item.right) {
        (None, None) => true,
        (None, Some(right)) => store.item_view(&right)?.left.is_some(),
        (Some(left), _) => store.item_view(&left)?.right != item.right,
    };
    if conflict {
        resolve_conflict(store, &parent, &mut item)?;
    }

    link(store, &parent, &mut item, deleted)?;

    // a map entry that landed left of an existing one was already superseded; the same goes
    // for any item whose nested parent has been deleted in the meantime
    let parent_deleted = match &item.parent {
        Parent::Nested(parent_id) => store
            .get_item(parent_id)
            .map(|parent_item| parent_item.is_deleted())
            .unwrap_or(true),
        _ => false,
    };
    if parent_deleted || (item.parent_sub.is_some() && item.right.is_some()) {
        deleted.insert(item.id, item.len());
        item.mark_deleted();
    }

    match &item.content {
        Content::Deleted(_) => {
            deleted.insert(item.id, item.len());
            item.mark_deleted();
        }
        Content::Node(type_ref) => {
            let type_ref = *type_ref;
            store.get_or_create_branch(BranchID::Nested(item.id), Some(type_ref));
        }
        _ => {}
    }

    store.push_block(Block::Item(item));
    Ok(())
}

/// Scans the items between the item's origin position and its right origin, deciding which
/// concurrent insert it lands after. Ties between items sharing the same origin go to the lower
/// client id.
fn resolve_conflict(store: &DocStore, parent: &BranchID, item: &mut Item) -> crate::Result<()> {
    let mut left = item.left;
    let mut o = if let Some(left) = left {
        store.item_view(&left)?.right
    } else if let Some(sub) = &item.parent_sub {
        let mut o = store.branch_map_get(parent, sub);
        while let Some(oid) = o {
            let view = store.item_view(&oid)?;
            if view.left.is_some() {
                o = view.left;
            } else {
                break;
            }
        }
        o
    } else {
        store.branch_start(parent)
    };

    let mut conflicting_items = IDSetScratch::default();
    let mut items_before_origin = IDSetScratch::default();

    // Let c in conflicting_items, b in items_before_origin
    // ***{origin}bbbb{this}{c,b}{c,b}{o}***
    // Note that conflicting_items is a subset of items_before_origin
    while let Some(oid) = o {
        if item.right == Some(oid) {
            break;
        }
        items_before_origin.insert(oid);
        conflicting_items.insert(oid);
        let other = store.item_view(&oid)?;
        if other.origin == item.origin {
            // case 1: conflicting items share the left origin
            if oid.client < item.id.client {
                left = Some(oid);
                conflicting_items.clear();
            } else if other.right_origin == item.right_origin {
                // `item` and `other` point at the same integration spot; the id comparison
                // already placed `item` to the left of `other`
                break;
            }
        } else {
            let other_origin = other.origin.and_then(|id| store.block_head_id(&id));
            match other_origin {
                Some(head) if items_before_origin.contains(&head) => {
                    if !conflicting_items.contains(&head) {
                        left = Some(oid);
                        conflicting_items.clear();
                    }
                }
                _ => break,
            }
        }
        o = other.right;
    }
    item.left = left;
    Ok(())
}

/// Splices the item between its resolved neighbors and keeps the parent's bookkeeping (sequence
/// head, map entries) in sync.
fn link(
    store: &mut DocStore,
    parent: &BranchID,
    item: &mut Item,
    deleted: &mut IDSet,
) -> crate::Result<()> {
    if let Some(left) = item.left {
        item.right = store.item_view(&left)?.right;
        store.set_item_right(&left, Some(item.id))?;
    } else {
        let right = if let Some(sub) = &item.parent_sub {
            // head of this key's entry chain
            let mut r = store.branch_map_get(parent, sub);
            while let Some(rid) = r {
                let view = store.item_view(&rid)?;
                if view.left.is_some() {
                    r = view.left;
                } else {
                    break;
                }
            }
            r
        } else {
            let start = store.branch_start(parent);
            store.set_branch_start(parent, item.id);
            start
        };
        item.right = right;
    }

    if let Some(right) = item.right {
        store.set_item_left(&right, Some(item.id))?;
    } else if let Some(sub) = &item.parent_sub {
        // rightmost entry of its key: take over the entry slot, superseding the previous value
        store.branch_map_insert(parent, sub.clone(), item.id);
        if let Some(left) = item.left {
            store.delete_item(&left, deleted)?;
        }
    }
    Ok(())
}
