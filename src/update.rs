use crate::block::{Block, BlockRange, Item, Parent, ID};
use crate::block::{CARRIER_INFO, HAS_ORIGIN, HAS_PARENT_SUB, HAS_RIGHT_ORIGIN};
use crate::content::{Content, CONTENT_TYPE_GC, CONTENT_TYPE_SKIP};
use crate::id_set::IDSet;
use crate::integrate::integrate;
use crate::read::{Decode, Decoder, ReadExt};
use crate::state_vector::StateVector;
use crate::store::DocStore;
use crate::write::{Encode, Encoder, WriteExt};
use crate::{ClientID, Clock};
use std::collections::{BTreeMap, VecDeque};

/// A parsed update message: per-replica lists of blocks ordered by clock, followed by a delete
/// set. Decoding materializes the whole message before any of it touches a store, so a
/// malformed update is rejected wholesale.
#[derive(Default, Debug, Clone)]
pub struct Update {
    pub(crate) blocks: BTreeMap<ClientID, VecDeque<Block>>,
    pub(crate) delete_set: IDSet,
}

impl Update {
    pub fn new(blocks: BTreeMap<ClientID, VecDeque<Block>>, delete_set: IDSet) -> Self {
        Update { blocks, delete_set }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.delete_set.is_empty()
    }

    pub fn delete_set(&self) -> &IDSet {
        &self.delete_set
    }

    pub fn decode_v1(bytes: &[u8]) -> crate::Result<Self> {
        let mut decoder = crate::codec::v1::DecoderV1::from_slice(bytes);
        Self::decode_with(&mut decoder)
    }

    pub fn decode_v2(bytes: &[u8]) -> crate::Result<Self> {
        let mut decoder = crate::codec::v2::DecoderV2::from_slice(bytes)?;
        Self::decode_with(&mut decoder)
    }

    fn decode_blocks<D: Decoder>(
        decoder: &mut D,
    ) -> crate::Result<BTreeMap<ClientID, VecDeque<Block>>> {
        let clients_len: u64 = decoder.read_var()?;
        let mut clients: BTreeMap<ClientID, VecDeque<Block>> = BTreeMap::new();

        for _ in 0..clients_len {
            let blocks_len = decoder.read_var::<u64>()? as usize;

            let client = decoder.read_client()?;
            let mut clock: Clock = decoder.read_var()?;
            let blocks = clients.entry(client).or_default();
            blocks.try_reserve(blocks_len)?;

            for _ in 0..blocks_len {
                let info = decoder.read_info()?;
                match info & CARRIER_INFO {
                    CONTENT_TYPE_GC => {
                        let len = decoder.read_len()?;
                        blocks.push_back(Block::GC(BlockRange::new(
                            ID::new(client, clock),
                            len,
                        )));
                        clock = clock.checked_add(len).ok_or(crate::Error::OutOfRange)?;
                    }
                    CONTENT_TYPE_SKIP => {
                        // skip ranges only mark a gap in the producer's clock space; the gap
                        // check of the integration loop rediscovers it on this side
                        let len = decoder.read_len()?;
                        clock = clock.checked_add(len).ok_or(crate::Error::OutOfRange)?;
                    }
                    _ => {
                        let block = Self::decode_block(ID::new(client, clock), info, decoder)?;
                        if block.len() > 0 {
                            clock = clock
                                .checked_add(block.len())
                                .ok_or(crate::Error::OutOfRange)?;
                            blocks.push_back(Block::Item(block));
                        }
                    }
                }
            }
        }
        Ok(clients)
    }

    fn decode_block<D: Decoder>(id: ID, info: u8, decoder: &mut D) -> crate::Result<Item> {
        let origin = if info & HAS_ORIGIN != 0 {
            Some(decoder.read_left_id()?)
        } else {
            None
        };
        let right_origin = if info & HAS_RIGHT_ORIGIN != 0 {
            Some(decoder.read_right_id()?)
        } else {
            None
        };
        let cannot_copy_parent_info = info & (HAS_ORIGIN | HAS_RIGHT_ORIGIN) == 0;
        let mut parent = Parent::Unset;
        let mut parent_sub = None;
        if cannot_copy_parent_info {
            parent = if decoder.read_parent_info()? {
                Parent::Root(decoder.read_key()?)
            } else {
                Parent::Nested(decoder.read_left_id()?)
            };
            if info & HAS_PARENT_SUB != 0 {
                parent_sub = Some(decoder.read_key()?);
            }
        }
        let content = Content::decode_with(decoder, info)?;
        Ok(Item::new(id, origin, right_origin, parent, parent_sub, content))
    }
}

impl Decode for Update {
    fn decode_with<D: Decoder>(decoder: &mut D) -> crate::Result<Self> {
        // first pass: struct refs
        let blocks = Self::decode_blocks(decoder)?;
        // second pass: delete set
        let delete_set = IDSet::decode_with(decoder)?;
        Ok(Update { blocks, delete_set })
    }
}

impl Encode for Update {
    fn encode_with<E: Encoder>(&self, encoder: &mut E) -> crate::Result<()> {
        encoder.write_var(self.blocks.len() as u64)?;
        // higher client ids first, mirroring the order the producer emits
        for (&client, blocks) in self.blocks.iter().rev() {
            encoder.write_var(blocks.len() as u64)?;
            encoder.write_client(client)?;
            let clock = blocks.front().map(|b| b.clock_start()).unwrap_or(0);
            encoder.write_var(clock)?;
            for block in blocks.iter() {
                block.encode_with(encoder, 0)?;
            }
        }
        self.delete_set.encode_with(encoder)
    }
}

/// Picks the replicas and starting clocks whose blocks the remote peer is missing.
fn diff_state_vectors(local_sv: &StateVector, remote_sv: &StateVector) -> Vec<(ClientID, Clock)> {
    let mut diff = Vec::new();
    for (client, &local_clock) in local_sv.iter() {
        let remote_clock = remote_sv.get(client);
        if local_clock > remote_clock {
            diff.push((*client, remote_clock));
        }
    }
    diff
}

/// Serializes all blocks the remote peer is missing relative to its state vector, each replica
/// block starting at the first unseen clock (trimming the known prefix of a straddling block).
pub(crate) fn write_blocks_from<E: Encoder>(
    store: &DocStore,
    remote_sv: &StateVector,
    encoder: &mut E,
) -> crate::Result<()> {
    let local_sv = store.state_vector();
    let mut diff = diff_state_vectors(&local_sv, remote_sv);

    // Write items with higher client ids first.
    // This heavily improves the conflict resolution algorithm on the receiving side.
    diff.sort_by(|a, b| b.0.cmp(&a.0));

    encoder.write_var(diff.len() as u64)?;
    for (client, clock) in diff {
        let blocks = match store.clients().get(&client) {
            Some(blocks) => blocks,
            None => continue,
        };
        let start = DocStore::find_index_in(blocks, clock)?;
        // number of encoded structs
        encoder.write_var((blocks.len() - start) as u64)?;
        encoder.write_client(client)?;
        encoder.write_var(clock)?;
        let first = &blocks[start];
        // the first struct is trimmed by the prefix the peer already knows
        first.encode_with(encoder, clock - first.clock_start())?;
        for block in &blocks[start + 1..] {
            block.encode_with(encoder, 0)?;
        }
    }
    Ok(())
}

/// Serializes the difference between the local store and a remote state vector: missing blocks
/// followed by the delete set of the whole store.
pub(crate) fn encode_diff<E: Encoder>(
    store: &DocStore,
    remote_sv: &StateVector,
    encoder: &mut E,
) -> crate::Result<()> {
    write_blocks_from(store, remote_sv, encoder)?;
    store.delete_set().encode_with(encoder)
}

fn insert_sorted(refs: &mut VecDeque<Block>, block: Block) {
    let clock = block.clock_start();
    let at = refs
        .iter()
        .position(|b| b.clock_start() > clock)
        .unwrap_or(refs.len());
    refs.insert(at, block);
}

/// Drains the pending area, integrating every block whose causal dependencies are satisfied.
///
/// The loop drives an explicit work stack owned by the store. A block on top of the stack is
/// either integrated (dependencies present), swapped for an earlier pending block of the same
/// replica (intra-replica gap), put on hold behind a dependency block of another replica
/// (cross-replica miss), or - when no pending work can fill the gap - left on the stack for a
/// future call while this one returns.
pub(crate) fn integrate_pending(store: &mut DocStore, deleted: &mut IDSet) -> crate::Result<()> {
    // pending replicas in ascending order; drained from the back, so the highest client id goes
    // first - the counterpart of the producer's descending emission order
    let mut client_ids: Vec<ClientID> = store.pending.keys().copied().collect();

    loop {
        let cur = match store.pending_stack.pop() {
            Some(block) => block,
            None => {
                // refill from the highest pending replica
                let Some(&client) = client_ids.last() else {
                    return Ok(());
                };
                match store.pending.get_mut(&client).and_then(|refs| refs.pop_front()) {
                    Some(block) => block,
                    None => {
                        client_ids.pop();
                        continue;
                    }
                }
            }
        };

        let client = cur.id().client;
        let clock = cur.id().clock;
        let local = store.get_state(&client);

        if clock > local {
            // a predecessor from the same replica is missing; see if pending holds one
            match store.pending.get_mut(&client) {
                Some(refs)
                    if refs.front().map(|b| b.clock_start() < clock).unwrap_or(false) =>
                {
                    // swap the gapped block back into pending for the earlier one and retry
                    let earlier = refs.pop_front();
                    insert_sorted(refs, cur);
                    if let Some(earlier) = earlier {
                        store.pending_stack.push(earlier);
                    }
                    continue;
                }
                _ => {
                    // wait for more data; the stack resumes on the next call
                    store.pending_stack.push(cur);
                    return Ok(());
                }
            }
        }

        if let Some(missing) = cur.missing(store) {
            // a block of another replica has to go first
            let next = store
                .pending
                .get_mut(&missing)
                .and_then(|refs| refs.pop_front());
            store.pending_stack.push(cur);
            match next {
                Some(block) => {
                    store.pending_stack.push(block);
                    continue;
                }
                None => return Ok(()),
            }
        }

        let offset = local - clock;
        if offset < cur.len() {
            integrate(store, deleted, cur, offset)?;
        }
        // fully covered blocks are duplicates and are silently dropped
    }
}

/// Applies a delete set to the store, splitting block boundaries on demand. Ranges (or parts of
/// ranges) that point past the integrated state are handed back for deferral.
pub(crate) fn apply_delete_set(
    store: &mut DocStore,
    deleted: &mut IDSet,
    ds: IDSet,
) -> crate::Result<Option<IDSet>> {
    let mut unapplied = IDSet::default();
    for (client, ranges) in ds.iter() {
        let state = store.get_state(client);
        for range in ranges.iter() {
            if range.start < state {
                if range.end > state {
                    unapplied.insert(ID::new(*client, state), range.end - state);
                }
                store.delete_range(*client, range.start, range.end.min(state), deleted)?;
            } else {
                unapplied.insert(ID::new(*client, range.start), range.end - range.start);
            }
        }
    }
    if unapplied.is_empty() {
        Ok(None)
    } else {
        unapplied.squash();
        Ok(Some(unapplied))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::v1::{DecoderV1, EncoderV1};
    use crate::codec::Format;
    use crate::content::Content;
    use crate::doc::{Doc, Options};

    fn string_item(
        client: u64,
        clock: Clock,
        origin: Option<(u64, Clock)>,
        parent: Option<&str>,
        chunk: &str,
    ) -> Block {
        Block::Item(Item::new(
            ID::new(client.into(), clock),
            origin.map(|(c, k)| ID::new(c.into(), k)),
            None,
            match parent {
                Some(name) => Parent::Root(name.into()),
                None => Parent::Unset,
            },
            None,
            Content::String(chunk.to_string()),
        ))
    }

    fn update_of(blocks: Vec<Block>) -> Update {
        let mut per_client: BTreeMap<ClientID, VecDeque<Block>> = BTreeMap::new();
        for block in blocks {
            per_client
                .entry(block.id().client)
                .or_default()
                .push_back(block);
        }
        Update::new(per_client, IDSet::default())
    }

    fn encode_v1(update: &Update) -> bytes::Bytes {
        let mut encoder = EncoderV1::new();
        update.encode_with(&mut encoder).unwrap();
        encoder.finalize()
    }

    #[test]
    fn single_struct_update_round_trips() {
        let doc = Doc::with_client_id(1u64);
        let mut txn = doc.transact_mut();
        let bytes = encode_v1(&update_of(vec![string_item(7, 0, None, Some("text"), "a")]));
        txn.apply_update_bytes(&bytes).unwrap();
        assert_eq!(txn.state(&7.into()), 1);
        assert!(!txn.has_pending());
        // re-encoding the integrated state reproduces the update bit for bit
        let reencoded = txn.encode_state_as_update().unwrap();
        assert_eq!(reencoded, bytes);
    }

    #[test]
    fn gapped_update_is_buffered_until_filled() {
        let doc = Doc::with_client_id(1u64);
        let mut txn = doc.transact_mut();
        txn.apply_update(update_of(vec![string_item(7, 0, None, Some("text"), "ab")]))
            .unwrap();
        assert_eq!(txn.state(&7.into()), 2);

        // clocks 2..4 are missing, the structure parks in the pending area
        txn.apply_update(update_of(vec![string_item(7, 5, Some((7, 4)), None, "f")]))
            .unwrap();
        assert_eq!(txn.state(&7.into()), 2);
        assert!(txn.has_pending());

        // the missing range arrives and the parked structure follows it in
        txn.apply_update(update_of(vec![string_item(7, 2, Some((7, 1)), None, "cde")]))
            .unwrap();
        assert_eq!(txn.state(&7.into()), 6);
        assert!(!txn.has_pending());
        drop(txn);

        let text = doc.get_or_insert_text("text");
        let txn = doc.transact_mut();
        assert_eq!(text.get_string(&txn), "abcdef");
    }

    #[test]
    fn cross_replica_dependency_defers_integration() {
        let doc = Doc::with_client_id(9u64);
        let mut txn = doc.transact_mut();

        // depends on <1:0> which hasn't arrived yet
        txn.apply_update(update_of(vec![string_item(2, 0, Some((1, 0)), None, "y")]))
            .unwrap();
        assert_eq!(txn.state(&1.into()), 0);
        assert_eq!(txn.state(&2.into()), 0);
        assert!(txn.has_pending());

        txn.apply_update(update_of(vec![string_item(1, 0, None, Some("text"), "x")]))
            .unwrap();
        assert_eq!(txn.state(&1.into()), 1);
        assert_eq!(txn.state(&2.into()), 1);
        assert!(!txn.has_pending());
        drop(txn);

        let text = doc.get_or_insert_text("text");
        let txn = doc.transact_mut();
        assert_eq!(text.get_string(&txn), "xy");
    }

    #[test]
    fn delete_set_for_missing_structs_is_deferred() {
        let doc = Doc::with_client_id(9u64);
        let mut txn = doc.transact_mut();
        let mut ds = IDSet::default();
        ds.insert(ID::new(1.into(), 0), 1);
        txn.apply_update(Update::new(BTreeMap::new(), ds)).unwrap();
        assert!(txn.has_pending());
        assert_eq!(txn.state(&1.into()), 0);

        // once <1:0> integrates, the deferred delete set is replayed
        txn.apply_update(update_of(vec![string_item(1, 0, None, Some("text"), "x")]))
            .unwrap();
        assert!(!txn.has_pending());
        assert_eq!(txn.state(&1.into()), 1);
        assert!(txn.delete_set().contains(&ID::new(1.into(), 0)));
        drop(txn);

        let text = doc.get_or_insert_text("text");
        let txn = doc.transact_mut();
        assert_eq!(text.get_string(&txn), "");
    }

    #[test]
    fn producer_trims_prefix_known_to_peer() {
        let doc = Doc::with_client_id(7u64);
        let text = doc.get_or_insert_text("text");
        let mut txn = doc.transact_mut();
        text.insert(&mut txn, 0, "abc").unwrap();
        assert_eq!(txn.state(&7.into()), 3);

        let target = StateVector::from_iter([(7.into(), 1u64)]);
        let bytes = txn.encode_diff(&target).unwrap();
        let update = Update::decode_v1(&bytes).unwrap();
        let blocks = update.blocks.get(&7.into()).unwrap();
        assert_eq!(blocks.len(), 1);
        let Block::Item(item) = &blocks[0] else {
            unreachable!()
        };
        assert_eq!(item.id, ID::new(7.into(), 1));
        assert_eq!(item.origin, Some(ID::new(7.into(), 0)));
        assert_eq!(item.content, Content::String("bc".to_string()));
    }

    #[test]
    fn updates_commute() {
        let u1 = update_of(vec![string_item(1, 0, None, Some("text"), "a")]);
        let u2 = update_of(vec![string_item(2, 0, Some((1, 0)), None, "b")]);

        let left = Doc::with_client_id(8u64);
        let mut txn = left.transact_mut();
        txn.apply_update(u1.clone()).unwrap();
        txn.apply_update(u2.clone()).unwrap();
        let left_state = txn.encode_state_as_update().unwrap();
        drop(txn);

        let right = Doc::with_client_id(9u64);
        let mut txn = right.transact_mut();
        txn.apply_update(u2).unwrap();
        txn.apply_update(u1).unwrap();
        let right_state = txn.encode_state_as_update().unwrap();
        assert!(!txn.has_pending());
        assert_eq!(left_state, right_state);
    }

    #[test]
    fn split_delivery_matches_one_shot() {
        let prefix = update_of(vec![string_item(4, 0, None, Some("text"), "ab")]);
        let suffix = update_of(vec![string_item(4, 2, Some((4, 1)), None, "cd")]);
        let full = update_of(vec![
            string_item(4, 0, None, Some("text"), "ab"),
            string_item(4, 2, Some((4, 1)), None, "cd"),
        ]);

        let one_shot = Doc::with_client_id(8u64);
        let mut txn = one_shot.transact_mut();
        txn.apply_update(full).unwrap();
        let expected = txn.encode_state_as_update().unwrap();
        drop(txn);

        // worst case: the suffix is delivered first
        let split = Doc::with_client_id(9u64);
        let mut txn = split.transact_mut();
        txn.apply_update(suffix).unwrap();
        assert!(txn.has_pending());
        txn.apply_update(prefix).unwrap();
        assert!(!txn.has_pending());
        assert_eq!(txn.encode_state_as_update().unwrap(), expected);
    }

    #[test]
    fn applying_same_update_twice_is_noop() {
        let src = Doc::with_client_id(1u64);
        let text = src.get_or_insert_text("text");
        let mut txn = src.transact_mut();
        text.insert(&mut txn, 0, "hello world").unwrap();
        text.remove_range(&mut txn, 0, 6).unwrap();
        let bytes = txn.encode_state_as_update().unwrap();
        drop(txn);

        let dst = Doc::with_client_id(2u64);
        let mut txn = dst.transact_mut();
        txn.apply_update_bytes(&bytes).unwrap();
        let after_first = txn.encode_state_as_update().unwrap();
        txn.apply_update_bytes(&bytes).unwrap();
        let after_second = txn.encode_state_as_update().unwrap();
        assert_eq!(after_first, after_second);
        assert!(!txn.has_pending());
        drop(txn);

        let text = dst.get_or_insert_text("text");
        let txn = dst.transact_mut();
        assert_eq!(text.get_string(&txn), "world");
    }

    #[test]
    fn incremental_diff_round_trip() {
        let d1 = Doc::with_client_id(1u64);
        let d2 = Doc::with_client_id(2u64);
        let t1 = d1.get_or_insert_text("text");

        let mut txn = d1.transact_mut();
        t1.insert(&mut txn, 0, "state one").unwrap();
        let full = txn.encode_state_as_update().unwrap();
        drop(txn);
        d2.transact_mut().apply_update_bytes(&full).unwrap();

        let mut txn = d1.transact_mut();
        t1.insert(&mut txn, 5, " plus").unwrap();
        t1.remove_range(&mut txn, 0, 1).unwrap();
        drop(txn);

        let remote_sv = d2.transact_mut().state_vector();
        let diff = d1.transact_mut().encode_diff(&remote_sv).unwrap();
        d2.transact_mut().apply_update_bytes(&diff).unwrap();

        let t2 = d2.get_or_insert_text("text");
        let txn1 = d1.transact_mut();
        let txn2 = d2.transact_mut();
        assert_eq!(t2.get_string(&txn2), t1.get_string(&txn1));
        assert_eq!(txn1.state_vector(), txn2.state_vector());
    }

    #[test]
    fn state_is_monotonic_across_applies() {
        let doc = Doc::with_client_id(9u64);
        let mut txn = doc.transact_mut();
        let client = ClientID::from(7u64);

        txn.apply_update(update_of(vec![string_item(7, 0, None, Some("text"), "ab")]))
            .unwrap();
        let mut last = txn.state(&client);
        // duplicate, gapped and overlapping deliveries never rewind the state
        let deliveries = vec![
            update_of(vec![string_item(7, 0, None, Some("text"), "ab")]),
            update_of(vec![string_item(7, 9, Some((7, 8)), None, "z")]),
            update_of(vec![string_item(7, 2, Some((7, 1)), None, "cd")]),
        ];
        for update in deliveries {
            txn.apply_update(update).unwrap();
            let state = txn.state(&client);
            assert!(state >= last);
            last = state;
        }
        assert_eq!(last, 4);
    }

    #[test]
    fn pending_entries_are_compacted_after_integration() {
        let doc = Doc::with_client_id(9u64);
        let mut txn = doc.transact_mut();
        txn.apply_update(update_of(vec![
            string_item(7, 5, Some((7, 4)), None, "z"),
            string_item(3, 2, Some((3, 1)), None, "q"),
        ]))
        .unwrap();
        // every remaining pending entry holds only unconsumed refs
        assert!(txn.store.pending.values().all(|refs| !refs.is_empty()));
        assert!(txn.has_pending());
    }

    #[test]
    fn malformed_update_leaves_store_untouched() {
        let doc = Doc::with_client_id(1u64);
        let mut txn = doc.transact_mut();
        let good = encode_v1(&update_of(vec![string_item(7, 0, None, Some("text"), "a")]));
        txn.apply_update_bytes(&good).unwrap();
        let before = txn.encode_state_as_update().unwrap();

        let mut truncated = good.to_vec();
        truncated.truncate(truncated.len() - 3);
        assert!(txn.apply_update_bytes(&truncated).is_err());

        assert_eq!(txn.encode_state_as_update().unwrap(), before);
        assert!(!txn.has_pending());
    }

    #[test]
    fn v2_format_round_trips() {
        let d1 = Doc::with_options(Options {
            client_id: 1.into(),
            format: Format::V2,
            ..Options::default()
        });
        let text = d1.get_or_insert_text("text");
        let mut txn = d1.transact_mut();
        text.insert(&mut txn, 0, "hello").unwrap();
        text.insert(&mut txn, 5, " world").unwrap();
        text.remove_range(&mut txn, 0, 1).unwrap();
        let bytes = txn.encode_state_as_update().unwrap();
        drop(txn);

        let d2 = Doc::with_options(Options {
            client_id: 2.into(),
            format: Format::V2,
            ..Options::default()
        });
        let text = d2.get_or_insert_text("text");
        let mut txn = d2.transact_mut();
        txn.apply_update_bytes(&bytes).unwrap();
        assert_eq!(text.get_string(&txn), "ello world");
        assert_eq!(txn.encode_state_as_update().unwrap(), bytes);
    }

    #[test]
    fn v1_payload_is_rejected_by_v2_decoder() {
        let update = &[
            1, 3, 227, 214, 245, 198, 5, 0, 4, 1, 4, 116, 121, 112, 101, 1, 48, 68, 227, 214,
            245, 198, 5, 0, 1, 49, 68, 227, 214, 245, 198, 5, 1, 1, 50, 0,
        ];
        assert!(Update::decode_v2(update).is_err());
    }

    #[test]
    fn decode_basic_v1() {
        // a three-character text typed left to right by a single replica
        let update = &[
            1, 3, 227, 214, 245, 198, 5, 0, 4, 1, 4, 116, 121, 112, 101, 1, 48, 68, 227, 214,
            245, 198, 5, 0, 1, 49, 68, 227, 214, 245, 198, 5, 1, 1, 50, 0,
        ];
        let mut decoder = DecoderV1::from_slice(update);
        let update = Update::decode_with(&mut decoder).unwrap();
        const CLIENT: ClientID = ClientID::new(1490905955);

        let blocks = update.blocks.get(&CLIENT).unwrap();
        assert_eq!(blocks.len(), 3);

        let Block::Item(first) = &blocks[0] else {
            unreachable!()
        };
        assert_eq!(first.id, ID::new(CLIENT, 0));
        assert_eq!(first.origin, None);
        assert_eq!(first.right_origin, None);
        assert_eq!(first.parent, Parent::Root("type".into()));
        assert_eq!(first.content, Content::String("0".to_string()));

        let Block::Item(second) = &blocks[1] else {
            unreachable!()
        };
        assert_eq!(second.id, ID::new(CLIENT, 1));
        assert_eq!(second.right_origin, Some(ID::new(CLIENT, 0)));
        assert_eq!(second.content, Content::String("1".to_string()));

        let Block::Item(third) = &blocks[2] else {
            unreachable!()
        };
        assert_eq!(third.id, ID::new(CLIENT, 2));
        assert_eq!(third.right_origin, Some(ID::new(CLIENT, 1)));
        assert_eq!(third.content, Content::String("2".to_string()));

        assert!(update.delete_set.is_empty());
    }

    #[test]
    fn truncated_update_is_rejected() {
        let update = &[
            1, 3, 227, 214, 245, 198, 5, 0, 4, 1, 4, 116, 121, 112, 101, 1, 48, 68,
        ];
        let mut decoder = DecoderV1::from_slice(update);
        assert!(Update::decode_with(&mut decoder).is_err());
    }

    #[test]
    fn unknown_content_tag_is_rejected() {
        // single struct whose info byte names content kind 29
        let update = &[1, 1, 7, 0, 29, 1, 0, 0];
        let mut decoder = DecoderV1::from_slice(update);
        assert!(Update::decode_with(&mut decoder).is_err());
    }
}
