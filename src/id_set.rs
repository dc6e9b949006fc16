use crate::block::ID;
use crate::read::{Decode, Decoder, ReadExt};
use crate::write::{Encode, Encoder, WriteExt};
use crate::{ClientID, Clock};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::ops::Range;

/// Compact representation of a set of block identifiers, used as the delete set of an update:
/// per client, the clock ranges whose content has been marked deleted.
///
/// A set built incrementally within a transaction must be squashed before encoding; a decoded
/// set is already sorted and merged.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct IDSet(BTreeMap<ClientID, IDRange>);

impl IDSet {
    /// Returns the number of clients stored.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> Ranges<'_> {
        self.0.iter()
    }

    /// Check if current set contains given block `id`.
    pub fn contains(&self, id: &ID) -> bool {
        if let Some(ranges) = self.0.get(&id.client) {
            ranges.contains(id.clock)
        } else {
            false
        }
    }

    /// Checks if current set contains any data.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty() || self.0.values().all(|r| r.is_empty())
    }

    /// Compacts the internal range representation.
    pub fn squash(&mut self) {
        for ranges in self.0.values_mut() {
            ranges.squash();
        }
    }

    pub fn insert(&mut self, id: ID, len: Clock) {
        if len == 0 {
            return;
        }
        let range = id.clock..(id.clock + len);
        match self.0.entry(id.client) {
            Entry::Occupied(e) => {
                e.into_mut().push(range);
            }
            Entry::Vacant(e) => {
                e.insert(IDRange::Continuous(range));
            }
        }
    }

    /// Merges another ID set into a current one, combining their information about observed
    /// ranges and squashing them if necessary.
    pub fn merge(&mut self, other: Self) {
        for (client, range) in other.0 {
            match self.0.entry(client) {
                Entry::Occupied(e) => e.into_mut().merge(range),
                Entry::Vacant(e) => {
                    e.insert(range);
                }
            }
        }
        self.squash()
    }

    pub fn get(&self, client: &ClientID) -> Option<&IDRange> {
        self.0.get(client)
    }
}

impl Encode for IDSet {
    fn encode_with<E: Encoder>(&self, encoder: &mut E) -> crate::Result<()> {
        encoder.write_var(self.0.len() as u64)?;
        for (&client, ranges) in self.0.iter() {
            encoder.reset_ds_cur_val();
            encoder.write_var(client)?;
            ranges.encode_with(encoder)?;
        }
        Ok(())
    }
}

impl Decode for IDSet {
    fn decode_with<D: Decoder>(decoder: &mut D) -> crate::Result<Self> {
        let mut set = Self::default();
        let clients_len: u64 = decoder.read_var()?;
        for _ in 0..clients_len {
            decoder.reset_ds_cur_val();
            let client: ClientID = decoder.read_var()?;
            let range = IDRange::decode_with(decoder)?;
            set.0.insert(client, range);
        }
        Ok(set)
    }
}

pub(crate) type Ranges<'a> = std::collections::btree_map::Iter<'a, ClientID, IDRange>;

/// Clock space of a single client within an [IDSet]: either one continuous range or multiple
/// ranges with holes between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IDRange {
    Continuous(Range<Clock>),
    Fragmented(Vec<Range<Clock>>),
}

impl IDRange {
    /// Check if range is empty (doesn't cover any clock space).
    pub fn is_empty(&self) -> bool {
        match self {
            IDRange::Continuous(r) => r.start == r.end,
            IDRange::Fragmented(rs) => rs.is_empty(),
        }
    }

    /// Check if given clock exists within current range.
    pub fn contains(&self, clock: Clock) -> bool {
        match self {
            IDRange::Continuous(range) => range.contains(&clock),
            IDRange::Fragmented(ranges) => ranges.iter().any(|r| r.contains(&clock)),
        }
    }

    /// Iterate over ranges described by current [IDRange].
    pub fn iter(&self) -> IDRangeIter<'_> {
        let (range, inner) = match self {
            IDRange::Continuous(range) => (Some(range), None),
            IDRange::Fragmented(ranges) => (None, Some(ranges.iter())),
        };
        IDRangeIter { range, inner }
    }

    fn push(&mut self, range: Range<Clock>) {
        match self {
            IDRange::Continuous(r) => {
                if Self::disjoint(r, &range) {
                    let ranges = if r.start < range.start {
                        vec![r.clone(), range]
                    } else {
                        vec![range, r.clone()]
                    };
                    *self = IDRange::Fragmented(ranges);
                } else {
                    r.start = r.start.min(range.start);
                    r.end = r.end.max(range.end);
                }
            }
            IDRange::Fragmented(ranges) => {
                if let Some(last) = ranges.last_mut() {
                    if !Self::try_join(last, &range) {
                        ranges.push(range);
                    }
                } else {
                    *self = IDRange::Continuous(range);
                }
            }
        }
    }

    /// Compacts the fragmented case. Example: a fragmented space of [0,3), [3,5), [6,7) is
    /// compacted into [0,5), [6,7).
    fn squash(&mut self) {
        if let IDRange::Fragmented(ranges) = self {
            if ranges.is_empty() {
                return;
            }
            ranges.sort_by(|a, b| a.start.cmp(&b.start));
            let mut squashed: Vec<Range<Clock>> = Vec::with_capacity(ranges.len());
            for range in ranges.drain(..) {
                match squashed.last_mut() {
                    Some(last) if !Self::disjoint(last, &range) => {
                        last.end = last.end.max(range.end);
                    }
                    _ => squashed.push(range),
                }
            }
            if let [single] = squashed.as_slice() {
                *self = IDRange::Continuous(single.clone());
            } else {
                *self = IDRange::Fragmented(squashed);
            }
        }
    }

    fn is_squashed(&self) -> bool {
        match self {
            IDRange::Continuous(_) => true,
            IDRange::Fragmented(ranges) => {
                let mut i = ranges.iter();
                if let Some(r) = i.next() {
                    let mut prev_end = r.end;
                    for r in i {
                        if r.start < prev_end {
                            return false;
                        }
                        prev_end = r.end;
                    }
                }
                true
            }
        }
    }

    fn merge(&mut self, other: IDRange) {
        let raw = std::mem::replace(self, IDRange::Continuous(0..0));
        *self = match (raw, other) {
            (IDRange::Continuous(mut a), IDRange::Continuous(b)) => {
                if Self::disjoint(&a, &b) {
                    IDRange::Fragmented(vec![a, b])
                } else {
                    a.start = a.start.min(b.start);
                    a.end = a.end.max(b.end);
                    IDRange::Continuous(a)
                }
            }
            (IDRange::Fragmented(mut a), IDRange::Continuous(b)) => {
                a.push(b);
                IDRange::Fragmented(a)
            }
            (IDRange::Continuous(a), IDRange::Fragmented(mut b)) => {
                b.push(a);
                IDRange::Fragmented(b)
            }
            (IDRange::Fragmented(mut a), IDRange::Fragmented(mut b)) => {
                a.append(&mut b);
                IDRange::Fragmented(a)
            }
        };
    }

    fn encode_raw<E: Encoder>(&self, encoder: &mut E) -> crate::Result<()> {
        match self {
            IDRange::Continuous(range) => {
                encoder.write_var(1u64)?;
                range.encode_with(encoder)
            }
            IDRange::Fragmented(ranges) => {
                encoder.write_var(ranges.len() as u64)?;
                for range in ranges.iter() {
                    range.encode_with(encoder)?;
                }
                Ok(())
            }
        }
    }

    #[inline]
    fn try_join(a: &mut Range<Clock>, b: &Range<Clock>) -> bool {
        if Self::disjoint(a, b) {
            false
        } else {
            a.start = a.start.min(b.start);
            a.end = a.end.max(b.end);
            true
        }
    }

    #[inline]
    fn disjoint(a: &Range<Clock>, b: &Range<Clock>) -> bool {
        a.start > b.end || b.start > a.end
    }
}

impl Default for IDRange {
    fn default() -> Self {
        IDRange::Continuous(0..0)
    }
}

impl Encode for IDRange {
    fn encode_with<E: Encoder>(&self, encoder: &mut E) -> crate::Result<()> {
        if self.is_squashed() {
            self.encode_raw(encoder)
        } else {
            let mut clone = self.clone();
            clone.squash();
            clone.encode_raw(encoder)
        }
    }
}

impl Decode for IDRange {
    fn decode_with<D: Decoder>(decoder: &mut D) -> crate::Result<Self> {
        match decoder.read_var::<u64>()? {
            1 => {
                let range = Range::decode_with(decoder)?;
                Ok(IDRange::Continuous(range))
            }
            len => {
                let mut ranges = Vec::new();
                ranges.try_reserve(len as usize)?;
                for _ in 0..len {
                    ranges.push(Range::decode_with(decoder)?);
                }
                Ok(IDRange::Fragmented(ranges))
            }
        }
    }
}

pub struct IDRangeIter<'a> {
    inner: Option<std::slice::Iter<'a, Range<Clock>>>,
    range: Option<&'a Range<Clock>>,
}

impl<'a> Iterator for IDRangeIter<'a> {
    type Item = &'a Range<Clock>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(inner) = &mut self.inner {
            inner.next()
        } else {
            self.range.take()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::v1::{DecoderV1, EncoderV1};
    use crate::codec::v2::{DecoderV2, EncoderV2};

    fn id(client: u64, clock: Clock) -> ID {
        ID::new(client.into(), clock)
    }

    #[test]
    fn insert_and_contains() {
        let mut set = IDSet::default();
        set.insert(id(1, 0), 3);
        set.insert(id(1, 5), 2);
        set.insert(id(2, 1), 1);
        assert!(set.contains(&id(1, 0)));
        assert!(set.contains(&id(1, 2)));
        assert!(!set.contains(&id(1, 3)));
        assert!(set.contains(&id(1, 6)));
        assert!(set.contains(&id(2, 1)));
        assert!(!set.contains(&id(3, 0)));
    }

    #[test]
    fn squash_joins_adjacent_ranges() {
        let mut set = IDSet::default();
        set.insert(id(1, 0), 3);
        set.insert(id(1, 3), 2);
        set.insert(id(1, 6), 1);
        set.squash();
        let range = set.get(&1.into()).unwrap();
        assert_eq!(
            range,
            &IDRange::Fragmented(vec![0..5, 6..7])
        );
    }

    #[test]
    fn merge_overlapping() {
        let mut a = IDSet::default();
        a.insert(id(1, 0), 4);
        let mut b = IDSet::default();
        b.insert(id(1, 2), 4);
        b.insert(id(2, 0), 1);
        a.merge(b);
        assert_eq!(a.get(&1.into()).unwrap(), &IDRange::Continuous(0..6));
        assert!(a.contains(&id(2, 0)));
    }

    #[test]
    fn roundtrip_v1() {
        let mut set = IDSet::default();
        set.insert(id(42, 3), 2);
        set.insert(id(42, 10), 1);
        set.insert(id(7, 0), 5);
        set.squash();

        let mut encoder = EncoderV1::new();
        set.encode_with(&mut encoder).unwrap();
        let data = encoder.finalize();
        let decoded = IDSet::decode_with(&mut DecoderV1::from_slice(&data)).unwrap();
        assert_eq!(decoded, set);
    }

    #[test]
    fn roundtrip_v2() {
        let mut set = IDSet::default();
        set.insert(id(42, 3), 2);
        set.insert(id(42, 10), 1);
        set.insert(id(7, 0), 5);
        set.squash();

        let mut encoder = EncoderV2::new();
        set.encode_with(&mut encoder).unwrap();
        let data = encoder.finalize().unwrap();
        let decoded = IDSet::decode_with(&mut DecoderV2::from_slice(&data).unwrap()).unwrap();
        assert_eq!(decoded, set);
    }
}
