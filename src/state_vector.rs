use crate::read::{Decode, Decoder, ReadExt};
use crate::write::{Encode, Encoder, WriteExt};
use crate::{ClientID, Clock, ID};
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::iter::FromIterator;

/// State vector is a compact representation of all known blocks inserted and integrated into
/// a given document. This descriptor can be serialized and used to determine a difference between
/// seen and unseen inserts of two replicas of the same document, potentially existing in different
/// processes.
///
/// Another popular name for the concept represented by state vector is
/// [Version Vector](https://en.wikipedia.org/wiki/Version_vector).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct StateVector(BTreeMap<ClientID, Clock>);

impl StateVector {
    /// Checks if current state vector contains any data.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a number of unique clients observed by a document, current state vector
    /// corresponds to.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn new(map: BTreeMap<ClientID, Clock>) -> Self {
        StateVector(map)
    }

    /// Checks if current state vector includes given block identifier. Blocks, which identifiers
    /// can be found in a state vector don't need to be encoded as part of an update, because they
    /// were already observed by their remote peer, current state vector refers to.
    pub fn contains(&self, id: &ID) -> bool {
        id.clock < self.get(&id.client)
    }

    pub fn contains_client(&self, client: &ClientID) -> bool {
        self.0.contains_key(client)
    }

    /// Get the latest clock sequence number value for a given `client` as observed from
    /// the perspective of a current state vector.
    pub fn get(&self, client: &ClientID) -> Clock {
        match self.0.get(client) {
            Some(state) => *state,
            None => 0,
        }
    }

    /// Updates a state vector observed clock sequence number for a given `client` by incrementing
    /// it by a given `delta`.
    pub fn inc_by(&mut self, client: ClientID, delta: Clock) -> Clock {
        let e = self.0.entry(client).or_default();
        *e += delta;
        *e
    }

    /// Updates a state vector observed clock sequence number for a given `client` by setting it
    /// to a minimum value between an already present one and the provided `clock`. In case if
    /// state vector didn't contain any value for that `client`, a `clock` value will be used.
    pub fn set_min(&mut self, client: ClientID, clock: Clock) {
        match self.0.entry(client) {
            Entry::Occupied(e) => {
                let value = e.into_mut();
                *value = (*value).min(clock);
            }
            Entry::Vacant(e) => {
                e.insert(clock);
            }
        }
    }

    /// Updates a state vector observed clock sequence number for a given `client` by setting it
    /// to a maximum value between an already present one and the provided `clock`. In case if
    /// state vector didn't contain any value for that `client`, a `clock` value will be used.
    pub fn set_max(&mut self, client: ClientID, clock: Clock) {
        let e = self.0.entry(client).or_default();
        *e = (*e).max(clock);
    }

    /// Returns an iterator which enables to traverse over all clients and their known clock
    /// values described by a current state vector.
    pub fn iter(&self) -> std::collections::btree_map::Iter<'_, ClientID, Clock> {
        self.0.iter()
    }

    /// Merges another state vector into a current one. Since vector's clock values can only be
    /// incremented, whenever a conflict between two states happen (both state vectors have
    /// different clock values for the same client entry), a highest of these two is considered
    /// to be the most up-to-date.
    pub fn merge(&mut self, other: Self) {
        for (client, clock) in other.0 {
            let e = self.0.entry(client).or_default();
            *e = (*e).max(clock);
        }
    }
}

impl FromIterator<(ClientID, Clock)> for StateVector {
    fn from_iter<T: IntoIterator<Item = (ClientID, Clock)>>(iter: T) -> Self {
        StateVector::new(BTreeMap::from_iter(iter))
    }
}

impl Decode for StateVector {
    fn decode_with<D: Decoder>(decoder: &mut D) -> crate::Result<Self> {
        let len: u64 = decoder.read_var()?;
        let mut sv = BTreeMap::new();
        for _ in 0..len {
            let client = decoder.read_var()?;
            let clock = decoder.read_var()?;
            sv.insert(client, clock);
        }
        Ok(StateVector(sv))
    }
}

impl Encode for StateVector {
    fn encode_with<E: Encoder>(&self, encoder: &mut E) -> crate::Result<()> {
        encoder.write_var(self.len() as u64)?;
        for (&client, &clock) in self.iter() {
            encoder.write_var(client)?;
            encoder.write_var(clock)?;
        }
        Ok(())
    }
}

impl PartialOrd for StateVector {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let mut res = Some(Ordering::Equal);
        let mut a = self.0.iter();
        let mut b = other.0.iter();

        let mut ae = a.next();
        let mut be = b.next();

        loop {
            match (ae, be) {
                (None, None) => return res,
                (Some(_), None) => {
                    if res == Some(Ordering::Less) {
                        return None;
                    } else {
                        return Some(Ordering::Greater);
                    }
                }
                (None, Some(_)) => {
                    if res == Some(Ordering::Greater) {
                        return None;
                    } else {
                        return Some(Ordering::Less);
                    }
                }
                (Some((ak, av)), Some((bk, bv))) => match ak.cmp(bk) {
                    Ordering::Equal => match av.cmp(bv) {
                        Ordering::Equal => {
                            ae = a.next();
                            be = b.next();
                        }
                        Ordering::Less if res == Some(Ordering::Greater) => {
                            return None;
                        }
                        Ordering::Greater if res == Some(Ordering::Less) => {
                            return None;
                        }
                        other => {
                            res = Some(other);
                            ae = a.next();
                            be = b.next();
                        }
                    },
                    // key only present on one side counts as a greater state
                    Ordering::Less if res == Some(Ordering::Less) => {
                        return None;
                    }
                    Ordering::Less => {
                        res = Some(Ordering::Greater);
                        ae = a.next();
                    }
                    Ordering::Greater if res == Some(Ordering::Greater) => {
                        return None;
                    }
                    Ordering::Greater => {
                        res = Some(Ordering::Less);
                        be = b.next();
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{Clock, StateVector};
    use std::cmp::Ordering;
    use std::iter::FromIterator;

    fn s(a: Clock, b: Clock, c: Clock) -> StateVector {
        StateVector::from_iter([(1.into(), a), (2.into(), b), (3.into(), c)])
    }

    #[test]
    fn ordering() {
        assert_eq!(s(1, 2, 3).partial_cmp(&s(1, 2, 3)), Some(Ordering::Equal));
        assert_eq!(s(1, 2, 2).partial_cmp(&s(1, 2, 3)), Some(Ordering::Less));
        assert_eq!(s(2, 2, 3).partial_cmp(&s(1, 2, 3)), Some(Ordering::Greater));
        assert_eq!(s(3, 2, 1).partial_cmp(&s(1, 2, 3)), None);
    }

    #[test]
    fn ordering_missing_fields() {
        let a = StateVector::from_iter([(1.into(), 1), (2.into(), 2)]);
        let b = StateVector::from_iter([(2.into(), 1), (3.into(), 2)]);
        assert_eq!(a.partial_cmp(&b), None);

        let a = StateVector::from_iter([(1.into(), 1), (2.into(), 2)]);
        let b = StateVector::from_iter([(1.into(), 1), (2.into(), 1), (3.into(), 2)]);
        assert_eq!(a.partial_cmp(&b), None);

        let a = StateVector::from_iter([(1.into(), 1), (2.into(), 2), (3.into(), 3)]);
        let b = StateVector::from_iter([(2.into(), 2), (3.into(), 3)]);
        assert_eq!(a.partial_cmp(&b), Some(Ordering::Greater));

        let a = StateVector::from_iter([(2.into(), 2), (3.into(), 2)]);
        let b = StateVector::from_iter([(1.into(), 1), (2.into(), 2), (3.into(), 2)]);
        assert_eq!(a.partial_cmp(&b), Some(Ordering::Less));

        let a = StateVector::default();
        let b = StateVector::default();
        assert_eq!(a.partial_cmp(&b), Some(Ordering::Equal));
    }
}
