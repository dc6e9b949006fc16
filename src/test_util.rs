use crate::Doc;

/// Pairwise exchange of missing updates between all documents, relative to the state vectors
/// observed at call time.
pub fn sync<const N: usize>(docs: [&Doc; N]) {
    let states: Vec<_> = docs
        .iter()
        .map(|doc| doc.transact_mut().state_vector())
        .collect();
    for i in 0..N {
        let sv = states[i].clone();
        for j in 0..N {
            if i != j {
                let update = docs[j].transact_mut().encode_diff(&sv).unwrap();
                docs[i].transact_mut().apply_update_bytes(&update).unwrap();
            }
        }
    }
}
