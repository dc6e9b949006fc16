use criterion::{black_box, criterion_group, criterion_main, Criterion};
use weft::Doc;

fn text_doc(words: usize) -> Doc {
    let doc = Doc::with_client_id(1u64);
    let text = doc.get_or_insert_text("text");
    let mut txn = doc.transact_mut();
    for i in 0..words {
        let at = (i * 7) % (text.len(&txn) + 1);
        text.insert(&mut txn, at, "lorem ").unwrap();
    }
    doc
}

fn codec_benches(c: &mut Criterion) {
    let doc = text_doc(1000);

    c.bench_function("encode_state_as_update", |b| {
        b.iter(|| {
            let txn = doc.transact_mut();
            black_box(txn.encode_state_as_update().unwrap())
        })
    });

    let update = doc.transact_mut().encode_state_as_update().unwrap();
    c.bench_function("apply_update", |b| {
        b.iter(|| {
            let fresh = Doc::with_client_id(2u64);
            let mut txn = fresh.transact_mut();
            txn.apply_update_bytes(black_box(&update)).unwrap();
        })
    });

    let sv = {
        let txn = doc.transact_mut();
        txn.state_vector()
    };
    c.bench_function("encode_diff_up_to_date", |b| {
        b.iter(|| {
            let txn = doc.transact_mut();
            black_box(txn.encode_diff(black_box(&sv)).unwrap())
        })
    });

    c.bench_function("encode_state_vector", |b| {
        b.iter(|| {
            let txn = doc.transact_mut();
            black_box(txn.encode_state_vector().unwrap())
        })
    });
}

criterion_group!(benches, codec_benches);
criterion_main!(benches);
