//! Credit-bounded epoch aggregation.

use assert_matches::assert_matches;

use super::*;
use crate::{Credits, EpochRange, Error, PurgeAnchor};

fn aggregate_all(store: &TestStore, oid: ObjectId, range: EpochRange) {
    let mut credits = Credits::unlimited();
    let mut anchor = PurgeAnchor::new();
    let finished = store
        .vos
        .epoch_aggregate(store.coh, oid, range, &mut credits, &mut anchor)
        .expect("aggregate");
    assert!(finished);
    assert!(anchor.is_done());
}

#[test]
fn collapse_overwritten_cell() {
    let store = TestStore::new();
    let (oid, dkey, akey) = (gen_oid(), gen_key(), gen_key());
    let cookie = Cookie::generate();
    let idx = 7;

    let payloads: Vec<Vec<u8>> = (0..20).map(|_| gen_buf()).collect();
    for (i, payload) in payloads.iter().enumerate() {
        update_cell(&store, oid, i as Epoch + 1, cookie, &dkey, &akey, idx, payload);
    }

    aggregate_all(&store, oid, EpochRange::new(1, 10));

    // The epoch-10 version survives at the range's upper bound; queries
    // anywhere inside the collapsed range resolve to it.
    assert_eq!(
        fetch_cell(&store, oid, 10, &dkey, &akey, idx),
        Some(payloads[9].clone())
    );
    assert_eq!(
        fetch_cell(&store, oid, 9, &dkey, &akey, idx),
        Some(payloads[9].clone())
    );
    for epoch in 11..=20u64 {
        assert_eq!(
            fetch_cell(&store, oid, epoch, &dkey, &akey, idx),
            Some(payloads[(epoch - 1) as usize].clone())
        );
    }
    assert_eq!(store.vos.container_query(store.coh).unwrap().purged_epoch, 10);
}

#[test]
fn one_credit_per_call_reaches_the_same_state() {
    let store = TestStore::new();
    let (oid, dkey, akey) = (gen_oid(), gen_key(), gen_key());
    let cookie = Cookie::generate();
    let idx = 7;

    let payloads: Vec<Vec<u8>> = (0..20).map(|_| gen_buf()).collect();
    for (i, payload) in payloads.iter().enumerate() {
        update_cell(&store, oid, i as Epoch + 1, cookie, &dkey, &akey, idx, payload);
    }

    let range = EpochRange::new(1, 10);
    let mut anchor = PurgeAnchor::new();
    let mut finished = false;
    for _ in 0..1000 {
        let mut credits = Credits::new(1);
        finished = store
            .vos
            .epoch_aggregate(store.coh, oid, range, &mut credits, &mut anchor)
            .expect("aggregate");
        if finished {
            break;
        }
    }
    assert!(finished);

    assert_eq!(
        fetch_cell(&store, oid, 9, &dkey, &akey, idx),
        Some(payloads[9].clone())
    );
    for epoch in 11..=20u64 {
        assert_eq!(
            fetch_cell(&store, oid, epoch, &dkey, &akey, idx),
            Some(payloads[(epoch - 1) as usize].clone())
        );
    }
    assert_eq!(store.vos.container_query(store.coh).unwrap().purged_epoch, 10);
}

#[test]
fn collapse_single_value_history() {
    let store = TestStore::new();
    let (oid, dkey, akey) = (gen_oid(), gen_key(), gen_key());
    let cookie = Cookie::generate();

    let payloads: Vec<Vec<u8>> = (0..12).map(|_| gen_buf()).collect();
    for (i, payload) in payloads.iter().enumerate() {
        update_single(&store, oid, i as Epoch + 1, cookie, &dkey, &akey, payload);
    }

    aggregate_all(&store, oid, EpochRange::new(1, 6));

    assert_eq!(
        fetch_single(&store, oid, 3, &dkey, &akey),
        Some(payloads[5].clone())
    );
    assert_eq!(
        fetch_single(&store, oid, 6, &dkey, &akey),
        Some(payloads[5].clone())
    );
    for epoch in 7..=12u64 {
        assert_eq!(
            fetch_single(&store, oid, epoch, &dkey, &akey),
            Some(payloads[(epoch - 1) as usize].clone())
        );
    }
}

#[test]
fn aggregate_many_dkeys_keeps_every_newest_record() {
    const KEYS: usize = 60;
    let store = TestStore::new();
    let cookie = Cookie::generate();
    let oid = gen_oid();
    let base: Epoch = 1024;

    let mut writes = Vec::new();
    for i in 0..KEYS {
        let (dkey, akey) = (gen_key(), gen_key());
        let payload = gen_buf();
        update_single(&store, oid, base + i as Epoch, cookie, &dkey, &akey, &payload);
        writes.push((dkey, akey, base + i as Epoch, payload));
    }

    aggregate_all(
        &store,
        oid,
        EpochRange::new(base, base + (KEYS as Epoch) / 2),
    );

    // Every record was the newest of its identity, so everything is
    // still fetchable at its write epoch.
    for (dkey, akey, epoch, payload) in &writes {
        assert_eq!(
            fetch_single(&store, oid, *epoch, dkey, akey).as_ref(),
            Some(payload)
        );
    }
}

#[test]
fn aggregate_many_akeys_keeps_every_newest_record() {
    const KEYS: usize = 60;
    let store = TestStore::new();
    let cookie = Cookie::generate();
    let oid = gen_oid();
    let dkey = gen_key();
    let base: Epoch = 1024;

    let mut writes = Vec::new();
    for i in 0..KEYS {
        let akey = gen_key();
        let payload = gen_buf();
        update_single(&store, oid, base + i as Epoch, cookie, &dkey, &akey, &payload);
        writes.push((akey, base + i as Epoch, payload));
    }

    aggregate_all(
        &store,
        oid,
        EpochRange::new(base, base + (KEYS as Epoch) / 2),
    );

    for (akey, epoch, payload) in &writes {
        assert_eq!(
            fetch_single(&store, oid, *epoch, &dkey, akey).as_ref(),
            Some(payload)
        );
    }
}

#[test]
fn surviving_punch_is_relocated() {
    let store = TestStore::new();
    let (oid, dkey, akey) = (gen_oid(), gen_key(), gen_key());
    let cookie = Cookie::generate();

    update_single(&store, oid, 5, cookie, &dkey, &akey, &gen_buf());
    store
        .vos
        .punch(store.coh, oid, 9, cookie, &dkey, &akey, None)
        .expect("punch");

    aggregate_all(&store, oid, EpochRange::new(1, 10));

    // The punch survives at the upper bound and keeps hiding.
    assert_eq!(fetch_single(&store, oid, 10, &dkey, &akey), None);
    assert_eq!(fetch_single(&store, oid, 15, &dkey, &akey), None);
    assert_eq!(store.vos.container_query(store.coh).unwrap().purged_epoch, 10);
}

#[test]
fn aggregate_twice_is_idempotent() {
    let store = TestStore::new();
    let (oid, dkey, akey) = (gen_oid(), gen_key(), gen_key());
    let cookie = Cookie::generate();

    for epoch in 1..=8u64 {
        update_single(&store, oid, epoch, cookie, &dkey, &akey, &gen_buf());
    }
    let range = EpochRange::new(1, 5);

    aggregate_all(&store, oid, range);
    let snapshot: Vec<_> = (1..=8u64)
        .map(|e| fetch_single(&store, oid, e, &dkey, &akey))
        .collect();
    let watermark = store.vos.container_query(store.coh).unwrap().purged_epoch;

    aggregate_all(&store, oid, range);
    let again: Vec<_> = (1..=8u64)
        .map(|e| fetch_single(&store, oid, e, &dkey, &akey))
        .collect();

    assert_eq!(snapshot, again);
    assert_eq!(
        store.vos.container_query(store.coh).unwrap().purged_epoch,
        watermark
    );
}

#[test]
fn credit_split_matches_unbounded_run() {
    let mut stores = Vec::new();
    let oid = gen_oid();
    let cookie = Cookie::generate();
    let keys: Vec<(Vec<u8>, Vec<u8>)> = (0..5).map(|_| (gen_key(), gen_key())).collect();
    let payloads: Vec<Vec<u8>> = (0..40).map(|_| gen_buf()).collect();

    // Same writes into two stores.
    for _ in 0..2 {
        let store = TestStore::new();
        for (i, payload) in payloads.iter().enumerate() {
            let (dkey, akey) = &keys[i % keys.len()];
            update_single(&store, oid, i as Epoch + 1, cookie, dkey, akey, payload);
        }
        stores.push(store);
    }

    let range = EpochRange::new(1, 30);
    aggregate_all(&stores[0], oid, range);

    let mut anchor = PurgeAnchor::new();
    let mut finished = false;
    for _ in 0..1000 {
        let mut credits = Credits::new(3);
        finished = stores[1]
            .vos
            .epoch_aggregate(stores[1].coh, oid, range, &mut credits, &mut anchor)
            .expect("aggregate");
        if finished {
            break;
        }
    }
    assert!(finished);

    for epoch in 1..=40u64 {
        for (dkey, akey) in &keys {
            assert_eq!(
                fetch_single(&stores[0], oid, epoch, dkey, akey),
                fetch_single(&stores[1], oid, epoch, dkey, akey)
            );
        }
    }
    assert_eq!(
        stores[0].vos.container_query(stores[0].coh).unwrap(),
        stores[1].vos.container_query(stores[1].coh).unwrap()
    );
}

#[test]
fn anchor_survives_serialization() {
    let store = TestStore::new();
    let (oid, dkey, akey) = (gen_oid(), gen_key(), gen_key());
    let cookie = Cookie::generate();

    for epoch in 1..=16u64 {
        update_single(&store, oid, epoch, cookie, &dkey, &akey, &gen_buf());
    }
    let range = EpochRange::new(1, 12);

    let mut credits = Credits::new(2);
    let mut anchor = PurgeAnchor::new();
    let finished = store
        .vos
        .epoch_aggregate(store.coh, oid, range, &mut credits, &mut anchor)
        .expect("aggregate");
    assert!(!finished);

    // Checkpoint the anchor through its opaque byte form.
    let bytes = anchor.encode().expect("encode");
    let mut resumed = PurgeAnchor::decode(&bytes).expect("decode");

    let mut credits = Credits::unlimited();
    let finished = store
        .vos
        .epoch_aggregate(store.coh, oid, range, &mut credits, &mut resumed)
        .expect("aggregate");
    assert!(finished);
    assert_eq!(
        fetch_single(&store, oid, 12, &dkey, &akey),
        fetch_single(&store, oid, 1, &dkey, &akey)
    );
}

#[test]
fn abandoned_anchor_allows_a_fresh_run() {
    let store = TestStore::new();
    let (oid, dkey, akey) = (gen_oid(), gen_key(), gen_key());
    let cookie = Cookie::generate();

    for epoch in 1..=10u64 {
        update_single(&store, oid, epoch, cookie, &dkey, &akey, &gen_buf());
    }
    let range = EpochRange::new(1, 8);

    // Start with a tiny budget, then walk away from the anchor.
    let mut credits = Credits::new(1);
    let mut abandoned = PurgeAnchor::new();
    let finished = store
        .vos
        .epoch_aggregate(store.coh, oid, range, &mut credits, &mut abandoned)
        .expect("aggregate");
    assert!(!finished);

    aggregate_all(&store, oid, range);
    assert_eq!(
        fetch_single(&store, oid, 5, &dkey, &akey),
        fetch_single(&store, oid, 8, &dkey, &akey)
    );
}

#[test]
fn trivial_finish_still_advances_the_watermark() {
    let store = TestStore::new();
    aggregate_all(&store, ObjectId::default(), EpochRange::new(1, 777));
    assert_eq!(
        store.vos.container_query(store.coh).unwrap().purged_epoch,
        777
    );
}

#[test]
fn watermark_is_monotone() {
    let store = TestStore::new();
    let (oid, dkey, akey) = (gen_oid(), gen_key(), gen_key());
    let cookie = Cookie::generate();

    for epoch in 1..=12u64 {
        update_single(&store, oid, epoch, cookie, &dkey, &akey, &gen_buf());
    }
    aggregate_all(&store, oid, EpochRange::new(1, 10));
    aggregate_all(&store, oid, EpochRange::new(1, 5));
    assert_eq!(store.vos.container_query(store.coh).unwrap().purged_epoch, 10);
}

#[test]
fn watermark_visible_through_second_handle() {
    let mut store = TestStore::new();
    let (oid, dkey, akey) = (gen_oid(), gen_key(), gen_key());
    let cookie = Cookie::generate();

    for epoch in 1..=6u64 {
        update_single(&store, oid, epoch, cookie, &dkey, &akey, &gen_buf());
    }
    aggregate_all(&store, oid, EpochRange::new(1, 6));

    let second = store.vos.container_open(store.uuid).expect("open");
    assert_eq!(
        store.vos.container_query(second).unwrap().purged_epoch,
        6
    );
    store.vos.container_close(second).unwrap();
}

#[test]
fn anchor_is_bound_to_one_object() {
    let store = TestStore::new();
    let cookie = Cookie::generate();
    let (oid_a, oid_b) = (gen_oid(), gen_oid());
    let (dkey, akey) = (gen_key(), gen_key());

    for epoch in 1..=8u64 {
        update_single(&store, oid_a, epoch, cookie, &dkey, &akey, &gen_buf());
    }

    let range = EpochRange::new(1, 8);
    let mut credits = Credits::new(1);
    let mut anchor = PurgeAnchor::new();
    let finished = store
        .vos
        .epoch_aggregate(store.coh, oid_a, range, &mut credits, &mut anchor)
        .expect("aggregate");
    assert!(!finished);

    let mut credits = Credits::unlimited();
    assert_matches!(
        store
            .vos
            .epoch_aggregate(store.coh, oid_b, range, &mut credits, &mut anchor),
        Err(Error::InvalidArgument(_))
    );
}

#[test]
fn aggregate_rejects_inverted_range() {
    let store = TestStore::new();
    let mut credits = Credits::unlimited();
    let mut anchor = PurgeAnchor::new();
    assert_matches!(
        store.vos.epoch_aggregate(
            store.coh,
            gen_oid(),
            EpochRange::new(9, 2),
            &mut credits,
            &mut anchor,
        ),
        Err(Error::InvalidArgument(_))
    );
}
