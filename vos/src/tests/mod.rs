//! Shared fixtures for the store tests.

mod aggregate_tests;

use rand::Rng;
use uuid::Uuid;

use crate::{ContainerHandle, Cookie, Epoch, Iod, ObjectId, Recx, SgList, Vos};

pub const KEY_SIZE: usize = 32;
pub const BUF_SIZE: usize = 64;

/// A store with one created and opened container.
pub struct TestStore {
    pub vos: Vos,
    pub uuid: Uuid,
    pub coh: ContainerHandle,
}

impl TestStore {
    pub fn new() -> Self {
        let mut vos = Vos::new();
        let uuid = Uuid::new_v4();
        vos.container_create(uuid).expect("container create");
        let coh = vos.container_open(uuid).expect("container open");
        TestStore { vos, uuid, coh }
    }
}

pub fn gen_key() -> Vec<u8> {
    let mut rng = rand::rng();
    (0..KEY_SIZE).map(|_| rng.random_range(b'a'..=b'z')).collect()
}

pub fn gen_oid() -> ObjectId {
    let mut rng = rand::rng();
    ObjectId::new(rng.random(), rng.random())
}

pub fn gen_buf() -> Vec<u8> {
    let mut rng = rand::rng();
    let mut buf = vec![0u8; BUF_SIZE];
    rng.fill(&mut buf[..]);
    buf
}

/// Single-value write of `payload` at the given identity.
pub fn update_single(
    store: &TestStore,
    oid: ObjectId,
    epoch: Epoch,
    cookie: Cookie,
    dkey: &[u8],
    akey: &[u8],
    payload: &[u8],
) {
    let iod = Iod::single(akey.to_vec(), payload.len() as u64);
    store
        .vos
        .update(
            store.coh,
            oid,
            epoch,
            cookie,
            dkey,
            &[iod],
            &[SgList::inline(payload.to_vec())],
        )
        .expect("update");
}

/// Visible single value at `epoch`, or `None` when absent or punched.
pub fn fetch_single(
    store: &TestStore,
    oid: ObjectId,
    epoch: Epoch,
    dkey: &[u8],
    akey: &[u8],
) -> Option<Vec<u8>> {
    let iod = Iod::single(akey.to_vec(), 0);
    let values = store
        .vos
        .fetch(store.coh, oid, epoch, dkey, &[iod])
        .expect("fetch");
    let value = &values[0];
    if value.is_absent() {
        None
    } else {
        Some(value.data[0].clone())
    }
}

/// Array write of one cell.
pub fn update_cell(
    store: &TestStore,
    oid: ObjectId,
    epoch: Epoch,
    cookie: Cookie,
    dkey: &[u8],
    akey: &[u8],
    idx: u64,
    payload: &[u8],
) {
    let iod = Iod::array(
        akey.to_vec(),
        payload.len() as u64,
        vec![Recx::new(idx, 1)],
    );
    store
        .vos
        .update(
            store.coh,
            oid,
            epoch,
            cookie,
            dkey,
            &[iod],
            &[SgList::inline(payload.to_vec())],
        )
        .expect("update");
}

/// Visible bytes of one cell at `epoch`, or `None` when absent/punched.
pub fn fetch_cell(
    store: &TestStore,
    oid: ObjectId,
    epoch: Epoch,
    dkey: &[u8],
    akey: &[u8],
    idx: u64,
) -> Option<Vec<u8>> {
    let iod = Iod::array(akey.to_vec(), 0, vec![Recx::new(idx, 1)]);
    let values = store
        .vos
        .fetch(store.coh, oid, epoch, dkey, &[iod])
        .expect("fetch");
    let value = &values[0];
    if value.is_absent() {
        None
    } else {
        Some(value.data[0].clone())
    }
}
