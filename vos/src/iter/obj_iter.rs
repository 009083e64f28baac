//! The object iterator: the one implementation behind the framework.

use vos_tree::{ExtentKey, HashedKey, IntKey, Stamped, Tree};
use vos_types::{EpochRange, ObjectId, Recx, EPOCH_MAX};

use crate::{
    error::Error,
    iter::{
        anchor::{AnchorKey, IterAnchor, ValueCursor},
        IterEntry, IterOps, IterParam, IterType,
    },
    records::ValueTree,
    SharedContainer, Vos,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Position {
    Key(HashedKey),
    Single(u64),
    Extent(ExtentKey, u64),
}

pub(crate) struct ObjIter {
    cont: SharedContainer,
    oid: ObjectId,
    dkey: Option<HashedKey>,
    akey: Option<HashedKey>,
    epoch_range: EpochRange,
    iter_type: IterType,
    pos: Option<Position>,
}

impl ObjIter {
    pub(crate) fn prepare(
        vos: &Vos,
        iter_type: IterType,
        param: &IterParam,
    ) -> Result<Self, Error> {
        let dkey = param.dkey.as_deref().map(HashedKey::new);
        let akey = param.akey.as_deref().map(HashedKey::new);
        match iter_type {
            IterType::Dkey => {}
            IterType::Akey => {
                if dkey.is_none() {
                    return Err(Error::InvalidArgument("akey iterator requires a dkey"));
                }
            }
            IterType::Recx => {
                if dkey.is_none() || akey.is_none() {
                    return Err(Error::InvalidArgument(
                        "recx iterator requires a dkey and an akey",
                    ));
                }
            }
        }
        Ok(ObjIter {
            cont: vos.resolve(param.coh)?,
            oid: param.oid,
            dkey,
            akey,
            epoch_range: param.epoch_range,
            iter_type,
            pos: None,
        })
    }

    /// Find the first element at or after `from` (after, when not
    /// inclusive). `None` starts from the beginning.
    fn seek(&self, from: Option<&Position>, inclusive: bool) -> Result<Position, Error> {
        let cont = self.cont.borrow();
        let obj = cont.objects.find(self.oid).ok_or(Error::NotFound)?;

        match self.iter_type {
            IterType::Dkey => seek_key(&obj.dkeys, key_of(from), inclusive).map(Position::Key),
            IterType::Akey => {
                let dkey = self.dkey.as_ref().ok_or(Error::NotFound)?;
                let akeys = obj
                    .dkeys
                    .get_any(dkey)
                    .map(|entry| entry.value)
                    .ok_or(Error::NotFound)?;
                seek_key(akeys, key_of(from), inclusive).map(Position::Key)
            }
            IterType::Recx => {
                let values = self.values(&cont)?;
                seek_value(values, &self.epoch_range, from, inclusive)
            }
        }
        .ok_or(Error::NotFound)
    }

    fn values<'a>(
        &self,
        cont: &'a std::cell::Ref<'_, crate::Container>,
    ) -> Result<&'a ValueTree, Error> {
        let obj = cont.objects.find(self.oid).ok_or(Error::NotFound)?;
        let dkey = self.dkey.as_ref().ok_or(Error::NotFound)?;
        let akey = self.akey.as_ref().ok_or(Error::NotFound)?;
        let akeys = obj
            .dkeys
            .get_any(dkey)
            .map(|entry| entry.value)
            .ok_or(Error::NotFound)?;
        let entry = akeys.get_any(akey).map(|e| e.value).ok_or(Error::NotFound)?;
        Ok(&entry.values)
    }
}

impl IterOps for ObjIter {
    fn probe(&mut self, anchor: Option<&IterAnchor>) -> Result<(), Error> {
        let from = match anchor {
            Some(anchor) => anchor_position(anchor),
            None => None,
        };
        let pos = self.seek(from.as_ref(), true)?;
        self.pos = Some(pos);
        Ok(())
    }

    fn next(&mut self) -> Result<(), Error> {
        let current = self
            .pos
            .clone()
            .ok_or(Error::NotPermitted("iterator requires a probe"))?;
        let pos = self.seek(Some(&current), false)?;
        self.pos = Some(pos);
        Ok(())
    }

    fn fetch(&self) -> Result<(IterEntry, IterAnchor), Error> {
        let pos = self
            .pos
            .as_ref()
            .ok_or(Error::NotPermitted("iterator requires a probe"))?;
        let cont = self.cont.borrow();
        let obj = cont.objects.find(self.oid).ok_or(Error::NotFound)?;

        match (self.iter_type, pos) {
            (IterType::Dkey, Position::Key(key)) => {
                let entry = obj.dkeys.get_any(key).ok_or(Error::NotFound)?;
                Ok((
                    IterEntry::Dkey {
                        key: key.bytes().to_vec(),
                        first_epoch: entry.epoch,
                        cookie: entry.cookie,
                    },
                    key_anchor(key),
                ))
            }
            (IterType::Akey, Position::Key(key)) => {
                let dkey = self.dkey.as_ref().ok_or(Error::NotFound)?;
                let akeys = obj
                    .dkeys
                    .get_any(dkey)
                    .map(|entry| entry.value)
                    .ok_or(Error::NotFound)?;
                let entry = akeys.get_any(key).ok_or(Error::NotFound)?;
                Ok((
                    IterEntry::Akey {
                        key: key.bytes().to_vec(),
                        kind: entry.value.kind,
                        first_epoch: entry.epoch,
                        cookie: entry.cookie,
                    },
                    key_anchor(key),
                ))
            }
            (IterType::Recx, Position::Single(epoch)) => {
                let values = self.values(&cont)?;
                let ValueTree::Single(tree) = values else {
                    return Err(Error::Protocol("anchor does not match iterator"));
                };
                let entry = tree.get(&IntKey(*epoch), *epoch).ok_or(Error::NotFound)?;
                Ok((
                    IterEntry::Recx {
                        recx: Recx::new(0, 1),
                        epoch: entry.epoch,
                        cookie: entry.cookie,
                        size: entry.value.size,
                    },
                    value_anchor(ValueCursor::Single(*epoch)),
                ))
            }
            (IterType::Recx, Position::Extent(key, epoch)) => {
                let values = self.values(&cont)?;
                let ValueTree::Array(tree) = values else {
                    return Err(Error::Protocol("anchor does not match iterator"));
                };
                let entry = tree.get(key, *epoch).ok_or(Error::NotFound)?;
                Ok((
                    IterEntry::Recx {
                        recx: Recx::new(key.lo, key.cells()),
                        epoch: entry.epoch,
                        cookie: entry.cookie,
                        size: entry.value.cell_size,
                    },
                    value_anchor(ValueCursor::Extent {
                        lo: key.lo,
                        hi: key.hi,
                        epoch: *epoch,
                    }),
                ))
            }
            _ => Err(Error::Protocol("iterator position does not match type")),
        }
    }
}

fn key_of(pos: Option<&Position>) -> Option<&HashedKey> {
    match pos {
        Some(Position::Key(key)) => Some(key),
        _ => None,
    }
}

fn key_anchor(key: &HashedKey) -> IterAnchor {
    IterAnchor {
        tag: 0,
        key: Some(AnchorKey::from_key(key)),
        value: None,
    }
}

fn value_anchor(cursor: ValueCursor) -> IterAnchor {
    IterAnchor {
        tag: 0,
        key: None,
        value: Some(cursor),
    }
}

fn anchor_position(anchor: &IterAnchor) -> Option<Position> {
    if let Some(key) = &anchor.key {
        return Some(Position::Key(key.to_key()));
    }
    match anchor.value {
        Some(ValueCursor::Single(epoch)) => Some(Position::Single(epoch)),
        Some(ValueCursor::Extent { lo, hi, epoch }) => {
            Some(Position::Extent(ExtentKey::new(lo, hi), epoch))
        }
        None => None,
    }
}

/// Next key in a subtree level (one entry per key).
fn seek_key<V>(
    tree: &Tree<HashedKey, V>,
    from: Option<&HashedKey>,
    inclusive: bool,
) -> Option<HashedKey> {
    match from {
        None => tree.iter().next().map(|entry| entry.key.clone()),
        Some(key) => {
            let start = if inclusive {
                Stamped::new(key.clone(), 0)
            } else {
                Stamped::new(key.clone(), EPOCH_MAX)
            };
            tree.iter_from(&start, inclusive)
                .next()
                .map(|entry| entry.key.clone())
        }
    }
}

/// Next record in a value tree whose stamp falls inside the range.
fn seek_value(
    values: &ValueTree,
    range: &EpochRange,
    from: Option<&Position>,
    inclusive: bool,
) -> Option<Position> {
    match values {
        ValueTree::Single(tree) => {
            let mut iter: Box<dyn Iterator<Item = _>> = match from {
                None => Box::new(tree.iter()),
                Some(Position::Single(epoch)) => Box::new(
                    tree.iter_from(&Stamped::new(IntKey(*epoch), *epoch), inclusive),
                ),
                Some(_) => return None,
            };
            iter.find(|entry| range.contains(entry.epoch))
                .map(|entry| Position::Single(entry.epoch))
        }
        ValueTree::Array(tree) => {
            let mut iter: Box<dyn Iterator<Item = _>> = match from {
                None => Box::new(tree.iter()),
                Some(Position::Extent(key, epoch)) => {
                    Box::new(tree.iter_from(&Stamped::new(*key, *epoch), inclusive))
                }
                Some(_) => return None,
            };
            iter.find(|entry| range.contains(entry.epoch))
                .map(|entry| Position::Extent(*entry.key, entry.epoch))
        }
    }
}
