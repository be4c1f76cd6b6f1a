//! Staged writes over a parent store

use crate::memory::bound;
use crate::{is_empty_range, Entry, KvIter, KvStore};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter::Peekable;
use tracing::debug;

/// Write set staged on top of a parent store.
///
/// Reads see staged writes first. Nothing reaches the parent until
/// [`CacheStore::commit`]; dropping the cache discards every write.
pub struct CacheStore<'p, S: KvStore + ?Sized> {
    parent: &'p mut S,
    /// `None` marks a staged delete
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'p, S: KvStore + ?Sized> CacheStore<'p, S> {
    pub fn new(parent: &'p mut S) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    /// Number of staged writes and deletes
    pub fn pending(&self) -> usize {
        self.writes.len()
    }

    /// Apply every staged write to the parent
    pub fn commit(self) {
        debug!(writes = self.writes.len(), "committing cache store");
        for (key, value) in self.writes {
            match value {
                Some(value) => self.parent.set(key, value),
                None => self.parent.delete(&key),
            }
        }
    }
}

impl<'p, S: KvStore + ?Sized> KvStore for CacheStore<'p, S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(staged) => staged.clone(),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    fn range<'a>(&'a self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'a> {
        if is_empty_range(start, end) {
            return Box::new(std::iter::empty());
        }
        let staged = self
            .writes
            .range::<[u8], _>((bound(start, true), bound(end, false)))
            .map(|(k, v)| (k.clone(), v.clone()));
        Box::new(MergeIter {
            parent: self.parent.range(start, end).peekable(),
            staged: staged.peekable(),
        })
    }
}

/// Ascending merge of parent entries with staged writes; staged entries win
/// on equal keys and staged deletes hide the parent entry
struct MergeIter<P, C>
where
    P: Iterator<Item = Entry>,
    C: Iterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
{
    parent: Peekable<P>,
    staged: Peekable<C>,
}

impl<P, C> Iterator for MergeIter<P, C>
where
    P: Iterator<Item = Entry>,
    C: Iterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
{
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        loop {
            let order = match (self.parent.peek(), self.staged.peek()) {
                (None, None) => return None,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((pk, _)), Some((sk, _))) => pk.cmp(sk),
            };

            match order {
                Ordering::Less => return self.parent.next(),
                Ordering::Equal => {
                    self.parent.next();
                }
                Ordering::Greater => {}
            }

            if let Some((key, Some(value))) = self.staged.next() {
                return Some((key, value));
            }
        }
    }
}
