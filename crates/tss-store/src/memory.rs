//! In-memory ordered store

use crate::{is_empty_range, KvIter, KvStore};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Ordered in-memory store backed by a `BTreeMap`
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn has(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    fn range<'a>(&'a self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'a> {
        if is_empty_range(start, end) {
            return Box::new(std::iter::empty());
        }
        let bounds = (bound(start, true), bound(end, false));
        Box::new(
            self.entries
                .range::<[u8], _>(bounds)
                .map(|(k, v)| (k.clone(), v.clone())),
        )
    }
}

/// `start` is inclusive, `end` exclusive
pub(crate) fn bound(key: Option<&[u8]>, inclusive: bool) -> Bound<&[u8]> {
    match key {
        None => Bound::Unbounded,
        Some(k) if inclusive => Bound::Included(k),
        Some(k) => Bound::Excluded(k),
    }
}
