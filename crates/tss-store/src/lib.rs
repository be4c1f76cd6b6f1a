//! Keyed Byte State
//!
//! Ordered key-value storage consumed by the TSS module: plain get/set/delete,
//! lazy iteration over key ranges and prefixes, and a staged [`CacheStore`]
//! whose writes land on the parent only when committed.
//!
//! Values are JSON-encoded through [`KvStoreExt`].

mod cache;
mod memory;

pub use cache::CacheStore;
pub use memory::MemStore;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Store error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Key not found: {0}")]
    NotFound(String),
    #[error("Codec error: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Codec(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Key-value pair yielded by iteration
pub type Entry = (Vec<u8>, Vec<u8>);

/// Lazy, ordered iterator over a key range. Dropping it releases the range.
pub type KvIter<'a> = Box<dyn Iterator<Item = Entry> + 'a>;

/// Ordered byte store
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    fn delete(&mut self, key: &[u8]);

    /// Ascending iteration over `[start, end)`; `None` leaves a side open
    fn range<'a>(&'a self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'a>;

    /// Ascending iteration over every key starting with `prefix`
    fn prefix<'a>(&'a self, prefix: &[u8]) -> KvIter<'a> {
        let end = prefix_end(prefix);
        self.range(Some(prefix), end.as_deref())
    }
}

/// Smallest key greater than every key with this prefix, `None` when the
/// prefix is all `0xff`
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Range bounds are inverted, so the range is empty
pub(crate) fn is_empty_range(start: Option<&[u8]>, end: Option<&[u8]>) -> bool {
    matches!((start, end), (Some(s), Some(e)) if s >= e)
}

/// JSON codec helpers over any store
pub trait KvStoreExt: KvStore {
    /// Decode the value at `key`, `None` when absent
    fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        self.get(key)
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Decode the value at `key`, failing when absent
    fn must_get_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<T> {
        self.get_json(key)?
            .ok_or_else(|| StoreError::NotFound(hex::encode(key)))
    }

    fn set_json<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> Result<()> {
        let bytes = encode(value)?;
        self.set(key, bytes);
        Ok(())
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}

/// Encode a value to JSON bytes
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decode a value from JSON bytes
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: u64,
        name: String,
    }

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(&[0x01]), Some(vec![0x02]));
        assert_eq!(prefix_end(&[0x01, 0xff]), Some(vec![0x02]));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
        assert_eq!(prefix_end(&[]), None);
    }

    #[test]
    fn test_json_helpers() {
        let mut store = MemStore::new();
        let record = Record {
            id: 7,
            name: "group".into(),
        };
        store.set_json(b"r".to_vec(), &record).unwrap();

        assert_eq!(store.get_json::<Record>(b"r").unwrap(), Some(record));
        assert_eq!(store.get_json::<Record>(b"missing").unwrap(), None);
        assert!(matches!(
            store.must_get_json::<Record>(b"missing"),
            Err(StoreError::NotFound(_))
        ));

        store.set(b"bad".to_vec(), b"{".to_vec());
        assert!(matches!(
            store.get_json::<Record>(b"bad"),
            Err(StoreError::Codec(_))
        ));
    }

    #[test]
    fn test_ext_through_trait_object() {
        let mut store = MemStore::new();
        {
            let dynamic: &mut dyn KvStore = &mut store;
            dynamic.set_json(b"k".to_vec(), &42u64).unwrap();
        }
        assert_eq!(store.get_json::<u64>(b"k").unwrap(), Some(42));
    }
}
