//! Append-only (key, value) store held by each node.

use crate::key::KeyInt;

/// Append-only ordered sequence of entries a node has stored.
///
/// Duplicates (the same key stored more than once) are permitted; a read
/// treats any matching entry as a hit. A single in-memory `Vec` is the
/// whole implementation: the store never rejects a write, so `local_store`
/// never fails (see `CoreError::StorageFull`, reserved for a persistent
/// backing store).
#[derive(Debug, Clone, Default)]
pub struct EntryStore {
    entries: Vec<(KeyInt, Vec<u8>)>,
}

impl EntryStore {
    pub fn new() -> EntryStore {
        EntryStore::default()
    }

    pub fn append(&mut self, key: KeyInt, value: Vec<u8>) {
        self.entries.push((key, value));
    }

    /// Returns the value of the most recently stored entry matching `key`.
    pub fn get(&self, key: &KeyInt) -> Option<&[u8]> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn contains(&self, key: &KeyInt) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Removes every entry matching `key`. Used by tests that simulate
    /// eviction of the peers holding a value.
    pub fn remove(&mut self, key: &KeyInt) {
        self.entries.retain(|(k, _)| k != key);
    }

    pub fn iter(&self) -> impl Iterator<Item = &(KeyInt, Vec<u8>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_keys_are_both_kept_and_latest_wins_on_read() {
        let mut store = EntryStore::new();
        let key = KeyInt::from_u64(1);
        store.append(key, b"first".to_vec());
        store.append(key, b"second".to_vec());
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&key), Some(b"second".as_slice()));
    }

    #[test]
    fn remove_drops_all_matching_entries() {
        let mut store = EntryStore::new();
        let key = KeyInt::from_u64(1);
        store.append(key, b"v".to_vec());
        store.remove(&key);
        assert!(!store.contains(&key));
    }
}
