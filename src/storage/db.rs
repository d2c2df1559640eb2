//! Keyspace storage.

use crate::error::{CommandError, Result, StorageError};
use crate::types::{DbIndex, Key, Value, ValueList, ValueType, DEFAULT_DATABASES};
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// A single logical database.
///
/// Every primitive below is atomic on its own; nothing spans two calls.
///
/// # Invariants
///
/// - A present key always holds a well-formed value.
/// - A list that loses its last element is removed, never left empty.
#[derive(Debug)]
pub struct Db {
    index: DbIndex,
    data: DashMap<Key, Value>,
}

/// Result of a RENAMENX attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The key was moved.
    Renamed,
    /// The destination already exists; nothing changed.
    DestinationExists,
    /// The source does not exist; nothing changed.
    NoSuchKey,
}

impl Db {
    /// Create a new empty database.
    pub fn new(index: DbIndex) -> Self {
        Self {
            index,
            data: DashMap::new(),
        }
    }

    /// Index of this database within its set.
    #[inline]
    pub fn index(&self) -> DbIndex {
        self.index
    }

    /// Get the number of keys in the database.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the database is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a string value.
    ///
    /// Fails with `WrongType` if the key holds another kind of value.
    pub fn get_string(&self, key: &[u8]) -> Result<Option<Bytes>> {
        match self.data.get(key) {
            Some(entry) => Ok(Some(entry.as_string()?.clone())),
            None => Ok(None),
        }
    }

    /// Store a value, replacing whatever was there.
    pub fn set(&self, key: Key, value: Value) {
        self.data.insert(key, value);
    }

    /// Store a value only if the key is absent.
    pub fn set_nx(&self, key: Key, value: Value) -> bool {
        match self.data.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    /// Store a string and return the previous one.
    ///
    /// Fails without storing if the key holds a non-string value.
    pub fn get_set(&self, key: Key, value: Bytes) -> Result<Option<Bytes>> {
        match self.data.entry(key) {
            Entry::Occupied(mut slot) => {
                let old = slot.get().as_string()?.clone();
                slot.insert(Value::String(value));
                Ok(Some(old))
            }
            Entry::Vacant(slot) => {
                slot.insert(Value::String(value));
                Ok(None)
            }
        }
    }

    /// Delete a key.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.data.remove(key).is_some()
    }

    /// Delete several keys, returning how many existed.
    pub fn delete_multi<'a>(&self, keys: impl IntoIterator<Item = &'a [u8]>) -> usize {
        keys.into_iter().filter(|k| self.delete(k)).count()
    }

    /// Check if a key exists.
    pub fn exists(&self, key: &[u8]) -> bool {
        self.data.contains_key(key)
    }

    /// Get the type of a key.
    pub fn key_type(&self, key: &[u8]) -> Option<ValueType> {
        self.data.get(key).map(|v| v.value_type())
    }

    /// Fail with `WrongType` if the key exists with another type.
    pub fn ensure_type(&self, key: &[u8], expected: ValueType) -> Result<()> {
        match self.key_type(key) {
            Some(actual) if actual != expected => Err(CommandError::WrongType.into()),
            _ => Ok(()),
        }
    }

    /// Move a value to a new key, overwriting the destination.
    ///
    /// Returns false if the source does not exist.
    pub fn rename(&self, old_key: &[u8], new_key: Key) -> bool {
        match self.data.remove(old_key) {
            Some((_, value)) => {
                self.data.insert(new_key, value);
                true
            }
            None => false,
        }
    }

    /// Move a value to a new key only if the destination is free.
    pub fn rename_nx(&self, old_key: &[u8], new_key: Key) -> RenameOutcome {
        if self.exists(&new_key) {
            return RenameOutcome::DestinationExists;
        }
        if !self.exists(old_key) {
            return RenameOutcome::NoSuchKey;
        }
        if self.rename(old_key, new_key) {
            RenameOutcome::Renamed
        } else {
            RenameOutcome::NoSuchKey
        }
    }

    /// Get all keys matching a glob pattern, in no particular order.
    pub fn keys(&self, pattern: &[u8]) -> Vec<Key> {
        self.data
            .iter()
            .filter(|entry| entry.key().matches_pattern(pattern))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Remove every key.
    pub fn flush(&self) {
        trace!(db = self.index, keys = self.data.len(), "flushing database");
        self.data.clear();
    }

    /// Read a list without changing it.
    ///
    /// Returns `Ok(None)` if the key is absent.
    pub fn read_list<R>(&self, key: &[u8], f: impl FnOnce(&ValueList) -> R) -> Result<Option<R>> {
        match self.data.get(key) {
            Some(entry) => Ok(Some(f(entry.as_list()?))),
            None => Ok(None),
        }
    }

    /// Mutate an existing list.
    ///
    /// Returns `Ok(None)` if the key is absent. Removes the key if the list
    /// ends up empty.
    pub fn update_list<R>(
        &self,
        key: &[u8],
        f: impl FnOnce(&mut ValueList) -> R,
    ) -> Result<Option<R>> {
        let (result, emptied) = match self.data.get_mut(key) {
            Some(mut entry) => {
                let list = entry.as_list_mut()?;
                let result = f(list);
                (result, list.is_empty())
            }
            None => return Ok(None),
        };

        if emptied {
            self.data.remove_if(key, |_, v| v.is_empty_list());
        }
        Ok(Some(result))
    }

    /// Mutate a list, creating it if the key is absent.
    ///
    /// The entry stays locked for the duration of `f`.
    pub fn upsert_list<R>(&self, key: Key, f: impl FnOnce(&mut ValueList) -> R) -> Result<R> {
        let key_for_cleanup = key.clone();
        let (result, emptied) = {
            let mut entry = self.data.entry(key).or_insert_with(Value::new_list);
            let list = entry.as_list_mut()?;
            let result = f(list);
            (result, list.is_empty())
        };

        if emptied {
            self.data
                .remove_if(key_for_cleanup.as_bytes(), |_, v| v.is_empty_list());
        }
        Ok(result)
    }

    /// Copy of the whole keyspace, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<Key, Value> {
        self.data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

/// The set of logical databases, indexed `0..len`.
#[derive(Debug)]
pub struct Database {
    dbs: Vec<Arc<Db>>,
}

impl Database {
    /// Create `count` empty databases; zero means the default of 16.
    pub fn new(count: usize) -> Self {
        let count = if count == 0 { DEFAULT_DATABASES } else { count };
        Self {
            dbs: (0..count).map(|i| Arc::new(Db::new(i))).collect(),
        }
    }

    /// Number of databases.
    #[inline]
    pub fn len(&self) -> usize {
        self.dbs.len()
    }

    /// Always false; a database set holds at least one database.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dbs.is_empty()
    }

    /// Get a database by index.
    pub fn get_db(&self, index: DbIndex) -> Result<Arc<Db>> {
        self.dbs
            .get(index)
            .cloned()
            .ok_or_else(|| StorageError::DbIndexOutOfRange.into())
    }

    /// Total keys across all databases.
    pub fn total_keys(&self) -> usize {
        self.dbs.iter().map(|db| db.len()).sum()
    }

    /// Per-database snapshots, in index order.
    pub fn snapshot(&self) -> Vec<BTreeMap<Key, Value>> {
        self.dbs.iter().map(|db| db.snapshot()).collect()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASES)
    }
}
