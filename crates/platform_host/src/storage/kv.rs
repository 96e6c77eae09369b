//! Synchronous key/value storage contracts and adapters.
//!
//! The session snapshot is written in one piece under a well-known key. Browser `localStorage`
//! is synchronous, so the contract is too: a write either lands before the call returns or
//! reports an error.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use serde::{de::DeserializeOwned, Serialize};

/// Host service for durable string values keyed by name.
pub trait KeyValueStore {
    /// Loads the raw string stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage is unavailable.
    fn load(&self, key: &str) -> Result<Option<String>, String>;

    /// Replaces the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage is unavailable or rejects the write.
    fn save(&self, key: &str, raw: &str) -> Result<(), String>;

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage is unavailable.
    fn delete(&self, key: &str) -> Result<(), String>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: BTreeMap<String, String>,
    writes: usize,
    fail_writes: bool,
}

#[derive(Debug, Clone, Default)]
/// In-memory store. Clones share the same backing map, which lets a test keep a handle on the
/// store while the session owns another.
pub struct MemoryKeyValueStore {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryKeyValueStore {
    /// Returns how many successful `save` calls were made.
    pub fn write_count(&self) -> usize {
        self.inner.borrow().writes
    }

    /// Makes subsequent writes fail, simulating a full or blocked storage quota.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.borrow_mut().fail_writes = fail;
    }

    /// Returns the stored keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().values.keys().cloned().collect()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn load(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.inner.borrow().values.get(key).cloned())
    }

    fn save(&self, key: &str, raw: &str) -> Result<(), String> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_writes {
            return Err(format!("write to `{key}` rejected"));
        }
        inner.values.insert(key.to_string(), raw.to_string());
        inner.writes += 1;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), String> {
        self.inner.borrow_mut().values.remove(key);
        Ok(())
    }
}

/// Loads and deserializes a typed value through a [`KeyValueStore`].
///
/// # Errors
///
/// Returns an error when the store or JSON deserialization fails.
pub fn load_typed_with<S: KeyValueStore + ?Sized, T: DeserializeOwned>(
    store: &S,
    key: &str,
) -> Result<Option<T>, String> {
    let Some(raw) = store.load(key)? else {
        return Ok(None);
    };
    let value = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
    Ok(Some(value))
}

/// Serializes and saves a typed value through a [`KeyValueStore`].
///
/// # Errors
///
/// Returns an error when serialization or the store write fails.
pub fn save_typed_with<S: KeyValueStore + ?Sized, T: Serialize>(
    store: &S,
    key: &str,
    value: &T,
) -> Result<(), String> {
    let raw = serde_json::to_string(value).map_err(|e| e.to_string())?;
    store.save(key, &raw)
}
