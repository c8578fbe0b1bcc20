//! The record store proper: typed reads and writes over a backend,
//! with a change notification on every successful write.

use crate::bus::ChangeBus;
use crate::error::Result;
use crate::records::StorageBackend;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// String-keyed store of JSON-serialized values.
///
/// All operations are synchronous; a write followed by a read on the
/// same key observes the written value. Every successful write
/// publishes the key on the change bus.
pub struct RecordStore {
    backend: Arc<dyn StorageBackend>,
    bus: Arc<ChangeBus>,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn StorageBackend>, bus: Arc<ChangeBus>) -> Self {
        Self { backend, bus }
    }

    /// The change bus writes publish on.
    pub fn bus(&self) -> &Arc<ChangeBus> {
        &self.bus
    }

    /// Read the value under `key`, if present and well-formed.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.load(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Read the value under `key`, falling back to `init`.
    ///
    /// An absent key persists `init()` so the first read doubles as the
    /// first write. A corrupt stored value logs and returns `init()`
    /// without overwriting the damaged document; a backend failure is
    /// likewise recovered locally. Never errors to the caller.
    pub fn get_or_init<T, F>(&self, key: &str, init: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        match self.backend.load(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(key, error = %e, "corrupt stored value, using fallback");
                    init()
                }
            },
            Ok(None) => {
                let value = init();
                if let Err(e) = self.put(key, &value) {
                    tracing::warn!(key, error = %e, "failed to persist fallback");
                }
                value
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "backend read failed, using fallback");
                init()
            }
        }
    }

    /// Serialize `value` under `key` and publish the change.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.backend.save(key, &raw)?;
        self.bus.publish(key);
        Ok(())
    }

    /// Read-modify-write in one step.
    ///
    /// The closure receives the current value (or `init()` when absent
    /// or corrupt) so callers never write through a stale snapshot.
    /// Returns the stored result.
    pub fn update<T, I, F>(&self, key: &str, init: I, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        I: FnOnce() -> T,
        F: FnOnce(T) -> T,
    {
        let current = self.get_or_init(key, init);
        let next = f(current);
        self.put(key, &next)?;
        Ok(next)
    }

    /// Remove the value under `key` and publish the change.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.backend.remove(key)?;
        self.bus.publish(key);
        Ok(())
    }

    /// Re-read trigger for a change that happened in another context.
    /// Publishes a remote-origin event carrying only the key.
    pub fn notify_remote(&self, key: &str) {
        self.bus.publish_remote(key);
    }

    // --- Backup Boundary ---

    /// Serialize the entire key set to a single JSON object.
    ///
    /// Blob contents are deliberately not captured; a restored snapshot
    /// may reference photos that no longer resolve.
    pub fn export_snapshot(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        let mut doc = serde_json::Map::new();
        for key in self.backend.keys()? {
            if let Some(raw) = self.backend.load(&key)? {
                match serde_json::from_str(&raw) {
                    Ok(value) => {
                        doc.insert(key, value);
                    }
                    Err(e) => {
                        tracing::warn!(key, error = %e, "skipping corrupt value in backup");
                    }
                }
            }
        }
        Ok(doc)
    }

    /// Repopulate the store from a snapshot document.
    ///
    /// Existing keys not present in the snapshot are left untouched.
    /// Publishes a change for every restored key.
    pub fn import_snapshot(
        &self,
        doc: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        for (key, value) in doc {
            let raw = serde_json::to_string(value)?;
            self.backend.save(key, &raw)?;
            self.bus.publish(key);
        }
        Ok(())
    }
}
