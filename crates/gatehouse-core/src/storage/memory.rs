use std::collections::HashMap;
use std::sync::Mutex;

use super::backend::{KeyValueStore, KvWrite, StorageKey};
use crate::error::{GateError, Result};

/// In-process store. Nothing survives the process; used by tests and by
/// `backend = "memory"` for dry runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StorageKey, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<StorageKey, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|e| GateError::Storage(format!("memory store poisoned: {e}")))
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: StorageKey) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(&key).cloned())
    }

    async fn set(&self, key: StorageKey, value: Vec<u8>) -> Result<()> {
        self.lock()?.insert(key, value);
        Ok(())
    }

    async fn clear(&self, key: StorageKey) -> Result<()> {
        self.lock()?.remove(&key);
        Ok(())
    }

    async fn write_batch(&self, writes: Vec<KvWrite>) -> Result<()> {
        let mut entries = self.lock()?;
        for write in writes {
            match write {
                KvWrite::Set(key, value) => {
                    entries.insert(key, value);
                }
                KvWrite::Clear(key) => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_clear() {
        let store = MemoryStore::new();
        store.set(StorageKey::MemberData, vec![1, 2, 3]).await.unwrap();
        assert_eq!(
            store.get(StorageKey::MemberData).await.unwrap(),
            Some(vec![1, 2, 3])
        );
        store.clear(StorageKey::MemberData).await.unwrap();
        assert!(store.get(StorageKey::MemberData).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_batch_mixes_set_and_clear() {
        let store = MemoryStore::new();
        store.set(StorageKey::TodaysAlerts, vec![9]).await.unwrap();
        store
            .write_batch(vec![
                KvWrite::Set(StorageKey::LastDownload, vec![1]),
                KvWrite::Clear(StorageKey::TodaysAlerts),
            ])
            .await
            .unwrap();
        assert!(store.get(StorageKey::TodaysAlerts).await.unwrap().is_none());
        assert_eq!(store.get(StorageKey::LastDownload).await.unwrap(), Some(vec![1]));
    }
}
