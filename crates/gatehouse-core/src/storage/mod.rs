mod backend;
mod memory;
mod sqlite;

pub use backend::{KeyValueStore, KvWrite, StorageKey};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::GateConfig;
use crate::error::{GateError, Result};

/// Enum wrapper for storage backends. Dispatches to the concrete implementation.
/// Using an enum instead of `Box<dyn KeyValueStore>` because the trait uses RPITIT.
pub enum Storage {
    Sqlite(SqliteStore),
    Memory(MemoryStore),
}

impl KeyValueStore for Storage {
    async fn get(&self, key: StorageKey) -> Result<Option<Vec<u8>>> {
        match self {
            Storage::Sqlite(s) => s.get(key).await,
            Storage::Memory(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: StorageKey, value: Vec<u8>) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.set(key, value).await,
            Storage::Memory(s) => s.set(key, value).await,
        }
    }

    async fn clear(&self, key: StorageKey) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.clear(key).await,
            Storage::Memory(s) => s.clear(key).await,
        }
    }

    async fn write_batch(&self, writes: Vec<KvWrite>) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.write_batch(writes).await,
            Storage::Memory(s) => s.write_batch(writes).await,
        }
    }
}

impl Storage {
    /// Fresh in-memory storage.
    pub fn in_memory() -> Self {
        Storage::Memory(MemoryStore::new())
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Storage::Sqlite(_) => "sqlite",
            Storage::Memory(_) => "memory",
        }
    }

    /// Read and decode a JSON record. A missing key is `Ok(None)`; bytes that
    /// do not match `T` are [`GateError::MalformedRecord`].
    pub async fn load_json<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| GateError::malformed(key.as_str(), e)),
            None => Ok(None),
        }
    }

    pub async fn save_json<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) -> Result<()> {
        let bytes = encode(value)?;
        self.set(key, bytes).await
    }
}

/// Encode a record for a [`KvWrite::Set`].
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Create a storage backend from the given configuration.
pub fn create_backend(config: &GateConfig) -> Result<Storage> {
    match config.storage.backend.as_str() {
        "sqlite" => {
            let path = match &config.storage.path {
                Some(p) => std::path::PathBuf::from(p),
                None => default_sqlite_path()?,
            };
            let store = SqliteStore::open(&path)?;
            tracing::debug!(path = %path.display(), "opened sqlite store");
            Ok(Storage::Sqlite(store))
        }
        "memory" => Ok(Storage::in_memory()),
        other => Err(GateError::Config(format!(
            "unknown storage backend: {other}"
        ))),
    }
}

/// Default SQLite path: `~/.config/gatehouse/gatehouse.db`
fn default_sqlite_path() -> Result<std::path::PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("gatehouse").join("gatehouse.db"))
        .ok_or_else(|| GateError::Config("cannot determine config directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_json_missing_is_none() {
        let storage = Storage::in_memory();
        let value: Option<Vec<u32>> = storage.load_json(StorageKey::TodaysAlerts).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn load_json_malformed_names_key() {
        let storage = Storage::in_memory();
        storage
            .set(StorageKey::TodaysCheckIns, b"{not json".to_vec())
            .await
            .unwrap();
        let err = storage
            .load_json::<Vec<u32>>(StorageKey::TodaysCheckIns)
            .await
            .unwrap_err();
        match err {
            GateError::MalformedRecord { key, .. } => assert_eq!(key, "todays_checkins"),
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn save_then_load_json() {
        let storage = Storage::Sqlite(SqliteStore::open_in_memory().unwrap());
        storage
            .save_json(StorageKey::TodaysAlerts, &vec![1u32, 2, 3])
            .await
            .unwrap();
        let back: Vec<u32> = storage
            .load_json(StorageKey::TodaysAlerts)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn create_backend_rejects_unknown() {
        let mut config = GateConfig::default_config();
        config.storage.backend = "redis".into();
        assert!(matches!(
            create_backend(&config),
            Err(GateError::Config(_))
        ));
    }

    #[test]
    fn create_backend_memory() {
        let mut config = GateConfig::default_config();
        config.storage.backend = "memory".into();
        let storage = create_backend(&config).unwrap();
        assert_eq!(storage.backend_name(), "memory");
    }
}
