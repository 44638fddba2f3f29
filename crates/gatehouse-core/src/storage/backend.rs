use crate::error::Result;

/// Logical keys of the day's persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    MemberData,
    TodaysCheckIns,
    TodaysAlerts,
    LastDownload,
}

impl StorageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MemberData => "member_data",
            Self::TodaysCheckIns => "todays_checkins",
            Self::TodaysAlerts => "todays_alerts",
            Self::LastDownload => "last_download",
        }
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a [`KeyValueStore::write_batch`].
#[derive(Debug, Clone, PartialEq)]
pub enum KvWrite {
    Set(StorageKey, Vec<u8>),
    Clear(StorageKey),
}

/// Opaque key-value persistence for the day's session.
///
/// Values are serialized records; the store never interprets them.
pub trait KeyValueStore: Send + Sync {
    fn get(
        &self,
        key: StorageKey,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;

    fn set(
        &self,
        key: StorageKey,
        value: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Remove the key. Clearing a missing key is not an error.
    fn clear(&self, key: StorageKey) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Apply several writes together; either all land or none do.
    fn write_batch(
        &self,
        writes: Vec<KvWrite>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
