//! Download/upload cycle with the club server.
//!
//! A successful download starts a new gate day: the roster is replaced and
//! the ledger and alert log are emptied. An upload clears them again, but
//! only once the server has confirmed it.

mod client;

pub use client::SyncClient;

use std::path::Path;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::error::{GateError, Result};
use crate::ledger::LedgerStore;
use crate::model::{ApiEnvelope, DirectorySnapshot, UploadPayload, UploadSummary};
use crate::season::{Season, SeasonCalendar};
use crate::storage::{encode, KeyValueStore, KvWrite, Storage, StorageKey};

/// Sync state shown by `gatehouse info`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub last_downloaded: Option<DateTime<Utc>>,
    pub is_fresh: bool,
    pub pending_check_ins: usize,
    pub pending_alerts: usize,
    pub season: Season,
}

pub struct SyncCoordinator<'a> {
    storage: &'a Storage,
    device_id: String,
    calendar: SeasonCalendar,
}

impl<'a> SyncCoordinator<'a> {
    pub fn new(storage: &'a Storage, device_id: impl Into<String>, calendar: SeasonCalendar) -> Self {
        Self {
            storage,
            device_id: device_id.into(),
            calendar,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Replace the roster, stamp the download time and reset the day.
    pub async fn ingest_download(&self, snapshot: &DirectorySnapshot) -> Result<()> {
        self.ingest_download_at(snapshot, Utc::now()).await
    }

    pub async fn ingest_download_at(
        &self,
        snapshot: &DirectorySnapshot,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.storage
            .write_batch(vec![
                KvWrite::Set(StorageKey::MemberData, encode(snapshot)?),
                KvWrite::Set(StorageKey::LastDownload, encode(&now.to_rfc3339())?),
                KvWrite::Clear(StorageKey::TodaysCheckIns),
                KvWrite::Clear(StorageKey::TodaysAlerts),
            ])
            .await?;
        tracing::info!(members = snapshot.members.len(), "member data ingested");
        Ok(())
    }

    /// When the roster was last downloaded. Unreadable stamps count as never.
    pub async fn last_downloaded(&self) -> Option<DateTime<Utc>> {
        let stamp = match self.storage.load_json::<String>(StorageKey::LastDownload).await {
            Ok(stamp) => stamp?,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read last download time");
                return None;
            }
        };
        match DateTime::parse_from_rfc3339(&stamp) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(e) => {
                tracing::warn!(error = %e, stamp = %stamp, "unparseable last download time");
                None
            }
        }
    }

    /// Whether the roster was downloaded on the current local calendar day.
    pub async fn is_fresh(&self) -> bool {
        self.is_fresh_at(Local::now()).await
    }

    pub async fn is_fresh_at(&self, now: DateTime<Local>) -> bool {
        self.last_downloaded()
            .await
            .is_some_and(|ts| ts.with_timezone(&Local).date_naive() == now.date_naive())
    }

    /// Assemble the upload body from today's ledger and alerts. Read-only.
    pub async fn prepare_upload(&self) -> Result<UploadPayload> {
        let store = LedgerStore::new(self.storage);
        let checkins = store.load_check_ins().await?.into_entries();
        let alerts = store.load_alerts().await?.into_entries();
        Ok(UploadPayload {
            checkins,
            alerts,
            device_id: self.device_id.clone(),
            season: self.calendar.current_season(),
        })
    }

    /// Empty the ledger and alert log after the server confirmed an upload.
    pub async fn finalize_upload(&self) -> Result<()> {
        LedgerStore::new(self.storage).clear().await?;
        tracing::info!("local ledger cleared after upload");
        Ok(())
    }

    /// Fetch the roster and ingest it. Returns the member count.
    pub async fn download(&self, client: &SyncClient) -> Result<usize> {
        let snapshot = client.download().await?;
        self.ingest_download(&snapshot).await?;
        Ok(snapshot.members.len())
    }

    /// Prepare, send and finalize. `None` when there was nothing to send.
    /// The ledger is left untouched unless the server accepted the upload.
    pub async fn upload(&self, client: &SyncClient) -> Result<Option<UploadSummary>> {
        let payload = self.prepare_upload().await?;
        if payload.is_empty() {
            tracing::debug!("nothing to upload");
            return Ok(None);
        }
        let summary = client.upload(&payload).await?;
        tracing::info!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            duplicates = summary.duplicates,
            "upload accepted"
        );
        self.finalize_upload().await?;
        Ok(Some(summary))
    }

    pub async fn status(&self) -> SyncStatus {
        let store = LedgerStore::new(self.storage);
        SyncStatus {
            is_fresh: self.is_fresh().await,
            last_downloaded: self.last_downloaded().await,
            pending_check_ins: store.read_check_ins().await.len(),
            pending_alerts: store.read_alerts().await.len(),
            season: self.calendar.current_season(),
        }
    }

    /// Ingest a roster saved to disk. Returns the member count.
    pub async fn import_file(&self, path: &Path) -> Result<usize> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| GateError::InvalidInput(format!("cannot read {}: {e}", path.display())))?;
        let snapshot = parse_snapshot(&bytes, &path.display().to_string())?;
        self.ingest_download(&snapshot).await?;
        Ok(snapshot.members.len())
    }
}

/// Decode a roster file: either a bare snapshot or a full download envelope.
pub fn parse_snapshot(bytes: &[u8], source: &str) -> Result<DirectorySnapshot> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| GateError::malformed(source, e))?;
    if value.get("members").is_some() {
        return serde_json::from_value(value).map_err(|e| GateError::malformed(source, e));
    }
    let envelope: ApiEnvelope<DirectorySnapshot> =
        serde_json::from_value(value).map_err(|e| GateError::malformed(source, e))?;
    envelope
        .data
        .ok_or_else(|| GateError::InvalidInput(format!("{source} has no member data")))
}
