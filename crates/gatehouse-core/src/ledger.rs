//! Today's check-in ledger and alert log, and their storage adapter.
//!
//! [`CheckInLedger`] and [`AlertLog`] are plain in-memory collections.
//! [`LedgerStore`] moves them in and out of the key-value store: a mutation
//! loads once, changes the collections, and commits both in one batch.

use crate::error::{GateError, Result};
use crate::model::{same_name, Alert, CheckIn, Guest, ProfileId};
use crate::storage::{encode, KeyValueStore, KvWrite, Storage, StorageKey};

/// The day's check-ins. Holds at most one [`CheckIn`] per profile id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckInLedger {
    entries: Vec<CheckIn>,
}

impl CheckInLedger {
    /// Build a ledger from stored records. Repeated profile ids are merged
    /// into the first record so the one-per-member invariant holds even for
    /// ledgers written by older builds.
    pub fn from_entries(records: Vec<CheckIn>) -> Self {
        let mut ledger = Self::default();
        for record in records {
            match ledger.find_mut(record.profile_id) {
                Some(existing) => {
                    tracing::warn!(
                        profile_id = record.profile_id,
                        "merging duplicate check-in record"
                    );
                    existing.guests.extend(record.guests);
                }
                None => ledger.entries.push(record),
            }
        }
        ledger
    }

    pub fn entries(&self) -> &[CheckIn] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<CheckIn> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, profile_id: ProfileId) -> Option<&CheckIn> {
        self.entries.iter().find(|c| c.profile_id == profile_id)
    }

    fn find_mut(&mut self, profile_id: ProfileId) -> Option<&mut CheckIn> {
        self.entries.iter_mut().find(|c| c.profile_id == profile_id)
    }

    pub fn is_checked_in(&self, profile_id: ProfileId) -> bool {
        self.find(profile_id).is_some()
    }

    /// Guest names already on the member's record today, in order.
    pub fn guest_names_for(&self, profile_id: ProfileId) -> Vec<String> {
        self.find(profile_id)
            .map(|c| c.guest_names())
            .unwrap_or_default()
    }

    /// Number of today's guest entries for the member matching `guest_name`.
    pub fn guest_entries_for(&self, profile_id: ProfileId, guest_name: &str) -> usize {
        self.find(profile_id)
            .map(|c| {
                c.guests
                    .iter()
                    .filter(|g| same_name(&g.name, guest_name))
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn append(&mut self, checkin: CheckIn) -> Result<()> {
        if self.is_checked_in(checkin.profile_id) {
            return Err(GateError::InvalidInput(format!(
                "profile {} already has a check-in today",
                checkin.profile_id
            )));
        }
        self.entries.push(checkin);
        Ok(())
    }

    /// Append guests to the member's existing record.
    pub fn append_guests(&mut self, profile_id: ProfileId, guests: Vec<Guest>) -> Result<&CheckIn> {
        let record = self
            .find_mut(profile_id)
            .ok_or_else(|| GateError::NotFound(format!("no check-in today for profile {profile_id}")))?;
        record.guests.extend(guests);
        Ok(record)
    }
}

/// The day's flagged events, in the order they were raised.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertLog {
    entries: Vec<Alert>,
}

impl AlertLog {
    pub fn from_entries(entries: Vec<Alert>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Alert] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Alert> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, alert: Alert) {
        self.entries.push(alert);
    }

    pub fn extend(&mut self, alerts: impl IntoIterator<Item = Alert>) {
        self.entries.extend(alerts);
    }
}

/// Storage adapter for the ledger and alert log.
///
/// `load_*` fail on storage or decode faults and back every mutation.
/// `read_*` log the fault and fall back to empty; they serve display paths.
pub struct LedgerStore<'a> {
    storage: &'a Storage,
}

impl<'a> LedgerStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn load_check_ins(&self) -> Result<CheckInLedger> {
        let records: Vec<CheckIn> = self
            .storage
            .load_json(StorageKey::TodaysCheckIns)
            .await?
            .unwrap_or_default();
        Ok(CheckInLedger::from_entries(records))
    }

    pub async fn read_check_ins(&self) -> CheckInLedger {
        self.load_check_ins().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to read today's check-ins, treating as empty");
            CheckInLedger::default()
        })
    }

    pub async fn load_alerts(&self) -> Result<AlertLog> {
        let records: Vec<Alert> = self
            .storage
            .load_json(StorageKey::TodaysAlerts)
            .await?
            .unwrap_or_default();
        Ok(AlertLog::from_entries(records))
    }

    pub async fn read_alerts(&self) -> AlertLog {
        self.load_alerts().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to read today's alerts, treating as empty");
            AlertLog::default()
        })
    }

    /// Write the ledger, and the alert log when given, in one batch.
    pub async fn commit(&self, ledger: &CheckInLedger, alerts: Option<&AlertLog>) -> Result<()> {
        let mut writes = vec![KvWrite::Set(
            StorageKey::TodaysCheckIns,
            encode(ledger.entries())?,
        )];
        if let Some(alerts) = alerts {
            writes.push(KvWrite::Set(StorageKey::TodaysAlerts, encode(alerts.entries())?));
        }
        self.storage.write_batch(writes).await?;
        tracing::debug!(
            check_ins = ledger.len(),
            alerts = alerts.map(AlertLog::len),
            "ledger committed"
        );
        Ok(())
    }

    pub async fn save_alerts(&self, alerts: &AlertLog) -> Result<()> {
        self.storage
            .save_json(StorageKey::TodaysAlerts, alerts.entries())
            .await
    }

    /// Empty both the ledger and the alert log.
    pub async fn clear(&self) -> Result<()> {
        self.storage
            .write_batch(vec![
                KvWrite::Clear(StorageKey::TodaysCheckIns),
                KvWrite::Clear(StorageKey::TodaysAlerts),
            ])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::season::Season;
    use chrono::{NaiveDate, NaiveTime};

    fn checkin(profile_id: ProfileId, guests: &[&str]) -> CheckIn {
        CheckIn::new(
            profile_id,
            NaiveDate::from_ymd_opt(2025, 7, 4).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        )
        .with_guests(guests.iter().map(|g| Guest::new(*g)).collect())
    }

    #[test]
    fn append_rejects_second_record_for_member() {
        let mut ledger = CheckInLedger::default();
        ledger.append(checkin(1, &[])).unwrap();
        assert!(ledger.append(checkin(1, &["Sam"])).is_err());
        assert_eq!(ledger.len(), 1);
        assert!(ledger.find(1).unwrap().guests.is_empty());
    }

    #[test]
    fn append_guests_extends_in_place() {
        let mut ledger = CheckInLedger::default();
        ledger.append(checkin(1, &["Sam"])).unwrap();
        let record = ledger.append_guests(1, vec![Guest::new("Ari")]).unwrap();
        assert_eq!(record.guest_names(), vec!["Sam", "Ari"]);
        assert!(ledger.append_guests(2, vec![Guest::new("Jo")]).is_err());
    }

    #[test]
    fn from_entries_merges_duplicates() {
        let ledger = CheckInLedger::from_entries(vec![
            checkin(1, &["Sam"]),
            checkin(2, &[]),
            checkin(1, &["Ari"]),
        ]);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.guest_names_for(1), vec!["Sam", "Ari"]);
    }

    #[test]
    fn guest_entries_for_is_case_insensitive() {
        let mut ledger = CheckInLedger::default();
        ledger.append(checkin(1, &["Sam", "ari"])).unwrap();
        assert_eq!(ledger.guest_entries_for(1, "SAM"), 1);
        assert_eq!(ledger.guest_entries_for(1, "Jo"), 0);
        assert_eq!(ledger.guest_entries_for(2, "Sam"), 0);
    }

    #[tokio::test]
    async fn commit_and_reload() {
        let storage = Storage::in_memory();
        let store = LedgerStore::new(&storage);

        let mut ledger = store.load_check_ins().await.unwrap();
        ledger.append(checkin(5, &["Sam"])).unwrap();
        let mut alerts = store.load_alerts().await.unwrap();
        alerts.append(Alert::manual(Some(5), None, Season::summer(2025), "note"));
        store.commit(&ledger, Some(&alerts)).await.unwrap();

        assert_eq!(store.load_check_ins().await.unwrap(), ledger);
        assert_eq!(store.load_alerts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn read_degrades_but_load_fails_on_garbage() {
        let storage = Storage::in_memory();
        storage
            .set(StorageKey::TodaysCheckIns, b"[{\"oops\":true}]".to_vec())
            .await
            .unwrap();
        let store = LedgerStore::new(&storage);
        assert!(store.read_check_ins().await.is_empty());
        assert!(matches!(
            store.load_check_ins().await,
            Err(GateError::MalformedRecord { .. })
        ));
    }

    #[tokio::test]
    async fn clear_twice_is_fine() {
        let storage = Storage::in_memory();
        let store = LedgerStore::new(&storage);
        let mut ledger = CheckInLedger::default();
        ledger.append(checkin(1, &[])).unwrap();
        store.commit(&ledger, None).await.unwrap();

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load_check_ins().await.unwrap().is_empty());
        assert!(store.load_alerts().await.unwrap().is_empty());
    }
}
