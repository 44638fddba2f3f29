//! Check-in service: "check in a member" and "add guests" as single
//! read-validate-write operations over today's ledger.

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::directory::MemberDirectory;
use crate::error::{GateError, Result};
use crate::ledger::{AlertLog, LedgerStore};
use crate::model::{Alert, CheckIn, Guest, Member, ProfileId};
use crate::validation::{admissible_count, GuestRules, GuestValidator};

/// Why a check-in operation was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    AlreadyCheckedIn,
    NotCheckedIn,
    GuestLimitExceeded,
    UnknownMember,
}

/// Result shown to staff. Business-rule failures come back here with
/// `success: false`; only storage faults are returned as errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckInOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    /// Guests admitted but over the seasonal visit quota.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flagged_guests: Vec<String>,
}

impl CheckInOutcome {
    fn ok(message: String, flagged_guests: Vec<String>) -> Self {
        Self {
            success: true,
            message,
            rejection: None,
            flagged_guests,
        }
    }

    fn rejected(rejection: Rejection, message: String) -> Self {
        Self {
            success: false,
            message,
            rejection: Some(rejection),
            flagged_guests: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberStatus {
    pub profile_id: ProfileId,
    pub name: Option<String>,
    pub checked_in: bool,
    pub check_in: Option<CheckIn>,
}

pub struct CheckInService<'a> {
    store: LedgerStore<'a>,
    directory: &'a MemberDirectory,
    rules: GuestRules,
}

impl<'a> CheckInService<'a> {
    pub fn new(store: LedgerStore<'a>, directory: &'a MemberDirectory, rules: GuestRules) -> Self {
        Self {
            store,
            directory,
            rules,
        }
    }

    fn validator(&self) -> GuestValidator<'_> {
        GuestValidator::new(self.directory, &self.rules)
    }

    fn display_name(&self, profile_id: ProfileId) -> String {
        self.directory
            .get(profile_id)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| format!("Member {profile_id}"))
    }

    pub async fn status(&self, profile_id: ProfileId) -> MemberStatus {
        let ledger = self.store.read_check_ins().await;
        let check_in = ledger.find(profile_id).cloned();
        MemberStatus {
            profile_id,
            name: self.directory.get(profile_id).map(|m| m.name.clone()),
            checked_in: check_in.is_some(),
            check_in,
        }
    }

    pub async fn todays_check_ins(&self) -> Vec<CheckIn> {
        self.store.read_check_ins().await.into_entries()
    }

    pub async fn todays_alerts(&self) -> Vec<Alert> {
        self.store.read_alerts().await.into_entries()
    }

    pub async fn previous_guest_names(&self, profile_id: ProfileId) -> Vec<String> {
        let ledger = self.store.read_check_ins().await;
        self.validator().previous_guest_names(profile_id, &ledger)
    }

    /// Look the member up in the directory, then [`check_in`](Self::check_in).
    pub async fn check_in_by_id(
        &self,
        profile_id: ProfileId,
        guests: Vec<Guest>,
        notes: Option<String>,
    ) -> Result<CheckInOutcome> {
        let Some(member) = self.directory.get(profile_id) else {
            return Ok(CheckInOutcome::rejected(
                Rejection::UnknownMember,
                format!("No member with profile id {profile_id} in the downloaded roster."),
            ));
        };
        self.check_in(member, guests, notes).await
    }

    pub async fn check_in(
        &self,
        member: &Member,
        guests: Vec<Guest>,
        notes: Option<String>,
    ) -> Result<CheckInOutcome> {
        self.check_in_at(member, guests, notes, Local::now().naive_local())
            .await
    }

    /// First check-in of the day for `member`, optionally with guests.
    pub async fn check_in_at(
        &self,
        member: &Member,
        guests: Vec<Guest>,
        notes: Option<String>,
        now: NaiveDateTime,
    ) -> Result<CheckInOutcome> {
        let mut ledger = self.store.load_check_ins().await?;

        if ledger.is_checked_in(member.profile_id) {
            return Ok(CheckInOutcome::rejected(
                Rejection::AlreadyCheckedIn,
                format!("{} is already checked in today.", member.name),
            ));
        }

        let validator = self.validator();
        let count = validator.validate_guest_count(0, admissible_count(&guests));
        if !count.valid {
            return Ok(CheckInOutcome::rejected(
                Rejection::GuestLimitExceeded,
                count.message.unwrap_or_default(),
            ));
        }

        let mut new_alerts = AlertLog::default();
        let processed = validator.process_guests(
            guests,
            member.profile_id,
            &ledger,
            &[],
            now.date(),
            &mut new_alerts,
        );
        let admitted = processed.processed.len();
        let flagged: Vec<String> = processed.over_limit.into_iter().map(|g| g.name).collect();

        let record = CheckIn::new(member.profile_id, now.date(), now.time())
            .with_guests(processed.processed)
            .with_notes(notes);
        ledger.append(record)?;
        self.commit(&ledger, new_alerts).await?;

        tracing::info!(
            profile_id = member.profile_id,
            guests = admitted,
            flagged = flagged.len(),
            "member checked in"
        );

        let message = if admitted > 0 {
            format!("{} checked in with {admitted} guest(s).", member.name)
        } else {
            format!("{} checked in.", member.name)
        };
        Ok(CheckInOutcome::ok(message, flagged))
    }

    pub async fn add_guests(
        &self,
        profile_id: ProfileId,
        guests: Vec<Guest>,
    ) -> Result<CheckInOutcome> {
        self.add_guests_at(profile_id, guests, Local::now().naive_local())
            .await
    }

    /// Add guests to a member's existing check-in for the day.
    pub async fn add_guests_at(
        &self,
        profile_id: ProfileId,
        guests: Vec<Guest>,
        now: NaiveDateTime,
    ) -> Result<CheckInOutcome> {
        let mut ledger = self.store.load_check_ins().await?;
        let name = self.display_name(profile_id);

        let Some(existing) = ledger.find(profile_id) else {
            return Ok(CheckInOutcome::rejected(
                Rejection::NotCheckedIn,
                format!("{name} is not checked in today. Check them in first."),
            ));
        };
        let current = existing.guests.len();

        let validator = self.validator();
        let count = validator.validate_guest_count(current, admissible_count(&guests));
        if !count.valid {
            return Ok(CheckInOutcome::rejected(
                Rejection::GuestLimitExceeded,
                count.message.unwrap_or_default(),
            ));
        }

        let existing_names = ledger.guest_names_for(profile_id);
        let mut new_alerts = AlertLog::default();
        let processed = validator.process_guests(
            guests,
            profile_id,
            &ledger,
            &existing_names,
            now.date(),
            &mut new_alerts,
        );
        let added = processed.processed.len();
        if added == 0 {
            return Ok(CheckInOutcome::ok(
                format!("No guests to add for {name}."),
                Vec::new(),
            ));
        }
        let flagged: Vec<String> = processed.over_limit.into_iter().map(|g| g.name).collect();

        let total = ledger.append_guests(profile_id, processed.processed)?.guests.len();
        self.commit(&ledger, new_alerts).await?;

        tracing::info!(profile_id, added, total, flagged = flagged.len(), "guests added");
        Ok(CheckInOutcome::ok(
            format!("Added {added} guest(s) for {name} ({total} today)."),
            flagged,
        ))
    }

    pub async fn create_manual_alert(
        &self,
        profile_id: Option<ProfileId>,
        guest_name: Option<String>,
        message: &str,
    ) -> Result<Alert> {
        self.create_manual_alert_on(profile_id, guest_name, message, Local::now().date_naive())
            .await
    }

    /// Record a staff note for the day. `profile_id` may be `None` for
    /// events not tied to a member.
    pub async fn create_manual_alert_on(
        &self,
        profile_id: Option<ProfileId>,
        guest_name: Option<String>,
        message: &str,
        today: NaiveDate,
    ) -> Result<Alert> {
        let message = message.trim();
        if message.is_empty() {
            return Err(GateError::InvalidInput("alert message cannot be empty".into()));
        }
        let guest_name = guest_name
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());
        let alert = Alert::manual(
            profile_id.filter(|id| *id != 0),
            guest_name,
            self.rules.calendar.season_of(today),
            message,
        );

        let mut alerts = self.store.load_alerts().await?;
        alerts.append(alert.clone());
        self.store.save_alerts(&alerts).await?;
        tracing::info!(profile_id = ?alert.profile_id, "manual alert recorded");
        Ok(alert)
    }

    /// Write the ledger, folding any new alerts into the stored log.
    async fn commit(&self, ledger: &crate::ledger::CheckInLedger, new_alerts: AlertLog) -> Result<()> {
        if new_alerts.is_empty() {
            return self.store.commit(ledger, None).await;
        }
        let mut alerts = self.store.load_alerts().await?;
        alerts.extend(new_alerts.into_entries());
        self.store.commit(ledger, Some(&alerts)).await
    }
}
