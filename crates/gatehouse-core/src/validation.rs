//! Guest validation: the per-day guest cap and the seasonal visit quota.
//!
//! The cap is a hard rejection. The quota never rejects: a guest past the
//! quota is admitted, annotated, and reported through an [`Alert`].

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::RulesConfig;
use crate::directory::MemberDirectory;
use crate::ledger::{AlertLog, CheckInLedger};
use crate::model::{same_name, Alert, Guest, ProfileId};
use crate::season::{Season, SeasonCalendar};

/// Marker placed in a guest's notes when the guest is over the seasonal quota.
pub const OVER_LIMIT_MARKER: &str = "ALERT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestRules {
    /// A guest is flagged once their visit number for a member exceeds this.
    pub max_visits_per_season: usize,
    pub max_guests_per_day: usize,
    pub calendar: SeasonCalendar,
}

impl Default for GuestRules {
    fn default() -> Self {
        Self::from(&RulesConfig::default())
    }
}

impl From<&RulesConfig> for GuestRules {
    fn from(rules: &RulesConfig) -> Self {
        Self {
            max_visits_per_season: rules.max_visits_per_season,
            max_guests_per_day: rules.max_guests_per_day,
            calendar: rules.calendar(),
        }
    }
}

/// Result of the per-day cap check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestCountCheck {
    pub valid: bool,
    pub message: Option<String>,
}

/// Guests ready to be written, plus the ones that were flagged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedGuests {
    /// Every non-blank guest, flagged ones included.
    pub processed: Vec<Guest>,
    pub over_limit: Vec<Guest>,
}

pub struct GuestValidator<'a> {
    directory: &'a MemberDirectory,
    rules: &'a GuestRules,
}

impl<'a> GuestValidator<'a> {
    pub fn new(directory: &'a MemberDirectory, rules: &'a GuestRules) -> Self {
        Self { directory, rules }
    }

    /// Visits of `guest_name` to this member in `season`: historical visits
    /// from the roster plus entries already on today's ledger. Counted per
    /// member; the same guest with another member counts separately.
    pub fn count_guest_visits(
        &self,
        guest_name: &str,
        profile_id: ProfileId,
        season: Season,
        todays: &CheckInLedger,
    ) -> usize {
        let historical = self
            .directory
            .get(profile_id)
            .map(|member| {
                member
                    .guest_visits
                    .iter()
                    .filter(|v| same_name(&v.guest_name, guest_name))
                    .filter(|v| self.rules.calendar.season_of(v.visit_date) == season)
                    .count()
            })
            .unwrap_or(0);

        historical + todays.guest_entries_for(profile_id, guest_name)
    }

    /// Check one guest against the seasonal quota.
    ///
    /// Blank names and names already recorded for the member today are
    /// never flagged. Otherwise, when this visit's number exceeds the quota,
    /// the guest's notes get an [`OVER_LIMIT_MARKER`] line, an alert is
    /// appended to `alerts`, and `true` is returned. The guest is admitted
    /// either way.
    pub fn flag_over_visit_limit(
        &self,
        guest: &mut Guest,
        profile_id: ProfileId,
        todays_names: &[String],
        todays: &CheckInLedger,
        visit_date: NaiveDate,
        alerts: &mut AlertLog,
    ) -> bool {
        let name = guest.name.trim();
        if name.is_empty() || todays_names.iter().any(|n| same_name(n, name)) {
            return false;
        }

        let season = self.rules.calendar.season_of(visit_date);
        let visit_number = self.count_guest_visits(name, profile_id, season, todays) + 1;
        if visit_number <= self.rules.max_visits_per_season {
            return false;
        }

        let limit = self.rules.max_visits_per_season;
        tracing::info!(
            profile_id,
            guest = name,
            visit_number,
            limit,
            %season,
            "guest over seasonal visit limit"
        );
        let alert = Alert::guest_limit(profile_id, name, visit_date, season, visit_number, limit);
        guest.annotate(&format!(
            "{OVER_LIMIT_MARKER}: visit #{visit_number} this season (limit {limit})"
        ));
        alerts.append(alert);
        true
    }

    /// Per-day cap: `current + proposed` may not exceed the configured maximum.
    pub fn validate_guest_count(&self, current: usize, proposed: usize) -> GuestCountCheck {
        let cap = self.rules.max_guests_per_day;
        let total = current + proposed;
        if total <= cap {
            return GuestCountCheck {
                valid: true,
                message: None,
            };
        }
        let remaining = cap.saturating_sub(current);
        GuestCountCheck {
            valid: false,
            message: Some(format!(
                "Cannot add {proposed} guest(s): that would make {total}, over the limit of {cap} \
                 guests per member per day (currently {current}, {remaining} more allowed)."
            )),
        }
    }

    /// Drop blank names, then run the quota check on each remaining guest.
    ///
    /// Names are matched against `existing_names` and against earlier guests
    /// of the same submission, so nobody is flagged twice.
    pub fn process_guests(
        &self,
        guests: Vec<Guest>,
        profile_id: ProfileId,
        todays: &CheckInLedger,
        existing_names: &[String],
        visit_date: NaiveDate,
        alerts: &mut AlertLog,
    ) -> ProcessedGuests {
        let mut seen: Vec<String> = existing_names.to_vec();
        let mut result = ProcessedGuests::default();

        for mut guest in guests.into_iter().map(normalize) {
            if guest.is_blank() {
                continue;
            }
            if self.flag_over_visit_limit(&mut guest, profile_id, &seen, todays, visit_date, alerts)
            {
                result.over_limit.push(guest.clone());
            }
            seen.push(guest.name.clone());
            result.processed.push(guest);
        }
        result
    }

    /// Quick-select suggestions: every guest name seen for the member, from
    /// the roster history and today's ledger, first spelling wins.
    pub fn previous_guest_names(&self, profile_id: ProfileId, todays: &CheckInLedger) -> Vec<String> {
        let historical = self
            .directory
            .get(profile_id)
            .into_iter()
            .flat_map(|m| m.guest_visits.iter().map(|v| v.guest_name.clone()));
        let today = todays.guest_names_for(profile_id);

        let mut seen = HashSet::new();
        historical
            .chain(today)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .filter(|name| seen.insert(name.to_lowercase()))
            .collect()
    }
}

fn normalize(guest: Guest) -> Guest {
    Guest {
        name: guest.name.trim().to_string(),
        notes: guest.notes.filter(|n| !n.trim().is_empty()),
    }
}

/// Count of guests that will actually be recorded (non-blank names).
pub fn admissible_count(guests: &[Guest]) -> usize {
    guests.iter().filter(|g| !g.is_blank()).count()
}
