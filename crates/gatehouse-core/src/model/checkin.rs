use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use super::member::ProfileId;

/// Case-insensitive guest name comparison, ignoring surrounding whitespace.
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// A guest attached to today's check-in. Guests have no identity of their
/// own; they are matched across records by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Guest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
    }

    /// Append a note, keeping anything already recorded for the guest.
    pub fn annotate(&mut self, note: &str) {
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.trim().is_empty() => format!("{existing} | {note}"),
            _ => note.to_string(),
        });
    }
}

/// One member's check-in for the day. At most one exists per profile id in
/// the ledger; later guest additions extend `guests` in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    pub profile_id: ProfileId,
    pub check_in_date: NaiveDate,
    pub check_in_time: NaiveTime,
    #[serde(default)]
    pub guests: Vec<Guest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CheckIn {
    pub fn new(profile_id: ProfileId, date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            profile_id,
            check_in_date: date,
            check_in_time: time.with_nanosecond(0).unwrap_or(time),
            guests: Vec::new(),
            notes: None,
        }
    }

    pub fn with_guests(mut self, guests: Vec<Guest>) -> Self {
        self.guests = guests;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn guest_names(&self) -> Vec<String> {
        self.guests.iter().map(|g| g.name.clone()).collect()
    }
}
