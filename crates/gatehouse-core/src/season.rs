//! Season calculator: buckets a calendar date into a warm or cold half-year.
//!
//! The guest-visit quota is scoped to a season, so every visit date (historical
//! or from today's ledger) is mapped through [`SeasonCalendar::season_of`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// First month (inclusive) of the warm season when no config overrides it.
pub const DEFAULT_WARM_START_MONTH: u32 = 5;
/// Last month (inclusive) of the warm season when no config overrides it.
pub const DEFAULT_WARM_END_MONTH: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeasonHalf {
    Summer,
    Winter,
}

impl SeasonHalf {
    fn prefix(self) -> char {
        match self {
            Self::Summer => 'S',
            Self::Winter => 'W',
        }
    }
}

/// A season tag such as `S2025` or `W2025`.
///
/// Serialized as its tag string so it can travel in alert records and the
/// upload payload unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Season {
    pub half: SeasonHalf,
    pub year: i32,
}

impl Season {
    pub fn summer(year: i32) -> Self {
        Self {
            half: SeasonHalf::Summer,
            year,
        }
    }

    pub fn winter(year: i32) -> Self {
        Self {
            half: SeasonHalf::Winter,
            year,
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.half.prefix(), self.year)
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let half = match chars.next() {
            Some('S') | Some('s') => SeasonHalf::Summer,
            Some('W') | Some('w') => SeasonHalf::Winter,
            _ => return Err(format!("invalid season tag '{s}' (expected S<year> or W<year>)")),
        };
        let year: i32 = chars
            .as_str()
            .parse()
            .map_err(|_| format!("invalid season year in '{s}'"))?;
        Ok(Self { half, year })
    }
}

impl From<Season> for String {
    fn from(season: Season) -> Self {
        season.to_string()
    }
}

impl TryFrom<String> for Season {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Maps dates to seasons using a contiguous, inclusive warm-month window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonCalendar {
    warm_start_month: u32,
    warm_end_month: u32,
}

impl Default for SeasonCalendar {
    fn default() -> Self {
        Self {
            warm_start_month: DEFAULT_WARM_START_MONTH,
            warm_end_month: DEFAULT_WARM_END_MONTH,
        }
    }
}

impl SeasonCalendar {
    /// Build a calendar for the inclusive month window `start..=end`.
    pub fn new(warm_start_month: u32, warm_end_month: u32) -> Result<Self> {
        if !(1..=12).contains(&warm_start_month) || !(1..=12).contains(&warm_end_month) {
            return Err(GateError::InvalidInput(format!(
                "warm season months must be within 1..=12 (got {warm_start_month}..={warm_end_month})"
            )));
        }
        if warm_start_month > warm_end_month {
            return Err(GateError::InvalidInput(format!(
                "warm season start month {warm_start_month} is after end month {warm_end_month}"
            )));
        }
        Ok(Self {
            warm_start_month,
            warm_end_month,
        })
    }

    pub fn warm_months(&self) -> (u32, u32) {
        (self.warm_start_month, self.warm_end_month)
    }

    pub fn season_of(&self, date: NaiveDate) -> Season {
        let half = if (self.warm_start_month..=self.warm_end_month).contains(&date.month()) {
            SeasonHalf::Summer
        } else {
            SeasonHalf::Winter
        };
        Season {
            half,
            year: date.year(),
        }
    }

    /// Same as [`season_of`](Self::season_of) for a date string. Fails with
    /// [`GateError::InvalidDate`] when the string cannot be parsed.
    pub fn season_of_str(&self, date: &str) -> Result<Season> {
        parse_date(date).map(|d| self.season_of(d))
    }

    pub fn current_season(&self) -> Season {
        self.season_of(Local::now().date_naive())
    }
}

/// Parse the date formats the club server and older ledgers emit:
/// `2025-06-01`, `2025-06-01 14:30:00`, `2025-06-01T14:30:00` and RFC 3339.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(GateError::InvalidDate(s.to_string()))
}
