use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::member::ProfileId;
use crate::season::Season;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    GuestLimit,
    ManualGateAlert,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GuestLimit => write!(f, "GuestLimit"),
            Self::ManualGateAlert => write!(f, "ManualGateAlert"),
        }
    }
}

/// A flagged event for the day. Append-only; cleared after a confirmed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// `None` when the alert is not tied to a known member. Travels as `0`.
    #[serde(default, with = "profile_id_or_zero")]
    pub profile_id: Option<ProfileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_date: Option<NaiveDate>,
    pub season: Season,
    pub alert_type: AlertKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// A guest has reached visit number `visit_number` this season for the member.
    pub fn guest_limit(
        profile_id: ProfileId,
        guest_name: &str,
        visit_date: NaiveDate,
        season: Season,
        visit_number: usize,
        limit: usize,
    ) -> Self {
        Self {
            profile_id: Some(profile_id),
            guest_name: Some(guest_name.to_string()),
            visit_date: Some(visit_date),
            season,
            alert_type: AlertKind::GuestLimit,
            message: format!(
                "Guest {guest_name} is on visit #{visit_number} this season for member {profile_id} (limit {limit})"
            ),
            created_at: Utc::now(),
        }
    }

    pub fn manual(
        profile_id: Option<ProfileId>,
        guest_name: Option<String>,
        season: Season,
        message: impl Into<String>,
    ) -> Self {
        Self {
            profile_id,
            guest_name,
            visit_date: None,
            season,
            alert_type: AlertKind::ManualGateAlert,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

mod profile_id_or_zero {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::model::member::ProfileId;

    pub fn serialize<S: Serializer>(
        value: &Option<ProfileId>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ProfileId>, D::Error> {
        let raw = Option::<ProfileId>::deserialize(deserializer)?;
        Ok(raw.filter(|id| *id != 0))
    }
}
