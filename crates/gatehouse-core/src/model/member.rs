use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::season::parse_date;

/// Externally assigned member identifier.
pub type ProfileId = u64;

/// A club member as delivered by the roster download. Replaced wholesale on
/// every download; never mutated during the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub profile_id: ProfileId,
    pub name: String,
    #[serde(default, alias = "membership_type")]
    pub category: String,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
    #[serde(default, alias = "additional_members")]
    pub household: Vec<HouseholdMember>,
    #[serde(default)]
    pub guest_visits: Vec<GuestVisit>,
}

impl Member {
    pub fn new(profile_id: ProfileId, name: impl Into<String>) -> Self {
        Self {
            profile_id,
            name: name.into(),
            category: String::new(),
            contact: ContactInfo::default(),
            vehicles: Vec::new(),
            household: Vec::new(),
            guest_visits: Vec::new(),
        }
    }

    pub fn with_contact(mut self, contact: ContactInfo) -> Self {
        self.contact = contact;
        self
    }

    pub fn with_vehicle(mut self, vehicle: Vehicle) -> Self {
        self.vehicles.push(vehicle);
        self
    }

    pub fn with_household_member(mut self, member: HouseholdMember) -> Self {
        self.household.push(member);
        self
    }

    pub fn with_guest_visit(mut self, visit: GuestVisit) -> Self {
        self.guest_visits.push(visit);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, alias = "license_plate")]
    pub plate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdMember {
    pub name: String,
    #[serde(default)]
    pub relationship: Option<String>,
}

/// One historical visit of one guest, attributed to a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestVisit {
    pub guest_name: String,
    #[serde(deserialize_with = "deserialize_visit_date")]
    pub visit_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

impl GuestVisit {
    pub fn new(guest_name: impl Into<String>, visit_date: NaiveDate) -> Self {
        Self {
            guest_name: guest_name.into(),
            visit_date,
            notes: None,
        }
    }
}

// The server emits either plain dates or full timestamps for visits.
fn deserialize_visit_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}
