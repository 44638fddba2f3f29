use serde::{Deserialize, Serialize};

use super::alert::Alert;
use super::checkin::CheckIn;
use super::member::Member;
use crate::season::Season;

/// Response envelope shared by the download and upload endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    pub status: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryMetadata {
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub member_count: Option<usize>,
    #[serde(default)]
    pub season: Option<String>,
}

/// The member roster as downloaded: the `data` part of the download envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub metadata: DirectoryMetadata,
    pub members: Vec<Member>,
}

impl DirectorySnapshot {
    pub fn new(members: Vec<Member>) -> Self {
        Self {
            metadata: DirectoryMetadata {
                member_count: Some(members.len()),
                ..Default::default()
            },
            members,
        }
    }
}

/// Body of `POST upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadPayload {
    pub checkins: Vec<CheckIn>,
    pub alerts: Vec<Alert>,
    pub device_id: String,
    pub season: Season,
}

impl UploadPayload {
    pub fn is_empty(&self) -> bool {
        self.checkins.is_empty() && self.alerts.is_empty()
    }
}

/// The `data` part of the upload response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadSummary {
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub successful: usize,
    #[serde(default)]
    pub failed: usize,
    #[serde(default)]
    pub duplicates: usize,
}
