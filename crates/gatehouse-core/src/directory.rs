//! Read-only member roster, loaded from the last downloaded snapshot.

use std::collections::{HashMap, HashSet};

use crate::model::{DirectorySnapshot, Member, ProfileId};
use crate::storage::{Storage, StorageKey};

/// The cached member roster for the session.
///
/// Built once from the stored snapshot and never mutated; a new download
/// replaces it wholesale.
#[derive(Debug, Clone, Default)]
pub struct MemberDirectory {
    members: Vec<Member>,
    index: HashMap<ProfileId, usize>,
}

impl MemberDirectory {
    /// Build the directory from a snapshot. A profile id listed twice keeps
    /// only its later entry.
    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Self {
        let mut seen = HashSet::with_capacity(snapshot.members.len());
        let mut members: Vec<Member> = snapshot
            .members
            .into_iter()
            .rev()
            .filter(|member| {
                let first = seen.insert(member.profile_id);
                if !first {
                    tracing::warn!(
                        profile_id = member.profile_id,
                        "duplicate profile id in roster, later entry wins"
                    );
                }
                first
            })
            .collect();
        members.reverse();

        let index = members
            .iter()
            .enumerate()
            .map(|(pos, member)| (member.profile_id, pos))
            .collect();
        Self { members, index }
    }

    /// Load the stored snapshot. A missing or unreadable snapshot yields an
    /// empty directory; the fault is logged.
    pub async fn load(storage: &Storage) -> Self {
        match storage
            .load_json::<DirectorySnapshot>(StorageKey::MemberData)
            .await
        {
            Ok(Some(snapshot)) => {
                tracing::debug!(members = snapshot.members.len(), "loaded member directory");
                Self::from_snapshot(snapshot)
            }
            Ok(None) => {
                tracing::debug!("no member data downloaded yet");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read member data, using empty directory");
                Self::default()
            }
        }
    }

    pub fn get(&self, profile_id: ProfileId) -> Option<&Member> {
        self.index.get(&profile_id).map(|&pos| &self.members[pos])
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Case-insensitive search over id, name, household, contact and plates.
    ///
    /// Members whose name starts with the query come first, then
    /// alphabetical by name. An empty query matches nobody.
    pub fn search(&self, query: &str, limit: usize) -> Vec<&Member> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let id_match: Option<ProfileId> = needle.parse().ok();

        let mut hits: Vec<(bool, &Member)> = self
            .members
            .iter()
            .filter(|m| Some(m.profile_id) == id_match || member_matches(m, &needle))
            .map(|m| (m.name.to_lowercase().starts_with(&needle), m))
            .collect();

        hits.sort_by(|(a_prefix, a), (b_prefix, b)| {
            b_prefix
                .cmp(a_prefix)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        hits.into_iter().take(limit).map(|(_, m)| m).collect()
    }
}

fn member_matches(member: &Member, needle: &str) -> bool {
    let contains = |s: &str| s.to_lowercase().contains(needle);
    contains(&member.name)
        || member.household.iter().any(|h| contains(&h.name))
        || member.contact.email.as_deref().is_some_and(contains)
        || member.contact.phone.as_deref().is_some_and(contains)
        || member
            .vehicles
            .iter()
            .filter_map(|v| v.plate.as_deref())
            .any(|plate| plate.replace(' ', "").to_lowercase().contains(needle))
}
