use {
    partyline_common::{ArtifactId, CommunityId, MemberId, ResourceId},
    serde::{Deserialize, Serialize},
};

/// A member's personal voice room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalRoom {
    pub community: CommunityId,
    pub owner: MemberId,
    pub resource_id: ResourceId,
    pub created_at: i64,
    pub order_index: i64,
}

/// Everything a party is configured with. Shared by the in-memory wizard
/// draft, saved drafts, live records and history rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// In-game identity of the owner.
    pub ign: Option<String>,
    pub region: Option<String>,
    pub mode: Option<String>,
    /// Party size; 0 until a mode has been chosen.
    pub size: u8,
    pub private: bool,
    /// Rank indices into the configured rank ladder.
    pub min_rank: Option<u8>,
    pub max_rank: Option<u8>,
    pub required_roles: Vec<String>,
    pub description: Option<String>,
    pub color: Option<u32>,
    /// Members pre-authorized to join.
    pub access_list: Vec<MemberId>,
    /// Explicit "looking for" count; defaults to the open slots.
    pub looking_for: Option<u8>,
}

impl GroupConfig {
    /// Store two rank picks, lowest first, whatever order they came in.
    pub fn set_rank_range(&mut self, a: u8, b: u8) {
        self.min_rank = Some(a.min(b));
        self.max_rank = Some(a.max(b));
    }

    /// Open slots: size minus the owner's pre-authorized members.
    pub fn slots_remaining(&self) -> u8 {
        let taken = u8::try_from(self.access_list.len()).unwrap_or(u8::MAX);
        self.size.saturating_sub(taken)
    }

    /// Value advertised as `+N`.
    pub fn looking_for_count(&self) -> u8 {
        self.looking_for.unwrap_or_else(|| self.slots_remaining())
    }

    pub fn is_publishable(&self) -> bool {
        self.ign.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

/// A published party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub community: CommunityId,
    pub owner: MemberId,
    pub config: GroupConfig,
    pub resource_id: ResourceId,
    pub artifact_id: Option<ArtifactId>,
    pub created_at: i64,
}

/// A saved wizard checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub community: CommunityId,
    pub owner: MemberId,
    pub slot: u8,
    pub name: String,
    pub config: GroupConfig,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub community: CommunityId,
    pub owner: MemberId,
    pub config: GroupConfig,
    pub created_at: i64,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_range_is_ordered_either_way() {
        for (a, b) in [(2, 6), (6, 2), (4, 4)] {
            let mut c = GroupConfig::default();
            c.set_rank_range(a, b);
            assert!(c.min_rank <= c.max_rank);
            assert_eq!(c.min_rank, Some(a.min(b)));
        }
    }

    #[test]
    fn looking_for_defaults_to_open_slots() {
        let mut c = GroupConfig {
            size: 5,
            access_list: vec![MemberId(2)],
            ..Default::default()
        };
        assert_eq!(c.looking_for_count(), 4);
        c.looking_for = Some(2);
        assert_eq!(c.looking_for_count(), 2);
    }

    #[test]
    fn publishable_needs_identity() {
        let mut c = GroupConfig::default();
        assert!(!c.is_publishable());
        c.ign = Some("  ".into());
        assert!(!c.is_publishable());
        c.ign = Some("ada#euw".into());
        assert!(c.is_publishable());
    }
}
