//! Config schema: platform credentials, storage, personal rooms, group
//! sessions and membership tiers.

use std::time::Duration;

use {
    partyline_common::{ResourceId, RoleId},
    secrecy::SecretString,
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartylineConfig {
    pub discord: DiscordConfig,
    pub database: DatabaseConfig,
    pub rooms: RoomsConfig,
    pub groups: GroupsConfig,
    pub tiers: TierConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token. Never written back to disk.
    #[serde(skip_serializing)]
    pub token: Option<SecretString>,

    /// Channel that receives closure notices. Optional.
    pub ops_log_channel: Option<ResourceId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL. Defaults to `<data_dir>/partyline.db`.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

/// Personal voice rooms spawned from a lobby channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// Joining this channel spawns a room. Feature is off when unset.
    pub spawn_channel: Option<ResourceId>,
    pub category: Option<ResourceId>,
    /// `{owner}` is replaced with the owner's display name.
    pub name_template: String,
    /// Initial user limit, 0 for unlimited.
    pub default_capacity: u8,
    pub create_cooldown_secs: u64,
    /// Role whose connect permission the "bots" toggle controls.
    pub bot_role: Option<RoleId>,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            spawn_channel: None,
            category: None,
            name_template: "{owner}'s room".into(),
            default_capacity: 0,
            create_cooldown_secs: 300,
            bot_role: None,
        }
    }
}

impl RoomsConfig {
    pub fn create_cooldown(&self) -> Duration {
        Duration::from_secs(self.create_cooldown_secs)
    }

    pub fn room_name(&self, owner: &str) -> String {
        self.name_template.replace("{owner}", owner)
    }
}

/// A selectable region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionEntry {
    pub key: String,
    pub label: String,
}

/// A selectable activity mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeEntry {
    pub key: String,
    pub label: String,
    /// Fixed party size; `None` means the size is asked for.
    #[serde(default)]
    pub size: Option<u8>,
    #[serde(default = "default_min_size")]
    pub min_size: u8,
    #[serde(default = "default_max_size")]
    pub max_size: u8,
    /// Ranked modes ask for a rank range.
    #[serde(default)]
    pub ranked: bool,
}

fn default_min_size() -> u8 {
    2
}

fn default_max_size() -> u8 {
    10
}

impl ModeEntry {
    pub fn is_variable(&self) -> bool {
        self.size.is_none()
    }

    /// Inclusive bounds a party size must fall into.
    pub fn size_bounds(&self) -> (u8, u8) {
        match self.size {
            Some(s) => (s, s),
            None => (self.min_size, self.max_size),
        }
    }
}

/// Group ("party") sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupsConfig {
    /// Channels a member must be in to open the wizard.
    pub staging_channels: Vec<ResourceId>,
    pub category: Option<ResourceId>,
    pub announcement_channel: Option<ResourceId>,
    /// Where displaced members are moved when their access is revoked.
    pub holding_channel: Option<ResourceId>,

    pub wizard_timeout_secs: u64,
    pub subflow_timeout_secs: u64,

    pub publish_cooldown_secs: u64,
    pub privileged_publish_cooldown_secs: u64,
    pub bump_actor_cooldown_secs: u64,
    pub privileged_bump_actor_cooldown_secs: u64,
    pub bump_resource_cooldown_secs: u64,

    pub regions: Vec<RegionEntry>,
    pub modes: Vec<ModeEntry>,
    /// Ordered lowest to highest.
    pub ranks: Vec<String>,
    pub sub_roles: Vec<String>,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        let region = |key: &str, label: &str| RegionEntry {
            key: key.into(),
            label: label.into(),
        };
        let mode = |key: &str, label: &str, size: Option<u8>, ranked: bool| ModeEntry {
            key: key.into(),
            label: label.into(),
            size,
            min_size: default_min_size(),
            max_size: default_max_size(),
            ranked,
        };
        Self {
            staging_channels: Vec::new(),
            category: None,
            announcement_channel: None,
            holding_channel: None,
            wizard_timeout_secs: 600,
            subflow_timeout_secs: 60,
            publish_cooldown_secs: 900,
            privileged_publish_cooldown_secs: 300,
            bump_actor_cooldown_secs: 1800,
            privileged_bump_actor_cooldown_secs: 900,
            bump_resource_cooldown_secs: 900,
            regions: vec![
                region("na", "North America"),
                region("eu", "Europe"),
                region("ap", "Asia Pacific"),
                region("kr", "Korea"),
                region("latam", "Latin America"),
                region("br", "Brazil"),
            ],
            modes: vec![
                mode("competitive", "Competitive", Some(5), true),
                mode("duo", "Ranked Duo", Some(2), true),
                mode("unrated", "Unrated", Some(5), false),
                mode("custom", "Custom", None, false),
            ],
            ranks: [
                "Iron",
                "Bronze",
                "Silver",
                "Gold",
                "Platinum",
                "Diamond",
                "Ascendant",
                "Immortal",
                "Radiant",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            sub_roles: ["Duelist", "Initiator", "Controller", "Sentinel", "Flex"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl GroupsConfig {
    pub fn mode(&self, key: &str) -> Option<&ModeEntry> {
        self.modes.iter().find(|m| m.key == key)
    }

    pub fn region(&self, key: &str) -> Option<&RegionEntry> {
        self.regions.iter().find(|r| r.key == key)
    }

    pub fn rank_index(&self, name: &str) -> Option<usize> {
        self.ranks.iter().position(|r| r.eq_ignore_ascii_case(name))
    }

    pub fn is_staging(&self, resource: ResourceId) -> bool {
        self.staging_channels.contains(&resource)
    }

    pub fn wizard_timeout(&self) -> Duration {
        Duration::from_secs(self.wizard_timeout_secs)
    }

    pub fn subflow_timeout(&self) -> Duration {
        Duration::from_secs(self.subflow_timeout_secs)
    }

    pub fn publish_cooldown(&self, privileged: bool) -> Duration {
        Duration::from_secs(if privileged {
            self.privileged_publish_cooldown_secs
        } else {
            self.publish_cooldown_secs
        })
    }

    pub fn bump_actor_cooldown(&self, privileged: bool) -> Duration {
        Duration::from_secs(if privileged {
            self.privileged_bump_actor_cooldown_secs
        } else {
            self.bump_actor_cooldown_secs
        })
    }

    pub fn bump_resource_cooldown(&self) -> Duration {
        Duration::from_secs(self.bump_resource_cooldown_secs)
    }
}

/// Membership tiers. Privileged members get shorter cooldowns, more draft
/// slots and color customization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    pub privileged_roles: Vec<RoleId>,
    pub base_draft_slots: u8,
    pub privileged_draft_slots: u8,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            privileged_roles: Vec::new(),
            base_draft_slots: 1,
            privileged_draft_slots: 5,
        }
    }
}

impl TierConfig {
    pub fn draft_slots(&self, privileged: bool) -> u8 {
        if privileged {
            self.privileged_draft_slots
        } else {
            self.base_draft_slots
        }
    }
}

impl PartylineConfig {
    /// Problems that won't stop startup but leave a feature half-configured.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.rooms.spawn_channel.is_some() && self.rooms.category.is_none() {
            out.push("rooms.spawn_channel is set but rooms.category is not".into());
        }
        if !self.groups.staging_channels.is_empty() && self.groups.announcement_channel.is_none()
        {
            out.push("groups.staging_channels is set but groups.announcement_channel is not".into());
        }
        for m in &self.groups.modes {
            let (lo, hi) = m.size_bounds();
            if lo < 2 || lo > hi || hi > 99 {
                out.push(format!("groups.modes.{}: size bounds {lo}..={hi} are invalid", m.key));
            }
        }
        if self.groups.ranks.len() < 2 && self.groups.modes.iter().any(|m| m.ranked) {
            out.push("ranked modes need at least two entries in groups.ranks".into());
        }
        if self.tiers.privileged_draft_slots < self.tiers.base_draft_slots {
            out.push("tiers.privileged_draft_slots is lower than tiers.base_draft_slots".into());
        }
        out
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_clean() {
        assert!(PartylineConfig::default().warnings().is_empty());
    }

    #[test]
    fn mode_lookup_and_bounds() {
        let groups = GroupsConfig::default();
        let comp = groups.mode("competitive").unwrap();
        assert_eq!(comp.size_bounds(), (5, 5));
        assert!(comp.ranked);
        let custom = groups.mode("custom").unwrap();
        assert!(custom.is_variable());
        assert_eq!(custom.size_bounds(), (2, 10));
        assert!(groups.mode("nope").is_none());
    }

    #[test]
    fn rank_index_ignores_case() {
        let groups = GroupsConfig::default();
        assert_eq!(groups.rank_index("gold"), Some(3));
        assert_eq!(groups.rank_index("Mythic"), None);
    }

    #[test]
    fn privileged_cooldowns_are_shorter() {
        let groups = GroupsConfig::default();
        assert!(groups.publish_cooldown(true) < groups.publish_cooldown(false));
        assert!(groups.bump_actor_cooldown(true) < groups.bump_actor_cooldown(false));
    }

    #[test]
    fn room_name_template() {
        let rooms = RoomsConfig::default();
        assert_eq!(rooms.room_name("ada"), "ada's room");
        assert_eq!(rooms.create_cooldown(), Duration::from_secs(300));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: PartylineConfig = toml::from_str(
            r#"
            [rooms]
            spawn_channel = 10
            category = 11

            [groups]
            staging_channels = [20, 21]
            announcement_channel = 22
            "#,
        )
        .unwrap();
        assert_eq!(cfg.rooms.spawn_channel, Some(ResourceId(10)));
        assert!(cfg.groups.is_staging(ResourceId(21)));
        assert_eq!(cfg.groups.subflow_timeout_secs, 60);
        assert_eq!(cfg.groups.modes.len(), 4);
        assert!(cfg.warnings().is_empty());
    }

    #[test]
    fn invalid_mode_bounds_warn() {
        let mut cfg = PartylineConfig::default();
        cfg.groups.modes.push(ModeEntry {
            key: "solo".into(),
            label: "Solo".into(),
            size: Some(1),
            min_size: 2,
            max_size: 10,
            ranked: false,
        });
        let warnings = cfg.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("solo"));
    }
}
