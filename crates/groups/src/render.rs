//! Announcement text for a published party.

use {
    partyline_channels::Announcement,
    partyline_config::GroupsConfig,
    partyline_store::{GroupConfig, GroupRecord},
};

/// Name of the discussion thread hanging off a party announcement.
pub fn thread_name(owner_name: &str) -> String {
    format!("{owner_name}'s party")
}

/// Companion resource name: mode label plus the running counter.
pub fn resource_name(settings: &GroupsConfig, mode: &str, number: u32) -> String {
    let label = settings.mode(mode).map_or(mode, |m| m.label.as_str());
    format!("{label} #{number}")
}

/// `Gold - Diamond`, or the single rank when both ends match.
pub fn rank_label(settings: &GroupsConfig, config: &GroupConfig) -> Option<String> {
    let name = |i: u8| settings.ranks.get(usize::from(i)).cloned();
    match (config.min_rank, config.max_rank) {
        (Some(lo), Some(hi)) if lo == hi => name(lo),
        (Some(lo), Some(hi)) => Some(format!("{} - {}", name(lo)?, name(hi)?)),
        _ => None,
    }
}

pub fn render_announcement(
    settings: &GroupsConfig,
    record: &GroupRecord,
    owner_name: &str,
) -> Announcement {
    let config = &record.config;
    let mode = config
        .mode
        .as_deref()
        .and_then(|m| settings.mode(m))
        .map_or("Party", |m| m.label.as_str());
    let region = config
        .region
        .as_deref()
        .and_then(|r| settings.region(r))
        .map(|r| r.label.as_str());
    let title = match region {
        Some(region) => format!("{mode} in {region} +{}", config.looking_for_count()),
        None => format!("{mode} +{}", config.looking_for_count()),
    };

    let mut fields = vec![
        ("Host".to_string(), match config.ign.as_deref() {
            Some(ign) => format!("{} ({ign})", record.owner.mention()),
            None => record.owner.mention(),
        }),
        ("Size".to_string(), config.size.to_string()),
    ];
    if let Some(ranks) = rank_label(settings, config) {
        fields.push(("Ranks".into(), ranks));
    }
    if !config.required_roles.is_empty() {
        fields.push(("Looking for roles".into(), config.required_roles.join(", ")));
    }
    fields.push((
        "Access".into(),
        if config.private { "Invite only" } else { "Open" }.into(),
    ));

    Announcement {
        title,
        body: config.description.clone().unwrap_or_default(),
        fields,
        color: config.color,
        footer: Some(format!("hosted by {owner_name}")),
        join: (!config.private).then_some(record.resource_id),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        partyline_common::{CommunityId, MemberId, ResourceId},
    };

    fn record(config: GroupConfig) -> GroupRecord {
        GroupRecord {
            community: CommunityId(1),
            owner: MemberId(42),
            config,
            resource_id: ResourceId(9),
            artifact_id: None,
            created_at: 0,
        }
    }

    #[test]
    fn looking_for_is_size_minus_access_list() {
        let settings = GroupsConfig::default();
        let rec = record(GroupConfig {
            ign: Some("Ace#EUW".into()),
            region: Some("eu".into()),
            mode: Some("competitive".into()),
            size: 5,
            access_list: vec![MemberId(7)],
            min_rank: Some(3),
            max_rank: Some(5),
            ..Default::default()
        });
        let a = render_announcement(&settings, &rec, "Ada");
        assert_eq!(a.title, "Competitive in Europe +4");
        assert!(a.fields.contains(&("Ranks".into(), "Gold - Diamond".into())));
        assert!(a.fields.contains(&("Host".into(), "<@42> (Ace#EUW)".into())));
        assert_eq!(a.join, Some(ResourceId(9)));
    }

    #[test]
    fn private_parties_hide_the_join_link() {
        let settings = GroupsConfig::default();
        let rec = record(GroupConfig {
            mode: Some("unrated".into()),
            size: 5,
            private: true,
            looking_for: Some(2),
            ..Default::default()
        });
        let a = render_announcement(&settings, &rec, "Ada");
        assert_eq!(a.title, "Unrated +2");
        assert_eq!(a.join, None);
        assert!(a.fields.contains(&("Access".into(), "Invite only".into())));
    }

    #[test]
    fn names() {
        let settings = GroupsConfig::default();
        assert_eq!(resource_name(&settings, "duo", 3), "Ranked Duo #3");
        assert_eq!(thread_name("Ada"), "Ada's party");
    }
}
