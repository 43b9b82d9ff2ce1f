//! Id and permission conversions between the engine and serenity.

use std::num::NonZeroU64;

use {
    anyhow::{Result, anyhow},
    partyline_channels::{Access, Overwrite, OverwriteTarget},
    partyline_common::{ArtifactId, CommunityId, MemberId, ResourceId, RoleId, ThreadId},
    serenity::all::{
        ChannelId, GuildId, MessageId, PermissionOverwrite, PermissionOverwriteType, Permissions,
        RoleId as DiscordRoleId, UserId,
    },
};

fn nonzero(raw: u64, what: &str) -> Result<NonZeroU64> {
    NonZeroU64::new(raw).ok_or_else(|| anyhow!("{what} id must not be zero"))
}

pub fn guild(community: CommunityId) -> Result<GuildId> {
    Ok(GuildId::from(nonzero(community.get(), "guild")?))
}

pub fn channel(resource: ResourceId) -> Result<ChannelId> {
    Ok(ChannelId::from(nonzero(resource.get(), "channel")?))
}

pub fn thread(thread: ThreadId) -> Result<ChannelId> {
    Ok(ChannelId::from(nonzero(thread.get(), "thread")?))
}

pub fn user(member: MemberId) -> Result<UserId> {
    Ok(UserId::from(nonzero(member.get(), "user")?))
}

pub fn role(role: RoleId) -> Result<DiscordRoleId> {
    Ok(DiscordRoleId::from(nonzero(role.get(), "role")?))
}

pub fn message(artifact: ArtifactId) -> Result<MessageId> {
    Ok(MessageId::from(nonzero(artifact.get(), "message")?))
}

/// The @everyone role shares its id with the guild.
fn everyone(community: CommunityId) -> Result<DiscordRoleId> {
    Ok(DiscordRoleId::from(nonzero(community.get(), "guild")?))
}

pub fn overwrite_kind(
    community: CommunityId,
    target: OverwriteTarget,
) -> Result<PermissionOverwriteType> {
    Ok(match target {
        OverwriteTarget::Everyone => PermissionOverwriteType::Role(everyone(community)?),
        OverwriteTarget::Member(m) => PermissionOverwriteType::Member(user(m)?),
        OverwriteTarget::Role(r) => PermissionOverwriteType::Role(role(r)?),
    })
}

/// Only the connect bit is managed.
pub fn to_discord(community: CommunityId, overwrite: Overwrite) -> Result<PermissionOverwrite> {
    let (allow, deny) = match overwrite.access {
        Access::Allow => (Permissions::CONNECT, Permissions::empty()),
        Access::Deny => (Permissions::empty(), Permissions::CONNECT),
    };
    Ok(PermissionOverwrite {
        allow,
        deny,
        kind: overwrite_kind(community, overwrite.target)?,
    })
}

/// Overwrites that say nothing about connecting are skipped.
pub fn from_discord(community: CommunityId, overwrite: &PermissionOverwrite) -> Option<Overwrite> {
    let target = match overwrite.kind {
        PermissionOverwriteType::Member(u) => OverwriteTarget::Member(MemberId(u.get())),
        PermissionOverwriteType::Role(r) if r.get() == community.get() => OverwriteTarget::Everyone,
        PermissionOverwriteType::Role(r) => OverwriteTarget::Role(RoleId(r.get())),
        _ => return None,
    };
    if overwrite.deny.contains(Permissions::CONNECT) {
        Some(Overwrite::deny(target))
    } else if overwrite.allow.contains(Permissions::CONNECT) {
        Some(Overwrite::allow(target))
    } else {
        None
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const C: CommunityId = CommunityId(100);

    #[test]
    fn zero_ids_are_rejected() {
        assert!(channel(ResourceId(0)).is_err());
        assert_eq!(channel(ResourceId(5)).unwrap().get(), 5);
    }

    #[test]
    fn everyone_maps_to_the_guild_role() {
        let ow = to_discord(C, Overwrite::deny(OverwriteTarget::Everyone)).unwrap();
        assert!(matches!(ow.kind, PermissionOverwriteType::Role(r) if r.get() == 100));
        assert!(ow.deny.contains(Permissions::CONNECT));
        assert_eq!(
            from_discord(C, &ow),
            Some(Overwrite::deny(OverwriteTarget::Everyone))
        );
    }

    #[test]
    fn member_overwrites_survive_the_trip() {
        let ours = Overwrite::allow(OverwriteTarget::Member(MemberId(7)));
        let theirs = to_discord(C, ours).unwrap();
        assert_eq!(from_discord(C, &theirs), Some(ours));
    }

    #[test]
    fn unrelated_overwrites_are_skipped() {
        let ow = PermissionOverwrite {
            allow: Permissions::SPEAK,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Role(DiscordRoleId::new(9)),
        };
        assert_eq!(from_discord(C, &ow), None);
    }
}
