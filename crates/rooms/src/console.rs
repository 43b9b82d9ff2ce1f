//! Owner controls for a personal room.

use std::{sync::Arc, time::Duration};

use {
    partyline_channels::{
        Access, OverwriteTarget, Platform,
        access::{self, AccessChange},
    },
    partyline_common::{ActionError, ActionResult, CommunityId, MemberId, ResourceId},
    partyline_sessions::input,
    partyline_store::{PersonalRoom, Store},
    tracing::info,
};

use crate::allocator::RoomAllocator;

/// Snapshot shown by the status panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStatus {
    pub resource: ResourceId,
    /// 0 means unlimited.
    pub capacity: u8,
    pub locked: bool,
    pub bots_blocked: bool,
    pub allowed: Vec<MemberId>,
    pub denied: Vec<MemberId>,
    pub create_cooldown: Option<Duration>,
}

pub struct RoomConsole {
    store: Arc<dyn Store>,
    platform: Platform,
    allocator: Arc<RoomAllocator>,
}

impl RoomConsole {
    pub fn new(store: Arc<dyn Store>, platform: Platform, allocator: Arc<RoomAllocator>) -> Self {
        Self {
            store,
            platform,
            allocator,
        }
    }

    /// The room behind `resource`, checked for ownership and (optionally) for
    /// the actor being inside it.
    async fn authorize(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        require_presence: bool,
    ) -> ActionResult<PersonalRoom> {
        let room = self
            .store
            .room_by_resource(community, resource)
            .await?
            .ok_or(ActionError::NotFound("room"))?;
        if room.owner != actor {
            return Err(ActionError::NotOwner);
        }
        if require_presence {
            let here = self
                .platform
                .voice
                .member_location(community, actor)
                .await?;
            if here != Some(resource) {
                return Err(ActionError::NotPresent(resource.mention()));
            }
        }
        Ok(room)
    }

    /// Set the user limit from free-text input.
    pub async fn set_capacity(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        raw: &str,
    ) -> ActionResult<u8> {
        self.authorize(community, resource, actor, true).await?;
        let limit = input::parse_bounded(raw, 2, 99, "capacity")?;
        let limit = u8::try_from(limit).map_err(|e| ActionError::Internal(e.into()))?;
        self.platform.voice.set_user_limit(resource, limit).await?;
        info!(%resource, %actor, limit, "room capacity changed");
        Ok(limit)
    }

    /// Flip access for each selected member. The actor is skipped.
    pub async fn toggle_access(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        members: &[MemberId],
    ) -> ActionResult<Vec<(MemberId, AccessChange)>> {
        self.authorize(community, resource, actor, true).await?;
        let mut targets: Vec<MemberId> = members.iter().copied().filter(|m| *m != actor).collect();
        targets.sort();
        targets.dedup();
        if targets.is_empty() {
            return Err(ActionError::validation(
                "pick at least one member other than yourself",
            ));
        }
        let mut changes = Vec::with_capacity(targets.len());
        for member in targets {
            let change =
                access::toggle_member(self.platform.voice.as_ref(), community, resource, member)
                    .await?;
            changes.push((member, change));
        }
        Ok(changes)
    }

    /// Lock grandfathers everyone inside; unlock lifts the general deny.
    /// Returns the grandfathered members.
    pub async fn set_locked(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        locked: bool,
    ) -> ActionResult<Vec<MemberId>> {
        self.authorize(community, resource, actor, true).await?;
        let voice = self.platform.voice.as_ref();
        if locked {
            Ok(access::lock(voice, community, resource).await?)
        } else {
            access::unlock(voice, community, resource).await?;
            Ok(Vec::new())
        }
    }

    /// Toggle the automated-agent deny rule. Returns true when bots end up
    /// blocked.
    pub async fn toggle_bots(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
    ) -> ActionResult<bool> {
        self.authorize(community, resource, actor, true).await?;
        let role = self.allocator.config().bot_role.ok_or_else(|| {
            ActionError::Forbidden("bot blocking is not configured on this server".into())
        })?;
        let blocked =
            access::toggle_role_block(self.platform.voice.as_ref(), community, resource, role)
                .await?;
        info!(%resource, %actor, blocked, "room bot rule toggled");
        Ok(blocked)
    }

    /// Read-only; no presence needed.
    pub async fn status(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
    ) -> ActionResult<RoomStatus> {
        let room = self.authorize(community, resource, actor, false).await?;
        let voice = &self.platform.voice;
        let overwrites = voice.overwrites(community, resource).await?;
        let capacity = voice.user_limit(resource).await?;
        let bots_blocked = self
            .allocator
            .config()
            .bot_role
            .is_some_and(|r| access::explicit(&overwrites, OverwriteTarget::Role(r)) == Some(Access::Deny));

        let (mut allowed, mut denied) = (Vec::new(), Vec::new());
        for ow in &overwrites {
            if let OverwriteTarget::Member(m) = ow.target {
                match ow.access {
                    Access::Allow => allowed.push(m),
                    Access::Deny => denied.push(m),
                }
            }
        }
        allowed.sort();
        denied.sort();

        Ok(RoomStatus {
            resource,
            capacity,
            locked: access::is_locked(&overwrites),
            bots_blocked,
            allowed,
            denied,
            create_cooldown: self.allocator.create_cooldown(community, room.owner).await?,
        })
    }
}
