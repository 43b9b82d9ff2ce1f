//! Personal voice rooms: created when a member joins the spawn channel,
//! destroyed when the last occupant leaves.

use std::{sync::Arc, time::Duration};

use {
    anyhow::Result,
    dashmap::{DashMap, mapref::entry::Entry},
    partyline_channels::{Overwrite, OverwriteTarget, Platform, VoiceChannelSpec},
    partyline_common::{CommunityId, MemberId, ResourceId, now_ms},
    partyline_config::RoomsConfig,
    partyline_cooldowns::{CooldownRegistry, action, actor_key},
    partyline_store::{PersonalRoom, Store, StoreError},
    tracing::{debug, info, warn},
};

/// Where a member is in the room lifecycle. Absence from the map means no
/// room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Creating,
    Owned(ResourceId),
    Closing(ResourceId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterOutcome {
    /// Not the spawn channel.
    Ignored,
    Created(ResourceId),
    /// The member already has a room (or one is being set up).
    AlreadyOwned(Option<ResourceId>),
    CoolingDown(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Ignored,
    StillOccupied,
    Closed(ResourceId),
}

/// Counts from a startup reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub kept: usize,
    pub removed_missing: usize,
    pub removed_empty: usize,
    pub cooldowns_purged: u64,
}

pub struct RoomAllocator {
    config: RoomsConfig,
    store: Arc<dyn Store>,
    platform: Platform,
    cooldowns: Arc<CooldownRegistry>,
    states: DashMap<(CommunityId, MemberId), RoomState>,
}

impl RoomAllocator {
    pub fn new(
        config: RoomsConfig,
        store: Arc<dyn Store>,
        platform: Platform,
        cooldowns: Arc<CooldownRegistry>,
    ) -> Self {
        Self {
            config,
            store,
            platform,
            cooldowns,
            states: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RoomsConfig {
        &self.config
    }

    pub fn state(&self, community: CommunityId, member: MemberId) -> Option<RoomState> {
        self.states.get(&(community, member)).map(|s| *s)
    }

    /// Remaining creation cooldown for `member`, memory first, then the
    /// durable copy (which re-populates memory).
    pub async fn create_cooldown(
        &self,
        community: CommunityId,
        member: MemberId,
    ) -> Result<Option<Duration>> {
        let key = actor_key(member, action::ROOM_CREATE);
        if let Some(remaining) = self.cooldowns.check(&key) {
            return Ok(Some(remaining));
        }
        let Some(expires_at) = self.store.room_cooldown(community, member).await? else {
            return Ok(None);
        };
        let left = expires_at - now_ms();
        if left <= 0 {
            return Ok(None);
        }
        let remaining = Duration::from_millis(left.unsigned_abs());
        self.cooldowns.set(key, remaining);
        Ok(Some(remaining))
    }

    pub async fn on_presence_enter(
        &self,
        community: CommunityId,
        zone: ResourceId,
        member: MemberId,
    ) -> Result<EnterOutcome> {
        if self.config.spawn_channel != Some(zone) {
            return Ok(EnterOutcome::Ignored);
        }
        match self.states.entry((community, member)) {
            Entry::Occupied(e) => {
                let res = match *e.get() {
                    RoomState::Owned(r) | RoomState::Closing(r) => Some(r),
                    RoomState::Creating => None,
                };
                return Ok(EnterOutcome::AlreadyOwned(res));
            },
            Entry::Vacant(v) => {
                v.insert(RoomState::Creating);
            },
        }

        let outcome = self.create(community, member).await;
        match &outcome {
            Ok(EnterOutcome::Created(res)) | Ok(EnterOutcome::AlreadyOwned(Some(res))) => {
                self.states.insert((community, member), RoomState::Owned(*res));
            },
            _ => {
                self.states
                    .remove_if(&(community, member), |_, s| *s == RoomState::Creating);
            },
        }
        outcome
    }

    async fn create(&self, community: CommunityId, member: MemberId) -> Result<EnterOutcome> {
        if let Some(room) = self.store.room_by_owner(community, member).await? {
            debug!(%member, resource = %room.resource_id, "room already exists");
            return Ok(EnterOutcome::AlreadyOwned(Some(room.resource_id)));
        }
        if let Some(remaining) = self.create_cooldown(community, member).await? {
            debug!(%member, ?remaining, "room creation cooling down");
            return Ok(EnterOutcome::CoolingDown(remaining));
        }
        let cooldown = self.config.create_cooldown();
        let guard = match self
            .cooldowns
            .try_acquire(actor_key(member, action::ROOM_CREATE), cooldown)
        {
            Ok(g) => g,
            Err(remaining) => return Ok(EnterOutcome::CoolingDown(remaining)),
        };

        let owner_name = self.platform.name_of(community, member).await;
        let spec = VoiceChannelSpec {
            name: self.config.room_name(&owner_name),
            category: self.config.category,
            user_limit: self.config.default_capacity,
            overwrites: vec![Overwrite::allow(OverwriteTarget::Member(member))],
        };
        let resource = self
            .platform
            .voice
            .create_voice_channel(community, &spec)
            .await?;

        if let Err(e) = self.finish(community, member, resource).await {
            if let Err(del) = self.platform.voice.delete_channel(resource).await {
                warn!(%resource, error = %del, "failed to delete room after setup error");
            }
            if let Some(StoreError::Conflict(_)) = e.downcast_ref::<StoreError>() {
                let existing = self.store.room_by_owner(community, member).await?;
                return Ok(EnterOutcome::AlreadyOwned(existing.map(|r| r.resource_id)));
            }
            return Err(e);
        }

        guard.commit();
        let expires_at = now_ms() + i64::try_from(cooldown.as_millis()).unwrap_or(i64::MAX);
        if let Err(e) = self
            .store
            .set_room_cooldown(community, member, expires_at)
            .await
        {
            warn!(%member, error = %e, "failed to persist room cooldown");
        }
        info!(%member, %resource, "personal room created");
        Ok(EnterOutcome::Created(resource))
    }

    async fn finish(
        &self,
        community: CommunityId,
        member: MemberId,
        resource: ResourceId,
    ) -> Result<()> {
        self.platform
            .voice
            .move_member(community, member, resource)
            .await?;
        let order_index = self.store.next_room_order(community).await?;
        self.store
            .insert_room(&PersonalRoom {
                community,
                owner: member,
                resource_id: resource,
                created_at: now_ms(),
                order_index,
            })
            .await?;
        Ok(())
    }

    pub async fn on_presence_leave(
        &self,
        community: CommunityId,
        zone: ResourceId,
        member: MemberId,
    ) -> Result<LeaveOutcome> {
        let Some(room) = self.store.room_by_resource(community, zone).await? else {
            return Ok(LeaveOutcome::Ignored);
        };
        let occupants = self.platform.voice.occupants(community, zone).await?;
        if !occupants.is_empty() {
            return Ok(LeaveOutcome::StillOccupied);
        }
        debug!(%member, resource = %zone, owner = %room.owner, "last occupant left");
        self.destroy(&room).await?;
        Ok(LeaveOutcome::Closed(zone))
    }

    /// Remote resource first, then the row, which goes even when the remote
    /// delete failed.
    async fn destroy(&self, room: &PersonalRoom) -> Result<()> {
        let key = (room.community, room.owner);
        self.states.insert(key, RoomState::Closing(room.resource_id));
        if let Err(e) = self.platform.voice.delete_channel(room.resource_id).await {
            warn!(resource = %room.resource_id, error = %e, "failed to delete room channel");
        }
        let deleted = self
            .store
            .delete_room(room.community, room.resource_id)
            .await;
        self.states.remove_if(&key, |_, s| {
            *s == RoomState::Closing(room.resource_id)
        });
        if deleted? {
            info!(owner = %room.owner, resource = %room.resource_id, "personal room closed");
        }
        Ok(())
    }

    /// Bring rows and remote state back in line after a restart: drop rows
    /// whose channel is gone, close rooms nobody is in, and forget expired
    /// creation cooldowns.
    pub async fn reconcile(&self, community: CommunityId) -> Result<ReconcileReport> {
        let mut report = ReconcileReport {
            cooldowns_purged: self.store.purge_room_cooldowns(now_ms()).await?,
            ..Default::default()
        };
        for room in self.store.list_rooms(community).await? {
            if !self.platform.voice.channel_exists(room.resource_id).await? {
                self.store
                    .delete_room(community, room.resource_id)
                    .await?;
                report.removed_missing += 1;
                continue;
            }
            let occupants = self
                .platform
                .voice
                .occupants(community, room.resource_id)
                .await?;
            if occupants.is_empty() {
                self.destroy(&room).await?;
                report.removed_empty += 1;
            } else {
                self.states
                    .insert((community, room.owner), RoomState::Owned(room.resource_id));
                report.kept += 1;
            }
        }
        info!(%community, ?report, "personal rooms reconciled");
        Ok(report)
    }
}
