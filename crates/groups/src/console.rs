//! Owner console for a published party.
//!
//! Every edit is persisted first and then pushed to the announcement; a
//! failed re-render is reported as a notice and never rolls the edit back.

use std::collections::HashSet;

use {
    partyline_channels::{
        Overwrite, OverwriteTarget,
        access::{self, AccessChange},
    },
    partyline_common::{ActionError, ActionResult, CommunityId, MemberId, ResourceId},
    partyline_cooldowns::{action, actor_key, resource_key},
    partyline_sessions::{SessionKey, input},
    partyline_store::{GroupConfig, GroupRecord},
    tracing::{info, warn},
};

use crate::{
    render,
    service::GroupService,
    wizard::{DESCRIPTION_MAX, parse_looking_for, parse_rank_pair},
};

/// A console operation waiting for its second step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleFlow {
    /// Waiting for the new owner's in-game identity.
    Transfer { new_owner: MemberId },
    /// Waiting for a size for a variable-size mode.
    Size { mode_index: usize },
}

/// Result of a console edit: the record as stored plus anything the actor
/// should be told.
#[derive(Debug, Clone)]
pub struct ConsoleReply {
    pub record: GroupRecord,
    pub notices: Vec<String>,
    /// Set when the operation opened a second step.
    pub pending: Option<ConsoleFlow>,
}

impl ConsoleReply {
    fn done(record: GroupRecord, notice: Option<String>) -> Self {
        Self {
            record,
            notices: notice.into_iter().collect(),
            pending: None,
        }
    }
}

impl GroupService {
    /// The record behind `resource`, owned by `actor`, optionally with the
    /// actor present inside.
    async fn owned_record(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        require_presence: bool,
    ) -> ActionResult<GroupRecord> {
        let record = self
            .store
            .group_by_resource(community, resource)
            .await?
            .ok_or(ActionError::NotFound("party"))?;
        if record.owner != actor {
            return Err(ActionError::NotOwner);
        }
        if require_presence && !self.is_inside(community, actor, resource).await? {
            return Err(ActionError::NotPresent(resource.mention()));
        }
        Ok(record)
    }

    async fn is_inside(
        &self,
        community: CommunityId,
        member: MemberId,
        resource: ResourceId,
    ) -> ActionResult<bool> {
        let here = self
            .platform
            .voice
            .member_location(community, member)
            .await?;
        Ok(here == Some(resource))
    }

    /// Persist a new config and re-render.
    async fn commit_config(
        &self,
        mut record: GroupRecord,
        config: GroupConfig,
    ) -> ActionResult<ConsoleReply> {
        let updated = self
            .store
            .update_group_config(record.community, record.resource_id, &config)
            .await?;
        if !updated {
            return Err(ActionError::NotFound("party"));
        }
        record.config = config;
        let notice = self.rerender(&record).await;
        Ok(ConsoleReply::done(record, notice))
    }

    // ── Bump ────────────────────────────────────────────────────────────────

    /// Re-post the announcement at the bottom of the channel. Both the
    /// actor's and the party's cooldowns apply; the longer wait is reported.
    pub async fn bump(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
    ) -> ActionResult<ConsoleReply> {
        let record = self.owned_record(community, resource, actor, true).await?;
        let occupants = self.platform.voice.occupants(community, resource).await?;
        if occupants.len() >= usize::from(record.config.size) {
            return Err(ActionError::conflict("the party is full, nothing to advertise"));
        }
        let privileged = self.platform.privileged(community, actor).await;
        let guards = self
            .cooldowns
            .try_acquire_all(vec![
                (
                    actor_key(actor, action::BUMP),
                    self.settings.bump_actor_cooldown(privileged),
                ),
                (
                    resource_key(resource, action::BUMP),
                    self.settings.bump_resource_cooldown(),
                ),
            ])
            .map_err(|remaining| ActionError::RateLimited { remaining })?;

        if self.settings.announcement_channel.is_none() {
            return Err(ActionError::Forbidden(
                "no announcement channel is configured".into(),
            ));
        }
        if let Some(note) = self.announce(&record, true).await {
            return Err(ActionError::Internal(anyhow::anyhow!(note)));
        }
        for g in guards {
            g.commit();
        }
        info!(%actor, %resource, "party bumped");
        let record = self
            .store
            .group_by_resource(community, resource)
            .await?
            .ok_or(ActionError::NotFound("party"))?;
        Ok(ConsoleReply::done(record, None))
    }

    // ── Access ──────────────────────────────────────────────────────────────

    /// Toggle access for each member. Revoking someone who is inside moves
    /// them to the holding channel. Any blocked pair refuses the whole edit
    /// before anything changes.
    pub async fn edit_access(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        members: &[MemberId],
    ) -> ActionResult<(ConsoleReply, Vec<(MemberId, AccessChange)>)> {
        let record = self.owned_record(community, resource, actor, true).await?;
        let mut targets: Vec<MemberId> = members.iter().copied().filter(|m| *m != actor).collect();
        targets.sort();
        targets.dedup();
        if targets.is_empty() {
            return Err(ActionError::validation(
                "pick at least one member other than yourself",
            ));
        }
        self.refuse_blocked(community, actor, &targets).await?;

        let occupants: HashSet<MemberId> = self
            .platform
            .voice
            .occupants(community, resource)
            .await?
            .into_iter()
            .collect();
        let mut config = record.config.clone();
        let mut changes = Vec::with_capacity(targets.len());
        let mut notices = Vec::new();
        let mut failed = None;
        for m in targets {
            let change =
                match access::toggle_member(self.platform.voice.as_ref(), community, resource, m)
                    .await
                {
                    Ok(change) => change,
                    Err(e) => {
                        failed = Some(e);
                        break;
                    },
                };
            match change {
                AccessChange::Granted => {
                    if !config.access_list.contains(&m) {
                        config.access_list.push(m);
                    }
                },
                AccessChange::Revoked => {
                    config.access_list.retain(|x| *x != m);
                    if occupants.contains(&m)
                        && let Some(note) = self.displace(community, m).await
                    {
                        notices.push(note);
                    }
                },
            }
            changes.push((m, change));
        }
        // Overwrites already written stay written, so the record follows them.
        if let Some(e) = failed {
            if !changes.is_empty() {
                self.commit_config(record, config).await?;
            }
            warn!(%resource, applied = changes.len(), error = %e, "access edit stopped early");
            return Err(ActionError::Internal(e));
        }
        let mut reply = self.commit_config(record, config).await?;
        notices.append(&mut reply.notices);
        reply.notices = notices;
        Ok((reply, changes))
    }

    /// Move `member` to the holding channel. Failures become a notice.
    async fn displace(&self, community: CommunityId, member: MemberId) -> Option<String> {
        let Some(holding) = self.settings.holding_channel else {
            return Some(format!(
                "{} lost access but no holding channel is configured to move them to",
                member.mention()
            ));
        };
        match self
            .platform
            .voice
            .move_member(community, member, holding)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                warn!(%member, error = %e, "failed to move member out of party");
                Some(format!("could not move {} out", member.mention()))
            },
        }
    }

    // ── Ownership transfer ──────────────────────────────────────────────────

    /// First step: validate the new owner and wait for their identity.
    pub async fn begin_transfer(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        new_owner: MemberId,
    ) -> ActionResult<ConsoleFlow> {
        let record = self.owned_record(community, resource, actor, true).await?;
        self.check_transfer_target(&record, new_owner).await?;
        let flow = ConsoleFlow::Transfer { new_owner };
        self.consoles.open(
            SessionKey::party(community, resource),
            flow,
            self.settings.subflow_timeout(),
        );
        Ok(flow)
    }

    async fn check_transfer_target(
        &self,
        record: &GroupRecord,
        new_owner: MemberId,
    ) -> ActionResult<()> {
        if new_owner == record.owner {
            return Err(ActionError::validation("you already own this party"));
        }
        if !self
            .is_inside(record.community, new_owner, record.resource_id)
            .await?
        {
            return Err(ActionError::validation(format!(
                "{} has to be in the party to take it over",
                new_owner.mention()
            )));
        }
        if self
            .store
            .group_by_owner(record.community, new_owner)
            .await?
            .is_some()
        {
            return Err(ActionError::conflict(format!(
                "{} already hosts a party",
                new_owner.mention()
            )));
        }
        Ok(())
    }

    /// Second step: rewrite owner and identity in one statement, drop the
    /// thread named after the old owner and re-render.
    pub async fn complete_transfer(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        raw_ign: &str,
    ) -> ActionResult<ConsoleReply> {
        let key = SessionKey::party(community, resource);
        let handle = self.consoles.get(&key).ok_or(ActionError::Timeout)?;
        let ConsoleFlow::Transfer { new_owner } = *handle.state.lock().await else {
            return Err(ActionError::conflict("no transfer is in progress"));
        };
        let record = self.owned_record(community, resource, actor, true).await?;
        let ign = input::parse_identity(raw_ign)?;
        if !self.platform.is_clean(&ign).await? {
            return Err(ActionError::validation(
                "that text was flagged by moderation, try something else",
            ));
        }
        self.check_transfer_target(&record, new_owner).await?;

        if !self
            .store
            .transfer_group(community, resource, actor, new_owner, &ign)
            .await?
        {
            self.consoles.close_if(&key, handle.id);
            return Err(ActionError::conflict("this party changed hands already"));
        }
        self.consoles.close_if(&key, handle.id);
        info!(%resource, from = %actor, to = %new_owner, "party transferred");

        let mut notices = Vec::new();
        let old_name = self.platform.name_of(community, actor).await;
        self.delete_thread(&render::thread_name(&old_name)).await;
        let record = self
            .store
            .group_by_resource(community, resource)
            .await?
            .ok_or(ActionError::NotFound("party"))?;
        if let Some(note) = self.rerender(&record).await {
            notices.push(note);
        }
        Ok(ConsoleReply {
            record,
            notices,
            pending: None,
        })
    }

    /// Best effort; a missing thread is fine.
    pub(crate) async fn delete_thread(&self, name: &str) {
        let Some(channel) = self.settings.announcement_channel else {
            return;
        };
        match self.platform.threads.find_thread(channel, name).await {
            Ok(Some(thread)) => {
                if let Err(e) = self.platform.threads.delete_thread(thread).await {
                    warn!(%thread, error = %e, "failed to delete party thread");
                }
            },
            Ok(None) => {},
            Err(e) => warn!(%name, error = %e, "failed to look up party thread"),
        }
    }

    // ── Mode and size ───────────────────────────────────────────────────────

    /// Switch mode. Fixed sizes smaller than the current occupancy are
    /// refused; variable modes open a size step.
    pub async fn change_mode(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        mode_key: &str,
    ) -> ActionResult<ConsoleReply> {
        let record = self.owned_record(community, resource, actor, true).await?;
        let mode_index = self
            .settings
            .modes
            .iter()
            .position(|m| m.key == mode_key)
            .ok_or_else(|| ActionError::validation("unknown mode"))?;
        let mode = &self.settings.modes[mode_index];
        match mode.size {
            Some(size) => {
                let occupancy = self.platform.voice.occupants(community, resource).await?.len();
                if occupancy > usize::from(size) {
                    return Err(ActionError::conflict(format!(
                        "{occupancy} members are inside but {} holds {size}",
                        mode.label
                    )));
                }
                self.apply_mode(record, mode_index, size).await
            },
            None => {
                let flow = ConsoleFlow::Size { mode_index };
                self.consoles.open(
                    SessionKey::party(community, resource),
                    flow,
                    self.settings.subflow_timeout(),
                );
                Ok(ConsoleReply {
                    record,
                    notices: Vec::new(),
                    pending: Some(flow),
                })
            },
        }
    }

    /// Size for a variable-size mode, bounded below by the occupancy.
    pub async fn submit_size(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        raw: &str,
    ) -> ActionResult<ConsoleReply> {
        let key = SessionKey::party(community, resource);
        let handle = self.consoles.get(&key).ok_or(ActionError::Timeout)?;
        let ConsoleFlow::Size { mode_index } = *handle.state.lock().await else {
            return Err(ActionError::conflict("no size change is in progress"));
        };
        let record = self.owned_record(community, resource, actor, true).await?;
        let mode = self
            .settings
            .modes
            .get(mode_index)
            .ok_or(ActionError::NotFound("mode"))?;
        let (lo, hi) = mode.size_bounds();
        let occupancy = self.platform.voice.occupants(community, resource).await?.len();
        let lo = u32::from(lo).max(u32::try_from(occupancy).unwrap_or(u32::MAX));
        if lo > u32::from(hi) {
            self.consoles.close_if(&key, handle.id);
            return Err(ActionError::conflict(format!(
                "{occupancy} members are inside but {} holds at most {hi}",
                mode.label
            )));
        }
        let size = input::parse_bounded(raw, lo, hi.into(), "party size")?;
        let size = u8::try_from(size).map_err(|e| ActionError::Internal(e.into()))?;
        self.consoles.close_if(&key, handle.id);
        self.apply_mode(record, mode_index, size).await
    }

    async fn apply_mode(
        &self,
        record: GroupRecord,
        mode_index: usize,
        size: u8,
    ) -> ActionResult<ConsoleReply> {
        let mode = self
            .settings
            .modes
            .get(mode_index)
            .ok_or(ActionError::NotFound("mode"))?;
        let mut config = record.config.clone();
        config.mode = Some(mode.key.clone());
        config.size = size;
        if !mode.ranked {
            config.min_rank = None;
            config.max_rank = None;
        }
        let overflow = config.access_list.len() > usize::from(size.saturating_sub(1));
        config
            .access_list
            .truncate(usize::from(size.saturating_sub(1)));
        if config.looking_for.is_some_and(|n| n >= size) {
            config.looking_for = None;
        }
        self.platform
            .voice
            .set_user_limit(record.resource_id, size)
            .await?;
        let mut reply = self.commit_config(record, config).await?;
        if overflow {
            reply
                .notices
                .push("the access list was shortened to fit the new size".into());
        }
        Ok(reply)
    }

    // ── Simple field edits ──────────────────────────────────────────────────

    pub async fn set_rank_range(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        values: &[String],
    ) -> ActionResult<ConsoleReply> {
        let record = self.owned_record(community, resource, actor, true).await?;
        let ranked = record
            .config
            .mode
            .as_deref()
            .and_then(|m| self.settings.mode(m))
            .is_some_and(|m| m.ranked);
        if !ranked {
            return Err(ActionError::validation("this mode has no rank range"));
        }
        let (lo, hi) = parse_rank_pair(&self.settings, values)?;
        let mut config = record.config.clone();
        config.set_rank_range(lo, hi);
        self.commit_config(record, config).await
    }

    pub async fn set_required_roles(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        values: &[String],
    ) -> ActionResult<ConsoleReply> {
        let record = self.owned_record(community, resource, actor, true).await?;
        let mut roles: Vec<String> = Vec::with_capacity(values.len());
        for v in values {
            let role = self
                .settings
                .sub_roles
                .iter()
                .find(|r| r.eq_ignore_ascii_case(v))
                .ok_or_else(|| ActionError::validation(format!("unknown role {v}")))?;
            if !roles.contains(role) {
                roles.push(role.clone());
            }
        }
        let mut config = record.config.clone();
        config.required_roles = roles;
        self.commit_config(record, config).await
    }

    pub async fn set_description(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        raw: &str,
    ) -> ActionResult<ConsoleReply> {
        let record = self.owned_record(community, resource, actor, true).await?;
        let text = input::clean_text(raw, DESCRIPTION_MAX)?;
        if !self.platform.is_clean(&text).await? {
            return Err(ActionError::validation(
                "that text was flagged by moderation, try something else",
            ));
        }
        let mut config = record.config.clone();
        config.description = Some(text);
        self.commit_config(record, config).await
    }

    pub async fn set_color(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        raw: &str,
    ) -> ActionResult<ConsoleReply> {
        let record = self.owned_record(community, resource, actor, true).await?;
        if !self.platform.privileged(community, actor).await {
            return Err(ActionError::Forbidden(
                "custom colors are a perk of the elevated tier".into(),
            ));
        }
        let mut config = record.config.clone();
        config.color = Some(input::parse_color(raw)?);
        self.commit_config(record, config).await
    }

    pub async fn set_looking_for(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
        raw: &str,
    ) -> ActionResult<ConsoleReply> {
        let record = self.owned_record(community, resource, actor, true).await?;
        let mut config = record.config.clone();
        config.looking_for = parse_looking_for(raw, config.size)?;
        self.commit_config(record, config).await
    }

    /// Flip privacy. Going private grandfathers everyone inside and keeps
    /// the access list allowed; going public lifts the general deny.
    pub async fn toggle_privacy(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
    ) -> ActionResult<ConsoleReply> {
        let record = self.owned_record(community, resource, actor, true).await?;
        let voice = self.platform.voice.as_ref();
        let mut config = record.config.clone();
        config.private = !config.private;
        if config.private {
            let partners = self.store.block_partners(community, actor).await?;
            for m in config.access_list.iter().filter(|m| !partners.contains(m)) {
                voice
                    .set_overwrite(
                        community,
                        resource,
                        Overwrite::allow(OverwriteTarget::Member(*m)),
                    )
                    .await?;
            }
            access::lock(voice, community, resource).await?;
        } else {
            access::unlock(voice, community, resource).await?;
        }
        info!(%resource, private = config.private, "party privacy changed");
        self.commit_config(record, config).await
    }

    /// Explicit close. Needs ownership but not presence.
    pub async fn close(
        &self,
        community: CommunityId,
        resource: ResourceId,
        actor: MemberId,
    ) -> ActionResult<()> {
        let record = self.owned_record(community, resource, actor, false).await?;
        self.teardown(&record).await;
        Ok(())
    }
}
