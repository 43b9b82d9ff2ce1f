//! Party sessions: runs wizards, executes their effects, and owns the
//! console flows for published parties.

use std::{collections::VecDeque, sync::Arc};

use {
    partyline_channels::Platform,
    partyline_common::{ActionError, ActionResult, CommunityId, MemberId, ResourceId, now_ms},
    partyline_config::{GroupsConfig, PartylineConfig, TierConfig},
    partyline_cooldowns::CooldownRegistry,
    partyline_sessions::{Expired, Expiry, SessionHandle, SessionKey, SessionRegistry},
    partyline_store::{Draft, Store},
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use crate::{
    console::ConsoleFlow,
    wizard::{Effect, GroupWizard, Subflow, WizardEvent},
};

/// What an interaction sees after a wizard event.
#[derive(Debug, Clone)]
pub struct WizardReply {
    /// Snapshot to render.
    pub wizard: GroupWizard,
    pub notices: Vec<String>,
    pub published: Option<ResourceId>,
    pub closed: bool,
}

pub struct GroupService {
    pub(crate) settings: Arc<GroupsConfig>,
    pub(crate) tiers: TierConfig,
    pub(crate) ops_log: Option<ResourceId>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) platform: Platform,
    pub(crate) cooldowns: Arc<CooldownRegistry>,
    pub(crate) wizards: SessionRegistry<GroupWizard>,
    pub(crate) consoles: SessionRegistry<ConsoleFlow>,
}

impl GroupService {
    /// Returns the service and the channel its session timers report on.
    pub fn new(
        config: &PartylineConfig,
        store: Arc<dyn Store>,
        platform: Platform,
        cooldowns: Arc<CooldownRegistry>,
    ) -> (Self, mpsc::UnboundedReceiver<Expired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self {
            settings: Arc::new(config.groups.clone()),
            tiers: config.tiers.clone(),
            ops_log: config.discord.ops_log_channel,
            store,
            platform,
            cooldowns,
            wizards: SessionRegistry::with_sender(tx.clone()),
            consoles: SessionRegistry::with_sender(tx),
        };
        (service, rx)
    }

    pub fn settings(&self) -> &GroupsConfig {
        &self.settings
    }

    pub fn active_wizards(&self) -> usize {
        self.wizards.len()
    }

    /// Whether `member` sits in one of the staging resources.
    pub(crate) async fn require_staging(
        &self,
        community: CommunityId,
        member: MemberId,
    ) -> ActionResult<ResourceId> {
        let here = self
            .platform
            .voice
            .member_location(community, member)
            .await?;
        match here {
            Some(r) if self.settings.is_staging(r) => Ok(r),
            _ => Err(ActionError::NotPresent("a party staging channel".into())),
        }
    }

    /// Refuse the whole selection if any member has a block relation with
    /// `owner` in either direction.
    pub(crate) async fn refuse_blocked(
        &self,
        community: CommunityId,
        owner: MemberId,
        members: &[MemberId],
    ) -> ActionResult<()> {
        for m in members.iter().filter(|m| **m != owner) {
            if self.store.blocked_either_way(community, owner, *m).await? {
                return Err(ActionError::Forbidden(format!(
                    "{} can't be added because one of you blocked the other",
                    m.mention()
                )));
            }
        }
        Ok(())
    }

    pub(crate) async fn require_no_record(
        &self,
        community: CommunityId,
        member: MemberId,
    ) -> ActionResult<()> {
        if let Some(existing) = self.store.group_by_owner(community, member).await? {
            return Err(ActionError::conflict(format!(
                "you already host a party in {}",
                existing.resource_id.mention()
            )));
        }
        Ok(())
    }

    // ── Wizard ──────────────────────────────────────────────────────────────

    /// Start a wizard, replacing any the member already had open.
    pub async fn open_wizard(
        &self,
        community: CommunityId,
        actor: MemberId,
    ) -> ActionResult<WizardReply> {
        self.require_staging(community, actor).await?;
        self.require_no_record(community, actor).await?;
        let privileged = self.platform.privileged(community, actor).await;
        let wizard = GroupWizard::new(
            community,
            actor,
            privileged,
            self.tiers.draft_slots(privileged),
            Arc::clone(&self.settings),
        );
        let key = SessionKey::wizard(community, actor);
        let handle = self
            .wizards
            .open(key, wizard.clone(), self.settings.wizard_timeout());
        info!(%actor, session = %handle.id, privileged, "party wizard opened");
        Ok(WizardReply {
            wizard,
            notices: Vec::new(),
            published: None,
            closed: false,
        })
    }

    pub async fn wizard_event(
        &self,
        community: CommunityId,
        actor: MemberId,
        event: WizardEvent,
    ) -> ActionResult<WizardReply> {
        let key = SessionKey::wizard(community, actor);
        let handle = self.wizards.get(&key).ok_or(ActionError::Timeout)?;
        self.drive(&handle, event).await
    }

    /// Apply one event and run every effect it produces, feeding follow-up
    /// events back into the machine.
    async fn drive(
        &self,
        handle: &SessionHandle<GroupWizard>,
        event: WizardEvent,
    ) -> ActionResult<WizardReply> {
        let mut wizard = handle.state.lock().await;
        if let (Some(kind), WizardEvent::Text(text)) = (wizard.screened_subflow(), &event)
            && !self.platform.is_clean(text).await?
        {
            debug!(owner = %wizard.owner(), ?kind, "wizard text refused by classifier");
            return Err(ActionError::validation(
                "that text was flagged by moderation, try something else",
            ));
        }
        if let (Some(Subflow::AccessList), WizardEvent::Select(values)) =
            (wizard.subflow().map(|s| s.kind), &event)
        {
            // Unparseable ids are left for the wizard to reject.
            let picked: Vec<MemberId> = values.iter().filter_map(|v| v.parse().ok()).collect();
            self.refuse_blocked(wizard.community(), wizard.owner(), &picked)
                .await?;
        }

        let mut effects: VecDeque<Effect> = wizard.handle(event)?.into();
        let mut reply = WizardReply {
            wizard: wizard.clone(),
            notices: Vec::new(),
            published: None,
            closed: false,
        };
        let (community, owner) = (wizard.community(), wizard.owner());

        while let Some(effect) = effects.pop_front() {
            match effect {
                Effect::Notice(text) => reply.notices.push(text),
                Effect::LoadDrafts => {
                    let drafts = self.store.list_drafts(community, owner).await?;
                    effects.extend(wizard.handle(WizardEvent::DraftsLoaded(drafts))?);
                },
                Effect::DeleteDraft { slot } => {
                    if self.store.delete_draft(community, owner, slot).await? {
                        reply.notices.push(format!("deleted draft slot {}", slot + 1));
                    }
                },
                Effect::SaveDraft { slot, name, config } => {
                    self.store
                        .save_draft(&Draft {
                            community,
                            owner,
                            slot,
                            name: name.clone(),
                            config,
                            updated_at: now_ms(),
                        })
                        .await?;
                    reply
                        .notices
                        .push(format!("saved \"{name}\" to slot {}", slot + 1));
                },
                Effect::ArmSubflow { generation } => {
                    self.wizards
                        .arm_subflow(&handle.key, generation, self.settings.subflow_timeout());
                },
                Effect::DisarmSubflow => self.wizards.disarm_subflow(&handle.key),
                Effect::Publish(config) => {
                    match self
                        .publish(community, owner, wizard.privileged(), config)
                        .await
                    {
                        Ok(outcome) => {
                            reply.published = Some(outcome.resource);
                            reply.notices.extend(outcome.notices);
                            effects.extend(
                                wizard.handle(WizardEvent::Published(outcome.resource))?,
                            );
                        },
                        Err(e) => {
                            wizard.handle(WizardEvent::PublishFailed)?;
                            return Err(e);
                        },
                    }
                },
                Effect::Close => {
                    self.wizards.close_if(&handle.key, handle.id);
                    reply.closed = true;
                },
            }
        }
        reply.wizard = wizard.clone();
        Ok(reply)
    }

    // ── Drafts ──────────────────────────────────────────────────────────────

    pub async fn list_drafts(
        &self,
        community: CommunityId,
        member: MemberId,
    ) -> ActionResult<Vec<Draft>> {
        Ok(self.store.list_drafts(community, member).await?)
    }

    /// A member's tier changed. Losing the elevated tier trims saved drafts
    /// to the base quota. Returns how many drafts were dropped.
    pub async fn on_tier_change(
        &self,
        community: CommunityId,
        member: MemberId,
        privileged: bool,
    ) -> ActionResult<u64> {
        if privileged {
            return Ok(0);
        }
        let removed = self
            .store
            .trim_drafts(community, member, self.tiers.base_draft_slots)
            .await?;
        if removed > 0 {
            info!(%member, removed, "drafts trimmed after tier loss");
        }
        Ok(removed)
    }

    // ── Timers ──────────────────────────────────────────────────────────────

    /// Handle a fired session timer. Returns the notices produced, if the
    /// timer still applied.
    pub async fn on_expired(&self, expired: Expired) -> Option<Vec<String>> {
        if !self.wizards.is_current(&expired) && !self.consoles.is_current(&expired) {
            debug!(key = %expired.key, "stale timer ignored");
            return None;
        }
        match (expired.key.kind(), expired.expiry) {
            ("wizard", Expiry::Session) => {
                self.wizards.close_if(&expired.key, expired.session_id);
                info!(key = %expired.key, "party wizard timed out");
                Some(vec![ActionError::Timeout.to_string()])
            },
            ("wizard", Expiry::Subflow { generation }) => {
                let handle = self.wizards.get(&expired.key)?;
                if handle.id != expired.session_id {
                    return None;
                }
                match self
                    .drive(&handle, WizardEvent::SubflowTimeout(generation))
                    .await
                {
                    Ok(reply) => Some(reply.notices),
                    Err(e) => {
                        warn!(key = %expired.key, error = %e, "sub-flow timeout failed");
                        None
                    },
                }
            },
            ("party", _) => {
                self.consoles.close_if(&expired.key, expired.session_id);
                debug!(key = %expired.key, "console flow timed out");
                Some(vec![ActionError::Timeout.to_string()])
            },
            (kind, expiry) => {
                warn!(%kind, ?expiry, "timer for unknown session kind");
                None
            },
        }
    }

    /// Cancel every session (shutdown).
    pub fn close_all(&self) {
        self.wizards.close_all();
        self.consoles.close_all();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            testkit::{C, Fixture, OWNER},
            wizard::{Stage, Subflow},
        },
        partyline_store::GroupRecord,
    };

    #[tokio::test]
    async fn wizard_needs_staging_presence() {
        let f = Fixture::new().await;
        let err = f.service.open_wizard(C, OWNER).await.unwrap_err();
        assert!(matches!(err, ActionError::NotPresent(_)));

        f.mock.place(OWNER, f.staging);
        let reply = f.service.open_wizard(C, OWNER).await.unwrap();
        assert_eq!(reply.wizard.stage(), Stage::SelectRegion);
        assert_eq!(reply.wizard.draft_quota(), 1);
    }

    #[tokio::test]
    async fn wizard_refused_for_existing_host() {
        let f = Fixture::new().await;
        f.store
            .insert_group(&GroupRecord {
                community: C,
                owner: OWNER,
                config: Default::default(),
                resource_id: ResourceId(5),
                artifact_id: None,
                created_at: 0,
            })
            .await
            .unwrap();
        f.mock.place(OWNER, f.staging);
        let err = f.service.open_wizard(C, OWNER).await.unwrap_err();
        assert!(matches!(err, ActionError::Conflict(_)));
    }

    #[tokio::test]
    async fn events_after_close_time_out() {
        let f = Fixture::new().await;
        f.mock.place(OWNER, f.staging);
        f.service.open_wizard(C, OWNER).await.unwrap();
        let reply = f
            .service
            .wizard_event(C, OWNER, WizardEvent::Cancel)
            .await
            .unwrap();
        assert!(reply.closed);
        let err = f
            .service
            .wizard_event(C, OWNER, WizardEvent::TogglePrivacy)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Timeout));
    }

    #[tokio::test]
    async fn subflow_timeout_returns_to_hub() {
        let f = Fixture::new().await;
        f.ready_wizard(OWNER).await;
        f.open(OWNER, Subflow::Description).await;
        let handle = f.service.wizards.get(&f.wizard_key(OWNER)).unwrap();

        let stale = Expired {
            key: handle.key.clone(),
            session_id: handle.id,
            expiry: Expiry::Subflow { generation: 1 },
        };
        assert_eq!(f.service.on_expired(stale).await, Some(Vec::new()));
        assert!(handle.state.lock().await.subflow().is_some());

        let current = Expired {
            key: handle.key.clone(),
            session_id: handle.id,
            expiry: Expiry::Subflow { generation: 2 },
        };
        let notices = f.service.on_expired(current).await.unwrap();
        assert_eq!(notices, vec!["timed out".to_string()]);
        let w = handle.state.lock().await;
        assert!(w.subflow().is_none());
        assert_eq!(w.stage(), Stage::Ready);
    }

    #[tokio::test]
    async fn outer_timeout_closes_the_wizard() {
        let f = Fixture::new().await;
        f.mock.place(OWNER, f.staging);
        let reply = f.service.open_wizard(C, OWNER).await.unwrap();
        assert_eq!(reply.wizard.owner(), OWNER);
        let handle = f.service.wizards.get(&f.wizard_key(OWNER)).unwrap();

        let expired = Expired {
            key: handle.key.clone(),
            session_id: handle.id,
            expiry: Expiry::Session,
        };
        assert!(f.service.on_expired(expired.clone()).await.is_some());
        assert_eq!(f.service.active_wizards(), 0);
        // Delivered twice: the second copy is stale.
        assert!(f.service.on_expired(expired).await.is_none());
    }

    #[tokio::test]
    async fn checkpoint_saves_and_restores() {
        let f = Fixture::new().await;
        f.ready_wizard(OWNER).await;
        f.open(OWNER, Subflow::Checkpoint).await;
        f.select(OWNER, &["0"]).await;
        let reply = f.text(OWNER, "weeknights").await;
        assert_eq!(reply.notices, vec!["saved \"weeknights\" to slot 1".to_string()]);

        f.service.open_wizard(C, OWNER).await.unwrap();
        let reply = f
            .service
            .wizard_event(C, OWNER, WizardEvent::BrowseDrafts)
            .await
            .unwrap();
        assert_eq!(reply.wizard.stage(), Stage::DraftRestore);
        assert_eq!(reply.wizard.drafts().len(), 1);

        let reply = f
            .service
            .wizard_event(C, OWNER, WizardEvent::Restore { slot: 0 })
            .await
            .unwrap();
        assert_eq!(reply.wizard.stage(), Stage::Ready);
        assert_eq!(reply.wizard.draft().ign.as_deref(), Some("Player#EUW"));
    }

    #[tokio::test]
    async fn losing_the_tier_trims_drafts() {
        let f = Fixture::new().await;
        f.mock.set_privileged(OWNER, true);
        f.ready_wizard(OWNER).await;
        for slot in ["0", "1", "2"] {
            f.open(OWNER, Subflow::Checkpoint).await;
            f.select(OWNER, &[slot]).await;
            f.text(OWNER, &format!("slot {slot}")).await;
        }
        assert_eq!(f.service.list_drafts(C, OWNER).await.unwrap().len(), 3);

        assert_eq!(f.service.on_tier_change(C, OWNER, true).await.unwrap(), 0);
        assert_eq!(f.service.on_tier_change(C, OWNER, false).await.unwrap(), 2);
        let left = f.service.list_drafts(C, OWNER).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].slot, 0);
    }

    #[tokio::test]
    async fn deleting_a_draft_refreshes_the_list() {
        let f = Fixture::new().await;
        f.ready_wizard(OWNER).await;
        f.open(OWNER, Subflow::Checkpoint).await;
        f.select(OWNER, &["0"]).await;
        f.text(OWNER, "old").await;
        f.service
            .wizard_event(C, OWNER, WizardEvent::BrowseDrafts)
            .await
            .unwrap();
        let reply = f
            .service
            .wizard_event(C, OWNER, WizardEvent::DeleteDraft { slot: 0 })
            .await
            .unwrap();
        assert!(reply.wizard.drafts().is_empty());
        assert!(reply.notices.iter().any(|n| n.contains("no saved drafts")));
    }
}
