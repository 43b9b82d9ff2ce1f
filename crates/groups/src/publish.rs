//! Turning a finished wizard draft into a live party.

use {
    partyline_channels::{Access, Overwrite, OverwriteTarget, VoiceChannelSpec},
    partyline_common::{ActionError, ActionResult, CommunityId, MemberId, ResourceId, now_ms},
    partyline_cooldowns::{action, actor_key, resource_key},
    partyline_store::{GroupConfig, GroupRecord, StoreError},
    tracing::{info, warn},
};

use crate::{render, service::GroupService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub resource: ResourceId,
    pub notices: Vec<String>,
}

/// Permission overwrites for a new party resource.
///
/// Denies win: a blocked member stays out even when also on the access list.
pub fn party_overwrites(
    owner: MemberId,
    config: &GroupConfig,
    block_partners: &[MemberId],
) -> Vec<Overwrite> {
    let mut out: Vec<Overwrite> = Vec::new();
    let mut put = |target: OverwriteTarget, access: Access| {
        out.retain(|o| o.target != target);
        out.push(Overwrite { target, access });
    };
    if config.private {
        put(OverwriteTarget::Everyone, Access::Deny);
    }
    put(OverwriteTarget::Member(owner), Access::Allow);
    for m in &config.access_list {
        put(OverwriteTarget::Member(*m), Access::Allow);
    }
    for m in block_partners.iter().filter(|m| **m != owner) {
        put(OverwriteTarget::Member(*m), Access::Deny);
    }
    out
}

impl GroupService {
    pub(crate) async fn publish(
        &self,
        community: CommunityId,
        owner: MemberId,
        privileged: bool,
        config: GroupConfig,
    ) -> ActionResult<PublishOutcome> {
        self.require_staging(community, owner).await?;
        self.require_no_record(community, owner).await?;
        let guard = self
            .cooldowns
            .try_acquire(
                actor_key(owner, action::PUBLISH),
                self.settings.publish_cooldown(privileged),
            )
            .map_err(|remaining| ActionError::RateLimited { remaining })?;
        if !config.is_publishable() {
            return Err(ActionError::validation("set your in-game name first"));
        }
        let mode = config
            .mode
            .as_deref()
            .ok_or_else(|| ActionError::validation("pick a mode first"))?;

        let partners = self.store.block_partners(community, owner).await?;
        let number = self.store.next_group_number(community, mode).await?;
        let spec = VoiceChannelSpec {
            name: render::resource_name(&self.settings, mode, number),
            category: self.settings.category,
            user_limit: config.size,
            overwrites: party_overwrites(owner, &config, &partners),
        };
        let resource = self
            .platform
            .voice
            .create_voice_channel(community, &spec)
            .await?;

        let record = GroupRecord {
            community,
            owner,
            config,
            resource_id: resource,
            artifact_id: None,
            created_at: now_ms(),
        };
        if let Err(e) = self.occupy(&record).await {
            if let Err(del) = self.platform.voice.delete_channel(resource).await {
                warn!(%resource, error = %del, "failed to delete party resource after setup error");
            }
            return Err(e);
        }

        let mut notices = Vec::new();
        if let Some(note) = self.announce(&record, true).await {
            notices.push(note);
        }
        if let Err(e) = self.store.append_history(&record).await {
            warn!(%owner, error = %e, "failed to append party history");
        }

        guard.commit();
        self.cooldowns.set(
            resource_key(resource, action::BUMP),
            self.settings.bump_resource_cooldown(),
        );
        info!(%owner, %resource, name = %spec.name, "party published");
        Ok(PublishOutcome { resource, notices })
    }

    /// Move the owner in, then persist. A lost uniqueness race surfaces as a
    /// conflict.
    async fn occupy(&self, record: &GroupRecord) -> ActionResult<()> {
        self.platform
            .voice
            .move_member(record.community, record.owner, record.resource_id)
            .await?;
        match self.store.insert_group(record).await {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict(_)) => {
                Err(ActionError::conflict("you already host a party"))
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Post (or re-post) the announcement and store its id. With `replace`
    /// the previous artifact is deleted after the new one is up.
    ///
    /// Failures are logged and come back as a notice for the actor.
    pub(crate) async fn announce(&self, record: &GroupRecord, replace: bool) -> Option<String> {
        let channel = self.settings.announcement_channel?;
        let owner_name = self.platform.name_of(record.community, record.owner).await;
        let rendered = render::render_announcement(&self.settings, record, &owner_name);

        let artifact = match self
            .platform
            .announcements
            .publish(channel, &rendered)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(resource = %record.resource_id, error = %e, "failed to post announcement");
                return Some("the party is up but the announcement could not be posted".into());
            },
        };
        if replace
            && let Some(previous) = record.artifact_id
            && let Err(e) = self
                .platform
                .announcements
                .delete(channel, previous)
                .await
        {
            warn!(%previous, error = %e, "failed to delete previous announcement");
        }
        if let Err(e) = self
            .store
            .set_group_artifact(record.community, record.resource_id, Some(artifact))
            .await
        {
            warn!(resource = %record.resource_id, error = %e, "failed to store announcement id");
        }
        None
    }

    /// Edit the live announcement in place. Failures become a notice.
    pub(crate) async fn rerender(&self, record: &GroupRecord) -> Option<String> {
        let (Some(channel), Some(artifact)) =
            (self.settings.announcement_channel, record.artifact_id)
        else {
            return None;
        };
        let owner_name = self.platform.name_of(record.community, record.owner).await;
        let rendered = render::render_announcement(&self.settings, record, &owner_name);
        match self
            .platform
            .announcements
            .edit(channel, artifact, &rendered)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                warn!(%artifact, error = %e, "failed to update announcement");
                Some("saved, but the announcement could not be updated".into())
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            testkit::{C, Fixture, OWNER},
            wizard::{Stage, Subflow, WizardEvent},
        },
        partyline_channels::access,
        partyline_store::Store,
        std::time::Duration,
    };

    #[test]
    fn overwrites_deny_wins() {
        let config = GroupConfig {
            private: true,
            access_list: vec![MemberId(7), MemberId(8)],
            ..Default::default()
        };
        let ows = party_overwrites(OWNER, &config, &[MemberId(8), MemberId(9)]);
        assert!(access::is_locked(&ows));
        assert_eq!(access::effective(&ows, OWNER), Access::Allow);
        assert_eq!(access::effective(&ows, MemberId(7)), Access::Allow);
        assert_eq!(access::effective(&ows, MemberId(8)), Access::Deny);
        assert_eq!(access::effective(&ows, MemberId(9)), Access::Deny);
        assert_eq!(access::effective(&ows, MemberId(10)), Access::Deny);
    }

    #[tokio::test]
    async fn publish_creates_everything() {
        let f = Fixture::new().await;
        f.store.add_block(C, MemberId(9), OWNER).await.unwrap();
        let reply = f.publish_ready(OWNER, &[MemberId(7)]).await;
        let res = reply.published.unwrap();
        assert!(reply.closed);
        assert_eq!(reply.wizard.stage(), Stage::Published(res));

        let ch = f.mock.channel(res).unwrap();
        assert_eq!(ch.name, "Competitive #1");
        assert_eq!(ch.user_limit, 5);
        assert_eq!(access::effective(&ch.overwrites, MemberId(9)), Access::Deny);
        assert_eq!(f.mock.location(OWNER), Some(res));

        let rec = f.store.group_by_owner(C, OWNER).await.unwrap().unwrap();
        let ann = f.mock.announcement(rec.artifact_id.unwrap()).unwrap();
        assert!(ann.title.ends_with("+4"), "{}", ann.title);
        assert_eq!(f.store.history_for(C, OWNER, 10).await.unwrap().len(), 1);

        assert!(f.cooldowns.check(&actor_key(OWNER, action::PUBLISH)).is_some());
        assert!(f.cooldowns.check(&resource_key(res, action::BUMP)).is_some());
        assert_eq!(f.service.active_wizards(), 0);
    }

    #[tokio::test]
    async fn counter_names_parties_per_mode() {
        let f = Fixture::new().await;
        let a = f.publish_ready(MemberId(1), &[]).await.published.unwrap();
        let b = f.publish_ready(MemberId(2), &[]).await.published.unwrap();
        assert_eq!(f.mock.channel(a).unwrap().name, "Competitive #1");
        assert_eq!(f.mock.channel(b).unwrap().name, "Competitive #2");
    }

    #[tokio::test]
    async fn publish_rechecks_presence() {
        let f = Fixture::new().await;
        f.ready_wizard(OWNER).await;
        f.mock.disconnect(OWNER);
        let err = f
            .service
            .wizard_event(C, OWNER, WizardEvent::Publish)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NotPresent(_)));
        // Back at the hub, nothing created, no cooldown armed.
        let w = f.service.wizards.get(&f.wizard_key(OWNER)).unwrap();
        assert_eq!(w.state.lock().await.stage(), Stage::Ready);
        assert!(f.cooldowns.check(&actor_key(OWNER, action::PUBLISH)).is_none());
    }

    #[tokio::test]
    async fn failed_move_deletes_the_resource() {
        let f = Fixture::new().await;
        f.ready_wizard(OWNER).await;
        let before = f.mock.channel_count();
        f.mock.fail_move(true);
        assert!(f
            .service
            .wizard_event(C, OWNER, WizardEvent::Publish)
            .await
            .is_err());
        assert_eq!(f.mock.channel_count(), before);
        assert!(f.store.group_by_owner(C, OWNER).await.unwrap().is_none());
        assert!(f.cooldowns.check(&actor_key(OWNER, action::PUBLISH)).is_none());
    }

    #[tokio::test]
    async fn lost_race_deletes_the_resource() {
        let f = Fixture::new().await;
        f.ready_wizard(OWNER).await;
        // Another path published for this owner between the check and insert.
        f.store
            .insert_group(&GroupRecord {
                community: C,
                owner: OWNER,
                config: GroupConfig::default(),
                resource_id: ResourceId(1),
                artifact_id: None,
                created_at: 0,
            })
            .await
            .unwrap();
        let before = f.mock.channel_count();
        let err = f
            .service
            .wizard_event(C, OWNER, WizardEvent::Publish)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Conflict(_)));
        assert_eq!(f.mock.channel_count(), before);
    }

    #[tokio::test]
    async fn publish_cooldown_applies() {
        let f = Fixture::new().await;
        f.publish_ready(OWNER, &[]).await;
        let rec = f.store.group_by_owner(C, OWNER).await.unwrap().unwrap();
        f.store.delete_group(C, rec.resource_id).await.unwrap();
        f.mock.place(OWNER, f.staging);

        f.ready_wizard(OWNER).await;
        let err = f
            .service
            .wizard_event(C, OWNER, WizardEvent::Publish)
            .await
            .unwrap_err();
        let ActionError::RateLimited { remaining } = err else {
            panic!("expected rate limit, got {err:?}");
        };
        assert!(remaining <= Duration::from_secs(900));
    }

    #[tokio::test]
    async fn no_announcement_channel_skips_posting() {
        let f = Fixture::with(|cfg| cfg.groups.announcement_channel = None).await;
        let reply = f.publish_ready(OWNER, &[]).await;
        assert!(reply.published.is_some());
        let rec = f.store.group_by_owner(C, OWNER).await.unwrap().unwrap();
        assert_eq!(rec.artifact_id, None);
    }

    #[tokio::test]
    async fn identity_is_screened() {
        let f = Fixture::new().await;
        f.mock.flag_word("rude");
        f.service.open_wizard(C, OWNER).await.unwrap();
        for v in ["eu", "unrated"] {
            f.select(OWNER, &[v]).await;
        }
        f.service
            .wizard_event(C, OWNER, WizardEvent::Open(Subflow::Identity))
            .await
            .unwrap();
        let err = f
            .service
            .wizard_event(C, OWNER, WizardEvent::Text("RudeGuy#EUW".into()))
            .await
            .unwrap_err();
        assert!(err.keeps_subflow_open());
        let w = f.service.wizards.get(&f.wizard_key(OWNER)).unwrap();
        assert!(w.state.lock().await.subflow().is_some());
    }
}
