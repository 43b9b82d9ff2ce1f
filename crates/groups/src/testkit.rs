//! Shared fixture for the service tests.

use std::sync::Arc;

use {
    partyline_channels::mock::MockPlatform,
    partyline_common::{CommunityId, MemberId, ResourceId},
    partyline_config::PartylineConfig,
    partyline_cooldowns::CooldownRegistry,
    partyline_sessions::{Expired, SessionKey},
    partyline_store::SqliteStore,
    tokio::sync::mpsc,
};

use crate::{
    service::{GroupService, WizardReply},
    wizard::{Subflow, WizardEvent},
};

pub(crate) const C: CommunityId = CommunityId(1);
pub(crate) const OWNER: MemberId = MemberId(42);

pub(crate) struct Fixture {
    pub mock: Arc<MockPlatform>,
    pub store: Arc<SqliteStore>,
    pub cooldowns: Arc<CooldownRegistry>,
    pub service: GroupService,
    pub staging: ResourceId,
    pub announce: ResourceId,
    pub holding: ResourceId,
    _expired: mpsc::UnboundedReceiver<Expired>,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with(|_| {}).await
    }

    pub async fn with(tweak: impl FnOnce(&mut PartylineConfig)) -> Self {
        let mock = MockPlatform::new();
        let staging = mock.add_channel("looking for group", 0);
        let announce = mock.add_channel("parties", 0);
        let holding = mock.add_channel("waiting room", 0);
        let ops = mock.add_channel("ops", 0);

        let mut config = PartylineConfig::default();
        config.groups.staging_channels = vec![staging];
        config.groups.announcement_channel = Some(announce);
        config.groups.holding_channel = Some(holding);
        config.discord.ops_log_channel = Some(ops);
        tweak(&mut config);

        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let cooldowns = Arc::new(CooldownRegistry::new());
        let (service, expired) =
            GroupService::new(&config, store.clone(), mock.platform(), cooldowns.clone());
        Self {
            mock,
            store,
            cooldowns,
            service,
            staging,
            announce,
            holding,
            _expired: expired,
        }
    }

    pub fn wizard_key(&self, member: MemberId) -> SessionKey {
        SessionKey::wizard(C, member)
    }

    pub async fn select(&self, member: MemberId, values: &[&str]) -> WizardReply {
        let values = values.iter().map(|v| v.to_string()).collect();
        self.service
            .wizard_event(C, member, WizardEvent::Select(values))
            .await
            .unwrap()
    }

    pub async fn text(&self, member: MemberId, text: &str) -> WizardReply {
        self.service
            .wizard_event(C, member, WizardEvent::Text(text.into()))
            .await
            .unwrap()
    }

    pub async fn open(&self, member: MemberId, kind: Subflow) -> WizardReply {
        self.service
            .wizard_event(C, member, WizardEvent::Open(kind))
            .await
            .unwrap()
    }

    /// Member in staging with a competitive Gold..Diamond draft and an
    /// identity, ready to publish.
    pub async fn ready_wizard(&self, member: MemberId) {
        self.mock.place(member, self.staging);
        self.service.open_wizard(C, member).await.unwrap();
        self.select(member, &["eu"]).await;
        self.select(member, &["competitive"]).await;
        self.select(member, &["Gold", "Diamond"]).await;
        self.open(member, Subflow::Identity).await;
        self.text(member, "Player#EUW").await;
    }

    pub async fn publish_ready(&self, member: MemberId, access: &[MemberId]) -> WizardReply {
        self.ready_wizard(member).await;
        if !access.is_empty() {
            self.open(member, Subflow::AccessList).await;
            let ids: Vec<String> = access.iter().map(|m| m.to_string()).collect();
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            self.select(member, &ids).await;
        }
        self.service
            .wizard_event(C, member, WizardEvent::Publish)
            .await
            .unwrap()
    }
}
