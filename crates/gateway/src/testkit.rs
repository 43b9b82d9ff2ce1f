//! Fully wired state over the mock platform and an in-memory store.

use std::sync::Arc;

use {
    partyline_channels::mock::MockPlatform,
    partyline_common::{CommunityId, MemberId, ResourceId},
    partyline_config::PartylineConfig,
    partyline_groups::{Subflow, WizardEvent},
    partyline_sessions::Expired,
    partyline_store::SqliteStore,
    tokio::sync::mpsc,
};

use crate::state::BotState;

pub(crate) const C: CommunityId = CommunityId(1);

pub(crate) struct Harness {
    pub mock: Arc<MockPlatform>,
    pub store: Arc<SqliteStore>,
    pub state: Arc<BotState>,
    pub spawn: ResourceId,
    pub staging: ResourceId,
    pub expired: Option<mpsc::UnboundedReceiver<Expired>>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(|_| {}).await
    }

    pub async fn with(tweak: impl FnOnce(&mut PartylineConfig)) -> Self {
        let mock = MockPlatform::new();
        let spawn = mock.add_channel("join to create", 0);
        let rooms = mock.add_channel("rooms", 0);
        let staging = mock.add_channel("looking for group", 0);
        let announce = mock.add_channel("parties", 0);
        let ops = mock.add_channel("ops", 0);

        let mut config = PartylineConfig::default();
        config.rooms.spawn_channel = Some(spawn);
        config.rooms.category = Some(rooms);
        config.groups.staging_channels = vec![staging];
        config.groups.announcement_channel = Some(announce);
        config.discord.ops_log_channel = Some(ops);
        tweak(&mut config);

        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let (state, expired) = BotState::new(config, store.clone(), mock.platform());
        Self {
            mock,
            store,
            state,
            spawn,
            staging,
            expired: Some(expired),
        }
    }

    /// Walk `member` through the wizard and publish a competitive party.
    pub async fn publish_party(&self, member: MemberId) -> ResourceId {
        let groups = &self.state.groups;
        self.mock.place(member, self.staging);
        groups.open_wizard(C, member).await.unwrap();
        for event in [
            WizardEvent::Select(vec!["eu".into()]),
            WizardEvent::Select(vec!["competitive".into()]),
            WizardEvent::Select(vec!["Gold".into(), "Diamond".into()]),
            WizardEvent::Open(Subflow::Identity),
            WizardEvent::Text("Player#EUW".into()),
        ] {
            groups.wizard_event(C, member, event).await.unwrap();
        }
        groups
            .wizard_event(C, member, WizardEvent::Publish)
            .await
            .unwrap()
            .published
            .unwrap()
    }
}
