//! serenity event handler: voice-state updates become presence events,
//! interactions go through [`crate::dispatch`].

use std::sync::Arc;

use {
    async_trait::async_trait,
    once_cell::sync::OnceCell,
    partyline_common::{CommunityId, MemberId, ResourceId, RoleId},
    partyline_gateway::{BotState, PresenceEvent, TimeoutNotice},
    serenity::all::{
        ActionRowComponent, ChannelId, CommandDataOptionValue, CommandInteraction,
        ComponentInteraction, ComponentInteractionDataKind, Context, CreateInteractionResponse,
        CreateInteractionResponseMessage, EventHandler, GuildId, GuildMemberUpdateEvent, Http,
        Interaction, Member, ModalInteraction, UserId, VoiceState,
    },
    tokio::{sync::broadcast, task::JoinHandle},
    tracing::{debug, info, warn},
};

use crate::{
    commands::{self, Arg, Invocation},
    dispatch::{self, Modal, Outcome},
    ids::{Action, WizardAction},
    views,
};

/// The bot state is only known once the client (and its HTTP handle) exists,
/// so it is filled in after construction.
pub type StateCell = Arc<OnceCell<Arc<BotState>>>;

pub struct Handler {
    state: StateCell,
}

impl Handler {
    pub fn new() -> (Self, StateCell) {
        let cell = StateCell::default();
        (
            Self {
                state: Arc::clone(&cell),
            },
            cell,
        )
    }

    fn state(&self) -> Option<&Arc<BotState>> {
        let state = self.state.get();
        if state.is_none() {
            debug!("event before state was ready");
        }
        state
    }
}

/// Enter/leave pairs for one voice-state change. Mute and deafen updates
/// keep the channel and produce nothing.
pub fn presence_events(
    community: CommunityId,
    member: MemberId,
    before: Option<ResourceId>,
    after: Option<ResourceId>,
) -> Vec<PresenceEvent> {
    if before == after {
        return Vec::new();
    }
    before
        .map(|zone| PresenceEvent::left(community, zone, member))
        .into_iter()
        .chain(after.map(|zone| PresenceEvent::entered(community, zone, member)))
        .collect()
}

fn invocation(command: &CommandInteraction) -> Option<Invocation> {
    let sub = command.data.options.first()?;
    let CommandDataOptionValue::SubCommand(options) = &sub.value else {
        return None;
    };
    let args = options
        .iter()
        .filter_map(|o| {
            let arg = match &o.value {
                CommandDataOptionValue::String(s) => Arg::Text(s.clone()),
                CommandDataOptionValue::Integer(i) => Arg::Int(*i),
                CommandDataOptionValue::User(u) => Arg::Member(MemberId(u.get())),
                _ => return None,
            };
            Some((o.name.clone(), arg))
        })
        .collect();
    Some(Invocation {
        name: command.data.name.clone(),
        sub: sub.name.clone(),
        args,
    })
}

fn modal_value(modal: &ModalInteraction) -> String {
    modal
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .find_map(|c| match c {
            ActionRowComponent::InputText(input) if input.custom_id == views::MODAL_INPUT => {
                input.value.clone()
            },
            _ => None,
        })
        .unwrap_or_default()
}

fn ephemeral(text: impl Into<String>) -> CreateInteractionResponse {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(text)
            .ephemeral(true),
    )
}

/// Turn an outcome into a response. `update` edits the message the
/// interaction came from instead of posting a new one.
fn respond(outcome: Outcome, update: bool) -> CreateInteractionResponse {
    match outcome {
        Outcome::Notice(text) => ephemeral(text),
        Outcome::Wizard { wizard, notices } => {
            let message = CreateInteractionResponseMessage::new()
                .content(views::wizard_text(&wizard, &notices))
                .components(views::wizard_rows(&wizard));
            if update {
                CreateInteractionResponse::UpdateMessage(message)
            } else {
                CreateInteractionResponse::Message(message.ephemeral(true))
            }
        },
        Outcome::Modal(Modal::Subflow(kind)) => match views::subflow_modal(kind) {
            Some(modal) => CreateInteractionResponse::Modal(modal),
            None => ephemeral("pick from the menu"),
        },
        Outcome::Modal(Modal::Console(action)) => {
            CreateInteractionResponse::Modal(views::console_modal(action))
        },
    }
}

fn community_of(guild: Option<GuildId>) -> Option<CommunityId> {
    guild.map(|g| CommunityId(g.get()))
}

impl Handler {
    async fn on_command(&self, ctx: &Context, state: &BotState, command: CommandInteraction) {
        let response = match (community_of(command.guild_id), invocation(&command)) {
            (Some(community), Some(inv)) => match commands::parse(&inv) {
                Ok(parsed) => {
                    let actor = MemberId(command.user.id.get());
                    respond(dispatch::run_command(state, community, actor, parsed).await, false)
                },
                Err(msg) => ephemeral(msg),
            },
            _ => ephemeral("this only works inside a server"),
        };
        if let Err(e) = command.create_response(&ctx.http, response).await {
            warn!(command = %command.data.name, error = %e, "failed to answer command");
        }
    }

    async fn on_component(&self, ctx: &Context, state: &BotState, component: ComponentInteraction) {
        let Some(Action::Wizard(action)) = Action::parse(&component.data.custom_id) else {
            return;
        };
        let Some(community) = community_of(component.guild_id) else {
            return;
        };
        let values = match &component.data.kind {
            ComponentInteractionDataKind::StringSelect { values } => values.clone(),
            ComponentInteractionDataKind::UserSelect { values } => {
                values.iter().map(|u| u.get().to_string()).collect()
            },
            _ => Vec::new(),
        };
        let actor = MemberId(component.user.id.get());
        let outcome = dispatch::run_component(state, community, actor, action, values).await;
        let response = respond(outcome, true);
        if let Err(e) = component.create_response(&ctx.http, response).await {
            warn!(id = %component.data.custom_id, error = %e, "failed to answer component");
        }
    }

    async fn on_modal(&self, ctx: &Context, state: &BotState, modal: ModalInteraction) {
        let Some(action) = Action::parse(&modal.data.custom_id) else {
            return;
        };
        let Some(community) = community_of(modal.guild_id) else {
            return;
        };
        let actor = MemberId(modal.user.id.get());
        let value = modal_value(&modal);
        let outcome = dispatch::run_modal(state, community, actor, action, value).await;
        // Wizard modals are raised from the panel, so the panel is edited.
        let update = matches!(action, Action::Wizard(WizardAction::Text));
        if let Err(e) = modal
            .create_response(&ctx.http, respond(outcome, update))
            .await
        {
            warn!(id = %modal.data.custom_id, error = %e, "failed to answer modal");
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let Some(state) = self.state() else { return };
        let definitions = commands::definitions(state.groups.settings());
        for guild in &guilds {
            if let Err(e) = guild.set_commands(&ctx.http, definitions.clone()).await {
                warn!(%guild, error = %e, "failed to register commands");
            }
        }
        let communities: Vec<CommunityId> = guilds.iter().map(|g| CommunityId(g.get())).collect();
        state.reconcile(&communities).await;
        info!(guilds = guilds.len(), "cache ready");
    }

    async fn voice_state_update(&self, _ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(state) = self.state() else { return };
        let Some(community) = community_of(new.guild_id) else {
            return;
        };
        let member = MemberId(new.user_id.get());
        let before = old.and_then(|o| o.channel_id).map(|c| ResourceId(c.get()));
        let after = new.channel_id.map(|c| ResourceId(c.get()));
        for event in presence_events(community, member, before, after) {
            state.on_presence(event).await;
        }
    }

    async fn guild_member_update(
        &self,
        _ctx: Context,
        old: Option<Member>,
        _new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        let Some(state) = self.state() else { return };
        let privileged_roles = &state.config.tiers.privileged_roles;
        let privileged = |roles: &[serenity::all::RoleId]| {
            roles
                .iter()
                .any(|r| privileged_roles.contains(&RoleId(r.get())))
        };
        let now = privileged(&event.roles);
        // Without a cached copy we can't tell whether the tier changed; the
        // trim is idempotent so run it anyway.
        if now || old.is_some_and(|m| !privileged(&m.roles)) {
            return;
        }
        let community = CommunityId(event.guild_id.get());
        let member = MemberId(event.user.id.get());
        if let Err(e) = state.groups.on_tier_change(community, member, now).await {
            warn!(%member, error = %e, "draft trim after tier change failed");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Some(state) = self.state() else { return };
        match interaction {
            Interaction::Command(command) => self.on_command(&ctx, state, command).await,
            Interaction::Component(component) => {
                self.on_component(&ctx, state, component).await;
            },
            Interaction::Modal(modal) => self.on_modal(&ctx, state, modal).await,
            _ => {},
        }
    }
}

// ── Timeout notices ──────────────────────────────────────────────────────────

/// Deliver timeout notices: wizard owners by direct message, party consoles
/// in the party channel's chat.
pub fn spawn_notice_forwarder(
    http: Arc<Http>,
    mut notices: broadcast::Receiver<TimeoutNotice>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let notice = match notices.recv().await {
                Ok(n) => n,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "timeout notices dropped");
                    continue;
                },
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if let Err(e) = deliver(&http, &notice).await {
                debug!(key = %notice.key, error = %e, "timeout notice not delivered");
            }
        }
    })
}

async fn deliver(http: &Http, notice: &TimeoutNotice) -> anyhow::Result<()> {
    let Some((_, subject)) = notice.key.parts() else {
        return Ok(());
    };
    let Some(subject) = std::num::NonZeroU64::new(subject) else {
        return Ok(());
    };
    let text = notice.notices.join("\n");
    match notice.key.kind() {
        "wizard" => {
            let dm = UserId::from(subject).create_dm_channel(http).await?;
            dm.id.say(http, format!("Party setup: {text}")).await?;
        },
        "party" => {
            ChannelId::from(subject).say(http, text).await?;
        },
        _ => {},
    }
    Ok(())
}
