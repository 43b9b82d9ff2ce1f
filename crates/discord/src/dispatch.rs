//! Interaction routing, free of serenity types.
//!
//! Commands, component clicks and modal submits are turned into service
//! calls here. The handler only translates the [`Outcome`] into a response.

use {
    partyline_common::{ActionError, ActionResult, CommunityId, MemberId, ResourceId},
    partyline_gateway::BotState,
    partyline_groups::{ConsoleFlow, ConsoleReply, GroupWizard, Subflow, WizardEvent, WizardReply},
    partyline_store::Store,
    tracing::{debug, warn},
};

use crate::{
    commands::{PartyCommand, RoomCommand, SlashCommand},
    ids::{Action, ConsoleAction, WizardAction},
    views,
};

/// A modal to raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    Subflow(Subflow),
    Console(ConsoleAction),
}

#[derive(Debug, Clone)]
pub enum Outcome {
    /// Plain ephemeral text.
    Notice(String),
    /// The wizard panel, re-rendered.
    Wizard {
        wizard: GroupWizard,
        notices: Vec<String>,
    },
    Modal(Modal),
}

impl Outcome {
    fn from_error(e: &ActionError) -> Self {
        if let ActionError::Internal(inner) = e {
            warn!(error = %inner, "interaction failed");
        }
        Self::Notice(e.user_message())
    }

    fn wizard(reply: WizardReply) -> Self {
        Self::Wizard {
            wizard: reply.wizard,
            notices: reply.notices,
        }
    }
}

fn flatten(result: ActionResult<Outcome>) -> Outcome {
    result.unwrap_or_else(|e| Outcome::from_error(&e))
}

async fn own_party(
    state: &BotState,
    community: CommunityId,
    actor: MemberId,
) -> ActionResult<ResourceId> {
    Ok(state
        .store
        .group_by_owner(community, actor)
        .await?
        .ok_or(ActionError::NotFound("party"))?
        .resource_id)
}

async fn own_room(
    state: &BotState,
    community: CommunityId,
    actor: MemberId,
) -> ActionResult<ResourceId> {
    Ok(state
        .store
        .room_by_owner(community, actor)
        .await?
        .ok_or(ActionError::NotFound("room"))?
        .resource_id)
}

fn party_notice(state: &BotState, reply: &ConsoleReply) -> Outcome {
    Outcome::Notice(views::party_text(
        state.groups.settings(),
        &reply.record,
        &reply.notices,
    ))
}

// ── Slash commands ───────────────────────────────────────────────────────────

pub async fn run_command(
    state: &BotState,
    community: CommunityId,
    actor: MemberId,
    command: SlashCommand,
) -> Outcome {
    debug!(%actor, ?command, "slash command");
    flatten(match command {
        SlashCommand::Room(c) => room_command(state, community, actor, c).await,
        SlashCommand::Party(c) => party_command(state, community, actor, c).await,
    })
}

async fn room_command(
    state: &BotState,
    community: CommunityId,
    actor: MemberId,
    command: RoomCommand,
) -> ActionResult<Outcome> {
    let room = own_room(state, community, actor).await?;
    let console = &state.room_console;
    let text = match command {
        RoomCommand::Limit(raw) => {
            let limit = console.set_capacity(community, room, actor, &raw).await?;
            format!("capacity set to {limit}")
        },
        RoomCommand::Allow(member) => {
            views::access_text(&console.toggle_access(community, room, actor, &[member]).await?)
        },
        RoomCommand::Lock => {
            let kept = console.set_locked(community, room, actor, true).await?;
            match kept.len() {
                0 => "room locked".to_string(),
                n => format!("room locked, {n} member(s) inside keep access"),
            }
        },
        RoomCommand::Unlock => {
            console.set_locked(community, room, actor, false).await?;
            "room unlocked".to_string()
        },
        RoomCommand::Bots => {
            if console.toggle_bots(community, room, actor).await? {
                "bots can no longer join".to_string()
            } else {
                "bots can join again".to_string()
            }
        },
        RoomCommand::Status => views::room_text(&console.status(community, room, actor).await?),
    };
    Ok(Outcome::Notice(text))
}

async fn party_command(
    state: &BotState,
    community: CommunityId,
    actor: MemberId,
    command: PartyCommand,
) -> ActionResult<Outcome> {
    let groups = &state.groups;
    let party = match command {
        PartyCommand::Create => {
            return Ok(Outcome::wizard(groups.open_wizard(community, actor).await?));
        },
        _ => own_party(state, community, actor).await?,
    };
    let reply = match command {
        PartyCommand::Create | PartyCommand::Panel => {
            let record = state
                .store
                .group_by_resource(community, party)
                .await?
                .ok_or(ActionError::NotFound("party"))?;
            return Ok(Outcome::Notice(views::party_text(
                groups.settings(),
                &record,
                &[],
            )));
        },
        PartyCommand::Bump => groups.bump(community, party, actor).await?,
        PartyCommand::Access(member) => {
            let (_, changes) = groups.edit_access(community, party, actor, &[member]).await?;
            return Ok(Outcome::Notice(views::access_text(&changes)));
        },
        PartyCommand::Transfer(member) => {
            groups.begin_transfer(community, party, actor, member).await?;
            return Ok(Outcome::Modal(Modal::Console(ConsoleAction::Transfer)));
        },
        PartyCommand::Mode(key) => {
            let reply = groups.change_mode(community, party, actor, &key).await?;
            if matches!(reply.pending, Some(ConsoleFlow::Size { .. })) {
                return Ok(Outcome::Modal(Modal::Console(ConsoleAction::Size)));
            }
            reply
        },
        PartyCommand::Ranks(lowest, highest) => {
            groups
                .set_rank_range(community, party, actor, &[lowest, highest])
                .await?
        },
        PartyCommand::Roles(roles) => {
            groups
                .set_required_roles(community, party, actor, &roles)
                .await?
        },
        PartyCommand::Description => {
            return Ok(Outcome::Modal(Modal::Console(ConsoleAction::Description)));
        },
        PartyCommand::Color(raw) => groups.set_color(community, party, actor, &raw).await?,
        PartyCommand::LookingFor(raw) => {
            groups
                .set_looking_for(community, party, actor, &raw)
                .await?
        },
        PartyCommand::Privacy => groups.toggle_privacy(community, party, actor).await?,
        PartyCommand::Close => {
            groups.close(community, party, actor).await?;
            return Ok(Outcome::Notice("party closed".into()));
        },
    };
    Ok(party_notice(state, &reply))
}

// ── Components ───────────────────────────────────────────────────────────────

fn slot(values: &[String]) -> ActionResult<u8> {
    values
        .first()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ActionError::validation("pick a slot"))
}

pub async fn run_component(
    state: &BotState,
    community: CommunityId,
    actor: MemberId,
    action: WizardAction,
    values: Vec<String>,
) -> Outcome {
    let groups = &state.groups;
    let event = match action {
        WizardAction::Pick | WizardAction::Members => WizardEvent::Select(values),
        WizardAction::Open(kind) => WizardEvent::Open(kind),
        // The name modal belongs to an already open checkpoint.
        WizardAction::Name => return Outcome::Modal(Modal::Subflow(Subflow::Checkpoint)),
        WizardAction::Text => return Outcome::Notice(ActionError::Timeout.user_message()),
        WizardAction::Privacy => WizardEvent::TogglePrivacy,
        WizardAction::Drafts => WizardEvent::BrowseDrafts,
        WizardAction::Restore => match slot(&values) {
            Ok(slot) => WizardEvent::Restore { slot },
            Err(e) => return Outcome::from_error(&e),
        },
        WizardAction::Delete => match slot(&values) {
            Ok(slot) => WizardEvent::DeleteDraft { slot },
            Err(e) => return Outcome::from_error(&e),
        },
        WizardAction::Publish => WizardEvent::Publish,
        WizardAction::Cancel => WizardEvent::Cancel,
    };
    let result = groups.wizard_event(community, actor, event).await;
    flatten(result.map(|reply| match action {
        WizardAction::Open(kind) if views::subflow_modal(kind).is_some() => {
            Outcome::Modal(Modal::Subflow(kind))
        },
        _ => Outcome::wizard(reply),
    }))
}

// ── Modals ───────────────────────────────────────────────────────────────────

pub async fn run_modal(
    state: &BotState,
    community: CommunityId,
    actor: MemberId,
    action: Action,
    value: String,
) -> Outcome {
    let groups = &state.groups;
    flatten(
        async {
            match action {
                Action::Wizard(_) => Ok(Outcome::wizard(
                    groups
                        .wizard_event(community, actor, WizardEvent::Text(value))
                        .await?,
                )),
                Action::Console(kind) => {
                    let party = own_party(state, community, actor).await?;
                    let reply = match kind {
                        ConsoleAction::Size => {
                            groups.submit_size(community, party, actor, &value).await?
                        },
                        ConsoleAction::Transfer => {
                            groups
                                .complete_transfer(community, party, actor, &value)
                                .await?
                        },
                        ConsoleAction::Description => {
                            groups
                                .set_description(community, party, actor, &value)
                                .await?
                        },
                    };
                    Ok(party_notice(state, &reply))
                },
            }
        }
        .await,
    )
}
