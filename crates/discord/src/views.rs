//! Message text and component layouts.
//!
//! Text is built by plain functions so it can be checked without a client;
//! the builders below only arrange it into serenity components.

use std::fmt::Write as _;

use {
    partyline_channels::access::AccessChange,
    partyline_common::{MemberId, format_wait},
    partyline_config::GroupsConfig,
    partyline_groups::{GroupWizard, Stage, Subflow, render},
    partyline_rooms::RoomStatus,
    partyline_store::{GroupConfig, GroupRecord},
    serenity::all::{
        ButtonStyle, CreateActionRow, CreateButton, CreateInputText, CreateModal,
        CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption, InputTextStyle,
    },
};

use crate::ids::{Action, ConsoleAction, WizardAction};

/// Discord caps select menus at 25 options.
const MAX_OPTIONS: usize = 25;

/// Custom id of the single input inside every modal.
pub const MODAL_INPUT: &str = "value";

// ── Text ─────────────────────────────────────────────────────────────────────

/// What the member is asked to do right now.
pub fn prompt(wizard: &GroupWizard) -> String {
    if let Some(active) = wizard.subflow() {
        return match active.kind {
            Subflow::Identity => "Enter your in-game name as `Name#TAG`.".into(),
            Subflow::RequiredRoles => "Pick the roles you are looking for.".into(),
            Subflow::AccessList => "Pick members who may always join.".into(),
            Subflow::Description => "Write a short description.".into(),
            Subflow::Color => "Enter a color as `#RRGGBB`.".into(),
            Subflow::LookingFor => "How many players are you looking for? `auto` resets.".into(),
            Subflow::Checkpoint if active.slot.is_none() => "Pick a draft slot.".into(),
            Subflow::Checkpoint => "Name this draft.".into(),
        };
    }
    match wizard.stage() {
        Stage::SelectRegion => "Pick a region.".into(),
        Stage::SelectMode => "Pick a mode.".into(),
        Stage::SelectRankRange => "Pick the lowest and highest rank.".into(),
        Stage::SelectSize => "Pick a party size.".into(),
        Stage::DraftRestore => "Restore or delete a saved draft.".into(),
        Stage::Configuring => "Set your in-game name, then publish.".into(),
        Stage::Ready => "Ready to publish.".into(),
        Stage::Publishing => "Publishing...".into(),
        Stage::Published(resource) => format!("Your party is up in {}.", resource.mention()),
        Stage::Closed => "Setup closed.".into(),
    }
}

fn draft_lines(settings: &GroupsConfig, draft: &GroupConfig, out: &mut String) {
    if let Some(region) = draft.region.as_deref().and_then(|r| settings.region(r)) {
        let _ = writeln!(out, "Region: {}", region.label);
    }
    if let Some(mode) = draft.mode.as_deref().and_then(|m| settings.mode(m)) {
        let _ = writeln!(out, "Mode: {}", mode.label);
    }
    if draft.size > 0 {
        let _ = writeln!(out, "Size: {} (looking for +{})", draft.size, draft.looking_for_count());
    }
    if let Some(ranks) = render::rank_label(settings, draft) {
        let _ = writeln!(out, "Ranks: {ranks}");
    }
    if let Some(ign) = &draft.ign {
        let _ = writeln!(out, "In-game name: {ign}");
    }
    if !draft.required_roles.is_empty() {
        let _ = writeln!(out, "Roles: {}", draft.required_roles.join(", "));
    }
    if !draft.access_list.is_empty() {
        let members: Vec<String> = draft.access_list.iter().map(|m| m.mention()).collect();
        let _ = writeln!(out, "Access list: {}", members.join(" "));
    }
    if let Some(description) = &draft.description {
        let _ = writeln!(out, "Description: {description}");
    }
    if let Some(color) = draft.color {
        let _ = writeln!(out, "Color: #{color:06X}");
    }
    let _ = writeln!(out, "Access: {}", if draft.private { "invite only" } else { "open" });
}

/// Panel text for a wizard: prompt, draft so far, then notices.
pub fn wizard_text(wizard: &GroupWizard, notices: &[String]) -> String {
    let mut out = format!("**Party setup**\n{}\n\n", prompt(wizard));
    if wizard.stage().is_hub() || wizard.stage() == Stage::Publishing {
        draft_lines(wizard.settings(), wizard.draft(), &mut out);
    }
    with_notices(out, notices)
}

pub fn party_text(settings: &GroupsConfig, record: &GroupRecord, notices: &[String]) -> String {
    let mut out = format!("**Your party** in {}\n", record.resource_id.mention());
    draft_lines(settings, &record.config, &mut out);
    with_notices(out, notices)
}

pub fn room_text(status: &RoomStatus) -> String {
    let mut out = format!("**Your room** {}\n", status.resource.mention());
    let capacity = match status.capacity {
        0 => "unlimited".to_string(),
        n => n.to_string(),
    };
    let _ = writeln!(out, "Capacity: {capacity}");
    let _ = writeln!(out, "Locked: {}", yes_no(status.locked));
    let _ = writeln!(out, "Bots blocked: {}", yes_no(status.bots_blocked));
    if !status.allowed.is_empty() {
        let _ = writeln!(out, "Allowed: {}", mentions(&status.allowed));
    }
    if !status.denied.is_empty() {
        let _ = writeln!(out, "Denied: {}", mentions(&status.denied));
    }
    if let Some(wait) = status.create_cooldown {
        let _ = writeln!(out, "Next room in {}", format_wait(wait));
    }
    out
}

pub fn access_text(changes: &[(MemberId, AccessChange)]) -> String {
    if changes.is_empty() {
        return "nothing changed".into();
    }
    changes
        .iter()
        .map(|(m, change)| match change {
            AccessChange::Granted => format!("{} can join", m.mention()),
            AccessChange::Revoked => format!("{} can no longer join", m.mention()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn yes_no(v: bool) -> &'static str {
    if v { "yes" } else { "no" }
}

fn mentions(members: &[MemberId]) -> String {
    members
        .iter()
        .map(|m| m.mention())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn with_notices(mut text: String, notices: &[String]) -> String {
    for notice in notices {
        let _ = write!(text, "\n> {notice}");
    }
    text
}

// ── Components ───────────────────────────────────────────────────────────────

fn button(action: WizardAction, label: &str, style: ButtonStyle) -> CreateButton {
    CreateButton::new(Action::Wizard(action).id())
        .label(label)
        .style(style)
}

fn string_select(
    id: WizardAction,
    placeholder: &str,
    options: impl IntoIterator<Item = (String, String)>,
    min: u8,
    max: Option<u8>,
) -> CreateActionRow {
    let options: Vec<CreateSelectMenuOption> = options
        .into_iter()
        .take(MAX_OPTIONS)
        .map(|(label, value)| CreateSelectMenuOption::new(label, value))
        .collect();
    let max = max.unwrap_or(1).min(u8::try_from(options.len()).unwrap_or(1)).max(1);
    CreateActionRow::SelectMenu(
        CreateSelectMenu::new(Action::Wizard(id).id(), CreateSelectMenuKind::String {
            options,
        })
        .placeholder(placeholder)
        .min_values(min)
        .max_values(max),
    )
}

fn start_buttons() -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        button(WizardAction::Drafts, "Load draft", ButtonStyle::Secondary),
        button(WizardAction::Cancel, "Cancel", ButtonStyle::Danger),
    ])
}

fn hub_rows(wizard: &GroupWizard) -> Vec<CreateActionRow> {
    let draft = wizard.draft();
    let open = |kind, label: &str| button(WizardAction::Open(kind), label, ButtonStyle::Secondary);
    let mut extras = vec![CreateButton::new(Action::Wizard(WizardAction::Privacy).id())
        .label(if draft.private { "Make open" } else { "Make invite only" })
        .style(ButtonStyle::Secondary)];
    if wizard.privileged() {
        extras.push(open(Subflow::Color, "Color"));
    }
    if wizard.draft_quota() > 0 {
        extras.push(open(Subflow::Checkpoint, "Save draft"));
    }
    extras.push(button(WizardAction::Drafts, "Load draft", ButtonStyle::Secondary));
    vec![
        CreateActionRow::Buttons(vec![
            open(Subflow::Identity, "In-game name"),
            open(Subflow::RequiredRoles, "Roles"),
            open(Subflow::AccessList, "Access list"),
            open(Subflow::Description, "Description"),
            open(Subflow::LookingFor, "Looking for"),
        ]),
        CreateActionRow::Buttons(extras),
        CreateActionRow::Buttons(vec![
            button(WizardAction::Publish, "Publish", ButtonStyle::Success)
                .disabled(wizard.stage() != Stage::Ready),
            button(WizardAction::Cancel, "Cancel", ButtonStyle::Danger),
        ]),
    ]
}

/// Control for the open select-style sub-flow, if any.
fn subflow_row(wizard: &GroupWizard) -> Option<CreateActionRow> {
    let active = wizard.subflow()?;
    let settings = wizard.settings();
    match active.kind {
        Subflow::RequiredRoles => Some(string_select(
            WizardAction::Pick,
            "Roles",
            settings.sub_roles.iter().map(|r| (r.clone(), r.clone())),
            0,
            u8::try_from(settings.sub_roles.len()).ok(),
        )),
        Subflow::AccessList => {
            let room = wizard.draft().size.saturating_sub(1).max(1);
            Some(CreateActionRow::SelectMenu(
                CreateSelectMenu::new(
                    Action::Wizard(WizardAction::Members).id(),
                    CreateSelectMenuKind::User {
                        default_users: None,
                    },
                )
                .placeholder("Members")
                .min_values(0)
                .max_values(room),
            ))
        },
        Subflow::Checkpoint if active.slot.is_none() => Some(string_select(
            WizardAction::Pick,
            "Draft slot",
            (0..wizard.draft_quota()).map(|s| (format!("Slot {}", s + 1), s.to_string())),
            1,
            None,
        )),
        Subflow::Checkpoint => Some(CreateActionRow::Buttons(vec![button(
            WizardAction::Name,
            "Name this draft",
            ButtonStyle::Primary,
        )])),
        _ => None,
    }
}

pub fn wizard_rows(wizard: &GroupWizard) -> Vec<CreateActionRow> {
    let settings = wizard.settings();
    match wizard.stage() {
        Stage::SelectRegion => vec![
            string_select(
                WizardAction::Pick,
                "Region",
                settings.regions.iter().map(|r| (r.label.clone(), r.key.clone())),
                1,
                None,
            ),
            start_buttons(),
        ],
        Stage::SelectMode => vec![
            string_select(
                WizardAction::Pick,
                "Mode",
                settings.modes.iter().map(|m| (m.label.clone(), m.key.clone())),
                1,
                None,
            ),
            start_buttons(),
        ],
        Stage::SelectRankRange => vec![string_select(
            WizardAction::Pick,
            "Lowest and highest rank",
            settings.ranks.iter().map(|r| (r.clone(), r.clone())),
            2,
            Some(2),
        )],
        Stage::SelectSize => {
            let (lo, hi) = wizard
                .draft()
                .mode
                .as_deref()
                .and_then(|m| settings.mode(m))
                .map_or((2, 10), |m| m.size_bounds());
            vec![string_select(
                WizardAction::Pick,
                "Party size",
                (lo..=hi).map(|n| (n.to_string(), n.to_string())),
                1,
                None,
            )]
        },
        Stage::DraftRestore => {
            let drafts = wizard.drafts();
            let mut rows = Vec::new();
            if !drafts.is_empty() {
                let options = || {
                    drafts
                        .iter()
                        .map(|d| (format!("{}: {}", d.slot + 1, d.name), d.slot.to_string()))
                };
                rows.push(string_select(WizardAction::Restore, "Restore", options(), 1, None));
                rows.push(string_select(WizardAction::Delete, "Delete", options(), 1, None));
            }
            rows.push(CreateActionRow::Buttons(vec![button(
                WizardAction::Cancel,
                "Cancel",
                ButtonStyle::Danger,
            )]));
            rows
        },
        s if s.is_hub() => subflow_row(wizard).into_iter().chain(hub_rows(wizard)).collect(),
        _ => Vec::new(),
    }
}

// ── Modals ───────────────────────────────────────────────────────────────────

fn modal(id: Action, title: &str, label: &str, style: InputTextStyle, max: u16) -> CreateModal {
    CreateModal::new(id.id(), title).components(vec![CreateActionRow::InputText(
        CreateInputText::new(style, label, MODAL_INPUT)
            .max_length(max)
            .required(true),
    )])
}

/// Modal for a text sub-flow. Select-style sub-flows have none.
pub fn subflow_modal(kind: Subflow) -> Option<CreateModal> {
    let text = Action::Wizard(WizardAction::Text);
    let short = InputTextStyle::Short;
    Some(match kind {
        Subflow::Identity => modal(text, "In-game name", "Name#TAG", short, 22),
        Subflow::Description => modal(
            text,
            "Description",
            "Description",
            InputTextStyle::Paragraph,
            partyline_groups::wizard::DESCRIPTION_MAX as u16,
        ),
        Subflow::Color => modal(text, "Color", "#RRGGBB", short, 7),
        Subflow::LookingFor => modal(text, "Looking for", "Players, or auto", short, 4),
        Subflow::Checkpoint => modal(
            text,
            "Save draft",
            "Draft name",
            short,
            partyline_groups::wizard::DRAFT_NAME_MAX as u16,
        ),
        Subflow::RequiredRoles | Subflow::AccessList => return None,
    })
}

pub fn console_modal(action: ConsoleAction) -> CreateModal {
    let id = Action::Console(action);
    match action {
        ConsoleAction::Size => modal(id, "Party size", "Size", InputTextStyle::Short, 2),
        ConsoleAction::Transfer => modal(
            id,
            "Transfer party",
            "New host's in-game name (Name#TAG)",
            InputTextStyle::Short,
            22,
        ),
        ConsoleAction::Description => modal(
            id,
            "Description",
            "Description",
            InputTextStyle::Paragraph,
            partyline_groups::wizard::DESCRIPTION_MAX as u16,
        ),
    }
}
