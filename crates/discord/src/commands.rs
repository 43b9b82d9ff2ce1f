//! Slash commands: registration payloads and argument parsing.

use {
    partyline_common::MemberId,
    partyline_config::GroupsConfig,
    serenity::all::{CommandOptionType, CreateCommand, CreateCommandOption},
};

/// One resolved argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Text(String),
    Int(i64),
    Member(MemberId),
}

/// A slash command flattened to `name sub args...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub sub: String,
    pub args: Vec<(String, Arg)>,
}

impl Invocation {
    fn arg(&self, name: &str) -> Option<&Arg> {
        self.args.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    fn text(&self, name: &str) -> Result<String, String> {
        match self.arg(name) {
            Some(Arg::Text(s)) => Ok(s.clone()),
            Some(Arg::Int(i)) => Ok(i.to_string()),
            _ => Err(format!("missing `{name}`")),
        }
    }

    fn member(&self, name: &str) -> Result<MemberId, String> {
        match self.arg(name) {
            Some(Arg::Member(m)) => Ok(*m),
            _ => Err(format!("missing `{name}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCommand {
    Limit(String),
    Allow(MemberId),
    Lock,
    Unlock,
    Bots,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyCommand {
    Create,
    Panel,
    Bump,
    Access(MemberId),
    Transfer(MemberId),
    Mode(String),
    Ranks(String, String),
    Roles(Vec<String>),
    Description,
    Color(String),
    LookingFor(String),
    Privacy,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Room(RoomCommand),
    Party(PartyCommand),
}

/// Map an invocation to a command. `Err` carries a message for the member.
pub fn parse(inv: &Invocation) -> Result<SlashCommand, String> {
    let unknown = || format!("unknown command `/{} {}`", inv.name, inv.sub);
    match inv.name.as_str() {
        "room" => Ok(SlashCommand::Room(match inv.sub.as_str() {
            "limit" => RoomCommand::Limit(inv.text("size")?),
            "allow" => RoomCommand::Allow(inv.member("member")?),
            "lock" => RoomCommand::Lock,
            "unlock" => RoomCommand::Unlock,
            "bots" => RoomCommand::Bots,
            "status" => RoomCommand::Status,
            _ => return Err(unknown()),
        })),
        "party" => Ok(SlashCommand::Party(match inv.sub.as_str() {
            "create" => PartyCommand::Create,
            "panel" => PartyCommand::Panel,
            "bump" => PartyCommand::Bump,
            "access" => PartyCommand::Access(inv.member("member")?),
            "transfer" => PartyCommand::Transfer(inv.member("member")?),
            "mode" => PartyCommand::Mode(inv.text("mode")?),
            "ranks" => PartyCommand::Ranks(inv.text("lowest")?, inv.text("highest")?),
            "roles" => PartyCommand::Roles(
                inv.text("roles")
                    .unwrap_or_default()
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            "description" => PartyCommand::Description,
            "color" => PartyCommand::Color(inv.text("color")?),
            "looking_for" => PartyCommand::LookingFor(inv.text("count")?),
            "privacy" => PartyCommand::Privacy,
            "close" => PartyCommand::Close,
            _ => return Err(unknown()),
        })),
        _ => Err(unknown()),
    }
}

// ── Registration ─────────────────────────────────────────────────────────────

fn sub(name: &str, description: &str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::SubCommand, name, description)
}

fn required(kind: CommandOptionType, name: &str, description: &str) -> CreateCommandOption {
    CreateCommandOption::new(kind, name, description).required(true)
}

/// Choices are capped at 25 by Discord.
fn choices(
    mut option: CreateCommandOption,
    items: impl IntoIterator<Item = (String, String)>,
) -> CreateCommandOption {
    for (label, value) in items.into_iter().take(25) {
        option = option.add_string_choice(label, value);
    }
    option
}

pub fn definitions(settings: &GroupsConfig) -> Vec<CreateCommand> {
    let ranks = || settings.ranks.iter().map(|r| (r.clone(), r.clone()));
    let room = CreateCommand::new("room")
        .description("Manage your personal voice room")
        .add_option(sub("limit", "Set how many people fit").add_sub_option(
            required(CommandOptionType::Integer, "size", "2 to 99")
                .min_int_value(2)
                .max_int_value(99),
        ))
        .add_option(sub("allow", "Toggle whether a member can join").add_sub_option(
            required(CommandOptionType::User, "member", "Member to toggle"),
        ))
        .add_option(sub("lock", "Only allowed members can join"))
        .add_option(sub("unlock", "Anyone can join"))
        .add_option(sub("bots", "Toggle whether bots can join"))
        .add_option(sub("status", "Show your room settings"));

    let party = CreateCommand::new("party")
        .description("Find people to play with")
        .add_option(sub("create", "Set up and publish a party"))
        .add_option(sub("panel", "Show your party settings"))
        .add_option(sub("bump", "Re-post your announcement"))
        .add_option(sub("access", "Toggle whether a member can join").add_sub_option(
            required(CommandOptionType::User, "member", "Member to toggle"),
        ))
        .add_option(sub("transfer", "Hand the party to someone inside").add_sub_option(
            required(CommandOptionType::User, "member", "New host"),
        ))
        .add_option(sub("mode", "Change the mode").add_sub_option(choices(
            required(CommandOptionType::String, "mode", "Mode"),
            settings.modes.iter().map(|m| (m.label.clone(), m.key.clone())),
        )))
        .add_option(
            sub("ranks", "Change the rank range")
                .add_sub_option(choices(
                    required(CommandOptionType::String, "lowest", "Lowest rank"),
                    ranks(),
                ))
                .add_sub_option(choices(
                    required(CommandOptionType::String, "highest", "Highest rank"),
                    ranks(),
                )),
        )
        .add_option(sub("roles", "Roles you are looking for").add_sub_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "roles",
                "Comma separated, empty to clear",
            ),
        ))
        .add_option(sub("description", "Change the description"))
        .add_option(sub("color", "Announcement color").add_sub_option(required(
            CommandOptionType::String,
            "color",
            "#RRGGBB",
        )))
        .add_option(sub("looking_for", "How many players you need").add_sub_option(
            required(CommandOptionType::String, "count", "A number, or auto"),
        ))
        .add_option(sub("privacy", "Switch between open and invite only"))
        .add_option(sub("close", "Close your party"));

    vec![room, party]
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn inv(name: &str, sub: &str, args: Vec<(&str, Arg)>) -> Invocation {
        Invocation {
            name: name.into(),
            sub: sub.into(),
            args: args.into_iter().map(|(n, a)| (n.to_string(), a)).collect(),
        }
    }

    #[test]
    fn integer_limits_arrive_as_text() {
        let cmd = parse(&inv("room", "limit", vec![("size", Arg::Int(6))])).unwrap();
        assert_eq!(cmd, SlashCommand::Room(RoomCommand::Limit("6".into())));
    }

    #[test]
    fn roles_are_split_and_trimmed() {
        let cmd = parse(&inv("party", "roles", vec![(
            "roles",
            Arg::Text(" Duelist, ,Flex ".into()),
        )]))
        .unwrap();
        assert_eq!(
            cmd,
            SlashCommand::Party(PartyCommand::Roles(vec!["Duelist".into(), "Flex".into()]))
        );
        let cleared = parse(&inv("party", "roles", vec![])).unwrap();
        assert_eq!(cleared, SlashCommand::Party(PartyCommand::Roles(Vec::new())));
    }

    #[rstest]
    #[case(inv("party", "transfer", vec![]), "missing `member`")]
    #[case(inv("party", "dance", vec![]), "unknown command `/party dance`")]
    #[case(inv("ticket", "open", vec![]), "unknown command `/ticket open`")]
    fn bad_invocations_explain_themselves(#[case] i: Invocation, #[case] msg: &str) {
        assert_eq!(parse(&i).unwrap_err(), msg);
    }

    #[test]
    fn definitions_cover_both_consoles() {
        assert_eq!(definitions(&GroupsConfig::default()).len(), 2);
    }
}
