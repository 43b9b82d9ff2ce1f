//! Custom ids carried by buttons, menus and modals.
//!
//! Ids are short `area:action[:arg]` strings. Anything that doesn't parse
//! belongs to another bot or an older build and is ignored.

use partyline_groups::Subflow;

/// Wizard controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardAction {
    /// String select for the current stage or select-style sub-flow.
    Pick,
    /// User select for the access list.
    Members,
    Open(Subflow),
    /// Modal submit for the open text sub-flow.
    Text,
    /// Button that opens the draft-name modal.
    Name,
    Privacy,
    Drafts,
    Restore,
    Delete,
    Publish,
    Cancel,
}

/// Modals raised by the party console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleAction {
    Size,
    Transfer,
    Description,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Wizard(WizardAction),
    Console(ConsoleAction),
}

fn subflow_name(kind: Subflow) -> &'static str {
    match kind {
        Subflow::Identity => "identity",
        Subflow::RequiredRoles => "roles",
        Subflow::AccessList => "access",
        Subflow::Description => "description",
        Subflow::Color => "color",
        Subflow::LookingFor => "looking_for",
        Subflow::Checkpoint => "checkpoint",
    }
}

fn parse_subflow(name: &str) -> Option<Subflow> {
    Some(match name {
        "identity" => Subflow::Identity,
        "roles" => Subflow::RequiredRoles,
        "access" => Subflow::AccessList,
        "description" => Subflow::Description,
        "color" => Subflow::Color,
        "looking_for" => Subflow::LookingFor,
        "checkpoint" => Subflow::Checkpoint,
        _ => return None,
    })
}

impl Action {
    pub fn id(self) -> String {
        match self {
            Self::Wizard(w) => match w {
                WizardAction::Pick => "wiz:pick".into(),
                WizardAction::Members => "wiz:members".into(),
                WizardAction::Open(kind) => format!("wiz:open:{}", subflow_name(kind)),
                WizardAction::Text => "wiz:text".into(),
                WizardAction::Name => "wiz:name".into(),
                WizardAction::Privacy => "wiz:privacy".into(),
                WizardAction::Drafts => "wiz:drafts".into(),
                WizardAction::Restore => "wiz:restore".into(),
                WizardAction::Delete => "wiz:delete".into(),
                WizardAction::Publish => "wiz:publish".into(),
                WizardAction::Cancel => "wiz:cancel".into(),
            },
            Self::Console(c) => match c {
                ConsoleAction::Size => "party:size".into(),
                ConsoleAction::Transfer => "party:transfer".into(),
                ConsoleAction::Description => "party:description".into(),
            },
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        let mut parts = id.splitn(3, ':');
        let area = parts.next()?;
        let action = parts.next()?;
        let arg = parts.next();
        match (area, action, arg) {
            ("wiz", "open", Some(kind)) => {
                Some(Self::Wizard(WizardAction::Open(parse_subflow(kind)?)))
            },
            ("wiz", action, None) => Some(Self::Wizard(match action {
                "pick" => WizardAction::Pick,
                "members" => WizardAction::Members,
                "text" => WizardAction::Text,
                "name" => WizardAction::Name,
                "privacy" => WizardAction::Privacy,
                "drafts" => WizardAction::Drafts,
                "restore" => WizardAction::Restore,
                "delete" => WizardAction::Delete,
                "publish" => WizardAction::Publish,
                "cancel" => WizardAction::Cancel,
                _ => return None,
            })),
            ("party", action, None) => Some(Self::Console(match action {
                "size" => ConsoleAction::Size,
                "transfer" => ConsoleAction::Transfer,
                "description" => ConsoleAction::Description,
                _ => return None,
            })),
            _ => None,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn subflow_buttons_carry_their_kind() {
        let id = Action::Wizard(WizardAction::Open(Subflow::LookingFor)).id();
        assert_eq!(id, "wiz:open:looking_for");
        assert_eq!(
            Action::parse("wiz:open:roles"),
            Some(Action::Wizard(WizardAction::Open(Subflow::RequiredRoles)))
        );
        assert_eq!(
            Action::parse("party:transfer"),
            Some(Action::Console(ConsoleAction::Transfer))
        );
    }

    #[rstest]
    #[case("")]
    #[case("wiz")]
    #[case("wiz:open")]
    #[case("wiz:open:dance")]
    #[case("wiz:pick:extra")]
    #[case("ticket:close")]
    fn foreign_ids_are_ignored(#[case] id: &str) {
        assert_eq!(Action::parse(id), None);
    }
}
