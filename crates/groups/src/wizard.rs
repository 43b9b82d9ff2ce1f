//! Party setup wizard as an explicit state machine.
//!
//! [`GroupWizard::handle`] is pure: it validates the event against the
//! current stage, mutates the draft, and returns the side effects the
//! service must carry out. Rejected events leave the wizard untouched.

use std::{str::FromStr, sync::Arc};

use {
    partyline_common::{ActionError, ActionResult, CommunityId, MemberId, ResourceId},
    partyline_config::GroupsConfig,
    partyline_sessions::input,
    partyline_store::{Draft, GroupConfig},
};

pub const DESCRIPTION_MAX: usize = 200;
pub const DRAFT_NAME_MAX: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SelectRegion,
    SelectMode,
    SelectRankRange,
    SelectSize,
    DraftRestore,
    /// Hub without an in-game identity yet.
    Configuring,
    /// Hub with everything needed to publish.
    Ready,
    Publishing,
    Published(ResourceId),
    Closed,
}

impl Stage {
    pub fn is_hub(self) -> bool {
        matches!(self, Self::Configuring | Self::Ready)
    }
}

/// Nested prompts reachable from the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subflow {
    Identity,
    RequiredRoles,
    AccessList,
    Description,
    Color,
    LookingFor,
    Checkpoint,
}

impl Subflow {
    /// Free text entered here is run past the moderation classifier.
    pub fn is_screened(self) -> bool {
        matches!(self, Self::Identity | Self::Description)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSubflow {
    pub kind: Subflow,
    pub generation: u64,
    /// Checkpoint only: the slot picked in the first step.
    pub slot: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    /// Values picked from a select menu.
    Select(Vec<String>),
    /// Submitted free text.
    Text(String),
    Open(Subflow),
    TogglePrivacy,
    BrowseDrafts,
    DraftsLoaded(Vec<Draft>),
    Restore { slot: u8 },
    DeleteDraft { slot: u8 },
    Publish,
    Published(ResourceId),
    PublishFailed,
    Cancel,
    SubflowTimeout(u64),
}

/// Work the service performs after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Notice(String),
    LoadDrafts,
    DeleteDraft { slot: u8 },
    SaveDraft { slot: u8, name: String, config: GroupConfig },
    ArmSubflow { generation: u64 },
    DisarmSubflow,
    Publish(GroupConfig),
    Close,
}

#[derive(Debug, Clone)]
pub struct GroupWizard {
    community: CommunityId,
    owner: MemberId,
    privileged: bool,
    draft_quota: u8,
    settings: Arc<GroupsConfig>,
    stage: Stage,
    draft: GroupConfig,
    subflow: Option<ActiveSubflow>,
    generation: u64,
    drafts: Vec<Draft>,
}

fn stale() -> ActionError {
    ActionError::conflict("that step is not active any more")
}

impl GroupWizard {
    pub fn new(
        community: CommunityId,
        owner: MemberId,
        privileged: bool,
        draft_quota: u8,
        settings: Arc<GroupsConfig>,
    ) -> Self {
        Self {
            community,
            owner,
            privileged,
            draft_quota,
            settings,
            stage: Stage::SelectRegion,
            draft: GroupConfig::default(),
            subflow: None,
            generation: 0,
            drafts: Vec::new(),
        }
    }

    pub fn community(&self) -> CommunityId {
        self.community
    }

    pub fn owner(&self) -> MemberId {
        self.owner
    }

    pub fn privileged(&self) -> bool {
        self.privileged
    }

    pub fn draft_quota(&self) -> u8 {
        self.draft_quota
    }

    pub fn settings(&self) -> &GroupsConfig {
        &self.settings
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn draft(&self) -> &GroupConfig {
        &self.draft
    }

    pub fn subflow(&self) -> Option<ActiveSubflow> {
        self.subflow
    }

    /// Drafts listed by the last [`WizardEvent::DraftsLoaded`].
    pub fn drafts(&self) -> &[Draft] {
        &self.drafts
    }

    /// The open sub-flow, when text typed into it must be screened.
    pub fn screened_subflow(&self) -> Option<Subflow> {
        self.subflow.map(|s| s.kind).filter(|k| k.is_screened())
    }

    fn hub(&self) -> Stage {
        if self.draft.is_publishable() {
            Stage::Ready
        } else {
            Stage::Configuring
        }
    }

    /// Stage after the mode/rank picks, skipping steps the mode doesn't need.
    fn after_mode(&self, from: Stage) -> ActionResult<Stage> {
        let mode = self
            .draft
            .mode
            .as_deref()
            .and_then(|k| self.settings.mode(k))
            .ok_or_else(stale)?;
        if from == Stage::SelectMode && mode.ranked {
            return Ok(Stage::SelectRankRange);
        }
        if mode.is_variable() {
            return Ok(Stage::SelectSize);
        }
        Ok(self.hub())
    }

    pub fn handle(&mut self, event: WizardEvent) -> ActionResult<Vec<Effect>> {
        match event {
            WizardEvent::Cancel => {
                self.stage = Stage::Closed;
                self.subflow = None;
                Ok(vec![Effect::Close])
            },
            WizardEvent::SubflowTimeout(generation) => Ok(self.subflow_timeout(generation)),
            WizardEvent::Published(resource) => {
                if self.stage != Stage::Publishing {
                    return Err(stale());
                }
                self.stage = Stage::Published(resource);
                Ok(vec![Effect::Close])
            },
            WizardEvent::PublishFailed => {
                if self.stage == Stage::Publishing {
                    self.stage = self.hub();
                }
                Ok(Vec::new())
            },
            WizardEvent::BrowseDrafts => {
                if !self.can_browse() {
                    return Err(stale());
                }
                Ok(vec![Effect::LoadDrafts])
            },
            WizardEvent::DraftsLoaded(drafts) => {
                if !self.can_browse() {
                    return Err(stale());
                }
                self.drafts = drafts;
                self.stage = Stage::DraftRestore;
                if self.drafts.is_empty() {
                    return Ok(vec![Effect::Notice("you have no saved drafts".into())]);
                }
                Ok(Vec::new())
            },
            WizardEvent::Restore { slot } => self.restore(slot),
            WizardEvent::DeleteDraft { slot } => {
                if self.stage != Stage::DraftRestore {
                    return Err(stale());
                }
                Ok(vec![Effect::DeleteDraft { slot }, Effect::LoadDrafts])
            },
            WizardEvent::Select(values) => self.select(values),
            WizardEvent::Text(text) => self.text(&text),
            WizardEvent::Open(kind) => self.open(kind),
            WizardEvent::TogglePrivacy => {
                if !self.stage.is_hub() {
                    return Err(stale());
                }
                self.draft.private = !self.draft.private;
                Ok(Vec::new())
            },
            WizardEvent::Publish => self.publish(),
        }
    }

    fn can_browse(&self) -> bool {
        self.subflow.is_none()
            && matches!(
                self.stage,
                Stage::SelectRegion
                    | Stage::SelectMode
                    | Stage::DraftRestore
                    | Stage::Configuring
                    | Stage::Ready
            )
    }

    fn restore(&mut self, slot: u8) -> ActionResult<Vec<Effect>> {
        if self.stage != Stage::DraftRestore {
            return Err(stale());
        }
        let draft = self
            .drafts
            .iter()
            .find(|d| d.slot == slot)
            .ok_or(ActionError::NotFound("draft"))?;
        let mode_known = draft
            .config
            .mode
            .as_deref()
            .is_some_and(|m| self.settings.mode(m).is_some());
        if !mode_known {
            return Err(ActionError::validation(
                "that draft uses a mode that no longer exists",
            ));
        }
        self.draft = draft.config.clone();
        // Never carry another owner's members over in a restored access list.
        self.draft.access_list.retain(|m| *m != self.owner);
        self.stage = self.hub();
        Ok(vec![Effect::Notice(format!("restored draft \"{}\"", draft.name))])
    }

    fn select(&mut self, values: Vec<String>) -> ActionResult<Vec<Effect>> {
        match self.stage {
            Stage::SelectRegion => {
                let [key] = values.as_slice() else {
                    return Err(ActionError::validation("pick one region"));
                };
                let region = self
                    .settings
                    .region(key)
                    .ok_or_else(|| ActionError::validation("unknown region"))?;
                self.draft.region = Some(region.key.clone());
                self.stage = Stage::SelectMode;
                Ok(Vec::new())
            },
            Stage::SelectMode => {
                let [key] = values.as_slice() else {
                    return Err(ActionError::validation("pick one mode"));
                };
                let mode = self
                    .settings
                    .mode(key)
                    .ok_or_else(|| ActionError::validation("unknown mode"))?;
                self.draft.mode = Some(mode.key.clone());
                self.draft.size = mode.size.unwrap_or(0);
                if !mode.ranked {
                    self.draft.min_rank = None;
                    self.draft.max_rank = None;
                }
                self.stage = self.after_mode(Stage::SelectMode)?;
                Ok(Vec::new())
            },
            Stage::SelectRankRange => {
                let (min, max) = parse_rank_pair(&self.settings, &values)?;
                self.draft.set_rank_range(min, max);
                self.stage = self.after_mode(Stage::SelectRankRange)?;
                Ok(Vec::new())
            },
            Stage::SelectSize => {
                let [raw] = values.as_slice() else {
                    return Err(ActionError::validation("pick one size"));
                };
                self.set_size(raw)
            },
            s if s.is_hub() => self.subflow_select(values),
            _ => Err(stale()),
        }
    }

    fn set_size(&mut self, raw: &str) -> ActionResult<Vec<Effect>> {
        let mode = self
            .draft
            .mode
            .as_deref()
            .and_then(|k| self.settings.mode(k))
            .ok_or_else(stale)?;
        let (lo, hi) = mode.size_bounds();
        let size = input::parse_bounded(raw, lo.into(), hi.into(), "party size")?;
        self.draft.size = u8::try_from(size).map_err(|e| ActionError::Internal(e.into()))?;
        self.stage = self.hub();
        Ok(Vec::new())
    }

    fn text(&mut self, text: &str) -> ActionResult<Vec<Effect>> {
        if self.stage == Stage::SelectSize {
            return self.set_size(text);
        }
        if !self.stage.is_hub() {
            return Err(stale());
        }
        let active = self.subflow.ok_or_else(stale)?;
        match active.kind {
            Subflow::Identity => {
                self.draft.ign = Some(input::parse_identity(text)?);
            },
            Subflow::Description => {
                self.draft.description = Some(input::clean_text(text, DESCRIPTION_MAX)?);
            },
            Subflow::Color => {
                self.draft.color = Some(input::parse_color(text)?);
            },
            Subflow::LookingFor => {
                self.draft.looking_for = parse_looking_for(text, self.draft.size)?;
            },
            Subflow::Checkpoint => {
                let slot = active
                    .slot
                    .ok_or_else(|| ActionError::validation("pick a slot first"))?;
                let name = input::clean_text(text, DRAFT_NAME_MAX)?;
                self.finish_subflow();
                return Ok(vec![Effect::DisarmSubflow, Effect::SaveDraft {
                    slot,
                    name,
                    config: self.draft.clone(),
                }]);
            },
            Subflow::RequiredRoles | Subflow::AccessList => {
                return Err(ActionError::validation("pick from the menu"));
            },
        }
        self.finish_subflow();
        Ok(vec![Effect::DisarmSubflow])
    }

    fn subflow_select(&mut self, values: Vec<String>) -> ActionResult<Vec<Effect>> {
        let active = self.subflow.ok_or_else(stale)?;
        match active.kind {
            Subflow::RequiredRoles => {
                let mut roles = Vec::with_capacity(values.len());
                for v in &values {
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
                self.draft.required_roles = roles;
            },
            Subflow::AccessList => {
                let mut members = Vec::with_capacity(values.len());
                for v in &values {
                    let m = MemberId::from_str(v)
                        .map_err(|_| ActionError::validation(format!("unknown member {v}")))?;
                    if m != self.owner && !members.contains(&m) {
                        members.push(m);
                    }
                }
                let room = usize::from(self.draft.size.saturating_sub(1));
                if members.len() > room {
                    return Err(ActionError::validation(format!(
                        "at most {room} members fit next to you"
                    )));
                }
                self.draft.access_list = members;
            },
            Subflow::Checkpoint => {
                let [raw] = values.as_slice() else {
                    return Err(ActionError::validation("pick one slot"));
                };
                let slot = raw
                    .trim()
                    .parse::<u8>()
                    .ok()
                    .filter(|s| *s < self.draft_quota)
                    .ok_or_else(|| {
                        ActionError::validation(format!(
                            "you have {} draft slot(s)",
                            self.draft_quota
                        ))
                    })?;
                self.subflow = Some(ActiveSubflow {
                    slot: Some(slot),
                    ..active
                });
                return Ok(Vec::new());
            },
            Subflow::Identity | Subflow::Description | Subflow::Color | Subflow::LookingFor => {
                return Err(ActionError::validation("type your answer instead"));
            },
        }
        self.finish_subflow();
        Ok(vec![Effect::DisarmSubflow])
    }

    fn open(&mut self, kind: Subflow) -> ActionResult<Vec<Effect>> {
        if !self.stage.is_hub() {
            return Err(stale());
        }
        if kind == Subflow::Color && !self.privileged {
            return Err(ActionError::Forbidden(
                "custom colors are a perk of the elevated tier".into(),
            ));
        }
        if kind == Subflow::Checkpoint && self.draft_quota == 0 {
            return Err(ActionError::Forbidden("you have no draft slots".into()));
        }
        self.generation += 1;
        self.subflow = Some(ActiveSubflow {
            kind,
            generation: self.generation,
            slot: None,
        });
        Ok(vec![Effect::ArmSubflow {
            generation: self.generation,
        }])
    }

    fn finish_subflow(&mut self) {
        self.subflow = None;
        self.stage = self.hub();
    }

    fn subflow_timeout(&mut self, generation: u64) -> Vec<Effect> {
        match self.subflow {
            Some(active) if active.generation == generation => {
                self.finish_subflow();
                vec![Effect::Notice(ActionError::Timeout.to_string())]
            },
            _ => Vec::new(),
        }
    }

    fn publish(&mut self) -> ActionResult<Vec<Effect>> {
        if !self.stage.is_hub() {
            return Err(stale());
        }
        if !self.draft.is_publishable() {
            return Err(ActionError::validation("set your in-game name first"));
        }
        let mut effects = Vec::new();
        if self.subflow.take().is_some() {
            effects.push(Effect::DisarmSubflow);
        }
        self.stage = Stage::Publishing;
        effects.push(Effect::Publish(self.draft.clone()));
        Ok(effects)
    }
}

/// Two rank names, returned as (low, high) indices.
pub fn parse_rank_pair(settings: &GroupsConfig, values: &[String]) -> ActionResult<(u8, u8)> {
    let [a, b] = values else {
        return Err(ActionError::validation("pick exactly two ranks"));
    };
    let index = |name: &str| {
        settings
            .rank_index(name)
            .and_then(|i| u8::try_from(i).ok())
            .ok_or_else(|| ActionError::validation(format!("unknown rank {name}")))
    };
    let (a, b) = (index(a)?, index(b)?);
    Ok((a.min(b), a.max(b)))
}

/// `auto` (or blank) clears the override; otherwise 1..size-1.
pub fn parse_looking_for(text: &str, size: u8) -> ActionResult<Option<u8>> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }
    let max = size.saturating_sub(1).max(1);
    let n = input::parse_bounded(trimmed, 1, max.into(), "looking-for count")?;
    Ok(Some(u8::try_from(n).map_err(|e| ActionError::Internal(e.into()))?))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    const C: CommunityId = CommunityId(1);
    const OWNER: MemberId = MemberId(42);

    fn wizard(privileged: bool) -> GroupWizard {
        GroupWizard::new(C, OWNER, privileged, 2, Arc::new(GroupsConfig::default()))
    }

    fn sel(values: &[&str]) -> WizardEvent {
        WizardEvent::Select(values.iter().map(|v| v.to_string()).collect())
    }

    fn text(t: &str) -> WizardEvent {
        WizardEvent::Text(t.into())
    }

    /// Region eu, competitive, Gold..Diamond.
    fn at_hub() -> GroupWizard {
        let mut w = wizard(false);
        w.handle(sel(&["eu"])).unwrap();
        w.handle(sel(&["competitive"])).unwrap();
        w.handle(sel(&["Diamond", "Gold"])).unwrap();
        assert_eq!(w.stage(), Stage::Configuring);
        w
    }

    #[test]
    fn ranked_mode_asks_for_ranks_in_either_order() {
        let w = at_hub();
        assert_eq!(w.draft().min_rank, Some(3));
        assert_eq!(w.draft().max_rank, Some(5));
        assert_eq!(w.draft().size, 5);
    }

    #[test]
    fn rank_range_needs_exactly_two() {
        let mut w = wizard(false);
        w.handle(sel(&["eu"])).unwrap();
        w.handle(sel(&["duo"])).unwrap();
        assert_eq!(w.stage(), Stage::SelectRankRange);
        assert!(w.handle(sel(&["Gold"])).unwrap_err().keeps_subflow_open());
        assert!(w.handle(sel(&["Gold", "Mythic"])).is_err());
        assert_eq!(w.stage(), Stage::SelectRankRange);
    }

    #[test]
    fn unranked_fixed_mode_goes_straight_to_hub() {
        let mut w = wizard(false);
        w.handle(sel(&["na"])).unwrap();
        w.handle(sel(&["unrated"])).unwrap();
        assert_eq!(w.stage(), Stage::Configuring);
        assert_eq!(w.draft().min_rank, None);
    }

    #[rstest]
    #[case("1", false)]
    #[case("2", true)]
    #[case("10", true)]
    #[case("11", false)]
    fn variable_mode_asks_for_size(#[case] raw: &str, #[case] ok: bool) {
        let mut w = wizard(false);
        w.handle(sel(&["na"])).unwrap();
        w.handle(sel(&["custom"])).unwrap();
        assert_eq!(w.stage(), Stage::SelectSize);
        assert_eq!(w.handle(text(raw)).is_ok(), ok);
        let want = if ok { Stage::Configuring } else { Stage::SelectSize };
        assert_eq!(w.stage(), want);
    }

    #[test]
    fn unknown_region_is_rejected() {
        let mut w = wizard(false);
        assert!(w.handle(sel(&["moon"])).is_err());
        assert_eq!(w.stage(), Stage::SelectRegion);
    }

    #[test]
    fn identity_moves_hub_to_ready() {
        let mut w = at_hub();
        let fx = w.handle(WizardEvent::Open(Subflow::Identity)).unwrap();
        assert_eq!(fx, vec![Effect::ArmSubflow { generation: 1 }]);
        assert_eq!(w.screened_subflow(), Some(Subflow::Identity));

        let err = w.handle(text("nope")).unwrap_err();
        assert!(err.keeps_subflow_open());
        assert!(w.subflow().is_some());

        assert_eq!(w.handle(text("Ace#EUW")).unwrap(), vec![Effect::DisarmSubflow]);
        assert_eq!(w.stage(), Stage::Ready);
        assert!(w.subflow().is_none());
    }

    #[test]
    fn stale_subflow_timeout_is_ignored() {
        let mut w = at_hub();
        w.handle(WizardEvent::Open(Subflow::Description)).unwrap();
        w.handle(WizardEvent::Open(Subflow::LookingFor)).unwrap();

        assert!(w.handle(WizardEvent::SubflowTimeout(1)).unwrap().is_empty());
        assert_eq!(w.subflow().map(|s| s.kind), Some(Subflow::LookingFor));

        let fx = w.handle(WizardEvent::SubflowTimeout(2)).unwrap();
        assert_eq!(fx, vec![Effect::Notice("timed out".into())]);
        assert!(w.subflow().is_none());
        assert!(w.stage().is_hub());
    }

    #[test]
    fn color_is_privileged_only() {
        let mut w = at_hub();
        let err = w.handle(WizardEvent::Open(Subflow::Color)).unwrap_err();
        assert!(matches!(err, ActionError::Forbidden(_)));

        let mut w = wizard(true);
        w.handle(sel(&["eu"])).unwrap();
        w.handle(sel(&["unrated"])).unwrap();
        w.handle(WizardEvent::Open(Subflow::Color)).unwrap();
        w.handle(text("#ff8800")).unwrap();
        assert_eq!(w.draft().color, Some(0xFF8800));
    }

    #[test]
    fn access_list_excludes_owner_and_respects_size() {
        let mut w = at_hub();
        w.handle(WizardEvent::Open(Subflow::AccessList)).unwrap();
        w.handle(sel(&["42", "7"])).unwrap();
        assert_eq!(w.draft().access_list, vec![MemberId(7)]);
        assert_eq!(w.draft().looking_for_count(), 4);

        w.handle(WizardEvent::Open(Subflow::AccessList)).unwrap();
        let err = w.handle(sel(&["1", "2", "3", "4", "5"])).unwrap_err();
        assert!(err.keeps_subflow_open());
        assert_eq!(w.draft().access_list, vec![MemberId(7)]);
    }

    #[test]
    fn required_roles_are_canonicalized() {
        let mut w = at_hub();
        w.handle(WizardEvent::Open(Subflow::RequiredRoles)).unwrap();
        w.handle(sel(&["duelist", "Flex", "DUELIST"])).unwrap();
        assert_eq!(w.draft().required_roles, vec!["Duelist", "Flex"]);
    }

    #[rstest]
    #[case("auto", Ok(None))]
    #[case("", Ok(None))]
    #[case("2", Ok(Some(2)))]
    #[case("4", Ok(Some(4)))]
    #[case("5", Err(()))]
    #[case("0", Err(()))]
    fn looking_for_bounds(#[case] raw: &str, #[case] want: Result<Option<u8>, ()>) {
        assert_eq!(parse_looking_for(raw, 5).map_err(|_| ()), want);
    }

    #[test]
    fn checkpoint_takes_slot_then_name() {
        let mut w = at_hub();
        w.handle(WizardEvent::Open(Subflow::Checkpoint)).unwrap();
        assert!(w.handle(text("evening")).is_err());
        assert!(w.handle(sel(&["2"])).is_err());
        assert!(w.handle(sel(&["1"])).unwrap().is_empty());

        let fx = w.handle(text("evening")).unwrap();
        let Effect::SaveDraft { slot, name, config } = &fx[1] else {
            panic!("expected save, got {fx:?}");
        };
        assert_eq!((*slot, name.as_str()), (1, "evening"));
        assert_eq!(config.mode.as_deref(), Some("competitive"));
    }

    #[test]
    fn restore_jumps_to_hub() {
        let mut w = wizard(false);
        assert_eq!(w.handle(WizardEvent::BrowseDrafts).unwrap(), vec![Effect::LoadDrafts]);
        let saved = GroupConfig {
            ign: Some("Ace#EUW".into()),
            region: Some("eu".into()),
            mode: Some("unrated".into()),
            size: 5,
            access_list: vec![OWNER, MemberId(7)],
            ..Default::default()
        };
        w.handle(WizardEvent::DraftsLoaded(vec![Draft {
            community: C,
            owner: OWNER,
            slot: 0,
            name: "usual".into(),
            config: saved,
            updated_at: 0,
        }]))
        .unwrap();
        assert_eq!(w.stage(), Stage::DraftRestore);
        assert!(w.handle(WizardEvent::Restore { slot: 3 }).is_err());

        w.handle(WizardEvent::Restore { slot: 0 }).unwrap();
        assert_eq!(w.stage(), Stage::Ready);
        assert_eq!(w.draft().access_list, vec![MemberId(7)]);
    }

    #[test]
    fn publish_requires_identity_and_closes_open_subflow() {
        let mut w = at_hub();
        assert!(w.handle(WizardEvent::Publish).unwrap_err().keeps_subflow_open());

        w.handle(WizardEvent::Open(Subflow::Identity)).unwrap();
        w.handle(text("Ace#EUW")).unwrap();
        w.handle(WizardEvent::Open(Subflow::Description)).unwrap();
        let fx = w.handle(WizardEvent::Publish).unwrap();
        assert_eq!(fx[0], Effect::DisarmSubflow);
        assert!(matches!(fx[1], Effect::Publish(_)));
        assert_eq!(w.stage(), Stage::Publishing);

        w.handle(WizardEvent::PublishFailed).unwrap();
        assert_eq!(w.stage(), Stage::Ready);
        w.handle(WizardEvent::Publish).unwrap();
        let fx = w.handle(WizardEvent::Published(ResourceId(5))).unwrap();
        assert_eq!(fx, vec![Effect::Close]);
        assert_eq!(w.stage(), Stage::Published(ResourceId(5)));
    }

    #[test]
    fn privacy_toggles_only_in_hub() {
        let mut w = wizard(false);
        assert!(w.handle(WizardEvent::TogglePrivacy).is_err());
        let mut w = at_hub();
        w.handle(WizardEvent::TogglePrivacy).unwrap();
        assert!(w.draft().private);
    }

    #[test]
    fn cancel_closes() {
        let mut w = at_hub();
        assert_eq!(w.handle(WizardEvent::Cancel).unwrap(), vec![Effect::Close]);
        assert_eq!(w.stage(), Stage::Closed);
    }
}
