//! In-memory platform for tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use {
    anyhow::{Result, anyhow, bail},
    async_trait::async_trait,
    partyline_common::{ArtifactId, CommunityId, MemberId, ResourceId, ThreadId},
};

use crate::plugin::{
    Announcement, AnnouncementSurface, MemberDirectory, ModerationClassifier, OpsLog, Overwrite,
    OverwriteTarget, Platform, ThreadSurface, VoiceChannelSpec, VoicePlatform,
};

#[derive(Debug, Clone, Default)]
pub struct MockChannel {
    pub name: String,
    pub category: Option<ResourceId>,
    pub user_limit: u8,
    pub overwrites: Vec<Overwrite>,
}

#[derive(Debug, Default)]
struct State {
    channels: HashMap<ResourceId, MockChannel>,
    locations: HashMap<MemberId, ResourceId>,
    announcements: HashMap<ArtifactId, (ResourceId, Announcement)>,
    threads: HashMap<ThreadId, (ResourceId, String)>,
    ops_log: Vec<String>,
    names: HashMap<MemberId, String>,
    privileged: HashSet<MemberId>,
    flagged_words: Vec<String>,
    fail_create: bool,
    fail_delete: bool,
    fail_move: bool,
    fail_overwrite: HashSet<OverwriteTarget>,
    deleted_channels: Vec<ResourceId>,
}

/// Fake chat platform. Ids come from one shared counter starting at 1000.
#[derive(Debug)]
pub struct MockPlatform {
    state: Mutex<State>,
    next_id: AtomicU64,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            next_id: AtomicU64::new(1000),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Bundle this mock as every collaborator.
    pub fn platform(self: &Arc<Self>) -> Platform {
        Platform {
            voice: self.clone(),
            announcements: self.clone(),
            threads: self.clone(),
            ops_log: self.clone(),
            classifier: self.clone(),
            directory: self.clone(),
        }
    }

    pub fn add_channel(&self, name: &str, user_limit: u8) -> ResourceId {
        let id = ResourceId(self.id());
        self.state().channels.insert(id, MockChannel {
            name: name.into(),
            user_limit,
            ..Default::default()
        });
        id
    }

    pub fn channel(&self, id: ResourceId) -> Option<MockChannel> {
        self.state().channels.get(&id).cloned()
    }

    pub fn channel_count(&self) -> usize {
        self.state().channels.len()
    }

    pub fn deleted_channels(&self) -> Vec<ResourceId> {
        self.state().deleted_channels.clone()
    }

    /// Put a member into a resource (a presence "enter").
    pub fn place(&self, member: MemberId, resource: ResourceId) {
        self.state().locations.insert(member, resource);
    }

    /// Disconnect a member (a presence "leave").
    pub fn disconnect(&self, member: MemberId) {
        self.state().locations.remove(&member);
    }

    pub fn location(&self, member: MemberId) -> Option<ResourceId> {
        self.state().locations.get(&member).copied()
    }

    pub fn announcement(&self, id: ArtifactId) -> Option<Announcement> {
        self.state().announcements.get(&id).map(|(_, a)| a.clone())
    }

    pub fn announcement_count(&self) -> usize {
        self.state().announcements.len()
    }

    /// Simulate a moderator deleting the message out from under us.
    pub fn drop_announcement(&self, id: ArtifactId) {
        self.state().announcements.remove(&id);
    }

    pub fn add_thread(&self, channel: ResourceId, name: &str) -> ThreadId {
        let id = ThreadId(self.id());
        self.state().threads.insert(id, (channel, name.into()));
        id
    }

    pub fn thread_exists(&self, id: ThreadId) -> bool {
        self.state().threads.contains_key(&id)
    }

    pub fn ops_log(&self) -> Vec<String> {
        self.state().ops_log.clone()
    }

    pub fn set_name(&self, member: MemberId, name: &str) {
        self.state().names.insert(member, name.into());
    }

    pub fn set_privileged(&self, member: MemberId, privileged: bool) {
        let mut st = self.state();
        if privileged {
            st.privileged.insert(member);
        } else {
            st.privileged.remove(&member);
        }
    }

    /// Text containing `word` is classified as toxic.
    pub fn flag_word(&self, word: &str) {
        self.state().flagged_words.push(word.to_lowercase());
    }

    pub fn fail_create(&self, fail: bool) {
        self.state().fail_create = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.state().fail_delete = fail;
    }

    pub fn fail_move(&self, fail: bool) {
        self.state().fail_move = fail;
    }

    /// Make every overwrite write for `target` fail.
    pub fn fail_overwrite(&self, target: OverwriteTarget) {
        self.state().fail_overwrite.insert(target);
    }
}

#[async_trait]
impl VoicePlatform for MockPlatform {
    async fn create_voice_channel(
        &self,
        _community: CommunityId,
        spec: &VoiceChannelSpec,
    ) -> Result<ResourceId> {
        if self.state().fail_create {
            bail!("create refused");
        }
        let id = ResourceId(self.id());
        self.state().channels.insert(id, MockChannel {
            name: spec.name.clone(),
            category: spec.category,
            user_limit: spec.user_limit,
            overwrites: spec.overwrites.clone(),
        });
        Ok(id)
    }

    async fn delete_channel(&self, resource: ResourceId) -> Result<()> {
        let mut st = self.state();
        if st.fail_delete {
            bail!("delete refused");
        }
        st.channels
            .remove(&resource)
            .ok_or_else(|| anyhow!("unknown channel {resource}"))?;
        st.locations.retain(|_, r| *r != resource);
        st.deleted_channels.push(resource);
        Ok(())
    }

    async fn channel_exists(&self, resource: ResourceId) -> Result<bool> {
        Ok(self.state().channels.contains_key(&resource))
    }

    async fn move_member(
        &self,
        _community: CommunityId,
        member: MemberId,
        to: ResourceId,
    ) -> Result<()> {
        let mut st = self.state();
        if st.fail_move {
            bail!("move refused");
        }
        if !st.channels.contains_key(&to) {
            bail!("unknown channel {to}");
        }
        if !st.locations.contains_key(&member) {
            bail!("member {member} is not connected");
        }
        st.locations.insert(member, to);
        Ok(())
    }

    async fn occupants(
        &self,
        _community: CommunityId,
        resource: ResourceId,
    ) -> Result<Vec<MemberId>> {
        let mut out: Vec<MemberId> = self
            .state()
            .locations
            .iter()
            .filter(|(_, r)| **r == resource)
            .map(|(m, _)| *m)
            .collect();
        out.sort();
        Ok(out)
    }

    async fn member_location(
        &self,
        _community: CommunityId,
        member: MemberId,
    ) -> Result<Option<ResourceId>> {
        Ok(self.location(member))
    }

    async fn overwrites(
        &self,
        _community: CommunityId,
        resource: ResourceId,
    ) -> Result<Vec<Overwrite>> {
        self.channel(resource)
            .map(|c| c.overwrites)
            .ok_or_else(|| anyhow!("unknown channel {resource}"))
    }

    async fn set_overwrite(
        &self,
        _community: CommunityId,
        resource: ResourceId,
        overwrite: Overwrite,
    ) -> Result<()> {
        let mut st = self.state();
        if st.fail_overwrite.contains(&overwrite.target) {
            return Err(anyhow!("permission write for {:?} rejected", overwrite.target));
        }
        let ch = st
            .channels
            .get_mut(&resource)
            .ok_or_else(|| anyhow!("unknown channel {resource}"))?;
        ch.overwrites.retain(|o| o.target != overwrite.target);
        ch.overwrites.push(overwrite);
        Ok(())
    }

    async fn clear_overwrite(
        &self,
        _community: CommunityId,
        resource: ResourceId,
        target: OverwriteTarget,
    ) -> Result<()> {
        let mut st = self.state();
        let ch = st
            .channels
            .get_mut(&resource)
            .ok_or_else(|| anyhow!("unknown channel {resource}"))?;
        ch.overwrites.retain(|o| o.target != target);
        Ok(())
    }

    async fn user_limit(&self, resource: ResourceId) -> Result<u8> {
        self.channel(resource)
            .map(|c| c.user_limit)
            .ok_or_else(|| anyhow!("unknown channel {resource}"))
    }

    async fn set_user_limit(&self, resource: ResourceId, limit: u8) -> Result<()> {
        let mut st = self.state();
        let ch = st
            .channels
            .get_mut(&resource)
            .ok_or_else(|| anyhow!("unknown channel {resource}"))?;
        ch.user_limit = limit;
        Ok(())
    }
}

#[async_trait]
impl AnnouncementSurface for MockPlatform {
    async fn publish(
        &self,
        channel: ResourceId,
        announcement: &Announcement,
    ) -> Result<ArtifactId> {
        let id = ArtifactId(self.id());
        self.state()
            .announcements
            .insert(id, (channel, announcement.clone()));
        Ok(id)
    }

    async fn edit(
        &self,
        _channel: ResourceId,
        artifact: ArtifactId,
        announcement: &Announcement,
    ) -> Result<()> {
        let mut st = self.state();
        let slot = st
            .announcements
            .get_mut(&artifact)
            .ok_or_else(|| anyhow!("unknown message {artifact}"))?;
        slot.1 = announcement.clone();
        Ok(())
    }

    async fn delete(&self, _channel: ResourceId, artifact: ArtifactId) -> Result<()> {
        self.state()
            .announcements
            .remove(&artifact)
            .map(|_| ())
            .ok_or_else(|| anyhow!("unknown message {artifact}"))
    }
}

#[async_trait]
impl ThreadSurface for MockPlatform {
    async fn find_thread(&self, channel: ResourceId, name: &str) -> Result<Option<ThreadId>> {
        Ok(self
            .state()
            .threads
            .iter()
            .find(|(_, (c, n))| *c == channel && n == name)
            .map(|(id, _)| *id))
    }

    async fn delete_thread(&self, thread: ThreadId) -> Result<()> {
        self.state()
            .threads
            .remove(&thread)
            .map(|_| ())
            .ok_or_else(|| anyhow!("unknown thread {thread}"))
    }
}

#[async_trait]
impl OpsLog for MockPlatform {
    async fn post(&self, _channel: ResourceId, text: &str) -> Result<()> {
        self.state().ops_log.push(text.into());
        Ok(())
    }
}

#[async_trait]
impl ModerationClassifier for MockPlatform {
    async fn classify(&self, text: &str) -> Result<Vec<String>> {
        let lower = text.to_lowercase();
        let toxic = self
            .state()
            .flagged_words
            .iter()
            .any(|w| lower.contains(w.as_str()));
        Ok(vec![if toxic { "toxic" } else { crate::CLEAN_LABEL }.to_string()])
    }
}

#[async_trait]
impl MemberDirectory for MockPlatform {
    async fn display_name(&self, _community: CommunityId, member: MemberId) -> Result<String> {
        Ok(self
            .state()
            .names
            .get(&member)
            .cloned()
            .unwrap_or_else(|| format!("member{member}")))
    }

    async fn is_privileged(&self, _community: CommunityId, member: MemberId) -> Result<bool> {
        Ok(self.state().privileged.contains(&member))
    }
}
