//! Platform traits over serenity's HTTP client and gateway cache.
//!
//! Presence reads (occupants, member location) come from the cache, which
//! serenity updates before dispatching the voice-state event. Everything
//! else goes over HTTP.

use std::sync::Arc;

use {
    anyhow::{Result, anyhow},
    async_trait::async_trait,
    partyline_channels::{
        AcceptAll, Announcement, AnnouncementSurface, MemberDirectory, OpsLog, Overwrite,
        OverwriteTarget, Platform, ThreadSurface, VoiceChannelSpec, VoicePlatform,
    },
    partyline_common::{ArtifactId, CommunityId, MemberId, ResourceId, RoleId, ThreadId},
    partyline_config::TierConfig,
    serenity::all::{
        Cache, ChannelType, CreateChannel, CreateEmbed, CreateEmbedFooter, CreateMessage,
        EditChannel, EditMember, EditMessage, GuildChannel, Http,
    },
    tracing::debug,
};

use crate::convert;

pub struct DiscordPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
    privileged_roles: Vec<RoleId>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>, tiers: &TierConfig) -> Arc<Self> {
        Arc::new(Self {
            http,
            cache,
            privileged_roles: tiers.privileged_roles.clone(),
        })
    }

    /// Bundle every seam. No external classifier is wired, so all text
    /// passes moderation.
    pub fn platform(self: &Arc<Self>) -> Platform {
        Platform {
            voice: Arc::clone(self) as Arc<dyn VoicePlatform>,
            announcements: Arc::clone(self) as Arc<dyn AnnouncementSurface>,
            threads: Arc::clone(self) as Arc<dyn ThreadSurface>,
            ops_log: Arc::clone(self) as Arc<dyn OpsLog>,
            classifier: Arc::new(AcceptAll),
            directory: Arc::clone(self) as Arc<dyn MemberDirectory>,
        }
    }

    async fn guild_channel(&self, resource: ResourceId) -> Result<GuildChannel> {
        self.http
            .get_channel(convert::channel(resource)?)
            .await?
            .guild()
            .ok_or_else(|| anyhow!("{resource} is not a guild channel"))
    }
}

pub fn embed(announcement: &Announcement) -> CreateEmbed {
    let mut embed = CreateEmbed::new().title(&announcement.title);
    if !announcement.body.is_empty() {
        embed = embed.description(&announcement.body);
    }
    for (name, value) in &announcement.fields {
        embed = embed.field(name, value, true);
    }
    if let Some(join) = announcement.join {
        embed = embed.field("Join", join.mention(), false);
    }
    if let Some(color) = announcement.color {
        embed = embed.color(color);
    }
    if let Some(footer) = &announcement.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }
    embed
}

// ── Voice ────────────────────────────────────────────────────────────────────

#[async_trait]
impl VoicePlatform for DiscordPlatform {
    async fn create_voice_channel(
        &self,
        community: CommunityId,
        spec: &VoiceChannelSpec,
    ) -> Result<ResourceId> {
        let permissions = spec
            .overwrites
            .iter()
            .map(|o| convert::to_discord(community, *o))
            .collect::<Result<Vec<_>>>()?;
        let mut builder = CreateChannel::new(&spec.name)
            .kind(ChannelType::Voice)
            .permissions(permissions);
        if let Some(category) = spec.category {
            builder = builder.category(convert::channel(category)?);
        }
        if spec.user_limit > 0 {
            builder = builder.user_limit(u32::from(spec.user_limit));
        }
        let created = convert::guild(community)?
            .create_channel(&self.http, builder)
            .await?;
        debug!(channel = %created.id, name = %spec.name, "voice channel created");
        Ok(ResourceId(created.id.get()))
    }

    async fn delete_channel(&self, resource: ResourceId) -> Result<()> {
        convert::channel(resource)?.delete(&self.http).await?;
        Ok(())
    }

    async fn channel_exists(&self, resource: ResourceId) -> Result<bool> {
        match self.http.get_channel(convert::channel(resource)?).await {
            Ok(_) => Ok(true),
            Err(serenity::Error::Http(e)) if e.status_code().map(|s| s.as_u16()) == Some(404) => {
                Ok(false)
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn move_member(
        &self,
        community: CommunityId,
        member: MemberId,
        to: ResourceId,
    ) -> Result<()> {
        convert::guild(community)?
            .edit_member(
                &self.http,
                convert::user(member)?,
                EditMember::new().voice_channel(convert::channel(to)?),
            )
            .await?;
        Ok(())
    }

    async fn occupants(
        &self,
        community: CommunityId,
        resource: ResourceId,
    ) -> Result<Vec<MemberId>> {
        let channel = convert::channel(resource)?;
        let guild = self
            .cache
            .guild(convert::guild(community)?)
            .ok_or_else(|| anyhow!("guild {community} is not cached"))?;
        Ok(guild
            .voice_states
            .values()
            .filter(|v| v.channel_id == Some(channel))
            .map(|v| MemberId(v.user_id.get()))
            .collect())
    }

    async fn member_location(
        &self,
        community: CommunityId,
        member: MemberId,
    ) -> Result<Option<ResourceId>> {
        let user = convert::user(member)?;
        let guild = self
            .cache
            .guild(convert::guild(community)?)
            .ok_or_else(|| anyhow!("guild {community} is not cached"))?;
        Ok(guild
            .voice_states
            .get(&user)
            .and_then(|v| v.channel_id)
            .map(|c| ResourceId(c.get())))
    }

    async fn overwrites(
        &self,
        community: CommunityId,
        resource: ResourceId,
    ) -> Result<Vec<Overwrite>> {
        let channel = self.guild_channel(resource).await?;
        Ok(channel
            .permission_overwrites
            .iter()
            .filter_map(|o| convert::from_discord(community, o))
            .collect())
    }

    async fn set_overwrite(
        &self,
        community: CommunityId,
        resource: ResourceId,
        overwrite: Overwrite,
    ) -> Result<()> {
        convert::channel(resource)?
            .create_permission(&self.http, convert::to_discord(community, overwrite)?)
            .await?;
        Ok(())
    }

    async fn clear_overwrite(
        &self,
        community: CommunityId,
        resource: ResourceId,
        target: OverwriteTarget,
    ) -> Result<()> {
        convert::channel(resource)?
            .delete_permission(&self.http, convert::overwrite_kind(community, target)?)
            .await?;
        Ok(())
    }

    async fn user_limit(&self, resource: ResourceId) -> Result<u8> {
        let channel = self.guild_channel(resource).await?;
        Ok(channel
            .user_limit
            .map_or(0, |l| u8::try_from(l).unwrap_or(u8::MAX)))
    }

    async fn set_user_limit(&self, resource: ResourceId, limit: u8) -> Result<()> {
        convert::channel(resource)?
            .edit(&self.http, EditChannel::new().user_limit(u32::from(limit)))
            .await?;
        Ok(())
    }
}

// ── Announcements ────────────────────────────────────────────────────────────

#[async_trait]
impl AnnouncementSurface for DiscordPlatform {
    async fn publish(
        &self,
        channel: ResourceId,
        announcement: &Announcement,
    ) -> Result<ArtifactId> {
        let message = convert::channel(channel)?
            .send_message(&self.http, CreateMessage::new().embed(embed(announcement)))
            .await?;
        Ok(ArtifactId(message.id.get()))
    }

    async fn edit(
        &self,
        channel: ResourceId,
        artifact: ArtifactId,
        announcement: &Announcement,
    ) -> Result<()> {
        convert::channel(channel)?
            .edit_message(
                &self.http,
                convert::message(artifact)?,
                EditMessage::new().embed(embed(announcement)),
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, channel: ResourceId, artifact: ArtifactId) -> Result<()> {
        convert::channel(channel)?
            .delete_message(&self.http, convert::message(artifact)?)
            .await?;
        Ok(())
    }
}

// ── Threads and ops log ──────────────────────────────────────────────────────

#[async_trait]
impl ThreadSurface for DiscordPlatform {
    async fn find_thread(&self, channel: ResourceId, name: &str) -> Result<Option<ThreadId>> {
        let parent = self.guild_channel(channel).await?;
        let active = parent.guild_id.get_active_threads(&self.http).await?;
        Ok(active
            .threads
            .iter()
            .find(|t| t.parent_id == Some(parent.id) && t.name == name)
            .map(|t| ThreadId(t.id.get())))
    }

    async fn delete_thread(&self, thread: ThreadId) -> Result<()> {
        convert::thread(thread)?.delete(&self.http).await?;
        Ok(())
    }
}

#[async_trait]
impl OpsLog for DiscordPlatform {
    async fn post(&self, channel: ResourceId, text: &str) -> Result<()> {
        convert::channel(channel)?.say(&self.http, text).await?;
        Ok(())
    }
}

// ── Members ──────────────────────────────────────────────────────────────────

#[async_trait]
impl MemberDirectory for DiscordPlatform {
    async fn display_name(&self, community: CommunityId, member: MemberId) -> Result<String> {
        let found = convert::guild(community)?
            .member(&self.http, convert::user(member)?)
            .await?;
        Ok(found.display_name().to_string())
    }

    async fn is_privileged(&self, community: CommunityId, member: MemberId) -> Result<bool> {
        let found = convert::guild(community)?
            .member(&self.http, convert::user(member)?)
            .await?;
        Ok(found
            .roles
            .iter()
            .any(|r| self.privileged_roles.contains(&RoleId(r.get()))))
    }
}
