use std::sync::Arc;

use {
    anyhow::Result,
    async_trait::async_trait,
    partyline_common::{ArtifactId, CommunityId, MemberId, ResourceId, RoleId, ThreadId},
    serde::{Deserialize, Serialize},
};

/// Connect permission on a voice resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    Allow,
    Deny,
}

/// Who a permission overwrite applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverwriteTarget {
    /// The general population of the community.
    Everyone,
    Member(MemberId),
    Role(RoleId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overwrite {
    pub target: OverwriteTarget,
    pub access: Access,
}

impl Overwrite {
    pub fn allow(target: OverwriteTarget) -> Self {
        Self {
            target,
            access: Access::Allow,
        }
    }

    pub fn deny(target: OverwriteTarget) -> Self {
        Self {
            target,
            access: Access::Deny,
        }
    }
}

/// What to create when allocating a voice resource.
#[derive(Debug, Clone, Default)]
pub struct VoiceChannelSpec {
    pub name: String,
    pub category: Option<ResourceId>,
    /// 0 means unlimited.
    pub user_limit: u8,
    pub overwrites: Vec<Overwrite>,
}

/// Voice resources and presence inside them.
#[async_trait]
pub trait VoicePlatform: Send + Sync {
    async fn create_voice_channel(
        &self,
        community: CommunityId,
        spec: &VoiceChannelSpec,
    ) -> Result<ResourceId>;

    async fn delete_channel(&self, resource: ResourceId) -> Result<()>;

    /// Whether the resource still exists remotely.
    async fn channel_exists(&self, resource: ResourceId) -> Result<bool>;

    async fn move_member(
        &self,
        community: CommunityId,
        member: MemberId,
        to: ResourceId,
    ) -> Result<()>;

    /// Members currently connected to `resource`.
    async fn occupants(&self, community: CommunityId, resource: ResourceId)
    -> Result<Vec<MemberId>>;

    /// The resource `member` is connected to, if any.
    async fn member_location(
        &self,
        community: CommunityId,
        member: MemberId,
    ) -> Result<Option<ResourceId>>;

    async fn overwrites(&self, community: CommunityId, resource: ResourceId)
    -> Result<Vec<Overwrite>>;

    /// Insert or replace the overwrite for `overwrite.target`.
    async fn set_overwrite(
        &self,
        community: CommunityId,
        resource: ResourceId,
        overwrite: Overwrite,
    ) -> Result<()>;

    async fn clear_overwrite(
        &self,
        community: CommunityId,
        resource: ResourceId,
        target: OverwriteTarget,
    ) -> Result<()>;

    async fn user_limit(&self, resource: ResourceId) -> Result<u8>;

    async fn set_user_limit(&self, resource: ResourceId, limit: u8) -> Result<()>;
}

/// A rendered notice advertising a party.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Announcement {
    pub title: String,
    pub body: String,
    pub fields: Vec<(String, String)>,
    pub color: Option<u32>,
    pub footer: Option<String>,
    /// Resource the "join" link points at.
    pub join: Option<ResourceId>,
}

/// Shared surface where parties are advertised.
///
/// Edits and deletes of an artifact that no longer exists return an error;
/// callers treat that as a soft failure.
#[async_trait]
pub trait AnnouncementSurface: Send + Sync {
    async fn publish(&self, channel: ResourceId, announcement: &Announcement)
    -> Result<ArtifactId>;
    async fn edit(
        &self,
        channel: ResourceId,
        artifact: ArtifactId,
        announcement: &Announcement,
    ) -> Result<()>;
    async fn delete(&self, channel: ResourceId, artifact: ArtifactId) -> Result<()>;
}

/// Discussion threads hanging off the announcement channel.
#[async_trait]
pub trait ThreadSurface: Send + Sync {
    async fn find_thread(&self, channel: ResourceId, name: &str) -> Result<Option<ThreadId>>;
    async fn delete_thread(&self, thread: ThreadId) -> Result<()>;
}

/// Operations log channel.
#[async_trait]
pub trait OpsLog: Send + Sync {
    async fn post(&self, channel: ResourceId, text: &str) -> Result<()>;
}

/// Label set returned for acceptable text.
pub const CLEAN_LABEL: &str = "clean";

/// External text classifier.
#[async_trait]
pub trait ModerationClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Vec<String>>;
}

/// Classifier used when no external one is configured.
pub struct AcceptAll;

#[async_trait]
impl ModerationClassifier for AcceptAll {
    async fn classify(&self, _text: &str) -> Result<Vec<String>> {
        Ok(vec![CLEAN_LABEL.to_string()])
    }
}

/// Member facts the engine reads but never writes.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn display_name(&self, community: CommunityId, member: MemberId) -> Result<String>;
    /// Elevated membership tier.
    async fn is_privileged(&self, community: CommunityId, member: MemberId) -> Result<bool>;
}

/// Every collaborator the engine talks to, bundled for injection.
#[derive(Clone)]
pub struct Platform {
    pub voice: Arc<dyn VoicePlatform>,
    pub announcements: Arc<dyn AnnouncementSurface>,
    pub threads: Arc<dyn ThreadSurface>,
    pub ops_log: Arc<dyn OpsLog>,
    pub classifier: Arc<dyn ModerationClassifier>,
    pub directory: Arc<dyn MemberDirectory>,
}

impl Platform {
    /// Whether `text` passes the classifier.
    pub async fn is_clean(&self, text: &str) -> Result<bool> {
        let labels = self.classifier.classify(text).await?;
        Ok(labels.iter().any(|l| l == CLEAN_LABEL))
    }

    /// Display name, falling back to the raw id when the lookup fails.
    pub async fn name_of(&self, community: CommunityId, member: MemberId) -> String {
        match self.directory.display_name(community, member).await {
            Ok(name) => name,
            Err(e) => {
                tracing::debug!(%member, error = %e, "display name lookup failed");
                member.to_string()
            },
        }
    }

    /// Tier lookup; a failed lookup counts as not privileged.
    pub async fn privileged(&self, community: CommunityId, member: MemberId) -> bool {
        self.directory
            .is_privileged(community, member)
            .await
            .unwrap_or_else(|e| {
                tracing::debug!(%member, error = %e, "tier lookup failed");
                false
            })
    }
}
