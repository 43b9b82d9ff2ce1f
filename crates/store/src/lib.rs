//! Durable records: personal rooms and their creation cooldowns, group
//! records, drafts, block relations and group history.
//!
//! Every method is a short, independent statement; nothing here holds a
//! transaction open across an interactive wait.

pub mod error;
pub mod models;
pub mod sqlite;

use {
    async_trait::async_trait,
    partyline_common::{ArtifactId, CommunityId, MemberId, ResourceId},
};

pub use {
    error::{StoreError, StoreResult},
    models::{Draft, GroupConfig, GroupRecord, HistoryEntry, PersonalRoom},
    sqlite::SqliteStore,
};

#[async_trait]
pub trait Store: Send + Sync {
    // ---- personal rooms ----
    async fn room_by_owner(
        &self,
        community: CommunityId,
        owner: MemberId,
    ) -> StoreResult<Option<PersonalRoom>>;
    async fn room_by_resource(
        &self,
        community: CommunityId,
        resource: ResourceId,
    ) -> StoreResult<Option<PersonalRoom>>;
    /// Fails with [`StoreError::Conflict`] if the owner already has a room.
    async fn insert_room(&self, room: &PersonalRoom) -> StoreResult<()>;
    async fn next_room_order(&self, community: CommunityId) -> StoreResult<i64>;
    /// Returns whether a row was deleted.
    async fn delete_room(&self, community: CommunityId, resource: ResourceId) -> StoreResult<bool>;
    async fn list_rooms(&self, community: CommunityId) -> StoreResult<Vec<PersonalRoom>>;

    // ---- room creation cooldown (survives restarts) ----
    async fn room_cooldown(&self, community: CommunityId, owner: MemberId)
    -> StoreResult<Option<i64>>;
    async fn set_room_cooldown(
        &self,
        community: CommunityId,
        owner: MemberId,
        expires_at_ms: i64,
    ) -> StoreResult<()>;
    async fn purge_room_cooldowns(&self, now_ms: i64) -> StoreResult<u64>;

    // ---- group records ----
    async fn group_by_owner(
        &self,
        community: CommunityId,
        owner: MemberId,
    ) -> StoreResult<Option<GroupRecord>>;
    async fn group_by_resource(
        &self,
        community: CommunityId,
        resource: ResourceId,
    ) -> StoreResult<Option<GroupRecord>>;
    /// Fails with [`StoreError::Conflict`] if the owner already has a record.
    async fn insert_group(&self, record: &GroupRecord) -> StoreResult<()>;
    async fn update_group_config(
        &self,
        community: CommunityId,
        resource: ResourceId,
        config: &GroupConfig,
    ) -> StoreResult<bool>;
    async fn set_group_artifact(
        &self,
        community: CommunityId,
        resource: ResourceId,
        artifact: Option<ArtifactId>,
    ) -> StoreResult<()>;
    /// Rewrite the owner and identity of a record in one statement.
    ///
    /// Returns `Ok(false)` when the record no longer belongs to `from`, and
    /// [`StoreError::Conflict`] when `to` already owns a record.
    async fn transfer_group(
        &self,
        community: CommunityId,
        resource: ResourceId,
        from: MemberId,
        to: MemberId,
        ign: &str,
    ) -> StoreResult<bool>;
    async fn delete_group(
        &self,
        community: CommunityId,
        resource: ResourceId,
    ) -> StoreResult<Option<GroupRecord>>;
    async fn list_groups(&self, community: CommunityId) -> StoreResult<Vec<GroupRecord>>;
    /// Next value of the running per-mode counter, starting at 1.
    async fn next_group_number(&self, community: CommunityId, mode: &str) -> StoreResult<u32>;

    // ---- drafts ----
    async fn list_drafts(&self, community: CommunityId, owner: MemberId)
    -> StoreResult<Vec<Draft>>;
    /// Insert or overwrite the slot.
    async fn save_draft(&self, draft: &Draft) -> StoreResult<()>;
    async fn delete_draft(
        &self,
        community: CommunityId,
        owner: MemberId,
        slot: u8,
    ) -> StoreResult<bool>;
    /// Delete every slot at index `keep` or above.
    async fn trim_drafts(&self, community: CommunityId, owner: MemberId, keep: u8)
    -> StoreResult<u64>;

    // ---- block relations ----
    async fn add_block(
        &self,
        community: CommunityId,
        blocker: MemberId,
        blocked: MemberId,
    ) -> StoreResult<()>;
    /// True if either member blocked the other.
    async fn blocked_either_way(
        &self,
        community: CommunityId,
        a: MemberId,
        b: MemberId,
    ) -> StoreResult<bool>;
    /// Everyone `member` blocked or was blocked by.
    async fn block_partners(
        &self,
        community: CommunityId,
        member: MemberId,
    ) -> StoreResult<Vec<MemberId>>;

    // ---- history ----
    async fn append_history(&self, record: &GroupRecord) -> StoreResult<()>;
    async fn history_for(
        &self,
        community: CommunityId,
        owner: MemberId,
        limit: u32,
    ) -> StoreResult<Vec<HistoryEntry>>;
}
