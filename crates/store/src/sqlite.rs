use std::str::FromStr;

use {
    async_trait::async_trait,
    partyline_common::{ArtifactId, CommunityId, MemberId, ResourceId, now_ms},
    sqlx::{
        Sqlite, SqlitePool,
        query::Query,
        sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions},
    },
    tracing::debug,
};

use crate::{
    Store,
    error::{StoreError, StoreResult},
    models::{Draft, GroupConfig, GroupRecord, HistoryEntry, PersonalRoom},
};

/// Columns shared by `group_record`, `group_draft` and `group_history`.
const CONFIG_DDL: &str = "ign            TEXT,
    region         TEXT,
    mode           TEXT,
    size           INTEGER NOT NULL DEFAULT 0,
    private        INTEGER NOT NULL DEFAULT 0,
    min_rank       INTEGER,
    max_rank       INTEGER,
    required_roles TEXT    NOT NULL DEFAULT '[]',
    description    TEXT,
    color          INTEGER,
    access_list    TEXT    NOT NULL DEFAULT '[]',
    looking_for    INTEGER";

const CONFIG_COLUMNS: &str = "ign, region, mode, size, private, min_rank, max_rank, \
                              required_roles, description, color, access_list, looking_for";
const CONFIG_PLACEHOLDERS: &str = "?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?";

/// SQLite-backed store.
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    community: i64,
    resource_id: i64,
    owner: i64,
    created_at: i64,
    order_index: i64,
}

impl From<RoomRow> for PersonalRoom {
    fn from(r: RoomRow) -> Self {
        Self {
            community: CommunityId(r.community as u64),
            owner: MemberId(r.owner as u64),
            resource_id: ResourceId(r.resource_id as u64),
            created_at: r.created_at,
            order_index: r.order_index,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ConfigRow {
    ign: Option<String>,
    region: Option<String>,
    mode: Option<String>,
    size: i64,
    private: i64,
    min_rank: Option<i64>,
    max_rank: Option<i64>,
    required_roles: String,
    description: Option<String>,
    color: Option<i64>,
    access_list: String,
    looking_for: Option<i64>,
}

fn small(v: i64) -> u8 {
    v.clamp(0, i64::from(u8::MAX)) as u8
}

fn to_json<T: serde::Serialize>(column: &'static str, v: &T) -> StoreResult<String> {
    serde_json::to_string(v).map_err(|source| StoreError::Corrupt { column, source })
}

fn from_json<T: serde::de::DeserializeOwned>(column: &'static str, raw: &str) -> StoreResult<T> {
    serde_json::from_str(raw).map_err(|source| StoreError::Corrupt { column, source })
}

impl ConfigRow {
    fn encode(c: &GroupConfig) -> StoreResult<Self> {
        Ok(Self {
            ign: c.ign.clone(),
            region: c.region.clone(),
            mode: c.mode.clone(),
            size: i64::from(c.size),
            private: i64::from(c.private),
            min_rank: c.min_rank.map(i64::from),
            max_rank: c.max_rank.map(i64::from),
            required_roles: to_json("required_roles", &c.required_roles)?,
            description: c.description.clone(),
            color: c.color.map(i64::from),
            access_list: to_json("access_list", &c.access_list)?,
            looking_for: c.looking_for.map(i64::from),
        })
    }

    fn decode(self) -> StoreResult<GroupConfig> {
        Ok(GroupConfig {
            ign: self.ign,
            region: self.region,
            mode: self.mode,
            size: small(self.size),
            private: self.private != 0,
            min_rank: self.min_rank.map(small),
            max_rank: self.max_rank.map(small),
            required_roles: from_json("required_roles", &self.required_roles)?,
            description: self.description,
            color: self.color.map(|c| c.clamp(0, i64::from(u32::MAX)) as u32),
            access_list: from_json("access_list", &self.access_list)?,
            looking_for: self.looking_for.map(small),
        })
    }
}

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Bind the config columns in [`CONFIG_COLUMNS`] order.
fn bind_config(q: SqliteQuery<'_>, c: ConfigRow) -> SqliteQuery<'_> {
    q.bind(c.ign)
        .bind(c.region)
        .bind(c.mode)
        .bind(c.size)
        .bind(c.private)
        .bind(c.min_rank)
        .bind(c.max_rank)
        .bind(c.required_roles)
        .bind(c.description)
        .bind(c.color)
        .bind(c.access_list)
        .bind(c.looking_for)
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    community: i64,
    owner: i64,
    #[sqlx(flatten)]
    config: ConfigRow,
    resource_id: i64,
    artifact_id: Option<i64>,
    created_at: i64,
}

impl TryFrom<GroupRow> for GroupRecord {
    type Error = StoreError;

    fn try_from(r: GroupRow) -> StoreResult<Self> {
        Ok(Self {
            community: CommunityId(r.community as u64),
            owner: MemberId(r.owner as u64),
            config: r.config.decode()?,
            resource_id: ResourceId(r.resource_id as u64),
            artifact_id: r.artifact_id.map(|a| ArtifactId(a as u64)),
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DraftRow {
    community: i64,
    owner: i64,
    slot: i64,
    draftname: String,
    #[sqlx(flatten)]
    config: ConfigRow,
    updated_at: i64,
}

impl TryFrom<DraftRow> for Draft {
    type Error = StoreError;

    fn try_from(r: DraftRow) -> StoreResult<Self> {
        Ok(Self {
            community: CommunityId(r.community as u64),
            owner: MemberId(r.owner as u64),
            slot: small(r.slot),
            name: r.draftname,
            config: r.config.decode()?,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    community: i64,
    owner: i64,
    #[sqlx(flatten)]
    config: ConfigRow,
    created_at: i64,
}

fn collect<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a pool, creating the database file when it does not exist.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // Each `:memory:` connection would see its own empty database.
        let max_connections = if url.contains(":memory:") {
            1
        } else {
            max_connections.max(1)
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;
        Ok(pool)
    }

    /// Fresh, initialized in-memory store. Nothing survives the process.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = Self::connect("sqlite::memory:", 1).await?;
        Self::init(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Create all tables if they don't exist.
    pub async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
        let statements = [
            r#"CREATE TABLE IF NOT EXISTS personal_room (
                community   INTEGER NOT NULL,
                resource_id INTEGER NOT NULL,
                owner       INTEGER NOT NULL,
                created_at  INTEGER NOT NULL,
                order_index INTEGER NOT NULL,
                PRIMARY KEY (community, resource_id),
                UNIQUE (community, owner)
            )"#
            .to_string(),
            r#"CREATE TABLE IF NOT EXISTS personal_room_cooldown (
                community  INTEGER NOT NULL,
                owner      INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                PRIMARY KEY (community, owner)
            )"#
            .to_string(),
            format!(
                r#"CREATE TABLE IF NOT EXISTS group_record (
                community   INTEGER NOT NULL,
                owner       INTEGER NOT NULL,
                {CONFIG_DDL},
                resource_id INTEGER NOT NULL,
                artifact_id INTEGER,
                created_at  INTEGER NOT NULL,
                PRIMARY KEY (community, resource_id),
                UNIQUE (community, owner)
            )"#
            ),
            format!(
                r#"CREATE TABLE IF NOT EXISTS group_draft (
                community  INTEGER NOT NULL,
                owner      INTEGER NOT NULL,
                slot       INTEGER NOT NULL,
                draftname  TEXT    NOT NULL,
                {CONFIG_DDL},
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (community, owner, slot)
            )"#
            ),
            r#"CREATE TABLE IF NOT EXISTS block_relation (
                community INTEGER NOT NULL,
                blocker   INTEGER NOT NULL,
                blocked   INTEGER NOT NULL,
                PRIMARY KEY (community, blocker, blocked)
            )"#
            .to_string(),
            format!(
                r#"CREATE TABLE IF NOT EXISTS group_history (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                community  INTEGER NOT NULL,
                owner      INTEGER NOT NULL,
                {CONFIG_DDL},
                created_at INTEGER NOT NULL
            )"#
            ),
            r#"CREATE TABLE IF NOT EXISTS group_counter (
                community INTEGER NOT NULL,
                mode      TEXT    NOT NULL,
                value     INTEGER NOT NULL,
                PRIMARY KEY (community, mode)
            )"#
            .to_string(),
            "CREATE INDEX IF NOT EXISTS idx_block_blocked ON block_relation(community, blocked)"
                .to_string(),
        ];
        for sql in &statements {
            sqlx::query(sql).execute(pool).await?;
        }
        debug!("store schema ready");
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn room_by_owner(
        &self,
        community: CommunityId,
        owner: MemberId,
    ) -> StoreResult<Option<PersonalRoom>> {
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT * FROM personal_room WHERE community = ? AND owner = ?",
        )
        .bind(community.get() as i64)
        .bind(owner.get() as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn room_by_resource(
        &self,
        community: CommunityId,
        resource: ResourceId,
    ) -> StoreResult<Option<PersonalRoom>> {
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT * FROM personal_room WHERE community = ? AND resource_id = ?",
        )
        .bind(community.get() as i64)
        .bind(resource.get() as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_room(&self, room: &PersonalRoom) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO personal_room (community, resource_id, owner, created_at, order_index)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(room.community.get() as i64)
        .bind(room.resource_id.get() as i64)
        .bind(room.owner.get() as i64)
        .bind(room.created_at)
        .bind(room.order_index)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::on_write(e, "personal room"))?;
        Ok(())
    }

    async fn next_room_order(&self, community: CommunityId) -> StoreResult<i64> {
        let next = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(order_index), 0) + 1 FROM personal_room WHERE community = ?",
        )
        .bind(community.get() as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(next)
    }

    async fn delete_room(&self, community: CommunityId, resource: ResourceId) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM personal_room WHERE community = ? AND resource_id = ?")
            .bind(community.get() as i64)
            .bind(resource.get() as i64)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_rooms(&self, community: CommunityId) -> StoreResult<Vec<PersonalRoom>> {
        let rows = sqlx::query_as::<_, RoomRow>(
            "SELECT * FROM personal_room WHERE community = ? ORDER BY order_index ASC",
        )
        .bind(community.get() as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn room_cooldown(
        &self,
        community: CommunityId,
        owner: MemberId,
    ) -> StoreResult<Option<i64>> {
        let exp = sqlx::query_scalar::<_, i64>(
            "SELECT expires_at FROM personal_room_cooldown WHERE community = ? AND owner = ?",
        )
        .bind(community.get() as i64)
        .bind(owner.get() as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(exp)
    }

    async fn set_room_cooldown(
        &self,
        community: CommunityId,
        owner: MemberId,
        expires_at_ms: i64,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO personal_room_cooldown (community, owner, expires_at)
               VALUES (?, ?, ?)
               ON CONFLICT(community, owner) DO UPDATE SET expires_at = excluded.expires_at"#,
        )
        .bind(community.get() as i64)
        .bind(owner.get() as i64)
        .bind(expires_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_room_cooldowns(&self, now_ms: i64) -> StoreResult<u64> {
        let res = sqlx::query("DELETE FROM personal_room_cooldown WHERE expires_at <= ?")
            .bind(now_ms)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn group_by_owner(
        &self,
        community: CommunityId,
        owner: MemberId,
    ) -> StoreResult<Option<GroupRecord>> {
        sqlx::query_as::<_, GroupRow>(
            "SELECT * FROM group_record WHERE community = ? AND owner = ?",
        )
        .bind(community.get() as i64)
        .bind(owner.get() as i64)
        .fetch_optional(&self.pool)
        .await?
        .map(GroupRecord::try_from)
        .transpose()
    }

    async fn group_by_resource(
        &self,
        community: CommunityId,
        resource: ResourceId,
    ) -> StoreResult<Option<GroupRecord>> {
        sqlx::query_as::<_, GroupRow>(
            "SELECT * FROM group_record WHERE community = ? AND resource_id = ?",
        )
        .bind(community.get() as i64)
        .bind(resource.get() as i64)
        .fetch_optional(&self.pool)
        .await?
        .map(GroupRecord::try_from)
        .transpose()
    }

    async fn insert_group(&self, record: &GroupRecord) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO group_record (community, owner, {CONFIG_COLUMNS}, resource_id, \
             artifact_id, created_at) VALUES (?, ?, {CONFIG_PLACEHOLDERS}, ?, ?, ?)"
        );
        let q = sqlx::query(&sql)
            .bind(record.community.get() as i64)
            .bind(record.owner.get() as i64);
        bind_config(q, ConfigRow::encode(&record.config)?)
            .bind(record.resource_id.get() as i64)
            .bind(record.artifact_id.map(|a| a.get() as i64))
            .bind(record.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::on_write(e, "party"))?;
        Ok(())
    }

    async fn update_group_config(
        &self,
        community: CommunityId,
        resource: ResourceId,
        config: &GroupConfig,
    ) -> StoreResult<bool> {
        let sql = "UPDATE group_record SET ign = ?, region = ?, mode = ?, size = ?, private = ?, \
                   min_rank = ?, max_rank = ?, required_roles = ?, description = ?, color = ?, \
                   access_list = ?, looking_for = ? WHERE community = ? AND resource_id = ?";
        let res = bind_config(sqlx::query(sql), ConfigRow::encode(config)?)
            .bind(community.get() as i64)
            .bind(resource.get() as i64)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_group_artifact(
        &self,
        community: CommunityId,
        resource: ResourceId,
        artifact: Option<ArtifactId>,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE group_record SET artifact_id = ? WHERE community = ? AND resource_id = ?")
            .bind(artifact.map(|a| a.get() as i64))
            .bind(community.get() as i64)
            .bind(resource.get() as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn transfer_group(
        &self,
        community: CommunityId,
        resource: ResourceId,
        from: MemberId,
        to: MemberId,
        ign: &str,
    ) -> StoreResult<bool> {
        // One statement: the UNIQUE(community, owner) constraint rejects a
        // target that already owns a party, and the owner guard rejects a
        // stale transfer. There is never a moment with zero or two owners.
        let res = sqlx::query(
            r#"UPDATE group_record SET owner = ?, ign = ?
               WHERE community = ? AND resource_id = ? AND owner = ?"#,
        )
        .bind(to.get() as i64)
        .bind(ign)
        .bind(community.get() as i64)
        .bind(resource.get() as i64)
        .bind(from.get() as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::on_write(e, "a party for that member"))?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete_group(
        &self,
        community: CommunityId,
        resource: ResourceId,
    ) -> StoreResult<Option<GroupRecord>> {
        sqlx::query_as::<_, GroupRow>(
            "DELETE FROM group_record WHERE community = ? AND resource_id = ? RETURNING *",
        )
        .bind(community.get() as i64)
        .bind(resource.get() as i64)
        .fetch_optional(&self.pool)
        .await?
        .map(GroupRecord::try_from)
        .transpose()
    }

    async fn list_groups(&self, community: CommunityId) -> StoreResult<Vec<GroupRecord>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            "SELECT * FROM group_record WHERE community = ? ORDER BY created_at ASC",
        )
        .bind(community.get() as i64)
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn next_group_number(&self, community: CommunityId, mode: &str) -> StoreResult<u32> {
        let value = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO group_counter (community, mode, value) VALUES (?, ?, 1)
               ON CONFLICT(community, mode) DO UPDATE SET value = value + 1
               RETURNING value"#,
        )
        .bind(community.get() as i64)
        .bind(mode)
        .fetch_one(&self.pool)
        .await?;
        Ok(value.clamp(1, i64::from(u32::MAX)) as u32)
    }

    async fn list_drafts(
        &self,
        community: CommunityId,
        owner: MemberId,
    ) -> StoreResult<Vec<Draft>> {
        let rows = sqlx::query_as::<_, DraftRow>(
            "SELECT * FROM group_draft WHERE community = ? AND owner = ? ORDER BY slot ASC",
        )
        .bind(community.get() as i64)
        .bind(owner.get() as i64)
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn save_draft(&self, draft: &Draft) -> StoreResult<()> {
        let sql = format!(
            "INSERT OR REPLACE INTO group_draft (community, owner, slot, draftname, \
             {CONFIG_COLUMNS}, updated_at) VALUES (?, ?, ?, ?, {CONFIG_PLACEHOLDERS}, ?)"
        );
        let q = sqlx::query(&sql)
            .bind(draft.community.get() as i64)
            .bind(draft.owner.get() as i64)
            .bind(i64::from(draft.slot))
            .bind(draft.name.as_str());
        bind_config(q, ConfigRow::encode(&draft.config)?)
            .bind(draft.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_draft(
        &self,
        community: CommunityId,
        owner: MemberId,
        slot: u8,
    ) -> StoreResult<bool> {
        let res =
            sqlx::query("DELETE FROM group_draft WHERE community = ? AND owner = ? AND slot = ?")
                .bind(community.get() as i64)
                .bind(owner.get() as i64)
                .bind(i64::from(slot))
                .execute(&self.pool)
                .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn trim_drafts(
        &self,
        community: CommunityId,
        owner: MemberId,
        keep: u8,
    ) -> StoreResult<u64> {
        let res =
            sqlx::query("DELETE FROM group_draft WHERE community = ? AND owner = ? AND slot >= ?")
                .bind(community.get() as i64)
                .bind(owner.get() as i64)
                .bind(i64::from(keep))
                .execute(&self.pool)
                .await?;
        Ok(res.rows_affected())
    }

    async fn add_block(
        &self,
        community: CommunityId,
        blocker: MemberId,
        blocked: MemberId,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO block_relation (community, blocker, blocked) VALUES (?, ?, ?)",
        )
        .bind(community.get() as i64)
        .bind(blocker.get() as i64)
        .bind(blocked.get() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn blocked_either_way(
        &self,
        community: CommunityId,
        a: MemberId,
        b: MemberId,
    ) -> StoreResult<bool> {
        let hits = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM block_relation
               WHERE community = ?
                 AND ((blocker = ? AND blocked = ?) OR (blocker = ? AND blocked = ?))"#,
        )
        .bind(community.get() as i64)
        .bind(a.get() as i64)
        .bind(b.get() as i64)
        .bind(b.get() as i64)
        .bind(a.get() as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(hits > 0)
    }

    async fn block_partners(
        &self,
        community: CommunityId,
        member: MemberId,
    ) -> StoreResult<Vec<MemberId>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"SELECT blocked FROM block_relation WHERE community = ?1 AND blocker = ?2
               UNION
               SELECT blocker FROM block_relation WHERE community = ?1 AND blocked = ?2"#,
        )
        .bind(community.get() as i64)
        .bind(member.get() as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(|id| MemberId(id as u64)).collect())
    }

    async fn append_history(&self, record: &GroupRecord) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO group_history (community, owner, {CONFIG_COLUMNS}, created_at) \
             VALUES (?, ?, {CONFIG_PLACEHOLDERS}, ?)"
        );
        let q = sqlx::query(&sql)
            .bind(record.community.get() as i64)
            .bind(record.owner.get() as i64);
        bind_config(q, ConfigRow::encode(&record.config)?)
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn history_for(
        &self,
        community: CommunityId,
        owner: MemberId,
        limit: u32,
    ) -> StoreResult<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT community, owner, {CONFIG_COLUMNS}, created_at FROM group_history \
             WHERE community = ? AND owner = ? ORDER BY id DESC LIMIT ?"
        ))
        .bind(community.get() as i64)
        .bind(owner.get() as i64)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| -> StoreResult<HistoryEntry> {
                Ok(HistoryEntry {
                    community: CommunityId(r.community as u64),
                    owner: MemberId(r.owner as u64),
                    config: r.config.decode()?,
                    created_at: r.created_at,
                })
            })
            .collect()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const C: CommunityId = CommunityId(1);

    async fn store() -> SqliteStore {
        // A single connection: every `:memory:` connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteStore::init(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn config() -> GroupConfig {
        GroupConfig {
            ign: Some("ada#euw".into()),
            region: Some("eu".into()),
            mode: Some("competitive".into()),
            size: 5,
            private: false,
            min_rank: Some(2),
            max_rank: Some(4),
            required_roles: vec!["Controller".into()],
            description: Some("chill comms".into()),
            color: Some(0x00ff88),
            access_list: vec![MemberId(30)],
            looking_for: None,
        }
    }

    fn record(owner: u64, resource: u64) -> GroupRecord {
        GroupRecord {
            community: C,
            owner: MemberId(owner),
            config: config(),
            resource_id: ResourceId(resource),
            artifact_id: Some(ArtifactId(900 + resource)),
            created_at: 1_000,
        }
    }

    fn room(owner: u64, resource: u64, order: i64) -> PersonalRoom {
        PersonalRoom {
            community: C,
            owner: MemberId(owner),
            resource_id: ResourceId(resource),
            created_at: 5,
            order_index: order,
        }
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let s = store().await;
        SqliteStore::init(s.pool()).await.unwrap();
    }

    #[tokio::test]
    async fn one_room_per_owner() {
        let s = store().await;
        assert_eq!(s.next_room_order(C).await.unwrap(), 1);
        s.insert_room(&room(1, 100, 1)).await.unwrap();
        assert_eq!(s.next_room_order(C).await.unwrap(), 2);

        let err = s.insert_room(&room(1, 101, 2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert_eq!(
            s.room_by_owner(C, MemberId(1)).await.unwrap().unwrap().resource_id,
            ResourceId(100)
        );
        assert!(s.delete_room(C, ResourceId(100)).await.unwrap());
        assert!(!s.delete_room(C, ResourceId(100)).await.unwrap());
        assert!(s.room_by_owner(C, MemberId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn room_cooldown_upserts_and_purges() {
        let s = store().await;
        assert!(s.room_cooldown(C, MemberId(1)).await.unwrap().is_none());
        s.set_room_cooldown(C, MemberId(1), 10).await.unwrap();
        s.set_room_cooldown(C, MemberId(1), 20).await.unwrap();
        assert_eq!(s.room_cooldown(C, MemberId(1)).await.unwrap(), Some(20));
        assert_eq!(s.purge_room_cooldowns(25).await.unwrap(), 1);
        assert!(s.room_cooldown(C, MemberId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn group_round_trips_every_field() {
        let s = store().await;
        s.insert_group(&record(1, 200)).await.unwrap();
        let got = s.group_by_resource(C, ResourceId(200)).await.unwrap().unwrap();
        assert_eq!(got, record(1, 200));
    }

    #[tokio::test]
    async fn one_group_per_owner() {
        let s = store().await;
        s.insert_group(&record(1, 200)).await.unwrap();
        let err = s.insert_group(&record(1, 201)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(s.list_groups(C).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transfer_moves_ownership_atomically() {
        let s = store().await;
        s.insert_group(&record(1, 200)).await.unwrap();

        assert!(
            s.transfer_group(C, ResourceId(200), MemberId(1), MemberId(2), "bob#na1")
                .await
                .unwrap()
        );
        assert!(s.group_by_owner(C, MemberId(1)).await.unwrap().is_none());
        let moved = s.group_by_owner(C, MemberId(2)).await.unwrap().unwrap();
        let mut expected = record(1, 200);
        expected.owner = MemberId(2);
        expected.config.ign = Some("bob#na1".into());
        assert_eq!(moved, expected);

        // Stale: member 1 no longer owns it.
        assert!(
            !s.transfer_group(C, ResourceId(200), MemberId(1), MemberId(3), "c#1")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn transfer_refuses_a_target_that_owns_a_party() {
        let s = store().await;
        s.insert_group(&record(1, 200)).await.unwrap();
        s.insert_group(&record(2, 201)).await.unwrap();
        let err = s
            .transfer_group(C, ResourceId(200), MemberId(1), MemberId(2), "bob#na1")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(
            s.group_by_resource(C, ResourceId(200)).await.unwrap().unwrap().owner,
            MemberId(1)
        );
    }

    #[tokio::test]
    async fn update_artifact_and_delete() {
        let s = store().await;
        s.insert_group(&record(1, 200)).await.unwrap();

        let mut cfg = config();
        cfg.private = true;
        cfg.size = 3;
        assert!(s.update_group_config(C, ResourceId(200), &cfg).await.unwrap());
        s.set_group_artifact(C, ResourceId(200), None).await.unwrap();

        let got = s.group_by_owner(C, MemberId(1)).await.unwrap().unwrap();
        assert_eq!(got.config, cfg);
        assert_eq!(got.artifact_id, None);

        assert!(s.delete_group(C, ResourceId(200)).await.unwrap().is_some());
        assert!(s.delete_group(C, ResourceId(200)).await.unwrap().is_none());
        assert!(!s.update_group_config(C, ResourceId(200), &cfg).await.unwrap());
    }

    #[tokio::test]
    async fn counters_are_per_mode() {
        let s = store().await;
        assert_eq!(s.next_group_number(C, "duo").await.unwrap(), 1);
        assert_eq!(s.next_group_number(C, "duo").await.unwrap(), 2);
        assert_eq!(s.next_group_number(C, "competitive").await.unwrap(), 1);
        assert_eq!(s.next_group_number(CommunityId(2), "duo").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn drafts_overwrite_and_trim() {
        let s = store().await;
        for slot in 0..4u8 {
            s.save_draft(&Draft {
                community: C,
                owner: MemberId(1),
                slot,
                name: format!("draft {slot}"),
                config: config(),
                updated_at: 1,
            })
            .await
            .unwrap();
        }
        s.save_draft(&Draft {
            community: C,
            owner: MemberId(1),
            slot: 0,
            name: "renamed".into(),
            config: GroupConfig::default(),
            updated_at: 2,
        })
        .await
        .unwrap();

        let drafts = s.list_drafts(C, MemberId(1)).await.unwrap();
        assert_eq!(drafts.len(), 4);
        assert_eq!(drafts[0].name, "renamed");
        assert_eq!(drafts[0].config, GroupConfig::default());

        assert_eq!(s.trim_drafts(C, MemberId(1), 1).await.unwrap(), 3);
        let kept = s.list_drafts(C, MemberId(1)).await.unwrap();
        assert_eq!(kept.iter().map(|d| d.slot).collect::<Vec<_>>(), vec![0]);
        assert!(s.delete_draft(C, MemberId(1), 0).await.unwrap());
        assert!(!s.delete_draft(C, MemberId(1), 0).await.unwrap());
    }

    #[tokio::test]
    async fn blocks_are_checked_both_ways() {
        let s = store().await;
        s.add_block(C, MemberId(1), MemberId(2)).await.unwrap();
        s.add_block(C, MemberId(1), MemberId(2)).await.unwrap();
        s.add_block(C, MemberId(3), MemberId(1)).await.unwrap();

        assert!(s.blocked_either_way(C, MemberId(1), MemberId(2)).await.unwrap());
        assert!(s.blocked_either_way(C, MemberId(2), MemberId(1)).await.unwrap());
        assert!(!s.blocked_either_way(C, MemberId(2), MemberId(3)).await.unwrap());

        let mut partners = s.block_partners(C, MemberId(1)).await.unwrap();
        partners.sort();
        assert_eq!(partners, vec![MemberId(2), MemberId(3)]);
    }

    #[tokio::test]
    async fn history_is_append_only_newest_first() {
        let s = store().await;
        let mut r = record(1, 200);
        s.append_history(&r).await.unwrap();
        r.config.description = Some("second".into());
        s.append_history(&r).await.unwrap();

        let hist = s.history_for(C, MemberId(1), 10).await.unwrap();
        assert_eq!(hist.len(), 2);
        assert_eq!(hist[0].config.description.as_deref(), Some("second"));
        assert_eq!(s.history_for(C, MemberId(1), 1).await.unwrap().len(), 1);
    }
}
