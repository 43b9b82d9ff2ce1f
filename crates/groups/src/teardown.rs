//! Cascading teardown of a party once its resource empties.
//!
//! Each step is best effort: a failure is logged and the cascade moves on.
//! Running it twice is harmless: once the record is gone the record delete
//! finds nothing and the remaining steps are skipped.

use {
    partyline_common::{CommunityId, MemberId, ResourceId},
    partyline_sessions::SessionKey,
    partyline_store::GroupRecord,
    tracing::{debug, info, warn},
};

use crate::{render, service::GroupService};

/// Which steps of a teardown went through.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    pub artifact_deleted: bool,
    pub record_deleted: bool,
    pub resource_deleted: bool,
    pub logged: bool,
}

impl GroupService {
    /// A member left `zone`. Tears the party down if `zone` is a party
    /// resource and is now empty.
    pub async fn on_presence_leave(
        &self,
        community: CommunityId,
        zone: ResourceId,
        member: MemberId,
    ) -> anyhow::Result<Option<TeardownReport>> {
        let Some(record) = self.store.group_by_resource(community, zone).await? else {
            return Ok(None);
        };
        if !self
            .platform
            .voice
            .occupants(community, zone)
            .await?
            .is_empty()
        {
            return Ok(None);
        }
        debug!(%member, resource = %zone, "last member left party");
        Ok(Some(self.teardown(&record).await))
    }

    pub async fn teardown(&self, record: &GroupRecord) -> TeardownReport {
        let mut report = TeardownReport::default();
        let (community, resource) = (record.community, record.resource_id);
        let owner_name = self.platform.name_of(community, record.owner).await;

        self.delete_thread(&render::thread_name(&owner_name)).await;

        if let (Some(channel), Some(artifact)) =
            (self.settings.announcement_channel, record.artifact_id)
        {
            match self.platform.announcements.delete(channel, artifact).await {
                Ok(()) => report.artifact_deleted = true,
                Err(e) => warn!(%artifact, error = %e, "failed to delete announcement"),
            }
        }

        match self.store.delete_group(community, resource).await {
            Ok(Some(_)) => report.record_deleted = true,
            Ok(None) => {
                debug!(%resource, "party already torn down");
                return report;
            },
            Err(e) => warn!(%resource, error = %e, "failed to delete party record"),
        }

        match self.platform.voice.delete_channel(resource).await {
            Ok(()) => report.resource_deleted = true,
            Err(e) => warn!(%resource, error = %e, "failed to delete party resource"),
        }
        self.consoles.close(&SessionKey::party(community, resource));

        if let Some(channel) = self.ops_log {
            let mode = record.config.mode.as_deref().unwrap_or("party");
            let text = format!(
                "party closed: {} ({mode}) hosted by {owner_name} ({})",
                resource.mention(),
                record.owner
            );
            match self.platform.ops_log.post(channel, &text).await {
                Ok(()) => report.logged = true,
                Err(e) => warn!(error = %e, "failed to post closure notice"),
            }
        }
        info!(owner = %record.owner, %resource, ?report, "party torn down");
        report
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testkit::{C, Fixture, OWNER},
        partyline_store::Store,
    };

    #[tokio::test]
    async fn last_leave_cascades() {
        let f = Fixture::new().await;
        let res = f.publish_ready(OWNER, &[]).await.published.unwrap();
        let thread = f.mock.add_thread(f.announce, &render::thread_name("member42"));
        let guest = MemberId(7);
        f.mock.place(guest, res);

        f.mock.disconnect(OWNER);
        assert_eq!(f.service.on_presence_leave(C, res, OWNER).await.unwrap(), None);

        f.mock.disconnect(guest);
        let report = f
            .service
            .on_presence_leave(C, res, guest)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report, TeardownReport {
            artifact_deleted: true,
            record_deleted: true,
            resource_deleted: true,
            logged: true,
        });
        assert!(!f.mock.thread_exists(thread));
        assert_eq!(f.mock.announcement_count(), 0);
        assert!(f.mock.channel(res).is_none());
        assert!(f.store.group_by_owner(C, OWNER).await.unwrap().is_none());
        assert_eq!(f.mock.ops_log().len(), 1);
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let f = Fixture::new().await;
        let res = f.publish_ready(OWNER, &[]).await.published.unwrap();
        let record = f.store.group_by_resource(C, res).await.unwrap().unwrap();
        f.mock.disconnect(OWNER);

        f.service.teardown(&record).await;
        let again = f.service.teardown(&record).await;
        assert!(!again.record_deleted);
        assert!(!again.resource_deleted);
        assert_eq!(f.mock.ops_log().len(), 1);
        assert_eq!(f.service.on_presence_leave(C, res, OWNER).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let f = Fixture::new().await;
        let res = f.publish_ready(OWNER, &[]).await.published.unwrap();
        let record = f.store.group_by_resource(C, res).await.unwrap().unwrap();
        f.mock.drop_announcement(record.artifact_id.unwrap());
        f.mock.fail_delete(true);
        f.mock.disconnect(OWNER);

        let report = f.service.teardown(&record).await;
        assert!(!report.artifact_deleted);
        assert!(report.record_deleted);
        assert!(!report.resource_deleted);
        assert!(report.logged);
    }

    #[tokio::test]
    async fn non_party_zone_is_ignored() {
        let f = Fixture::new().await;
        assert_eq!(
            f.service.on_presence_leave(C, f.staging, OWNER).await.unwrap(),
            None
        );
    }
}
