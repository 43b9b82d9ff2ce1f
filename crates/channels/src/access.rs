//! Access rules shared by personal rooms and party resources.
//!
//! A resource is "locked" when the general population is denied connect.
//! A member's effective access is their own overwrite if present, otherwise
//! whatever the general rule says.

use {
    anyhow::Result,
    partyline_common::{CommunityId, MemberId, ResourceId, RoleId},
    tracing::debug,
};

use crate::plugin::{Access, Overwrite, OverwriteTarget, VoicePlatform};

/// Outcome of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessChange {
    Granted,
    Revoked,
}

/// Explicit overwrite for `target`, if any.
pub fn explicit(overwrites: &[Overwrite], target: OverwriteTarget) -> Option<Access> {
    overwrites
        .iter()
        .find(|o| o.target == target)
        .map(|o| o.access)
}

pub fn is_locked(overwrites: &[Overwrite]) -> bool {
    explicit(overwrites, OverwriteTarget::Everyone) == Some(Access::Deny)
}

/// Whether `member` can connect under these overwrites.
pub fn effective(overwrites: &[Overwrite], member: MemberId) -> Access {
    match explicit(overwrites, OverwriteTarget::Member(member)) {
        Some(a) => a,
        None if is_locked(overwrites) => Access::Deny,
        None => Access::Allow,
    }
}

/// Flip a member's effective access.
///
/// A member who can connect gets an explicit deny; one who can't gets an
/// explicit allow. Toggling twice restores the effective access.
pub async fn toggle_member(
    voice: &dyn VoicePlatform,
    community: CommunityId,
    resource: ResourceId,
    member: MemberId,
) -> Result<AccessChange> {
    let overwrites = voice.overwrites(community, resource).await?;
    let target = OverwriteTarget::Member(member);
    let change = match effective(&overwrites, member) {
        Access::Allow => {
            voice
                .set_overwrite(community, resource, Overwrite::deny(target))
                .await?;
            AccessChange::Revoked
        },
        Access::Deny => {
            voice
                .set_overwrite(community, resource, Overwrite::allow(target))
                .await?;
            AccessChange::Granted
        },
    };
    debug!(%resource, %member, ?change, "access toggled");
    Ok(change)
}

/// Close the resource to the general population, grandfathering everyone
/// currently inside. Returns the members that were grandfathered.
pub async fn lock(
    voice: &dyn VoicePlatform,
    community: CommunityId,
    resource: ResourceId,
) -> Result<Vec<MemberId>> {
    let occupants = voice.occupants(community, resource).await?;
    for member in &occupants {
        voice
            .set_overwrite(
                community,
                resource,
                Overwrite::allow(OverwriteTarget::Member(*member)),
            )
            .await?;
    }
    voice
        .set_overwrite(
            community,
            resource,
            Overwrite::deny(OverwriteTarget::Everyone),
        )
        .await?;
    debug!(%resource, grandfathered = occupants.len(), "resource locked");
    Ok(occupants)
}

/// Clear the general deny rule. Member overwrites are left alone.
pub async fn unlock(
    voice: &dyn VoicePlatform,
    community: CommunityId,
    resource: ResourceId,
) -> Result<()> {
    voice
        .clear_overwrite(community, resource, OverwriteTarget::Everyone)
        .await?;
    debug!(%resource, "resource unlocked");
    Ok(())
}

/// Toggle the deny rule for an automated-agent role. Returns true when the
/// role ends up blocked.
pub async fn toggle_role_block(
    voice: &dyn VoicePlatform,
    community: CommunityId,
    resource: ResourceId,
    role: RoleId,
) -> Result<bool> {
    let overwrites = voice.overwrites(community, resource).await?;
    let target = OverwriteTarget::Role(role);
    if explicit(&overwrites, target) == Some(Access::Deny) {
        voice.clear_overwrite(community, resource, target).await?;
        Ok(false)
    } else {
        voice
            .set_overwrite(community, resource, Overwrite::deny(target))
            .await?;
        Ok(true)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::mock::MockPlatform};

    const C: CommunityId = CommunityId(1);
    const M: MemberId = MemberId(10);

    async fn setup() -> (std::sync::Arc<MockPlatform>, ResourceId) {
        let mock = MockPlatform::new();
        let res = mock.add_channel("room", 0);
        (mock, res)
    }

    #[tokio::test]
    async fn toggle_is_its_own_inverse_from_explicit_states() {
        let (mock, res) = setup().await;
        for start in [Access::Allow, Access::Deny] {
            mock.set_overwrite(C, res, Overwrite {
                target: OverwriteTarget::Member(M),
                access: start,
            })
            .await
            .unwrap();
            toggle_member(mock.as_ref(), C, res, M).await.unwrap();
            toggle_member(mock.as_ref(), C, res, M).await.unwrap();
            let ows = mock.overwrites(C, res).await.unwrap();
            assert_eq!(explicit(&ows, OverwriteTarget::Member(M)), Some(start));
        }
    }

    #[tokio::test]
    async fn toggle_restores_effective_access_without_overwrite() {
        let (mock, res) = setup().await;
        for locked in [false, true] {
            mock.clear_overwrite(C, res, OverwriteTarget::Member(M))
                .await
                .unwrap();
            if locked {
                lock(mock.as_ref(), C, res).await.unwrap();
            }
            let before = effective(&mock.overwrites(C, res).await.unwrap(), M);
            let first = toggle_member(mock.as_ref(), C, res, M).await.unwrap();
            let second = toggle_member(mock.as_ref(), C, res, M).await.unwrap();
            assert_ne!(first, second);
            let after = effective(&mock.overwrites(C, res).await.unwrap(), M);
            assert_eq!(before, after);
        }
    }

    #[tokio::test]
    async fn locking_grandfathers_occupants() {
        let (mock, res) = setup().await;
        mock.place(MemberId(1), res);
        mock.place(MemberId(2), res);

        let kept = lock(mock.as_ref(), C, res).await.unwrap();
        assert_eq!(kept.len(), 2);
        let ows = mock.overwrites(C, res).await.unwrap();
        assert!(is_locked(&ows));
        assert_eq!(effective(&ows, MemberId(1)), Access::Allow);
        assert_eq!(effective(&ows, MemberId(3)), Access::Deny);

        unlock(mock.as_ref(), C, res).await.unwrap();
        let ows = mock.overwrites(C, res).await.unwrap();
        assert!(!is_locked(&ows));
        assert_eq!(effective(&ows, MemberId(3)), Access::Allow);
    }

    #[tokio::test]
    async fn role_block_toggles() {
        let (mock, res) = setup().await;
        let role = RoleId(77);
        assert!(toggle_role_block(mock.as_ref(), C, res, role).await.unwrap());
        assert!(!toggle_role_block(mock.as_ref(), C, res, role).await.unwrap());
        assert!(mock.overwrites(C, res).await.unwrap().is_empty());
    }
}
