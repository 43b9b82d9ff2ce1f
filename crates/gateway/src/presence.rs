//! Presence event router.
//!
//! Voice-state updates arrive as enter/leave pairs. The router drops exact
//! repeats, serializes work per member, and fans each event out to the room
//! allocator and the party teardown.

use std::sync::Arc;

use {
    dashmap::DashMap,
    partyline_common::{CommunityId, MemberId, ResourceId},
    partyline_groups::TeardownReport,
    partyline_rooms::{EnterOutcome, LeaveOutcome},
    tokio::sync::Mutex,
    tracing::{debug, warn},
};

use crate::state::BotState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceKind {
    Entered,
    Left,
}

/// A member entered or left a voice resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceEvent {
    pub community: CommunityId,
    pub zone: ResourceId,
    pub member: MemberId,
    pub kind: PresenceKind,
}

impl PresenceEvent {
    pub fn entered(community: CommunityId, zone: ResourceId, member: MemberId) -> Self {
        Self {
            community,
            zone,
            member,
            kind: PresenceKind::Entered,
        }
    }

    pub fn left(community: CommunityId, zone: ResourceId, member: MemberId) -> Self {
        Self {
            community,
            zone,
            member,
            kind: PresenceKind::Left,
        }
    }
}

/// What each consumer did with an event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PresenceReport {
    pub duplicate: bool,
    pub entered: Option<EnterOutcome>,
    pub left: Option<LeaveOutcome>,
    pub teardown: Option<TeardownReport>,
}

type MemberKey = (CommunityId, MemberId);

/// Current zone per member and per-member locks.
#[derive(Default)]
pub struct PresenceRouter {
    current: DashMap<MemberKey, ResourceId>,
    locks: DashMap<MemberKey, Arc<Mutex<()>>>,
}

impl PresenceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event` and report whether it repeats the member's last event.
    /// A leave drops the member's entry, so a repeated leave is passed on;
    /// both leave consumers are idempotent.
    pub fn is_duplicate(&self, event: &PresenceEvent) -> bool {
        let key = (event.community, event.member);
        match event.kind {
            PresenceKind::Entered => self.current.insert(key, event.zone) == Some(event.zone),
            PresenceKind::Left => {
                // A stale leave for another zone keeps the newer entry.
                self.current.remove_if(&key, |_, zone| *zone == event.zone);
                false
            },
        }
    }

    /// Members currently tracked as present somewhere.
    pub fn tracked(&self) -> usize {
        self.current.len()
    }

    fn lock_for(&self, key: MemberKey) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(key).or_default().value())
    }

    /// Drop the lock entry once nobody else holds or waits on it.
    fn release(&self, key: MemberKey) {
        self.locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Members with a lock entry. Only non-zero while events are in flight.
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

impl BotState {
    /// Route one presence event. Failures in one consumer are logged and do
    /// not stop the others.
    pub async fn on_presence(&self, event: PresenceEvent) -> PresenceReport {
        let key = (event.community, event.member);
        let lock = self.presence.lock_for(key);
        let report = {
            let _guard = lock.lock().await;
            if self.presence.is_duplicate(&event) {
                debug!(member = %event.member, zone = %event.zone, kind = ?event.kind, "duplicate presence event");
                PresenceReport {
                    duplicate: true,
                    ..Default::default()
                }
            } else {
                self.dispatch(event).await
            }
        };
        drop(lock);
        self.presence.release(key);
        report
    }

    async fn dispatch(&self, event: PresenceEvent) -> PresenceReport {
        let PresenceEvent {
            community,
            zone,
            member,
            kind,
        } = event;
        let mut report = PresenceReport::default();
        match kind {
            PresenceKind::Entered => {
                match self.rooms.on_presence_enter(community, zone, member).await {
                    Ok(outcome) => report.entered = Some(outcome),
                    Err(e) => warn!(%member, %zone, error = %e, "room allocation failed"),
                }
            },
            PresenceKind::Left => {
                match self.rooms.on_presence_leave(community, zone, member).await {
                    Ok(outcome) => report.left = Some(outcome),
                    Err(e) => warn!(%member, %zone, error = %e, "room release failed"),
                }
                match self.groups.on_presence_leave(community, zone, member).await {
                    Ok(teardown) => report.teardown = teardown,
                    Err(e) => warn!(%member, %zone, error = %e, "party teardown check failed"),
                }
            },
        }
        report
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testkit::{C, Harness},
        partyline_store::Store,
    };

    const M: MemberId = MemberId(42);

    #[test]
    fn repeats_are_duplicates_but_moves_are_not() {
        let router = PresenceRouter::new();
        let (a, b) = (ResourceId(1), ResourceId(2));
        assert!(!router.is_duplicate(&PresenceEvent::entered(C, a, M)));
        assert!(router.is_duplicate(&PresenceEvent::entered(C, a, M)));
        assert!(!router.is_duplicate(&PresenceEvent::left(C, a, M)));
        assert!(!router.is_duplicate(&PresenceEvent::entered(C, b, M)));
        // A leave for a zone never seen entered still goes through.
        assert!(!router.is_duplicate(&PresenceEvent::left(C, ResourceId(3), MemberId(7))));
    }

    #[test]
    fn leaving_forgets_the_member() {
        let router = PresenceRouter::new();
        let (a, b) = (ResourceId(1), ResourceId(2));
        for m in 1..=50 {
            router.is_duplicate(&PresenceEvent::entered(C, a, MemberId(m)));
            router.is_duplicate(&PresenceEvent::left(C, a, MemberId(m)));
        }
        assert_eq!(router.tracked(), 0);

        // A late leave from the previous zone keeps the current one.
        router.is_duplicate(&PresenceEvent::entered(C, b, M));
        router.is_duplicate(&PresenceEvent::left(C, a, M));
        assert_eq!(router.tracked(), 1);
        assert!(router.is_duplicate(&PresenceEvent::entered(C, b, M)));

        // Re-entering the same zone after leaving is a fresh event.
        router.is_duplicate(&PresenceEvent::left(C, b, M));
        assert!(!router.is_duplicate(&PresenceEvent::entered(C, b, M)));
    }

    #[tokio::test]
    async fn entering_spawn_creates_a_room_once() {
        let h = Harness::new().await;
        h.mock.place(M, h.spawn);

        let first = h.state.on_presence(PresenceEvent::entered(C, h.spawn, M)).await;
        let Some(EnterOutcome::Created(room)) = first.entered else {
            panic!("expected a room, got {first:?}");
        };
        assert_eq!(h.mock.location(M), Some(room));

        let again = h.state.on_presence(PresenceEvent::entered(C, h.spawn, M)).await;
        assert!(again.duplicate);
        assert_eq!(h.state.presence.in_flight(), 0);
    }

    #[tokio::test]
    async fn leaving_an_empty_room_closes_it() {
        let h = Harness::new().await;
        h.mock.place(M, h.spawn);
        let report = h.state.on_presence(PresenceEvent::entered(C, h.spawn, M)).await;
        let Some(EnterOutcome::Created(room)) = report.entered else {
            panic!("expected a room, got {report:?}");
        };
        h.state.on_presence(PresenceEvent::entered(C, room, M)).await;

        h.mock.disconnect(M);
        let report = h.state.on_presence(PresenceEvent::left(C, room, M)).await;
        assert_eq!(report.left, Some(LeaveOutcome::Closed(room)));
        assert_eq!(report.teardown, None);
        assert!(h.store.room_by_owner(C, M).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn leaving_an_empty_party_tears_it_down() {
        let h = Harness::new().await;
        let party = h.publish_party(M).await;

        h.mock.disconnect(M);
        let report = h.state.on_presence(PresenceEvent::left(C, party, M)).await;
        assert_eq!(report.left, Some(LeaveOutcome::Ignored));
        let teardown = report.teardown.unwrap();
        assert!(teardown.record_deleted);
        assert!(teardown.resource_deleted);
        assert!(h.store.group_by_owner(C, M).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_events_for_one_member_are_serialized() {
        let h = Harness::new().await;
        h.mock.place(M, h.spawn);
        let (a, b) = tokio::join!(
            h.state.on_presence(PresenceEvent::entered(C, h.spawn, M)),
            h.state.on_presence(PresenceEvent::entered(C, h.spawn, M)),
        );
        let created = [a, b]
            .iter()
            .filter(|r| matches!(r.entered, Some(EnterOutcome::Created(_))))
            .count();
        assert_eq!(created, 1);
        assert_eq!(h.state.presence.in_flight(), 0);
    }
}
