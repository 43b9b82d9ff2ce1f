//! Process-wide keyed cooldowns.
//!
//! One registry instance is owned by the gateway state and shared by every
//! component that rate-limits. Keys are plain strings in two independent
//! spaces, `actor:<member>:<action>` and `resource:<resource>:<action>`,
//! built with [`actor_key`] and [`resource_key`].
//!
//! Entries are volatile. Expired entries are dropped lazily on [`check`] and
//! in bulk by [`CooldownRegistry::sweep`] (run periodically by the janitor).
//!
//! [`check`]: CooldownRegistry::check

use std::{sync::Arc, time::Duration};

use {
    dashmap::{DashMap, mapref::entry::Entry},
    partyline_common::{MemberId, ResourceId},
    tokio::{task::JoinHandle, time::Instant},
    tokio_util::sync::CancellationToken,
    tracing::{debug, trace},
};

/// Action names shared across crates.
pub mod action {
    pub const ROOM_CREATE: &str = "room-create";
    pub const PUBLISH: &str = "publish";
    pub const BUMP: &str = "bump";
}

pub fn actor_key(member: MemberId, action: &str) -> String {
    format!("actor:{member}:{action}")
}

pub fn resource_key(resource: ResourceId, action: &str) -> String {
    format!("resource:{resource}:{action}")
}

#[derive(Debug, Default)]
pub struct CooldownRegistry {
    entries: DashMap<String, Instant>,
}

impl CooldownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) `key` for `duration` from now.
    pub fn set(&self, key: impl Into<String>, duration: Duration) {
        let key = key.into();
        trace!(%key, ?duration, "cooldown armed");
        self.entries.insert(key, Instant::now() + duration);
    }

    /// Remaining time on `key`, or `None` when it is not cooling down.
    pub fn check(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let remaining = self
            .entries
            .get(key)
            .map(|e| e.saturating_duration_since(now))?;
        if remaining.is_zero() {
            self.entries.remove_if(key, |_, exp| *exp <= now);
            return None;
        }
        Some(remaining)
    }

    pub fn clear(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Check and arm in one step on a single map entry.
    ///
    /// The returned guard disarms the cooldown when dropped, unless
    /// [`CooldownGuard::commit`] was called, so an operation that fails after
    /// acquiring does not leave the actor rate-limited.
    pub fn try_acquire(
        &self,
        key: impl Into<String>,
        duration: Duration,
    ) -> Result<CooldownGuard<'_>, Duration> {
        let key = key.into();
        let now = Instant::now();
        let expires_at = now + duration;
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut e) => {
                if *e.get() > now {
                    return Err(*e.get() - now);
                }
                e.insert(expires_at);
            },
            Entry::Vacant(v) => {
                v.insert(expires_at);
            },
        }
        Ok(CooldownGuard {
            registry: self,
            key,
            expires_at,
            committed: false,
        })
    }

    /// Acquire several keys at once. If any is cooling down, nothing stays
    /// armed and the longest remaining wait is returned, so the stricter
    /// limit is the one reported.
    pub fn try_acquire_all(
        &self,
        keys: Vec<(String, Duration)>,
    ) -> Result<Vec<CooldownGuard<'_>>, Duration> {
        let mut guards = Vec::with_capacity(keys.len());
        let mut longest: Option<Duration> = None;
        for (key, duration) in keys {
            if longest.is_some() {
                if let Some(rem) = self.check(&key) {
                    longest = longest.max(Some(rem));
                }
                continue;
            }
            match self.try_acquire(key, duration) {
                Ok(guard) => guards.push(guard),
                Err(rem) => longest = Some(rem),
            }
        }
        match longest {
            Some(rem) => Err(rem),
            None => Ok(guards),
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, exp| *exp > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sweep every `every` until `cancel` fires.
    pub fn spawn_janitor(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        let removed = self.sweep();
                        if removed > 0 {
                            debug!(removed, "swept expired cooldowns");
                        }
                    },
                }
            }
        })
    }
}

/// An armed cooldown that rolls itself back unless committed.
#[must_use = "dropping the guard disarms the cooldown"]
#[derive(Debug)]
pub struct CooldownGuard<'a> {
    registry: &'a CooldownRegistry,
    key: String,
    expires_at: Instant,
    committed: bool,
}

impl CooldownGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Keep the cooldown armed.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for CooldownGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            // Only undo our own arm; a later `set` on the same key stays.
            let expires_at = self.expires_at;
            self.registry
                .entries
                .remove_if(&self.key, |_, exp| *exp == expires_at);
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn check_after_set_then_expiry() {
        let reg = CooldownRegistry::new();
        let key = actor_key(MemberId(1), action::PUBLISH);
        reg.set(&key, Duration::from_millis(1500));

        let rem = reg.check(&key).unwrap();
        assert!(rem > Duration::ZERO && rem <= Duration::from_millis(1500));

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(reg.check(&key).is_none());
        // Lazily removed.
        assert!(reg.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn actor_and_resource_spaces_do_not_interfere() {
        let reg = CooldownRegistry::new();
        reg.set(actor_key(MemberId(7), action::BUMP), MIN);
        assert!(reg.check(&resource_key(ResourceId(7), action::BUMP)).is_none());
        assert!(reg.check(&actor_key(MemberId(7), action::BUMP)).is_some());
        assert!(reg.check(&actor_key(MemberId(7), action::PUBLISH)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn try_acquire_is_exclusive() {
        let reg = CooldownRegistry::new();
        let guard = reg.try_acquire("k", MIN).unwrap();
        let rem = reg.try_acquire("k", MIN).unwrap_err();
        assert_eq!(rem, MIN);
        guard.commit();
        assert!(reg.check("k").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_guard_rolls_back() {
        let reg = CooldownRegistry::new();
        {
            let _guard = reg.try_acquire("k", MIN).unwrap();
            assert!(reg.check("k").is_some());
        }
        assert!(reg.check("k").is_none());
        assert!(reg.try_acquire("k", MIN).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn rollback_keeps_a_newer_arm() {
        let reg = CooldownRegistry::new();
        let guard = reg.try_acquire("k", MIN).unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        reg.set("k", MIN);
        drop(guard);
        assert!(reg.check("k").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_all_reports_the_stricter_wait() {
        let reg = CooldownRegistry::new();
        reg.set("resource", Duration::from_secs(30));
        reg.set("actor", Duration::from_secs(90));

        let err = reg
            .try_acquire_all(vec![("actor".into(), MIN), ("resource".into(), MIN)])
            .unwrap_err();
        assert_eq!(err, Duration::from_secs(90));

        let err = reg
            .try_acquire_all(vec![("fresh".into(), MIN), ("resource".into(), MIN)])
            .unwrap_err();
        assert_eq!(err, Duration::from_secs(30));
        // The fresh key was rolled back.
        assert!(reg.check("fresh").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_can_be_reacquired() {
        let reg = CooldownRegistry::new();
        reg.try_acquire("k", MIN).unwrap().commit();
        tokio::time::advance(MIN).await;
        assert!(reg.try_acquire("k", MIN).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn janitor_sweeps_until_cancelled() {
        let reg = Arc::new(CooldownRegistry::new());
        reg.set("a", Duration::from_secs(1));
        reg.set("b", Duration::from_secs(100));
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&reg).spawn_janitor(Duration::from_secs(5), cancel.clone());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(reg.len(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }
}
