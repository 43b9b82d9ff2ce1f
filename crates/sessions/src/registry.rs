use std::{sync::Arc, time::Duration};

use {
    dashmap::DashMap,
    tokio::sync::{Mutex, mpsc},
    tokio_util::sync::CancellationToken,
    tracing::{debug, trace},
    uuid::Uuid,
};

use crate::key::SessionKey;

/// Which timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The outer session bound.
    Session,
    /// A nested sub-flow bound, tagged with the generation it was armed for.
    Subflow { generation: u64 },
}

/// Delivered on the registry's channel when a timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expired {
    pub key: SessionKey,
    /// Identifies the session instance the timer belonged to, so a timer from
    /// a closed session never touches a newer one under the same key.
    pub session_id: Uuid,
    pub expiry: Expiry,
}

struct Slot<S> {
    id: Uuid,
    state: Arc<Mutex<S>>,
    cancel: CancellationToken,
    subflow: Option<CancellationToken>,
}

/// A live session. Lock `state` to advance it; events for one session are
/// therefore applied one at a time.
pub struct SessionHandle<S> {
    pub key: SessionKey,
    pub id: Uuid,
    pub state: Arc<Mutex<S>>,
}

impl<S> Clone for SessionHandle<S> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            id: self.id,
            state: Arc::clone(&self.state),
        }
    }
}

/// Live interactive sessions of one kind, each with an outer timeout and at
/// most one armed sub-flow timeout.
///
/// Timeouts are cancellation tokens raced against a sleep. Sub-flow tokens
/// are children of the session token, so closing a session cancels every
/// timer it owns.
pub struct SessionRegistry<S> {
    sessions: DashMap<SessionKey, Slot<S>>,
    expired: mpsc::UnboundedSender<Expired>,
}

impl<S: Send + 'static> SessionRegistry<S> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Expired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_sender(tx), rx)
    }

    /// Share one expiry channel between several registries.
    pub fn with_sender(expired: mpsc::UnboundedSender<Expired>) -> Self {
        Self {
            sessions: DashMap::new(),
            expired,
        }
    }

    /// Open a session, replacing (and cancelling) any previous one under the
    /// same key.
    pub fn open(&self, key: SessionKey, state: S, timeout: Duration) -> SessionHandle<S> {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let state = Arc::new(Mutex::new(state));
        self.arm(
            cancel.clone(),
            timeout,
            Expired {
                key: key.clone(),
                session_id: id,
                expiry: Expiry::Session,
            },
        );
        let previous = self.sessions.insert(key.clone(), Slot {
            id,
            state: Arc::clone(&state),
            cancel,
            subflow: None,
        });
        if let Some(prev) = previous {
            prev.cancel.cancel();
            debug!(%key, replaced = %prev.id, "session replaced");
        }
        debug!(%key, session = %id, ?timeout, "session opened");
        SessionHandle { key, id, state }
    }

    pub fn get(&self, key: &SessionKey) -> Option<SessionHandle<S>> {
        self.sessions.get(key).map(|slot| SessionHandle {
            key: key.clone(),
            id: slot.id,
            state: Arc::clone(&slot.state),
        })
    }

    /// Close whatever session lives under `key`.
    pub fn close(&self, key: &SessionKey) -> bool {
        match self.sessions.remove(key) {
            Some((_, slot)) => {
                slot.cancel.cancel();
                debug!(%key, session = %slot.id, "session closed");
                true
            },
            None => false,
        }
    }

    /// Close the session only if it is still the instance `id`.
    pub fn close_if(&self, key: &SessionKey, id: Uuid) -> bool {
        match self.sessions.remove_if(key, |_, slot| slot.id == id) {
            Some((_, slot)) => {
                slot.cancel.cancel();
                debug!(%key, session = %id, "session closed");
                true
            },
            None => false,
        }
    }

    /// Arm the sub-flow timer for `generation`, cancelling any previous one.
    /// Returns false when the session is gone.
    pub fn arm_subflow(&self, key: &SessionKey, generation: u64, timeout: Duration) -> bool {
        let Some(mut slot) = self.sessions.get_mut(key) else {
            return false;
        };
        if let Some(prev) = slot.subflow.take() {
            prev.cancel();
        }
        let token = slot.cancel.child_token();
        slot.subflow = Some(token.clone());
        let msg = Expired {
            key: key.clone(),
            session_id: slot.id,
            expiry: Expiry::Subflow { generation },
        };
        drop(slot);
        self.arm(token, timeout, msg);
        true
    }

    /// Cancel the armed sub-flow timer, if any.
    pub fn disarm_subflow(&self, key: &SessionKey) {
        if let Some(mut slot) = self.sessions.get_mut(key)
            && let Some(token) = slot.subflow.take()
        {
            token.cancel();
        }
    }

    /// Whether `expired` still refers to a live session instance.
    pub fn is_current(&self, expired: &Expired) -> bool {
        self.sessions
            .get(&expired.key)
            .is_some_and(|slot| slot.id == expired.session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close everything (shutdown).
    pub fn close_all(&self) {
        for slot in self.sessions.iter() {
            slot.cancel.cancel();
        }
        self.sessions.clear();
    }

    fn arm(&self, token: CancellationToken, after: Duration, msg: Expired) {
        let tx = self.expired.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {},
                _ = tokio::time::sleep(after) => {
                    trace!(key = %msg.key, expiry = ?msg.expiry, "timer fired");
                    let _ = tx.send(msg);
                },
            }
        });
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        partyline_common::{CommunityId, MemberId},
    };

    fn key(m: u64) -> SessionKey {
        SessionKey::wizard(CommunityId(1), MemberId(m))
    }

    const MIN: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn outer_timeout_is_delivered() {
        let (reg, mut rx) = SessionRegistry::<u32>::new();
        let h = reg.open(key(1), 0, MIN);

        let exp = rx.recv().await.unwrap();
        assert_eq!(exp.key, key(1));
        assert_eq!(exp.session_id, h.id);
        assert_eq!(exp.expiry, Expiry::Session);
        assert!(reg.is_current(&exp));
        assert!(reg.close_if(&exp.key, exp.session_id));
        assert!(reg.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn closing_cancels_every_timer() {
        let (reg, mut rx) = SessionRegistry::<u32>::new();
        reg.open(key(1), 0, MIN);
        assert!(reg.arm_subflow(&key(1), 1, Duration::from_secs(10)));
        assert!(reg.close(&key(1)));

        tokio::time::sleep(MIN * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_a_subflow_cancels_the_previous_timer() {
        let (reg, mut rx) = SessionRegistry::<u32>::new();
        reg.open(key(1), 0, MIN * 10);
        reg.arm_subflow(&key(1), 1, Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(5)).await;
        reg.arm_subflow(&key(1), 2, Duration::from_secs(10));

        let exp = rx.recv().await.unwrap();
        assert_eq!(exp.expiry, Expiry::Subflow { generation: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_subflow_never_fires() {
        let (reg, mut rx) = SessionRegistry::<u32>::new();
        reg.open(key(1), 0, MIN * 10);
        reg.arm_subflow(&key(1), 1, Duration::from_secs(10));
        reg.disarm_subflow(&key(1));
        tokio::time::sleep(MIN).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_does_not_close_replacement() {
        let (reg, mut rx) = SessionRegistry::<u32>::new();
        let first = reg.open(key(1), 1, MIN);
        let second = reg.open(key(1), 2, MIN * 3);
        assert_ne!(first.id, second.id);

        // The first session's token was cancelled, so the next expiry is the
        // second session's.
        let exp = rx.recv().await.unwrap();
        assert_eq!(exp.session_id, second.id);
        assert!(!reg.close_if(&key(1), first.id));
        assert_eq!(*reg.get(&key(1)).unwrap().state.lock().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn arm_on_missing_session_is_refused() {
        let (reg, _rx) = SessionRegistry::<u32>::new();
        assert!(!reg.arm_subflow(&key(9), 1, MIN));
    }
}
