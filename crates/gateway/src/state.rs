use std::{sync::Arc, time::Instant};

use {
    partyline_channels::Platform,
    partyline_config::PartylineConfig,
    partyline_cooldowns::CooldownRegistry,
    partyline_groups::GroupService,
    partyline_rooms::{RoomAllocator, RoomConsole},
    partyline_sessions::{Expired, SessionKey},
    partyline_store::Store,
    tokio::sync::{broadcast, mpsc},
    tokio_util::sync::CancellationToken,
};

use crate::presence::PresenceRouter;

/// Capacity of the timeout notice fan-out. Slow subscribers lose the oldest
/// notices.
const NOTICE_CAPACITY: usize = 256;

// ── Timeout notices ──────────────────────────────────────────────────────────

/// Messages produced when a session timer fired and still applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutNotice {
    pub key: SessionKey,
    pub notices: Vec<String>,
}

// ── Bot state ────────────────────────────────────────────────────────────────

/// Shared runtime state, wrapped in Arc for use across event tasks.
///
/// The cooldown registry lives here and is injected into every service, so
/// there is exactly one per process.
pub struct BotState {
    pub config: Arc<PartylineConfig>,
    pub store: Arc<dyn Store>,
    pub platform: Platform,
    pub cooldowns: Arc<CooldownRegistry>,
    pub rooms: Arc<RoomAllocator>,
    pub room_console: RoomConsole,
    pub groups: GroupService,
    pub presence: PresenceRouter,
    /// Fired timers that produced something to tell a member.
    pub notices: broadcast::Sender<TimeoutNotice>,
    /// Cancelled on shutdown; background tasks watch it.
    pub shutdown: CancellationToken,
    /// Server version string.
    pub version: String,
    pub started_at: Instant,
}

impl BotState {
    /// Build the state and hand back the receiver the session timers report
    /// on. Feed it to [`crate::server::start`].
    pub fn new(
        config: PartylineConfig,
        store: Arc<dyn Store>,
        platform: Platform,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Expired>) {
        let cooldowns = Arc::new(CooldownRegistry::new());
        let rooms = Arc::new(RoomAllocator::new(
            config.rooms.clone(),
            Arc::clone(&store),
            platform.clone(),
            Arc::clone(&cooldowns),
        ));
        let room_console =
            RoomConsole::new(Arc::clone(&store), platform.clone(), Arc::clone(&rooms));
        let (groups, expired) = GroupService::new(
            &config,
            Arc::clone(&store),
            platform.clone(),
            Arc::clone(&cooldowns),
        );
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let state = Arc::new(Self {
            config: Arc::new(config),
            store,
            platform,
            cooldowns,
            rooms,
            room_console,
            groups,
            presence: PresenceRouter::new(),
            notices,
            shutdown: CancellationToken::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
        });
        (state, expired)
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<TimeoutNotice> {
        self.notices.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
