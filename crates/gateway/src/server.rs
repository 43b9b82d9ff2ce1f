//! Background tasks and the startup and shutdown sequence.

use std::{sync::Arc, time::Duration};

use {
    partyline_common::CommunityId,
    partyline_sessions::Expired,
    tokio::{sync::mpsc, task::JoinHandle},
    tracing::{debug, info, warn},
};

use crate::state::{BotState, TimeoutNotice};

/// How often expired cooldowns are swept from memory.
const JANITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Tasks spawned by [`start`]. Awaited on shutdown.
pub struct Background {
    tasks: Vec<JoinHandle<()>>,
}

impl Background {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Spawn the cooldown janitor and the timeout pump, then log the banner.
pub fn start(state: &Arc<BotState>, expired: mpsc::UnboundedReceiver<Expired>) -> Background {
    let janitor = Arc::clone(&state.cooldowns)
        .spawn_janitor(JANITOR_INTERVAL, state.shutdown.child_token());
    let pump = spawn_timeout_pump(Arc::clone(state), expired);

    let config = &state.config;
    let lines = [
        format!("partyline v{}", state.version),
        format!(
            "rooms: {}",
            config
                .rooms
                .spawn_channel
                .map_or_else(|| "off".to_string(), |c| format!("spawn channel {c}"))
        ),
        format!(
            "parties: {} staging channel(s), {} mode(s)",
            config.groups.staging_channels.len(),
            config.groups.modes.len()
        ),
        format!(
            "ops log: {}",
            config
                .discord
                .ops_log_channel
                .map_or_else(|| "off".to_string(), |c| c.to_string())
        ),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));
    for warning in config.warnings() {
        warn!("config: {warning}");
    }

    Background {
        tasks: vec![janitor, pump],
    }
}

/// Consume fired session timers until shutdown and fan out what they
/// produced.
pub fn spawn_timeout_pump(
    state: Arc<BotState>,
    mut expired: mpsc::UnboundedReceiver<Expired>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let fired = tokio::select! {
                _ = state.shutdown.cancelled() => break,
                fired = expired.recv() => fired,
            };
            let Some(fired) = fired else { break };
            let key = fired.key.clone();
            let Some(notices) = state.groups.on_expired(fired).await else {
                continue;
            };
            if notices.is_empty() {
                continue;
            }
            // No subscribers is fine: nobody is listening for notices.
            if state.notices.send(TimeoutNotice { key, notices }).is_err() {
                debug!("timeout notice dropped, no subscribers");
            }
        }
        debug!("timeout pump stopped");
    })
}

impl BotState {
    /// Bring persisted rooms back in line with the platform for each
    /// community the bot sits in. Run once the platform connection is ready.
    pub async fn reconcile(&self, communities: &[CommunityId]) {
        for &community in communities {
            if let Err(e) = self.rooms.reconcile(community).await {
                warn!(%community, error = %e, "room reconciliation failed");
            }
        }
    }

    /// Cancel sessions and background tasks, then wait for the tasks.
    pub async fn shutdown(&self, background: Background) {
        info!(uptime_secs = self.uptime_secs(), "shutting down");
        self.groups.close_all();
        self.shutdown.cancel();
        for task in background.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
    }
}
