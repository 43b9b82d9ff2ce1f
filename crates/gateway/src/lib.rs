//! Gateway: process root state, presence routing and the background tasks.
//!
//! Lifecycle:
//! 1. Build [`BotState`] from config, a store and the platform handles
//! 2. [`server::start`] spawns the cooldown janitor and the timeout pump
//! 3. The platform adapter feeds presence events into
//!    [`BotState::on_presence`] and interactions into the services
//! 4. Once connected, [`BotState::reconcile`] cleans up after a restart
//! 5. [`BotState::shutdown`] cancels sessions and waits for the tasks
//!
//! All domain logic lives in the rooms and groups crates.

pub mod presence;
pub mod server;
pub mod state;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod testkit;

pub use {
    presence::{PresenceEvent, PresenceKind, PresenceReport, PresenceRouter},
    server::{Background, spawn_timeout_pump, start},
    state::{BotState, TimeoutNotice},
};
