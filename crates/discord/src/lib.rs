//! Discord adapter: serenity client, event handler and the platform traits.
//!
//! Startup order:
//! 1. Build the serenity client with the [`Handler`].
//! 2. Wrap its HTTP client and cache in a [`DiscordPlatform`].
//! 3. Build the bot state and start background tasks.
//! 4. Hand the state to the handler and connect.

pub mod commands;
pub mod convert;
pub mod dispatch;
pub mod handler;
pub mod ids;
pub mod platform;
pub mod views;

use std::sync::Arc;

use {
    partyline_config::PartylineConfig,
    partyline_gateway::{BotState, server},
    partyline_store::Store,
    secrecy::{ExposeSecret, SecretString},
    serenity::all::{Client, GatewayIntents},
    tracing::{info, warn},
};

pub use {
    handler::{Handler, presence_events, spawn_notice_forwarder},
    platform::DiscordPlatform,
};

/// Gateway events the bot listens to.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES | GatewayIntents::GUILD_MEMBERS
}

/// Connect and run until the gateway closes or ctrl-c.
pub async fn run(
    config: PartylineConfig,
    store: Arc<dyn Store>,
    token: &SecretString,
) -> anyhow::Result<()> {
    let (handler, cell) = Handler::new();
    let mut client = Client::builder(token.expose_secret(), intents())
        .event_handler(handler)
        .await?;

    let discord = DiscordPlatform::new(
        Arc::clone(&client.http),
        Arc::clone(&client.cache),
        &config.tiers,
    );
    let (state, expired) = BotState::new(config, store, discord.platform());
    let background = server::start(&state, expired);
    let forwarder = spawn_notice_forwarder(Arc::clone(&client.http), state.subscribe_notices());
    if cell.set(Arc::clone(&state)).is_err() {
        anyhow::bail!("bot state initialised twice");
    }

    let shards = Arc::clone(&client.shard_manager);
    let cancel = state.shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "ctrl-c handler failed");
                }
                info!("shutdown requested");
            },
            () = cancel.cancelled() => {},
        }
        shards.shutdown_all().await;
    });

    let outcome = client.start().await;
    state.shutdown(background).await;
    forwarder.abort();
    outcome?;
    Ok(())
}
