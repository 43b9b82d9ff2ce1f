mod inspect_commands;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context as _,
    clap::{Parser, Subcommand},
    partyline_config::PartylineConfig,
    partyline_store::SqliteStore,
    secrecy::SecretString,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "partyline", about = "Partyline: personal voice rooms and party finding")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Only look for the config file in this directory.
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and run the bot.
    Run {
        /// Bot token. Overrides `discord.token` from the config file.
        #[arg(long, env = "PARTYLINE_DISCORD_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Read persisted state without connecting.
    Inspect {
        #[command(subcommand)]
        action: inspect_commands::InspectAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (token omitted).
    Show,
    /// Print the path of the config file in use.
    Path,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// The command-line token wins over the config file.
fn resolve_token(flag: Option<String>, config: &PartylineConfig) -> Option<SecretString> {
    flag.filter(|t| !t.trim().is_empty())
        .map(SecretString::new)
        .or_else(|| config.discord.token.clone())
}

async fn open_store(config: &PartylineConfig) -> anyhow::Result<SqliteStore> {
    let url = partyline_config::database_url(config);
    if let Some(path) = url
        .strip_prefix("sqlite://")
        .map(|rest| rest.split('?').next().unwrap_or(rest))
        && let Some(parent) = std::path::Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let pool = SqliteStore::connect(&url, config.database.max_connections).await?;
    SqliteStore::init(&pool).await?;
    Ok(SqliteStore::new(pool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(dir) = cli.config_dir.clone() {
        partyline_config::set_config_dir(dir);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "partyline starting");

    match cli.command {
        Commands::Run { token } => {
            let config = partyline_config::discover_and_load();
            let token = resolve_token(token, &config).context(
                "no bot token: pass --token, set PARTYLINE_DISCORD_TOKEN or discord.token",
            )?;
            let store = open_store(&config).await?;
            partyline_discord::run(config, Arc::new(store), &token).await
        },
        Commands::Inspect { action } => {
            let config = partyline_config::discover_and_load();
            let store = open_store(&config).await?;
            inspect_commands::handle_inspect(&store, action).await
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config = partyline_config::discover_and_load();
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            },
            ConfigAction::Path => {
                println!(
                    "{}",
                    partyline_config::find_or_default_config_path().display()
                );
                Ok(())
            },
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn flag_token_beats_config() {
        let mut config = PartylineConfig::default();
        config.discord.token = Some(SecretString::new("from-config".into()));

        let token = resolve_token(Some("from-flag".into()), &config).unwrap();
        assert_eq!(token.expose_secret(), "from-flag");

        let token = resolve_token(Some("  ".into()), &config).unwrap();
        assert_eq!(token.expose_secret(), "from-config");

        assert!(resolve_token(None, &PartylineConfig::default()).is_none());
    }

    #[test]
    fn inspect_takes_ids() {
        let cli = Cli::try_parse_from([
            "partyline",
            "inspect",
            "drafts",
            "--community",
            "7",
            "--member",
            "9",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Inspect { .. }));
        assert!(Cli::try_parse_from(["partyline", "inspect", "rooms"]).is_err());
    }

    #[tokio::test]
    async fn open_store_creates_the_database_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("partyline.db");
        let mut config = PartylineConfig::default();
        config.database.url = Some(format!("sqlite://{}?mode=rwc", db.display()));

        let store = open_store(&config).await.unwrap();
        assert!(db.exists());
        drop(store);
    }
}
