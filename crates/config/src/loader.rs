use std::{
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use tracing::{debug, info, warn};

use crate::{env_subst::substitute_env, schema::PartylineConfig};

/// Config file names, checked in order inside each search directory.
const CONFIG_FILENAMES: &[&str] = &[
    "partyline.toml",
    "partyline.yaml",
    "partyline.yml",
    "partyline.json",
];

/// Directory set via `--config-dir`; when present it is the only place searched.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(path);
}

pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = None;
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Read, env-substitute and parse a config file of any supported format.
pub fn load_config(path: &Path) -> anyhow::Result<PartylineConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from the standard locations:
///
/// 1. the `--config-dir` override, exclusively, when set
/// 2. `./partyline.{toml,yaml,yml,json}`
/// 3. `~/.config/partyline/partyline.{toml,yaml,yml,json}`
///
/// A broken file is reported and defaults are used. When nothing is found a
/// default TOML file is written so operators have something to edit.
pub fn discover_and_load() -> PartylineConfig {
    let Some(path) = find_config_file() else {
        let config = PartylineConfig::default();
        match write_default_config(&config) {
            Ok(Some(path)) => info!(path = %path.display(), "wrote default config"),
            Ok(None) => {},
            Err(e) => warn!(error = %e, "failed to write default config file"),
        }
        return config;
    };

    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => {
            for w in cfg.warnings() {
                warn!(path = %path.display(), "{w}");
            }
            cfg
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            PartylineConfig::default()
        },
    }
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return first_existing(&dir);
    }
    first_existing(Path::new(".")).or_else(|| user_config_dir().and_then(|d| first_existing(&d)))
}

fn user_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(".config").join("partyline"))
}

/// Override, or `~/.config/partyline/`.
pub fn config_dir() -> Option<PathBuf> {
    config_dir_override().or_else(user_config_dir)
}

/// `~/.partyline/`, home of the default database.
pub fn data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".partyline"))
        .unwrap_or_else(|| PathBuf::from(".partyline"))
}

/// Configured database URL, or a file in [`data_dir`].
pub fn database_url(config: &PartylineConfig) -> String {
    match &config.database.url {
        Some(url) => url.clone(),
        None => format!(
            "sqlite://{}?mode=rwc",
            data_dir().join("partyline.db").display()
        ),
    }
}

pub fn find_or_default_config_path() -> PathBuf {
    find_config_file().unwrap_or_else(|| {
        config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("partyline.toml")
    })
}

fn write_default_config(config: &PartylineConfig) -> anyhow::Result<Option<PathBuf>> {
    let path = find_or_default_config_path();
    if path.exists() {
        return Ok(None);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))?;
    std::fs::write(&path, toml_str)?;
    Ok(Some(path))
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<PartylineConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
