//! Configuration discovery and schema.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        clear_config_dir, config_dir, data_dir, database_url, discover_and_load,
        find_or_default_config_path, load_config,
        set_config_dir,
    },
    schema::{
        DatabaseConfig, DiscordConfig, GroupsConfig, ModeEntry, PartylineConfig, RegionEntry,
        RoomsConfig, TierConfig,
    },
};
