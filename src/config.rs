//! Process configuration. Every field binds to both a CLI flag and an
//! environment variable, per `clap`'s `env` feature (pattern grounded in
//! `estuary-flow/crates/dekaf/src/main.rs`'s `Cli` struct).
//!
//! Grounded on `cmd/rsslay/main.go`'s envconfig-backed `Relay` struct.

use clap::Parser;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("RELAY_SECRET is required and must not be empty")]
    MissingSecret,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Parser)]
#[command(name = "rsslay-bridge", about, version)]
pub struct Config {
    /// HMAC key binding feed URLs to their deterministic keypairs. Required.
    #[arg(long, env = "RELAY_SECRET")]
    secret: Option<String>,

    /// Path to the SQLite catalog database.
    #[arg(long, env = "DATABASE_DIRECTORY", default_value = "db/rsslay.sqlite")]
    pub database_directory: String,

    #[arg(long, env = "DEFAULT_PROFILE_PICTURE_URL", default_value = "")]
    pub default_profile_picture_url: String,

    #[arg(long, env = "MAIN_DOMAIN_NAME", default_value = "")]
    pub main_domain_name: String,

    #[arg(long, env = "OWNER_PUBLIC_KEY", default_value = "")]
    pub owner_public_key: String,

    #[arg(long, env = "CONTACT", default_value = "")]
    pub contact: String,

    #[arg(long, env = "RELAY_NAME", default_value = "rsslay")]
    pub relay_name: String,

    #[arg(long, env = "REPLAY_TO_RELAYS", default_value_t = false)]
    pub replay_to_relays: bool,

    #[arg(long, env = "RELAYS_TO_PUBLISH", value_delimiter = ',', default_value = "")]
    pub relays_to_publish: Vec<String>,

    #[arg(long, env = "MAX_EVENTS_TO_REPLAY", default_value_t = 100)]
    pub max_events_to_replay: usize,

    #[arg(long, env = "MAX_SUBROUTINES", default_value_t = 20)]
    pub max_subroutines: usize,

    #[arg(long, env = "DEFAULT_WAIT_TIME_BETWEEN_BATCHES_MS", default_value_t = 500)]
    pub default_wait_time_between_batches_ms: u64,

    #[arg(long, env = "DEFAULT_WAIT_TIME_FOR_RELAY_RESPONSE_MS", default_value_t = 3_000)]
    pub default_wait_time_for_relay_response_ms: u64,

    #[arg(long, env = "NITTER_INSTANCES", value_delimiter = ',', default_value = "")]
    pub nitter_instances: Vec<String>,

    #[arg(long, env = "MAX_CONTENT_LENGTH", default_value_t = 500)]
    pub max_content_length: usize,

    #[arg(long, env = "DELETE_FAILING_FEEDS", default_value_t = false)]
    pub delete_failing_feeds: bool,

    #[arg(long, env = "ENABLE_AUTO_NIP05_REGISTRATION", default_value_t = false)]
    pub enable_auto_nip05_registration: bool,

    /// Empty selects the in-process cache backend instead of Redis.
    #[arg(long, env = "REDIS_CONNECTION_STRING", default_value = "")]
    pub redis_connection_string: String,
}

impl Config {
    /// Parses from `std::env::args()` plus environment, failing fast on a
    /// missing secret rather than deferring to the first collaborator that
    /// needs it.
    pub fn load() -> Result<Self> {
        let config = Config::parse();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.secret.as_deref().unwrap_or_default().is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        Ok(())
    }

    pub fn secret(&self) -> &str {
        self.secret.as_deref().unwrap_or_default()
    }

    pub fn uses_redis(&self) -> bool {
        !self.redis_connection_string.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_secret_is_rejected() {
        let config = Config {
            secret: None,
            database_directory: "db/rsslay.sqlite".into(),
            default_profile_picture_url: String::new(),
            main_domain_name: String::new(),
            owner_public_key: String::new(),
            contact: String::new(),
            relay_name: "rsslay".into(),
            replay_to_relays: false,
            relays_to_publish: vec![],
            max_events_to_replay: 100,
            max_subroutines: 20,
            default_wait_time_between_batches_ms: 500,
            default_wait_time_for_relay_response_ms: 3_000,
            nitter_instances: vec![],
            max_content_length: 500,
            delete_failing_feeds: false,
            enable_auto_nip05_registration: false,
            redis_connection_string: String::new(),
        };
        assert!(matches!(config.validate(), Err(ConfigError::MissingSecret)));
    }

    #[test]
    fn empty_redis_string_selects_in_memory_cache() {
        let config = Config {
            secret: Some("s".into()),
            database_directory: "db/rsslay.sqlite".into(),
            default_profile_picture_url: String::new(),
            main_domain_name: String::new(),
            owner_public_key: String::new(),
            contact: String::new(),
            relay_name: "rsslay".into(),
            replay_to_relays: false,
            relays_to_publish: vec![],
            max_events_to_replay: 100,
            max_subroutines: 20,
            default_wait_time_between_batches_ms: 500,
            default_wait_time_for_relay_response_ms: 3_000,
            nitter_instances: vec![],
            max_content_length: 500,
            delete_failing_feeds: false,
            enable_auto_nip05_registration: false,
            redis_connection_string: String::new(),
        };
        assert!(!config.uses_redis());
    }
}
