//! Shared configuration for the cafeed CLI.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to `cafeed_core::PipelineConfig`. The CLI layers its
//! global flags on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use cafeed_core::{
    CacheConfig, ConnectionConfig, FlowConfig, PipelineConfig, ReconnectConfig,
    SubscriptionFilter, TokenProvider, expiry_days,
};

/// Keyring service name; entries are `<profile>/token`.
pub const KEYRING_SERVICE: &str = "cafeed";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("no token configured for profile '{profile}'")]
    NoToken { profile: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named feed profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Pick a profile: the explicit name, else `default_profile`, else
    /// `"default"`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        match self.profiles.get(&name) {
            Some(profile) => Ok((name, profile)),
            None => Err(ConfigError::UnknownProfile { profile: name }),
        }
    }
}

/// Tunables shared by every profile, with the documented fallbacks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Defaults {
    pub output: String,
    pub color: String,

    pub auto_connect: bool,
    pub auto_retry: bool,
    pub max_cache_size: usize,
    pub cache_expiry_days: u32,

    pub heartbeat_interval_secs: u64,
    pub pong_timeout_secs: u64,
    pub open_timeout_secs: u64,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub reconnect_max_attempts: u32,

    pub debounce_ms: u64,
    pub max_display: usize,
    pub sweep_interval_secs: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: "table".into(),
            color: "auto".into(),
            auto_connect: true,
            auto_retry: true,
            max_cache_size: 1000,
            cache_expiry_days: 7,
            heartbeat_interval_secs: 30,
            pong_timeout_secs: 10,
            open_timeout_secs: 10,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 30_000,
            reconnect_max_attempts: 5,
            debounce_ms: 300,
            max_display: 100,
            sweep_interval_secs: 60,
        }
    }
}

/// A named feed profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Feed endpoint (e.g., "wss://feed.example.com/ws").
    pub server: String,

    /// Token (plaintext -- prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the token.
    pub token_env: Option<String>,

    /// Query parameter carrying the token. Default: "token".
    pub token_param: Option<String>,

    /// Override `defaults.auto_connect`.
    pub auto_connect: Option<bool>,

    /// Override `defaults.auto_retry`.
    pub auto_retry: Option<bool>,

    /// Override `defaults.max_cache_size`.
    pub max_cache_size: Option<usize>,

    /// Override `defaults.cache_expiry_days`.
    pub cache_expiry_days: Option<u32>,

    /// Flow buffer bound. Default: the cache size.
    pub buffer_capacity: Option<usize>,

    /// Store key for this profile's cache record.
    pub cache_key: Option<String>,

    /// Subscription filter sent on connect.
    pub filter: Option<SubscriptionFilter>,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "cafeed", "cafeed")
}

fn home_fallback(kind: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(kind);
    p.push("cafeed");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory holding persisted event caches.
pub fn cache_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".cache"),
        |dirs| dirs.cache_dir().to_path_buf(),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`, layered over defaults and under `CAFEED_` env vars.
///
/// Nested keys use a double underscore, e.g.
/// `CAFEED_DEFAULTS__MAX_CACHE_SIZE=500`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CAFEED_").split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if the file is missing or broken.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution ────────────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> keyring::Result<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))
}

/// Store a token in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name)
        .and_then(|entry| entry.set_password(token.expose_secret()))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Token chain for one profile, re-evaluated on every connection attempt:
/// explicit override, then the profile's env var, then the keyring, then
/// the plaintext config value.
#[derive(Debug, Clone)]
pub struct ProfileTokenProvider {
    profile_name: String,
    token_env: Option<String>,
    plaintext: Option<SecretString>,
    explicit: Option<SecretString>,
}

impl ProfileTokenProvider {
    pub fn new(profile: &Profile, profile_name: &str) -> Self {
        Self {
            profile_name: profile_name.into(),
            token_env: profile.token_env.clone(),
            plaintext: profile.token.clone().map(SecretString::from),
            explicit: None,
        }
    }

    /// A token that wins over every other source (e.g. `--token`).
    pub fn with_override(mut self, token: Option<SecretString>) -> Self {
        self.explicit = token;
        self
    }

    pub fn resolve(&self) -> Result<SecretString, ConfigError> {
        // 1. Explicit override
        if let Some(ref token) = self.explicit {
            return Ok(token.clone());
        }

        // 2. Profile's token_env → env var lookup
        if let Some(ref env_name) = self.token_env {
            if let Ok(val) = std::env::var(env_name) {
                return Ok(SecretString::from(val));
            }
        }

        // 3. System keyring
        if let Ok(entry) = keyring_entry(&self.profile_name) {
            if let Ok(secret) = entry.get_password() {
                return Ok(SecretString::from(secret));
            }
        }

        // 4. Plaintext in config
        if let Some(ref token) = self.plaintext {
            return Ok(token.clone());
        }

        Err(ConfigError::NoToken {
            profile: self.profile_name.clone(),
        })
    }
}

impl TokenProvider for ProfileTokenProvider {
    fn token(&self) -> Option<SecretString> {
        match self.resolve() {
            Ok(token) => Some(token),
            Err(e) => {
                debug!(error = %e, "token resolution failed");
                None
            }
        }
    }
}

// ── Pipeline config ─────────────────────────────────────────────────

/// Parse and check a feed endpoint.
pub fn parse_server(server: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = server.parse().map_err(|_| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {server}"),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "server".into(),
            reason: format!("expected a ws:// or wss:// URL, got '{other}://'"),
        }),
    }
}

/// Cache settings for a profile. Unlike the full pipeline config this
/// needs no server, so offline cache commands work on any profile.
pub fn profile_cache_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> CacheConfig {
    CacheConfig {
        max_size: profile.max_cache_size.unwrap_or(defaults.max_cache_size),
        expiry: expiry_days(
            profile
                .cache_expiry_days
                .unwrap_or(defaults.cache_expiry_days),
        ),
        sweep_interval: Duration::from_secs(defaults.sweep_interval_secs),
        key: profile
            .cache_key
            .clone()
            .unwrap_or_else(|| format!("ca_event_cache_{profile_name}")),
    }
}

/// Build a `PipelineConfig` from a profile and the global defaults.
pub fn profile_to_pipeline_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<PipelineConfig, ConfigError> {
    let url = parse_server(&profile.server)?;
    let max_cache_size = profile.max_cache_size.unwrap_or(defaults.max_cache_size);

    let mut connection = ConnectionConfig::new(url);
    if let Some(ref param) = profile.token_param {
        connection.token_param.clone_from(param);
    }
    connection.heartbeat_interval = Duration::from_secs(defaults.heartbeat_interval_secs);
    connection.pong_timeout = Duration::from_secs(defaults.pong_timeout_secs);
    connection.open_timeout = Duration::from_secs(defaults.open_timeout_secs);
    connection.auto_retry = profile.auto_retry.unwrap_or(defaults.auto_retry);
    connection.reconnect = ReconnectConfig {
        base_delay: Duration::from_millis(defaults.reconnect_base_delay_ms),
        max_delay: Duration::from_millis(defaults.reconnect_max_delay_ms),
        max_attempts: defaults.reconnect_max_attempts,
    };

    let cache = profile_cache_config(profile, profile_name, defaults);

    let flow = FlowConfig {
        debounce: Duration::from_millis(defaults.debounce_ms),
        max_display: defaults.max_display,
        buffer_capacity: profile.buffer_capacity.unwrap_or(max_cache_size),
    };

    Ok(PipelineConfig {
        connection,
        auto_connect: profile.auto_connect.unwrap_or(defaults.auto_connect),
        filter: profile.filter.clone().unwrap_or_default(),
        cache,
        flow,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "main"

[defaults]
max_cache_size = 250
debounce_ms = 120

[profiles.main]
server = "wss://feed.example.com/ws"
token = "plain"
auto_retry = false
cache_expiry_days = 2

[profiles.main.filter]
network = "base"
minFollowers = 500

[profiles.main.filter.filters]
keywords = ["pump", "launch"]
"#;

    fn write_sample(dir: &Path) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_config_from(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert_eq!(config.defaults, Defaults::default());
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn profile_selection_follows_default_profile() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_config_from(&write_sample(tmp.path())).unwrap();

        let (name, profile) = config.profile(None).unwrap();
        assert_eq!(name, "main");
        assert_eq!(profile.server, "wss://feed.example.com/ws");

        assert!(matches!(
            config.profile(Some("other")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn pipeline_config_layers_profile_over_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_config_from(&write_sample(tmp.path())).unwrap();
        let (name, profile) = config.profile(None).unwrap();

        let pipeline = profile_to_pipeline_config(profile, &name, &config.defaults).unwrap();
        assert!(!pipeline.connection.auto_retry);
        assert!(pipeline.auto_connect);
        assert_eq!(pipeline.cache.max_size, 250);
        assert_eq!(pipeline.cache.expiry, Duration::from_secs(2 * 86_400));
        assert_eq!(pipeline.cache.key, "ca_event_cache_main");
        assert_eq!(pipeline.flow.debounce, Duration::from_millis(120));
        assert_eq!(pipeline.flow.buffer_capacity, 250);
        assert_eq!(pipeline.connection.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(pipeline.connection.reconnect.max_attempts, 5);
        assert_eq!(pipeline.filter.network, "base");
        assert_eq!(pipeline.filter.min_followers, 500);
        assert_eq!(pipeline.filter.filters.keywords, ["pump", "launch"]);
    }

    #[test]
    fn cache_config_needs_no_server() {
        let profile = Profile {
            cache_key: Some("shared".into()),
            ..Profile::default()
        };
        let cache = profile_cache_config(&profile, "scratch", &Defaults::default());
        assert_eq!(cache.key, "shared");
        assert_eq!(cache.max_size, 1000);
        assert_eq!(cache.expiry, Duration::from_secs(7 * 86_400));
    }

    #[test]
    fn non_websocket_servers_are_rejected() {
        for server in ["not a url", "https://feed.example.com"] {
            assert!(matches!(
                parse_server(server),
                Err(ConfigError::Validation { .. })
            ));
        }
        assert!(parse_server("ws://127.0.0.1:8080/ws").is_ok());
    }

    #[test]
    fn explicit_token_wins() {
        let profile = Profile {
            token: Some("plain".into()),
            ..Profile::default()
        };
        let provider = ProfileTokenProvider::new(&profile, "cafeed-test-explicit")
            .with_override(Some(SecretString::from("flag")));
        assert_eq!(provider.resolve().unwrap().expose_secret(), "flag");
    }

    #[test]
    fn plaintext_token_is_last_resort() {
        let profile = Profile {
            token: Some("plain".into()),
            token_env: Some("CAFEED_TEST_TOKEN_THAT_IS_NEVER_SET".into()),
            ..Profile::default()
        };
        let provider = ProfileTokenProvider::new(&profile, "cafeed-test-plaintext");
        assert_eq!(
            provider.token().map(|t| t.expose_secret().to_owned()),
            Some("plain".into())
        );
    }

    #[test]
    fn missing_token_is_reported() {
        let provider = ProfileTokenProvider::new(&Profile::default(), "cafeed-test-missing");
        assert!(matches!(
            provider.resolve(),
            Err(ConfigError::NoToken { .. })
        ));
        assert!(provider.token().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/config.toml");

        let mut config = Config::default();
        config.profiles.insert(
            "default".into(),
            Profile {
                server: "wss://feed.example.com/ws".into(),
                token_env: Some("FEED_TOKEN".into()),
                filter: Some(SubscriptionFilter::default()),
                ..Profile::default()
            },
        );
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let (_, profile) = loaded.profile(None).unwrap();
        assert_eq!(profile.token_env.as_deref(), Some("FEED_TOKEN"));
        assert_eq!(profile.filter, Some(SubscriptionFilter::default()));
    }
}
