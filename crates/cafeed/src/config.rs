//! CLI configuration: a thin layer over `cafeed_config` that applies the
//! `GlobalOpts` overrides (--profile, --server, --token).

use secrecy::SecretString;

use cafeed_config::ProfileTokenProvider;
use cafeed_core::{CacheConfig, PipelineConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use cafeed_config::{
    Config, Profile, cache_dir, config_path, load_config_or_default, save_config, store_token,
};

/// Everything a command needs to run against one profile.
pub struct Resolved {
    pub profile_name: String,
    pub pipeline: PipelineConfig,
    pub tokens: ProfileTokenProvider,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated profile names for help text.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}

/// Find the active profile, or synthesize one from `--server` when the
/// config has none.
fn active_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, cfg);

    let mut profile = match cfg.profiles.get(&name) {
        Some(profile) => profile.clone(),
        None if global.server.is_some() => Profile::default(),
        None if cfg.profiles.is_empty() => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
        None => {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_profiles(cfg),
            });
        }
    };

    // Flag > env > profile
    if let Some(ref server) = global.server {
        profile.server.clone_from(server);
    }
    Ok((name, profile))
}

/// Build the pipeline configuration and token chain for the active profile.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config_or_default();
    let (profile_name, profile) = active_profile(global, &cfg)?;

    let pipeline = cafeed_config::profile_to_pipeline_config(&profile, &profile_name, &cfg.defaults)?;
    let tokens = ProfileTokenProvider::new(&profile, &profile_name)
        .with_override(global.token.clone().map(SecretString::from));

    Ok(Resolved {
        profile_name,
        pipeline,
        tokens,
    })
}

/// Cache settings for the active profile. Needs no server or token, so a
/// missing profile falls back to the defaults under the profile's name.
pub fn resolve_cache(global: &GlobalOpts) -> CacheConfig {
    let cfg = load_config_or_default();
    let name = active_profile_name(global, &cfg);
    let profile = cfg.profiles.get(&name).cloned().unwrap_or_default();
    cafeed_config::profile_cache_config(&profile, &name, &cfg.defaults)
}
