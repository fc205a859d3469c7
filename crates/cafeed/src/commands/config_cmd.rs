//! Config subcommand handlers.

use dialoguer::{Input, Password, Select};
use secrecy::{ExposeSecret, SecretString};

use cafeed_core::SubscriptionFilter;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of the config with plaintext tokens masked, for structured output.
fn redacted(cfg: &Config) -> Config {
    let profiles = cfg
        .profiles
        .iter()
        .map(|(name, profile)| {
            let mut profile = profile.clone();
            if profile.token.is_some() {
                profile.token = Some(MASK.into());
            }
            (name.clone(), profile)
        })
        .collect();
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: cfg.defaults.clone(),
        profiles,
    }
}

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let d = &cfg.defaults;
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "auto_connect = {}", d.auto_connect);
    let _ = writeln!(out, "auto_retry = {}", d.auto_retry);
    let _ = writeln!(out, "max_cache_size = {}", d.max_cache_size);
    let _ = writeln!(out, "cache_expiry_days = {}", d.cache_expiry_days);
    let _ = writeln!(out, "reconnect_max_attempts = {}", d.reconnect_max_attempts);
    let _ = writeln!(out, "debounce_ms = {}", d.debounce_ms);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "server = \"{}\"", p.server);
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"{MASK}\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(auto_connect) = p.auto_connect {
            let _ = writeln!(out, "auto_connect = {auto_connect}");
        }
        if let Some(auto_retry) = p.auto_retry {
            let _ = writeln!(out, "auto_retry = {auto_retry}");
        }
        if let Some(size) = p.max_cache_size {
            let _ = writeln!(out, "max_cache_size = {size}");
        }
        if let Some(ref filter) = p.filter {
            let _ = writeln!(
                out,
                "filter = {{ network = \"{}\", minFollowers = {} }}",
                filter.network, filter.min_followers
            );
        }
    }

    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_token() -> Result<SecretString, CliError> {
    let token = Password::new()
        .with_prompt("Feed token")
        .interact()
        .map_err(prompt_err)?;
    if token.is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "token cannot be empty".into(),
        });
    }
    Ok(SecretString::from(token))
}

/// Where the wizard put the token.
enum TokenStorage {
    Keyring,
    Plaintext(String),
    Env(String),
}

fn prompt_token_storage(profile_name: &str) -> Result<TokenStorage, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Read from an environment variable",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where should the token come from?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    match selection {
        0 => {
            config::store_token(profile_name, &prompt_token()?)?;
            eprintln!("   ✓ Token stored in system keyring");
            Ok(TokenStorage::Keyring)
        }
        1 => {
            let var: String = Input::new()
                .with_prompt("Environment variable")
                .default("CAFEED_TOKEN".into())
                .interact_text()
                .map_err(prompt_err)?;
            Ok(TokenStorage::Env(var))
        }
        _ => {
            let token = prompt_token()?;
            Ok(TokenStorage::Plaintext(token.expose_secret().to_owned()))
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(
                global.output,
                &redacted(&cfg),
                format_config_redacted,
                |_| config::config_path().display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetToken { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));

            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: config::available_profiles(&cfg),
                });
            }

            config::store_token(&profile_name, &prompt_token()?)?;
            eprintln!("✓ Token stored in system keyring for profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }
    }
}

/// Interactive wizard: adds or replaces one profile and makes it the default.
fn init() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("cafeed configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let server: String = Input::new()
        .with_prompt("Feed endpoint")
        .default("wss://localhost:8080/ws".into())
        .validate_with(|input: &String| {
            cafeed_config::parse_server(input)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()
        .map_err(prompt_err)?;

    let network: String = Input::new()
        .with_prompt("Network")
        .default("solana".into())
        .interact_text()
        .map_err(prompt_err)?;

    let (token, token_env) = match prompt_token_storage(&profile_name)? {
        TokenStorage::Keyring => (None, None),
        TokenStorage::Plaintext(token) => (Some(token), None),
        TokenStorage::Env(var) => (None, Some(var)),
    };

    let profile = Profile {
        server,
        token,
        token_env,
        filter: Some(SubscriptionFilter {
            network,
            ..SubscriptionFilter::default()
        }),
        ..Profile::default()
    };

    // Keep other profiles when re-running the wizard.
    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Try it: cafeed watch");
    Ok(())
}
