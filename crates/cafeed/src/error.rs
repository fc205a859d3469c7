//! CLI error types with miette diagnostics.
//!
//! Maps library errors into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use cafeed_config::ConfigError;
use cafeed_core::{CoreError, StoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not stay connected to {url}: {reason}")]
    #[diagnostic(
        code(cafeed::connection_failed),
        help(
            "Check that the feed server is reachable and the token is valid.\n\
             Run with -v to see each attempt, or drop --no-retry."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("The feed server rejected the token for profile '{profile}'")]
    #[diagnostic(
        code(cafeed::auth_failed),
        help("Store a fresh token with: cafeed config set-token --profile {profile}")
    )]
    AuthFailed { profile: String },

    #[error("No token configured for profile '{profile}'")]
    #[diagnostic(
        code(cafeed::no_credentials),
        help(
            "Store one with: cafeed config set-token\n\
             Or set the CAFEED_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(cafeed::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(cafeed::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: cafeed config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(cafeed::no_config),
        help(
            "Create one with: cafeed config init\n\
             Or pass --server for a one-off session.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(cafeed::config))]
    Config(Box<figment::Error>),

    #[error("System keyring unavailable: {reason}")]
    #[diagnostic(
        code(cafeed::keyring),
        help("Use token_env or a plaintext token in the profile instead.")
    )]
    Keyring { reason: String },

    // ── Cache ────────────────────────────────────────────────────────
    #[error("Event cache error: {0}")]
    #[diagnostic(
        code(cafeed::cache),
        help("A damaged cache can be reset with: cafeed cache clear")
    )]
    Store(#[from] StoreError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(cafeed::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {reason}")]
    #[diagnostic(code(cafeed::render))]
    Render { reason: String },
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::ProfileNotFound { .. } | Self::NoConfig { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                available: "(none)".into(),
            },
            ConfigError::NoToken { profile } => Self::NoCredentials { profile },
            ConfigError::Keyring(reason) => Self::Keyring { reason },
            ConfigError::Serialization(e) => Self::Render {
                reason: e.to_string(),
            },
            ConfigError::Figment(e) => Self::Config(e),
            ConfigError::Io(e) => Self::Io(e),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => Self::ConnectionFailed {
                url: "(feed)".into(),
                reason,
            },
            CoreError::AuthenticationFailed { message: _ } => Self::AuthFailed {
                profile: "current".into(),
            },
            CoreError::Disconnected => Self::ConnectionFailed {
                url: "(feed)".into(),
                reason: "not connected".into(),
            },
            CoreError::Timeout { timeout_ms } => Self::ConnectionFailed {
                url: "(feed)".into(),
                reason: format!("timed out after {timeout_ms} ms"),
            },
            CoreError::Protocol { message } => Self::ConnectionFailed {
                url: "(feed)".into(),
                reason: message,
            },
            CoreError::Store(e) => Self::Store(e),
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => Self::Render { reason: message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let no_token = CliError::from(ConfigError::NoToken {
            profile: "main".into(),
        });
        assert_eq!(no_token.exit_code(), exit_code::AUTH);

        let bad_url = CliError::from(ConfigError::Validation {
            field: "server".into(),
            reason: "invalid URL".into(),
        });
        assert_eq!(bad_url.exit_code(), exit_code::USAGE);

        let gone = CliError::from(CoreError::Disconnected);
        assert_eq!(gone.exit_code(), exit_code::CONNECTION);
    }
}
