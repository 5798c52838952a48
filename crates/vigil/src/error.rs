//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use vigil_config::ConfigError;
use vigil_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const INVALID_INPUT: i32 = 6;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Commands ─────────────────────────────────────────────────────

    #[error("Invalid external command: {reason}")]
    #[diagnostic(
        code(vigil::invalid_command),
        help(
            "Expected '[<unix ts>] DIRECTIVE;field;...'.\n\
             Try: vigil parse \"<line>\" to check a single line"
        )
    )]
    InvalidCommand { reason: String },

    #[error("Invalid downtime window: {reason}")]
    #[diagnostic(
        code(vigil::invalid_window),
        help("Fixed downtimes need end > start; flexible ones need a positive duration.")
    )]
    InvalidWindow { reason: String },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(vigil::not_found),
        help("Run: vigil config show to see configured hosts and services")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    #[error("Engine stopped before the request completed")]
    #[diagnostic(code(vigil::engine_stopped))]
    EngineStopped,

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vigil::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(vigil::config),
        help("Check the config file syntax, or point --config at another file.")
    )]
    Config(Box<figment::Error>),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    #[diagnostic(code(vigil::serialization))]
    Serialization(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::InvalidCommand { .. } | Self::InvalidWindow { .. } => exit_code::INVALID_INPUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MalformedCommand { reason } => CliError::InvalidCommand { reason },
            CoreError::InvalidWindow { reason } => CliError::InvalidWindow { reason },
            CoreError::UnknownTarget { target } => CliError::NotFound {
                resource_type: "item".into(),
                identifier: target,
            },
            CoreError::UnknownDowntime { id } => CliError::NotFound {
                resource_type: "downtime".into(),
                identifier: id.to_string(),
            },
            CoreError::Serialization(e) => CliError::Serialization(e.to_string()),
            CoreError::EngineStopped => CliError::EngineStopped,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
            ConfigError::Serialization(e) => CliError::Serialization(e.to_string()),
        }
    }
}
