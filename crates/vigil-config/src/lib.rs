//! Configuration for the vigil engine.
//!
//! TOML file plus `VIGIL_` environment overrides, validated and
//! translated into the `vigil_core` registry, contact directory and
//! monitor settings.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use vigil_core::{
    CommandTemplate, Contact, DailyRange, Engine, Escalation, ItemRef, ItemSettings,
    MonitorConfig, Registry, StaticDirectory, TimePeriod,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

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

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub contacts: Vec<ContactConfig>,

    #[serde(default)]
    pub hosts: Vec<HostConfig>,

    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    /// Seconds between time sweeps. 0 disables the periodic tick.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,

    #[serde(default = "default_notification_interval")]
    pub default_notification_interval_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            default_max_attempts: default_max_attempts(),
            default_notification_interval_secs: default_notification_interval(),
        }
    }
}

fn default_tick_interval() -> u64 {
    10
}
fn default_max_attempts() -> u32 {
    3
}
fn default_notification_interval() -> u64 {
    3600
}
fn default_true() -> bool {
    true
}

/// A contact and the commands used to reach it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContactConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(default = "default_true")]
    pub notifications_enabled: bool,

    #[serde(default)]
    pub period: PeriodConfig,

    pub host_command: CommandTemplate,

    pub service_command: CommandTemplate,
}

/// `"24x7"`, `"none"`, or a list of `"HH:MM-HH:MM"` daily ranges (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PeriodConfig {
    Named(String),
    Ranges(Vec<String>),
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self::Named("24x7".into())
    }
}

impl PeriodConfig {
    fn to_period(&self, field: &str) -> Result<TimePeriod, ConfigError> {
        match self {
            Self::Named(name) => match name.as_str() {
                "24x7" => Ok(TimePeriod::Always),
                "none" => Ok(TimePeriod::Never),
                other => Err(invalid(
                    field,
                    format!("expected '24x7', 'none' or a list of ranges, got '{other}'"),
                )),
            },
            Self::Ranges(ranges) => ranges
                .iter()
                .map(|r| r.parse::<DailyRange>().map_err(|e| invalid(field, e)))
                .collect::<Result<Vec<_>, _>>()
                .map(TimePeriod::Daily),
        }
    }
}

/// Per-item tuning shared by hosts and services. Unset values fall back
/// to `[engine]`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ItemTuning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_interval_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,

    #[serde(default)]
    pub contacts: Vec<String>,

    #[serde(default)]
    pub escalations: Vec<EscalationConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EscalationConfig {
    pub first_notification: u32,

    /// 0 = open ended.
    #[serde(default)]
    pub last_notification: u32,

    pub contacts: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    pub name: String,

    #[serde(flatten)]
    pub tuning: ItemTuning,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub host: String,

    pub name: String,

    #[serde(flatten)]
    pub tuning: ItemTuning,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "vigil", "vigil").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("vigil");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load and validate the config: defaults, then the TOML file at `path`
/// (or [`config_path`]), then `VIGIL_` variables (`__` separates keys).
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("VIGIL_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Load config, returning a default if it is missing or invalid.
pub fn load_config_or_default(path: Option<&Path>) -> Config {
    load_config(path).unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, cfg.to_toml()?)?;
    Ok(())
}

// ── Validation and translation ──────────────────────────────────────

impl Config {
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject dangling references, duplicates, malformed periods and
    /// zero `max_attempts`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.default_max_attempts == 0 {
            return Err(invalid("engine.default_max_attempts", "must be at least 1"));
        }

        let mut contacts = HashSet::new();
        for contact in &self.contacts {
            if contact.name.trim().is_empty() {
                return Err(invalid("contacts.name", "must not be empty"));
            }
            if !contacts.insert(contact.name.as_str()) {
                return Err(invalid(
                    "contacts",
                    format!("duplicate contact '{}'", contact.name),
                ));
            }
            contact
                .period
                .to_period(&format!("contacts.{}.period", contact.name))?;
        }

        let mut hosts = HashSet::new();
        for host in &self.hosts {
            if host.name.trim().is_empty() {
                return Err(invalid("hosts.name", "must not be empty"));
            }
            if !hosts.insert(host.name.as_str()) {
                return Err(invalid("hosts", format!("duplicate host '{}'", host.name)));
            }
            check_tuning(&host.tuning, &format!("hosts.{}", host.name), &contacts)?;
        }

        let mut services = HashSet::new();
        for svc in &self.services {
            let field = format!("services.{}.{}", svc.host, svc.name);
            if svc.name.trim().is_empty() {
                return Err(invalid(field, "service name must not be empty"));
            }
            if !hosts.contains(svc.host.as_str()) {
                return Err(invalid(field, format!("unknown host '{}'", svc.host)));
            }
            if !services.insert((svc.host.as_str(), svc.name.as_str())) {
                return Err(invalid(
                    "services",
                    format!("duplicate service '{};{}'", svc.host, svc.name),
                ));
            }
            check_tuning(&svc.tuning, &field, &contacts)?;
        }
        Ok(())
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            tick_interval: Duration::from_secs(self.engine.tick_interval_secs),
        }
    }

    /// Every configured host and service as a fresh item.
    pub fn build_registry(&self) -> Registry {
        let mut registry = Registry::new();
        for (item, tuning) in self.items() {
            registry.insert(item, &self.settings(tuning));
        }
        registry
    }

    pub fn build_directory(&self) -> Result<StaticDirectory, ConfigError> {
        let mut directory = StaticDirectory::new();
        for contact in &self.contacts {
            directory.add_contact(Contact {
                name: contact.name.clone(),
                alias: contact.alias.clone(),
                notifications_enabled: contact.notifications_enabled,
                period: contact
                    .period
                    .to_period(&format!("contacts.{}.period", contact.name))?,
                host_command: contact.host_command.clone(),
                service_command: contact.service_command.clone(),
            });
        }
        for (item, tuning) in self.items() {
            let escalations = tuning
                .escalations
                .iter()
                .map(|e| Escalation {
                    first_notification: e.first_notification,
                    last_notification: e.last_notification,
                    contacts: e.contacts.clone(),
                })
                .collect();
            directory.assign(item, tuning.contacts.clone(), escalations);
        }
        Ok(directory)
    }

    /// Validate, then build an engine over the configured items.
    pub fn build_engine(&self) -> Result<Engine, ConfigError> {
        self.validate()?;
        let directory = self.build_directory()?;
        Ok(Engine::new(self.build_registry(), Arc::new(directory)))
    }

    fn items(&self) -> impl Iterator<Item = (ItemRef, &ItemTuning)> {
        let hosts = self
            .hosts
            .iter()
            .map(|h| (ItemRef::host(h.name.as_str()), &h.tuning));
        let services = self
            .services
            .iter()
            .map(|s| (ItemRef::service(s.host.as_str(), s.name.as_str()), &s.tuning));
        hosts.chain(services)
    }

    fn settings(&self, tuning: &ItemTuning) -> ItemSettings {
        ItemSettings {
            max_attempts: tuning
                .max_attempts
                .unwrap_or(self.engine.default_max_attempts),
            notification_interval_secs: tuning
                .notification_interval_secs
                .unwrap_or(self.engine.default_notification_interval_secs),
            notifications_enabled: tuning.notifications_enabled.unwrap_or(true),
        }
    }
}

fn check_tuning(
    tuning: &ItemTuning,
    field: &str,
    contacts: &HashSet<&str>,
) -> Result<(), ConfigError> {
    if tuning.max_attempts == Some(0) {
        return Err(invalid(format!("{field}.max_attempts"), "must be at least 1"));
    }
    let referenced = tuning
        .contacts
        .iter()
        .chain(tuning.escalations.iter().flat_map(|e| e.contacts.iter()));
    for name in referenced {
        if !contacts.contains(name.as_str()) {
            return Err(invalid(
                format!("{field}.contacts"),
                format!("unknown contact '{name}'"),
            ));
        }
    }
    Ok(())
}
