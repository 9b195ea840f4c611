//! Configuration loading and resolution.
//!
//! Loads notifier settings from `./embercast.toml` (or `$EMBERCAST_CONFIG_PATH`).
//! Environment variables override file values; file values override defaults.
//!
//! Per-project settings carry three-state booleans: an unset value always
//! defers to the global default, never a silent coercion. Values arriving
//! from the build server's web forms use sentinel strings for "unset"
//! (`""`, `"(Default)"`, `"(System Default)"`); those are normalized here,
//! before anything reaches the policy or composer layers.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

/// Form values that mean "unset, use the default".
const UNSET_SENTINELS: [&str; 3] = ["", "(Default)", "(System Default)"];

/// Errors raised while loading or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required credential is missing after local-over-global resolution.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}

/// Normalize a form string: sentinel values become `None`.
pub fn clean_to_string(value: &str) -> Option<String> {
    if UNSET_SENTINELS.contains(&value) {
        None
    } else {
        Some(value.to_owned())
    }
}

/// Normalize a form boolean: sentinel values and unparsable text become `None`.
pub fn clean_to_bool(value: &str) -> Option<bool> {
    if UNSET_SENTINELS.contains(&value) {
        None
    } else {
        value.trim().parse().ok()
    }
}

/// Deserialize a three-state boolean from TOML.
///
/// Accepts a plain bool, a sentinel string (normalized to unset), or the
/// strings `"true"`/`"false"`.
fn three_state<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Bool(b)) => Ok(Some(b)),
        Some(Raw::Text(s)) => Ok(clean_to_bool(&s)),
    }
}

// ── Per-project config ──────────────────────────────────────────

/// Per-project notifier settings.
///
/// Every field is optional; `None` defers to [`GlobalConfig`].
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Chat account identifier override.
    pub account_id: Option<String>,
    /// Chat account secret override.
    pub password: Option<String>,
    /// Chat service subdomain override.
    pub domain: Option<String>,
    /// Target room name override.
    pub room: Option<String>,
    /// Notify only on failures and recoveries. Unset defers to global.
    #[serde(deserialize_with = "three_state")]
    pub only_on_failure_or_recovery: Option<bool>,
    /// Append the build URL to the message. Unset defers to global.
    #[serde(deserialize_with = "three_state")]
    pub include_url: Option<bool>,
}

impl NotifierConfig {
    /// Build a config from raw web-form values, normalizing sentinels.
    pub fn from_form_values(
        account_id: &str,
        password: &str,
        domain: &str,
        room: &str,
        only_on_failure_or_recovery: &str,
        include_url: &str,
    ) -> Self {
        Self {
            account_id: clean_to_string(account_id),
            password: clean_to_string(password),
            domain: clean_to_string(domain),
            room: clean_to_string(room),
            only_on_failure_or_recovery: clean_to_bool(only_on_failure_or_recovery),
            include_url: clean_to_bool(include_url),
        }
    }

    /// Whether the build URL should be appended, local over global.
    pub fn should_include_url(&self, global: &GlobalConfig) -> bool {
        self.include_url.unwrap_or(global.include_url)
    }
}

impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("account_id", &self.account_id)
            .field("password", &self.password.as_ref().map(|_| "__REDACTED__"))
            .field("domain", &self.domain)
            .field("room", &self.room)
            .field(
                "only_on_failure_or_recovery",
                &self.only_on_failure_or_recovery,
            )
            .field("include_url", &self.include_url)
            .finish()
    }
}

// ── Global config ───────────────────────────────────────────────

/// Server-wide notifier defaults.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default chat account identifier.
    pub account_id: Option<String>,
    /// Default chat account secret.
    pub password: Option<String>,
    /// Default chat service subdomain.
    pub domain: Option<String>,
    /// Default target room name.
    pub room: Option<String>,
    /// Base URL of the build server, with trailing slash.
    pub base_url: String,
    /// Default for the failure-or-recovery filter.
    pub only_on_failure_or_recovery: bool,
    /// Default for appending the build URL.
    pub include_url: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            password: None,
            domain: None,
            room: None,
            base_url: String::new(),
            only_on_failure_or_recovery: false,
            include_url: false,
        }
    }
}

impl std::fmt::Debug for GlobalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalConfig")
            .field("account_id", &self.account_id)
            .field("password", &self.password.as_ref().map(|_| "__REDACTED__"))
            .field("domain", &self.domain)
            .field("room", &self.room)
            .field("base_url", &self.base_url)
            .field(
                "only_on_failure_or_recovery",
                &self.only_on_failure_or_recovery,
            )
            .field("include_url", &self.include_url)
            .finish()
    }
}

// ── Resolved credentials ────────────────────────────────────────

/// Room credentials after local-over-global resolution.
#[derive(Clone, PartialEq, Eq)]
pub struct RoomCredentials {
    /// Chat account identifier.
    pub account_id: String,
    /// Chat account secret.
    pub password: String,
    /// Chat service subdomain.
    pub domain: String,
    /// Target room name.
    pub room: String,
}

impl RoomCredentials {
    /// Resolve effective credentials: project values win, global fills gaps.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when a field is set in
    /// neither the project nor the global config.
    pub fn resolve(project: &NotifierConfig, global: &GlobalConfig) -> Result<Self, ConfigError> {
        let pick = |local: &Option<String>,
                    fallback: &Option<String>,
                    name: &'static str|
         -> Result<String, ConfigError> {
            local
                .clone()
                .or_else(|| fallback.clone())
                .ok_or(ConfigError::MissingCredential(name))
        };

        Ok(Self {
            account_id: pick(&project.account_id, &global.account_id, "account_id")?,
            password: pick(&project.password, &global.password, "password")?,
            domain: pick(&project.domain, &global.domain, "domain")?,
            room: pick(&project.room, &global.room, "room")?,
        })
    }
}

impl std::fmt::Debug for RoomCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomCredentials")
            .field("account_id", &self.account_id)
            .field("password", &"__REDACTED__")
            .field("domain", &self.domain)
            .field("room", &self.room)
            .finish()
    }
}

// ── Bridge config ───────────────────────────────────────────────

/// Settings for the scripted delivery bridge.
///
/// These identify the secondary runtime's entry point and are fixed per
/// deployment, not per message.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Interpreter program to run, e.g. `ruby`.
    pub interpreter: String,
    /// Script module the bootstrap requires.
    pub script_module: String,
    /// Entry type instantiated by the bootstrap.
    pub entry_type: String,
    /// Operation invoked on the entry type for each payload.
    pub start_operation: String,
    /// Additional, additive module search paths for the secondary runtime.
    pub search_paths: Vec<String>,
    /// Optional per-delivery timeout in seconds. `None` means unbounded,
    /// which matches the baseline behavior.
    pub delivery_timeout_seconds: Option<u64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            interpreter: "ruby".to_owned(),
            script_module: "notifier".to_owned(),
            entry_type: "Notifier".to_owned(),
            start_operation: "notify".to_owned(),
            search_paths: vec![".".to_owned()],
            delivery_timeout_seconds: None,
        }
    }
}

// ── Top-level settings ──────────────────────────────────────────

/// Top-level notifier settings loaded from TOML.
///
/// Path: `./embercast.toml` or `$EMBERCAST_CONFIG_PATH`.
/// Env vars override file values; file values override defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifierSettings {
    /// Server-wide defaults.
    pub global: GlobalConfig,
    /// Delivery bridge settings.
    pub bridge: BridgeConfig,
    /// Per-project overrides, keyed by project name.
    pub projects: HashMap<String, NotifierConfig>,
}

impl NotifierSettings {
    /// Load settings with precedence: env vars > TOML file > defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file exists but cannot be read or
    /// parsed. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Self::load_from_file()?;
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Load from the TOML file only, no env overrides.
    fn load_from_file() -> Result<Self, ConfigError> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading notifier config from file");
                Ok(toml::from_str(&contents)?)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no notifier config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Resolve the config path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(p) = env("EMBERCAST_CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("embercast.toml")
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability.
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("EMBERCAST_ACCOUNT_ID") {
            self.global.account_id = Some(v);
        }
        if let Some(v) = env("EMBERCAST_PASSWORD") {
            self.global.password = Some(v);
        }
        if let Some(v) = env("EMBERCAST_DOMAIN") {
            self.global.domain = Some(v);
        }
        if let Some(v) = env("EMBERCAST_ROOM") {
            self.global.room = Some(v);
        }
        if let Some(v) = env("EMBERCAST_BASE_URL") {
            self.global.base_url = v;
        }
        if let Some(v) = env("EMBERCAST_INTERPRETER") {
            self.bridge.interpreter = v;
        }
        if let Some(v) = env("EMBERCAST_DELIVERY_TIMEOUT_SECS") {
            match v.parse() {
                Ok(n) => self.bridge.delivery_timeout_seconds = Some(n),
                Err(_) => tracing::warn!(
                    var = "EMBERCAST_DELIVERY_TIMEOUT_SECS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }

    /// Parse a TOML string into settings (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Per-project config for `project`, or an all-unset default.
    pub fn project(&self, project: &str) -> NotifierConfig {
        self.projects.get(project).cloned().unwrap_or_default()
    }
}

// ── Tests ───────────────────────────────────────────────────────
