//! Configuration Vault – reads/writes `~/.mir/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mir_client::Credential;
use mir_client::http::DEFAULT_HOST;
use mir_runtime::MissionTemplates;
use mir_types::MirError;
use serde::{Deserialize, Serialize};

/// Host value that selects the in-process simulated robot.
pub const SIM_HOST: &str = "sim";

/// Persisted user configuration stored in `~/.mir/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// API root of the robot, or `"sim"` for a dry run.
    #[serde(default = "default_host")]
    pub host: String,

    /// Authorization header value (stored as plain text – the file is
    /// written owner-only).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth: String,

    /// JSON credential file with an `"auth"` field, used when `auth` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_file: Option<PathBuf>,

    /// Delay between `advance` calls in `/run`.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long one mission may stay outstanding before `/run` gives up.
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,

    /// Distance (m) under which the robot counts as arrived.
    #[serde(default = "default_acceptance_radius")]
    pub acceptance_radius: f64,

    /// Reuse catalog lists for this many seconds.  Unset means always fresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_refresh_secs: Option<u64>,

    #[serde(default)]
    pub templates: MissionTemplates,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field(
                "auth",
                if self.auth.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("auth_file", &self.auth_file)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("stall_timeout_secs", &self.stall_timeout_secs)
            .field("acceptance_radius", &self.acceptance_radius)
            .field("catalog_refresh_secs", &self.catalog_refresh_secs)
            .field("templates", &self.templates)
            .finish()
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_stall_timeout_secs() -> u64 {
    900
}
fn default_acceptance_radius() -> f64 {
    0.1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            auth: String::new(),
            auth_file: None,
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            stall_timeout_secs: default_stall_timeout_secs(),
            acceptance_radius: default_acceptance_radius(),
            catalog_refresh_secs: None,
            templates: MissionTemplates::default(),
        }
    }
}

impl Config {
    pub fn is_sim(&self) -> bool {
        self.host.eq_ignore_ascii_case(SIM_HOST)
    }

    /// Resolve the authorization token from `auth` or `auth_file`.
    pub fn credential(&self) -> Result<Credential, MirError> {
        let token = Some(self.auth.as_str()).filter(|t| !t.trim().is_empty());
        Credential::resolve(token, self.auth_file.as_deref())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }

    pub fn catalog_refresh(&self) -> Option<Duration> {
        self.catalog_refresh_secs.map(Duration::from_secs)
    }
}

/// Return the path to `~/.mir/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mir").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, MirError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Load the config from a specific path, without environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, MirError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        MirError::Configuration(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| MirError::Configuration(format!("failed to parse config: {e}")))?;
    Ok(Some(cfg))
}

/// Apply `MIR_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `MIR_HOST` | `host` |
/// | `MIR_AUTH` | `auth` |
/// | `MIR_AUTH_FILE` | `auth_file` |
/// | `MIR_POLL_INTERVAL_MS` | `poll_interval_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("MIR_HOST") {
        cfg.host = v;
    }
    if let Ok(v) = std::env::var("MIR_AUTH") {
        cfg.auth = v;
    }
    if let Ok(v) = std::env::var("MIR_AUTH_FILE") {
        cfg.auth_file = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("MIR_POLL_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.poll_interval_ms = ms;
    }
}

/// Save the config to disk, creating `~/.mir/` if necessary.
pub fn save(cfg: &Config) -> Result<(), MirError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), MirError> {
    let io_err = |what: &str, e: std::io::Error| {
        MirError::Configuration(format!("failed to {what} at {}: {e}", path.display()))
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err("create config directory", e))?;
        // Owner only (rwx------).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| io_err("set config directory permissions", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| MirError::Configuration(format!("failed to serialize config: {e}")))?;
    // Owner read/write only (rw-------).
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| io_err("write config", e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| io_err("write config", e))?;
    Ok(())
}
