use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "passage.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    /// Preferred CLI output mode (`pretty`, `text`, `json`).
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_from")]
    pub from: String,
    /// Base URL linked from every email.
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// Copy the supervisor on submission emails.
    #[serde(default = "default_true")]
    pub cc_supervisor: bool,
    /// Where the CLI's outbox mailer appends messages.
    #[serde(default = "default_outbox")]
    pub outbox: PathBuf,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            from: default_from(),
            site_url: default_site_url(),
            cc_supervisor: default_true(),
            outbox: default_outbox(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Close a request automatically once every item is completed.
    #[serde(default)]
    pub auto_close: bool,
}

/// A loaded config and the file it came from, if any.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: Option<PathBuf>,
}

impl Config {
    /// Resolve relative store and outbox paths against `base`.
    #[must_use]
    pub fn relative_to(mut self, base: &Path) -> Self {
        if self.store.path.is_relative() {
            self.store.path = base.join(&self.store.path);
        }
        if self.notify.outbox.is_relative() {
            self.notify.outbox = base.join(&self.notify.outbox);
        }
        self
    }
}

/// Parse one config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML for
/// [`Config`].
pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<Config>(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load configuration in lookup order: `explicit`, `./passage.toml`, the
/// user config dir (`<config_dir>/passage/config.toml`), then defaults.
///
/// Relative paths inside a file are resolved against that file's directory.
///
/// # Errors
///
/// Returns an error if `explicit` does not exist, or if the first config file
/// found cannot be read or parsed.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let user_file = dirs::config_dir().map(|dir| dir.join("passage/config.toml"));
    load_config_from(explicit, Path::new(LOCAL_CONFIG_FILE), user_file.as_deref())
}

fn load_config_from(
    explicit: Option<&Path>,
    local: &Path,
    user: Option<&Path>,
) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("config file {} does not exist", path.display());
        }
        return load_from(path);
    }

    for candidate in std::iter::once(local).chain(user) {
        if candidate.exists() {
            return load_from(candidate);
        }
    }

    tracing::debug!("no config file found, using defaults");
    Ok(LoadedConfig {
        config: Config::default(),
        source: None,
    })
}

fn load_from(path: &Path) -> Result<LoadedConfig> {
    let config = load_config_file(path)?;
    let base = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(LoadedConfig {
        config: config.relative_to(base),
        source: Some(path.to_path_buf()),
    })
}

const fn default_true() -> bool {
    true
}

fn default_store_path() -> PathBuf {
    PathBuf::from("passage.sqlite3")
}

fn default_outbox() -> PathBuf {
    PathBuf::from("passage-outbox.jsonl")
}

fn default_from() -> String {
    "passage@localhost".to_string()
}

fn default_site_url() -> String {
    "http://localhost:8080".to_string()
}
