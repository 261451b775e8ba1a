//! Runtime configuration for the registry search path, label locale and pings.
//!
//! There is no config file.  Defaults come from the platform environment
//! (`$XDG_DATA_HOME`, `$XDG_DATA_DIRS`, `$LC_ALL`/`$LC_MESSAGES`/`$LANG`) and
//! can be overridden from the command line.

use std::path::PathBuf;
use std::time::Duration;

use crate::core::locale::Locale;

/// Heartbeat period in serve mode.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(3);

const DEFAULT_DATA_DIRS: &str = "/usr/local/share:/usr/share";

// ───────────────────────────────────────── registry ──────────

/// Where the desktop-entry registry looks, and which locale labels resolve
/// against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// `applications/` directories in precedence order.
    pub application_dirs: Vec<PathBuf>,
    pub locale: Option<Locale>,
}

impl RegistryConfig {
    /// Resolve from the process environment.  `data_dirs`, when non-empty,
    /// replaces the XDG search path entirely.
    pub fn load(data_dirs: &[PathBuf]) -> Self {
        Self::resolve(data_dirs, |key| std::env::var(key).ok())
    }

    fn resolve(data_dirs: &[PathBuf], env: impl Fn(&str) -> Option<String>) -> Self {
        let bases = if data_dirs.is_empty() {
            xdg_data_dirs(&env)
        } else {
            data_dirs.to_vec()
        };
        Self {
            application_dirs: bases.into_iter().map(|d| d.join("applications")).collect(),
            locale: messages_locale(&env),
        }
    }
}

/// `$XDG_DATA_HOME` (default `~/.local/share`) followed by `$XDG_DATA_DIRS`.
fn xdg_data_dirs(env: &impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let non_empty = |key: &str| env(key).filter(|v| !v.is_empty());

    let data_home = non_empty("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = non_empty("HOME").unwrap_or_else(|| ".".into());
            PathBuf::from(home).join(".local").join("share")
        });

    let mut dirs = vec![data_home];
    let system = non_empty("XDG_DATA_DIRS").unwrap_or_else(|| DEFAULT_DATA_DIRS.into());
    for dir in system.split(':').filter(|d| !d.is_empty()) {
        let dir = PathBuf::from(dir);
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}

/// The locale used for messages: first non-empty of `LC_ALL`, `LC_MESSAGES`,
/// `LANG`.
fn messages_locale(env: &impl Fn(&str) -> Option<String>) -> Option<Locale> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .into_iter()
        .filter_map(|key| env(key))
        .find(|v| !v.is_empty())
        .and_then(|v| Locale::parse(&v))
}

// ───────────────────────────────────────── serve ─────────────

/// Knobs for the serve-mode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeConfig {
    pub ping_interval: Duration,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }
}
