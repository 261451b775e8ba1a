//! The application registry capability.
//!
//! Everything above this module talks to the host's package database through
//! the [`Registry`] trait only.  How a handle was obtained (and which backend
//! sits behind it) is decided once, in the dispatcher.

use std::path::PathBuf;

// ───────────────────────────────────────── records ───────────

/// One installed application as reported by the registry.
///
/// A fresh snapshot is produced on every listing; nothing is cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRecord {
    /// Opaque, unique package identifier.
    pub identifier: String,
    /// Display name.  Not unique; falls back to the identifier when the
    /// registry has nothing better.
    pub label: String,
}

impl ApplicationRecord {
    pub fn new(identifier: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            label: label.into(),
        }
    }
}

// ───────────────────────────────────────── errors ────────────

/// Failures raised by a registry backend.
///
/// A missing identifier is *not* an error: lookups return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No usable registry could be reached at startup.
    #[error("application registry unavailable: none of {searched:?} exists")]
    Unavailable { searched: Vec<PathBuf> },

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to scan application directory")]
    Walk(#[from] walkdir::Error),
}

// ───────────────────────────────────────── capability ────────

/// Enumerate installed applications and resolve identifiers to labels.
///
/// Calls may block on disk I/O; async callers run them on the blocking pool.
pub trait Registry: Send + Sync {
    /// Every application the registry knows about, including ones whose data
    /// is present but which are not installed for the active user.
    fn applications(&self) -> Result<Vec<ApplicationRecord>, RegistryError>;

    /// Label for `identifier`, or `None` if the registry has no such entry.
    fn label(&self, identifier: &str) -> Result<Option<String>, RegistryError>;
}

// ───────────────────────────────────────── test doubles ──────

#[cfg(test)]
pub mod testing {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;

    /// In-memory registry with a fixed inventory.
    #[derive(Debug, Default)]
    pub struct FixedRegistry {
        apps: BTreeMap<String, String>,
    }

    impl FixedRegistry {
        pub fn new<'a>(apps: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
            Self {
                apps: apps
                    .into_iter()
                    .map(|(id, label)| (id.to_string(), label.to_string()))
                    .collect(),
            }
        }
    }

    impl Registry for FixedRegistry {
        fn applications(&self) -> Result<Vec<ApplicationRecord>, RegistryError> {
            Ok(self
                .apps
                .iter()
                .map(|(id, label)| ApplicationRecord::new(id.as_str(), label.as_str()))
                .collect())
        }

        fn label(&self, identifier: &str) -> Result<Option<String>, RegistryError> {
            Ok(self.apps.get(identifier).cloned())
        }
    }

    /// Wraps another registry and blocks the calling thread before answering,
    /// so responses race the ping timer.
    pub struct SlowRegistry<R> {
        pub inner: R,
        pub delay: Duration,
    }

    impl<R: Registry> Registry for SlowRegistry<R> {
        fn applications(&self) -> Result<Vec<ApplicationRecord>, RegistryError> {
            std::thread::sleep(self.delay);
            self.inner.applications()
        }

        fn label(&self, identifier: &str) -> Result<Option<String>, RegistryError> {
            std::thread::sleep(self.delay);
            self.inner.label(identifier)
        }
    }

    /// Registry whose every call fails with an I/O error.
    pub struct BrokenRegistry;

    impl Registry for BrokenRegistry {
        fn applications(&self) -> Result<Vec<ApplicationRecord>, RegistryError> {
            Err(broken())
        }

        fn label(&self, _identifier: &str) -> Result<Option<String>, RegistryError> {
            Err(broken())
        }
    }

    fn broken() -> RegistryError {
        RegistryError::Io {
            path: "/broken".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
    }
}
