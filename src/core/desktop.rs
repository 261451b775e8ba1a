//! Freedesktop desktop-entry registry.
//!
//! Installed applications are the `*.desktop` files found under each
//! `applications/` directory of the XDG data path.  Directories earlier in
//! the search path shadow later ones: the first file to claim a desktop-file
//! ID owns it, even if that file turns out not to describe an application.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::WalkDir;

use super::locale::Locale;
use super::registry::{ApplicationRecord, Registry, RegistryError};

const ENTRY_GROUP: &str = "Desktop Entry";
const SUFFIX: &str = ".desktop";

// ───────────────────────────────────────── entry parsing ─────

/// The keys of a `[Desktop Entry]` group we care about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesktopEntry {
    /// Value of `Type`.
    pub kind: Option<String>,
    /// Unlocalized `Name`.
    pub name: Option<String>,
    /// `Name[xx]` values keyed by the bracketed locale.
    pub localized_names: HashMap<String, String>,
    /// `Hidden=true`: deleted for this user, data still on disk.
    pub hidden: bool,
    pub no_display: bool,
}

impl DesktopEntry {
    /// Parse the `[Desktop Entry]` group of a desktop file.
    ///
    /// Returns `None` when the group is absent.  Within the group the first
    /// occurrence of a key wins; other groups are ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let mut entry = DesktopEntry::default();
        let mut seen_group = false;
        let mut in_group = false;
        let mut seen_keys = HashSet::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                in_group = header == ENTRY_GROUP;
                seen_group |= in_group;
                continue;
            }
            if !in_group {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if !seen_keys.insert(key.to_string()) {
                continue;
            }
            let value = value.trim();

            match key {
                "Type" => entry.kind = Some(value.to_string()),
                "Name" => entry.name = Some(unescape(value)),
                "Hidden" => entry.hidden = value == "true",
                "NoDisplay" => entry.no_display = value == "true",
                _ => {
                    if let Some(locale) = key
                        .strip_prefix("Name[")
                        .and_then(|k| k.strip_suffix(']'))
                    {
                        entry
                            .localized_names
                            .insert(locale.to_string(), unescape(value));
                    }
                }
            }
        }

        seen_group.then_some(entry)
    }

    pub fn is_application(&self) -> bool {
        self.kind.as_deref() == Some("Application")
    }

    /// Best display name for `locale`, or `None` if the entry has no usable
    /// name at all.
    pub fn label(&self, locale: Option<&Locale>) -> Option<&str> {
        let localized = locale.into_iter().flat_map(|l| l.candidates()).find_map(|key| {
            self.localized_names
                .get(&key)
                .map(String::as_str)
                .filter(|name| !name.is_empty())
        });
        localized.or_else(|| self.name.as_deref().filter(|name| !name.is_empty()))
    }
}

/// Decode desktop-entry escapes and flatten anything that would break a
/// protocol line.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(if c.is_control() { ' ' } else { c });
            continue;
        }
        match chars.next() {
            Some('s' | 'n' | 't' | 'r') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(if other.is_control() { ' ' } else { other });
            }
            None => out.push('\\'),
        }
    }
    out.trim().to_string()
}

// ───────────────────────────────────────── identifiers ───────

/// Desktop-file ID for `path` below `root`: the relative path with `/`
/// replaced by `-` and the `.desktop` suffix removed.
pub fn desktop_file_id(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let joined = parts.join("-");
    let id = joined.strip_suffix(SUFFIX)?;
    if id.contains(|c: char| c.is_control() || c == ':') {
        debug!(path = %path.display(), "skipping file name unfit for a protocol line");
        return None;
    }
    (!id.is_empty()).then(|| id.to_string())
}

/// Identifiers that could name a file outside the registry never resolve.
fn is_plausible_id(identifier: &str) -> bool {
    !identifier.is_empty()
        && !identifier.starts_with('.')
        && !identifier.contains(|c: char| matches!(c, '/' | '\\' | ':') || c.is_control())
}

// ───────────────────────────────────────── registry ──────────

/// Registry backed by the desktop-entry database.
#[derive(Debug, Clone)]
pub struct DesktopRegistry {
    roots: Vec<PathBuf>,
    locale: Option<Locale>,
}

impl DesktopRegistry {
    /// Bind to every existing directory in `application_dirs`, in order.
    ///
    /// Fails when none of them exists: there is no registry to talk to.
    pub fn open(
        application_dirs: &[PathBuf],
        locale: Option<Locale>,
    ) -> Result<Self, RegistryError> {
        let roots: Vec<PathBuf> = application_dirs
            .iter()
            .filter(|dir| dir.is_dir())
            .cloned()
            .collect();
        if roots.is_empty() {
            return Err(RegistryError::Unavailable {
                searched: application_dirs.to_vec(),
            });
        }
        debug!(?roots, ?locale, "desktop registry opened");
        Ok(Self { roots, locale })
    }

    /// Walk every `*.desktop` file under `root`, in file-name order.
    fn desktop_files(root: &Path) -> impl Iterator<Item = Result<PathBuf, RegistryError>> + '_ {
        WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => {
                    let is_desktop = entry.file_type().is_file()
                        && entry.file_name().to_string_lossy().ends_with(SUFFIX);
                    is_desktop.then(|| Ok(entry.into_path()))
                }
                // Dangling symlinks and link cycles are common in shared
                // data dirs and name nothing installable.
                Err(err)
                    if err.loop_ancestor().is_some()
                        || err.io_error().map(|e| e.kind()) == Some(ErrorKind::NotFound) =>
                {
                    debug!(error = %err, "skipping unreachable entry");
                    None
                }
                Err(err) => Some(Err(err.into())),
            })
    }

    /// Read and parse one desktop file.  `Ok(None)` means the file exists but
    /// is not a usable desktop entry.
    fn read_entry(path: &Path) -> Result<Option<DesktopEntry>, RegistryError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(RegistryError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let Ok(text) = String::from_utf8(bytes) else {
            debug!(path = %path.display(), "skipping non-UTF-8 desktop file");
            return Ok(None);
        };
        let entry = DesktopEntry::parse(&text);
        if entry.is_none() {
            debug!(path = %path.display(), "no [Desktop Entry] group");
        }
        Ok(entry)
    }

    fn record_for(&self, identifier: &str, entry: &DesktopEntry) -> Option<ApplicationRecord> {
        if !entry.is_application() {
            return None;
        }
        if entry.hidden || entry.no_display {
            trace!(
                identifier,
                hidden = entry.hidden,
                no_display = entry.no_display,
                "listing entry not shown to the user"
            );
        }
        let label = entry.label(self.locale.as_ref()).unwrap_or(identifier);
        Some(ApplicationRecord::new(identifier, label))
    }

    /// Locate the file that owns `identifier` under `root`, if any.  Walks in
    /// the same order as the listing so both agree on the owner.
    fn find_in_root(root: &Path, identifier: &str) -> Result<Option<PathBuf>, RegistryError> {
        for path in Self::desktop_files(root) {
            let path = path?;
            if desktop_file_id(root, &path).as_deref() == Some(identifier) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

impl Registry for DesktopRegistry {
    fn applications(&self) -> Result<Vec<ApplicationRecord>, RegistryError> {
        // `None` marks an ID claimed by a file that is not an application.
        let mut claimed: BTreeMap<String, Option<ApplicationRecord>> = BTreeMap::new();

        for root in &self.roots {
            for path in Self::desktop_files(root) {
                let path = path?;
                let Some(id) = desktop_file_id(root, &path) else {
                    continue;
                };
                if claimed.contains_key(&id) {
                    continue;
                }
                let record = Self::read_entry(&path)?.and_then(|e| self.record_for(&id, &e));
                claimed.insert(id, record);
            }
        }

        Ok(claimed.into_values().flatten().collect())
    }

    fn label(&self, identifier: &str) -> Result<Option<String>, RegistryError> {
        if !is_plausible_id(identifier) {
            return Ok(None);
        }
        for root in &self.roots {
            if let Some(path) = Self::find_in_root(root, identifier)? {
                let record = Self::read_entry(&path)?.and_then(|e| self.record_for(identifier, &e));
                return Ok(record.map(|r| r.label));
            }
        }
        Ok(None)
    }
}
