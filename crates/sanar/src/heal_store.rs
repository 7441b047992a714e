//! Persistent heal store.
//!
//! A map of `"<kind>|<normalized target>"` to [`HealDescriptor`], mirrored
//! to a single JSON object file. The in-memory map is authoritative for
//! this process; the file is an advisory, last-write-wins snapshot that is
//! merged on every flush.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::action::ActionKind;
use crate::locator::{normalize_whitespace, Locator, Selector, TextMatch};
use crate::result::{SanarError, SanarResult};

/// Default store location, relative to the project root
pub const DEFAULT_HEAL_STORE_PATH: &str = ".sanar/heal-store.json";

/// Durable, replayable locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HealDescriptor {
    /// Label lookup; `name` is a case-insensitive regex source
    Label {
        /// Regex source
        name: String,
    },
    /// Role lookup with optional case-insensitive accessible-name regex
    Role {
        /// ARIA role
        role: String,
        /// Regex source for the accessible name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Raw CSS selector
    Selector {
        /// CSS selector text
        selector: String,
    },
}

impl HealDescriptor {
    /// Rebuild a live locator
    #[must_use]
    pub fn to_locator(&self) -> Locator {
        match self {
            Self::Label { name } => {
                Locator::from_selector(Selector::Label(TextMatch::pattern_ci(name.clone())))
            }
            Self::Role { role, name: None } => Locator::from_selector(Selector::role(role.clone())),
            Self::Role {
                role,
                name: Some(name),
            } => Locator::from_selector(Selector::role_named(
                role.clone(),
                TextMatch::pattern_ci(name.clone()),
            )),
            Self::Selector { selector } => Locator::new(selector.clone()),
        }
    }

    /// Compact descriptor for a locator, if it can be replayed without
    /// chain refinements
    #[must_use]
    pub fn from_locator(locator: &Locator) -> Option<Self> {
        if !locator.refinements().is_empty() {
            return None;
        }
        match locator.selector() {
            Selector::Css(selector) => Some(Self::Selector {
                selector: selector.clone(),
            }),
            Selector::Label(m) => Some(Self::Label {
                name: regex_source(m),
            }),
            Selector::Role { role, name } => Some(Self::Role {
                role: role.clone(),
                name: name.as_ref().map(regex_source),
            }),
            Selector::TestId(id) => Some(Self::Selector {
                selector: format!("[data-testid={}]", crate::dom::css_quote(id)),
            }),
            Selector::Placeholder(TextMatch::Contains(text)) => Some(Self::Selector {
                selector: format!("[placeholder*={} i]", crate::dom::css_quote(text)),
            }),
            Selector::Placeholder(_) | Selector::Text(_) => None,
        }
    }
}

fn regex_source(m: &TextMatch) -> String {
    match m {
        TextMatch::Contains(s) => regex::escape(&normalize_whitespace(s)),
        TextMatch::Exact(s) => format!("^{}$", regex::escape(&normalize_whitespace(s))),
        TextMatch::Pattern { source, .. } => source.clone(),
    }
}

/// Store key for an action and its target text
#[must_use]
pub fn heal_key(kind: ActionKind, target: &str) -> String {
    format!("{}|{}", kind.as_str(), target.trim().to_lowercase())
}

/// In-memory heal map with an optional JSON file mirror
#[derive(Debug, Clone, Default)]
pub struct HealStore {
    path: Option<PathBuf>,
    entries: BTreeMap<String, HealDescriptor>,
}

impl HealStore {
    /// Store without a backing file
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the store at `path`. Missing or corrupt files yield an empty
    /// store; entries that do not parse are skipped.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_entries(&path);
        debug!(path = %path.display(), entries = entries.len(), "Heal store loaded");
        Self {
            path: Some(path),
            entries,
        }
    }

    /// Backing file, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Persisted descriptor for `(kind, target)`
    #[must_use]
    pub fn get(&self, kind: ActionKind, target: &str) -> Option<&HealDescriptor> {
        self.entries.get(&heal_key(kind, target))
    }

    /// Descriptor by raw key
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<&HealDescriptor> {
        self.entries.get(key)
    }

    /// Record a successful heal (last write wins) and flush
    pub fn record(
        &mut self,
        kind: ActionKind,
        target: &str,
        descriptor: HealDescriptor,
    ) -> SanarResult<()> {
        let key = heal_key(kind, target);
        debug!(key = %key, ?descriptor, "Heal recorded");
        self.entries.insert(key, descriptor);
        self.flush()
    }

    /// Remove one key here and on disk, keeping other writers' entries;
    /// returns whether it existed in either
    pub fn remove(&mut self, key: &str) -> SanarResult<bool> {
        let mut merged = self.path.as_deref().map(read_entries).unwrap_or_default();
        merged.extend(self.entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        let existed = merged.remove(key).is_some();
        if existed {
            self.write_all(&merged)?;
        }
        self.entries = merged;
        Ok(existed)
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &HealDescriptor)> {
        self.entries.iter()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge with the on-disk snapshot and write it back.
    ///
    /// Entries written by other processes since load are kept unless this
    /// process holds the same key.
    pub fn flush(&mut self) -> SanarResult<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let mut merged = read_entries(&path);
        merged.extend(self.entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.write_all(&merged)?;
        self.entries = merged;
        Ok(())
    }

    /// Empty the store in memory and on disk
    pub fn clear(&mut self) -> SanarResult<()> {
        self.entries.clear();
        self.write_all(&BTreeMap::new())
    }

    fn write_all(&self, entries: &BTreeMap<String, HealDescriptor>) -> SanarResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SanarError::heal_store(format!("invalid path {}", path.display())))?;
        let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

fn read_entries(path: &Path) -> BTreeMap<String, HealDescriptor> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Heal store unreadable, starting empty");
            return BTreeMap::new();
        }
    };
    let raw: BTreeMap<String, serde_json::Value> = match serde_json::from_str(&text) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Heal store corrupt, starting empty");
            return BTreeMap::new();
        }
    };
    raw.into_iter()
        .filter_map(|(key, value)| match serde_json::from_value(value) {
            Ok(descriptor) => Some((key, descriptor)),
            Err(e) => {
                debug!(key = %key, error = %e, "Skipping unreadable heal entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn role_submit() -> HealDescriptor {
        HealDescriptor::Role {
            role: "button".to_string(),
            name: Some("submit".to_string()),
        }
    }

    mod descriptor_tests {
        use super::*;

        #[test]
        fn test_serde_shape() {
            let json = serde_json::to_value(role_submit()).unwrap();
            assert_eq!(json, serde_json::json!({"type": "role", "role": "button", "name": "submit"}));
            let label: HealDescriptor =
                serde_json::from_str(r#"{"type":"label","name":"user"}"#).unwrap();
            assert_eq!(label, HealDescriptor::Label { name: "user".into() });
        }

        #[test]
        fn test_unknown_fields_tolerated() {
            let d: HealDescriptor =
                serde_json::from_str(r##"{"type":"selector","selector":"#a","extra":1}"##).unwrap();
            assert_eq!(d, HealDescriptor::Selector { selector: "#a".into() });
        }

        #[test]
        fn test_locator_round_trip_for_role() {
            let locator = role_submit().to_locator();
            assert_eq!(HealDescriptor::from_locator(&locator), Some(role_submit()));
        }

        #[test]
        fn test_refined_locator_not_replayable() {
            assert_eq!(HealDescriptor::from_locator(&Locator::new("li").nth(2)), None);
        }

        #[test]
        fn test_contains_label_escaped() {
            let loc = Locator::from_selector(Selector::Label("e.mail".into()));
            assert_eq!(
                HealDescriptor::from_locator(&loc),
                Some(HealDescriptor::Label { name: r"e\.mail".into() })
            );
        }
    }

    mod store_tests {
        use super::*;

        #[test]
        fn test_key_normalization() {
            assert_eq!(heal_key(ActionKind::Fill, "  UserName "), "fill|username");
        }

        #[test]
        fn test_survives_reload() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("store/heal.json");
            let mut store = HealStore::open(&path);
            store.record(ActionKind::Click, "Submit", role_submit()).unwrap();

            let reloaded = HealStore::open(&path);
            assert_eq!(reloaded.get(ActionKind::Click, "submit "), Some(&role_submit()));
        }

        #[test]
        fn test_corrupt_file_is_empty() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("heal.json");
            fs::write(&path, "{not json").unwrap();
            assert!(HealStore::open(&path).is_empty());
        }

        #[test]
        fn test_bad_entries_skipped() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("heal.json");
            fs::write(
                &path,
                r##"{"click|a": {"type":"selector","selector":"#a"}, "click|b": {"type":"teleport"}, "click|c": 3}"##,
            )
            .unwrap();
            let store = HealStore::open(&path);
            assert_eq!(store.len(), 1);
            assert!(store.get_key("click|a").is_some());
        }

        #[test]
        fn test_last_heal_wins() {
            let mut store = HealStore::in_memory();
            store
                .record(ActionKind::Fill, "user", HealDescriptor::Selector { selector: "#u".into() })
                .unwrap();
            store
                .record(ActionKind::Fill, "USER", HealDescriptor::Label { name: "user".into() })
                .unwrap();
            assert_eq!(store.len(), 1);
            assert_eq!(
                store.get(ActionKind::Fill, "user"),
                Some(&HealDescriptor::Label { name: "user".into() })
            );
        }

        #[test]
        fn test_flush_merges_other_writers() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("heal.json");
            let mut a = HealStore::open(&path);
            let mut b = HealStore::open(&path);
            a.record(ActionKind::Click, "x", HealDescriptor::Selector { selector: "#x".into() })
                .unwrap();
            b.record(ActionKind::Click, "y", HealDescriptor::Selector { selector: "#y".into() })
                .unwrap();
            let reloaded = HealStore::open(&path);
            assert_eq!(reloaded.len(), 2);
        }

        #[test]
        fn test_remove_keeps_other_writers() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("heal.json");
            let mut a = HealStore::open(&path);
            let mut b = HealStore::open(&path);
            a.record(ActionKind::Click, "x", HealDescriptor::Selector { selector: "#x".into() })
                .unwrap();
            b.record(ActionKind::Click, "y", HealDescriptor::Selector { selector: "#y".into() })
                .unwrap();
            assert!(a.remove("click|x").unwrap());
            let reloaded = HealStore::open(&path);
            assert_eq!(reloaded.get(ActionKind::Click, "x"), None);
            assert_eq!(
                reloaded.get(ActionKind::Click, "y"),
                Some(&HealDescriptor::Selector { selector: "#y".into() })
            );
            assert!(!a.remove("click|x").unwrap());
        }

        #[test]
        fn test_remove_key_only_on_disk() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("heal.json");
            let mut a = HealStore::open(&path);
            let mut b = HealStore::open(&path);
            b.record(ActionKind::Fill, "email", HealDescriptor::Selector { selector: "#email".into() })
                .unwrap();
            assert!(a.remove("fill|email").unwrap());
            assert!(HealStore::open(&path).is_empty());
        }

        #[test]
        fn test_in_memory_wins_on_conflict() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("heal.json");
            let mut a = HealStore::open(&path);
            let mut b = HealStore::open(&path);
            a.record(ActionKind::Click, "x", HealDescriptor::Selector { selector: "#old".into() })
                .unwrap();
            b.record(ActionKind::Click, "x", HealDescriptor::Selector { selector: "#new".into() })
                .unwrap();
            assert_eq!(
                HealStore::open(&path).get(ActionKind::Click, "x"),
                Some(&HealDescriptor::Selector { selector: "#new".into() })
            );
        }

        #[test]
        fn test_clear_and_remove() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("heal.json");
            let mut store = HealStore::open(&path);
            store.record(ActionKind::Click, "x", role_submit()).unwrap();
            store.record(ActionKind::Click, "y", role_submit()).unwrap();
            assert!(store.remove("click|x").unwrap());
            assert!(!store.remove("click|x").unwrap());
            assert_eq!(HealStore::open(&path).len(), 1);
            store.clear().unwrap();
            assert!(HealStore::open(&path).is_empty());
            assert!(path.exists());
        }
    }
}
