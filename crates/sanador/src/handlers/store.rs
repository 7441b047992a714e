//! Store command handler

use std::path::PathBuf;

use sanar::{HealDescriptor, HealStore};
use serde::Serialize;
use tracing::debug;

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{pad, OutputFormat, Reporter};
use crate::{StoreArgs, StoreCommand};

/// One heal as listed
#[derive(Debug, Serialize)]
pub struct StoreRow<'a> {
    /// Store key
    pub key: &'a str,
    /// Stored descriptor
    pub descriptor: &'a HealDescriptor,
    /// Locator the descriptor replays as
    pub locator: String,
}

/// Execute the store command
pub fn execute_store(config: &CliConfig, args: &StoreArgs, reporter: &Reporter) -> CliResult<()> {
    let path = store_path(config, args)?;
    debug!(path = %path.display(), "Opening heal store");
    let mut store = HealStore::open(&path);
    match &args.command {
        StoreCommand::List { format } => {
            reporter.result(&render_list(&store, (*format).into())?);
        }
        StoreCommand::Show { key } => {
            reporter.result(&render_show(&store, key)?);
        }
        StoreCommand::Remove { key } => {
            if !store.remove(key)? {
                return Err(CliError::not_found(format!("no heal stored under '{key}'")));
            }
            reporter.success(&format!("Removed '{key}' from {}", path.display()));
        }
        StoreCommand::Clear => {
            let removed = store.len();
            store.clear()?;
            reporter.success(&format!("Cleared {removed} heal(s) from {}", path.display()));
        }
    }
    Ok(())
}

fn store_path(config: &CliConfig, args: &StoreArgs) -> CliResult<PathBuf> {
    match &args.path {
        Some(path) => Ok(path.clone()),
        None => Ok(config.heal_config()?.heal_store_path),
    }
}

/// Rows in key order
#[must_use]
pub fn rows(store: &HealStore) -> Vec<StoreRow<'_>> {
    store
        .iter()
        .map(|(key, descriptor)| StoreRow {
            key,
            descriptor,
            locator: descriptor.to_locator().to_string(),
        })
        .collect()
}

/// Render every heal as a table or JSON array
pub fn render_list(store: &HealStore, format: OutputFormat) -> CliResult<String> {
    let rows = rows(store);
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(&rows)?);
    }
    if rows.is_empty() {
        return Ok("Heal store is empty".to_string());
    }
    let width = rows.iter().map(|r| r.key.chars().count()).max().unwrap_or(0);
    let mut out = String::new();
    for row in &rows {
        out.push_str(&format!("{}  {}\n", pad(row.key, width), row.locator));
    }
    Ok(out)
}

/// Render one heal as JSON
pub fn render_show(store: &HealStore, key: &str) -> CliResult<String> {
    let descriptor = store
        .get_key(key)
        .ok_or_else(|| CliError::not_found(format!("no heal stored under '{key}'")))?;
    Ok(serde_json::to_string_pretty(&StoreRow {
        key,
        descriptor,
        locator: descriptor.to_locator().to_string(),
    })?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sanar::ActionKind;
    use tempfile::TempDir;

    fn seeded(dir: &TempDir) -> HealStore {
        let mut store = HealStore::open(dir.path().join("heal.json"));
        store
            .record(
                ActionKind::Fill,
                "username",
                HealDescriptor::Selector {
                    selector: "[name=\"username\"]".into(),
                },
            )
            .unwrap();
        store
            .record(
                ActionKind::Click,
                "log in",
                HealDescriptor::Role {
                    role: "button".into(),
                    name: Some("log in".into()),
                },
            )
            .unwrap();
        store
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_list_text() {
            let dir = TempDir::new().unwrap();
            let text = render_list(&seeded(&dir), OutputFormat::Text).unwrap();
            let lines: Vec<&str> = text.lines().collect();
            assert_eq!(lines.len(), 2);
            assert!(lines[0].starts_with("click|log in"));
            assert!(lines[1].starts_with("fill|username"));
            assert!(lines[1].contains("locator('[name=\"username\"]')"));
        }

        #[test]
        fn test_list_json() {
            let dir = TempDir::new().unwrap();
            let json = render_list(&seeded(&dir), OutputFormat::Json).unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value.as_array().unwrap().len(), 2);
            assert_eq!(value[1]["key"], "fill|username");
            assert_eq!(value[1]["descriptor"]["type"], "selector");
        }

        #[test]
        fn test_empty_list() {
            let text = render_list(&HealStore::in_memory(), OutputFormat::Text).unwrap();
            assert_eq!(text, "Heal store is empty");
        }

        #[test]
        fn test_show_missing_key() {
            let dir = TempDir::new().unwrap();
            let store = seeded(&dir);
            assert!(render_show(&store, "fill|username").unwrap().contains("selector"));
            assert!(matches!(
                render_show(&store, "click|nothing"),
                Err(CliError::NotFound { .. })
            ));
        }
    }

    mod execute_tests {
        use super::*;

        #[test]
        fn test_remove_and_clear() {
            let dir = TempDir::new().unwrap();
            seeded(&dir);
            let path = dir.path().join("heal.json");
            let reporter = Reporter::new(false, true);
            let config = CliConfig::new();

            let remove = StoreArgs {
                path: Some(path.clone()),
                command: StoreCommand::Remove {
                    key: "fill|username".into(),
                },
            };
            execute_store(&config, &remove, &reporter).unwrap();
            assert_eq!(HealStore::open(&path).len(), 1);
            assert!(execute_store(&config, &remove, &reporter).is_err());

            let clear = StoreArgs {
                path: Some(path.clone()),
                command: StoreCommand::Clear,
            };
            execute_store(&config, &clear, &reporter).unwrap();
            assert!(HealStore::open(&path).is_empty());
        }
    }
}
