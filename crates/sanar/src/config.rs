//! Healing configuration.
//!
//! Loaded from `sanar.yaml`; every field is optional and falls back to the
//! defaults below.
//!
//! ```yaml
//! heal_store_path: .sanar/heal-store.json
//! action_timeout_ms: 5000
//! navigation:
//!   timeout_ms: 30000
//!   retries: 2
//!   wait_until: load
//! highlight:
//!   enabled: false
//! oracle:
//!   base_url: http://localhost:11434
//!   model: qwen2.5-coder
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audit::DEFAULT_AUDIT_LOG_PATH;
use crate::heal_store::DEFAULT_HEAL_STORE_PATH;
use crate::navigation::NavigateOptions;
use crate::patcher::DEFAULT_RECEIVER;
use crate::repair::{ModelConfig, DEFAULT_ELEMENT_CAP};
use crate::result::{SanarError, SanarResult};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "sanar.yaml";

/// Default per-action timeout
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 5_000;

/// Default highlight pause
pub const DEFAULT_HIGHLIGHT_MS: u64 = 300;

/// Visual highlight applied before proxied actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// Whether to highlight at all
    pub enabled: bool,
    /// Pause after highlighting, in milliseconds
    pub duration_ms: u64,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_ms: DEFAULT_HIGHLIGHT_MS,
        }
    }
}

/// Repair oracle endpoint and model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// OpenAI-compatible server; no oracle when unset
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Snapshot elements included in the prompt
    pub element_cap: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        let model = ModelConfig::default();
        Self {
            base_url: None,
            api_key_env: None,
            model: model.model,
            temperature: model.temperature,
            max_tokens: model.max_tokens,
            element_cap: DEFAULT_ELEMENT_CAP,
        }
    }
}

impl OracleConfig {
    /// Model parameters for the heal client
    #[must_use]
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// API key read from the configured environment variable
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty())
    }
}

/// Configuration for resolution, proxying and patching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealConfig {
    /// Heal store file
    pub heal_store_path: PathBuf,
    /// Healed-step audit log
    pub audit_log_path: PathBuf,
    /// Timeout for each element action
    pub action_timeout_ms: u64,
    /// Navigation strategy and retries
    pub navigation: NavigateOptions,
    /// Visual highlight
    pub highlight: HighlightConfig,
    /// Repair oracle
    pub oracle: OracleConfig,
    /// Persist successful heals to the store
    pub persist_heals: bool,
    /// Rewrite failing source lines after a repair
    pub patch_sources: bool,
    /// Receiver identifier used in patched source
    pub page_ident: String,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            heal_store_path: PathBuf::from(DEFAULT_HEAL_STORE_PATH),
            audit_log_path: PathBuf::from(DEFAULT_AUDIT_LOG_PATH),
            action_timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            navigation: NavigateOptions::default(),
            highlight: HighlightConfig::default(),
            oracle: OracleConfig::default(),
            persist_heals: true,
            patch_sources: true,
            page_ident: DEFAULT_RECEIVER.to_string(),
        }
    }
}

impl HealConfig {
    /// Create a default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML and validate
    pub fn from_yaml(text: &str) -> SanarResult<Self> {
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn load(path: &Path) -> SanarResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            SanarError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Load from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> SanarResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> SanarResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Reject values that cannot work
    pub fn validate(&self) -> SanarResult<()> {
        if self.action_timeout_ms == 0 {
            return Err(SanarError::config("action_timeout_ms must be positive"));
        }
        if self.navigation.timeout_ms == 0 {
            return Err(SanarError::config("navigation.timeout_ms must be positive"));
        }
        if self.oracle.element_cap == 0 {
            return Err(SanarError::config("oracle.element_cap must be positive"));
        }
        let ident_ok = self
            .page_ident
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
            && self
                .page_ident
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_');
        if !ident_ok {
            return Err(SanarError::config(format!(
                "page_ident '{}' is not an identifier",
                self.page_ident
            )));
        }
        Ok(())
    }

    /// Set the heal store path
    #[must_use]
    pub fn with_heal_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.heal_store_path = path.into();
        self
    }

    /// Set the audit log path
    #[must_use]
    pub fn with_audit_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_log_path = path.into();
        self
    }

    /// Set the action timeout
    #[must_use]
    pub const fn with_action_timeout_ms(mut self, ms: u64) -> Self {
        self.action_timeout_ms = ms;
        self
    }

    /// Set navigation options
    #[must_use]
    pub const fn with_navigation(mut self, navigation: NavigateOptions) -> Self {
        self.navigation = navigation;
        self
    }

    /// Enable or disable the highlight
    #[must_use]
    pub const fn with_highlight(mut self, enabled: bool) -> Self {
        self.highlight.enabled = enabled;
        self
    }

    /// Set the oracle section
    #[must_use]
    pub fn with_oracle(mut self, oracle: OracleConfig) -> Self {
        self.oracle = oracle;
        self
    }

    /// Enable or disable heal persistence
    #[must_use]
    pub const fn with_persist_heals(mut self, persist: bool) -> Self {
        self.persist_heals = persist;
        self
    }

    /// Enable or disable source patching
    #[must_use]
    pub const fn with_patch_sources(mut self, patch: bool) -> Self {
        self.patch_sources = patch;
        self
    }

    /// Set the receiver identifier for patches
    #[must_use]
    pub fn with_page_ident(mut self, ident: impl Into<String>) -> Self {
        self.page_ident = ident.into();
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::wait::LoadState;
    use tempfile::TempDir;

    mod default_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = HealConfig::default();
            assert_eq!(config.heal_store_path, PathBuf::from(".sanar/heal-store.json"));
            assert_eq!(config.audit_log_path, PathBuf::from("healed-steps.json"));
            assert_eq!(config.action_timeout_ms, 5000);
            assert_eq!(config.navigation.timeout_ms, 30_000);
            assert_eq!(config.navigation.retries, 2);
            assert_eq!(config.navigation.wait_until, LoadState::Load);
            assert!(config.highlight.enabled);
            assert_eq!(config.highlight.duration_ms, 300);
            assert!(config.oracle.temperature.abs() < f64::EPSILON);
            assert_eq!(config.oracle.max_tokens, 512);
            assert_eq!(config.oracle.element_cap, 50);
            assert!(config.persist_heals);
            assert!(config.patch_sources);
            assert_eq!(config.page_ident, "page");
        }

        #[test]
        fn test_builders() {
            let config = HealConfig::new()
                .with_action_timeout_ms(100)
                .with_highlight(false)
                .with_persist_heals(false)
                .with_patch_sources(false)
                .with_page_ident("tab")
                .with_heal_store_path("/tmp/h.json");
            assert_eq!(config.action_timeout_ms, 100);
            assert!(!config.highlight.enabled);
            assert!(!config.persist_heals);
            assert!(!config.patch_sources);
            assert_eq!(config.page_ident, "tab");
            assert_eq!(config.heal_store_path, PathBuf::from("/tmp/h.json"));
        }
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = HealConfig::from_yaml(
                "action_timeout_ms: 750\nnavigation:\n  wait_until: networkidle\noracle:\n  base_url: http://localhost:11434\n  model: coder\n",
            )
            .unwrap();
            assert_eq!(config.action_timeout_ms, 750);
            assert_eq!(config.navigation.wait_until, LoadState::NetworkIdle);
            assert_eq!(config.navigation.retries, 2);
            assert_eq!(config.oracle.base_url.as_deref(), Some("http://localhost:11434"));
            assert_eq!(config.oracle.model_config().model, "coder");
            assert_eq!(config.oracle.max_tokens, 512);
        }

        #[test]
        fn test_empty_yaml_is_default() {
            assert_eq!(HealConfig::from_yaml("").unwrap(), HealConfig::default());
        }

        #[test]
        fn test_round_trip_through_file() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join(DEFAULT_CONFIG_FILE);
            let config = HealConfig::new().with_action_timeout_ms(1234);
            fs::write(&path, config.to_yaml().unwrap()).unwrap();
            assert_eq!(HealConfig::load(&path).unwrap(), config);
        }

        #[test]
        fn test_missing_file_defaults() {
            let dir = TempDir::new().unwrap();
            let config = HealConfig::load_or_default(&dir.path().join("none.yaml")).unwrap();
            assert_eq!(config, HealConfig::default());
            assert!(HealConfig::load(&dir.path().join("none.yaml")).is_err());
        }

        #[test]
        fn test_validation() {
            assert!(HealConfig::from_yaml("action_timeout_ms: 0").is_err());
            assert!(HealConfig::from_yaml("page_ident: '1page'").is_err());
            assert!(HealConfig::from_yaml("oracle:\n  element_cap: 0").is_err());
            assert!(matches!(
                HealConfig::from_yaml("navigation: [1, 2]"),
                Err(SanarError::Yaml(_))
            ));
        }

        #[test]
        fn test_api_key_from_env() {
            let oracle = OracleConfig {
                api_key_env: Some("SANAR_TEST_KEY_THAT_IS_NOT_SET".into()),
                ..OracleConfig::default()
            };
            assert_eq!(oracle.api_key(), None);
        }
    }
}
