//! Runtime settings.
//!
//! Settings are read from TOML at `~/.config/cotiza/config.toml` (or a path
//! given by the caller). A missing file means built-in defaults; a few values
//! can be overridden from the environment.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ============================================================================
// Default Values
// ============================================================================

/// Default per-store timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Default cap on concurrently running store searches
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Default hits requested from each store
pub const DEFAULT_LIMIT_PER_PROVIDER: usize = 5;

/// Default hits kept after merging
pub const DEFAULT_MAX_RESULTS: usize = 15;

/// Default line items quoted at the same time
pub const DEFAULT_ITEM_CONCURRENCY: usize = 4;

/// Default hits kept per line item
pub const DEFAULT_QUOTE_MAX_RESULTS: usize = 8;

/// Top-hit relevance below which a line item is reported as `no_match`
pub const DEFAULT_MIN_RELEVANCE: f64 = 0.01;

/// Stores queried when the caller names none
pub const DEFAULT_PROVIDERS: &[&str] = &[
    "dimeiggs",
    "libreria_nacional",
    "jamila",
    "coloranimal",
    "pronobel",
    "prisa",
    "lasecretaria",
];

pub const ENV_TIMEOUT_MS: &str = "COTIZA_TIMEOUT_MS";
pub const ENV_MAX_CONCURRENCY: &str = "COTIZA_MAX_CONCURRENCY";
pub const ENV_USER_AGENT: &str = "COTIZA_USER_AGENT";

// ============================================================================
// Sections
// ============================================================================

/// `[engine]`: single-query aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_limit_per_provider")]
    pub limit_per_provider: usize,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_providers")]
    pub default_providers: Vec<String>,

    /// Overrides the built-in browser user agent for every store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Threads parsing store pages; sized from the CPU count when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_threads: Option<usize>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_limit_per_provider() -> usize {
    DEFAULT_LIMIT_PER_PROVIDER
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_providers() -> Vec<String> {
    DEFAULT_PROVIDERS.iter().map(|s| s.to_string()).collect()
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            limit_per_provider: DEFAULT_LIMIT_PER_PROVIDER,
            max_results: DEFAULT_MAX_RESULTS,
            default_providers: default_providers(),
            user_agent: None,
            parse_threads: None,
        }
    }
}

/// `[quoting]`: batch quoting of order line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotingSettings {
    #[serde(default = "default_item_concurrency")]
    pub item_concurrency: usize,

    #[serde(default = "default_limit_per_provider")]
    pub limit_per_provider: usize,

    #[serde(default = "default_quote_max_results")]
    pub max_results: usize,

    #[serde(default = "default_min_relevance")]
    pub min_relevance: f64,
}

fn default_item_concurrency() -> usize {
    DEFAULT_ITEM_CONCURRENCY
}

fn default_quote_max_results() -> usize {
    DEFAULT_QUOTE_MAX_RESULTS
}

fn default_min_relevance() -> f64 {
    DEFAULT_MIN_RELEVANCE
}

impl Default for QuotingSettings {
    fn default() -> Self {
        Self {
            item_concurrency: DEFAULT_ITEM_CONCURRENCY,
            limit_per_provider: DEFAULT_LIMIT_PER_PROVIDER,
            max_results: DEFAULT_QUOTE_MAX_RESULTS,
            min_relevance: DEFAULT_MIN_RELEVANCE,
        }
    }
}

/// `[providers.<id>]`: per-store overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Disabled stores are left out of the registry (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Relevance threshold for stores that filter their results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_overlap: Option<f64>,

    /// HTTP timeout for this store's client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            min_overlap: None,
            timeout_ms: None,
            user_agent: None,
        }
    }
}

/// `[plans.<name>]`: local mirror of a subscription tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSettings {
    /// Maximum line items per order (unbounded when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,

    /// Maximum stores per query (unbounded when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_providers: Option<usize>,

    /// Stores used when the caller names none
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_providers: Vec<String>,
}

impl PlanSettings {
    pub fn new(max_items: Option<usize>, max_providers: Option<usize>) -> Self {
        Self {
            max_items,
            max_providers,
            default_providers: Vec::new(),
        }
    }
}

// ============================================================================
// Built-in Plans
// ============================================================================

/// Name of the plan applied to anonymous callers.
pub const DEMO_PLAN: &str = "demo";

static BUILTIN_PLANS: Lazy<BTreeMap<String, PlanSettings>> = Lazy::new(|| {
    let mut plans = BTreeMap::new();
    plans.insert(DEMO_PLAN.to_string(), PlanSettings::new(Some(5), Some(2)));
    plans.insert("free".to_string(), PlanSettings::new(Some(5), Some(2)));
    plans.insert("basic".to_string(), PlanSettings::new(Some(100), Some(10)));
    plans.insert("pro".to_string(), PlanSettings::new(None, None));
    plans
});

// ============================================================================
// Settings
// ============================================================================

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub quoting: QuotingSettings,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub providers: BTreeMap<String, ProviderSettings>,

    /// User-defined plans; built-ins fill in the rest
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub plans: BTreeMap<String, PlanSettings>,
}

impl Settings {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("cotiza").join("config.toml")
    }

    /// Load settings from `path` (or the default location) and apply
    /// environment overrides. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let mut settings = Self::from_file(&path)?;
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read a TOML file without looking at the environment.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::TomlSerialize)
    }

    /// Write these settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Apply `COTIZA_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.engine.timeout_ms = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{ENV_TIMEOUT_MS}={raw}")))?;
        }
        if let Some(raw) = lookup(ENV_MAX_CONCURRENCY) {
            self.engine.max_concurrency = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{ENV_MAX_CONCURRENCY}={raw}")))?;
        }
        if let Some(ua) = lookup(ENV_USER_AGENT).filter(|s| !s.trim().is_empty()) {
            self.engine.user_agent = Some(ua);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.quoting.item_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "quoting.item_concurrency must be at least 1".to_string(),
            ));
        }
        if self.engine.parse_threads == Some(0) {
            return Err(ConfigError::Invalid(
                "engine.parse_threads must be at least 1".to_string(),
            ));
        }
        if self.engine.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "engine.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-store overrides, or the defaults when the store has no section.
    pub fn provider(&self, id: &str) -> ProviderSettings {
        self.providers.get(id).cloned().unwrap_or_default()
    }

    /// Look up a plan. User plans shadow built-ins of the same name.
    pub fn plan(&self, name: &str) -> Option<PlanSettings> {
        self.plans
            .get(name)
            .or_else(|| BUILTIN_PLANS.get(name))
            .cloned()
    }

    /// Names of every known plan (user + built-in), sorted.
    pub fn plan_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .plans
            .keys()
            .chain(BUILTIN_PLANS.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Effective user agent for a store.
    pub fn user_agent_for(&self, id: &str) -> String {
        self.providers
            .get(id)
            .and_then(|p| p.user_agent.clone())
            .or_else(|| self.engine.user_agent.clone())
            .unwrap_or_else(|| crate::utils::DEFAULT_USER_AGENT.to_string())
    }

    /// Effective HTTP timeout for a store.
    pub fn timeout_ms_for(&self, id: &str) -> u64 {
        self.providers
            .get(id)
            .and_then(|p| p.timeout_ms)
            .unwrap_or(self.engine.timeout_ms)
    }
}

/// Errors from loading or writing settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    TomlSerialize(toml::ser::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.engine.timeout_ms, 15_000);
        assert_eq!(settings.engine.max_concurrency, 10);
        assert_eq!(settings.quoting.item_concurrency, 4);
        assert_eq!(settings.quoting.max_results, 8);
        assert_eq!(settings.engine.default_providers.len(), 7);
        assert!(settings.provider("jamila").enabled);
    }

    #[test]
    fn test_partial_file() {
        let settings = Settings::from_toml(
            r#"
            [engine]
            timeout_ms = 5000

            [providers.prisa]
            enabled = false

            [providers.jamila]
            min_overlap = 0.4
            base_url = "http://127.0.0.1:8080"
            "#,
        )
        .unwrap();
        assert_eq!(settings.engine.timeout_ms, 5000);
        assert_eq!(settings.engine.max_results, DEFAULT_MAX_RESULTS);
        assert!(!settings.provider("prisa").enabled);
        assert_eq!(settings.provider("jamila").min_overlap, Some(0.4));
        assert_eq!(settings.timeout_ms_for("jamila"), 5000);
    }

    #[test]
    fn test_builtin_and_user_plans() {
        let mut settings = Settings::default();
        assert_eq!(settings.plan("demo"), Some(PlanSettings::new(Some(5), Some(2))));
        assert_eq!(settings.plan("pro"), Some(PlanSettings::new(None, None)));
        assert!(settings.plan("gold").is_none());

        settings
            .plans
            .insert("demo".into(), PlanSettings::new(Some(3), Some(1)));
        assert_eq!(settings.plan("demo").unwrap().max_items, Some(3));
        assert_eq!(settings.plan_names(), vec!["basic", "demo", "free", "pro"]);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_TIMEOUT_MS, "2500"),
            (ENV_MAX_CONCURRENCY, "3"),
            (ENV_USER_AGENT, "cotiza-test/1.0"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.engine.timeout_ms, 2500);
        assert_eq!(settings.engine.max_concurrency, 3);
        assert_eq!(settings.user_agent_for("dimeiggs"), "cotiza-test/1.0");

        let err = Settings::default()
            .apply_env(|k| (k == ENV_TIMEOUT_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        settings.engine.max_concurrency = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut settings = Settings::default();
        settings.providers.insert(
            "jamila".into(),
            ProviderSettings {
                min_overlap: Some(0.35),
                ..ProviderSettings::default()
            },
        );
        let text = settings.to_toml().unwrap();
        let parsed = Settings::from_toml(&text).unwrap();
        assert_eq!(parsed.provider("jamila").min_overlap, Some(0.35));
        assert_eq!(parsed.engine.default_providers, settings.engine.default_providers);
    }
}
