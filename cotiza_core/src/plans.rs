//! Plan tiers: caps on line items and stores, and default store choice.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{PlanSettings, Settings, DEMO_PLAN};

/// Plan applied when a caller names a plan nobody knows.
pub const FALLBACK_PLAN: &str = "free";

/// Stores used by default on plans allowing fewer than five stores.
pub const CORE_PROVIDERS: &[&str] = &["dimeiggs", "libreria_nacional"];

/// Stores used by default on plans allowing five stores or more.
pub const EXTENDED_PROVIDERS: &[&str] = &[
    "dimeiggs",
    "libreria_nacional",
    "jamila",
    "coloranimal",
    "pronobel",
];

/// Limits of one plan. `None` means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanLimits {
    #[serde(default)]
    pub max_items: Option<usize>,

    #[serde(default)]
    pub max_providers: Option<usize>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_providers: Vec<String>,
}

impl PlanLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Stores to query when the caller names none.
    pub fn default_providers(&self, configured: &[String]) -> Vec<String> {
        if !self.default_providers.is_empty() {
            return self.default_providers.clone();
        }
        match self.max_providers {
            None => configured.to_vec(),
            Some(max) => {
                let base = if max >= EXTENDED_PROVIDERS.len() {
                    EXTENDED_PROVIDERS
                } else {
                    CORE_PROVIDERS
                };
                base.iter().take(max).map(|s| s.to_string()).collect()
            }
        }
    }
}

impl From<PlanSettings> for PlanLimits {
    fn from(plan: PlanSettings) -> Self {
        Self {
            max_items: plan.max_items,
            max_providers: plan.max_providers,
            default_providers: plan.default_providers,
        }
    }
}

/// Source of plan limits for a caller.
pub trait PlanLimitsSource: Send + Sync {
    /// Limits for `user`; `None` is an anonymous (demo) caller.
    fn get_limits(&self, user: Option<&str>) -> PlanLimits;
}

/// Plans from local settings, keyed by plan name.
#[derive(Debug, Clone)]
pub struct StaticPlans {
    plans: BTreeMap<String, PlanLimits>,
}

impl StaticPlans {
    pub fn from_settings(settings: &Settings) -> Self {
        let plans = settings
            .plan_names()
            .into_iter()
            .filter_map(|name| settings.plan(&name).map(|p| (name, PlanLimits::from(p))))
            .collect();
        Self { plans }
    }
}

impl PlanLimitsSource for StaticPlans {
    fn get_limits(&self, user: Option<&str>) -> PlanLimits {
        let name = user.unwrap_or(DEMO_PLAN);
        self.plans
            .get(name)
            .or_else(|| self.plans.get(FALLBACK_PLAN))
            .cloned()
            .unwrap_or_default()
    }
}

/// Stores chosen for one request, after defaults and plan caps.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSelection {
    pub providers: Vec<String>,
    pub was_limited: bool,
    /// Requested store count before the cap
    pub original_count: usize,
}

/// Normalize requested store ids: trimmed, lowercased, first occurrence kept.
pub fn normalize_ids(ids: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim().to_lowercase();
        if !id.is_empty() && !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Parse a comma-separated store list. Blank input means "none requested".
pub fn parse_provider_csv(csv: &str) -> Option<Vec<String>> {
    let ids = normalize_ids(&csv.split(',').map(str::to_string).collect::<Vec<_>>());
    (!ids.is_empty()).then_some(ids)
}

/// Pick the stores for a request and apply the plan's store cap.
pub fn select_providers(
    requested: Option<&[String]>,
    limits: Option<&PlanLimits>,
    configured_defaults: &[String],
) -> ProviderSelection {
    let chosen = match requested.map(normalize_ids).filter(|ids| !ids.is_empty()) {
        Some(ids) => ids,
        None => match limits {
            Some(limits) => limits.default_providers(configured_defaults),
            None => normalize_ids(configured_defaults),
        },
    };

    let original_count = chosen.len();
    match limits.and_then(|l| l.max_providers) {
        Some(max) if original_count > max => ProviderSelection {
            providers: chosen.into_iter().take(max).collect(),
            was_limited: true,
            original_count,
        },
        _ => ProviderSelection {
            providers: chosen,
            was_limited: false,
            original_count,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PROVIDERS;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn anonymous_callers_get_demo_limits() {
        let plans = StaticPlans::from_settings(&Settings::default());
        let demo = plans.get_limits(None);
        assert_eq!(demo.max_items, Some(5));
        assert_eq!(demo.max_providers, Some(2));
        assert_eq!(plans.get_limits(Some("pro")), PlanLimits::unlimited());
        // unknown plan falls back to free
        assert_eq!(plans.get_limits(Some("gold")).max_items, Some(5));
    }

    #[test]
    fn requested_list_is_capped() {
        let limits = PlanLimits {
            max_providers: Some(2),
            ..PlanLimits::default()
        };
        let requested = ids(&["Jamila", "prisa", "jamila", "pronobel"]);
        let selection = select_providers(Some(&requested), Some(&limits), &[]);
        assert_eq!(selection.providers, ids(&["jamila", "prisa"]));
        assert!(selection.was_limited);
        assert_eq!(selection.original_count, 3);
    }

    #[test]
    fn defaults_follow_plan_size() {
        let configured = ids(DEFAULT_PROVIDERS);
        let small = PlanLimits {
            max_providers: Some(2),
            ..PlanLimits::default()
        };
        let selection = select_providers(None, Some(&small), &configured);
        assert_eq!(selection.providers, ids(CORE_PROVIDERS));
        assert!(!selection.was_limited);

        let medium = PlanLimits {
            max_providers: Some(10),
            ..PlanLimits::default()
        };
        assert_eq!(
            select_providers(None, Some(&medium), &configured).providers,
            ids(EXTENDED_PROVIDERS)
        );

        let unlimited = select_providers(None, Some(&PlanLimits::unlimited()), &configured);
        assert_eq!(unlimited.providers.len(), 7);
        assert_eq!(select_providers(None, None, &configured).providers.len(), 7);
    }

    #[test]
    fn csv_parsing() {
        assert_eq!(parse_provider_csv(" Dimeiggs, jamila ,,"), Some(ids(&["dimeiggs", "jamila"])));
        assert_eq!(parse_provider_csv(" , "), None);
    }
}
