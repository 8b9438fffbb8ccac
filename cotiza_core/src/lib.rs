// src/lib.rs
pub mod config;
pub mod engine;
pub mod error;
pub mod parse_pool;
pub mod plans;
pub mod price;
pub mod providers;
pub mod quoting;
pub mod relevance;
pub mod text;
pub mod types;
pub mod utils;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use crate::config::{ProviderSettings, Settings};
use crate::error::ProviderError;
use crate::providers::cards::{CardStoreProvider, PRISA, PRONOBEL};
use crate::providers::dimeiggs::DimeiggsProvider;
use crate::providers::jamila::JamilaProvider;
use crate::providers::libreria_nacional::LibreriaNacionalProvider;
use crate::providers::prestashop::{PrestaShopProvider, COLORANIMAL, LA_SECRETARIA};
use crate::providers::unavailable::{self, UnavailableProvider};

pub use crate::engine::{AggregationEngine, EngineConfig, SearchRequest};
pub use crate::plans::{PlanLimits, PlanLimitsSource, StaticPlans};
pub use crate::quoting::{LineItem, OrderQuote, QuotingPipeline};
pub use crate::types::{AggregatedResult, AggregationStatus, Hit, ProviderOutcome};

/// One external store behind a uniform search capability.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable store id used in requests and results (e.g. `"jamila"`).
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn base_url(&self) -> &str;

    /// Whether searches can succeed at all.
    fn available(&self) -> bool {
        true
    }

    /// Search the store and return at most `limit` screened hits.
    ///
    /// An empty query returns no hits without touching the network.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Hit>, ProviderError>;
}

/// Catalogue entry for listing registered stores.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub description: String,
    pub base_url: String,
    pub available: bool,
}

pub struct ProviderRegistry {
    pub providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry {
            providers: HashMap::new(),
        }
    }

    pub fn register_provider(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn get_provider(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    /// Registered stores, sorted by id.
    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        let mut infos: Vec<ProviderInfo> = self
            .providers
            .values()
            .map(|p| ProviderInfo {
                id: p.id().to_string(),
                description: p.description().to_string(),
                base_url: p.base_url().to_string(),
                available: p.available(),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client, base URL and overrides for one store.
struct StoreSetup {
    client: reqwest::Client,
    base: Url,
    overrides: ProviderSettings,
}

fn store_setup(settings: &Settings, id: &str, default_base: &str) -> Result<StoreSetup, ProviderError> {
    let overrides = settings.provider(id);
    let base = utils::parse_base_url(overrides.base_url.as_deref().unwrap_or(default_base))?;
    let client = utils::build_client(
        &settings.user_agent_for(id),
        Duration::from_millis(settings.timeout_ms_for(id)),
    )?;
    Ok(StoreSetup {
        client,
        base,
        overrides,
    })
}

/// Build a registry with every store enabled in `settings`.
///
/// Each store gets its own long-lived HTTP client.
pub fn build_registry(settings: &Settings) -> Result<ProviderRegistry, ProviderError> {
    parse_pool::configure(settings.engine.parse_threads)?;
    let mut registry = ProviderRegistry::new();
    let enabled = |id: &str| settings.provider(id).enabled;

    if enabled(providers::dimeiggs::ID) {
        let s = store_setup(settings, providers::dimeiggs::ID, providers::dimeiggs::DEFAULT_BASE_URL)?;
        registry.register_provider(Arc::new(DimeiggsProvider::new(s.client, s.base)));
    }

    if enabled(providers::libreria_nacional::ID) {
        let s = store_setup(
            settings,
            providers::libreria_nacional::ID,
            providers::libreria_nacional::DEFAULT_BASE_URL,
        )?;
        registry.register_provider(Arc::new(
            LibreriaNacionalProvider::new(s.client, s.base).with_min_overlap(s.overrides.min_overlap),
        ));
    }

    if enabled(providers::jamila::ID) {
        let s = store_setup(settings, providers::jamila::ID, providers::jamila::DEFAULT_BASE_URL)?;
        registry.register_provider(Arc::new(
            JamilaProvider::new(s.client, s.base).with_min_overlap(s.overrides.min_overlap),
        ));
    }

    for store in [&COLORANIMAL, &LA_SECRETARIA] {
        if enabled(store.id) {
            let s = store_setup(settings, store.id, store.default_base_url)?;
            registry.register_provider(Arc::new(PrestaShopProvider::new(store, s.client, s.base)));
        }
    }

    for store in [&PRONOBEL, &PRISA] {
        if enabled(store.id) {
            let s = store_setup(settings, store.id, store.default_base_url)?;
            registry.register_provider(Arc::new(
                CardStoreProvider::new(store, s.client, s.base)
                    .with_min_overlap(s.overrides.min_overlap),
            ));
        }
    }

    for store in unavailable::ALL {
        if enabled(store.id) {
            registry.register_provider(Arc::new(UnavailableProvider::new(store)));
        }
    }

    Ok(registry)
}
