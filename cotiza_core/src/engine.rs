//! Aggregation engine.
//!
//! Fans one query out to several stores concurrently, collects every outcome
//! (hits or failure) and merges them into a single ranked result.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{
    EngineSettings, Settings, DEFAULT_LIMIT_PER_PROVIDER, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_MAX_RESULTS, DEFAULT_PROVIDERS, DEFAULT_TIMEOUT_MS,
};
use crate::error::{ProviderError, QuoteError};
use crate::plans::{normalize_ids, select_providers, PlanLimits};
use crate::relevance::overlap_tokens;
use crate::text;
use crate::types::{AggregatedResult, AggregationStatus, Hit, ProviderFailure, ProviderOutcome};
use crate::{build_registry, Provider, ProviderRegistry};

/// Summary message of a call where every store failed.
pub const ALL_FAILED_MESSAGE: &str = "all providers failed";

/// Tunables of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Per-store timeout (ms)
    pub timeout_ms: u64,
    /// Upper bound on stores searched at once
    pub max_concurrency: usize,
    pub limit_per_provider: usize,
    pub max_results: usize,
    /// Stores queried when a request names none
    pub default_providers: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            limit_per_provider: DEFAULT_LIMIT_PER_PROVIDER,
            max_results: DEFAULT_MAX_RESULTS,
            default_providers: DEFAULT_PROVIDERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<&EngineSettings> for EngineConfig {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            timeout_ms: settings.timeout_ms,
            max_concurrency: settings.max_concurrency,
            limit_per_provider: settings.limit_per_provider,
            max_results: settings.max_results,
            default_providers: settings.default_providers.clone(),
        }
    }
}

/// Single-query aggregation request, as received from a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,

    /// Store ids; `None` or empty selects the defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_per_provider: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_providers(mut self, providers: Option<Vec<String>>) -> Self {
        self.providers = providers;
        self
    }
}

/// Engine for searching several stores at once.
#[derive(Clone)]
pub struct AggregationEngine {
    registry: Arc<ProviderRegistry>,
    config: EngineConfig,
}

impl AggregationEngine {
    pub fn new(registry: Arc<ProviderRegistry>, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    /// Engine over every store enabled in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, ProviderError> {
        let registry = build_registry(settings)?;
        Ok(Self::new(
            Arc::new(registry),
            EngineConfig::from(&settings.engine),
        ))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Answer a caller request, applying the plan's store cap if one is given.
    ///
    /// An empty query is the only hard error.
    pub async fn handle(
        &self,
        request: &SearchRequest,
        plan: Option<&PlanLimits>,
    ) -> Result<AggregatedResult, QuoteError> {
        if request.query.trim().is_empty() {
            return Err(QuoteError::EmptyQuery);
        }
        let selection = select_providers(
            request.providers.as_deref(),
            plan,
            &self.config.default_providers,
        );
        let result = self
            .aggregate(
                &request.query,
                &selection.providers,
                request
                    .limit_per_provider
                    .unwrap_or(self.config.limit_per_provider),
                request.max_results.unwrap_or(self.config.max_results),
            )
            .await;
        Ok(if selection.was_limited {
            result.with_limit(selection.original_count)
        } else {
            result
        })
    }

    /// Search `provider_ids` for `query` and return the merged, ranked hits.
    ///
    /// Unknown ids are ignored. An empty query dispatches nothing and yields
    /// an empty `no_results` result. Never fails: store failures end up in
    /// `providers_failed`.
    pub async fn aggregate(
        &self,
        query: &str,
        provider_ids: &[String],
        limit_per_provider: usize,
        max_results: usize,
    ) -> AggregatedResult {
        let start = Instant::now();
        let query = query.trim();
        if query.is_empty() {
            debug!(target: "cotiza.engine", "empty query, nothing dispatched");
            return AggregatedResult::empty(query);
        }

        let providers: Vec<Arc<dyn Provider>> = normalize_ids(provider_ids)
            .iter()
            .filter_map(|id| {
                let provider = self.registry.get_provider(id);
                if provider.is_none() {
                    debug!(target: "cotiza.engine", provider = %id, "unknown provider ignored");
                }
                provider
            })
            .collect();

        let outcomes = self.dispatch(query, &providers, limit_per_provider).await;
        let mut result = merge_outcomes(query, outcomes, max_results);
        let elapsed_ms = start.elapsed().as_millis() as u64;
        result.duration_ms = Some(elapsed_ms);

        info!(
            target: "cotiza.engine",
            query = %query,
            status = %result.status,
            providers = result.providers_queried.len(),
            failed = result.providers_failed.len(),
            hits = result.hits.len(),
            elapsed_ms,
            "aggregation finished"
        );
        result
    }

    /// One task per store, at most `max_concurrency` searching at once.
    ///
    /// Outcomes arrive over a channel in completion order and are slotted
    /// back into dispatch order.
    async fn dispatch(
        &self,
        query: &str,
        providers: &[Arc<dyn Provider>],
        limit: usize,
    ) -> Vec<ProviderOutcome> {
        if providers.is_empty() {
            return Vec::new();
        }

        let width = providers.len().min(self.config.max_concurrency.max(1));
        let permits = Arc::new(Semaphore::new(width));
        let (tx, mut rx) = mpsc::channel::<(usize, ProviderOutcome)>(providers.len());
        let timeout_ms = self.config.timeout_ms;

        for (idx, provider) in providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let permits = Arc::clone(&permits);
            let tx = tx.clone();
            let query = query.to_string();
            tokio::spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => run_provider(provider.as_ref(), &query, limit, timeout_ms).await,
                    Err(_) => ProviderOutcome::failed(provider.id(), "dispatch closed", false, None),
                };
                // The receiver only goes away if the caller was dropped.
                let _ = tx.send((idx, outcome)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<ProviderOutcome>> = vec![None; providers.len()];
        while let Some((idx, outcome)) = rx.recv().await {
            slots[idx] = Some(outcome);
        }

        slots
            .into_iter()
            .zip(providers)
            .map(|(slot, provider)| {
                slot.unwrap_or_else(|| {
                    warn!(target: "cotiza.engine", provider = provider.id(), "provider task panicked");
                    ProviderOutcome::failed(provider.id(), "provider task panicked", false, None)
                })
            })
            .collect()
    }
}

/// Run one store search under the per-store timeout.
///
/// This is the only place store errors become `(provider, message)` pairs.
async fn run_provider(
    provider: &dyn Provider,
    query: &str,
    limit: usize,
    timeout_ms: u64,
) -> ProviderOutcome {
    let start = Instant::now();
    let id = provider.id();
    let result = timeout(Duration::from_millis(timeout_ms), provider.search(query, limit)).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(mut hits)) => {
            hits.truncate(limit);
            debug!(target: "cotiza.provider", provider = id, hits = hits.len(), elapsed_ms, "search done");
            ProviderOutcome::ok(id, hits, elapsed_ms)
        }
        Ok(Err(err)) => {
            warn!(
                target: "cotiza.provider",
                provider = id,
                code = err.code_str(),
                error = %err,
                elapsed_ms,
                "search failed"
            );
            ProviderOutcome::failed(id, err.to_string(), err.is_timeout(), Some(elapsed_ms))
        }
        Err(_) => {
            warn!(target: "cotiza.provider", provider = id, timeout_ms, "search timed out");
            ProviderOutcome::failed(
                id,
                format!("timeout after {}ms", timeout_ms),
                true,
                Some(elapsed_ms),
            )
        }
    }
}

/// Sort by relevance (highest first), then by price (cheapest first).
///
/// The sort is stable: equal hits keep their dispatch order.
pub fn rank_hits(hits: &mut [Hit]) {
    hits.sort_by(|a, b| {
        b.rank_relevance()
            .total_cmp(&a.rank_relevance())
            .then_with(|| a.rank_price().cmp(&b.rank_price()))
    });
}

/// Fold outcomes (in dispatch order) into one result.
pub fn merge_outcomes(
    query: &str,
    outcomes: Vec<ProviderOutcome>,
    max_results: usize,
) -> AggregatedResult {
    let query_tokens = text::normalize(query);
    let dispatched = outcomes.len();
    let mut providers_queried = Vec::with_capacity(dispatched);
    let mut providers_failed = Vec::new();
    let mut hits = Vec::new();

    for outcome in outcomes {
        providers_queried.push(outcome.provider.clone());
        match outcome.error {
            Some(error) => providers_failed.push(ProviderFailure(outcome.provider, error)),
            None => hits.extend(outcome.hits),
        }
    }

    for hit in &mut hits {
        let relevance = hit
            .relevance
            .unwrap_or_else(|| overlap_tokens(&query_tokens, &text::normalize(&hit.title)));
        hit.relevance = Some(relevance.clamp(0.0, 1.0));
    }

    rank_hits(&mut hits);
    hits.truncate(max_results);

    let status = AggregationStatus::derive(hits.len(), providers_failed.len(), dispatched);
    AggregatedResult {
        query: query.to_string(),
        status,
        providers_queried,
        providers_failed,
        hits,
        error: (status == AggregationStatus::Error).then(|| ALL_FAILED_MESSAGE.to_string()),
        duration_ms: None,
        was_limited: false,
        original_provider_count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed {
        id: &'static str,
        hits: Vec<(u64, f64)>,
    }

    #[async_trait]
    impl Provider for Fixed {
        fn id(&self) -> &'static str {
            self.id
        }

        fn description(&self) -> &'static str {
            "fixed"
        }

        fn base_url(&self) -> &str {
            "https://fixed.test/"
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Hit>, ProviderError> {
            Ok(self
                .hits
                .iter()
                .map(|(price, rel)| {
                    Hit::new(self.id, format!("item {price}"), format!("https://fixed.test/{price}"))
                        .with_price(Some(*price))
                        .with_relevance(*rel)
                })
                .collect())
        }
    }

    struct Broken(&'static str);

    #[async_trait]
    impl Provider for Broken {
        fn id(&self) -> &'static str {
            self.0
        }

        fn description(&self) -> &'static str {
            "broken"
        }

        fn base_url(&self) -> &str {
            "https://broken.test/"
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Hit>, ProviderError> {
            Err(ProviderError::Parse("unexpected markup".into()))
        }
    }

    fn engine(providers: Vec<Arc<dyn Provider>>) -> AggregationEngine {
        let mut registry = ProviderRegistry::new();
        for p in providers {
            registry.register_provider(p);
        }
        AggregationEngine::new(Arc::new(registry), EngineConfig::default())
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_price_ranks_last_among_ties() {
        let mut hits = vec![
            Hit::new("a", "x", "u1").with_relevance(0.5),
            Hit::new("a", "x", "u2").with_relevance(0.5).with_price(Some(900)),
            Hit::new("a", "x", "u3").with_relevance(0.9).with_price(Some(5000)),
        ];
        rank_hits(&mut hits);
        let urls: Vec<&str> = hits.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(urls, vec!["u3", "u2", "u1"]);
    }

    #[test]
    fn merge_attaches_relevance() {
        let outcome = ProviderOutcome::ok(
            "a",
            vec![
                Hit::new("a", "Cuaderno Rojo", "u1"),
                Hit::new("a", "Carpeta Azul Oficio", "u2"),
            ],
            3,
        );
        let result = merge_outcomes("carpeta azul", vec![outcome], 10);
        assert_eq!(result.status, AggregationStatus::Ok);
        assert_eq!(result.hits[0].url, "u2");
        assert_eq!(result.hits[0].relevance, Some(1.0));
        assert_eq!(result.hits[1].relevance, Some(0.0));
    }

    #[test]
    fn failures_with_no_hits_are_no_results() {
        let result = merge_outcomes(
            "lapiz",
            vec![
                ProviderOutcome::ok("a", Vec::new(), 1),
                ProviderOutcome::failed("b", "boom", false, None),
            ],
            10,
        );
        assert_eq!(result.status, AggregationStatus::NoResults);
        assert!(result.error.is_none());
        assert!(result.has_errors());
        assert_eq!(result.providers_failed, vec![ProviderFailure("b".into(), "boom".into())]);
    }

    #[tokio::test]
    async fn unknown_ids_are_ignored() {
        let engine = engine(vec![Arc::new(Fixed {
            id: "a",
            hits: vec![(1000, 0.9)],
        })]);
        let result = engine
            .aggregate("goma", &ids(&["A", "nope", "a"]), 5, 10)
            .await;
        assert_eq!(result.providers_queried, ids(&["a"]));
        assert_eq!(result.status, AggregationStatus::Ok);
        assert!(result.duration_ms.is_some());
    }

    #[tokio::test]
    async fn every_store_failing_is_an_error() {
        let engine = engine(vec![Arc::new(Broken("a")), Arc::new(Broken("b"))]);
        let result = engine.aggregate("goma", &ids(&["a", "b"]), 5, 10).await;
        assert_eq!(result.status, AggregationStatus::Error);
        assert_eq!(result.error.as_deref(), Some(ALL_FAILED_MESSAGE));
        assert!(result.hits.is_empty());
        assert_eq!(result.providers_failed[0].provider(), "a");
        assert!(result.providers_failed[0].error().contains("unexpected markup"));
    }

    #[tokio::test]
    async fn empty_query_dispatches_nothing() {
        let engine = engine(vec![Arc::new(Broken("a"))]);
        let result = engine.aggregate("   ", &ids(&["a"]), 5, 10).await;
        assert_eq!(result.status, AggregationStatus::NoResults);
        assert!(result.providers_queried.is_empty());

        let err = engine.handle(&SearchRequest::new(" "), None).await.unwrap_err();
        assert_eq!(err.code_str(), "empty_query");
    }

    #[tokio::test]
    async fn plan_cap_is_flagged() {
        let engine = engine(vec![
            Arc::new(Fixed { id: "a", hits: vec![(1000, 0.9)] }),
            Arc::new(Fixed { id: "b", hits: vec![(900, 0.9)] }),
            Arc::new(Fixed { id: "c", hits: vec![(800, 0.9)] }),
        ]);
        let plan = PlanLimits {
            max_providers: Some(2),
            ..PlanLimits::default()
        };
        let request = SearchRequest::new("goma").with_providers(Some(ids(&["a", "b", "c"])));
        let result = engine.handle(&request, Some(&plan)).await.unwrap();
        assert!(result.was_limited);
        assert_eq!(result.original_provider_count, Some(3));
        assert_eq!(result.providers_queried, ids(&["a", "b"]));
        assert_eq!(result.hits[0].price, Some(900));
    }
}
