//! Core types for aggregated price search results.

use serde::{Deserialize, Serialize};

/// A candidate product offer returned by one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Product title as shown by the store
    pub title: String,

    /// Absolute URL of the product page
    pub url: String,

    /// Price in whole CLP (no decimals)
    pub price: Option<u64>,

    /// Absolute image URL
    pub image_url: Option<String>,

    /// Stock flag when the store exposes one
    pub available: Option<bool>,

    /// Store id that produced this hit
    pub provider: String,

    /// Overlap ratio against the query, attached by the store or the engine
    pub relevance: Option<f64>,

    /// Store-side product identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

impl Hit {
    /// Create a hit with the required fields.
    pub fn new(
        provider: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            price: None,
            image_url: None,
            available: None,
            provider: provider.into(),
            relevance: None,
            sku: None,
        }
    }

    pub fn with_price(mut self, price: Option<u64>) -> Self {
        self.price = price;
        self
    }

    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    pub fn with_available(mut self, available: Option<bool>) -> Self {
        self.available = available;
        self
    }

    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance = Some(relevance.clamp(0.0, 1.0));
        self
    }

    pub fn with_sku(mut self, sku: Option<String>) -> Self {
        self.sku = sku;
        self
    }

    /// Relevance used for ranking; unscored hits rank last.
    pub fn rank_relevance(&self) -> f64 {
        self.relevance.unwrap_or(0.0)
    }

    /// Price used for ranking; a missing price sorts after every real one.
    pub fn rank_price(&self) -> u64 {
        self.price.unwrap_or(u64::MAX)
    }
}

/// What one dispatched store produced for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub provider: String,

    /// Always empty when `error` is set
    pub hits: Vec<Hit>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub is_timeout: bool,

    /// Time taken by this store (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ProviderOutcome {
    pub fn ok(provider: impl Into<String>, hits: Vec<Hit>, duration_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            hits,
            error: None,
            is_timeout: false,
            duration_ms: Some(duration_ms),
        }
    }

    /// A failed outcome. Hits gathered before the failure are not kept.
    pub fn failed(
        provider: impl Into<String>,
        error: impl Into<String>,
        is_timeout: bool,
        duration_ms: Option<u64>,
    ) -> Self {
        Self {
            provider: provider.into(),
            hits: Vec::new(),
            error: Some(error.into()),
            is_timeout,
            duration_ms,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// `(provider, error)` pair. Serialized as a two-element JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure(pub String, pub String);

impl ProviderFailure {
    pub fn provider(&self) -> &str {
        &self.0
    }

    pub fn error(&self) -> &str {
        &self.1
    }
}

/// Overall status of one aggregation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStatus {
    Ok,
    Partial,
    NoResults,
    Error,
}

impl AggregationStatus {
    /// Status from the merged hit count and the failure tally.
    ///
    /// `error` needs at least one dispatched store, all of them failed and no
    /// hits. With no hits otherwise the status is `no_results`, even when some
    /// stores failed.
    pub fn derive(hit_count: usize, failed: usize, dispatched: usize) -> Self {
        if hit_count == 0 && dispatched > 0 && failed == dispatched {
            AggregationStatus::Error
        } else if hit_count == 0 {
            AggregationStatus::NoResults
        } else if failed > 0 {
            AggregationStatus::Partial
        } else {
            AggregationStatus::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationStatus::Ok => "ok",
            AggregationStatus::Partial => "partial",
            AggregationStatus::NoResults => "no_results",
            AggregationStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for AggregationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete result of fanning one query out to several stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResult {
    /// The search query
    pub query: String,

    pub status: AggregationStatus,

    /// Stores that were actually dispatched, in dispatch order
    pub providers_queried: Vec<String>,

    /// Stores that failed, in dispatch order
    #[serde(default)]
    pub providers_failed: Vec<ProviderFailure>,

    /// Ranked hits, at most `max_results`
    pub hits: Vec<Hit>,

    /// Summary message when the status is `error`
    pub error: Option<String>,

    /// Total time taken (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Whether a plan cap reduced the requested stores
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub was_limited: bool,

    /// Requested store count before the plan cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_provider_count: Option<usize>,
}

impl AggregatedResult {
    /// Result for a call that dispatched nothing.
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            status: AggregationStatus::NoResults,
            providers_queried: Vec::new(),
            providers_failed: Vec::new(),
            hits: Vec::new(),
            error: None,
            duration_ms: None,
            was_limited: false,
            original_provider_count: None,
        }
    }

    /// Record a plan cap on the requested store list.
    pub fn with_limit(mut self, original_provider_count: usize) -> Self {
        self.was_limited = true;
        self.original_provider_count = Some(original_provider_count);
        self
    }

    /// Best-ranked hit, if any.
    pub fn top_hit(&self) -> Option<&Hit> {
        self.hits.first()
    }

    pub fn has_errors(&self) -> bool {
        !self.providers_failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_rules() {
        assert_eq!(AggregationStatus::derive(3, 0, 2), AggregationStatus::Ok);
        assert_eq!(AggregationStatus::derive(3, 1, 2), AggregationStatus::Partial);
        assert_eq!(AggregationStatus::derive(0, 2, 2), AggregationStatus::Error);
        assert_eq!(AggregationStatus::derive(0, 0, 2), AggregationStatus::NoResults);
        // some failed, the rest found nothing
        assert_eq!(AggregationStatus::derive(0, 1, 2), AggregationStatus::NoResults);
        assert_eq!(AggregationStatus::derive(0, 0, 0), AggregationStatus::NoResults);
    }

    #[test]
    fn failed_outcome_has_no_hits() {
        let outcome = ProviderOutcome::failed("jamila", "timeout after 15000ms", true, None);
        assert!(outcome.is_failure());
        assert!(outcome.hits.is_empty());
        assert!(outcome.is_timeout);
    }

    #[test]
    fn hit_builder_clamps_relevance() {
        let hit = Hit::new("dimeiggs", "Lápiz", "https://example.cl/lapiz/p")
            .with_price(Some(990))
            .with_relevance(1.7);
        assert_eq!(hit.relevance, Some(1.0));
        assert_eq!(hit.rank_price(), 990);
        assert_eq!(Hit::new("a", "b", "c").rank_price(), u64::MAX);
    }

    #[test]
    fn aggregated_result_wire_shape() {
        let mut result = AggregatedResult::empty("goma");
        result.providers_queried = vec!["jamila".into(), "prisa".into()];
        result
            .providers_failed
            .push(ProviderFailure("prisa".into(), "timeout after 15000ms".into()));

        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["status"], "no_results");
        assert_eq!(v["providers_failed"], json!([["prisa", "timeout after 15000ms"]]));
        assert_eq!(v["hits"], json!([]));
        assert!(v["error"].is_null());
        assert!(v.get("was_limited").is_none());

        let limited = AggregatedResult::empty("goma").with_limit(7);
        let v = serde_json::to_value(&limited).unwrap();
        assert_eq!(v["was_limited"], true);
        assert_eq!(v["original_provider_count"], 7);
    }
}
