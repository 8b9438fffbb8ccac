//! Item quoting pipeline.
//!
//! Runs the aggregation engine once per line item of an order, picks the
//! best hit, computes line totals and folds them into an order resume.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::QuotingSettings;
use crate::engine::AggregationEngine;
use crate::error::QuoteError;
use crate::plans::{select_providers, PlanLimitsSource};
use crate::text;
use crate::types::{AggregatedResult, AggregationStatus, Hit};

pub const CURRENCY: &str = "CLP";

/// Kind of line item, as reported by the parsing collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    /// Physical supply; quotable
    #[serde(alias = "util", alias = "utiles")]
    Supply,
    /// Book or reading-list entry; never quoted
    #[serde(alias = "lectura", alias = "libro")]
    Reading,
    #[serde(other)]
    Other,
}

/// One parsed line item. Unknown fields are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, alias = "detalle")]
    pub detail: Option<String>,

    /// Raw quantity; anything that is not a positive number counts as 1
    #[serde(default, alias = "cantidad", skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Value>,

    #[serde(default, alias = "tipo", skip_serializing_if = "Option::is_none")]
    pub category: Option<ItemCategory>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemsDocument {
    List(Vec<LineItem>),
    Wrapped { items: Vec<LineItem> },
}

impl LineItem {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::default()
        }
    }

    pub fn with_quantity(mut self, quantity: impl Into<Value>) -> Self {
        self.quantity = Some(quantity.into());
        self
    }

    pub fn with_category(mut self, category: ItemCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Parse a JSON or YAML list of items, bare or under an `items` key.
    pub fn parse_list(content: &str) -> Result<Vec<LineItem>, QuoteError> {
        let document: ItemsDocument = match serde_json::from_str(content) {
            Ok(doc) => doc,
            Err(json_err) => serde_yaml::from_str(content).map_err(|yaml_err| {
                QuoteError::InvalidItems(format!(
                    "neither JSON ({json_err}) nor YAML ({yaml_err})"
                ))
            })?,
        };
        Ok(match document {
            ItemsDocument::List(items) | ItemsDocument::Wrapped { items } => items,
        })
    }

    /// Trimmed detail, if any.
    pub fn query(&self) -> Option<&str> {
        self.detail.as_deref().map(str::trim).filter(|d| !d.is_empty())
    }

    /// Quantity used for totals: positive numbers are truncated, the rest is 1.
    pub fn effective_quantity(&self) -> u64 {
        let whole = |f: f64| (f.is_finite() && f >= 1.0).then_some(f as u64);
        let parsed = match &self.quantity {
            Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().and_then(whole)),
            Some(Value::String(s)) => {
                let s = s.trim();
                s.parse::<u64>()
                    .ok()
                    .or_else(|| s.replace(',', ".").parse::<f64>().ok().and_then(whole))
            }
            _ => None,
        };
        parsed.filter(|q| *q > 0).unwrap_or(1)
    }

    /// Books and reading-list entries; explicit category wins over text.
    pub fn is_reading(&self) -> bool {
        match self.category {
            Some(ItemCategory::Reading) => true,
            Some(_) => false,
            None => self
                .detail
                .as_deref()
                .is_some_and(|d| text::fold(d).contains("lectura")),
        }
    }
}

/// Outcome of quoting one line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    /// Priced; every store answered
    Ok,
    /// Priced; some stores failed, so the comparison is incomplete
    OkWithPrice,
    /// Not quotable (reading-list entry)
    Skip,
    /// Nothing to search, or no store had a hit
    NotFound,
    /// Hits exist but the best one shares nothing with the item
    NoMatch,
    /// The best hit has no price
    NoPrice,
    /// Every store failed
    Error,
}

impl QuoteStatus {
    pub fn is_priced(&self) -> bool {
        matches!(self, QuoteStatus::Ok | QuoteStatus::OkWithPrice)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Ok => "ok",
            QuoteStatus::OkWithPrice => "ok_with_price",
            QuoteStatus::Skip => "skip",
            QuoteStatus::NotFound => "not_found",
            QuoteStatus::NoMatch => "no_match",
            QuoteStatus::NoPrice => "no_price",
            QuoteStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `quote` object attached to a line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemQuote {
    pub status: QuoteStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_total: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_hit: Option<Hit>,

    /// Full aggregation behind this quote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<AggregatedResult>,
}

impl ItemQuote {
    fn without_search(status: QuoteStatus, reason: &str) -> Self {
        Self {
            status,
            reason: Some(reason.to_string()),
            unit_price: None,
            line_total: None,
            best_hit: None,
            search: None,
        }
    }

    /// Quote for `quantity` units from one aggregation result.
    ///
    /// Only the first ranked hit is considered; a missing price there is
    /// `no_price` even when later hits carry one.
    pub fn from_result(result: AggregatedResult, quantity: u64, min_relevance: f64) -> Self {
        let mut quote = Self {
            status: QuoteStatus::NotFound,
            reason: None,
            unit_price: None,
            line_total: None,
            best_hit: None,
            search: None,
        };

        match (result.status, result.top_hit().cloned()) {
            (AggregationStatus::Error, _) => {
                quote.status = QuoteStatus::Error;
                quote.reason = result.error.clone();
            }
            (_, None) => {
                quote.reason = Some("no store returned a matching product".into());
            }
            (_, Some(best)) if best.rank_relevance() < min_relevance => {
                quote.status = QuoteStatus::NoMatch;
                quote.reason = Some("no result matches the item".into());
            }
            (_, Some(best)) => match best.price {
                None => {
                    quote.status = QuoteStatus::NoPrice;
                    quote.reason = Some("best result has no price".into());
                    quote.best_hit = Some(best);
                }
                Some(price) => {
                    quote.status = if result.status == AggregationStatus::Partial {
                        QuoteStatus::OkWithPrice
                    } else {
                        QuoteStatus::Ok
                    };
                    quote.unit_price = Some(price);
                    quote.line_total = Some(price.saturating_mul(quantity));
                    quote.best_hit = Some(best);
                }
            },
        }
        quote.search = Some(result);
        quote
    }
}

/// A line item with its quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemQuote {
    #[serde(flatten)]
    pub item: LineItem,

    pub quote: ItemQuote,
}

/// Order-level summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderResume {
    pub items_total: usize,
    pub items_priced: usize,
    pub items_missing: usize,
    pub total_items_qty: u64,
    /// Sum of priced line totals (CLP)
    pub subtotal: u64,
    pub currency: String,
    pub providers_used: Vec<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub was_limited: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_provider_count: Option<usize>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub items_limit_applied: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items_found: Option<usize>,
}

impl OrderResume {
    /// Fold quotes into totals. Skipped items count towards neither priced
    /// nor missing.
    pub fn from_quotes(quotes: &[LineItemQuote], providers_used: Vec<String>) -> Self {
        let mut resume = Self {
            items_total: quotes.len(),
            currency: CURRENCY.to_string(),
            providers_used,
            ..Self::default()
        };
        for line in quotes {
            resume.total_items_qty = resume
                .total_items_qty
                .saturating_add(line.item.effective_quantity());
            match (line.quote.status, line.quote.line_total) {
                (QuoteStatus::Skip, _) => {}
                (status, Some(total)) if status.is_priced() => {
                    resume.subtotal = resume.subtotal.saturating_add(total);
                    resume.items_priced += 1;
                }
                _ => resume.items_missing += 1,
            }
        }
        resume
    }
}

/// Every quoted item plus the resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderQuote {
    pub items: Vec<LineItemQuote>,
    pub resume: OrderResume,
    pub generated_at: DateTime<Utc>,
}

/// Quotes whole orders against the engine.
pub struct QuotingPipeline {
    engine: AggregationEngine,
    settings: QuotingSettings,
    plans: Arc<dyn PlanLimitsSource>,
}

impl QuotingPipeline {
    pub fn new(
        engine: AggregationEngine,
        settings: QuotingSettings,
        plans: Arc<dyn PlanLimitsSource>,
    ) -> Self {
        Self {
            engine,
            settings,
            plans,
        }
    }

    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    /// Quote a single item against `providers`.
    pub async fn quote_item(&self, item: LineItem, providers: &[String]) -> LineItemQuote {
        if item.is_reading() {
            return LineItemQuote {
                item,
                quote: ItemQuote::without_search(QuoteStatus::Skip, "reading list entry"),
            };
        }
        let Some(query) = item.query().map(str::to_string) else {
            return LineItemQuote {
                item,
                quote: ItemQuote::without_search(QuoteStatus::NotFound, "no detail to search"),
            };
        };

        let result = self
            .engine
            .aggregate(
                &query,
                providers,
                self.settings.limit_per_provider,
                self.settings.max_results,
            )
            .await;
        let quote = ItemQuote::from_result(
            result,
            item.effective_quantity(),
            self.settings.min_relevance,
        );
        debug!(
            target: "cotiza.quoting",
            query = %query,
            status = %quote.status,
            unit_price = ?quote.unit_price,
            "item quoted"
        );
        LineItemQuote { item, quote }
    }

    /// Quote an order for `user` (`None` is an anonymous caller).
    ///
    /// The plan caps both the item list and the store list; either cap is
    /// flagged in the resume. Items are quoted concurrently but returned in
    /// input order.
    pub async fn quote_order(
        &self,
        items: Vec<LineItem>,
        providers: Option<&[String]>,
        user: Option<&str>,
    ) -> OrderQuote {
        let limits = self.plans.get_limits(user);
        let total_items_found = items.len();
        let mut items = items;
        let items_limit_applied = match limits.max_items {
            Some(max) if items.len() > max => {
                items.truncate(max);
                true
            }
            _ => false,
        };

        let selection = select_providers(
            providers,
            Some(&limits),
            &self.engine.config().default_providers,
        );
        let provider_ids = selection.providers.clone();

        let quotes: Vec<LineItemQuote> = stream::iter(items)
            .map(|item| self.quote_item(item, &provider_ids))
            .buffered(self.settings.item_concurrency.max(1))
            .collect()
            .await;

        let mut resume = OrderResume::from_quotes(&quotes, selection.providers);
        if selection.was_limited {
            resume.was_limited = true;
            resume.original_provider_count = Some(selection.original_count);
        }
        if items_limit_applied {
            resume.items_limit_applied = true;
            resume.total_items_found = Some(total_items_found);
        }

        info!(
            target: "cotiza.quoting",
            items = resume.items_total,
            priced = resume.items_priced,
            missing = resume.items_missing,
            subtotal = resume.subtotal,
            "order quoted"
        );

        OrderQuote {
            items: quotes,
            resume,
            generated_at: Utc::now(),
        }
    }
}
