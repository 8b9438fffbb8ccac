//! Dimeiggs (VTEX storefront).
//!
//! Search goes through the `suggestionProducts` persisted GraphQL query,
//! which only returns relevant products but often omits prices. Hits without
//! a price are priced by SKU against the catalog search endpoint.

use async_trait::async_trait;
use base64::Engine as _;
use futures::future::join_all;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::error::ProviderError;
use crate::providers::{Candidate, ProductFilter};
use crate::types::Hit;
use crate::utils::{absolutize, fetch_text};
use crate::Provider;

mod types;
pub use types::{CatalogProduct, SuggestionResponse, VtexProduct};

pub const ID: &str = "dimeiggs";
pub const DEFAULT_BASE_URL: &str = "https://www.dimeiggs.cl";

const GRAPHQL_PATH: &str = "_v/segment/graphql/v1";
const CATALOG_SEARCH_PATH: &str = "api/catalog_system/pub/products/search";
const OPERATION: &str = "suggestionProducts";
const PERSISTED_QUERY_HASH: &str =
    "704c20442c5227eb5d8c75bfd410cb86d3b07c1fc719fbd960239f04586728e0";
const SEARCH_APP: &str = "vtex.search@1.x";

pub struct DimeiggsProvider {
    client: reqwest::Client,
    base: Url,
    filter: ProductFilter,
}

impl DimeiggsProvider {
    pub fn new(client: reqwest::Client, base: Url) -> Self {
        Self {
            client,
            base,
            filter: ProductFilter::unfiltered(),
        }
    }

    /// `extensions` parameter: the persisted query reference plus the real
    /// variables, base64-encoded.
    fn extensions(term: &str) -> String {
        let variables = json!({
            "term": term,
            "productOrigin": "BIGGY",
            "indexingType": "API",
        });
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(variables.to_string().as_bytes());
        json!({
            "persistedQuery": {
                "version": 1,
                "sha256Hash": PERSISTED_QUERY_HASH,
                "sender": SEARCH_APP,
                "provider": SEARCH_APP,
            },
            "variables": encoded,
        })
        .to_string()
    }

    async fn suggestions(&self, term: &str) -> Result<Vec<VtexProduct>, ProviderError> {
        let url = self
            .base
            .join(GRAPHQL_PATH)
            .map_err(|e| ProviderError::Config(e.to_string()))?;
        let extensions = Self::extensions(term);
        let response = self
            .client
            .get(url.clone())
            .query(&[
                ("workspace", "master"),
                ("maxAge", "short"),
                ("appsEtag", "remove"),
                ("domain", "store"),
                ("locale", "es-CL"),
                ("operationName", OPERATION),
                ("variables", "{}"),
                ("extensions", extensions.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text().await?;
        let parsed: SuggestionResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_products())
    }

    fn to_candidate(&self, product: &VtexProduct) -> Option<Candidate> {
        let title = product.title()?.to_string();
        let url = match product.slug() {
            Some(slug) => absolutize(&self.base, &format!("{}/p", slug.trim_matches('/')))?,
            None => absolutize(&self.base, product.url.as_deref()?)?,
        };
        Some(Candidate {
            title,
            url,
            price: product.price(),
            image_url: product
                .image_url()
                .and_then(|src| absolutize(&self.base, src)),
            available: product.availability(),
            sku: product.sku(),
        })
    }

    /// Look up the selling price of one SKU.
    pub async fn price_by_sku(&self, sku: &str) -> Result<Option<u64>, ProviderError> {
        let url = format!(
            "{}{}?FT={}&_from=0&_to=5",
            self.base,
            CATALOG_SEARCH_PATH,
            urlencoding::encode(sku)
        );
        let body = fetch_text(&self.client, &url).await?;
        let products: Vec<CatalogProduct> = serde_json::from_str(&body)?;
        Ok(products.first().and_then(CatalogProduct::price))
    }

    async fn fill_missing_prices(&self, hits: &mut [Hit]) {
        let lookups = hits.iter().enumerate().filter_map(|(idx, hit)| {
            match (hit.price, hit.sku.as_deref()) {
                (None, Some(sku)) => Some(async move { (idx, sku, self.price_by_sku(sku).await) }),
                _ => None,
            }
        });
        let results: Vec<(usize, String, Result<Option<u64>, ProviderError>)> = join_all(lookups)
            .await
            .into_iter()
            .map(|(idx, sku, res)| (idx, sku.to_string(), res))
            .collect();

        for (idx, sku, result) in results {
            match result {
                Ok(price) => hits[idx].price = price,
                Err(err) => {
                    warn!(
                        target: "cotiza.provider",
                        provider = ID,
                        sku = %sku,
                        error = %err,
                        "sku price lookup failed"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl Provider for DimeiggsProvider {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "Dimeiggs: office and school supplies (VTEX search suggestions + SKU pricing)"
    }

    fn base_url(&self) -> &str {
        self.base.as_str()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Hit>, ProviderError> {
        let term = query.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let products = self.suggestions(term).await?;
        let candidates = products
            .iter()
            .filter_map(|p| self.to_candidate(p))
            .collect();
        let mut hits = self.filter.apply(ID, term, &self.base, candidates, limit);

        let unpriced = hits.iter().filter(|h| h.price.is_none()).count();
        debug!(
            target: "cotiza.provider",
            provider = ID,
            products = products.len(),
            hits = hits.len(),
            unpriced,
            "dimeiggs suggestions parsed"
        );
        if unpriced > 0 {
            self.fill_missing_prices(&mut hits).await;
        }
        Ok(hits)
    }
}
