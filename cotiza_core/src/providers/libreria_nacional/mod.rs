//! Librería Nacional (Shopify storefront).

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::parse_pool;
use crate::error::ProviderError;
use crate::price::extract_price_from;
use crate::providers::{
    card_image, card_link, Blocklist, Candidate, ProductFilter, UrlRule, NAVIGATION_PHRASES,
};
use crate::relevance::RelevancePolicy;
use crate::types::Hit;
use crate::utils::{fetch_text, selector};
use crate::Provider;

pub const ID: &str = "libreria_nacional";
pub const DEFAULT_BASE_URL: &str = "https://nacional.cl";

/// Collections searched when the storewide search finds nothing.
pub const FALLBACK_COLLECTIONS: &[&str] = &["escolar", "papeleria"];

static CARD_SEL: Lazy<Selector> =
    Lazy::new(|| selector(".card-wrapper, .product-card-wrapper, .card"));
static PRODUCT_LINK_SEL: Lazy<Selector> = Lazy::new(|| selector(r#"a[href*="/products/"]"#));
static SALE_PRICE_SELS: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        selector(".price-item--sale"),
        selector(".price__sale .price-item"),
    ]
});

const FILTER: ProductFilter = ProductFilter {
    blocklist: Blocklist::Phrases(NAVIGATION_PHRASES),
    url_rule: UrlRule::ProductPage {
        allow_root_slug: false,
    },
    relevance: RelevancePolicy::Threshold(0.5),
    require_evidence: true,
};

pub struct LibreriaNacionalProvider {
    client: reqwest::Client,
    base: Url,
    filter: ProductFilter,
}

impl LibreriaNacionalProvider {
    pub fn new(client: reqwest::Client, base: Url) -> Self {
        Self {
            client,
            base,
            filter: FILTER,
        }
    }

    pub fn with_min_overlap(mut self, min_overlap: Option<f64>) -> Self {
        self.filter = self.filter.with_min_overlap(min_overlap);
        self
    }

    async fn fetch_and_filter(
        &self,
        url: String,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Hit>, ProviderError> {
        let body = fetch_text(&self.client, &url).await?;
        let base = self.base.clone();
        let candidates = parse_pool::parse_page(ID, body, move |html| parse_cards(html, &base)).await?;
        debug!(
            target: "cotiza.provider",
            provider = ID,
            %url,
            candidates = candidates.len(),
            "shopify cards parsed"
        );
        Ok(self.filter.apply(ID, query, &self.base, candidates, limit))
    }
}

/// Collection-scoped product links point at the same product page.
fn canonical_product_url(url: &str) -> String {
    match (url.find("/collections/"), url.find("/products/")) {
        (Some(start), Some(products)) if start < products => {
            format!("{}{}", &url[..start], &url[products..])
        }
        _ => url.to_string(),
    }
}

/// Product cards of a Shopify search or collection page.
pub fn parse_cards(html: &str, base: &Url) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    document
        .select(&CARD_SEL)
        .filter_map(|card| {
            let (url, title) = card_link(&card, &PRODUCT_LINK_SEL, base)?;
            Some(Candidate {
                title,
                url: canonical_product_url(&url),
                price: extract_price_from(&card, &SALE_PRICE_SELS),
                image_url: card_image(&card, base),
                available: Some(true),
                sku: None,
            })
        })
        .collect()
}

#[async_trait]
impl Provider for LibreriaNacionalProvider {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "Librería Nacional: school supplies and books (Shopify search, collection fallback)"
    }

    fn base_url(&self) -> &str {
        self.base.as_str()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Hit>, ProviderError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let encoded = urlencoding::encode(query);

        let hits = self
            .fetch_and_filter(format!("{}search?q={}", self.base, encoded), query, limit)
            .await?;
        if !hits.is_empty() {
            return Ok(hits);
        }

        for collection in FALLBACK_COLLECTIONS {
            let url = format!("{}collections/{}?q={}", self.base, collection, encoded);
            match self.fetch_and_filter(url, query, limit).await {
                Ok(hits) if !hits.is_empty() => return Ok(hits),
                Ok(_) => {}
                Err(err) => {
                    debug!(
                        target: "cotiza.provider",
                        provider = ID,
                        collection,
                        error = %err,
                        "collection fallback failed"
                    );
                }
            }
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_base_url;

    const SEARCH_PAGE: &str = r#"
    <html><body>
      <div class="card-wrapper product-card-wrapper">
        <div class="card">
          <img src="//nacional.cl/cdn/shop/files/cuaderno.jpg?v=1" alt="">
          <a href="/products/cuaderno-universitario-100-hojas">Cuaderno Universitario 100 hojas</a>
          <div class="price">
            <span class="price-item price-item--regular">$2.490</span>
            <span class="price-item price-item--sale">$1.990</span>
          </div>
        </div>
      </div>
      <div class="card">
        <a href="/collections/escolar/products/lapiz-pasta-azul">Lápiz pasta azul</a>
        <span class="price-item">$350</span>
      </div>
      <div class="card"><a href="/pages/contacto">Contacto</a></div>
    </body></html>"#;

    #[test]
    fn parses_cards_and_prefers_sale_price() {
        let base = parse_base_url(DEFAULT_BASE_URL).unwrap();
        let cards = parse_cards(SEARCH_PAGE, &base);
        // wrapper and inner card both match the first product
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0].url, "https://nacional.cl/products/cuaderno-universitario-100-hojas");
        assert_eq!(cards[0].price, Some(1990));
        assert_eq!(
            cards[0].image_url.as_deref(),
            Some("https://nacional.cl/cdn/shop/files/cuaderno.jpg?v=1")
        );
        assert_eq!(cards[2].url, "https://nacional.cl/products/lapiz-pasta-azul");
        assert_eq!(cards[2].price, Some(350));
    }

    #[test]
    fn filter_dedupes_and_scores() {
        let base = parse_base_url(DEFAULT_BASE_URL).unwrap();
        let cards = parse_cards(SEARCH_PAGE, &base);
        let hits = FILTER.apply(ID, "cuaderno universitario", &base, cards, 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].relevance, Some(1.0));
        assert_eq!(hits[0].provider, ID);
    }

    #[test]
    fn canonicalizes_collection_links() {
        assert_eq!(
            canonical_product_url("https://nacional.cl/collections/escolar/products/goma"),
            "https://nacional.cl/products/goma"
        );
        assert_eq!(
            canonical_product_url("https://nacional.cl/products/goma"),
            "https://nacional.cl/products/goma"
        );
    }
}
