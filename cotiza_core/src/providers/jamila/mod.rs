//! Jamila (custom storefront).
//!
//! Results are `div.productos-mod` blocks. The search also returns party and
//! household goods, hence the low overlap threshold paired with a block-list
//! of product words.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::parse_pool;
use crate::error::ProviderError;
use crate::price::extract_price_from;
use crate::providers::{card_image, card_link, Blocklist, Candidate, ProductFilter, UrlRule};
use crate::relevance::RelevancePolicy;
use crate::types::Hit;
use crate::utils::{element_text, fetch_text, selector};
use crate::Provider;

pub const ID: &str = "jamila";
pub const DEFAULT_BASE_URL: &str = "https://www.jamila.cl";

pub const BLOCKED_WORDS: &[&str] = &[
    "adorno",
    "cotillon",
    "cumpleaños",
    "fiesta",
    "disfraz",
    "sabanilla",
    "pañal",
    "toalla",
    "servilleta",
    "bolsa",
    "caja",
    "frasco",
    "tarro",
];

static CARD_SEL: Lazy<Selector> = Lazy::new(|| selector("div.productos-mod"));
static LINK_SEL: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static TITLE_SEL: Lazy<Selector> = Lazy::new(|| selector("h2"));
static SALE_PRICE_SELS: Lazy<Vec<Selector>> =
    Lazy::new(|| vec![selector("div.precio-oferta h4"), selector(".precio-oferta")]);

const FILTER: ProductFilter = ProductFilter {
    blocklist: Blocklist::Stems(BLOCKED_WORDS),
    url_rule: UrlRule::Contains(&["/producto-detalle/"]),
    relevance: RelevancePolicy::Threshold(0.3),
    require_evidence: true,
};

pub struct JamilaProvider {
    client: reqwest::Client,
    base: Url,
    filter: ProductFilter,
}

impl JamilaProvider {
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
}

pub fn parse_results(html: &str, base: &Url) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    document
        .select(&CARD_SEL)
        .filter_map(|card| {
            let (url, link_text) = card_link(&card, &LINK_SEL, base)?;
            let title = card
                .select(&TITLE_SEL)
                .next()
                .map(|h2| element_text(&h2))
                .filter(|t| !t.is_empty())
                .unwrap_or(link_text);
            Some(Candidate {
                title,
                url,
                price: extract_price_from(&card, &SALE_PRICE_SELS),
                image_url: card_image(&card, base),
                available: Some(true),
                sku: None,
            })
        })
        .collect()
}

#[async_trait]
impl Provider for JamilaProvider {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "Jamila: office and school supplies"
    }

    fn base_url(&self) -> &str {
        self.base.as_str()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Hit>, ProviderError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}search?q={}", self.base, urlencoding::encode(query));
        let body = fetch_text(&self.client, &url).await?;
        let base = self.base.clone();
        let candidates = parse_pool::parse_page(ID, body, move |html| parse_results(html, &base)).await?;
        debug!(
            target: "cotiza.provider",
            provider = ID,
            candidates = candidates.len(),
            "jamila results parsed"
        );
        Ok(self.filter.apply(ID, query, &self.base, candidates, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_base_url;

    const PAGE: &str = r#"
    <div class="productos-mod">
      <a href="/producto-detalle/4410"><img src="/img/p/4410.jpg"></a>
      <h2>Témpera 12 colores Artel</h2>
      <div class="precio-normal"><h4>$6.990</h4></div>
      <div class="precio-oferta"><h4>$5.260</h4></div>
    </div>
    <div class="productos-mod">
      <a href="/producto-detalle/5120"><img src="/img/p/5120.jpg"></a>
      <h2>Bolsa de regalo colores</h2>
      <div class="precio-oferta"><h4>$990</h4></div>
    </div>
    <div class="productos-mod">
      <a href="/categoria/temperas">Témperas</a>
      <h2>Témperas colores</h2>
    </div>"#;

    #[test]
    fn parses_sale_price_and_title() {
        let base = parse_base_url(DEFAULT_BASE_URL).unwrap();
        let cards = parse_results(PAGE, &base);
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0].title, "Témpera 12 colores Artel");
        assert_eq!(cards[0].url, "https://www.jamila.cl/producto-detalle/4410");
        assert_eq!(cards[0].price, Some(5260));
        assert_eq!(cards[0].image_url.as_deref(), Some("https://www.jamila.cl/img/p/4410.jpg"));
    }

    #[test]
    fn blocks_product_words_and_foreign_urls() {
        let base = parse_base_url(DEFAULT_BASE_URL).unwrap();
        let hits = FILTER.apply(ID, "tempera colores", &base, parse_results(PAGE, &base), 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].price, Some(5260));
    }

    #[test]
    fn low_threshold_accepts_partial_overlap() {
        let base = parse_base_url(DEFAULT_BASE_URL).unwrap();
        let hits = FILTER.apply(
            ID,
            "tempera solida escolar",
            &base,
            parse_results(PAGE, &base),
            5,
        );
        // one of three query tokens
        assert_eq!(hits.len(), 1);
        assert!((hits[0].relevance.unwrap() - 1.0 / 3.0).abs() < 1e-9);
    }
}
