//! Storefronts without a stable theme (Pronobel, Prisa).
//!
//! Any `div`/`article` whose class looks like a product card is a candidate.
//! The markup also wraps menus, banners and social links that way, so these
//! stores get the strictest screening: navigation block-list, product URL
//! shape, 0.5 overlap and a price or image as evidence.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::parse_pool;
use crate::error::ProviderError;
use crate::price::extract_price_from;
use crate::providers::{
    card_image, Blocklist, Candidate, ProductFilter, UrlRule, NAVIGATION_PHRASES,
};
use crate::relevance::RelevancePolicy;
use crate::types::Hit;
use crate::utils::{absolutize, element_text, fetch_text, selector};
use crate::Provider;

static CARD_SEL: Lazy<Selector> = Lazy::new(|| {
    selector(
        r#"article, div[class*="product"], div[class*="item"], div[class*="result"],
           div[class*="article"], div[class*="card"]"#,
    )
});
static LINK_SEL: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static TITLE_SEL: Lazy<Selector> = Lazy::new(|| {
    selector(
        r#"h2[class*="title"], h2[class*="name"], h2[class*="producto"],
           h3[class*="title"], h3[class*="name"], h3[class*="producto"],
           span[class*="title"], span[class*="name"], span[class*="producto"]"#,
    )
});

/// What differs between two generic-card stores.
#[derive(Debug)]
pub struct CardStore {
    pub id: &'static str,
    pub description: &'static str,
    pub default_base_url: &'static str,
    /// Search path relative to the base URL; `{q}` is the encoded query
    pub search_path: &'static str,
    /// Products live at `/<slug>` as well as under product paths
    pub allow_root_slug: bool,
    /// Marker of an anti-bot page this client does not solve
    pub challenge_marker: Option<&'static str>,
}

pub static PRONOBEL: CardStore = CardStore {
    id: "pronobel",
    description: "Pronobel: school supplies",
    default_base_url: "https://www.pronobel.cl",
    search_path: "search?q={q}",
    allow_root_slug: false,
    challenge_marker: None,
};

pub static PRISA: CardStore = CardStore {
    id: "prisa",
    description: "Prisa: school and office supplies",
    default_base_url: "https://www.prisa.cl",
    search_path: "product/search?search={q}",
    allow_root_slug: true,
    challenge_marker: Some("slowAES.decrypt"),
};

impl CardStore {
    pub const fn filter(&self) -> ProductFilter {
        ProductFilter {
            blocklist: Blocklist::Phrases(NAVIGATION_PHRASES),
            url_rule: UrlRule::ProductPage {
                allow_root_slug: self.allow_root_slug,
            },
            relevance: RelevancePolicy::Threshold(0.5),
            require_evidence: true,
        }
    }
}

pub struct CardStoreProvider {
    store: &'static CardStore,
    client: reqwest::Client,
    base: Url,
    filter: ProductFilter,
}

impl CardStoreProvider {
    pub fn new(store: &'static CardStore, client: reqwest::Client, base: Url) -> Self {
        Self {
            store,
            client,
            base,
            filter: store.filter(),
        }
    }

    pub fn with_min_overlap(mut self, min_overlap: Option<f64>) -> Self {
        self.filter = self.filter.with_min_overlap(min_overlap);
        self
    }
}

fn card_title(card: &ElementRef<'_>, link: &ElementRef<'_>) -> String {
    card.select(&TITLE_SEL)
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
        .unwrap_or_else(|| element_text(link))
}

/// Candidates from generic product-card markup.
///
/// The card's first link accepted by `url_rule` is its product link; cards
/// without one fall back to their first link and are left to the filter.
pub fn parse_cards(html: &str, base: &Url, url_rule: UrlRule) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    document
        .select(&CARD_SEL)
        .filter_map(|card| {
            let links: Vec<(ElementRef<'_>, String)> = card
                .select(&LINK_SEL)
                .filter_map(|a| Some((a, absolutize(base, a.value().attr("href")?)?)))
                .collect();
            let (link, url) = links
                .iter()
                .find(|(_, url)| url_rule.accepts(base, url))
                .or_else(|| links.first())?
                .clone();
            Some(Candidate {
                title: card_title(&card, &link),
                url,
                price: extract_price_from(&card, &[]),
                image_url: card_image(&card, base),
                available: Some(true),
                sku: None,
            })
        })
        .collect()
}

#[async_trait]
impl Provider for CardStoreProvider {
    fn id(&self) -> &'static str {
        self.store.id
    }

    fn description(&self) -> &'static str {
        self.store.description
    }

    fn base_url(&self) -> &str {
        self.base.as_str()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Hit>, ProviderError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!(
            "{}{}",
            self.base,
            self.store
                .search_path
                .replace("{q}", &urlencoding::encode(query))
        );
        let body = fetch_text(&self.client, &url).await?;
        if let Some(marker) = self.store.challenge_marker {
            if body.contains(marker) {
                return Err(ProviderError::Unavailable(format!(
                    "{} answered with a JavaScript challenge",
                    self.store.id
                )));
            }
        }

        let base = self.base.clone();
        let url_rule = self.filter.url_rule;
        let candidates = parse_pool::parse_page(self.store.id, body, move |html| {
            parse_cards(html, &base, url_rule)
        })
        .await?;
        debug!(
            target: "cotiza.provider",
            provider = self.store.id,
            candidates = candidates.len(),
            pending_pages = parse_pool::pending(self.store.id),
            "product cards parsed"
        );
        Ok(self
            .filter
            .apply(self.store.id, query, &self.base, candidates, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_base_url;

    const PAGE: &str = r#"
    <nav><div class="menu-item"><a href="/pages/contacto">Contacto</a></div></nav>
    <div class="product-card">
      <a href="/products/cuaderno-college-100"><img src="/img/c100.jpg"></a>
      <h3 class="product-title">Cuaderno College 100 hojas cuadro</h3>
      <span class="price">$1.990</span>
    </div>
    <div class="product-card">
      <a href="/cuaderno-college-80">Cuaderno College 80 hojas</a>
      <span class="precio">$1.590</span>
    </div>
    <div class="social-item"><a href="https://instagram.com/prisa">Instagram</a></div>
    <div class="banner-card"><a href="/products/cuaderno-promo">Ver más cuadernos</a><img src="/b.jpg"></div>"#;

    #[test]
    fn pronobel_rejects_slugs_and_navigation() {
        let base = parse_base_url(PRONOBEL.default_base_url).unwrap();
        let filter = PRONOBEL.filter();
        let cards = parse_cards(PAGE, &base, filter.url_rule);
        let hits = filter.apply(PRONOBEL.id, "cuaderno college", &base, cards, 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Cuaderno College 100 hojas cuadro");
        assert_eq!(hits[0].url, "https://www.pronobel.cl/products/cuaderno-college-100");
        assert_eq!(hits[0].price, Some(1990));
        assert_eq!(hits[0].image_url.as_deref(), Some("https://www.pronobel.cl/img/c100.jpg"));
    }

    #[test]
    fn prisa_accepts_root_slugs() {
        let base = parse_base_url(PRISA.default_base_url).unwrap();
        let filter = PRISA.filter();
        let cards = parse_cards(PAGE, &base, filter.url_rule);
        let hits = filter.apply(PRISA.id, "cuaderno college", &base, cards, 5);
        let urls: Vec<&str> = hits.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.prisa.cl/products/cuaderno-college-100",
                "https://www.prisa.cl/cuaderno-college-80",
            ]
        );
        assert_eq!(hits[1].price, Some(1590));
    }

    #[test]
    fn threshold_override() {
        let base = parse_base_url(PRISA.default_base_url).unwrap();
        let filter = PRISA.filter().with_min_overlap(Some(1.0));
        let cards = parse_cards(PAGE, &base, filter.url_rule);
        let hits = filter.apply(PRISA.id, "cuaderno college cuadro", &base, cards, 5);
        assert_eq!(hits.len(), 1);
    }
}
