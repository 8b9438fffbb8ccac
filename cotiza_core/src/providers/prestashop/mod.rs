//! PrestaShop storefronts (Coloranimal, La Secretaria).
//!
//! Both stores render search results as `<article>` miniatures and the
//! PrestaShop search only returns matching products, so no relevance filter
//! is applied.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::parse_pool;
use crate::error::ProviderError;
use crate::price::extract_price_from;
use crate::providers::{card_image, Candidate, ProductFilter, MIN_TITLE_LEN};
use crate::types::Hit;
use crate::utils::{absolutize, element_text, fetch_text, selector};
use crate::Provider;

static ARTICLE_SEL: Lazy<Selector> = Lazy::new(|| selector("article"));
static ANY_LINK_SEL: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static TITLED_HEADING_SEL: Lazy<Selector> =
    Lazy::new(|| selector(r#"h2[class*="title"], h3[class*="title"]"#));
static HEADING_SEL: Lazy<Selector> = Lazy::new(|| selector("h2, h3, h4"));

/// What differs between two PrestaShop stores.
#[derive(Debug)]
pub struct PrestaShopStore {
    pub id: &'static str,
    pub description: &'static str,
    pub default_base_url: &'static str,
    /// Search path relative to the base URL; `{q}` is the encoded query
    pub search_path: &'static str,
    /// Theme-specific card selector tried before plain `article`
    pub card_selector: Option<&'static str>,
    /// Theme-specific product link selector tried before any link
    pub link_selector: Option<&'static str>,
    /// Derive a title from the `NNN-product-name` URL slug as a last resort
    pub slug_titles: bool,
}

pub static COLORANIMAL: PrestaShopStore = PrestaShopStore {
    id: "coloranimal",
    description: "Coloranimal: art and school supplies (PrestaShop)",
    default_base_url: "https://www.coloranimal.cl",
    search_path: "busqueda?controller=search&s={q}",
    card_selector: None,
    link_selector: Some(r#"a[href*="/products/"]"#),
    slug_titles: false,
};

pub static LA_SECRETARIA: PrestaShopStore = PrestaShopStore {
    id: "lasecretaria",
    description: "La Secretaria: office supplies (PrestaShop)",
    default_base_url: "https://www.lasecretaria.cl",
    search_path: "busqueda?controller=search&orderby=position&orderway=desc&search_category=all&s={q}&submit_search=",
    card_selector: Some("article.productcontainer"),
    link_selector: None,
    slug_titles: true,
};

pub struct PrestaShopProvider {
    store: &'static PrestaShopStore,
    client: reqwest::Client,
    base: Url,
    filter: ProductFilter,
}

impl PrestaShopProvider {
    pub fn new(store: &'static PrestaShopStore, client: reqwest::Client, base: Url) -> Self {
        Self {
            store,
            client,
            base,
            filter: ProductFilter::unfiltered(),
        }
    }

    fn search_url(&self, query: &str) -> String {
        let path = self
            .store
            .search_path
            .replace("{q}", &urlencoding::encode(query));
        format!("{}{}", self.base, path)
    }
}

/// Title from a `265-cuaderno-indice-oficio.html` style slug.
fn title_from_slug(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let last = last.trim_end_matches(".html");
    let (_, rest) = last.split_once('-')?;
    let title = rest
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    Some(title)
}

fn long_enough(text: &str) -> bool {
    text.chars().count() >= MIN_TITLE_LEN
}

fn article_title(
    article: &ElementRef<'_>,
    link: &ElementRef<'_>,
    url: &str,
    slug_titles: bool,
) -> String {
    article
        .select(&TITLED_HEADING_SEL)
        .map(|h| element_text(&h))
        .find(|t| long_enough(t))
        .or_else(|| Some(element_text(link)).filter(|t| long_enough(t)))
        .or_else(|| {
            article
                .select(&HEADING_SEL)
                .map(|h| element_text(&h))
                .find(|t| long_enough(t))
        })
        .or_else(|| {
            link.value()
                .attr("title")
                .map(|t| t.trim().to_string())
                .filter(|t| long_enough(t))
        })
        .or_else(|| slug_titles.then(|| title_from_slug(url)).flatten())
        .unwrap_or_default()
}

pub fn parse_articles(store: &PrestaShopStore, html: &str, base: &Url) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let themed = store.card_selector.map(selector);
    let themed_link = store.link_selector.map(selector);

    let mut articles: Vec<ElementRef<'_>> = themed
        .as_ref()
        .map(|sel| document.select(sel).collect())
        .unwrap_or_default();
    if articles.is_empty() {
        articles = document.select(&ARTICLE_SEL).collect();
    }

    articles
        .into_iter()
        .filter_map(|article| {
            let link = themed_link
                .as_ref()
                .and_then(|sel| article.select(sel).next())
                .or_else(|| article.select(&ANY_LINK_SEL).next())?;
            let url = absolutize(base, link.value().attr("href")?)?;
            let title = article_title(&article, &link, &url, store.slug_titles);
            Some(Candidate {
                title,
                url,
                price: extract_price_from(&article, &[]),
                image_url: card_image(&article, base),
                available: Some(true),
                sku: article.value().attr("data-id-product").map(str::to_string),
            })
        })
        .collect()
}

#[async_trait]
impl Provider for PrestaShopProvider {
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
        let body = fetch_text(&self.client, &self.search_url(query)).await?;
        let store = self.store;
        let base = self.base.clone();
        let candidates =
            parse_pool::parse_page(store.id, body, move |html| parse_articles(store, html, &base))
                .await?;
        debug!(
            target: "cotiza.provider",
            provider = store.id,
            candidates = candidates.len(),
            "prestashop articles parsed"
        );
        Ok(self.filter.apply(store.id, query, &self.base, candidates, limit))
    }
}
