//! Store clients and the toolkit they share.
//!
//! Each store turns its response into [`Candidate`]s; a [`ProductFilter`]
//! then applies the store's title, URL, relevance and evidence rules and
//! produces the final hits.

pub mod cards;
pub mod dimeiggs;
pub mod jamila;
pub mod libreria_nacional;
pub mod prestashop;
pub mod unavailable;

use crate::relevance::{overlap_tokens, RelevancePolicy};
use crate::text::{contains_phrase, fold, normalize};
use crate::types::Hit;
use crate::utils::{absolutize, selector};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use std::collections::HashSet;
use url::Url;

/// Titles shorter than this are labels, not products.
pub const MIN_TITLE_LEN: usize = 3;

/// Titles longer than this are descriptions or page copy.
pub const MAX_TITLE_LEN: usize = 150;

/// Navigation, account and social-link labels that generic card markup
/// wraps the same way it wraps products.
pub const NAVIGATION_PHRASES: &[&str] = &[
    "ver más",
    "ver mas",
    "ver todo",
    "ver productos",
    "ver",
    "más",
    "mas",
    "categorías",
    "inicio",
    "home",
    "carrito",
    "mi cuenta",
    "iniciar sesión",
    "registrarse",
    "registro",
    "contacto",
    "ayuda",
    "términos",
    "política",
    "blog",
    "novedades",
    "ofertas",
    "promociones",
    "newsletter",
    "suscríbete",
    "facebook",
    "instagram",
    "twitter",
    "youtube",
    "tiktok",
];

/// URL fragments that never belong to a product page.
pub const NON_PRODUCT_URL_PARTS: &[&str] = &[
    "mailto:",
    "javascript:",
    "#",
    "/cart",
    "/carrito",
    "/account",
    "/login",
    "/pages/",
    "/page/",
    "/collections/",
    "/collection/",
    "/search",
    "/category",
    "/categoria",
    "/blog",
    "/news",
    "/contact",
    "/about",
    "/faq",
    "/terms",
    "/policy",
    "/policies",
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "youtube.com",
    "tiktok.com",
];

/// URL fragments that mark a product page.
pub const PRODUCT_URL_PARTS: &[&str] = &[
    "/product/",
    "/products/",
    "/producto/",
    "/productos/",
    "/item/",
    "/items/",
];

static IMG_SEL: Lazy<Selector> = Lazy::new(|| selector("img"));

/// A product as parsed from a store response, before any filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub title: String,
    pub url: String,
    pub price: Option<u64>,
    pub image_url: Option<String>,
    pub available: Option<bool>,
    pub sku: Option<String>,
}

impl Candidate {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    fn has_evidence(&self) -> bool {
        self.price.is_some() || self.image_url.is_some()
    }

    fn into_hit(self, provider: &str, relevance: f64) -> Hit {
        Hit::new(provider, self.title, self.url)
            .with_price(self.price)
            .with_image(self.image_url)
            .with_available(self.available)
            .with_sku(self.sku)
            .with_relevance(relevance)
    }
}

/// Non-product title rule.
#[derive(Debug, Clone, Copy)]
pub enum Blocklist {
    None,
    /// Reject titles containing one of these phrases as whole words.
    Phrases(&'static [&'static str]),
    /// Reject titles containing one of these stems anywhere (so "bolsa"
    /// also catches "bolsas").
    Stems(&'static [&'static str]),
}

impl Blocklist {
    pub fn blocks(&self, title: &str) -> bool {
        match self {
            Blocklist::None => false,
            Blocklist::Phrases(phrases) => phrases.iter().any(|p| contains_phrase(title, p)),
            Blocklist::Stems(stems) => {
                let folded = fold(title);
                stems.iter().any(|s| {
                    let stem = fold(s);
                    !stem.is_empty() && folded.contains(&stem)
                })
            }
        }
    }
}

/// Product-page URL shape.
#[derive(Debug, Clone, Copy)]
pub enum UrlRule {
    Any,
    /// URL must contain one of these fragments.
    Contains(&'static [&'static str]),
    /// Generic storefront rule: no navigation fragment, and either a product
    /// path marker or (when allowed) a single-segment slug on the store host.
    ProductPage { allow_root_slug: bool },
}

impl UrlRule {
    pub fn accepts(&self, base: &Url, url: &str) -> bool {
        let lower = url.to_lowercase();
        match self {
            UrlRule::Any => !lower.starts_with("javascript:") && !lower.ends_with('#'),
            UrlRule::Contains(parts) => parts.iter().any(|p| lower.contains(p)),
            UrlRule::ProductPage { allow_root_slug } => {
                if NON_PRODUCT_URL_PARTS.iter().any(|p| lower.contains(p)) {
                    return false;
                }
                if PRODUCT_URL_PARTS.iter().any(|p| lower.contains(p)) {
                    return true;
                }
                *allow_root_slug && is_root_slug(base, url)
            }
        }
    }
}

fn is_root_slug(base: &Url, url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if parsed.host_str() != base.host_str() {
        return false;
    }
    let path = parsed.path().trim_end_matches('/');
    path.len() > 2 && path.matches('/').count() == 1
}

/// The screening rules of one store.
#[derive(Debug, Clone, Copy)]
pub struct ProductFilter {
    pub blocklist: Blocklist,
    pub url_rule: UrlRule,
    pub relevance: RelevancePolicy,
    /// Require a price or an image before accepting a candidate
    pub require_evidence: bool,
}

impl ProductFilter {
    /// Accept everything with a usable title and URL.
    pub const fn unfiltered() -> Self {
        Self {
            blocklist: Blocklist::None,
            url_rule: UrlRule::Any,
            relevance: RelevancePolicy::Unfiltered,
            require_evidence: false,
        }
    }

    pub fn with_min_overlap(mut self, min_overlap: Option<f64>) -> Self {
        self.relevance = self.relevance.with_min_ratio(min_overlap);
        self
    }

    /// Screen `candidates` in order and return at most `limit` hits, each
    /// scored against `query` and unique by URL.
    pub fn apply(
        &self,
        provider: &str,
        query: &str,
        base: &Url,
        candidates: Vec<Candidate>,
        limit: usize,
    ) -> Vec<Hit> {
        let query_tokens = normalize(query);
        let mut seen = HashSet::new();
        let mut hits = Vec::new();

        for mut candidate in candidates {
            if hits.len() >= limit {
                break;
            }
            candidate.title = candidate.title.trim().to_string();
            let title_len = candidate.title.chars().count();
            if !(MIN_TITLE_LEN..=MAX_TITLE_LEN).contains(&title_len) {
                continue;
            }
            if self.blocklist.blocks(&candidate.title) {
                continue;
            }
            if candidate.url.is_empty() || !self.url_rule.accepts(base, &candidate.url) {
                continue;
            }
            if !seen.insert(candidate.url.clone()) {
                continue;
            }
            let title_tokens = normalize(&candidate.title);
            if !self.relevance.accepts(&query_tokens, &title_tokens) {
                continue;
            }
            if self.require_evidence && !candidate.has_evidence() {
                continue;
            }
            let relevance = overlap_tokens(&query_tokens, &title_tokens);
            hits.push(candidate.into_hit(provider, relevance));
        }

        hits
    }
}

/// First `href` of `card` matching `link_sel`, made absolute.
pub fn card_link(card: &ElementRef<'_>, link_sel: &Selector, base: &Url) -> Option<(String, String)> {
    let link = card.select(link_sel).next()?;
    let href = link.value().attr("href")?;
    let url = absolutize(base, href)?;
    Some((url, crate::utils::element_text(&link)))
}

/// First image of `card`, made absolute. Lazy-loading attributes are
/// checked after `src`.
pub fn card_image(card: &ElementRef<'_>, base: &Url) -> Option<String> {
    card.select(&IMG_SEL).find_map(|img| {
        let el = img.value();
        ["src", "data-src", "data-srcset"]
            .iter()
            .filter_map(|attr| el.attr(attr))
            .map(|v| v.split_whitespace().next().unwrap_or(""))
            .find(|v| !v.is_empty() && !v.starts_with("data:"))
            .and_then(|v| absolutize(base, v))
    })
}
