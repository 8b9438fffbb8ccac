//! Price extraction from store text and markup.
//!
//! Prices are whole CLP. `.` groups thousands; a trailing `,` with one or two
//! digits is a fractional part and is dropped.

use crate::utils::{element_text, selector};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

pub const MIN_BARE_PRICE: u64 = 100;
pub const MAX_BARE_PRICE: u64 = 10_000_000;

static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\s*(\d{1,3}(?:[.,]\d{3})+|\d+)(?:,\d{1,2})?").expect("currency regex")
});

static BARE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d{3})*").expect("bare regex"));

static GENERIC_PRICE_SEL: Lazy<Selector> = Lazy::new(|| {
    selector(
        "span[class*=price], div[class*=price], p[class*=price], \
         span[class*=precio], div[class*=precio], p[class*=precio], \
         span[class*=valor], div[class*=valor], p[class*=valor]",
    )
});

fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// First `$`-prefixed amount in `text`.
pub fn extract_currency(text: &str) -> Option<u64> {
    CURRENCY_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| digits_only(m.as_str()).parse::<u64>().ok())
        .find(|v| *v > 0)
}

/// First bare 3–7 digit amount in `[100, 10_000_000]`.
pub fn extract_bare(text: &str) -> Option<u64> {
    BARE_RE
        .find_iter(text)
        .map(|m| digits_only(m.as_str()))
        .filter(|d| (3..=7).contains(&d.len()))
        .filter_map(|d| d.parse::<u64>().ok())
        .find(|v| (MIN_BARE_PRICE..=MAX_BARE_PRICE).contains(v))
}

/// Extract a price from free text. Never fails; `None` when nothing matches.
pub fn extract_price(text: &str) -> Option<u64> {
    extract_currency(text).or_else(|| extract_bare(text))
}

/// Extract a price from a product card.
///
/// Sale-price elements win over generic price elements; as a last resort the
/// whole card text is scanned for a `$` amount.
pub fn extract_price_from(card: &ElementRef<'_>, sale_selectors: &[Selector]) -> Option<u64> {
    let sale = sale_selectors
        .iter()
        .flat_map(|sel| card.select(sel))
        .find_map(|el| extract_price(&element_text(&el)));
    if sale.is_some() {
        return sale;
    }

    card.select(&GENERIC_PRICE_SEL)
        .find_map(|el| extract_price(&element_text(&el)))
        .or_else(|| extract_currency(&element_text(card)))
}
