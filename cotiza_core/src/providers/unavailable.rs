//! Stores that stay in the catalogue but cannot be queried.
//!
//! Their sites sit behind bot protection that needs a real browser, so every
//! search fails with an explanatory error instead of silently returning
//! nothing.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::Hit;
use crate::Provider;

#[derive(Debug)]
pub struct UnavailableStore {
    pub id: &'static str,
    pub description: &'static str,
    pub base_url: &'static str,
    pub reason: &'static str,
}

pub static JUMBO: UnavailableStore = UnavailableStore {
    id: "jumbo",
    description: "Jumbo supermarket (unavailable)",
    base_url: "https://www.jumbo.cl/",
    reason: "jumbo.cl is behind PerimeterX bot protection",
};

pub static LIDER: UnavailableStore = UnavailableStore {
    id: "lider",
    description: "Líder supermarket (unavailable)",
    base_url: "https://www.lider.cl/",
    reason: "lider.cl is behind PerimeterX bot protection",
};

pub static LAPIZ_LOPEZ: UnavailableStore = UnavailableStore {
    id: "lapiz_lopez",
    description: "Lápiz López stationery (unavailable)",
    base_url: "https://www.lapizlopez.cl/",
    reason: "lapizlopez.cl answers 403 behind Cloudflare and renders products with JavaScript",
};

pub static ALL: &[&UnavailableStore] = &[&JUMBO, &LIDER, &LAPIZ_LOPEZ];

pub struct UnavailableProvider {
    store: &'static UnavailableStore,
}

impl UnavailableProvider {
    pub fn new(store: &'static UnavailableStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Provider for UnavailableProvider {
    fn id(&self) -> &'static str {
        self.store.id
    }

    fn description(&self) -> &'static str {
        self.store.description
    }

    fn base_url(&self) -> &str {
        self.store.base_url
    }

    fn available(&self) -> bool {
        false
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Hit>, ProviderError> {
        Err(ProviderError::Unavailable(self.store.reason.to_string()))
    }
}
