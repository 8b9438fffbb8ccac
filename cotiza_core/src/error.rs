// src/error.rs

/// Failure raised inside a provider client.
///
/// Never escapes the aggregation engine: every variant is flattened into a
/// `(provider, error)` pair on the result.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Store returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Unexpected response shape: {0}")]
    Parse(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl ProviderError {
    pub fn code_str(&self) -> &'static str {
        match self {
            ProviderError::HttpRequest(e) if e.is_timeout() => "timeout",
            ProviderError::HttpRequest(_) => "upstream_error",
            ProviderError::Status { .. } => "upstream_error",
            ProviderError::Parse(_) => "parse_error",
            ProviderError::SerdeJson(_) => "parse_error",
            ProviderError::Unavailable(_) => "unavailable",
            ProviderError::Config(_) => "config_error",
            ProviderError::Other(_) => "internal_error",
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.code_str() == "timeout"
    }
}

/// Caller-input failures detected above the engine. These are the only
/// hard errors the public entry points return.
#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("invalid line items: {0}")]
    InvalidItems(String),
}

impl QuoteError {
    pub fn code_str(&self) -> &'static str {
        match self {
            QuoteError::EmptyQuery => "empty_query",
            QuoteError::InvalidItems(_) => "invalid_items",
        }
    }
}
