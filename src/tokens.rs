//! Token list and price proxy
//!
//! Thin cached front for the Jupiter token list and quote APIs. Failures are
//! logged and surface as an empty list or a missing price, never as errors.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

pub const DEFAULT_TOKENS_URL: &str = "https://tokens.jup.ag/tokens?tags=verified";
pub const DEFAULT_QUOTE_URL: &str = "https://quote-api.jup.ag/v6/quote";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Quoted input amount; most tokens carry 9 decimals
const QUOTE_AMOUNT: u64 = 1_000_000_000;
const QUOTE_DECIMALS: i32 = 9;
const SLIPPAGE_BPS: u32 = 50;

const TOKEN_LIST_TTL: Duration = Duration::from_secs(300);
const PRICE_TTL: Duration = Duration::from_secs(5);
/// Addresses with a remembered price; the least recently used one is evicted first
const PRICE_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(512) {
    Some(capacity) => capacity,
    None => unreachable!(),
};
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token API returned HTTP {0}")]
    Status(u16),
    #[error("Unusable quote: {0}")]
    InvalidQuote(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: String,
    pub name: String,
    pub symbol: String,
    #[serde(rename = "logoURI")]
    pub logo_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub price: String,
}

struct Cached<T> {
    value: T,
    fetched_at: Instant,
}

impl<T> Cached<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

pub struct JupiterClient {
    client: Client,
    tokens_url: String,
    quote_url: String,
    tokens: Mutex<Option<Cached<Vec<Token>>>>,
    prices: Mutex<LruCache<String, Cached<TokenPrice>>>,
}

impl JupiterClient {
    pub fn new(
        tokens_url: impl Into<String>,
        quote_url: impl Into<String>,
    ) -> Result<Self, TokenError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            tokens_url: tokens_url.into(),
            quote_url: quote_url.into(),
            tokens: Mutex::new(None),
            prices: Mutex::new(LruCache::new(PRICE_CACHE_CAPACITY)),
        })
    }

    /// Verified token list, cached for five minutes. Empty on failure.
    pub async fn get_tokens(&self) -> Vec<Token> {
        let cached = self
            .tokens
            .lock()
            .unwrap()
            .as_ref()
            .filter(|cached| cached.is_fresh(TOKEN_LIST_TTL))
            .map(|cached| cached.value.clone());
        if let Some(tokens) = cached {
            return tokens;
        }

        match self.fetch_tokens().await {
            Ok(tokens) => {
                tracing::debug!(count = tokens.len(), "Refreshed token list");
                *self.tokens.lock().unwrap() = Some(Cached::new(tokens.clone()));
                tokens
            }
            Err(e) => {
                tracing::error!(error = %e, "Error fetching token list");
                Vec::new()
            }
        }
    }

    pub async fn search_tokens(&self, query: &str) -> Vec<Token> {
        filter_tokens(self.get_tokens().await, query)
    }

    /// USD price of one whole token, cached per address for five seconds
    pub async fn get_token_price(&self, address: &str) -> Option<TokenPrice> {
        let cached = self
            .prices
            .lock()
            .unwrap()
            .get(address)
            .filter(|cached| cached.is_fresh(PRICE_TTL))
            .map(|cached| cached.value.clone());
        if cached.is_some() {
            return cached;
        }

        match self.fetch_price(address).await {
            Ok(price) => {
                self.cache_price(address, price.clone());
                Some(price)
            }
            Err(e) => {
                tracing::error!(address = %address, error = %e, "Error fetching token price");
                None
            }
        }
    }

    fn cache_price(&self, address: &str, price: TokenPrice) {
        self.prices
            .lock()
            .unwrap()
            .put(address.to_string(), Cached::new(price));
    }

    async fn fetch_tokens(&self) -> Result<Vec<Token>, TokenError> {
        let response = self.client.get(&self.tokens_url).send().await?;
        if !response.status().is_success() {
            return Err(TokenError::Status(response.status().as_u16()));
        }
        Ok(response.json::<Vec<Token>>().await?)
    }

    async fn fetch_price(&self, address: &str) -> Result<TokenPrice, TokenError> {
        let amount = QUOTE_AMOUNT.to_string();
        let slippage = SLIPPAGE_BPS.to_string();
        let response = self
            .client
            .get(&self.quote_url)
            .query(&[
                ("inputMint", address),
                ("outputMint", USDC_MINT),
                ("amount", amount.as_str()),
                ("slippageBps", slippage.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TokenError::Status(response.status().as_u16()));
        }

        let quote: Value = response.json().await?;
        price_from_quote(address, &quote)
    }
}

/// Empty query keeps everything; otherwise match name or symbol by substring,
/// or the address exactly, ignoring case.
pub fn filter_tokens(tokens: Vec<Token>, query: &str) -> Vec<Token> {
    if query.is_empty() {
        return tokens;
    }

    let needle = query.to_lowercase();
    tokens
        .into_iter()
        .filter(|token| {
            token.name.to_lowercase().contains(&needle)
                || token.symbol.to_lowercase().contains(&needle)
                || token.address.to_lowercase() == needle
        })
        .collect()
}

pub fn price_from_quote(address: &str, quote: &Value) -> Result<TokenPrice, TokenError> {
    let in_amount = number_field(quote, "inAmount")?;
    let usd_value = number_field(quote, "swapUsdValue")?;
    if in_amount <= 0.0 {
        return Err(TokenError::InvalidQuote(format!("inAmount is {in_amount}")));
    }

    let price = usd_value / (in_amount / 10f64.powi(QUOTE_DECIMALS));
    Ok(TokenPrice {
        id: address.to_string(),
        kind: "price".to_string(),
        price: price.to_string(),
    })
}

// The quote API encodes amounts as strings; accept plain numbers too
fn number_field(quote: &Value, key: &str) -> Result<f64, TokenError> {
    let parsed = match quote.get(key) {
        Some(Value::String(s)) => s.parse::<f64>().ok(),
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| TokenError::InvalidQuote(format!("missing or malformed {key}")))
}
