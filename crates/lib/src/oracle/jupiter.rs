use super::{PriceOracle, PriceSource, TokenPrice};
use crate::{
    constant::{JUPITER_API_LITE_URL, JUPITER_API_PRO_URL},
    error::ReclaimError,
    sanitize_error,
};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

const JUPITER_AUTH_HEADER: &str = "x-api-key";
const JUPITER_API_KEY_ENV: &str = "JUPITER_API_KEY";

const JUPITER_DEFAULT_CONFIDENCE: f64 = 0.95;

const MAX_REASONABLE_PRICE: f64 = 1_000_000.0;
const MIN_REASONABLE_PRICE: f64 = 0.000_000_001;

type JupiterResponse = HashMap<String, JupiterPriceData>;

#[derive(Debug, Deserialize)]
struct JupiterPriceData {
    #[serde(rename = "usdPrice")]
    usd_price: f64,
    #[serde(rename = "blockId")]
    #[allow(dead_code)]
    block_id: Option<u64>,
    #[allow(dead_code)]
    decimals: Option<u8>,
}

pub struct JupiterPriceOracle {
    pro_api_url: String,
    lite_api_url: String,
    api_key: Option<String>,
}

impl Default for JupiterPriceOracle {
    fn default() -> Self {
        Self::new(None)
    }
}

impl JupiterPriceOracle {
    pub fn new(api_key: Option<String>) -> Self {
        let pro_api_url = Self::build_price_api_url(JUPITER_API_PRO_URL);
        let lite_api_url = Self::build_price_api_url(JUPITER_API_LITE_URL);

        Self { pro_api_url, lite_api_url, api_key: api_key.filter(|k| !k.trim().is_empty()) }
    }

    /// Picks up the pro API key from `JUPITER_API_KEY` when present.
    pub fn from_env() -> Self {
        Self::new(std::env::var(JUPITER_API_KEY_ENV).ok())
    }

    fn build_price_api_url(base_url: &str) -> String {
        let trimmed = base_url.trim_end_matches('/');
        format!("{trimmed}/price/v3")
    }

    fn is_reasonable_price(price_data: &JupiterPriceData, mint: &str) -> bool {
        let price = price_data.usd_price;
        if !price.is_finite() || !(MIN_REASONABLE_PRICE..=MAX_REASONABLE_PRICE).contains(&price) {
            log::warn!("Discarding out-of-bounds Jupiter price for mint {mint}: {price}");
            return false;
        }
        true
    }

    async fn fetch_prices_from_url(
        &self,
        client: &Client,
        api_url: &str,
        mint_addresses: &[String],
        api_key: Option<&String>,
    ) -> Result<HashMap<String, TokenPrice>, ReclaimError> {
        if mint_addresses.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{api_url}?ids={}", mint_addresses.join(","));

        let mut request = client.get(&url);
        if let Some(key) = api_key {
            request = request.header(JUPITER_AUTH_HEADER, key);
        }

        let response = request.send().await.map_err(|e| {
            ReclaimError::PriceLookupFailure(format!(
                "Jupiter API request failed: {}",
                sanitize_error!(e)
            ))
        })?;

        if !response.status().is_success() {
            return match response.status() {
                StatusCode::TOO_MANY_REQUESTS => Err(ReclaimError::RateLimitExceeded),
                status => {
                    Err(ReclaimError::PriceLookupFailure(format!("Jupiter API error: {status}")))
                }
            };
        }

        let jupiter_response: JupiterResponse = response.json().await.map_err(|e| {
            ReclaimError::PriceLookupFailure(format!(
                "Failed to parse Jupiter response: {}",
                sanitize_error!(e)
            ))
        })?;

        let mut result = HashMap::new();
        for mint_address in mint_addresses {
            let Some(price_data) = jupiter_response.get(mint_address.as_str()) else {
                log::debug!("No Jupiter price for mint {mint_address}");
                continue;
            };
            if !Self::is_reasonable_price(price_data, mint_address) {
                continue;
            }
            // f64 only at the API boundary
            let Some(usd) = Decimal::from_f64_retain(price_data.usd_price) else {
                continue;
            };
            result.insert(
                mint_address.clone(),
                TokenPrice {
                    price: usd,
                    confidence: JUPITER_DEFAULT_CONFIDENCE,
                    source: PriceSource::Jupiter,
                },
            );
        }

        Ok(result)
    }
}

#[async_trait::async_trait]
impl PriceOracle for JupiterPriceOracle {
    async fn get_price(
        &self,
        client: &Client,
        mint_address: &str,
    ) -> Result<TokenPrice, ReclaimError> {
        let prices = self.get_prices(client, &[mint_address.to_string()]).await?;

        prices.get(mint_address).cloned().ok_or_else(|| {
            ReclaimError::PriceLookupFailure(format!(
                "No price data from Jupiter for mint {mint_address}"
            ))
        })
    }

    async fn get_prices(
        &self,
        client: &Client,
        mint_addresses: &[String],
    ) -> Result<HashMap<String, TokenPrice>, ReclaimError> {
        if mint_addresses.is_empty() {
            return Ok(HashMap::new());
        }

        // Pro API first when a key is configured, lite API as fallback
        if let Some(api_key) = &self.api_key {
            match self
                .fetch_prices_from_url(client, &self.pro_api_url, mint_addresses, Some(api_key))
                .await
            {
                Ok(prices) => return Ok(prices),
                Err(ReclaimError::RateLimitExceeded) => {
                    log::warn!("Pro Jupiter API rate limit exceeded, falling back to free API");
                }
                Err(e) => return Err(e),
            }
        }

        self.fetch_prices_from_url(client, &self.lite_api_url, mint_addresses, None).await
    }
}
