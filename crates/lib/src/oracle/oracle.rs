use crate::{
    error::ReclaimError,
    oracle::{jupiter::JupiterPriceOracle, utils::OracleUtil},
};
use mockall::automock;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::time::sleep;

/// USD price of one whole token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub price: Decimal,
    pub confidence: f64,
    pub source: PriceSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PriceSource {
    Jupiter,
    Mock,
}

#[automock]
#[async_trait::async_trait]
pub trait PriceOracle {
    async fn get_price(&self, client: &Client, mint_address: &str)
        -> Result<TokenPrice, ReclaimError>;

    /// Prices for the mints the source knows about. Unknown mints are absent
    /// from the map rather than an error.
    async fn get_prices(
        &self,
        client: &Client,
        mint_addresses: &[String],
    ) -> Result<HashMap<String, TokenPrice>, ReclaimError>;
}

pub struct RetryingPriceOracle {
    client: Client,
    max_retries: u32,
    base_delay: Duration,
    oracle: Arc<dyn PriceOracle + Send + Sync>,
}

pub fn get_price_oracle(source: PriceSource) -> Arc<dyn PriceOracle + Send + Sync> {
    match source {
        PriceSource::Jupiter => Arc::new(JupiterPriceOracle::from_env()),
        PriceSource::Mock => OracleUtil::get_mock_oracle_price(),
    }
}

impl RetryingPriceOracle {
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        oracle: Arc<dyn PriceOracle + Send + Sync>,
    ) -> Self {
        Self { client: Client::new(), max_retries: max_retries.max(1), base_delay, oracle }
    }

    pub async fn get_token_price(&self, mint_address: &str) -> Result<TokenPrice, ReclaimError> {
        let prices = self.get_token_prices(&[mint_address.to_string()]).await?;

        prices.get(mint_address).cloned().ok_or_else(|| {
            ReclaimError::PriceLookupFailure(format!("No price available for mint {mint_address}"))
        })
    }

    pub async fn get_token_prices(
        &self,
        mint_addresses: &[String],
    ) -> Result<HashMap<String, TokenPrice>, ReclaimError> {
        if mint_addresses.is_empty() {
            return Ok(HashMap::new());
        }

        let mut last_error = None;
        let mut delay = self.base_delay;

        for attempt in 0..self.max_retries {
            match self.oracle.get_prices(&self.client, mint_addresses).await {
                Ok(prices) => return Ok(prices),
                Err(e) => {
                    log::warn!(
                        "Price lookup attempt {}/{} failed: {e}",
                        attempt + 1,
                        self.max_retries
                    );
                    last_error = Some(e);
                    if attempt < self.max_retries - 1 {
                        sleep(delay).await;
                        delay *= 2; // Exponential backoff
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ReclaimError::PriceLookupFailure("Failed to fetch token prices".to_string())
        }))
    }
}
