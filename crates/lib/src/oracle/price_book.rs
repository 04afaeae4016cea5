use futures::future::join_all;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    str::FromStr,
    sync::Arc,
};

use crate::{
    config::PriceGuardConfig,
    error::ReclaimError,
    oracle::{get_price_oracle, PriceOracle, RetryingPriceOracle},
};

/// Resolves USD prices for many mints with a bounded number of concurrent
/// lookups.
pub struct PriceBook {
    oracle: Arc<RetryingPriceOracle>,
    workers: usize,
    chunk_size: usize,
}

impl PriceBook {
    pub fn new(oracle: Arc<RetryingPriceOracle>, workers: usize, chunk_size: usize) -> Self {
        Self { oracle, workers: workers.max(1), chunk_size: chunk_size.max(1) }
    }

    pub fn from_config(config: &PriceGuardConfig) -> Self {
        Self::with_oracle(config, get_price_oracle(config.source.clone()))
    }

    pub fn with_oracle(config: &PriceGuardConfig, oracle: Arc<dyn PriceOracle + Send + Sync>) -> Self {
        let retrying = RetryingPriceOracle::new(config.max_retries, config.retry_base_delay, oracle);
        Self::new(Arc::new(retrying), config.lookup_workers, config.lookup_chunk_size)
    }

    /// USD price per whole token for every mint that could be resolved.
    ///
    /// Mints are split into chunks on one shared queue; each worker pulls the
    /// next chunk until the queue is empty. A failed chunk leaves its mints
    /// unresolved.
    pub async fn lookup_usd(&self, mints: &[Pubkey]) -> HashMap<Pubkey, Decimal> {
        let mut seen = HashSet::new();
        let unique: Vec<String> =
            mints.iter().filter(|m| seen.insert(**m)).map(|m| m.to_string()).collect();
        if unique.is_empty() {
            return HashMap::new();
        }

        let queue: Mutex<VecDeque<Vec<String>>> =
            Mutex::new(unique.chunks(self.chunk_size).map(<[String]>::to_vec).collect());
        let resolved: Mutex<HashMap<Pubkey, Decimal>> = Mutex::new(HashMap::new());
        let worker_count = self.workers.min(queue.lock().len());

        let workers = (0..worker_count).map(|worker| {
            let queue = &queue;
            let resolved = &resolved;
            async move {
                loop {
                    let Some(chunk) = queue.lock().pop_front() else { break };
                    match self.oracle.get_token_prices(&chunk).await {
                        Ok(prices) => {
                            let mut resolved = resolved.lock();
                            for (mint, price) in prices {
                                if let Ok(mint) = Pubkey::from_str(&mint) {
                                    resolved.insert(mint, price.price);
                                }
                            }
                        }
                        Err(e) => {
                            let error = ReclaimError::PriceLookupFailure(e.to_string());
                            log::error!(
                                "Price worker {worker}: chunk of {} mints unresolved: {error}",
                                chunk.len()
                            );
                        }
                    }
                }
            }
        });
        join_all(workers).await;

        resolved.into_inner()
    }
}
