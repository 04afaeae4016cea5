use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::{fs, path::Path, str::FromStr, time::Duration};
use toml;

use crate::{
    constant::{
        DEFAULT_BURN_BATCH_SIZE, DEFAULT_BURN_PRICE_CEILING_USD, DEFAULT_CLOSE_BATCH_SIZE,
        DEFAULT_CLOSE_MINT_BATCH_SIZE, DEFAULT_CONFIRMATION_POLL_INTERVAL_MS,
        DEFAULT_INTER_BATCH_DELAY_MS, DEFAULT_MAX_CONSECUTIVE_POLL_ERRORS,
        DEFAULT_PRICE_LOOKUP_CHUNK_SIZE, DEFAULT_PRICE_LOOKUP_WORKERS, DEFAULT_PRICE_MAX_RETRIES,
        DEFAULT_PRICE_RETRY_BASE_DELAY_MS,
    },
    error::ReclaimError,
    manager::Operation,
    oracle::PriceSource,
    sanitize_error,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub price: PriceConfig,
    #[serde(default)]
    pub transaction: TransactionConfig,
}

/// Commission settings. Both fields unset means the operation is fee-free.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeConfig {
    pub fee_rate: Option<f64>,
    pub fee_recipient: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub close_batch_size: usize,
    pub burn_batch_size: usize,
    pub close_mint_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            close_batch_size: DEFAULT_CLOSE_BATCH_SIZE,
            burn_batch_size: DEFAULT_BURN_BATCH_SIZE,
            close_mint_batch_size: DEFAULT_CLOSE_MINT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub confirmation_poll_interval_ms: u64,
    pub inter_batch_delay_ms: u64,
    pub max_consecutive_poll_errors: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confirmation_poll_interval_ms: DEFAULT_CONFIRMATION_POLL_INTERVAL_MS,
            inter_batch_delay_ms: DEFAULT_INTER_BATCH_DELAY_MS,
            max_consecutive_poll_errors: DEFAULT_MAX_CONSECUTIVE_POLL_ERRORS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceConfig {
    pub source: PriceSource,
    pub burn_price_ceiling_usd: f64,
    pub lookup_workers: usize,
    pub lookup_chunk_size: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            source: PriceSource::Jupiter,
            burn_price_ceiling_usd: DEFAULT_BURN_PRICE_CEILING_USD,
            lookup_workers: DEFAULT_PRICE_LOOKUP_WORKERS,
            lookup_chunk_size: DEFAULT_PRICE_LOOKUP_CHUNK_SIZE,
            max_retries: DEFAULT_PRICE_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_PRICE_RETRY_BASE_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionConfig {
    pub compute_unit_price: Option<u64>,
    pub compute_unit_limit: Option<u32>,
}

#[derive(Debug, Default, PartialEq)]
pub struct ConfigValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Config {
    pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ReclaimError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ReclaimError::ConfigError(format!("Failed to read config file: {}", sanitize_error!(e)))
        })?;

        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Config, ReclaimError> {
        toml::from_str(contents).map_err(|e| {
            ReclaimError::ConfigError(format!("Failed to parse config file: {}", sanitize_error!(e)))
        })
    }

    pub fn validate(&self) -> ConfigValidation {
        let mut result = ConfigValidation::default();

        for (name, size) in [
            ("close_batch_size", self.batch.close_batch_size),
            ("burn_batch_size", self.batch.burn_batch_size),
            ("close_mint_batch_size", self.batch.close_mint_batch_size),
        ] {
            if size == 0 {
                result.errors.push(format!("batch.{name} must be positive"));
            }
        }

        let ceiling = self.price.burn_price_ceiling_usd;
        if !ceiling.is_finite() || ceiling < 0.0 {
            result.errors.push(format!(
                "price.burn_price_ceiling_usd must be a finite, non-negative number, got {ceiling}"
            ));
        }
        if self.price.lookup_workers == 0 {
            result.errors.push("price.lookup_workers must be positive".to_string());
        }
        if self.price.lookup_chunk_size == 0 {
            result.errors.push("price.lookup_chunk_size must be positive".to_string());
        }
        if self.price.max_retries == 0 {
            result.errors.push("price.max_retries must be positive".to_string());
        }

        if self.fees.resolved_rate().is_none() && self.fees.fee_rate.is_some() {
            result.warnings.push(format!(
                "fees.fee_rate {:?} is outside [0, 1] - fees disabled",
                self.fees.fee_rate
            ));
        }
        if self.fees.resolved_recipient().is_none() && self.fees.fee_recipient.is_some() {
            result
                .warnings
                .push("fees.fee_recipient is not a valid address - fees disabled".to_string());
        }
        if self.fees.fee_rate.is_some() != self.fees.fee_recipient.is_some() {
            result.warnings.push(
                "fees.fee_rate and fees.fee_recipient must both be set - fees disabled".to_string(),
            );
        }
        if self.pipeline.confirmation_poll_interval_ms == 0 {
            result
                .warnings
                .push("pipeline.confirmation_poll_interval_ms is 0 - status polls will not pause".to_string());
        }
        if matches!(self.price.source, PriceSource::Mock) {
            result.warnings.push("Using Mock price source - not suitable for production".to_string());
        }

        result
    }
}

impl FeeConfig {
    /// The configured rate, or `None` when unset or outside `[0, 1]`.
    pub fn resolved_rate(&self) -> Option<Decimal> {
        let rate = self.fee_rate?;
        if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
            return None;
        }
        Decimal::from_f64(rate)
    }

    pub fn resolved_recipient(&self) -> Option<Pubkey> {
        Pubkey::from_str(self.fee_recipient.as_deref()?.trim()).ok()
    }
}

/// Fee settings frozen for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFeeConfig {
    pub fee_rate: Option<Decimal>,
    pub fee_recipient: Option<Pubkey>,
    /// Supplied externally, validated against the chain once per run.
    pub referral: Option<Pubkey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSizes {
    pub close: usize,
    pub burn: usize,
    pub close_mint: usize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self {
            close: DEFAULT_CLOSE_BATCH_SIZE,
            burn: DEFAULT_BURN_BATCH_SIZE,
            close_mint: DEFAULT_CLOSE_MINT_BATCH_SIZE,
        }
    }
}

impl BatchSizes {
    pub fn for_operation(&self, operation: Operation) -> usize {
        match operation {
            Operation::Close => self.close,
            Operation::BurnAndClose => self.burn,
            Operation::CloseMint => self.close_mint,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineTiming {
    pub poll_interval: Duration,
    pub inter_batch_delay: Duration,
    pub max_consecutive_poll_errors: u32,
}

impl Default for PipelineTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_CONFIRMATION_POLL_INTERVAL_MS),
            inter_batch_delay: Duration::from_millis(DEFAULT_INTER_BATCH_DELAY_MS),
            max_consecutive_poll_errors: DEFAULT_MAX_CONSECUTIVE_POLL_ERRORS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceGuardConfig {
    pub source: PriceSource,
    pub ceiling_usd: Decimal,
    pub lookup_workers: usize,
    pub lookup_chunk_size: usize,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for PriceGuardConfig {
    fn default() -> Self {
        Self {
            source: PriceSource::Jupiter,
            ceiling_usd: Decimal::from_f64(DEFAULT_BURN_PRICE_CEILING_USD).unwrap_or(Decimal::TEN),
            lookup_workers: DEFAULT_PRICE_LOOKUP_WORKERS,
            lookup_chunk_size: DEFAULT_PRICE_LOOKUP_CHUNK_SIZE,
            max_retries: DEFAULT_PRICE_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_PRICE_RETRY_BASE_DELAY_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputeBudget {
    pub unit_price: Option<u64>,
    pub unit_limit: Option<u32>,
}

/// Immutable per-session context handed to every component entry point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub fees: SessionFeeConfig,
    pub batch_sizes: BatchSizes,
    pub timing: PipelineTiming,
    pub price_guard: PriceGuardConfig,
    pub compute_budget: ComputeBudget,
}

impl SessionContext {
    pub fn from_config(config: &Config, referral: Option<Pubkey>) -> Result<Self, ReclaimError> {
        let validation = config.validate();
        for warning in &validation.warnings {
            log::warn!("{warning}");
        }
        if !validation.is_valid() {
            return Err(ReclaimError::ConfigError(validation.errors.join("; ")));
        }

        // Half-configured fees are treated as no fees at all.
        let (fee_rate, fee_recipient) =
            match (config.fees.resolved_rate(), config.fees.resolved_recipient()) {
                (Some(rate), Some(recipient)) => (Some(rate), Some(recipient)),
                _ => (None, None),
            };

        let ceiling_usd = Decimal::from_f64(config.price.burn_price_ceiling_usd).ok_or_else(|| {
            ReclaimError::ConfigError("price.burn_price_ceiling_usd is not representable".to_string())
        })?;

        Ok(Self {
            fees: SessionFeeConfig { fee_rate, fee_recipient, referral },
            batch_sizes: BatchSizes {
                close: config.batch.close_batch_size,
                burn: config.batch.burn_batch_size,
                close_mint: config.batch.close_mint_batch_size,
            },
            timing: PipelineTiming {
                poll_interval: Duration::from_millis(config.pipeline.confirmation_poll_interval_ms),
                inter_batch_delay: Duration::from_millis(config.pipeline.inter_batch_delay_ms),
                max_consecutive_poll_errors: config.pipeline.max_consecutive_poll_errors,
            },
            price_guard: PriceGuardConfig {
                source: config.price.source.clone(),
                ceiling_usd,
                lookup_workers: config.price.lookup_workers,
                lookup_chunk_size: config.price.lookup_chunk_size,
                max_retries: config.price.max_retries,
                retry_base_delay: Duration::from_millis(config.price.retry_base_delay_ms),
            },
            compute_budget: ComputeBudget {
                unit_price: config.transaction.compute_unit_price,
                unit_limit: config.transaction.compute_unit_limit,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::config_mock::{create_invalid_config, ConfigBuilder};
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.batch.close_batch_size, 20);
        assert_eq!(config.batch.burn_batch_size, 10);
        assert_eq!(config.batch.close_mint_batch_size, 20);
        assert_eq!(config.pipeline.confirmation_poll_interval_ms, 500);
        assert_eq!(config.pipeline.inter_batch_delay_ms, 2000);
        assert_eq!(config.price.source, PriceSource::Jupiter);
        assert!(config.fees.fee_rate.is_none());
        assert!(config.validate().is_valid());
    }

    #[test]
    fn test_load_full_config() {
        let recipient = Pubkey::new_unique();
        let config = ConfigBuilder::new()
            .with_fees(0.05, &recipient.to_string())
            .with_batch_sizes(15, 5, 12)
            .with_timing(250, 1000)
            .with_price_ceiling(1.0)
            .with_compute_unit_price(5_000)
            .build_config()
            .unwrap();

        assert_eq!(config.fees.fee_rate, Some(0.05));
        assert_eq!(config.batch.close_batch_size, 15);
        assert_eq!(config.batch.burn_batch_size, 5);
        assert_eq!(config.transaction.compute_unit_price, Some(5_000));

        let session = SessionContext::from_config(&config, None).unwrap();
        assert_eq!(session.fees.fee_rate, Some(dec!(0.05)));
        assert_eq!(session.fees.fee_recipient, Some(recipient));
        assert_eq!(session.batch_sizes.for_operation(Operation::BurnAndClose), 5);
        assert_eq!(session.batch_sizes.for_operation(Operation::CloseMint), 12);
        assert_eq!(session.timing.poll_interval, Duration::from_millis(250));
        assert_eq!(session.timing.inter_batch_delay, Duration::from_millis(1000));
        assert_eq!(session.price_guard.ceiling_usd, dec!(1));
        assert_eq!(session.compute_budget.unit_price, Some(5_000));
    }

    #[test]
    fn test_load_invalid_config() {
        assert!(matches!(
            create_invalid_config("invalid toml content ["),
            Err(ReclaimError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_nonexistent_file() {
        assert!(Config::load_config("nonexistent_file.toml").is_err());
    }

    #[test]
    fn test_zero_batch_size_is_error() {
        let config = ConfigBuilder::new().with_batch_sizes(0, 10, 20).build_config().unwrap();
        let validation = config.validate();
        assert!(!validation.is_valid());
        assert!(validation.errors[0].contains("close_batch_size"));
        assert!(SessionContext::from_config(&config, None).is_err());
    }

    #[test]
    fn test_negative_ceiling_is_error() {
        let config = ConfigBuilder::new().with_price_ceiling(-1.0).build_config().unwrap();
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_out_of_range_fee_rate_disables_fees() {
        let config = ConfigBuilder::new()
            .with_fees(1.5, &Pubkey::new_unique().to_string())
            .build_config()
            .unwrap();
        let validation = config.validate();
        assert!(validation.is_valid());
        assert!(validation.warnings.iter().any(|w| w.contains("fee_rate")));

        let session = SessionContext::from_config(&config, None).unwrap();
        assert_eq!(session.fees.fee_rate, None);
        assert_eq!(session.fees.fee_recipient, None);
    }

    #[test]
    fn test_invalid_fee_recipient_disables_fees() {
        let config = ConfigBuilder::new().with_fees(0.1, "not-an-address").build_config().unwrap();
        let session = SessionContext::from_config(&config, None).unwrap();
        assert_eq!(session.fees, SessionFeeConfig::default());
    }

    #[test]
    fn test_referral_is_carried_into_session() {
        let referral = Pubkey::new_unique();
        let session = SessionContext::from_config(&Config::default(), Some(referral)).unwrap();
        assert_eq!(session.fees.referral, Some(referral));
    }
}
