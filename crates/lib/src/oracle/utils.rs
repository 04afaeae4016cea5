use crate::{
    constant::SOL_MINT,
    oracle::{MockPriceOracle, PriceOracle, PriceSource, TokenPrice},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::{collections::HashMap, sync::Arc};

pub const DEFAULT_MOCKED_PRICE: Decimal = dec!(0.001);
pub const DEFAULT_MOCKED_USDC_PRICE: Decimal = dec!(1.0);
pub const DEFAULT_MOCKED_SOL_PRICE: Decimal = dec!(150.0);

pub const USDC_MAINNET_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

pub struct OracleUtil {}

impl OracleUtil {
    fn mocked_price(mint_address: &str) -> Decimal {
        match mint_address {
            USDC_MAINNET_MINT => DEFAULT_MOCKED_USDC_PRICE,
            SOL_MINT => DEFAULT_MOCKED_SOL_PRICE,
            _ => DEFAULT_MOCKED_PRICE,
        }
    }

    /// Fixed USD prices for offline runs.
    pub fn get_mock_oracle_price() -> Arc<dyn PriceOracle + Send + Sync> {
        let mut mock = MockPriceOracle::new();
        mock.expect_get_price().times(..).returning(|_, mint_address| {
            Ok(TokenPrice {
                price: Self::mocked_price(mint_address),
                confidence: 1.0,
                source: PriceSource::Mock,
            })
        });

        mock.expect_get_prices().times(..).returning(|_, mint_addresses| {
            let mut result = HashMap::new();
            for mint_address in mint_addresses {
                result.insert(
                    mint_address.clone(),
                    TokenPrice {
                        price: Self::mocked_price(mint_address),
                        confidence: 1.0,
                        source: PriceSource::Mock,
                    },
                );
            }
            Ok(result)
        });
        Arc::new(mock)
    }
}
