use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use crate::token::TokenProgramKind;

/// Raw on-chain amount as reported by the chain, kept unparsed so callers can
/// tell an empty account from one whose amount could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenAmount {
    pub amount: String,
    pub decimals: u8,
}

impl TokenAmount {
    pub fn new(amount: u64, decimals: u8) -> Self {
        Self { amount: amount.to_string(), decimals }
    }

    pub fn raw(&self) -> Option<u64> {
        self.amount.trim().parse::<u64>().ok()
    }

    pub fn is_zero(&self) -> bool {
        self.raw() == Some(0)
    }

    /// `amount / 10^decimals`
    pub fn ui_amount(&self) -> Option<Decimal> {
        let raw = Decimal::from_u64(self.raw()?)?;
        let scale = Decimal::from_u128(10u128.checked_pow(self.decimals as u32)?)?;
        raw.checked_div(scale)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenAccountRecord {
    pub address: Pubkey,
    pub owner_program: TokenProgramKind,
    pub mint: Pubkey,
    pub lamports: u64,
    pub token_amount: TokenAmount,
    /// Shared by every record of one discovery pass.
    pub rent_exempt_reserve_threshold: u64,
    /// Transfer-fee tokens withheld on the account, Token-2022 only.
    pub withheld_amount: Option<u64>,
    pub is_frozen: bool,
    pub is_native: bool,
}

impl TokenAccountRecord {
    pub fn needs_harvest(&self) -> bool {
        self.owner_program.supports_withheld_harvest() && self.withheld_amount.unwrap_or(0) > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintAccountRecord {
    pub address: Pubkey,
    pub mint_authority: Option<Pubkey>,
    pub freeze_authority: Option<Pubkey>,
    pub close_authority: Option<Pubkey>,
    /// Decimal string, as reported by the chain.
    pub supply: String,
    pub decimals: u8,
    pub owner_program: TokenProgramKind,
    pub lamports: u64,
}

impl MintAccountRecord {
    pub fn has_authority(&self, wallet: &Pubkey) -> bool {
        self.mint_authority.as_ref() == Some(wallet) || self.freeze_authority.as_ref() == Some(wallet)
    }
}
