use rust_decimal::{
    prelude::{FromPrimitive, ToPrimitive},
    Decimal,
};
use solana_sdk::pubkey::Pubkey;

use crate::{chain::ChainClient, config::SessionFeeConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeTransfer {
    pub to: Pubkey,
    pub lamports: u64,
}

/// Commission owed for one batch and the transfers that pay it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeePlan {
    pub commission: u64,
    /// At most two entries, never a zero-lamport transfer.
    pub transfers: Vec<FeeTransfer>,
}

impl FeePlan {
    pub fn paid(&self) -> u64 {
        self.transfers.iter().map(|t| t.lamports).sum()
    }
}

/// `floor(lamports * fee_rate)`, or `None` when no valid rate is configured.
pub fn commission(lamports: u64, fee_rate: Option<Decimal>) -> Option<u64> {
    let rate = fee_rate?;
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return None;
    }
    Decimal::from_u64(lamports)?.checked_mul(rate)?.floor().to_u64()
}

/// Splits `total` between recipient and referral. Each side gets
/// `floor(total / 2)`; an odd lamport stays with the wallet.
pub fn split_commission(total: u64, recipient: Pubkey, referral: Option<Pubkey>) -> Vec<FeeTransfer> {
    let transfers = match referral {
        Some(referral) => {
            let half = total / 2;
            vec![FeeTransfer { to: referral, lamports: half }, FeeTransfer { to: recipient, lamports: half }]
        }
        None => vec![FeeTransfer { to: recipient, lamports: total }],
    };
    transfers.into_iter().filter(|t| t.lamports > 0).collect()
}

/// Computes the fee for one batch from the lamports it reclaims. `referral`
/// must already have passed [`validate_referral`].
pub fn plan_fee(
    batch_lamports: u64,
    fees: &SessionFeeConfig,
    referral: Option<Pubkey>,
) -> Option<FeePlan> {
    let recipient = fees.fee_recipient?;
    let commission = commission(batch_lamports, fees.fee_rate)?;
    Some(FeePlan { commission, transfers: split_commission(commission, recipient, referral) })
}

/// A referral is honored only when it is not the wallet itself, is an on-curve
/// key and already holds a funded account on chain.
pub async fn validate_referral(
    chain: &dyn ChainClient,
    referral: Option<Pubkey>,
    wallet: &Pubkey,
) -> Option<Pubkey> {
    let referral = referral?;

    if referral == *wallet {
        log::warn!("Ignoring referral {referral}: it is the connected wallet");
        return None;
    }
    if !referral.is_on_curve() {
        log::warn!("Ignoring referral {referral}: not an on-curve address");
        return None;
    }

    match chain.get_account_info(&referral).await {
        Ok(Some(account)) if account.lamports > 0 => Some(referral),
        Ok(_) => {
            log::warn!("Ignoring referral {referral}: no funded account on chain");
            None
        }
        Err(e) => {
            log::warn!("Ignoring referral {referral}: account lookup failed: {e}");
            None
        }
    }
}
