//! Per-operation eligibility rules.
//!
//! Everything here is a pure decision over normalized records except
//! [`apply_price_guard`], which awaits a human decision for accounts the price
//! check cannot accept on its own.

use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;

use crate::{
    confirm::{ConfirmationReason, ConfirmationRequester},
    token::{MintAccountRecord, TokenAccountRecord, TokenProgramKind},
};

/// Accounts below the session's rent-exempt threshold are not real, funded
/// accounts and never leave discovery.
pub fn meets_rent_floor(record: &TokenAccountRecord) -> bool {
    record.lamports >= record.rent_exempt_reserve_threshold
}

pub fn eligible_for_close(record: &TokenAccountRecord) -> bool {
    meets_rent_floor(record) && record.token_amount.is_zero() && !record.is_frozen
}

/// Zero or unparsable balances are not burnable; the account is skipped for
/// this operation, not reported as an error.
pub fn eligible_for_burn(record: &TokenAccountRecord) -> bool {
    meets_rent_floor(record)
        && record.token_amount.raw().is_some_and(|amount| amount > 0)
        && !record.is_frozen
        && !record.is_native
}

/// A mint can only be closed when nothing is outstanding, the wallet holds
/// mint or freeze authority, and the wallet is also the Token-2022 close
/// authority (legacy mints have no close instruction).
pub fn eligible_for_mint_close(mint: &MintAccountRecord, wallet: &Pubkey) -> bool {
    mint.supply.trim() == "0"
        && mint.has_authority(wallet)
        && mint.owner_program == TokenProgramKind::Token2022
        && mint.close_authority.as_ref() == Some(wallet)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceVerdict {
    Accept,
    NeedsConfirmation(ConfirmationReason),
}

pub fn price_verdict(
    record: &TokenAccountRecord,
    price_usd: Option<Decimal>,
    ceiling_usd: Decimal,
) -> PriceVerdict {
    let (Some(price), Some(ui_amount)) = (price_usd, record.token_amount.ui_amount()) else {
        return PriceVerdict::NeedsConfirmation(ConfirmationReason::PriceUnavailable);
    };

    match price.checked_mul(ui_amount) {
        Some(value_usd) if value_usd > ceiling_usd => PriceVerdict::NeedsConfirmation(
            ConfirmationReason::ValueAboveCeiling { value_usd, ceiling_usd },
        ),
        Some(_) => PriceVerdict::Accept,
        // Overflow means the balance is far beyond any ceiling.
        None => PriceVerdict::NeedsConfirmation(ConfirmationReason::ValueAboveCeiling {
            value_usd: Decimal::MAX,
            ceiling_usd,
        }),
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct PriceGuardOutcome {
    pub approved: Vec<TokenAccountRecord>,
    pub declined: Vec<TokenAccountRecord>,
}

/// Splits burn candidates into approved and declined. Accounts that need a
/// confirmation are declined when no requester is attached.
pub async fn apply_price_guard(
    records: Vec<TokenAccountRecord>,
    prices: &HashMap<Pubkey, Decimal>,
    ceiling_usd: Decimal,
    requester: Option<&ConfirmationRequester>,
) -> PriceGuardOutcome {
    let mut outcome = PriceGuardOutcome::default();

    for record in records {
        let verdict = price_verdict(&record, prices.get(&record.mint).copied(), ceiling_usd);
        let approved = match verdict {
            PriceVerdict::Accept => true,
            PriceVerdict::NeedsConfirmation(reason) => {
                log::info!("Account {} needs confirmation: {reason}", record.address);
                match requester {
                    Some(requester) => requester.request(record.address, record.mint, reason).await,
                    None => false,
                }
            }
        };

        if approved {
            outcome.approved.push(record);
        } else {
            log::info!("Account {} declined at the price guard", record.address);
            outcome.declined.push(record);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        confirm::confirmation_channel,
        tests::record_mock::{MintRecordBuilder, TokenRecordBuilder},
    };
    use rust_decimal_macros::dec;

    #[test]
    fn test_rent_floor() {
        let record = TokenRecordBuilder::new().with_lamports(2_039_280).with_threshold(2_039_280).build();
        assert!(meets_rent_floor(&record));

        let drained = TokenRecordBuilder::new().with_lamports(2_039_279).with_threshold(2_039_280).build();
        assert!(!meets_rent_floor(&drained));
        assert!(!eligible_for_close(&drained));
        assert!(!eligible_for_burn(&drained));
    }

    #[test]
    fn test_close_requires_empty_unfrozen_account() {
        assert!(eligible_for_close(&TokenRecordBuilder::new().with_amount(0).build()));
        assert!(!eligible_for_close(&TokenRecordBuilder::new().with_amount(1).build()));
        assert!(!eligible_for_close(&TokenRecordBuilder::new().with_amount(0).frozen().build()));
    }

    #[test]
    fn test_burn_requires_positive_parsable_amount() {
        assert!(eligible_for_burn(&TokenRecordBuilder::new().with_amount(5).build()));
        assert!(!eligible_for_burn(&TokenRecordBuilder::new().with_amount(0).build()));
        assert!(!eligible_for_burn(&TokenRecordBuilder::new().with_raw_amount("NaN").build()));
        assert!(!eligible_for_burn(&TokenRecordBuilder::new().with_amount(5).frozen().build()));
        assert!(!eligible_for_burn(&TokenRecordBuilder::new().with_amount(5).native().build()));
    }

    #[test]
    fn test_mint_close_rules() {
        let wallet = Pubkey::new_unique();
        let closeable = MintRecordBuilder::new(&wallet).build();
        assert!(eligible_for_mint_close(&closeable, &wallet));

        let via_freeze = MintRecordBuilder::new(&wallet).freeze_authority_only().build();
        assert!(eligible_for_mint_close(&via_freeze, &wallet));

        assert!(!eligible_for_mint_close(&MintRecordBuilder::new(&wallet).with_supply("1").build(), &wallet));
        assert!(!eligible_for_mint_close(&closeable, &Pubkey::new_unique()));
        assert!(!eligible_for_mint_close(&MintRecordBuilder::new(&wallet).legacy().build(), &wallet));
        assert!(!eligible_for_mint_close(
            &MintRecordBuilder::new(&wallet).with_close_authority(None).build(),
            &wallet
        ));
    }

    #[test]
    fn test_price_verdicts() {
        // 15 tokens at $1 against a $10 ceiling
        let record = TokenRecordBuilder::new().with_amount(15_000_000).with_decimals(6).build();
        assert_eq!(
            price_verdict(&record, Some(dec!(1)), dec!(10)),
            PriceVerdict::NeedsConfirmation(ConfirmationReason::ValueAboveCeiling {
                value_usd: dec!(15),
                ceiling_usd: dec!(10)
            })
        );
        assert_eq!(price_verdict(&record, Some(dec!(0.5)), dec!(10)), PriceVerdict::Accept);
        assert_eq!(
            price_verdict(&record, None, dec!(10)),
            PriceVerdict::NeedsConfirmation(ConfirmationReason::PriceUnavailable)
        );
    }

    #[test]
    fn test_value_equal_to_ceiling_is_accepted() {
        let record = TokenRecordBuilder::new().with_amount(10).with_decimals(0).build();
        assert_eq!(price_verdict(&record, Some(dec!(1)), dec!(10)), PriceVerdict::Accept);
    }

    #[tokio::test]
    async fn test_price_guard_without_requester_declines() {
        let cheap = TokenRecordBuilder::new().with_amount(1).with_decimals(0).build();
        let unpriced = TokenRecordBuilder::new().with_amount(1).with_decimals(0).build();
        let prices = HashMap::from([(cheap.mint, dec!(0.01))]);

        let outcome =
            apply_price_guard(vec![cheap.clone(), unpriced.clone()], &prices, dec!(10), None).await;
        assert_eq!(outcome.approved, vec![cheap]);
        assert_eq!(outcome.declined, vec![unpriced]);
    }

    #[tokio::test]
    async fn test_price_guard_asks_and_honors_answer() {
        let expensive = TokenRecordBuilder::new().with_amount(15).with_decimals(0).build();
        let unpriced = TokenRecordBuilder::new().with_amount(1).with_decimals(0).build();
        let prices = HashMap::from([(expensive.mint, dec!(1))]);

        let (requester, handler) = confirmation_channel(4);
        let expensive_address = expensive.address;
        let serve = tokio::spawn(handler.serve(move |request| {
            // Decline the expensive one, approve the unpriced one.
            request.account != expensive_address
        }));

        let outcome = apply_price_guard(
            vec![expensive.clone(), unpriced.clone()],
            &prices,
            dec!(10),
            Some(&requester),
        )
        .await;
        drop(requester);
        serve.await.unwrap();

        assert_eq!(outcome.approved, vec![unpriced]);
        assert_eq!(outcome.declined, vec![expensive]);
    }
}
