use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;

use crate::{
    chain::ChainClient,
    constant::mint_layout::{FREEZE_AUTHORITY_OFFSET, MINT_AUTHORITY_OFFSET},
    eligibility::meets_rent_floor,
    error::ReclaimError,
    token::{MintAccountRecord, ParsedAccount, TokenAccountRecord, TokenProgramKind},
};

/// Size of a base token account, used for the shared rent-exempt threshold.
pub const TOKEN_ACCOUNT_LEN: usize = 165;

fn discovery_error(wallet: &Pubkey, error: ReclaimError) -> ReclaimError {
    let error = match error {
        ReclaimError::DiscoveryFailure(_) => error,
        other => ReclaimError::DiscoveryFailure(other.to_string()),
    };
    log::error!("Discovery for wallet {wallet} failed: {error}");
    error
}

/// Minimum lamports of a funded token account, fetched from the chain's rent
/// parameters.
pub async fn rent_exempt_threshold(chain: &dyn ChainClient) -> Result<u64, ReclaimError> {
    chain.get_minimum_balance_for_rent_exemption(TOKEN_ACCOUNT_LEN).await.map_err(|e| {
        ReclaimError::DiscoveryFailure(format!("Failed to fetch rent-exempt threshold: {e}"))
    })
}

/// Every funded token account the wallet owns under both token programs.
///
/// `known_threshold` is the session's rent-exempt threshold when already
/// fetched; otherwise it is looked up alongside the two program queries. If
/// any query fails the whole pass fails.
pub async fn discover_token_accounts(
    chain: &dyn ChainClient,
    wallet: Option<Pubkey>,
    known_threshold: Option<u64>,
) -> Result<Vec<TokenAccountRecord>, ReclaimError> {
    let wallet = wallet.ok_or(ReclaimError::WalletNotConnected)?;

    let threshold_lookup = async {
        match known_threshold {
            Some(threshold) => Ok(threshold),
            None => rent_exempt_threshold(chain).await,
        }
    };

    let (legacy, token_2022, threshold) = tokio::try_join!(
        chain.list_token_accounts_by_owner(&wallet, TokenProgramKind::Legacy),
        chain.list_token_accounts_by_owner(&wallet, TokenProgramKind::Token2022),
        threshold_lookup,
    )
    .map_err(|e| discovery_error(&wallet, e))?;

    let mut records = Vec::with_capacity(legacy.len() + token_2022.len());
    for parsed in legacy.into_iter().chain(token_2022) {
        let ParsedAccount::Token(token) = parsed else {
            log::warn!("Ignoring non-token account {} in owner listing", parsed.address());
            continue;
        };
        let address = token.address.clone();
        match token.normalize(threshold) {
            Ok(record) if meets_rent_floor(&record) => records.push(record),
            Ok(record) => log::debug!(
                "Excluding {address}: {} lamports below rent-exempt threshold {threshold}",
                record.lamports
            ),
            Err(e) => log::warn!("Skipping account {address}: {e}"),
        }
    }

    log::info!("Discovered {} token accounts for {wallet}", records.len());
    Ok(records)
}

fn authority_filter(offset: usize, wallet: &Pubkey) -> Vec<RpcFilterType> {
    vec![RpcFilterType::Memcmp(Memcmp::new_base58_encoded(offset, wallet.as_ref()))]
}

/// Token-2022 mints where the wallet is mint or freeze authority.
pub async fn discover_mints(
    chain: &dyn ChainClient,
    wallet: Option<Pubkey>,
) -> Result<Vec<MintAccountRecord>, ReclaimError> {
    let wallet = wallet.ok_or(ReclaimError::WalletNotConnected)?;

    let (by_mint_authority, by_freeze_authority) = tokio::try_join!(
        chain.list_program_accounts(
            TokenProgramKind::Token2022,
            authority_filter(MINT_AUTHORITY_OFFSET, &wallet)
        ),
        chain.list_program_accounts(
            TokenProgramKind::Token2022,
            authority_filter(FREEZE_AUTHORITY_OFFSET, &wallet)
        ),
    )
    .map_err(|e| discovery_error(&wallet, e))?;

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for parsed in by_mint_authority.into_iter().chain(by_freeze_authority) {
        // Token accounts can match the byte pattern too.
        let ParsedAccount::Mint(mint) = parsed else { continue };
        if !seen.insert(mint.address.clone()) {
            continue;
        }
        let address = mint.address.clone();
        match mint.normalize() {
            Ok(record) if record.has_authority(&wallet) => records.push(record),
            Ok(_) => log::debug!("Excluding mint {address}: wallet holds no authority"),
            Err(e) => log::warn!("Skipping mint {address}: {e}"),
        }
    }

    log::info!("Discovered {} mints under authority of {wallet}", records.len());
    Ok(records)
}
