use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::{collections::HashSet, fmt, sync::Arc};

use crate::{
    aggregator::{ResultAggregator, RunSummary},
    builder::{build_batch, BuiltBatch},
    chain::ChainClient,
    config::SessionContext,
    confirm::ConfirmationRequester,
    discovery::{discover_mints, discover_token_accounts, rent_exempt_threshold},
    eligibility::{apply_price_guard, eligible_for_burn, eligible_for_close, eligible_for_mint_close},
    error::ReclaimError,
    fee::validate_referral,
    oracle::PriceBook,
    pipeline::{PipelineState, SubmissionPipeline},
    planner::{plan_batches, ReclaimTarget},
    token::TokenAccountRecord,
    wallet::{require_public_key, WalletCapability},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Operation {
    /// Close empty token accounts
    Close,
    /// Burn the remaining balance, then close
    #[value(name = "burn-close")]
    BurnAndClose,
    /// Close Token-2022 mints with zero supply
    CloseMint,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Close => write!(f, "close"),
            Operation::BurnAndClose => write!(f, "burn-close"),
            Operation::CloseMint => write!(f, "close-mint"),
        }
    }
}

/// Dry-run view of what `close_selected` would submit.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPreview {
    pub batches: Vec<BuiltBatch>,
    pub accounts: usize,
    pub reclaimable_lamports: u64,
    pub fee_lamports: u64,
}

/// Discovered accounts, the caller's selection and the actions over them for
/// one operation.
///
/// Owns the working set exclusively; it changes only on discovery, selection
/// calls and after a run.
pub struct AccountManager {
    chain: Arc<dyn ChainClient>,
    wallet: Arc<dyn WalletCapability>,
    session: SessionContext,
    operation: Operation,
    price_book: Option<Arc<PriceBook>>,
    confirmer: Option<ConfirmationRequester>,

    /// Fetched on the first token-account discovery, then reused.
    rent_threshold: Option<u64>,
    accounts: Vec<ReclaimTarget>,
    selected: Vec<Pubkey>,
    is_loading: bool,
    is_closing: bool,
    error: Option<String>,
    success: bool,
    signatures: Vec<Signature>,
}

impl AccountManager {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        wallet: Arc<dyn WalletCapability>,
        session: SessionContext,
        operation: Operation,
    ) -> Self {
        Self {
            chain,
            wallet,
            session,
            operation,
            price_book: None,
            confirmer: None,
            rent_threshold: None,
            accounts: Vec::new(),
            selected: Vec::new(),
            is_loading: false,
            is_closing: false,
            error: None,
            success: false,
            signatures: Vec::new(),
        }
    }

    pub fn with_price_book(mut self, price_book: Arc<PriceBook>) -> Self {
        self.price_book = Some(price_book);
        self
    }

    pub fn with_confirmation(mut self, requester: ConfirmationRequester) -> Self {
        self.confirmer = Some(requester);
        self
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn accounts(&self) -> &[ReclaimTarget] {
        &self.accounts
    }

    pub fn selected(&self) -> &[Pubkey] {
        &self.selected
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_closing(&self) -> bool {
        self.is_closing
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Re-runs discovery. On failure the last known list is kept and the error
    /// is both stored and returned.
    pub async fn refresh(&mut self) -> Result<(), ReclaimError> {
        match self.load().await {
            Ok(()) => {
                self.error = None;
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn load(&mut self) -> Result<(), ReclaimError> {
        self.is_loading = true;
        let result = self.discover().await;
        self.is_loading = false;

        let accounts = result?;
        let present: HashSet<Pubkey> = accounts.iter().map(ReclaimTarget::address).collect();
        self.selected.retain(|address| present.contains(address));
        self.accounts = accounts;
        Ok(())
    }

    async fn session_rent_threshold(&mut self) -> Result<u64, ReclaimError> {
        if let Some(threshold) = self.rent_threshold {
            return Ok(threshold);
        }
        let threshold = rent_exempt_threshold(self.chain.as_ref()).await?;
        self.rent_threshold = Some(threshold);
        Ok(threshold)
    }

    async fn discover(&mut self) -> Result<Vec<ReclaimTarget>, ReclaimError> {
        let wallet = require_public_key(self.wallet.as_ref())?;
        Ok(match self.operation {
            Operation::Close | Operation::BurnAndClose => {
                let threshold = self.session_rent_threshold().await?;
                let eligible: fn(&TokenAccountRecord) -> bool = match self.operation {
                    Operation::Close => eligible_for_close,
                    _ => eligible_for_burn,
                };
                discover_token_accounts(self.chain.as_ref(), Some(wallet), Some(threshold))
                    .await?
                    .into_iter()
                    .filter(eligible)
                    .map(ReclaimTarget::Token)
                    .collect()
            }
            Operation::CloseMint => discover_mints(self.chain.as_ref(), Some(wallet))
                .await?
                .into_iter()
                .filter(|mint| eligible_for_mint_close(mint, &wallet))
                .map(ReclaimTarget::Mint)
                .collect(),
        })
    }

    /// Adds or removes `address` from the selection. Unknown addresses are
    /// ignored. Returns whether the account is selected afterwards.
    pub fn toggle_selection(&mut self, address: &Pubkey) -> bool {
        if let Some(position) = self.selected.iter().position(|a| a == address) {
            self.selected.remove(position);
            return false;
        }
        if self.accounts.iter().any(|t| t.address() == *address) {
            self.selected.push(*address);
            return true;
        }
        false
    }

    pub fn select_all(&mut self) {
        self.selected = self.accounts.iter().map(ReclaimTarget::address).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    fn selected_targets(&self) -> Vec<ReclaimTarget> {
        self.selected
            .iter()
            .filter_map(|address| self.accounts.iter().find(|t| t.address() == *address).cloned())
            .collect()
    }

    /// Builds the batches for the current selection without price checks,
    /// referral lookups or submission.
    pub fn preview_selected(&self) -> Result<RunPreview, ReclaimError> {
        let wallet = require_public_key(self.wallet.as_ref())?;
        let targets = self.selected_targets();
        let batch_size = self.session.batch_sizes.for_operation(self.operation);

        let batches: Vec<BuiltBatch> = plan_batches(&targets, batch_size)
            .iter()
            .filter_map(|plan| build_batch(self.operation, plan, &wallet, &self.session, None))
            .collect();

        Ok(RunPreview {
            accounts: batches.iter().map(|b| b.included.len()).sum(),
            reclaimable_lamports: batches.iter().map(|b| b.reclaimed_lamports).sum(),
            fee_lamports: batches.iter().map(BuiltBatch::fee_lamports).sum(),
            batches,
        })
    }

    /// Closes every selected account: price guard (burn only), batching,
    /// sequential submission, then a final refresh.
    pub async fn close_selected(&mut self) -> Result<RunSummary, ReclaimError> {
        let wallet = match require_public_key(self.wallet.as_ref()) {
            Ok(wallet) => wallet,
            Err(e) => {
                self.error = Some(e.to_string());
                return Err(e);
            }
        };

        let mut targets = self.selected_targets();
        if targets.is_empty() {
            return Ok(RunSummary::default());
        }

        self.is_closing = true;
        self.success = false;
        self.error = None;
        self.signatures.clear();
        let mut aggregator = ResultAggregator::new();

        if self.operation == Operation::BurnAndClose {
            let declined = self.guard_burn_targets(&mut targets).await;
            if !declined.is_empty() {
                self.selected.retain(|a| !declined.contains(a));
                aggregator.exclude(declined);
            }
        }

        let referral = validate_referral(self.chain.as_ref(), self.session.fees.referral, &wallet).await;

        let batch_size = self.session.batch_sizes.for_operation(self.operation);
        let mut batches = Vec::new();
        for plan in plan_batches(&targets, batch_size) {
            if let Some(built) = build_batch(self.operation, &plan, &wallet, &self.session, referral) {
                aggregator.exclude(built.skipped.iter().map(|(a, _)| *a));
                batches.push(built);
            } else {
                aggregator.exclude(plan.targets.iter().map(ReclaimTarget::address));
            }
        }

        let mut pipeline =
            SubmissionPipeline::new(self.chain.as_ref(), self.wallet.as_ref(), self.session.timing);
        let outcome = pipeline.run(&batches).await;
        for result in &outcome.results {
            aggregator.record(result);
        }
        let summary = aggregator.finish(outcome.terminal == PipelineState::Aborted);

        log::info!(
            "{} run finished ({:?}): {}/{} accounts, {} lamports recovered",
            self.operation,
            outcome.terminal,
            summary.accounts_succeeded,
            summary.accounts_attempted,
            summary.recovered_lamports
        );

        let closed: HashSet<Pubkey> = summary.closed_accounts.iter().copied().collect();
        self.accounts.retain(|t| !closed.contains(&t.address()));
        self.selected.retain(|a| !closed.contains(a));
        self.signatures = summary.signatures.clone();
        self.success = summary.success();
        self.error = summary.last_error.clone();

        if let Err(e) = self.load().await {
            log::error!("Refresh after {} run failed: {e}", self.operation);
            if self.error.is_none() {
                self.error = Some(e.to_string());
            }
        }

        self.is_closing = false;
        Ok(summary)
    }

    /// Drops burn targets the price guard does not approve and returns their
    /// addresses.
    async fn guard_burn_targets(&self, targets: &mut Vec<ReclaimTarget>) -> Vec<Pubkey> {
        let records: Vec<TokenAccountRecord> = targets
            .iter()
            .filter_map(|t| match t {
                ReclaimTarget::Token(record) => Some(record.clone()),
                ReclaimTarget::Mint(_) => None,
            })
            .collect();

        let prices = match &self.price_book {
            Some(book) => {
                let mints: Vec<Pubkey> = records.iter().map(|r| r.mint).collect();
                book.lookup_usd(&mints).await
            }
            None => Default::default(),
        };

        let outcome = apply_price_guard(
            records,
            &prices,
            self.session.price_guard.ceiling_usd,
            self.confirmer.as_ref(),
        )
        .await;

        let declined: Vec<Pubkey> = outcome.declined.iter().map(|r| r.address).collect();
        targets.retain(|t| !declined.contains(&t.address()));
        declined
    }
}
