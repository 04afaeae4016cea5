use serde::Serialize;
use solana_sdk::{pubkey::Pubkey, signature::Signature};

use crate::pipeline::OperationResult;

/// A batch that landed on chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmedBatch {
    pub batch_index: usize,
    pub signature: Signature,
    pub accounts: Vec<Pubkey>,
    pub reclaimed_lamports: u64,
    pub fee_lamports: u64,
}

/// Totals for one `close_selected` run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub accounts_attempted: usize,
    pub accounts_succeeded: usize,
    pub batches_attempted: usize,
    pub batches_failed: usize,
    pub signatures: Vec<Signature>,
    pub confirmed_batches: Vec<ConfirmedBatch>,
    pub closed_accounts: Vec<Pubkey>,
    /// Accounts dropped before submission (price guard declines, builder skips).
    pub excluded_accounts: Vec<Pubkey>,
    /// Rent returned to the wallet, net of fees.
    pub recovered_lamports: u64,
    pub fees_paid_lamports: u64,
    pub last_error: Option<String>,
    pub aborted: bool,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.accounts_succeeded > 0
    }
}

#[derive(Debug, Default)]
pub struct ResultAggregator {
    summary: RunSummary,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &OperationResult) {
        let summary = &mut self.summary;
        summary.batches_attempted += 1;
        summary.accounts_attempted += result.accounts_attempted;

        match (&result.signature, &result.error) {
            (Some(signature), None) => {
                summary.accounts_succeeded += result.accounts_succeeded;
                summary.signatures.push(*signature);
                summary.confirmed_batches.push(ConfirmedBatch {
                    batch_index: result.batch_index,
                    signature: *signature,
                    accounts: result.accounts.clone(),
                    reclaimed_lamports: result.reclaimed_lamports,
                    fee_lamports: result.fee_lamports,
                });
                summary.closed_accounts.extend(result.accounts.iter().copied());
                summary.fees_paid_lamports += result.fee_lamports;
                summary.recovered_lamports +=
                    result.reclaimed_lamports.saturating_sub(result.fee_lamports);
            }
            (_, error) => {
                summary.batches_failed += 1;
                let message = error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| format!("Batch {} failed", result.batch_index));
                log::error!("Batch {} recorded as failed: {message}", result.batch_index);
                // Later failures replace earlier ones for display.
                summary.last_error = Some(message);
            }
        }
    }

    pub fn exclude(&mut self, accounts: impl IntoIterator<Item = Pubkey>) {
        self.summary.excluded_accounts.extend(accounts);
    }

    pub fn finish(mut self, aborted: bool) -> RunSummary {
        self.summary.aborted = aborted;
        self.summary
    }
}
