use serde::Serialize;
use solana_sdk::{
    hash::Hash, message::Message, pubkey::Pubkey, signature::Signature, transaction::Transaction,
};
use tokio::time::sleep;

use crate::{
    builder::BuiltBatch,
    chain::{ChainClient, SignatureState},
    config::PipelineTiming,
    error::{is_user_rejection, ReclaimError},
    wallet::{require_public_key, WalletCapability},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Idle,
    Submitting(usize),
    Confirmed(usize),
    Failed(usize),
    Done,
    Aborted,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Aborted)
    }
}

/// Outcome of one batch. Batches are atomic, so every account in it shares
/// the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    pub batch_index: usize,
    pub signature: Option<Signature>,
    pub error: Option<ReclaimError>,
    pub accounts: Vec<Pubkey>,
    pub accounts_attempted: usize,
    pub accounts_succeeded: usize,
    pub reclaimed_lamports: u64,
    pub fee_lamports: u64,
}

impl OperationResult {
    fn success(batch: &BuiltBatch, signature: Signature) -> Self {
        Self {
            batch_index: batch.index,
            signature: Some(signature),
            error: None,
            accounts: batch.included.clone(),
            accounts_attempted: batch.included.len(),
            accounts_succeeded: batch.included.len(),
            reclaimed_lamports: batch.reclaimed_lamports,
            fee_lamports: batch.fee_lamports(),
        }
    }

    fn failure(batch: &BuiltBatch, error: ReclaimError) -> Self {
        Self {
            batch_index: batch.index,
            signature: None,
            error: Some(error),
            accounts: batch.included.clone(),
            accounts_attempted: batch.included.len(),
            accounts_succeeded: 0,
            reclaimed_lamports: 0,
            fee_lamports: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.signature.is_some() && self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub results: Vec<OperationResult>,
    pub terminal: PipelineState,
}

/// Submits batches strictly one after another: attach a fresh blockhash, hand
/// the transaction to the wallet, then poll until confirmation, on-chain
/// failure or blockhash expiry.
pub struct SubmissionPipeline<'a> {
    chain: &'a dyn ChainClient,
    wallet: &'a dyn WalletCapability,
    timing: PipelineTiming,
    state: PipelineState,
}

impl<'a> SubmissionPipeline<'a> {
    pub fn new(
        chain: &'a dyn ChainClient,
        wallet: &'a dyn WalletCapability,
        timing: PipelineTiming,
    ) -> Self {
        Self { chain, wallet, timing, state: PipelineState::Idle }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub async fn run(&mut self, batches: &[BuiltBatch]) -> PipelineOutcome {
        let mut results = Vec::with_capacity(batches.len());

        for (position, batch) in batches.iter().enumerate() {
            if position > 0 && !self.timing.inter_batch_delay.is_zero() {
                sleep(self.timing.inter_batch_delay).await;
            }

            self.state = PipelineState::Submitting(batch.index);
            log::info!(
                "Submitting batch {} ({} accounts, {} instructions)",
                batch.index,
                batch.included.len(),
                batch.instructions.len()
            );

            match self.submit_batch(batch).await {
                Ok(signature) => {
                    log::info!("Batch {} confirmed: {signature}", batch.index);
                    self.state = PipelineState::Confirmed(batch.index);
                    results.push(OperationResult::success(batch, signature));
                }
                Err(error) => {
                    log::error!(
                        "Batch {} failed ({} accounts: {}): {error}",
                        batch.index,
                        batch.included.len(),
                        batch.included.iter().map(Pubkey::to_string).collect::<Vec<_>>().join(", ")
                    );
                    self.state = PipelineState::Failed(batch.index);
                    let fatal = error.is_run_fatal();
                    results.push(OperationResult::failure(batch, error));
                    if fatal {
                        log::warn!("Run aborted after batch {}", batch.index);
                        self.state = PipelineState::Aborted;
                        return PipelineOutcome { results, terminal: self.state };
                    }
                }
            }
        }

        self.state = PipelineState::Done;
        PipelineOutcome { results, terminal: self.state }
    }

    async fn submit_batch(&self, batch: &BuiltBatch) -> Result<Signature, ReclaimError> {
        let payer = require_public_key(self.wallet)?;

        let blockhash = self.chain.get_latest_blockhash().await.map_err(|e| {
            ReclaimError::BatchSubmissionFailure(format!("Failed to fetch blockhash: {e}"))
        })?;

        let message = Message::new_with_blockhash(&batch.instructions, Some(&payer), &blockhash);
        let transaction = Transaction::new_unsigned(message);

        let signature =
            self.wallet.sign_and_send(transaction).await.map_err(classify_send_error)?;

        self.await_confirmation(&signature, &blockhash).await?;
        Ok(signature)
    }

    async fn await_confirmation(
        &self,
        signature: &Signature,
        blockhash: &Hash,
    ) -> Result<(), ReclaimError> {
        let mut consecutive_errors = 0u32;

        loop {
            // Reset only when both queries of this round answered.
            let mut round_failed = false;

            match self.chain.get_signature_status(signature).await {
                Ok(Some(status)) if status.is_confirmed() => return Ok(()),
                Ok(Some(SignatureState::Failed(err))) => {
                    return Err(ReclaimError::BatchSubmissionFailure(format!(
                        "Transaction {signature} failed: {err}"
                    )));
                }
                Ok(_) => {}
                Err(e) => {
                    round_failed = true;
                    log::warn!("Status poll for {signature} failed: {e}");
                }
            }

            match self.chain.is_blockhash_valid(blockhash).await {
                Ok(true) => {}
                Ok(false) => return self.final_status_check(signature).await,
                Err(e) => {
                    round_failed = true;
                    log::warn!("Blockhash check for {signature} failed: {e}");
                }
            }

            if round_failed {
                consecutive_errors += 1;
            } else {
                consecutive_errors = 0;
            }

            if consecutive_errors >= self.timing.max_consecutive_poll_errors.max(1) {
                return Err(ReclaimError::BatchSubmissionFailure(format!(
                    "Gave up confirming {signature} after {consecutive_errors} failed polling rounds"
                )));
            }

            sleep(self.timing.poll_interval).await;
        }
    }

    /// The transaction may have landed between the last status poll and the
    /// expiry check.
    async fn final_status_check(&self, signature: &Signature) -> Result<(), ReclaimError> {
        match self.chain.get_signature_status(signature).await {
            Ok(Some(status)) if status.is_confirmed() => Ok(()),
            _ => Err(ReclaimError::BlockhashExpiry(format!(
                "Blockhash expired before {signature} was confirmed"
            ))),
        }
    }
}

fn classify_send_error(error: ReclaimError) -> ReclaimError {
    match error {
        ReclaimError::UserRejection(_) | ReclaimError::WalletNotConnected => error,
        other => {
            let message = other.to_string();
            if is_user_rejection(&message) {
                ReclaimError::UserRejection(message)
            } else {
                ReclaimError::BatchSubmissionFailure(message)
            }
        }
    }
}
