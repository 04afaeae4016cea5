use dialoguer::Confirm;
use reclaim_lib::{
    confirm::{ConfirmationHandler, ConfirmationRequest},
    error::ReclaimError,
    WalletCapability,
};
use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::Transaction};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationPolicy {
    Interactive,
    AssumeYes,
    AssumeNo,
}

impl ConfirmationPolicy {
    pub fn from_flags(assume_yes: bool, assume_no: bool) -> Self {
        match (assume_yes, assume_no) {
            (true, _) => ConfirmationPolicy::AssumeYes,
            (_, true) => ConfirmationPolicy::AssumeNo,
            _ => ConfirmationPolicy::Interactive,
        }
    }
}

/// Blocking yes/no prompt; any terminal error counts as "no".
async fn ask(prompt: String) -> bool {
    tokio::task::spawn_blocking(move || {
        Confirm::new().with_prompt(prompt).default(false).interact().unwrap_or(false)
    })
    .await
    .unwrap_or(false)
}

async fn decide(policy: ConfirmationPolicy, request: &ConfirmationRequest) -> bool {
    match policy {
        ConfirmationPolicy::AssumeYes => true,
        ConfirmationPolicy::AssumeNo => false,
        ConfirmationPolicy::Interactive => {
            ask(format!(
                "Burn tokens in {} (mint {}): {}. Proceed?",
                request.account, request.mint, request.reason
            ))
            .await
        }
    }
}

/// Answers price-guard confirmations until the requester side is dropped.
pub fn spawn_confirmation_handler(
    mut handler: ConfirmationHandler,
    policy: ConfirmationPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = handler.next_request().await {
            let approved = decide(policy, &request).await;
            log::info!(
                "Confirmation {} for {}: {}",
                request.id,
                request.account,
                if approved { "approved" } else { "declined" }
            );
            handler.resolve(request.id, approved);
        }
    })
}

/// Asks the operator before every batch is signed.
pub struct ApprovingWallet {
    inner: Arc<dyn WalletCapability>,
}

impl ApprovingWallet {
    pub fn new(inner: Arc<dyn WalletCapability>) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl WalletCapability for ApprovingWallet {
    fn public_key(&self) -> Option<Pubkey> {
        self.inner.public_key()
    }

    async fn sign_and_send(&self, transaction: Transaction) -> Result<Signature, ReclaimError> {
        let prompt = format!(
            "Sign batch with {} instructions over {} accounts?",
            transaction.message.instructions.len(),
            transaction.message.account_keys.len()
        );
        if !ask(prompt).await {
            return Err(ReclaimError::UserRejection("User rejected the request".to_string()));
        }
        self.inner.sign_and_send(transaction).await
    }
}
