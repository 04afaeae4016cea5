use mockall::automock;
use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::Transaction};

use crate::error::ReclaimError;

/// Signing capability of the connected wallet.
///
/// `sign_and_send` receives a transaction with the fee payer and blockhash
/// already attached. A declined signature is reported through the error text,
/// which the pipeline inspects with [`crate::error::is_user_rejection`].
#[automock]
#[async_trait::async_trait]
pub trait WalletCapability: Send + Sync {
    fn public_key(&self) -> Option<Pubkey>;

    async fn sign_and_send(&self, transaction: Transaction) -> Result<Signature, ReclaimError>;
}

/// Public key of a connected wallet, or `WalletNotConnected`.
pub fn require_public_key(wallet: &dyn WalletCapability) -> Result<Pubkey, ReclaimError> {
    wallet.public_key().ok_or(ReclaimError::WalletNotConnected)
}
