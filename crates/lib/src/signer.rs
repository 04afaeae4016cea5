use solana_client::nonblocking::rpc_client::RpcClient;
use solana_keychain::{Signer, SolanaSigner};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::Transaction,
};
use std::{fs, sync::Arc};

use crate::{error::ReclaimError, sanitize_error, wallet::WalletCapability};

const KEYPAIR_LEN: usize = 64;

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair, ReclaimError> {
    if bytes.len() != KEYPAIR_LEN {
        return Err(ReclaimError::SigningError(format!(
            "Private key must be exactly {KEYPAIR_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    Keypair::try_from(bytes).map_err(|e| {
        ReclaimError::SigningError(format!("Invalid private key bytes: {}", sanitize_error!(e)))
    })
}

pub struct KeypairUtil;

impl KeypairUtil {
    /// Loads a keypair from a keypair file path, a `[u8, ...]` array or a base58
    /// string, tried in that order.
    pub fn from_private_key_string(source: &str) -> Result<Keypair, ReclaimError> {
        if let Ok(contents) = fs::read_to_string(source) {
            let bytes: Vec<u8> = serde_json::from_str(&contents).map_err(|_| {
                ReclaimError::SigningError(
                    "Keypair file must contain a JSON array of 64 bytes".to_string(),
                )
            })?;
            return keypair_from_bytes(&bytes);
        }

        let trimmed = source.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            let bytes: Vec<u8> = serde_json::from_str(trimmed).map_err(|e| {
                ReclaimError::SigningError(format!("Failed to parse byte array: {}", sanitize_error!(e)))
            })?;
            return keypair_from_bytes(&bytes);
        }

        let bytes = bs58::decode(trimmed).into_vec().map_err(|e| {
            ReclaimError::SigningError(format!("Invalid base58 string: {}", sanitize_error!(e)))
        })?;
        keypair_from_bytes(&bytes)
    }
}

/// Wallet backed by a local keypair. Signs the fee-payer slot and hands the
/// transaction to the RPC node without waiting for confirmation.
pub struct KeypairWallet {
    signer: Arc<Signer>,
    rpc_client: Arc<RpcClient>,
}

impl KeypairWallet {
    pub fn new(keypair: &Keypair, rpc_client: Arc<RpcClient>) -> Result<Self, ReclaimError> {
        let signer = Signer::from_memory(&keypair.to_base58_string()).map_err(|e| {
            ReclaimError::SigningError(format!(
                "Failed to create keypair signer: {}",
                sanitize_error!(e)
            ))
        })?;
        Ok(Self { signer: Arc::new(signer), rpc_client })
    }

    pub fn from_source(source: &str, rpc_client: Arc<RpcClient>) -> Result<Self, ReclaimError> {
        Self::new(&KeypairUtil::from_private_key_string(source)?, rpc_client)
    }
}

#[async_trait::async_trait]
impl WalletCapability for KeypairWallet {
    fn public_key(&self) -> Option<Pubkey> {
        Some(self.signer.pubkey())
    }

    async fn sign_and_send(&self, mut transaction: Transaction) -> Result<Signature, ReclaimError> {
        let payer = self.signer.pubkey();
        let required = transaction.message.header.num_required_signatures as usize;
        let position = transaction
            .message
            .account_keys
            .iter()
            .take(required)
            .position(|key| *key == payer)
            .ok_or_else(|| {
                ReclaimError::SigningError(format!("{payer} is not a required signer"))
            })?;

        let message_bytes = transaction.message.serialize();
        let signature = self
            .signer
            .sign_message(&message_bytes)
            .await
            .map_err(ReclaimError::from)?;
        transaction.signatures[position] = signature;

        self.rpc_client.send_transaction(&transaction).await.map_err(|e| {
            ReclaimError::BatchSubmissionFailure(format!(
                "Failed to send transaction: {}",
                sanitize_error!(e)
            ))
        })
    }
}
