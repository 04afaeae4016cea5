use serde::{Deserialize, Serialize};
use solana_client::client_error::ClientError;
use solana_program::program_error::ProgramError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
pub enum ReclaimError {
    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Account discovery failed: {0}")]
    DiscoveryFailure(String),

    #[error("Batch submission failed: {0}")]
    BatchSubmissionFailure(String),

    #[error("User rejected signing: {0}")]
    UserRejection(String),

    #[error("Blockhash expired before confirmation: {0}")]
    BlockhashExpiry(String),

    #[error("Price lookup failed: {0}")]
    PriceLookupFailure(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Signing error: {0}")]
    SigningError(String),

    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl ReclaimError {
    /// Whether this error stops the whole run rather than a single batch or account.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, ReclaimError::WalletNotConnected | ReclaimError::UserRejection(_))
    }
}

const USER_REJECTION_MARKERS: [&str; 4] =
    ["user rejected", "rejected the request", "user denied", "user declined"];

/// Wallets report a declined signature only through their error text.
pub fn is_user_rejection(message: &str) -> bool {
    let lowered = message.to_lowercase();
    USER_REJECTION_MARKERS.iter().any(|marker| lowered.contains(marker))
}

fn sanitized(message: String) -> String {
    #[cfg(feature = "unsafe-debug")]
    {
        message
    }
    #[cfg(not(feature = "unsafe-debug"))]
    {
        crate::sanitize::sanitize_message(&message)
    }
}

impl From<ClientError> for ReclaimError {
    fn from(e: ClientError) -> Self {
        ReclaimError::RpcError(sanitized(e.to_string()))
    }
}

impl From<ProgramError> for ReclaimError {
    fn from(e: ProgramError) -> Self {
        ReclaimError::InvalidAccount(sanitized(e.to_string()))
    }
}

impl From<std::io::Error> for ReclaimError {
    fn from(e: std::io::Error) -> Self {
        ReclaimError::InternalError(sanitized(e.to_string()))
    }
}

impl From<bs58::decode::Error> for ReclaimError {
    fn from(e: bs58::decode::Error) -> Self {
        ReclaimError::SerializationError(sanitized(e.to_string()))
    }
}

impl From<solana_keychain::SignerError> for ReclaimError {
    fn from(e: solana_keychain::SignerError) -> Self {
        let message = e.to_string();
        if is_user_rejection(&message) {
            ReclaimError::UserRejection(sanitized(message))
        } else {
            ReclaimError::SigningError(sanitized(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_conversion() {
        let client_error = ClientError::from(std::io::Error::other("connection refused"));
        let error: ReclaimError = client_error.into();
        assert!(matches!(error, ReclaimError::RpcError(_)));
        if let ReclaimError::RpcError(msg) = error {
            assert!(msg.contains("connection refused"));
        }
    }

    #[test]
    fn test_client_error_conversion_redacts_api_key() {
        let client_error = ClientError::from(std::io::Error::other(
            "error sending request for url (https://mainnet.example-rpc.com/?api-key=abc123secret)",
        ));
        let error: ReclaimError = client_error.into();
        if let ReclaimError::RpcError(msg) = error {
            assert!(!msg.contains("abc123secret"));
        } else {
            panic!("Expected RpcError");
        }
    }

    #[test]
    fn test_program_error_conversion() {
        let error: ReclaimError = ProgramError::InvalidAccountData.into();
        assert!(matches!(error, ReclaimError::InvalidAccount(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let error: ReclaimError = std::io::Error::other("file not found").into();
        assert!(matches!(error, ReclaimError::InternalError(ref msg) if msg.contains("file not found")));
    }

    #[test]
    fn test_bs58_decode_error_conversion() {
        let bs58_error = bs58::decode::Error::InvalidCharacter { character: 'x', index: 0 };
        let error: ReclaimError = bs58_error.into();
        assert!(matches!(error, ReclaimError::SerializationError(_)));
    }

    #[test]
    fn test_signer_error_classification() {
        let declined: ReclaimError =
            solana_keychain::SignerError::RemoteApiError("User rejected the request".to_string())
                .into();
        assert!(matches!(declined, ReclaimError::UserRejection(_)));
        assert!(declined.is_run_fatal());

        let failed: ReclaimError =
            solana_keychain::SignerError::SigningFailed("device offline".to_string()).into();
        assert!(matches!(failed, ReclaimError::SigningError(ref msg) if msg.contains("device offline")));
    }

    #[test]
    fn test_user_rejection_detection() {
        assert!(is_user_rejection("User rejected the request."));
        assert!(is_user_rejection("WalletSignTransactionError: user declined"));
        assert!(is_user_rejection("Transaction REJECTED THE REQUEST by wallet"));
        assert!(!is_user_rejection("Blockhash not found"));
        assert!(!is_user_rejection("insufficient funds for fee"));
    }

    #[test]
    fn test_run_fatal_classification() {
        assert!(ReclaimError::WalletNotConnected.is_run_fatal());
        assert!(ReclaimError::UserRejection("declined".to_string()).is_run_fatal());
        assert!(!ReclaimError::BatchSubmissionFailure("x".to_string()).is_run_fatal());
        assert!(!ReclaimError::BlockhashExpiry("x".to_string()).is_run_fatal());
        assert!(!ReclaimError::DiscoveryFailure("x".to_string()).is_run_fatal());
        assert!(!ReclaimError::PriceLookupFailure("x".to_string()).is_run_fatal());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(ReclaimError::WalletNotConnected.to_string(), "Wallet not connected");
        assert_eq!(ReclaimError::RateLimitExceeded.to_string(), "Rate limit exceeded");
        assert_eq!(
            ReclaimError::BlockhashExpiry("batch 2".to_string()).to_string(),
            "Blockhash expired before confirmation: batch 2"
        );
    }

    #[test]
    fn test_error_serialization() {
        let json =
            serde_json::to_string(&ReclaimError::UserRejection("declined".to_string())).unwrap();
        assert!(json.contains("UserRejection"));
    }
}
