use std::sync::Arc;

use mockall::automock;
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::RpcFilterType,
    rpc_request::TokenAccountsFilter,
};
use solana_sdk::{account::Account, hash::Hash, pubkey::Pubkey, signature::Signature};
use solana_transaction_status_client_types::TransactionConfirmationStatus;

use crate::{
    error::ReclaimError,
    sanitize_error,
    token::{ParsedAccount, TokenProgramKind},
};

/// Last known status of a submitted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureState {
    Processed,
    Confirmed,
    Finalized,
    /// The transaction landed with an on-chain error.
    Failed(String),
}

impl SignatureState {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SignatureState::Confirmed | SignatureState::Finalized)
    }
}

/// Read-side chain capability used by discovery and the submission pipeline.
#[automock]
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    async fn list_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        program: TokenProgramKind,
    ) -> Result<Vec<ParsedAccount>, ReclaimError>;

    async fn list_program_accounts(
        &self,
        program: TokenProgramKind,
        filters: Vec<RpcFilterType>,
    ) -> Result<Vec<ParsedAccount>, ReclaimError>;

    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<Account>, ReclaimError>;

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, ReclaimError>;

    async fn get_latest_blockhash(&self) -> Result<Hash, ReclaimError>;

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, ReclaimError>;

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureState>, ReclaimError>;
}

pub struct RpcChainClient {
    rpc_client: Arc<RpcClient>,
}

impl RpcChainClient {
    pub fn new(rpc_client: Arc<RpcClient>) -> Self {
        Self { rpc_client }
    }
}

#[async_trait::async_trait]
impl ChainClient for RpcChainClient {
    async fn list_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        program: TokenProgramKind,
    ) -> Result<Vec<ParsedAccount>, ReclaimError> {
        let keyed_accounts = self
            .rpc_client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(program.program_id()))
            .await
            .map_err(|e| {
                ReclaimError::DiscoveryFailure(format!(
                    "Failed to list {program} accounts for {owner}: {}",
                    sanitize_error!(e)
                ))
            })?;

        Ok(keyed_accounts
            .iter()
            .filter_map(|keyed| {
                let parsed = ParsedAccount::from_ui_account(&keyed.pubkey, &keyed.account);
                if parsed.is_none() {
                    log::warn!("Skipping unreadable {program} account {}", keyed.pubkey);
                }
                parsed
            })
            .collect())
    }

    async fn list_program_accounts(
        &self,
        program: TokenProgramKind,
        filters: Vec<RpcFilterType>,
    ) -> Result<Vec<ParsedAccount>, ReclaimError> {
        let config = RpcProgramAccountsConfig {
            filters: Some(filters),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.rpc_client.commitment()),
                ..Default::default()
            },
            ..Default::default()
        };

        let accounts = self
            .rpc_client
            .get_program_accounts_with_config(&program.program_id(), config)
            .await
            .map_err(|e| {
                ReclaimError::DiscoveryFailure(format!(
                    "Failed to list {program} program accounts: {}",
                    sanitize_error!(e)
                ))
            })?;

        Ok(accounts
            .iter()
            .filter_map(|(address, account)| {
                let parsed =
                    ParsedAccount::from_bytes(address, &account.owner, account.lamports, &account.data);
                if parsed.is_none() {
                    log::warn!("Skipping unreadable {program} program account {address}");
                }
                parsed
            })
            .collect())
    }

    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<Account>, ReclaimError> {
        let response = self
            .rpc_client
            .get_account_with_commitment(address, self.rpc_client.commitment())
            .await?;
        Ok(response.value)
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, ReclaimError> {
        Ok(self.rpc_client.get_minimum_balance_for_rent_exemption(data_len).await?)
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, ReclaimError> {
        Ok(self.rpc_client.get_latest_blockhash().await?)
    }

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, ReclaimError> {
        Ok(self.rpc_client.is_blockhash_valid(blockhash, self.rpc_client.commitment()).await?)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureState>, ReclaimError> {
        let response = self.rpc_client.get_signature_statuses(&[*signature]).await?;

        Ok(response.value.into_iter().next().flatten().map(|status| {
            if let Some(err) = status.err {
                return SignatureState::Failed(err.to_string());
            }
            match status.confirmation_status {
                Some(TransactionConfirmationStatus::Finalized) => SignatureState::Finalized,
                Some(TransactionConfirmationStatus::Confirmed) => SignatureState::Confirmed,
                Some(TransactionConfirmationStatus::Processed) | None => SignatureState::Processed,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{
        account_mock::{MintAccountMockBuilder, TokenAccountMockBuilder},
        rpc_mock::RpcMockBuilder,
    };
    use serde_json::json;
    use solana_client::rpc_request::RpcRequest;

    #[tokio::test]
    async fn test_list_token_accounts_parses_json() {
        let owner = Pubkey::new_unique();
        let address = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let rpc = RpcMockBuilder::new()
            .with_token_accounts_by_owner(vec![(address, mint, "0", 6)])
            .build();
        let client = RpcChainClient::new(rpc);

        let accounts =
            client.list_token_accounts_by_owner(&owner, TokenProgramKind::Legacy).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].address(), address.to_string());
        let ParsedAccount::Token(token) = &accounts[0] else { panic!("Expected token account") };
        assert_eq!(token.mint, Some(mint.to_string()));
        assert_eq!(token.decimals, Some(6));
    }

    #[tokio::test]
    async fn test_get_account_info_found_and_missing() {
        let account = TokenAccountMockBuilder::new().build();
        let client = RpcChainClient::new(RpcMockBuilder::new().with_account_info(&account).build());
        let fetched = client.get_account_info(&Pubkey::new_unique()).await.unwrap().unwrap();
        assert_eq!(fetched.lamports, account.lamports);

        let client = RpcChainClient::new(RpcMockBuilder::new().with_account_not_found().build());
        assert!(client.get_account_info(&Pubkey::new_unique()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_program_accounts_decodes_mints() {
        let mint = MintAccountMockBuilder::new().with_supply(0).build_token2022();
        let address = Pubkey::new_unique();
        let rpc = RpcMockBuilder::new().with_program_accounts(vec![(address, mint)]).build();
        let client = RpcChainClient::new(rpc);

        let accounts =
            client.list_program_accounts(TokenProgramKind::Token2022, vec![]).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert!(matches!(accounts[0], ParsedAccount::Mint(_)));
    }

    #[tokio::test]
    async fn test_signature_status_mapping() {
        let rpc = RpcMockBuilder::new()
            .with_custom_mock(
                RpcRequest::GetSignatureStatuses,
                json!({
                    "context": { "slot": 1 },
                    "value": [{
                        "slot": 1,
                        "confirmations": null,
                        "err": null,
                        "status": { "Ok": null },
                        "confirmationStatus": "confirmed"
                    }]
                }),
            )
            .build();
        let client = RpcChainClient::new(rpc);
        let status = client.get_signature_status(&Signature::default()).await.unwrap();
        assert_eq!(status, Some(SignatureState::Confirmed));
    }

    #[tokio::test]
    async fn test_signature_status_on_chain_error() {
        let rpc = RpcMockBuilder::new()
            .with_custom_mock(
                RpcRequest::GetSignatureStatuses,
                json!({
                    "context": { "slot": 1 },
                    "value": [{
                        "slot": 1,
                        "confirmations": 0,
                        "err": "AccountInUse",
                        "status": { "Err": "AccountInUse" },
                        "confirmationStatus": "processed"
                    }]
                }),
            )
            .build();
        let client = RpcChainClient::new(rpc);
        let status = client.get_signature_status(&Signature::default()).await.unwrap();
        assert!(matches!(status, Some(SignatureState::Failed(_))));
    }

    #[tokio::test]
    async fn test_signature_status_unknown() {
        let rpc = RpcMockBuilder::new()
            .with_custom_mock(
                RpcRequest::GetSignatureStatuses,
                json!({ "context": { "slot": 1 }, "value": [null] }),
            )
            .build();
        let client = RpcChainClient::new(rpc);
        assert_eq!(client.get_signature_status(&Signature::default()).await.unwrap(), None);
    }

    #[test]
    fn test_confirmed_states() {
        assert!(SignatureState::Confirmed.is_confirmed());
        assert!(SignatureState::Finalized.is_confirmed());
        assert!(!SignatureState::Processed.is_confirmed());
        assert!(!SignatureState::Failed("x".to_string()).is_confirmed());
    }
}
