use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use solana_account_decoder::{UiAccount, UiAccountData, UiAccountEncoding};
use solana_program::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use spl_token_2022_interface::{
    extension::{
        mint_close_authority::MintCloseAuthority, transfer_fee::TransferFeeAmount,
        BaseStateWithExtensions, StateWithExtensions,
    },
    state::{
        Account as Token2022AccountState, AccountState as Token2022AccountStatus,
        Mint as Token2022MintState,
    },
};
use spl_token_interface::state::{
    Account as SplAccountState, AccountState as SplAccountStatus, Mint as SplMintState,
};
use std::str::FromStr;

use crate::{
    error::ReclaimError,
    token::{MintAccountRecord, TokenAccountRecord, TokenAmount, TokenProgramKind},
};

/// Loosely-typed account shape as it comes off the wire. Nothing downstream of
/// discovery sees this; it is normalized into a strict record or dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAccount {
    Token(ParsedTokenAccount),
    Mint(ParsedMintAccount),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedTokenAccount {
    pub address: String,
    pub program_owner: String,
    pub lamports: u64,
    pub mint: Option<String>,
    pub amount: Option<String>,
    pub decimals: Option<u8>,
    pub state: Option<String>,
    pub is_native: bool,
    pub withheld_amount: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedMintAccount {
    pub address: String,
    pub program_owner: String,
    pub lamports: u64,
    pub mint_authority: Option<String>,
    pub freeze_authority: Option<String>,
    pub close_authority: Option<String>,
    pub supply: Option<String>,
    pub decimals: Option<u8>,
    pub is_initialized: bool,
}

impl ParsedAccount {
    pub fn address(&self) -> &str {
        match self {
            ParsedAccount::Token(t) => &t.address,
            ParsedAccount::Mint(m) => &m.address,
        }
    }

    /// Reads an RPC `UiAccount`, either `jsonParsed` or base64 encoded.
    pub fn from_ui_account(address: &str, account: &UiAccount) -> Option<ParsedAccount> {
        match &account.data {
            UiAccountData::Json(parsed) => {
                Self::from_json(address, &account.owner, account.lamports, &parsed.parsed)
            }
            UiAccountData::Binary(data, UiAccountEncoding::Base64) => {
                let bytes = STANDARD.decode(data).ok()?;
                let address = Pubkey::from_str(address).ok()?;
                let owner = Pubkey::from_str(&account.owner).ok()?;
                Self::from_bytes(&address, &owner, account.lamports, &bytes)
            }
            _ => None,
        }
    }

    fn from_json(address: &str, owner: &str, lamports: u64, parsed: &Value) -> Option<ParsedAccount> {
        let info = parsed.get("info")?;
        let extensions = info.get("extensions").and_then(Value::as_array);
        let find_extension = |name: &str| {
            extensions?
                .iter()
                .find(|ext| ext.get("extension").and_then(Value::as_str) == Some(name))
                .and_then(|ext| ext.get("state"))
        };
        let str_field = |value: &Value, key: &str| value.get(key).and_then(Value::as_str).map(String::from);

        match parsed.get("type").and_then(Value::as_str)? {
            "account" => {
                let token_amount = info.get("tokenAmount");
                Some(ParsedAccount::Token(ParsedTokenAccount {
                    address: address.to_string(),
                    program_owner: owner.to_string(),
                    lamports,
                    mint: str_field(info, "mint"),
                    amount: token_amount.and_then(|t| str_field(t, "amount")),
                    decimals: token_amount
                        .and_then(|t| t.get("decimals"))
                        .and_then(Value::as_u64)
                        .and_then(|d| u8::try_from(d).ok()),
                    state: str_field(info, "state"),
                    is_native: info.get("isNative").and_then(Value::as_bool).unwrap_or(false),
                    withheld_amount: find_extension("transferFeeAmount")
                        .and_then(|state| state.get("withheldAmount"))
                        .and_then(Value::as_u64),
                }))
            }
            "mint" => Some(ParsedAccount::Mint(ParsedMintAccount {
                address: address.to_string(),
                program_owner: owner.to_string(),
                lamports,
                mint_authority: str_field(info, "mintAuthority"),
                freeze_authority: str_field(info, "freezeAuthority"),
                close_authority: find_extension("mintCloseAuthority")
                    .and_then(|state| str_field(state, "closeAuthority")),
                supply: str_field(info, "supply"),
                decimals: info.get("decimals").and_then(Value::as_u64).and_then(|d| u8::try_from(d).ok()),
                is_initialized: info.get("isInitialized").and_then(Value::as_bool).unwrap_or(false),
            })),
            _ => None,
        }
    }

    /// Reads raw account bytes in either the legacy `Pack` layout or the
    /// Token-2022 layout with extensions.
    pub fn from_bytes(
        address: &Pubkey,
        owner: &Pubkey,
        lamports: u64,
        data: &[u8],
    ) -> Option<ParsedAccount> {
        let program = TokenProgramKind::from_owner(owner).ok()?;
        let address_str = address.to_string();
        let owner_str = owner.to_string();

        match program {
            TokenProgramKind::Legacy => {
                if let Ok(acc) = SplAccountState::unpack(data) {
                    return Some(ParsedAccount::Token(ParsedTokenAccount {
                        address: address_str,
                        program_owner: owner_str,
                        lamports,
                        mint: Some(acc.mint.to_string()),
                        amount: Some(acc.amount.to_string()),
                        decimals: None,
                        state: Some(legacy_state_label(acc.state).to_string()),
                        is_native: acc.is_native.is_some(),
                        withheld_amount: None,
                    }));
                }
                let mint = SplMintState::unpack(data).ok()?;
                Some(ParsedAccount::Mint(ParsedMintAccount {
                    address: address_str,
                    program_owner: owner_str,
                    lamports,
                    mint_authority: Option::<Pubkey>::from(mint.mint_authority).map(|k| k.to_string()),
                    freeze_authority: Option::<Pubkey>::from(mint.freeze_authority)
                        .map(|k| k.to_string()),
                    close_authority: None,
                    supply: Some(mint.supply.to_string()),
                    decimals: Some(mint.decimals),
                    is_initialized: mint.is_initialized,
                }))
            }
            TokenProgramKind::Token2022 => {
                if let Ok(acc) = StateWithExtensions::<Token2022AccountState>::unpack(data) {
                    let withheld_amount = acc
                        .get_extension::<TransferFeeAmount>()
                        .ok()
                        .map(|ext| u64::from(ext.withheld_amount));
                    let base = acc.base;
                    return Some(ParsedAccount::Token(ParsedTokenAccount {
                        address: address_str,
                        program_owner: owner_str,
                        lamports,
                        mint: Some(base.mint.to_string()),
                        amount: Some(base.amount.to_string()),
                        decimals: None,
                        state: Some(token_2022_state_label(base.state).to_string()),
                        is_native: base.is_native.is_some(),
                        withheld_amount,
                    }));
                }
                let mint = StateWithExtensions::<Token2022MintState>::unpack(data).ok()?;
                let close_authority = mint
                    .get_extension::<MintCloseAuthority>()
                    .ok()
                    .and_then(|ext| Option::<spl_pod::solana_pubkey::Pubkey>::from(ext.close_authority))
                    .map(|k| k.to_string());
                let base = mint.base;
                Some(ParsedAccount::Mint(ParsedMintAccount {
                    address: address_str,
                    program_owner: owner_str,
                    lamports,
                    mint_authority: Option::<Pubkey>::from(base.mint_authority).map(|k| k.to_string()),
                    freeze_authority: Option::<Pubkey>::from(base.freeze_authority)
                        .map(|k| k.to_string()),
                    close_authority,
                    supply: Some(base.supply.to_string()),
                    decimals: Some(base.decimals),
                    is_initialized: base.is_initialized,
                }))
            }
        }
    }
}

fn legacy_state_label(state: SplAccountStatus) -> &'static str {
    match state {
        SplAccountStatus::Uninitialized => "uninitialized",
        SplAccountStatus::Initialized => "initialized",
        SplAccountStatus::Frozen => "frozen",
    }
}

fn token_2022_state_label(state: Token2022AccountStatus) -> &'static str {
    match state {
        Token2022AccountStatus::Uninitialized => "uninitialized",
        Token2022AccountStatus::Initialized => "initialized",
        Token2022AccountStatus::Frozen => "frozen",
    }
}

fn parse_pubkey(value: &str, field: &str, address: &str) -> Result<Pubkey, ReclaimError> {
    Pubkey::from_str(value)
        .map_err(|_| ReclaimError::InvalidAccount(format!("{address}: invalid {field} '{value}'")))
}

fn parse_optional_pubkey(
    value: Option<&String>,
    field: &str,
    address: &str,
) -> Result<Option<Pubkey>, ReclaimError> {
    value.map(|v| parse_pubkey(v, field, address)).transpose()
}

impl ParsedTokenAccount {
    pub fn normalize(self, rent_exempt_reserve_threshold: u64) -> Result<TokenAccountRecord, ReclaimError> {
        let address = parse_pubkey(&self.address, "address", &self.address)?;
        let owner = parse_pubkey(&self.program_owner, "owner program", &self.address)?;
        let owner_program = TokenProgramKind::from_owner(&owner)?;

        let mint = self
            .mint
            .as_deref()
            .ok_or_else(|| ReclaimError::InvalidAccount(format!("{}: missing mint", self.address)))
            .and_then(|m| parse_pubkey(m, "mint", &self.address))?;

        match self.state.as_deref() {
            Some("initialized") | Some("frozen") => {}
            other => {
                return Err(ReclaimError::InvalidAccount(format!(
                    "{}: unexpected account state {:?}",
                    self.address, other
                )))
            }
        }

        let amount = self.amount.ok_or_else(|| {
            ReclaimError::InvalidAccount(format!("{}: missing token amount", self.address))
        })?;

        Ok(TokenAccountRecord {
            address,
            owner_program,
            mint,
            lamports: self.lamports,
            // Raw layouts carry no decimals; 0 overstates the UI amount, which only
            // makes the burn price guard stricter.
            token_amount: TokenAmount { amount, decimals: self.decimals.unwrap_or(0) },
            rent_exempt_reserve_threshold,
            withheld_amount: self.withheld_amount,
            is_frozen: self.state.as_deref() == Some("frozen"),
            is_native: self.is_native,
        })
    }
}

impl ParsedMintAccount {
    pub fn normalize(self) -> Result<MintAccountRecord, ReclaimError> {
        let address = parse_pubkey(&self.address, "address", &self.address)?;
        let owner = parse_pubkey(&self.program_owner, "owner program", &self.address)?;
        let owner_program = TokenProgramKind::from_owner(&owner)?;

        if !self.is_initialized {
            return Err(ReclaimError::InvalidAccount(format!(
                "{}: mint is not initialized",
                self.address
            )));
        }

        let supply = self.supply.clone().ok_or_else(|| {
            ReclaimError::InvalidAccount(format!("{}: missing supply", self.address))
        })?;
        let decimals = self.decimals.ok_or_else(|| {
            ReclaimError::InvalidAccount(format!("{}: missing decimals", self.address))
        })?;

        Ok(MintAccountRecord {
            address,
            mint_authority: parse_optional_pubkey(self.mint_authority.as_ref(), "mint authority", &self.address)?,
            freeze_authority: parse_optional_pubkey(
                self.freeze_authority.as_ref(),
                "freeze authority",
                &self.address,
            )?,
            close_authority: parse_optional_pubkey(
                self.close_authority.as_ref(),
                "close authority",
                &self.address,
            )?,
            supply,
            decimals,
            owner_program,
            lamports: self.lamports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::account_mock::{
        AccountMockBuilder, MintAccountMockBuilder, TokenAccountMockBuilder,
    };
    use serde_json::json;

    fn json_token_account(owner_program: &Pubkey, info: Value) -> UiAccount {
        serde_json::from_value(json!({
            "lamports": 2_039_280u64,
            "data": {
                "program": "spl-token",
                "parsed": { "type": "account", "info": info },
                "space": 165
            },
            "owner": owner_program.to_string(),
            "executable": false,
            "rentEpoch": 0,
            "space": 165
        }))
        .unwrap()
    }

    #[test]
    fn test_json_token_account_with_withheld_amount() {
        let mint = Pubkey::new_unique();
        let address = Pubkey::new_unique();
        let ui = json_token_account(
            &spl_token_2022_interface::id(),
            json!({
                "isNative": false,
                "mint": mint.to_string(),
                "owner": Pubkey::new_unique().to_string(),
                "state": "initialized",
                "tokenAmount": { "amount": "0", "decimals": 6, "uiAmount": 0.0, "uiAmountString": "0" },
                "extensions": [
                    { "extension": "immutableOwner" },
                    { "extension": "transferFeeAmount", "state": { "withheldAmount": 250 } }
                ]
            }),
        );

        let parsed = ParsedAccount::from_ui_account(&address.to_string(), &ui).unwrap();
        let ParsedAccount::Token(token) = parsed else { panic!("Expected token account") };
        assert_eq!(token.withheld_amount, Some(250));

        let record = token.normalize(2_039_280).unwrap();
        assert_eq!(record.address, address);
        assert_eq!(record.mint, mint);
        assert_eq!(record.owner_program, TokenProgramKind::Token2022);
        assert_eq!(record.token_amount, TokenAmount::new(0, 6));
        assert!(record.needs_harvest());
        assert!(!record.is_frozen);
    }

    #[test]
    fn test_json_frozen_account() {
        let ui = json_token_account(
            &spl_token_interface::id(),
            json!({
                "isNative": false,
                "mint": Pubkey::new_unique().to_string(),
                "owner": Pubkey::new_unique().to_string(),
                "state": "frozen",
                "tokenAmount": { "amount": "10", "decimals": 0 }
            }),
        );
        let parsed = ParsedAccount::from_ui_account(&Pubkey::new_unique().to_string(), &ui).unwrap();
        let ParsedAccount::Token(token) = parsed else { panic!("Expected token account") };
        let record = token.normalize(0).unwrap();
        assert!(record.is_frozen);
        assert_eq!(record.owner_program, TokenProgramKind::Legacy);
    }

    #[test]
    fn test_json_missing_mint_fails_normalization() {
        let ui = json_token_account(
            &spl_token_interface::id(),
            json!({
                "state": "initialized",
                "tokenAmount": { "amount": "0", "decimals": 6 }
            }),
        );
        let parsed = ParsedAccount::from_ui_account(&Pubkey::new_unique().to_string(), &ui).unwrap();
        let ParsedAccount::Token(token) = parsed else { panic!("Expected token account") };
        assert!(matches!(token.normalize(0), Err(ReclaimError::InvalidAccount(_))));
    }

    #[test]
    fn test_unknown_owner_fails_normalization() {
        let token = ParsedTokenAccount {
            address: Pubkey::new_unique().to_string(),
            program_owner: Pubkey::new_unique().to_string(),
            mint: Some(Pubkey::new_unique().to_string()),
            amount: Some("0".to_string()),
            state: Some("initialized".to_string()),
            ..Default::default()
        };
        assert!(matches!(token.normalize(0), Err(ReclaimError::InvalidAccount(_))));
    }

    #[test]
    fn test_json_mint_with_close_authority() {
        let authority = Pubkey::new_unique();
        let ui: UiAccount = serde_json::from_value(json!({
            "lamports": 2_000_000u64,
            "data": {
                "program": "spl-token-2022",
                "parsed": {
                    "type": "mint",
                    "info": {
                        "decimals": 9,
                        "freezeAuthority": null,
                        "isInitialized": true,
                        "mintAuthority": authority.to_string(),
                        "supply": "0",
                        "extensions": [
                            { "extension": "mintCloseAuthority", "state": { "closeAuthority": authority.to_string() } }
                        ]
                    }
                },
                "space": 202
            },
            "owner": spl_token_2022_interface::id().to_string(),
            "executable": false,
            "rentEpoch": 0,
            "space": 202
        }))
        .unwrap();

        let parsed = ParsedAccount::from_ui_account(&Pubkey::new_unique().to_string(), &ui).unwrap();
        let ParsedAccount::Mint(mint) = parsed else { panic!("Expected mint account") };
        let record = mint.normalize().unwrap();
        assert_eq!(record.supply, "0");
        assert_eq!(record.mint_authority, Some(authority));
        assert_eq!(record.freeze_authority, None);
        assert_eq!(record.close_authority, Some(authority));
        assert_eq!(record.owner_program, TokenProgramKind::Token2022);
    }

    #[test]
    fn test_binary_legacy_token_account() {
        let mint = Pubkey::new_unique();
        let account = TokenAccountMockBuilder::new()
            .with_mint(&mint)
            .with_owner(&Pubkey::new_unique())
            .with_amount(7)
            .build();
        let address = Pubkey::new_unique();

        let parsed =
            ParsedAccount::from_bytes(&address, &account.owner, account.lamports, &account.data)
                .unwrap();
        let ParsedAccount::Token(token) = parsed else { panic!("Expected token account") };
        let record = token.normalize(0).unwrap();
        assert_eq!(record.mint, mint);
        assert_eq!(record.token_amount.raw(), Some(7));
        assert_eq!(record.withheld_amount, None);
    }

    #[test]
    fn test_binary_token_2022_account_with_withheld_amount() {
        let account = TokenAccountMockBuilder::new()
            .with_amount(0)
            .with_withheld_amount(900)
            .build_token2022();

        let parsed = ParsedAccount::from_bytes(
            &Pubkey::new_unique(),
            &account.owner,
            account.lamports,
            &account.data,
        )
        .unwrap();
        let ParsedAccount::Token(token) = parsed else { panic!("Expected token account") };
        assert_eq!(token.withheld_amount, Some(900));
    }

    #[test]
    fn test_binary_token_2022_mint_with_close_authority() {
        let authority = Pubkey::new_unique();
        let freezer = Pubkey::new_unique();
        let account = MintAccountMockBuilder::new()
            .with_supply(0)
            .with_mint_authority(Some(authority))
            .with_freeze_authority(Some(freezer))
            .with_close_authority(Some(authority))
            .build_token2022();

        let parsed = ParsedAccount::from_bytes(
            &Pubkey::new_unique(),
            &account.owner,
            account.lamports,
            &account.data,
        )
        .unwrap();
        let ParsedAccount::Mint(mint) = parsed else { panic!("Expected mint account") };
        let record = mint.normalize().unwrap();
        assert_eq!(record.close_authority, Some(authority));
        assert_eq!(record.freeze_authority, Some(freezer));
        assert_eq!(record.supply, "0");
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let account = AccountMockBuilder::new()
            .with_owner(spl_token_interface::id())
            .with_data(vec![1, 2, 3])
            .build();
        let parsed = ParsedAccount::from_bytes(
            &Pubkey::new_unique(),
            &account.owner,
            account.lamports,
            &account.data,
        );
        assert!(parsed.is_none());
    }
}
