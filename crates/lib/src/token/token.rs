use crate::error::ReclaimError;
use serde::{Deserialize, Serialize};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use spl_token_2022_interface::extension::transfer_fee::instruction::harvest_withheld_tokens_to_mint;
use std::fmt;

/// The two token programs whose accounts can be discovered and closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenProgramKind {
    Legacy,
    Token2022,
}

impl TokenProgramKind {
    pub const ALL: [TokenProgramKind; 2] = [TokenProgramKind::Legacy, TokenProgramKind::Token2022];

    pub fn program_id(&self) -> Pubkey {
        match self {
            TokenProgramKind::Legacy => spl_token_interface::id(),
            TokenProgramKind::Token2022 => spl_token_2022_interface::id(),
        }
    }

    pub fn from_owner(owner: &Pubkey) -> Result<Self, ReclaimError> {
        if *owner == spl_token_interface::id() {
            Ok(TokenProgramKind::Legacy)
        } else if *owner == spl_token_2022_interface::id() {
            Ok(TokenProgramKind::Token2022)
        } else {
            Err(ReclaimError::InvalidAccount(format!("Invalid token program owner: {owner}")))
        }
    }

    pub fn supports_withheld_harvest(&self) -> bool {
        matches!(self, TokenProgramKind::Token2022)
    }

    pub fn close_account_instruction(
        &self,
        account: &Pubkey,
        destination: &Pubkey,
        owner: &Pubkey,
    ) -> Result<Instruction, ReclaimError> {
        let program_id = self.program_id();
        let ix = match self {
            TokenProgramKind::Legacy => spl_token_interface::instruction::close_account(
                &program_id,
                account,
                destination,
                owner,
                &[],
            )?,
            TokenProgramKind::Token2022 => spl_token_2022_interface::instruction::close_account(
                &program_id,
                account,
                destination,
                owner,
                &[],
            )?,
        };
        Ok(ix)
    }

    pub fn burn_instruction(
        &self,
        account: &Pubkey,
        mint: &Pubkey,
        owner: &Pubkey,
        amount: u64,
    ) -> Result<Instruction, ReclaimError> {
        let program_id = self.program_id();
        let ix = match self {
            TokenProgramKind::Legacy => spl_token_interface::instruction::burn(
                &program_id,
                account,
                mint,
                owner,
                &[],
                amount,
            )?,
            TokenProgramKind::Token2022 => spl_token_2022_interface::instruction::burn(
                &program_id,
                account,
                mint,
                owner,
                &[],
                amount,
            )?,
        };
        Ok(ix)
    }

    /// Moves transfer-fee withheld tokens from `sources` back into the mint so the
    /// source accounts can be closed.
    pub fn harvest_withheld_instruction(
        &self,
        mint: &Pubkey,
        sources: &[&Pubkey],
    ) -> Result<Instruction, ReclaimError> {
        if !self.supports_withheld_harvest() {
            return Err(ReclaimError::ValidationError(format!(
                "Withheld token harvest is not supported by the {self} program"
            )));
        }
        Ok(harvest_withheld_tokens_to_mint(&self.program_id(), mint, sources)?)
    }
}

impl fmt::Display for TokenProgramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenProgramKind::Legacy => write!(f, "spl-token"),
            TokenProgramKind::Token2022 => write!(f, "spl-token-2022"),
        }
    }
}
