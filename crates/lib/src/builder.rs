use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use solana_system_interface::instruction::transfer;

use crate::{
    config::SessionContext,
    error::ReclaimError,
    fee::{plan_fee, FeePlan},
    manager::Operation,
    planner::{BatchPlan, ReclaimTarget},
    token::{MintAccountRecord, TokenAccountRecord},
};

/// Instructions for one batch plus the bookkeeping needed to report on it.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltBatch {
    pub index: usize,
    pub instructions: Vec<Instruction>,
    /// Accounts that contributed instructions, in plan order.
    pub included: Vec<Pubkey>,
    pub skipped: Vec<(Pubkey, String)>,
    /// Rent returned to the wallet if the batch lands.
    pub reclaimed_lamports: u64,
    pub fee: Option<FeePlan>,
}

impl BuiltBatch {
    pub fn fee_lamports(&self) -> u64 {
        self.fee.as_ref().map(FeePlan::paid).unwrap_or(0)
    }
}

#[derive(Default)]
struct Phases {
    harvest: Vec<Instruction>,
    burn: Vec<Instruction>,
    close: Vec<Instruction>,
}

fn skip(skipped: &mut Vec<(Pubkey, String)>, index: usize, address: Pubkey, reason: String) {
    log::warn!("Batch {index}: skipping account {address}: {reason}");
    skipped.push((address, reason));
}

fn token_instructions(
    operation: Operation,
    record: &TokenAccountRecord,
    wallet: &Pubkey,
) -> Result<(Option<Instruction>, Option<Instruction>, Instruction), String> {
    if record.mint == Pubkey::default() {
        return Err("missing mint".to_string());
    }

    let program = record.owner_program;
    let burn = match operation {
        Operation::BurnAndClose => match record.token_amount.raw() {
            Some(amount) if amount > 0 => Some(
                program
                    .burn_instruction(&record.address, &record.mint, wallet, amount)
                    .map_err(|e| e.to_string())?,
            ),
            Some(_) => return Err("nothing to burn".to_string()),
            None => return Err(format!("unparsable amount '{}'", record.token_amount.amount)),
        },
        Operation::Close => {
            if !record.token_amount.is_zero() {
                return Err(format!("non-zero balance '{}'", record.token_amount.amount));
            }
            None
        }
        Operation::CloseMint => return Err("token account in a mint-close batch".to_string()),
    };

    let harvest = if record.needs_harvest() {
        Some(
            program
                .harvest_withheld_instruction(&record.mint, &[&record.address])
                .map_err(|e| e.to_string())?,
        )
    } else {
        None
    };

    let close = program
        .close_account_instruction(&record.address, wallet, wallet)
        .map_err(|e| e.to_string())?;

    Ok((harvest, burn, close))
}

fn mint_close_instruction(
    operation: Operation,
    record: &MintAccountRecord,
    wallet: &Pubkey,
) -> Result<Instruction, String> {
    if operation != Operation::CloseMint {
        return Err("mint account in a token-account batch".to_string());
    }
    if record.supply.trim() != "0" {
        return Err(format!("outstanding supply {}", record.supply));
    }
    if record.close_authority.as_ref() != Some(wallet) {
        return Err("wallet is not the close authority".to_string());
    }
    record
        .owner_program
        .close_account_instruction(&record.address, wallet, wallet)
        .map_err(|e: ReclaimError| e.to_string())
}

/// Builds the transaction instructions for one batch in the order
/// compute budget, harvest, burn, close, fee transfers.
///
/// Accounts that cannot be processed are skipped individually. Returns `None`
/// when no account in the batch qualifies.
pub fn build_batch(
    operation: Operation,
    plan: &BatchPlan,
    wallet: &Pubkey,
    session: &SessionContext,
    referral: Option<Pubkey>,
) -> Option<BuiltBatch> {
    let mut phases = Phases::default();
    let mut included = Vec::new();
    let mut skipped = Vec::new();
    let mut reclaimed_lamports = 0u64;

    for target in &plan.targets {
        let address = target.address();
        match target {
            ReclaimTarget::Token(record) => match token_instructions(operation, record, wallet) {
                Ok((harvest, burn, close)) => {
                    phases.harvest.extend(harvest);
                    phases.burn.extend(burn);
                    phases.close.push(close);
                }
                Err(reason) => {
                    skip(&mut skipped, plan.index, address, reason);
                    continue;
                }
            },
            ReclaimTarget::Mint(record) => match mint_close_instruction(operation, record, wallet) {
                Ok(close) => phases.close.push(close),
                Err(reason) => {
                    skip(&mut skipped, plan.index, address, reason);
                    continue;
                }
            },
        }
        included.push(address);
        reclaimed_lamports = reclaimed_lamports.saturating_add(target.lamports());
    }

    if included.is_empty() {
        log::warn!("Batch {}: no qualifying accounts, skipping", plan.index);
        return None;
    }

    let mut instructions = Vec::new();
    if let Some(price) = session.compute_budget.unit_price {
        instructions.push(ComputeBudgetInstruction::set_compute_unit_price(price));
    }
    if let Some(limit) = session.compute_budget.unit_limit {
        instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(limit));
    }
    instructions.extend(phases.harvest);
    instructions.extend(phases.burn);
    instructions.extend(phases.close);

    let fee = plan_fee(reclaimed_lamports, &session.fees, referral);
    if let Some(fee) = &fee {
        instructions.extend(fee.transfers.iter().map(|t| transfer(wallet, &t.to, t.lamports)));
    }

    Some(BuiltBatch {
        index: plan.index,
        instructions,
        included,
        skipped,
        reclaimed_lamports,
        fee,
    })
}
