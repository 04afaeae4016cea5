use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use crate::token::{MintAccountRecord, TokenAccountRecord};

/// One account selected for reclaiming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReclaimTarget {
    Token(TokenAccountRecord),
    Mint(MintAccountRecord),
}

impl ReclaimTarget {
    pub fn address(&self) -> Pubkey {
        match self {
            ReclaimTarget::Token(record) => record.address,
            ReclaimTarget::Mint(record) => record.address,
        }
    }

    pub fn lamports(&self) -> u64 {
        match self {
            ReclaimTarget::Token(record) => record.lamports,
            ReclaimTarget::Mint(record) => record.lamports,
        }
    }
}

/// Up to `batch_size` accounts processed by a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub index: usize,
    pub targets: Vec<ReclaimTarget>,
}

/// Partitions `targets` into consecutive groups, preserving input order.
pub fn plan_batches(targets: &[ReclaimTarget], batch_size: usize) -> Vec<BatchPlan> {
    targets
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(index, chunk)| BatchPlan { index, targets: chunk.to_vec() })
        .collect()
}
