use reclaim_lib::{aggregator::RunSummary, error::ReclaimError, Operation};
use serde::{Deserialize, Serialize};
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use super::report::lamports_to_sol;

const THIRTY_DAYS: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// One CSV row per confirmed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: u64,
    pub date_utc: String,
    pub operation: String,
    pub batch_index: usize,
    pub accounts: usize,
    pub rent_reclaimed_sol: f64,
    pub fee_sol: f64,
    pub signature: String,
}

#[derive(Debug, Default, PartialEq)]
pub struct AuditTotals {
    pub batches: usize,
    pub accounts: usize,
    pub reclaimed_sol: f64,
    pub reclaimed_sol_30d: f64,
}

pub struct AuditTrail {
    path: PathBuf,
}

impl AuditTrail {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Appends every confirmed batch of `summary`; the header is written only
    /// when the file is new.
    pub fn append_run(
        &self,
        operation: Operation,
        summary: &RunSummary,
        now: SystemTime,
    ) -> Result<usize, ReclaimError> {
        if summary.confirmed_batches.is_empty() {
            return Ok(0);
        }

        let file_exists = self.path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(!file_exists).from_writer(file);

        let timestamp = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let date_utc = humantime::format_rfc3339_seconds(now).to_string();

        for batch in &summary.confirmed_batches {
            let record = AuditRecord {
                timestamp,
                date_utc: date_utc.clone(),
                operation: operation.to_string(),
                batch_index: batch.batch_index,
                accounts: batch.accounts.len(),
                rent_reclaimed_sol: lamports_to_sol(
                    batch.reclaimed_lamports.saturating_sub(batch.fee_lamports),
                ),
                fee_sol: lamports_to_sol(batch.fee_lamports),
                signature: batch.signature.to_string(),
            };
            writer.serialize(&record).map_err(|e| {
                ReclaimError::SerializationError(format!("Failed to write audit record: {e}"))
            })?;
        }
        writer.flush()?;

        Ok(summary.confirmed_batches.len())
    }

    /// Sums the trail. A missing file is an empty trail; unreadable rows are skipped.
    pub fn totals(&self, now: SystemTime) -> Result<AuditTotals, ReclaimError> {
        let mut totals = AuditTotals::default();
        if !self.path.exists() {
            return Ok(totals);
        }

        let cutoff = now
            .checked_sub(THIRTY_DAYS)
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut reader = csv::Reader::from_reader(File::open(&self.path)?);
        for row in reader.deserialize::<AuditRecord>() {
            let record = match row {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Skipping unreadable audit row: {e}");
                    continue;
                }
            };
            totals.batches += 1;
            totals.accounts += record.accounts;
            totals.reclaimed_sol += record.rent_reclaimed_sol;
            if record.timestamp >= cutoff {
                totals.reclaimed_sol_30d += record.rent_reclaimed_sol;
            }
        }
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reclaim_lib::aggregator::ConfirmedBatch;
    use solana_sdk::{pubkey::Pubkey, signature::Signature};

    fn summary(batches: &[(usize, u64, u64)]) -> RunSummary {
        RunSummary {
            confirmed_batches: batches
                .iter()
                .map(|&(accounts, reclaimed, fee)| ConfirmedBatch {
                    batch_index: 0,
                    signature: Signature::default(),
                    accounts: (0..accounts).map(|_| Pubkey::new_unique()).collect(),
                    reclaimed_lamports: reclaimed,
                    fee_lamports: fee,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_append_and_total() {
        let dir = tempfile::tempdir().unwrap();
        let trail = AuditTrail::new(dir.path().join("audit.csv"));
        let now = SystemTime::now();

        let written = trail
            .append_run(Operation::Close, &summary(&[(20, 2_000_000_000, 0), (5, 500_000_000, 0)]), now)
            .unwrap();
        assert_eq!(written, 2);
        trail.append_run(Operation::BurnAndClose, &summary(&[(1, 1_000_000_000, 100_000_000)]), now).unwrap();

        let totals = trail.totals(now).unwrap();
        assert_eq!(totals.batches, 3);
        assert_eq!(totals.accounts, 26);
        assert!((totals.reclaimed_sol - 3.4).abs() < 1e-9);
        assert!((totals.reclaimed_sol_30d - 3.4).abs() < 1e-9);
    }

    #[test]
    fn test_old_rows_fall_out_of_30_day_window() {
        let dir = tempfile::tempdir().unwrap();
        let trail = AuditTrail::new(dir.path().join("audit.csv"));
        let long_ago = SystemTime::now() - Duration::from_secs(60 * 24 * 60 * 60);
        trail.append_run(Operation::Close, &summary(&[(1, 1_000_000_000, 0)]), long_ago).unwrap();

        let totals = trail.totals(SystemTime::now()).unwrap();
        assert!((totals.reclaimed_sol - 1.0).abs() < 1e-9);
        assert_eq!(totals.reclaimed_sol_30d, 0.0);
    }

    #[test]
    fn test_missing_file_and_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        let trail = AuditTrail::new(dir.path().join("none.csv"));
        assert_eq!(trail.totals(SystemTime::now()).unwrap(), AuditTotals::default());
        assert_eq!(trail.append_run(Operation::Close, &RunSummary::default(), SystemTime::now()).unwrap(), 0);
        assert!(!dir.path().join("none.csv").exists());
    }
}
