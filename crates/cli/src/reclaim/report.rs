use reclaim_lib::{
    aggregator::RunSummary, constant::LAMPORTS_PER_SOL, manager::RunPreview, planner::ReclaimTarget,
    Operation,
};

use super::audit::AuditTotals;

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

fn describe(target: &ReclaimTarget) -> String {
    match target {
        ReclaimTarget::Token(record) => {
            let amount = record
                .token_amount
                .ui_amount()
                .map(|a| a.normalize().to_string())
                .unwrap_or_else(|| record.token_amount.amount.clone());
            let program = record.owner_program.to_string();
            format!("{program:<14} mint {} balance {amount}", record.mint)
        }
        ReclaimTarget::Mint(record) => {
            let program = record.owner_program.to_string();
            format!("{program:<14} supply {}", record.supply)
        }
    }
}

pub fn print_scan(operation: Operation, accounts: &[ReclaimTarget]) {
    println!("\n{operation}: {} eligible accounts", accounts.len());
    println!("--------------------------");
    for target in accounts {
        println!(
            "{} | {:.6} SOL | {}",
            target.address(),
            lamports_to_sol(target.lamports()),
            describe(target)
        );
    }
    let total: u64 = accounts.iter().map(ReclaimTarget::lamports).sum();
    println!("--------------------------");
    println!("Reclaimable rent: {:.6} SOL", lamports_to_sol(total));
}

pub fn print_preview(preview: &RunPreview) {
    println!("\nDry run: {} accounts in {} batches", preview.accounts, preview.batches.len());
    for batch in &preview.batches {
        println!(
            "  batch {}: {} accounts, {} instructions, {:.6} SOL",
            batch.index,
            batch.included.len(),
            batch.instructions.len(),
            lamports_to_sol(batch.reclaimed_lamports)
        );
        for (address, reason) in &batch.skipped {
            println!("    skipped {address}: {reason}");
        }
    }
    println!(
        "Reclaimable: {:.6} SOL (fee {:.6} SOL)",
        lamports_to_sol(preview.reclaimable_lamports),
        lamports_to_sol(preview.fee_lamports)
    );
    println!("Pass --execute to submit.");
}

pub fn print_summary(summary: &RunSummary) {
    println!("\nRun {}", if summary.aborted { "aborted" } else { "finished" });
    println!("--------------------------");
    println!("Closed:        {}/{}", summary.accounts_succeeded, summary.accounts_attempted);
    println!(
        "Batches:       {} ({} failed)",
        summary.batches_attempted, summary.batches_failed
    );
    println!("Excluded:      {}", summary.excluded_accounts.len());
    println!("Recovered:     {:.6} SOL", lamports_to_sol(summary.recovered_lamports));
    println!("Fees:          {:.6} SOL", lamports_to_sol(summary.fees_paid_lamports));
    for signature in &summary.signatures {
        println!("  {signature}");
    }
    if let Some(error) = &summary.last_error {
        println!("Last error:    {error}");
    }
}

pub struct LiveStats {
    pub token_accounts: usize,
    pub empty_accounts: usize,
    pub locked_lamports: u64,
    pub closeable_mints: usize,
}

pub fn print_stats(live: &LiveStats, audit: &AuditTotals) {
    let locked = lamports_to_sol(live.locked_lamports);
    let deployed = locked + audit.reclaimed_sol;
    let recovered_share = if deployed > 0.0 { audit.reclaimed_sol / deployed * 100.0 } else { 0.0 };

    println!("\nRENT STATS");
    println!("--------------------------");
    println!("Token accounts:       {}", live.token_accounts);
    println!("Empty accounts:       {}", live.empty_accounts);
    println!("Closeable mints:      {}", live.closeable_mints);
    println!("Rent locked:          {locked:.4} SOL");
    println!("Reclaimed (30d):      {:.4} SOL", audit.reclaimed_sol_30d);
    println!("Reclaimed (all time): {:.4} SOL in {} batches", audit.reclaimed_sol, audit.batches);
    println!("Recovered share:      {recovered_share:.2}%");
    println!("--------------------------");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lamports_to_sol() {
        assert_eq!(lamports_to_sol(LAMPORTS_PER_SOL), 1.0);
        assert_eq!(lamports_to_sol(2_039_280), 0.00203928);
    }
}
