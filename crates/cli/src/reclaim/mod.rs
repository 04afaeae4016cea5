pub mod audit;
pub mod prompt;
pub mod report;

use reclaim_lib::{
    confirm::confirmation_channel,
    constant::DEFAULT_CONFIRMATION_CHANNEL_CAPACITY,
    discovery::{discover_mints, discover_token_accounts},
    eligibility::eligible_for_mint_close,
    error::ReclaimError,
    oracle::PriceBook,
    AccountManager, ChainClient, Operation, SessionContext, WalletCapability,
};
use std::{sync::Arc, time::SystemTime};

use self::{
    audit::AuditTrail,
    prompt::{spawn_confirmation_handler, ApprovingWallet, ConfirmationPolicy},
    report::{print_preview, print_scan, print_stats, print_summary, LiveStats},
};
use crate::args::RunArgs;

pub struct Reclaimer {
    pub chain: Arc<dyn ChainClient>,
    pub wallet: Arc<dyn WalletCapability>,
    pub session: SessionContext,
    pub audit: AuditTrail,
}

impl Reclaimer {
    pub async fn scan(&self, operation: Operation) -> Result<(), ReclaimError> {
        let mut manager = AccountManager::new(
            self.chain.clone(),
            self.wallet.clone(),
            self.session.clone(),
            operation,
        );
        manager.refresh().await?;
        print_scan(operation, manager.accounts());
        Ok(())
    }

    pub async fn run(&self, args: &RunArgs) -> Result<(), ReclaimError> {
        let operation = args.operation.operation;
        let wallet: Arc<dyn WalletCapability> = if args.confirm_batches && args.execute {
            Arc::new(ApprovingWallet::new(self.wallet.clone()))
        } else {
            self.wallet.clone()
        };

        let mut manager =
            AccountManager::new(self.chain.clone(), wallet, self.session.clone(), operation);

        let mut confirmations = None;
        if operation == Operation::BurnAndClose && args.execute {
            let (requester, handler) = confirmation_channel(DEFAULT_CONFIRMATION_CHANNEL_CAPACITY);
            let policy = ConfirmationPolicy::from_flags(args.assume_yes, args.assume_no);
            confirmations = Some(spawn_confirmation_handler(handler, policy));
            manager = manager
                .with_price_book(Arc::new(PriceBook::from_config(&self.session.price_guard)))
                .with_confirmation(requester);
        }

        manager.refresh().await?;
        manager.select_all();
        if manager.selected().is_empty() {
            println!("Nothing to reclaim for {operation}.");
            return Ok(());
        }

        if !args.execute {
            print_preview(&manager.preview_selected()?);
            return Ok(());
        }

        let summary = manager.close_selected().await?;
        drop(manager);
        if let Some(task) = confirmations {
            if let Err(e) = task.await {
                log::warn!("Confirmation handler ended abnormally: {e}");
            }
        }

        match self.audit.append_run(operation, &summary, SystemTime::now()) {
            Ok(rows) => log::info!("Appended {rows} batches to the audit trail"),
            Err(e) => log::error!("Failed to update audit trail: {e}"),
        }
        print_summary(&summary);
        Ok(())
    }

    pub async fn stats(&self) -> Result<(), ReclaimError> {
        println!("Gathering live chain data...");
        let wallet = self.wallet.public_key();
        let (tokens, mints) = tokio::try_join!(
            discover_token_accounts(self.chain.as_ref(), wallet, None),
            discover_mints(self.chain.as_ref(), wallet),
        )?;

        let live = LiveStats {
            token_accounts: tokens.len(),
            empty_accounts: tokens.iter().filter(|r| r.token_amount.is_zero()).count(),
            locked_lamports: tokens.iter().map(|r| r.lamports).sum(),
            closeable_mints: match wallet {
                Some(key) => mints.iter().filter(|m| eligible_for_mint_close(m, &key)).count(),
                None => 0,
            },
        };
        let totals = self.audit.totals(SystemTime::now())?;
        print_stats(&live, &totals);
        Ok(())
    }
}
