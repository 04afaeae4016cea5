use clap::Parser;
use reclaim_lib::{
    constant::{DEFAULT_AUDIT_FILE, DEFAULT_CONFIG_FILE},
    log::LoggingFormat,
    Operation,
};

/// Global arguments used by all subcommands
#[derive(Debug, Parser)]
#[command(name = "reclaim")]
pub struct GlobalArgs {
    /// Solana RPC endpoint URL
    #[arg(long, env = "RPC_URL", default_value = "http://127.0.0.1:8899")]
    pub rpc_url: String,

    /// Path to the configuration file (TOML format)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Wallet keypair: file path, base58 string or [u8] array
    #[arg(long, env = "WALLET_KEYPAIR", hide_env_values = true)]
    pub keypair: Option<String>,

    /// CSV file successful batches are appended to
    #[arg(long, default_value = DEFAULT_AUDIT_FILE)]
    pub audit_file: String,

    #[arg(long, value_enum, default_value_t = LoggingFormat::Standard)]
    pub logging_format: LoggingFormat,
}

#[derive(Debug, Clone, Parser)]
pub struct OperationArgs {
    /// Which accounts to reclaim
    #[arg(long, value_enum, default_value_t = Operation::Close)]
    pub operation: Operation,
}

#[derive(Debug, Clone, Parser)]
pub struct RunArgs {
    #[command(flatten)]
    pub operation: OperationArgs,

    /// Submit transactions (default is a dry run)
    #[arg(long, default_value_t = false)]
    pub execute: bool,

    /// Referral address that receives half of the commission
    #[arg(long)]
    pub referral: Option<String>,

    /// Approve every price-guard confirmation without asking
    #[arg(long, default_value_t = false, conflicts_with = "assume_no")]
    pub assume_yes: bool,

    /// Decline every price-guard confirmation without asking
    #[arg(long, default_value_t = false)]
    pub assume_no: bool,

    /// Ask before signing each batch
    #[arg(long, default_value_t = false)]
    pub confirm_batches: bool,
}
