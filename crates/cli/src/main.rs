mod args;
mod reclaim;

use args::{GlobalArgs, OperationArgs, RunArgs};
use clap::{Parser, Subcommand};
use reclaim_lib::{
    error::ReclaimError,
    log::{log_filter, LoggingFormat},
    rpc::get_rpc_client,
    signer::KeypairWallet,
    Config, RpcChainClient, SessionContext,
};
use solana_sdk::pubkey::Pubkey;
use std::{path::Path, str::FromStr, sync::Arc};

use reclaim::{audit::AuditTrail, Reclaimer};

#[derive(Subcommand)]
enum Commands {
    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },
    /// List accounts eligible for an operation
    Scan {
        #[command(flatten)]
        operation: OperationArgs,
    },
    /// Reclaim rent from every eligible account (dry run unless --execute)
    Run {
        #[command(flatten)]
        run_args: Box<RunArgs>,
    },
    /// Live locked rent plus audit trail totals
    Stats,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Validate the configuration file
    Validate,
}

#[derive(Parser)]
#[command(author, version, about = "Reclaim rent from empty SPL token accounts and mints", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    pub global_args: GlobalArgs,
}

#[tokio::main]
async fn main() -> Result<(), ReclaimError> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    setup_logging(&cli.global_args.logging_format);

    let config = load_config(&cli.global_args.config).unwrap_or_else(|e| {
        print_error(&format!("Failed to load config: {e}"));
        std::process::exit(1);
    });

    let Some(command) = cli.command else {
        println!("No command specified. Use --help for usage information.");
        println!("Available commands:");
        println!("  config validate - Validate configuration");
        println!("  scan            - List eligible accounts");
        println!("  run             - Reclaim rent (dry run unless --execute)");
        println!("  stats           - Show locked and reclaimed rent");
        return Ok(());
    };

    if let Commands::Config { config_command: ConfigCommands::Validate } = command {
        let validation = config.validate();
        for warning in &validation.warnings {
            println!("Warning: {warning}");
        }
        for error in &validation.errors {
            print_error(&format!("Validation error: {error}"));
        }
        if !validation.is_valid() {
            std::process::exit(1);
        }
        println!("Configuration is valid");
        return Ok(());
    }

    let referral = match &command {
        Commands::Run { run_args } => run_args
            .referral
            .as_deref()
            .map(|r| {
                Pubkey::from_str(r).map_err(|e| {
                    ReclaimError::ValidationError(format!("Invalid referral address {r}: {e}"))
                })
            })
            .transpose()?,
        _ => None,
    };
    let session = SessionContext::from_config(&config, referral)?;

    let keypair = cli.global_args.keypair.as_deref().ok_or_else(|| {
        ReclaimError::ConfigError("A wallet keypair is required (--keypair or WALLET_KEYPAIR)".to_string())
    })?;

    let rpc_client = get_rpc_client(&cli.global_args.rpc_url);
    let wallet = KeypairWallet::from_source(keypair, rpc_client.clone())?;
    let reclaimer = Reclaimer {
        chain: Arc::new(RpcChainClient::new(rpc_client)),
        wallet: Arc::new(wallet),
        session,
        audit: AuditTrail::new(&cli.global_args.audit_file),
    };

    let result = match command {
        Commands::Scan { operation } => reclaimer.scan(operation.operation).await,
        Commands::Run { run_args } => reclaimer.run(&run_args).await,
        Commands::Stats => reclaimer.stats().await,
        Commands::Config { .. } => Ok(()),
    };

    if let Err(e) = &result {
        print_error(&e.to_string());
    }
    result
}

/// A missing default config file is not an error; every setting has a default.
fn load_config(path: &str) -> Result<Config, ReclaimError> {
    if !Path::new(path).exists() && path == reclaim_lib::constant::DEFAULT_CONFIG_FILE {
        log::info!("No {path} found, using default configuration");
        return Ok(Config::default());
    }
    Config::load_config(path)
}

fn print_error(message: &str) {
    eprintln!("Error: {message}");
}

fn setup_logging(format: &LoggingFormat) {
    let subscriber = tracing_subscriber::fmt().with_env_filter(log_filter());
    match format {
        LoggingFormat::Standard => subscriber.init(),
        LoggingFormat::Json => subscriber.json().init(),
    }
}
