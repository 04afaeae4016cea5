pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 90;

// Batching: burn+close packs two instructions per account, so it gets the smaller batch
pub const DEFAULT_CLOSE_BATCH_SIZE: usize = 20;
pub const DEFAULT_BURN_BATCH_SIZE: usize = 10;
pub const DEFAULT_CLOSE_MINT_BATCH_SIZE: usize = 20;

// Submission pipeline
pub const DEFAULT_CONFIRMATION_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_INTER_BATCH_DELAY_MS: u64 = 2_000;
pub const DEFAULT_MAX_CONSECUTIVE_POLL_ERRORS: u32 = 20;

// Price guard
pub const DEFAULT_BURN_PRICE_CEILING_USD: f64 = 10.0;
pub const DEFAULT_PRICE_LOOKUP_WORKERS: usize = 4;
pub const DEFAULT_PRICE_LOOKUP_CHUNK_SIZE: usize = 50;
pub const DEFAULT_PRICE_MAX_RETRIES: u32 = 3;
pub const DEFAULT_PRICE_RETRY_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_CONFIRMATION_CHANNEL_CAPACITY: usize = 16;

// External Services
pub const JUPITER_API_LITE_URL: &str = "https://lite-api.jup.ag";
pub const JUPITER_API_PRO_URL: &str = "https://api.jup.ag";

// Files
pub const DEFAULT_CONFIG_FILE: &str = "reclaim.toml";
pub const DEFAULT_AUDIT_FILE: &str = "audit_log.csv";

/// Byte offsets of the authority pubkeys inside the base mint layout (after each COption tag).
pub mod mint_layout {
    pub const MINT_AUTHORITY_OFFSET: usize = 4;
    pub const FREEZE_AUTHORITY_OFFSET: usize = 50;
}
