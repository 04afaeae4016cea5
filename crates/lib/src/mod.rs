pub mod aggregator;
pub mod builder;
pub mod chain;
pub mod config;
pub mod confirm;
pub mod constant;
pub mod discovery;
pub mod eligibility;
pub mod error;
pub mod fee;
pub mod log;
pub mod manager;
pub mod oracle;
pub mod pipeline;
pub mod planner;
pub mod rpc;
pub mod sanitize;
pub mod signer;
pub mod token;
pub mod wallet;
pub use chain::{ChainClient, RpcChainClient};
pub use config::{Config, SessionContext};
pub use error::ReclaimError;
pub use manager::{AccountManager, Operation};
pub use signer::{KeypairUtil, KeypairWallet};
pub use wallet::WalletCapability;
