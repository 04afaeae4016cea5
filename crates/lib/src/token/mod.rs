pub mod parsed;
pub mod record;
pub mod token;

pub use parsed::{ParsedAccount, ParsedMintAccount, ParsedTokenAccount};
pub use record::{MintAccountRecord, TokenAccountRecord, TokenAmount};
pub use token::TokenProgramKind;
