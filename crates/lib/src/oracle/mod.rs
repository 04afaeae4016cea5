pub mod jupiter;
pub mod oracle;
pub mod price_book;
pub mod utils;

pub use oracle::*;
pub use price_book::PriceBook;
