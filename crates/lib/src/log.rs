use clap::ValueEnum;
use std::env;

/// Used when `RUST_LOG` is unset. The HTTP stack is noisy at `info`.
pub const DEFAULT_LOG_FILTER: &str = "info,hyper=warn,reqwest=warn";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LoggingFormat {
    #[default]
    Standard,
    Json,
}

pub fn log_filter() -> String {
    env::var("RUST_LOG")
        .ok()
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_format_names() {
        assert_eq!(LoggingFormat::from_str("json", true).unwrap(), LoggingFormat::Json);
        assert_eq!(LoggingFormat::from_str("standard", true).unwrap(), LoggingFormat::Standard);
        assert!(LoggingFormat::from_str("xml", true).is_err());
    }
}
