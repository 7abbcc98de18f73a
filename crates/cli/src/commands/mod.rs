//! Subcommand handlers

pub mod admin;
pub mod ledger;
pub mod report;

use anyhow::{anyhow, Result};
use lexvault_core::WithdrawalStatus;

/// Parse a `--status` filter
pub fn parse_status(status: Option<&str>) -> Result<Option<WithdrawalStatus>> {
    status
        .map(|s| {
            WithdrawalStatus::from_str(s)
                .ok_or_else(|| anyhow!("Unknown withdrawal status '{}'", s))
        })
        .transpose()
}

/// Truncate string for display
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(
            parse_status(Some("processing")).unwrap(),
            Some(WithdrawalStatus::Processing)
        );
        assert!(parse_status(Some("sent")).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long description", 9), "a long...");
    }
}
