//! Virtual purse configuration

use serde::{Deserialize, Serialize};
use tracing::warn;
use vpurse_notifier::DEFAULT_HISTORY;

/// Environment variable naming the purse in logs
pub const LABEL_ENV: &str = "VPURSE_LABEL";

/// Environment variable bounding the balance notifier's history
pub const BALANCE_HISTORY_ENV: &str = "VPURSE_BALANCE_HISTORY";

fn default_balance_history() -> usize {
    DEFAULT_HISTORY
}

/// Construction-time settings for a virtual purse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualPurseConfig {
    /// Name used in log lines for this purse
    pub label: String,
    /// Balance updates kept for subscribers that read by counter
    #[serde(default = "default_balance_history")]
    pub balance_history: usize,
}

impl Default for VirtualPurseConfig {
    fn default() -> Self {
        Self {
            label: "vpurse".to_string(),
            balance_history: DEFAULT_HISTORY,
        }
    }
}

impl VirtualPurseConfig {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Load from the environment (and `.env` if present), falling back to defaults
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = match std::env::var(LABEL_ENV) {
            Ok(label) if !label.trim().is_empty() => Self::labeled(label.trim()),
            _ => Self::default(),
        };
        if let Ok(raw) = std::env::var(BALANCE_HISTORY_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(history) if history > 0 => config.balance_history = history,
                _ => warn!(
                    "Ignoring {}='{}', keeping {}",
                    BALANCE_HISTORY_ENV, raw, config.balance_history
                ),
            }
        }
        config
    }
}
