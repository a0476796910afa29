//! Ledger configuration.
//!
//! Loaded from a JSON file with environment variable overrides.

use crate::application::commission::CommissionRates;
use crate::domain::approval::ApprovalChain;
use crate::domain::ids::FellowshipId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const CONFIG_ENV: &str = "UNIT_LEDGER_CONFIG";
pub const WEBHOOK_SECRET_ENV: &str = "UNIT_LEDGER_WEBHOOK_SECRET";
pub const RECENT_LIMIT_ENV: &str = "UNIT_LEDGER_RECENT_LIMIT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub approval: ApprovalConfig,
    pub commission: CommissionRates,
    pub webhook: WebhookConfig,
    pub wallet: WalletConfig,
}

/// Withdrawal approval chains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    pub default_chain: ApprovalChain,
    /// Per-fellowship overrides, keyed by fellowship id.
    pub fellowship_chains: BTreeMap<u64, ApprovalChain>,
}

impl ApprovalConfig {
    pub fn chain_for(&self, fellowship_id: FellowshipId) -> &ApprovalChain {
        self.fellowship_chains
            .get(&fellowship_id.0)
            .unwrap_or(&self.default_chain)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// HMAC key shared with the payment provider. Deliveries are refused without it.
    pub secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Transactions and donations shown with a wallet.
    pub recent_activity_limit: usize,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            recent_activity_limit: 20,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from file and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file (`path`, else `UNIT_LEDGER_CONFIG`)
    /// 3. Defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var(CONFIG_ENV).ok();
        let path = path.or(env_path.as_deref().map(Path::new));

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.display().to_string(), e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(secret) = std::env::var(WEBHOOK_SECRET_ENV) {
            self.webhook.secret = Some(secret);
        }

        if let Ok(limit) = std::env::var(RECENT_LIMIT_ENV) {
            self.wallet.recent_activity_limit = limit.parse().map_err(|_| {
                ConfigError::Invalid(format!("{RECENT_LIMIT_ENV} must be a number, got '{limit}'"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rates = &self.commission;
        if rates.processor_rate < Decimal::ZERO || rates.platform_rate < Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "commission rates cannot be negative".to_string(),
            ));
        }
        if rates.processor_rate + rates.platform_rate >= Decimal::ONE {
            return Err(ConfigError::Invalid(
                "commission rates must leave a positive net".to_string(),
            ));
        }
        if self.wallet.recent_activity_limit == 0 {
            return Err(ConfigError::Invalid(
                "wallet.recent_activity_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}': {1}")]
    FileRead(String, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
