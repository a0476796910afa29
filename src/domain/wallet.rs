use super::ids::{FellowshipId, WalletId};
use super::money::{Amount, Balance};
use crate::error::WalletError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Department tag of a unit (e.g. `MUSIC`, `WELFARE`). Stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Department(String);

impl Department {
    pub fn new(name: &str) -> Result<Self, WalletError> {
        let normalized = name.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(WalletError::ValidationError(
                "Department must not be empty".to_string(),
            ));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Department {
    type Error = WalletError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Department> for String {
    fn from(department: Department) -> Self {
        department.0
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletStatus {
    Active,
    Suspended,
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("ACTIVE"),
            Self::Suspended => f.write_str("SUSPENDED"),
        }
    }
}

/// A department-scoped sub-account of a fellowship's funds.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct UnitWallet {
    pub id: WalletId,
    pub fellowship_id: FellowshipId,
    pub department: Department,
    pub balance: Balance,
    /// External virtual account number payments are routed to.
    pub virtual_account: Option<String>,
    pub status: WalletStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UnitWallet {
    pub fn new(id: WalletId, fellowship_id: FellowshipId, department: Department) -> Self {
        let now = Utc::now();
        Self {
            id,
            fellowship_id,
            department,
            balance: Balance::ZERO,
            virtual_account: None,
            status: WalletStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds funds to the balance. The wallet is untouched if the sum would overflow.
    pub fn credit(&mut self, amount: Amount) -> Result<(), WalletError> {
        self.balance = self.balance.checked_add(amount)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Checks that a withdrawal of `amount` may be opened against this wallet.
    pub fn ensure_can_reserve(&self, amount: Amount) -> Result<(), WalletError> {
        if self.status == WalletStatus::Suspended {
            return Err(WalletError::ValidationError(format!(
                "Wallet {} is suspended",
                self.id
            )));
        }
        if !self.balance.covers(amount) {
            return Err(WalletError::InsufficientBalance {
                requested: amount.value(),
                available: self.balance.value(),
            });
        }
        Ok(())
    }

    pub fn ensure_fellowship(&self, fellowship_id: FellowshipId) -> Result<(), WalletError> {
        if self.fellowship_id != fellowship_id {
            return Err(WalletError::Unauthorized(format!(
                "Wallet {} belongs to another fellowship",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn wallet() -> UnitWallet {
        UnitWallet::new(WalletId(1), FellowshipId(7), Department::new("music").unwrap())
    }

    #[test]
    fn test_department_normalization() {
        assert_eq!(Department::new("  welfare ").unwrap().as_str(), "WELFARE");
        assert!(matches!(
            Department::new("   "),
            Err(WalletError::ValidationError(_))
        ));
    }

    #[test]
    fn test_wallet_credit() {
        let mut wallet = wallet();
        wallet.credit(Amount::new(dec!(10.0)).unwrap()).unwrap();
        assert_eq!(wallet.balance.value(), dec!(10.0));
    }

    #[test]
    fn test_reserve_checks_balance() {
        let mut wallet = wallet();
        wallet.credit(Amount::new(dec!(10.0)).unwrap()).unwrap();

        assert!(wallet.ensure_can_reserve(Amount::new(dec!(10.0)).unwrap()).is_ok());
        let result = wallet.ensure_can_reserve(Amount::new(dec!(20.0)).unwrap());
        assert!(matches!(
            result,
            Err(WalletError::InsufficientBalance { .. })
        ));
        assert_eq!(wallet.balance.value(), dec!(10.0));
    }

    #[test]
    fn test_suspended_wallet_refuses_reserve() {
        let mut wallet = wallet();
        wallet.credit(Amount::new(dec!(10.0)).unwrap()).unwrap();
        wallet.status = WalletStatus::Suspended;

        let result = wallet.ensure_can_reserve(Amount::new(dec!(1.0)).unwrap());
        assert!(matches!(result, Err(WalletError::ValidationError(_))));
    }

    #[test]
    fn test_cross_tenant_rejected() {
        let wallet = wallet();
        assert!(wallet.ensure_fellowship(FellowshipId(7)).is_ok());
        assert!(matches!(
            wallet.ensure_fellowship(FellowshipId(8)),
            Err(WalletError::Unauthorized(_))
        ));
    }
}
