use crate::error::WalletError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal places in the minor currency unit (kobo/cents).
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Rounds half-up (away from zero) to the minor currency unit.
pub fn round_minor(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// A wallet balance. Never negative.
///
/// Wraps `rust_decimal::Decimal` so balances cannot be mixed up with raw request amounts.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(Decimal);

/// A strictly positive monetary amount expressed in at most the minor unit.
///
/// Every amount that enters the ledger passes through [`Amount::new`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, WalletError> {
        if value <= Decimal::ZERO {
            return Err(WalletError::ValidationError(
                "Amount must be positive".to_string(),
            ));
        }
        if value.normalize().scale() > MINOR_UNIT_SCALE {
            return Err(WalletError::ValidationError(format!(
                "Amount {value} has more than {MINOR_UNIT_SCALE} decimal places"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = WalletError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// True when the balance can cover `amount` without going negative.
    pub fn covers(&self, amount: Amount) -> bool {
        self.0 >= amount.0
    }

    /// The balance after crediting `amount`; `ValidationError` if it would overflow.
    pub fn checked_add(self, amount: Amount) -> Result<Self, WalletError> {
        self.0.checked_add(amount.0).map(Self).ok_or_else(|| {
            WalletError::ValidationError(format!(
                "Crediting {amount} would overflow the balance of {self}"
            ))
        })
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
