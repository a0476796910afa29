use super::ids::{
    CommissionId, DonationId, ExpenseId, FellowshipId, TransactionId, UserId, WalletId,
};
use super::money::Amount;
use crate::error::WalletError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Transfer into a provider-issued virtual account. Carries processor and platform fees.
    VpayTransfer,
    Cash,
    BankTransfer,
    Pos,
}

impl PaymentMethod {
    pub fn is_externally_routed(&self) -> bool {
        match self {
            Self::VpayTransfer => true,
            Self::Cash | Self::BankTransfer | Self::Pos => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VpayTransfer => "VPAY_TRANSFER",
            Self::Cash => "CASH",
            Self::BankTransfer => "BANK_TRANSFER",
            Self::Pos => "POS",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "VPAY_TRANSFER" | "VPAY" => Ok(Self::VpayTransfer),
            "CASH" => Ok(Self::Cash),
            "BANK_TRANSFER" | "TRANSFER" => Ok(Self::BankTransfer),
            "POS" => Ok(Self::Pos),
            other => Err(WalletError::ValidationError(format!(
                "Unknown payment method '{other}'"
            ))),
        }
    }
}

/// A contribution credited to a wallet. Immutable.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct MemberDonation {
    pub id: DonationId,
    pub wallet_id: WalletId,
    /// `None` for external payers that could not be matched to a member.
    pub member_id: Option<UserId>,
    /// Net amount credited after commissions.
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of splitting a gross payment into fees and the net credit.
///
/// `processor_fee + platform_cut + net == gross` holds exactly.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct CommissionBreakdown {
    pub gross: Decimal,
    pub processor_fee: Decimal,
    pub platform_cut: Decimal,
    pub net: Decimal,
    pub platform_rate: Decimal,
}

/// Platform commission tied 1:1 to an externally routed deposit. Immutable.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Commission {
    pub id: CommissionId,
    pub fellowship_id: FellowshipId,
    pub transaction_id: TransactionId,
    pub gross_amount: Decimal,
    pub processor_fee: Decimal,
    pub platform_cut: Decimal,
    pub net_amount: Decimal,
    pub commission_rate: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Fellowship-level outflow recorded when the treasury funds a unit wallet.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TreasuryExpense {
    pub id: ExpenseId,
    pub fellowship_id: FellowshipId,
    pub wallet_id: WalletId,
    pub category: String,
    pub amount: Amount,
    pub description: String,
    pub approved_by: UserId,
    pub approved_at: DateTime<Utc>,
}

/// Filter for commission reports. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommissionFilter {
    pub fellowship_id: Option<FellowshipId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl CommissionFilter {
    pub fn matches(&self, commission: &Commission) -> bool {
        self.fellowship_id
            .is_none_or(|id| commission.fellowship_id == id)
            && self.from.is_none_or(|from| commission.created_at >= from)
            && self.to.is_none_or(|to| commission.created_at <= to)
    }
}
