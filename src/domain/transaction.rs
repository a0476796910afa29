use super::ids::{FellowshipId, TransactionId, UserId, WalletId};
use super::money::Amount;
use crate::error::WalletError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

/// Lifecycle of a wallet transaction.
///
/// `Pending -> Approved -> Completed` or `Pending -> Rejected`.
/// `Completed` and `Rejected` are terminal.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Completed,
    Rejected,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Completed => "COMPLETED",
            Self::Rejected => "REJECTED",
        };
        f.write_str(name)
    }
}

/// A ledger entry against exactly one wallet.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct WalletTransaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    pub fellowship_id: FellowshipId,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub description: String,
    /// External payment reference; unique across all transactions.
    pub reference: Option<String>,
    pub status: TransactionStatus,
    pub initiated_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    /// Bumped on every status change; guards concurrent approval decisions.
    pub version: u64,
}

impl WalletTransaction {
    /// Marks a pending withdrawal as fully approved, awaiting disbursement.
    pub fn approve(&mut self) -> Result<(), WalletError> {
        self.ensure_pending()?;
        self.status = TransactionStatus::Approved;
        self.version += 1;
        Ok(())
    }

    /// Terminates a pending withdrawal with the given reason.
    pub fn reject(&mut self, reason: &str) -> Result<(), WalletError> {
        self.ensure_pending()?;
        self.status = TransactionStatus::Rejected;
        self.failure_reason = Some(reason.to_string());
        self.completed_at = Some(Utc::now());
        self.version += 1;
        Ok(())
    }

    /// Records an intermediate decision on the approval chain.
    pub fn touch(&mut self) -> Result<(), WalletError> {
        self.ensure_pending()?;
        self.version += 1;
        Ok(())
    }

    pub fn ensure_pending(&self) -> Result<(), WalletError> {
        match self.status {
            TransactionStatus::Pending => Ok(()),
            TransactionStatus::Approved
            | TransactionStatus::Completed
            | TransactionStatus::Rejected => Err(WalletError::OutOfOrder(format!(
                "Transaction {} is already {}",
                self.id, self.status
            ))),
        }
    }
}

/// Filter for fellowship-wide transaction listings. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &WalletTransaction) -> bool {
        self.kind.is_none_or(|kind| tx.kind == kind)
            && self.from.is_none_or(|from| tx.created_at >= from)
            && self.to.is_none_or(|to| tx.created_at <= to)
    }
}
