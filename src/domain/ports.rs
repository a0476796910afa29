use super::approval::{ApprovalChain, TransactionApproval};
use super::donation::{
    Commission, CommissionBreakdown, CommissionFilter, MemberDonation, PaymentMethod,
    TreasuryExpense,
};
use super::ids::{FellowshipId, TransactionId, UserId, WalletId};
use super::member::Member;
use super::money::Amount;
use super::transaction::{TransactionFilter, WalletTransaction};
use super::actor::Role;
use super::wallet::{Department, UnitWallet, WalletStatus};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Donation row to write alongside a deposit.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationDraft {
    pub member_id: Option<UserId>,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
}

/// Treasury outflow to write alongside a deposit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseDraft {
    pub category: String,
    pub description: String,
    pub approved_by: UserId,
}

/// Everything one deposit writes. The store applies it as a single unit.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositEntry {
    pub wallet_id: WalletId,
    /// Net amount credited to the wallet.
    pub amount: Amount,
    pub description: String,
    pub reference: Option<String>,
    pub initiated_by: Option<UserId>,
    pub donation: Option<DonationDraft>,
    pub commission: Option<CommissionBreakdown>,
    pub expense: Option<ExpenseDraft>,
}

/// What a deposit wrote, or what an earlier deposit with the same reference wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositReceipt {
    pub wallet: UnitWallet,
    pub transaction: WalletTransaction,
    pub donation: Option<MemberDonation>,
    pub commission: Option<Commission>,
    pub expense: Option<TreasuryExpense>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DepositOutcome {
    Applied(DepositReceipt),
    /// The reference was already recorded; nothing was written.
    Duplicate(DepositReceipt),
}

/// A withdrawal to open against a wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalDraft {
    pub wallet_id: WalletId,
    pub amount: Amount,
    pub description: String,
    pub initiated_by: UserId,
}

/// What opening a withdrawal wrote, with the wallet as the store checked it.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalReceipt {
    pub wallet: UnitWallet,
    pub transaction: WalletTransaction,
    pub approvals: Vec<TransactionApproval>,
}

/// A decided approval step plus the parent transaction state it produces.
///
/// Committed only if the stored transaction still carries `expected_version`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalCommit {
    pub transaction: WalletTransaction,
    pub step: TransactionApproval,
    pub expected_version: u64,
}

/// Durable ledger storage.
///
/// Every mutating method is atomic: either all of its rows persist or none do.
/// Balance checks and increments happen inside the store, never as a read
/// followed by a separate write from the caller.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Returns the wallet for (fellowship, department), creating it if absent.
    /// The flag is true when this call created it.
    async fn get_or_create_wallet(
        &self,
        fellowship_id: FellowshipId,
        department: &Department,
    ) -> Result<(UnitWallet, bool)>;
    /// Creates a wallet; `Conflict` if one already exists for the pair.
    async fn create_wallet(
        &self,
        fellowship_id: FellowshipId,
        department: &Department,
    ) -> Result<UnitWallet>;
    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Option<UnitWallet>>;
    async fn find_wallet(
        &self,
        fellowship_id: FellowshipId,
        department: &Department,
    ) -> Result<Option<UnitWallet>>;
    async fn find_wallet_by_account(&self, account_number: &str) -> Result<Option<UnitWallet>>;
    async fn list_wallets(&self, fellowship_id: FellowshipId) -> Result<Vec<UnitWallet>>;
    /// Attaches an external account number; `Conflict` if another wallet holds it.
    async fn link_virtual_account(
        &self,
        wallet_id: WalletId,
        account_number: &str,
    ) -> Result<UnitWallet>;
    async fn set_wallet_status(&self, wallet_id: WalletId, status: WalletStatus)
    -> Result<UnitWallet>;

    /// Writes a completed deposit and increments the balance.
    ///
    /// If `entry.reference` is already recorded, returns `Duplicate` with the
    /// earlier receipt and writes nothing.
    async fn apply_deposit(&self, entry: DepositEntry) -> Result<DepositOutcome>;
    /// Checks the balance covers the amount and writes a pending withdrawal plus
    /// one pending approval per chain step.
    async fn open_withdrawal(
        &self,
        draft: WithdrawalDraft,
        chain: &ApprovalChain,
    ) -> Result<WithdrawalReceipt>;
    /// Persists one decided step and its parent transaction.
    ///
    /// `Conflict` if the transaction version moved or the step is no longer pending.
    async fn commit_approval(&self, commit: ApprovalCommit) -> Result<()>;

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<WalletTransaction>>;
    /// The receipt of the deposit already recorded under `reference`, if any.
    async fn find_deposit_by_reference(&self, reference: &str)
    -> Result<Option<DepositReceipt>>;
    /// Newest first.
    async fn transactions_for_wallet(
        &self,
        wallet_id: WalletId,
        limit: usize,
    ) -> Result<Vec<WalletTransaction>>;
    /// Newest first.
    async fn transactions_for_fellowship(
        &self,
        fellowship_id: FellowshipId,
        filter: &TransactionFilter,
    ) -> Result<Vec<WalletTransaction>>;
    /// Ordered by approval order.
    async fn approvals_for(&self, transaction_id: TransactionId)
    -> Result<Vec<TransactionApproval>>;
    /// Pending steps for `role` on transactions of the fellowship, oldest first.
    /// Readiness is not checked here.
    async fn pending_approvals(
        &self,
        role: Role,
        fellowship_id: FellowshipId,
    ) -> Result<Vec<TransactionApproval>>;
    /// Newest first.
    async fn donations_for_wallet(
        &self,
        wallet_id: WalletId,
        limit: usize,
    ) -> Result<Vec<MemberDonation>>;
    /// Newest first.
    async fn commissions(&self, filter: &CommissionFilter) -> Result<Vec<Commission>>;
    /// Newest first.
    async fn treasury_expenses(&self, fellowship_id: FellowshipId)
    -> Result<Vec<TreasuryExpense>>;
}

/// Read access to the fellowship member roster.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn members_of(&self, fellowship_id: FellowshipId) -> Result<Vec<Member>>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type MemberDirectoryRef = Arc<dyn MemberDirectory>;
