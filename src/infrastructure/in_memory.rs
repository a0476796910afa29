use crate::domain::actor::Role;
use crate::domain::approval::{ApprovalChain, ApprovalStatus, TransactionApproval};
use crate::domain::donation::{Commission, CommissionFilter, MemberDonation, TreasuryExpense};
use crate::domain::ids::{
    ApprovalId, CommissionId, DonationId, ExpenseId, FellowshipId, TransactionId, WalletId,
};
use crate::domain::member::Member;
use crate::domain::ports::{
    ApprovalCommit, DepositEntry, DepositOutcome, DepositReceipt, LedgerStore, MemberDirectory,
    WithdrawalDraft, WithdrawalReceipt,
};
use crate::domain::transaction::{
    TransactionFilter, TransactionKind, TransactionStatus, WalletTransaction,
};
use crate::domain::wallet::{Department, UnitWallet, WalletStatus};
use crate::error::{Result, WalletError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct LedgerTables {
    next_id: u64,
    wallets: BTreeMap<WalletId, UnitWallet>,
    wallet_keys: HashMap<(FellowshipId, Department), WalletId>,
    accounts: HashMap<String, WalletId>,
    transactions: BTreeMap<TransactionId, WalletTransaction>,
    references: HashMap<String, TransactionId>,
    approvals: BTreeMap<TransactionId, Vec<TransactionApproval>>,
    donations: BTreeMap<DonationId, MemberDonation>,
    donations_by_tx: HashMap<TransactionId, DonationId>,
    commissions: BTreeMap<CommissionId, Commission>,
    commissions_by_tx: HashMap<TransactionId, CommissionId>,
    expenses: BTreeMap<ExpenseId, TreasuryExpense>,
    expenses_by_tx: HashMap<TransactionId, ExpenseId>,
}

impl LedgerTables {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_wallet(&mut self, fellowship_id: FellowshipId, department: &Department) -> UnitWallet {
        let wallet = UnitWallet::new(
            WalletId(self.allocate()),
            fellowship_id,
            department.clone(),
        );
        self.wallet_keys
            .insert((fellowship_id, department.clone()), wallet.id);
        self.wallets.insert(wallet.id, wallet.clone());
        wallet
    }

    fn wallet(&self, wallet_id: WalletId) -> Result<&UnitWallet> {
        self.wallets
            .get(&wallet_id)
            .ok_or_else(|| WalletError::NotFound(format!("Wallet {wallet_id} not found")))
    }

    fn wallet_mut(&mut self, wallet_id: WalletId) -> Result<&mut UnitWallet> {
        self.wallets
            .get_mut(&wallet_id)
            .ok_or_else(|| WalletError::NotFound(format!("Wallet {wallet_id} not found")))
    }

    fn receipt_for(&self, transaction: &WalletTransaction) -> Result<DepositReceipt> {
        let tx_id = transaction.id;
        Ok(DepositReceipt {
            wallet: self.wallet(transaction.wallet_id)?.clone(),
            transaction: transaction.clone(),
            donation: self
                .donations_by_tx
                .get(&tx_id)
                .and_then(|id| self.donations.get(id))
                .cloned(),
            commission: self
                .commissions_by_tx
                .get(&tx_id)
                .and_then(|id| self.commissions.get(id))
                .cloned(),
            expense: self
                .expenses_by_tx
                .get(&tx_id)
                .and_then(|id| self.expenses.get(id))
                .cloned(),
        })
    }
}

/// A thread-safe in-memory ledger.
///
/// All tables sit behind one `RwLock`; each mutating call holds the write guard
/// from its first check to its last insert, so it commits as a unit. Reads run
/// concurrently. Ideal for testing or single-process deployments.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    tables: Arc<RwLock<LedgerTables>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get_or_create_wallet(
        &self,
        fellowship_id: FellowshipId,
        department: &Department,
    ) -> Result<(UnitWallet, bool)> {
        let mut tables = self.tables.write().await;
        if let Some(id) = tables.wallet_keys.get(&(fellowship_id, department.clone())) {
            let wallet = tables.wallet(*id)?.clone();
            return Ok((wallet, false));
        }
        Ok((tables.insert_wallet(fellowship_id, department), true))
    }

    async fn create_wallet(
        &self,
        fellowship_id: FellowshipId,
        department: &Department,
    ) -> Result<UnitWallet> {
        let mut tables = self.tables.write().await;
        if tables
            .wallet_keys
            .contains_key(&(fellowship_id, department.clone()))
        {
            return Err(WalletError::Conflict(format!(
                "Wallet already exists for {department} in fellowship {fellowship_id}"
            )));
        }
        Ok(tables.insert_wallet(fellowship_id, department))
    }

    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Option<UnitWallet>> {
        let tables = self.tables.read().await;
        Ok(tables.wallets.get(&wallet_id).cloned())
    }

    async fn find_wallet(
        &self,
        fellowship_id: FellowshipId,
        department: &Department,
    ) -> Result<Option<UnitWallet>> {
        let tables = self.tables.read().await;
        Ok(tables
            .wallet_keys
            .get(&(fellowship_id, department.clone()))
            .and_then(|id| tables.wallets.get(id))
            .cloned())
    }

    async fn find_wallet_by_account(&self, account_number: &str) -> Result<Option<UnitWallet>> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .get(account_number)
            .and_then(|id| tables.wallets.get(id))
            .cloned())
    }

    async fn list_wallets(&self, fellowship_id: FellowshipId) -> Result<Vec<UnitWallet>> {
        let tables = self.tables.read().await;
        let mut wallets: Vec<UnitWallet> = tables
            .wallets
            .values()
            .filter(|w| w.fellowship_id == fellowship_id)
            .cloned()
            .collect();
        wallets.sort_by(|a, b| a.department.cmp(&b.department));
        Ok(wallets)
    }

    async fn link_virtual_account(
        &self,
        wallet_id: WalletId,
        account_number: &str,
    ) -> Result<UnitWallet> {
        let mut tables = self.tables.write().await;
        tables.wallet(wallet_id)?;
        match tables.accounts.get(account_number) {
            Some(owner) if *owner != wallet_id => {
                return Err(WalletError::Conflict(format!(
                    "Account {account_number} is already linked to wallet {owner}"
                )));
            }
            _ => {}
        }
        let previous = tables.wallet(wallet_id)?.virtual_account.clone();
        if let Some(previous) = previous {
            tables.accounts.remove(&previous);
        }
        tables
            .accounts
            .insert(account_number.to_string(), wallet_id);
        let wallet = tables.wallet_mut(wallet_id)?;
        wallet.virtual_account = Some(account_number.to_string());
        wallet.updated_at = Utc::now();
        Ok(wallet.clone())
    }

    async fn set_wallet_status(
        &self,
        wallet_id: WalletId,
        status: WalletStatus,
    ) -> Result<UnitWallet> {
        let mut tables = self.tables.write().await;
        let wallet = tables.wallet_mut(wallet_id)?;
        wallet.status = status;
        wallet.updated_at = Utc::now();
        Ok(wallet.clone())
    }

    async fn apply_deposit(&self, entry: DepositEntry) -> Result<DepositOutcome> {
        let mut tables = self.tables.write().await;

        if let Some(reference) = &entry.reference
            && let Some(existing) = tables.references.get(reference)
        {
            let existing = tables
                .transactions
                .get(existing)
                .cloned()
                .ok_or_else(|| {
                    WalletError::persistence(format!("dangling reference index for {reference}"))
                })?;
            return Ok(DepositOutcome::Duplicate(tables.receipt_for(&existing)?));
        }

        let mut wallet = tables.wallet(entry.wallet_id)?.clone();
        wallet.credit(entry.amount)?;
        let fellowship_id = wallet.fellowship_id;
        let now = Utc::now();
        let transaction = WalletTransaction {
            id: TransactionId(tables.allocate()),
            wallet_id: entry.wallet_id,
            fellowship_id,
            kind: TransactionKind::Deposit,
            amount: entry.amount,
            description: entry.description,
            reference: entry.reference.clone(),
            status: TransactionStatus::Completed,
            initiated_by: entry.initiated_by,
            created_at: now,
            completed_at: Some(now),
            failure_reason: None,
            version: 0,
        };

        let donation = entry.donation.map(|draft| MemberDonation {
            id: DonationId(tables.allocate()),
            wallet_id: entry.wallet_id,
            member_id: draft.member_id,
            amount: entry.amount,
            payment_method: draft.payment_method,
            reference: entry.reference.clone(),
            note: draft.note,
            created_at: now,
        });
        let commission = entry.commission.map(|split| Commission {
            id: CommissionId(tables.allocate()),
            fellowship_id,
            transaction_id: transaction.id,
            gross_amount: split.gross,
            processor_fee: split.processor_fee,
            platform_cut: split.platform_cut,
            net_amount: split.net,
            commission_rate: split.platform_rate,
            created_at: now,
        });
        let expense = entry.expense.map(|draft| TreasuryExpense {
            id: ExpenseId(tables.allocate()),
            fellowship_id,
            wallet_id: entry.wallet_id,
            category: draft.category,
            amount: entry.amount,
            description: draft.description,
            approved_by: draft.approved_by,
            approved_at: now,
        });

        tables.wallets.insert(wallet.id, wallet.clone());

        if let Some(reference) = &transaction.reference {
            tables.references.insert(reference.clone(), transaction.id);
        }
        if let Some(donation) = &donation {
            tables.donations_by_tx.insert(transaction.id, donation.id);
            tables.donations.insert(donation.id, donation.clone());
        }
        if let Some(commission) = &commission {
            tables.commissions_by_tx.insert(transaction.id, commission.id);
            tables.commissions.insert(commission.id, commission.clone());
        }
        if let Some(expense) = &expense {
            tables.expenses_by_tx.insert(transaction.id, expense.id);
            tables.expenses.insert(expense.id, expense.clone());
        }
        tables.transactions.insert(transaction.id, transaction.clone());

        Ok(DepositOutcome::Applied(DepositReceipt {
            wallet,
            transaction,
            donation,
            commission,
            expense,
        }))
    }

    async fn open_withdrawal(
        &self,
        draft: WithdrawalDraft,
        chain: &ApprovalChain,
    ) -> Result<WithdrawalReceipt> {
        let mut tables = self.tables.write().await;
        let wallet = tables.wallet(draft.wallet_id)?.clone();
        wallet.ensure_can_reserve(draft.amount)?;
        let fellowship_id = wallet.fellowship_id;

        let transaction = WalletTransaction {
            id: TransactionId(tables.allocate()),
            wallet_id: draft.wallet_id,
            fellowship_id,
            kind: TransactionKind::Withdrawal,
            amount: draft.amount,
            description: draft.description,
            reference: None,
            status: TransactionStatus::Pending,
            initiated_by: Some(draft.initiated_by),
            created_at: Utc::now(),
            completed_at: None,
            failure_reason: None,
            version: 0,
        };
        let steps: Vec<TransactionApproval> = chain
            .steps()
            .iter()
            .map(|step| TransactionApproval::pending(ApprovalId(tables.allocate()), transaction.id, step))
            .collect();

        tables.transactions.insert(transaction.id, transaction.clone());
        tables.approvals.insert(transaction.id, steps.clone());
        Ok(WithdrawalReceipt {
            wallet,
            transaction,
            approvals: steps,
        })
    }

    async fn commit_approval(&self, commit: ApprovalCommit) -> Result<()> {
        let mut tables = self.tables.write().await;
        let tx_id = commit.transaction.id;

        let stored = tables
            .transactions
            .get(&tx_id)
            .ok_or_else(|| WalletError::NotFound(format!("Transaction {tx_id} not found")))?;
        if stored.version != commit.expected_version {
            return Err(WalletError::Conflict(format!(
                "Transaction {tx_id} changed concurrently"
            )));
        }

        let steps = tables
            .approvals
            .get_mut(&tx_id)
            .ok_or_else(|| WalletError::NotFound(format!("No approvals for transaction {tx_id}")))?;
        let row = steps
            .iter_mut()
            .find(|s| s.id == commit.step.id)
            .ok_or_else(|| WalletError::NotFound(format!("Approval {} not found", commit.step.id)))?;
        if row.status != ApprovalStatus::Pending {
            return Err(WalletError::Conflict(format!(
                "Approval {} was already decided",
                row.id
            )));
        }
        *row = commit.step;
        tables.transactions.insert(tx_id, commit.transaction);
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<WalletTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables.transactions.get(&id).cloned())
    }

    async fn find_deposit_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<DepositReceipt>> {
        let tables = self.tables.read().await;
        tables
            .references
            .get(reference)
            .and_then(|id| tables.transactions.get(id))
            .map(|transaction| tables.receipt_for(transaction))
            .transpose()
    }

    async fn transactions_for_wallet(
        &self,
        wallet_id: WalletId,
        limit: usize,
    ) -> Result<Vec<WalletTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .values()
            .rev()
            .filter(|tx| tx.wallet_id == wallet_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn transactions_for_fellowship(
        &self,
        fellowship_id: FellowshipId,
        filter: &TransactionFilter,
    ) -> Result<Vec<WalletTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .values()
            .rev()
            .filter(|tx| tx.fellowship_id == fellowship_id && filter.matches(tx))
            .cloned()
            .collect())
    }

    async fn approvals_for(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<TransactionApproval>> {
        let tables = self.tables.read().await;
        let mut steps = tables
            .approvals
            .get(&transaction_id)
            .cloned()
            .unwrap_or_default();
        steps.sort_by_key(|s| s.order);
        Ok(steps)
    }

    async fn pending_approvals(
        &self,
        role: Role,
        fellowship_id: FellowshipId,
    ) -> Result<Vec<TransactionApproval>> {
        let tables = self.tables.read().await;
        Ok(tables
            .approvals
            .iter()
            .filter(|(tx_id, _)| {
                tables
                    .transactions
                    .get(tx_id)
                    .is_some_and(|tx| tx.fellowship_id == fellowship_id)
            })
            .flat_map(|(_, steps)| steps.iter())
            .filter(|s| s.role == role && s.status == ApprovalStatus::Pending)
            .cloned()
            .collect())
    }

    async fn donations_for_wallet(
        &self,
        wallet_id: WalletId,
        limit: usize,
    ) -> Result<Vec<MemberDonation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .donations
            .values()
            .rev()
            .filter(|d| d.wallet_id == wallet_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn commissions(&self, filter: &CommissionFilter) -> Result<Vec<Commission>> {
        let tables = self.tables.read().await;
        Ok(tables
            .commissions
            .values()
            .rev()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn treasury_expenses(&self, fellowship_id: FellowshipId) -> Result<Vec<TreasuryExpense>> {
        let tables = self.tables.read().await;
        Ok(tables
            .expenses
            .values()
            .rev()
            .filter(|e| e.fellowship_id == fellowship_id)
            .cloned()
            .collect())
    }
}

/// A member roster held in memory, keyed by fellowship.
#[derive(Default, Clone)]
pub struct InMemoryMemberDirectory {
    members: Arc<RwLock<HashMap<FellowshipId, Vec<Member>>>>,
}

impl InMemoryMemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, member: Member) {
        let mut members = self.members.write().await;
        members.entry(member.fellowship_id).or_default().push(member);
    }
}

#[async_trait]
impl MemberDirectory for InMemoryMemberDirectory {
    async fn members_of(&self, fellowship_id: FellowshipId) -> Result<Vec<Member>> {
        let members = self.members.read().await;
        Ok(members.get(&fellowship_id).cloned().unwrap_or_default())
    }
}
