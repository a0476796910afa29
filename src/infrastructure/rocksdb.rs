use crate::domain::actor::Role;
use crate::domain::approval::{ApprovalChain, ApprovalStatus, TransactionApproval};
use crate::domain::donation::{Commission, CommissionFilter, MemberDonation, TreasuryExpense};
use crate::domain::ids::{
    ApprovalId, CommissionId, DonationId, ExpenseId, FellowshipId, TransactionId, WalletId,
};
use crate::domain::ports::{
    ApprovalCommit, DepositEntry, DepositOutcome, DepositReceipt, LedgerStore, WithdrawalDraft,
    WithdrawalReceipt,
};
use crate::domain::transaction::{
    TransactionFilter, TransactionKind, TransactionStatus, WalletTransaction,
};
use crate::domain::wallet::{Department, UnitWallet, WalletStatus};
use crate::error::{Result, WalletError};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CF_WALLETS: &str = "wallets";
/// `(fellowship, department)` to wallet id.
pub const CF_WALLET_KEYS: &str = "wallet_keys";
/// Virtual account number to wallet id.
pub const CF_ACCOUNTS: &str = "accounts";
pub const CF_TRANSACTIONS: &str = "transactions";
/// External payment reference to transaction id.
pub const CF_REFERENCES: &str = "references";
/// Keyed by transaction id then step order.
pub const CF_APPROVALS: &str = "approvals";
pub const CF_DONATIONS: &str = "donations";
pub const CF_COMMISSIONS: &str = "commissions";
pub const CF_EXPENSES: &str = "expenses";
/// Transaction id to the rows its deposit wrote.
pub const CF_DEPOSIT_LINKS: &str = "deposit_links";
pub const CF_META: &str = "meta";

const COLUMN_FAMILIES: [&str; 11] = [
    CF_WALLETS,
    CF_WALLET_KEYS,
    CF_ACCOUNTS,
    CF_TRANSACTIONS,
    CF_REFERENCES,
    CF_APPROVALS,
    CF_DONATIONS,
    CF_COMMISSIONS,
    CF_EXPENSES,
    CF_DEPOSIT_LINKS,
    CF_META,
];

const NEXT_ID_KEY: &[u8] = b"next_id";

#[derive(Debug, Default, Serialize, Deserialize)]
struct DepositLinks {
    donation: Option<DonationId>,
    commission: Option<CommissionId>,
    expense: Option<ExpenseId>,
}

/// A persistent ledger using RocksDB.
///
/// Each entity lives in its own column family, values are JSON. Every mutating
/// call builds one `WriteBatch` and commits it atomically. Mutations are
/// serialized by `write_guard` so check-then-write sequences cannot interleave;
/// reads go straight to the database.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBLedgerStore {
    db: Arc<DB>,
    write_guard: Arc<Mutex<()>>,
}

impl RocksDBLedgerStore {
    /// Opens or creates a RocksDB instance at the specified path, creating any
    /// missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_guard: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| WalletError::persistence(format!("column family {name} not found")))
    }

    fn get<T: DeserializeOwned>(&self, cf: &str, key: impl AsRef<[u8]>) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: impl AsRef<[u8]>,
        value: &T,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(WalletError::persistence)?;
        batch.put_cf(self.cf(cf)?, key, bytes);
        Ok(())
    }

    /// Values whose key starts with `prefix`, in key order.
    fn scan<T: DeserializeOwned>(&self, cf: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let iter = self
            .db
            .iterator_cf(self.cf(cf)?, IteratorMode::From(prefix, Direction::Forward));
        let mut values = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    /// Values in descending key order, i.e. newest first for id-keyed families.
    fn scan_newest<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        self.db
            .iterator_cf(self.cf(cf)?, IteratorMode::End)
            .map(|item| {
                let (_, value) = item?;
                decode(&value)
            })
            .collect()
    }

    /// Reserves `count` ids; the new high-water mark is written with `batch`.
    fn allocate(&self, batch: &mut WriteBatch, count: u64) -> Result<u64> {
        let current: u64 = self.get(CF_META, NEXT_ID_KEY)?.unwrap_or_default();
        self.put(batch, CF_META, NEXT_ID_KEY, &(current + count))?;
        Ok(current + 1)
    }

    fn require_wallet(&self, wallet_id: WalletId) -> Result<UnitWallet> {
        self.get(CF_WALLETS, id_key(wallet_id.0))?
            .ok_or_else(|| WalletError::NotFound(format!("Wallet {wallet_id} not found")))
    }

    fn wallet_by_key(
        &self,
        fellowship_id: FellowshipId,
        department: &Department,
    ) -> Result<Option<UnitWallet>> {
        let id: Option<WalletId> = self.get(CF_WALLET_KEYS, wallet_key(fellowship_id, department))?;
        match id {
            Some(id) => self.get(CF_WALLETS, id_key(id.0)),
            None => Ok(None),
        }
    }

    fn insert_wallet(&self, fellowship_id: FellowshipId, department: &Department) -> Result<UnitWallet> {
        let mut batch = WriteBatch::default();
        let wallet = UnitWallet::new(
            WalletId(self.allocate(&mut batch, 1)?),
            fellowship_id,
            department.clone(),
        );
        self.put(&mut batch, CF_WALLETS, id_key(wallet.id.0), &wallet)?;
        self.put(
            &mut batch,
            CF_WALLET_KEYS,
            wallet_key(fellowship_id, department),
            &wallet.id,
        )?;
        self.db.write(batch)?;
        Ok(wallet)
    }

    fn receipt_for(&self, transaction: WalletTransaction) -> Result<DepositReceipt> {
        let links: DepositLinks = self
            .get(CF_DEPOSIT_LINKS, id_key(transaction.id.0))?
            .unwrap_or_default();
        Ok(DepositReceipt {
            wallet: self.require_wallet(transaction.wallet_id)?,
            donation: match links.donation {
                Some(id) => self.get(CF_DONATIONS, id_key(id.0))?,
                None => None,
            },
            commission: match links.commission {
                Some(id) => self.get(CF_COMMISSIONS, id_key(id.0))?,
                None => None,
            },
            expense: match links.expense {
                Some(id) => self.get(CF_EXPENSES, id_key(id.0))?,
                None => None,
            },
            transaction,
        })
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(WalletError::persistence)
}

fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn wallet_key(fellowship_id: FellowshipId, department: &Department) -> Vec<u8> {
    format!("{}/{}", fellowship_id, department).into_bytes()
}

fn approval_key(transaction_id: TransactionId, order: u32) -> Vec<u8> {
    let mut key = id_key(transaction_id.0).to_vec();
    key.extend_from_slice(&order.to_be_bytes());
    key
}

#[async_trait]
impl LedgerStore for RocksDBLedgerStore {
    async fn get_or_create_wallet(
        &self,
        fellowship_id: FellowshipId,
        department: &Department,
    ) -> Result<(UnitWallet, bool)> {
        let _guard = self.write_guard.lock().await;
        if let Some(wallet) = self.wallet_by_key(fellowship_id, department)? {
            return Ok((wallet, false));
        }
        Ok((self.insert_wallet(fellowship_id, department)?, true))
    }

    async fn create_wallet(
        &self,
        fellowship_id: FellowshipId,
        department: &Department,
    ) -> Result<UnitWallet> {
        let _guard = self.write_guard.lock().await;
        if self.wallet_by_key(fellowship_id, department)?.is_some() {
            return Err(WalletError::Conflict(format!(
                "Wallet already exists for {department} in fellowship {fellowship_id}"
            )));
        }
        self.insert_wallet(fellowship_id, department)
    }

    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Option<UnitWallet>> {
        self.get(CF_WALLETS, id_key(wallet_id.0))
    }

    async fn find_wallet(
        &self,
        fellowship_id: FellowshipId,
        department: &Department,
    ) -> Result<Option<UnitWallet>> {
        self.wallet_by_key(fellowship_id, department)
    }

    async fn find_wallet_by_account(&self, account_number: &str) -> Result<Option<UnitWallet>> {
        let id: Option<WalletId> = self.get(CF_ACCOUNTS, account_number)?;
        match id {
            Some(id) => self.get(CF_WALLETS, id_key(id.0)),
            None => Ok(None),
        }
    }

    async fn list_wallets(&self, fellowship_id: FellowshipId) -> Result<Vec<UnitWallet>> {
        let mut wallets: Vec<UnitWallet> = self
            .scan::<UnitWallet>(CF_WALLETS, &[])?
            .into_iter()
            .filter(|w| w.fellowship_id == fellowship_id)
            .collect();
        wallets.sort_by(|a, b| a.department.cmp(&b.department));
        Ok(wallets)
    }

    async fn link_virtual_account(
        &self,
        wallet_id: WalletId,
        account_number: &str,
    ) -> Result<UnitWallet> {
        let _guard = self.write_guard.lock().await;
        let mut wallet = self.require_wallet(wallet_id)?;
        let owner: Option<WalletId> = self.get(CF_ACCOUNTS, account_number)?;
        if let Some(owner) = owner
            && owner != wallet_id
        {
            return Err(WalletError::Conflict(format!(
                "Account {account_number} is already linked to wallet {owner}"
            )));
        }

        let mut batch = WriteBatch::default();
        if let Some(previous) = &wallet.virtual_account {
            batch.delete_cf(self.cf(CF_ACCOUNTS)?, previous);
        }
        wallet.virtual_account = Some(account_number.to_string());
        wallet.updated_at = Utc::now();
        self.put(&mut batch, CF_ACCOUNTS, account_number, &wallet_id)?;
        self.put(&mut batch, CF_WALLETS, id_key(wallet_id.0), &wallet)?;
        self.db.write(batch)?;
        Ok(wallet)
    }

    async fn set_wallet_status(
        &self,
        wallet_id: WalletId,
        status: WalletStatus,
    ) -> Result<UnitWallet> {
        let _guard = self.write_guard.lock().await;
        let mut wallet = self.require_wallet(wallet_id)?;
        wallet.status = status;
        wallet.updated_at = Utc::now();
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_WALLETS, id_key(wallet_id.0), &wallet)?;
        self.db.write(batch)?;
        Ok(wallet)
    }

    async fn apply_deposit(&self, entry: DepositEntry) -> Result<DepositOutcome> {
        let _guard = self.write_guard.lock().await;

        if let Some(reference) = &entry.reference {
            let existing: Option<TransactionId> = self.get(CF_REFERENCES, reference)?;
            if let Some(existing) = existing {
                let transaction: WalletTransaction = self
                    .get(CF_TRANSACTIONS, id_key(existing.0))?
                    .ok_or_else(|| {
                        WalletError::persistence(format!("dangling reference index for {reference}"))
                    })?;
                return Ok(DepositOutcome::Duplicate(self.receipt_for(transaction)?));
            }
        }

        let mut wallet = self.require_wallet(entry.wallet_id)?;
        wallet.credit(entry.amount)?;
        let fellowship_id = wallet.fellowship_id;
        let mut batch = WriteBatch::default();
        let mut next = self.allocate(&mut batch, 4)?;
        let mut take = || {
            let id = next;
            next += 1;
            id
        };

        let now = Utc::now();
        let transaction = WalletTransaction {
            id: TransactionId(take()),
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
            id: DonationId(take()),
            wallet_id: entry.wallet_id,
            member_id: draft.member_id,
            amount: entry.amount,
            payment_method: draft.payment_method,
            reference: entry.reference.clone(),
            note: draft.note,
            created_at: now,
        });
        let commission = entry.commission.map(|split| Commission {
            id: CommissionId(take()),
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
            id: ExpenseId(take()),
            fellowship_id,
            wallet_id: entry.wallet_id,
            category: draft.category,
            amount: entry.amount,
            description: draft.description,
            approved_by: draft.approved_by,
            approved_at: now,
        });
        let links = DepositLinks {
            donation: donation.as_ref().map(|d| d.id),
            commission: commission.as_ref().map(|c| c.id),
            expense: expense.as_ref().map(|e| e.id),
        };
        let tx_key = id_key(transaction.id.0);
        self.put(&mut batch, CF_WALLETS, id_key(wallet.id.0), &wallet)?;
        self.put(&mut batch, CF_TRANSACTIONS, tx_key, &transaction)?;
        self.put(&mut batch, CF_DEPOSIT_LINKS, tx_key, &links)?;
        if let Some(reference) = &transaction.reference {
            self.put(&mut batch, CF_REFERENCES, reference, &transaction.id)?;
        }
        if let Some(donation) = &donation {
            self.put(&mut batch, CF_DONATIONS, id_key(donation.id.0), donation)?;
        }
        if let Some(commission) = &commission {
            self.put(&mut batch, CF_COMMISSIONS, id_key(commission.id.0), commission)?;
        }
        if let Some(expense) = &expense {
            self.put(&mut batch, CF_EXPENSES, id_key(expense.id.0), expense)?;
        }
        self.db.write(batch)?;

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
        let _guard = self.write_guard.lock().await;
        let wallet = self.require_wallet(draft.wallet_id)?;
        wallet.ensure_can_reserve(draft.amount)?;

        let mut batch = WriteBatch::default();
        let first = self.allocate(&mut batch, 1 + chain.len() as u64)?;
        let transaction = WalletTransaction {
            id: TransactionId(first),
            wallet_id: draft.wallet_id,
            fellowship_id: wallet.fellowship_id,
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
            .zip(first + 1..)
            .map(|(step, id)| TransactionApproval::pending(ApprovalId(id), transaction.id, step))
            .collect();

        self.put(&mut batch, CF_TRANSACTIONS, id_key(transaction.id.0), &transaction)?;
        for step in &steps {
            self.put(
                &mut batch,
                CF_APPROVALS,
                approval_key(transaction.id, step.order),
                step,
            )?;
        }
        self.db.write(batch)?;
        Ok(WithdrawalReceipt {
            wallet,
            transaction,
            approvals: steps,
        })
    }

    async fn commit_approval(&self, commit: ApprovalCommit) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        let tx_id = commit.transaction.id;

        let stored: WalletTransaction = self
            .get(CF_TRANSACTIONS, id_key(tx_id.0))?
            .ok_or_else(|| WalletError::NotFound(format!("Transaction {tx_id} not found")))?;
        if stored.version != commit.expected_version {
            return Err(WalletError::Conflict(format!(
                "Transaction {tx_id} changed concurrently"
            )));
        }

        let step_key = approval_key(tx_id, commit.step.order);
        let row: TransactionApproval = self
            .get(CF_APPROVALS, &step_key)?
            .filter(|row: &TransactionApproval| row.id == commit.step.id)
            .ok_or_else(|| WalletError::NotFound(format!("Approval {} not found", commit.step.id)))?;
        if row.status != ApprovalStatus::Pending {
            return Err(WalletError::Conflict(format!(
                "Approval {} was already decided",
                row.id
            )));
        }

        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_APPROVALS, &step_key, &commit.step)?;
        self.put(&mut batch, CF_TRANSACTIONS, id_key(tx_id.0), &commit.transaction)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<WalletTransaction>> {
        self.get(CF_TRANSACTIONS, id_key(id.0))
    }

    async fn find_deposit_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<DepositReceipt>> {
        let id: Option<TransactionId> = self.get(CF_REFERENCES, reference)?;
        let Some(id) = id else {
            return Ok(None);
        };
        let transaction: Option<WalletTransaction> = self.get(CF_TRANSACTIONS, id_key(id.0))?;
        transaction.map(|t| self.receipt_for(t)).transpose()
    }

    async fn transactions_for_wallet(
        &self,
        wallet_id: WalletId,
        limit: usize,
    ) -> Result<Vec<WalletTransaction>> {
        Ok(self
            .scan_newest::<WalletTransaction>(CF_TRANSACTIONS)?
            .into_iter()
            .filter(|tx| tx.wallet_id == wallet_id)
            .take(limit)
            .collect())
    }

    async fn transactions_for_fellowship(
        &self,
        fellowship_id: FellowshipId,
        filter: &TransactionFilter,
    ) -> Result<Vec<WalletTransaction>> {
        Ok(self
            .scan_newest::<WalletTransaction>(CF_TRANSACTIONS)?
            .into_iter()
            .filter(|tx| tx.fellowship_id == fellowship_id && filter.matches(tx))
            .collect())
    }

    async fn approvals_for(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<TransactionApproval>> {
        self.scan(CF_APPROVALS, &id_key(transaction_id.0))
    }

    async fn pending_approvals(
        &self,
        role: Role,
        fellowship_id: FellowshipId,
    ) -> Result<Vec<TransactionApproval>> {
        let mut pending = Vec::new();
        for step in self.scan::<TransactionApproval>(CF_APPROVALS, &[])? {
            if step.role != role || step.status != ApprovalStatus::Pending {
                continue;
            }
            let transaction: Option<WalletTransaction> =
                self.get(CF_TRANSACTIONS, id_key(step.transaction_id.0))?;
            if transaction.is_some_and(|tx| tx.fellowship_id == fellowship_id) {
                pending.push(step);
            }
        }
        Ok(pending)
    }

    async fn donations_for_wallet(
        &self,
        wallet_id: WalletId,
        limit: usize,
    ) -> Result<Vec<MemberDonation>> {
        Ok(self
            .scan_newest::<MemberDonation>(CF_DONATIONS)?
            .into_iter()
            .filter(|d| d.wallet_id == wallet_id)
            .take(limit)
            .collect())
    }

    async fn commissions(&self, filter: &CommissionFilter) -> Result<Vec<Commission>> {
        Ok(self
            .scan_newest::<Commission>(CF_COMMISSIONS)?
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect())
    }

    async fn treasury_expenses(&self, fellowship_id: FellowshipId) -> Result<Vec<TreasuryExpense>> {
        Ok(self
            .scan_newest::<TreasuryExpense>(CF_EXPENSES)?
            .into_iter()
            .filter(|e| e.fellowship_id == fellowship_id)
            .collect())
    }
}
