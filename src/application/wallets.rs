use super::commission::CommissionCalculator;
use crate::domain::actor::Actor;
use crate::domain::donation::{MemberDonation, PaymentMethod, TreasuryExpense};
use crate::domain::ids::{FellowshipId, UserId, WalletId};
use crate::domain::money::Amount;
use crate::domain::ports::{
    DepositEntry, DepositOutcome, DepositReceipt, DonationDraft, ExpenseDraft, LedgerStoreRef,
    WithdrawalDraft,
};
use crate::domain::approval::{ApprovalChain, TransactionApproval};
use crate::domain::transaction::WalletTransaction;
use crate::domain::wallet::{Department, UnitWallet, WalletStatus};
use crate::error::{Result, WalletError};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

/// Category recorded on the fellowship expense when the treasury funds a unit.
pub const UNIT_FUNDING_CATEGORY: &str = "UNIT_FUNDING";

/// A wallet plus its most recent activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletView {
    pub wallet: UnitWallet,
    pub recent_transactions: Vec<WalletTransaction>,
    pub recent_donations: Vec<MemberDonation>,
}

/// Result of recording a donation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonationReceipt {
    pub donation: MemberDonation,
    pub transaction: WalletTransaction,
    pub net_amount: Decimal,
}

/// Input for a manually entered donation.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationRequest {
    pub wallet_id: WalletId,
    pub member_id: Option<UserId>,
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    pub reference: Option<String>,
    pub note: Option<String>,
}

/// Balance mutation primitives for unit wallets.
///
/// Every credit goes through [`crate::domain::ports::LedgerStore::apply_deposit`],
/// so the balance increment is atomic with the rows describing it.
pub struct WalletService {
    store: LedgerStoreRef,
    calculator: CommissionCalculator,
    recent_limit: usize,
}

impl WalletService {
    pub fn new(store: LedgerStoreRef, calculator: CommissionCalculator, recent_limit: usize) -> Self {
        Self {
            store,
            calculator,
            recent_limit,
        }
    }

    pub async fn get_or_create_wallet(
        &self,
        fellowship_id: FellowshipId,
        department: &Department,
    ) -> Result<UnitWallet> {
        let (wallet, created) = self
            .store
            .get_or_create_wallet(fellowship_id, department)
            .await?;
        if created {
            info!(
                wallet_id = %wallet.id,
                fellowship_id = %fellowship_id,
                department = %department,
                "Created unit wallet"
            );
        }
        Ok(wallet)
    }

    /// Explicit creation by an executive of the fellowship.
    pub async fn create_wallet(
        &self,
        fellowship_id: FellowshipId,
        department: &Department,
        actor: &Actor,
    ) -> Result<UnitWallet> {
        actor.ensure_fellowship(fellowship_id)?;
        actor.ensure_executive()?;
        let wallet = self.store.create_wallet(fellowship_id, department).await?;
        info!(
            wallet_id = %wallet.id,
            fellowship_id = %fellowship_id,
            department = %department,
            actor_id = %actor.id,
            "Created unit wallet"
        );
        Ok(wallet)
    }

    /// Loads a wallet the actor's fellowship owns.
    pub async fn wallet_for(&self, wallet_id: WalletId, actor: &Actor) -> Result<UnitWallet> {
        let wallet = self.require_wallet(wallet_id).await?;
        actor.ensure_fellowship(wallet.fellowship_id)?;
        Ok(wallet)
    }

    pub async fn find_wallet(
        &self,
        fellowship_id: FellowshipId,
        department: &Department,
    ) -> Result<UnitWallet> {
        self.store
            .find_wallet(fellowship_id, department)
            .await?
            .ok_or_else(|| {
                WalletError::NotFound(format!(
                    "No wallet for {department} in fellowship {fellowship_id}"
                ))
            })
    }

    pub async fn list_wallets(&self, fellowship_id: FellowshipId) -> Result<Vec<UnitWallet>> {
        self.store.list_wallets(fellowship_id).await
    }

    pub async fn view(&self, wallet_id: WalletId, actor: &Actor) -> Result<WalletView> {
        let wallet = self.wallet_for(wallet_id, actor).await?;
        let recent_transactions = self
            .store
            .transactions_for_wallet(wallet_id, self.recent_limit)
            .await?;
        let recent_donations = self
            .store
            .donations_for_wallet(wallet_id, self.recent_limit)
            .await?;
        Ok(WalletView {
            wallet,
            recent_transactions,
            recent_donations,
        })
    }

    pub async fn donations(
        &self,
        wallet_id: WalletId,
        actor: &Actor,
        limit: usize,
    ) -> Result<Vec<MemberDonation>> {
        self.wallet_for(wallet_id, actor).await?;
        self.store.donations_for_wallet(wallet_id, limit).await
    }

    pub async fn link_virtual_account(
        &self,
        wallet_id: WalletId,
        account_number: &str,
        actor: &Actor,
    ) -> Result<UnitWallet> {
        let account_number = account_number.trim();
        if account_number.is_empty() {
            return Err(WalletError::ValidationError(
                "Account number must not be empty".to_string(),
            ));
        }
        self.wallet_for(wallet_id, actor).await?;
        actor.ensure_executive()?;
        let wallet = self
            .store
            .link_virtual_account(wallet_id, account_number)
            .await?;
        info!(
            wallet_id = %wallet_id,
            account_number,
            actor_id = %actor.id,
            "Linked virtual account"
        );
        Ok(wallet)
    }

    pub async fn set_status(
        &self,
        wallet_id: WalletId,
        status: WalletStatus,
        actor: &Actor,
    ) -> Result<UnitWallet> {
        self.wallet_for(wallet_id, actor).await?;
        actor.ensure_super_admin()?;
        let wallet = self.store.set_wallet_status(wallet_id, status).await?;
        info!(wallet_id = %wallet_id, status = %status, actor_id = %actor.id, "Changed wallet status");
        Ok(wallet)
    }

    /// Records a completed deposit and increments the balance.
    pub async fn credit(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
        description: &str,
        reference: Option<&str>,
    ) -> Result<DepositReceipt> {
        let amount = Amount::new(amount)?;
        self.require_wallet(wallet_id).await?;
        let entry = DepositEntry {
            wallet_id,
            amount,
            description: description.to_string(),
            reference: normalize_reference(reference)?,
            initiated_by: None,
            donation: None,
            commission: None,
            expense: None,
        };
        let receipt = self.expect_fresh(self.store.apply_deposit(entry).await?)?;
        audit_deposit(&receipt, None, "Credited wallet");
        Ok(receipt)
    }

    /// Opens a pending withdrawal with its approval chain. The balance is not decremented.
    pub async fn debit_reserve(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
        description: &str,
        initiator: &Actor,
        chain: &ApprovalChain,
    ) -> Result<(WalletTransaction, Vec<TransactionApproval>)> {
        let amount = Amount::new(amount)?;
        let wallet = self.wallet_for(wallet_id, initiator).await?;
        initiator.ensure_heads(&wallet.department)?;

        let draft = WithdrawalDraft {
            wallet_id,
            amount,
            description: description.to_string(),
            initiated_by: initiator.id,
        };
        let opened = self.store.open_withdrawal(draft, chain).await?;
        info!(
            transaction_id = %opened.transaction.id,
            wallet_id = %wallet_id,
            actor_id = %initiator.id,
            amount = %amount,
            balance = %opened.wallet.balance,
            steps = opened.approvals.len(),
            "Withdrawal requested"
        );
        Ok((opened.transaction, opened.approvals))
    }

    /// Moves money from the fellowship treasury into a unit wallet.
    pub async fn fund_from_treasury(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
        description: &str,
        approver: &Actor,
    ) -> Result<DepositReceipt> {
        let amount = Amount::new(amount)?;
        let wallet = self.wallet_for(wallet_id, approver).await?;
        approver.ensure_executive()?;

        let entry = DepositEntry {
            wallet_id,
            amount,
            description: format!("Received from Main Treasury: {description}"),
            reference: None,
            initiated_by: Some(approver.id),
            donation: None,
            commission: None,
            expense: Some(ExpenseDraft {
                category: UNIT_FUNDING_CATEGORY.to_string(),
                description: format!("Funding for {}: {description}", wallet.department),
                approved_by: approver.id,
            }),
        };
        let receipt = self.expect_fresh(self.store.apply_deposit(entry).await?)?;
        audit_deposit(&receipt, Some(approver.id), "Funded wallet from treasury");
        Ok(receipt)
    }

    /// Records a manually entered donation, net of any commission.
    ///
    /// A reference that was already recorded is a `Conflict`.
    pub async fn record_donation(
        &self,
        request: DonationRequest,
        actor: &Actor,
    ) -> Result<DonationReceipt> {
        let wallet = self.wallet_for(request.wallet_id, actor).await?;
        let split = self.calculator.split(request.amount, request.payment_method);
        let net = Amount::new(split.net)?;
        let description = match &request.note {
            Some(note) => format!("Donation from member: {note}"),
            None => "Donation from member".to_string(),
        };

        let entry = DepositEntry {
            wallet_id: wallet.id,
            amount: net,
            description,
            reference: normalize_reference(request.reference.as_deref())?,
            initiated_by: Some(actor.id),
            donation: Some(DonationDraft {
                member_id: request.member_id,
                payment_method: request.payment_method,
                note: request.note,
            }),
            commission: request
                .payment_method
                .is_externally_routed()
                .then_some(split),
            expense: None,
        };
        let receipt = self.expect_fresh(self.store.apply_deposit(entry).await?)?;
        audit_deposit(&receipt, Some(actor.id), "Recorded donation");
        into_donation_receipt(receipt)
    }

    pub async fn treasury_expenses(
        &self,
        fellowship_id: FellowshipId,
        actor: &Actor,
    ) -> Result<Vec<TreasuryExpense>> {
        actor.ensure_fellowship(fellowship_id)?;
        self.store.treasury_expenses(fellowship_id).await
    }

    async fn require_wallet(&self, wallet_id: WalletId) -> Result<UnitWallet> {
        self.store
            .get_wallet(wallet_id)
            .await?
            .ok_or_else(|| WalletError::NotFound(format!("Wallet {wallet_id} not found")))
    }

    fn expect_fresh(&self, outcome: DepositOutcome) -> Result<DepositReceipt> {
        match outcome {
            DepositOutcome::Applied(receipt) => Ok(receipt),
            DepositOutcome::Duplicate(existing) => {
                debug!(
                    transaction_id = %existing.transaction.id,
                    "Deposit reference already recorded"
                );
                Err(WalletError::Conflict(format!(
                    "Reference {} was already recorded as transaction {}",
                    existing.transaction.reference.as_deref().unwrap_or_default(),
                    existing.transaction.id
                )))
            }
        }
    }
}

pub(crate) fn normalize_reference(reference: Option<&str>) -> Result<Option<String>> {
    match reference.map(str::trim) {
        None => Ok(None),
        Some("") => Ok(None),
        Some(r) if r.len() > 128 => Err(WalletError::ValidationError(
            "Payment reference is longer than 128 characters".to_string(),
        )),
        Some(r) => Ok(Some(r.to_string())),
    }
}

pub(crate) fn audit_deposit(receipt: &DepositReceipt, actor: Option<UserId>, message: &str) {
    info!(
        transaction_id = %receipt.transaction.id,
        wallet_id = %receipt.wallet.id,
        actor_id = ?actor.map(|id| id.0),
        amount = %receipt.transaction.amount,
        balance = %receipt.wallet.balance,
        reference = ?receipt.transaction.reference,
        "{message}"
    );
}

pub(crate) fn into_donation_receipt(receipt: DepositReceipt) -> Result<DonationReceipt> {
    let donation = receipt.donation.ok_or_else(|| {
        WalletError::persistence(format!(
            "transaction {} has no donation row",
            receipt.transaction.id
        ))
    })?;
    Ok(DonationReceipt {
        net_amount: donation.amount.value(),
        donation,
        transaction: receipt.transaction,
    })
}
