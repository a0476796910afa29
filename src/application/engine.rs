use super::commission::CommissionCalculator;
use super::reports::{CommissionReport, ReportService};
use super::wallets::{DonationReceipt, DonationRequest, WalletService, WalletView};
use super::webhook::{SignatureVerifier, WebhookAck, WebhookIngestor};
use super::workflow::{ActionableApproval, ApprovalOutcome, ApprovalWorkflow};
use crate::config::{ApprovalConfig, LedgerConfig};
use crate::domain::actor::{Actor, Role};
use crate::domain::approval::{Decision, TransactionApproval};
use crate::domain::donation::CommissionFilter;
use crate::domain::ids::{FellowshipId, TransactionId, WalletId};
use crate::domain::ports::{LedgerStoreRef, MemberDirectoryRef};
use crate::domain::transaction::{TransactionFilter, WalletTransaction};
use crate::domain::wallet::UnitWallet;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

/// A freshly opened withdrawal and the chain it must pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawalRequest {
    pub transaction: WalletTransaction,
    pub chain: Vec<TransactionApproval>,
}

/// The main entry point for the unit ledger.
///
/// `WalletEngine` wires the wallet, approval, webhook and report services to one
/// store. Every operation is a bounded request/response; the store provides the
/// atomicity each one needs, so the engine itself holds no locks.
pub struct WalletEngine {
    approval: ApprovalConfig,
    wallets: WalletService,
    workflow: ApprovalWorkflow,
    webhooks: WebhookIngestor,
    reports: ReportService,
}

impl WalletEngine {
    /// Creates a new `WalletEngine`.
    ///
    /// # Arguments
    ///
    /// * `config` - Approval chains, commission rates, webhook secret and view limits.
    /// * `store` - Ledger persistence.
    /// * `directory` - Member roster used to attribute external payments.
    pub fn new(config: &LedgerConfig, store: LedgerStoreRef, directory: MemberDirectoryRef) -> Self {
        let calculator = CommissionCalculator::new(config.commission);
        Self {
            approval: config.approval.clone(),
            wallets: WalletService::new(
                store.clone(),
                calculator,
                config.wallet.recent_activity_limit,
            ),
            workflow: ApprovalWorkflow::new(store.clone()),
            webhooks: WebhookIngestor::new(
                store.clone(),
                directory,
                calculator,
                SignatureVerifier::new(config.webhook.secret.as_deref()),
            ),
            reports: ReportService::new(store),
        }
    }

    pub fn wallets(&self) -> &WalletService {
        &self.wallets
    }

    pub fn workflow(&self) -> &ApprovalWorkflow {
        &self.workflow
    }

    pub fn webhooks(&self) -> &WebhookIngestor {
        &self.webhooks
    }

    pub fn reports(&self) -> &ReportService {
        &self.reports
    }

    /// Opens a withdrawal against a unit wallet under the fellowship's approval chain.
    pub async fn request_withdrawal(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
        description: &str,
        actor: &Actor,
    ) -> Result<WithdrawalRequest> {
        let chain = self.approval.chain_for(actor.fellowship_id);
        let (transaction, chain) = self
            .wallets
            .debit_reserve(wallet_id, amount, description, actor, chain)
            .await
            .inspect_err(|e| debug!(error = %e, wallet_id = %wallet_id, "Withdrawal refused"))?;
        Ok(WithdrawalRequest { transaction, chain })
    }

    pub async fn list_pending_approvals(
        &self,
        role: Role,
        fellowship_id: FellowshipId,
    ) -> Result<Vec<ActionableApproval>> {
        self.workflow.list_actionable(role, fellowship_id).await
    }

    pub async fn act_on_approval(
        &self,
        transaction_id: TransactionId,
        actor: &Actor,
        decision: Decision,
        comments: Option<String>,
    ) -> Result<ApprovalOutcome> {
        self.workflow
            .decide(transaction_id, actor, decision, comments)
            .await
            .inspect_err(|e| {
                debug!(
                    error = %e,
                    kind = e.kind(),
                    transaction_id = %transaction_id,
                    "Approval decision refused"
                )
            })
    }

    pub async fn approval_timeline(
        &self,
        transaction_id: TransactionId,
        actor: &Actor,
    ) -> Result<Vec<TransactionApproval>> {
        self.workflow.timeline(transaction_id, actor).await
    }

    pub async fn record_donation(
        &self,
        request: DonationRequest,
        actor: &Actor,
    ) -> Result<DonationReceipt> {
        self.wallets.record_donation(request, actor).await
    }

    /// Verifies and credits a raw payment provider delivery.
    pub async fn ingest_payment_webhook(&self, body: &[u8], signature: &str) -> Result<WebhookAck> {
        self.webhooks.ingest(body, signature).await
    }

    pub async fn get_wallet(&self, wallet_id: WalletId, actor: &Actor) -> Result<WalletView> {
        self.wallets.view(wallet_id, actor).await
    }

    pub async fn list_wallets(
        &self,
        fellowship_id: FellowshipId,
        actor: &Actor,
    ) -> Result<Vec<UnitWallet>> {
        actor.ensure_fellowship(fellowship_id)?;
        self.wallets.list_wallets(fellowship_id).await
    }

    pub async fn get_commission_report(
        &self,
        filter: &CommissionFilter,
        actor: &Actor,
    ) -> Result<CommissionReport> {
        self.reports.commission_report(filter, actor).await
    }

    pub async fn list_transactions(
        &self,
        fellowship_id: FellowshipId,
        filter: &TransactionFilter,
        actor: &Actor,
    ) -> Result<Vec<WalletTransaction>> {
        self.reports
            .list_transactions(fellowship_id, filter, actor)
            .await
    }
}
