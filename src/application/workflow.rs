use crate::domain::actor::{Actor, Role};
use crate::domain::approval::{
    ApprovalStatus, Decision, TransactionApproval, locate_actionable, next_actionable,
    predecessors_approved,
};
use crate::domain::ids::{FellowshipId, TransactionId};
use crate::domain::ports::{ApprovalCommit, LedgerStoreRef};
use crate::domain::transaction::{TransactionKind, TransactionStatus, WalletTransaction};
use crate::error::{Result, WalletError};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// How many times a decision is re-evaluated after losing a race on the same transaction.
const MAX_DECISION_ATTEMPTS: usize = 3;

/// An approval step that is this role's turn right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionableApproval {
    pub step: TransactionApproval,
    pub transaction: WalletTransaction,
}

/// Result of approving or rejecting a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalOutcome {
    pub transaction: WalletTransaction,
    pub step: TransactionApproval,
    /// Role whose turn it is next; `None` once the chain is finished.
    pub next_approver_role: Option<Role>,
}

/// Sequential approval chain for withdrawals.
///
/// Chains are opened together with their withdrawal by
/// [`crate::domain::ports::LedgerStore::open_withdrawal`]. Decisions are committed
/// with an optimistic version check on the parent transaction, so two approvers
/// racing for one position cannot both succeed.
pub struct ApprovalWorkflow {
    store: LedgerStoreRef,
}

impl ApprovalWorkflow {
    pub fn new(store: LedgerStoreRef) -> Self {
        Self { store }
    }

    /// Steps `role` may act on now. Readiness is recomputed on every call.
    pub async fn list_actionable(
        &self,
        role: Role,
        fellowship_id: FellowshipId,
    ) -> Result<Vec<ActionableApproval>> {
        let pending = self.store.pending_approvals(role, fellowship_id).await?;
        let mut chains: HashMap<TransactionId, (WalletTransaction, Vec<TransactionApproval>)> =
            HashMap::new();
        let mut actionable = Vec::new();

        for step in pending {
            if !chains.contains_key(&step.transaction_id) {
                let Some(transaction) = self.store.get_transaction(step.transaction_id).await?
                else {
                    continue;
                };
                let steps = self.store.approvals_for(step.transaction_id).await?;
                chains.insert(step.transaction_id, (transaction, steps));
            }
            let Some((transaction, steps)) = chains.get(&step.transaction_id) else {
                continue;
            };
            if transaction.status == TransactionStatus::Pending
                && predecessors_approved(steps, step.order)
            {
                actionable.push(ActionableApproval {
                    step,
                    transaction: transaction.clone(),
                });
            }
        }

        actionable.sort_by_key(|a| (a.transaction.created_at, a.step.order));
        Ok(actionable)
    }

    pub async fn approve(
        &self,
        transaction_id: TransactionId,
        actor: &Actor,
        comments: Option<String>,
    ) -> Result<ApprovalOutcome> {
        self.decide(transaction_id, actor, Decision::Approve, comments)
            .await
    }

    /// Rejects the actor's step and terminates the withdrawal. A reason is required.
    pub async fn reject(
        &self,
        transaction_id: TransactionId,
        actor: &Actor,
        comments: Option<String>,
    ) -> Result<ApprovalOutcome> {
        self.decide(transaction_id, actor, Decision::Reject, comments)
            .await
    }

    pub async fn decide(
        &self,
        transaction_id: TransactionId,
        actor: &Actor,
        decision: Decision,
        comments: Option<String>,
    ) -> Result<ApprovalOutcome> {
        let comments = comments
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if decision == Decision::Reject && comments.is_none() {
            return Err(WalletError::ValidationError(
                "A rejection needs a reason".to_string(),
            ));
        }

        let mut attempt = 1;
        loop {
            match self
                .try_decide(transaction_id, actor, decision, comments.clone())
                .await
            {
                Err(WalletError::Conflict(reason)) if attempt < MAX_DECISION_ATTEMPTS => {
                    debug!(
                        transaction_id = %transaction_id,
                        attempt,
                        reason,
                        "Approval raced with another decision; re-evaluating"
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Every step of one withdrawal, in chain order.
    pub async fn timeline(
        &self,
        transaction_id: TransactionId,
        actor: &Actor,
    ) -> Result<Vec<TransactionApproval>> {
        let transaction = self.load(transaction_id).await?;
        actor.ensure_fellowship(transaction.fellowship_id)?;
        self.store.approvals_for(transaction_id).await
    }

    async fn try_decide(
        &self,
        transaction_id: TransactionId,
        actor: &Actor,
        decision: Decision,
        comments: Option<String>,
    ) -> Result<ApprovalOutcome> {
        let mut transaction = self.load(transaction_id).await?;
        actor.ensure_fellowship(transaction.fellowship_id)?;
        if transaction.kind != TransactionKind::Withdrawal {
            return Err(WalletError::NotFound(format!(
                "Transaction {transaction_id} has no approval chain"
            )));
        }
        transaction.ensure_pending()?;

        let mut steps = self.store.approvals_for(transaction_id).await?;
        let mut step = locate_actionable(&steps, actor.role)?.clone();
        if !step.can_be_decided_by(actor) {
            return Err(WalletError::Unauthorized(format!(
                "Role {} cannot decide step {}",
                actor.role, step.order
            )));
        }
        step.decide(decision, actor.id, comments.clone())?;

        let expected_version = transaction.version;
        match decision {
            Decision::Approve => {
                let last = steps
                    .iter()
                    .all(|s| s.id == step.id || s.status == ApprovalStatus::Approved);
                if last {
                    transaction.approve()?;
                } else {
                    transaction.touch()?;
                }
            }
            Decision::Reject => transaction.reject(comments.as_deref().unwrap_or_default())?,
        }

        self.store
            .commit_approval(ApprovalCommit {
                transaction: transaction.clone(),
                step: step.clone(),
                expected_version,
            })
            .await?;

        if let Some(row) = steps.iter_mut().find(|s| s.id == step.id) {
            *row = step.clone();
        }
        let next_approver_role = match transaction.status {
            TransactionStatus::Pending => next_actionable(&steps).map(|s| s.role),
            TransactionStatus::Approved
            | TransactionStatus::Completed
            | TransactionStatus::Rejected => None,
        };

        info!(
            transaction_id = %transaction_id,
            wallet_id = %transaction.wallet_id,
            actor_id = %actor.id,
            role = %actor.role,
            order = step.order,
            decision = ?decision,
            amount = %transaction.amount,
            status = %transaction.status,
            next_role = ?next_approver_role,
            "Withdrawal approval step decided"
        );

        Ok(ApprovalOutcome {
            transaction,
            step,
            next_approver_role,
        })
    }

    async fn load(&self, transaction_id: TransactionId) -> Result<WalletTransaction> {
        self.store
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| WalletError::NotFound(format!("Transaction {transaction_id} not found")))
    }
}
