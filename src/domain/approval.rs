use super::actor::{Actor, Role};
use super::ids::{ApprovalId, TransactionId, UserId};
use crate::error::WalletError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

/// One position in an approval chain.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct ChainStep {
    pub order: u32,
    pub role: Role,
    #[serde(default)]
    pub label: String,
}

impl ChainStep {
    pub fn new(order: u32, role: Role, label: &str) -> Self {
        Self {
            order,
            role,
            label: label.to_string(),
        }
    }
}

/// Ordered sequence of role sign-offs a withdrawal needs.
///
/// Orders are contiguous from 1. A role may appear more than once.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(try_from = "Vec<ChainStep>", into = "Vec<ChainStep>")]
pub struct ApprovalChain {
    steps: Vec<ChainStep>,
}

impl ApprovalChain {
    pub fn new(mut steps: Vec<ChainStep>) -> Result<Self, WalletError> {
        if steps.is_empty() {
            return Err(WalletError::ValidationError(
                "Approval chain must have at least one step".to_string(),
            ));
        }
        steps.sort_by_key(|s| s.order);
        for (idx, step) in steps.iter().enumerate() {
            let expected = idx as u32 + 1;
            if step.order != expected {
                return Err(WalletError::ValidationError(format!(
                    "Approval chain orders must run 1..{} without gaps; found {} at position {}",
                    steps.len(),
                    step.order,
                    expected
                )));
            }
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[ChainStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for ApprovalChain {
    fn default() -> Self {
        Self {
            steps: vec![
                ChainStep::new(1, Role::SecretaryGeneral, "Secretary General (Initial)"),
                ChainStep::new(2, Role::President, "President"),
                ChainStep::new(3, Role::VicePresident, "Vice President"),
                ChainStep::new(4, Role::SecretaryGeneral, "Secretary General (Final)"),
                ChainStep::new(5, Role::FinancialSecretary, "Financial Secretary"),
            ],
        }
    }
}

impl TryFrom<Vec<ChainStep>> for ApprovalChain {
    type Error = WalletError;

    fn try_from(steps: Vec<ChainStep>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<ApprovalChain> for Vec<ChainStep> {
    fn from(chain: ApprovalChain) -> Self {
        chain.steps
    }
}

/// A single required sign-off on a withdrawal.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TransactionApproval {
    pub id: ApprovalId,
    pub transaction_id: TransactionId,
    pub role: Role,
    pub order: u32,
    pub status: ApprovalStatus,
    pub approver_id: Option<UserId>,
    pub comments: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TransactionApproval {
    pub fn pending(id: ApprovalId, transaction_id: TransactionId, step: &ChainStep) -> Self {
        Self {
            id,
            transaction_id,
            role: step.role,
            order: step.order,
            status: ApprovalStatus::Pending,
            approver_id: None,
            comments: None,
            decided_at: None,
            created_at: Utc::now(),
        }
    }

    /// Capability check: the actor's role must be the step's role. Department plays no part.
    pub fn can_be_decided_by(&self, actor: &Actor) -> bool {
        actor.role == self.role
    }

    /// Applies a decision. Each step is decided at most once.
    pub fn decide(
        &mut self,
        decision: Decision,
        approver: UserId,
        comments: Option<String>,
    ) -> Result<(), WalletError> {
        if self.status != ApprovalStatus::Pending {
            return Err(WalletError::OutOfOrder(format!(
                "Approval step {} of transaction {} was already decided",
                self.order, self.transaction_id
            )));
        }
        self.status = match decision {
            Decision::Approve => ApprovalStatus::Approved,
            Decision::Reject => ApprovalStatus::Rejected,
        };
        self.approver_id = Some(approver);
        self.comments = comments;
        self.decided_at = Some(Utc::now());
        Ok(())
    }
}

/// True when every step ordered before `order` is approved.
pub fn predecessors_approved(steps: &[TransactionApproval], order: u32) -> bool {
    steps
        .iter()
        .filter(|s| s.order < order)
        .all(|s| s.status == ApprovalStatus::Approved)
}

/// Finds the step `role` must act on next.
///
/// Picks the earliest pending step with that role, so a role listed twice cannot
/// satisfy both positions with one action.
pub fn locate_actionable(
    steps: &[TransactionApproval],
    role: Role,
) -> Result<&TransactionApproval, WalletError> {
    let step = steps
        .iter()
        .filter(|s| s.role == role && s.status == ApprovalStatus::Pending)
        .min_by_key(|s| s.order)
        .ok_or_else(|| {
            WalletError::NotFound(format!("No pending approval for role {role}"))
        })?;

    if !predecessors_approved(steps, step.order) {
        return Err(WalletError::OutOfOrder(format!(
            "Approval step {} ({}) is waiting on earlier approvals",
            step.order, role
        )));
    }
    Ok(step)
}

/// The step whose turn it is, if the chain is still moving.
pub fn next_actionable(steps: &[TransactionApproval]) -> Option<&TransactionApproval> {
    steps
        .iter()
        .filter(|s| s.status == ApprovalStatus::Pending)
        .min_by_key(|s| s.order)
        .filter(|s| predecessors_approved(steps, s.order))
}
