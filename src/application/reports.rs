use crate::domain::actor::Actor;
use crate::domain::donation::{Commission, CommissionFilter};
use crate::domain::ids::FellowshipId;
use crate::domain::ports::LedgerStoreRef;
use crate::domain::transaction::{TransactionFilter, WalletTransaction};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommissionTotals {
    pub total_platform_cut: Decimal,
    pub total_processor_fees: Decimal,
    pub total_processed: Decimal,
    pub total_net: Decimal,
    pub count: usize,
}

impl CommissionTotals {
    fn add(&mut self, commission: &Commission) {
        self.total_platform_cut += commission.platform_cut;
        self.total_processor_fees += commission.processor_fee;
        self.total_processed += commission.gross_amount;
        self.total_net += commission.net_amount;
        self.count += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionReport {
    pub commissions: Vec<Commission>,
    pub totals: CommissionTotals,
}

/// Read-only views over commissions and fellowship transactions.
pub struct ReportService {
    store: LedgerStoreRef,
}

impl ReportService {
    pub fn new(store: LedgerStoreRef) -> Self {
        Self { store }
    }

    /// Commissions matching `filter`, with totals.
    ///
    /// A report across every fellowship is reserved for super admins. A fellowship-scoped
    /// report needs finance oversight within that fellowship.
    pub async fn commission_report(
        &self,
        filter: &CommissionFilter,
        actor: &Actor,
    ) -> Result<CommissionReport> {
        match filter.fellowship_id {
            Some(fellowship_id) => {
                actor.ensure_fellowship(fellowship_id)?;
                actor.ensure_finance_oversight()?;
            }
            None => actor.ensure_super_admin()?,
        }
        let commissions = self.store.commissions(filter).await?;
        let totals = commissions
            .iter()
            .fold(CommissionTotals::default(), |mut totals, c| {
                totals.add(c);
                totals
            });
        Ok(CommissionReport {
            commissions,
            totals,
        })
    }

    /// Every wallet transaction of a fellowship, newest first. Finance oversight only.
    pub async fn list_transactions(
        &self,
        fellowship_id: FellowshipId,
        filter: &TransactionFilter,
        actor: &Actor,
    ) -> Result<Vec<WalletTransaction>> {
        actor.ensure_fellowship(fellowship_id)?;
        actor.ensure_finance_oversight()?;
        self.store
            .transactions_for_fellowship(fellowship_id, filter)
            .await
    }
}
