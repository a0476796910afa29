use super::csv::command_reader::{CommandKind, LedgerCommand};
use crate::application::engine::WalletEngine;
use crate::application::wallets::DonationRequest;
use crate::application::webhook::PaymentNotification;
use crate::domain::actor::{Actor, Role};
use crate::domain::approval::Decision;
use crate::domain::donation::PaymentMethod;
use crate::domain::ids::{FellowshipId, TransactionId, UserId};
use crate::domain::money::Amount;
use crate::domain::wallet::{Department, UnitWallet, WalletStatus};
use crate::error::{Result, WalletError};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Applies ledger commands, one row at a time, to a [`WalletEngine`].
pub struct CommandRunner<'a> {
    engine: &'a WalletEngine,
    /// File-local withdrawal handles to stored transaction ids.
    handles: HashMap<u64, TransactionId>,
    fellowships: BTreeSet<FellowshipId>,
}

impl<'a> CommandRunner<'a> {
    pub fn new(engine: &'a WalletEngine) -> Self {
        Self {
            engine,
            handles: HashMap::new(),
            fellowships: BTreeSet::new(),
        }
    }

    pub async fn apply(&mut self, cmd: LedgerCommand) -> Result<()> {
        let fellowship = FellowshipId(cmd.fellowship);
        self.fellowships.insert(fellowship);
        let wallets = self.engine.wallets();

        match cmd.kind {
            CommandKind::Create => {
                wallets
                    .create_wallet(fellowship, &department(&cmd)?, &actor(&cmd)?)
                    .await?;
            }
            CommandKind::Link => {
                let wallet = wallets.find_wallet(fellowship, &department(&cmd)?).await?;
                let account = required(cmd.account.as_deref(), "account")?;
                wallets
                    .link_virtual_account(wallet.id, account, &actor(&cmd)?)
                    .await?;
            }
            CommandKind::Fund => {
                let approver = actor(&cmd)?;
                let amount = amount(&cmd)?;
                let wallet = wallets
                    .get_or_create_wallet(fellowship, &department(&cmd)?)
                    .await?;
                let note = cmd.note.as_deref().unwrap_or("Unit funding");
                wallets
                    .fund_from_treasury(wallet.id, amount, note, &approver)
                    .await?;
            }
            CommandKind::Donate => {
                let wallet = wallets.find_wallet(fellowship, &department(&cmd)?).await?;
                let payment_method = match cmd.method.as_deref() {
                    Some(method) => method.parse()?,
                    None => PaymentMethod::Cash,
                };
                let request = DonationRequest {
                    wallet_id: wallet.id,
                    member_id: cmd.member.map(UserId),
                    amount: Amount::new(amount(&cmd)?)?,
                    payment_method,
                    reference: cmd.reference.clone(),
                    note: cmd.note.clone(),
                };
                self.engine.record_donation(request, &actor(&cmd)?).await?;
            }
            CommandKind::Withdraw => {
                let handle = handle(&cmd)?;
                if self.handles.contains_key(&handle) {
                    return Err(WalletError::Conflict(format!(
                        "Withdrawal handle {handle} is already in use"
                    )));
                }
                let wallet = wallets.find_wallet(fellowship, &department(&cmd)?).await?;
                let description = cmd.note.as_deref().unwrap_or("Unit withdrawal");
                let request = self
                    .engine
                    .request_withdrawal(wallet.id, amount(&cmd)?, description, &actor(&cmd)?)
                    .await?;
                debug!(handle, transaction_id = %request.transaction.id, "Bound withdrawal handle");
                self.handles.insert(handle, request.transaction.id);
            }
            CommandKind::Approve => self.decide(&cmd, Decision::Approve).await?,
            CommandKind::Reject => self.decide(&cmd, Decision::Reject).await?,
            CommandKind::Webhook => {
                let notification = PaymentNotification {
                    account_number: required(cmd.account.as_deref(), "account")?.to_string(),
                    amount: amount(&cmd)?,
                    reference: required(cmd.reference.as_deref(), "reference")?.to_string(),
                    payer_name: cmd.payer.clone().unwrap_or_default(),
                    payer_phone: cmd.phone.clone(),
                };
                self.engine
                    .webhooks()
                    .ingest_notification(notification)
                    .await?;
            }
            CommandKind::Suspend => self.set_status(&cmd, WalletStatus::Suspended).await?,
            CommandKind::Activate => self.set_status(&cmd, WalletStatus::Active).await?,
        }
        Ok(())
    }

    async fn decide(&self, cmd: &LedgerCommand, decision: Decision) -> Result<()> {
        let handle = handle(cmd)?;
        let transaction_id = self.handles.get(&handle).copied().ok_or_else(|| {
            WalletError::NotFound(format!("No withdrawal bound to handle {handle}"))
        })?;
        self.engine
            .act_on_approval(transaction_id, &actor(cmd)?, decision, cmd.note.clone())
            .await?;
        Ok(())
    }

    async fn set_status(&self, cmd: &LedgerCommand, status: WalletStatus) -> Result<()> {
        let wallets = self.engine.wallets();
        let wallet = wallets
            .find_wallet(FellowshipId(cmd.fellowship), &department(cmd)?)
            .await?;
        wallets.set_status(wallet.id, status, &actor(cmd)?).await?;
        Ok(())
    }

    /// Every wallet of every fellowship the commands touched.
    pub async fn wallets(&self) -> Result<Vec<UnitWallet>> {
        let mut all = Vec::new();
        for fellowship in &self.fellowships {
            all.extend(self.engine.wallets().list_wallets(*fellowship).await?);
        }
        Ok(all)
    }
}

fn required<'c>(value: Option<&'c str>, column: &str) -> Result<&'c str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| WalletError::ValidationError(format!("Column '{column}' is required")))
}

fn department(cmd: &LedgerCommand) -> Result<Department> {
    Department::new(required(cmd.department.as_deref(), "department")?)
}

fn amount(cmd: &LedgerCommand) -> Result<Decimal> {
    cmd.amount
        .ok_or_else(|| WalletError::ValidationError("Column 'amount' is required".to_string()))
}

fn handle(cmd: &LedgerCommand) -> Result<u64> {
    cmd.tx
        .ok_or_else(|| WalletError::ValidationError("Column 'tx' is required".to_string()))
}

fn actor(cmd: &LedgerCommand) -> Result<Actor> {
    let id = cmd
        .actor
        .ok_or_else(|| WalletError::ValidationError("Column 'actor' is required".to_string()))?;
    let role: Role = required(cmd.role.as_deref(), "role")?.parse()?;
    let unit = cmd
        .unit
        .as_deref()
        .filter(|u| !u.is_empty())
        .map(Department::new)
        .transpose()?;
    Ok(Actor::new(UserId(id), role, unit, FellowshipId(cmd.fellowship)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::infrastructure::in_memory::{InMemoryLedgerStore, InMemoryMemberDirectory};
    use crate::interfaces::csv::command_reader::CommandReader;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn engine() -> WalletEngine {
        WalletEngine::new(
            &LedgerConfig::default(),
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(InMemoryMemberDirectory::new()),
        )
    }

    async fn run(engine: &WalletEngine, rows: &str) -> Vec<Result<()>> {
        let data = format!(
            "type,fellowship,department,actor,role,unit,tx,amount,method,reference,account,payer,phone,member,note\n{rows}"
        );
        let mut runner = CommandRunner::new(engine);
        let mut results = Vec::new();
        for cmd in CommandReader::new(data.as_bytes()).commands() {
            match cmd {
                Ok(cmd) => results.push(runner.apply(cmd).await),
                Err(e) => results.push(Err(e)),
            }
        }
        results
    }

    #[tokio::test]
    async fn test_withdrawal_handles_route_decisions() {
        let engine = engine();
        let results = run(
            &engine,
            "fund,1,music,1,president,,,5000,,,,,,,Quarterly\n\
             withdraw,1,music,2,executive,music,1,2000,,,,,,,Instruments\n\
             approve,1,,3,secretary_general,,1,,,,,,,,\n\
             reject,1,,4,president,,1,,,,,,,,Not budgeted\n\
             approve,1,,5,vice_president,,1,,,,,,,,\n\
             approve,1,,3,secretary_general,,9,,,,,,,,",
        )
        .await;

        assert!(results[..4].iter().all(|r| r.is_ok()));
        assert!(matches!(results[4], Err(WalletError::OutOfOrder(_))));
        assert!(matches!(results[5], Err(WalletError::NotFound(_))));

        let wallet = engine
            .wallets()
            .find_wallet(FellowshipId(1), &Department::new("music").unwrap())
            .await
            .unwrap();
        assert_eq!(wallet.balance.value(), dec!(5000));
    }

    #[tokio::test]
    async fn test_missing_columns_are_validation_errors() {
        let engine = engine();
        let results = run(&engine, "fund,1,,1,president,,,10,,,,,,,\nfund,1,choir,,,,,10,,,,,,,").await;
        assert!(matches!(results[0], Err(WalletError::ValidationError(_))));
        assert!(matches!(results[1], Err(WalletError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_suspend_and_activate_set_status() {
        let engine = engine();
        let results = run(
            &engine,
            "fund,1,choir,1,president,,,100,,,,,,,\n\
             suspend,1,choir,9,super_admin,,,,,,,,,,\n\
             withdraw,1,choir,2,executive,choir,1,10,,,,,,,\n\
             activate,1,choir,9,super_admin,,,,,,,,,,\n\
             withdraw,1,choir,2,executive,choir,2,10,,,,,,,",
        )
        .await;

        assert!(results[0].is_ok() && results[1].is_ok());
        assert!(matches!(results[2], Err(WalletError::ValidationError(_))));
        assert!(results[3].is_ok() && results[4].is_ok());

        let wallet = engine
            .wallets()
            .find_wallet(FellowshipId(1), &Department::new("choir").unwrap())
            .await
            .unwrap();
        assert_eq!(wallet.status, WalletStatus::Active);
    }
}
