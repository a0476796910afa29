use crate::error::{Result, WalletError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Create,
    Link,
    Fund,
    Donate,
    Withdraw,
    Approve,
    Reject,
    /// Replays a payment notification whose signature was verified upstream.
    Webhook,
    Suspend,
    Activate,
}

/// One row of a ledger command file.
///
/// Columns a command does not use are left empty. `tx` is a handle chosen by the
/// file's author: a `withdraw` row binds it, later `approve`/`reject` rows refer to it.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct LedgerCommand {
    #[serde(rename = "type")]
    pub kind: CommandKind,
    pub fellowship: u64,
    pub department: Option<String>,
    pub actor: Option<u64>,
    pub role: Option<String>,
    /// The actor's own department.
    pub unit: Option<String>,
    pub tx: Option<u64>,
    pub amount: Option<Decimal>,
    pub method: Option<String>,
    pub reference: Option<String>,
    pub account: Option<String>,
    pub payer: Option<String>,
    pub phone: Option<String>,
    pub member: Option<u64>,
    pub note: Option<String>,
}

/// Reads ledger commands from a CSV source.
///
/// Handles whitespace trimming and flexible record lengths automatically.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes commands, one `Result` per row.
    pub fn commands(self) -> impl Iterator<Item = Result<LedgerCommand>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(WalletError::from))
    }
}
