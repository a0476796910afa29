#![allow(dead_code)]

use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use unit_ledger::application::engine::WalletEngine;
use unit_ledger::config::LedgerConfig;
use unit_ledger::domain::actor::{Actor, Role};
use unit_ledger::domain::ids::{FellowshipId, UserId, WalletId};
use unit_ledger::domain::wallet::Department;
use unit_ledger::infrastructure::in_memory::{InMemoryLedgerStore, InMemoryMemberDirectory};

pub const HEADER: [&str; 15] = [
    "type", "fellowship", "department", "actor", "role", "unit", "tx", "amount", "method",
    "reference", "account", "payer", "phone", "member", "note",
];

pub fn engine_with(config: LedgerConfig, directory: InMemoryMemberDirectory) -> WalletEngine {
    WalletEngine::new(&config, Arc::new(InMemoryLedgerStore::new()), Arc::new(directory))
}

pub fn engine() -> WalletEngine {
    engine_with(LedgerConfig::default(), InMemoryMemberDirectory::new())
}

pub fn officer(role: Role, id: u64) -> Actor {
    Actor::new(UserId(id), role, None, FellowshipId(1))
}

pub fn unit_head(department: &str) -> Actor {
    Actor::new(
        UserId(100),
        Role::Executive,
        Some(Department::new(department).unwrap()),
        FellowshipId(1),
    )
}

/// Creates a wallet in fellowship 1 and funds it from the treasury.
pub async fn funded_wallet(engine: &WalletEngine, department: &str, amount: Decimal) -> WalletId {
    let wallet = engine
        .wallets()
        .get_or_create_wallet(FellowshipId(1), &Department::new(department).unwrap())
        .await
        .unwrap();
    engine
        .wallets()
        .fund_from_treasury(wallet.id, amount, "seed", &officer(Role::President, 90))
        .await
        .unwrap();
    wallet.id
}

/// Writes a command file with the standard header and the given rows.
pub fn write_commands(path: &Path, rows: &[&[&str]]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);
    wtr.write_record(HEADER)?;
    for row in rows {
        wtr.write_record(*row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Generates `rows` cash donations of 1.00 into fellowship 1's MEDIA wallet.
pub fn generate_donations(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);
    wtr.write_record(HEADER)?;
    wtr.write_record(["fund", "1", "media", "1", "president", "", "", "1", "", "", "", "", "", "", ""])?;

    for i in 1..=rows {
        wtr.write_record([
            "donate",
            "1",
            "media",
            "2",
            "worker",
            "",
            "",
            "1.00",
            "cash",
            &format!("CASH-{i}"),
            "",
            "",
            "",
            "",
            "",
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
