use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use unit_ledger::application::engine::WalletEngine;
use unit_ledger::config::LedgerConfig;
use unit_ledger::domain::ports::LedgerStoreRef;
use unit_ledger::infrastructure::in_memory::{InMemoryLedgerStore, InMemoryMemberDirectory};
use unit_ledger::interfaces::csv::command_reader::CommandReader;
use unit_ledger::interfaces::csv::member_reader::MemberReader;
use unit_ledger::interfaces::csv::wallet_writer::WalletWriter;
use unit_ledger::interfaces::runner::CommandRunner;
use unit_ledger::telemetry;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input ledger commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JSON configuration file. Falls back to UNIT_LEDGER_CONFIG, then defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Member roster CSV used to attribute payments to members.
    #[arg(long)]
    members: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = unit_ledger::infrastructure::rocksdb::RocksDBLedgerStore::open(&path)
                .into_diagnostic()?;
            info!(path = %path.display(), "Opened RocksDB ledger");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(path) => {
            warn!(
                path = %path.display(),
                "Built without storage-rocksdb; falling back to in-memory storage"
            );
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
        None => Ok(Arc::new(InMemoryLedgerStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_json);

    let config = LedgerConfig::load(cli.config.as_deref()).into_diagnostic()?;
    let store = open_store(cli.db_path)?;

    let directory = InMemoryMemberDirectory::new();
    if let Some(path) = cli.members {
        let file = File::open(path).into_diagnostic()?;
        for member in MemberReader::new(file).members() {
            match member {
                Ok(member) => directory.add(member).await,
                Err(e) => warn!(error = %e, "Skipping roster row"),
            }
        }
    }

    let engine = WalletEngine::new(&config, store, Arc::new(directory));
    let mut runner = CommandRunner::new(&engine);

    let file = File::open(cli.input).into_diagnostic()?;
    for (row, command) in CommandReader::new(file).commands().enumerate() {
        let row = row + 1;
        match command {
            Ok(command) => {
                if let Err(e) = runner.apply(command).await {
                    if e.is_expected() {
                        info!(row, kind = e.kind(), error = %e, "Command not applied");
                    } else {
                        warn!(row, kind = e.kind(), error = %e, "Command failed");
                    }
                }
            }
            Err(e) => error!(row, error = %e, "Error reading command"),
        }
    }

    let wallets = runner.wallets().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = WalletWriter::new(stdout.lock());
    writer.write_wallets(wallets).into_diagnostic()?;

    Ok(())
}
